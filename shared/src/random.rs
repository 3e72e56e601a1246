//! Injectable randomness for canned phrase selection.

use rand::Rng;

/// Picks an index in `0..len`. `len` is always non-zero.
pub trait Chooser: Send + Sync {
    fn choose_index(&self, len: usize) -> usize;
}

/// Uniform choice backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngChooser;

impl Chooser for ThreadRngChooser {
    fn choose_index(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Always picks the same index (wrapped into range). Used to pin output.
#[derive(Debug, Clone, Copy)]
pub struct FixedChooser(pub usize);

impl Chooser for FixedChooser {
    fn choose_index(&self, len: usize) -> usize {
        self.0 % len
    }
}

/// Choose one item from a non-empty slice.
pub fn pick<'a, T>(chooser: &dyn Chooser, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(chooser.choose_index(items.len()))
}
