//! Local keyword responder used when the NLU backend cannot answer.

use std::sync::Arc;

use crate::random::{pick, Chooser, ThreadRngChooser};

pub const GREETING_REPLY: &str = "สวัสดีครับ! 😊 มีอะไรให้ช่วยไหมครับ";
pub const HELP_REPLY: &str =
    "ผมพร้อมช่วยเหลือครับ 🙌 พิมพ์คำถามหรือเรื่องที่อยากรู้มาได้เลยครับ";
pub const FAREWELL_REPLY: &str = "ลาก่อนครับ แล้วคุยกันใหม่นะครับ 👋";
pub const TEST_REPLY: &str = "ระบบทำงานปกติครับ ✅";

/// A set of lowercase substrings mapped to a fixed reply.
struct KeywordGroup {
    name: &'static str,
    keywords: &'static [&'static str],
    reply: &'static str,
}

/// Scanned in order; the first group with a matching keyword wins.
const GROUPS: &[KeywordGroup] = &[
    KeywordGroup {
        name: "greeting",
        keywords: &["สวัสดี", "หวัดดี", "hello"],
        reply: GREETING_REPLY,
    },
    KeywordGroup {
        name: "help",
        keywords: &["ช่วย", "help"],
        reply: HELP_REPLY,
    },
    KeywordGroup {
        name: "farewell",
        keywords: &["ลาก่อน", "บาย", "bye"],
        reply: FAREWELL_REPLY,
    },
    KeywordGroup {
        name: "test",
        keywords: &["ทดสอบ", "test"],
        reply: TEST_REPLY,
    },
];

/// Common words that contain a keyword without meaning it ("สบาย" holds
/// "บาย", "latest" holds "test"). Removed before the keyword scan.
const MASKED_WORDS: &[&str] = &["สบาย", "latest", "contest", "protest", "attest"];

/// Templates for unmatched text; `{}` is replaced by the original message.
const GENERAL_TEMPLATES: &[&str] = &[
    "ได้รับข้อความ \"{}\" แล้วครับ ตอนนี้ผมยังตอบเรื่องนี้ไม่ได้ ลองถามใหม่อีกครั้งนะครับ",
    "ขอบคุณสำหรับข้อความ \"{}\" ครับ 🙏 ผมกำลังเรียนรู้เรื่องนี้อยู่",
    "\"{}\" น่าสนใจมากครับ ขอเวลาผมศึกษาเพิ่มเติมก่อนนะครับ",
];

/// Pure text → reply function. Never fails and never returns an empty string.
#[derive(Clone)]
pub struct FallbackResponder {
    chooser: Arc<dyn Chooser>,
}

impl Default for FallbackResponder {
    fn default() -> Self {
        Self::new(Arc::new(ThreadRngChooser))
    }
}

impl FallbackResponder {
    pub fn new(chooser: Arc<dyn Chooser>) -> Self {
        Self { chooser }
    }

    /// Name of the keyword group `text` falls into (`"general"` when none match).
    pub fn classify(&self, text: &str) -> &'static str {
        matching_group(text).map_or("general", |g| g.name)
    }

    pub fn respond(&self, text: &str) -> String {
        if let Some(group) = matching_group(text) {
            return group.reply.to_string();
        }
        let template =
            pick(self.chooser.as_ref(), GENERAL_TEMPLATES).unwrap_or(&GENERAL_TEMPLATES[0]);
        template.replacen("{}", text, 1)
    }
}

fn matching_group(text: &str) -> Option<&'static KeywordGroup> {
    let folded = MASKED_WORDS
        .iter()
        .fold(text.to_lowercase(), |acc, word| acc.replace(word, " "));
    GROUPS
        .iter()
        .find(|group| group.keywords.iter().any(|k| folded.contains(k)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FixedChooser;

    fn responder(index: usize) -> FallbackResponder {
        FallbackResponder::new(Arc::new(FixedChooser(index)))
    }

    #[test]
    fn test_thai_greeting() {
        assert_eq!(responder(0).respond("สวัสดี"), GREETING_REPLY);
        assert_eq!(responder(0).respond("หวัดดีจ้า"), GREETING_REPLY);
    }

    #[test]
    fn test_case_insensitive() {
        let r = responder(0);
        assert_eq!(r.respond("HELLO"), GREETING_REPLY);
        assert_eq!(r.respond("hello"), GREETING_REPLY);
        assert_eq!(r.respond("HeLp me"), HELP_REPLY);
    }

    #[test]
    fn test_group_priority() {
        // greeting is scanned before help
        assert_eq!(responder(0).respond("สวัสดี ช่วยหน่อย"), GREETING_REPLY);
        assert_eq!(responder(0).respond("bye, this was a test"), FAREWELL_REPLY);
        assert_eq!(responder(0).respond("ทดสอบระบบ"), TEST_REPLY);
    }

    #[test]
    fn test_general_interpolates_original_text() {
        let reply = responder(1).respond("Weather IN Bangkok?");
        assert!(reply.contains("\"Weather IN Bangkok?\""));
        assert_eq!(responder(1).classify("Weather IN Bangkok?"), "general");
    }

    #[test]
    fn test_fixed_chooser_pins_variant() {
        let a = responder(2).respond("ราคาทอง");
        let b = responder(2).respond("ราคาทอง");
        assert_eq!(a, b);
        assert_ne!(responder(0).respond("ราคาทอง"), a);
    }

    #[test]
    fn test_total_on_empty_and_odd_input() {
        for input in ["", " ", "\n\t", "🙂", "12345"] {
            for i in 0..GENERAL_TEMPLATES.len() {
                assert!(!responder(i).respond(input).is_empty());
            }
        }
    }

    #[test]
    fn test_classify() {
        let r = FallbackResponder::default();
        assert_eq!(r.classify("สวัสดีครับ"), "greeting");
        assert_eq!(r.classify("ช่วยด้วย"), "help");
        assert_eq!(r.classify("บายนะ"), "farewell");
        assert_eq!(r.classify("TEST"), "test");
    }

    #[test]
    fn test_keywords_inside_other_words_do_not_match() {
        let r = responder(0);
        assert_eq!(r.classify("สบายดีไหมครับ"), "general");
        assert_eq!(r.classify("what is the latest news"), "general");
        assert!(r.respond("สบายดีไหมครับ").contains("\"สบายดีไหมครับ\""));
        // a real farewell next to a masked word still counts
        assert_eq!(r.classify("สบายดี บายนะ"), "farewell");
        assert_eq!(r.classify("run the test"), "test");
    }
}
