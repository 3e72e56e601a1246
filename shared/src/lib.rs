//! Shared library for the LINE relay Lambda functions.
//!
//! This crate holds the message pipeline and the clients it talks to: the
//! LINE Messaging API on one side and Dialogflow on the other, with a local
//! keyword fallback for when Dialogflow cannot answer.

pub mod config;
pub mod error;
pub mod fallback;
pub mod http;
pub mod indicator;
pub mod line;
pub mod models;
pub mod nlu;
pub mod pipeline;
pub mod platform;
pub mod random;
pub mod secrets;
pub mod signature;

pub use config::{Config, CredentialSource};
pub use error::{Error, Result};
pub use fallback::FallbackResponder;
pub use indicator::{IndicatorMode, IndicatorPolicy};
pub use line::LineClient;
pub use models::{DeliverySummary, EventOutcome, InboundEvent, ReplySource, WebhookDelivery};
pub use nlu::{NluBackend, NluError, NluGateway, NluResult};
pub use pipeline::MessagePipeline;
pub use platform::{ChatPlatform, PlatformError};
pub use random::{Chooser, ThreadRngChooser};
