//! # sp-bot
//!
//! The Sandpiper bot core: turning raw chat input into a running remote
//! analysis and a rendered report. Holds the target extractor, the
//! submission controller, the status-monitoring loop, and the report
//! renderer, all wired through the [`chat::ChatMessenger`] abstraction
//! so no chat SDK leaks in.

pub mod chat;
pub mod extract;
pub mod monitor;
pub mod render;
pub mod submit;

pub use chat::{ChatError, ChatId, ChatMessenger, EditOutcome, MessageAction, MessageRef};
pub use extract::{AnalysisTarget, ChatInput, IncomingDocument};
pub use monitor::{MonitorConfig, MonitorContext, MonitorPool, StatusMonitor};
pub use render::{escape_markdown, verdict_icon, RenderConfig};
pub use submit::SubmissionController;
