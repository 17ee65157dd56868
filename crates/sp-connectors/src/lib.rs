//! # sp-connectors
//!
//! Remote sandbox client for Sandpiper: the [`SandboxApi`] trait, the
//! reqwest-based HTTP wrapper, the server-sent-event status parser, the
//! production ANY.RUN-compatible connector, and a scripted mock for
//! tests.

pub mod anyrun;
pub mod http;
pub mod mock;
pub mod sse;
pub mod traits;
pub mod types;

pub use anyrun::AnyRunConnector;
pub use mock::MockSandboxConnector;
pub use traits::{ConnectorError, ConnectorResult, SandboxApi, SandboxConfig};
pub use types::{
    AnalysisState, ApiLimits, HistoryEntry, MainObject, ObjectKind, Report, TaskId, Timestampish,
    Verdict,
};
