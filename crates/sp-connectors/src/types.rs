//! Sandbox domain types: task ids, analysis states, verdicts, and the
//! report shape the renderer consumes.

use serde::{Deserialize, Serialize};

/// Unique identifier for a submitted analysis, assigned by the remote
/// sandbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// State of a running analysis, derived from a status poll.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    /// The sandbox is still working on the task.
    Running,
    /// Analysis finished; a report is available.
    Completed,
    /// The sandbox reported a failure. Not a transport error.
    Failed,
    /// The status payload carried no recognizable code. Treated like
    /// `Running` for looping, but displayed differently.
    Unknown,
}

impl AnalysisState {
    /// Maps the remote status payload to a state.
    ///
    /// Code `100` or an explicit manual-close mean completed; `-1` means
    /// failed; any other present code means still running; no code at
    /// all is unknown. Total over all inputs.
    pub fn from_raw(code: Option<i64>, manually_closed: bool) -> Self {
        if manually_closed {
            return AnalysisState::Completed;
        }
        match code {
            Some(100) => AnalysisState::Completed,
            Some(-1) => AnalysisState::Failed,
            Some(_) => AnalysisState::Running,
            None => AnalysisState::Unknown,
        }
    }

    /// Whether the monitor loop stops on this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisState::Completed | AnalysisState::Failed)
    }
}

/// The sandbox's classification of the analyzed object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    NoThreats,
    Suspicious,
    Malicious,
    Unknown,
}

impl Verdict {
    /// Maps the wire verdict (text and/or numeric threat level) to a
    /// verdict. Unrecognized or absent values map to `Unknown`.
    pub fn from_wire(text: Option<&str>, level: Option<i64>) -> Self {
        match text {
            Some("No threats detected") => return Verdict::NoThreats,
            Some("Suspicious activity") => return Verdict::Suspicious,
            Some("Malicious activity") => return Verdict::Malicious,
            _ => {}
        }
        match level {
            Some(0) => Verdict::NoThreats,
            Some(1) => Verdict::Suspicious,
            Some(2) => Verdict::Malicious,
            _ => Verdict::Unknown,
        }
    }
}

/// Kind of the analyzed main object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    File,
    Url,
}

/// The object the sandbox analyzed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainObject {
    pub kind: ObjectKind,
    /// Filename for files, the URL itself for URLs. Absent when the
    /// remote omits both; the renderer shows a placeholder then.
    pub name: Option<String>,
    /// Download link for the stored object, when the sandbox exposes one.
    pub download_url: Option<String>,
}

/// A creation timestamp as the remote sends it: either an ISO-8601
/// string or epoch seconds. Parsing happens at render time and degrades
/// to a placeholder on failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Timestampish {
    Epoch(i64),
    Text(String),
}

/// Terminal artifact of a completed analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub uuid: String,
    pub verdict: Verdict,
    pub main_object: MainObject,
    pub created_at: Option<Timestampish>,
    pub tags: Vec<String>,
    /// Recording of the interactive session, if any.
    pub video_url: Option<String>,
    pub screenshot_urls: Vec<String>,
    /// Whether a network capture can be downloaded.
    pub has_network_capture: bool,
}

/// One entry of the remote analysis history listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub uuid: String,
    pub name: String,
    pub verdict: String,
    pub date: Option<Timestampish>,
    pub tags: Vec<String>,
    pub sha256: Option<String>,
}

/// API quota limits for the authenticated user; `-1` means unlimited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ApiLimits {
    pub month: i64,
    pub day: i64,
    pub hour: i64,
    pub minute: i64,
}
