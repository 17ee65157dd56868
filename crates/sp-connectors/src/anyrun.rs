//! ANY.RUN-compatible sandbox connector.

use crate::http::{remote_error_message, HttpClient};
use crate::sse::{data_payload, LineBuffer};
use crate::traits::{ConnectorError, ConnectorResult, SandboxApi, SandboxConfig};
use crate::types::{
    AnalysisState, ApiLimits, HistoryEntry, MainObject, ObjectKind, Report, TaskId, Timestampish,
    Verdict,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use sp_core::Secret;
use tracing::{debug, info};

/// Production connector for the ANY.RUN HTTP API.
pub struct AnyRunConnector {
    client: HttpClient,
}

impl AnyRunConnector {
    pub fn new(config: SandboxConfig) -> ConnectorResult<Self> {
        let client = HttpClient::new(config)?;
        info!("sandbox connector initialized");
        Ok(Self { client })
    }
}

#[async_trait]
impl SandboxApi for AnyRunConnector {
    async fn submit_url(
        &self,
        key: &Secret,
        url: &str,
        owner_id: i64,
    ) -> ConnectorResult<TaskId> {
        debug!(owner_id, "submitting URL for analysis");

        let body = serde_json::json!({
            "obj_type": "url",
            "obj_url": url,
        });

        let response = self.client.post("/v1/analysis", key, &body).await?;
        if !response.status().is_success() {
            return Err(ConnectorError::RequestFailed(
                remote_error_message(response).await,
            ));
        }

        let submit: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
        Ok(TaskId(submit.data.task_id))
    }

    async fn submit_file(
        &self,
        key: &Secret,
        bytes: Vec<u8>,
        filename: &str,
        owner_id: i64,
    ) -> ConnectorResult<TaskId> {
        if bytes.is_empty() {
            return Err(ConnectorError::InvalidRequest(
                "Cannot submit an empty file".to_string(),
            ));
        }

        debug!(owner_id, filename, size = bytes.len(), "submitting file for analysis");

        let file_part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("obj_type", "file")
            .part("file", file_part);

        let response = self.client.post_multipart("/v1/analysis", key, form).await?;
        if !response.status().is_success() {
            return Err(ConnectorError::RequestFailed(
                remote_error_message(response).await,
            ));
        }

        let submit: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
        Ok(TaskId(submit.data.task_id))
    }

    async fn get_status(&self, key: &Secret, task_id: &TaskId) -> ConnectorResult<AnalysisState> {
        let path = format!("/v1/analysis/status/{}", task_id);
        let response = self.client.get_event_stream(&path, key).await?;

        if !response.status().is_success() {
            return Err(ConnectorError::RequestFailed(format!(
                "Status check failed: HTTP {}",
                response.status()
            )));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = LineBuffer::new();

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| ConnectorError::RequestFailed(e.to_string()))?;
            for line in buffer.push(&chunk) {
                if let Some(payload) = data_payload(&line) {
                    return parse_status_payload(payload);
                }
            }
        }

        // A trailing unterminated line can still carry the payload.
        if let Some(line) = buffer.remainder() {
            if let Some(payload) = data_payload(&line) {
                return parse_status_payload(payload);
            }
        }

        // The remote closes the stream once the task leaves its running
        // states; end-of-stream without a payload means the task is done.
        Ok(AnalysisState::Completed)
    }

    async fn get_report(&self, key: &Secret, task_id: &TaskId) -> ConnectorResult<Report> {
        let path = format!("/v1/analysis/{}", task_id);
        let response = self.client.get(&path, key).await?;

        if !response.status().is_success() {
            return Err(ConnectorError::RequestFailed(
                remote_error_message(response).await,
            ));
        }

        let report: ReportResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
        Ok(map_report(report.data.analysis, task_id))
    }

    async fn get_history(
        &self,
        key: &Secret,
        limit: u32,
        skip: u32,
    ) -> ConnectorResult<Vec<HistoryEntry>> {
        let response = self
            .client
            .get_with_query("/v1/analysis/", key, &[("limit", limit), ("skip", skip)])
            .await?;

        if !response.status().is_success() {
            return Err(ConnectorError::RequestFailed(
                remote_error_message(response).await,
            ));
        }

        let history: HistoryResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
        Ok(history.data.tasks.into_iter().map(map_history_entry).collect())
    }

    async fn get_limits(&self, key: &Secret) -> ConnectorResult<ApiLimits> {
        let response = self.client.get("/v1/user", key).await?;

        if !response.status().is_success() {
            return Err(ConnectorError::RequestFailed(
                remote_error_message(response).await,
            ));
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        let raw = user.data.limits.and_then(|l| l.api).unwrap_or_default();
        Ok(ApiLimits {
            month: raw.month,
            day: raw.day,
            hour: raw.hour,
            minute: raw.minute,
        })
    }
}

/// Parses one SSE `data:` payload into an analysis state.
fn parse_status_payload(payload: &str) -> ConnectorResult<AnalysisState> {
    let event: StatusEvent = serde_json::from_str(payload)
        .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;
    Ok(AnalysisState::from_raw(
        event.task.status,
        event.task.actions.manual_closed,
    ))
}

fn map_report(raw: RawAnalysis, task_id: &TaskId) -> Report {
    let content = raw.content.unwrap_or_default();
    let main = content.main_object.unwrap_or_default();

    let kind = match main.kind.as_deref() {
        Some("file") => ObjectKind::File,
        _ => ObjectKind::Url,
    };
    let name = match kind {
        ObjectKind::File => main.filename,
        ObjectKind::Url => main.url,
    };
    let download_url = match kind {
        ObjectKind::File => main.permanent_url,
        ObjectKind::Url => None,
    };

    let verdict_raw = raw.scores.and_then(|s| s.verdict).unwrap_or_default();
    let verdict = Verdict::from_wire(
        verdict_raw.threat_level_text.as_deref(),
        verdict_raw.threat_level,
    );

    let created_at = raw
        .creation_text
        .map(Timestampish::Text)
        .or(raw.creation.map(Timestampish::Epoch));

    Report {
        uuid: raw.uuid.unwrap_or_else(|| task_id.to_string()),
        verdict,
        main_object: MainObject {
            kind,
            name,
            download_url,
        },
        created_at,
        tags: raw.tags.into_iter().filter_map(|t| t.tag).collect(),
        video_url: content.video.and_then(|v| v.permanent_url),
        screenshot_urls: content
            .screenshots
            .into_iter()
            .filter_map(|s| s.permanent_url)
            .collect(),
        has_network_capture: content.pcap.map(|p| p.present).unwrap_or(false),
    }
}

fn map_history_entry(raw: RawHistoryTask) -> HistoryEntry {
    HistoryEntry {
        uuid: raw.uuid,
        name: raw.name.unwrap_or_default(),
        verdict: raw.verdict.unwrap_or_default(),
        date: raw.date,
        tags: raw.tags,
        sha256: raw.hashes.and_then(|h| h.sha256),
    }
}

// Wire shapes.

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    data: SubmitData,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    #[serde(rename = "taskid", alias = "task_id")]
    task_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatusEvent {
    #[serde(default)]
    task: StatusTask,
}

#[derive(Debug, Default, Deserialize)]
struct StatusTask {
    status: Option<i64>,
    #[serde(default)]
    actions: StatusActions,
}

#[derive(Debug, Default, Deserialize)]
struct StatusActions {
    #[serde(default, rename = "manualclosed")]
    manual_closed: bool,
}

#[derive(Debug, Deserialize)]
struct ReportResponse {
    data: ReportData,
}

#[derive(Debug, Deserialize)]
struct ReportData {
    analysis: RawAnalysis,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    uuid: Option<String>,
    #[serde(rename = "creationText")]
    creation_text: Option<String>,
    creation: Option<i64>,
    #[serde(default)]
    tags: Vec<RawTag>,
    scores: Option<RawScores>,
    content: Option<RawContent>,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawScores {
    verdict: Option<RawVerdict>,
}

#[derive(Debug, Default, Deserialize)]
struct RawVerdict {
    #[serde(rename = "threatLevelText")]
    threat_level_text: Option<String>,
    #[serde(rename = "threatLevel")]
    threat_level: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawContent {
    #[serde(rename = "mainObject")]
    main_object: Option<RawMainObject>,
    video: Option<RawMedia>,
    #[serde(default)]
    screenshots: Vec<RawMedia>,
    pcap: Option<RawPresence>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMainObject {
    #[serde(rename = "type")]
    kind: Option<String>,
    filename: Option<String>,
    url: Option<String>,
    #[serde(rename = "permanentUrl")]
    permanent_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    #[serde(rename = "permanentUrl")]
    permanent_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPresence {
    #[serde(default)]
    present: bool,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    data: HistoryData,
}

#[derive(Debug, Deserialize)]
struct HistoryData {
    #[serde(default)]
    tasks: Vec<RawHistoryTask>,
}

#[derive(Debug, Deserialize)]
struct RawHistoryTask {
    uuid: String,
    name: Option<String>,
    verdict: Option<String>,
    date: Option<Timestampish>,
    #[serde(default)]
    tags: Vec<String>,
    hashes: Option<RawHashes>,
}

#[derive(Debug, Deserialize)]
struct RawHashes {
    sha256: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: UserData,
}

#[derive(Debug, Deserialize)]
struct UserData {
    limits: Option<RawLimits>,
}

#[derive(Debug, Deserialize)]
struct RawLimits {
    api: Option<RawApiLimits>,
}

#[derive(Debug, Deserialize)]
struct RawApiLimits {
    #[serde(default = "unlimited")]
    month: i64,
    #[serde(default = "unlimited")]
    day: i64,
    #[serde(default = "unlimited")]
    hour: i64,
    #[serde(default = "unlimited")]
    minute: i64,
}

impl Default for RawApiLimits {
    fn default() -> Self {
        Self {
            month: unlimited(),
            day: unlimited(),
            hour: unlimited(),
            minute: unlimited(),
        }
    }
}

fn unlimited() -> i64 {
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_response_parses_taskid() {
        let submit: SubmitResponse =
            serde_json::from_str(r#"{"data": {"taskid": "abc-123"}}"#).unwrap();
        assert_eq!(submit.data.task_id, "abc-123");
    }

    #[test]
    fn status_payload_running() {
        let state = parse_status_payload(r#"{"task": {"status": 50}}"#).unwrap();
        assert_eq!(state, AnalysisState::Running);
    }

    #[test]
    fn status_payload_manual_close() {
        let state =
            parse_status_payload(r#"{"task": {"status": 30, "actions": {"manualclosed": true}}}"#)
                .unwrap();
        assert_eq!(state, AnalysisState::Completed);
    }

    #[test]
    fn status_payload_without_task_is_unknown() {
        let state = parse_status_payload("{}").unwrap();
        assert_eq!(state, AnalysisState::Unknown);
    }

    #[test]
    fn malformed_status_payload_is_an_error() {
        assert!(parse_status_payload("not json").is_err());
    }

    #[test]
    fn report_mapping_full() {
        let raw: ReportResponse = serde_json::from_str(
            r#"{
                "data": {
                    "analysis": {
                        "uuid": "abc-123",
                        "creationText": "2024-05-06T12:00:00Z",
                        "tags": [{"tag": "trojan"}, {"tag": "evasion"}, {"other": 1}],
                        "scores": {"verdict": {"threatLevelText": "Malicious activity", "threatLevel": 2}},
                        "content": {
                            "mainObject": {
                                "type": "file",
                                "filename": "payload.exe",
                                "permanentUrl": "https://content.example/payload.exe"
                            },
                            "video": {"permanentUrl": "https://content.example/video.mp4"},
                            "screenshots": [{"permanentUrl": "https://content.example/s1.png"}],
                            "pcap": {"present": true}
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        let report = map_report(raw.data.analysis, &TaskId::from("abc-123"));
        assert_eq!(report.uuid, "abc-123");
        assert_eq!(report.verdict, Verdict::Malicious);
        assert_eq!(report.main_object.kind, ObjectKind::File);
        assert_eq!(report.main_object.name.as_deref(), Some("payload.exe"));
        assert!(report.main_object.download_url.is_some());
        assert_eq!(report.tags, vec!["trojan", "evasion"]);
        assert!(report.video_url.is_some());
        assert_eq!(report.screenshot_urls.len(), 1);
        assert!(report.has_network_capture);
    }

    #[test]
    fn sparse_report_falls_back_to_task_id_and_unknowns() {
        let raw: ReportResponse =
            serde_json::from_str(r#"{"data": {"analysis": {}}}"#).unwrap();
        let report = map_report(raw.data.analysis, &TaskId::from("task-9"));

        assert_eq!(report.uuid, "task-9");
        assert_eq!(report.verdict, Verdict::Unknown);
        assert_eq!(report.main_object.kind, ObjectKind::Url);
        assert!(report.main_object.name.is_none());
        assert!(report.created_at.is_none());
        assert!(report.tags.is_empty());
        assert!(report.video_url.is_none());
        assert!(!report.has_network_capture);
    }

    #[test]
    fn epoch_creation_is_preserved() {
        let raw: ReportResponse = serde_json::from_str(
            r#"{"data": {"analysis": {"uuid": "u", "creation": 1715000000}}}"#,
        )
        .unwrap();
        let report = map_report(raw.data.analysis, &TaskId::from("u"));
        assert_eq!(report.created_at, Some(Timestampish::Epoch(1715000000)));
    }

    #[test]
    fn history_entries_parse() {
        let history: HistoryResponse = serde_json::from_str(
            r#"{
                "data": {
                    "tasks": [
                        {
                            "uuid": "t1",
                            "name": "example.com",
                            "verdict": "No threats detected",
                            "date": "2024-05-06T12:00:00Z",
                            "tags": ["phishing"],
                            "hashes": {"sha256": "deadbeef"}
                        },
                        {"uuid": "t2"}
                    ]
                }
            }"#,
        )
        .unwrap();

        let entries: Vec<HistoryEntry> =
            history.data.tasks.into_iter().map(map_history_entry).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sha256.as_deref(), Some("deadbeef"));
        assert_eq!(entries[1].name, "");
        assert!(entries[1].sha256.is_none());
    }

    #[test]
    fn limits_default_to_unlimited() {
        let user: UserResponse = serde_json::from_str(r#"{"data": {}}"#).unwrap();
        let raw = user.data.limits.and_then(|l| l.api).unwrap_or_default();
        assert_eq!(raw.month, -1);
        assert_eq!(raw.minute, -1);
    }

    #[test]
    fn limits_parse_partial() {
        let user: UserResponse = serde_json::from_str(
            r#"{"data": {"limits": {"api": {"day": 100, "hour": 10}}}}"#,
        )
        .unwrap();
        let raw = user.data.limits.and_then(|l| l.api).unwrap();
        assert_eq!(raw.month, -1);
        assert_eq!(raw.day, 100);
        assert_eq!(raw.hour, 10);
    }
}
