//! Report rendering: display-safe text plus follow-up actions.
//!
//! Everything interpolated into chat output passes through
//! [`escape_markdown`], one shared function for the controller's error
//! paths and the report view alike.

use crate::chat::MessageAction;
use chrono::{DateTime, Utc};
use sp_connectors::{ApiLimits, HistoryEntry, ObjectKind, Report, Timestampish, Verdict};
use sp_core::TextCatalog;

/// Characters that are markdown-significant on the display surface.
const ESCAPE_SET: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escapes markdown-significant characters with a backslash.
///
/// Single-pass: escaping an already-escaped string doubles the
/// backslashes, so callers escape exactly once, at render time.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if ESCAPE_SET.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Maps a verdict to its display icon. Total; anything unrecognized got
/// folded into `Verdict::Unknown` upstream.
pub fn verdict_icon(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::NoThreats => "🔵",
        Verdict::Suspicious => "🟡",
        Verdict::Malicious => "🔴",
        Verdict::Unknown => "⚪",
    }
}

/// Rendering configuration.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Base URL of the human-facing report site.
    pub report_base_url: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            report_base_url: "https://app.any.run".to_string(),
        }
    }
}

impl RenderConfig {
    fn permalink(&self, uuid: &str) -> String {
        format!("{}/tasks/{}/", self.report_base_url.trim_end_matches('/'), uuid)
    }

    fn pcap_link(&self, uuid: &str) -> String {
        format!(
            "{}/tasks/{}/download/pcap",
            self.report_base_url.trim_end_matches('/'),
            uuid
        )
    }
}

/// Formats a creation stamp for display, degrading to the localized
/// placeholder when the value is absent or unparseable.
pub fn format_date(
    stamp: Option<&Timestampish>,
    texts: &TextCatalog,
    lang: &str,
) -> String {
    let parsed: Option<DateTime<Utc>> = match stamp {
        Some(Timestampish::Text(s)) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .ok(),
        Some(Timestampish::Epoch(secs)) => DateTime::from_timestamp(*secs, 0),
        None => None,
    };

    match parsed {
        Some(date) => date.format("%d %B %Y, %H:%M").to_string(),
        None => texts.resolve(lang, "UNKNOWN_DATE"),
    }
}

/// Renders a report into message text and its follow-up actions.
pub fn format_report(
    report: &Report,
    config: &RenderConfig,
    texts: &TextCatalog,
    lang: &str,
) -> (String, Vec<MessageAction>) {
    let icon = verdict_icon(report.verdict);
    let date = escape_markdown(&format_date(report.created_at.as_ref(), texts, lang));
    let name_fallback = texts.resolve(lang, "UNKNOWN_OBJECT");
    let name = escape_markdown(report.main_object.name.as_deref().unwrap_or(&name_fallback));
    let uuid = escape_markdown(&report.uuid);

    let mut text = format!(
        "{icon}\u{00A0}***{date}***\n📄\u{00A0}`{name}`\n🆔\u{00A0}`{uuid}`"
    );
    if !report.tags.is_empty() {
        let tags = report
            .tags
            .iter()
            .map(|t| format!("[{}]", escape_markdown(t)))
            .collect::<Vec<_>>()
            .join(", ");
        text.push_str(&format!("\n🏷️\u{00A0}{tags}"));
    }

    let mut actions = vec![MessageAction {
        label: texts.resolve(lang, "VIEW_REPORT_ONLINE"),
        url: config.permalink(&report.uuid),
    }];
    if let Some(video_url) = &report.video_url {
        actions.push(MessageAction {
            label: texts.resolve(lang, "WATCH_VIDEO"),
            url: video_url.clone(),
        });
    }
    if let Some(screenshot_url) = report.screenshot_urls.first() {
        actions.push(MessageAction {
            label: texts.resolve(lang, "VIEW_SCREENSHOTS"),
            url: screenshot_url.clone(),
        });
    }
    if report.main_object.kind == ObjectKind::File {
        if let Some(download_url) = &report.main_object.download_url {
            actions.push(MessageAction {
                label: texts.resolve(lang, "DOWNLOAD_FILE"),
                url: download_url.clone(),
            });
        }
    }
    if report.has_network_capture {
        actions.push(MessageAction {
            label: texts.resolve(lang, "DOWNLOAD_PCAP"),
            url: config.pcap_link(&report.uuid),
        });
    }

    (text, actions)
}

/// Renders the analysis-history listing.
pub fn format_history(entries: &[HistoryEntry], texts: &TextCatalog, lang: &str) -> String {
    if entries.is_empty() {
        return texts.resolve(lang, "HISTORY_EMPTY");
    }

    entries
        .iter()
        .map(|entry| {
            let icon = verdict_icon(Verdict::from_wire(Some(entry.verdict.as_str()), None));
            let date = format_date(entry.date.as_ref(), texts, lang);
            let mut block = format!(
                "{icon} {}\n🗓 {date}\n🆔 {}",
                escape_markdown(&entry.name),
                escape_markdown(&entry.uuid)
            );
            if !entry.tags.is_empty() {
                block.push_str(&format!("\n🏷️ {}", escape_markdown(&entry.tags.join(", "))));
            }
            if let Some(sha256) = &entry.sha256 {
                block.push_str(&format!("\n#️⃣ `{}`", escape_markdown(sha256)));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Renders the API-limits view; `-1` means unlimited.
pub fn format_limits(limits: &ApiLimits, texts: &TextCatalog, lang: &str) -> String {
    let show = |value: i64| -> String {
        if value == -1 {
            texts.resolve(lang, "UNLIMITED")
        } else {
            value.to_string()
        }
    };

    format!(
        "{}:\n{} - {}\n{} - {}\n{} - {}\n{} - {}",
        texts.resolve(lang, "YOUR_SANDBOX_API_LIMITS"),
        texts.resolve(lang, "LIMIT_MONTH"),
        show(limits.month),
        texts.resolve(lang, "LIMIT_DAY"),
        show(limits.day),
        texts.resolve(lang, "LIMIT_HOUR"),
        show(limits.hour),
        texts.resolve(lang, "LIMIT_MINUTE"),
        show(limits.minute),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_connectors::MainObject;

    fn texts() -> TextCatalog {
        TextCatalog::builtin()
    }

    fn report() -> Report {
        Report {
            uuid: "abc-123".to_string(),
            verdict: Verdict::Malicious,
            main_object: MainObject {
                kind: ObjectKind::File,
                name: Some("pay_load.exe".to_string()),
                download_url: Some("https://content.example/payload".to_string()),
            },
            created_at: Some(Timestampish::Text("2024-05-06T12:30:00Z".to_string())),
            tags: vec!["trojan".to_string()],
            video_url: None,
            screenshot_urls: Vec::new(),
            has_network_capture: false,
        }
    }

    #[test]
    fn escape_covers_the_full_set() {
        let raw: String = ESCAPE_SET.iter().collect();
        let escaped = escape_markdown(&raw);
        for c in ESCAPE_SET {
            assert!(
                escaped.contains(&format!("\\{}", c)),
                "character {:?} not escaped",
                c
            );
        }
        // Each escaped character contributes exactly one backslash.
        assert_eq!(escaped.len(), raw.len() + ESCAPE_SET.len());
    }

    #[test]
    fn escape_is_single_pass_not_idempotent() {
        let once = escape_markdown("a.b");
        assert_eq!(once, "a\\.b");
        let twice = escape_markdown(&once);
        assert_eq!(twice, "a\\\\\\.b");
    }

    #[test]
    fn escape_leaves_plain_text_alone() {
        assert_eq!(escape_markdown("plain text 123"), "plain text 123");
    }

    #[test]
    fn verdict_icons_are_total() {
        assert_eq!(verdict_icon(Verdict::NoThreats), "🔵");
        assert_eq!(verdict_icon(Verdict::Suspicious), "🟡");
        assert_eq!(verdict_icon(Verdict::Malicious), "🔴");
        assert_eq!(verdict_icon(Verdict::Unknown), "⚪");
    }

    #[test]
    fn date_parses_iso_and_epoch() {
        let texts = texts();
        let iso = format_date(
            Some(&Timestampish::Text("2024-05-06T12:30:00Z".to_string())),
            &texts,
            "en",
        );
        assert!(iso.contains("2024"));

        let epoch = format_date(Some(&Timestampish::Epoch(1715000400)), &texts, "en");
        assert!(epoch.contains("2024"));
    }

    #[test]
    fn bad_date_degrades_to_placeholder() {
        let texts = texts();
        let placeholder = texts.resolve("en", "UNKNOWN_DATE");
        assert_eq!(
            format_date(Some(&Timestampish::Text("not a date".to_string())), &texts, "en"),
            placeholder
        );
        assert_eq!(format_date(None, &texts, "en"), placeholder);
    }

    #[test]
    fn report_text_contains_escaped_fields() {
        let (text, _) = format_report(&report(), &RenderConfig::default(), &texts(), "en");
        assert!(text.contains("🔴"));
        assert!(text.contains("pay\\_load\\.exe"));
        assert!(text.contains("abc\\-123"));
        assert!(text.contains("[trojan]"));
    }

    #[test]
    fn permalink_action_is_always_present() {
        let (_, actions) = format_report(&report(), &RenderConfig::default(), &texts(), "en");
        assert_eq!(actions[0].url, "https://app.any.run/tasks/abc-123/");
    }

    #[test]
    fn optional_actions_appear_only_when_backed_by_data() {
        let texts = texts();
        let config = RenderConfig::default();

        // File report with a download link but no media.
        let (_, actions) = format_report(&report(), &config, &texts, "en");
        assert_eq!(actions.len(), 2); // permalink + file download
        assert!(actions.iter().any(|a| a.url.contains("content.example")));

        // URL report with every media field populated.
        let mut full = report();
        full.main_object = MainObject {
            kind: ObjectKind::Url,
            name: Some("https://example.com".to_string()),
            download_url: None,
        };
        full.video_url = Some("https://content.example/v.mp4".to_string());
        full.screenshot_urls = vec!["https://content.example/s.png".to_string()];
        full.has_network_capture = true;
        let (_, actions) = format_report(&full, &config, &texts, "en");
        // permalink + video + screenshots + pcap, no file download for URLs
        assert_eq!(actions.len(), 4);
        assert!(actions.iter().all(|a| !a.url.contains("content.example/payload")));
    }

    #[test]
    fn missing_object_name_uses_placeholder() {
        let texts = texts();
        let mut sparse = report();
        sparse.main_object.name = None;
        let (text, _) = format_report(&sparse, &RenderConfig::default(), &texts, "en");
        assert!(text.contains("Unknown object"));
    }

    #[test]
    fn history_rendering() {
        let texts = texts();
        let entries = vec![HistoryEntry {
            uuid: "t1".to_string(),
            name: "example.com".to_string(),
            verdict: "No threats detected".to_string(),
            date: None,
            tags: vec!["phishing".to_string()],
            sha256: Some("deadbeef".to_string()),
        }];
        let text = format_history(&entries, &texts, "en");
        assert!(text.contains("🔵"));
        assert!(text.contains("example\\.com"));
        assert!(text.contains("deadbeef"));

        assert_eq!(format_history(&[], &texts, "en"), texts.resolve("en", "HISTORY_EMPTY"));
    }

    #[test]
    fn limits_render_unlimited_for_minus_one() {
        let texts = texts();
        let text = format_limits(
            &ApiLimits {
                month: -1,
                day: 100,
                hour: 10,
                minute: -1,
            },
            &texts,
            "en",
        );
        assert!(text.contains("Month - Unlimited"));
        assert!(text.contains("Day - 100"));
    }
}
