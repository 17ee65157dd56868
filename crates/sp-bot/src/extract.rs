//! Analysis-target extraction from raw chat input.
//!
//! Text is scanned for a markdown link first, then a bare URL. Input and
//! match lengths are capped so hostile messages cannot turn the regex
//! scan into a resource sink. An attached document always wins over any
//! link in the accompanying text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest text the extractor will scan.
pub const MAX_SCAN_LEN: usize = 10_000;

/// Longest URL the extractor will accept.
pub const MAX_URL_LEN: usize = 2_048;

static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\]]*\]\((https?://[^)\s]+)\)").expect("invalid markdown link pattern")
});

static BARE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("invalid bare URL pattern"));

/// A document attached to a chat message.
#[derive(Debug, Clone)]
pub struct IncomingDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Raw input of one chat message, as the transport hands it over.
#[derive(Debug, Clone, Default)]
pub struct ChatInput {
    /// Message text or caption.
    pub text: Option<String>,
    /// Attached document, already downloaded.
    pub document: Option<IncomingDocument>,
}

impl ChatInput {
    pub fn from_text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            document: None,
        }
    }

    pub fn from_document(filename: &str, bytes: Vec<u8>) -> Self {
        Self {
            text: None,
            document: Some(IncomingDocument {
                filename: filename.to_string(),
                bytes,
            }),
        }
    }
}

/// The thing to analyze, derived from one chat message.
#[derive(Debug, Clone)]
pub enum AnalysisTarget {
    Url { url: String },
    File { filename: String, bytes: Vec<u8> },
}

/// Extracts the first acceptable URL from free text.
///
/// A markdown link is preferred over a bare URL wherever both appear.
/// Over-long input or an over-long matched URL yields no match.
pub fn extract_url(text: &str) -> Option<&str> {
    if text.len() > MAX_SCAN_LEN {
        return None;
    }

    let url = MARKDOWN_LINK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .or_else(|| BARE_URL.find(text).map(|m| m.as_str()))?;

    (url.len() <= MAX_URL_LEN).then_some(url)
}

/// Derives the analysis target from one message. A document takes
/// priority over any URL in the text.
pub fn extract_target(input: ChatInput) -> Option<AnalysisTarget> {
    if let Some(document) = input.document {
        return Some(AnalysisTarget::File {
            filename: document.filename,
            bytes: document.bytes,
        });
    }

    let text = input.text?;
    extract_url(&text).map(|url| AnalysisTarget::Url {
        url: url.to_string(),
    })
}
