//! Localization catalog.
//!
//! Display strings are looked up by key per language, falling back to
//! English and finally to the key itself. A missing key never fails; it
//! only logs, so a stale catalog cannot take a chat flow down.

use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// The built-in English catalog, compiled into the binary so the bot is
/// usable without any language files on disk.
const BUILTIN_EN: &str = include_str!("../lang/en.json");

const DEFAULT_LANG: &str = "en";

/// Key → template catalog, one map per language code.
#[derive(Debug, Clone)]
pub struct TextCatalog {
    languages: HashMap<String, HashMap<String, String>>,
}

impl TextCatalog {
    /// Creates a catalog holding only the embedded English texts.
    pub fn builtin() -> Self {
        let mut languages = HashMap::new();
        match serde_json::from_str::<HashMap<String, String>>(BUILTIN_EN) {
            Ok(texts) => {
                languages.insert(DEFAULT_LANG.to_string(), texts);
            }
            Err(e) => warn!(error = %e, "built-in language catalog failed to parse"),
        }
        Self { languages }
    }

    /// Loads every `<lang>.json` file from a directory on top of the
    /// built-in English catalog. Files that fail to parse are skipped.
    pub fn load_dir(dir: &Path) -> std::io::Result<Self> {
        let mut catalog = Self::builtin();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(code) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
            else {
                continue;
            };
            match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|s| {
                    serde_json::from_str::<HashMap<String, String>>(&s).map_err(|e| e.to_string())
                }) {
                Ok(texts) => {
                    debug!(lang = code, "loaded language file");
                    catalog
                        .languages
                        .entry(code.to_string())
                        .or_default()
                        .extend(texts);
                }
                Err(e) => warn!(lang = code, error = %e, "skipping unreadable language file"),
            }
        }
        Ok(catalog)
    }

    /// Resolves a display string for the given language.
    ///
    /// Lookup order: requested language, English, then the key itself.
    pub fn resolve(&self, lang: &str, key: &str) -> String {
        if let Some(text) = self.languages.get(lang).and_then(|m| m.get(key)) {
            return text.clone();
        }
        if let Some(text) = self.languages.get(DEFAULT_LANG).and_then(|m| m.get(key)) {
            return text.clone();
        }
        warn!(key, lang, "translation key not found");
        key.to_string()
    }

    /// Resolves a template and substitutes `{name}` placeholders.
    pub fn resolve_with(&self, lang: &str, key: &str, params: &[(&str, &str)]) -> String {
        let mut text = self.resolve(lang, key);
        for (name, value) in params {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        text
    }
}
