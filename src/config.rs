//! Completion settings
//!
//! Loaded from an optional JSON file, then overridden by `HS_AUTOCOMPLETE_*`
//! environment variables:
//!
//! - `HS_AUTOCOMPLETE_IMPORTS` (bool)
//! - `HS_AUTOCOMPLETE_LANGUAGE_PRAGMAS` (bool)
//! - `HS_AUTOCOMPLETE_INHIBIT` (bool)
//! - `HS_AUTOCOMPLETE_TIMEOUT_MS` (integer)

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    /// Complete module names and import lists on `import` lines
    pub auto_complete_imports: bool,

    /// Complete LANGUAGE and OPTIONS_GHC pragma values
    pub auto_complete_language_pragmas: bool,

    /// Ask the editor to hide its own word completions when we have suggestions
    pub inhibit_completions: bool,

    /// Timeout for a single backend query
    pub backend_timeout_ms: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            auto_complete_imports: true,
            auto_complete_language_pragmas: true,
            inhibit_completions: false,
            backend_timeout_ms: 5000,
        }
    }
}

impl CompletionSettings {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid completion settings")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Settings file (if any) plus environment overrides
    pub fn from_env_or_default(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn flag(key: &str, value: Option<String>, target: &mut bool) {
            let Some(value) = value else { return };
            match value.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => *target = true,
                "0" | "false" | "no" | "off" => *target = false,
                other => warn!("Ignoring {}='{}': expected a boolean", key, other),
            }
        }

        flag("HS_AUTOCOMPLETE_IMPORTS", lookup("HS_AUTOCOMPLETE_IMPORTS"), &mut self.auto_complete_imports);
        flag(
            "HS_AUTOCOMPLETE_LANGUAGE_PRAGMAS",
            lookup("HS_AUTOCOMPLETE_LANGUAGE_PRAGMAS"),
            &mut self.auto_complete_language_pragmas,
        );
        flag("HS_AUTOCOMPLETE_INHIBIT", lookup("HS_AUTOCOMPLETE_INHIBIT"), &mut self.inhibit_completions);

        if let Some(value) = lookup("HS_AUTOCOMPLETE_TIMEOUT_MS") {
            match value.trim().parse() {
                Ok(ms) => self.backend_timeout_ms = ms,
                Err(_) => warn!("Ignoring HS_AUTOCOMPLETE_TIMEOUT_MS='{}': expected milliseconds", value),
            }
        }
    }
}
