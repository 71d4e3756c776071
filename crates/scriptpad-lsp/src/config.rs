use scriptpad_core::AnalysisOptions;
use serde::Deserialize;

/// Root configuration for the scriptpad-lsp server.
///
/// Provided by the client via initialization options or
/// `workspace/didChangeConfiguration`. Every field has a default.
///
/// # Examples
///
/// ```
/// use scriptpad_lsp::config::ScriptpadConfig;
///
/// let json = r#"{
///     "completion": { "max_items": 50 },
///     "analysis": { "include_prelude": false }
/// }"#;
///
/// let config: ScriptpadConfig = serde_json::from_str(json).unwrap();
/// assert!(config.completion.enabled);
/// assert_eq!(config.completion.max_items, 50);
/// assert!(!config.analysis.include_prelude);
/// ```
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct ScriptpadConfig {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl ScriptpadConfig {
    /// Reads settings sent with `didChangeConfiguration`.
    ///
    /// Clients either send the settings object itself or nest it under a
    /// `scriptpad` key.
    pub fn from_settings(settings: serde_json::Value) -> Option<Self> {
        let settings = match settings {
            serde_json::Value::Object(mut map) if map.contains_key("scriptpad") => {
                map.remove("scriptpad")?
            }
            other => other,
        };
        match serde_json::from_value(settings) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("ignoring invalid configuration: {}", e);
                None
            }
        }
    }
}

/// Completion behavior.
///
/// # Defaults
///
/// - `enabled`: `true`
/// - `max_items`: `0` (unlimited)
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CompletionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub max_items: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_items: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Analysis switches forwarded to every open workspace.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Make the built-in prelude library visible (default: true)
    #[serde(default = "default_true")]
    pub include_prelude: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            include_prelude: true,
        }
    }
}

impl From<&AnalysisConfig> for AnalysisOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            include_prelude: config.include_prelude,
        }
    }
}

const fn default_true() -> bool {
    true
}
