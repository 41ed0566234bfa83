use serde::Deserialize;
use std::time::Duration;

/// Upper bound for the diagnostics debounce window.
pub const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Root configuration for the ddpls server.
///
/// Provided by the client through `initializationOptions`. Every field is
/// optional and falls back to its default.
///
/// # Examples
///
/// ```
/// use ddpls::config::ServerConfig;
///
/// let json = r#"{
///     "diagnostics": { "debounce_ms": 250 },
///     "completion": { "snippets": false }
/// }"#;
///
/// let config: ServerConfig = serde_json::from_str(json).unwrap();
/// assert!(config.diagnostics.enabled);
/// assert_eq!(config.diagnostics.debounce().as_millis(), 250);
/// assert!(!config.completion.snippets_enabled(true));
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

/// Configuration for published diagnostics.
///
/// # Defaults
///
/// - `enabled`: `true`
/// - `debounce_ms`: `500`
///
/// # Examples
///
/// ```
/// use ddpls::config::DiagnosticsConfig;
///
/// let config = DiagnosticsConfig {
///     enabled: true,
///     debounce_ms: 60_000,
/// };
///
/// // Windows longer than ten seconds are clamped.
/// assert_eq!(config.debounce().as_secs(), 10);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Quiet period after an edit before diagnostics are published.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl DiagnosticsConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.min(MAX_DEBOUNCE_MS))
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Configuration for completion items.
///
/// # Defaults
///
/// - `keywords`: `true`
/// - `snippets`: unset, follows the client's snippet support
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    /// Offer language keywords and built-in types.
    #[serde(default = "default_true")]
    pub keywords: bool,
    /// Forces alias completions to be (or not be) snippets.
    #[serde(default)]
    pub snippets: Option<bool>,
}

impl CompletionConfig {
    pub fn snippets_enabled(&self, client_support: bool) -> bool {
        self.snippets.unwrap_or(client_support)
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            keywords: true,
            snippets: None,
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_debounce_ms() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.diagnostics.enabled);
        assert_eq!(config.diagnostics.debounce(), Duration::from_millis(500));
        assert!(config.completion.keywords);
        assert!(config.completion.snippets.is_none());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert!(config.diagnostics.enabled);
        assert_eq!(config.diagnostics.debounce_ms, 500);
        assert!(config.completion.keywords);
    }

    #[test]
    fn test_partial_sections() {
        let json = r#"{ "diagnostics": { "enabled": false } }"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert!(!config.diagnostics.enabled);
        assert_eq!(config.diagnostics.debounce_ms, 500);
    }

    #[test]
    fn test_debounce_is_clamped() {
        let config = DiagnosticsConfig {
            enabled: true,
            debounce_ms: u64::MAX,
        };
        assert_eq!(config.debounce(), Duration::from_millis(MAX_DEBOUNCE_MS));

        let config = DiagnosticsConfig {
            enabled: true,
            debounce_ms: 0,
        };
        assert_eq!(config.debounce(), Duration::ZERO);
    }

    #[test]
    fn test_snippets_follow_client_unless_set() {
        let mut config = CompletionConfig::default();
        assert!(config.snippets_enabled(true));
        assert!(!config.snippets_enabled(false));

        config.snippets = Some(true);
        assert!(config.snippets_enabled(false));
        config.snippets = Some(false);
        assert!(!config.snippets_enabled(true));
    }

    #[test]
    fn test_invalid_types_are_rejected() {
        let json = r#"{ "diagnostics": { "debounce_ms": "soon" } }"#;
        assert!(serde_json::from_str::<ServerConfig>(json).is_err());
    }
}
