use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Language codes following ISO 639-1 with regional variants
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(pub String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this tag names any Chinese variant.
    pub fn is_chinese(&self) -> bool {
        let code = self.0.to_ascii_lowercase();
        code == "zh" || code.starts_with("zh-") || code == "cmn"
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Target language code used in every request.
pub const TARGET_LANG: &str = "zh-TW";

/// Default output filename suffix
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_zh-TW";

/// Supported translation services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Statistical machine translation, no credential
    Google,
    /// Commercial chat-completion API
    #[serde(alias = "openai-compatible")]
    OpenAi,
    /// Self-hosted OpenAI-compatible server
    #[serde(alias = "localai-compatible")]
    LocalAi,
    /// Free-tier chat-completion proxy
    #[default]
    #[serde(alias = "free-tier-chat")]
    FreeGpt,
}

impl ServiceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::OpenAi => "openai",
            Self::LocalAi => "localai",
            Self::FreeGpt => "freegpt",
        }
    }

    /// Endpoint used when none is configured.
    pub const fn default_endpoint(self) -> &'static str {
        match self {
            Self::Google => "https://translate.googleapis.com/translate_a/single",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::LocalAi => "http://localhost:8080/v1",
            Self::FreeGpt => "https://free.v36.cm/v1/",
        }
    }

    /// Model used when none is configured. Google has no model.
    pub const fn default_model(self) -> Option<&'static str> {
        match self {
            Self::Google => None,
            Self::OpenAi | Self::LocalAi => Some("gpt-3.5-turbo"),
            Self::FreeGpt => Some("gpt-4o-mini"),
        }
    }

    /// Environment variable consulted when no credential is given.
    pub const fn credential_env(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::FreeGpt => Some("FREEGPT_API_KEY"),
            Self::Google | Self::LocalAi => None,
        }
    }

    pub const fn requires_credential(self) -> bool {
        matches!(self, Self::OpenAi | Self::FreeGpt)
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            "localai" | "localai-compatible" => Ok(Self::LocalAi),
            "freegpt" | "free-tier-chat" => Ok(Self::FreeGpt),
            other => Err(Error::ConfigInvalid {
                field: "backend.service".to_string(),
                reason: format!("unknown service '{other}'"),
            }),
        }
    }
}

/// Translation backend configuration.
///
/// Immutable for the duration of a conversion. Unset fields fall back to the
/// per-service defaults of [`ServiceKind`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub service: ServiceKind,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Minimum delay between outbound calls, in milliseconds
    #[serde(default = "default_call_delay_ms")]
    pub call_delay_ms: u64,
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_call_delay_ms() -> u64 {
    100
}

const fn default_timeout_secs() -> u64 {
    60
}

impl BackendConfig {
    /// Create a config for a service with all other fields defaulted
    pub fn new(service: ServiceKind) -> Self {
        Self {
            service,
            ..Self::default()
        }
    }

    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| self.service.default_endpoint().to_string())
    }

    pub fn model(&self) -> Option<String> {
        self.model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.service.default_model().map(str::to_string))
    }

    /// Resolve the credential: explicit value first, then the service's
    /// environment variable.
    pub fn credential(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.service
                    .credential_env()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }

    /// Check that a credential is available where one is required.
    pub fn validate(&self) -> Result<()> {
        if self.service.requires_credential() && self.credential().is_none() {
            let hint = self
                .service
                .credential_env()
                .map(|var| format!(" (pass --api-key or set {var})"))
                .unwrap_or_default();
            return Err(Error::ConfigMissing(format!(
                "api_key for service '{}'{hint}",
                self.service
            )));
        }
        Ok(())
    }

    /// Identity used to namespace persisted cache entries.
    pub fn identity(&self) -> String {
        format!(
            "{}|{}|{}",
            self.service,
            self.endpoint(),
            self.model().unwrap_or_default()
        )
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            service: ServiceKind::default(),
            endpoint: None,
            api_key: None,
            model: None,
            call_delay_ms: default_call_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Translation gate policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Detect the source language and pass it to the backend as a hint
    #[serde(default = "default_true")]
    pub auto_detect: bool,

    /// Leave runs that are already Traditional Chinese untouched
    #[serde(default = "default_true")]
    pub skip_target_script: bool,

    /// Runs shorter than this many visible characters are never classified
    #[serde(default = "default_min_classify_chars")]
    pub min_classify_chars: usize,

    /// Total attempts per run (first call plus retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before a retry in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

const fn default_true() -> bool {
    true
}

const fn default_min_classify_chars() -> usize {
    2
}

const fn default_max_attempts() -> u32 {
    2
}

const fn default_retry_backoff_ms() -> u64 {
    500
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            auto_detect: true,
            skip_target_script: true,
            min_classify_chars: default_min_classify_chars(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Replacement text layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Smallest font size (points) shrink-to-fit may reach before overflowing
    #[serde(default = "default_min_font_size")]
    pub min_font_size: f32,

    /// TrueType/OpenType font with CJK coverage to embed instead of the
    /// predefined Traditional Chinese fonts
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

const fn default_min_font_size() -> f32 {
    4.0
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_font_size: default_min_font_size(),
            font_path: None,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Persist translations to disk across conversions
    #[serde(default)]
    pub persist: bool,

    /// Disk cache directory (defaults to $XDG_CACHE_HOME/pdf-zhtw)
    #[serde(default)]
    pub disk_path: Option<PathBuf>,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Translator backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Suffix appended to the input stem to name the output
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    #[serde(default)]
    pub gate: GateConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_output_suffix() -> String {
    DEFAULT_OUTPUT_SUFFIX.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            output_suffix: default_output_suffix(),
            gate: GateConfig::default(),
            layout: LayoutConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))
    }

    /// Load from default locations (~/.config/pdf-zhtw/config.toml, ./config.toml)
    pub fn load() -> Self {
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pdf-zhtw").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    /// Reject values no conversion can work with.
    pub fn validate(&self) -> Result<()> {
        if self.gate.max_attempts == 0 {
            return Err(Error::ConfigInvalid {
                field: "gate.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.layout.min_font_size > 0.0) {
            return Err(Error::ConfigInvalid {
                field: "layout.min_font_size".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        self.backend.validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.output_suffix, "_zh-TW");
        assert_eq!(config.backend.call_delay_ms, 100);
        assert_eq!(config.gate.max_attempts, 2);
        assert_eq!(config.gate.min_classify_chars, 2);
        assert!(!config.cache.persist);
    }

    #[test]
    fn test_service_defaults() {
        let cfg = BackendConfig::new(ServiceKind::FreeGpt);
        assert_eq!(cfg.endpoint(), "https://free.v36.cm/v1/");
        assert_eq!(cfg.model().as_deref(), Some("gpt-4o-mini"));

        let cfg = BackendConfig::new(ServiceKind::Google);
        assert_eq!(cfg.model(), None);
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let cfg = BackendConfig {
            endpoint: Some("http://box:9000/v1".into()),
            model: Some("mistral-7b-instruct".into()),
            ..BackendConfig::new(ServiceKind::LocalAi)
        };
        assert_eq!(cfg.endpoint(), "http://box:9000/v1");
        assert_eq!(cfg.model().as_deref(), Some("mistral-7b-instruct"));
    }

    #[test]
    fn test_localai_needs_no_credential() {
        assert!(BackendConfig::new(ServiceKind::LocalAi).validate().is_ok());
        assert!(BackendConfig::new(ServiceKind::Google).validate().is_ok());
    }

    #[test]
    fn test_explicit_credential_satisfies_validation() {
        let cfg = BackendConfig {
            api_key: Some("sk-test".into()),
            ..BackendConfig::new(ServiceKind::OpenAi)
        };
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.credential().as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_parse_service_names() {
        assert_eq!("google".parse::<ServiceKind>().unwrap(), ServiceKind::Google);
        assert_eq!("openai-compatible".parse::<ServiceKind>().unwrap(), ServiceKind::OpenAi);
        assert!("babelfish".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = AppConfig::from_toml(
            r#"
            output_suffix = "_tw"

            [backend]
            service = "localai"
            call_delay_ms = 250

            [gate]
            auto_detect = false
            "#,
        )
        .unwrap();
        assert_eq!(config.output_suffix, "_tw");
        assert_eq!(config.backend.service, ServiceKind::LocalAi);
        assert_eq!(config.backend.call_delay_ms, 250);
        assert!(!config.gate.auto_detect);
        assert!(config.gate.skip_target_script);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = AppConfig::default();
        config.backend.service = ServiceKind::Google;
        config.gate.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lang_is_chinese() {
        assert!(Lang::new("zh").is_chinese());
        assert!(Lang::new(TARGET_LANG).is_chinese());
        assert!(!Lang::new("en").is_chinese());
    }
}
