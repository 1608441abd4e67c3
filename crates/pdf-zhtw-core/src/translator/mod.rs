mod traits;
mod chat;
mod google;

pub use traits::{Translator, TranslatorInfo};
pub use chat::{ChatProfile, ChatTranslator, validate_reply};
pub use google::{GoogleTranslator, parse_google_response};

use crate::config::{BackendConfig, ServiceKind};
use crate::error::{BackendError, Result};
use reqwest::{Response, StatusCode};
use std::sync::Arc;
use tracing::warn;

/// Create a translator from configuration.
///
/// Fails upfront when the selected service needs a credential and none is
/// configured or present in the environment.
pub fn create_translator(config: &BackendConfig) -> Result<Arc<dyn Translator>> {
    config.validate()?;

    let translator: Arc<dyn Translator> = match config.service {
        ServiceKind::Google => Arc::new(GoogleTranslator::new(config.endpoint(), config.timeout_secs)?),
        ServiceKind::OpenAi | ServiceKind::LocalAi | ServiceKind::FreeGpt => {
            let profile = ChatProfile::for_service(config.service);
            let api_key = config
                .credential()
                .or_else(|| profile.placeholder_key.map(str::to_string));
            Arc::new(ChatTranslator::new(
                profile,
                config.endpoint(),
                api_key,
                config.model().unwrap_or_default(),
                config.timeout_secs,
            )?)
        }
    };

    Ok(translator)
}

/// Map a non-success HTTP response to the backend error taxonomy.
async fn check_status(response: Response) -> std::result::Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        warn!("Rate limited, retry after {:?}s", retry_after);
        return Err(BackendError::RateLimited { retry_after });
    }

    let body = response.text().await.unwrap_or_default();
    let body = truncate(&body, 200);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(BackendError::Auth(format!("HTTP {status}: {body}")));
    }

    warn!("API error: {} - {}", status, body);
    Err(BackendError::Network(format!("HTTP {status}: {body}")))
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("錯誤錯誤", 2), "錯誤...");
    }

    #[test]
    fn test_create_google_without_credential() {
        let translator = create_translator(&BackendConfig::new(ServiceKind::Google));
        assert!(translator.is_ok_and(|t| t.name() == "Google Translate"));
    }

    #[test]
    fn test_create_localai_without_credential() {
        let translator = create_translator(&BackendConfig::new(ServiceKind::LocalAi));
        assert!(translator.is_ok_and(|t| t.name() == "LocalAI"));
    }

    #[test]
    fn test_missing_credential_is_fatal() {
        let config = BackendConfig {
            api_key: None,
            ..BackendConfig::new(ServiceKind::OpenAi)
        };
        // Only meaningful when the environment does not supply a key
        if config.credential().is_none() {
            assert!(matches!(create_translator(&config), Err(Error::ConfigMissing(_))));
        }
    }
}
