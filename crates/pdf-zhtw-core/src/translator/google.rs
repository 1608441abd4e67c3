use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::{Lang, TARGET_LANG};
use crate::error::{BackendError, Error, Result};
use super::traits::{Translator, TranslatorInfo};

/// Public Google Translate endpoint used by browser widgets.
///
/// Needs no credential but is rate limited without notice, so callers
/// should expect `RateLimited` and network failures.
pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(endpoint: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::ConfigInvalid {
                field: "backend".to_string(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client, endpoint })
    }

    fn request_url(&self, text: &str, source: Option<&Lang>) -> String {
        let sl = source.map_or("auto", Lang::as_str);
        format!(
            "{}?client=gtx&sl={}&tl={}&dt=t&q={}",
            self.endpoint,
            urlencoding::encode(sl),
            urlencoding::encode(TARGET_LANG),
            urlencoding::encode(text)
        )
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo { name: "Google Translate" }
    }

    async fn translate(&self, text: &str, source: Option<&Lang>) -> std::result::Result<String, BackendError> {
        let url = self.request_url(text, source);
        debug!("Google translate request ({} chars)", text.chars().count());

        let response = self.client.get(&url).send().await?;
        let response = super::check_status(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        parse_google_response(&body)
    }
}

/// Extract the translation from a `translate_a/single` reply.
///
/// The reply is a nested array whose first element lists sentence segments
/// as `[translated, original, ...]`; the translation is their concatenation.
pub fn parse_google_response(body: &Value) -> std::result::Result<String, BackendError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| BackendError::InvalidResponse("missing translation segments".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(Value::as_str))
        .collect();

    if translated.trim().is_empty() {
        return Err(BackendError::InvalidResponse("empty translation".to_string()));
    }
    Ok(translated)
}
