use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{Lang, ServiceKind};
use crate::error::{BackendError, Error, Result};
use super::traits::{Translator, TranslatorInfo};

const SYSTEM_PROMPT: &str = "You are a professional translator. Translate the text the user sends \
into Traditional Chinese as used in Taiwan, keeping technical accuracy and formatting. \
Reply with the translation only: no explanations, notes, or quotation marks.";

/// Fragments of the instruction that must not appear in a translation
const INSTRUCTION_MARKERS: &[&str] = &[
    "professional translator",
    "translate the text",
    "translation only",
    "traditional chinese as used",
];

/// Openers of a conversational reply rather than a bare translation
const PREAMBLES: &[&str] = &[
    "sure",
    "here is",
    "here's",
    "certainly",
    "of course",
    "translation:",
];

/// A reply labelling itself as a translation, e.g. `以下是翻譯：…`
fn has_translation_label(reply: &str, source: &str) -> bool {
    match reply.split_once(['：', ':']) {
        Some((head, rest)) => {
            head.contains("翻譯") && !rest.trim().is_empty() && !source.contains([':', '：'])
        }
        None => false,
    }
}

/// Per-service flavour of an OpenAI-compatible chat endpoint
#[derive(Debug, Clone, Copy)]
pub struct ChatProfile {
    pub name: &'static str,
    /// Sent when no credential is configured
    pub placeholder_key: Option<&'static str>,
}

impl ChatProfile {
    pub const fn for_service(service: ServiceKind) -> Self {
        match service {
            ServiceKind::LocalAi => Self {
                name: "LocalAI",
                placeholder_key: Some("not-needed"),
            },
            ServiceKind::FreeGpt => Self {
                name: "Free GPT",
                placeholder_key: None,
            },
            ServiceKind::OpenAi | ServiceKind::Google => Self {
                name: "OpenAI",
                placeholder_key: None,
            },
        }
    }
}

/// OpenAI-compatible chat-completion translator.
/// Works with: OpenAI, LocalAI, llama.cpp server, Ollama, free-tier proxies.
pub struct ChatTranslator {
    client: Client,
    profile: ChatProfile,
    /// Base URL for the API (e.g., "http://localhost:8080/v1")
    pub api_base: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatTranslator {
    pub fn new(
        profile: ChatProfile,
        api_base: String,
        api_key: Option<String>,
        model: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::ConfigInvalid {
                field: "backend".to_string(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            profile,
            api_base,
            api_key,
            model,
        })
    }

    fn build_request(&self, text: &str, source: Option<&Lang>) -> ChatRequest {
        let system = match source.map(language_name) {
            Some(name) => format!("{SYSTEM_PROMPT} The source text is in {name}."),
            None => SYSTEM_PROMPT.to_string(),
        };

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system,
                },
                Message {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            temperature: Some(0.3), // Lower temperature for more consistent translations
        }
    }
}

#[async_trait]
impl Translator for ChatTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo { name: self.profile.name }
    }

    async fn translate(&self, text: &str, source: Option<&Lang>) -> std::result::Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let request = self.build_request(text, source);
        debug!("{} request to {} ({} chars)", self.profile.name, url, text.chars().count());

        let mut req = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = super::check_status(req.send().await?).await?;
        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse response: {}", e);
            BackendError::InvalidResponse(e.to_string())
        })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::InvalidResponse("No choices in response".to_string()))?;

        validate_reply(&content, text)
    }
}

/// Accept a chat reply only if it looks like a bare translation.
///
/// Wrapping quotes the source did not have are removed. Empty replies,
/// replies repeating the instruction and conversational openers are
/// rejected.
pub fn validate_reply(reply: &str, source: &str) -> std::result::Result<String, BackendError> {
    let mut text = reply.trim();
    for (open, close) in [('"', '"'), ('“', '”'), ('「', '」'), ('\'', '\'')] {
        let source_wrapped = source.trim_start().starts_with(open);
        if !source_wrapped
            && text.chars().count() >= 2
            && text.starts_with(open)
            && text.ends_with(close)
        {
            text = text[open.len_utf8()..text.len() - close.len_utf8()].trim();
        }
    }

    if text.is_empty() {
        return Err(BackendError::InvalidResponse("empty reply".to_string()));
    }

    let lower = text.to_lowercase();
    let source_lower = source.to_lowercase();
    if INSTRUCTION_MARKERS
        .iter()
        .any(|m| lower.contains(m) && !source_lower.contains(m))
    {
        return Err(BackendError::InvalidResponse("reply echoes the instruction".to_string()));
    }
    if PREAMBLES
        .iter()
        .any(|p| lower.starts_with(p) && !source_lower.starts_with(p))
        || has_translation_label(text, source)
    {
        return Err(BackendError::InvalidResponse(format!(
            "conversational reply: {}",
            text.chars().take(40).collect::<String>()
        )));
    }

    Ok(text.to_string())
}

/// Convert language code to human-readable name for prompts
fn language_name(lang: &Lang) -> &'static str {
    match lang.as_str() {
        "en" => "English",
        "zh" | "zh-CN" => "Simplified Chinese",
        "zh-TW" => "Traditional Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "nl" => "Dutch",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "uk" => "Ukrainian",
        "pl" => "Polish",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "tr" => "Turkish",
        // For unknown languages, the LLM should still understand most ISO codes
        _ => "the language it is written in",
    }
}
