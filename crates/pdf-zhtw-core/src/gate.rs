//! Per-run translation policy.
//!
//! The gate decides whether a text run needs translating, consults the
//! conversion's caches, paces and retries backend calls, and absorbs backend
//! failures by handing the original text back.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::{CacheKey, DetectionCache, TranslationCache};
use crate::config::{GateConfig, Lang};
use crate::error::BackendError;
use crate::language::LanguageClassifier;
use crate::translator::Translator;

/// Upper bound on a service-requested rate-limit wait
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);

/// How a run's text was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Empty after normalization
    NoOp,
    /// Already in the target script
    Skipped,
    /// Served from the translation cache
    Cached,
    /// Fresh backend translation
    Translated,
    /// Backend failed on every attempt; original text kept
    FailedSoft(String),
}

/// Result of one gate call
#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub translated_text: String,
    /// Language detected for the run, when classification ran
    pub source_language: Option<Lang>,
    pub cache_hit: bool,
    pub outcome: RunOutcome,
}

impl TranslationResult {
    fn unchanged(text: &str, source_language: Option<Lang>, outcome: RunOutcome) -> Self {
        Self {
            translated_text: text.to_string(),
            source_language,
            cache_hit: false,
            outcome,
        }
    }

    /// Whether the run's text should be replaced
    pub fn is_translation(&self) -> bool {
        matches!(self.outcome, RunOutcome::Cached | RunOutcome::Translated)
    }
}

/// Enforces a minimum interval between outbound calls.
pub struct Pacer {
    delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until a call is allowed, then record it.
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Orchestrates classifier, caches and backend for single text runs.
pub struct TranslationGate<'a> {
    translator: Arc<dyn Translator>,
    classifier: LanguageClassifier,
    config: GateConfig,
    pacer: Pacer,
    cache: &'a TranslationCache,
    detections: &'a DetectionCache,
}

impl<'a> TranslationGate<'a> {
    pub fn new(
        translator: Arc<dyn Translator>,
        config: GateConfig,
        call_delay: Duration,
        cache: &'a TranslationCache,
        detections: &'a DetectionCache,
    ) -> Self {
        Self {
            translator,
            classifier: LanguageClassifier::new(config.min_classify_chars),
            config,
            pacer: Pacer::new(call_delay),
            cache,
            detections,
        }
    }

    /// Translate a run using the configured skip policy.
    pub async fn translate_run(&self, text: &str) -> TranslationResult {
        self.translate_run_with(text, self.config.skip_target_script).await
    }

    /// Translate a run, leaving target-script text untouched when
    /// `skip_if_target_script` is set.
    pub async fn translate_run_with(&self, text: &str, skip_if_target_script: bool) -> TranslationResult {
        let key = CacheKey::new(text);
        if key.is_empty() {
            return TranslationResult::unchanged(text, None, RunOutcome::NoOp);
        }

        let mut detected = None;
        if skip_if_target_script {
            let lang = self.classify(&key).await;
            if LanguageClassifier::is_target_script(lang.as_ref(), key.as_str()) {
                debug!("Skipping target-script run {:?}", key.as_str());
                return TranslationResult::unchanged(text, lang, RunOutcome::Skipped);
            }
            detected = Some(lang);
        }

        let hint = if self.config.auto_detect {
            match detected {
                Some(lang) => lang,
                None => self.classify(&key).await,
            }
        } else {
            None
        };

        match self
            .cache
            .get_or_translate(&key, self.call_backend(key.as_str(), hint.as_ref()))
            .await
        {
            Ok((translated_text, cache_hit)) => {
                debug!(
                    "{} {:?} -> {:?}",
                    if cache_hit { "Cached" } else { "Translated" },
                    key.as_str(),
                    translated_text
                );
                TranslationResult {
                    translated_text,
                    source_language: hint,
                    cache_hit,
                    outcome: if cache_hit { RunOutcome::Cached } else { RunOutcome::Translated },
                }
            }
            Err(e) => {
                warn!("Keeping original text for {:?}: {}", key.as_str(), e);
                TranslationResult::unchanged(text, hint, RunOutcome::FailedSoft(e.to_string()))
            }
        }
    }

    async fn classify(&self, key: &CacheKey) -> Option<Lang> {
        self.detections
            .get_or_classify(key, |t| self.classifier.classify(t))
            .await
    }

    /// Bounded retry loop around the backend.
    async fn call_backend(&self, text: &str, hint: Option<&Lang>) -> Result<String, BackendError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            self.pacer.wait().await;
            match self.translator.translate(text, hint).await {
                Ok(translated) => return Ok(translated),
                Err(e) if attempt < max_attempts => {
                    let backoff = self.backoff_for(&e);
                    debug!(
                        "Attempt {}/{} failed ({}), retrying in {:?}",
                        attempt, max_attempts, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn backoff_for(&self, error: &BackendError) -> Duration {
        let base = Duration::from_millis(self.config.retry_backoff_ms);
        error
            .retry_after()
            .map_or(base, |secs| base.max(Duration::from_secs(secs).min(MAX_RATE_LIMIT_WAIT)))
    }
}
