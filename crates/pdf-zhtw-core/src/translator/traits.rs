use async_trait::async_trait;
use crate::config::Lang;
use crate::error::BackendError;

/// Information about a translator backend
#[derive(Debug, Clone)]
pub struct TranslatorInfo {
    /// Human-readable name
    pub name: &'static str,
}

/// Trait for translation backends.
///
/// Every backend translates into Traditional Chinese. Implementations make a
/// single attempt per call; pacing and retries belong to the caller.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Get information about this translator
    fn info(&self) -> TranslatorInfo;

    /// Get the translator name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Translate `text` into Traditional Chinese.
    ///
    /// `source` is a best-effort hint; `None` asks the service to detect the
    /// language itself.
    async fn translate(&self, text: &str, source: Option<&Lang>) -> Result<String, BackendError>;
}
