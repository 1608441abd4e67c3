//! PDF to Traditional Chinese Translator Core Library
//!
//! This library rewrites the text of PDF documents in Traditional Chinese:
//! - Text run extraction from page content streams
//! - Language classification and per-run skip rules
//! - Translation via Google or OpenAI-compatible chat APIs
//! - Caching (memory, optionally disk)
//! - In-place repainting with shrink-to-fit and CJK font substitution

pub mod cache;
pub mod config;
pub mod error;
pub mod gate;
pub mod language;
pub mod pdf;
pub mod progress;
pub mod translator;
pub mod util;

pub use cache::{CacheKey, DetectionCache, TranslationCache};
pub use config::{
    AppConfig, BackendConfig, CacheConfig, DEFAULT_OUTPUT_SUFFIX, GateConfig, Lang, LayoutConfig, ServiceKind,
    TARGET_LANG,
};
pub use error::{BackendError, DocumentErrorKind, Error, Result};
pub use gate::{RunOutcome, TranslationGate, TranslationResult};
pub use language::LanguageClassifier;
pub use pdf::{BoundingBox, PdfDocument, TextRun};
pub use progress::{ProgressCallback, ProgressEvent, ProgressKind};
pub use translator::{Translator, create_translator};
pub use util::clear_translation_cache;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pdf::{PageIndex, PageReport, PageRewriter};

/// Outcome of a finished conversion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub output_path: PathBuf,
    pub pages: usize,
    /// Text runs offered for translation
    pub runs: usize,
    pub translated: usize,
    pub skipped: usize,
    pub cached: usize,
    pub failed_soft: usize,
}

impl ConversionSummary {
    fn absorb(&mut self, report: &PageReport) {
        self.runs += report.runs;
        self.translated += report.translated;
        self.skipped += report.skipped;
        self.cached += report.cached;
        self.failed_soft += report.failed_soft;
    }
}

/// High-level document translator that combines all components
pub struct DocumentTranslator {
    translator: Arc<dyn Translator>,
    config: AppConfig,
    progress: Option<ProgressCallback>,
}

impl DocumentTranslator {
    /// Create a translator for the configured backend.
    ///
    /// Fails before any document is touched when the configuration is
    /// invalid or a required credential is missing.
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let translator = create_translator(&config.backend)?;
        Ok(Self {
            translator,
            config,
            progress: None,
        })
    }

    /// Create with a custom translator
    pub fn with_translator(translator: Arc<dyn Translator>, config: AppConfig) -> Self {
        Self {
            translator,
            config,
            progress: None,
        }
    }

    /// Receive a [`ProgressEvent`] per page start, page end and warning.
    #[must_use]
    pub fn on_progress(mut self, callback: impl Fn(&ProgressEvent) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn translator_info(&self) -> translator::TranslatorInfo {
        self.translator.info()
    }

    /// Where output goes when no path is given: `<stem><suffix>.pdf` next to the input.
    pub fn default_output_path(&self, input: &Path) -> PathBuf {
        default_output_path(input, &self.config.output_suffix)
    }

    fn emit(&self, page_index: usize, page_count: usize, kind: ProgressKind, message: String) {
        if let Some(ref callback) = self.progress {
            callback(&ProgressEvent::new(page_index, page_count, kind, message));
        }
    }

    /// Translate every page of `input` and write the result.
    ///
    /// Caches live for this call only (unless disk persistence is
    /// configured). Pages are processed in order and the output is written
    /// once, at the end; a cancelled or failed conversion writes nothing.
    pub async fn translate_document(
        &self,
        input: &Path,
        output: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<ConversionSummary> {
        let output_path = output.map_or_else(|| self.default_output_path(input), Path::to_path_buf);
        if same_file(input, &output_path) {
            return Err(Error::DocumentWriteFailed(format!(
                "output {} would overwrite the input",
                output_path.display()
            )));
        }

        let mut document = PdfDocument::open(input)?;
        let page_count = document.page_count();
        info!(
            "Translating {} ({} pages) with {}",
            input.display(),
            page_count,
            self.translator.name()
        );

        let cache = TranslationCache::new(&self.config.cache, self.config.backend.identity())?;
        let detections = DetectionCache::new();
        let gate = TranslationGate::new(
            Arc::clone(&self.translator),
            self.config.gate.clone(),
            Duration::from_millis(self.config.backend.call_delay_ms),
            &cache,
            &detections,
        );
        let mut rewriter = PageRewriter::new(&self.config.layout)?;

        let mut summary = ConversionSummary {
            output_path: output_path.clone(),
            pages: page_count,
            ..ConversionSummary::default()
        };

        for page_index in 0..page_count {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let page = PageIndex::try_from_page_num(page_index, page_count)?;
            let page_id = document.page_id(page)?;
            self.emit(
                page_index,
                page_count,
                ProgressKind::PageStarted,
                format!("Translating page {page}/{page_count}"),
            );

            match rewriter
                .rewrite_page(document.inner_mut(), page_id, page.as_usize() + 1, &gate, cancel)
                .await
            {
                Ok(report) => {
                    for warning in &report.warnings {
                        self.emit(page_index, page_count, ProgressKind::Warning, warning.clone());
                    }
                    summary.absorb(&report);
                }
                Err(e @ Error::ContentStream { .. }) => {
                    warn!("{}; page left unchanged", e);
                    self.emit(
                        page_index,
                        page_count,
                        ProgressKind::Warning,
                        format!("{e}; page left unchanged"),
                    );
                }
                Err(e) => return Err(e),
            }

            self.emit(
                page_index,
                page_count,
                ProgressKind::PageFinished,
                format!("Finished page {page}/{page_count}"),
            );
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        rewriter.finish(document.inner_mut());
        document.save_atomic(&output_path)?;

        info!(
            "Wrote {}: {} runs, {} translated, {} cached, {} skipped, {} failed",
            output_path.display(),
            summary.runs,
            summary.translated,
            summary.cached,
            summary.skipped,
            summary.failed_soft
        );
        Ok(summary)
    }
}

/// `<stem><suffix>.pdf` in the input's directory
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    input.with_file_name(format!("{stem}{suffix}.pdf"))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Translate one document with a backend built from `config`.
pub async fn translate_document(input: &Path, output: Option<&Path>, config: AppConfig) -> Result<ConversionSummary> {
    DocumentTranslator::new(config)?
        .translate_document(input, output, &CancellationToken::new())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.output_suffix, "_zh-TW");
        assert_eq!(config.backend.service, ServiceKind::FreeGpt);
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/docs/report.pdf"), "_zh-TW"),
            PathBuf::from("/docs/report_zh-TW.pdf")
        );
        assert_eq!(
            default_output_path(Path::new("paper.PDF"), "-tw"),
            PathBuf::from("paper-tw.pdf")
        );
    }

    #[test]
    fn test_same_file_without_existing_output() {
        assert!(same_file(Path::new("a.pdf"), Path::new("a.pdf")));
        assert!(!same_file(Path::new("a.pdf"), Path::new("a_zh-TW.pdf")));
    }
}
