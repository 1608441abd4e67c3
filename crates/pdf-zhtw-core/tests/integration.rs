//! Integration tests for pdf-zhtw-core
//!
//! These tests run whole conversions against PDFs built in memory:
//! - Text run extraction and in-place replacement
//! - Skip rules for text already in Traditional Chinese
//! - Cache hits within a conversion
//! - Fail-soft handling of backend errors
//! - Document error taxonomy and cancellation

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lopdf::{Document, Object, Stream, dictionary};
use pdf_zhtw_core::pdf::extract_runs;
use pdf_zhtw_core::translator::TranslatorInfo;
use pdf_zhtw_core::{
    AppConfig, BackendError, DetectionCache, DocumentErrorKind, DocumentTranslator, Error, GateConfig, Lang,
    PdfDocument, ProgressEvent, ProgressKind, RunOutcome, TextRun, TranslationCache, TranslationGate, Translator,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Mock Translator for Testing
// =============================================================================

/// Answers from a fixed table and fails for anything else. Counts calls.
struct ScriptedTranslator {
    replies: HashMap<&'static str, &'static str>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedTranslator {
    fn new(replies: &[(&'static str, &'static str)]) -> Arc<Self> {
        Arc::new(Self {
            replies: replies.iter().copied().collect(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn calls_for(&self, text: &str) -> usize {
        self.seen.lock().unwrap().iter().filter(|t| *t == text).count()
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo { name: "scripted" }
    }

    async fn translate(&self, text: &str, _source: Option<&Lang>) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(text.to_string());
        self.replies
            .get(text)
            .map(|reply| (*reply).to_string())
            .ok_or_else(|| BackendError::Network("service unreachable".to_string()))
    }
}

/// Translates everything to a fixed reply and cancels `token` on the first call.
struct CancellingTranslator {
    token: CancellationToken,
    calls: AtomicUsize,
}

#[async_trait]
impl Translator for CancellingTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo { name: "cancelling" }
    }

    async fn translate(&self, _text: &str, _source: Option<&Lang>) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        Ok("你好".to_string())
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

/// A one-page PDF drawing `content`, with Helvetica as `/F1` and the
/// predefined Ming face as `/F2`.
fn build_pdf(content: &[u8]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let helvetica = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let ming = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "MSung-Light",
        "Encoding" => "UniCNS-UCS2-H",
    });
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! {
                "F1" => helvetica,
                "F2" => ming,
            },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn write_pdf(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, build_pdf(content)).unwrap();
    path
}

fn runs_of(path: &Path) -> Vec<TextRun> {
    let document = PdfDocument::open(path).unwrap();
    extract_runs(document.inner(), document.page_ids()[0]).unwrap()
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.backend.call_delay_ms = 0;
    config.gate.retry_backoff_ms = 0;
    config
}

fn recording_translator(
    translator: Arc<ScriptedTranslator>,
    config: AppConfig,
) -> (DocumentTranslator, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let driver = DocumentTranslator::with_translator(translator, config)
        .on_progress(move |event| sink.lock().unwrap().push(event.clone()));
    (driver, events)
}

// =============================================================================
// End-to-End Scenarios
// =============================================================================

#[tokio::test]
async fn test_hello_is_replaced_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "hello.pdf", b"BT /F1 12 Tf 72 700 Td 0.2 0.4 0.6 rg (Hello) Tj ET");
    let original = runs_of(&input);
    assert_eq!(original.len(), 1);

    let mock = ScriptedTranslator::new(&[("Hello", "你好")]);
    let driver = DocumentTranslator::with_translator(mock.clone(), test_config());
    let summary = driver
        .translate_document(&input, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.output_path, dir.path().join("hello_zh-TW.pdf"));
    assert_eq!(summary.pages, 1);
    assert_eq!(summary.translated, 1);
    assert_eq!(mock.calls(), 1);

    let runs = runs_of(&summary.output_path);
    assert_eq!(runs.len(), 1);
    let (before, after) = (&original[0], &runs[0]);
    assert_eq!(after.text, "你好");
    assert!(after.color.approx_eq(&before.color));
    assert!((after.baseline_origin.x - before.baseline_origin.x).abs() < 0.01);
    assert!((after.baseline_origin.y - before.baseline_origin.y).abs() < 0.01);
    assert!((after.bbox.x0 - before.bbox.x0).abs() < 0.01);
    assert!(after.bbox.x1 <= before.bbox.x1 + 0.01);

    // The input is never modified
    assert_eq!(runs_of(&input)[0].text, "Hello");
}

#[tokio::test]
async fn test_target_script_run_never_reaches_backend() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "company.pdf", b"BT /F2 12 Tf 72 700 Td <516C53F8> Tj ET");

    let mock = ScriptedTranslator::new(&[]);
    let driver = DocumentTranslator::with_translator(mock.clone(), test_config());
    let summary = driver
        .translate_document(&input, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(mock.calls(), 0);
    assert_eq!(summary.skipped, 1);
    let runs = runs_of(&summary.output_path);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].text, "公司");
    assert_eq!(runs[0].bbox, runs_of(&input)[0].bbox);
}

#[tokio::test]
async fn test_empty_run_passes_through_without_cache_entry() {
    let cache = TranslationCache::in_memory();
    let detections = DetectionCache::new();
    let mock = ScriptedTranslator::new(&[]);
    let gate = TranslationGate::new(
        mock.clone(),
        GateConfig::default(),
        std::time::Duration::ZERO,
        &cache,
        &detections,
    );

    for text in ["", "   \n\t "] {
        let result = gate.translate_run(text).await;
        assert_eq!(result.translated_text, text);
        assert_eq!(result.outcome, RunOutcome::NoOp);
        assert!(!result.cache_hit);
    }
    assert_eq!(cache.len().await, 0);
    assert_eq!(mock.calls(), 0);

    // And an empty show-text operator on a page is left alone
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "empty.pdf", b"BT /F1 12 Tf 72 700 Td () Tj ET");
    let driver = DocumentTranslator::with_translator(mock.clone(), test_config());
    let summary = driver
        .translate_document(&input, None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.translated, 0);
    assert_eq!(mock.calls(), 0);
    assert!(summary.output_path.exists());
}

#[tokio::test]
async fn test_failing_backend_keeps_original_and_warns() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "bonjour.pdf", b"BT /F1 12 Tf 72 700 Td (Bonjour) Tj ET");

    let mock = ScriptedTranslator::new(&[]);
    let (driver, events) = recording_translator(mock.clone(), test_config());
    let summary = driver
        .translate_document(&input, None, &CancellationToken::new())
        .await
        .unwrap();

    // One retry, then fail soft
    assert_eq!(mock.calls_for("Bonjour"), 2);
    assert_eq!(summary.failed_soft, 1);
    assert!(summary.output_path.exists());

    let runs = runs_of(&summary.output_path);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].text, "Bonjour");

    let events = events.lock().unwrap();
    let warnings: Vec<_> = events.iter().filter(|e| e.kind == ProgressKind::Warning).collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("Bonjour"));
}

#[tokio::test]
async fn test_repeated_text_calls_backend_once() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(
        &dir,
        "errors.pdf",
        b"BT /F1 12 Tf 72 700 Td (Error) Tj 0 -20 Td (Error) Tj ET",
    );

    let mock = ScriptedTranslator::new(&[("Error", "錯誤")]);
    let driver = DocumentTranslator::with_translator(mock.clone(), test_config());
    let summary = driver
        .translate_document(&input, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(mock.calls(), 1);
    assert_eq!(summary.translated, 1);
    assert_eq!(summary.cached, 1);

    let runs = runs_of(&summary.output_path);
    let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, ["錯誤", "錯誤"]);
    assert!(runs[0].baseline_origin.y > runs[1].baseline_origin.y);
}

#[tokio::test]
async fn test_long_translation_shrinks_into_box() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "update.pdf", b"BT /F1 12 Tf 72 700 Td (Update) Tj ET");
    let original = runs_of(&input);

    let mock = ScriptedTranslator::new(&[("Update", "更新軟體版本")]);
    let driver = DocumentTranslator::with_translator(mock, test_config());
    let summary = driver
        .translate_document(&input, None, &CancellationToken::new())
        .await
        .unwrap();

    let runs = runs_of(&summary.output_path);
    let text: String = runs.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(text, "更新軟體版本");
    for run in &runs {
        assert!(run.font_size < 12.0);
        assert!(run.bbox.x0 >= original[0].bbox.x0 - 0.01);
        assert!(run.bbox.x1 <= original[0].bbox.x1 + 0.01);
    }
}

#[tokio::test]
async fn test_text_around_replacement_keeps_position() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(
        &dir,
        "mixed.pdf",
        b"BT /F1 12 Tf 72 700 Td (Hello) Tj 0 g (42) Tj ET BT /F2 10 Tf 72 650 Td <516C53F8> Tj ET",
    );
    let original = runs_of(&input);
    assert_eq!(original.len(), 3);

    let mock = ScriptedTranslator::new(&[("Hello", "你好")]);
    let driver = DocumentTranslator::with_translator(mock.clone(), test_config());
    let summary = driver
        .translate_document(&input, None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(mock.calls(), 1);

    let runs = runs_of(&summary.output_path);
    assert_eq!(runs.len(), 3);
    assert_eq!(runs[0].text, "你好");
    for (before, after) in original.iter().zip(&runs).skip(1) {
        assert_eq!(after.text, before.text);
        assert!((after.baseline_origin.x - before.baseline_origin.x).abs() < 0.01);
        assert!((after.baseline_origin.y - before.baseline_origin.y).abs() < 0.01);
    }
}

// =============================================================================
// Driver Behaviour
// =============================================================================

#[tokio::test]
async fn test_progress_events_per_page() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "progress.pdf", b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET");

    let mock = ScriptedTranslator::new(&[("Hello", "你好")]);
    let (driver, events) = recording_translator(mock, test_config());
    driver
        .translate_document(&input, None, &CancellationToken::new())
        .await
        .unwrap();

    let events = events.lock().unwrap();
    let kinds: Vec<ProgressKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, [ProgressKind::PageStarted, ProgressKind::PageFinished]);
    assert!(events.iter().all(|e| e.page_index == 0 && e.page_count == 1));
}

#[tokio::test]
async fn test_explicit_output_and_custom_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "report.pdf", b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET");
    let mut config = test_config();
    config.output_suffix = ".tw".to_string();

    let mock = ScriptedTranslator::new(&[("Hello", "你好")]);
    let driver = DocumentTranslator::with_translator(mock, config);
    assert_eq!(driver.default_output_path(&input), dir.path().join("report.tw.pdf"));

    let explicit = dir.path().join("elsewhere.pdf");
    let summary = driver
        .translate_document(&input, Some(&explicit), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.output_path, explicit);
    assert!(explicit.exists());
    assert!(!dir.path().join("report.tw.pdf").exists());
}

#[tokio::test]
async fn test_cancelled_conversion_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "cancel.pdf", b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET");

    let mock = ScriptedTranslator::new(&[("Hello", "你好")]);
    let driver = DocumentTranslator::with_translator(mock.clone(), test_config());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = driver.translate_document(&input, None, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(mock.calls(), 0);
    assert!(!dir.path().join("cancel_zh-TW.pdf").exists());
}

#[tokio::test]
async fn test_cancel_between_runs_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(
        &dir,
        "two_runs.pdf",
        b"BT /F1 12 Tf 72 700 Td (Hello) Tj 0 -20 Td (World) Tj ET",
    );

    let cancel = CancellationToken::new();
    let mock = Arc::new(CancellingTranslator {
        token: cancel.clone(),
        calls: AtomicUsize::new(0),
    });
    let driver = DocumentTranslator::with_translator(mock.clone(), test_config());

    let err = driver.translate_document(&input, None, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    assert!(!dir.path().join("two_runs_zh-TW.pdf").exists());
}

#[tokio::test]
async fn test_unencodable_translation_keeps_original() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "rare.pdf", b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET");

    // U+20000 lies outside the two-byte encoding of the predefined fonts
    let mock = ScriptedTranslator::new(&[("Hello", "\u{20000}")]);
    let (driver, events) = recording_translator(mock, test_config());
    let summary = driver
        .translate_document(&input, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed_soft, 1);
    assert_eq!(summary.translated, 0);
    assert!(summary.output_path.exists());

    let runs = runs_of(&summary.output_path);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].text, "Hello");

    let events = events.lock().unwrap();
    let warnings: Vec<_> = events.iter().filter(|e| e.kind == ProgressKind::Warning).collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("Hello"));
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_missing_input_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let driver = DocumentTranslator::with_translator(ScriptedTranslator::new(&[]), test_config());
    let err = driver
        .translate_document(&dir.path().join("missing.pdf"), None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.document_kind(), Some(DocumentErrorKind::Unreadable));
}

#[tokio::test]
async fn test_corrupt_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.pdf");
    std::fs::write(&input, b"%PDF-1.4\nnot really a document").unwrap();

    let driver = DocumentTranslator::with_translator(ScriptedTranslator::new(&[]), test_config());
    let err = driver
        .translate_document(&input, None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.document_kind(), Some(DocumentErrorKind::Corrupt));
    assert!(!dir.path().join("broken_zh-TW.pdf").exists());
}

#[tokio::test]
async fn test_unwritable_output_fails_after_translation() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "hello.pdf", b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET");

    let mock = ScriptedTranslator::new(&[("Hello", "你好")]);
    let driver = DocumentTranslator::with_translator(mock.clone(), test_config());
    let output = dir.path().join("no-such-dir").join("out.pdf");
    let err = driver
        .translate_document(&input, Some(&output), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.document_kind(), Some(DocumentErrorKind::WriteFailed));
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_output_over_input_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "same.pdf", b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET");
    let before = std::fs::read(&input).unwrap();

    let mock = ScriptedTranslator::new(&[("Hello", "你好")]);
    let driver = DocumentTranslator::with_translator(mock.clone(), test_config());
    let err = driver
        .translate_document(&input, Some(&input), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.document_kind(), Some(DocumentErrorKind::WriteFailed));
    assert_eq!(mock.calls(), 0);
    assert_eq!(std::fs::read(&input).unwrap(), before);
}

#[test]
fn test_missing_credential_fails_before_conversion() {
    let mut config = test_config();
    config.backend.service = pdf_zhtw_core::ServiceKind::OpenAi;
    config.backend.api_key = None;
    if std::env::var_os("OPENAI_API_KEY").is_some() {
        return;
    }
    assert!(matches!(DocumentTranslator::new(config), Err(Error::ConfigMissing(_))));
}
