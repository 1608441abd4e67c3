//! pdf-zhtw - translate the text of a PDF into Traditional Chinese.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_zhtw_core::{AppConfig, DocumentTranslator, ProgressKind, ServiceKind, clear_translation_cache};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ServiceOption {
    Google,
    #[value(name = "openai")]
    OpenAi,
    #[value(name = "localai")]
    LocalAi,
    #[value(name = "freegpt")]
    FreeGpt,
}

impl From<ServiceOption> for ServiceKind {
    fn from(opt: ServiceOption) -> Self {
        match opt {
            ServiceOption::Google => Self::Google,
            ServiceOption::OpenAi => Self::OpenAi,
            ServiceOption::LocalAi => Self::LocalAi,
            ServiceOption::FreeGpt => Self::FreeGpt,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pdf-zhtw")]
#[command(author, version, about = "Translate PDF text into Traditional Chinese in place", long_about = None)]
struct Args {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Output PDF file (default: <input stem><suffix>.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Translation service
    #[arg(long, value_enum)]
    service: Option<ServiceOption>,

    /// API key for chat-completion services
    #[arg(long, env = "PDF_ZHTW_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the translation service
    #[arg(long)]
    base_url: Option<String>,

    /// Model name for chat-completion services
    #[arg(long)]
    model: Option<String>,

    /// Do not detect the source language; let the service guess
    #[arg(long)]
    no_auto_detect: bool,

    /// Translate text inside images (not implemented)
    #[arg(long)]
    translate_images: bool,

    /// Suffix appended to the input stem for the default output name
    #[arg(long)]
    suffix: Option<String>,

    /// Delay between translation calls, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// TrueType/OpenType font with CJK coverage to embed
    #[arg(long)]
    font: Option<PathBuf>,

    /// Keep translations on disk across runs
    #[arg(long)]
    persist_cache: bool,

    /// Empty the on-disk translation cache before converting
    #[arg(long)]
    clear_cache: bool,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Command-line values take precedence over the config file.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(service) = self.service {
            config.backend.service = service.into();
        }
        if let Some(ref key) = self.api_key {
            config.backend.api_key = Some(key.clone());
        }
        if let Some(ref url) = self.base_url {
            config.backend.endpoint = Some(url.clone());
        }
        if let Some(ref model) = self.model {
            config.backend.model = Some(model.clone());
        }
        if let Some(delay) = self.delay_ms {
            config.backend.call_delay_ms = delay;
        }
        if self.no_auto_detect {
            config.gate.auto_detect = false;
        }
        if let Some(ref suffix) = self.suffix {
            config.output_suffix.clone_from(suffix);
        }
        if let Some(ref font) = self.font {
            config.layout.font_path = Some(font.clone());
        }
        if self.persist_cache {
            config.cache.persist = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };
    args.apply(&mut config);

    if args.translate_images {
        warn!("--translate-images is not implemented; text inside images is left as is");
    }

    if args.clear_cache {
        let removed = clear_translation_cache(config.cache.disk_path.as_deref())
            .context("Failed to clear translation cache")?;
        info!("Cleared {} cached translations", removed);
    }

    let bar = ProgressBar::new(0);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let progress_bar = bar.clone();
    let translator = DocumentTranslator::new(config)
        .context("Failed to initialize translator")?
        .on_progress(move |event| match event.kind {
            ProgressKind::PageStarted => {
                progress_bar.set_length(event.page_count as u64);
                progress_bar.set_message(event.message.clone());
            }
            ProgressKind::PageFinished => progress_bar.inc(1),
            ProgressKind::Warning => progress_bar.println(format!("warning: {event}")),
        });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    info!(
        "Loading PDF: {} (service: {})",
        args.input.display(),
        translator.translator_info().name
    );

    let summary = translator
        .translate_document(&args.input, args.output.as_deref(), &cancel)
        .await;
    bar.finish_and_clear();
    let summary = summary.with_context(|| format!("Failed to translate {}", args.input.display()))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!(
            "Translated PDF saved to: {} ({} translated, {} cached, {} skipped, {} left untranslated)",
            summary.output_path.display(),
            summary.translated,
            summary.cached,
            summary.skipped,
            summary.failed_soft
        );
    }

    Ok(())
}
