//! threatdoc - batch ingestion of threat-intelligence documents.
//!
//! Processes PDF, Word and Excel files (plus anything provided by plugin
//! libraries) into text with a TLP designation, and prints the results as JSON
//! or a short text summary.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use threatdoc::plugins::{PluginContext, PluginHost};
use threatdoc::{CancellationToken, Document, PipelineConfig, ProcessingOptions, TlpDesignation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "threatdoc",
    version,
    about = "Extract text, metadata and TLP designations from threat-intel documents",
    after_help = "EXAMPLES:\n  \
                  threatdoc process advisory.pdf indicators.xlsx\n  \
                  threatdoc process --format json --ocr scans/*.pdf\n  \
                  threatdoc classify notes.txt\n  \
                  threatdoc formats --plugins ./plugins"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process one or more documents
    Process(ProcessArgs),

    /// Report the TLP marker found in a plain-text file
    Classify {
        file: PathBuf,
    },

    /// List the file extensions that have a registered processor
    Formats {
        /// Load plugin libraries from this directory first
        #[arg(long)]
        plugins: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ProcessArgs {
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Pipeline config file (.toml, .yaml, .json); threatdoc.toml is discovered otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run OCR on PDFs without embedded text
    #[arg(long)]
    ocr: bool,

    #[arg(long)]
    ocr_language: Option<String>,

    /// Keep bold/italic markers and render tables with pipes
    #[arg(long)]
    preserve_formatting: bool,

    /// Maximum extracted characters per document
    #[arg(long)]
    max_chars: Option<usize>,

    #[arg(long)]
    max_size_mb: Option<u64>,

    /// Password tried once on protected documents
    #[arg(long)]
    password: Option<String>,

    /// Complete protected documents with empty text instead of failing them
    #[arg(long)]
    skip_protected: bool,

    /// Load plugin libraries from this directory
    #[arg(long)]
    plugins: Option<PathBuf>,

    /// Documents processed concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "threatdoc=warn",
        1 => "threatdoc=info",
        _ => "threatdoc=debug",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            PipelineConfig::from_file(path).with_context(|| format!("Failed to load config {}", path.display()))
        }
        None => Ok(PipelineConfig::discover()?.unwrap_or_default()),
    }
}

impl ProcessArgs {
    /// Config-file options with command-line overrides applied.
    fn options(&self, config: &PipelineConfig) -> ProcessingOptions {
        let mut options = config.processing.clone();
        if self.ocr {
            options.enable_ocr = true;
        }
        if let Some(language) = &self.ocr_language {
            options.ocr_language = language.clone();
        }
        if self.preserve_formatting {
            options.preserve_formatting = true;
        }
        if let Some(max_chars) = self.max_chars {
            options.max_text_content_length = max_chars;
        }
        if let Some(max_size_mb) = self.max_size_mb {
            options.max_file_size_mb = max_size_mb;
        }
        if let Some(password) = &self.password {
            options.default_password = Some(password.clone());
        }
        if self.skip_protected {
            options.skip_password_protected = true;
        }
        options
    }
}

/// Load plugins into the global registry, after the built-in processors so those
/// keep precedence on equal priority.
async fn load_plugins(dir: Option<&Path>, config: &PipelineConfig) -> Result<Option<PluginHost>> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None if config.plugins.enabled => match &config.plugins.directory {
            Some(dir) => dir.clone(),
            None => return Ok(None),
        },
        None => return Ok(None),
    };

    let ocr_backend = threatdoc::processors::initialize_with(&config.ocr)?;

    let host = PluginHost::with_native_loader(PluginContext {
        options: config.processing.clone(),
        plugin_directory: Some(dir.clone()),
        ocr_backend,
        ..Default::default()
    });
    let report = host
        .load_directory(&dir)
        .await
        .with_context(|| format!("Failed to read plugin directory {}", dir.display()))?;

    for failure in &report.failures {
        tracing::warn!(library = %failure.path.display(), "Plugin library skipped: {}", failure.error);
    }
    for plugin in &report.loaded {
        tracing::info!(plugin = %plugin.name, version = %plugin.version, "Plugin loaded");
    }

    Ok(Some(host))
}

fn print_text(documents: &[Document]) {
    for doc in documents {
        println!(
            "{}\t{:?}\t{}\tpages={}\tchars={}",
            doc.path.display(),
            doc.status,
            doc.tlp,
            doc.page_count,
            doc.text_length
        );
        if let Some(message) = &doc.error_message {
            println!("  error: {}", message);
        }
        for warning in &doc.warnings {
            println!("  warning: {}", warning.message);
        }
    }
}

async fn run_process(args: ProcessArgs) -> Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let options = args.options(&config);
    options.validate()?;
    threatdoc::processors::initialize_with(&config.ocr)?;

    let host = load_plugins(args.plugins.as_deref(), &config).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling in-flight documents");
            on_interrupt.cancel();
        }
    });

    let concurrency = args.concurrency.or(config.max_concurrent_documents);
    let documents = threatdoc::batch_process_files(args.paths.clone(), &options, concurrency, &cancel).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&documents)?),
        OutputFormat::Text => print_text(&documents),
    }

    if let Some(host) = host {
        host.shutdown().await?;
    }

    let failed = documents.iter().filter(|doc| doc.is_failed()).count();
    if failed > 0 {
        tracing::warn!(failed, total = documents.len(), "Some documents failed");
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_classify(file: &Path) -> Result<ExitCode> {
    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    match threatdoc::tlp::classify(&text) {
        Some(tlp) => println!("{}", tlp),
        None => println!("{} (no marker found)", TlpDesignation::Amber),
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_formats(plugins: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(None)?;
    threatdoc::processors::initialize_with(&config.ocr)?;
    let host = load_plugins(plugins, &config).await?;

    for extension in threatdoc::plugins::supported_extensions()? {
        match threatdoc::mime_type_for_extension(&extension) {
            Some(mime) => println!(".{}\t{}", extension, mime),
            None => println!(".{}", extension),
        }
    }

    if let Some(host) = host {
        host.shutdown().await?;
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Process(args) => run_process(args).await,
        Commands::Classify { file } => run_classify(&file),
        Commands::Formats { plugins } => run_formats(plugins.as_deref()).await,
    }
}
