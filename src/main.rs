// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use instimem::app_config::{self, Config};
use instimem::credentials::{CredentialProvider, FileCredentials};
use instimem::file_utils::FileManager;
use instimem::upload::{UploadId, UploadItem, UploadSessionManager, UploadStatus};
use instimem::uploader::{MockUploader, RestUploader, Uploader};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload documents to the knowledge base
    Upload(UploadArgs),

    /// Manage the stored API token
    Auth {
        #[command(subcommand)]
        action: AuthAction,

        /// Configuration file path
        #[arg(short, long, default_value = "conf.json")]
        config_path: String,
    },

    /// Generate shell completions for instimem
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum AuthAction {
    /// Store a token for later uploads
    SetToken {
        /// Bearer token issued by the API
        token: String,
    },
    /// Forget the stored token
    Clear,
}

#[derive(Parser, Debug)]
struct UploadArgs {
    /// Files or directories to upload
    #[arg(value_name = "PATHS", required = true)]
    paths: Vec<PathBuf>,

    /// Document API base URL
    #[arg(long, env = "INSTIMEM_API_URL")]
    api_url: Option<String>,

    /// Bearer token for this run (not stored)
    #[arg(long)]
    token: Option<String>,

    /// Use the in-process demo uploader
    #[arg(long, conflicts_with = "live")]
    demo: bool,

    /// Upload to the real API even if the config enables demo mode
    #[arg(long)]
    live: bool,

    /// Drop completed uploads from the session before printing the summary
    #[arg(long)]
    clear_completed: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// Instimem - upload documents to your knowledge base
#[derive(Parser, Debug)]
#[command(name = "instimem")]
#[command(version)]
#[command(about = "Upload documents to the Instimem knowledge base")]
#[command(long_about = "Instimem uploads PDF, DOCX, DOC and TXT documents (up to 50 MB each) concurrently,
showing one progress bar per file.

EXAMPLES:
    instimem upload report.pdf notes.txt          # Upload two files
    instimem upload ./docs                        # Upload every supported file in a directory
    instimem upload --live --token XYZ plan.docx  # Upload to the API with a one-off token
    instimem auth set-token XYZ                   # Store a token for later runs
    instimem completions bash > instimem.bash     # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created. Demo mode is on by default; pass --live or set
    \"demo_mode\": false to talk to the API.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation, filtered by the global max level
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and tag for level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "ERROR"),
            Level::Warn => ("1;33", "WARN "),
            Level::Info => ("1;32", "INFO "),
            Level::Debug => ("1;36", "DEBUG"),
            Level::Trace => ("1;35", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, tag) = Self::style_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "\x1B[{}m{} {} {}\x1B[0m", color, now, tag, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "instimem", &mut std::io::stdout());
            Ok(())
        }
        Commands::Auth { action, config_path } => run_auth(action, &config_path),
        Commands::Upload(args) => run_upload(args).await,
    }
}

fn run_auth(action: AuthAction, config_path: &str) -> Result<()> {
    let config = Config::load_or_create(config_path)?;
    let path = config
        .token_file()
        .ok_or_else(|| anyhow!("No token file configured and no config directory available"))?;
    let credentials = FileCredentials::new(path);

    match action {
        AuthAction::SetToken { token } => {
            credentials.store(&token)?;
            info!("Token stored in {:?}", credentials.path());
        }
        AuthAction::Clear => {
            credentials.clear();
            info!("Token removed");
        }
    }
    Ok(())
}

async fn run_upload(options: UploadArgs) -> Result<()> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&options.config_path)?;

    // Override config with CLI options if provided
    if let Some(api_url) = &options.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(token) = &options.token {
        config.auth.token = token.clone();
    }
    if options.demo {
        config.demo_mode = true;
    } else if options.live {
        config.demo_mode = false;
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    let uploader: Arc<dyn Uploader> = if config.demo_mode {
        info!("Demo mode: uploads are simulated locally");
        Arc::new(MockUploader::working(config.upload.demo_delay_ms))
    } else {
        let credentials = config.credentials();
        if credentials.token().is_none() {
            warn!("No API token configured; uploading anonymously");
        }
        Arc::new(RestUploader::from_config(&config, credentials))
    };

    let mut candidates = Vec::new();
    for path in FileManager::collect_files(&options.paths)? {
        match FileManager::load_source_file(&path).await {
            Ok(file) => candidates.push(file),
            Err(e) => error!("Skipping {:?}: {:#}", path, e),
        }
    }

    let manager = UploadSessionManager::new(uploader, config.session_options());
    let mut events = manager.subscribe();
    let ids = manager.submit_files(candidates);
    if ids.is_empty() {
        warn!("Nothing to upload: supported documents are PDF, DOCX, DOC and TXT up to 50 MB");
        return Ok(());
    }

    let mut view = ProgressView::new();
    for item in manager.items() {
        view.sync(&item);
    }

    while !manager.is_settled() {
        match events.recv().await {
            Ok(event) => {
                for id in event.ids() {
                    if let Some(item) = manager.get(id) {
                        view.sync(&item);
                    }
                }
            }
            Err(RecvError::Lagged(_)) => view.sync_all(&manager.items()),
            Err(RecvError::Closed) => break,
        }
    }
    // the last events may have landed after the settled check
    view.sync_all(&manager.items());

    let summary = manager.summary();
    for item in manager.active_items() {
        if let Some(detail) = item.error_detail() {
            error!("{}: {}", item.source_file().name(), detail);
        }
    }
    info!(
        "Uploaded {} of {} file(s), {} failed",
        summary.complete,
        summary.total(),
        summary.failed
    );

    if options.clear_completed {
        let cleared = manager.clear_completed();
        info!("Cleared {} completed upload(s), {} remaining", cleared, manager.len());
    }

    if summary.failed > 0 {
        return Err(anyhow!("{} of {} upload(s) failed", summary.failed, summary.total()));
    }
    Ok(())
}

/// One progress bar per upload item
struct ProgressView {
    multi: MultiProgress,
    bars: HashMap<UploadId, ProgressBar>,
}

impl ProgressView {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:>4} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░")
    }

    fn bar_for(&mut self, item: &UploadItem) -> ProgressBar {
        let multi = &self.multi;
        self.bars
            .entry(item.id())
            .or_insert_with(|| {
                let file = item.source_file();
                let bar = multi.add(ProgressBar::new(100));
                bar.set_style(Self::style());
                bar.set_prefix(FileManager::document_label(file.name()));
                bar.set_message(format!("{} ({})", file.name(), FileManager::format_size(file.size())));
                bar
            })
            .clone()
    }

    fn sync(&mut self, item: &UploadItem) {
        let bar = self.bar_for(item);
        if bar.is_finished() {
            return;
        }
        let name = item.source_file().name();
        match item.status() {
            UploadStatus::Pending => bar.set_message(format!("{} - Pending", name)),
            UploadStatus::Uploading => {
                bar.set_position(item.progress().round().min(100.0) as u64);
                bar.set_message(format!("{} - Uploading and processing...", name));
            }
            UploadStatus::Complete => {
                bar.set_position(100);
                bar.finish_with_message(format!("{} - done", name));
            }
            UploadStatus::Error => {
                let detail = item.error_detail().unwrap_or("Upload failed");
                bar.abandon_with_message(format!("{} - {}", name, detail));
            }
        }
    }

    fn sync_all(&mut self, items: &[UploadItem]) {
        for item in items {
            self.sync(item);
        }
    }
}
