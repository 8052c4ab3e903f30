// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
// Add other lints specific to this module that you want to allow but not auto-fix

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, warn};
use std::fs::File;
use std::io::BufReader;
use std::io::Write;
use std::path::{Path, PathBuf};

use gapfill::app_config::{self, Config, TailGuard, TranslationProvider};
use gapfill::app_controller::{Controller, RunOptions};

/// Exit status of a run that stopped with records still untranslated
const EXIT_STALLED: i32 = 2;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Gemini,
    Anthropic,
    Ollama,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Gemini => TranslationProvider::Gemini,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
        }
    }
}

/// CLI Wrapper for TailGuard to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTailGuard {
    DropLast,
    DropLastIfShort,
    KeepAll,
}

impl From<CliTailGuard> for TailGuard {
    fn from(cli_guard: CliTailGuard) -> Self {
        match cli_guard {
            CliTailGuard::DropLast => TailGuard::DropLast,
            CliTailGuard::DropLastIfShort => TailGuard::DropLastIfShort,
            CliTailGuard::KeepAll => TailGuard::KeepAll,
        }
    }
}

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
    /// Translate a JSON dataset (default command)
    Translate(TranslateArgs),

    /// Generate shell completions for gapfill
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input JSON dataset
    #[arg(value_name = "INPUT_FILE")]
    input_file: PathBuf,

    /// Continue from the batches stored in the batch directory
    #[arg(short, long, conflicts_with = "force")]
    resume: bool,

    /// Delete batches of a previous run before starting
    #[arg(short, long)]
    force: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// API key for the provider
    #[arg(short = 'k', long, env = "GAPFILL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Target language, name or ISO code (e.g., 'Japanese', 'ja')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Directory for per-batch results
    #[arg(short, long)]
    batch_dir: Option<String>,

    /// Final output file
    #[arg(short, long)]
    output: Option<String>,

    /// Policy for the last entry of each response
    #[arg(long, value_enum)]
    tail_guard: Option<CliTailGuard>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// gapfill - LLM dataset translation with batch reconciliation
///
/// Translates a JSON dataset of records in batches through an LLM and keeps
/// re-requesting whatever the model dropped until every record is translated.
#[derive(Parser, Debug)]
#[command(name = "gapfill")]
#[command(version)]
#[command(about = "LLM dataset translation with batch reconciliation")]
#[command(long_about = "gapfill translates a JSON dataset of records in batches using an LLM, then
reconciles the results: truncated or malformed answers are discarded, missing records are found
and re-requested in smaller batches until the dataset is complete or no progress is made.

EXAMPLES:
    gapfill hadiths.json -t Japanese           # Translate using default config
    gapfill -p anthropic -t fr hadiths.json    # Use a specific provider
    gapfill --resume hadiths.json              # Continue an interrupted run
    gapfill --force hadiths.json               # Discard stored batches and start over
    gapfill completions bash > gapfill.bash    # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

EXIT STATUS:
    0 when every record was translated, 2 when the run stalled, 1 on errors.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input JSON dataset
    #[arg(value_name = "INPUT_FILE")]
    input_file: Option<PathBuf>,

    /// Continue from the batches stored in the batch directory
    #[arg(short, long, conflicts_with = "force")]
    resume: bool,

    /// Delete batches of a previous run before starting
    #[arg(short, long)]
    force: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// API key for the provider
    #[arg(short = 'k', long, env = "GAPFILL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Target language, name or ISO code (e.g., 'Japanese', 'ja')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Directory for per-batch results
    #[arg(short, long)]
    batch_dir: Option<String>,

    /// Final output file
    #[arg(short, long)]
    output: Option<String>,

    /// Policy for the last entry of each response
    #[arg(long, value_enum)]
    tail_guard: Option<CliTailGuard>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() {
    // Initialize the logger once with the most verbose level; the effective
    // level is set through log::set_max_level once the config is loaded
    if let Err(e) = CustomLogger::init(LevelFilter::Trace) {
        eprintln!("Failed to initialize logger: {}", e);
    }
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    let result = match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "gapfill", &mut std::io::stdout());
            Ok(true)
        }
        Some(Commands::Translate(args)) => run_translate(args).await,
        None => match cli.input_file {
            // Default behavior - use top-level args
            Some(input_file) => {
                let translate_args = TranslateArgs {
                    input_file,
                    resume: cli.resume,
                    force: cli.force,
                    provider: cli.provider,
                    model: cli.model,
                    api_key: cli.api_key,
                    target_language: cli.target_language,
                    batch_dir: cli.batch_dir,
                    output: cli.output,
                    tail_guard: cli.tail_guard,
                    config_path: cli.config_path,
                    log_level: cli.log_level,
                };
                run_translate(translate_args).await
            }
            None => Err(anyhow!("INPUT_FILE is required when no subcommand is specified")),
        },
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_STALLED),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Load the configuration file, creating a default one when missing
fn load_or_create_config(config_path: &str) -> Result<Config> {
    if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?;
        Ok(config)
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        Ok(config)
    }
}

/// Apply command line overrides on top of the file configuration
fn apply_overrides(config: &mut Config, options: &TranslateArgs) {
    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }

    if let Some(model) = &options.model {
        config.translation.active_provider_config_mut().model = model.clone();
    }

    // Explicit key first, then the provider's own environment variable when
    // the config file has none
    if let Some(api_key) = &options.api_key {
        config.translation.active_provider_config_mut().api_key = api_key.clone();
    } else if config.translation.get_api_key().is_empty() {
        let env_key = config
            .translation
            .provider
            .api_key_env_var()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty());
        if let Some(api_key) = env_key {
            config.translation.active_provider_config_mut().api_key = api_key;
        }
    }

    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }

    if let Some(batch_dir) = &options.batch_dir {
        config.output.batch_dir = batch_dir.clone();
    }

    if let Some(output) = &options.output {
        config.output.final_output = output.clone();
    }

    if let Some(tail_guard) = &options.tail_guard {
        config.reconcile.tail_guard = tail_guard.clone().into();
    }

    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
}

/// Run a translation; `Ok(false)` means the run stalled
async fn run_translate(options: TranslateArgs) -> Result<bool> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let config_log_level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(config_log_level.to_level_filter());
    }

    let mut config = load_or_create_config(&options.config_path)?;
    apply_overrides(&mut config, &options);

    // Validate the configuration after loading and overriding
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    let controller = Controller::with_config(config)?;
    let output = controller
        .run(
            options.input_file.clone(),
            RunOptions {
                resume: options.resume,
                force: options.force,
                show_progress: true,
            },
        )
        .await?;

    Ok(output.is_done())
}
