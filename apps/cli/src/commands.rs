//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use harvester_core::{Collaborators, Pipeline, ProgressReporter, RunOutput};
use harvester_shared::{
    AppConfig, PipelineConfig, Stage, StorageBackend, init_config, load_config, validate_bucket,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Harvester — collect ranked research documents per topic.
#[derive(Parser)]
#[command(
    name = "harvester",
    version,
    about = "Search, rank, fetch and store research documents for a list of topics.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the harvest pipeline over a list of topics.
    Run {
        /// Topic to process (repeatable). Defaults to the configured topics.
        #[arg(short, long = "topic")]
        topics: Vec<String>,

        /// File with one topic per line; `#` starts a comment.
        #[arg(long)]
        topics_file: Option<PathBuf>,

        /// Documents kept per topic after ranking.
        #[arg(long)]
        top_n: Option<usize>,

        /// Store documents under this directory instead of the configured backend.
        #[arg(long)]
        local_store: Option<PathBuf>,

        /// Print the full run report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "harvester=info",
        1 => "harvester=debug",
        _ => "harvester=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            topics,
            topics_file,
            top_n,
            local_store,
            json,
        } => cmd_run(topics, topics_file.as_deref(), top_n, local_store, json).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    topics: Vec<String>,
    topics_file: Option<&Path>,
    top_n: Option<usize>,
    local_store: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let topics = resolve_topics(&config, topics, topics_file)?;
    if topics.is_empty() {
        return Err(eyre!("no topics to process; pass --topic or --topics-file"));
    }

    let mut pipeline_config = PipelineConfig::from(&config);
    if let Some(n) = top_n {
        if n == 0 {
            return Err(eyre!("--top-n must be at least 1"));
        }
        pipeline_config = pipeline_config.with_top_n(n);
    }
    pipeline_config.bucket = resolve_bucket(&config, local_store.is_some())?;

    let collaborators = Collaborators::from_config(&config, local_store)?;

    info!(
        topics = topics.len(),
        top_n = pipeline_config.top_n,
        bucket = %pipeline_config.bucket,
        "starting harvest"
    );

    let reporter = CliProgress::new(json);
    let output = Pipeline::new(pipeline_config, collaborators)
        .run(topics, &reporter)
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary(&output);
    }

    Ok(())
}

/// Topics from flags and file, in that order; config topics when neither is given.
fn resolve_topics(
    config: &AppConfig,
    mut topics: Vec<String>,
    topics_file: Option<&Path>,
) -> Result<Vec<String>> {
    if let Some(path) = topics_file {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| eyre!("cannot read topics file '{}': {e}", path.display()))?;
        topics.extend(parse_topics(&contents));
    }
    if topics.is_empty() {
        topics = config.topics.clone();
    }
    Ok(topics)
}

fn parse_topics(contents: &str) -> impl Iterator<Item = String> + '_ {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
}

/// Local stores fall back to a `local` bucket; remote stores require one.
fn resolve_bucket(config: &AppConfig, local_override: bool) -> Result<String> {
    if local_override || config.storage.backend == StorageBackend::Local {
        return Ok(config
            .storage
            .resolve_bucket()
            .unwrap_or_else(|| "local".to_string()));
    }
    Ok(validate_bucket(config)?)
}

fn print_summary(output: &RunOutput) {
    println!();
    println!("  Harvest finished");
    println!("  Run:       {}", output.run_id);
    println!("  Topics:    {}", output.topics_processed);
    println!("  Documents: {}", output.documents.len());
    println!("  Stored:    {}", output.storage_links.len());
    println!("  Errors:    {}", output.errors.len());
    println!("  Time:      {:.1}s", output.elapsed.as_secs_f64());

    if !output.storage_links.is_empty() {
        println!();
        println!("  Links:");
        for link in &output.storage_links {
            println!("    {link}");
        }
    }

    if !output.errors.is_empty() {
        println!();
        println!("  Errors:");
        for error in &output.errors {
            println!("    {error}");
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new(hidden: bool) -> Self {
        if hidden {
            return Self {
                spinner: ProgressBar::hidden(),
            };
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn topic_started(&self, topic: &str, index: usize, total: usize) {
        self.spinner
            .set_message(format!("[{}/{total}] {topic}", index + 1));
    }

    fn stage(&self, topic: &str, stage: Stage) {
        self.spinner.set_message(format!("{topic}: {stage}"));
    }

    fn topic_finished(&self, topic: &str, documents: usize, links: usize) {
        self.spinner
            .println(format!("  {topic}: {documents} documents, {links} stored"));
    }

    fn done(&self, _output: &RunOutput) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
