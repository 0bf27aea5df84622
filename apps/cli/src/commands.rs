//! CLI command definitions, routing, and tracing setup.

use std::path::{Component, Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docmesh_core::{
    BatchResult, Pipeline, ProgressReporter, Registry, SourceDocument, ValidationReport,
    VisualizeFormat, validate_dependencies, visualize_pipeline,
};
use docmesh_shared::{
    AppConfig, DocumentContext, DocumentId, PipelineSettings, init_config, init_config_in,
    load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docmesh: merge many repositories' docs into one site.
#[derive(Parser)]
#[command(
    name = "docmesh",
    version,
    about = "Inspect and run the documentation transform pipeline.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file to use instead of ~/.docmesh/docmesh.toml.
    #[arg(long, global = true, env = "DOCMESH_CONFIG")]
    pub config: Option<PathBuf>,

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
    /// Inspect the registered transform pipeline.
    Pipeline {
        #[command(subcommand)]
        action: PipelineAction,
    },

    /// Run the pipeline over Markdown files.
    Transform {
        /// Markdown files to process.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Configured repository the files belong to.
        #[arg(short, long)]
        repo: Option<String>,

        /// Output directory. Documents go to stdout when omitted.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Pipeline inspection subcommands.
#[derive(Subcommand)]
pub(crate) enum PipelineAction {
    /// Print the execution order.
    List,

    /// Check declared dependencies.
    Validate {
        /// Fail on warnings as well as errors.
        #[arg(long)]
        strict: bool,
    },

    /// Render the pipeline graph.
    Visualize {
        /// Output format: text, mermaid, dot, or json.
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init {
        /// Directory to write docmesh.toml into (defaults to ~/.docmesh).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
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
        0 => "docmesh=info",
        1 => "docmesh=debug",
        _ => "docmesh=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

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
pub(crate) fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Pipeline { action } => {
            let config = resolve_config(config_path)?;
            match action {
                PipelineAction::List => cmd_pipeline_list(&config),
                PipelineAction::Validate { strict } => cmd_pipeline_validate(&config, strict),
                PipelineAction::Visualize { format } => cmd_pipeline_visualize(&config, &format),
            }
        }
        Command::Transform { files, repo, out } => {
            let config = resolve_config(config_path)?;
            cmd_transform(&config, &files, repo.as_deref(), out.as_deref())
        }
        Command::Config { action } => match action {
            ConfigAction::Init { dir } => cmd_config_init(dir.as_deref()),
            ConfigAction::Show => cmd_config_show(&resolve_config(config_path)?),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

fn default_registry(settings: &PipelineSettings) -> Result<Registry> {
    Ok(Registry::with_defaults(settings)?)
}

// ---------------------------------------------------------------------------
// pipeline list / validate / visualize
// ---------------------------------------------------------------------------

fn cmd_pipeline_list(config: &AppConfig) -> Result<()> {
    let settings = PipelineSettings::from(config);
    let registry = default_registry(&settings)?;
    let order = registry.list()?;

    println!();
    for (i, transform) in order.iter().enumerate() {
        let excluded = settings.exclude.iter().any(|n| n == transform.name());
        println!(
            "  {:>2}. {:<26} {:<10}{}",
            i + 1,
            transform.name(),
            transform.stage(),
            if excluded { "  (excluded)" } else { "" }
        );
    }
    println!();
    Ok(())
}

fn print_report(report: &ValidationReport) {
    for error in &report.errors {
        println!("  error:   {error}");
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    let suggestions = report.suggestions();
    if !suggestions.is_empty() {
        println!();
        println!("  Suggestions:");
        for suggestion in suggestions {
            println!("    - {suggestion}");
        }
    }
}

fn cmd_pipeline_validate(config: &AppConfig, strict: bool) -> Result<()> {
    let settings = PipelineSettings::from(config);
    let registry = default_registry(&settings)?;
    let report = validate_dependencies(&registry);

    println!();
    print_report(&report);
    let gate = strict || settings.fail_on_warnings;
    let report = report.into_result(gate)?;

    println!(
        "  Pipeline is valid: {} transforms, {} warnings.",
        registry.len(),
        report.warnings.len()
    );
    println!();
    Ok(())
}

fn cmd_pipeline_visualize(config: &AppConfig, format: &str) -> Result<()> {
    let format: VisualizeFormat = format.parse()?;
    let registry = default_registry(&PipelineSettings::from(config))?;
    print!("{}", visualize_pipeline(&registry, format)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// transform
// ---------------------------------------------------------------------------

fn cmd_transform(
    config: &AppConfig,
    files: &[PathBuf],
    repo: Option<&str>,
    out: Option<&Path>,
) -> Result<()> {
    let settings = PipelineSettings::from(config);
    let registry = default_registry(&settings)?;

    // Construction and validation problems stop the run before any file.
    let report = validate_dependencies(&registry);
    for warning in &report.warnings {
        warn!(%warning, "pipeline validation warning");
    }
    if !report.valid || (settings.fail_on_warnings && report.has_warnings()) {
        print_report(&report);
        report.into_result(settings.fail_on_warnings)?;
    }
    let pipeline = Pipeline::from_registry(&registry, &settings)?;

    let repository = match repo {
        Some(name) => Some(
            config
                .repository(name)
                .ok_or_else(|| eyre!("repository '{name}' is not configured"))?,
        ),
        None => None,
    };

    let mut read_failures = 0usize;
    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let path = document_path(file);
        let mut context = match repository {
            Some(repo) => DocumentContext::for_repository(repo, path),
            None => DocumentContext {
                path,
                ..DocumentContext::default()
            },
        };
        match std::fs::read_to_string(file) {
            Ok(text) => {
                if let Some(modified) = modified_time(file) {
                    context = context.with_last_modified(modified);
                }
                documents.push(SourceDocument::new(context, text));
            }
            Err(e) => {
                read_failures += 1;
                eprintln!("  ✗ {}: cannot read {}: {e}", context.id(), file.display());
            }
        }
    }

    info!(files = files.len(), repo = repo.unwrap_or("-"), "transforming documents");

    let reporter = CliProgress::new(documents.len());
    let result = pipeline.process_batch(documents, &reporter);

    for doc in &result.outputs {
        match out {
            Some(dir) => {
                let target = dir.join(&doc.id.path);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| eyre!("cannot create '{}': {e}", parent.display()))?;
                }
                std::fs::write(&target, &doc.output)
                    .map_err(|e| eyre!("cannot write '{}': {e}", target.display()))?;
            }
            None => print!("{}", doc.output),
        }
    }

    for failure in &result.failures {
        eprintln!("  ✗ {}", failure.error);
    }

    let failed = result.failures.len() + read_failures;
    eprintln!(
        "  {} processed, {} failed in {:.2}s",
        result.outputs.len(),
        failed,
        result.elapsed.as_secs_f64()
    );

    if failed > 0 {
        return Err(eyre!(
            "{failed} of {} documents failed",
            files.len()
        ));
    }
    Ok(())
}

/// Slash-separated document path for a file argument.
///
/// Relative paths keep their directories minus `.`/`..` parts; absolute
/// paths keep only the file name.
fn document_path(file: &Path) -> String {
    if file.is_absolute() {
        return file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    file.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn modified_time(file: &Path) -> Option<chrono::DateTime<chrono::Utc>> {
    let modified = std::fs::metadata(file).and_then(|m| m.modified()).ok()?;
    Some(chrono::DateTime::<chrono::Utc>::from(modified))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar on stderr.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn document_started(&self, id: &DocumentId, _current: usize, _total: usize) {
        self.bar.set_message(id.to_string());
    }

    fn document_finished(&self, _id: &DocumentId, _ok: bool) {
        self.bar.inc(1);
    }

    fn done(&self, _result: &BatchResult) {
        self.bar.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init(dir: Option<&Path>) -> Result<()> {
    let path = match dir {
        Some(dir) => init_config_in(dir)?,
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
