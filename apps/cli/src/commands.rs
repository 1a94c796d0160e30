//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use bonusmap_core::{ProgressReporter, RunConfig, RunResult, load_records, resolve_records};
use bonusmap_overlay::OverlayStore;
use bonusmap_shared::{AppConfig, init_config, load_config};
use bonusmap_sources::Program;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// bonusmap: resolve loyalty-program merchants to canonical domains.
#[derive(Parser)]
#[command(
    name = "bonusmap",
    version,
    about = "Resolve loyalty-program merchants to canonical web domains.",
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

/// Output locations shared by `run` and `resolve`.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct OutputArgs {
    /// Overlay file (defaults to `paths.overlay` from the config).
    #[arg(long)]
    pub overlay: Option<PathBuf>,

    /// Export file (defaults to `paths.output` from the config).
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Skip the live check of country-specific guesses.
    #[arg(long)]
    pub no_validate: bool,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch program listings, resolve domains, update the overlay, and export.
    Run {
        /// Program to fetch (repeatable). Defaults to all programs.
        #[arg(short, long = "program")]
        programs: Vec<Program>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Resolve merchant records from a JSON file instead of fetching.
    Resolve {
        /// JSON array of merchant records.
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List overlay entries waiting for a human decision.
    Review {
        /// Overlay file (defaults to `paths.overlay` from the config).
        #[arg(long)]
        overlay: Option<PathBuf>,
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
        0 => "bonusmap=info",
        1 => "bonusmap=debug",
        _ => "bonusmap=trace",
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
        Command::Run { programs, output } => cmd_run(programs, output).await,
        Command::Resolve { input, output } => cmd_resolve(input, output).await,
        Command::Review { overlay } => cmd_review(overlay),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Config file values, overridden by command-line flags.
fn run_config(config: &AppConfig, output: OutputArgs) -> RunConfig {
    let mut run = RunConfig::from_config(config);
    if let Some(overlay) = output.overlay {
        run.overlay_path = overlay;
    }
    if let Some(out) = output.out {
        run.output_path = out;
    }
    if output.no_validate {
        run.validate = false;
    }
    run
}

async fn cmd_run(programs: Vec<Program>, output: OutputArgs) -> Result<()> {
    let config = load_config()?;
    let mut run = run_config(&config, output);
    if !programs.is_empty() {
        run.programs = programs;
    }

    info!(
        programs = ?run.programs,
        overlay = %run.overlay_path.display(),
        validate = run.validate,
        "starting run"
    );

    let reporter = CliProgress::new();
    let result = bonusmap_core::run(&run, &reporter).await?;
    print_summary(&result);
    Ok(())
}

async fn cmd_resolve(input: PathBuf, output: OutputArgs) -> Result<()> {
    let config = load_config()?;
    let run = run_config(&config, output);
    let records = load_records(&input)?;

    info!(input = %input.display(), records = records.len(), "resolving records from file");

    let reporter = CliProgress::new();
    let result = resolve_records(records, &run, &reporter).await?;
    print_summary(&result);
    Ok(())
}

fn cmd_review(overlay: Option<PathBuf>) -> Result<()> {
    let path = match overlay {
        Some(p) => p,
        None => PathBuf::from(load_config()?.paths.overlay),
    };
    let overlay = OverlayStore::new(&path).load()?;

    let backlog: Vec<_> = overlay.needing_review().collect();
    if backlog.is_empty() {
        println!("Nothing to review in {}.", path.display());
        return Ok(());
    }

    let width = backlog.iter().map(|(id, _)| id.chars().count()).max().unwrap_or(0);
    for (identifier, entry) in &backlog {
        let domain = entry.domain.as_deref().unwrap_or("(missing)");
        println!("  {identifier:<width$}  {domain}");
    }
    println!();
    println!("  {} of {} entries need review ({})", backlog.len(), overlay.len(), path.display());
    println!("  Set \"trusted\": true on an entry to accept or correct its domain.");
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn print_summary(result: &RunResult) {
    println!();
    println!("  Run {} finished", result.run_id);
    println!("  Merchants:    {}", result.merchants);
    println!("  Trusted:      {}", result.trusted);
    println!("  Needs review: {}", result.needs_review);
    println!("  Missing:      {}", result.missing);
    println!(
        "  Overlay:      {} new, {} updated, {} kept trusted, {} in backlog",
        result.report.inserted,
        result.report.updated,
        result.report.kept_trusted,
        result.report.review_backlog
    );
    println!("  Export:       {}", result.output_path.display());
    println!("  Elapsed:      {:.1}s", result.elapsed.as_secs_f64());
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
    fn new() -> Self {
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
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn program_fetched(&self, program: &str, merchants: usize) {
        self.spinner
            .println(format!("  {program}: {merchants} merchants"));
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_programs() {
        let cli = Cli::try_parse_from([
            "bonusmap", "run", "-p", "trumf", "--program", "sas", "--no-validate", "-o", "out.json",
        ])
        .unwrap();
        match cli.command {
            Command::Run { programs, output } => {
                assert_eq!(programs, vec![Program::Trumf, Program::Sas]);
                assert!(output.no_validate);
                assert_eq!(output.out, Some(PathBuf::from("out.json")));
                assert_eq!(output.overlay, None);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn rejects_unknown_program() {
        assert!(Cli::try_parse_from(["bonusmap", "run", "--program", "coop"]).is_err());
    }

    #[test]
    fn resolve_requires_input() {
        assert!(Cli::try_parse_from(["bonusmap", "resolve"]).is_err());
        let cli = Cli::try_parse_from(["bonusmap", "-v", "resolve", "-i", "records.json"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Command::Resolve { .. }));
    }

    #[test]
    fn flags_override_config() {
        let config = AppConfig::default();
        let output = OutputArgs {
            overlay: Some(PathBuf::from("custom/patches.json")),
            out: None,
            no_validate: true,
        };
        let run = run_config(&config, output);
        assert_eq!(run.overlay_path, PathBuf::from("custom/patches.json"));
        assert_eq!(run.output_path, PathBuf::from(&config.paths.output));
        assert!(!run.validate);
        assert_eq!(run.programs, Program::ALL.to_vec());
    }
}
