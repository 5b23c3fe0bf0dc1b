//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use seagull_core::watch::{self, WatchCoordinator};
use seagull_core::{BuildEnv, BuildReporter, BuildUnit, MakeOptions, MakeReport};
use seagull_shared::{REGISTRY_FILE_NAME, SeagullError, Settings, load_settings_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Seagull: assemble LaTeX documents from Markdown fragments.
#[derive(Parser)]
#[command(
    name = "seagull",
    version,
    about = "Assemble LaTeX documents from Markdown fragments and drive the typesetting toolchain.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to the project registry.
    #[arg(long, env = "SEAGULL_REGISTRY", default_value = REGISTRY_FILE_NAME, global = true)]
    pub registry: PathBuf,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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
    /// List all registered projects.
    List,

    /// Show a project's paths, fragments and version history.
    Describe {
        /// Project identifier.
        project: String,
    },

    /// Convert fragments and compose the document.
    Build {
        /// Project identifier.
        project: String,

        /// Configure the LaTeX template for printed output.
        #[arg(long)]
        for_print: bool,

        /// Carry the build process all the way to the PDF stage.
        #[arg(long)]
        to_pdf: bool,

        /// Rebuild whenever a content fragment changes.
        #[arg(long)]
        watch: bool,
    },

    /// Remove generated documents and intermediate files.
    Clean {
        /// Project identifier.
        project: String,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "seagull=info",
        1 => "seagull=debug",
        _ => "seagull=trace",
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
    let settings = load_settings_from(&cli.registry)?;

    match cli.command {
        Command::List => cmd_list(&settings),
        Command::Describe { project } => cmd_describe(&settings, &project),
        Command::Build {
            project,
            for_print,
            to_pdf,
            watch,
        } => {
            let options = MakeOptions { for_print, to_pdf };
            cmd_build(&settings, &project, options, watch).await
        }
        Command::Clean { project } => cmd_clean(&settings, &project),
    }
}

/// Exit code for a failed command: the [`SeagullError`] kind when there is
/// one, 1 otherwise.
pub(crate) fn exit_code(report: &color_eyre::eyre::Report) -> u8 {
    report
        .downcast_ref::<SeagullError>()
        .map_or(1, |e| u8::try_from(e.exit_code()).unwrap_or(1))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_list(settings: &Settings) -> Result<()> {
    if settings.registry.is_empty() {
        println!("No projects registered.");
        return Ok(());
    }
    print!("{}", settings.registry);
    Ok(())
}

fn cmd_describe(settings: &Settings, project: &str) -> Result<()> {
    let unit = BuildUnit::resolve(project, &settings.registry)?;
    print!("{unit}");
    Ok(())
}

async fn cmd_build(
    settings: &Settings,
    project: &str,
    options: MakeOptions,
    watch_mode: bool,
) -> Result<()> {
    let unit = BuildUnit::resolve(project, &settings.registry)?;
    let env = BuildEnv::new(settings.toolchain.clone());

    info!(
        project,
        for_print = options.for_print,
        to_pdf = options.to_pdf,
        watch = watch_mode,
        "building document"
    );

    let progress = CliProgress::new();
    let report = unit.make(&env, options, &progress)?;
    print_build_summary(&report);

    if watch_mode {
        let (root, tracked) = watch::watch_targets(&unit)?;
        let debounce = Duration::from_millis(settings.watch.debounce_ms);

        let mut coordinator = WatchCoordinator::new(tracked, || -> seagull_shared::Result<()> {
            let progress = CliProgress::new();
            let report = unit.make(&env, options, &progress)?;
            print_build_summary(&report);
            Ok(())
        });

        println!("  Watching {} for changes. Press Ctrl-C to stop.", root.display());
        let summary = watch::watch(&root, &mut coordinator, debounce, watch::shutdown_signal()).await?;

        println!();
        println!("  Watch session ended.");
        println!("  Rebuilds: {}", summary.rebuilds);
        println!("  Failures: {}", summary.failures);
        println!();
    }

    Ok(())
}

fn cmd_clean(settings: &Settings, project: &str) -> Result<()> {
    let unit = BuildUnit::resolve(project, &settings.registry)?;
    let report = unit.clean();

    println!("  Removed {} file(s) for {project}.", report.removed.len());
    for (path, reason) in &report.failed {
        println!("  Could not remove {}: {reason}", path.display());
    }
    Ok(())
}

fn print_build_summary(report: &MakeReport) {
    println!();
    println!("  Document built successfully!");
    println!("  Fragments: {}", report.fragments);
    println!("  Document:  {}", display(&report.document));
    if let Some(pdf) = &report.pdf {
        println!("  PDF:       {}", display(pdf));
    }
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

fn display(path: &Path) -> std::path::Display<'_> {
    path.display()
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl BuildReporter for CliProgress {
    fn stage(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn fragment_converted(&self, id: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Converted [{current}/{total}] {id}"));
    }

    fn pass_completed(&self, pass: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Typesetting [{current}/{total}] {pass}"));
    }

    fn done(&self, _report: &MakeReport) {
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
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn build_flags_parse() {
        let cli = Cli::parse_from(["seagull", "build", "doc", "--to-pdf", "--watch"]);
        match cli.command {
            Command::Build {
                project,
                for_print,
                to_pdf,
                watch,
            } => {
                assert_eq!(project, "doc");
                assert!(!for_print);
                assert!(to_pdf);
                assert!(watch);
            }
            _ => panic!("expected build command"),
        }
    }

    #[test]
    fn registry_flag_overrides_default() {
        let cli = Cli::parse_from(["seagull", "--registry", "/etc/seagull.yml", "list"]);
        assert_eq!(cli.registry, PathBuf::from("/etc/seagull.yml"));
    }

    #[test]
    fn exit_code_follows_error_kind() {
        let report = color_eyre::eyre::Report::new(SeagullError::UnknownProject {
            id: "missing".into(),
            known: vec!["doc".into()],
        });
        assert_eq!(exit_code(&report), 2);

        let report = color_eyre::eyre::eyre!("something else");
        assert_eq!(exit_code(&report), 1);
    }
}
