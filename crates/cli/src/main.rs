use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use deepcover::commands::{
    apply_overrides, coverage_command, dependencies_command, load_config, ConfigOverrides,
};
use deepcover_core::Deepcover;
use tracing_subscriber::EnvFilter;

/// Deep test coverage for Go packages.
///
/// Finds every function of the module reachable from the selected tests,
/// instruments all of their packages, runs the tests once and reports the
/// coverage of each reached function. This CLI is a thin wrapper around
/// `deepcover-core`.
#[derive(Parser, Debug)]
#[command(name = "deepcover", version, about = "Deep test coverage for Go packages", long_about = None)]
struct Cli {
    /// Package directory or import path to analyze.
    path: String,

    /// Regex selecting the test functions to run (matched against bare function names).
    #[arg(long, default_value = "Test")]
    run: String,

    /// Write the coverage file here instead of printing a table.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(long, default_value_t = false, conflicts_with = "output")]
    json: bool,

    /// List each target's dependencies without running any test.
    #[arg(long, default_value_t = false)]
    deps_only: bool,

    /// Coverage counter mode passed to `go test`.
    #[arg(long, value_parser = ["set", "count", "atomic"])]
    covermode: Option<String>,

    /// How summary rows are paired with dependencies.
    #[arg(long, value_parser = ["ownership", "substring"])]
    match_rule: Option<String>,

    /// Configuration file (JSON, or YAML with a .yaml/.yml extension).
    #[arg(long)]
    config: Option<PathBuf>,

    /// More log output on stderr; repeat for debug logs. DEEPCOVER_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(err) if !err.use_stderr() => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let rendered = err.render().to_string();
            let first = rendered.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
            eprintln!("Error: {}", first.trim_start_matches("error: "));
            return ExitCode::FAILURE;
        }
    };
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // go list diagnostics can span lines; the error stays on one.
            let message = format!("{err:#}").replace('\n', " ");
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let config = apply_overrides(config, &ConfigOverrides {
        cover_mode: cli.covermode,
        match_rule: cli.match_rule,
    })?;
    let engine = Deepcover::go(config);

    if cli.deps_only {
        dependencies_command(&engine, &cli.path, &cli.run, cli.json)
    } else {
        coverage_command(&engine, &cli.path, &cli.run, cli.output.as_deref(), cli.json)
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("DEEPCOVER_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber installed by an embedding process stays in place.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
