//! keg installer CLI entrypoint.
//!
//! This binary fetches a formula's release resource, verifies it, installs
//! its files into the prefix and runs the smoke test. Progress and caveats go
//! to stderr; JSON reports and the `caveats` subcommand write to stdout.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use keg::config::InstallerConfig;
use keg::formula::Formula;
use keg::layout::PrefixLayout;
use keg_installer::cli::{
    CaveatsArgs, Cli, Command, FetchArgs, InstallArgs, parse_error_exit_code,
};
use keg_installer::dirs::{BaseDirs, SystemBaseDirs};
use keg_installer::error::{InstallerError, Result};
use keg_installer::output::{DryRunInfo, render_caveats, write_stderr_line};
use keg_installer::pipeline::{InstallOptions, fetch_formula, install_formula};
use keg_installer::settings::{load_config, resolve_prefix};
use keg_installer::smoke::command_line;
use serde::Serialize;
use std::io::Write;
use tracing_subscriber::EnvFilter;

struct RunContext<'a> {
    cli: &'a Cli,
    config: &'a InstallerConfig,
    dirs: &'a dyn BaseDirs,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let exit_code = parse_error_exit_code(&err);
            if err.print().is_err() {
                // Nowhere left to report the usage error.
            }
            std::process::exit(exit_code);
        }
    };
    init_logging(cli.verbosity);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &SystemBaseDirs::new(), &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Install a stderr subscriber; `RUST_LOG` overrides the `-v` level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        // A subscriber is already installed; keep it.
    }
}

fn run(
    cli: &Cli,
    dirs: &dyn BaseDirs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let config = load_config(cli.config.as_deref(), dirs)?;
    let context = RunContext {
        cli,
        config: &config,
        dirs,
    };

    match &cli.command {
        Command::Install(args) => run_install(&context, args, stdout, stderr),
        Command::Fetch(args) => run_fetch(&context, args, stdout, stderr),
        Command::Caveats(args) => run_caveats(&context, args, stdout, stderr),
    }
}

fn run_install(
    context: &RunContext<'_>,
    args: &InstallArgs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let formula = Formula::load(&args.formula)?;
    let layout = resolve_layout(context, args.prefix.as_deref())?;

    // Dry-run mode: show what would be done without side effects
    if args.dry_run {
        print_dry_run_info(&formula, &layout, args.skip_test, stderr);
        return Ok(());
    }

    let options = InstallOptions {
        layout: &layout,
        smoke_test_timeout: context.config.smoke_test_timeout(),
        skip_test: args.skip_test,
        quiet: context.cli.quiet,
    };
    let report = install_formula(
        &formula,
        &options,
        context.config.download_timeout(),
        stderr,
    )?;

    if args.json {
        write_json(stdout, &report)?;
    }
    Ok(())
}

fn run_fetch(
    context: &RunContext<'_>,
    args: &FetchArgs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let formula = Formula::load(&args.formula)?;
    let output_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => current_dir()?,
    };
    let report = fetch_formula(
        &formula,
        &output_dir,
        context.config.download_timeout(),
        context.cli.quiet,
        stderr,
    )?;

    if args.json {
        write_json(stdout, &report)?;
    }
    Ok(())
}

fn run_caveats(
    context: &RunContext<'_>,
    args: &CaveatsArgs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let formula = Formula::load(&args.formula)?;
    let layout = resolve_layout(context, args.prefix.as_deref())?;

    match render_caveats(&formula, &layout) {
        Some(text) => {
            writeln!(stdout, "{text}").map_err(|source| InstallerError::WriteFailed { source })
        }
        None => {
            if !context.cli.quiet {
                write_stderr_line(stderr, format!("{} has no caveats", formula.name()));
            }
            Ok(())
        }
    }
}

fn resolve_layout(context: &RunContext<'_>, cli_prefix: Option<&Utf8Path>) -> Result<PrefixLayout> {
    let prefix = resolve_prefix(cli_prefix, context.config, context.dirs)?;
    Ok(PrefixLayout::new(prefix))
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|e| InstallerError::Config {
        reason: format!("current directory is not valid UTF-8: {e}"),
    })
}

/// Prints the planned installation without fetching anything.
fn print_dry_run_info(
    formula: &Formula,
    layout: &PrefixLayout,
    skip_test: bool,
    stderr: &mut dyn Write,
) {
    let destinations: Vec<Utf8PathBuf> = formula
        .install_rules()
        .iter()
        .map(|rule| layout.destination_of(rule))
        .collect();
    let smoke_test = formula
        .smoke_test_executable()
        .map(|exe| command_line(&layout.bin_dir().join(exe), &formula.smoke_test().args));

    let info = DryRunInfo {
        name: formula.name(),
        version: formula.version(),
        desc: formula.desc(),
        homepage: formula.homepage(),
        url: formula.url().as_str(),
        sha256: formula.sha256().as_str(),
        payload: formula.payload_kind().as_str(),
        prefix: layout.prefix(),
        destinations: &destinations,
        skip_test,
        smoke_test,
    };
    write_stderr_line(stderr, info.display_text());
}

fn write_json(stdout: &mut dyn Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *stdout, value)
        .map_err(|e| InstallerError::WriteFailed { source: e.into() })?;
    writeln!(stdout).map_err(|source| InstallerError::WriteFailed { source })
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            err.exit_code()
        }
    }
}
