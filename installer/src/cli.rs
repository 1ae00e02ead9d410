//! CLI argument definitions for the keg installer.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Install prebuilt command-line tools from keg formulas.
#[derive(Parser, Debug)]
#[command(name = "keg-installer")]
#[command(version, about)]
#[command(long_about = concat!(
    "Install prebuilt command-line tools from keg formulas.\n\n",
    "A formula is a TOML file naming a release resource, its SHA-256 digest ",
    "and the files to install from it. The installer downloads the resource, ",
    "refuses to continue if the digest differs, and then installs every file ",
    "into the prefix in one step: either all files land or none do.\n\n",
    "After installation the formula's caveats are printed and the installed ",
    "executable is run once as a smoke test.",
))]
#[command(after_help = concat!(
    "EXIT CODES:\n",
    "  0  success\n",
    "  1  usage, configuration or formula error\n",
    "  2  the resource could not be fetched\n",
    "  3  the resource digest did not match the formula\n",
    "  4  unpacking or installing files failed\n",
    "  5  the smoke test failed (files remain installed)\n\n",
    "EXAMPLES:\n",
    "  Install into ~/.local:\n",
    "    $ keg-installer install formulas/unity3d.toml\n\n",
    "  Install into a custom prefix without running the binary:\n",
    "    $ keg-installer install formulas/unity3d.toml --prefix /opt/keg --skip-test\n\n",
    "  Preview the files that would be written:\n",
    "    $ keg-installer install formulas/unity3d.toml --dry-run\n\n",
    "  Download and verify the release only:\n",
    "    $ keg-installer fetch formulas/unity3d.toml --output downloads\n",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file [default: platform configuration directory].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors and caveats still shown).
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch, verify and install a formula.
    Install(InstallArgs),

    /// Fetch and verify a formula's resource without installing it.
    Fetch(FetchArgs),

    /// Print a formula's caveats for the resolved prefix.
    Caveats(CaveatsArgs),
}

/// Arguments for the install command.
#[derive(Args, Debug, Clone, Default)]
pub struct InstallArgs {
    /// Path to the formula file.
    #[arg(value_name = "FORMULA")]
    pub formula: Utf8PathBuf,

    /// Installation prefix [default: $KEG_PREFIX, config, or ~/.local].
    #[arg(short, long, value_name = "DIR")]
    pub prefix: Option<Utf8PathBuf>,

    /// Do not run the installed executable after installation.
    #[arg(long)]
    pub skip_test: bool,

    /// Show the planned installation and exit without fetching.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the installation report as JSON on stdout.
    #[arg(long, conflicts_with = "dry_run")]
    pub json: bool,
}

/// Arguments for the fetch command.
#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Path to the formula file.
    #[arg(value_name = "FORMULA")]
    pub formula: Utf8PathBuf,

    /// Directory to save the verified resource in [default: current directory].
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<Utf8PathBuf>,

    /// Print the fetch report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the caveats command.
#[derive(Args, Debug, Clone, Default)]
pub struct CaveatsArgs {
    /// Path to the formula file.
    #[arg(value_name = "FORMULA")]
    pub formula: Utf8PathBuf,

    /// Installation prefix the caveats refer to.
    #[arg(short, long, value_name = "DIR")]
    pub prefix: Option<Utf8PathBuf>,
}

/// Exit code for a command line clap refused to parse.
///
/// Help and version requests exit 0; every other parse failure is a usage
/// error and exits 1, keeping 2 free for fetch failures.
#[must_use]
pub fn parse_error_exit_code(err: &clap::Error) -> i32 {
    i32::from(err.use_stderr())
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
