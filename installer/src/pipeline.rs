//! Formula installation orchestrator.
//!
//! Runs fetch, verify, unpack, stage and commit, caveats and the smoke test
//! in that order. Everything up to the commit happens inside a private
//! temporary directory, so a failure in any earlier step leaves the prefix
//! untouched. Progress goes to the injected `stderr` writer.

use camino::{Utf8Path, Utf8PathBuf};
use keg::digest::Sha256Digest;
use keg::formula::Formula;
use keg::layout::PrefixLayout;
use log::info;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::error::{InstallerError, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::lock::PrefixLock;
use crate::output::{caveats_block, render_caveats, success_message, write_stderr_line};
use crate::payload::unpack;
use crate::smoke::{CommandExecutor, SystemCommandExecutor, command_line, run_smoke_test};
use crate::stager::{StageError, Stager};
use crate::verify::verify_digest;

/// Settings for one installation.
#[derive(Debug)]
pub struct InstallOptions<'a> {
    /// Destination layout rooted at the resolved prefix.
    pub layout: &'a PrefixLayout,
    /// Default smoke test timeout when the formula sets none.
    pub smoke_test_timeout: Duration,
    /// When true, the smoke test is not run.
    pub skip_test: bool,
    /// When true, suppress progress output.
    pub quiet: bool,
}

/// Outcome of the post-install smoke test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SmokeTestStatus {
    /// The command ran and exited zero.
    Passed {
        /// The command line that was run.
        command: String,
    },
    /// Disabled with `--skip-test`.
    Skipped,
    /// The formula installs no executable to run.
    NotApplicable,
}

/// Summary of a completed installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// The verified SHA-256 of the fetched resource.
    pub sha256: Sha256Digest,
    /// The installation prefix.
    pub prefix: Utf8PathBuf,
    /// Every installed file, in rule order.
    pub installed: Vec<Utf8PathBuf>,
    /// Rendered caveats, if the formula declares any.
    pub caveats: Option<String>,
    /// Smoke test outcome.
    pub smoke_test: SmokeTestStatus,
}

/// Summary of a fetch-only run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    /// Package name.
    pub name: String,
    /// The verified SHA-256 of the fetched resource.
    pub sha256: Sha256Digest,
    /// Where the verified resource was saved.
    pub path: Utf8PathBuf,
}

/// Install `formula` using production fetch and process implementations.
///
/// # Errors
///
/// Returns any error from [`install_formula_with`].
pub fn install_formula(
    formula: &Formula,
    options: &InstallOptions<'_>,
    download_timeout: Duration,
    stderr: &mut dyn Write,
) -> Result<InstallReport> {
    install_formula_with(
        formula,
        options,
        &HttpFetcher::new(download_timeout),
        &SystemCommandExecutor,
        stderr,
    )
}

/// Testable inner function with injected dependencies.
///
/// The production entry point [`install_formula`] delegates here with real
/// implementations; tests inject mocks.
///
/// # Errors
///
/// Returns [`InstallerError::Fetch`] or [`InstallerError::Integrity`]
/// without having written anything to the prefix,
/// [`InstallerError::Unpack`] or [`InstallerError::Install`] with the prefix
/// restored, and [`InstallerError::SmokeTest`] with the new files left in
/// place.
pub fn install_formula_with(
    formula: &Formula,
    options: &InstallOptions<'_>,
    fetcher: &dyn Fetcher,
    executor: &dyn CommandExecutor,
    stderr: &mut dyn Write,
) -> Result<InstallReport> {
    let progress = |stderr: &mut dyn Write, message: String| {
        if !options.quiet {
            write_stderr_line(stderr, message);
        }
    };

    let workspace = tempfile::tempdir()?;
    let (resource, sha256) =
        fetch_and_verify(formula, workspace.path(), fetcher, stderr, options.quiet)?;

    progress(stderr, format!("Unpacking {}...", formula.payload_file_name()));
    let payload_root = unpack(
        formula.payload_kind(),
        &resource,
        formula.payload_file_name(),
        &workspace.path().join("payload"),
    )?;
    let payload_root = Utf8PathBuf::from_path_buf(payload_root).map_err(|path| {
        StageError::NonUtf8Path {
            path: path.display().to_string(),
        }
    })?;

    let stager = Stager::plan(formula.install_rules(), &payload_root, options.layout)?;
    let installed = {
        let _lock = PrefixLock::acquire(options.layout.prefix())?;
        progress(
            stderr,
            format!("Installing into {}...", options.layout.prefix()),
        );
        stager.commit()?
    };
    for path in &installed {
        info!("installed {path}");
    }
    progress(
        stderr,
        success_message(formula, installed.len(), options.layout.prefix()),
    );

    let caveats = render_caveats(formula, options.layout);
    if let Some(text) = &caveats {
        write_stderr_line(stderr, "");
        write_stderr_line(stderr, caveats_block(text));
    }

    let smoke_test = smoke_test(formula, options, executor, stderr)?;

    Ok(InstallReport {
        name: formula.name().to_owned(),
        version: formula.version().to_owned(),
        sha256,
        prefix: options.layout.prefix().to_owned(),
        installed,
        caveats,
        smoke_test,
    })
}

/// Fetch and verify `formula`'s resource using the production fetcher.
///
/// # Errors
///
/// Returns any error from [`fetch_formula_with`].
pub fn fetch_formula(
    formula: &Formula,
    output_dir: &Utf8Path,
    download_timeout: Duration,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<FetchReport> {
    fetch_formula_with(
        formula,
        output_dir,
        &HttpFetcher::new(download_timeout),
        quiet,
        stderr,
    )
}

/// Fetch and verify `formula`'s resource, saving it into `output_dir`.
///
/// The resource is downloaded into a temporary directory and only moved to
/// `output_dir` once its digest matches.
///
/// # Errors
///
/// Returns [`InstallerError::Fetch`] or [`InstallerError::Integrity`] with
/// nothing written to `output_dir`, or [`InstallerError::Io`] if the
/// verified file cannot be moved into place.
pub fn fetch_formula_with(
    formula: &Formula,
    output_dir: &Utf8Path,
    fetcher: &dyn Fetcher,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<FetchReport> {
    std::fs::create_dir_all(output_dir)?;
    let workspace = tempfile::tempdir_in(output_dir)?;
    let (resource, sha256) =
        fetch_and_verify(formula, workspace.path(), fetcher, stderr, quiet)?;

    let path = output_dir.join(formula.payload_file_name());
    std::fs::rename(&resource, &path)?;
    if !quiet {
        write_stderr_line(stderr, format!("Saved {path}"));
    }
    Ok(FetchReport {
        name: formula.name().to_owned(),
        sha256,
        path,
    })
}

/// Download into `workspace/download` and check the digest.
fn fetch_and_verify(
    formula: &Formula,
    workspace: &Path,
    fetcher: &dyn Fetcher,
    stderr: &mut dyn Write,
    quiet: bool,
) -> Result<(std::path::PathBuf, Sha256Digest)> {
    let download_dir = workspace.join("download");
    std::fs::create_dir_all(&download_dir)?;
    let resource = download_dir.join(formula.payload_file_name());

    if !quiet {
        write_stderr_line(stderr, format!("Fetching {}...", formula.url()));
    }
    fetcher.fetch(formula.url(), &resource)?;

    let sha256 = verify_digest(&resource, formula.sha256())
        .map_err(|e| InstallerError::from_verify(formula.url().as_str(), e))?;
    info!("verified sha256 {} for {}", sha256.short(12), formula.name());
    Ok((resource, sha256))
}

fn smoke_test(
    formula: &Formula,
    options: &InstallOptions<'_>,
    executor: &dyn CommandExecutor,
    stderr: &mut dyn Write,
) -> Result<SmokeTestStatus> {
    if options.skip_test {
        return Ok(SmokeTestStatus::Skipped);
    }
    let Some(executable) = formula.smoke_test_executable() else {
        return Ok(SmokeTestStatus::NotApplicable);
    };
    let binary = options.layout.bin_dir().join(executable);
    let args = &formula.smoke_test().args;
    let timeout = formula
        .smoke_test()
        .timeout()
        .unwrap_or(options.smoke_test_timeout);

    if !options.quiet {
        write_stderr_line(stderr, "");
        write_stderr_line(
            stderr,
            format!("Testing {}...", command_line(&binary, args)),
        );
    }
    let command = run_smoke_test(executor, &binary, args, timeout)?;
    Ok(SmokeTestStatus::Passed { command })
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
