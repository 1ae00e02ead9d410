//! Resolution of the installation prefix and configuration file.
//!
//! The prefix comes from, in order: the `--prefix` flag, the `KEG_PREFIX`
//! environment variable, the `prefix` key in `config.toml`, and finally
//! `<home>/.local`. The configuration file is the one named by `--config`,
//! or `config.toml` in keg's platform configuration directory when present.

use crate::dirs::BaseDirs;
use crate::error::{InstallerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use keg::config::InstallerConfig;
use log::debug;
use std::path::PathBuf;

/// Environment variable overriding the configured prefix.
pub const PREFIX_ENV: &str = "KEG_PREFIX";

/// Name of the configuration file inside keg's configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Load installer configuration.
///
/// An explicitly named file must exist; the default location is optional.
///
/// # Errors
///
/// Returns [`InstallerError::Formula`] if the file cannot be read or parsed,
/// or [`InstallerError::Config`] if the default location is not UTF-8.
pub fn load_config(explicit: Option<&Utf8Path>, dirs: &dyn BaseDirs) -> Result<InstallerConfig> {
    if let Some(path) = explicit {
        return Ok(InstallerConfig::load(path)?);
    }
    match dirs.keg_config_dir() {
        Some(dir) => {
            let path = utf8(dir.join(CONFIG_FILE_NAME), "configuration directory")?;
            Ok(InstallerConfig::load_or_default(&path)?)
        }
        None => {
            debug!("no configuration directory; using defaults");
            Ok(InstallerConfig::default())
        }
    }
}

/// Resolve the installation prefix.
///
/// # Errors
///
/// Returns [`InstallerError::Config`] when no source yields a prefix or the
/// chosen prefix is not valid UTF-8.
pub fn resolve_prefix(
    cli: Option<&Utf8Path>,
    config: &InstallerConfig,
    dirs: &dyn BaseDirs,
) -> Result<Utf8PathBuf> {
    let env = std::env::var_os(PREFIX_ENV).filter(|value| !value.is_empty());
    let chosen = if let Some(prefix) = cli {
        debug!("prefix from command line: {prefix}");
        prefix.as_std_path().to_path_buf()
    } else if let Some(prefix) = env {
        debug!("prefix from {PREFIX_ENV}");
        PathBuf::from(prefix)
    } else if let Some(prefix) = &config.prefix {
        debug!("prefix from configuration: {prefix}");
        prefix.as_std_path().to_path_buf()
    } else {
        let home = dirs.home_dir().ok_or_else(|| InstallerError::Config {
            reason: format!(
                "could not determine a home directory; pass --prefix or set {PREFIX_ENV}"
            ),
        })?;
        home.join(".local")
    };
    let absolute = std::path::absolute(&chosen)?;
    utf8(absolute, "prefix")
}

fn utf8(path: PathBuf, what: &str) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).map_err(|path| InstallerError::Config {
        reason: format!("{what} is not valid UTF-8: {}", path.display()),
    })
}
