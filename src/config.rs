//! Installer configuration loaded from `config.toml`.
//!
//! Every field is optional: values are deserialised from the configuration
//! file when present and fall back to defaults otherwise. Unknown keys are
//! rejected so that a misspelt setting is reported rather than ignored.

use crate::error::{FormulaError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use std::time::Duration;

/// Settings that shape how the installer fetches and verifies packages.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    /// Installation prefix. `None` defers to the environment or the
    /// platform default.
    pub prefix: Option<Utf8PathBuf>,
    /// Timeout for the whole download, in seconds.
    #[serde(default = "InstallerConfig::default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// Timeout for the post-install smoke test, in seconds.
    #[serde(default = "InstallerConfig::default_smoke_test_timeout_secs")]
    pub smoke_test_timeout_secs: u64,
}

impl InstallerConfig {
    const fn default_download_timeout_secs() -> u64 {
        30
    }

    const fn default_smoke_test_timeout_secs() -> u64 {
        60
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::Parse`] if the text is not valid TOML or
    /// contains unknown keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use keg::config::InstallerConfig;
    ///
    /// let config = InstallerConfig::from_toml_str("download_timeout_secs = 120\n", "inline")
    ///     .expect("valid configuration");
    /// assert_eq!(config.download_timeout_secs, 120);
    /// assert_eq!(config.smoke_test_timeout_secs, 60);
    /// ```
    pub fn from_toml_str(source: &str, origin: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| FormulaError::Parse {
            origin: origin.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::Read`] if the file exists but cannot be read,
    /// or a parse error from [`Self::from_toml_str`].
    pub fn load(path: &Utf8Path) -> Result<Self> {
        debug!("loading installer configuration from {path}");
        let source = std::fs::read_to_string(path).map_err(|e| FormulaError::Read {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source, path.as_str())
    }

    /// Load configuration from `path` if it exists, else return defaults.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::load`] when the file exists.
    pub fn load_or_default(path: &Utf8Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("no installer configuration at {path}; using defaults");
            Ok(Self::default())
        }
    }

    /// Return the download timeout.
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Return the smoke test timeout.
    #[must_use]
    pub const fn smoke_test_timeout(&self) -> Duration {
        Duration::from_secs(self.smoke_test_timeout_secs)
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            download_timeout_secs: Self::default_download_timeout_secs(),
            smoke_test_timeout_secs: Self::default_smoke_test_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_are_applied() {
        let config = InstallerConfig::default();

        assert!(config.prefix.is_none());
        assert_eq!(config.download_timeout(), Duration::from_secs(30));
        assert_eq!(config.smoke_test_timeout(), Duration::from_secs(60));
    }

    #[rstest]
    fn deserialises_overrides_from_toml() {
        let source = "prefix = \"/opt/keg\"\nsmoke_test_timeout_secs = 5\n";

        let config = InstallerConfig::from_toml_str(source, "inline")
            .expect("expected configuration to parse successfully");

        assert_eq!(config.prefix, Some(Utf8PathBuf::from("/opt/keg")));
        assert_eq!(config.smoke_test_timeout_secs, 5);
        assert_eq!(config.download_timeout_secs, 30);
    }

    #[rstest]
    fn propagates_deserialisation_failures() {
        let source = "download_timeout_secs = \"forever\"\n";

        let outcome = InstallerConfig::from_toml_str(source, "inline");

        assert!(
            outcome.is_err(),
            "expected a parse error when the timeout is not numeric"
        );
    }

    #[rstest]
    fn rejects_unknown_fields() {
        let outcome = InstallerConfig::from_toml_str("retries = 3\n", "inline");

        assert!(
            outcome.is_err(),
            "expected a parse error when unknown fields are present"
        );
    }

    #[rstest]
    fn load_or_default_tolerates_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join("config.toml")).expect("UTF-8 path");

        let config = InstallerConfig::load_or_default(&path).expect("defaults");

        assert_eq!(config, InstallerConfig::default());
    }

    #[rstest]
    fn load_or_default_reads_existing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join("config.toml")).expect("UTF-8 path");
        std::fs::write(&path, "download_timeout_secs = 90\n").expect("write config");

        let config = InstallerConfig::load_or_default(&path).expect("configuration");

        assert_eq!(config.download_timeout_secs, 90);
    }
}
