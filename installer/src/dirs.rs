//! Platform base directories.
//!
//! Wraps `directories-next` behind a trait so prefix and configuration
//! resolution can be tested without depending on the real home directory.

use std::path::PathBuf;

/// Source of the per-user directories keg derives its defaults from.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Return the user's home directory.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Return keg's configuration directory, e.g. `~/.config/keg`.
    fn keg_config_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by the platform conventions.
///
/// # Examples
///
/// ```
/// use keg_installer::dirs::{BaseDirs, SystemBaseDirs};
///
/// let dirs = SystemBaseDirs::new();
/// if let Some(config) = dirs.keg_config_dir() {
///     assert!(config.ends_with("keg"));
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SystemBaseDirs {
    home: Option<PathBuf>,
    config: Option<PathBuf>,
}

impl SystemBaseDirs {
    /// Look up the platform directories.
    ///
    /// Either directory may be absent, e.g. when `HOME` is unset.
    #[must_use]
    pub fn new() -> Self {
        let home = directories_next::BaseDirs::new().map(|base| base.home_dir().to_path_buf());
        let config = directories_next::ProjectDirs::from("", "", "keg")
            .map(|project| project.config_dir().to_path_buf());
        Self { home, config }
    }
}

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }

    fn keg_config_dir(&self) -> Option<PathBuf> {
        self.config.clone()
    }
}
