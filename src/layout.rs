//! Installation prefix layout.
//!
//! Maps each [`DestinationRole`] to its directory beneath an installation
//! prefix, using the Homebrew directory conventions:
//!
//! | Role             | Directory                                   |
//! |------------------|---------------------------------------------|
//! | `bin`            | `<prefix>/bin`                              |
//! | `bash-completion`| `<prefix>/etc/bash_completion.d`            |
//! | `zsh-completion` | `<prefix>/share/zsh/site-functions`         |
//! | `fish-completion`| `<prefix>/share/fish/vendor_completions.d`  |

use crate::install_rule::{DestinationRole, InstallRule, Shell};
use camino::{Utf8Path, Utf8PathBuf};

/// Directory layout rooted at an installation prefix.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use keg::install_rule::{DestinationRole, Shell};
/// use keg::layout::PrefixLayout;
///
/// let layout = PrefixLayout::new("/opt/homebrew");
/// assert_eq!(
///     layout.dir_for(DestinationRole::Completion(Shell::Zsh)),
///     Utf8Path::new("/opt/homebrew/share/zsh/site-functions"),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixLayout {
    prefix: Utf8PathBuf,
}

impl PrefixLayout {
    /// Create a layout rooted at `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<Utf8PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Return the installation prefix.
    #[must_use]
    pub fn prefix(&self) -> &Utf8Path {
        &self.prefix
    }

    /// Return the executable-binaries directory.
    #[must_use]
    pub fn bin_dir(&self) -> Utf8PathBuf {
        self.prefix.join("bin")
    }

    /// Return the completion directory for `shell`.
    #[must_use]
    pub fn completion_dir(&self, shell: Shell) -> Utf8PathBuf {
        match shell {
            Shell::Bash => self.prefix.join("etc").join("bash_completion.d"),
            Shell::Zsh => self.prefix.join("share").join("zsh").join("site-functions"),
            Shell::Fish => self
                .prefix
                .join("share")
                .join("fish")
                .join("vendor_completions.d"),
        }
    }

    /// Return the directory for a destination role.
    #[must_use]
    pub fn dir_for(&self, role: DestinationRole) -> Utf8PathBuf {
        match role {
            DestinationRole::ExecutableDir => self.bin_dir(),
            DestinationRole::Completion(shell) => self.completion_dir(shell),
        }
    }

    /// Return the full destination path of an install rule.
    #[must_use]
    pub fn destination_of(&self, rule: &InstallRule) -> Utf8PathBuf {
        self.dir_for(rule.destination()).join(rule.installed_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::bin(DestinationRole::ExecutableDir, "/usr/local/bin")]
    #[case::bash(
        DestinationRole::Completion(Shell::Bash),
        "/usr/local/etc/bash_completion.d"
    )]
    #[case::zsh(
        DestinationRole::Completion(Shell::Zsh),
        "/usr/local/share/zsh/site-functions"
    )]
    #[case::fish(
        DestinationRole::Completion(Shell::Fish),
        "/usr/local/share/fish/vendor_completions.d"
    )]
    fn resolves_roles_under_prefix(#[case] role: DestinationRole, #[case] expected: &str) {
        let layout = PrefixLayout::new("/usr/local");
        assert_eq!(layout.dir_for(role), Utf8PathBuf::from(expected));
    }

    #[test]
    fn destination_uses_installed_name() {
        let layout = PrefixLayout::new("/usr/local");
        let rule = InstallRule::new(
            "unity3d-completion.zsh",
            DestinationRole::Completion(Shell::Zsh),
            Some("_unity3d"),
        )
        .expect("valid rule");
        assert_eq!(
            layout.destination_of(&rule),
            Utf8PathBuf::from("/usr/local/share/zsh/site-functions/_unity3d")
        );
    }
}
