//! Install rules mapping payload files to destination roles.
//!
//! A rule names a file inside the fetched payload and the role of the
//! directory it is copied into. Roles are resolved to concrete directories by
//! [`crate::layout::PrefixLayout`], so a rule never carries an absolute path.

use crate::error::{FormulaError, Result};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shells with a conventional completion directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    /// GNU Bash.
    Bash,
    /// Z shell.
    Zsh,
    /// Fish shell.
    Fish,
}

impl Shell {
    /// Return the lowercase shell name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
            Self::Fish => "fish",
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The role of the directory an installed file lands in.
///
/// In formula files the role is written as `"bin"` or
/// `"<shell>-completion"`.
///
/// # Examples
///
/// ```
/// use keg::install_rule::{DestinationRole, Shell};
///
/// let role = DestinationRole::try_from("zsh-completion").expect("known role");
/// assert_eq!(role, DestinationRole::Completion(Shell::Zsh));
/// assert_eq!(role.to_string(), "zsh-completion");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DestinationRole {
    /// The executable-binaries directory.
    ExecutableDir,
    /// The completion directory for a particular shell.
    Completion(Shell),
}

impl DestinationRole {
    /// Return true for the executable-binaries role.
    #[must_use]
    pub const fn is_executable(self) -> bool {
        matches!(self, Self::ExecutableDir)
    }

    /// Return the Unix permission bits an installed file receives.
    #[must_use]
    pub const fn file_mode(self) -> u32 {
        match self {
            Self::ExecutableDir => 0o755,
            Self::Completion(_) => 0o644,
        }
    }
}

impl TryFrom<&str> for DestinationRole {
    type Error = FormulaError;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "bin" => Ok(Self::ExecutableDir),
            "bash-completion" => Ok(Self::Completion(Shell::Bash)),
            "zsh-completion" => Ok(Self::Completion(Shell::Zsh)),
            "fish-completion" => Ok(Self::Completion(Shell::Fish)),
            other => Err(FormulaError::InvalidInstallRule {
                source_path: String::new(),
                reason: format!(
                    "unknown destination \"{other}\"; expected bin, bash-completion, zsh-completion or fish-completion"
                ),
            }),
        }
    }
}

impl TryFrom<String> for DestinationRole {
    type Error = FormulaError;

    fn try_from(value: String) -> Result<Self> {
        Self::try_from(value.as_str())
    }
}

impl From<DestinationRole> for String {
    fn from(value: DestinationRole) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DestinationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutableDir => f.write_str("bin"),
            Self::Completion(shell) => write!(f, "{shell}-completion"),
        }
    }
}

/// A rule as written in a formula, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInstallRule {
    source: String,
    destination: DestinationRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rename: Option<String>,
}

/// A validated install rule.
///
/// # Examples
///
/// ```
/// use keg::install_rule::{DestinationRole, InstallRule, Shell};
///
/// let rule = InstallRule::new(
///     "unity3d-completion.zsh",
///     DestinationRole::Completion(Shell::Zsh),
///     Some("_unity3d"),
/// )
/// .expect("valid rule");
/// assert_eq!(rule.installed_name(), "_unity3d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawInstallRule", into = "RawInstallRule")]
pub struct InstallRule {
    source: Utf8PathBuf,
    destination: DestinationRole,
    installed_name: String,
}

impl InstallRule {
    /// Build a rule, validating the source path and installed name.
    ///
    /// When `rename` is `None` the installed name is the source's file name.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::InvalidInstallRule`] when the source is
    /// absolute, contains `..`, or has no file name, or when the installed
    /// name is not a single plain path component.
    pub fn new(
        source: impl Into<Utf8PathBuf>,
        destination: DestinationRole,
        rename: Option<&str>,
    ) -> Result<Self> {
        let source = source.into();
        validate_source(&source)?;
        let installed_name = match rename {
            Some(name) => name.to_owned(),
            None => source
                .file_name()
                .map(str::to_owned)
                .ok_or_else(|| invalid(&source, "source has no file name"))?,
        };
        validate_installed_name(&source, &installed_name)?;
        Ok(Self {
            source,
            destination,
            installed_name,
        })
    }

    /// Return the source path relative to the payload root.
    #[must_use]
    pub fn source(&self) -> &Utf8Path {
        &self.source
    }

    /// Return the destination role.
    #[must_use]
    pub const fn destination(&self) -> DestinationRole {
        self.destination
    }

    /// Return the file name the source is installed under.
    #[must_use]
    pub fn installed_name(&self) -> &str {
        &self.installed_name
    }
}

impl TryFrom<RawInstallRule> for InstallRule {
    type Error = FormulaError;

    fn try_from(raw: RawInstallRule) -> Result<Self> {
        Self::new(raw.source, raw.destination, raw.rename.as_deref())
    }
}

impl From<InstallRule> for RawInstallRule {
    fn from(rule: InstallRule) -> Self {
        let rename = (rule.source.file_name() != Some(rule.installed_name.as_str()))
            .then_some(rule.installed_name);
        Self {
            source: rule.source.into_string(),
            destination: rule.destination,
            rename,
        }
    }
}

fn invalid(source: &Utf8Path, reason: &str) -> FormulaError {
    FormulaError::InvalidInstallRule {
        source_path: source.to_string(),
        reason: reason.to_owned(),
    }
}

fn validate_source(source: &Utf8Path) -> Result<()> {
    if source.as_str().is_empty() {
        return Err(invalid(source, "source is empty"));
    }
    if source.is_absolute() || source.has_root() {
        return Err(invalid(source, "source must be relative to the payload"));
    }
    if source
        .components()
        .any(|component| matches!(component, Utf8Component::ParentDir))
    {
        return Err(invalid(source, "source must not contain '..'"));
    }
    Ok(())
}

fn validate_installed_name(source: &Utf8Path, name: &str) -> Result<()> {
    let mut components = Utf8Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Utf8Component::Normal(part)), None) if part == name
    );
    if !single_normal {
        return Err(invalid(
            source,
            &format!("installed name \"{name}\" must be a plain file name"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::bin("bin", DestinationRole::ExecutableDir)]
    #[case::bash("bash-completion", DestinationRole::Completion(Shell::Bash))]
    #[case::zsh("zsh-completion", DestinationRole::Completion(Shell::Zsh))]
    #[case::fish("fish-completion", DestinationRole::Completion(Shell::Fish))]
    fn parses_destination_roles(#[case] text: &str, #[case] expected: DestinationRole) {
        let role = DestinationRole::try_from(text).expect("known role");
        assert_eq!(role, expected);
        assert_eq!(role.to_string(), text);
    }

    #[test]
    fn rejects_unknown_role() {
        let err = DestinationRole::try_from("man1").expect_err("unknown role");
        assert!(err.to_string().contains("man1"));
    }

    #[test]
    fn executable_role_gets_execute_bits() {
        assert_eq!(DestinationRole::ExecutableDir.file_mode(), 0o755);
        assert_eq!(DestinationRole::Completion(Shell::Bash).file_mode(), 0o644);
    }

    #[test]
    fn installed_name_defaults_to_source_file_name() {
        let rule = InstallRule::new("dist/unity3d", DestinationRole::ExecutableDir, None)
            .expect("valid rule");
        assert_eq!(rule.installed_name(), "unity3d");
        assert_eq!(rule.source(), Utf8Path::new("dist/unity3d"));
    }

    #[rstest]
    #[case::absolute("/usr/bin/unity3d")]
    #[case::parent("../unity3d")]
    #[case::nested_parent("bin/../../unity3d")]
    #[case::empty("")]
    fn rejects_escaping_sources(#[case] source: &str) {
        let result = InstallRule::new(source, DestinationRole::ExecutableDir, None);
        assert!(
            matches!(result, Err(FormulaError::InvalidInstallRule { .. })),
            "expected rejection for {source:?}"
        );
    }

    #[rstest]
    #[case::nested("completions/_unity3d")]
    #[case::parent("..")]
    #[case::dot(".")]
    #[case::empty("")]
    fn rejects_non_plain_renames(#[case] rename: &str) {
        let result = InstallRule::new(
            "unity3d-completion.zsh",
            DestinationRole::Completion(Shell::Zsh),
            Some(rename),
        );
        assert!(result.is_err(), "expected rejection for rename {rename:?}");
    }

    #[test]
    fn deserialises_rule_with_rename() {
        let source = concat!(
            "source = \"unity3d-completion.zsh\"\n",
            "destination = \"zsh-completion\"\n",
            "rename = \"_unity3d\"\n",
        );
        let rule: InstallRule = toml::from_str(source).expect("valid rule");
        assert_eq!(rule.destination(), DestinationRole::Completion(Shell::Zsh));
        assert_eq!(rule.installed_name(), "_unity3d");
    }

    #[test]
    fn rejects_unknown_rule_keys() {
        let source = "source = \"unity3d\"\ndestination = \"bin\"\nmode = 493\n";
        let result: std::result::Result<InstallRule, _> = toml::from_str(source);
        assert!(result.is_err());
    }
}
