//! Package descriptor ("formula") model and TOML loader.
//!
//! A formula declares where a prebuilt artefact lives, the SHA-256 digest it
//! must hash to, and how its files map onto the installation prefix. All
//! validation runs during deserialisation, so a [`Formula`] value is always
//! internally consistent.
//!
//! ```toml
//! name = "unity3d"
//! desc = "CLI tool for launching Unity projects with version detection"
//! homepage = "https://github.com/Arikaton/homebrew-unity3d"
//! url = "https://github.com/Arikaton/homebrew-unity3d/releases/download/v1.0.0/unity3d-1.0.0.tar.gz"
//! version = "1.0.0"
//! sha256 = "a36765c619a986671da6d8cde08a341d74d64e7989b4ed36a9d24845a73b6950"
//!
//! [[install]]
//! source = "unity3d"
//! destination = "bin"
//! ```

use crate::caveat::CaveatTemplate;
use crate::digest::Sha256Digest;
use crate::error::{FormulaError, Result};
use crate::install_rule::{DestinationRole, InstallRule};
use camino::Utf8Path;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use url::Url;

/// URL schemes a formula may fetch from.
const SUPPORTED_SCHEMES: &[&str] = &["https", "http", "file"];

/// A validated source URL.
///
/// # Examples
///
/// ```
/// use keg::formula::SourceUrl;
///
/// let url = SourceUrl::try_from("https://example.com/dl/unity3d-1.0.0.tar.gz")
///     .expect("valid URL");
/// assert_eq!(url.file_name(), Some("unity3d-1.0.0.tar.gz"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceUrl(Url);

impl SourceUrl {
    /// Return the URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Return the parsed URL.
    #[must_use]
    pub const fn as_url(&self) -> &Url {
        &self.0
    }

    /// Return the URL scheme (`https`, `http` or `file`).
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Return the last non-empty path segment, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.0
            .path_segments()
            .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
    }
}

impl TryFrom<&str> for SourceUrl {
    type Error = FormulaError;

    fn try_from(value: &str) -> Result<Self> {
        let url = Url::parse(value).map_err(|e| FormulaError::InvalidUrl {
            value: value.to_owned(),
            reason: e.to_string(),
        })?;
        if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
            return Err(FormulaError::InvalidUrl {
                value: value.to_owned(),
                reason: format!(
                    "unsupported scheme \"{}\"; expected one of: {}",
                    url.scheme(),
                    SUPPORTED_SCHEMES.join(", ")
                ),
            });
        }
        Ok(Self(url))
    }
}

impl TryFrom<String> for SourceUrl {
    type Error = FormulaError;

    fn try_from(value: String) -> Result<Self> {
        Self::try_from(value.as_str())
    }
}

impl From<SourceUrl> for String {
    fn from(value: SourceUrl) -> Self {
        value.0.into()
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the fetched resource is turned into a payload directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PayloadKind {
    /// A single file, installed as fetched.
    Raw,
    /// An uncompressed tarball.
    Tar,
    /// A gzip-compressed tarball (`.tar.gz` or `.tgz`).
    TarGz,
    /// A zstd-compressed tarball.
    TarZst,
    /// A zip archive.
    Zip,
}

impl PayloadKind {
    const NAMES: &'static str = "raw, tar, tar.gz, tgz, tar.zst, zip";

    /// Infer the payload kind from a file name.
    ///
    /// Anything without a recognised archive suffix is a raw file.
    ///
    /// # Examples
    ///
    /// ```
    /// use keg::formula::PayloadKind;
    ///
    /// assert_eq!(PayloadKind::infer("unity3d-1.0.0.tar.gz"), PayloadKind::TarGz);
    /// assert_eq!(PayloadKind::infer("unity3d"), PayloadKind::Raw);
    /// ```
    #[must_use]
    pub fn infer(file_name: &str) -> Self {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else if lower.ends_with(".tar.zst") || lower.ends_with(".tzst") {
            Self::TarZst
        } else if lower.ends_with(".tar") {
            Self::Tar
        } else if lower.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Raw
        }
    }

    /// Return the canonical name used in formula files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::TarZst => "tar.zst",
            Self::Zip => "zip",
        }
    }
}

impl TryFrom<&str> for PayloadKind {
    type Error = FormulaError;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "raw" => Ok(Self::Raw),
            "tar" => Ok(Self::Tar),
            "tar.gz" | "tgz" => Ok(Self::TarGz),
            "tar.zst" => Ok(Self::TarZst),
            "zip" => Ok(Self::Zip),
            other => Err(FormulaError::UnknownPayloadKind {
                value: other.to_owned(),
                expected: Self::NAMES.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for PayloadKind {
    type Error = FormulaError;

    fn try_from(value: String) -> Result<Self> {
        Self::try_from(value.as_str())
    }
}

impl From<PayloadKind> for String {
    fn from(value: PayloadKind) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-install smoke test settings from the `[test]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmokeTest {
    /// Arguments passed to the installed executable.
    pub args: Vec<String>,
    /// Installed executable name; defaults to the first `bin` rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    /// Upper bound on the smoke test's run time, overriding configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl SmokeTest {
    /// Return the per-formula timeout override, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for SmokeTest {
    /// Invoke the executable with `-h`, the usual help-flag check.
    fn default() -> Self {
        Self {
            args: vec!["-h".to_owned()],
            executable: None,
            timeout_secs: None,
        }
    }
}

/// A formula as written, before cross-field validation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFormula {
    name: String,
    desc: String,
    homepage: String,
    url: SourceUrl,
    version: String,
    sha256: Sha256Digest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<PayloadKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    caveats: Option<CaveatTemplate>,
    #[serde(default)]
    install: Vec<InstallRule>,
    #[serde(default)]
    test: SmokeTest,
}

/// A validated package descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFormula", into = "RawFormula")]
pub struct Formula {
    name: String,
    desc: String,
    homepage: String,
    url: SourceUrl,
    version: String,
    sha256: Sha256Digest,
    payload: PayloadKind,
    caveats: Option<CaveatTemplate>,
    install: Vec<InstallRule>,
    test: SmokeTest,
}

impl Formula {
    /// Parse a formula from TOML text.
    ///
    /// `origin` names the document in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::Parse`] when the document is not valid TOML
    /// or any field fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use keg::formula::{Formula, PayloadKind};
    ///
    /// let source = concat!(
    ///     "name = \"unity3d\"\n",
    ///     "desc = \"CLI tool for launching Unity projects\"\n",
    ///     "homepage = \"https://github.com/Arikaton/homebrew-unity3d\"\n",
    ///     "url = \"https://example.com/unity3d-1.0.0.tar.gz\"\n",
    ///     "version = \"1.0.0\"\n",
    ///     "sha256 = \"a36765c619a986671da6d8cde08a341d74d64e7989b4ed36a9d24845a73b6950\"\n",
    ///     "[[install]]\n",
    ///     "source = \"unity3d\"\n",
    ///     "destination = \"bin\"\n",
    /// );
    /// let formula = Formula::from_toml_str(source, "unity3d.toml").expect("valid formula");
    /// assert_eq!(formula.payload_kind(), PayloadKind::TarGz);
    /// assert_eq!(formula.smoke_test_executable(), Some("unity3d"));
    /// ```
    pub fn from_toml_str(source: &str, origin: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| FormulaError::Parse {
            origin: origin.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Read and parse a formula file.
    ///
    /// # Errors
    ///
    /// Returns [`FormulaError::Read`] if the file cannot be read, or any
    /// error from [`Formula::from_toml_str`].
    pub fn load(path: &Utf8Path) -> Result<Self> {
        debug!("loading formula from {path}");
        let source = std::fs::read_to_string(path).map_err(|e| FormulaError::Read {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source, path.as_str())
    }

    /// Return the package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the human-readable description.
    #[must_use]
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Return the homepage URL.
    #[must_use]
    pub fn homepage(&self) -> &str {
        &self.homepage
    }

    /// Return the source URL.
    #[must_use]
    pub const fn url(&self) -> &SourceUrl {
        &self.url
    }

    /// Return the version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Return the expected digest of the fetched resource.
    #[must_use]
    pub const fn sha256(&self) -> &Sha256Digest {
        &self.sha256
    }

    /// Return the payload kind, explicit or inferred from the URL.
    #[must_use]
    pub const fn payload_kind(&self) -> PayloadKind {
        self.payload
    }

    /// Return the file name the fetched resource is stored under.
    ///
    /// This is the URL's last path segment, or the package name when the URL
    /// has none.
    #[must_use]
    pub fn payload_file_name(&self) -> &str {
        self.url.file_name().unwrap_or(&self.name)
    }

    /// Return the caveat template, if the formula declares one.
    #[must_use]
    pub const fn caveats(&self) -> Option<&CaveatTemplate> {
        self.caveats.as_ref()
    }

    /// Return the install rules in declaration order.
    #[must_use]
    pub fn install_rules(&self) -> &[InstallRule] {
        &self.install
    }

    /// Return the smoke test settings.
    #[must_use]
    pub const fn smoke_test(&self) -> &SmokeTest {
        &self.test
    }

    /// Return the installed executable name the smoke test invokes.
    ///
    /// `None` means the formula installs nothing into the bin directory and
    /// names no executable, so there is nothing to run.
    #[must_use]
    pub fn smoke_test_executable(&self) -> Option<&str> {
        self.test.executable.as_deref().or_else(|| {
            self.install
                .iter()
                .find(|rule| rule.destination().is_executable())
                .map(InstallRule::installed_name)
        })
    }
}

impl TryFrom<RawFormula> for Formula {
    type Error = FormulaError;

    fn try_from(raw: RawFormula) -> Result<Self> {
        validate_name(&raw.name)?;
        validate_rules(&raw.install)?;
        if let Some(executable) = raw.test.executable.as_deref() {
            let installed = raw.install.iter().any(|rule| {
                rule.destination().is_executable() && rule.installed_name() == executable
            });
            if !installed {
                return Err(FormulaError::UnknownSmokeTestExecutable {
                    executable: executable.to_owned(),
                });
            }
        }
        let payload = raw.payload.unwrap_or_else(|| {
            PayloadKind::infer(raw.url.file_name().unwrap_or_default())
        });

        Ok(Self {
            name: raw.name,
            desc: raw.desc,
            homepage: raw.homepage,
            url: raw.url,
            version: raw.version,
            sha256: raw.sha256,
            payload,
            caveats: raw.caveats,
            install: raw.install,
            test: raw.test,
        })
    }
}

impl From<Formula> for RawFormula {
    fn from(formula: Formula) -> Self {
        Self {
            name: formula.name,
            desc: formula.desc,
            homepage: formula.homepage,
            url: formula.url,
            version: formula.version,
            sha256: formula.sha256,
            payload: Some(formula.payload),
            caveats: formula.caveats,
            install: formula.install,
            test: formula.test,
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("name is empty")
    } else if name.contains(['/', '\\']) {
        Some("name contains a path separator")
    } else if name == "." || name == ".." {
        Some("name is a relative directory reference")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(FormulaError::InvalidName {
            value: name.to_owned(),
            reason: reason.to_owned(),
        }),
        None => Ok(()),
    }
}

fn validate_rules(rules: &[InstallRule]) -> Result<()> {
    if rules.is_empty() {
        return Err(FormulaError::NoInstallRules);
    }
    let mut seen: HashSet<(DestinationRole, &str)> = HashSet::new();
    for rule in rules {
        if !seen.insert((rule.destination(), rule.installed_name())) {
            return Err(FormulaError::DuplicateDestination {
                destination: format!("{}/{}", rule.destination(), rule.installed_name()),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "formula_tests.rs"]
mod tests;
