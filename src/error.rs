//! Error types for formula and configuration loading.
//!
//! Each variant names the offending input and the constraint it violated so
//! that a maintainer editing a formula can fix it without reading the source.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors arising from invalid formula or configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// A SHA-256 digest is not a valid 64-character hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidSha256Digest {
        /// Description of the validation failure.
        reason: String,
    },

    /// The package name is empty or would escape its destination directory.
    #[error("invalid package name \"{value}\": {reason}")]
    InvalidName {
        /// The rejected name.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// The source URL cannot be parsed or uses an unsupported scheme.
    #[error("invalid source URL \"{value}\": {reason}")]
    InvalidUrl {
        /// The rejected URL string.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// An install rule names a source or destination that is not allowed.
    #[error("invalid install rule for \"{source_path}\": {reason}")]
    InvalidInstallRule {
        /// The rule's source path as written in the formula.
        source_path: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// The formula declares no install rules.
    #[error("formula declares no install rules")]
    NoInstallRules,

    /// Two install rules resolve to the same destination file.
    #[error("install rules collide on destination \"{destination}\"")]
    DuplicateDestination {
        /// The destination shared by more than one rule.
        destination: String,
    },

    /// A caveat template contains an unknown placeholder or bad brace.
    #[error("invalid caveat template: {reason}")]
    InvalidCaveat {
        /// Description of the template error.
        reason: String,
    },

    /// The payload kind string is not one of the supported kinds.
    #[error("unknown payload kind \"{value}\"; expected one of: {expected}")]
    UnknownPayloadKind {
        /// The rejected payload kind.
        value: String,
        /// Comma-separated list of accepted kinds.
        expected: String,
    },

    /// The smoke test names an executable no install rule provides.
    #[error("smoke test executable \"{executable}\" is not installed to the bin directory")]
    UnknownSmokeTestExecutable {
        /// The executable named in the `[test]` table.
        executable: String,
    },

    /// A formula or configuration file could not be read.
    #[error("failed to read {path}: {reason}")]
    Read {
        /// The file that could not be read.
        path: Utf8PathBuf,
        /// Description of the I/O failure.
        reason: String,
    },

    /// A formula or configuration document is not valid TOML for its schema.
    #[error("failed to parse {origin}: {reason}")]
    Parse {
        /// The document's origin (a path, or `<inline>`).
        origin: String,
        /// The parser's message.
        reason: String,
    },
}

/// Result type alias using [`FormulaError`].
pub type Result<T> = std::result::Result<T, FormulaError>;
