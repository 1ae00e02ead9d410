//! Error types for the keg installer.
//!
//! This module defines the semantic error variants reported to the user when
//! an installation fails. Every variant is fatal; none is retried. Each kind
//! maps onto a distinct process exit code so that scripts can tell a network
//! problem from a tampered payload.

use crate::fetch::FetchError;
use crate::payload::UnpackError;
use crate::smoke::SmokeTestError;
use crate::stager::StageError;
use crate::verify::VerifyError;
use keg::digest::Sha256Digest;
use keg::error::FormulaError;
use thiserror::Error;

/// Errors that can occur while installing a formula.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The source resource could not be fetched.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The fetched resource does not hash to the declared digest.
    #[error("integrity check failed for {url}: expected sha256 {expected}, got {actual}")]
    Integrity {
        /// The URL the resource was fetched from.
        url: String,
        /// The digest declared in the formula.
        expected: Sha256Digest,
        /// The digest of the bytes actually received.
        actual: Sha256Digest,
    },

    /// The verified resource could not be unpacked.
    #[error("unpack failed: {0}")]
    Unpack(#[from] UnpackError),

    /// Files could not be written to their destinations.
    #[error("install failed: {0}")]
    Install(#[from] StageError),

    /// The installed executable failed its post-install check.
    #[error("smoke test failed: {0} (installed files were left in place)")]
    SmokeTest(#[from] SmokeTestError),

    /// The formula is invalid.
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// Installer configuration could not be resolved.
    #[error("configuration error: {reason}")]
    Config {
        /// Description of the configuration problem.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

impl InstallerError {
    /// Return the process exit code for this error.
    ///
    /// | Code | Meaning                                  |
    /// |------|------------------------------------------|
    /// | 1    | formula, configuration or output errors  |
    /// | 2    | fetch failure                            |
    /// | 3    | digest mismatch                          |
    /// | 4    | unpack or filesystem failure             |
    /// | 5    | smoke test failure                       |
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Fetch(_) => 2,
            Self::Integrity { .. } => 3,
            Self::Unpack(_) | Self::Install(_) | Self::Io(_) => 4,
            Self::SmokeTest(_) => 5,
            _ => 1,
        }
    }

    /// Build an integrity error from a verification failure.
    pub(crate) fn from_verify(url: &str, error: VerifyError) -> Self {
        match error {
            VerifyError::Mismatch { expected, actual } => Self::Integrity {
                url: url.to_owned(),
                expected,
                actual,
            },
            VerifyError::Io(source) => Self::Io(source),
        }
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn digest(fill: char) -> Sha256Digest {
        Sha256Digest::try_from(fill.to_string().repeat(64)).expect("valid digest")
    }

    #[test]
    fn integrity_error_names_both_digests() {
        let err = InstallerError::Integrity {
            url: "https://example.com/unity3d.tar.gz".to_owned(),
            expected: digest('5'),
            actual: digest('a'),
        };
        let msg = err.to_string();
        assert!(msg.contains(&"5".repeat(64)));
        assert!(msg.contains(&"a".repeat(64)));
        assert!(msg.contains("unity3d.tar.gz"));
    }

    #[test]
    fn smoke_test_error_mentions_files_remain() {
        let err = InstallerError::SmokeTest(SmokeTestError::TimedOut {
            command: "/p/bin/unity3d -h".to_owned(),
            secs: 60,
        });
        let msg = err.to_string();
        assert!(msg.contains("left in place"));
        assert!(msg.contains("unity3d -h"));
    }

    #[rstest]
    #[case::fetch(InstallerError::Fetch(FetchError::NotFound { url: "u".to_owned() }), 2)]
    #[case::integrity(InstallerError::Integrity { url: "u".to_owned(), expected: digest('1'), actual: digest('2') }, 3)]
    #[case::unpack(InstallerError::Unpack(UnpackError::EmptyArchive), 4)]
    #[case::io(InstallerError::Io(std::io::Error::other("disk full")), 4)]
    #[case::smoke(InstallerError::SmokeTest(SmokeTestError::TimedOut { command: "c".to_owned(), secs: 1 }), 5)]
    #[case::formula(InstallerError::Formula(FormulaError::NoInstallRules), 1)]
    #[case::config(InstallerError::Config { reason: "no home".to_owned() }, 1)]
    fn exit_codes_distinguish_error_kinds(#[case] err: InstallerError, #[case] expected: i32) {
        assert_eq!(err.exit_code(), expected);
    }

    #[test]
    fn verify_mismatch_becomes_integrity_error() {
        let err = InstallerError::from_verify(
            "https://example.com/x",
            VerifyError::Mismatch {
                expected: digest('5'),
                actual: digest('6'),
            },
        );
        assert!(matches!(err, InstallerError::Integrity { .. }));
    }

    #[test]
    fn write_failed_preserves_source() {
        let err = InstallerError::WriteFailed {
            source: std::io::Error::other("broken pipe"),
        };
        assert!(err.to_string().contains("write"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
