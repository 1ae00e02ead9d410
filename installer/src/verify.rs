//! SHA-256 verification of fetched resources.
//!
//! Nothing downstream of a fetch touches the payload until its digest has
//! been compared against the formula's declared value.

use keg::digest::Sha256Digest;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Errors arising from digest verification.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The resource hashes to a different digest.
    #[error("expected sha256 {expected}, got {actual}")]
    Mismatch {
        /// The digest declared in the formula.
        expected: Sha256Digest,
        /// The digest of the file on disk.
        actual: Sha256Digest,
    },

    /// The resource could not be read.
    #[error("failed to read resource for hashing: {0}")]
    Io(#[from] std::io::Error),
}

/// Compute the SHA-256 digest of a file.
///
/// Reads the file in 8 KiB chunks and returns the hex-encoded digest.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or read.
pub fn compute_sha256(path: &Path) -> std::io::Result<Sha256Digest> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(Sha256Digest::from_bytes(hasher.finalize().into()))
}

/// Check that the file at `path` hashes to `expected`.
///
/// Returns the computed digest on success so callers can report it.
///
/// # Errors
///
/// Returns [`VerifyError::Mismatch`] when the digests differ, or
/// [`VerifyError::Io`] when the file cannot be read.
pub fn verify_digest(path: &Path, expected: &Sha256Digest) -> Result<Sha256Digest, VerifyError> {
    let actual = compute_sha256(path)?;
    if &actual == expected {
        Ok(actual)
    } else {
        Err(VerifyError::Mismatch {
            expected: expected.clone(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SHA-256 of the ASCII bytes `hello world`.
    const HELLO_SHA: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn write_hello() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("hello.txt");
        fs::write(&path, b"hello world").expect("write");
        (dir, path)
    }

    #[test]
    fn computes_known_digest() {
        let (_dir, path) = write_hello();
        let digest = compute_sha256(&path).expect("hash");
        assert_eq!(digest.as_str(), HELLO_SHA);
    }

    #[test]
    fn hashes_files_larger_than_one_buffer() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("big.bin");
        let data = vec![0x5a_u8; 20_000];
        fs::write(&path, &data).expect("write");

        let streamed = compute_sha256(&path).expect("hash");
        let direct = Sha256Digest::from_bytes(Sha256::digest(&data).into());
        assert_eq!(streamed, direct);
    }

    #[test]
    fn accepts_matching_digest() {
        let (_dir, path) = write_hello();
        let expected = Sha256Digest::try_from(HELLO_SHA).expect("valid digest");
        let actual = verify_digest(&path, &expected).expect("digests match");
        assert_eq!(actual, expected);
    }

    #[test]
    fn uppercase_declaration_still_matches() {
        let (_dir, path) = write_hello();
        let expected =
            Sha256Digest::try_from(HELLO_SHA.to_ascii_uppercase()).expect("valid digest");
        assert!(verify_digest(&path, &expected).is_ok());
    }

    #[test]
    fn rejects_mismatched_digest() {
        let (_dir, path) = write_hello();
        let expected = Sha256Digest::try_from(
            "53a166b8b3d0e9a8b3c3d4f4ab1e0c1d2e3f4a5b6c7d8e9f0a1b2c3d4e5f6a7b",
        )
        .expect("valid digest");

        let err = verify_digest(&path, &expected).expect_err("digests differ");

        match err {
            VerifyError::Mismatch { expected: e, actual } => {
                assert_eq!(e, expected);
                assert_eq!(actual.as_str(), HELLO_SHA);
            }
            VerifyError::Io(e) => panic!("unexpected I/O error: {e}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let expected = Sha256Digest::try_from(HELLO_SHA).expect("valid digest");
        let err = verify_digest(&dir.path().join("absent"), &expected).expect_err("missing");
        assert!(matches!(err, VerifyError::Io(_)));
    }
}
