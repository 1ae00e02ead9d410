//! keg installer library.
//!
//! This crate fetches the resource a [`keg::Formula`] names, verifies its
//! SHA-256 digest, unpacks it, and installs the formula's files into a prefix
//! transactionally. It is used by the `keg-installer` CLI binary and can be
//! consumed programmatically for testing or custom installation workflows.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Semantic error types with exit codes
//! - [`fetch`] - HTTP(S) and `file://` resource download
//! - [`lock`] - Advisory lock serialising installs into one prefix
//! - [`output`] - Progress, caveat and dry-run formatting
//! - [`payload`] - Archive extraction and raw resource placement
//! - [`pipeline`] - Install and fetch orchestration
//! - [`settings`] - Configuration file and prefix resolution
//! - [`smoke`] - Post-install smoke test execution
//! - [`stager`] - Transactional file placement into the prefix
//! - [`verify`] - SHA-256 digest verification

pub mod cli;
pub mod dirs;
pub mod error;
pub mod fetch;
pub mod lock;
pub mod output;
pub mod payload;
pub mod pipeline;
pub mod settings;
pub mod smoke;
pub mod stager;
pub mod verify;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
