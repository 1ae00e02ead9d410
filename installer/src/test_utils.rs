//! Shared test utilities for the installer crate.
//!
//! Provides a replaying [`CommandExecutor`], a digest helper, and builders
//! for payload archives and formula files in temporary directories.

use crate::smoke::{CommandExecutor, SmokeTestError};
use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::process::{ExitStatus, Output};
use std::time::Duration;

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected program invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// File name of the program (e.g., "unity3d").
    pub program: &'static str,
    /// The arguments to pass to the program.
    pub args: Vec<&'static str>,
    /// The result to return when this program is invoked.
    pub result: Result<Output, SmokeTestError>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected invocations and returns predefined results, allowing
/// tests to verify the smoke test without spawning processes.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
    invoked: RefCell<Vec<Utf8PathBuf>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
            invoked: RefCell::new(Vec::new()),
        }
    }

    /// Creates a stub that expects no invocations at all.
    #[must_use]
    pub fn idle() -> Self {
        Self::new(Vec::new())
    }

    /// Return the full paths of every program invoked so far.
    #[must_use]
    pub fn invoked(&self) -> Vec<Utf8PathBuf> {
        self.invoked.borrow().clone()
    }

    /// Asserts that all expected invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further program invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(
        &self,
        program: &Utf8Path,
        args: &[String],
        _timeout: Duration,
    ) -> Result<Output, SmokeTestError> {
        self.invoked.borrow_mut().push(program.to_owned());
        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(SmokeTestError::StubMismatch {
                message: format!("unexpected invocation of {program}"),
            });
        };
        let args_match = args.iter().map(String::as_str).eq(call.args.iter().copied());
        if program.file_name() != Some(call.program) || !args_match {
            return Err(SmokeTestError::StubMismatch {
                message: format!(
                    "expected {} {:?}, got {program} {args:?}",
                    call.program, call.args
                ),
            });
        }
        call.result
    }
}

/// Return the lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Return the lowercase hex SHA-256 of the file at `path`.
///
/// # Panics
///
/// Panics if the file cannot be read.
#[must_use]
pub fn sha256_file(path: &Path) -> String {
    sha256_hex(&std::fs::read(path).expect("read file to hash"))
}

/// One file to place in a test archive.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveEntry<'a> {
    /// Path inside the archive.
    pub path: &'a str,
    /// File contents.
    pub contents: &'a [u8],
    /// Unix permission bits.
    pub mode: u32,
}

impl<'a> ArchiveEntry<'a> {
    /// An executable entry (`0o755`).
    #[must_use]
    pub const fn executable(path: &'a str, contents: &'a [u8]) -> Self {
        Self {
            path,
            contents,
            mode: 0o755,
        }
    }

    /// A plain entry (`0o644`).
    #[must_use]
    pub const fn plain(path: &'a str, contents: &'a [u8]) -> Self {
        Self {
            path,
            contents,
            mode: 0o644,
        }
    }
}

fn append_entries<W: Write>(builder: &mut tar::Builder<W>, entries: &[ArchiveEntry<'_>]) {
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(entry.contents.len() as u64);
        header.set_mode(entry.mode);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder
            .append_data(&mut header, entry.path, entry.contents)
            .expect("append tar entry");
    }
}

/// Write a gzip-compressed tarball holding `entries` to `path`.
///
/// # Panics
///
/// Panics if the archive cannot be written.
pub fn write_tar_gz(path: &Path, entries: &[ArchiveEntry<'_>]) {
    let file = std::fs::File::create(path).expect("create archive");
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    append_entries(&mut builder, entries);
    let encoder = builder.into_inner().expect("tar finish");
    encoder.finish().expect("gzip finish");
}

/// Write a zstd-compressed tarball holding `entries` to `path`.
///
/// # Panics
///
/// Panics if the archive cannot be written.
pub fn write_tar_zst(path: &Path, entries: &[ArchiveEntry<'_>]) {
    let file = std::fs::File::create(path).expect("create archive");
    let encoder = zstd::Encoder::new(file, 0).expect("zstd encoder");
    let mut builder = tar::Builder::new(encoder);
    append_entries(&mut builder, entries);
    let encoder = builder.into_inner().expect("tar finish");
    encoder.finish().expect("zstd finish");
}

/// Write a zip archive holding `entries` to `path`.
///
/// # Panics
///
/// Panics if the archive cannot be written.
pub fn write_zip(path: &Path, entries: &[ArchiveEntry<'_>]) {
    let file = std::fs::File::create(path).expect("create archive");
    let mut writer = zip::ZipWriter::new(file);
    for entry in entries {
        let options = zip::write::SimpleFileOptions::default().unix_permissions(entry.mode);
        writer
            .start_file(entry.path, options)
            .expect("start zip entry");
        writer.write_all(entry.contents).expect("write zip entry");
    }
    writer.finish().expect("zip finish");
}

/// Render a formula for `unity3d` whose resource lives at `url`.
///
/// Installs `unity3d` into `bin` and `unity3d-completion.zsh` as the zsh
/// completion `_unity3d`, with a caveat naming the completion directory.
#[must_use]
pub fn unity3d_formula(url: &str, sha256: &str) -> String {
    format!(
        concat!(
            "name = \"unity3d\"\n",
            "desc = \"CLI tool for launching Unity projects with version detection\"\n",
            "homepage = \"https://github.com/Arikaton/homebrew-unity3d\"\n",
            "url = \"{url}\"\n",
            "version = \"1.0.0\"\n",
            "sha256 = \"{sha256}\"\n",
            "caveats = \"\"\"\n",
            "To enable auto-completion, add this to your shell profile:\n",
            "  source {{zsh_completion}}/_unity3d\n",
            "\"\"\"\n",
            "\n",
            "[[install]]\n",
            "source = \"unity3d\"\n",
            "destination = \"bin\"\n",
            "\n",
            "[[install]]\n",
            "source = \"unity3d-completion.zsh\"\n",
            "destination = \"zsh-completion\"\n",
            "rename = \"_unity3d\"\n",
        ),
        url = url,
        sha256 = sha256,
    )
}

/// Script body used as the `unity3d` executable in test payloads.
pub const UNITY3D_SCRIPT: &[u8] = b"#!/bin/sh\necho 'usage: unity3d [project]'\n";

/// Completion body used as `unity3d-completion.zsh` in test payloads.
pub const UNITY3D_COMPLETION: &[u8] = b"#compdef unity3d\n_arguments '1:project:_files -/'\n";

/// Build the release tarball `unity3d-1.0.0.tar.gz` in `dir`.
///
/// Returns the archive path and its SHA-256.
#[must_use]
pub fn unity3d_release(dir: &Path) -> (std::path::PathBuf, String) {
    let path = dir.join("unity3d-1.0.0.tar.gz");
    write_tar_gz(
        &path,
        &[
            ArchiveEntry::executable("unity3d-1.0.0/unity3d", UNITY3D_SCRIPT),
            ArchiveEntry::plain("unity3d-1.0.0/unity3d-completion.zsh", UNITY3D_COMPLETION),
        ],
    );
    let digest = sha256_file(&path);
    (path, digest)
}

/// Return the `file://` URL for an absolute path.
///
/// # Panics
///
/// Panics if `path` is not absolute.
#[must_use]
pub fn file_url(path: &Path) -> String {
    url::Url::from_file_path(path)
        .expect("absolute path")
        .to_string()
}
