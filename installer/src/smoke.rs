//! Post-install smoke test.
//!
//! Runs the installed executable with the formula's test arguments (by
//! default `-h`) and requires a zero exit status within a bounded time.
//! Command execution sits behind [`CommandExecutor`] so tests can replay
//! canned outputs instead of spawning processes.

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::io::Read;
use std::process::{Command, ExitStatus, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Errors arising from the smoke test.
#[derive(Debug, thiserror::Error)]
pub enum SmokeTestError {
    /// The executable under test is not present after installation.
    #[error("installed executable not found at {path}")]
    MissingExecutable {
        /// Where the executable was expected.
        path: Utf8PathBuf,
    },

    /// The executable could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// The command line that was attempted.
        command: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The executable did not finish in time and was killed.
    #[error("`{command}` timed out after {secs} seconds")]
    TimedOut {
        /// The command line that was run.
        command: String,
        /// The timeout that elapsed.
        secs: u64,
    },

    /// The executable exited unsuccessfully.
    #[error("`{command}` exited with {status}{}", stderr_suffix(.stderr))]
    Failed {
        /// The command line that was run.
        command: String,
        /// Human-readable exit status.
        status: String,
        /// Trimmed standard error captured from the run.
        stderr: String,
    },

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Trait for executing the installed program.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Run `program` with `args`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeTestError::Spawn`] if the program cannot be started
    /// and [`SmokeTestError::TimedOut`] if it outlives `timeout`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use camino::Utf8Path;
    /// use keg_installer::smoke::{CommandExecutor, SystemCommandExecutor};
    /// use std::time::Duration;
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run(
    ///     Utf8Path::new("/usr/local/bin/unity3d"),
    ///     &["-h".to_owned()],
    ///     Duration::from_secs(60),
    /// )?;
    /// assert!(output.status.success());
    /// # Ok::<(), keg_installer::smoke::SmokeTestError>(())
    /// ```
    fn run(
        &self,
        program: &Utf8Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<Output, SmokeTestError>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(
        &self,
        program: &Utf8Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<Output, SmokeTestError> {
        let command = command_line(program, args);
        let spawn_error = |source| SmokeTestError::Spawn {
            command: command.clone(),
            source,
        };
        let mut child = Command::new(program.as_std_path())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        match child.wait_timeout(timeout).map_err(spawn_error)? {
            Some(status) => Ok(Output {
                status,
                stdout: drain(child.stdout.take()),
                stderr: drain(child.stderr.take()),
            }),
            None => {
                if let Err(e) = child.kill() {
                    debug!("failed to kill timed-out smoke test: {e}");
                }
                if let Err(e) = child.wait() {
                    debug!("failed to reap timed-out smoke test: {e}");
                }
                Err(SmokeTestError::TimedOut {
                    command,
                    secs: timeout.as_secs(),
                })
            }
        }
    }
}

/// Read a finished child's pipe to the end, tolerating read failures.
fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe
        && let Err(e) = pipe.read_to_end(&mut buf)
    {
        debug!("failed to read smoke test output: {e}");
    }
    buf
}

/// Render `program args...` for messages.
#[must_use]
pub fn command_line(program: &Utf8Path, args: &[String]) -> String {
    std::iter::once(program.as_str())
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Describe an exit status for a message.
fn describe_status(status: ExitStatus) -> String {
    status
        .code()
        .map_or_else(|| "termination by signal".to_owned(), |code| format!("status {code}"))
}

/// Run the smoke test against an installed executable.
///
/// Returns the command line that passed.
///
/// # Errors
///
/// Returns [`SmokeTestError::MissingExecutable`] when `executable` is not a
/// file, [`SmokeTestError::Failed`] on a non-zero exit, or any error from
/// the executor.
pub fn run_smoke_test(
    executor: &dyn CommandExecutor,
    executable: &Utf8Path,
    args: &[String],
    timeout: Duration,
) -> Result<String, SmokeTestError> {
    if !executable.is_file() {
        return Err(SmokeTestError::MissingExecutable {
            path: executable.to_owned(),
        });
    }
    let command = command_line(executable, args);
    info!("running smoke test: {command}");

    let output = executor.run(executable, args, timeout)?;
    if output.status.success() {
        debug!(
            "smoke test stdout: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(command)
    } else {
        Err(SmokeTestError::Failed {
            command,
            status: describe_status(output.status),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{exit_status, failure_output, success_output};

    fn installed_file() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join("unity3d")).expect("UTF-8 path");
        std::fs::write(&path, b"#!/bin/sh\nexit 0\n").expect("write");
        (dir, path)
    }

    fn help_args() -> Vec<String> {
        vec!["-h".to_owned()]
    }

    #[test]
    fn passes_on_zero_exit() {
        let (_dir, path) = installed_file();
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(|program, args, _| {
                program.as_str().ends_with("unity3d") && args.to_vec() == help_args()
            })
            .times(1)
            .returning(|_, _, _| Ok(success_output()));

        let command = run_smoke_test(&executor, &path, &help_args(), Duration::from_secs(5))
            .expect("smoke test passes");

        assert!(command.ends_with("unity3d -h"));
    }

    #[test]
    fn reports_non_zero_exit_with_stderr() {
        let (_dir, path) = installed_file();
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .returning(|_, _, _| Ok(failure_output("unknown option -h\n")));

        let err = run_smoke_test(&executor, &path, &help_args(), Duration::from_secs(5))
            .expect_err("non-zero exit fails");

        let msg = err.to_string();
        assert!(msg.contains("status 1"), "got: {msg}");
        assert!(msg.contains("unknown option -h"), "got: {msg}");
    }

    #[test]
    fn omits_empty_stderr_from_message() {
        let (_dir, path) = installed_file();
        let mut executor = MockCommandExecutor::new();
        executor.expect_run().returning(|_, _, _| {
            Ok(Output {
                status: exit_status(2),
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        });

        let err = run_smoke_test(&executor, &path, &help_args(), Duration::from_secs(5))
            .expect_err("non-zero exit fails");

        assert!(err.to_string().ends_with("status 2"), "got: {err}");
    }

    #[test]
    fn missing_executable_is_not_run() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join("absent")).expect("UTF-8 path");
        let mut executor = MockCommandExecutor::new();
        executor.expect_run().never();

        let err = run_smoke_test(&executor, &path, &help_args(), Duration::from_secs(5))
            .expect_err("missing executable fails");

        assert!(matches!(err, SmokeTestError::MissingExecutable { .. }));
    }

    #[test]
    fn command_line_joins_arguments() {
        let line = command_line(
            Utf8Path::new("/opt/keg/bin/unity3d"),
            &["--version".to_owned(), "-q".to_owned()],
        );
        assert_eq!(line, "/opt/keg/bin/unity3d --version -q");
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_runs_scripts() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, path) = installed_file();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        let output = SystemCommandExecutor
            .run(&path, &help_args(), Duration::from_secs(10))
            .expect("script runs");

        assert!(output.status.success());
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_kills_on_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join("sleeper")).expect("UTF-8 path");
        std::fs::write(&path, b"#!/bin/sh\nexec sleep 30\n").expect("write");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        let err = SystemCommandExecutor
            .run(&path, &[], Duration::from_millis(200))
            .expect_err("sleeper times out");

        assert!(matches!(err, SmokeTestError::TimedOut { .. }));
    }
}
