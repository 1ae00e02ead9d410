//! Transactional placement of payload files into the prefix.
//!
//! Installation happens in three phases. [`Stager::plan`] resolves every
//! install rule against the payload and fails before touching the prefix if
//! any source is missing. [`Stager::commit`] then copies each source into a
//! temporary file beside its destination, applies the role's permissions,
//! and only once every file is staged renames them into place. Existing
//! destinations are moved aside first and restored if a later rename fails,
//! so the prefix ends up either fully updated or as it was.

use camino::{Utf8Path, Utf8PathBuf};
use keg::install_rule::{DestinationRole, InstallRule};
use keg::layout::PrefixLayout;
use log::{debug, warn};
use std::collections::BTreeSet;
use std::fs;
use tempfile::NamedTempFile;

/// Errors arising from staging and committing files.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// An install rule names a file the payload does not contain.
    #[error("install source {path} not found in payload")]
    MissingSource {
        /// The missing path, relative to the payload root.
        path: Utf8PathBuf,
    },

    /// An install rule names something other than a regular file.
    #[error("install source {path} is not a regular file")]
    NotAFile {
        /// The offending path, relative to the payload root.
        path: Utf8PathBuf,
    },

    /// A destination path is occupied by a directory.
    #[error("destination {path} is a directory")]
    DestinationIsDirectory {
        /// The occupied destination.
        path: Utf8PathBuf,
    },

    /// The unpacked payload lives at a path that is not valid UTF-8.
    #[error("payload path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },

    /// Another process holds the prefix lock.
    #[error("prefix {path} is locked by another installation")]
    Locked {
        /// The prefix that is locked.
        path: Utf8PathBuf,
    },

    /// A filesystem operation failed.
    #[error("failed to {action} {path}: {source}")]
    Io {
        /// What was being attempted.
        action: &'static str,
        /// The path the operation targeted.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    pub(crate) fn io(action: &'static str, path: &Utf8Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_owned();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }
}

/// One payload file resolved to its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    source: Utf8PathBuf,
    destination: Utf8PathBuf,
    mode: u32,
}

impl PlannedFile {
    /// Return the absolute source path inside the payload.
    #[must_use]
    pub fn source(&self) -> &Utf8Path {
        &self.source
    }

    /// Return the absolute destination path inside the prefix.
    #[must_use]
    pub fn destination(&self) -> &Utf8Path {
        &self.destination
    }

    /// Return the permission bits the installed file receives.
    #[must_use]
    pub const fn mode(&self) -> u32 {
        self.mode
    }
}

/// A validated set of files ready to be committed.
#[derive(Debug)]
pub struct Stager {
    files: Vec<PlannedFile>,
}

/// A destination that has been swapped in, with the file it replaced.
struct Committed<'a> {
    destination: &'a Utf8Path,
    backup: Option<Utf8PathBuf>,
}

impl Stager {
    /// Resolve `rules` against the unpacked payload.
    ///
    /// Writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::MissingSource`] or [`StageError::NotAFile`] if
    /// a rule's source is absent or not a regular file, and
    /// [`StageError::DestinationIsDirectory`] if a destination is occupied
    /// by a directory.
    pub fn plan(
        rules: &[InstallRule],
        payload_root: &Utf8Path,
        layout: &PrefixLayout,
    ) -> Result<Self, StageError> {
        let files = rules
            .iter()
            .map(|rule| plan_file(rule, payload_root, layout))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { files })
    }

    /// Return the planned files in rule order.
    #[must_use]
    pub fn files(&self) -> &[PlannedFile] {
        &self.files
    }

    /// Stage every file and atomically swap them into place.
    ///
    /// Returns the installed destination paths. Committing the same payload
    /// twice leaves the prefix in the same state as committing it once.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Io`] if any file cannot be staged or renamed.
    /// On error the prefix is restored: replaced files come back from their
    /// backups and directories created by this call are removed.
    pub fn commit(&self) -> Result<Vec<Utf8PathBuf>, StageError> {
        let mut created_dirs = Vec::new();
        let outcome = self.stage_and_swap(&mut created_dirs);
        if outcome.is_err() {
            remove_created_dirs(&created_dirs);
        }
        outcome
    }

    fn stage_and_swap(
        &self,
        created_dirs: &mut Vec<Utf8PathBuf>,
    ) -> Result<Vec<Utf8PathBuf>, StageError> {
        let dirs: BTreeSet<&Utf8Path> = self
            .files
            .iter()
            .filter_map(|file| file.destination.parent())
            .collect();
        for dir in dirs {
            ensure_dir(dir, created_dirs)?;
        }

        let staged = self
            .files
            .iter()
            .map(stage_file)
            .collect::<Result<Vec<_>, _>>()?;

        let mut committed = Vec::with_capacity(self.files.len());
        for (file, temp) in self.files.iter().zip(staged) {
            match swap_in(&file.destination, temp) {
                Ok(entry) => committed.push(entry),
                Err(e) => {
                    roll_back(&committed);
                    return Err(e);
                }
            }
        }

        discard_backups(&committed);
        Ok(self
            .files
            .iter()
            .map(|file| file.destination.clone())
            .collect())
    }
}

fn plan_file(
    rule: &InstallRule,
    payload_root: &Utf8Path,
    layout: &PrefixLayout,
) -> Result<PlannedFile, StageError> {
    let source = payload_root.join(rule.source());
    let metadata = match fs::metadata(&source) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StageError::MissingSource {
                path: rule.source().to_owned(),
            });
        }
        Err(e) => return Err(StageError::io("inspect", &source)(e)),
    };
    if !metadata.is_file() {
        return Err(StageError::NotAFile {
            path: rule.source().to_owned(),
        });
    }

    let destination = layout.destination_of(rule);
    if destination.is_dir() {
        return Err(StageError::DestinationIsDirectory { path: destination });
    }

    let mode = installed_mode(rule.destination(), &metadata);
    debug!("planned {source} -> {destination} ({mode:o})");
    Ok(PlannedFile {
        source,
        destination,
        mode,
    })
}

/// Executables keep any permission bits they shipped with on top of
/// `0o755`; completions are plain readable files.
#[cfg(unix)]
fn installed_mode(role: DestinationRole, metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if role.is_executable() {
        (metadata.permissions().mode() & 0o777) | role.file_mode()
    } else {
        role.file_mode()
    }
}

#[cfg(not(unix))]
fn installed_mode(role: DestinationRole, _metadata: &fs::Metadata) -> u32 {
    role.file_mode()
}

/// Create `dir` and record every directory that did not exist before,
/// outermost first.
fn ensure_dir(dir: &Utf8Path, created: &mut Vec<Utf8PathBuf>) -> Result<(), StageError> {
    let missing: Vec<Utf8PathBuf> = dir
        .ancestors()
        .take_while(|path| !path.as_str().is_empty() && !path.exists())
        .map(Utf8Path::to_path_buf)
        .collect();
    created.extend(missing.into_iter().rev());
    fs::create_dir_all(dir).map_err(StageError::io("create directory", dir))
}

/// Copy `file` into a temporary file beside its destination.
fn stage_file(file: &PlannedFile) -> Result<NamedTempFile, StageError> {
    let dir = file
        .destination
        .parent()
        .unwrap_or_else(|| Utf8Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".keg-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(StageError::io("create temporary file in", dir))?;
    let mut source =
        fs::File::open(&file.source).map_err(StageError::io("open", &file.source))?;
    std::io::copy(&mut source, temp.as_file_mut())
        .map_err(StageError::io("copy", &file.source))?;
    set_mode(temp.as_file(), file.mode)
        .map_err(StageError::io("set permissions on", &file.destination))?;
    temp.as_file()
        .sync_all()
        .map_err(StageError::io("flush", &file.destination))?;
    Ok(temp)
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

fn backup_path(destination: &Utf8Path) -> Utf8PathBuf {
    let name = destination.file_name().unwrap_or("file");
    destination.with_file_name(format!(".{name}.keg-backup"))
}

/// Move any existing destination aside and rename `temp` into its place.
fn swap_in(destination: &Utf8Path, temp: NamedTempFile) -> Result<Committed<'_>, StageError> {
    let backup = if fs::symlink_metadata(destination).is_ok() {
        let backup = backup_path(destination);
        if fs::symlink_metadata(&backup).is_ok() {
            fs::remove_file(&backup).map_err(StageError::io("remove stale backup", &backup))?;
        }
        fs::rename(destination, &backup).map_err(StageError::io("back up", destination))?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = temp.persist(destination) {
        if let Some(backup) = &backup {
            restore(backup, destination);
        }
        return Err(StageError::io("install", destination)(e.error));
    }
    Ok(Committed {
        destination,
        backup,
    })
}

fn restore(backup: &Utf8Path, destination: &Utf8Path) {
    if let Err(e) = fs::rename(backup, destination) {
        warn!("failed to restore {destination} from {backup}: {e}");
    }
}

/// Undo committed swaps, newest first.
fn roll_back(committed: &[Committed<'_>]) {
    for entry in committed.iter().rev() {
        if let Err(e) = fs::remove_file(entry.destination) {
            warn!("failed to remove {} during rollback: {e}", entry.destination);
        }
        if let Some(backup) = &entry.backup {
            restore(backup, entry.destination);
        }
    }
}

fn discard_backups(committed: &[Committed<'_>]) {
    for backup in committed.iter().filter_map(|entry| entry.backup.as_ref()) {
        if let Err(e) = fs::remove_file(backup) {
            warn!("failed to remove backup {backup}: {e}");
        }
    }
}

/// Remove directories created by a failed commit, innermost first.
///
/// Directories that are no longer empty are left alone.
fn remove_created_dirs(created: &[Utf8PathBuf]) {
    for dir in created.iter().rev() {
        if let Err(e) = fs::remove_dir(dir) {
            debug!("leaving {dir} in place: {e}");
        }
    }
}

#[cfg(test)]
#[path = "stager_tests.rs"]
mod tests;
