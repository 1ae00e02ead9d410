//! Turning a verified resource into a payload directory.
//!
//! Raw resources are moved into the payload directory under their fetched
//! file name. Archives are extracted with path traversal protection to
//! prevent zip-slip attacks; link and device entries are skipped so that
//! nothing in the payload can point outside it. When an archive holds a
//! single top-level directory, that directory becomes the payload root, so
//! install rules name files relative to the release contents rather than
//! the archive's wrapper directory.

use keg::formula::PayloadKind;
use log::{debug, warn};
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Errors arising from unpacking a resource.
#[derive(Debug, thiserror::Error)]
pub enum UnpackError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no regular files.
    #[error("archive contains no files")]
    EmptyArchive,

    /// The zip archive is malformed.
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The fetched file name cannot be used as a payload file name.
    #[error("invalid payload file name: {name}")]
    InvalidFileName {
        /// The rejected name.
        name: String,
    },
}

/// Unpack `resource` into `dest_dir` according to `kind`.
///
/// `file_name` is the name a raw resource is stored under. Returns the
/// payload root against which install rule sources resolve.
///
/// # Errors
///
/// Returns [`UnpackError::PathTraversal`] if an archive entry attempts to
/// escape `dest_dir`, [`UnpackError::EmptyArchive`] if an archive holds no
/// regular files, or an I/O or zip error otherwise.
pub fn unpack(
    kind: PayloadKind,
    resource: &Path,
    file_name: &str,
    dest_dir: &Path,
) -> Result<PathBuf, UnpackError> {
    fs::create_dir_all(dest_dir)?;
    debug!("unpacking {} as {kind}", resource.display());
    match kind {
        PayloadKind::Raw => {
            place_raw(resource, file_name, dest_dir)?;
            return Ok(dest_dir.to_path_buf());
        }
        PayloadKind::Tar => extract_tar(fs::File::open(resource)?, dest_dir)?,
        PayloadKind::TarGz => {
            let decoder = flate2::read::GzDecoder::new(fs::File::open(resource)?);
            extract_tar(decoder, dest_dir)?;
        }
        PayloadKind::TarZst => {
            let decoder = zstd::Decoder::new(fs::File::open(resource)?)?;
            extract_tar(decoder, dest_dir)?;
        }
        PayloadKind::Zip => extract_zip(resource, dest_dir)?,
    }
    payload_root(dest_dir)
}

/// Move a raw resource into the payload directory.
fn place_raw(resource: &Path, file_name: &str, dest_dir: &Path) -> Result<(), UnpackError> {
    let name = Path::new(file_name);
    let is_plain = matches!(
        name.components().collect::<Vec<_>>().as_slice(),
        [Component::Normal(_)]
    );
    if !is_plain {
        return Err(UnpackError::InvalidFileName {
            name: file_name.to_owned(),
        });
    }
    let target = dest_dir.join(name);
    if fs::rename(resource, &target).is_err() {
        fs::copy(resource, &target)?;
    }
    Ok(())
}

/// Extract every regular file and directory from a tar stream.
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<(), UnpackError> {
    let mut archive = tar::Archive::new(reader);
    let mut files = 0_usize;

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry.path()?.into_owned();

        validate_entry_path(&entry_path)?;

        let entry_type = entry.header().entry_type();
        let dest_path = dest_dir.join(&entry_path);
        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if !(entry_type.is_file() || entry_type.is_contiguous()) {
            warn!(
                "skipping non-regular archive entry {}",
                entry_path.display()
            );
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest_path)?;
        files += 1;
    }

    if files == 0 {
        return Err(UnpackError::EmptyArchive);
    }
    Ok(())
}

/// Extract every regular file and directory from a zip archive.
fn extract_zip(resource: &Path, dest_dir: &Path) -> Result<(), UnpackError> {
    let mut archive = zip::ZipArchive::new(fs::File::open(resource)?)?;
    let mut files = 0_usize;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let entry_path = PathBuf::from(entry.name());
        validate_entry_path(&entry_path)?;

        let dest_path = dest_dir.join(&entry_path);
        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
            continue;
        }
        if !is_regular_zip_mode(entry.unix_mode()) {
            warn!(
                "skipping non-regular archive entry {}",
                entry_path.display()
            );
            continue;
        }
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&dest_path)?;
        std::io::copy(&mut entry, &mut out)?;
        apply_zip_mode(&dest_path, entry.unix_mode())?;
        files += 1;
    }

    if files == 0 {
        return Err(UnpackError::EmptyArchive);
    }
    Ok(())
}

/// True unless the entry's Unix mode marks a symlink, device or other
/// non-regular file. Archives written without Unix metadata carry no type.
const fn is_regular_zip_mode(mode: Option<u32>) -> bool {
    const S_IFMT: u32 = 0o170_000;
    const S_IFREG: u32 = 0o100_000;
    match mode {
        Some(mode) => matches!(mode & S_IFMT, 0 | S_IFREG),
        None => true,
    }
}

/// Carry a zip entry's Unix permission bits over to the extracted file.
#[cfg(unix)]
fn apply_zip_mode(path: &Path, mode: Option<u32>) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_zip_mode(_path: &Path, _mode: Option<u32>) -> std::io::Result<()> {
    Ok(())
}

/// Return the single top-level directory of `dest_dir`, or `dest_dir`
/// itself when it holds anything else.
fn payload_root(dest_dir: &Path) -> Result<PathBuf, UnpackError> {
    let entries = fs::read_dir(dest_dir)?.collect::<Result<Vec<_>, _>>()?;
    match entries.as_slice() {
        [only] if only.file_type()?.is_dir() => {
            debug!("stripping top-level directory {}", only.path().display());
            Ok(only.path())
        }
        _ => Ok(dest_dir.to_path_buf()),
    }
}

/// Validate that an archive entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), UnpackError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(UnpackError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
