//! Filesystem utilities for atomic, owner-only writes and secure erasure.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Default Unix mode for private files.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Atomically rename a file, with fallback for platforms where rename fails if target exists.
///
/// On some platforms (notably Windows), `fs::rename` fails if the destination already exists.
/// This function handles that case by removing the destination first and retrying.
///
/// If the rename ultimately fails, the temp file is cleaned up.
///
/// # Errors
///
/// Returns an error if the rename fails even after the fallback attempt.
pub fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    if let Err(initial_err) = fs::rename(temp_path, destination) {
        // Best-effort replace on platforms where rename fails if target exists.
        let _ = fs::remove_file(destination);
        fs::rename(temp_path, destination).map_err(|retry_err| {
            let _ = fs::remove_file(temp_path);
            io::Error::new(
                retry_err.kind(),
                format!(
                    "Atomic rename failed (initial: {}, retry: {})",
                    initial_err, retry_err
                ),
            )
        })?;
    }
    Ok(())
}

/// Apply owner-only permissions when supported.
pub fn set_private_permissions(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(PRIVATE_FILE_MODE))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Create a new owner-only file. Fails if `path` already exists.
pub fn create_private_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(PRIVATE_FILE_MODE);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Write an owner-only file atomically, replacing any existing file.
pub fn write_private_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let staged = StagedFile::new(path)?;
    fs::write(staged.path(), bytes)?;
    staged.commit()
}

/// Overwrite a file's contents with zeros, flush to disk, then delete it.
///
/// A missing file is not an error.
pub fn secure_erase(path: &Path) -> io::Result<()> {
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    if len > 0 {
        let mut file = OpenOptions::new().write(true).open(path)?;
        let zeros = [0u8; 4096];
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(zeros.len() as u64) as usize;
            file.write_all(&zeros[..chunk])?;
            remaining -= chunk as u64;
        }
        file.sync_all()?;
    }

    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Last-modified time of `path`, or `None` when it does not exist.
pub fn modified_time(path: &Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.modified()?)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Set the modification time of `path`.
pub fn set_modified_time(path: &Path, time: SystemTime) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_modified(time)
}

/// Copy the modification time of `from` onto `to`.
pub fn sync_mtime(from: &Path, to: &Path) -> io::Result<()> {
    let time = fs::metadata(from)?.modified()?;
    set_modified_time(to, time)
}

/// A temporary sibling of a destination file.
///
/// Backends write into [`StagedFile::path`]; [`StagedFile::commit`] moves the
/// result over the destination atomically. An uncommitted file is securely
/// erased on drop, so a failed decryption never leaves partial plaintext.
pub struct StagedFile {
    path: PathBuf,
    destination: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Reserve an owner-only temp file next to `destination`.
    pub fn new(destination: &Path) -> io::Result<Self> {
        let parent = ensure_parent_dir(destination)?;
        let file_name = destination
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("artifact");
        let (_file, path) = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(".tmp")
            .tempfile_in(parent)?
            .keep()
            .map_err(|err| err.error)?;
        let staged = Self {
            path,
            destination: destination.to_path_buf(),
            committed: false,
        };
        set_private_permissions(&staged.path)?;
        Ok(staged)
    }

    /// Path the caller should write to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the destination with the staged contents.
    pub fn commit(mut self) -> io::Result<()> {
        rename_with_fallback(&self.path, &self.destination)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = secure_erase(&self.path);
        }
    }
}

fn ensure_parent_dir(path: &Path) -> io::Result<&Path> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    Ok(parent)
}
