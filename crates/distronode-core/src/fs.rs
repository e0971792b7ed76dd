//! Filesystem access for context assembly.
//!
//! Everything that reads definition inputs or writes the build context goes
//! through [`ContextFs`], so the pipeline can run against an in-memory fake.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Result of writing one file into the build context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    /// Existing bytes already matched; the file was not rewritten.
    Unchanged,
}

impl WriteOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

pub trait ContextFs {
    /// Read a whole file. Returns `Ok(None)` when nothing exists at `path`.
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Replace `path` with `contents`, creating parent directories as needed.
    /// A file that already holds identical bytes is left in place.
    fn write(&self, path: &Path, contents: &[u8], executable: bool) -> io::Result<WriteOutcome>;

    /// Copy a file to `dest`, or merge a directory's contents into `dest`.
    /// Returns the number of files copied.
    fn copy_recursive(&self, src: &Path, dest: &Path) -> io::Result<usize>;
}

/// [`ContextFs`] backed by the local disk. Writes are atomic per file.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl ContextFs for LocalFs {
    fn read(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn write(&self, path: &Path, contents: &[u8], executable: bool) -> io::Result<WriteOutcome> {
        let outcome = match fs::read(path) {
            Ok(existing) if existing == contents => WriteOutcome::Unchanged,
            Ok(_) => WriteOutcome::Updated,
            Err(e) if e.kind() == io::ErrorKind::NotFound => WriteOutcome::Created,
            Err(e) => return Err(e),
        };

        if outcome == WriteOutcome::Unchanged {
            set_mode(path, executable)?;
            debug!("unchanged: {}", path.display());
            return Ok(outcome);
        }

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        set_mode(tmp.path(), executable)?;
        tmp.persist(path).map_err(|e| e.error)?;

        debug!("wrote {} bytes to {}", contents.len(), path.display());
        Ok(outcome)
    }

    fn copy_recursive(&self, src: &Path, dest: &Path) -> io::Result<usize> {
        let meta = fs::metadata(src)?;
        if !meta.is_dir() {
            let bytes = fs::read(src)?;
            self.write(dest, &bytes, is_executable(&meta))?;
            return Ok(1);
        }

        fs::create_dir_all(dest)?;
        let mut entries = fs::read_dir(src)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(fs::DirEntry::file_name);

        let mut copied = 0;
        for entry in entries {
            copied += self.copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
        }
        Ok(copied)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, executable: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if executable { 0o755 } else { 0o644 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _executable: bool) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}
