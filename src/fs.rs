//! Small filesystem helpers shared by the cache, registry and icon stores.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{IoResultExt, NewIconError, Result};

/// Atomically writes bytes to `path` using a write-then-rename strategy.
///
/// The parent directory is created if needed. Readers observe either the old
/// content or the new content, never a partial write.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
    {
        let mut file = fs::File::create(&temp_path)
            .io_context(|| format!("failed to create {}", temp_path.display()))?;
        file.write_all(content)
            .io_context(|| format!("failed to write {}", temp_path.display()))?;
        file.sync_all()
            .io_context(|| format!("failed to sync {}", temp_path.display()))?;
    }

    fs::rename(&temp_path, path).map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        NewIconError::io(format!("failed to replace {}", path.display()), source)
    })
}

/// Creates a directory and its parents if they do not exist yet.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).io_context(|| format!("failed to create directory {}", path.display()))
}

/// Removes a directory tree, treating "already gone" as success.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(NewIconError::io(format!("failed to remove {}", path.display()), e)),
    }
}

/// Resolves a user-supplied path: expands `~` and environment variables, then
/// makes it absolute relative to the current directory.
///
/// With `must_exist` the path is also checked for existence.
pub fn resolve_path(raw: &str, must_exist: bool) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).map_err(|e| {
        NewIconError::io(
            format!("failed to expand path {raw}"),
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()),
        )
    })?;
    let path = PathBuf::from(expanded.as_ref());
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .io_context(|| "failed to read the current directory")?
            .join(path)
    };

    if must_exist && !absolute.exists() {
        return Err(NewIconError::io(
            format!("no such file or directory: {}", absolute.display()),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        ));
    }
    Ok(absolute)
}

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
