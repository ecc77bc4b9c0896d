use std::path::{Path, PathBuf};

use tracing::debug;

use super::{IconStore, icon_file_name};
use crate::config::Paths;
use crate::error::{NewIconError, Result};
use crate::fs::atomic_write;

/// Keeps custom icons as `<root>/icons/<sha256(path)>.png`.
///
/// Used where no desktop metadata store is available, and in tests.
#[derive(Debug, Clone)]
pub struct SidecarIconStore {
    icons_dir: PathBuf,
}

impl SidecarIconStore {
    pub fn new(paths: &Paths) -> Self {
        Self {
            icons_dir: paths.icons_dir(),
        }
    }

    fn icon_path(&self, target: &Path) -> Result<PathBuf> {
        let absolute = target.canonicalize().map_err(|e| {
            NewIconError::IconStore(format!("cannot resolve {}: {e}", target.display()))
        })?;
        Ok(self.icons_dir.join(icon_file_name(&absolute)))
    }
}

impl IconStore for SidecarIconStore {
    fn custom_icon(&self, target: &Path) -> Result<Option<Vec<u8>>> {
        let path = self.icon_path(target)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NewIconError::io(format!("failed to read {}", path.display()), e)),
        }
    }

    fn set_custom_icon(&self, target: &Path, png: &[u8]) -> Result<()> {
        let path = self.icon_path(target)?;
        debug!(target = %target.display(), icon = %path.display(), "setting custom icon");
        atomic_write(&path, png)
    }

    fn clear_custom_icon(&self, target: &Path) -> Result<()> {
        let path = self.icon_path(target)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(target = %target.display(), "cleared custom icon");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NewIconError::io(format!("failed to remove {}", path.display()), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_read_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SidecarIconStore::new(&Paths::new(dir.path().join("root")));
        let target = dir.path().join("folder");
        std::fs::create_dir(&target).unwrap();

        assert_eq!(store.custom_icon(&target).unwrap(), None);
        store.set_custom_icon(&target, b"png").unwrap();
        assert!(store.has_custom_icon(&target).unwrap());
        assert_eq!(store.custom_icon(&target).unwrap().as_deref(), Some(&b"png"[..]));

        store.clear_custom_icon(&target).unwrap();
        assert!(!store.has_custom_icon(&target).unwrap());
        store.clear_custom_icon(&target).unwrap();
    }

    #[test]
    fn equivalent_paths_share_an_icon() {
        let dir = tempfile::tempdir().unwrap();
        let store = SidecarIconStore::new(&Paths::new(dir.path().join("root")));
        let target = dir.path().join("folder");
        std::fs::create_dir(&target).unwrap();

        store.set_custom_icon(&target.join("."), b"png").unwrap();
        assert!(store.has_custom_icon(&target).unwrap());
    }

    #[test]
    fn missing_target_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SidecarIconStore::new(&Paths::new(dir.path()));
        assert!(store.set_custom_icon(&dir.path().join("gone"), b"png").is_err());
    }
}
