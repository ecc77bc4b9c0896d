use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{IconStore, icon_file_name};
use crate::config::Paths;
use crate::error::{IoResultExt, NewIconError, Result};
use crate::fs::{atomic_write, ensure_dir};

const ATTRIBUTE: &str = "metadata::custom-icon";

/// Custom icons through GVfs metadata, as shown by GNOME Files and other
/// GIO based file managers.
///
/// Icon images are written to `<root>/icons/` and referenced by `file://`
/// URI from the `metadata::custom-icon` attribute. `gio` runs as a blocking
/// subprocess outside the process manager, since restoring an icon happens
/// in `Drop`.
#[derive(Debug, Clone)]
pub struct GioIconStore {
    gio: PathBuf,
    icons_dir: PathBuf,
}

impl GioIconStore {
    /// Finds the `gio` tool on `PATH`.
    pub fn locate(paths: &Paths) -> Result<Self> {
        let gio = which::which("gio")
            .map_err(|e| NewIconError::IconStore(format!("gio not found: {e}")))?;
        Ok(Self::with_tool(gio, paths))
    }

    pub fn with_tool(gio: PathBuf, paths: &Paths) -> Self {
        Self {
            gio,
            icons_dir: paths.icons_dir(),
        }
    }

    fn run(&self, args: &[&str], target: &Path) -> Result<String> {
        let output = Command::new(&self.gio)
            .args(args)
            .arg(target)
            .output()
            .io_context(|| format!("failed to run {}", self.gio.display()))?;
        if !output.status.success() {
            return Err(NewIconError::IconStore(format!(
                "gio {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn attribute(&self, target: &Path) -> Result<Option<String>> {
        let info = self.run(&["info", "-a", ATTRIBUTE], target)?;
        Ok(parse_attribute(&info))
    }

    /// Icon files this store wrote for `target`.
    fn own_icons(&self, target: &Path) -> Vec<PathBuf> {
        let name = icon_file_name(target);
        let prefix = name.trim_end_matches(".png");
        std::fs::read_dir(&self.icons_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| {
                        p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.starts_with(prefix))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn remove_own_icons(&self, target: &Path, keep: Option<&Path>) {
        for path in self.own_icons(target) {
            if Some(path.as_path()) != keep {
                if let Err(e) = std::fs::remove_file(&path) {
                    debug!(path = %path.display(), "could not remove old icon: {e}");
                }
            }
        }
    }
}

impl IconStore for GioIconStore {
    fn custom_icon(&self, target: &Path) -> Result<Option<Vec<u8>>> {
        let Some(value) = self.attribute(target)? else {
            return Ok(None);
        };
        let path = uri_to_path(&value).ok_or_else(|| {
            NewIconError::IconStore(format!("custom icon {value} is not a local file"))
        })?;
        let bytes = std::fs::read(&path)
            .map_err(|e| NewIconError::IconStore(format!("custom icon {value} is unreadable: {e}")))?;
        Ok(Some(bytes))
    }

    fn set_custom_icon(&self, target: &Path, png: &[u8]) -> Result<()> {
        let target = target
            .canonicalize()
            .io_context(|| format!("cannot resolve {}", target.display()))?;
        ensure_dir(&self.icons_dir)?;

        // A fresh file name per change, so file managers do not show a
        // cached thumbnail of the previous image.
        let stem = icon_file_name(&target);
        let icon = self.icons_dir.join(format!(
            "{}-{}.png",
            stem.trim_end_matches(".png"),
            uuid::Uuid::new_v4().simple()
        ));
        atomic_write(&icon, png)?;

        let uri = path_to_uri(&icon);
        let result = Command::new(&self.gio)
            .args(["set", "-t", "string"])
            .arg(&target)
            .args([ATTRIBUTE, uri.as_str()])
            .output()
            .io_context(|| format!("failed to run {}", self.gio.display()))?;
        if !result.status.success() {
            let _ = std::fs::remove_file(&icon);
            return Err(NewIconError::IconStore(format!(
                "gio set failed: {}",
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        debug!(target = %target.display(), %uri, "set custom icon");
        self.remove_own_icons(&target, Some(&icon));
        Ok(())
    }

    fn clear_custom_icon(&self, target: &Path) -> Result<()> {
        let target = target
            .canonicalize()
            .io_context(|| format!("cannot resolve {}", target.display()))?;
        let output = Command::new(&self.gio)
            .args(["set", "-t", "unset"])
            .arg(&target)
            .arg(ATTRIBUTE)
            .output()
            .io_context(|| format!("failed to run {}", self.gio.display()))?;
        if !output.status.success() {
            return Err(NewIconError::IconStore(format!(
                "gio set -t unset failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!(target = %target.display(), "cleared custom icon");
        self.remove_own_icons(&target, None);
        Ok(())
    }
}

/// Extracts the attribute value from `gio info -a` output.
fn parse_attribute(info: &str) -> Option<String> {
    info.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(ATTRIBUTE)?.strip_prefix(':'))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn path_to_uri(path: &Path) -> String {
    let mut uri = String::from("file://");
    for byte in path.to_string_lossy().bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'/' | b'-' | b'_' | b'.' | b'~' => {
                uri.push(byte as char)
            }
            _ => uri.push_str(&format!("%{byte:02X}")),
        }
    }
    uri
}

fn uri_to_path(uri: &str) -> Option<PathBuf> {
    let encoded = match uri.strip_prefix("file://") {
        Some(rest) => rest,
        None if uri.starts_with('/') => uri,
        None => return None,
    };
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok().map(PathBuf::from)
}
