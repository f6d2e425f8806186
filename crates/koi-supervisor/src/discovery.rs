use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read services folder {0}: {1}")]
    ReadDir(PathBuf, std::io::Error),
}

/// Where a service's scripts live: either one executable that receives the
/// event name as `argv[1]`, or a directory with a named script per event
/// (spec §4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLayout {
    SingleExecutable(PathBuf),
    Directory(PathBuf),
}

/// One discovered service entry before its state machine is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub name: String,
    pub priority: Option<u8>,
    pub layout: ScriptLayout,
    pub disabled: bool,
}

/// Entries whose filename should never be treated as a service (spec
/// §6 "Services directory layout").
fn is_ignored(file_name: &str) -> bool {
    file_name.contains('.') || file_name.ends_with('~') || (file_name.starts_with('#') && file_name.ends_with('#'))
}

/// Splits a filename into an optional two-digit `NN-` priority prefix and
/// the remaining service name (spec §4.8).
fn split_priority(file_name: &str) -> (Option<u8>, &str) {
    if file_name.len() >= 3 {
        let bytes = file_name.as_bytes();
        if bytes[0].is_ascii_digit() && bytes[1].is_ascii_digit() && bytes[2] == b'-' {
            if let Ok(n) = file_name[..2].parse::<u8>() {
                return (Some(n), &file_name[3..]);
            }
        }
    }
    (None, file_name)
}

/// Scans `folder` for service entries, ignoring dotfiles/backups/lock
/// files (spec §6). Executable bit is not checked here — the caller finds
/// out the hard way (spawn failure) if a script lacks +x, matching the
/// original's behavior of simply trying to run it.
pub fn discover(folder: &Path) -> Result<Vec<ServiceEntry>, DiscoveryError> {
    let mut entries = Vec::new();
    let read_dir = std::fs::read_dir(folder).map_err(|e| DiscoveryError::ReadDir(folder.to_path_buf(), e))?;
    for item in read_dir {
        let item = item.map_err(|e| DiscoveryError::ReadDir(folder.to_path_buf(), e))?;
        let file_name = item.file_name();
        let Some(file_name) = file_name.to_str() else { continue };
        if is_ignored(file_name) {
            continue;
        }
        let (priority, name) = split_priority(file_name);
        let path = item.path();
        let metadata = match item.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        if metadata.is_dir() {
            let disabled = path.join("disabled").exists();
            entries.push(ServiceEntry {
                name: name.to_string(),
                priority,
                layout: ScriptLayout::Directory(path),
                disabled,
            });
        } else {
            entries.push(ServiceEntry {
                name: name.to_string(),
                priority,
                layout: ScriptLayout::SingleExecutable(path),
                disabled: false,
            });
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
