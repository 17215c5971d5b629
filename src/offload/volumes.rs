//! Mounted volume enumeration and free-space statistics
//!
//! The root volume and the current working directory are always listed;
//! removable media come from the platform's standard mount roots. Free-space
//! queries for paths that do not exist yet fall back to the nearest
//! existing ancestor, so a dry run can check a destination that the copy
//! would create.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sysinfo::Disks;
use tracing::trace;

/// A mounted storage device
#[derive(Clone, Debug, Serialize)]
pub struct Volume {
    pub name: String,
    pub path: PathBuf,
    pub total: u64,
    pub free: u64,
    pub used: u64,
}

#[cfg(target_os = "macos")]
const MOUNT_ROOTS: &[&str] = &["/Volumes"];
#[cfg(not(target_os = "macos"))]
const MOUNT_ROOTS: &[&str] = &["/media", "/mnt"];

/// List mounted volumes: root, current directory, then the mount root entries
pub fn list_volumes() -> Vec<Volume> {
    let disks = Disks::new_with_refreshed_list();
    let mut volumes = Vec::new();

    let mut root = Volume {
        name: "System".to_string(),
        path: PathBuf::from("/"),
        total: 0,
        free: 0,
        used: 0,
    };
    fill_disk_usage(&disks, &mut root);
    volumes.push(root);

    if let Ok(cwd) = std::env::current_dir() {
        let mut vol = Volume {
            name: "Current Directory (.)".to_string(),
            path: cwd,
            total: 0,
            free: 0,
            used: 0,
        };
        fill_disk_usage(&disks, &mut vol);
        volumes.push(vol);
    }

    // The same device can surface under more than one root (symlinked
    // /media, bind mounts), so dedup on the resolved path
    let mut seen: HashSet<PathBuf> = HashSet::new();
    for mount_root in MOUNT_ROOTS {
        let Ok(entries) = std::fs::read_dir(mount_root) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            let resolved = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if !seen.insert(resolved) {
                continue;
            }
            let mut vol = Volume {
                name,
                path,
                total: 0,
                free: 0,
                used: 0,
            };
            fill_disk_usage(&disks, &mut vol);
            volumes.push(vol);
        }
    }

    volumes
}

/// Free space available at (or above) a path, in bytes.
///
/// A missing path walks up to its nearest existing ancestor before the
/// disk lookup.
pub fn free_space(path: &Path) -> u64 {
    let disks = Disks::new_with_refreshed_list();
    let probe = nearest_existing(path);
    trace!(path = %path.display(), probe = %probe.display(), "free space probe");
    best_disk(&disks, &probe).map(|d| d.available_space()).unwrap_or(0)
}

fn fill_disk_usage(disks: &Disks, volume: &mut Volume) {
    if let Some(disk) = best_disk(disks, &volume.path) {
        volume.total = disk.total_space();
        volume.free = disk.available_space();
        volume.used = volume.total.saturating_sub(volume.free);
    }
}

/// The disk whose mount point is the longest prefix of `path`
fn best_disk<'a>(disks: &'a Disks, path: &Path) -> Option<&'a sysinfo::Disk> {
    disks
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
}

fn nearest_existing(path: &Path) -> PathBuf {
    let mut current = path.to_path_buf();
    while !current.exists() {
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => current = parent.to_path_buf(),
            _ => return PathBuf::from("/"),
        }
    }
    current
}

/// Format a byte count as a human readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, ["K", "M", "G", "T", "P", "E"][exp])
}
