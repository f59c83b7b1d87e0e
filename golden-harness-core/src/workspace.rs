//! Per-case scratch directories
//!
//! Each case owns one [`Workspace`]: a shared-data directory the converter
//! reads its manifest from, an output directory it writes into, and a render
//! directory for screenshots and diff images. Ephemeral workspaces are unique
//! per acquisition, which is what lets cases run in parallel. A preserved
//! workspace lives at a fixed path, is wiped when acquired, survives release,
//! and is guarded by a sibling lock file so two runs cannot share it. A lock
//! whose recorded pid is no longer running is stale and gets reclaimed.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};

/// Shared data subdirectory
pub const DATA_SUBDIR: &str = "share";
/// Converter output subdirectory
pub const OUTPUT_SUBDIR: &str = "output";
/// Screenshot and diff subdirectory
pub const RENDER_SUBDIR: &str = "png_out";

/// Hands out workspaces
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    preserve_dir: Option<PathBuf>,
}

#[derive(Debug)]
enum Backing {
    Ephemeral(Option<TempDir>),
    Preserved { lock: PathBuf },
}

/// A case's directory tree
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    backing: Backing,
}

impl WorkspaceManager {
    /// Ephemeral workspaces under the system temp directory
    pub fn ephemeral() -> Self {
        Self { preserve_dir: None }
    }

    /// One fixed workspace at `dir`, kept after release
    pub fn preserving<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            preserve_dir: Some(dir.as_ref().to_path_buf()),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        if config.preserve_temp {
            Self::preserving(&config.preserve_dir)
        } else {
            Self::ephemeral()
        }
    }

    pub fn is_preserving(&self) -> bool {
        self.preserve_dir.is_some()
    }

    /// Allocate a workspace with its data and output directories in place.
    pub fn acquire(&self) -> Result<Workspace> {
        let workspace = match &self.preserve_dir {
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("golden-harness-")
                    .tempdir()?;
                Workspace {
                    root: temp.path().to_path_buf(),
                    backing: Backing::Ephemeral(Some(temp)),
                }
            }
            Some(dir) => {
                let lock = lock_path(dir);
                take_lock(&lock)?;
                let workspace = Workspace {
                    root: dir.clone(),
                    backing: Backing::Preserved { lock },
                };
                // Wipe leftovers from the previous run; the lock is released
                // by Drop if this fails.
                if dir.exists() {
                    fs::remove_dir_all(dir)?;
                }
                fs::create_dir_all(dir)?;
                workspace
            }
        };

        fs::create_dir(workspace.data_dir())?;
        fs::create_dir(workspace.output_dir())?;
        info!(root = %workspace.root.display(), preserved = self.is_preserving(), "acquired workspace");
        Ok(workspace)
    }

    /// Delete an ephemeral workspace; keep a preserved one for inspection.
    pub fn release(&self, workspace: Workspace) -> Result<()> {
        workspace.release()
    }
}

impl Workspace {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_SUBDIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_SUBDIR)
    }

    pub fn render_dir(&self) -> PathBuf {
        self.root.join(RENDER_SUBDIR)
    }

    /// Create the render directory on first use.
    pub fn ensure_render_dir(&self) -> Result<PathBuf> {
        let dir = self.render_dir();
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn is_preserved(&self) -> bool {
        matches!(self.backing, Backing::Preserved { .. })
    }

    fn release(mut self) -> Result<()> {
        match &mut self.backing {
            Backing::Ephemeral(temp) => {
                if let Some(temp) = temp.take() {
                    debug!(root = %self.root.display(), "removing workspace");
                    temp.close()?;
                }
            }
            Backing::Preserved { lock } => {
                info!(root = %self.root.display(), "keeping preserved workspace");
                fs::remove_file(&*lock)?;
                self.backing = Backing::Ephemeral(None);
            }
        }
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Backing::Preserved { lock } = &self.backing {
            if let Err(e) = fs::remove_file(lock) {
                warn!(lock = %lock.display(), "failed to remove workspace lock: {}", e);
            }
        }
    }
}

fn lock_path(dir: &Path) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "workspace".into());
    name.push(".lock");
    dir.with_file_name(name)
}

fn take_lock(lock: &Path) -> Result<()> {
    if let Some(parent) = lock.parent() {
        fs::create_dir_all(parent)?;
    }
    match create_lock(lock) {
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let holder = fs::read_to_string(lock)
                .ok()
                .and_then(|content| content.trim().parse::<u32>().ok());
            match holder {
                Some(pid) if pid_is_alive(pid) == Some(false) => {
                    warn!(lock = %lock.display(), pid, "reclaiming stale workspace lock");
                    fs::remove_file(lock)?;
                    create_lock(lock).map_err(|retry| match retry.kind() {
                        ErrorKind::AlreadyExists => HarnessError::WorkspaceBusy(lock.to_path_buf()),
                        _ => retry.into(),
                    })
                }
                _ => Err(HarnessError::WorkspaceBusy(lock.to_path_buf())),
            }
        }
        other => other.map_err(Into::into),
    }
}

fn create_lock(lock: &Path) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(lock)?;
    writeln!(file, "{}", std::process::id())
}

/// Whether `pid` names a running process, `None` when that cannot be told.
#[cfg(unix)]
fn pid_is_alive(pid: u32) -> Option<bool> {
    if pid == 0 || pid > i32::MAX as u32 {
        return None;
    }
    // SAFETY: signal 0 only checks whether the process exists.
    let result = unsafe { libc::kill(pid as i32, 0) };
    if result == 0 {
        return Some(true);
    }
    match std::io::Error::last_os_error().raw_os_error() {
        Some(code) if code == libc::ESRCH => Some(false),
        Some(code) if code == libc::EPERM => Some(true),
        _ => None,
    }
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> Option<bool> {
    None
}

/// Recursively copy `from` into `to`, creating `to`.
pub fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_workspace_lifecycle() {
        let manager = WorkspaceManager::ephemeral();
        let workspace = manager.acquire().unwrap();
        let root = workspace.root().to_path_buf();

        assert!(workspace.data_dir().is_dir());
        assert!(workspace.output_dir().is_dir());
        assert!(!workspace.render_dir().exists());
        assert!(!workspace.is_preserved());

        manager.release(workspace).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_ephemeral_workspaces_are_distinct() {
        let manager = WorkspaceManager::ephemeral();
        let a = manager.acquire().unwrap();
        let b = manager.acquire().unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_ensure_render_dir() {
        let workspace = WorkspaceManager::ephemeral().acquire().unwrap();
        let dir = workspace.ensure_render_dir().unwrap();
        assert!(dir.is_dir());
        // Idempotent.
        workspace.ensure_render_dir().unwrap();
    }

    #[test]
    fn test_dropped_ephemeral_workspace_is_removed() {
        let root = {
            let workspace = WorkspaceManager::ephemeral().acquire().unwrap();
            workspace.root().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn test_preserved_workspace_survives_and_is_wiped_on_acquire() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("keep");
        let manager = WorkspaceManager::preserving(&dir);

        let workspace = manager.acquire().unwrap();
        assert!(workspace.is_preserved());
        fs::write(workspace.output_dir().join("leftover.html"), "x").unwrap();
        manager.release(workspace).unwrap();

        assert!(dir.join(OUTPUT_SUBDIR).join("leftover.html").exists());
        assert!(!lock_path(&dir).exists());

        let workspace = manager.acquire().unwrap();
        assert!(!workspace.output_dir().join("leftover.html").exists());
        assert!(workspace.output_dir().is_dir());
        manager.release(workspace).unwrap();
    }

    #[test]
    fn test_concurrent_preserved_acquisition_is_refused() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("keep");
        let manager = WorkspaceManager::preserving(&dir);

        let first = manager.acquire().unwrap();
        match manager.acquire() {
            Err(HarnessError::WorkspaceBusy(path)) => assert_eq!(path, lock_path(&dir)),
            other => panic!("expected WorkspaceBusy, got {:?}", other),
        }

        drop(first);
        let again = manager.acquire().unwrap();
        manager.release(again).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_lock_is_reclaimed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("keep");
        let lock = lock_path(&dir);
        fs::write(&lock, "999999999\n").unwrap();

        let manager = WorkspaceManager::preserving(&dir);
        let workspace = manager.acquire().unwrap();
        let holder = fs::read_to_string(&lock).unwrap();
        assert_eq!(holder.trim(), std::process::id().to_string());

        manager.release(workspace).unwrap();
        assert!(!lock.exists());
    }

    #[test]
    fn test_unreadable_lock_is_not_reclaimed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("keep");
        fs::write(lock_path(&dir), "not a pid").unwrap();

        let error = WorkspaceManager::preserving(&dir).acquire().unwrap_err();
        assert!(error.to_string().contains("keep.lock"), "{error}");
    }

    #[test]
    fn test_lock_path_is_a_sibling() {
        assert_eq!(
            lock_path(Path::new("/tmp/golden-harness-preserved")),
            PathBuf::from("/tmp/golden-harness-preserved.lock")
        );
    }

    #[test]
    fn test_copy_tree() {
        let temp_dir = tempfile::tempdir().unwrap();
        let from = temp_dir.path().join("from");
        fs::create_dir_all(from.join("nested")).unwrap();
        fs::write(from.join("a.html"), "a").unwrap();
        fs::write(from.join("nested").join("b.css"), "b").unwrap();

        let to = temp_dir.path().join("to");
        copy_tree(&from, &to).unwrap();
        assert_eq!(fs::read_to_string(to.join("a.html")).unwrap(), "a");
        assert_eq!(fs::read_to_string(to.join("nested").join("b.css")).unwrap(), "b");
    }
}
