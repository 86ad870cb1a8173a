//! Per-run temporary workspaces
//!
//! A [`Workspace`] is an exclusively-owned directory holding the intermediate
//! and final files of one pipeline run. The directory and everything in it is
//! removed when the workspace is closed or dropped, whichever comes first, so
//! every exit path (success, tool failure, size violation, caller disconnect)
//! releases it. Removal failures are logged and never surface as errors.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Prefix of every workspace directory name
const WORKSPACE_PREFIX: &str = "audio-dl-";

/// Suffixes of files a tool is still writing (or abandoned mid-write)
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".tmp"];

/// Exclusively-owned temporary directory for one pipeline run
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `root`
    pub async fn create(root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(root).await?;

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();

        debug!(?path, "workspace created");

        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// Directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file inside the workspace
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Find the finished file whose name is `<stem>.<ext>`
    ///
    /// The extension is chosen by the tool, so the directory is scanned for
    /// names starting with `stem.`. Files with a partial-download suffix are
    /// ignored. When several candidates exist the lexicographically first wins.
    pub async fn find_output(&self, stem: &str) -> Result<Option<PathBuf>> {
        let prefix = format!("{stem}.");
        let mut candidates = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(&prefix) || name.len() == prefix.len() {
                continue;
            }
            if PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
                continue;
            }
            if entry.file_type().await?.is_file() {
                candidates.push(entry.path());
            }
        }

        candidates.sort();
        Ok(candidates.into_iter().next())
    }

    /// Delete a file inside the workspace, logging instead of failing
    pub async fn discard(&self, file: &Path) {
        match tokio::fs::remove_file(file).await {
            Ok(()) => debug!(?file, "discarded workspace file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(?file, error = %e, "failed to discard workspace file"),
        }
    }

    /// Delete every file currently in the workspace, keeping the directory
    pub async fn discard_all(&self) {
        let mut entries = match tokio::fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "failed to list workspace");
                return;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => self.discard(&entry.path()).await,
                Ok(None) => break,
                Err(e) => {
                    warn!(path = ?self.path, error = %e, "failed to list workspace");
                    break;
                }
            }
        }
    }

    /// Remove the directory and all its contents
    pub async fn close(mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = self.path.clone();

        match tokio::task::spawn_blocking(move || dir.close()).await {
            Ok(Ok(())) => debug!(?path, "workspace removed"),
            Ok(Err(e)) => warn!(?path, error = %e, "failed to remove workspace"),
            Err(e) => warn!(?path, error = %e, "workspace removal task failed"),
        }
    }
}

/// Wait (bounded) for a dropped workspace's background removal to finish
#[cfg(test)]
pub(crate) async fn wait_until_removed(path: &Path) -> bool {
    for _ in 0..200 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    !path.exists()
}

fn remove_dropped(dir: TempDir, path: &Path) {
    match dir.close() {
        Ok(()) => debug!(?path, "workspace removed on drop"),
        Err(e) => warn!(?path, error = %e, "failed to remove workspace on drop"),
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };

        // Inside a runtime the removal goes to the blocking pool; otherwise
        // it runs inline. A blocking task that never runs still drops the
        // `TempDir`, which removes the directory.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let path = self.path.clone();
                handle.spawn_blocking(move || remove_dropped(dir, &path));
            }
            Err(_) => remove_dropped(dir, &self.path),
        }
    }
}
