//! Cleanup of paths created by an import that failed before completing

use std::path::{Path, PathBuf};

use crate::traits::FileSystem;

/// Tracks files and directories created during an import
#[derive(Debug, Default)]
pub struct RollbackManager {
    /// Files created during the import (in creation order)
    created_files: Vec<PathBuf>,
    /// Directories created during the import (in creation order)
    created_dirs: Vec<PathBuf>,
}

impl RollbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `path` as ours if it does not exist yet; call before creating it
    pub fn track_new_file(&mut self, fs: &dyn FileSystem, path: &Path) {
        if !fs.exists(path) {
            self.created_files.push(path.to_path_buf());
        }
    }

    /// Track `path` as ours if it does not exist yet; call before creating it
    pub fn track_new_dir(&mut self, fs: &dyn FileSystem, path: &Path) {
        if !fs.exists(path) {
            self.created_dirs.push(path.to_path_buf());
        }
    }

    pub fn tracked_count(&self) -> usize {
        self.created_files.len() + self.created_dirs.len()
    }

    pub fn has_tracked_items(&self) -> bool {
        self.tracked_count() > 0
    }

    /// Best-effort removal of everything tracked.
    ///
    /// Files go first, newest first, then directories newest first, so a
    /// directory tracked after its parent is removed before it.
    pub fn rollback(&self, fs: &dyn FileSystem) -> RollbackResult {
        let mut result = RollbackResult::default();

        for path in self.created_files.iter().rev() {
            if fs.exists(path) {
                match fs.remove_file(path) {
                    Ok(()) => result.files_removed += 1,
                    Err(_) => result.files_failed += 1,
                }
            }
        }

        for path in self.created_dirs.iter().rev() {
            if fs.exists(path) {
                match fs.remove_dir_all(path) {
                    Ok(()) => result.dirs_removed += 1,
                    Err(_) => result.dirs_failed += 1,
                }
            }
        }

        result
    }
}

/// Result of a rollback operation
#[derive(Debug, Default, PartialEq)]
pub struct RollbackResult {
    pub files_removed: usize,
    pub files_failed: usize,
    pub dirs_removed: usize,
    pub dirs_failed: usize,
}

impl RollbackResult {
    pub fn is_complete(&self) -> bool {
        self.files_failed == 0 && self.dirs_failed == 0
    }
}

impl std::fmt::Display for RollbackResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_complete() {
            write!(
                f,
                "Rollback complete: removed {} files and {} directories",
                self.files_removed, self.dirs_removed
            )
        } else {
            write!(
                f,
                "Rollback partial: removed {}/{} files, {}/{} directories",
                self.files_removed,
                self.files_removed + self.files_failed,
                self.dirs_removed,
                self.dirs_removed + self.dirs_failed
            )
        }
    }
}
