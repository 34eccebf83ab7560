use anyhow::{Context, Result, bail};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::collections::{HashMap, HashSet};
#[cfg(test)]
use std::sync::{Arc, RwLock};

/// Trait for filesystem operations to enable testing with mocks
pub trait FileSystem: Send + Sync {
    /// Read file contents as string
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write contents to file, creating parent directories as needed
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Create directory and all parent directories
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Copy a single file byte for byte. The destination directory must exist.
    fn copy_file(&self, from: &Path, to: &Path) -> Result<()>;

    /// Move a file or directory tree. Fails if the destination already exists.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Remove directory and all its contents
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Remove a file
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Check if path exists
    fn exists(&self, path: &Path) -> bool;

    /// Check if path is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Read directory entries
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Current working directory of the process
    fn current_dir(&self) -> Result<PathBuf>;
}

/// Real filesystem implementation using std::fs
pub struct RealFileSystem;

impl RealFileSystem {
    /// Copy then delete the source, for moves across filesystems
    fn move_by_copy(from: &Path, to: &Path) -> Result<()> {
        if from.is_dir() {
            Self::copy_tree(from, to)?;
            std::fs::remove_dir_all(from)
                .with_context(|| format!("Failed to remove directory: {:?}", from))
        } else {
            std::fs::copy(from, to)
                .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
            std::fs::remove_file(from).with_context(|| format!("Failed to remove file: {:?}", from))
        }
    }

    /// Recursive copy used when a rename crosses filesystems
    fn copy_tree(from: &Path, to: &Path) -> Result<()> {
        use walkdir::WalkDir;

        for entry in WalkDir::new(from) {
            let entry = entry.context("Failed to walk directory")?;
            let relative = entry
                .path()
                .strip_prefix(from)
                .context("Walked path escaped the source directory")?;
            let target = to.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                std::fs::create_dir_all(&target)
                    .with_context(|| format!("Failed to create directory: {:?}", target))?;
            } else if file_type.is_symlink() {
                let link = std::fs::read_link(entry.path())
                    .with_context(|| format!("Failed to read symlink: {:?}", entry.path()))?;
                #[cfg(unix)]
                std::os::unix::fs::symlink(&link, &target)
                    .with_context(|| format!("Failed to create symlink: {:?}", target))?;
                #[cfg(not(unix))]
                std::fs::copy(entry.path().parent().unwrap_or(from).join(&link), &target)
                    .with_context(|| format!("Failed to copy symlink target: {:?}", link))?;
            } else {
                std::fs::copy(entry.path(), &target).with_context(|| {
                    format!("Failed to copy {:?} to {:?}", entry.path(), target)
                })?;
            }
        }

        Ok(())
    }
}

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create parent directory: {:?}", parent))?;
        }

        std::fs::write(path, contents).with_context(|| format!("Failed to write file: {:?}", path))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {:?}", path))
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::copy(from, to)
            .map(|_| ())
            .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        if to.exists() {
            bail!("Destination already exists: {:?}", to);
        }
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create parent directory: {:?}", parent))?;
        }

        match std::fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::CrossesDevices => Self::move_by_copy(from, to),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to move {:?} to {:?}", from, to))
            }
        }
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {:?}", path))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).with_context(|| format!("Failed to remove file: {:?}", path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)
            .with_context(|| format!("Failed to read directory: {:?}", path))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            paths.push(entry.path());
        }

        Ok(paths)
    }

    fn current_dir(&self) -> Result<PathBuf> {
        std::env::current_dir().context("Failed to resolve current working directory")
    }
}

/// Mock filesystem implementation for testing (in-memory)
#[cfg(test)]
pub struct MockFileSystem {
    files: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
    directories: Arc<RwLock<HashSet<PathBuf>>>,
    /// Paths on which any mutating operation fails
    failing: Arc<RwLock<HashSet<PathBuf>>>,
    cwd: RwLock<PathBuf>,
}

#[cfg(test)]
impl MockFileSystem {
    /// Create new empty mock filesystem
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
            directories: Arc::new(RwLock::new(HashSet::new())),
            failing: Arc::new(RwLock::new(HashSet::new())),
            cwd: RwLock::new(PathBuf::from("/")),
        }
    }

    /// Set the directory returned by `current_dir`
    pub fn set_current_dir(&self, path: impl Into<PathBuf>) {
        *self.cwd.write().unwrap() = path.into();
    }

    /// Make every write, copy, create or move touching `path` fail
    pub fn fail_on(&self, path: impl Into<PathBuf>) {
        self.failing.write().unwrap().insert(path.into());
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        self.files
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .with_context(|| format!("File not found in mock filesystem: {:?}", path))
    }

    /// Get captured file contents for testing assertions
    pub fn get_file_contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.read().unwrap().get(path).cloned()
    }

    /// Check if file was written
    pub fn has_file(&self, path: &Path) -> bool {
        self.files.read().unwrap().contains_key(path)
    }

    /// List all files in mock filesystem
    pub fn list_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<_> = self.files.read().unwrap().keys().cloned().collect();
        files.sort();
        files
    }

    /// List all directories in mock filesystem
    pub fn list_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<_> = self.directories.read().unwrap().iter().cloned().collect();
        dirs.sort();
        dirs
    }

    fn check_failing(&self, path: &Path) -> Result<()> {
        if self.failing.read().unwrap().contains(path) {
            bail!("Injected failure for {:?}", path);
        }
        Ok(())
    }

    fn add_dir_with_parents(&self, path: &Path) {
        let mut directories = self.directories.write().unwrap();
        let mut current = Some(path);
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() {
                break;
            }
            directories.insert(dir.to_path_buf());
            current = dir.parent();
        }
    }
}

#[cfg(test)]
impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).with_context(|| format!("File is not valid UTF-8: {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.check_failing(path)?;
        if let Some(parent) = path.parent() {
            self.add_dir_with_parents(parent);
        }

        self.files
            .write()
            .unwrap()
            .insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.check_failing(path)?;
        self.add_dir_with_parents(path);
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        self.check_failing(to)?;
        let contents = self.read_bytes(from)?;

        if let Some(parent) = to.parent() {
            if !self.is_dir(parent) {
                bail!("Destination directory does not exist: {:?}", parent);
            }
        }

        self.files
            .write()
            .unwrap()
            .insert(to.to_path_buf(), contents);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.check_failing(from)?;
        self.check_failing(to)?;
        if !self.exists(from) {
            bail!("Source does not exist: {:?}", from);
        }
        if self.exists(to) {
            bail!("Destination already exists: {:?}", to);
        }
        if let Some(parent) = to.parent() {
            self.add_dir_with_parents(parent);
        }

        let relocate = |path: &Path| -> Option<PathBuf> {
            path.strip_prefix(from).ok().map(|rel| {
                if rel.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(rel)
                }
            })
        };

        {
            let mut files = self.files.write().unwrap();
            let moved: Vec<_> = files
                .keys()
                .filter(|p| p.starts_with(from))
                .cloned()
                .collect();
            for path in moved {
                if let (Some(contents), Some(target)) = (files.remove(&path), relocate(&path)) {
                    files.insert(target, contents);
                }
            }
        }

        let mut directories = self.directories.write().unwrap();
        let moved: Vec<_> = directories
            .iter()
            .filter(|p| p.starts_with(from))
            .cloned()
            .collect();
        for path in moved {
            directories.remove(&path);
            if let Some(target) = relocate(&path) {
                directories.insert(target);
            }
        }

        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.check_failing(path)?;
        self.directories
            .write()
            .unwrap()
            .retain(|dir| !dir.starts_with(path));
        self.files
            .write()
            .unwrap()
            .retain(|file_path, _| !file_path.starts_with(path));

        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.check_failing(path)?;
        self.files
            .write()
            .unwrap()
            .remove(path)
            .with_context(|| format!("File not found in mock filesystem: {:?}", path))?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.read().unwrap().contains_key(path)
            || self.directories.read().unwrap().contains(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.directories.read().unwrap().contains(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if !self.is_dir(path) {
            bail!("Directory not found in mock filesystem: {:?}", path);
        }

        let files = self.files.read().unwrap();
        let directories = self.directories.read().unwrap();

        let mut entries: Vec<PathBuf> = files
            .keys()
            .chain(directories.iter())
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        entries.sort();

        Ok(entries)
    }

    fn current_dir(&self) -> Result<PathBuf> {
        Ok(self.cwd.read().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_real_copy_file_is_byte_exact() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("id_rsa");
        let dst = temp.path().join("copy");
        let payload = b"-----BEGIN KEY-----\n\x00\xffbinary\n".to_vec();
        std::fs::write(&src, &payload).unwrap();

        RealFileSystem.copy_file(&src, &dst).unwrap();

        assert_eq!(std::fs::read(&dst).unwrap(), payload);
        assert!(src.exists());
    }

    #[test]
    fn test_real_rename_moves_directory_tree() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("ansible");
        std::fs::create_dir_all(src.join("group_vars")).unwrap();
        std::fs::write(src.join("inventory.ini"), "[tidb_servers]\n").unwrap();
        std::fs::write(src.join("group_vars/all.yml"), "deploy_dir: /d\n").unwrap();
        let dst = temp.path().join("store/c1/ansible-backup");

        RealFileSystem.rename(&src, &dst).unwrap();

        assert!(!src.exists());
        assert!(dst.join("inventory.ini").is_file());
        assert!(dst.join("group_vars/all.yml").is_file());
    }

    #[test]
    fn test_real_rename_refuses_existing_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a");
        let dst = temp.path().join("b");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::create_dir_all(&dst).unwrap();

        assert!(RealFileSystem.rename(&src, &dst).is_err());
        assert!(src.exists());
    }

    #[test]
    fn test_move_by_copy_directory() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("tidb-ansible");
        std::fs::create_dir_all(src.join("group_vars")).unwrap();
        std::fs::write(src.join("inventory.ini"), "[pd_servers]\n10.0.1.7\n").unwrap();
        std::fs::write(src.join("group_vars/all.yml"), b"\x00\xffraw").unwrap();
        let dst = temp.path().join("backup");

        RealFileSystem::move_by_copy(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(
            std::fs::read(dst.join("inventory.ini")).unwrap(),
            b"[pd_servers]\n10.0.1.7\n"
        );
        assert_eq!(
            std::fs::read(dst.join("group_vars/all.yml")).unwrap(),
            b"\x00\xffraw"
        );
    }

    #[test]
    fn test_move_by_copy_file() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("id_rsa");
        let payload = b"-----BEGIN KEY-----\n\x00\xff\n".to_vec();
        std::fs::write(&src, &payload).unwrap();
        let dst = temp.path().join("id_rsa.moved");

        RealFileSystem::move_by_copy(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dst).unwrap(), payload);
    }

    #[test]
    fn test_real_copy_tree() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(src.join("nested/deeper")).unwrap();
        std::fs::write(src.join("nested/deeper/file"), "x").unwrap();
        let dst = temp.path().join("dst");

        RealFileSystem::copy_tree(&src, &dst).unwrap();

        assert_eq!(
            std::fs::read_to_string(dst.join("nested/deeper/file")).unwrap(),
            "x"
        );
    }

    #[test]
    fn test_mock_rename_relocates_files_and_dirs() {
        let fs = MockFileSystem::new();
        fs.write(Path::new("/src/a.txt"), b"a").unwrap();
        fs.write(Path::new("/src/sub/b.txt"), b"b").unwrap();

        fs.rename(Path::new("/src"), Path::new("/dst/moved")).unwrap();

        assert!(!fs.exists(Path::new("/src")));
        assert!(!fs.exists(Path::new("/src/a.txt")));
        assert_eq!(
            fs.get_file_contents(Path::new("/dst/moved/sub/b.txt")),
            Some(b"b".to_vec())
        );
        assert!(fs.is_dir(Path::new("/dst/moved/sub")));
    }

    #[test]
    fn test_mock_copy_requires_destination_dir() {
        let fs = MockFileSystem::new();
        fs.write(Path::new("/keys/id_rsa"), b"k").unwrap();

        assert!(fs
            .copy_file(Path::new("/keys/id_rsa"), Path::new("/missing/id_rsa"))
            .is_err());

        fs.create_dir_all(Path::new("/target")).unwrap();
        fs.copy_file(Path::new("/keys/id_rsa"), Path::new("/target/id_rsa"))
            .unwrap();
        assert!(fs.has_file(Path::new("/keys/id_rsa")));
        assert!(fs.has_file(Path::new("/target/id_rsa")));
    }

    #[test]
    fn test_mock_injected_failure() {
        let fs = MockFileSystem::new();
        fs.fail_on("/blocked");

        assert!(fs.create_dir_all(Path::new("/blocked")).is_err());
        assert!(!fs.exists(Path::new("/blocked")));
    }

    #[test]
    fn test_mock_read_dir_lists_direct_children() {
        let fs = MockFileSystem::new();
        fs.write(Path::new("/root/a/meta.yaml"), b"").unwrap();
        fs.create_dir_all(Path::new("/root/b")).unwrap();

        let entries = fs.read_dir(Path::new("/root")).unwrap();

        assert_eq!(
            entries,
            vec![PathBuf::from("/root/a"), PathBuf::from("/root/b")]
        );
    }
}
