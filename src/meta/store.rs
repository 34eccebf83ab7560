use std::path::PathBuf;

use super::spec::ClusterMeta;
use crate::import::error::{ImportError, ImportResult};
use crate::traits::FileSystem;

/// Name of the metadata file inside each cluster directory
pub const META_FILE_NAME: &str = "meta.yaml";

/// Filesystem-backed store with one subdirectory per managed cluster
#[derive(Debug, Clone)]
pub struct MetaStore {
    root: PathBuf,
}

impl MetaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Canonical path of `parts` inside the cluster's directory
    pub fn cluster_path(&self, name: &str, parts: &[&str]) -> PathBuf {
        parts
            .iter()
            .fold(self.root.join(name), |path, part| path.join(part))
    }

    pub fn meta_path(&self, name: &str) -> PathBuf {
        self.cluster_path(name, &[META_FILE_NAME])
    }

    /// Whether a cluster with this name has persisted metadata
    pub fn exists(&self, fs: &dyn FileSystem, name: &str) -> bool {
        fs.exists(&self.meta_path(name))
    }

    pub fn save_cluster_meta(
        &self,
        fs: &dyn FileSystem,
        name: &str,
        meta: &ClusterMeta,
    ) -> ImportResult<()> {
        let content = serde_yaml::to_string(meta)?;
        let path = self.meta_path(name);

        fs.write(&path, content.as_bytes()).map_err(|err| {
            ImportError::io(format!("Failed to save metadata of cluster '{}'", name), err)
        })
    }

    pub fn load_cluster_meta(&self, fs: &dyn FileSystem, name: &str) -> ImportResult<ClusterMeta> {
        let path = self.meta_path(name);
        if !fs.exists(&path) {
            return Err(ImportError::ClusterNotFound(name.to_string()));
        }

        let content = fs.read_to_string(&path).map_err(|err| {
            ImportError::io(format!("Failed to read metadata of cluster '{}'", name), err)
        })?;

        Ok(serde_yaml::from_str(&content)?)
    }

    /// Names of all clusters with persisted metadata, sorted
    pub fn list_clusters(&self, fs: &dyn FileSystem) -> ImportResult<Vec<String>> {
        if !fs.is_dir(&self.root) {
            return Ok(Vec::new());
        }

        let entries = fs
            .read_dir(&self.root)
            .map_err(|err| ImportError::io("Failed to list clusters", err))?;

        let mut names: Vec<String> = entries
            .iter()
            .filter(|path| fs.is_dir(path) && fs.exists(&path.join(META_FILE_NAME)))
            .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
            .collect();
        names.sort();

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::spec::InstanceSpec;
    use crate::traits::MockFileSystem;

    fn sample_meta() -> ClusterMeta {
        let mut meta = ClusterMeta {
            user: "tidb".to_string(),
            tidb_version: "v3.0.12".to_string(),
            ..Default::default()
        };
        meta.topology.pd_servers.push(InstanceSpec {
            host: "10.0.1.2".to_string(),
            ssh_port: 22,
            port: 2379,
            status_port: Some(2380),
            deploy_dir: "/home/tidb/deploy".to_string(),
            ..Default::default()
        });
        meta
    }

    #[test]
    fn test_cluster_path_layout() {
        let store = MetaStore::new("/store/clusters");

        assert_eq!(
            store.cluster_path("prod", &["ssh", "id_rsa"]),
            PathBuf::from("/store/clusters/prod/ssh/id_rsa")
        );
        assert_eq!(
            store.meta_path("prod"),
            PathBuf::from("/store/clusters/prod/meta.yaml")
        );
    }

    #[test]
    fn test_save_then_load() {
        let fs = MockFileSystem::new();
        let store = MetaStore::new("/store/clusters");
        let meta = sample_meta();

        assert!(!store.exists(&fs, "prod"));
        store.save_cluster_meta(&fs, "prod", &meta).unwrap();

        assert!(store.exists(&fs, "prod"));
        assert_eq!(store.load_cluster_meta(&fs, "prod").unwrap(), meta);
    }

    #[test]
    fn test_load_unknown_cluster() {
        let fs = MockFileSystem::new();
        let store = MetaStore::new("/store/clusters");

        let err = store.load_cluster_meta(&fs, "ghost").unwrap_err();
        assert!(matches!(err, ImportError::ClusterNotFound(name) if name == "ghost"));
    }

    #[test]
    fn test_load_corrupt_metadata() {
        let fs = MockFileSystem::new();
        let store = MetaStore::new("/store/clusters");
        fs.write(&store.meta_path("bad"), b"user: [unterminated").unwrap();

        let err = store.load_cluster_meta(&fs, "bad").unwrap_err();
        assert!(matches!(err, ImportError::Metadata(_)));
    }

    #[test]
    fn test_list_skips_directories_without_metadata() {
        let fs = MockFileSystem::new();
        let store = MetaStore::new("/store/clusters");
        store.save_cluster_meta(&fs, "zeta", &sample_meta()).unwrap();
        store.save_cluster_meta(&fs, "alpha", &sample_meta()).unwrap();
        fs.create_dir_all(&store.cluster_path("leftover", &["ssh"]))
            .unwrap();

        assert_eq!(store.list_clusters(&fs).unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_list_without_store_directory() {
        let fs = MockFileSystem::new();
        let store = MetaStore::new("/nowhere");
        assert!(store.list_clusters(&fs).unwrap().is_empty());
    }
}
