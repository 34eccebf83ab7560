use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

/// Overrides the profile directory holding the cluster store
pub const HOME_ENV: &str = "TIUP_CLUSTER_HOME";
/// Overrides the private key copied into imported clusters
pub const SSH_KEY_ENV: &str = "TIUP_CLUSTER_SSH_KEY";

/// Default timeout for SSH and reachability checks, in seconds
pub const DEFAULT_SSH_TIMEOUT_SECS: u64 = 5;

/// Locations resolved once at startup and shared by all commands
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the profile; clusters live in `<storage_root>/clusters`
    pub storage_root: PathBuf,
    /// Private key of the deployment user; `<key>.pub` sits next to it
    pub ssh_key_path: PathBuf,
}

impl Settings {
    /// Resolve settings from the environment, falling back to the home directory
    pub fn load() -> Result<Self> {
        Self::resolve(
            std::env::var_os(HOME_ENV).map(PathBuf::from),
            std::env::var_os(SSH_KEY_ENV).map(PathBuf::from),
            dirs::home_dir(),
        )
    }

    fn resolve(
        home_override: Option<PathBuf>,
        key_override: Option<PathBuf>,
        home_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let home = || {
            home_dir
                .clone()
                .ok_or_else(|| anyhow!("Unable to determine home directory"))
        };

        let storage_root = match home_override {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => home()?.join(".tiup").join("storage").join("cluster"),
        };

        let ssh_key_path = match key_override {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => home()?.join(".ssh").join("id_rsa"),
        };

        Ok(Self {
            storage_root,
            ssh_key_path,
        })
    }

    /// Settings rooted at an explicit directory, for tests
    #[cfg(test)]
    pub fn rooted(storage_root: &Path, ssh_key_path: &Path) -> Self {
        Self {
            storage_root: storage_root.to_path_buf(),
            ssh_key_path: ssh_key_path.to_path_buf(),
        }
    }

    /// Directory holding one subdirectory per managed cluster
    pub fn clusters_dir(&self) -> PathBuf {
        self.storage_root.join("clusters")
    }
}

/// Public half of a keypair, following the `.pub` suffix convention
pub fn public_key_path(private_key: &Path) -> PathBuf {
    let mut path = private_key.as_os_str().to_owned();
    path.push(".pub");
    PathBuf::from(path)
}
