use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::ConfigImporter;
use crate::import::error::{ImportError, ImportResult};
use crate::meta::{ClusterMeta, InstanceSpec, MetaStore, Role};
use crate::traits::{CommandExecutor, FileSystem};

/// Directory inside the cluster directory holding fetched configs
pub const CONFIG_CACHE_DIR: &str = "config-cache";

/// Pulls component configs from deployment hosts over `ssh`
pub struct SshConfigImporter {
    fs: Arc<dyn FileSystem>,
    command: Arc<dyn CommandExecutor>,
    store: MetaStore,
}

impl SshConfigImporter {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        command: Arc<dyn CommandExecutor>,
        store: MetaStore,
    ) -> Self {
        Self { fs, command, store }
    }

    fn ssh_args(
        key: &Path,
        user: &str,
        instance: &InstanceSpec,
        timeout: Duration,
        remote_path: &str,
    ) -> Vec<String> {
        vec![
            "-i".to_string(),
            key.display().to_string(),
            "-p".to_string(),
            instance.ssh_port.to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", timeout.as_secs().max(1)),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            format!("{}@{}", user, instance.host),
            "cat".to_string(),
            remote_path.to_string(),
        ]
    }
}

impl ConfigImporter for SshConfigImporter {
    fn import_config(
        &self,
        name: &str,
        meta: &mut ClusterMeta,
        timeout: Duration,
    ) -> ImportResult<()> {
        let key = self.store.cluster_path(name, &["ssh", "id_rsa"]);
        let cache_dir = self.store.cluster_path(name, &[CONFIG_CACHE_DIR]);
        let user = meta.user.clone();

        for role in Role::ALL {
            let Some(config_file) = role.config_file() else {
                continue;
            };

            for instance in meta.topology.instances_mut(role) {
                let endpoint = format!("{}:{}", instance.host, instance.ssh_port);
                let remote_path =
                    format!("{}/{}", instance.deploy_dir.trim_end_matches('/'), config_file);
                debug!(%role, host = %instance.host, path = %remote_path, "fetching config");

                let args = Self::ssh_args(&key, &user, instance, timeout, &remote_path);
                let output = self.command.execute("ssh", &args).map_err(|err| {
                    ImportError::RemoteFetch {
                        host: endpoint.clone(),
                        message: format!("{:#}", err),
                    }
                })?;

                if !output.status.success() {
                    let status = output
                        .status
                        .code()
                        .map(|code| format!("exit code {}", code))
                        .unwrap_or_else(|| "terminated by signal".to_string());
                    return Err(ImportError::RemoteFetch {
                        host: endpoint,
                        message: format!(
                            "reading {} failed ({}): {}",
                            remote_path,
                            status,
                            String::from_utf8_lossy(&output.stderr).trim()
                        ),
                    });
                }

                let file_name = format!("{}-{}-{}.toml", role, instance.host, instance.port);
                let target = cache_dir.join(&file_name);
                self.fs.write(&target, &output.stdout).map_err(|err| {
                    ImportError::io(format!("Failed to cache config of {}", endpoint), err)
                })?;

                instance.imported_config = Some(format!("{}/{}", CONFIG_CACHE_DIR, file_name));
            }
        }

        meta.imported_at = Some(Utc::now());
        Ok(())
    }
}
