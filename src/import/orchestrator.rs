use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use super::error::{ImportError, ImportResult};
use super::rollback::RollbackManager;
use crate::ansible::{CONFIG_CACHE_DIR, ConfigImporter, InventoryParser};
use crate::meta::{ClusterMeta, MetaStore};
use crate::settings::public_key_path;
use crate::traits::{FileSystem, Output};

/// Directory inside the cluster directory that receives the moved Ansible directory
pub const ANSIBLE_BACKUP_DIR: &str = "ansible-backup";

/// Inputs of a single import run
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Source inventory directory; `None` means the current working directory
    pub ansible_dir: Option<PathBuf>,
    pub inventory_file: String,
    /// Overrides the cluster name found in the inventory when non-empty
    pub rename: Option<String>,
    /// Bounds every network operation against deployment hosts
    pub ssh_timeout: Duration,
}

/// Stages of the import, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStep {
    ParsingInventory,
    ResolvingName,
    ValidatingDuplicate,
    CopyingCredentials,
    ImportingConfig,
    PersistingMetadata,
    ArchivingSource,
}

impl fmt::Display for ImportStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportStep::ParsingInventory => "parsing inventory",
            ImportStep::ResolvingName => "resolving name",
            ImportStep::ValidatingDuplicate => "validating duplicate",
            ImportStep::CopyingCredentials => "copying credentials",
            ImportStep::ImportingConfig => "importing config",
            ImportStep::PersistingMetadata => "persisting metadata",
            ImportStep::ArchivingSource => "archiving source",
        };
        f.write_str(name)
    }
}

/// Final cluster name: a non-empty rename wins over the parsed name
pub fn resolve_cluster_name(parsed: String, rename: Option<&str>) -> ImportResult<String> {
    let name = match rename {
        Some(rename) if !rename.is_empty() => rename.to_string(),
        _ => parsed,
    };

    if name.is_empty() {
        return Err(ImportError::Validation(
            "cluster name should not be empty".to_string(),
        ));
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ImportError::Validation(format!(
            "cluster name '{}' must not contain path separators",
            name
        )));
    }

    Ok(name)
}

/// Migrates a TiDB-Ansible deployment into the metadata store.
///
/// Steps run strictly in order and the first failure aborts the run. The
/// duplicate-name check happens before anything is written. If copying keys,
/// importing config or saving metadata fails, paths created by this run are
/// removed again; a failure while archiving the source directory is reported
/// as-is since the cluster is already registered at that point.
pub struct AnsibleImporter<'a> {
    fs: &'a dyn FileSystem,
    output: &'a dyn Output,
    store: &'a MetaStore,
    ssh_key_path: &'a Path,
    parser: &'a dyn InventoryParser,
    config_importer: &'a dyn ConfigImporter,
}

impl<'a> AnsibleImporter<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        output: &'a dyn Output,
        store: &'a MetaStore,
        ssh_key_path: &'a Path,
        parser: &'a dyn InventoryParser,
        config_importer: &'a dyn ConfigImporter,
    ) -> Self {
        Self {
            fs,
            output,
            store,
            ssh_key_path,
            parser,
            config_importer,
        }
    }

    /// Run the import and return the name the cluster was registered under
    pub fn run(&self, request: &ImportRequest) -> ImportResult<String> {
        let dir_arg = request.ansible_dir.clone().unwrap_or_default();

        let (parsed_name, mut meta) = Self::step(ImportStep::ParsingInventory, || {
            self.parser.parse(
                self.fs,
                &dir_arg,
                &request.inventory_file,
                request.ssh_timeout,
            )
        })?;

        let (name, ansible_dir) = Self::step(ImportStep::ResolvingName, || {
            // Resolved after parsing so the parser sees the caller's relative default
            let ansible_dir = if dir_arg.as_os_str().is_empty() {
                self.fs.current_dir().map_err(|err| {
                    ImportError::io("Failed to resolve current working directory", err)
                })?
            } else {
                dir_arg.clone()
            };
            let name = resolve_cluster_name(parsed_name, request.rename.as_deref())?;
            Ok((name, ansible_dir))
        })?;

        Self::step(ImportStep::ValidatingDuplicate, || {
            if self.store.exists(self.fs, &name) {
                return Err(ImportError::duplicate_name(&name));
            }
            Ok(())
        })?;

        let mut rollback = RollbackManager::new();
        if let Err(err) = self.register(&name, &mut meta, request.ssh_timeout, &mut rollback) {
            if rollback.has_tracked_items() {
                let result = rollback.rollback(self.fs);
                debug!(%result, "rolled back partial import");
                if !result.is_complete() {
                    self.output.warning(&format!(
                        "{}; remove {} manually",
                        result,
                        self.store.cluster_path(&name, &[]).display()
                    ));
                }
            }
            return Err(err);
        }

        let backup_dir = self.store.cluster_path(&name, &[ANSIBLE_BACKUP_DIR]);
        Self::step(ImportStep::ArchivingSource, || {
            self.fs.rename(&ansible_dir, &backup_dir).map_err(|err| {
                ImportError::io(
                    format!(
                        "Cluster '{}' was imported but moving {} to {} failed",
                        name,
                        ansible_dir.display(),
                        backup_dir.display()
                    ),
                    err,
                )
            })
        })?;

        self.output.info(&format!(
            "Ansible inventory saved in {}.",
            backup_dir.display()
        ));
        self.output.success(&format!("Cluster {} imported.", name));
        info!(cluster = %name, "import completed");

        Ok(name)
    }

    /// Steps that write into the cluster directory and are undone on failure
    fn register(
        &self,
        name: &str,
        meta: &mut ClusterMeta,
        timeout: Duration,
        rollback: &mut RollbackManager,
    ) -> ImportResult<()> {
        Self::step(ImportStep::CopyingCredentials, || {
            self.copy_ssh_keys(name, rollback)
        })?;

        Self::step(ImportStep::ImportingConfig, || {
            rollback.track_new_dir(self.fs, &self.store.cluster_path(name, &[CONFIG_CACHE_DIR]));
            self.config_importer.import_config(name, meta, timeout)
        })?;

        Self::step(ImportStep::PersistingMetadata, || {
            rollback.track_new_file(self.fs, &self.store.meta_path(name));
            self.store.save_cluster_meta(self.fs, name, meta)
        })
    }

    fn copy_ssh_keys(&self, name: &str, rollback: &mut RollbackManager) -> ImportResult<()> {
        let ssh_dir = self.store.cluster_path(name, &["ssh"]);
        rollback.track_new_dir(self.fs, &self.store.cluster_path(name, &[]));
        rollback.track_new_dir(self.fs, &ssh_dir);
        self.fs.create_dir_all(&ssh_dir).map_err(|err| {
            ImportError::io(
                format!("Failed to create SSH key directory {}", ssh_dir.display()),
                err,
            )
        })?;

        let src_priv = self.ssh_key_path.to_path_buf();
        let src_pub = public_key_path(&src_priv);
        let dst_priv = ssh_dir.join("id_rsa");
        let dst_pub = public_key_path(&dst_priv);

        for (src, dst) in [(&src_priv, &dst_priv), (&src_pub, &dst_pub)] {
            rollback.track_new_file(self.fs, dst);
            self.fs.copy_file(src, dst).map_err(|err| {
                ImportError::io(format!("Failed to copy SSH key {}", src.display()), err)
            })?;
        }

        Ok(())
    }

    fn step<T>(step: ImportStep, run: impl FnOnce() -> ImportResult<T>) -> ImportResult<T> {
        debug!(%step, "import step");
        run().inspect_err(|err| debug!(%step, error = %err, "import step failed"))
    }
}
