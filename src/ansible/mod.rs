//! TiDB-Ansible collaborators: inventory parsing and remote config import

pub mod config_import;
pub mod inventory;

use std::path::Path;
use std::time::Duration;

use crate::import::error::ImportResult;
use crate::meta::ClusterMeta;
use crate::traits::FileSystem;

pub use config_import::{CONFIG_CACHE_DIR, SshConfigImporter};
pub use inventory::AnsibleInventoryParser;

/// Inventory file name used by TiDB-Ansible
pub const ANSIBLE_INVENTORY_FILE: &str = "inventory.ini";

/// Turns an inventory directory into a cluster name and metadata
pub trait InventoryParser {
    fn parse(
        &self,
        fs: &dyn FileSystem,
        dir: &Path,
        inventory_file: &str,
        timeout: Duration,
    ) -> ImportResult<(String, ClusterMeta)>;
}

/// Enriches metadata with configuration read from the live deployment
pub trait ConfigImporter {
    fn import_config(
        &self,
        name: &str,
        meta: &mut ClusterMeta,
        timeout: Duration,
    ) -> ImportResult<()>;
}
