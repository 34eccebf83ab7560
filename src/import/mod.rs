//! Import of TiDB-Ansible deployments into the metadata store
//!
//! The migration runs as a fixed pipeline:
//!
//! 1. parse the inventory
//! 2. resolve the source directory and cluster name
//! 3. reject names that are already registered
//! 4. copy the SSH keypair into the cluster directory
//! 5. pull component configs from the hosts
//! 6. save `meta.yaml`
//! 7. move the Ansible directory to `ansible-backup`
//!
//! ```bash
//! tiup-cluster import --dir /home/tidb/tidb-ansible --rename staging
//! ```

pub mod error;
pub mod orchestrator;
pub mod rollback;

pub use error::ImportError;
pub use orchestrator::{AnsibleImporter, ImportRequest};
