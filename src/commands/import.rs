use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use crate::ansible::{ANSIBLE_INVENTORY_FILE, AnsibleInventoryParser, SshConfigImporter};
use crate::context::Context;
use crate::import::{AnsibleImporter, ImportRequest};

/// Import an existing TiDB cluster from TiDB-Ansible
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// The path to TiDB-Ansible directory (defaults to current directory)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// The name of inventory file
    #[arg(long, default_value = ANSIBLE_INVENTORY_FILE)]
    inventory: String,

    /// Rename the imported cluster to `NAME`
    #[arg(short, long, value_name = "NAME")]
    rename: Option<String>,
}

impl ImportCommand {
    pub fn execute(self, ctx: &Context, ssh_timeout: Duration) -> Result<()> {
        let store = ctx.store();
        let parser = AnsibleInventoryParser::new();
        let config_importer =
            SshConfigImporter::new(ctx.fs.clone(), ctx.command.clone(), store.clone());

        let request = ImportRequest {
            ansible_dir: self.dir,
            inventory_file: self.inventory,
            rename: self.rename,
            ssh_timeout,
        };

        let name = AnsibleImporter::new(
            &*ctx.fs,
            &*ctx.output,
            &store,
            &ctx.settings.ssh_key_path,
            &parser,
            &config_importer,
        )
        .run(&request)?;

        ctx.output.hint(
            "Try `",
            &format!("tiup-cluster display {}", name),
            "` to see the cluster.",
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::ImportError;
    use crate::settings::Settings;
    use crate::traits::FileSystem;
    use crate::traits::{
        MockCommandExecutor, MockCommandResult, MockFileSystem, MockOutput, OutputMessage,
    };
    use std::net::TcpListener;
    use std::path::Path;
    use std::sync::Arc;

    struct Harness {
        ctx: Context,
        fs: Arc<MockFileSystem>,
        output: Arc<MockOutput>,
        command: Arc<MockCommandExecutor>,
        // Keeps the SSH port "reachable" for the probe
        _listener: TcpListener,
    }

    fn harness() -> Harness {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let fs = Arc::new(MockFileSystem::new());
        fs.write(
            Path::new("/ansible/inventory.ini"),
            format!(
                "[tidb_servers]\n127.0.0.1 ansible_port={port}\n\n[grafana_servers]\n127.0.0.1 ansible_port={port}\n\n[all:vars]\ncluster_name = prod-cluster\nansible_user = tidb\ntidb_version = v3.0.12\n"
            )
            .as_bytes(),
        )
        .unwrap();
        fs.write(Path::new("/keys/id_rsa"), b"private").unwrap();
        fs.write(Path::new("/keys/id_rsa.pub"), b"public").unwrap();

        let output = Arc::new(MockOutput::new());
        let command = Arc::new(MockCommandExecutor::new());
        let ctx = Context::test_with(
            fs.clone(),
            output.clone(),
            command.clone(),
            Settings::rooted(Path::new("/profile"), Path::new("/keys/id_rsa")),
        );

        Harness {
            ctx,
            fs,
            output,
            command,
            _listener: listener,
        }
    }

    fn command(rename: Option<&str>) -> ImportCommand {
        ImportCommand {
            dir: Some(PathBuf::from("/ansible")),
            inventory: ANSIBLE_INVENTORY_FILE.to_string(),
            rename: rename.map(str::to_string),
        }
    }

    #[test]
    fn test_import_end_to_end_with_mocks() {
        let h = harness();
        h.command
            .add_output(MockCommandResult::ok("ssh", "[log]\nlevel = \"warn\"\n"));

        command(None)
            .execute(&h.ctx, Duration::from_secs(3))
            .unwrap();

        let store = h.ctx.store();
        let meta = store.load_cluster_meta(&*h.fs, "prod-cluster").unwrap();
        assert_eq!(meta.tidb_version, "v3.0.12");
        assert_eq!(
            meta.topology.tidb_servers[0].imported_config.as_deref(),
            Some("config-cache/tidb-127.0.0.1-4000.toml")
        );
        assert!(meta.imported_at.is_some());
        assert_eq!(
            h.fs.get_file_contents(&store.cluster_path("prod-cluster", &["ssh", "id_rsa.pub"])),
            Some(b"public".to_vec())
        );
        assert!(!h.fs.exists(Path::new("/ansible")));
        assert_eq!(h.command.calls().len(), 1);
        assert!(h.output.contains_message(&OutputMessage::Hint(
            "Try `tiup-cluster display prod-cluster` to see the cluster.".to_string()
        )));
    }

    #[test]
    fn test_import_duplicate_surfaces_import_error() {
        let h = harness();
        h.ctx
            .store()
            .save_cluster_meta(&*h.fs, "prod-cluster", &Default::default())
            .unwrap();

        let err = command(None)
            .execute(&h.ctx, Duration::from_secs(3))
            .unwrap_err();

        let import_err = err.downcast_ref::<ImportError>().unwrap();
        assert!(import_err.suggestion().is_some());
        assert!(h.command.calls().is_empty());
    }

    #[test]
    fn test_import_with_rename() {
        let h = harness();

        command(Some("staging"))
            .execute(&h.ctx, Duration::from_secs(3))
            .unwrap();

        assert!(h.ctx.store().exists(&*h.fs, "staging"));
        assert!(!h.ctx.store().exists(&*h.fs, "prod-cluster"));
    }
}
