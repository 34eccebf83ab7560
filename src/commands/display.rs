use anyhow::Result;
use clap::Args;

use crate::context::Context;
use crate::meta::ClusterMeta;

/// Display information of a cluster
#[derive(Debug, Args)]
pub struct DisplayCommand {
    /// Name of the cluster
    name: String,

    /// Print the stored metadata as JSON
    #[arg(long)]
    json: bool,
}

impl DisplayCommand {
    pub fn execute(self, ctx: &Context) -> Result<()> {
        let meta = ctx.store().load_cluster_meta(&*ctx.fs, &self.name)?;

        if self.json {
            ctx.output.plain(&serde_json::to_string_pretty(&meta)?);
            return Ok(());
        }

        ctx.output.section(&format!("Cluster: {}", self.name));
        ctx.output.key_value("Version", &meta.tidb_version);
        ctx.output.key_value("Deploy user", &meta.user);
        ctx.output
            .key_value("SSH port", &meta.topology.global.ssh_port.to_string());
        ctx.output.key_value(
            "Imported at",
            &meta
                .imported_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        );
        ctx.output.blank();

        ctx.output.table(
            &["ID", "Role", "Host", "Ports", "Deploy Dir", "Config"],
            &instance_rows(&meta),
        );

        Ok(())
    }
}

fn instance_rows(meta: &ClusterMeta) -> Vec<Vec<String>> {
    meta.topology
        .iter()
        .map(|(role, instance)| {
            let ports = match instance.status_port {
                Some(status) => format!("{}/{}", instance.port, status),
                None => instance.port.to_string(),
            };
            vec![
                format!("{}:{}", instance.host, instance.port),
                role.to_string(),
                instance.host.clone(),
                ports,
                instance.deploy_dir.clone(),
                if instance.imported_config.is_some() {
                    "cached".to_string()
                } else {
                    "-".to_string()
                },
            ]
        })
        .collect()
}
