use anyhow::Result;

use crate::context::Context;

/// List all clusters in the metadata store
pub struct ListCommand;

impl ListCommand {
    pub fn execute(ctx: &Context) -> Result<()> {
        let store = ctx.store();
        let names = store.list_clusters(&*ctx.fs)?;

        if names.is_empty() {
            ctx.output.info("No clusters found");
            return Ok(());
        }

        let rows: Vec<Vec<String>> = names
            .iter()
            .map(|name| match store.load_cluster_meta(&*ctx.fs, name) {
                Ok(meta) => vec![
                    name.clone(),
                    meta.user,
                    meta.tidb_version,
                    meta.topology.instance_count().to_string(),
                ],
                Err(err) => {
                    ctx.output
                        .warning(&format!("Cannot read cluster '{}': {}", name, err));
                    vec![name.clone(), "-".to_string(), "-".to_string(), "-".to_string()]
                }
            })
            .collect();

        ctx.output
            .table(&["Name", "User", "Version", "Instances"], &rows);

        Ok(())
    }
}
