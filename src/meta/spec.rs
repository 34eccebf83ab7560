use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Component role of an instance in a TiDB cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Tidb,
    Tikv,
    Pd,
    Prometheus,
    Grafana,
    Alertmanager,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Pd,
        Role::Tikv,
        Role::Tidb,
        Role::Prometheus,
        Role::Grafana,
        Role::Alertmanager,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Role::Tidb => "tidb",
            Role::Tikv => "tikv",
            Role::Pd => "pd",
            Role::Prometheus => "prometheus",
            Role::Grafana => "grafana",
            Role::Alertmanager => "alertmanager",
        }
    }

    /// Config file relative to the instance deploy dir, for roles that have one
    pub fn config_file(&self) -> Option<&'static str> {
        match self {
            Role::Tidb => Some("conf/tidb.toml"),
            Role::Tikv => Some("conf/tikv.toml"),
            Role::Pd => Some("conf/pd.toml"),
            Role::Prometheus | Role::Grafana | Role::Alertmanager => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Persisted description of a managed cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterMeta {
    /// Deployment user on every host
    pub user: String,
    pub tidb_version: String,
    /// Set once remote configuration has been pulled in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_at: Option<DateTime<Utc>>,
    pub topology: Topology,
}

/// Options shared by all instances unless overridden
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub user: String,
    pub ssh_port: u16,
    pub deploy_dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub global: GlobalOptions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tidb_servers: Vec<InstanceSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tikv_servers: Vec<InstanceSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pd_servers: Vec<InstanceSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monitoring_servers: Vec<InstanceSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grafana_servers: Vec<InstanceSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alertmanager_servers: Vec<InstanceSpec>,
}

impl Topology {
    pub fn instances(&self, role: Role) -> &[InstanceSpec] {
        match role {
            Role::Tidb => &self.tidb_servers,
            Role::Tikv => &self.tikv_servers,
            Role::Pd => &self.pd_servers,
            Role::Prometheus => &self.monitoring_servers,
            Role::Grafana => &self.grafana_servers,
            Role::Alertmanager => &self.alertmanager_servers,
        }
    }

    pub fn instances_mut(&mut self, role: Role) -> &mut Vec<InstanceSpec> {
        match role {
            Role::Tidb => &mut self.tidb_servers,
            Role::Tikv => &mut self.tikv_servers,
            Role::Pd => &mut self.pd_servers,
            Role::Prometheus => &mut self.monitoring_servers,
            Role::Grafana => &mut self.grafana_servers,
            Role::Alertmanager => &mut self.alertmanager_servers,
        }
    }

    /// All instances paired with their role, in `Role::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = (Role, &InstanceSpec)> {
        Role::ALL
            .into_iter()
            .flat_map(move |role| self.instances(role).iter().map(move |spec| (role, spec)))
    }

    pub fn instance_count(&self) -> usize {
        Role::ALL.iter().map(|role| self.instances(*role).len()).sum()
    }
}

/// A single component instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub host: String,
    pub ssh_port: u16,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_port: Option<u16>,
    pub deploy_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Inventory alias, when it differs from the host address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Cached copy of the remote config, relative to the cluster directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_config: Option<String>,
}
