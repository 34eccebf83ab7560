//! Reads a TiDB-Ansible inventory into cluster metadata
//!
//! Only the INI inventory format is understood. Variables are resolved with the
//! same precedence Ansible applies, lowest first:
//!
//! 1. `[all:vars]`
//! 2. `[<group>:vars]`
//! 3. `group_vars/all.yml`
//! 4. `group_vars/<group>.yml`
//! 5. variables on the host line

use std::collections::HashMap;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use super::InventoryParser;
use crate::import::error::{ImportError, ImportResult};
use crate::meta::{ClusterMeta, GlobalOptions, InstanceSpec, Role, Topology};
use crate::traits::FileSystem;

const DEFAULT_SSH_PORT: u16 = 22;
const DEFAULT_DEPLOY_DIR: &str = "/home/tidb/deploy";
const GROUP_VARS_DIR: &str = "group_vars";

type Vars = HashMap<String, String>;

/// How an inventory group maps onto a component role
struct GroupSpec {
    group: &'static str,
    role: Role,
    port_var: &'static str,
    default_port: u16,
    status_port: Option<(&'static str, u16)>,
}

const GROUPS: [GroupSpec; 6] = [
    GroupSpec {
        group: "pd_servers",
        role: Role::Pd,
        port_var: "pd_client_port",
        default_port: 2379,
        status_port: Some(("pd_peer_port", 2380)),
    },
    GroupSpec {
        group: "tikv_servers",
        role: Role::Tikv,
        port_var: "tikv_port",
        default_port: 20160,
        status_port: Some(("tikv_status_port", 20180)),
    },
    GroupSpec {
        group: "tidb_servers",
        role: Role::Tidb,
        port_var: "tidb_port",
        default_port: 4000,
        status_port: Some(("tidb_status_port", 10080)),
    },
    GroupSpec {
        group: "monitoring_servers",
        role: Role::Prometheus,
        port_var: "prometheus_port",
        default_port: 9090,
        status_port: None,
    },
    GroupSpec {
        group: "grafana_servers",
        role: Role::Grafana,
        port_var: "grafana_port",
        default_port: 3000,
        status_port: None,
    },
    GroupSpec {
        group: "alertmanager_servers",
        role: Role::Alertmanager,
        port_var: "alertmanager_port",
        default_port: 9093,
        status_port: Some(("alertmanager_cluster_port", 9094)),
    },
];

#[derive(Debug)]
struct HostEntry {
    alias: String,
    vars: Vars,
}

/// Sections of an INI inventory, before variable resolution
#[derive(Debug, Default)]
struct RawInventory {
    hosts: HashMap<String, Vec<HostEntry>>,
    section_vars: HashMap<String, Vars>,
}

enum Section {
    Hosts(String),
    Vars(String),
    Ignored,
}

impl RawInventory {
    fn parse(content: &str) -> ImportResult<Self> {
        let mut inventory = RawInventory::default();
        let mut section: Option<Section> = None;

        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') {
                let header = line
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                    .map(str::trim)
                    .ok_or_else(|| {
                        ImportError::Parse(format!(
                            "line {}: unterminated section header '{}'",
                            line_no, line
                        ))
                    })?;

                section = Some(match header.split_once(':') {
                    Some((group, "vars")) => Section::Vars(group.to_string()),
                    Some(_) => Section::Ignored,
                    None => {
                        inventory.hosts.entry(header.to_string()).or_default();
                        Section::Hosts(header.to_string())
                    }
                });
                continue;
            }

            match &section {
                None => {
                    return Err(ImportError::Parse(format!(
                        "line {}: entry '{}' is outside of any section",
                        line_no, line
                    )));
                }
                Some(Section::Hosts(group)) => {
                    let mut tokens = line.split_whitespace();
                    let alias = tokens.next().unwrap_or_default().to_string();
                    let mut vars = Vars::new();
                    for token in tokens {
                        let (key, value) = split_assignment(token, line_no)?;
                        vars.insert(key, value);
                    }
                    if let Some(hosts) = inventory.hosts.get_mut(group) {
                        hosts.push(HostEntry { alias, vars });
                    }
                }
                Some(Section::Vars(group)) => {
                    let (key, value) = split_assignment(line, line_no)?;
                    inventory
                        .section_vars
                        .entry(group.clone())
                        .or_default()
                        .insert(key, value);
                }
                Some(Section::Ignored) => {}
            }
        }

        Ok(inventory)
    }
}

fn split_assignment(token: &str, line_no: usize) -> ImportResult<(String, String)> {
    let (key, value) = token.split_once('=').ok_or_else(|| {
        ImportError::Parse(format!(
            "line {}: expected key=value, found '{}'",
            line_no, token
        ))
    })?;

    let key = key.trim();
    if key.is_empty() {
        return Err(ImportError::Parse(format!(
            "line {}: empty variable name in '{}'",
            line_no, token
        )));
    }

    Ok((key.to_string(), unquote(value.trim()).to_string()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Load `group_vars/<name>.yml` (or `.yaml`) as flat scalar variables
fn load_group_vars_file(fs: &dyn FileSystem, dir: &Path, name: &str) -> ImportResult<Vars> {
    let base = dir.join(GROUP_VARS_DIR);
    let Some(path) = ["yml", "yaml"]
        .iter()
        .map(|ext| base.join(format!("{}.{}", name, ext)))
        .find(|path| fs.exists(path))
    else {
        return Ok(Vars::new());
    };

    let content = fs
        .read_to_string(&path)
        .map_err(|err| ImportError::Parse(format!("{:#}", err)))?;
    let value: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|err| ImportError::Parse(format!("{}: {}", path.display(), err)))?;

    let mut vars = Vars::new();
    if let serde_yaml::Value::Mapping(mapping) = value {
        for (key, value) in mapping {
            let Some(key) = key.as_str() else { continue };
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            vars.insert(key.to_string(), value);
        }
    }

    Ok(vars)
}

fn parse_port(vars: &Vars, key: &str, default: u16) -> ImportResult<u16> {
    match vars.get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| {
            ImportError::Parse(format!("invalid value '{}' for {}", value, key))
        }),
    }
}

/// Parser for TiDB-Ansible INI inventories
pub struct AnsibleInventoryParser {
    probe_hosts: bool,
}

impl AnsibleInventoryParser {
    pub fn new() -> Self {
        Self { probe_hosts: true }
    }

    /// Skip the SSH port reachability check
    #[cfg(test)]
    pub fn without_probe(mut self) -> Self {
        self.probe_hosts = false;
        self
    }

    fn build_meta(
        &self,
        fs: &dyn FileSystem,
        dir: &Path,
        inventory: &RawInventory,
    ) -> ImportResult<(String, ClusterMeta)> {
        let empty = Vars::new();
        let mut all_vars = inventory.section_vars.get("all").cloned().unwrap_or_default();
        all_vars.extend(load_group_vars_file(fs, dir, "all")?);

        let cluster_name = all_vars.get("cluster_name").cloned().unwrap_or_default();
        let global = GlobalOptions {
            user: all_vars
                .get("ansible_user")
                .cloned()
                .unwrap_or_else(whoami::username),
            ssh_port: parse_port(&all_vars, "ansible_port", DEFAULT_SSH_PORT)?,
            deploy_dir: all_vars
                .get("deploy_dir")
                .cloned()
                .unwrap_or_else(|| DEFAULT_DEPLOY_DIR.to_string()),
        };

        let mut topology = Topology {
            global: global.clone(),
            ..Default::default()
        };

        for spec in &GROUPS {
            let Some(hosts) = inventory.hosts.get(spec.group) else {
                continue;
            };

            // [all:vars] < [group:vars] < group_vars/all < group_vars/<group>
            let mut group_vars = inventory.section_vars.get("all").cloned().unwrap_or_default();
            group_vars.extend(inventory.section_vars.get(spec.group).unwrap_or(&empty).clone());
            group_vars.extend(load_group_vars_file(fs, dir, "all")?);
            group_vars.extend(load_group_vars_file(fs, dir, spec.group)?);

            for entry in hosts {
                let mut vars = group_vars.clone();
                vars.extend(entry.vars.clone());

                let host = vars
                    .get("ansible_host")
                    .cloned()
                    .unwrap_or_else(|| entry.alias.clone());
                let instance = InstanceSpec {
                    ssh_port: parse_port(&vars, "ansible_port", global.ssh_port)?,
                    port: parse_port(&vars, spec.port_var, spec.default_port)?,
                    status_port: spec
                        .status_port
                        .map(|(key, default)| parse_port(&vars, key, default))
                        .transpose()?,
                    deploy_dir: vars
                        .get("deploy_dir")
                        .cloned()
                        .unwrap_or_else(|| global.deploy_dir.clone()),
                    data_dir: vars.get("data_dir").cloned(),
                    label: (entry.alias != host).then(|| entry.alias.clone()),
                    imported_config: None,
                    host,
                };

                let instances = topology.instances_mut(spec.role);
                if instances
                    .iter()
                    .any(|other| other.host == instance.host && other.port == instance.port)
                {
                    return Err(ImportError::Parse(format!(
                        "duplicate {} instance {}:{}",
                        spec.role, instance.host, instance.port
                    )));
                }
                debug!(role = %spec.role, host = %instance.host, port = instance.port, "parsed instance");
                instances.push(instance);
            }
        }

        if topology.instance_count() == 0 {
            return Err(ImportError::Parse("no hosts found in inventory".to_string()));
        }

        let meta = ClusterMeta {
            user: global.user.clone(),
            tidb_version: all_vars.get("tidb_version").cloned().unwrap_or_default(),
            imported_at: None,
            topology,
        };

        Ok((cluster_name, meta))
    }

    /// Fail unless every distinct SSH endpoint accepts a TCP connection in time
    fn probe(&self, topology: &Topology, timeout: Duration) -> ImportResult<()> {
        let mut seen = Vec::new();
        for (_, instance) in topology.iter() {
            let endpoint = (instance.host.clone(), instance.ssh_port);
            if seen.contains(&endpoint) {
                continue;
            }

            let unreachable = |reason: String| {
                ImportError::Parse(format!(
                    "host {}:{} is unreachable: {}",
                    endpoint.0, endpoint.1, reason
                ))
            };

            let addrs: Vec<_> = (endpoint.0.as_str(), endpoint.1)
                .to_socket_addrs()
                .map_err(|err| unreachable(err.to_string()))?
                .collect();

            let mut last_error = String::from("no address resolved");
            let reachable = addrs.iter().any(|addr| match TcpStream::connect_timeout(addr, timeout) {
                Ok(_) => true,
                Err(err) => {
                    last_error = err.to_string();
                    false
                }
            });
            if !reachable {
                return Err(unreachable(last_error));
            }

            debug!(host = %endpoint.0, port = endpoint.1, "host reachable");
            seen.push(endpoint);
        }

        Ok(())
    }
}

impl Default for AnsibleInventoryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryParser for AnsibleInventoryParser {
    fn parse(
        &self,
        fs: &dyn FileSystem,
        dir: &Path,
        inventory_file: &str,
        timeout: Duration,
    ) -> ImportResult<(String, ClusterMeta)> {
        let path = dir.join(inventory_file);
        if !fs.exists(&path) {
            return Err(ImportError::Parse(format!(
                "inventory file {} not found",
                path.display()
            )));
        }

        let content = fs
            .read_to_string(&path)
            .map_err(|err| ImportError::Parse(format!("{:#}", err)))?;
        let inventory = RawInventory::parse(&content)
            .map_err(|err| match err {
                ImportError::Parse(msg) => ImportError::Parse(format!("{}: {}", path.display(), msg)),
                other => other,
            })?;

        let (name, meta) = self.build_meta(fs, dir, &inventory)?;

        if self.probe_hosts {
            self.probe(&meta.topology, timeout)?;
        }

        Ok((name, meta))
    }
}
