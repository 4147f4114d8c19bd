//! Proxmox VE adapter.
//!
//! Every response of `/api2/json` is wrapped in `{"data": ...}`. Password
//! credentials log in through `/access/ticket`; API tokens are sent as
//! `Authorization: PVEAPIToken=...` and need no CSRF token.

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Method;
use reqwest::header::HeaderValue;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use super::http::{HttpSettings, RequestAuth, Target, UpstreamClient};
use super::{ServiceAdapter, ServiceHealth};
use crate::credentials::{AuthScheme, Credential, ServiceType};
use crate::{Error, Result};

const API_ROOT: &str = "api2/json";
const CSRF_HEADER: &str = "CSRFPreventionToken";
const DEFAULT_NET0: &str = "virtio,bridge=vmbr0";
const DEFAULT_DISK_GB: u32 = 32;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct Ticket {
    ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    csrf_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PveVersion {
    pub version: String,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub repoid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Node {
    pub node: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub maxcpu: Option<u64>,
    #[serde(default)]
    pub mem: Option<u64>,
    #[serde(default)]
    pub maxmem: Option<u64>,
    #[serde(default)]
    pub disk: Option<u64>,
    #[serde(default)]
    pub maxdisk: Option<u64>,
    #[serde(default)]
    pub uptime: Option<u64>,
}

/// A node listing entry plus its detailed `/status` document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NodeDetail {
    #[serde(flatten)]
    pub node: Node,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ClusterResource {
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    maxcpu: Option<u64>,
    #[serde(default)]
    maxmem: Option<u64>,
    #[serde(default)]
    maxdisk: Option<u64>,
}

/// Counts and capacity totals across the cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClusterOverview {
    pub nodes: usize,
    pub online_nodes: usize,
    /// QEMU guests and LXC containers.
    pub vms: usize,
    pub running_vms: usize,
    pub storage: usize,
    pub total_cpu: u64,
    /// Bytes.
    pub total_memory: u64,
    /// Bytes, summed over storage.
    pub total_disk: u64,
}

impl ClusterOverview {
    fn from_resources(resources: &[ClusterResource]) -> Self {
        let mut overview = Self::default();
        for r in resources {
            match r.resource_type.as_str() {
                "node" => {
                    overview.nodes += 1;
                    if r.status.as_deref() == Some("online") {
                        overview.online_nodes += 1;
                    }
                    overview.total_cpu += r.maxcpu.unwrap_or(0);
                    overview.total_memory += r.maxmem.unwrap_or(0);
                }
                "qemu" | "lxc" => {
                    overview.vms += 1;
                    if r.status.as_deref() == Some("running") {
                        overview.running_vms += 1;
                    }
                }
                "storage" => {
                    overview.storage += 1;
                    overview.total_disk += r.maxdisk.unwrap_or(0);
                }
                _ => {}
            }
        }
        overview
    }
}

#[derive(Debug, Clone, Deserialize)]
struct QemuEntry {
    vmid: u32,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    cpu: Option<f64>,
    #[serde(default)]
    maxmem: Option<u64>,
    #[serde(default)]
    maxdisk: Option<u64>,
    #[serde(default)]
    uptime: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vm {
    pub vmid: u32,
    pub name: String,
    pub status: String,
    pub node: String,
    pub cpu: Option<f64>,
    /// Configured memory in bytes.
    pub memory: Option<u64>,
    /// Configured disk size in bytes.
    pub disk: Option<u64>,
    pub uptime: Option<u64>,
}

impl Vm {
    fn from_entry(node: &str, entry: QemuEntry) -> Self {
        Self {
            name: entry.name.unwrap_or_else(|| format!("VM {}", entry.vmid)),
            vmid: entry.vmid,
            status: entry.status,
            node: node.to_string(),
            cpu: entry.cpu,
            memory: entry.maxmem,
            disk: entry.maxdisk,
            uptime: entry.uptime,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateVm {
    /// Allocated through `/cluster/nextid` when omitted.
    #[serde(default)]
    pub vmid: Option<u32>,
    pub name: String,
    #[serde(default = "default_cores")]
    pub cores: u32,
    /// Memory in MiB.
    #[serde(default = "default_memory")]
    pub memory: u32,
    /// Disk size in GiB.
    #[serde(default)]
    pub disk: Option<u32>,
    #[serde(default)]
    pub net0: Option<String>,
    #[serde(default = "default_ostype")]
    pub ostype: String,
    #[serde(default = "default_storage")]
    pub storage: String,
    /// ISO volume to attach as CD-ROM, e.g. `local:iso/debian.iso`.
    #[serde(default)]
    pub iso: Option<String>,
}

fn default_cores() -> u32 {
    1
}

fn default_memory() -> u32 {
    512
}

fn default_ostype() -> String {
    "other".to_string()
}

fn default_storage() -> String {
    "local-lvm".to_string()
}

impl CreateVm {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("VM name must not be empty"));
        }
        if self.cores == 0 || self.memory == 0 {
            return Err(Error::validation("cores and memory must be greater than zero"));
        }
        if self.vmid.is_some_and(|id| id < 100) {
            return Err(Error::validation("vmid must be 100 or greater"));
        }
        Ok(())
    }

    fn form(&self, vmid: u32) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("vmid", vmid.to_string()),
            ("name", self.name.trim().to_string()),
            ("cores", self.cores.to_string()),
            ("memory", self.memory.to_string()),
            ("ostype", self.ostype.clone()),
            (
                "net0",
                self.net0.clone().unwrap_or_else(|| DEFAULT_NET0.to_string()),
            ),
            (
                "scsi0",
                format!("{}:{}", self.storage, self.disk.unwrap_or(DEFAULT_DISK_GB)),
            ),
        ];
        if let Some(iso) = &self.iso {
            form.push(("ide2", format!("{},media=cdrom", iso)));
        }
        form
    }
}

/// Reference to an asynchronous Proxmox task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VmTask {
    pub node: String,
    pub vmid: u32,
    /// Task UPID.
    pub task: Option<String>,
}

/// Client for one Proxmox VE cluster.
#[derive(Debug, Clone)]
pub struct ProxmoxAdapter {
    client: UpstreamClient,
    version: PveVersion,
}

impl ProxmoxAdapter {
    async fn data<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        target: Option<Target<'_>>,
    ) -> Result<T> {
        let envelope: Envelope<T> = self
            .client
            .json(self.client.request(method, path), target)
            .await?;
        Ok(envelope.data)
    }

    /// `data` for a path below `/nodes` built from node names and ids.
    async fn node_data<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        target: Option<Target<'_>>,
    ) -> Result<T> {
        let request = self.client.request_at(method, "nodes", segments)?;
        let envelope: Envelope<T> = self.client.json(request, target).await?;
        Ok(envelope.data)
    }

    pub fn version(&self) -> &PveVersion {
        &self.version
    }

    pub async fn nodes(&self) -> Result<Vec<Node>> {
        self.data(Method::GET, "nodes", None).await
    }

    async fn ensure_node(&self, name: &str) -> Result<Node> {
        self.nodes()
            .await?
            .into_iter()
            .find(|n| n.node == name)
            .ok_or_else(|| Error::not_found("Node", name))
    }

    pub async fn node(&self, name: &str) -> Result<NodeDetail> {
        let node = self.ensure_node(name).await?;
        let details = self
            .node_data(Method::GET, &[name, "status"], Some(Target::new("Node", name)))
            .await?;
        Ok(NodeDetail { node, details })
    }

    pub async fn cluster_overview(&self) -> Result<ClusterOverview> {
        let resources: Vec<ClusterResource> =
            self.data(Method::GET, "cluster/resources", None).await?;
        Ok(ClusterOverview::from_resources(&resources))
    }

    async fn node_vms(&self, node: &str) -> Result<Vec<Vm>> {
        let entries: Vec<QemuEntry> = self
            .node_data(Method::GET, &[node, "qemu"], Some(Target::new("Node", node)))
            .await?;
        Ok(entries.into_iter().map(|e| Vm::from_entry(node, e)).collect())
    }

    /// QEMU guests on one node, or on every online node.
    pub async fn vms(&self, node: Option<&str>) -> Result<Vec<Vm>> {
        let nodes: Vec<String> = match node {
            Some(name) => vec![self.ensure_node(name).await?.node],
            None => self
                .nodes()
                .await?
                .into_iter()
                .filter(|n| n.status.is_empty() || n.status == "online")
                .map(|n| n.node)
                .collect(),
        };

        let per_node = try_join_all(nodes.iter().map(|n| self.node_vms(n))).await?;
        let mut vms: Vec<Vm> = per_node.into_iter().flatten().collect();
        vms.sort_by(|a, b| a.node.cmp(&b.node).then(a.vmid.cmp(&b.vmid)));
        Ok(vms)
    }

    pub async fn vm(&self, node: &str, vmid: u32) -> Result<Vm> {
        self.ensure_node(node).await?;
        self.node_vms(node)
            .await?
            .into_iter()
            .find(|vm| vm.vmid == vmid)
            .ok_or_else(|| Error::not_found("VM", format!("{}/{}", node, vmid)))
    }

    async fn next_vmid(&self) -> Result<u32> {
        // Returned as a string by most versions, as a number by some.
        let id: serde_json::Value = self.data(Method::GET, "cluster/nextid", None).await?;
        let parsed = match &id {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            _ => None,
        };
        parsed.ok_or_else(|| Error::unavailable(format!("Proxmox returned an invalid next id: {}", id)))
    }

    pub async fn create_vm(&self, node: &str, req: &CreateVm) -> Result<VmTask> {
        req.validate()?;
        self.ensure_node(node).await?;

        let vmid = match req.vmid {
            Some(vmid) => vmid,
            None => self.next_vmid().await?,
        };

        let envelope: Envelope<Option<String>> = self
            .client
            .json(
                self.client
                    .request_at(Method::POST, "nodes", &[node, "qemu"])?
                    .form(&req.form(vmid)),
                Some(Target::new("Node", node)),
            )
            .await?;
        info!(node = %node, vmid, name = %req.name, "Created Proxmox VM");

        Ok(VmTask {
            node: node.to_string(),
            vmid,
            task: envelope.data,
        })
    }

    async fn vm_task(
        &self,
        method: Method,
        node: &str,
        vmid: u32,
        action: &[&str],
    ) -> Result<VmTask> {
        self.vm(node, vmid).await?;
        let vmid_str = vmid.to_string();
        let id = format!("{}/{}", node, vmid);
        let mut segments = vec![node, "qemu", vmid_str.as_str()];
        segments.extend_from_slice(action);
        let task: Option<String> = self
            .node_data(method, &segments, Some(Target::new("VM", &id)))
            .await?;
        Ok(VmTask {
            node: node.to_string(),
            vmid,
            task,
        })
    }

    pub async fn start_vm(&self, node: &str, vmid: u32) -> Result<VmTask> {
        let task = self.vm_task(Method::POST, node, vmid, &["status", "start"]).await?;
        info!(node = %node, vmid, "Started Proxmox VM");
        Ok(task)
    }

    pub async fn stop_vm(&self, node: &str, vmid: u32) -> Result<VmTask> {
        let task = self.vm_task(Method::POST, node, vmid, &["status", "stop"]).await?;
        info!(node = %node, vmid, "Stopped Proxmox VM");
        Ok(task)
    }

    pub async fn delete_vm(&self, node: &str, vmid: u32) -> Result<VmTask> {
        let task = self.vm_task(Method::DELETE, node, vmid, &[]).await?;
        info!(node = %node, vmid, "Deleted Proxmox VM");
        Ok(task)
    }
}

fn header_value(value: String, what: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(value)
        .map_err(|_| Error::validation(format!("Proxmox {} contains invalid characters", what)))
}

async fn login(client: &UpstreamClient, username: &str, password: &str) -> Result<RequestAuth> {
    // Proxmox answers a failed login with 401, or with 200 and `data: null`.
    let envelope: Envelope<Option<Ticket>> = client
        .json(
            client
                .request(Method::POST, "access/ticket")
                .form(&[("username", username), ("password", password)]),
            None,
        )
        .await?;
    let ticket = envelope
        .data
        .ok_or_else(|| Error::authentication("Proxmox rejected the login"))?;

    Ok(RequestAuth::Session {
        cookie: header_value(format!("PVEAuthCookie={}", ticket.ticket), "ticket")?,
        csrf_header: CSRF_HEADER,
        csrf_token: header_value(ticket.csrf_token, "CSRF token")?,
    })
}

#[async_trait]
impl ServiceAdapter for ProxmoxAdapter {
    const SERVICE_TYPE: ServiceType = ServiceType::Proxmox;

    async fn connect(credential: &Credential, http: &HttpSettings) -> Result<Self> {
        let client = UpstreamClient::new(credential, API_ROOT, http)?;
        let auth = match &credential.auth {
            AuthScheme::Basic { username, password } => login(&client, username, password).await?,
            AuthScheme::ApiKey(token) => {
                RequestAuth::Header(header_value(format!("PVEAPIToken={}", token), "API token")?)
            }
        };
        let client = client.with_auth(auth);

        let version: Envelope<PveVersion> = client.json(client.get("version"), None).await?;
        debug!(version = %version.data.version, "Connected to Proxmox VE");

        Ok(Self {
            client,
            version: version.data,
        })
    }

    async fn health(&self) -> Result<ServiceHealth> {
        let version: PveVersion = self.data(Method::GET, "version", None).await?;
        Ok(ServiceHealth::healthy().with_version(version.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_overview() {
        let resources: Vec<ClusterResource> = serde_json::from_str(
            r#"[
                {"type":"node","node":"pve1","status":"online","maxcpu":8,"maxmem":34359738368},
                {"type":"node","node":"pve2","status":"offline","maxcpu":4,"maxmem":17179869184},
                {"type":"qemu","vmid":100,"node":"pve1","status":"running"},
                {"type":"lxc","vmid":101,"node":"pve1","status":"stopped"},
                {"type":"storage","storage":"local","node":"pve1","maxdisk":1000},
                {"type":"storage","storage":"local-lvm","node":"pve1","maxdisk":2000},
                {"type":"sdn","sdn":"localnetwork"}
            ]"#,
        )
        .unwrap();

        let overview = ClusterOverview::from_resources(&resources);
        assert_eq!(overview.nodes, 2);
        assert_eq!(overview.online_nodes, 1);
        assert_eq!(overview.vms, 2);
        assert_eq!(overview.running_vms, 1);
        assert_eq!(overview.storage, 2);
        assert_eq!(overview.total_cpu, 12);
        assert_eq!(overview.total_memory, 34359738368 + 17179869184);
        assert_eq!(overview.total_disk, 3000);
    }

    #[test]
    fn test_create_vm_form() {
        let req: CreateVm = serde_json::from_str(
            r#"{"name":"web","cores":2,"memory":2048,"iso":"local:iso/debian.iso"}"#,
        )
        .unwrap();
        let form = req.form(105);
        let get = |k: &str| {
            form.iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("vmid"), Some("105"));
        assert_eq!(get("ostype"), Some("other"));
        assert_eq!(get("net0"), Some(DEFAULT_NET0));
        assert_eq!(get("scsi0"), Some("local-lvm:32"));
        assert_eq!(get("ide2"), Some("local:iso/debian.iso,media=cdrom"));
    }

    #[test]
    fn test_create_vm_validation() {
        let mut req: CreateVm = serde_json::from_str(r#"{"name":"web"}"#).unwrap();
        assert!(req.validate().is_ok());

        req.vmid = Some(42);
        assert!(matches!(req.validate(), Err(Error::Validation(_))));

        req.vmid = None;
        req.name = "  ".to_string();
        assert!(matches!(req.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_vm_from_entry_defaults_name() {
        let entry: QemuEntry =
            serde_json::from_str(r#"{"vmid":100,"status":"running","maxmem":2147483648}"#)
                .unwrap();
        let vm = Vm::from_entry("pve1", entry);
        assert_eq!(vm.name, "VM 100");
        assert_eq!(vm.node, "pve1");
        assert_eq!(vm.memory, Some(2147483648));
    }
}
