use serde::{Deserialize, Serialize};

use crate::rating::Rating;

/// Severity assigned to a failing check that did not state one.
pub const DEFAULT_LEVEL: i32 = 2;

fn default_level() -> i32 {
    DEFAULT_LEVEL
}

/// One check outcome against one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub message: String,
    pub pass: bool,
    #[serde(default = "default_level")]
    pub level: i32,
}

impl Item {
    pub fn new(name: impl Into<String>, message: impl Into<String>, pass: bool, level: i32) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            pass,
            level,
        }
    }

    /// Passing item when `failure` is `None`, failing item carrying the message otherwise.
    pub fn check(name: impl Into<String>, failure: Option<String>, level: i32) -> Self {
        match failure {
            None => Self::new(name, "", true, level),
            Some(message) => Self::new(name, message, false, level),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsCount {
    pub pass_count: usize,
    pub total_count: usize,
}

impl ItemsCount {
    pub fn from_items(items: &[Item]) -> Self {
        Self {
            pass_count: items.iter().filter(|i| i.pass).count(),
            total_count: items.len(),
        }
    }
}

/// Ordered item list of one entity together with its count.
///
/// The count is derived on construction and the list cannot be mutated afterwards,
/// so the two never disagree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Checks {
    items: Vec<Item>,
    items_count: ItemsCount,
}

impl Checks {
    pub fn new(items: Vec<Item>) -> Self {
        let items_count = ItemsCount::from_items(&items);
        Self { items, items_count }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn items_count(&self) -> ItemsCount {
        self.items_count
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }
}

/// Cross-entity rollup of one failing check title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inspection {
    pub title: String,
    pub level: i32,
    pub names: Vec<String>,
}

impl Inspection {
    pub fn new(title: impl Into<String>, level: i32, names: Vec<String>) -> Self {
        Self {
            title: title.into(),
            level,
            names,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    Job,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DaemonSet => "DaemonSet",
            WorkloadKind::Job => "Job",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkloadData {
    pub kind: WorkloadKind,
    pub name: String,
    pub namespace: String,
    pub conditions: Vec<Condition>,
    #[serde(flatten)]
    pub checks: Checks,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Workload {
    pub deployment: Vec<WorkloadData>,
    pub statefulset: Vec<WorkloadData>,
    pub daemonset: Vec<WorkloadData>,
    pub job: Vec<WorkloadData>,
}

impl Workload {
    pub fn all(&self) -> impl Iterator<Item = &WorkloadData> {
        self.deployment
            .iter()
            .chain(self.statefulset.iter())
            .chain(self.daemonset.iter())
            .chain(self.job.iter())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceCounts {
    pub pods: usize,
    pub services: usize,
    pub deployments: usize,
    pub replicasets: usize,
    pub statefulsets: usize,
    pub daemonsets: usize,
    pub jobs: usize,
    pub secrets: usize,
    pub configmaps: usize,
}

impl ResourceCounts {
    pub fn total(&self) -> usize {
        self.pods
            + self.services
            + self.deployments
            + self.replicasets
            + self.statefulsets
            + self.daemonsets
            + self.jobs
            + self.secrets
            + self.configmaps
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Namespace {
    pub name: String,
    pub resources: ResourceCounts,
    #[serde(flatten)]
    pub checks: Checks,
}

#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub name: String,
    pub namespace: String,
    #[serde(flatten)]
    pub checks: Checks,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ingress {
    pub name: String,
    pub namespace: String,
    #[serde(flatten)]
    pub checks: Checks,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pvc {
    pub name: String,
    pub namespace: String,
    #[serde(flatten)]
    pub checks: Checks,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pv {
    pub name: String,
    #[serde(flatten)]
    pub checks: Checks,
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub name: String,
    pub host_ip: String,
    #[serde(flatten)]
    pub checks: Checks,
}

/// Result of one agent command, as printed by the agent script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCheckResult {
    pub description: String,
    pub command: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterCore {
    pub health_check: Vec<CommandCheckResult>,
    #[serde(flatten)]
    pub checks: Checks,
    pub inspections: Vec<Inspection>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterNode {
    pub nodes: Vec<Node>,
    pub inspections: Vec<Inspection>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterResource {
    pub workloads: Workload,
    pub namespaces: Vec<Namespace>,
    pub services: Vec<Service>,
    pub ingresses: Vec<Ingress>,
    pub pvcs: Vec<Pvc>,
    pub pvs: Vec<Pv>,
    pub inspections: Vec<Inspection>,
}

/// Per-cluster result.
#[derive(Debug, Clone, Serialize)]
pub struct Kubernetes {
    pub cluster_id: String,
    pub cluster_name: String,
    pub cluster_core: ClusterCore,
    pub cluster_node: ClusterNode,
    pub cluster_resource: ClusterResource,
}

impl Kubernetes {
    pub fn inspections(&self) -> impl Iterator<Item = &Inspection> {
        self.cluster_core
            .inspections
            .iter()
            .chain(self.cluster_node.inspections.iter())
            .chain(self.cluster_resource.inspections.iter())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Global {
    pub name: String,
    pub rating: Rating,
    pub report_time: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: String,
    pub global: Global,
    pub kubernetes: Vec<Kubernetes>,
}

/// Log excerpt of one pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodLog {
    pub namespace: String,
    pub name: String,
    pub lines: Vec<String>,
}
