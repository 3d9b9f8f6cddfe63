use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::feed::{Alert, AlertingResponse};
use crate::error::{InspectionError, Result};
use crate::types::{Item, DEFAULT_LEVEL};

/// Rule groups are named `inspection-<kind>`.
const GROUP_PREFIX: &str = "inspection-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Alerting,
    Pending,
    Normal,
    NoData,
    Error,
}

impl AlertState {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "alerting" | "firing" => Some(AlertState::Alerting),
            "pending" => Some(AlertState::Pending),
            "normal" | "inactive" => Some(AlertState::Normal),
            "nodata" => Some(AlertState::NoData),
            "error" => Some(AlertState::Error),
            _ => None,
        }
    }

    /// `None` when the state says nothing about the entity.
    fn outcome(&self) -> Option<bool> {
        match self {
            AlertState::Normal => Some(true),
            AlertState::Alerting | AlertState::Pending => Some(false),
            AlertState::NoData | AlertState::Error => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Cluster,
    Node,
    Workload,
    Namespace,
    Pvc,
    Pv,
}

impl AlertKind {
    /// `inspection-resource` is the older name of the workload group.
    pub fn from_group_name(group: &str) -> Option<Self> {
        match group.strip_prefix(GROUP_PREFIX)? {
            "cluster" => Some(AlertKind::Cluster),
            "node" => Some(AlertKind::Node),
            "workload" | "resource" => Some(AlertKind::Workload),
            "namespace" => Some(AlertKind::Namespace),
            "pvc" => Some(AlertKind::Pvc),
            "pv" => Some(AlertKind::Pv),
            _ => None,
        }
    }
}

/// One alert instance, lifted out of the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSignal {
    pub source: String,
    pub alert_name: String,
    pub state: AlertState,
    pub kind: AlertKind,
    pub labels: HashMap<String, String>,
    pub summary: String,
}

impl AlertSignal {
    /// `Ok(None)` for alerts that are not inspection signals or carry no evidence.
    pub fn from_alert(group: &str, rule: &str, alert: &Alert) -> Result<Option<Self>> {
        let Some(kind) = AlertKind::from_group_name(group) else {
            debug!("Ignoring alert {} from non-inspection group {}", rule, group);
            return Ok(None);
        };
        let Some(state) = AlertState::parse(&alert.state) else {
            debug!("Ignoring alert {} with unknown state '{}'", rule, alert.state);
            return Ok(None);
        };
        if state.outcome().is_none() {
            return Ok(None);
        }

        let source = required(&alert.labels, rule, "prometheus_from")?;
        let alert_name = required(&alert.labels, rule, "alertname")?;
        let summary = required(&alert.annotations, rule, "summary")?;

        Ok(Some(AlertSignal {
            source,
            alert_name,
            state,
            kind,
            labels: alert.labels.clone(),
            summary,
        }))
    }

    fn label(&self, name: &str) -> Result<&str> {
        self.labels
            .get(name)
            .map(|s| s.as_str())
            .ok_or_else(|| InspectionError::missing(&self.alert_name, name))
    }

    fn item(&self, name: String) -> Item {
        let level = self
            .labels
            .get("level")
            .and_then(|l| l.parse().ok())
            .unwrap_or(DEFAULT_LEVEL);
        match self.state.outcome() {
            Some(true) => Item::new(name, "", true, level),
            _ => Item::new(name, self.summary.clone(), false, level),
        }
    }
}

fn required(map: &HashMap<String, String>, rule: &str, key: &str) -> Result<String> {
    map.get(key)
        .cloned()
        .ok_or_else(|| InspectionError::missing(rule, key))
}

/// Entity family an alert item is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Cluster,
    Node,
    Deployment,
    StatefulSet,
    DaemonSet,
    Namespace,
    Service,
    Ingress,
    Pvc,
    Pv,
}

/// Alert items of one cluster, keyed by bucket and entity key.
#[derive(Debug, Clone, Default)]
pub struct ClusterSignals {
    buckets: HashMap<Bucket, HashMap<String, Vec<Item>>>,
}

impl ClusterSignals {
    pub fn push(&mut self, bucket: Bucket, key: String, item: Item) {
        self.buckets
            .entry(bucket)
            .or_default()
            .entry(key)
            .or_default()
            .push(item);
    }

    pub fn items(&self, bucket: Bucket, key: &str) -> Option<&[Item]> {
        self.buckets
            .get(&bucket)
            .and_then(|b| b.get(key))
            .map(|v| v.as_slice())
    }

    pub fn item_count(&self) -> usize {
        self.buckets.values().flat_map(|b| b.values()).map(|v| v.len()).sum()
    }
}

/// Alert items for every cluster source seen in one feed.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSignals {
    clusters: HashMap<String, ClusterSignals>,
}

impl ResolvedSignals {
    pub fn from_clusters(clusters: impl IntoIterator<Item = (String, ClusterSignals)>) -> Self {
        Self {
            clusters: clusters.into_iter().collect(),
        }
    }

    pub fn cluster(&self, source: &str) -> Option<&ClusterSignals> {
        self.clusters.get(source)
    }
}

/// Cuts a ReplicaSet name at its last `-` to recover the owning Deployment.
///
/// Assumes `<deployment>-<hash>`; a name without `-` is returned unchanged.
pub fn deployment_name_from_replicaset(replicaset: &str) -> String {
    match replicaset.rfind('-') {
        Some(idx) => replicaset[..idx].to_string(),
        None => replicaset.to_string(),
    }
}

pub type OwnerNameFn = fn(&str) -> String;

/// Maps alert signals onto the entity they concern.
#[derive(Debug, Clone)]
pub struct AlertResolver {
    deployment_name: OwnerNameFn,
}

impl Default for AlertResolver {
    fn default() -> Self {
        Self {
            deployment_name: deployment_name_from_replicaset,
        }
    }
}

impl AlertResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the ReplicaSet to Deployment name heuristic.
    pub fn with_deployment_name(mut self, f: OwnerNameFn) -> Self {
        self.deployment_name = f;
        self
    }

    /// Entity bucket, entity key and item for one signal.
    pub fn resolve_signal(&self, signal: &AlertSignal) -> Result<Option<(Bucket, String, Item)>> {
        let resolved = match signal.kind {
            AlertKind::Cluster => (
                Bucket::Cluster,
                signal.source.clone(),
                signal.item(signal.alert_name.clone()),
            ),
            AlertKind::Node => {
                let instance = signal.label("instance")?;
                let host = instance.split(':').next().unwrap_or(instance);
                (
                    Bucket::Node,
                    host.to_string(),
                    signal.item(signal.alert_name.clone()),
                )
            }
            AlertKind::Workload => {
                let owner_kind = signal.label("created_by_kind")?;
                let owner_name = signal.label("created_by_name")?;
                let namespace = signal.label("namespace")?;
                let (bucket, name) = match owner_kind {
                    "ReplicaSet" => (Bucket::Deployment, (self.deployment_name)(owner_name)),
                    "StatefulSet" => (Bucket::StatefulSet, owner_name.to_string()),
                    "DaemonSet" => (Bucket::DaemonSet, owner_name.to_string()),
                    other => {
                        debug!(
                            "Alert {} owned by unsupported kind {}",
                            signal.alert_name, other
                        );
                        return Ok(None);
                    }
                };
                (
                    bucket,
                    format!("{}/{}", namespace, name),
                    signal.item(signal.alert_name.clone()),
                )
            }
            AlertKind::Pvc => {
                let namespace = signal.label("namespace")?;
                let claim = signal.label("persistentvolumeclaim")?;
                (
                    Bucket::Pvc,
                    format!("{}/{}", namespace, claim),
                    signal.item(signal.alert_name.clone()),
                )
            }
            AlertKind::Pv => (
                Bucket::Pv,
                signal.label("persistentvolume")?.to_string(),
                signal.item(signal.alert_name.clone()),
            ),
            AlertKind::Namespace => {
                let namespace = signal.label("namespace")?;
                let resource = signal.label("resource")?;
                (
                    Bucket::Namespace,
                    namespace.to_string(),
                    signal.item(format!("{} - {}", signal.alert_name, resource)),
                )
            }
        };
        Ok(Some(resolved))
    }

    /// Resolves every alert of the feed. Alerts that cannot be resolved are logged
    /// and skipped; only a feed without rule groups fails.
    pub fn resolve(&self, alerting: &AlertingResponse, task_name: &str) -> Result<ResolvedSignals> {
        let groups = alerting.groups();
        if groups.is_empty() {
            return Err(InspectionError::EmptyRuleSet);
        }

        let mut clusters: HashMap<String, ClusterSignals> = HashMap::new();
        let mut skipped = 0usize;
        for group in groups {
            for rule in &group.rules {
                for alert in &rule.alerts {
                    let outcome = AlertSignal::from_alert(&group.name, &rule.name, alert)
                        .and_then(|signal| match signal {
                            Some(signal) => Ok(self
                                .resolve_signal(&signal)?
                                .map(|r| (signal.source, r))),
                            None => Ok(None),
                        });
                    match outcome {
                        Ok(Some((source, (bucket, key, item)))) => {
                            clusters
                                .entry(source)
                                .or_default()
                                .push(bucket, key, item);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            skipped += 1;
                            warn!("[{}] Skipping alert: {}", task_name, e);
                        }
                    }
                }
            }
        }

        info!(
            "[{}] Resolved {} alert item(s) for {} cluster(s), {} alert(s) skipped",
            task_name,
            clusters.values().map(ClusterSignals::item_count).sum::<usize>(),
            clusters.len(),
            skipped
        );
        Ok(ResolvedSignals::from_clusters(clusters))
    }
}
