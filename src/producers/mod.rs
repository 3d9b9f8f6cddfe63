//! Native probes of one cluster. Each producer lists its kind, derives the
//! check items and folds in the alert items resolved for the same entity.

pub mod health;
pub mod ingresses;
pub mod namespaces;
pub mod nodes;
pub mod pod_logs;
pub mod services;
pub mod storage;
pub mod workloads;

use kube::Client;

use crate::alerting::{Bucket, ClusterSignals};
use crate::merge::merge_items;
use crate::types::{Checks, Item};

/// What every producer of one cluster run shares.
pub struct ProducerContext<'a> {
    pub client: &'a Client,
    pub signals: &'a ClusterSignals,
    pub task_name: &'a str,
}

/// Merges native items with the alert items stored under `bucket`/`key`.
pub fn entity_checks(signals: &ClusterSignals, bucket: Bucket, key: &str, native: Vec<Item>) -> Checks {
    merge_items(native, signals.items(bucket, key))
}

pub fn namespaced_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}
