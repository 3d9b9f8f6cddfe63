use std::collections::{BTreeMap, HashMap};

use k8s_openapi::api::core::v1::{Node as K8sNode, Pod};
use kube::ResourceExt;
use tracing::{error, info, warn};

use super::{entity_checks, ProducerContext};
use crate::alerting::Bucket;
use crate::error::Result;
use crate::kubernetes::{agent_pods, list_all, run_agent_commands};
use crate::parsing::{exceeds, utilization_percent, ResourceTotals};
use crate::template::{label_selector, ClusterNodeConfig, CommandConfig};
use crate::types::{CommandCheckResult, Item, Node, DEFAULT_LEVEL};

pub const POD_LIMITS_ANNOTATION: &str = "management.cattle.io/pod-limits";
pub const POD_REQUESTS_ANNOTATION: &str = "management.cattle.io/pod-requests";
pub const NODE_EXEC_TITLE: &str = "节点巡检命令执行";

const RESOURCE_LEVEL: i32 = 2;

/// The node's InternalIP, else its first listed address.
pub fn host_ip(node: &K8sNode) -> String {
    let addresses = node
        .status
        .as_ref()
        .and_then(|s| s.addresses.as_ref())
        .map(|a| a.as_slice())
        .unwrap_or(&[]);
    addresses
        .iter()
        .find(|a| a.type_ == "InternalIP")
        .or_else(|| addresses.first())
        .map(|a| a.address.clone())
        .unwrap_or_default()
}

pub fn allocatable(node: &K8sNode) -> ResourceTotals {
    let quantities = node.status.as_ref().and_then(|s| s.allocatable.as_ref());
    ResourceTotals::from_quantities(
        quantities
            .into_iter()
            .flatten()
            .map(|(k, q)| (k.as_str(), q.0.as_str())),
    )
}

/// Limits and requests of the scheduled pods against the node's allocatable
/// resources; each ratio above `threshold` percent fails.
pub fn resource_items(
    node_name: &str,
    limits: &ResourceTotals,
    requests: &ResourceTotals,
    allocatable: &ResourceTotals,
    threshold: f64,
) -> Vec<Item> {
    let checks = [
        ("Limits CPU", "limits CPU", limits.cpu_millicores, allocatable.cpu_millicores),
        ("Limits Memory", "limits Memory", limits.memory_bytes, allocatable.memory_bytes),
        ("Requests CPU", "requests CPU", requests.cpu_millicores, allocatable.cpu_millicores),
        ("Requests Memory", "requests Memory", requests.memory_bytes, allocatable.memory_bytes),
        ("Requests Pods", "requests Pods", requests.pods, allocatable.pods),
    ];

    checks
        .into_iter()
        .map(|(title, what, used, capacity)| {
            let high = exceeds(utilization_percent(used, capacity), threshold);
            if high {
                info!(
                    "Node {} high {}: used {}, allocatable {}",
                    node_name, what, used, capacity
                );
            }
            Item::check(
                format!("{} 超过 {} %", title, threshold),
                high.then(|| format!("节点 {} {} 超过百分之 {}", node_name, what, threshold)),
                RESOURCE_LEVEL,
            )
        })
        .collect()
}

/// One item per agent result, at the level its command was configured with.
pub fn command_items(results: &[CommandCheckResult], commands: &[CommandConfig]) -> Vec<Item> {
    let levels: HashMap<&str, Option<i32>> = commands
        .iter()
        .map(|c| (c.description.as_str(), c.level))
        .collect();
    results
        .iter()
        .map(|r| {
            let level = levels
                .get(r.description.as_str())
                .copied()
                .flatten()
                .unwrap_or(DEFAULT_LEVEL);
            let failure = (!r.error.is_empty()).then(|| r.error.clone());
            Item::check(r.description.clone(), failure, level)
        })
        .collect()
}

fn agent_on(agents: &[Pod], node_name: &str) -> Option<Pod> {
    agents
        .iter()
        .find(|p| {
            p.spec
                .as_ref()
                .and_then(|s| s.node_name.as_deref())
                == Some(node_name)
        })
        .cloned()
}

pub async fn inspect_nodes(
    ctx: &ProducerContext<'_>,
    config: &ClusterNodeConfig,
    threshold: f64,
) -> Result<Vec<Node>> {
    if !config.enable {
        return Ok(Vec::new());
    }
    info!("[{}] Starting node inspection", ctx.task_name);

    let mut selected: BTreeMap<String, (K8sNode, Vec<CommandConfig>)> = BTreeMap::new();
    for nc in &config.node_config {
        let selector = label_selector(&nc.selector_labels);
        let nodes: Vec<K8sNode> = list_all(ctx.client, selector.as_deref(), "nodes").await?;
        for node in nodes {
            selected
                .entry(node.name_any())
                .or_insert_with(|| (node, Vec::new()))
                .1
                .extend(nc.commands.iter().cloned());
        }
    }

    let agents = agent_pods(ctx.client).await?;
    let mut result = Vec::with_capacity(selected.len());

    for (name, (node, commands)) in selected {
        let ip = host_ip(&node);
        let annotations = node.annotations();
        let limits = ResourceTotals::from_annotation(
            annotations.get(POD_LIMITS_ANNOTATION).map(String::as_str),
        );
        let requests = ResourceTotals::from_annotation(
            annotations.get(POD_REQUESTS_ANNOTATION).map(String::as_str),
        );
        let mut native = resource_items(&name, &limits, &requests, &allocatable(&node), threshold);

        if !commands.is_empty() {
            match agent_on(&agents, &name) {
                Some(pod) => match run_agent_commands(ctx.client, &pod, &commands, false).await {
                    Ok(results) => {
                        for r in results.iter().filter(|r| !r.error.is_empty()) {
                            error!("Node {} inspection failed ({}): {}", name, r.description, r.error);
                        }
                        native.extend(command_items(&results, &commands));
                    }
                    Err(e) => {
                        error!("[{}] node {} commands failed: {}", ctx.task_name, name, e);
                        native.push(Item::check(NODE_EXEC_TITLE, Some(e.to_string()), DEFAULT_LEVEL));
                    }
                },
                None => {
                    warn!("[{}] no inspection agent on node {}", ctx.task_name, name);
                    native.push(Item::check(
                        NODE_EXEC_TITLE,
                        Some(format!("节点 {} 上没有运行巡检代理", name)),
                        DEFAULT_LEVEL,
                    ));
                }
            }
        }

        let checks = entity_checks(ctx.signals, Bucket::Node, &ip, native);
        result.push(Node {
            name,
            host_ip: ip,
            checks,
        });
    }
    Ok(result)
}
