use tracing::{info, warn};

use super::{entity_checks, ProducerContext};
use crate::alerting::Bucket;
use crate::error::Result;
use crate::kubernetes::{agent_pods, run_agent_commands};
use crate::template::{ClusterCoreConfig, CommandConfig};
use crate::types::{ClusterCore, CommandCheckResult, Item};

/// Level of a health command whose configuration names none.
pub const CORE_LEVEL: i32 = 3;

/// One item per health command result; a non-empty `error` fails it.
pub fn core_items(results: &[CommandCheckResult], commands: &[CommandConfig]) -> Vec<Item> {
    results
        .iter()
        .map(|r| {
            let level = commands
                .iter()
                .find(|c| c.description == r.description)
                .and_then(|c| c.level)
                .unwrap_or(CORE_LEVEL);
            let failure = (!r.error.is_empty()).then(|| r.error.clone());
            Item::check(r.description.clone(), failure, level)
        })
        .collect()
}

/// Runs the configured health commands on the first inspection agent.
///
/// Alert items raised against the cluster itself are keyed by `cluster_name`.
/// Any exec failure is returned; the cluster cannot be rated without it.
pub async fn inspect_core(
    ctx: &ProducerContext<'_>,
    config: &ClusterCoreConfig,
    cluster_name: &str,
) -> Result<ClusterCore> {
    let mut health_check = Vec::new();
    let mut native = Vec::new();

    if config.enable && !config.commands.is_empty() {
        info!("[{}] Starting health check inspection", ctx.task_name);
        let agents = agent_pods(ctx.client).await?;
        match agents.first() {
            Some(pod) => {
                health_check = run_agent_commands(ctx.client, pod, &config.commands, true).await?;
                native = core_items(&health_check, &config.commands);
            }
            None => warn!("[{}] no inspection agent running, skipping health checks", ctx.task_name),
        }
    }

    Ok(ClusterCore {
        health_check,
        checks: entity_checks(ctx.signals, Bucket::Cluster, cluster_name, native),
        inspections: Vec::new(),
    })
}
