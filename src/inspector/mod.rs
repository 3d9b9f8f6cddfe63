use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::{error, info, warn};

use crate::alerting::{ClusterSignals, ResolvedSignals};
use crate::config::Config;
use crate::inspection::InspectionGrouper;
use crate::kubernetes::connect;
use crate::logs::LogFetchOptions;
use crate::producers::health::inspect_core;
use crate::producers::ingresses::inspect_ingresses;
use crate::producers::namespaces::inspect_namespaces;
use crate::producers::nodes::inspect_nodes;
use crate::producers::pod_logs::inspect_pod_logs;
use crate::producers::services::inspect_services;
use crate::producers::storage::{inspect_pvcs, inspect_pvs};
use crate::producers::workloads::inspect_workloads;
use crate::producers::ProducerContext;
use crate::rating::{rate, RatingSummary};
use crate::template::{KubernetesConfig, Template};
use crate::types::{
    ClusterCore, ClusterNode, ClusterResource, Global, Inspection, Kubernetes, Report,
};

pub const REPORT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Level of the single inspection a failed cluster contributes.
pub const NOT_READY_LEVEL: i32 = 3;

/// Run-wide knobs taken from the environment config.
#[derive(Debug, Clone)]
pub struct InspectorSettings {
    pub task_name: String,
    pub resource_threshold_percent: f64,
    pub log_options: LogFetchOptions,
    pub log_timeout: Duration,
}

impl From<&Config> for InspectorSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            task_name: cfg.task_name.clone(),
            resource_threshold_percent: cfg.resource_threshold_percent,
            log_options: LogFetchOptions {
                concurrency: cfg.log_fetch_concurrency,
                ..LogFetchOptions::default()
            },
            log_timeout: cfg.log_fetch_timeout,
        }
    }
}

/// Report of one run together with its rating breakdown.
#[derive(Debug, Clone)]
pub struct InspectionOutcome {
    pub report: Report,
    pub summary: RatingSummary,
}

impl InspectionOutcome {
    /// Notification text: the rating line followed by the digest lines.
    pub fn digest_text(&self) -> String {
        self.summary.digest.render(self.summary.rating)
    }
}

/// Fills in the three inspection lists of a cluster from its entities.
pub fn assemble_cluster(
    cluster_id: &str,
    cluster_name: &str,
    mut core: ClusterCore,
    mut node: ClusterNode,
    mut resource: ClusterResource,
) -> Kubernetes {
    let mut grouper = InspectionGrouper::new();
    grouper.add_items(core.checks.items(), cluster_name);
    core.inspections = grouper.finish();

    let mut grouper = InspectionGrouper::new();
    grouper.add_all(&node.nodes);
    node.inspections = grouper.finish();

    let mut grouper = InspectionGrouper::new();
    grouper.add_all(resource.workloads.all());
    grouper.add_all(&resource.namespaces);
    grouper.add_all(&resource.services);
    grouper.add_all(&resource.ingresses);
    grouper.add_all(&resource.pvcs);
    grouper.add_all(&resource.pvs);
    resource.inspections = grouper.finish();

    Kubernetes {
        cluster_id: cluster_id.to_string(),
        cluster_name: cluster_name.to_string(),
        cluster_core: core,
        cluster_node: node,
        cluster_resource: resource,
    }
}

/// Placeholder for a cluster whose inspection aborted.
pub fn not_ready_cluster(cluster_id: &str, cluster_name: &str) -> Kubernetes {
    Kubernetes {
        cluster_id: cluster_id.to_string(),
        cluster_name: cluster_name.to_string(),
        cluster_core: ClusterCore {
            inspections: vec![Inspection::new(
                format!("cluster {} is not ready", cluster_id),
                NOT_READY_LEVEL,
                vec![cluster_name.to_string()],
            )],
            ..ClusterCore::default()
        },
        cluster_node: ClusterNode::default(),
        cluster_resource: ClusterResource::default(),
    }
}

/// Rates the clusters and wraps them into a fresh report.
pub fn build_report(name: &str, clusters: Vec<Kubernetes>, now: DateTime<Local>) -> InspectionOutcome {
    let summary = rate(&clusters);
    let report = Report {
        id: uuid::Uuid::new_v4().to_string(),
        global: Global {
            name: name.to_string(),
            rating: summary.rating,
            report_time: now.format(REPORT_TIME_FORMAT).to_string(),
        },
        kubernetes: clusters,
    };
    InspectionOutcome { report, summary }
}

/// Names shared by more than one enabled cluster; those clusters see the same alert signals.
pub fn repeated_cluster_names(template: &Template) -> BTreeSet<&str> {
    let mut seen = BTreeSet::new();
    template
        .kubernetes
        .iter()
        .filter(|k| k.enable)
        .filter(|k| !seen.insert(k.cluster_name.as_str()))
        .map(|k| k.cluster_name.as_str())
        .collect()
}

/// Walks the enabled clusters of a template one after another.
pub struct Inspector {
    settings: InspectorSettings,
}

impl Inspector {
    pub fn new(settings: InspectorSettings) -> Self {
        Self { settings }
    }

    /// Inspects every enabled cluster. A cluster that fails is reported as not
    /// ready and the remaining clusters still run.
    pub async fn run(&self, template: &Template, signals: &ResolvedSignals) -> InspectionOutcome {
        let task = &self.settings.task_name;
        for name in repeated_cluster_names(template) {
            warn!("[{}] cluster name {} is used by several clusters", task, name);
        }

        let no_signals = ClusterSignals::default();
        let mut clusters = Vec::new();
        for cluster in template.kubernetes.iter().filter(|k| k.enable) {
            info!("[{}] Inspecting cluster {}", task, cluster.cluster_id);
            let cluster_signals = signals.cluster(&cluster.cluster_name).unwrap_or(&no_signals);
            match self.inspect_cluster(cluster, cluster_signals).await {
                Ok(k) => clusters.push(k),
                Err(e) => {
                    error!("[{}] cluster {} inspection failed: {:#}", task, cluster.cluster_id, e);
                    clusters.push(not_ready_cluster(&cluster.cluster_id, &cluster.cluster_name));
                }
            }
        }

        let name = if template.name.is_empty() {
            task.as_str()
        } else {
            template.name.as_str()
        };
        let outcome = build_report(name, clusters, Local::now());
        info!(
            "[{}] Report {} rated {} across {} clusters",
            task,
            outcome.report.id,
            outcome.summary.rating,
            outcome.report.kubernetes.len()
        );
        outcome
    }

    async fn inspect_cluster(&self, cfg: &KubernetesConfig, signals: &ClusterSignals) -> Result<Kubernetes> {
        let client = connect(cfg.context.as_deref()).await?;
        let ctx = ProducerContext {
            client: &client,
            signals,
            task_name: &self.settings.task_name,
        };
        let resource_cfg = &cfg.cluster_resource_config;

        let core = inspect_core(&ctx, &cfg.cluster_core_config, &cfg.cluster_name)
            .await
            .context("core health check")?;
        let nodes = inspect_nodes(
            &ctx,
            &cfg.cluster_node_config,
            self.settings.resource_threshold_percent,
        )
        .await
        .context("node inspection")?;

        let workloads = inspect_workloads(&ctx, &resource_cfg.workload_config)
            .await
            .context("workload inspection")?;
        let log_items = inspect_pod_logs(
            &ctx,
            &resource_cfg.pod_log_config,
            self.settings.log_options,
            self.settings.log_timeout,
        )
        .await
        .context("pod log inspection")?;
        let namespaces = inspect_namespaces(&ctx, &resource_cfg.namespace_config, log_items)
            .await
            .context("namespace inspection")?;
        let services = inspect_services(&ctx, &resource_cfg.service_config)
            .await
            .context("service inspection")?;
        let ingresses = inspect_ingresses(&ctx, &resource_cfg.ingress_config)
            .await
            .context("ingress inspection")?;
        let pvcs = inspect_pvcs(&ctx, &resource_cfg.pvc_config)
            .await
            .context("pvc inspection")?;
        let pvs = inspect_pvs(&ctx, &resource_cfg.pv_config)
            .await
            .context("pv inspection")?;

        Ok(assemble_cluster(
            &cfg.cluster_id,
            &cfg.cluster_name,
            core,
            ClusterNode {
                nodes,
                inspections: Vec::new(),
            },
            ClusterResource {
                workloads,
                namespaces,
                services,
                ingresses,
                pvcs,
                pvs,
                inspections: Vec::new(),
            },
        ))
    }
}
