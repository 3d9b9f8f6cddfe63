use std::fmt::Debug;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Container, PodTemplateSpec};
use k8s_openapi::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::{entity_checks, namespaced_key, ProducerContext};
use crate::alerting::{Bucket, ClusterSignals};
use crate::error::Result;
use crate::kubernetes::list_selected;
use crate::template::{SelectorConfig, WorkloadConfig};
use crate::types::{Checks, Condition, Item, Workload, WorkloadData, WorkloadKind, DEFAULT_LEVEL};

pub const HEALTH_TITLE: &str = "健康状态";
pub const PROBE_TITLE: &str = "健康检查设置";

/// Fails when any container lacks a liveness or readiness probe.
pub fn probe_check(containers: &[Container]) -> Item {
    let mut message = String::new();
    for c in containers {
        if c.liveness_probe.is_none() {
            message.push_str(&format!("容器 {} 没有设置 LivenessProbe\n", c.name));
        }
        if c.readiness_probe.is_none() {
            message.push_str(&format!("容器 {} 没有设置 ReadinessProbe\n", c.name));
        }
    }
    Item::check(PROBE_TITLE, Some(message).filter(|m| !m.is_empty()), DEFAULT_LEVEL)
}

fn health_check(kind: WorkloadKind, namespace: &str, name: &str, healthy: bool) -> Item {
    let failure = (!healthy).then(|| {
        format!(
            "命名空间 {} 下的 {} {} 处于非健康状态",
            namespace,
            kind.as_str(),
            name
        )
    });
    Item::check(HEALTH_TITLE, failure, 1)
}

fn template_containers(template: &PodTemplateSpec) -> &[Container] {
    template
        .spec
        .as_ref()
        .map(|s| s.containers.as_slice())
        .unwrap_or(&[])
}

fn condition(type_: &str, status: &str, reason: Option<&String>) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: status.to_string(),
        reason: reason.cloned(),
    }
}

pub fn deployment_healthy(d: &Deployment) -> bool {
    let Some(status) = d.status.as_ref() else {
        return false;
    };
    let failed = status.conditions.iter().flatten().any(|c| {
        (c.type_ == "Failed" && c.status == "False") || c.reason.as_deref() == Some("Error")
    });
    let desired = d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    !failed && status.available_replicas.unwrap_or(0) >= desired
}

pub fn daemonset_healthy(ds: &DaemonSet) -> bool {
    ds.status
        .as_ref()
        .map(|s| s.number_available.unwrap_or(0) >= s.desired_number_scheduled)
        .unwrap_or(false)
}

pub fn statefulset_healthy(sts: &StatefulSet) -> bool {
    let desired = sts.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let ready = sts
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    ready >= desired
}

pub fn job_completed(job: &Job) -> bool {
    let completions = job.spec.as_ref().and_then(|s| s.completions).unwrap_or(1);
    let succeeded = job.status.as_ref().and_then(|s| s.succeeded).unwrap_or(0);
    succeeded >= completions
}

/// Workload objects sharing a pod template and status conditions.
pub trait WorkloadObject: ResourceExt {
    const KIND: WorkloadKind;

    fn pod_template(&self) -> Option<&PodTemplateSpec>;
    fn conditions(&self) -> Vec<Condition>;
    fn healthy(&self) -> bool;
}

macro_rules! impl_workload_object {
    ($ty:ty, $kind:expr, $healthy:path) => {
        impl WorkloadObject for $ty {
            const KIND: WorkloadKind = $kind;

            fn pod_template(&self) -> Option<&PodTemplateSpec> {
                self.spec.as_ref().map(|s| &s.template)
            }

            fn conditions(&self) -> Vec<Condition> {
                self.status
                    .iter()
                    .flat_map(|s| s.conditions.iter().flatten())
                    .map(|c| condition(&c.type_, &c.status, c.reason.as_ref()))
                    .collect()
            }

            fn healthy(&self) -> bool {
                $healthy(self)
            }
        }
    };
}

impl_workload_object!(Deployment, WorkloadKind::Deployment, deployment_healthy);
impl_workload_object!(StatefulSet, WorkloadKind::StatefulSet, statefulset_healthy);
impl_workload_object!(DaemonSet, WorkloadKind::DaemonSet, daemonset_healthy);
impl_workload_object!(Job, WorkloadKind::Job, job_completed);

/// Native checks of one workload merged with the alert items raised against it.
pub fn workload_data<W: WorkloadObject>(obj: &W, signals: &ClusterSignals) -> WorkloadData {
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    let containers = obj.pod_template().map(template_containers).unwrap_or(&[]);
    let native = vec![
        health_check(W::KIND, &namespace, &name, obj.healthy()),
        probe_check(containers),
    ];
    // alerts never target jobs
    let bucket = match W::KIND {
        WorkloadKind::Deployment => Some(Bucket::Deployment),
        WorkloadKind::StatefulSet => Some(Bucket::StatefulSet),
        WorkloadKind::DaemonSet => Some(Bucket::DaemonSet),
        WorkloadKind::Job => None,
    };
    let checks = match bucket {
        Some(bucket) => entity_checks(signals, bucket, &namespaced_key(&namespace, &name), native),
        None => Checks::new(native),
    };

    WorkloadData {
        kind: W::KIND,
        name,
        namespace,
        conditions: obj.conditions(),
        checks,
    }
}

async fn list_workloads<W>(
    ctx: &ProducerContext<'_>,
    selector: &SelectorConfig,
    kind: &'static str,
) -> Result<Vec<WorkloadData>>
where
    W: WorkloadObject + Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
    W::DynamicType: Default,
{
    let items: Vec<W> = list_selected(ctx.client, selector, kind).await?;
    Ok(items.iter().map(|w| workload_data(w, ctx.signals)).collect())
}

/// Inspects every enabled workload kind.
pub async fn inspect_workloads(ctx: &ProducerContext<'_>, config: &WorkloadConfig) -> Result<Workload> {
    info!("[{}] Starting workload inspection", ctx.task_name);
    let mut workload = Workload::default();

    if config.deployment.enable {
        workload.deployment = list_workloads::<Deployment>(ctx, &config.deployment, "deployments").await?;
    }
    if config.statefulset.enable {
        workload.statefulset = list_workloads::<StatefulSet>(ctx, &config.statefulset, "statefulsets").await?;
    }
    if config.daemonset.enable {
        workload.daemonset = list_workloads::<DaemonSet>(ctx, &config.daemonset, "daemonsets").await?;
    }
    if config.job.enable {
        workload.job = list_workloads::<Job>(ctx, &config.job, "jobs").await?;
    }

    debug!(
        "[{}] inspected {} workloads",
        ctx.task_name,
        workload.all().count()
    );
    Ok(workload)
}
