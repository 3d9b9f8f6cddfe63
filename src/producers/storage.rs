use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use kube::ResourceExt;
use tracing::info;

use super::{entity_checks, namespaced_key, ProducerContext};
use crate::alerting::Bucket;
use crate::error::Result;
use crate::kubernetes::{list_all, list_selected};
use crate::template::SelectorConfig;
use crate::types::{Item, Pv, Pvc, DEFAULT_LEVEL};

pub const PVC_BOUND_TITLE: &str = "PVC 已绑定";
pub const PV_STATUS_TITLE: &str = "PV 状态正常";

pub fn pvc_check(pvc: &PersistentVolumeClaim) -> Item {
    let phase = pvc
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("Unknown");
    let failure = (phase != "Bound").then(|| {
        format!(
            "命名空间 {} 下 PVC {} 状态为 {}",
            pvc.namespace().unwrap_or_default(),
            pvc.name_any(),
            phase
        )
    });
    Item::check(PVC_BOUND_TITLE, failure, DEFAULT_LEVEL)
}

pub fn pv_check(pv: &PersistentVolume) -> Item {
    let phase = pv
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("Unknown");
    let failure = (phase == "Failed").then(|| format!("PV {} 状态为 {}", pv.name_any(), phase));
    Item::check(PV_STATUS_TITLE, failure, DEFAULT_LEVEL)
}

pub async fn inspect_pvcs(ctx: &ProducerContext<'_>, config: &SelectorConfig) -> Result<Vec<Pvc>> {
    if !config.enable {
        return Ok(Vec::new());
    }
    info!("[{}] Starting pvc inspection", ctx.task_name);

    let claims: Vec<PersistentVolumeClaim> = list_selected(ctx.client, config, "persistentvolumeclaims").await?;
    Ok(claims
        .iter()
        .map(|pvc| {
            let name = pvc.name_any();
            let namespace = pvc.namespace().unwrap_or_default();
            let checks = entity_checks(
                ctx.signals,
                Bucket::Pvc,
                &namespaced_key(&namespace, &name),
                vec![pvc_check(pvc)],
            );
            Pvc {
                name,
                namespace,
                checks,
            }
        })
        .collect())
}

pub async fn inspect_pvs(ctx: &ProducerContext<'_>, config: &SelectorConfig) -> Result<Vec<Pv>> {
    if !config.enable {
        return Ok(Vec::new());
    }
    info!("[{}] Starting pv inspection", ctx.task_name);

    let volumes: Vec<PersistentVolume> = list_all(
        ctx.client,
        config.label_selector().as_deref(),
        "persistentvolumes",
    )
    .await?;
    Ok(volumes
        .iter()
        .map(|pv| {
            let name = pv.name_any();
            let checks = entity_checks(ctx.signals, Bucket::Pv, &name, vec![pv_check(pv)]);
            Pv { name, checks }
        })
        .collect())
}
