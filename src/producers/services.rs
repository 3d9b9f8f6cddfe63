use k8s_openapi::api::core::v1::{Endpoints, Service as K8sService};
use kube::{Api, ResourceExt};
use tracing::info;

use super::{entity_checks, namespaced_key, ProducerContext};
use crate::alerting::Bucket;
use crate::error::{InspectionError, Result};
use crate::kubernetes::list_selected;
use crate::template::SelectorConfig;
use crate::types::{Item, Service, DEFAULT_LEVEL};

pub const ENDPOINTS_TITLE: &str = "存在对应 Endpoints 且 Subsets 非空";

pub fn endpoints_check(namespace: &str, name: &str, endpoints: Option<&Endpoints>) -> Item {
    let failure = match endpoints {
        None => Some(format!(
            "命名空间 {} 下 Service {} 找不到对应 endpoint",
            namespace, name
        )),
        Some(ep) if ep.subsets.as_ref().map_or(true, |s| s.is_empty()) => Some(format!(
            "命名空间 {} 下 Service {} 对应 Endpoints 没有 Subsets",
            namespace, name
        )),
        Some(_) => None,
    };
    Item::check(ENDPOINTS_TITLE, failure, DEFAULT_LEVEL)
}

pub async fn inspect_services(ctx: &ProducerContext<'_>, config: &SelectorConfig) -> Result<Vec<Service>> {
    if !config.enable {
        return Ok(Vec::new());
    }
    info!("[{}] Starting service inspection", ctx.task_name);

    let services: Vec<K8sService> = list_selected(ctx.client, config, "services").await?;
    let mut result = Vec::with_capacity(services.len());
    for svc in &services {
        let name = svc.name_any();
        let namespace = svc.namespace().unwrap_or_default();
        let api: Api<Endpoints> = Api::namespaced(ctx.client.clone(), &namespace);
        let endpoints = api
            .get_opt(&name)
            .await
            .map_err(InspectionError::list("endpoints"))?;

        let native = vec![endpoints_check(&namespace, &name, endpoints.as_ref())];
        let checks = entity_checks(
            ctx.signals,
            Bucket::Service,
            &namespaced_key(&namespace, &name),
            native,
        );
        result.push(Service {
            name,
            namespace,
            checks,
        });
    }
    Ok(result)
}
