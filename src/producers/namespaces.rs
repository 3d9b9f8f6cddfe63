use std::collections::HashMap;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, Namespace as K8sNamespace, Pod, ResourceQuota, Secret, Service,
};
use kube::ResourceExt;
use tracing::{debug, info};

use super::{entity_checks, ProducerContext};
use crate::alerting::Bucket;
use crate::error::Result;
use crate::kubernetes::{list_all, list_in_namespace};
use crate::template::{label_selector, NameCheckConfig, NamespaceConfig};
use crate::types::{Item, Namespace, ResourceCounts, DEFAULT_LEVEL};

pub const QUOTA_TITLE: &str = "有资源配置设置";
pub const NON_EMPTY_TITLE: &str = "命名空间下资源非空";
pub const NAME_RULE_TITLE: &str = "命名空间名称是否符合规范";

/// Native namespace checks. `counts.configmaps` must already exclude the
/// root CA config map every namespace carries.
pub fn namespace_items(
    name: &str,
    counts: &ResourceCounts,
    quotas: usize,
    name_check: &NameCheckConfig,
) -> Vec<Item> {
    let mut items = vec![
        Item::check(
            QUOTA_TITLE,
            (quotas == 0).then(|| format!("命名空间 {} 没有设置配额", name)),
            1,
        ),
        Item::check(
            NON_EMPTY_TITLE,
            (counts.total() == 0).then(|| format!("命名空间 {} 下资源为空", name)),
            1,
        ),
    ];

    if !name_check.include_name.is_empty() {
        let excluded = name_check
            .excluded_namespace
            .split(',')
            .map(str::trim)
            .any(|ns| ns == name);
        if !excluded {
            let failure = (!name.contains(&name_check.include_name))
                .then(|| format!("未包含 {} 内容", name_check.include_name));
            items.push(Item::check(NAME_RULE_TITLE, failure, DEFAULT_LEVEL));
        }
    }
    items
}

async fn resource_counts(ctx: &ProducerContext<'_>, ns: &str) -> Result<(ResourceCounts, usize)> {
    let client = ctx.client;
    let counts = ResourceCounts {
        pods: list_in_namespace::<Pod>(client, ns, "pods").await?.len(),
        services: list_in_namespace::<Service>(client, ns, "services").await?.len(),
        deployments: list_in_namespace::<Deployment>(client, ns, "deployments").await?.len(),
        replicasets: list_in_namespace::<ReplicaSet>(client, ns, "replicasets").await?.len(),
        statefulsets: list_in_namespace::<StatefulSet>(client, ns, "statefulsets").await?.len(),
        daemonsets: list_in_namespace::<DaemonSet>(client, ns, "daemonsets").await?.len(),
        jobs: list_in_namespace::<Job>(client, ns, "jobs").await?.len(),
        secrets: list_in_namespace::<Secret>(client, ns, "secrets").await?.len(),
        configmaps: list_in_namespace::<ConfigMap>(client, ns, "configmaps")
            .await?
            .len()
            .saturating_sub(1),
    };
    let quotas = list_in_namespace::<ResourceQuota>(client, ns, "resourcequotas")
        .await?
        .len();
    Ok((counts, quotas))
}

/// Inspects the selected namespaces. `extra` carries additional native items
/// per namespace, such as log rule results.
pub async fn inspect_namespaces(
    ctx: &ProducerContext<'_>,
    config: &NamespaceConfig,
    mut extra: HashMap<String, Vec<Item>>,
) -> Result<Vec<Namespace>> {
    if !config.enable {
        return Ok(Vec::new());
    }
    info!("[{}] Starting namespace inspection", ctx.task_name);

    let selector = label_selector(&config.selector_labels);
    let namespaces: Vec<K8sNamespace> = list_all(ctx.client, selector.as_deref(), "namespaces").await?;

    let mut result = Vec::with_capacity(namespaces.len());
    for ns in &namespaces {
        let name = ns.name_any();
        debug!("[{}] inspecting namespace {}", ctx.task_name, name);
        let (resources, quotas) = resource_counts(ctx, &name).await?;

        let mut native = namespace_items(&name, &resources, quotas, &config.name_check);
        native.extend(extra.remove(&name).unwrap_or_default());
        let checks = entity_checks(ctx.signals, Bucket::Namespace, &name, native);

        result.push(Namespace {
            name,
            resources,
            checks,
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_namespace_without_quota_fails_both() {
        let items = namespace_items("idle", &ResourceCounts::default(), 0, &NameCheckConfig::default());

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| !i.pass && i.level == 1));
        assert_eq!(items[0].message, "命名空间 idle 没有设置配额");
        assert_eq!(items[1].message, "命名空间 idle 下资源为空");
    }

    #[test]
    fn test_populated_namespace_passes() {
        let counts = ResourceCounts {
            pods: 3,
            ..ResourceCounts::default()
        };
        let items = namespace_items("shop", &counts, 1, &NameCheckConfig::default());
        assert!(items.iter().all(|i| i.pass));
    }

    #[test]
    fn test_name_rule() {
        let rule = NameCheckConfig {
            include_name: "-prod".to_string(),
            excluded_namespace: "kube-system, default".to_string(),
        };
        let counts = ResourceCounts {
            pods: 1,
            ..ResourceCounts::default()
        };

        let bad = namespace_items("shop", &counts, 1, &rule);
        assert_eq!(bad.len(), 3);
        assert_eq!(bad[2].name, NAME_RULE_TITLE);
        assert!(!bad[2].pass);
        assert_eq!(bad[2].level, 2);

        let good = namespace_items("shop-prod", &counts, 1, &rule);
        assert!(good[2].pass);

        let excluded = namespace_items("default", &counts, 1, &rule);
        assert_eq!(excluded.len(), 2);
    }
}
