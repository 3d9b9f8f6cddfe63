use std::collections::{BTreeMap, BTreeSet, HashMap};

use k8s_openapi::api::networking::v1::Ingress as K8sIngress;
use kube::ResourceExt;
use tracing::info;

use super::{entity_checks, namespaced_key, ProducerContext};
use crate::alerting::Bucket;
use crate::error::Result;
use crate::kubernetes::list_selected;
use crate::template::SelectorConfig;
use crate::types::{Ingress, Item, DEFAULT_LEVEL};

pub const DUPLICATE_PATH_TITLE: &str = "不存在重复的 Path 路径";

/// Duplicate `host + path` check for every ingress, keyed `namespace/name`.
pub fn duplicate_path_items(ingresses: &[K8sIngress]) -> HashMap<String, Item> {
    let mut owners: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut keys = Vec::with_capacity(ingresses.len());

    for ing in ingresses {
        let key = namespaced_key(&ing.namespace().unwrap_or_default(), &ing.name_any());
        let rules = ing.spec.as_ref().and_then(|s| s.rules.as_ref());
        for rule in rules.into_iter().flatten() {
            let host = rule.host.as_deref().unwrap_or_default();
            let paths = rule.http.as_ref().map(|h| h.paths.as_slice()).unwrap_or(&[]);
            for path in paths {
                let route = format!("{}{}", host, path.path.as_deref().unwrap_or_default());
                owners.entry(route).or_default().insert(key.clone());
            }
        }
        keys.push(key);
    }

    let mut failures: HashMap<String, String> = HashMap::new();
    for shared in owners.values().filter(|o| o.len() > 1) {
        let joined = shared.iter().cloned().collect::<Vec<_>>().join(",");
        for owner in shared {
            failures
                .entry(owner.clone())
                .or_insert_with(|| format!("Ingress {} 存在重复的 Path 路径", joined));
        }
    }

    keys.into_iter()
        .map(|key| {
            let failure = failures.get(&key).cloned();
            (key, Item::check(DUPLICATE_PATH_TITLE, failure, DEFAULT_LEVEL))
        })
        .collect()
}

pub async fn inspect_ingresses(ctx: &ProducerContext<'_>, config: &SelectorConfig) -> Result<Vec<Ingress>> {
    if !config.enable {
        return Ok(Vec::new());
    }
    info!("[{}] Starting ingress inspection", ctx.task_name);

    let ingresses: Vec<K8sIngress> = list_selected(ctx.client, config, "ingresses").await?;
    let mut checks_by_key = duplicate_path_items(&ingresses);

    Ok(ingresses
        .iter()
        .map(|ing| {
            let name = ing.name_any();
            let namespace = ing.namespace().unwrap_or_default();
            let key = namespaced_key(&namespace, &name);
            let native = checks_by_key.remove(&key).into_iter().collect();
            Ingress {
                checks: entity_checks(ctx.signals, Bucket::Ingress, &key, native),
                name,
                namespace,
            }
        })
        .collect())
}
