use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Pod;
use tokio::time::Instant;
use tracing::info;

use super::ProducerContext;
use crate::error::Result;
use crate::kubernetes::list_selected;
use crate::logs::{fetch_pod_logs, KubeLogSource, LogFetchOptions, PodTarget};
use crate::template::{PodLogConfig, SelectorConfig};
use crate::types::{Item, PodLog, DEFAULT_LEVEL};

pub const LOG_TITLE: &str = "日志匹配";

/// One item per namespace that had pods under the rule; it fails when any
/// pod of that namespace returned matching lines.
pub fn log_items(
    pattern: &str,
    level: i32,
    namespaces: &BTreeSet<String>,
    records: &[PodLog],
) -> HashMap<String, Item> {
    namespaces
        .iter()
        .map(|ns| {
            let hits: Vec<String> = records
                .iter()
                .filter(|r| &r.namespace == ns && !r.lines.is_empty())
                .map(|r| {
                    format!(
                        "Pod {} 日志匹配 {} 共 {} 行: {}",
                        r.name,
                        pattern,
                        r.lines.len(),
                        r.lines[0]
                    )
                })
                .collect();
            let failure = (!hits.is_empty()).then(|| hits.join("\n"));
            (ns.clone(), Item::check(LOG_TITLE, failure, level))
        })
        .collect()
}

/// Runs every enabled log rule and returns the resulting items per namespace.
pub async fn inspect_pod_logs(
    ctx: &ProducerContext<'_>,
    rules: &[PodLogConfig],
    options: LogFetchOptions,
    timeout: Duration,
) -> Result<HashMap<String, Vec<Item>>> {
    let mut by_namespace: HashMap<String, Vec<Item>> = HashMap::new();
    let source = Arc::new(KubeLogSource::new(ctx.client.clone()));

    for rule in rules.iter().filter(|r| r.enable) {
        info!(
            "[{}] Matching pod logs in {:?} against {:?}",
            ctx.task_name, rule.namespace, rule.pattern
        );
        let selector = SelectorConfig {
            enable: true,
            selector_namespace: rule.namespace.clone(),
            selector_labels: rule.selector_labels.clone(),
        };
        let pods: Vec<Pod> = list_selected(ctx.client, &selector, "pods").await?;
        let targets: Vec<PodTarget> = pods.iter().filter_map(PodTarget::from_pod).collect();
        let namespaces: BTreeSet<String> = targets.iter().map(|t| t.namespace.clone()).collect();

        let records = fetch_pod_logs(
            Arc::clone(&source),
            targets,
            &rule.pattern,
            options,
            Instant::now() + timeout,
        )
        .await;

        for (ns, item) in log_items(
            &rule.pattern,
            rule.level.unwrap_or(DEFAULT_LEVEL),
            &namespaces,
            &records,
        ) {
            by_namespace.entry(ns).or_default().push(item);
        }
    }
    Ok(by_namespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(namespace: &str, name: &str, lines: &[&str]) -> PodLog {
        PodLog {
            namespace: namespace.to_string(),
            name: name.to_string(),
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn test_matching_pod_fails_its_namespace() {
        let namespaces = BTreeSet::from(["shop".to_string(), "ops".to_string()]);
        let records = vec![
            record("shop", "web-1", &["ERROR disk full", "ERROR retry"]),
            record("shop", "web-2", &[]),
            record("ops", "cron-1", &[]),
        ];

        let items = log_items("ERROR", 3, &namespaces, &records);

        let shop = &items["shop"];
        assert!(!shop.pass);
        assert_eq!(shop.level, 3);
        assert!(shop.message.contains("web-1"));
        assert!(shop.message.contains("共 2 行"));
        assert!(!shop.message.contains("web-2"));

        assert!(items["ops"].pass);
    }

    #[test]
    fn test_namespace_without_records_passes() {
        let namespaces = BTreeSet::from(["quiet".to_string()]);
        let items = log_items("panic", 0, &namespaces, &[]);
        assert!(items["quiet"].pass);
        assert_eq!(items["quiet"].level, 0);
    }
}
