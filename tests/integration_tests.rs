use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use kube_inspection::alerting::{fetch_signals, AlertResolver, AlertingResponse, Bucket};
use kube_inspection::config::{AlertFeedConfig, NotifyConfig};
use kube_inspection::error::{InspectionError, Result};
use kube_inspection::inspector::{assemble_cluster, build_report, not_ready_cluster};
use kube_inspection::logs::{fetch_pod_logs, LogFetchOptions, LogSource, PodTarget};
use kube_inspection::producers::entity_checks;
use kube_inspection::{
    group_inspections, load_config_with_env, merge_items, rate, ClusterCore, ClusterNode,
    ClusterResource, FileReportSink, Inspection, Item, ItemsCount, MockEnvironment, Rating,
    ReportSink, Workload, WorkloadData, WorkloadKind,
};

fn feed() -> AlertingResponse {
    serde_json::from_value(serde_json::json!({
        "data": {"groups": [
            {
                "name": "inspection-workload",
                "rules": [{
                    "name": "HighCPU",
                    "state": "firing",
                    "alerts": [
                        {
                            "state": "Alerting",
                            "labels": {
                                "prometheus_from": "prod",
                                "alertname": "HighCPU",
                                "created_by_kind": "ReplicaSet",
                                "created_by_name": "web-6f9d8c7b4",
                                "namespace": "ns1"
                            },
                            "annotations": {"summary": "cpu>80%"}
                        },
                        {
                            "state": "NoData",
                            "labels": {
                                "prometheus_from": "prod",
                                "alertname": "HighCPU",
                                "created_by_kind": "ReplicaSet",
                                "created_by_name": "api-77c9",
                                "namespace": "ns1"
                            },
                            "annotations": {"summary": "cpu>80%"}
                        }
                    ]
                }]
            },
            {
                "name": "inspection-pvc",
                "rules": [{
                    "name": "PVCFull",
                    "alerts": [{
                        "state": "Alerting",
                        "labels": {
                            "prometheus_from": "prod",
                            "alertname": "PVCFull",
                            "namespace": "db"
                        },
                        "annotations": {"summary": "95% used"}
                    }]
                }]
            },
            {
                "name": "inspection-pv",
                "rules": [{
                    "name": "PVFailed",
                    "alerts": [{
                        "state": "Pending",
                        "labels": {
                            "prometheus_from": "staging",
                            "alertname": "PVFailed",
                            "persistentvolume": "pv-7",
                            "level": "3"
                        },
                        "annotations": {"summary": "volume failed"}
                    }]
                }]
            }
        ]}
    }))
    .unwrap()
}

fn deployment(namespace: &str, name: &str, checks: kube_inspection::Checks) -> WorkloadData {
    WorkloadData {
        kind: WorkloadKind::Deployment,
        name: name.to_string(),
        namespace: namespace.to_string(),
        conditions: Vec::new(),
        checks,
    }
}

fn as_set(inspections: &[Inspection]) -> BTreeSet<(String, i32, BTreeSet<String>)> {
    inspections
        .iter()
        .map(|i| (i.title.clone(), i.level, i.names.iter().cloned().collect()))
        .collect()
}

#[test]
fn test_alert_resolution_to_report() {
    let signals = AlertResolver::new().resolve(&feed(), "it").unwrap();
    let prod = signals.cluster("prod").unwrap();

    // ReplicaSet owner resolved to the deployment; NoData and the incomplete
    // pvc alert produced nothing
    assert_eq!(prod.item_count(), 1);
    let web = deployment(
        "ns1",
        "web",
        entity_checks(
            prod,
            Bucket::Deployment,
            "ns1/web",
            vec![Item::new("健康状态", "", true, 1)],
        ),
    );
    assert_eq!(
        web.checks.items_count(),
        ItemsCount {
            pass_count: 1,
            total_count: 2
        }
    );

    let prod_cluster = assemble_cluster(
        "c-prod",
        "prod",
        ClusterCore::default(),
        ClusterNode::default(),
        ClusterResource {
            workloads: Workload {
                deployment: vec![web],
                ..Workload::default()
            },
            ..ClusterResource::default()
        },
    );

    let staging = signals.cluster("staging").unwrap();
    let pv_items = staging.items(Bucket::Pv, "pv-7").unwrap();
    assert_eq!(pv_items[0].level, 3);
    assert!(!pv_items[0].pass);

    let outcome = build_report(
        "nightly",
        vec![prod_cluster, not_ready_cluster("c-broken", "broken")],
        chrono::Local::now(),
    );

    assert_eq!(outcome.summary.clusters[0].rating, Rating::Medium);
    assert_eq!(outcome.report.global.rating, Rating::Low);
    let text = outcome.digest_text();
    assert!(text.starts_with("Health rating: Low\n"));
    assert!(text.contains("Cluster prod inspection warnings:\nHighCPU\n"));
    assert!(text.contains("cluster c-broken is not ready"));
}

#[test]
fn test_scenario_merge_native_then_alert() {
    let native = vec![Item::new("健康状态", "", true, 1)];
    let resolved = vec![Item::new("HighCPU", "cpu>80%", false, 2)];

    let checks = merge_items(native, Some(&resolved));

    assert_eq!(checks.items().len(), 2);
    assert_eq!(checks.items()[0].name, "健康状态");
    assert_eq!(
        checks.items_count(),
        ItemsCount {
            pass_count: 1,
            total_count: 2
        }
    );
}

#[test]
fn test_scenario_shared_failure_groups_once() {
    let probe = || merge_items(vec![Item::new("健康检查设置", "no probe", false, 1)], None);
    let entities = vec![deployment("ns1", "e1", probe()), deployment("ns2", "e2", probe())];

    let inspections = group_inspections(&entities);

    let expected = BTreeSet::from([(
        "健康检查设置".to_string(),
        1,
        BTreeSet::from(["Deployment: ns1/e1".to_string(), "Deployment: ns2/e2".to_string()]),
    )]);
    assert_eq!(as_set(&inspections), expected);
}

#[test]
fn test_scenario_rating_extremes() {
    let calm = assemble_cluster(
        "c-1",
        "calm",
        ClusterCore::default(),
        ClusterNode::default(),
        ClusterResource::default(),
    );
    let summary = rate(std::slice::from_ref(&calm));
    assert_eq!(summary.rating, Rating::Excellent);

    let mut noisy = calm.clone();
    noisy.cluster_resource.inspections = (0..10)
        .map(|i| Inspection::new(format!("minor-{}", i), 0, vec!["x".to_string()]))
        .chain(std::iter::once(Inspection::new("severe", 3, vec!["y".to_string()])))
        .collect();
    assert_eq!(rate(&[calm, noisy]).rating, Rating::Low);
}

#[test]
fn test_scenario_missing_pvc_label_is_skipped() {
    let signals = AlertResolver::new().resolve(&feed(), "it").unwrap();
    let prod = signals.cluster("prod").unwrap();
    // only the firing workload alert survives
    assert_eq!(prod.item_count(), 1);
    assert!(prod.items(Bucket::Deployment, "ns1/web").is_some());
}

struct StaticLogs;

impl LogSource for StaticLogs {
    async fn tail_logs(&self, _namespace: &str, pod: &str, _container: &str, lines: i64) -> Result<String> {
        assert_eq!(lines, 50);
        Ok(format!("{} started\n{} ERROR timeout", pod, pod))
    }
}

#[tokio::test]
async fn test_scenario_log_fetch_skips_containerless_pod() {
    let targets: Vec<PodTarget> = (1..=5)
        .map(|i| PodTarget {
            namespace: "shop".to_string(),
            name: format!("pod-{}", i),
            containers: if i == 3 { Vec::new() } else { vec!["app".to_string()] },
        })
        .collect();

    let records = fetch_pod_logs(
        Arc::new(StaticLogs),
        targets,
        "ERROR",
        LogFetchOptions::default(),
        tokio::time::Instant::now() + Duration::from_secs(5),
    )
    .await;

    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.lines.len() == 1));
}

#[tokio::test]
async fn test_fetch_signals_over_http() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/rules")
        .match_header("authorization", "Bearer t0ken")
        .with_status(200)
        .with_body(serde_json::to_string(&feed()).unwrap())
        .create_async()
        .await;

    let cfg = AlertFeedConfig {
        url: format!("{}/rules", server.url()),
        bearer_token: "t0ken".to_string(),
        timeout: Duration::from_secs(5),
    };
    let signals = fetch_signals(&cfg, &AlertResolver::new(), "it").await.unwrap();
    assert!(signals.cluster("prod").is_some());
    assert!(signals.cluster("staging").is_some());
}

#[tokio::test]
async fn test_empty_feed_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/rules")
        .with_status(200)
        .with_body(r#"{"data":{"groups":[]}}"#)
        .create_async()
        .await;

    let cfg = AlertFeedConfig {
        url: format!("{}/rules", server.url()),
        bearer_token: String::new(),
        timeout: Duration::from_secs(5),
    };
    let err = fetch_signals(&cfg, &AlertResolver::new(), "it").await.unwrap_err();
    assert!(matches!(err, InspectionError::EmptyRuleSet));
}

#[test]
fn test_config_and_report_sink_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let env = MockEnvironment::new()
        .with_var("TEMPLATE_PATH", "/etc/inspection/template.json")
        .with_var("REPORT_DIR", dir.path().to_string_lossy().to_string())
        .with_var("WEBHOOK_URL", "https://hooks.example.com/inspection")
        .with_var("WEBHOOK_SECRET", "s3cret")
        .with_var("SLACK_WEBHOOK_URL", "https://hooks.slack.com/test");

    let cfg = load_config_with_env(&env).unwrap();
    assert!(matches!(cfg.notify, NotifyConfig::Webhook { .. }));
    assert!(cfg.alert_feed.is_none());

    let outcome = build_report("nightly", Vec::new(), chrono::Local::now());
    let sink = FileReportSink::new(&cfg.report_dir);
    sink.store(&outcome.report).unwrap();
    assert!(sink.path_for(&outcome.report.id).exists());
}
