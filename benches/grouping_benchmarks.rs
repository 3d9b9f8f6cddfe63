use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kube_inspection::alerting::{AlertResolver, AlertingResponse};
use kube_inspection::{group_inspections, merge_items, Item, WorkloadData, WorkloadKind};

fn synthetic_feed(alerts: usize) -> AlertingResponse {
    let alerts: Vec<serde_json::Value> = (0..alerts)
        .map(|i| {
            serde_json::json!({
                "state": if i % 3 == 0 { "Normal" } else { "Alerting" },
                "labels": {
                    "prometheus_from": format!("cluster-{}", i % 4),
                    "alertname": format!("Alert{}", i % 7),
                    "created_by_kind": "ReplicaSet",
                    "created_by_name": format!("app-{}-5d8f7c", i % 50),
                    "namespace": format!("ns-{}", i % 10)
                },
                "annotations": {"summary": "threshold exceeded"}
            })
        })
        .collect();
    serde_json::from_value(serde_json::json!({
        "data": {"groups": [{
            "name": "inspection-workload",
            "rules": [{"name": "synthetic", "alerts": alerts}]
        }]}
    }))
    .unwrap()
}

fn synthetic_workloads(count: usize) -> Vec<WorkloadData> {
    (0..count)
        .map(|i| WorkloadData {
            kind: WorkloadKind::Deployment,
            name: format!("app-{}", i),
            namespace: format!("ns-{}", i % 10),
            conditions: Vec::new(),
            checks: merge_items(
                vec![
                    Item::new("健康状态", "", i % 5 != 0, 1),
                    Item::new("健康检查设置", "missing probe", i % 2 == 0, 0),
                ],
                None,
            ),
        })
        .collect()
}

fn resolve_benchmark(c: &mut Criterion) {
    let feed = synthetic_feed(2_000);
    let resolver = AlertResolver::new();

    c.bench_function("resolve_2000_alerts", |b| {
        b.iter(|| black_box(resolver.resolve(black_box(&feed), "bench")))
    });
}

fn grouping_benchmark(c: &mut Criterion) {
    let workloads = synthetic_workloads(5_000);

    c.bench_function("group_5000_workloads", |b| {
        b.iter(|| black_box(group_inspections(black_box(&workloads))))
    });
}

criterion_group!(benches, resolve_benchmark, grouping_benchmark);
criterion_main!(benches);
