use std::future::Future;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use kube::api::LogParams;
use kube::{Api, Client};
use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::error::{InspectionError, Result};
use crate::types::PodLog;

/// Lines requested from the tail of each pod's log.
pub const DEFAULT_TAIL_LINES: i64 = 50;

/// Anything able to return the last lines of a container log.
pub trait LogSource: Send + Sync + 'static {
    fn tail_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        lines: i64,
    ) -> impl Future<Output = Result<String>> + Send;
}

pub struct KubeLogSource {
    client: Client,
}

impl KubeLogSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl LogSource for KubeLogSource {
    async fn tail_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        lines: i64,
    ) -> Result<String> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            container: Some(container.to_string()),
            tail_lines: Some(lines),
            ..LogParams::default()
        };
        api.logs(pod, &params)
            .await
            .map_err(|source| InspectionError::Logs {
                pod: format!("{}/{}", namespace, pod),
                source,
            })
    }
}

/// A pod selected for log inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodTarget {
    pub namespace: String,
    pub name: String,
    pub containers: Vec<String>,
}

impl PodTarget {
    pub fn from_pod(pod: &Pod) -> Option<Self> {
        let name = pod.metadata.name.clone()?;
        let namespace = pod.metadata.namespace.clone().unwrap_or_default();
        let containers = pod
            .spec
            .as_ref()
            .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default();
        Some(Self {
            namespace,
            name,
            containers,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogFetchOptions {
    pub concurrency: usize,
    pub tail_lines: i64,
}

impl Default for LogFetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            tail_lines: DEFAULT_TAIL_LINES,
        }
    }
}

/// Lines of `text` matching `pattern`, in log order.
pub fn matching_lines(text: &str, pattern: &Regex) -> Vec<String> {
    text.lines()
        .filter(|line| pattern.is_match(line))
        .map(str::to_string)
        .collect()
}

/// Waits for a fetch permit, then reads the tail of one container log.
async fn fetch_one<S: LogSource>(
    source: &S,
    permits: Arc<Semaphore>,
    target: &PodTarget,
    container: &str,
    tail_lines: i64,
) -> Result<String> {
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|_| InspectionError::LogPermitsClosed {
            pod: format!("{}/{}", target.namespace, target.name),
        })?;
    source
        .tail_logs(&target.namespace, &target.name, container, tail_lines)
        .await
}

/// Fetches the tail of every target's first container and keeps the lines
/// matching `pattern`.
///
/// At most `options.concurrency` fetches run at once. Workers still running
/// at `deadline` are cancelled and contribute nothing. A pod without
/// containers, a failed fetch or an invalid pattern drops that pod's record
/// without affecting the others. Records are sorted by namespace and name.
pub async fn fetch_pod_logs<S: LogSource>(
    source: Arc<S>,
    targets: Vec<PodTarget>,
    pattern: &str,
    options: LogFetchOptions,
    deadline: Instant,
) -> Vec<PodLog> {
    let pattern = if pattern.is_empty() { ".*" } else { pattern };
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(e) => {
            for target in &targets {
                warn!(
                    "skipping logs of {}/{}: invalid pattern {:?}: {}",
                    target.namespace, target.name, pattern, e
                );
            }
            return Vec::new();
        }
    };

    let permits = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut workers = JoinSet::new();

    for target in targets {
        let Some(container) = target.containers.first().cloned() else {
            debug!("pod {}/{} has no containers, skipping", target.namespace, target.name);
            continue;
        };
        let source = Arc::clone(&source);
        let permits = Arc::clone(&permits);
        let regex = regex.clone();
        let tail_lines = options.tail_lines;

        workers.spawn(async move {
            let work = fetch_one(source.as_ref(), permits, &target, &container, tail_lines);
            match timeout_at(deadline, work).await {
                Ok(Ok(text)) => Some(PodLog {
                    lines: matching_lines(&text, &regex),
                    namespace: target.namespace,
                    name: target.name,
                }),
                Ok(Err(e)) => {
                    error!("log fetch for {}/{} failed: {}", target.namespace, target.name, e);
                    None
                }
                Err(_) => {
                    error!("log fetch for {}/{} timed out", target.namespace, target.name);
                    None
                }
            }
        });
    }

    let mut records = Vec::new();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => error!("log worker aborted: {}", e),
        }
    }
    records.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
    records
}
