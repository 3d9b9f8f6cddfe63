use std::fmt::Debug;

use anyhow::Context;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{AttachParams, ListParams};
use kube::config::KubeConfigOptions;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::{InspectionError, Result};
use crate::template::{CommandConfig, SelectorConfig};
use crate::types::CommandCheckResult;

pub const AGENT_NAMESPACE: &str = "cattle-inspection-system";
pub const AGENT_LABEL_SELECTOR: &str = "name=inspection-agent";
pub const AGENT_CONTAINER: &str = "inspection-agent-container";
pub const AGENT_SCRIPT: &str = "/opt/inspection/inspection.sh";

/// Client for a kubeconfig context, or the inferred default config when none is named.
pub async fn connect(context: Option<&str>) -> anyhow::Result<Client> {
    match context {
        None => Client::try_default()
            .await
            .context("Failed to create default Kubernetes client"),
        Some(ctx) => {
            let options = KubeConfigOptions {
                context: Some(ctx.to_string()),
                ..KubeConfigOptions::default()
            };
            let config = kube::Config::from_kubeconfig(&options)
                .await
                .with_context(|| format!("Failed to load kubeconfig context {}", ctx))?;
            Client::try_from(config)
                .with_context(|| format!("Failed to create client for context {}", ctx))
        }
    }
}

fn list_params(labels: Option<&str>) -> ListParams {
    match labels {
        Some(selector) => ListParams::default().labels(selector),
        None => ListParams::default(),
    }
}

/// Lists a namespaced kind over every namespace the selector names.
pub async fn list_selected<K>(
    client: &Client,
    selector: &SelectorConfig,
    kind: &'static str,
) -> Result<Vec<K>>
where
    K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    let params = list_params(selector.label_selector().as_deref());
    let mut items = Vec::new();
    for namespace in selector.namespaces() {
        let api: Api<K> = match &namespace {
            Some(ns) => Api::namespaced(client.clone(), ns),
            None => Api::all(client.clone()),
        };
        let list = api.list(&params).await.map_err(InspectionError::list(kind))?;
        items.extend(list.items);
    }
    debug!("listed {} {}", items.len(), kind);
    Ok(items)
}

/// Lists every object of a kind in one namespace.
pub async fn list_in_namespace<K>(client: &Client, namespace: &str, kind: &'static str) -> Result<Vec<K>>
where
    K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    Ok(api
        .list(&ListParams::default())
        .await
        .map_err(InspectionError::list(kind))?
        .items)
}

/// Lists a kind across the cluster, filtered by an optional label selector.
pub async fn list_all<K>(client: &Client, labels: Option<&str>, kind: &'static str) -> Result<Vec<K>>
where
    K: Resource + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    let api: Api<K> = Api::all(client.clone());
    Ok(api
        .list(&list_params(labels))
        .await
        .map_err(InspectionError::list(kind))?
        .items)
}

pub async fn agent_pods(client: &Client) -> Result<Vec<Pod>> {
    let api: Api<Pod> = Api::namespaced(client.clone(), AGENT_NAMESPACE);
    Ok(api
        .list(&ListParams::default().labels(AGENT_LABEL_SELECTOR))
        .await
        .map_err(InspectionError::list("inspection agent pods"))?
        .items)
}

/// Raw output of one agent script invocation.
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    pub stdout: String,
    pub stderr: String,
}

async fn read_stream<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<String> {
    let mut out = String::new();
    if let Some(mut reader) = reader {
        reader.read_to_string(&mut out).await?;
    }
    Ok(out)
}

/// Runs the agent script with one `"<description>: <command>"` argument per command.
pub async fn exec_agent(client: &Client, pod: &Pod, commands: &[CommandConfig]) -> Result<AgentOutput> {
    let name = pod.metadata.name.clone().unwrap_or_default();
    let namespace = pod
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| AGENT_NAMESPACE.to_string());
    let exec_error = |message: String| InspectionError::Exec {
        pod: format!("{}/{}", namespace, name),
        message,
    };

    let mut args = vec![AGENT_SCRIPT.to_string()];
    args.extend(commands.iter().map(CommandConfig::as_agent_arg));
    debug!("exec in {}/{}: {:?}", namespace, name, args);

    let api: Api<Pod> = Api::namespaced(client.clone(), &namespace);
    let params = AttachParams::default()
        .container(AGENT_CONTAINER)
        .stdout(true)
        .stderr(true);
    let mut attached = api
        .exec(&name, args, &params)
        .await
        .map_err(|e| exec_error(e.to_string()))?;

    let stdout = attached.stdout();
    let stderr = attached.stderr();
    let (stdout, stderr) = tokio::join!(read_stream(stdout), read_stream(stderr));
    let stdout = stdout.map_err(|e| exec_error(e.to_string()))?;
    let stderr = stderr.map_err(|e| exec_error(e.to_string()))?;
    attached.join().await.map_err(|e| exec_error(e.to_string()))?;

    Ok(AgentOutput { stdout, stderr })
}

/// Decodes the agent's stdout: a JSON array of results, or one JSON value per line.
pub fn parse_command_results(stdout: &str) -> Result<Vec<CommandCheckResult>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if let Ok(results) = serde_json::from_str::<Vec<CommandCheckResult>>(trimmed) {
        return Ok(results);
    }

    let mut results = Vec::new();
    for line in trimmed.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with('[') {
            results.extend(serde_json::from_str::<Vec<CommandCheckResult>>(line)?);
        } else {
            results.push(serde_json::from_str::<CommandCheckResult>(line)?);
        }
    }
    Ok(results)
}

/// Executes `commands` on the agent pod and decodes the results.
///
/// With `strict`, anything on stderr fails the call.
pub async fn run_agent_commands(
    client: &Client,
    pod: &Pod,
    commands: &[CommandConfig],
    strict: bool,
) -> Result<Vec<CommandCheckResult>> {
    let output = exec_agent(client, pod, commands).await?;
    if !output.stderr.trim().is_empty() {
        let pod_name = pod.metadata.name.clone().unwrap_or_default();
        if strict {
            return Err(InspectionError::Exec {
                pod: pod_name,
                message: output.stderr,
            });
        }
        tracing::error!("stderr from pod {}: {}", pod_name, output.stderr.trim());
    }
    parse_command_results(&output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_results_array() {
        let stdout = r#"[
            {"description":"API Server Ready Check","command":"kubectl get --raw='/readyz'","response":"ok","error":""},
            {"description":"ETCD Live Check","command":"kubectl get --raw='/livez/etcd'","response":"","error":"connection refused"}
        ]"#;

        let results = parse_command_results(stdout).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].response, "ok");
        assert_eq!(results[1].error, "connection refused");
    }

    #[test]
    fn test_parse_command_results_line_delimited() {
        let stdout = "{\"description\":\"disk\",\"command\":\"df -h\",\"response\":\"ok\"}\n\
                      {\"description\":\"mem\",\"command\":\"free\",\"error\":\"oom\"}\n";

        let results = parse_command_results(stdout).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].error, "");
        assert_eq!(results[1].description, "mem");
    }

    #[test]
    fn test_parse_command_results_empty_and_invalid() {
        assert!(parse_command_results("  \n").unwrap().is_empty());
        assert!(matches!(
            parse_command_results("not json"),
            Err(InspectionError::Decode(_))
        ));
    }

    #[test]
    fn test_list_params_labels() {
        assert_eq!(list_params(Some("app=web")).label_selector.as_deref(), Some("app=web"));
        assert!(list_params(None).label_selector.is_none());
    }
}
