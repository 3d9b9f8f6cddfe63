//! Inspection template: which clusters to visit and which checks to run on them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kubernetes: Vec<KubernetesConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubernetesConfig {
    #[serde(default)]
    pub enable: bool,
    pub cluster_id: String,
    pub cluster_name: String,
    /// kubeconfig context; the current context when absent.
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub cluster_core_config: ClusterCoreConfig,
    #[serde(default)]
    pub cluster_node_config: ClusterNodeConfig,
    #[serde(default)]
    pub cluster_resource_config: ClusterResourceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub description: String,
    pub command: String,
    #[serde(default)]
    pub level: Option<i32>,
}

impl CommandConfig {
    pub fn new(description: &str, command: &str, level: Option<i32>) -> Self {
        Self {
            description: description.to_string(),
            command: command.to_string(),
            level,
        }
    }

    /// Argument form understood by the agent script.
    pub fn as_agent_arg(&self) -> String {
        format!("{}: {}", self.description, self.command)
    }
}

/// API server and etcd probes run when a template names no core commands.
pub fn default_core_commands() -> Vec<CommandConfig> {
    vec![
        CommandConfig::new("API Server Ready Check", "kubectl get --raw='/readyz'", Some(3)),
        CommandConfig::new("API Server Live Check", "kubectl get --raw='/livez'", Some(3)),
        CommandConfig::new("ETCD Ready Check", "kubectl get --raw='/readyz/etcd'", Some(3)),
        CommandConfig::new("ETCD Live Check", "kubectl get --raw='/livez/etcd'", Some(3)),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterCoreConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default = "default_core_commands")]
    pub commands: Vec<CommandConfig>,
}

impl Default for ClusterCoreConfig {
    fn default() -> Self {
        Self {
            enable: true,
            commands: default_core_commands(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterNodeConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub node_config: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub selector_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
}

/// Which objects of one kind to inspect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default)]
    pub enable: bool,
    /// Comma separated namespaces; empty means every namespace.
    #[serde(default)]
    pub selector_namespace: String,
    #[serde(default)]
    pub selector_labels: BTreeMap<String, String>,
}

impl SelectorConfig {
    pub fn namespaces(&self) -> Vec<Option<String>> {
        let namespaces: Vec<Option<String>> = self
            .selector_namespace
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| Some(s.to_string()))
            .collect();
        if namespaces.is_empty() {
            vec![None]
        } else {
            namespaces
        }
    }

    pub fn label_selector(&self) -> Option<String> {
        label_selector(&self.selector_labels)
    }
}

/// Renders `k=v,k2=v2`; `None` for an empty map.
pub fn label_selector(labels: &BTreeMap<String, String>) -> Option<String> {
    if labels.is_empty() {
        return None;
    }
    Some(
        labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(","),
    )
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadConfig {
    #[serde(default)]
    pub deployment: SelectorConfig,
    #[serde(default)]
    pub statefulset: SelectorConfig,
    #[serde(default)]
    pub daemonset: SelectorConfig,
    #[serde(default)]
    pub job: SelectorConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameCheckConfig {
    #[serde(default)]
    pub include_name: String,
    #[serde(default)]
    pub excluded_namespace: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamespaceConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub selector_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub name_check: NameCheckConfig,
}

/// Pods whose recent log lines are matched against `pattern`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodLogConfig {
    #[serde(default)]
    pub enable: bool,
    pub namespace: String,
    #[serde(default)]
    pub selector_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub level: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterResourceConfig {
    #[serde(default)]
    pub workload_config: WorkloadConfig,
    #[serde(default)]
    pub namespace_config: NamespaceConfig,
    #[serde(default)]
    pub service_config: SelectorConfig,
    #[serde(default)]
    pub ingress_config: SelectorConfig,
    #[serde(default)]
    pub pvc_config: SelectorConfig,
    #[serde(default)]
    pub pv_config: SelectorConfig,
    #[serde(default)]
    pub pod_log_config: Vec<PodLogConfig>,
}

pub fn load_template(path: &Path) -> Result<Template> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read template {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid template {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_template_defaults() {
        let raw = r#"{
            "name": "nightly",
            "kubernetes": [{"enable": true, "cluster_id": "c-1", "cluster_name": "prod"}]
        }"#;
        let template: Template = serde_json::from_str(raw).unwrap();
        let k = &template.kubernetes[0];

        assert!(k.enable);
        assert!(k.context.is_none());
        assert!(k.cluster_core_config.enable);
        assert_eq!(k.cluster_core_config.commands, default_core_commands());
        assert!(!k.cluster_node_config.enable);
        assert!(!k.cluster_resource_config.workload_config.deployment.enable);
        assert!(k.cluster_resource_config.pod_log_config.is_empty());
    }

    #[test]
    fn test_selector_namespaces() {
        let all = SelectorConfig::default();
        assert_eq!(all.namespaces(), vec![None]);

        let some = SelectorConfig {
            enable: true,
            selector_namespace: " default, kube-system ,".to_string(),
            selector_labels: BTreeMap::new(),
        };
        assert_eq!(
            some.namespaces(),
            vec![Some("default".to_string()), Some("kube-system".to_string())]
        );
    }

    #[test]
    fn test_label_selector_rendering() {
        assert_eq!(label_selector(&BTreeMap::new()), None);

        let mut labels = BTreeMap::new();
        labels.insert("tier".to_string(), "web".to_string());
        labels.insert("app".to_string(), "shop".to_string());
        assert_eq!(label_selector(&labels), Some("app=shop,tier=web".to_string()));
    }

    #[test]
    fn test_command_agent_arg() {
        let c = CommandConfig::new("Disk", "df -h", Some(2));
        assert_eq!(c.as_agent_arg(), "Disk: df -h");
    }

    #[test]
    fn test_explicit_zero_level_is_not_unset() {
        let commands: Vec<CommandConfig> = serde_json::from_str(
            r#"[{"description":"a","command":"x"},{"description":"b","command":"y","level":0}]"#,
        )
        .unwrap();
        assert_eq!(commands[0].level, None);
        assert_eq!(commands[1].level, Some(0));

        let rule: PodLogConfig =
            serde_json::from_str(r#"{"enable":true,"namespace":"shop","pattern":"ERROR","level":0}"#)
                .unwrap();
        assert_eq!(rule.level, Some(0));
    }

    #[test]
    fn test_load_template_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.json");
        std::fs::write(&path, r#"{"name":"t","kubernetes":[]}"#).unwrap();

        let template = load_template(&path).unwrap();
        assert_eq!(template.name, "t");

        std::fs::write(&path, "not json").unwrap();
        let err = load_template(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid template"));
    }
}
