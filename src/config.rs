use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub const DEFAULT_ALERT_RULES_PATH: &str = "/api/v1/namespaces/cattle-global-monitoring/services/http:access-grafana:80/proxy/api/prometheus/grafana/api/v1/rules";

/// Where the alert rule feed lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertFeedConfig {
    pub url: String,
    pub bearer_token: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyConfig {
    Webhook { url: String, secret: String },
    Slack { webhook_url: String },
    Disabled,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub task_name: String,
    pub template_path: PathBuf,
    pub alert_feed: Option<AlertFeedConfig>,
    pub report_dir: PathBuf,
    pub notify: NotifyConfig,
    pub resource_threshold_percent: f64,
    pub log_fetch_concurrency: usize,
    pub log_fetch_timeout: Duration,
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let template_path = env
        .get_var("TEMPLATE_PATH")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| anyhow!("TEMPLATE_PATH env var must point at the inspection template"))?;

    let task_name = env
        .get_var("TASK_NAME")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "inspection".to_string());

    let alert_timeout_secs: u64 = env
        .get_var("ALERT_TIMEOUT_SECS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    let alert_feed = env
        .get_var("SERVER_URL")
        .filter(|s| !s.trim().is_empty())
        .map(|server| {
            let path = env
                .get_var("ALERT_RULES_PATH")
                .unwrap_or_else(|| DEFAULT_ALERT_RULES_PATH.to_string());
            AlertFeedConfig {
                url: format!("{}{}", server.trim_end_matches('/'), path),
                bearer_token: env.get_var("BEARER_TOKEN").unwrap_or_default(),
                timeout: Duration::from_secs(alert_timeout_secs),
            }
        });

    let report_dir = env
        .get_var("REPORT_DIR")
        .unwrap_or_else(|| "./reports".to_string());

    let webhook_url = env.get_var("WEBHOOK_URL").filter(|s| !s.is_empty());
    let webhook_secret = env.get_var("WEBHOOK_SECRET").filter(|s| !s.is_empty());
    let slack_webhook_url = env.get_var("SLACK_WEBHOOK_URL").filter(|s| !s.is_empty());
    let notify = match (webhook_url, webhook_secret, slack_webhook_url) {
        (Some(url), Some(secret), _) => NotifyConfig::Webhook { url, secret },
        (_, _, Some(webhook_url)) => NotifyConfig::Slack { webhook_url },
        _ => NotifyConfig::Disabled,
    };

    let resource_threshold_percent: f64 = env
        .get_var("RESOURCE_THRESHOLD_PERCENT")
        .unwrap_or_else(|| "80".to_string())
        .parse()
        .context("Invalid RESOURCE_THRESHOLD_PERCENT")?;

    let log_fetch_concurrency: usize = env
        .get_var("LOG_FETCH_CONCURRENCY")
        .and_then(|v| v.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(8);

    let log_fetch_timeout_secs: u64 = env
        .get_var("LOG_FETCH_TIMEOUT_SECS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(30);

    Ok(Config {
        task_name,
        template_path: PathBuf::from(template_path),
        alert_feed,
        report_dir: PathBuf::from(report_dir),
        notify,
        resource_threshold_percent,
        log_fetch_concurrency,
        log_fetch_timeout: Duration::from_secs(log_fetch_timeout_secs),
    })
}
