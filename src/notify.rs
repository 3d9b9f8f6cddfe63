use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{error, info};

use crate::config::NotifyConfig;

/// What gets announced after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub text: String,
    pub attachment: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub blocks: Vec<serde_json::Value>,
}

pub fn build_slack_payload(n: &Notification) -> SlackPayload {
    let mut blocks: Vec<serde_json::Value> = Vec::new();
    blocks.push(serde_json::json!({
        "type": "header",
        "text": {"type": "plain_text", "text": n.title}
    }));

    let mut lines = n.text.lines();
    let rating = lines.next().unwrap_or_default();
    blocks.push(serde_json::json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": format!("*{}*", rating)}
    }));

    let details: Vec<String> = lines
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            if l.starts_with("Cluster ") {
                format!("*{}*", l)
            } else {
                format!("• {}", l)
            }
        })
        .collect();
    if !details.is_empty() {
        blocks.push(serde_json::json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": details.join("\n")}
        }));
    }

    if let Some(path) = &n.attachment {
        blocks.push(serde_json::json!({
            "type": "context",
            "elements": [{"type": "mrkdwn", "text": format!("Report: `{}`", path.display())}]
        }));
    }

    SlackPayload {
        text: Some(n.title.clone()),
        blocks,
    }
}

pub fn build_webhook_payload(n: &Notification) -> serde_json::Value {
    serde_json::json!({
        "title": n.title,
        "text": n.text,
        "attachment": n.attachment.as_ref().map(|p| p.display().to_string()),
    })
}

async fn check_response(res: reqwest::Response, target: &str) -> Result<()> {
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        error!("{} failed: {} - {}", target, status, body);
        return Err(anyhow!("{} returned non-success status {}", target, status));
    }
    Ok(())
}

pub async fn send_to_slack(webhook_url: &str, payload: &SlackPayload) -> Result<()> {
    let client = reqwest::Client::new();
    let res = client
        .post(webhook_url)
        .json(payload)
        .send()
        .await
        .context("Failed to send Slack request")?;
    check_response(res, "Slack webhook").await
}

pub async fn send_webhook(url: &str, secret: &str, payload: &serde_json::Value) -> Result<()> {
    let client = reqwest::Client::new();
    let res = client
        .post(url)
        .bearer_auth(secret)
        .json(payload)
        .send()
        .await
        .context("Failed to send webhook request")?;
    check_response(res, "Webhook").await
}

/// Delivers through whichever channel the config enables.
pub async fn send_notification(cfg: &NotifyConfig, n: &Notification) -> Result<()> {
    match cfg {
        NotifyConfig::Webhook { url, secret } => {
            send_webhook(url, secret, &build_webhook_payload(n)).await
        }
        NotifyConfig::Slack { webhook_url } => {
            send_to_slack(webhook_url, &build_slack_payload(n)).await
        }
        NotifyConfig::Disabled => {
            info!("No notification channel configured, skipping");
            Ok(())
        }
    }
}
