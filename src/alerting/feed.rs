use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error};

use crate::config::AlertFeedConfig;
use crate::error::{InspectionError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertingResponse {
    #[serde(default)]
    pub data: Option<AlertingData>,
}

impl AlertingResponse {
    pub fn groups(&self) -> &[RuleGroup] {
        self.data.as_ref().map(|d| d.groups.as_slice()).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertingData {
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<AlertingRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertingRule {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub state: String,
}

/// GET the rule feed and decode it. An empty group list is an error.
pub async fn fetch_alerting(feed: &AlertFeedConfig) -> Result<AlertingResponse> {
    debug!("Fetching alerting rules from {}", feed.url);
    let client = reqwest::Client::builder().timeout(feed.timeout).build()?;
    let res = client
        .get(&feed.url)
        .bearer_auth(&feed.bearer_token)
        .send()
        .await?;

    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        error!("Alert feed returned {} - {}", status, body);
        return Err(InspectionError::Fetch(format!("alert feed returned {}", status)));
    }

    let body = res.text().await?;
    let alerting: AlertingResponse = serde_json::from_str(&body)?;
    if alerting.groups().is_empty() {
        return Err(InspectionError::EmptyRuleSet);
    }
    Ok(alerting)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn feed_for(server: &mockito::Server) -> AlertFeedConfig {
        AlertFeedConfig {
            url: format!("{}/rules", server.url()),
            bearer_token: "token".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_fetch_decodes_groups() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rules")
            .match_header("authorization", "Bearer token")
            .with_status(200)
            .with_body(
                r#"{"data":{"groups":[{"name":"inspection-node","rules":[
                    {"state":"firing","name":"NodeDown","alerts":[
                        {"labels":{"instance":"10.0.0.1:9100"},"annotations":{"summary":"down"},"state":"Alerting"}
                    ]}
                ]}]}}"#,
            )
            .create_async()
            .await;

        let alerting = fetch_alerting(&feed_for(&server)).await.unwrap();
        mock.assert_async().await;

        let groups = alerting.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "inspection-node");
        assert_eq!(groups[0].rules[0].alerts[0].labels["instance"], "10.0.0.1:9100");
    }

    #[tokio::test]
    async fn test_fetch_empty_groups_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rules")
            .with_status(200)
            .with_body(r#"{"data":{"groups":[]}}"#)
            .create_async()
            .await;

        let err = fetch_alerting(&feed_for(&server)).await.unwrap_err();
        assert!(matches!(err, InspectionError::EmptyRuleSet));
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rules")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let err = fetch_alerting(&feed_for(&server)).await.unwrap_err();
        assert!(matches!(err, InspectionError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_fetch_malformed_json() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rules")
            .with_status(200)
            .with_body("{not json")
            .create_async()
            .await;

        let err = fetch_alerting(&feed_for(&server)).await.unwrap_err();
        assert!(matches!(err, InspectionError::Decode(_)));
    }
}
