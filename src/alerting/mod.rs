// Alert feed retrieval and resolution onto inspected entities
pub mod feed;
pub mod resolve;

pub use feed::{fetch_alerting, Alert, AlertingData, AlertingResponse, AlertingRule, RuleGroup};
pub use resolve::{
    deployment_name_from_replicaset, AlertKind, AlertResolver, AlertSignal, AlertState, Bucket,
    ClusterSignals, OwnerNameFn, ResolvedSignals,
};

use crate::config::AlertFeedConfig;
use crate::error::Result;

/// Fetches the feed and resolves it in one step.
pub async fn fetch_signals(
    feed: &AlertFeedConfig,
    resolver: &AlertResolver,
    task_name: &str,
) -> Result<ResolvedSignals> {
    let alerting = fetch_alerting(feed).await?;
    resolver.resolve(&alerting, task_name)
}
