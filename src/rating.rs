use serde::{Deserialize, Serialize};

use crate::types::{Inspection, Kubernetes};

/// Inspections at or above this level are listed in the digest.
pub const DIGEST_LEVEL_THRESHOLD: i32 = 2;

/// Health grade derived from the highest inspection level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Excellent,
    High,
    Medium,
    Low,
    Unknown,
}

impl Rating {
    pub fn from_level(level: i32) -> Self {
        match level {
            0 => Rating::Excellent,
            1 => Rating::High,
            2 => Rating::Medium,
            3 => Rating::Low,
            _ => Rating::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rating::Excellent => "Excellent",
            Rating::High => "High",
            Rating::Medium => "Medium",
            Rating::Low => "Low",
            Rating::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// `max(0, levels...)`.
pub fn max_level<'a, I>(inspections: I) -> i32
where
    I: IntoIterator<Item = &'a Inspection>,
{
    inspections.into_iter().map(|i| i.level).fold(0, i32::max)
}

/// Notification text collected over every cluster of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Digest {
    lines: Vec<String>,
}

impl Digest {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Header line for the cluster, then every inspection title at or above
    /// [`DIGEST_LEVEL_THRESHOLD`].
    pub fn push_cluster<'a, I>(&mut self, cluster_name: &str, inspections: I)
    where
        I: IntoIterator<Item = &'a Inspection>,
    {
        self.lines.push(format!("Cluster {} inspection warnings:", cluster_name));
        self.lines.extend(
            inspections
                .into_iter()
                .filter(|i| i.level >= DIGEST_LEVEL_THRESHOLD)
                .map(|i| i.title.clone()),
        );
    }

    pub fn render(&self, rating: Rating) -> String {
        let mut text = format!("Health rating: {}\n", rating);
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRating {
    pub cluster_id: String,
    pub level: i32,
    pub rating: Rating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingSummary {
    pub clusters: Vec<ClusterRating>,
    pub level: i32,
    pub rating: Rating,
    pub digest: Digest,
}

/// Reduces every cluster's inspections to per-cluster and report ratings.
pub fn rate(clusters: &[Kubernetes]) -> RatingSummary {
    let mut digest = Digest::default();
    let mut ratings = Vec::with_capacity(clusters.len());
    let mut level = 0;

    for k in clusters {
        let cluster_level = max_level(k.inspections());
        digest.push_cluster(&k.cluster_name, k.inspections());
        level = level.max(cluster_level);
        ratings.push(ClusterRating {
            cluster_id: k.cluster_id.clone(),
            level: cluster_level,
            rating: Rating::from_level(cluster_level),
        });
    }

    RatingSummary {
        clusters: ratings,
        level,
        rating: Rating::from_level(level),
        digest,
    }
}
