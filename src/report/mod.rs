use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::types::Report;

/// Persists finished reports.
pub trait ReportSink {
    fn store(&self, report: &Report) -> Result<()>;
}

/// Writes each report as pretty JSON to `<dir>/<id>.json`.
#[derive(Debug, Clone)]
pub struct FileReportSink {
    dir: PathBuf,
}

impl FileReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

impl ReportSink for FileReportSink {
    fn store(&self, report: &Report) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create report dir {}", self.dir.display()))?;
        let path = self.path_for(&report.id);
        let body = serde_json::to_vec_pretty(report).context("Failed to serialize report")?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        info!("Report {} written to {}", report.id, path.display());
        Ok(())
    }
}
