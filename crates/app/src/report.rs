//! Crash reports
//!
//! Written to disk when the player agrees to send details of a fatal error.
//! Each report is one JSON file named after its time and id.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct CrashReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub version: &'static str,
    pub node: String,
    pub title: String,
    pub summary: String,
    pub detail: Option<String>,
}

impl CrashReport {
    pub fn new(node: &str, title: &str, summary: &str, detail: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION"),
            node: node.to_string(),
            title: title.to_string(),
            summary: summary.to_string(),
            detail: detail.map(str::to_string),
        }
    }

    fn file_name(&self) -> String {
        format!(
            "{}-{}.json",
            self.created_at.format("%Y%m%dT%H%M%SZ"),
            self.id
        )
    }

    /// Write the report into `dir`, creating it if needed
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        tracing::info!(path = %path.display(), id = %self.id, "Crash report written");
        Ok(path)
    }
}
