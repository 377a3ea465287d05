use std::path::Path;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::catalog::{Gender, ImageSize};
use crate::studio::HistoryEntry;

/// One history entry as recorded in `summary.json`. Image bytes stay out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub entry_id: String,
    pub archetype: String,
    pub style: String,
    pub gender: Gender,
    pub size: ImageSize,
    pub created_at: String,
    pub bytes: u64,
}

impl HistorySummary {
    pub fn from_entry(entry: &HistoryEntry) -> Self {
        Self {
            entry_id: entry.id.clone(),
            archetype: entry.request.archetype.code.to_string(),
            style: entry.request.style.id.to_string(),
            gender: entry.request.gender,
            size: entry.request.size,
            created_at: entry
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            bytes: entry.payload.len() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub model: String,
    pub generations_succeeded: u64,
    pub generations_failed: u64,
    pub generations_rejected: u64,
    /// Newest first, same order as the in-session history.
    pub history: Vec<HistorySummary>,
}

impl SessionSummary {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

pub fn write_summary(path: &Path, summary: &SessionSummary) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(summary)?)?;
    Ok(())
}
