use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::now_utc_iso;
use crate::records::{GenerationStatus, SessionSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub phase: String,
    pub theme: String,
    pub total_records: u64,
    pub completed: u64,
    pub errors: u64,
    pub upgraded: u64,
    pub remote_calls: u64,
}

impl SessionSummary {
    pub fn from_snapshot(
        session_id: &str,
        started_at: &str,
        theme: &str,
        snapshot: &SessionSnapshot,
        remote_calls: u64,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            started_at: started_at.to_string(),
            finished_at: now_utc_iso(),
            phase: snapshot.phase.as_str().to_string(),
            theme: theme.to_string(),
            total_records: snapshot.records.len() as u64,
            completed: snapshot.count(GenerationStatus::Completed) as u64,
            errors: snapshot.count(GenerationStatus::Error) as u64,
            upgraded: snapshot.upgraded_count() as u64,
            remote_calls,
        }
    }
}

pub fn write_summary(
    path: &Path,
    summary: &SessionSummary,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(summary)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}
