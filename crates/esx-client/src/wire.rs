//! Cluster response shapes.
//!
//! Each response is decoded once into these structs and validated before it
//! leaves the crate. Fields the exporter does not read are ignored by serde.

use esx_schemas::{SnapshotRecord, SnapshotState};
use serde::Deserialize;

use crate::ClientError;

/// One row of `GET /_cat/snapshots/{repository}?format=json`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CatSnapshotRow {
    pub id: String,
}

/// Body of `GET /_snapshot/{repository}/{name}/_status`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SnapshotStatusResponse {
    pub snapshots: Vec<SnapshotStatusEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SnapshotStatusEntry {
    pub snapshot: String,
    pub repository: String,
    pub state: String,
    pub stats: SnapshotStats,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SnapshotStats {
    pub total: FileStats,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FileStats {
    pub size_in_bytes: u64,
}

/// Error body shape: `{"error": {"type": ..., "reason": ...}, "status": 404}`.
#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Structured {
        #[serde(rename = "type", default)]
        kind: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    },
    Plain(String),
}

pub(crate) fn snapshot_names(rows: Vec<CatSnapshotRow>) -> Result<Vec<String>, ClientError> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if row.id.trim().is_empty() {
            return Err(ClientError::Decode(
                "cat snapshots row with empty id".to_string(),
            ));
        }
        out.push(row.id);
    }
    Ok(out)
}

impl SnapshotStatusResponse {
    /// Pick the entry for `name` and validate it into a [`SnapshotRecord`].
    pub(crate) fn into_record(self, name: &str) -> Result<SnapshotRecord, ClientError> {
        let mut matching = self.snapshots.into_iter().filter(|s| s.snapshot == name);
        let entry = matching.next().ok_or_else(|| {
            ClientError::Decode(format!("status response has no entry for snapshot {name}"))
        })?;
        if matching.next().is_some() {
            return Err(ClientError::Decode(format!(
                "status response has duplicate entries for snapshot {name}"
            )));
        }
        if entry.repository.is_empty() {
            return Err(ClientError::Decode(format!(
                "snapshot {name}: empty repository"
            )));
        }
        if entry.state.is_empty() {
            return Err(ClientError::Decode(format!("snapshot {name}: empty state")));
        }

        Ok(SnapshotRecord {
            name: entry.snapshot,
            repository: entry.repository,
            state: SnapshotState::new(entry.state),
            total_size_bytes: entry.stats.total.size_in_bytes,
        })
    }
}

/// Best-effort human message for a non-success response body.
pub(crate) fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: ErrorDetail::Plain(msg),
        }) => msg,
        Ok(ErrorBody {
            error: ErrorDetail::Structured { kind, reason },
        }) => match (kind, reason) {
            (Some(k), Some(r)) => format!("{k}: {r}"),
            (Some(k), None) => k,
            (None, Some(r)) => r,
            (None, None) => "unknown".to_string(),
        },
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if text.is_empty() {
                "empty response body".to_string()
            } else {
                text.chars().take(200).collect()
            }
        }
    }
}
