//! Execution events for real-time feedback
//!
//! Emitted per node as it starts and finishes, suitable for an SSE stream:
//! `{ "node_id", "status", "duration_ms"?, "error_message"?, "csv_metadata"? }`.

use serde_json::{Value, json};
use strum_macros::{Display, EnumString, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionStatus {
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    pub node_id: String,
    pub status: ExecutionStatus,
    /// Only meaningful for `Completed` / `Failed`.
    pub duration_ms: i64,
    /// Only set for `Failed`.
    pub error_message: String,
    /// Row counts and column names per CSV output port, for `Completed`.
    pub csv_metadata: Value,
}

impl ExecutionEvent {
    pub fn started(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: ExecutionStatus::Started,
            duration_ms: 0,
            error_message: String::new(),
            csv_metadata: Value::Null,
        }
    }

    pub fn completed(node_id: impl Into<String>, duration_ms: i64, csv_metadata: Value) -> Self {
        Self {
            node_id: node_id.into(),
            status: ExecutionStatus::Completed,
            duration_ms,
            error_message: String::new(),
            csv_metadata,
        }
    }

    pub fn failed(node_id: impl Into<String>, duration_ms: i64, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: ExecutionStatus::Failed,
            duration_ms,
            error_message: message.into(),
            csv_metadata: Value::Null,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut value = json!({
            "node_id": self.node_id,
            "status": self.status.to_string(),
        });
        match self.status {
            ExecutionStatus::Started => {}
            ExecutionStatus::Completed => {
                value["duration_ms"] = json!(self.duration_ms);
                if !self.csv_metadata.is_null() {
                    value["csv_metadata"] = self.csv_metadata.clone();
                }
            }
            ExecutionStatus::Failed => {
                value["duration_ms"] = json!(self.duration_ms);
                value["error_message"] = json!(self.error_message);
            }
        }
        value
    }
}

/// Callback invoked by the executor for each event.
pub type ExecutionCallback = Box<dyn FnMut(&ExecutionEvent)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_event_is_minimal() {
        let event = ExecutionEvent::started("node_1");
        assert_eq!(
            event.to_json(),
            json!({"node_id": "node_1", "status": "started"})
        );
    }

    #[test]
    fn failed_event_carries_message() {
        let event = ExecutionEvent::failed("node_2", 12, "boom");
        let value = event.to_json();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["duration_ms"], 12);
        assert_eq!(value["error_message"], "boom");
    }

    #[test]
    fn completed_event_includes_csv_metadata() {
        let meta = json!({"csv": {"rows": 2, "columns": ["a"]}});
        let event = ExecutionEvent::completed("node_3", 5, meta.clone());
        assert_eq!(event.to_json()["csv_metadata"], meta);
    }
}
