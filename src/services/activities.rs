//! Activities: handles for long-running server-side operations.

use crate::resource::{ApiBase, Entity, Schema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Activity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    /// Waiting to start.
    #[default]
    Pending,
    /// Running.
    InProgress,
    /// Finished.
    Complete,
    /// Cancelling.
    Cancelling,
    /// Scheduled for later.
    Scheduled,
    /// Unrecognized state.
    #[serde(other)]
    Unknown,
}

/// Activity result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityResult {
    /// Completed successfully.
    Success,
    /// Failed.
    Failure,
    /// Unrecognized result.
    #[serde(other)]
    Unknown,
}

/// A long-running operation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Activity {
    /// Activity ID.
    #[serde(default)]
    pub id: String,
    /// Activity type, e.g. `environment.branch`.
    #[serde(default, rename = "type")]
    pub activity_type: String,
    /// Current state.
    #[serde(default)]
    pub state: ActivityState,
    /// Outcome once complete.
    #[serde(default)]
    pub result: Option<ActivityResult>,
    /// Progress in percent.
    #[serde(default)]
    pub completion_percent: u8,
    /// Project ID.
    #[serde(default)]
    pub project: String,
    /// Affected environments.
    #[serde(default)]
    pub environments: Vec<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Activity log.
    #[serde(default)]
    pub log: Option<String>,
    /// Type-specific payload.
    #[serde(default)]
    pub payload: Option<Value>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Completion time.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Activity {
    /// Returns true once the activity finished.
    pub fn is_complete(&self) -> bool {
        self.state == ActivityState::Complete
    }

    /// Returns true if the activity finished successfully.
    pub fn is_success(&self) -> bool {
        self.is_complete() && self.result == Some(ActivityResult::Success)
    }
}

impl Entity for Activity {
    const SCHEMA: Schema = Schema::new(ApiBase::Api, "/projects/:projectId/activities/:id");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_activity() {
        let activity: Activity = serde_json::from_value(json!({
            "id": "act1",
            "type": "environment.branch",
            "state": "complete",
            "result": "success",
            "completion_percent": 100,
            "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(activity.activity_type, "environment.branch");
        assert!(activity.is_success());
    }

    #[test]
    fn test_unknown_state() {
        let activity: Activity =
            serde_json::from_value(json!({"id": "a", "state": "staged"})).unwrap();
        assert_eq!(activity.state, ActivityState::Unknown);
        assert!(!activity.is_complete());
    }
}
