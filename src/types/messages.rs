//! NATS message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PlanningConfig, RouteSegment, TimelineEntry};
use crate::services::preview::PreviewResult;

/// Generic request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> Request<T> {
    pub fn new(payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Generic success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(request_id: Uuid, payload: T) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(request_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Full-trip build request: the planning input from the plan-management
/// layer — ordered segments plus the global scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanBuildRequest {
    pub plan_id: i64,
    pub segments: Vec<RouteSegment>,
    #[serde(default)]
    pub config: PlanningConfig,
}

/// Per-segment outcome of a build; a failed segment never hides its
/// siblings' results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentOutcome {
    pub segment_id: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<TimelineEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanBuildResponse {
    pub plan_id: i64,
    pub segments: Vec<SegmentOutcome>,
}

/// Manual-edit surface payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewInsertRequest {
    pub plan_id: i64,
    pub segment_id: i64,
    pub hotspot_id: i64,
    #[serde(default)]
    pub config: PlanningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInsertRequest {
    pub plan_id: i64,
    pub segment_id: i64,
    pub hotspot_id: i64,
    /// Fingerprint returned by the matching preview; a mismatch at
    /// commit time means the timeline changed underneath the caller.
    pub snapshot: String,
    #[serde(default)]
    pub config: PlanningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRemoveRequest {
    pub plan_id: i64,
    pub segment_id: i64,
    pub entry_id: i64,
    #[serde(default)]
    pub config: PlanningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    pub committed: bool,
    pub preview: PreviewResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_defaults_config() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000001",
            "timestamp": "2026-08-01T08:00:00Z",
            "payload": {"planId": 7, "segments": []}
        }"#;
        let request: Request<PlanBuildRequest> = serde_json::from_str(json).unwrap();
        assert_eq!(request.payload.plan_id, 7);
        assert_eq!(request.payload.config.refresh_minutes, 60);
    }

    #[test]
    fn test_error_response_shape() {
        let response = ErrorResponse::new(Uuid::nil(), "STALE_TIMELINE", "re-preview required");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"code\":\"STALE_TIMELINE\""));
        assert!(!json.contains("details"));
    }
}
