//! Trigger surface contract: shared-secret check and status mapping.
//!
//! Any front end (the CLI, or an HTTP shell embedding the core) turns a pass
//! outcome into a [`TriggerResponse`] and maps its status onto its own
//! protocol: HTTP 200/403/500, or process exit codes 0/3/1.

use serde::Serialize;
use serde_json::{json, Value};

use crate::scheduler::ScheduleReport;
use crate::sync::{PassResult, SyncReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    Ok,
    Forbidden,
    Failed,
}

impl TriggerStatus {
    pub fn http_status(&self) -> u16 {
        match self {
            TriggerStatus::Ok => 200,
            TriggerStatus::Forbidden => 403,
            TriggerStatus::Failed => 500,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            TriggerStatus::Ok => 0,
            TriggerStatus::Failed => 1,
            TriggerStatus::Forbidden => 3,
        }
    }
}

/// Status plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerResponse {
    pub status: TriggerStatus,
    pub body: Value,
}

impl TriggerResponse {
    pub fn forbidden() -> Self {
        Self {
            status: TriggerStatus::Forbidden,
            body: json!({ "status": "error", "message": "Forbidden" }),
        }
    }

    /// `{"status": "success", ...counters}` with 200, or the error body with 500.
    pub fn from_pass<T: Serialize>(result: &PassResult<T>) -> Self {
        let status = if result.is_success() {
            TriggerStatus::Ok
        } else {
            TriggerStatus::Failed
        };
        Self {
            status,
            body: to_body(result),
        }
    }

    /// Combined pull+push: 200 only when both passes succeeded.
    pub fn from_sync(report: &SyncReport) -> Self {
        let status = if report.is_success() {
            TriggerStatus::Ok
        } else {
            TriggerStatus::Failed
        };
        Self {
            status,
            body: to_body(report),
        }
    }
}

fn to_body<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| json!({ "status": "error", "message": e.to_string() }))
}

/// A missing expected key rejects every request.
pub fn authorize(provided: Option<&str>, expected: Option<&str>) -> bool {
    match (provided, expected) {
        (Some(provided), Some(expected)) => !expected.is_empty() && provided == expected,
        _ => false,
    }
}

/// Check the key, then run the scheduling pass.
pub fn schedule<F>(provided: Option<&str>, expected: Option<&str>, run: F) -> TriggerResponse
where
    F: FnOnce() -> PassResult<ScheduleReport>,
{
    if !authorize(provided, expected) {
        tracing::warn!("scheduling trigger rejected: bad or missing key");
        return TriggerResponse::forbidden();
    }
    TriggerResponse::from_pass(&run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{PullReport, PushReport};
    use chrono::Utc;

    #[test]
    fn test_status_mapping() {
        assert_eq!(TriggerStatus::Ok.http_status(), 200);
        assert_eq!(TriggerStatus::Forbidden.http_status(), 403);
        assert_eq!(TriggerStatus::Failed.http_status(), 500);
        assert_eq!(TriggerStatus::Forbidden.exit_code(), 3);
    }

    #[test]
    fn test_authorize() {
        assert!(authorize(Some("k"), Some("k")));
        assert!(!authorize(Some("x"), Some("k")));
        assert!(!authorize(None, Some("k")));
        assert!(!authorize(None, None));
        assert!(!authorize(Some(""), Some("")));
    }

    #[test]
    fn test_schedule_rejects_before_running() {
        let mut ran = false;
        let resp = schedule(Some("wrong"), Some("k"), || {
            ran = true;
            PassResult::Success(ScheduleReport::default())
        });
        assert!(!ran);
        assert_eq!(resp.status.http_status(), 403);
    }

    #[test]
    fn test_schedule_runs_with_key() {
        let resp = schedule(Some("k"), Some("k"), || {
            PassResult::Success(ScheduleReport {
                assigned: 2,
                unscheduled: vec![],
            })
        });
        assert_eq!(resp.status, TriggerStatus::Ok);
        assert_eq!(resp.body["status"], "success");
        assert_eq!(resp.body["assigned"], 2);
    }

    #[test]
    fn test_pass_error_is_500() {
        let result: PassResult<PushReport> = PassResult::Error {
            message: "boom".into(),
        };
        let resp = TriggerResponse::from_pass(&result);
        assert_eq!(resp.status.http_status(), 500);
        assert_eq!(resp.body, json!({ "status": "error", "message": "boom" }));
    }

    #[test]
    fn test_sync_needs_both_passes() {
        let report = SyncReport {
            pull: PassResult::Success(PullReport { added: 1, updated: 0 }),
            push: PassResult::Error {
                message: "quota".into(),
            },
            timestamp: Utc::now(),
        };
        let resp = TriggerResponse::from_sync(&report);
        assert_eq!(resp.status, TriggerStatus::Failed);
        assert_eq!(resp.body["sync"]["added"], 1);
        assert_eq!(resp.body["push"]["message"], "quota");
    }
}
