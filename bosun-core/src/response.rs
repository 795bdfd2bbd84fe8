//! Generic api response types
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error response from the API
///
/// This is the structured payload of a non-success status; servers return it
/// as a `Status` document and watch streams embed it in error events.
#[derive(Error, Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
#[error("{message}: {reason}")]
pub struct ErrorResponse {
    /// The status
    #[serde(default)]
    pub status: String,
    /// A message about the error
    #[serde(default)]
    pub message: String,
    /// The reason for the error
    #[serde(default)]
    pub reason: String,
    /// The error code
    pub code: u16,
    /// Extended data associated with the reason.
    ///
    /// Each reason may define its own extended details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<StatusDetails>,
}

/// A status object returned for mutating operations
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Status {
    /// Status of the operation: `Success` or `Failure`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusSummary>,

    /// Suggested HTTP return code (0 if unset)
    #[serde(default, skip_serializing_if = "is_u16_zero")]
    pub code: u16,

    /// A human-readable description of the status of this operation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// A machine-readable description of why this operation is in the `Failure` status
    ///
    /// If this value is empty there is no information available.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Extended data associated with the reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<StatusDetails>,
}

impl Status {
    /// Checks if this `Status` represents success
    ///
    /// Note that it is possible for `Status` to be in an indeterminate state
    /// when both `is_success` and `is_failure` return false.
    pub fn is_success(&self) -> bool {
        self.status == Some(StatusSummary::Success)
    }

    /// Checks if this `Status` represents failure
    pub fn is_failure(&self) -> bool {
        self.status == Some(StatusSummary::Failure)
    }
}

/// Overall status of an operation
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub enum StatusSummary {
    /// Operation succeeded
    Success,
    /// Operation failed
    Failure,
}

/// Additional properties a server may set to describe a response
///
/// Clients must ignore fields that do not match the defined type of each
/// attribute, and should assume that any attribute may be empty, invalid, or
/// under defined.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetails {
    /// The Causes array includes more details associated with the failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causes: Option<Vec<StatusCause>>,

    /// The group attribute of the resource associated with the status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// The kind attribute of the resource associated with the status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// The name attribute of the resource associated with the status
    /// (when there is a single name which can be described)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// If specified, the time in seconds before the operation should be retried
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<i32>,

    /// UID of the resource (when there is a single resource which can be described)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// More information about a `Status` failure
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCause {
    /// The field of the resource that has caused this error, as named by its JSON serialization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    /// A human-readable description of the cause of the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// A machine-readable description of the cause of the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn is_u16_zero(&v: &u16) -> bool {
    v == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = r#"
    {
      "kind": "Status",
      "apiVersion": "v1",
      "metadata": {},
      "status": "Failure",
      "message": "pods \"missing\" not found",
      "reason": "NotFound",
      "details": {
        "name": "missing",
        "kind": "pods"
      },
      "code": 404
    }
    "#;

    #[test]
    fn error_response_parses_status_document() {
        let err: ErrorResponse = serde_json::from_str(STATUS).unwrap();
        assert_eq!(err.code, 404);
        assert_eq!(err.reason, "NotFound");
        assert_eq!(err.details.unwrap().name.unwrap(), "missing");
    }

    #[test]
    fn status_summary_accessors() {
        let status: Status = serde_json::from_str(STATUS).unwrap();
        assert!(status.is_failure());
        assert!(!status.is_success());
    }
}
