//! # API Status Records
//!
//! The machine-readable report emits one `Status` per document, using the
//! same shape and taxonomy as API server responses so that tooling which
//! already understands admission failures can consume it unchanged.

use serde::{Deserialize, Serialize};

use crate::field::ErrorList;

/// Overall outcome of a status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusOutcome {
    Success,
    Failure,
}

/// Machine-distinguishable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusReason {
    /// The document failed field-level validation.
    Invalid,
    /// The tool or its environment failed.
    InternalError,
}

/// One machine-readable cause, typically one field error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCause {
    #[serde(rename = "reason", default, skip_serializing_if = "Option::is_none")]
    pub cause_type: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<StatusCause>,
}

/// Outcome of validating one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub status: StatusOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<StatusReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<StatusDetails>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub code: u16,
}

fn is_zero(code: &u16) -> bool {
    *code == 0
}

impl Status {
    pub fn success() -> Self {
        Self {
            metadata: serde_json::Map::new(),
            status: StatusOutcome::Success,
            message: None,
            reason: None,
            details: None,
            code: 0,
        }
    }

    /// A 422 `Invalid` status with one cause per field error.
    ///
    /// `group` / `kind` / `name` identify the object when known and may be
    /// empty.
    pub fn invalid(group: &str, kind: &str, name: &str, errors: &ErrorList) -> Self {
        let qualified = match (kind.is_empty(), group.is_empty()) {
            (true, _) => String::new(),
            (false, true) => kind.to_string(),
            (false, false) => format!("{kind}.{group}"),
        };
        let causes = errors
            .iter()
            .map(|e| StatusCause {
                cause_type: Some(e.error_type.cause_type().to_string()),
                message: e.body(),
                field: e.field.to_string(),
            })
            .collect();
        Self {
            metadata: serde_json::Map::new(),
            status: StatusOutcome::Failure,
            message: Some(format!("{qualified} {name:?} is invalid: {errors}")),
            reason: Some(StatusReason::Invalid),
            details: Some(StatusDetails {
                name: name.to_string(),
                group: group.to_string(),
                kind: kind.to_string(),
                causes,
            }),
            code: 422,
        }
    }

    /// A 500 `InternalError` status.
    pub fn internal(message: impl std::fmt::Display) -> Self {
        let message = message.to_string();
        Self {
            metadata: serde_json::Map::new(),
            status: StatusOutcome::Failure,
            message: Some(format!("Internal error occurred: {message}")),
            reason: Some(StatusReason::InternalError),
            details: Some(StatusDetails {
                causes: vec![StatusCause {
                    cause_type: None,
                    message,
                    field: String::new(),
                }],
                ..StatusDetails::default()
            }),
            code: 500,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StatusOutcome::Success
    }
}
