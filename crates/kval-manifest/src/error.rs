//! # Document Errors
//!
//! Every failure for a single document lands in one [`DocumentError`]
//! variant. A failure never aborts the run; it is recorded against its file
//! and the next document is processed.

use kval_core::{ErrorList, Status};
use kval_schema::{DecodeError, FactoryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    /// Not YAML/JSON, or the type metadata has the wrong shape.
    #[error("failed to parse yaml: {0}")]
    Parse(String),

    #[error("GVK cannot be empty")]
    Identity,

    #[error("failed to retrieve validator: {0}")]
    Resolution(#[source] FactoryError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Field-level failures, rendered the way the API server rejects an
    /// object: `Deployment.apps "web" is invalid: [...]`.
    #[error("{} {name:?} is invalid: {errors}", qualified_kind(.group, .kind))]
    Invalid {
        group: String,
        kind: String,
        name: String,
        errors: ErrorList,
    },

    #[error("{0}")]
    Internal(String),
}

fn qualified_kind(group: &str, kind: &str) -> String {
    if group.is_empty() {
        kind.to_string()
    } else {
        format!("{kind}.{group}")
    }
}

impl DocumentError {
    /// Field errors that are not attached to a known object.
    pub fn fields(errors: ErrorList) -> Self {
        Self::Invalid {
            group: String::new(),
            kind: String::new(),
            name: String::new(),
            errors,
        }
    }

    /// Field failures become 422 `Invalid`; everything else is a 500.
    pub fn to_status(&self) -> Status {
        match self {
            Self::Invalid {
                group,
                kind,
                name,
                errors,
            } => Status::invalid(group, kind, name, errors),
            other => Status::internal(other),
        }
    }
}

/// What happened to one document of a file.
#[derive(Debug)]
pub enum DocumentOutcome {
    /// Only whitespace and comments; never validated.
    Skipped,
    Passed,
    Failed(DocumentError),
}

impl DocumentOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// `None` for skipped and passed documents.
    pub fn error(&self) -> Option<&DocumentError> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Skipped | Self::Passed => None,
        }
    }

    pub fn to_status(&self) -> Status {
        match self {
            Self::Failed(e) => e.to_status(),
            Self::Skipped | Self::Passed => Status::success(),
        }
    }
}

impl From<Result<(), DocumentError>> for DocumentOutcome {
    fn from(result: Result<(), DocumentError>) -> Self {
        match result {
            Ok(()) => Self::Passed,
            Err(e) => Self::Failed(e),
        }
    }
}
