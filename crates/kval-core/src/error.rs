//! # Error Types
//!
//! Errors raised by the foundational types. Higher layers wrap these in
//! their own `thiserror` enums.

use thiserror::Error;

/// Error produced while interpreting identity metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An `apiVersion` string had more than one `/`.
    #[error("unexpected GroupVersion string: {0}")]
    InvalidGroupVersion(String),
}
