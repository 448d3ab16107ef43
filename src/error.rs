/* src/error.rs */

use thiserror::Error;

/// Result type alias for operations that may fail with `RealIpError`.
pub type Result<T> = std::result::Result<T, RealIpError>;

/// Errors that can occur while building a resolver from configuration.
///
/// Request processing itself never fails: an unusable candidate is skipped
/// and an unresolved request is passed through or denied by policy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RealIpError {
    /// A rule names an empty header.
    #[error("Empty header name in `{field}`")]
    EmptyHeaderName { field: &'static str },

    /// A rule names something that is not a valid HTTP header name.
    #[error("Invalid header name in `{field}`: {name:?}")]
    InvalidHeaderName { field: &'static str, name: String },
}
