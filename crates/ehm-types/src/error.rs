//! Unified error interface for EHM.
//!
//! Every error enum in the workspace implements [`ErrorCode`] so callers
//! can branch on a stable machine-readable code and on whether retrying
//! could help.
//!
//! # Example
//!
//! ```
//! use ehm_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum DeliveryError {
//!     Closed,
//!     Busy,
//! }
//!
//! impl ErrorCode for DeliveryError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Closed => "DELIVERY_CLOSED",
//!             Self::Busy => "DELIVERY_BUSY",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Busy)
//!     }
//! }
//!
//! assert_eq!(DeliveryError::Busy.code(), "DELIVERY_BUSY");
//! assert!(!DeliveryError::Closed.is_recoverable());
//! ```

/// Machine-readable error code plus recoverability.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**, e.g. `"EHM_INVALID_RETHROW"`
/// - **Prefixed by crate domain**: `EHM_`, `EVENT_`, `CONFIG_`
/// - **Stable**: a code is part of the API once published
///
/// # Recoverability
///
/// An error is recoverable when the caller can retry or correct the
/// input and expect success. Programming errors (re-raising outside a
/// handler, broken scope nesting) are never recoverable.
pub trait ErrorCode {
    /// Returns the machine-readable code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying or correcting input may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error code is non-empty, prefixed and UPPER_SNAKE_CASE.
///
/// # Panics
///
/// Panics with a descriptive message when any check fails. Intended for
/// tests covering every variant of an error enum.
///
/// # Example
///
/// ```
/// use ehm_types::{assert_error_code, ErrorCode};
///
/// struct Timeout;
///
/// impl ErrorCode for Timeout {
///     fn code(&self) -> &'static str { "EHM_TIMEOUT" }
///     fn is_recoverable(&self) -> bool { true }
/// }
///
/// assert_error_code(&Timeout, "EHM_");
/// ```
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Runs [`assert_error_code`] over a list of variants.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
