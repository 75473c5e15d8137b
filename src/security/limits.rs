//! Request size limits.
//!
//! The declared `Content-Length` is checked before the body is read. Bodies
//! without a declared length are bounded later by the body-limit layer and
//! surface as a failed body read in the handler.

use crate::error::GateError;

pub fn check_body_size(declared: Option<u64>, max_bytes: u64) -> Result<(), GateError> {
    match declared {
        Some(actual) if actual > max_bytes => Err(GateError::PayloadTooLarge {
            limit: max_bytes,
            actual: Some(actual),
        }),
        _ => Ok(()),
    }
}
