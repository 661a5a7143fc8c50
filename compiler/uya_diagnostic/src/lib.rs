//! Diagnostics for the Uya Mini backend.
//!
//! Every backend error converts into a [`Diagnostic`] carrying a stable
//! [`ErrorCode`] so failures are searchable and testable independent of
//! message wording.

mod diagnostic;
mod error_code;

pub use diagnostic::{Diagnostic, Severity};
pub use error_code::ErrorCode;
