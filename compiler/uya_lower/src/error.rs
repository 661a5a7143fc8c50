use std::fmt;

use uya_diagnostic::ErrorCode;
use uya_mono::GenericError;
use uya_types::{ConstError, LayoutError, RegistryError};

use crate::abi::AbiError;
use crate::interface::InterfaceError;

/// Errors raised while lowering declarations and function bodies.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    #[error("unknown local `{name}`")]
    UnknownLocal { name: String },

    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },

    #[error("`{ty}` has no field `{field}`")]
    UnknownField { ty: String, field: String },

    #[error("enum `{enum_name}` has no variant `{variant}`")]
    UnknownVariant { enum_name: String, variant: String },

    #[error("`try` used in `{function}`, which does not return an error union")]
    TryOutsideFallible { function: String },

    #[error("error names `{first}` and `{second}` share the error id {id}")]
    ErrorIdCollision {
        first: String,
        second: String,
        id: u32,
    },

    #[error("array index must be an integer, found `{found}`")]
    NonIntegerIndex { found: String },

    #[error("expected `{expected}`, found `{found}`")]
    TypeMismatch { expected: String, found: String },

    #[error("`{callee}` takes {expected} argument(s), {found} supplied")]
    ArgCount {
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("unsupported operation: {detail}")]
    UnsupportedOperation { detail: String },

    #[error("`{function}` reads an error-union payload without checking its error id")]
    UncheckedPayloadRead { function: String },

    #[error("`{name}` is defined more than once")]
    DuplicateDefinition { name: String },

    #[error("`{keyword}` outside of a loop")]
    OutsideLoop { keyword: &'static str },

    #[error("`{keyword}` cannot leave a `defer` body")]
    ExitFromDefer { keyword: &'static str },

    #[error(transparent)]
    Generic(#[from] GenericError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Interface(#[from] InterfaceError),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Const(#[from] ConstError),
}

impl LowerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownLocal { .. } => ErrorCode::E6001,
            Self::UnknownFunction { .. } => ErrorCode::E6002,
            Self::UnknownField { .. } | Self::UnknownVariant { .. } => ErrorCode::E6003,
            Self::TryOutsideFallible { .. } => ErrorCode::E6004,
            Self::ErrorIdCollision { .. } => ErrorCode::E6005,
            Self::NonIntegerIndex { .. } => ErrorCode::E6006,
            Self::TypeMismatch { .. } => ErrorCode::E6007,
            Self::ArgCount { .. } => ErrorCode::E6008,
            Self::UnsupportedOperation { .. } => ErrorCode::E6009,
            Self::UncheckedPayloadRead { .. } => ErrorCode::E6010,
            Self::DuplicateDefinition { .. } => ErrorCode::E6011,
            Self::OutsideLoop { .. } => ErrorCode::E6012,
            Self::ExitFromDefer { .. } => ErrorCode::E6013,
            Self::Generic(e) => e.code(),
            Self::Layout(e) => e.code(),
            Self::Interface(e) => e.code(),
            Self::Abi(e) => e.code(),
            Self::Registry(e) => e.code(),
            Self::Const(e) => e.code(),
        }
    }
}

/// A [`LowerError`] together with the declaration being processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitError {
    pub subject: Option<String>,
    pub error: LowerError,
}

impl UnitError {
    pub fn new(subject: impl Into<String>, error: impl Into<LowerError>) -> Self {
        Self {
            subject: Some(subject.into()),
            error: error.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.error.code()
    }
}

impl From<LowerError> for UnitError {
    fn from(error: LowerError) -> Self {
        Self {
            subject: None,
            error,
        }
    }
}

impl fmt::Display for UnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "in `{subject}`: {}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for UnitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
