use uya_diagnostic::ErrorCode;
use uya_types::{ConstError, RegistryError};

/// Errors raised while resolving types or instantiating generics.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GenericError {
    #[error("`{name}` expects {expected} type argument(s), found {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("type parameter `{param}` is not bound here")]
    UnresolvedTypeParam { param: String },

    #[error("unknown type `{name}`")]
    UnknownType { name: String },

    #[error("instantiating `{name}` exceeds the nesting limit of {limit}")]
    DepthLimit { name: String, limit: u32 },

    #[error("instance name `{name}` already names a different definition")]
    NameCollision { name: String },

    #[error("`{name}` is not generic")]
    NotGeneric { name: String },

    #[error(transparent)]
    Const(#[from] ConstError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl GenericError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ArityMismatch { .. } => ErrorCode::E2001,
            Self::UnresolvedTypeParam { .. } => ErrorCode::E2002,
            Self::UnknownType { .. } => ErrorCode::E2003,
            Self::DepthLimit { .. } => ErrorCode::E2004,
            Self::NameCollision { .. } => ErrorCode::E2005,
            Self::NotGeneric { .. } => ErrorCode::E2006,
            Self::Const(e) => e.code(),
            Self::Registry(e) => e.code(),
        }
    }
}
