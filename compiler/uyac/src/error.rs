//! Top-level compilation errors.

use uya_diagnostic::Diagnostic;
use uya_lower::UnitError;
use uya_types::{RegistryError, TargetError};

/// Why a session could not be set up or a unit could not be compiled.
///
/// Unit failures are fatal to that unit; no partial output is produced.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Registering the builtin types failed.
    #[error("session setup failed: {0}")]
    Setup(#[from] RegistryError),

    #[error("unit `{unit}`: {error}")]
    Unit {
        unit: String,
        #[source]
        error: UnitError,
    },
}

impl CompileError {
    pub fn unit(unit: impl Into<String>, error: impl Into<UnitError>) -> Self {
        Self::Unit {
            unit: unit.into(),
            error: error.into(),
        }
    }

    /// Render as a diagnostic attached to the failing declaration.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Target(e) => Diagnostic::error(e.code()).with_message(e.to_string()),
            Self::Setup(e) => Diagnostic::error(e.code())
                .with_message(e.to_string())
                .with_note("while registering builtin types"),
            Self::Unit { unit, error } => {
                let diag = Diagnostic::error(error.code()).with_message(error.error.to_string());
                let diag = match &error.subject {
                    Some(subject) => diag.with_subject(subject.clone()),
                    None => diag,
                };
                diag.with_note(format!("in compilation unit `{unit}`"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use uya_diagnostic::ErrorCode;
    use uya_lower::LowerError;

    use super::*;

    #[test]
    fn test_unit_error_diagnostic() {
        let err = CompileError::unit(
            "main",
            UnitError::new(
                "f",
                LowerError::UnknownLocal {
                    name: "y".to_owned(),
                },
            ),
        );
        assert_eq!(err.to_string(), "unit `main`: in `f`: unknown local `y`");

        let diag = err.to_diagnostic();
        assert_eq!(diag.code, ErrorCode::E6001);
        assert_eq!(diag.message, "unknown local `y`");
        assert_eq!(diag.subject.as_deref(), Some("f"));
        assert_eq!(diag.notes, vec!["in compilation unit `main`".to_owned()]);
    }

    #[test]
    fn test_target_error_diagnostic() {
        let err = CompileError::from(TargetError::InvalidTripleFormat {
            triple: "x86".to_owned(),
            reason: "too short".to_owned(),
        });
        let diag = err.to_diagnostic();
        assert_eq!(diag.code, ErrorCode::E5001);
        assert!(diag.is_error());
        assert_eq!(diag.subject, None);
    }
}
