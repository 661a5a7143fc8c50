//! Session configuration.

use uya_types::{TargetConfig, TargetError};

/// Environment variable naming the target triple for [`CompilerOptions::from_env`].
pub const TARGET_ENV: &str = "UYA_TARGET";

/// Options fixed for the lifetime of a [`Session`](crate::Session).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Layout and calling-convention target.
    pub target: TargetConfig,
    /// Register the builtin `TypeInfo` struct so `@type_info(T)` can be
    /// lowered.
    pub emit_type_info: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            target: TargetConfig::x86_64_linux(),
            emit_type_info: true,
        }
    }
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for the host, or for `UYA_TARGET` when it is set.
    pub fn from_env() -> Result<Self, TargetError> {
        let target = match std::env::var(TARGET_ENV) {
            Ok(triple) if !triple.is_empty() => TargetConfig::from_triple(&triple)?,
            _ => TargetConfig::native()?,
        };
        Ok(Self::default().with_target(target))
    }

    #[must_use]
    pub fn with_target(mut self, target: TargetConfig) -> Self {
        self.target = target;
        self
    }

    /// Select the target by triple.
    pub fn with_triple(self, triple: &str) -> Result<Self, TargetError> {
        Ok(self.with_target(TargetConfig::from_triple(triple)?))
    }

    #[must_use]
    pub fn with_type_info(mut self, emit: bool) -> Self {
        self.emit_type_info = emit;
        self
    }
}
