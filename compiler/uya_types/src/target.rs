//! Target configuration.
//!
//! Layout and calling-convention decisions depend on the target's word size
//! and ABI family. Target triples follow the format
//! `<arch>-<vendor>-<os>[-<env>]`:
//!
//! - `x86_64-unknown-linux-gnu` - System V x86-64, 8-byte words
//! - `i686-unknown-linux-gnu` - System V i386, 4-byte words
//! - `wasm32-unknown-unknown` - 4-byte words, no aggregate C ABI support

use std::fmt;

use uya_diagnostic::ErrorCode;

/// Error type for target configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    /// Target triple is not in the supported list.
    #[error("unsupported target '{triple}'. Supported targets: {}", supported.join(", "))]
    UnsupportedTarget {
        triple: String,
        supported: Vec<&'static str>,
    },
    /// Invalid target triple format.
    #[error("invalid target triple '{triple}': {reason}")]
    InvalidTripleFormat { triple: String, reason: String },
}

impl TargetError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::E5001
    }
}

/// Supported target triples.
pub const SUPPORTED_TARGETS: &[&str] = &[
    // Linux
    "x86_64-unknown-linux-gnu",
    "x86_64-unknown-linux-musl",
    "i686-unknown-linux-gnu",
    "aarch64-unknown-linux-gnu",
    // macOS
    "x86_64-apple-darwin",
    "aarch64-apple-darwin",
    // WebAssembly
    "wasm32-unknown-unknown",
];

/// Parsed components of a target triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTripleComponents {
    /// CPU architecture (e.g., `x86_64`, `i686`, `wasm32`)
    pub arch: String,
    /// Hardware vendor (e.g., `unknown`, `apple`)
    pub vendor: String,
    /// Operating system (e.g., `linux`, `darwin`)
    pub os: String,
    /// Environment/ABI (e.g., `gnu`, `musl`) - optional
    pub env: Option<String>,
}

impl TargetTripleComponents {
    /// Parse a target triple string into components.
    pub fn parse(triple: &str) -> Result<Self, TargetError> {
        let parts: Vec<&str> = triple.split('-').collect();

        if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(TargetError::InvalidTripleFormat {
                triple: triple.to_string(),
                reason: "expected at least 3 components: <arch>-<vendor>-<os>".to_string(),
            });
        }

        Ok(Self {
            arch: parts[0].to_string(),
            vendor: parts[1].to_string(),
            os: parts[2].to_string(),
            env: parts.get(3).map(|s| (*s).to_string()),
        })
    }

    #[must_use]
    pub fn is_wasm(&self) -> bool {
        self.arch == "wasm32" || self.arch == "wasm64"
    }

    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}

impl fmt::Display for TargetTripleComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.arch, self.vendor, self.os)?;
        if let Some(env) = &self.env {
            write!(f, "-{env}")?;
        }
        Ok(())
    }
}

/// Target configuration for layout and ABI lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    triple: String,
    components: TargetTripleComponents,
}

impl TargetConfig {
    /// Configuration for the host the compiler runs on.
    pub fn native() -> Result<Self, TargetError> {
        let triple = match (std::env::consts::ARCH, std::env::consts::OS) {
            ("x86_64", "macos") => "x86_64-apple-darwin",
            ("aarch64", "macos") => "aarch64-apple-darwin",
            ("x86_64", _) => "x86_64-unknown-linux-gnu",
            ("x86", _) => "i686-unknown-linux-gnu",
            ("aarch64", _) => "aarch64-unknown-linux-gnu",
            ("wasm32", _) => "wasm32-unknown-unknown",
            (arch, os) => {
                return Err(TargetError::UnsupportedTarget {
                    triple: format!("{arch}-unknown-{os}"),
                    supported: SUPPORTED_TARGETS.to_vec(),
                })
            }
        };
        Self::from_triple(triple)
    }

    /// Create a configuration from a target triple string.
    pub fn from_triple(triple: &str) -> Result<Self, TargetError> {
        let components = TargetTripleComponents::parse(triple)?;

        if !SUPPORTED_TARGETS.contains(&triple) {
            return Err(TargetError::UnsupportedTarget {
                triple: triple.to_string(),
                supported: SUPPORTED_TARGETS.to_vec(),
            });
        }

        Ok(Self {
            triple: triple.to_string(),
            components,
        })
    }

    /// System V x86-64 Linux, the reference target.
    pub fn x86_64_linux() -> Self {
        Self {
            triple: "x86_64-unknown-linux-gnu".to_string(),
            components: TargetTripleComponents {
                arch: "x86_64".to_string(),
                vendor: "unknown".to_string(),
                os: "linux".to_string(),
                env: Some("gnu".to_string()),
            },
        }
    }

    #[must_use]
    pub fn triple(&self) -> &str {
        &self.triple
    }

    #[must_use]
    pub fn components(&self) -> &TargetTripleComponents {
        &self.components
    }

    /// Pointer size in bytes.
    #[must_use]
    pub fn pointer_size(&self) -> u64 {
        match self.components.arch.as_str() {
            "wasm32" | "i686" | "i386" | "arm" => 4,
            _ => 8,
        }
    }

    /// Alignment of 8-byte scalars (`i64`, `u64`, `f64`) inside aggregates.
    ///
    /// The i386 System V ABI aligns them to 4.
    #[must_use]
    pub fn wide_scalar_align(&self) -> u64 {
        match self.components.arch.as_str() {
            "i686" | "i386" => 4,
            _ => 8,
        }
    }

    /// Aggregates are classified with the System V x86-64 eightbyte rules.
    #[must_use]
    pub fn is_sysv_x86_64(&self) -> bool {
        self.components.arch == "x86_64" && !self.components.is_windows()
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self::x86_64_linux()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_triple_linux() {
        let components = TargetTripleComponents::parse("x86_64-unknown-linux-gnu");
        assert_eq!(
            components,
            Ok(TargetTripleComponents {
                arch: "x86_64".to_string(),
                vendor: "unknown".to_string(),
                os: "linux".to_string(),
                env: Some("gnu".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_triple_too_short() {
        assert!(matches!(
            TargetTripleComponents::parse("x86_64-linux"),
            Err(TargetError::InvalidTripleFormat { .. })
        ));
    }

    #[test]
    fn test_unsupported_triple() {
        let err = TargetConfig::from_triple("riscv64-unknown-linux-gnu");
        assert!(matches!(err, Err(TargetError::UnsupportedTarget { .. })));
    }

    #[test]
    fn test_word_sizes() {
        let x64 = TargetConfig::default();
        assert_eq!(x64.pointer_size(), 8);
        assert!(x64.is_sysv_x86_64());

        let Ok(x86) = TargetConfig::from_triple("i686-unknown-linux-gnu") else {
            panic!("i686 must be supported");
        };
        assert_eq!(x86.pointer_size(), 4);
        assert_eq!(x86.wide_scalar_align(), 4);
        assert!(!x86.is_sysv_x86_64());
    }

    #[test]
    fn test_default_matches_parsed() {
        assert_eq!(
            TargetConfig::from_triple("x86_64-unknown-linux-gnu"),
            Ok(TargetConfig::x86_64_linux())
        );
    }
}
