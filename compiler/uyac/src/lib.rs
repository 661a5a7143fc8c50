//! Uya Mini backend driver.
//!
//! Owns a compilation [`Session`] and runs units through the backend:
//! constant folding, declaration, generic instantiation, layout, interface
//! binding and body lowering, producing one
//! [`LoweredUnit`](uya_lower::LoweredUnit) per module.
//!
//! ```text
//! Module ──► fold_consts ──► lower_module ──► LoweredUnit
//!                 │                 │
//!                 └──── Session ────┘
//!        (pool, registry, instances, layouts, vtables, error ids)
//! ```
//!
//! [`compile_units`] runs units serially; [`compile_units_parallel`] folds
//! constants on the rayon pool and lowers through a [`SharedSession`].

mod error;
mod options;
mod pipeline;
mod session;

use std::sync::Once;

pub use error::CompileError;
pub use options::{CompilerOptions, TARGET_ENV};
pub use pipeline::{compile_units, compile_units_parallel, SharedSession};
pub use session::Session;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Enable with `RUST_LOG=uya_lower=debug` or
/// `RUST_LOG=uya_mono=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
