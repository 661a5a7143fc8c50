//! Multi-unit pipelines.
//!
//! Units are always lowered in input order against one session, which keeps
//! generic instances, layouts and error ids identical between the serial and
//! parallel pipelines. The parallel pipeline only overlaps constant folding,
//! which reads nothing but the constants of earlier units.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use uya_ir::Module;
use uya_lower::LoweredUnit;

use crate::session::fold_with;
use crate::{CompileError, Session};

/// Compile `modules` in order, stopping at the first failing unit.
#[tracing::instrument(level = "debug", skip_all, fields(units = modules.len()))]
pub fn compile_units(
    session: &mut Session,
    modules: &[Module],
) -> Result<Vec<LoweredUnit>, CompileError> {
    modules
        .iter()
        .map(|module| session.compile_unit(module))
        .collect()
}

/// Thread-safe handle to a session with a single writer.
pub struct SharedSession(Arc<parking_lot::Mutex<Session>>);

impl SharedSession {
    pub fn new(session: Session) -> Self {
        SharedSession(Arc::new(parking_lot::Mutex::new(session)))
    }

    /// Exclusive access to the session.
    pub fn lock(&self) -> parking_lot::MutexGuard<'_, Session> {
        self.0.lock()
    }
}

impl Clone for SharedSession {
    fn clone(&self) -> Self {
        SharedSession(Arc::clone(&self.0))
    }
}

impl fmt::Debug for SharedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let session = self.0.lock();
        write!(
            f,
            "SharedSession(units_compiled: {})",
            session.units_compiled()
        )
    }
}

/// Compile `modules`, folding their constants in parallel.
///
/// Each unit is folded against the constants known when the pipeline
/// starts, with the names that earlier units of the batch declare hidden.
/// A unit that refers to one of those is refolded once the earlier units
/// have been lowered, so results match [`compile_units`].
#[tracing::instrument(level = "debug", skip_all, fields(units = modules.len()))]
pub fn compile_units_parallel(
    session: &SharedSession,
    modules: &[Module],
) -> Result<Vec<LoweredUnit>, CompileError> {
    let (known, interner) = {
        let session = session.lock();
        (session.consts().clone(), session.interner().clone())
    };

    let folded: Vec<_> = modules
        .par_iter()
        .enumerate()
        .map(|(i, module)| {
            let earlier = modules[..i]
                .iter()
                .flat_map(|m| m.consts().map(|c| c.name));
            fold_with(module, &known, earlier, &interner)
        })
        .collect();

    let mut units = Vec::with_capacity(modules.len());
    for (module, folded) in modules.iter().zip(folded) {
        let mut session = session.lock();
        let table = match folded {
            Ok(table) => table,
            Err(_) => {
                tracing::trace!(
                    unit = interner.lookup(module.name),
                    "refolding against earlier units"
                );
                session.fold_consts(module)?
            }
        };
        units.push(session.lower_folded(module, table)?);
    }
    Ok(units)
}
