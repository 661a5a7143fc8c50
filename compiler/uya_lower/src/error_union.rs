//! Error ids and error-union bookkeeping.
//!
//! A fallible function returning `!T` returns `{ u32 error_id; T value; }`
//! (`{ u32 error_id; }` for `!void`). `error_id == 0` means success; every
//! error name maps to a stable nonzero id derived from its spelling, so ids
//! agree across compilation units without coordination.
//!
//! The control-flow side (`try`, `catch`, `for`) lives in the body lowerer.

use rustc_hash::FxHashMap;
use uya_ir::{Name, StringInterner};

use crate::LowerError;

/// Error id of `error.<name>`: djb2 over the bytes of `name`, with 0 (which
/// means success) remapped to 1.
pub fn error_id(name: &str) -> u32 {
    let hash = name
        .bytes()
        .fold(5381u32, |h, b| h.wrapping_mul(33).wrapping_add(u32::from(b)));
    if hash == 0 {
        1
    } else {
        hash
    }
}

/// Program-wide error name to id table.
#[derive(Clone, Debug, Default)]
pub struct ErrorIdTable {
    ids: FxHashMap<Name, u32>,
    owners: FxHashMap<u32, Name>,
    order: Vec<Name>,
}

impl ErrorIdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `name`, assigning it on first use.
    pub fn intern(&mut self, name: Name, interner: &StringInterner) -> Result<u32, LowerError> {
        if let Some(&id) = self.ids.get(&name) {
            return Ok(id);
        }
        let id = error_id(interner.lookup(name));
        if let Some(&owner) = self.owners.get(&id) {
            return Err(LowerError::ErrorIdCollision {
                first: interner.lookup(owner).to_owned(),
                second: interner.lookup(name).to_owned(),
                id,
            });
        }
        tracing::trace!(name = interner.lookup(name), id, "error id");
        self.ids.insert(name, id);
        self.owners.insert(id, name);
        self.order.push(name);
        Ok(id)
    }

    pub fn get(&self, name: Name) -> Option<u32> {
        self.ids.get(&name).copied()
    }

    /// Assigned ids in first-use order.
    pub fn entries(&self) -> Vec<(Name, u32)> {
        self.order.iter().map(|&n| (n, self.ids[&n])).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn djb2_values() {
        assert_eq!(error_id(""), 5381);
        assert_eq!(error_id("a"), 5381 * 33 + 97);
        assert_eq!(error_id("NotFound"), error_id("NotFound"));
        assert_ne!(error_id("NotFound"), error_id("Timeout"));
    }

    #[test]
    fn ids_are_never_zero() {
        for name in ["x", "Overflow", "EndOfStream", "InvalidInput"] {
            assert_ne!(error_id(name), 0);
        }
    }

    #[test]
    fn table_is_stable_and_ordered() {
        let interner = StringInterner::new();
        let mut table = ErrorIdTable::new();
        let a = interner.intern("Timeout");
        let b = interner.intern("NotFound");

        let id_a = table.intern(a, &interner).unwrap();
        let id_b = table.intern(b, &interner).unwrap();
        assert_eq!(table.intern(a, &interner).unwrap(), id_a);
        assert_eq!(table.entries(), vec![(a, id_a), (b, id_b)]);
        assert_eq!(table.get(b), Some(error_id("NotFound")));
    }

    #[test]
    fn colliding_names_are_rejected() {
        // "Ez" and "FY" collide under djb2: 'E'*33 + 'z' == 'F'*33 + 'Y'.
        let interner = StringInterner::new();
        let mut table = ErrorIdTable::new();
        assert_eq!(error_id("Ez"), error_id("FY"));

        table.intern(interner.intern("Ez"), &interner).unwrap();
        let err = table.intern(interner.intern("FY"), &interner).unwrap_err();
        assert!(matches!(err, LowerError::ErrorIdCollision { .. }));
    }
}
