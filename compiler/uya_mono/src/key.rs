//! Identities of generic definitions and their instances.

use smallvec::SmallVec;
use uya_types::Idx;

/// Index of a generic definition in the [`Instantiator`](crate::Instantiator).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericDefId(pub(crate) u32);

/// Index of a concrete instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConcreteDefId(pub(crate) u32);

impl ConcreteDefId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Memoization key: one concrete definition per (definition, arguments).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstantiationKey {
    pub def: GenericDefId,
    pub args: SmallVec<[Idx; 4]>,
}
