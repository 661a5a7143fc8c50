//! Hash-consed type pool.
//!
//! Each distinct [`TypeData`] is stored once; interning the same descriptor
//! twice yields the same [`Idx`]. Flags are computed at interning time.

mod construct;
mod format;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{Idx, IntWidth, TypeData, TypeFlags};

/// Type pool shared by every pass of a session.
#[derive(Clone, Debug)]
pub struct Pool {
    items: Vec<TypeData>,
    flags: Vec<TypeFlags>,
    intern_map: FxHashMap<TypeData, Idx>,
    /// Element lists of tuple types, referenced by `TypeData::Tuple`.
    extra: Vec<Idx>,
    tuple_map: FxHashMap<SmallVec<[Idx; 4]>, Idx>,
}

impl Pool {
    /// Create a pool with the primitive types at their fixed indices.
    pub fn new() -> Self {
        let mut pool = Self {
            items: Vec::with_capacity(256),
            flags: Vec::with_capacity(256),
            intern_map: FxHashMap::default(),
            extra: Vec::new(),
            tuple_map: FxHashMap::default(),
        };

        for raw in 0..Idx::PRIMITIVE_COUNT {
            if let Some(data) = TypeData::primitive(Idx::from_raw(raw)) {
                pool.intern(data);
            }
        }
        debug_assert_eq!(pool.items.len(), Idx::PRIMITIVE_COUNT as usize);
        pool
    }

    /// Intern a descriptor, returning the existing index if already present.
    pub fn intern(&mut self, data: TypeData) -> Idx {
        if let Some(&idx) = self.intern_map.get(&data) {
            return idx;
        }

        let child_flags = data
            .child()
            .map_or(TypeFlags::empty(), |child| self.flags(child));
        self.push(data, child_flags)
    }

    fn push(&mut self, data: TypeData, child_flags: TypeFlags) -> Idx {
        let flags = TypeFlags::compute(&data, child_flags);

        #[expect(
            clippy::cast_possible_truncation,
            reason = "pool never approaches u32::MAX entries"
        )]
        let idx = Idx::from_raw(self.items.len() as u32);
        self.items.push(data);
        self.flags.push(flags);
        self.intern_map.insert(data, idx);
        idx
    }

    /// Descriptor of an interned type.
    #[inline]
    pub fn data(&self, idx: Idx) -> &TypeData {
        &self.items[idx.raw() as usize]
    }

    /// Pre-computed flags of an interned type.
    #[inline]
    pub fn flags(&self, idx: Idx) -> TypeFlags {
        self.flags[idx.raw() as usize]
    }

    /// Number of interned types, primitives included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Width and signedness of an integer type.
    pub fn int_info(&self, idx: Idx) -> Option<(IntWidth, bool)> {
        match *self.data(idx) {
            TypeData::Int { width, signed } => Some((width, signed)),
            _ => None,
        }
    }

    /// Payload of an error union.
    pub fn error_union_payload(&self, idx: Idx) -> Option<Idx> {
        match *self.data(idx) {
            TypeData::ErrorUnion(payload) => Some(payload),
            _ => None,
        }
    }

    /// Element types of a tuple.
    pub fn tuple_elems(&self, idx: Idx) -> Option<&[Idx]> {
        match *self.data(idx) {
            TypeData::Tuple { start, len } => {
                Some(&self.extra[start as usize..(start + len) as usize])
            }
            _ => None,
        }
    }

    /// Element type and mutability of a slice.
    pub fn slice_elem(&self, idx: Idx) -> Option<(Idx, bool)> {
        match *self.data(idx) {
            TypeData::Slice { elem, mutable } => Some((elem, mutable)),
            _ => None,
        }
    }

    /// Pointee of a pointer type.
    pub fn pointee(&self, idx: Idx) -> Option<Idx> {
        match *self.data(idx) {
            TypeData::Pointer { pointee, .. } => Some(pointee),
            _ => None,
        }
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}
