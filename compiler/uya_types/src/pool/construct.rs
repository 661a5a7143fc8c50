//! Type construction helpers for the Pool.

use smallvec::SmallVec;
use uya_ir::Name;

use crate::{Idx, Pool, TypeData, TypeFlags};

impl Pool {
    /// `&T` (`mutable == false`) or `&mut T`.
    pub fn pointer(&mut self, pointee: Idx, mutable: bool) -> Idx {
        self.intern(TypeData::Pointer { pointee, mutable })
    }

    /// `[elem: len]`
    pub fn array(&mut self, elem: Idx, len: u64) -> Idx {
        self.intern(TypeData::Array { elem, len })
    }

    /// `&[elem]` (`mutable == false`) or `&mut [elem]`.
    pub fn slice(&mut self, elem: Idx, mutable: bool) -> Idx {
        self.intern(TypeData::Slice { elem, mutable })
    }

    /// `(elems...)`. The element list is stored once in the side table, so
    /// equal tuples share an index.
    pub fn tuple(&mut self, elems: &[Idx]) -> Idx {
        let key: SmallVec<[Idx; 4]> = elems.iter().copied().collect();
        if let Some(&idx) = self.tuple_map.get(&key) {
            return idx;
        }

        let child_flags = elems
            .iter()
            .fold(TypeFlags::empty(), |acc, &elem| acc | self.flags(elem));
        #[expect(
            clippy::cast_possible_truncation,
            reason = "pool never approaches u32::MAX entries"
        )]
        let data = TypeData::Tuple {
            start: self.extra.len() as u32,
            len: elems.len() as u32,
        };
        self.extra.extend_from_slice(elems);
        let idx = self.push(data, child_flags);
        self.tuple_map.insert(key, idx);
        idx
    }

    /// `!payload`
    pub fn error_union(&mut self, payload: Idx) -> Idx {
        self.intern(TypeData::ErrorUnion(payload))
    }

    pub fn struct_type(&mut self, name: Name) -> Idx {
        self.intern(TypeData::Struct(name))
    }

    pub fn union_type(&mut self, name: Name) -> Idx {
        self.intern(TypeData::Union(name))
    }

    pub fn enum_type(&mut self, name: Name) -> Idx {
        self.intern(TypeData::Enum(name))
    }

    pub fn interface_type(&mut self, name: Name) -> Idx {
        self.intern(TypeData::Interface(name))
    }

    /// Unsubstituted generic parameter `name`.
    pub fn param(&mut self, name: Name) -> Idx {
        self.intern(TypeData::Param(name))
    }
}
