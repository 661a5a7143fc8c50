//! Pre-computed type metadata flags.
//!
//! `TypeFlags` are computed once when a type is interned, so category and
//! concreteness queries never walk the type.

use bitflags::bitflags;

use crate::TypeData;

bitflags! {
    /// Pre-computed type properties for O(1) queries.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct TypeFlags: u32 {
        // === Category Flags (bits 0-15) ===

        /// `void`
        const IS_VOID = 1 << 0;
        /// `bool`
        const IS_BOOL = 1 << 1;
        /// Any integer width, signed or unsigned.
        const IS_INTEGER = 1 << 2;
        /// `f32` / `f64`
        const IS_FLOAT = 1 << 3;
        /// Raw pointer.
        const IS_POINTER = 1 << 4;
        /// Fixed-length array.
        const IS_ARRAY = 1 << 5;
        /// Passed and stored as a multi-field aggregate.
        const IS_AGGREGATE = 1 << 6;
        /// Struct, union, enum or interface.
        const IS_NOMINAL = 1 << 7;
        /// `!T`
        const IS_ERROR_UNION = 1 << 8;
        /// `&[T]`
        const IS_SLICE = 1 << 9;
        /// `(A, B, ...)`
        const IS_TUPLE = 1 << 10;

        // === Presence Flags (bits 16-23) ===

        /// Contains an unsubstituted generic parameter.
        const HAS_PARAM = 1 << 16;
    }
}

impl TypeFlags {
    /// Flags inherited by a compound type from its children.
    pub const PROPAGATE_MASK: Self = Self::HAS_PARAM;

    /// Compute the flags of a descriptor given its children's combined flags.
    pub fn compute(data: &TypeData, child: Self) -> Self {
        let inherited = child & Self::PROPAGATE_MASK;
        let own = match data {
            TypeData::Void => Self::IS_VOID,
            TypeData::Bool => Self::IS_BOOL,
            TypeData::Int { .. } => Self::IS_INTEGER,
            TypeData::Float { .. } => Self::IS_FLOAT,
            TypeData::Pointer { .. } => Self::IS_POINTER,
            TypeData::Array { .. } => Self::IS_ARRAY | Self::IS_AGGREGATE,
            TypeData::Slice { .. } => Self::IS_SLICE | Self::IS_AGGREGATE,
            TypeData::Tuple { .. } => Self::IS_TUPLE | Self::IS_AGGREGATE,
            TypeData::Struct(_) | TypeData::Union(_) | TypeData::Interface(_) => {
                Self::IS_NOMINAL | Self::IS_AGGREGATE
            }
            TypeData::Enum(_) => Self::IS_NOMINAL,
            TypeData::ErrorUnion(_) => Self::IS_ERROR_UNION | Self::IS_AGGREGATE,
            TypeData::Param(_) => Self::HAS_PARAM,
        };
        own | inherited
    }

    /// No generic parameter anywhere inside.
    #[inline]
    pub const fn is_concrete(self) -> bool {
        !self.contains(Self::HAS_PARAM)
    }

    /// Integers, floats, bools, pointers and enums: fits one register.
    #[inline]
    pub const fn is_scalar(self) -> bool {
        !self.intersects(Self::IS_AGGREGATE.union(Self::IS_VOID))
    }
}
