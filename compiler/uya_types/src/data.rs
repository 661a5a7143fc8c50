//! Structural type descriptors stored in the pool.

use uya_ir::Name;

use crate::Idx;

/// Integer width. `Ptr` is the target word size (`usize`/`isize`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    Ptr,
}

impl IntWidth {
    /// Width in bytes for a given target word size.
    pub const fn bytes(self, pointer_bytes: u64) -> u64 {
        match self {
            Self::W8 => 1,
            Self::W16 => 2,
            Self::W32 => 4,
            Self::W64 => 8,
            Self::Ptr => pointer_bytes,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

/// A type descriptor.
///
/// Nominal types (`Struct`, `Enum`, `Interface`) carry only their name; their
/// bodies live in the [`TypeRegistry`](crate::TypeRegistry) so a type can be
/// referenced before it is defined.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    Void,
    Bool,
    Int { width: IntWidth, signed: bool },
    Float { width: FloatWidth },
    Pointer { pointee: Idx, mutable: bool },
    Array { elem: Idx, len: u64 },
    /// `&[T]`, laid out as `{ T *ptr; usize len }`.
    Slice { elem: Idx, mutable: bool },
    /// `(A, B, ...)`. Elements live in the pool's side table at
    /// `start..start + len`; see [`Pool::tuple_elems`](crate::Pool::tuple_elems).
    Tuple { start: u32, len: u32 },
    Struct(Name),
    /// Tagged union, laid out as `{ u32 tag; <largest variant storage> }`.
    Union(Name),
    Enum(Name),
    Interface(Name),
    /// `!T`, laid out as `{ u32 error_id; T value }`.
    ErrorUnion(Idx),
    /// Unsubstituted generic parameter. Never concrete.
    Param(Name),
}

impl TypeData {
    /// Descriptor of a pre-interned primitive index.
    pub fn primitive(idx: Idx) -> Option<Self> {
        let int = |width, signed| Self::Int { width, signed };
        Some(match idx.raw() {
            0 => Self::Void,
            1 => Self::Bool,
            2 => int(IntWidth::W8, true),
            3 => int(IntWidth::W16, true),
            4 => int(IntWidth::W32, true),
            5 => int(IntWidth::W64, true),
            6 => int(IntWidth::W8, false),
            7 => int(IntWidth::W16, false),
            8 => int(IntWidth::W32, false),
            9 => int(IntWidth::W64, false),
            10 => int(IntWidth::Ptr, true),
            11 => int(IntWidth::Ptr, false),
            12 => Self::Float {
                width: FloatWidth::F32,
            },
            13 => Self::Float {
                width: FloatWidth::F64,
            },
            _ => return None,
        })
    }

    /// The single child type of a compound descriptor, if any. Tuples have
    /// several and are handled by the pool directly.
    pub fn child(&self) -> Option<Idx> {
        match *self {
            Self::Pointer { pointee, .. } => Some(pointee),
            Self::Array { elem, .. } | Self::Slice { elem, .. } => Some(elem),
            Self::ErrorUnion(payload) => Some(payload),
            _ => None,
        }
    }

    /// Name of a nominal type.
    pub fn nominal_name(&self) -> Option<Name> {
        match *self {
            Self::Struct(name) | Self::Union(name) | Self::Enum(name) | Self::Interface(name) => {
                Some(name)
            }
            _ => None,
        }
    }
}
