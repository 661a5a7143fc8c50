//! Type index handle.
//!
//! Every type lives in the [`Pool`](crate::Pool) and is referred to by a
//! 32-bit `Idx`. Primitive types have fixed indices so they can be named
//! without a pool; type identity is index equality.

use std::fmt;

/// A 32-bit index into the type pool.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Idx(u32);

impl Idx {
    // === Primitive Types (indices 0-13) ===
    // Pre-interned at pool creation in this order.

    /// `void`
    pub const VOID: Self = Self(0);
    /// `bool`
    pub const BOOL: Self = Self(1);
    pub const I8: Self = Self(2);
    pub const I16: Self = Self(3);
    pub const I32: Self = Self(4);
    pub const I64: Self = Self(5);
    /// `u8`, also spelled `byte`.
    pub const U8: Self = Self(6);
    pub const U16: Self = Self(7);
    pub const U32: Self = Self(8);
    pub const U64: Self = Self(9);
    /// Pointer-sized signed integer.
    pub const ISIZE: Self = Self(10);
    /// Pointer-sized unsigned integer.
    pub const USIZE: Self = Self(11);
    pub const F32: Self = Self(12);
    pub const F64: Self = Self(13);

    /// Number of pre-interned primitive types.
    pub const PRIMITIVE_COUNT: u32 = 14;

    /// Sentinel value indicating no type.
    pub const NONE: Self = Self(u32::MAX);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::PRIMITIVE_COUNT
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    /// Source spelling of a primitive, `None` for pool-allocated types.
    #[inline]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("void"),
            1 => Some("bool"),
            2 => Some("i8"),
            3 => Some("i16"),
            4 => Some("i32"),
            5 => Some("i64"),
            6 => Some("u8"),
            7 => Some("u16"),
            8 => Some("u32"),
            9 => Some("u64"),
            10 => Some("isize"),
            11 => Some("usize"),
            12 => Some("f32"),
            13 => Some("f64"),
            _ => None,
        }
    }

    /// Look up a primitive by its source spelling.
    pub fn from_primitive_name(name: &str) -> Option<Self> {
        let idx = match name {
            "void" => Self::VOID,
            "bool" => Self::BOOL,
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "u8" | "byte" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            "isize" => Self::ISIZE,
            "usize" => Self::USIZE,
            "f32" => Self::F32,
            "f64" => Self::F64,
            _ => return None,
        };
        Some(idx)
    }
}

impl fmt::Debug for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Idx::{}", name.to_ascii_uppercase()),
            None if self.is_none() => write!(f, "Idx::NONE"),
            None => write!(f, "Idx({})", self.0),
        }
    }
}

impl fmt::Display for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None if self.is_none() => write!(f, "<none>"),
            None => write!(f, "type#{}", self.0),
        }
    }
}

const _: () = assert!(std::mem::size_of::<Idx>() == 4);
