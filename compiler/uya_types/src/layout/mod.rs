//! Struct, union, enum and aggregate layout.
//!
//! Layout follows the platform C rules: every field is placed at the next
//! offset aligned to its own alignment, the aggregate's alignment is the
//! maximum field alignment (at least 1), and its size is the extent rounded
//! up to that alignment. An empty struct occupies one byte.
//!
//! A tagged union is `{ u32 tag; storage }`, where the storage is as large and
//! as aligned as its largest and most aligned variant. A slice is a pointer
//! followed by a `usize` length.
//!
//! Results are memoized per [`Idx`]. A struct or union that contains itself by
//! value (directly, or through other aggregates) has no finite layout and is
//! reported with the cycle path. Pointers and slices break cycles.

use rustc_hash::FxHashMap;
use uya_diagnostic::ErrorCode;
use uya_ir::Name;

use crate::stack::ensure_sufficient_stack;
use crate::{Idx, TypeData, TypeEnv, TypeFlags};

/// Size, alignment and field offsets of a concrete type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutInfo {
    pub size: u64,
    pub align: u64,
    /// Byte offset of each field in source order. Empty for scalars.
    pub field_offsets: Vec<u64>,
}

impl LayoutInfo {
    pub fn scalar(size: u64, align: u64) -> Self {
        Self {
            size,
            align,
            field_offsets: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("type `{ty}` contains itself by value: {}", path.join(" -> "))]
    RecursiveWithoutIndirection { ty: String, path: Vec<String> },

    #[error("type `{name}` is declared but never defined")]
    IncompleteType { name: String },

    #[error("type `{ty}` still contains a generic parameter")]
    NonConcrete { ty: String },

    #[error("size of `{ty}` overflows")]
    Overflow { ty: String },

    #[error("`void` cannot be stored by value in `{ty}`")]
    Unsized { ty: String },
}

impl LayoutError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RecursiveWithoutIndirection { .. } => ErrorCode::E1001,
            Self::IncompleteType { .. } => ErrorCode::E1002,
            Self::NonConcrete { .. } => ErrorCode::E1003,
            Self::Overflow { .. } => ErrorCode::E1004,
            Self::Unsized { .. } => ErrorCode::E1005,
        }
    }
}

/// Memoizing layout calculator.
#[derive(Clone, Debug, Default)]
pub struct LayoutEngine {
    cache: FxHashMap<Idx, LayoutInfo>,
    /// Structs and unions whose members are being laid out, outermost first.
    in_progress: Vec<Name>,
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute (or fetch) the layout of `idx`.
    pub fn resolve(&mut self, env: TypeEnv<'_>, idx: Idx) -> Result<LayoutInfo, LayoutError> {
        if let Some(hit) = self.cache.get(&idx) {
            return Ok(hit.clone());
        }
        let info = ensure_sufficient_stack(|| self.compute(env, idx))?;
        self.cache.insert(idx, info.clone());
        Ok(info)
    }

    pub fn size_of(&mut self, env: TypeEnv<'_>, idx: Idx) -> Result<u64, LayoutError> {
        self.resolve(env, idx).map(|l| l.size)
    }

    pub fn align_of(&mut self, env: TypeEnv<'_>, idx: Idx) -> Result<u64, LayoutError> {
        self.resolve(env, idx).map(|l| l.align)
    }

    /// Number of memoized layouts.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn compute(&mut self, env: TypeEnv<'_>, idx: Idx) -> Result<LayoutInfo, LayoutError> {
        let display = || env.pool.display(idx, env.registry.interner());
        if !env.pool.flags(idx).is_concrete() {
            return Err(LayoutError::NonConcrete { ty: display() });
        }

        let word = env.target.pointer_size();
        match *env.pool.data(idx) {
            TypeData::Void => Ok(LayoutInfo::scalar(0, 1)),
            TypeData::Bool => Ok(LayoutInfo::scalar(1, 1)),
            TypeData::Int { width, .. } => {
                let size = width.bytes(word);
                Ok(LayoutInfo::scalar(size, scalar_align(env, size)))
            }
            TypeData::Float { width } => {
                let size = match width {
                    crate::FloatWidth::F32 => 4,
                    crate::FloatWidth::F64 => 8,
                };
                Ok(LayoutInfo::scalar(size, scalar_align(env, size)))
            }
            TypeData::Pointer { .. } => Ok(LayoutInfo::scalar(word, word)),
            TypeData::Slice { .. } | TypeData::Interface(_) => Ok(LayoutInfo {
                size: 2 * word,
                align: word,
                field_offsets: vec![0, word],
            }),
            TypeData::Array { elem, len } => {
                let elem_layout = self.resolve_stored(env, elem, idx)?;
                let size = elem_layout
                    .size
                    .checked_mul(len)
                    .ok_or_else(|| LayoutError::Overflow { ty: display() })?;
                Ok(LayoutInfo::scalar(size, elem_layout.align))
            }
            TypeData::ErrorUnion(payload) => {
                if env.pool.flags(payload).contains(TypeFlags::IS_VOID) {
                    return Ok(LayoutInfo {
                        size: 4,
                        align: 4,
                        field_offsets: vec![0],
                    });
                }
                let payload_layout = self.resolve_stored(env, payload, idx)?;
                aggregate(&[LayoutInfo::scalar(4, 4), payload_layout])
                    .ok_or_else(|| LayoutError::Overflow { ty: display() })
            }
            TypeData::Enum(name) => {
                let def = env.registry.enum_def(name).ok_or_else(|| {
                    LayoutError::IncompleteType {
                        name: env.registry.interner().lookup(name).to_owned(),
                    }
                })?;
                let repr = def.repr();
                self.resolve(env, repr)
            }
            TypeData::Tuple { .. } => {
                let elems = env.pool.tuple_elems(idx).unwrap_or_default();
                if elems.is_empty() {
                    return Ok(LayoutInfo::scalar(1, 1));
                }
                let elems: Result<Vec<LayoutInfo>, LayoutError> = elems
                    .iter()
                    .map(|&elem| self.resolve_stored(env, elem, idx))
                    .collect();
                aggregate(&elems?).ok_or_else(|| LayoutError::Overflow { ty: display() })
            }
            TypeData::Struct(name) => self.struct_layout(env, idx, name),
            TypeData::Union(name) => self.union_layout(env, idx, name),
            TypeData::Param(_) => Err(LayoutError::NonConcrete { ty: display() }),
        }
    }

    fn struct_layout(
        &mut self,
        env: TypeEnv<'_>,
        idx: Idx,
        name: Name,
    ) -> Result<LayoutInfo, LayoutError> {
        let interner = env.registry.interner();
        self.check_cycle(env, name)?;

        let def = env
            .registry
            .struct_def(name)
            .ok_or_else(|| LayoutError::IncompleteType {
                name: interner.lookup(name).to_owned(),
            })?;
        if def.fields.is_empty() {
            return Ok(LayoutInfo::scalar(1, 1));
        }

        self.in_progress.push(name);
        let fields: Result<Vec<LayoutInfo>, LayoutError> = def
            .fields
            .iter()
            .map(|field| self.resolve_stored(env, field.ty, idx))
            .collect();
        self.in_progress.pop();

        aggregate(&fields?).ok_or_else(|| LayoutError::Overflow {
            ty: interner.lookup(name).to_owned(),
        })
    }

    fn union_layout(
        &mut self,
        env: TypeEnv<'_>,
        idx: Idx,
        name: Name,
    ) -> Result<LayoutInfo, LayoutError> {
        let interner = env.registry.interner();
        self.check_cycle(env, name)?;

        let def = env
            .registry
            .union_def(name)
            .ok_or_else(|| LayoutError::IncompleteType {
                name: interner.lookup(name).to_owned(),
            })?;

        self.in_progress.push(name);
        let variants: Result<Vec<LayoutInfo>, LayoutError> = def
            .variants
            .iter()
            .map(|variant| self.resolve_stored(env, variant.ty, idx))
            .collect();
        self.in_progress.pop();

        let overflow = || LayoutError::Overflow {
            ty: interner.lookup(name).to_owned(),
        };
        let variants = variants?;
        let align = variants.iter().map(|v| v.align).max().unwrap_or(1);
        let size = variants
            .iter()
            .map(|v| v.size)
            .max()
            .unwrap_or(0)
            .checked_next_multiple_of(align)
            .ok_or_else(overflow)?;
        aggregate(&[LayoutInfo::scalar(4, 4), LayoutInfo::scalar(size, align)])
            .ok_or_else(overflow)
    }

    /// Fails when `name` is already being laid out further up the stack.
    fn check_cycle(&self, env: TypeEnv<'_>, name: Name) -> Result<(), LayoutError> {
        let interner = env.registry.interner();
        let Some(start) = self.in_progress.iter().position(|&n| n == name) else {
            return Ok(());
        };
        let mut path: Vec<String> = self.in_progress[start..]
            .iter()
            .map(|&n| interner.lookup(n).to_owned())
            .collect();
        path.push(interner.lookup(name).to_owned());
        Err(LayoutError::RecursiveWithoutIndirection {
            ty: interner.lookup(self.in_progress[start]).to_owned(),
            path,
        })
    }

    /// Layout of a type stored by value inside `container`.
    fn resolve_stored(
        &mut self,
        env: TypeEnv<'_>,
        ty: Idx,
        container: Idx,
    ) -> Result<LayoutInfo, LayoutError> {
        if env.pool.flags(ty).contains(TypeFlags::IS_VOID) {
            return Err(LayoutError::Unsized {
                ty: env.pool.display(container, env.registry.interner()),
            });
        }
        self.resolve(env, ty)
    }
}

/// 8-byte scalars are under-aligned on some targets.
fn scalar_align(env: TypeEnv<'_>, size: u64) -> u64 {
    if size == 8 {
        env.target.wide_scalar_align()
    } else {
        size.max(1)
    }
}

/// Place `fields` in order with C rules. `None` on overflow.
pub fn aggregate(fields: &[LayoutInfo]) -> Option<LayoutInfo> {
    let mut offset: u64 = 0;
    let mut align: u64 = 1;
    let mut field_offsets = Vec::with_capacity(fields.len());
    for field in fields {
        offset = offset.checked_next_multiple_of(field.align)?;
        field_offsets.push(offset);
        offset = offset.checked_add(field.size)?;
        align = align.max(field.align);
    }
    Some(LayoutInfo {
        size: offset.checked_next_multiple_of(align)?,
        align,
        field_offsets,
    })
}
