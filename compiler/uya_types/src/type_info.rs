//! Builtin reflection record.
//!
//! `@type_info(T)` evaluates to a constant `TypeInfo` struct describing `T`.
//! The `TypeInfo` struct itself is registered as an ordinary struct in every
//! session, so its layout comes from the same engine as user types.

use uya_ir::Name;

use crate::layout::{LayoutEngine, LayoutError};
use crate::{FieldDef, Idx, Pool, RegistryError, StructDef, TypeData, TypeEnv, TypeFlags, TypeRegistry};

/// Name of the builtin reflection struct.
pub const TYPE_INFO: &str = "TypeInfo";

/// Value of the `kind` field.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TypeKind {
    Void = 0,
    Integer = 1,
    Float = 2,
    Bool = 3,
    Pointer = 4,
    Array = 5,
    Struct = 6,
    Enum = 7,
    Interface = 8,
    ErrorUnion = 9,
    Slice = 10,
    Tuple = 11,
    Union = 12,
}

/// Contents of a `TypeInfo` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeInfoRecord {
    pub name: String,
    pub size: i32,
    pub align: i32,
    pub kind: TypeKind,
    pub is_integer: bool,
    pub is_float: bool,
    pub is_bool: bool,
    pub is_pointer: bool,
    pub is_array: bool,
    pub is_void: bool,
}

/// Register the `TypeInfo` struct:
/// `{ name: &i8, size: i32, align: i32, kind: i32, is_integer .. is_void: bool }`.
pub fn register_type_info(pool: &mut Pool, registry: &mut TypeRegistry) -> Result<Idx, RegistryError> {
    let interner = registry.interner();
    let name = interner.intern(TYPE_INFO);
    let field = |n: &str, ty: Idx| FieldDef {
        name: interner.intern(n),
        ty,
    };
    let name_ptr = pool.pointer(Idx::I8, false);
    let fields = vec![
        field("name", name_ptr),
        field("size", Idx::I32),
        field("align", Idx::I32),
        field("kind", Idx::I32),
        field("is_integer", Idx::BOOL),
        field("is_float", Idx::BOOL),
        field("is_bool", Idx::BOOL),
        field("is_pointer", Idx::BOOL),
        field("is_array", Idx::BOOL),
        field("is_void", Idx::BOOL),
    ];
    registry.define_struct(
        name,
        StructDef {
            fields,
            implements: Vec::new(),
        },
    )?;
    Ok(pool.struct_type(name))
}

/// Build the reflection record for `idx`.
pub fn describe(
    engine: &mut LayoutEngine,
    env: TypeEnv<'_>,
    idx: Idx,
) -> Result<TypeInfoRecord, LayoutError> {
    let layout = engine.resolve(env, idx)?;
    let name = env.pool.display(idx, env.registry.interner());
    let overflow = || LayoutError::Overflow { ty: name.clone() };
    let size = i32::try_from(layout.size).map_err(|_| overflow())?;
    let align = i32::try_from(layout.align).map_err(|_| overflow())?;

    let flags = env.pool.flags(idx);
    let kind = kind_of(env.pool.data(idx));
    Ok(TypeInfoRecord {
        size,
        align,
        kind,
        is_integer: flags.contains(TypeFlags::IS_INTEGER),
        is_float: flags.contains(TypeFlags::IS_FLOAT),
        is_bool: flags.contains(TypeFlags::IS_BOOL),
        is_pointer: flags.contains(TypeFlags::IS_POINTER),
        is_array: flags.contains(TypeFlags::IS_ARRAY),
        is_void: flags.contains(TypeFlags::IS_VOID),
        name,
    })
}

fn kind_of(data: &TypeData) -> TypeKind {
    match data {
        TypeData::Void | TypeData::Param(_) => TypeKind::Void,
        TypeData::Int { .. } => TypeKind::Integer,
        TypeData::Float { .. } => TypeKind::Float,
        TypeData::Bool => TypeKind::Bool,
        TypeData::Pointer { .. } => TypeKind::Pointer,
        TypeData::Array { .. } => TypeKind::Array,
        TypeData::Slice { .. } => TypeKind::Slice,
        TypeData::Tuple { .. } => TypeKind::Tuple,
        TypeData::Struct(_) => TypeKind::Struct,
        TypeData::Union(_) => TypeKind::Union,
        TypeData::Enum(_) => TypeKind::Enum,
        TypeData::Interface(_) => TypeKind::Interface,
        TypeData::ErrorUnion(_) => TypeKind::ErrorUnion,
    }
}

/// Interned name of the builtin struct.
pub fn type_info_name(registry: &TypeRegistry) -> Name {
    registry.interner().intern(TYPE_INFO)
}
