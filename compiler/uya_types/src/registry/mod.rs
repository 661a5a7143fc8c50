//! Nominal type registry.
//!
//! Struct, union, enum and interface names are registered here independently
//! of their bodies. A struct is `Forward` until its fields are supplied, which
//! lets declarations reference each other in any order. Methods can be
//! attached in either state.

use rustc_hash::FxHashMap;
use uya_diagnostic::ErrorCode;
use uya_ir::{Name, SharedInterner, StringInterner};

use crate::Idx;

/// A struct field: name plus resolved type, in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub name: Name,
    pub ty: Idx,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructDef {
    pub fields: Vec<FieldDef>,
    /// Interfaces the struct declares it implements.
    pub implements: Vec<Name>,
}

impl StructDef {
    pub fn field_index(&self, name: Name) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Variants of a tagged union, in source order. The tag of a variant is its
/// position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnionDef {
    pub variants: Vec<FieldDef>,
}

impl UnionDef {
    pub fn variant_index(&self, name: Name) -> Option<usize> {
        self.variants.iter().position(|v| v.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumDef {
    /// Explicit underlying integer type.
    pub underlying: Option<Idx>,
    /// Variants with their folded tag values, in source order.
    pub variants: Vec<(Name, i64)>,
}

impl EnumDef {
    pub fn tag(&self, variant: Name) -> Option<i64> {
        self.variants
            .iter()
            .find(|(name, _)| *name == variant)
            .map(|&(_, tag)| tag)
    }

    /// Integer type values of this enum are stored as.
    ///
    /// Without an explicit underlying type this is the narrowest integer that
    /// holds every tag, signed only when some tag is negative.
    pub fn repr(&self) -> Idx {
        if let Some(underlying) = self.underlying {
            return underlying;
        }
        let min = self.variants.iter().map(|&(_, t)| t).min().unwrap_or(0);
        let max = self.variants.iter().map(|&(_, t)| t).max().unwrap_or(0);
        if min < 0 {
            if min >= i64::from(i8::MIN) && max <= i64::from(i8::MAX) {
                Idx::I8
            } else if min >= i64::from(i16::MIN) && max <= i64::from(i16::MAX) {
                Idx::I16
            } else if min >= i64::from(i32::MIN) && max <= i64::from(i32::MAX) {
                Idx::I32
            } else {
                Idx::I64
            }
        } else if max <= i64::from(u8::MAX) {
            Idx::U8
        } else if max <= i64::from(u16::MAX) {
            Idx::U16
        } else if max <= i64::from(u32::MAX) {
            Idx::U32
        } else {
            Idx::U64
        }
    }
}

/// Two-phase declaration state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclState<T> {
    Forward,
    Complete(T),
}

impl<T> DeclState<T> {
    pub fn complete(&self) -> Option<&T> {
        match self {
            Self::Forward => None,
            Self::Complete(body) => Some(body),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Concrete function signature. For methods `params` excludes `self`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FnSig {
    pub params: Vec<Idx>,
    pub ret: Idx,
}

/// A method attached to a struct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDef {
    pub name: Name,
    /// Emitted symbol, `uya_<Type>_<method>`.
    pub symbol: Name,
    pub sig: FnSig,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NominalKind {
    Struct,
    Union,
    Enum,
    Interface,
}

impl NominalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::Union => "union",
            Self::Enum => "enum",
            Self::Interface => "interface",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("`{name}` is defined more than once")]
    DuplicateDefinition { name: String },

    #[error("`{name}` is already declared as {existing}")]
    KindConflict { name: String, existing: &'static str },

    #[error("cannot attach methods to unknown type `{name}`")]
    UnknownType { name: String },
}

impl RegistryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateDefinition { .. } | Self::KindConflict { .. } => ErrorCode::E6011,
            Self::UnknownType { .. } => ErrorCode::E2003,
        }
    }
}

/// Registry of nominal types for one session.
#[derive(Clone)]
pub struct TypeRegistry {
    interner: SharedInterner,
    kinds: FxHashMap<Name, NominalKind>,
    structs: FxHashMap<Name, DeclState<StructDef>>,
    /// Struct names in first-declaration order.
    struct_order: Vec<Name>,
    unions: FxHashMap<Name, DeclState<UnionDef>>,
    union_order: Vec<Name>,
    enums: FxHashMap<Name, EnumDef>,
    methods: FxHashMap<Name, Vec<MethodDef>>,
}

impl TypeRegistry {
    pub fn new(interner: SharedInterner) -> Self {
        Self {
            interner,
            kinds: FxHashMap::default(),
            structs: FxHashMap::default(),
            struct_order: Vec::new(),
            unions: FxHashMap::default(),
            union_order: Vec::new(),
            enums: FxHashMap::default(),
            methods: FxHashMap::default(),
        }
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    fn claim(&mut self, name: Name, kind: NominalKind) -> Result<(), RegistryError> {
        match self.kinds.get(&name) {
            Some(&existing) if existing != kind => Err(RegistryError::KindConflict {
                name: self.interner.lookup(name).to_owned(),
                existing: existing.as_str(),
            }),
            Some(_) => Ok(()),
            None => {
                self.kinds.insert(name, kind);
                Ok(())
            }
        }
    }

    fn duplicate(&self, name: Name) -> RegistryError {
        RegistryError::DuplicateDefinition {
            name: self.interner.lookup(name).to_owned(),
        }
    }

    // === Structs ===

    /// Declare a struct without a body. Re-declaring is harmless.
    pub fn declare_struct(&mut self, name: Name) -> Result<(), RegistryError> {
        self.claim(name, NominalKind::Struct)?;
        if !self.structs.contains_key(&name) {
            self.structs.insert(name, DeclState::Forward);
            self.struct_order.push(name);
        }
        Ok(())
    }

    /// Supply the body of a struct, completing a forward declaration.
    pub fn define_struct(&mut self, name: Name, def: StructDef) -> Result<(), RegistryError> {
        self.declare_struct(name)?;
        match self.structs.get_mut(&name) {
            Some(state @ DeclState::Forward) => {
                *state = DeclState::Complete(def);
                Ok(())
            }
            _ => Err(self.duplicate(name)),
        }
    }

    pub fn struct_state(&self, name: Name) -> Option<&DeclState<StructDef>> {
        self.structs.get(&name)
    }

    pub fn struct_def(&self, name: Name) -> Option<&StructDef> {
        self.structs.get(&name).and_then(DeclState::complete)
    }

    /// Struct names in first-declaration order.
    pub fn struct_names(&self) -> &[Name] {
        &self.struct_order
    }

    /// Forget a struct and its methods entirely.
    pub fn remove_struct(&mut self, name: Name) {
        if self.structs.remove(&name).is_some() {
            self.struct_order.retain(|&n| n != name);
            self.kinds.remove(&name);
            self.methods.remove(&name);
        }
    }

    // === Unions ===

    /// Declare a union without variants. Re-declaring is harmless.
    pub fn declare_union(&mut self, name: Name) -> Result<(), RegistryError> {
        self.claim(name, NominalKind::Union)?;
        if !self.unions.contains_key(&name) {
            self.unions.insert(name, DeclState::Forward);
            self.union_order.push(name);
        }
        Ok(())
    }

    pub fn define_union(&mut self, name: Name, def: UnionDef) -> Result<(), RegistryError> {
        self.declare_union(name)?;
        match self.unions.get_mut(&name) {
            Some(state @ DeclState::Forward) => {
                *state = DeclState::Complete(def);
                Ok(())
            }
            _ => Err(self.duplicate(name)),
        }
    }

    pub fn union_def(&self, name: Name) -> Option<&UnionDef> {
        self.unions.get(&name).and_then(DeclState::complete)
    }

    /// Union names in first-declaration order.
    pub fn union_names(&self) -> &[Name] {
        &self.union_order
    }

    // === Enums ===

    pub fn define_enum(&mut self, name: Name, def: EnumDef) -> Result<(), RegistryError> {
        self.claim(name, NominalKind::Enum)?;
        if self.enums.contains_key(&name) {
            return Err(self.duplicate(name));
        }
        self.enums.insert(name, def);
        Ok(())
    }

    pub fn enum_def(&self, name: Name) -> Option<&EnumDef> {
        self.enums.get(&name)
    }

    // === Interfaces ===

    /// Record an interface name. Method tables are owned by the interface
    /// lowering pass.
    pub fn declare_interface(&mut self, name: Name) -> Result<(), RegistryError> {
        self.claim(name, NominalKind::Interface)
    }

    // === Lookup ===

    pub fn kind(&self, name: Name) -> Option<NominalKind> {
        self.kinds.get(&name).copied()
    }

    // === Methods ===

    /// Attach a method to a struct in either declaration state.
    pub fn attach_method(
        &mut self,
        target: Name,
        name: Name,
        sig: FnSig,
    ) -> Result<&MethodDef, RegistryError> {
        if self.kind(target) != Some(NominalKind::Struct) {
            return Err(RegistryError::UnknownType {
                name: self.interner.lookup(target).to_owned(),
            });
        }
        if self.method(target, name).is_some() {
            let qualified = format!(
                "{}.{}",
                self.interner.lookup(target),
                self.interner.lookup(name)
            );
            return Err(RegistryError::DuplicateDefinition { name: qualified });
        }
        let symbol = self.interner.intern(&format!(
            "uya_{}_{}",
            self.interner.lookup(target),
            self.interner.lookup(name)
        ));
        tracing::trace!(symbol = self.interner.lookup(symbol), "attach method");
        let methods = self.methods.entry(target).or_default();
        methods.push(MethodDef { name, symbol, sig });
        Ok(&methods[methods.len() - 1])
    }

    pub fn method(&self, target: Name, name: Name) -> Option<&MethodDef> {
        self.methods
            .get(&target)
            .and_then(|methods| methods.iter().find(|m| m.name == name))
    }

    pub fn methods(&self, target: Name) -> &[MethodDef] {
        self.methods.get(&target).map_or(&[], Vec::as_slice)
    }
}
