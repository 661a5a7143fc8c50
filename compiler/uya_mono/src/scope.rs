use rustc_hash::FxHashMap;
use uya_ir::Name;
use uya_types::Idx;

/// Type parameters visible while resolving a type expression.
///
/// A parameter can be declared without a binding (inside a generic
/// definition that is not being instantiated); resolving it then fails
/// instead of silently producing a non-concrete type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    bindings: FxHashMap<Name, Idx>,
    declared: Vec<Name>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope binding `params[i]` to `args[i]`.
    pub fn bind_all(params: &[Name], args: &[Idx]) -> Self {
        Self {
            bindings: params.iter().copied().zip(args.iter().copied()).collect(),
            declared: params.to_vec(),
        }
    }

    /// Scope declaring `params` without binding them.
    pub fn declare(params: &[Name]) -> Self {
        Self {
            bindings: FxHashMap::default(),
            declared: params.to_vec(),
        }
    }

    pub fn get(&self, name: Name) -> Option<Idx> {
        self.bindings.get(&name).copied()
    }

    pub fn is_declared(&self, name: Name) -> bool {
        self.declared.contains(&name)
    }

    /// Bindings in parameter order.
    pub fn bindings(&self) -> impl Iterator<Item = (Name, Idx)> + '_ {
        self.declared
            .iter()
            .filter_map(|&p| self.bindings.get(&p).map(|&ty| (p, ty)))
    }
}
