//! Interfaces, fat pointers and vtables.
//!
//! An interface value is a fat pointer `{ vtable, data }`. The vtable is a
//! struct of function pointers, one per method of the *flattened* interface:
//! embedded interfaces expand in place, in declaration order, and identical
//! duplicates collapse into the first slot. Calling method `m` through an
//! interface calls `vtable[slot(m)](data, args...)`.
//!
//! Implementer bindings `(interface, struct)` are requested while lowering
//! and finalized only once all method blocks of the unit are attached, so
//! the implementer may be forward-declared or have its methods defined
//! after the coercion that needs the vtable.

use rustc_hash::{FxHashMap, FxHashSet};
use uya_diagnostic::ErrorCode;
use uya_ir::{Name, StringInterner};
use uya_types::{DeclState, FnSig, Pool, TypeRegistry};

/// A method slot of a flattened interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceMethod {
    pub name: Name,
    /// Signature without the receiver.
    pub sig: FnSig,
}

/// Member of an interface declaration with resolved types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedMember {
    Embed(Name),
    Method(InterfaceMethod),
}

/// Constant vtable instance `uya_vtable_<Iface>_<Type>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vtable {
    pub symbol: Name,
    pub interface: Name,
    pub implementer: Name,
    /// Method symbols in slot order.
    pub entries: Vec<Name>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InterfaceError {
    #[error("`{implementer}` does not implement `{method}` required by `{interface}`")]
    MissingMethod {
        method: String,
        implementer: String,
        interface: String,
    },

    #[error("`{interface}` inherits method `{method}` with conflicting signatures")]
    AmbiguousComposition { interface: String, method: String },

    #[error(
        "`{implementer}.{method}` has signature `{found}`, but `{interface}` requires `{expected}`"
    )]
    SignatureMismatch {
        method: String,
        implementer: String,
        interface: String,
        expected: String,
        found: String,
    },

    #[error("unknown interface `{name}`")]
    UnknownInterface { name: String },

    #[error("interface `{interface}` has no method `{method}`")]
    UnknownMethod { method: String, interface: String },

    #[error("`{implementer}` is declared but never defined, so it cannot implement `{interface}`")]
    IncompleteImplementer {
        implementer: String,
        interface: String,
    },

    #[error("interface `{interface}` embeds itself")]
    CyclicEmbed { interface: String },

    #[error("interface `{name}` is defined more than once")]
    DuplicateInterface { name: String },
}

impl InterfaceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingMethod { .. } => ErrorCode::E3001,
            Self::AmbiguousComposition { .. } => ErrorCode::E3002,
            Self::SignatureMismatch { .. } => ErrorCode::E3003,
            Self::UnknownInterface { .. } => ErrorCode::E3004,
            Self::UnknownMethod { .. } => ErrorCode::E3005,
            Self::IncompleteImplementer { .. } => ErrorCode::E3006,
            Self::CyclicEmbed { .. } => ErrorCode::E3007,
            Self::DuplicateInterface { .. } => ErrorCode::E6011,
        }
    }
}

/// Interface definitions and the vtables built for them.
#[derive(Clone, Debug, Default)]
pub struct InterfaceRegistry {
    decls: FxHashMap<Name, Vec<ResolvedMember>>,
    order: Vec<Name>,
    flat: FxHashMap<Name, Vec<InterfaceMethod>>,
    requested: FxHashSet<(Name, Name)>,
    pending: Vec<(Name, Name)>,
    bindings: FxHashMap<(Name, Name), usize>,
    vtables: Vec<Vtable>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(
        &mut self,
        name: Name,
        members: Vec<ResolvedMember>,
        interner: &StringInterner,
    ) -> Result<(), InterfaceError> {
        if self.decls.contains_key(&name) {
            return Err(InterfaceError::DuplicateInterface {
                name: interner.lookup(name).to_owned(),
            });
        }
        self.decls.insert(name, members);
        self.order.push(name);
        Ok(())
    }

    pub fn contains(&self, name: Name) -> bool {
        self.decls.contains_key(&name)
    }

    /// Interface names in definition order.
    pub fn names(&self) -> &[Name] {
        &self.order
    }

    /// Methods of `name` in slot order, with embeds expanded.
    pub fn flatten(
        &mut self,
        name: Name,
        interner: &StringInterner,
    ) -> Result<&[InterfaceMethod], InterfaceError> {
        if !self.flat.contains_key(&name) {
            let mut stack = Vec::new();
            let mut methods = Vec::new();
            self.expand(name, name, &mut stack, &mut methods, interner)?;
            self.flat.insert(name, methods);
        }
        Ok(self.flat.get(&name).map_or(&[], Vec::as_slice))
    }

    fn expand(
        &self,
        root: Name,
        name: Name,
        stack: &mut Vec<Name>,
        out: &mut Vec<InterfaceMethod>,
        interner: &StringInterner,
    ) -> Result<(), InterfaceError> {
        if stack.contains(&name) {
            return Err(InterfaceError::CyclicEmbed {
                interface: interner.lookup(name).to_owned(),
            });
        }
        let members = self
            .decls
            .get(&name)
            .ok_or_else(|| InterfaceError::UnknownInterface {
                name: interner.lookup(name).to_owned(),
            })?;
        stack.push(name);
        for member in members {
            match member {
                ResolvedMember::Embed(inner) => {
                    self.expand(root, *inner, stack, out, interner)?;
                }
                ResolvedMember::Method(method) => {
                    match out.iter().find(|m| m.name == method.name) {
                        Some(existing) if existing.sig == method.sig => {}
                        Some(_) => {
                            return Err(InterfaceError::AmbiguousComposition {
                                interface: interner.lookup(root).to_owned(),
                                method: interner.lookup(method.name).to_owned(),
                            })
                        }
                        None => out.push(method.clone()),
                    }
                }
            }
        }
        stack.pop();
        Ok(())
    }

    /// Vtable slot of `method` in `interface`.
    pub fn slot(
        &mut self,
        interface: Name,
        method: Name,
        interner: &StringInterner,
    ) -> Result<(u32, InterfaceMethod), InterfaceError> {
        let methods = self.flatten(interface, interner)?;
        let position = methods.iter().position(|m| m.name == method).ok_or_else(|| {
            InterfaceError::UnknownMethod {
                method: interner.lookup(method).to_owned(),
                interface: interner.lookup(interface).to_owned(),
            }
        })?;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "interfaces never have u32::MAX methods"
        )]
        Ok((position as u32, methods[position].clone()))
    }

    /// Symbol of the vtable constant for `implementer` as `interface`.
    pub fn vtable_symbol(interface: Name, implementer: Name, interner: &StringInterner) -> Name {
        interner.intern(&format!(
            "uya_vtable_{}_{}",
            interner.lookup(interface),
            interner.lookup(implementer)
        ))
    }

    /// Record that `implementer` is used as `interface`. Checked and built
    /// by [`finalize`](Self::finalize).
    pub fn request_binding(&mut self, interface: Name, implementer: Name) {
        if self.requested.insert((interface, implementer)) {
            self.pending.push((interface, implementer));
        }
    }

    /// Build vtables for every pending binding, in request order, and return
    /// the newly created ones.
    #[tracing::instrument(level = "debug", skip_all, fields(pending = self.pending.len()))]
    pub fn finalize(
        &mut self,
        registry: &TypeRegistry,
        pool: &Pool,
        interner: &StringInterner,
    ) -> Result<Vec<Vtable>, InterfaceError> {
        let pending = std::mem::take(&mut self.pending);
        let mut created = Vec::with_capacity(pending.len());
        for (interface, implementer) in pending {
            let vtable = self.bind(interface, implementer, registry, pool, interner)?;
            tracing::debug!(symbol = interner.lookup(vtable.symbol), "vtable");
            self.bindings
                .insert((interface, implementer), self.vtables.len());
            self.vtables.push(vtable.clone());
            created.push(vtable);
        }
        Ok(created)
    }

    fn bind(
        &mut self,
        interface: Name,
        implementer: Name,
        registry: &TypeRegistry,
        pool: &Pool,
        interner: &StringInterner,
    ) -> Result<Vtable, InterfaceError> {
        let text = |n: Name| interner.lookup(n).to_owned();
        if !matches!(
            registry.struct_state(implementer),
            Some(DeclState::Complete(_))
        ) {
            return Err(InterfaceError::IncompleteImplementer {
                implementer: text(implementer),
                interface: text(interface),
            });
        }

        let methods = self.flatten(interface, interner)?.to_vec();
        let mut entries = Vec::with_capacity(methods.len());
        for required in &methods {
            let Some(found) = registry.method(implementer, required.name) else {
                return Err(InterfaceError::MissingMethod {
                    method: text(required.name),
                    implementer: text(implementer),
                    interface: text(interface),
                });
            };
            if found.sig != required.sig {
                return Err(InterfaceError::SignatureMismatch {
                    method: text(required.name),
                    implementer: text(implementer),
                    interface: text(interface),
                    expected: render_sig(&required.sig, pool, interner),
                    found: render_sig(&found.sig, pool, interner),
                });
            }
            entries.push(found.symbol);
        }

        Ok(Vtable {
            symbol: Self::vtable_symbol(interface, implementer, interner),
            interface,
            implementer,
            entries,
        })
    }

    pub fn vtable(&self, interface: Name, implementer: Name) -> Option<&Vtable> {
        self.bindings
            .get(&(interface, implementer))
            .map(|&i| &self.vtables[i])
    }

    /// All vtables built so far.
    pub fn vtables(&self) -> &[Vtable] {
        &self.vtables
    }
}

fn render_sig(sig: &FnSig, pool: &Pool, interner: &StringInterner) -> String {
    let params: Vec<String> = sig
        .params
        .iter()
        .map(|&p| pool.display(p, interner))
        .collect();
    format!("fn({}) {}", params.join(", "), pool.display(sig.ret, interner))
}
