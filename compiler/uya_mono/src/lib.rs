//! Generic instantiation for the Uya Mini backend.
//!
//! Resolves source [`TypeExpr`](uya_ir::TypeExpr)s to pool indices and
//! monomorphizes generic structs and functions on demand. Each
//! [`InstantiationKey`] produces exactly one concrete definition.

mod error;
mod instantiate;
mod key;
mod scope;

pub use error::GenericError;
pub use instantiate::{
    GenericDef, Instance, InstanceKind, Instantiator, MonoCx, MAX_INSTANTIATION_DEPTH,
};
pub use key::{ConcreteDefId, GenericDefId, InstantiationKey};
pub use scope::Scope;
