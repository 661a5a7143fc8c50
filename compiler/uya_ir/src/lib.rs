//! Uya IR: interned names and the item-level AST handed to the backend.
//!
//! - [`Name`]: 32-bit interned identifier, O(1) equality
//! - [`StringInterner`]: sharded, thread-safe interner producing `Name`s
//! - [`ast`]: declarations and function bodies of a compilation unit

pub mod ast;
mod interner;
mod name;

pub use ast::{
    BinaryOp, ConstDecl, ConstExpr, EnumDecl, Expr, FieldDecl, FnDecl, InterfaceDecl,
    InterfaceMember, Item, MethodBlock, MethodSig, Module, Param, Stmt, StructDecl, TypeExpr,
    UnaryOp, UnionDecl, VariantDecl,
};
pub use interner::{InternError, SharedInterner, StringInterner};
pub use name::Name;
