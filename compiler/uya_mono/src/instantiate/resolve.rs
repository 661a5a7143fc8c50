//! Resolution of source type expressions to pool indices.

use uya_ir::TypeExpr;
use uya_types::{ensure_sufficient_stack, Idx, NominalKind};

use super::{Instantiator, MonoCx};
use crate::{GenericError, Scope};

impl Instantiator {
    /// Resolve `ty` under `scope`, instantiating generic applications on the
    /// way (innermost arguments first).
    pub fn resolve(
        &mut self,
        cx: &mut MonoCx<'_>,
        ty: &TypeExpr,
        scope: &Scope,
    ) -> Result<Idx, GenericError> {
        ensure_sufficient_stack(|| self.resolve_inner(cx, ty, scope))
    }

    fn resolve_inner(
        &mut self,
        cx: &mut MonoCx<'_>,
        ty: &TypeExpr,
        scope: &Scope,
    ) -> Result<Idx, GenericError> {
        match ty {
            TypeExpr::Void => Ok(Idx::VOID),
            TypeExpr::Pointer { pointee, mutable } => {
                let pointee = self.resolve(cx, pointee, scope)?;
                Ok(cx.pool.pointer(pointee, *mutable))
            }
            TypeExpr::Array { elem, len } => {
                let elem = self.resolve(cx, elem, scope)?;
                let len = cx.consts.array_len(len, cx.interner)?;
                Ok(cx.pool.array(elem, len))
            }
            TypeExpr::ErrorUnion(payload) => {
                let payload = self.resolve(cx, payload, scope)?;
                Ok(cx.pool.error_union(payload))
            }
            TypeExpr::Slice { elem, mutable } => {
                let elem = self.resolve(cx, elem, scope)?;
                Ok(cx.pool.slice(elem, *mutable))
            }
            TypeExpr::Tuple(elems) => {
                let elems = elems
                    .iter()
                    .map(|elem| self.resolve(cx, elem, scope))
                    .collect::<Result<Vec<_>, GenericError>>()?;
                Ok(cx.pool.tuple(&elems))
            }
            TypeExpr::Named { name, args } if args.is_empty() => {
                let name = *name;
                if let Some(bound) = scope.get(name) {
                    return Ok(bound);
                }
                let text = cx.interner.lookup(name);
                if scope.is_declared(name) {
                    return Err(GenericError::UnresolvedTypeParam {
                        param: text.to_owned(),
                    });
                }
                if let Some(prim) = Idx::from_primitive_name(text) {
                    return Ok(prim);
                }
                match cx.registry.kind(name) {
                    Some(NominalKind::Struct) => return Ok(cx.pool.struct_type(name)),
                    Some(NominalKind::Union) => return Ok(cx.pool.union_type(name)),
                    Some(NominalKind::Enum) => return Ok(cx.pool.enum_type(name)),
                    Some(NominalKind::Interface) => return Ok(cx.pool.interface_type(name)),
                    None => {}
                }
                if let Some(def) = self.lookup(name) {
                    return Err(GenericError::ArityMismatch {
                        name: text.to_owned(),
                        expected: self.def(def).params().len(),
                        found: 0,
                    });
                }
                Err(GenericError::UnknownType {
                    name: text.to_owned(),
                })
            }
            TypeExpr::Named { name, args } => {
                let text = cx.interner.lookup(*name);
                let Some(def) = self.lookup(*name) else {
                    return Err(if cx.registry.kind(*name).is_some() {
                        GenericError::NotGeneric {
                            name: text.to_owned(),
                        }
                    } else {
                        GenericError::UnknownType {
                            name: text.to_owned(),
                        }
                    });
                };
                let resolved = args
                    .iter()
                    .map(|arg| self.resolve(cx, arg, scope))
                    .collect::<Result<Vec<_>, GenericError>>()?;
                let id = self.instantiate(cx, def, &resolved)?;
                match &self.instance(id).kind {
                    super::InstanceKind::Struct(ty) => Ok(*ty),
                    super::InstanceKind::Fn { .. } => Err(GenericError::UnknownType {
                        name: text.to_owned(),
                    }),
                }
            }
        }
    }
}
