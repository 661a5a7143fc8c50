//! Call sites: direct calls, generic instances, static and dynamic method
//! dispatch.
//!
//! Arguments are laid out from the callee's [`FunctionAbi`]: an `sret`
//! slot first when the result is returned in memory, then one entry per
//! non-`void` parameter. `ByPointer` arguments are passed as the address of
//! a caller-owned copy.

use uya_ir::{Expr, Name, TypeExpr};
use uya_mono::{GenericError, InstanceKind};
use uya_types::{FnSig, Idx, TypeData};

use super::{FnLowerer, Place, PlaceRef, Value};
use crate::abi::{FunctionAbi, PassingClass};
use crate::cx::FnEntry;
use crate::ir::{Callee, Inst};
use crate::LowerError;

impl FnLowerer<'_, '_> {
    /// Emit a call. `args` match `abi.params` one to one.
    pub(super) fn emit_call(&mut self, callee: Callee, abi: &FunctionAbi, args: &[Value]) -> Value {
        debug_assert_eq!(abi.params.len(), args.len());
        let mut physical = Vec::with_capacity(abi.physical_arity());

        let sret_slot = if abi.has_sret() {
            let slot = self.b.temp(abi.ret.ty);
            let slot_ptr_ty = self.cx.pool.pointer(abi.ret.ty, true);
            let ptr = self.b.temp(slot_ptr_ty);
            self.b.emit(Inst::AddrOf { dst: ptr, var: slot });
            physical.push(ptr);
            Some(slot)
        } else {
            None
        };

        for (param, arg) in abi.params.iter().zip(args) {
            match (&param.class, param.copy_in) {
                (PassingClass::Ignore, _) => {}
                (PassingClass::ByRegisterSet(_), _) => physical.push(arg.var),
                (PassingClass::ByPointer, copy_in) => {
                    // The callee copies arrays itself; anything else gets a
                    // private temporary it may write through.
                    let storage = if copy_in {
                        arg.var
                    } else {
                        let tmp = self.b.temp(arg.ty);
                        self.b.emit(Inst::Copy {
                            dst: tmp,
                            src: arg.var,
                        });
                        tmp
                    };
                    let ptr = self.address(
                        PlaceRef {
                            place: Place::Var(storage),
                            ty: arg.ty,
                        },
                        !copy_in,
                    );
                    physical.push(ptr.var);
                }
            }
        }

        match (sret_slot, &abi.ret.class) {
            (Some(slot), _) => {
                self.b.emit(Inst::Call {
                    dst: None,
                    callee,
                    args: physical,
                });
                Value {
                    var: slot,
                    ty: abi.ret.ty,
                }
            }
            (None, PassingClass::Ignore) => {
                self.b.emit(Inst::Call {
                    dst: None,
                    callee,
                    args: physical,
                });
                self.void_value()
            }
            (None, _) => {
                let dst = self.b.temp(abi.ret.ty);
                self.b.emit(Inst::Call {
                    dst: Some(dst),
                    callee,
                    args: physical,
                });
                Value {
                    var: dst,
                    ty: abi.ret.ty,
                }
            }
        }
    }

    /// Lower call arguments, left to right, against the parameter types they
    /// bind to.
    fn lower_args(
        &mut self,
        callee: &str,
        params: &[Idx],
        args: &[Expr],
    ) -> Result<Vec<Value>, LowerError> {
        if params.len() != args.len() {
            return Err(LowerError::ArgCount {
                callee: callee.to_owned(),
                expected: params.len(),
                found: args.len(),
            });
        }
        let mut values = Vec::with_capacity(args.len());
        for (i, (arg, &ty)) in args.iter().zip(params).enumerate() {
            let value = self.lower_expr(arg, Some(ty))?;
            let value = self.coerce(value, ty)?;
            values.push(self.hold(value, &args[i + 1..]));
        }
        Ok(values)
    }

    // ── Free functions ─────────────────────────────────────────────

    pub(super) fn lower_call(
        &mut self,
        callee: Name,
        type_args: &[TypeExpr],
        args: &[Expr],
    ) -> Result<Value, LowerError> {
        let Some(entry) = self.cx.fns.get(callee).cloned() else {
            return Err(LowerError::UnknownFunction {
                name: self.cx.text(callee).to_owned(),
            });
        };
        let (symbol, sig) = match entry {
            FnEntry::Concrete { symbol, sig, .. } => {
                if !type_args.is_empty() {
                    return Err(GenericError::NotGeneric {
                        name: self.cx.text(callee).to_owned(),
                    }
                    .into());
                }
                (symbol, sig)
            }
            FnEntry::Generic(def) => self.instantiate_fn(def, type_args)?,
        };

        let name = self.cx.text(callee);
        let values = self.lower_args(name, &sig.params, args)?;
        let abi = self.cx.call_abi(&sig.params, sig.ret)?;
        Ok(self.emit_call(Callee::Direct(symbol), &abi, &values))
    }

    /// Instance symbol and signature of a generic function for the given
    /// type arguments, resolved in the current generic scope.
    fn instantiate_fn(
        &mut self,
        def: uya_mono::GenericDefId,
        type_args: &[TypeExpr],
    ) -> Result<(Name, FnSig), LowerError> {
        let mut resolved = Vec::with_capacity(type_args.len());
        for arg in type_args {
            resolved.push(self.cx.resolve(arg, &self.types)?);
        }
        let id = self.cx.instantiate(def, &resolved)?;
        let instance = self.cx.instantiator.instance(id);
        match &instance.kind {
            InstanceKind::Fn { sig, .. } => Ok((instance.name, sig.clone())),
            InstanceKind::Struct(_) => Err(LowerError::UnknownFunction {
                name: self.cx.text(instance.name).to_owned(),
            }),
        }
    }

    // ── Methods ────────────────────────────────────────────────────

    pub(super) fn lower_method_call(
        &mut self,
        receiver: &Expr,
        method: Name,
        args: &[Expr],
    ) -> Result<Value, LowerError> {
        let place = self.lower_place(receiver)?;
        let (target, through_pointer) = match self.cx.pool.pointee(place.ty) {
            Some(pointee) => (pointee, true),
            None => (place.ty, false),
        };

        match *self.cx.pool.data(target) {
            TypeData::Interface(interface) => {
                let fat = if through_pointer {
                    let ptr = self.read(place);
                    self.read(PlaceRef {
                        place: Place::Ptr(ptr.var),
                        ty: target,
                    })
                } else {
                    self.read(place)
                };
                self.dynamic_call(interface, fat, method, args)
            }
            TypeData::Struct(name) => {
                let self_ptr = if through_pointer {
                    self.read(place)
                } else {
                    self.address(place, true)
                };
                self.static_call(name, target, self_ptr, method, args)
            }
            _ => Err(LowerError::UnknownFunction {
                name: format!("{}.{}", self.cx.display(target), self.cx.text(method)),
            }),
        }
    }

    /// `uya_<T>_<m>(self, args...)`.
    fn static_call(
        &mut self,
        name: Name,
        struct_ty: Idx,
        self_ptr: Value,
        method: Name,
        args: &[Expr],
    ) -> Result<Value, LowerError> {
        let qualified = format!("{}.{}", self.cx.text(name), self.cx.text(method));
        let Some(def) = self.cx.registry.method(name, method).cloned() else {
            return Err(LowerError::UnknownFunction { name: qualified });
        };

        let mut values = vec![self_ptr];
        values.extend(self.lower_args(&qualified, &def.sig.params, args)?);

        let mut params = vec![self.cx.pool.pointer(struct_ty, true)];
        params.extend_from_slice(&def.sig.params);
        let abi = self.cx.call_abi(&params, def.sig.ret)?;
        Ok(self.emit_call(Callee::Direct(def.symbol), &abi, &values))
    }

    /// `fat.vtable[slot](fat.data, args...)`.
    fn dynamic_call(
        &mut self,
        interface: Name,
        fat: Value,
        method: Name,
        args: &[Expr],
    ) -> Result<Value, LowerError> {
        let (slot, required) = self
            .cx
            .interfaces
            .slot(interface, method, self.cx.interner)?;

        let data_ty = self.cx.pool.pointer(Idx::VOID, true);
        let data = self.b.temp(data_ty);
        self.b.emit(Inst::FatData {
            dst: data,
            fat: fat.var,
        });

        let qualified = format!("{}.{}", self.cx.text(interface), self.cx.text(method));
        let mut values = vec![Value {
            var: data,
            ty: data_ty,
        }];
        values.extend(self.lower_args(&qualified, &required.sig.params, args)?);

        let mut params = vec![data_ty];
        params.extend_from_slice(&required.sig.params);
        let abi = self.cx.call_abi(&params, required.sig.ret)?;
        Ok(self.emit_call(
            Callee::Vtable {
                receiver: fat.var,
                slot,
            },
            &abi,
            &values,
        ))
    }
}
