//! Error-union control flow: `try`, `catch` and iterator `for`.
//!
//! Every construct that inspects an error union first copies it into a
//! fresh temporary, then branches on its error id with
//! [`Terminator::BranchOnError`]. Payload reads only happen in the `ok`
//! successor of that branch, which `crate::verify` re-checks on the
//! finished function.

use uya_ir::{Expr, Name, Stmt};
use uya_types::Idx;

use super::{FnLowerer, Outcome, Value};
use crate::ir::{Callee, Inst, Terminator, VarId};
use crate::LowerError;

impl FnLowerer<'_, '_> {
    /// Evaluate an error-union operand into a single-assignment temporary.
    fn guarded_union(&mut self, operand: &Expr) -> Result<(VarId, Idx), LowerError> {
        let value = self.lower_expr(operand, None)?;
        let Some(payload) = self.cx.pool.error_union_payload(value.ty) else {
            return Err(LowerError::TypeMismatch {
                expected: "an error union".to_owned(),
                found: self.cx.display(value.ty),
            });
        };
        let union = self.b.temp(value.ty);
        self.b.emit(Inst::Copy {
            dst: union,
            src: value.var,
        });
        Ok((union, payload))
    }

    fn read_payload(&mut self, union: VarId, payload: Idx) -> Value {
        if payload == Idx::VOID {
            return self.void_value();
        }
        let dst = self.b.temp(payload);
        self.b.emit(Inst::UnionPayload { dst, union });
        Value { var: dst, ty: payload }
    }

    /// `try e`: return the error id of `e` to the caller, or continue with
    /// its payload.
    pub(super) fn lower_try(&mut self, operand: &Expr) -> Result<Value, LowerError> {
        if self.cx.pool.error_union_payload(self.ret).is_none() {
            return Err(LowerError::TryOutsideFallible {
                function: self.function_name(),
            });
        }
        self.check_exit("try", false)?;
        let (union, payload) = self.guarded_union(operand)?;
        let ok = self.b.new_block();
        let err = self.b.new_block();
        self.b.terminate(Terminator::BranchOnError { union, ok, err });

        self.b.position_at(err);
        let id = self.b.temp(Idx::U32);
        self.b.emit(Inst::ErrorId { dst: id, union });
        let propagated = self.b.temp(self.ret);
        self.b.emit(Inst::MakeErr {
            dst: propagated,
            error_id: id,
        });
        let propagated = Value {
            var: propagated,
            ty: self.ret,
        };
        self.return_through_cleanups(Some(propagated), Outcome::Failure)?;

        self.b.position_at(ok);
        Ok(self.read_payload(union, payload))
    }

    /// `e catch |err| { handler; value }`: on error run the handler with the
    /// id bound to `err`, and use `value` in place of the payload.
    pub(super) fn lower_catch(
        &mut self,
        operand: &Expr,
        binding: Option<Name>,
        handler: &[Stmt],
        value: &Expr,
    ) -> Result<Value, LowerError> {
        let (union, payload) = self.guarded_union(operand)?;
        let result = (payload != Idx::VOID).then(|| self.b.temp(payload));

        let ok = self.b.new_block();
        let err = self.b.new_block();
        let merge = self.b.new_block();
        self.b.terminate(Terminator::BranchOnError { union, ok, err });

        self.b.position_at(ok);
        if let Some(result) = result {
            let read = self.read_payload(union, payload);
            self.b.emit(Inst::Copy {
                dst: result,
                src: read.var,
            });
        }
        self.b.terminate(Terminator::Jump(merge));

        self.b.position_at(err);
        self.with_scope(|this| {
            if let Some(name) = binding {
                let id = this.b.named(Idx::U32, name);
                this.b.emit(Inst::ErrorId { dst: id, union });
                this.bind(name, id, Idx::U32, false);
            }
            for stmt in handler {
                this.lower_stmt(stmt)?;
            }
            this.b.ensure_open();
            let fallback = this.lower_expr(value, Some(payload))?;
            if let Some(result) = result {
                let fallback = this.coerce(fallback, payload)?;
                this.b.emit(Inst::Copy {
                    dst: result,
                    src: fallback.var,
                });
            }
            Ok(())
        })?;
        self.b.terminate(Terminator::Jump(merge));

        self.b.position_at(merge);
        Ok(match result {
            Some(var) => Value { var, ty: payload },
            None => self.void_value(),
        })
    }

    /// `for x in it { body }` over an iterator struct with
    /// `fn next() !void` and `fn value() T`. The loop ends on the first
    /// nonzero error id from `next`.
    pub(super) fn lower_for_iterator(
        &mut self,
        binding: Name,
        it: Value,
        name: Name,
        body: &[Stmt],
    ) -> Result<(), LowerError> {
        let next = self.iterator_method(name, "next")?;
        let item = self.iterator_method(name, "value")?;
        if self.cx.pool.error_union_payload(next.ret) != Some(Idx::VOID) {
            let expected = self.cx.pool.error_union(Idx::VOID);
            return Err(self.mismatch(expected, next.ret));
        }

        let iter_var = self.b.temp(it.ty);
        self.b.emit(Inst::Copy {
            dst: iter_var,
            src: it.var,
        });
        let self_ty = self.cx.pool.pointer(it.ty, true);
        let next_abi = self.cx.call_abi(&[self_ty], next.ret)?;
        let item_abi = self.cx.call_abi(&[self_ty], item.ret)?;

        let header = self.b.new_block();
        let body_block = self.b.new_block();
        let exit = self.b.new_block();
        self.b.terminate(Terminator::Jump(header));

        self.b.position_at(header);
        let self_ptr = self.iterator_self(iter_var, self_ty);
        let status = self.emit_call(Callee::Direct(next.symbol), &next_abi, &[self_ptr]);
        let union = self.b.temp(status.ty);
        self.b.emit(Inst::Copy {
            dst: union,
            src: status.var,
        });
        self.b.terminate(Terminator::BranchOnError {
            union,
            ok: body_block,
            err: exit,
        });

        self.b.position_at(body_block);
        let self_ptr = self.iterator_self(iter_var, self_ty);
        let current = self.emit_call(Callee::Direct(item.symbol), &item_abi, &[self_ptr]);
        self.with_scope(|this| {
            this.bind_value(binding, current);
            this.lower_loop_body(header, exit, body)
        })?;
        self.b.terminate(Terminator::Jump(header));

        self.b.position_at(exit);
        Ok(())
    }

    fn iterator_self(&mut self, iter_var: VarId, self_ty: Idx) -> Value {
        let ptr = self.b.temp(self_ty);
        self.b.emit(Inst::AddrOf {
            dst: ptr,
            var: iter_var,
        });
        Value {
            var: ptr,
            ty: self_ty,
        }
    }

    /// Symbol and return type of a zero-argument iterator method.
    fn iterator_method(&mut self, target: Name, method: &str) -> Result<IterMethod, LowerError> {
        let method_name = self.cx.interner.intern(method);
        let Some(def) = self.cx.registry.method(target, method_name) else {
            return Err(LowerError::UnknownFunction {
                name: format!("{}.{method}", self.cx.text(target)),
            });
        };
        if !def.sig.params.is_empty() {
            return Err(LowerError::ArgCount {
                callee: format!("{}.{method}", self.cx.text(target)),
                expected: 0,
                found: def.sig.params.len(),
            });
        }
        Ok(IterMethod {
            symbol: def.symbol,
            ret: def.sig.ret,
        })
    }
}

struct IterMethod {
    symbol: Name,
    ret: Idx,
}
