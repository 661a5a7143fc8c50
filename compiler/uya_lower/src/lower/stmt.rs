//! Statement lowering and structured control flow.

use uya_ir::{BinaryOp, Expr, Name, Stmt, TypeExpr};
use uya_types::{Idx, TypeData, TypeFlags};

use super::expr::is_literal;
use super::{FnLowerer, LoopTargets, Outcome, Place, PlaceRef, Value};
use crate::ir::{BlockId, Inst, Literal, Terminator};
use crate::LowerError;

impl FnLowerer<'_, '_> {
    /// Lower `stmts` in a fresh lexical scope.
    pub(super) fn lower_block(&mut self, stmts: &[Stmt]) -> Result<(), LowerError> {
        self.with_scope(|this| {
            for stmt in stmts {
                this.lower_stmt(stmt)?;
            }
            Ok(())
        })
    }

    pub(super) fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), LowerError> {
        self.b.ensure_open();
        match stmt {
            Stmt::Let { name, ty, init } => self.lower_let(*name, ty.as_ref(), init),
            Stmt::Assign { target, value } => {
                let place = self.lower_place(target)?;
                let value = self.lower_expr(value, Some(place.ty))?;
                let value = self.coerce(value, place.ty)?;
                self.write(place, value);
                Ok(())
            }
            Stmt::Expr(expr) => {
                self.lower_expr(expr, None)?;
                Ok(())
            }
            Stmt::Return(value) => self.lower_return(value.as_ref()),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch),
            Stmt::While { cond, body } => self.lower_while(cond, body),
            Stmt::For {
                binding,
                iter,
                body,
            } => self.lower_for(*binding, iter, body),
            Stmt::ForRange {
                binding,
                start,
                end,
                body,
            } => self.lower_for_range(*binding, start, end.as_ref(), body),
            Stmt::Break => {
                let target = self.loop_target("break")?;
                self.run_cleanups(target.cleanup_depth, false)?;
                self.b.terminate(Terminator::Jump(target.break_to));
                Ok(())
            }
            Stmt::Continue => {
                let target = self.loop_target("continue")?;
                self.run_cleanups(target.cleanup_depth, false)?;
                self.b.terminate(Terminator::Jump(target.continue_to));
                Ok(())
            }
            Stmt::Defer(body) => {
                self.push_cleanup(body, false);
                Ok(())
            }
            Stmt::ErrDefer(body) => {
                if self.cx.pool.error_union_payload(self.ret).is_none() {
                    return Err(LowerError::UnsupportedOperation {
                        detail: format!(
                            "`errdefer` in `{}`, which does not return an error union",
                            self.function_name()
                        ),
                    });
                }
                self.push_cleanup(body, true);
                Ok(())
            }
        }
    }

    fn loop_target(&self, keyword: &'static str) -> Result<LoopTargets, LowerError> {
        let target = self
            .loops
            .last()
            .copied()
            .ok_or(LowerError::OutsideLoop { keyword })?;
        self.check_exit(keyword, true)?;
        Ok(target)
    }

    fn lower_let(
        &mut self,
        name: Name,
        ty: Option<&TypeExpr>,
        init: &Expr,
    ) -> Result<(), LowerError> {
        let declared = match ty {
            Some(ty) => Some(self.cx.resolve(ty, &self.types)?),
            None => None,
        };
        let value = self.lower_expr(init, declared)?;
        let value = match declared {
            Some(ty) => self.coerce(value, ty)?,
            None => value,
        };
        if value.ty == Idx::VOID {
            return Err(LowerError::UnsupportedOperation {
                detail: format!("local `{}` of type `void`", self.cx.text(name)),
            });
        }
        self.bind_value(name, value);
        Ok(())
    }

    fn lower_return(&mut self, value: Option<&Expr>) -> Result<(), LowerError> {
        self.check_exit("return", false)?;
        let Some(expr) = value else {
            if self.ret == Idx::VOID {
                return self.return_through_cleanups(None, Outcome::Success);
            }
            // `return;` in a `!void` function succeeds.
            let void = self.void_value();
            let ok = self.coerce(void, self.ret)?;
            return self.return_through_cleanups(Some(ok), Outcome::Success);
        };
        let value = self.lower_expr(expr, Some(self.ret))?;
        let outcome = if matches!(expr, Expr::ErrorLit(_)) {
            Outcome::Failure
        } else if self.cx.pool.error_union_payload(value.ty).is_some() {
            Outcome::Unknown
        } else {
            Outcome::Success
        };
        let value = self.coerce(value, self.ret)?;
        self.return_through_cleanups(Some(value), outcome)
    }

    fn lower_if(
        &mut self,
        cond: &Expr,
        then_branch: &[Stmt],
        else_branch: &[Stmt],
    ) -> Result<(), LowerError> {
        let cond = self.lower_bool(cond)?;
        let then_block = self.b.new_block();
        let else_block = self.b.new_block();
        let merge = self.b.new_block();
        self.b.terminate(Terminator::Branch {
            cond: cond.var,
            then_block,
            else_block,
        });

        self.b.position_at(then_block);
        self.lower_block(then_branch)?;
        self.b.terminate(Terminator::Jump(merge));

        self.b.position_at(else_block);
        self.lower_block(else_branch)?;
        self.b.terminate(Terminator::Jump(merge));

        self.b.position_at(merge);
        Ok(())
    }

    fn lower_while(&mut self, cond: &Expr, body: &[Stmt]) -> Result<(), LowerError> {
        let header = self.b.new_block();
        let body_block = self.b.new_block();
        let exit = self.b.new_block();
        self.b.terminate(Terminator::Jump(header));

        self.b.position_at(header);
        let cond = self.lower_bool(cond)?;
        self.b.terminate(Terminator::Branch {
            cond: cond.var,
            then_block: body_block,
            else_block: exit,
        });

        self.b.position_at(body_block);
        self.lower_loop_body(header, exit, body)?;
        self.b.terminate(Terminator::Jump(header));

        self.b.position_at(exit);
        Ok(())
    }

    /// `for x in e`: element by element over arrays and slices, otherwise
    /// through the iterator protocol.
    fn lower_for(&mut self, binding: Name, iter: &Expr, body: &[Stmt]) -> Result<(), LowerError> {
        let place = self.lower_place(iter)?;
        match *self.cx.pool.data(place.ty) {
            TypeData::Array { elem, len } => {
                let base = self.address(place, false);
                let count = self.usize_constant(place.ty, len)?;
                self.lower_for_elements(binding, base, count, elem, body)
            }
            TypeData::Slice { elem, mutable } => {
                let slice_ptr = self.address(place, false);
                let (data, count) = self.slice_parts(slice_ptr, elem, mutable);
                self.lower_for_elements(binding, data, count, elem, body)
            }
            TypeData::Struct(name) => {
                let it = self.read(place);
                self.lower_for_iterator(binding, it, name, body)
            }
            _ => Err(LowerError::UnsupportedOperation {
                detail: format!(
                    "`for` over `{}`, which is neither an array, a slice nor an iterator struct",
                    self.cx.display(place.ty)
                ),
            }),
        }
    }

    /// Index loop over `count` elements starting at `base`, a pointer to an
    /// array or to its first element.
    fn lower_for_elements(
        &mut self,
        binding: Name,
        base: Value,
        count: Value,
        elem: Idx,
        body: &[Stmt],
    ) -> Result<(), LowerError> {
        let zero = self.constant(Idx::USIZE, Literal::Int(0));
        let index = self.counter(zero);

        let header = self.b.new_block();
        let body_block = self.b.new_block();
        let latch = self.b.new_block();
        let exit = self.b.new_block();
        self.b.terminate(Terminator::Jump(header));

        self.b.position_at(header);
        self.branch_while_below(index, count, body_block, exit);

        self.b.position_at(body_block);
        let elem_ptr_ty = self.cx.pool.pointer(elem, false);
        let elem_ptr = self.b.temp(elem_ptr_ty);
        self.b.emit(Inst::ElemPtr {
            dst: elem_ptr,
            base: base.var,
            index: index.var,
        });
        let current = self.read(PlaceRef {
            place: Place::Ptr(elem_ptr),
            ty: elem,
        });
        self.with_scope(|this| {
            this.bind_value(binding, current);
            this.lower_loop_body(latch, exit, body)
        })?;
        self.b.terminate(Terminator::Jump(latch));

        self.b.position_at(latch);
        self.increment(index);
        self.b.terminate(Terminator::Jump(header));

        self.b.position_at(exit);
        Ok(())
    }

    /// `for start..end |v|` counts from `start` up to, not including, `end`,
    /// which is evaluated once. Without `end` the loop only ends through
    /// `break` or `return`.
    fn lower_for_range(
        &mut self,
        binding: Option<Name>,
        start: &Expr,
        end: Option<&Expr>,
        body: &[Stmt],
    ) -> Result<(), LowerError> {
        let (first, last) = match end {
            // The literal side takes its type from the other bound.
            Some(end) if is_literal(start) && !is_literal(end) => {
                let last = self.lower_expr(end, None)?;
                let last = self.detach(last);
                let first = self.lower_expr(start, Some(last.ty))?;
                (first, Some(last))
            }
            Some(end) => {
                let first = self.lower_expr(start, None)?;
                let first = self.hold(first, [end]);
                let last = self.lower_expr(end, Some(first.ty))?;
                (first, Some(self.detach(last)))
            }
            None => (self.lower_expr(start, None)?, None),
        };
        if !self.cx.pool.flags(first.ty).contains(TypeFlags::IS_INTEGER) {
            return Err(LowerError::UnsupportedOperation {
                detail: format!("range over `{}`", self.cx.display(first.ty)),
            });
        }
        if let Some(last) = last.filter(|l| l.ty != first.ty) {
            return Err(self.mismatch(first.ty, last.ty));
        }
        let current = self.counter(first);

        let header = self.b.new_block();
        let body_block = self.b.new_block();
        let latch = self.b.new_block();
        let exit = self.b.new_block();
        self.b.terminate(Terminator::Jump(header));

        self.b.position_at(header);
        match last {
            Some(last) => self.branch_while_below(current, last, body_block, exit),
            None => self.b.terminate(Terminator::Jump(body_block)),
        }

        self.b.position_at(body_block);
        self.with_scope(|this| {
            if let Some(name) = binding {
                this.bind_value(name, current);
            }
            this.lower_loop_body(latch, exit, body)
        })?;
        self.b.terminate(Terminator::Jump(latch));

        self.b.position_at(latch);
        self.increment(current);
        self.b.terminate(Terminator::Jump(header));

        self.b.position_at(exit);
        Ok(())
    }

    /// A hidden loop counter starting at `init`.
    fn counter(&mut self, init: Value) -> Value {
        let var = self.b.temp(init.ty);
        self.b.emit(Inst::Copy {
            dst: var,
            src: init.var,
        });
        Value { var, ty: init.ty }
    }

    fn increment(&mut self, counter: Value) {
        let one = self.constant(counter.ty, Literal::Int(1));
        let next = self.b.temp(counter.ty);
        self.b.emit(Inst::Binary {
            dst: next,
            op: BinaryOp::Add,
            lhs: counter.var,
            rhs: one.var,
        });
        self.b.emit(Inst::Copy {
            dst: counter.var,
            src: next,
        });
    }

    fn branch_while_below(&mut self, counter: Value, bound: Value, body: BlockId, exit: BlockId) {
        let cond = self.b.temp(Idx::BOOL);
        self.b.emit(Inst::Binary {
            dst: cond,
            op: BinaryOp::Lt,
            lhs: counter.var,
            rhs: bound.var,
        });
        self.b.terminate(Terminator::Branch {
            cond,
            then_block: body,
            else_block: exit,
        });
    }

    /// Lower a loop body with `break`/`continue` bound to `exit`/`next`.
    pub(super) fn lower_loop_body(
        &mut self,
        next: BlockId,
        exit: BlockId,
        body: &[Stmt],
    ) -> Result<(), LowerError> {
        self.loops.push(LoopTargets {
            break_to: exit,
            continue_to: next,
            cleanup_depth: self.cleanups.len(),
        });
        let result = self.lower_block(body);
        self.loops.pop();
        result
    }

    /// Bind `name` to a copy of `value` in the innermost scope.
    pub(super) fn bind_value(&mut self, name: Name, value: Value) {
        let var = self.b.named(value.ty, name);
        self.b.emit(Inst::Copy {
            dst: var,
            src: value.var,
        });
        self.bind(name, var, value.ty, false);
    }
}
