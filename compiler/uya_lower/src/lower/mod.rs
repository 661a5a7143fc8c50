//! Body lowering: typed AST statements to lowered IR blocks.
//!
//! # Entry Point
//!
//! [`lower_function`] lowers one function body (free function, method, or
//! generic instance) given its concrete signature.
//!
//! # Architecture
//!
//! - [`FnBuilder`] owns blocks and variables of the function being built
//! - `FnLowerer` walks statements (`stmt.rs`) and expressions (`expr.rs`),
//!   builds call sites from the callee ABI (`calls.rs`) and expands
//!   `try`/`catch`/`for` into explicit error-id branches (`errors.rs`)
//!
//! `defer` and `errdefer` bodies are registered on a cleanup stack and
//! lowered again on every exit that leaves their scope, innermost first:
//! at the end of the block, at `break`/`continue` for the scopes inside the
//! loop, and at every return. `errdefer` bodies only run on returns that
//! carry an error. A returned value is computed before any cleanup runs.
//!
//! Locals are C variables. A parameter passed by pointer stays behind its
//! pointer (an *indirect* local); reads and writes go through it.

mod builder;
mod calls;
mod errors;
mod expr;
mod stmt;

use std::rc::Rc;

use rustc_hash::FxHashMap;
use uya_ir::{Name, Param, Stmt};
use uya_mono::Scope;
use uya_types::{FnSig, Idx, TypeData};

use crate::abi::PassingClass;
use crate::cx::LowerCx;
use crate::ir::{BlockId, Inst, LoweredFn, Terminator, VarId};
use crate::LowerError;

use self::builder::FnBuilder;

/// One function body to lower.
pub struct FnJob<'d> {
    /// Emitted symbol.
    pub symbol: Name,
    /// For methods: the struct `self` points to.
    pub receiver: Option<Idx>,
    pub params: &'d [Param],
    /// Concrete signature, without `self`.
    pub sig: &'d FnSig,
    pub body: &'d [Stmt],
    /// Generic parameter bindings for instances.
    pub types: Scope,
}

/// Lower one function body.
#[tracing::instrument(level = "debug", skip_all, fields(symbol = cx.text(job.symbol)))]
pub fn lower_function(cx: &mut LowerCx<'_>, job: FnJob<'_>) -> Result<LoweredFn, LowerError> {
    let interner = cx.interner;
    let mut lowerer = FnLowerer::new(cx, &job);
    let (abi, params) = lowerer.prologue(&job)?;
    lowerer.lower_block(job.body)?;
    lowerer.epilogue()?;
    let func = lowerer.b.finish(job.symbol, abi, params);
    crate::verify::check_payload_reads(&func, interner)?;
    tracing::debug!(
        blocks = func.blocks.len(),
        vars = func.vars.len(),
        "lowered function"
    );
    Ok(func)
}

// ---------------------------------------------------------------------------
// Values, places, locals
// ---------------------------------------------------------------------------

/// A lowered expression: the variable holding it and its type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Value {
    pub(crate) var: VarId,
    pub(crate) ty: Idx,
}

/// Storage an expression denotes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Place {
    /// The variable itself.
    Var(VarId),
    /// Memory behind a pointer variable.
    Ptr(VarId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct PlaceRef {
    pub(crate) place: Place,
    pub(crate) ty: Idx,
}

#[derive(Copy, Clone, Debug)]
struct Local {
    var: VarId,
    ty: Idx,
    /// `var` holds a pointer to the value rather than the value.
    indirect: bool,
}

#[derive(Copy, Clone, Debug)]
struct LoopTargets {
    break_to: BlockId,
    continue_to: BlockId,
    /// Cleanups registered outside the loop; leaving an iteration runs the
    /// ones above this depth.
    cleanup_depth: usize,
}

/// What a return is known to carry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    /// An error union only inspected at run time.
    Unknown,
}

/// A registered `defer` or `errdefer` body.
#[derive(Clone, Debug)]
struct Cleanup {
    body: Rc<[Stmt]>,
    on_error_only: bool,
}

pub(crate) struct FnLowerer<'a, 'cx> {
    cx: &'a mut LowerCx<'cx>,
    b: FnBuilder,
    scopes: Vec<FxHashMap<Name, Local>>,
    loops: Vec<LoopTargets>,
    cleanups: Vec<Cleanup>,
    /// Loop depth at the start of each cleanup body being lowered.
    defer_floors: Vec<usize>,
    symbol: Name,
    ret: Idx,
    sret: Option<VarId>,
    types: Scope,
}

impl<'a, 'cx> FnLowerer<'a, 'cx> {
    fn new(cx: &'a mut LowerCx<'cx>, job: &FnJob<'_>) -> Self {
        Self {
            cx,
            b: FnBuilder::new(),
            scopes: vec![FxHashMap::default()],
            loops: Vec::new(),
            cleanups: Vec::new(),
            defer_floors: Vec::new(),
            symbol: job.symbol,
            ret: job.sig.ret,
            sret: None,
            types: job.types.clone(),
        }
    }

    /// Bind parameters according to the ABI and return the physical
    /// parameter list.
    fn prologue(
        &mut self,
        job: &FnJob<'_>,
    ) -> Result<(crate::abi::FunctionAbi, Vec<VarId>), LowerError> {
        let mut named = Vec::with_capacity(job.params.len() + 1);
        if let Some(receiver) = job.receiver {
            let self_ptr = self.cx.pool.pointer(receiver, true);
            named.push((self.cx.interner.intern("self"), self_ptr));
        }
        if job.params.len() != job.sig.params.len() {
            return Err(LowerError::ArgCount {
                callee: self.cx.text(job.symbol).to_owned(),
                expected: job.sig.params.len(),
                found: job.params.len(),
            });
        }
        named.extend(job.params.iter().zip(&job.sig.params).map(|(p, &ty)| (p.name, ty)));

        let abi = self.cx.function_abi(&named, job.sig.ret)?;
        let mut params = Vec::with_capacity(abi.physical_arity());
        if abi.has_sret() {
            let slot_ty = self.cx.pool.pointer(job.sig.ret, true);
            let slot = self.b.temp(slot_ty);
            params.push(slot);
            self.sret = Some(slot);
        }

        for param in &abi.params {
            match (&param.class, param.copy_in) {
                (PassingClass::Ignore, _) => {
                    let var = self.b.named(param.ty, param.name);
                    self.bind(param.name, var, param.ty, false);
                }
                (PassingClass::ByRegisterSet(_), _) => {
                    let var = self.b.named(param.ty, param.name);
                    params.push(var);
                    self.bind(param.name, var, param.ty, false);
                }
                (PassingClass::ByPointer, true) => {
                    let ptr_ty = self.cx.pool.pointer(param.ty, false);
                    let ptr = self.b.temp(ptr_ty);
                    params.push(ptr);
                    let local = self.b.named(param.ty, param.name);
                    self.b.emit(Inst::Load { dst: local, ptr });
                    self.bind(param.name, local, param.ty, false);
                }
                (PassingClass::ByPointer, false) => {
                    let ptr_ty = self.cx.pool.pointer(param.ty, true);
                    let ptr = self.b.named(ptr_ty, param.name);
                    params.push(ptr);
                    self.bind(param.name, ptr, param.ty, true);
                }
            }
        }
        Ok((abi, params))
    }

    /// Close the final block when the body falls off its end.
    fn epilogue(&mut self) -> Result<(), LowerError> {
        if self.b.is_terminated() {
            return Ok(());
        }
        if self.ret == Idx::VOID {
            self.b.terminate(Terminator::Return(None));
        } else if self.cx.pool.error_union_payload(self.ret) == Some(Idx::VOID) {
            let ok = self.b.temp(self.ret);
            self.b.emit(Inst::MakeOk {
                dst: ok,
                value: None,
            });
            self.emit_return(Some(Value {
                var: ok,
                ty: self.ret,
            }));
        } else {
            self.b.terminate(Terminator::Unreachable);
        }
        Ok(())
    }

    // ── Scopes ──────────────────────────────────────────────────────

    fn bind(&mut self, name: Name, var: VarId, ty: Idx, indirect: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, Local { var, ty, indirect });
        }
    }

    fn lookup(&self, name: Name) -> Option<Local> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name).copied())
    }

    /// Run `f` in a fresh scope. Cleanups it registers run when it falls
    /// off its end.
    fn with_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, LowerError>,
    ) -> Result<T, LowerError> {
        let mark = self.cleanups.len();
        self.scopes.push(FxHashMap::default());
        let result = f(self).and_then(|value| {
            if !self.b.is_terminated() {
                self.run_cleanups(mark, false)?;
            }
            Ok(value)
        });
        self.scopes.pop();
        self.cleanups.truncate(mark);
        result
    }

    // ── Cleanups ────────────────────────────────────────────────────

    fn push_cleanup(&mut self, body: &[Stmt], on_error_only: bool) {
        self.cleanups.push(Cleanup {
            body: Rc::from(body),
            on_error_only,
        });
    }

    /// Lower the cleanups registered above `depth`, last registered first.
    /// `errdefer` bodies are skipped unless `on_error`.
    fn run_cleanups(&mut self, depth: usize, on_error: bool) -> Result<(), LowerError> {
        let registered = self.cleanups.clone();
        for (i, cleanup) in registered.iter().enumerate().skip(depth).rev() {
            if cleanup.on_error_only && !on_error {
                continue;
            }
            // A body sees only the cleanups registered before it.
            self.cleanups.truncate(i);
            self.defer_floors.push(self.loops.len());
            let result = self.lower_block(&cleanup.body);
            self.defer_floors.pop();
            result?;
        }
        self.cleanups = registered;
        Ok(())
    }

    /// Fails when `keyword` would jump out of the cleanup body being lowered.
    fn check_exit(&self, keyword: &'static str, loop_exit: bool) -> Result<(), LowerError> {
        match self.defer_floors.last() {
            Some(&floor) if !loop_exit || self.loops.len() <= floor => {
                Err(LowerError::ExitFromDefer { keyword })
            }
            _ => Ok(()),
        }
    }

    /// Run every registered cleanup, then return `value`. When `value` is an
    /// error union whose state is only known at run time and `errdefer`
    /// bodies are pending, both outcomes get their own exit path.
    fn return_through_cleanups(
        &mut self,
        value: Option<Value>,
        outcome: Outcome,
    ) -> Result<(), LowerError> {
        if self.cleanups.is_empty() {
            self.emit_return(value);
            return Ok(());
        }
        // Cleanups may assign the local the result was read from.
        let value = value.map(|v| self.detach(v));
        let has_errdefer = self.cleanups.iter().any(|c| c.on_error_only);

        match value {
            Some(union) if has_errdefer && outcome == Outcome::Unknown => {
                let ok = self.b.new_block();
                let err = self.b.new_block();
                self.b.terminate(Terminator::BranchOnError {
                    union: union.var,
                    ok,
                    err,
                });
                self.b.position_at(err);
                self.run_cleanups(0, true)?;
                self.emit_return(value);
                self.b.position_at(ok);
                self.run_cleanups(0, false)?;
                self.emit_return(value);
            }
            _ => {
                self.run_cleanups(0, outcome == Outcome::Failure)?;
                self.emit_return(value);
            }
        }
        Ok(())
    }

    // ── Places ──────────────────────────────────────────────────────

    /// `value` in a temporary no later assignment can reach.
    fn detach(&mut self, value: Value) -> Value {
        if !self.b.is_named(value.var) {
            return value;
        }
        let dst = self.b.temp(value.ty);
        self.b.emit(Inst::Copy {
            dst,
            src: value.var,
        });
        Value { var: dst, ty: value.ty }
    }

    fn read(&mut self, place: PlaceRef) -> Value {
        match place.place {
            Place::Var(var) => Value { var, ty: place.ty },
            Place::Ptr(ptr) => {
                let dst = self.b.temp(place.ty);
                self.b.emit(Inst::Load { dst, ptr });
                Value { var: dst, ty: place.ty }
            }
        }
    }

    /// Pointer to the storage of `place`.
    fn address(&mut self, place: PlaceRef, mutable: bool) -> Value {
        let ptr_ty = self.cx.pool.pointer(place.ty, mutable);
        let dst = self.b.temp(ptr_ty);
        match place.place {
            Place::Var(var) => self.b.emit(Inst::AddrOf { dst, var }),
            Place::Ptr(ptr) => self.b.emit(Inst::Copy { dst, src: ptr }),
        }
        Value { var: dst, ty: ptr_ty }
    }

    fn write(&mut self, place: PlaceRef, value: Value) {
        match place.place {
            Place::Var(var) => self.b.emit(Inst::Copy {
                dst: var,
                src: value.var,
            }),
            Place::Ptr(ptr) => self.b.emit(Inst::Store {
                ptr,
                value: value.var,
            }),
        }
    }

    // ── Results ─────────────────────────────────────────────────────

    /// Placeholder for expressions of type `void`.
    fn void_value(&mut self) -> Value {
        Value {
            var: self.b.temp(Idx::VOID),
            ty: Idx::VOID,
        }
    }

    fn emit_return(&mut self, value: Option<Value>) {
        let value = value.filter(|v| v.ty != Idx::VOID);
        match (self.sret, value) {
            (Some(slot), Some(value)) => {
                self.b.emit(Inst::Store {
                    ptr: slot,
                    value: value.var,
                });
                self.b.terminate(Terminator::Return(None));
            }
            (_, value) => self.b.terminate(Terminator::Return(value.map(|v| v.var))),
        }
    }

    // ── Coercions ───────────────────────────────────────────────────

    /// Convert `value` to `target` where the language converts implicitly:
    /// struct (or pointer to struct) to an interface it implements, a value
    /// to the error union of its type, `&mut T` to `&T` and `&mut [T]` to
    /// `&[T]`.
    fn coerce(&mut self, value: Value, target: Idx) -> Result<Value, LowerError> {
        if value.ty == target {
            return Ok(value);
        }
        match *self.cx.pool.data(target) {
            TypeData::Interface(interface) => self.coerce_to_interface(value, interface, target),
            TypeData::ErrorUnion(payload) => {
                let inner = if payload == Idx::VOID && value.ty == Idx::VOID {
                    None
                } else {
                    Some(self.coerce(value, payload)?.var)
                };
                let dst = self.b.temp(target);
                self.b.emit(Inst::MakeOk { dst, value: inner });
                Ok(Value { var: dst, ty: target })
            }
            TypeData::Pointer { pointee, .. }
                if self.cx.pool.pointee(value.ty) == Some(pointee) =>
            {
                let dst = self.b.temp(target);
                self.b.emit(Inst::Copy {
                    dst,
                    src: value.var,
                });
                Ok(Value { var: dst, ty: target })
            }
            TypeData::Slice {
                elem,
                mutable: false,
            } if self.cx.pool.slice_elem(value.ty) == Some((elem, true)) =>
            {
                let dst = self.b.temp(target);
                self.b.emit(Inst::Copy {
                    dst,
                    src: value.var,
                });
                Ok(Value { var: dst, ty: target })
            }
            _ => Err(self.mismatch(target, value.ty)),
        }
    }

    fn coerce_to_interface(
        &mut self,
        value: Value,
        interface: Name,
        target: Idx,
    ) -> Result<Value, LowerError> {
        let (implementer, data) = match *self.cx.pool.data(value.ty) {
            TypeData::Struct(name) => {
                let place = PlaceRef {
                    place: Place::Var(value.var),
                    ty: value.ty,
                };
                (name, self.address(place, true))
            }
            TypeData::Pointer { pointee, .. } => match *self.cx.pool.data(pointee) {
                TypeData::Struct(name) => (name, value),
                _ => return Err(self.mismatch(target, value.ty)),
            },
            _ => return Err(self.mismatch(target, value.ty)),
        };

        let implements = self
            .cx
            .registry
            .struct_def(implementer)
            .is_some_and(|def| def.implements.contains(&interface));
        if !implements {
            return Err(self.mismatch(target, value.ty));
        }

        self.cx.interfaces.request_binding(interface, implementer);
        let vtable = crate::interface::InterfaceRegistry::vtable_symbol(
            interface,
            implementer,
            self.cx.interner,
        );
        let dst = self.b.temp(target);
        self.b.emit(Inst::MakeFatPtr {
            dst,
            data: data.var,
            vtable,
        });
        Ok(Value { var: dst, ty: target })
    }

    fn mismatch(&self, expected: Idx, found: Idx) -> LowerError {
        LowerError::TypeMismatch {
            expected: self.cx.display(expected),
            found: self.cx.display(found),
        }
    }

    fn function_name(&self) -> String {
        self.cx.text(self.symbol).to_owned()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
