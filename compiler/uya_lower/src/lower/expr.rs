//! Expression lowering.

use uya_ir::{BinaryOp, Expr, Name, TypeExpr, UnaryOp};
use uya_types::type_info::{describe, type_info_name, TYPE_INFO};
use uya_types::{
    ensure_sufficient_stack, ConstValue, Idx, LayoutError, TypeData, TypeEnv, TypeFlags,
};

use super::{FnLowerer, Place, PlaceRef, Value};
use crate::ir::{Inst, Literal, Terminator};
use crate::LowerError;

impl FnLowerer<'_, '_> {
    /// Lower `expr`. `expected` types untyped literals and error literals.
    pub(crate) fn lower_expr(
        &mut self,
        expr: &Expr,
        expected: Option<Idx>,
    ) -> Result<Value, LowerError> {
        ensure_sufficient_stack(|| self.lower_expr_inner(expr, expected))
    }

    fn lower_expr_inner(&mut self, expr: &Expr, expected: Option<Idx>) -> Result<Value, LowerError> {
        match expr {
            Expr::Int(v) => Ok(self.int_literal(*v, expected)),
            Expr::Float(v) => {
                let ty = expected
                    .filter(|&t| self.cx.pool.flags(t).contains(TypeFlags::IS_FLOAT))
                    .unwrap_or(Idx::F64);
                Ok(self.constant(ty, Literal::Float(*v)))
            }
            Expr::Bool(v) => Ok(self.constant(Idx::BOOL, Literal::Bool(*v))),
            Expr::Path(name) => self.lower_path(*name),
            Expr::ErrorLit(name) => self.lower_error_literal(*name, expected),
            Expr::EnumVariant { enum_name, variant } => self.lower_variant(*enum_name, *variant),
            Expr::Call {
                callee,
                type_args,
                args,
            } => self.lower_call(*callee, type_args, args),
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => self.lower_method_call(receiver, *method, args),
            Expr::Field { .. } | Expr::TupleField { .. } | Expr::Index { .. } | Expr::Deref(_) => {
                let place = self.lower_place(expr)?;
                Ok(self.read(place))
            }
            Expr::StructLit { ty, fields } => self.lower_struct_lit(ty, fields),
            Expr::ArrayLit { elem, elems } => self.lower_array_lit(elem, elems),
            Expr::TupleLit(elems) => self.lower_tuple_lit(elems, expected),
            Expr::UnionLit {
                union_name,
                variant,
                value,
            } => self.lower_union_lit(*union_name, *variant, value),
            Expr::SliceOf { base, start, len } => self.lower_slice_of(base, start, len, expected),
            Expr::AddrOf { operand, mutable } => {
                let place = self.lower_place(operand)?;
                Ok(self.address(place, *mutable))
            }
            Expr::Unary { op, operand } => self.lower_unary(*op, operand, expected),
            Expr::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs, expected),
            Expr::Try(operand) => self.lower_try(operand),
            Expr::Catch {
                operand,
                binding,
                handler,
                value,
            } => self.lower_catch(operand, *binding, handler, value),
            Expr::SizeOf(ty) => {
                let ty = self.cx.resolve(ty, &self.types)?;
                let size = self.cx.layout(ty)?.size;
                self.usize_constant(ty, size)
            }
            Expr::AlignOf(ty) => {
                let ty = self.cx.resolve(ty, &self.types)?;
                let align = self.cx.layout(ty)?.align;
                self.usize_constant(ty, align)
            }
            Expr::TypeInfoOf(ty) => self.lower_type_info(ty),
        }
    }

    // ── Literals and names ─────────────────────────────────────────

    pub(crate) fn constant(&mut self, ty: Idx, value: Literal) -> Value {
        let dst = self.b.temp(ty);
        self.b.emit(Inst::Const { dst, value });
        Value { var: dst, ty }
    }

    fn int_literal(&mut self, v: i64, expected: Option<Idx>) -> Value {
        match expected.map(|t| (t, self.cx.pool.flags(t))) {
            Some((ty, flags)) if flags.contains(TypeFlags::IS_INTEGER) => {
                self.constant(ty, Literal::Int(v))
            }
            Some((ty, flags)) if flags.contains(TypeFlags::IS_FLOAT) => {
                #[expect(
                    clippy::cast_precision_loss,
                    reason = "integer literal used as a float, as in C"
                )]
                let f = v as f64;
                self.constant(ty, Literal::Float(f))
            }
            _ => self.constant(Idx::I32, Literal::Int(v)),
        }
    }

    /// A `usize` constant measured from `ty`.
    pub(super) fn usize_constant(&mut self, ty: Idx, bytes: u64) -> Result<Value, LowerError> {
        let value = i64::try_from(bytes).map_err(|_| LayoutError::Overflow {
            ty: self.cx.display(ty),
        })?;
        Ok(self.constant(Idx::USIZE, Literal::Int(value)))
    }

    fn lower_path(&mut self, name: Name) -> Result<Value, LowerError> {
        if let Some(local) = self.lookup(name) {
            let place = if local.indirect {
                Place::Ptr(local.var)
            } else {
                Place::Var(local.var)
            };
            return Ok(self.read(PlaceRef {
                place,
                ty: local.ty,
            }));
        }
        if let Some((value, ty)) = self.cx.consts.get_typed(name) {
            let literal = match value {
                ConstValue::Int(v) => Literal::Int(v),
                ConstValue::Float(v) => Literal::Float(v),
                ConstValue::Bool(v) => Literal::Bool(v),
            };
            return Ok(self.constant(ty, literal));
        }
        Err(LowerError::UnknownLocal {
            name: self.cx.text(name).to_owned(),
        })
    }

    fn lower_error_literal(
        &mut self,
        name: Name,
        expected: Option<Idx>,
    ) -> Result<Value, LowerError> {
        let Some(union_ty) =
            expected.filter(|&t| self.cx.pool.error_union_payload(t).is_some())
        else {
            return Err(LowerError::TypeMismatch {
                expected: expected.map_or_else(|| "an error union".to_owned(), |t| self.cx.display(t)),
                found: format!("error.{}", self.cx.text(name)),
            });
        };
        let id = self.cx.error_ids.intern(name, self.cx.interner)?;
        let id_var = self.constant(Idx::U32, Literal::Int(i64::from(id)));
        let dst = self.b.temp(union_ty);
        self.b.emit(Inst::MakeErr {
            dst,
            error_id: id_var.var,
        });
        Ok(Value {
            var: dst,
            ty: union_ty,
        })
    }

    fn lower_variant(&mut self, enum_name: Name, variant: Name) -> Result<Value, LowerError> {
        let Some(def) = self.cx.registry.enum_def(enum_name) else {
            return Err(uya_mono::GenericError::UnknownType {
                name: self.cx.text(enum_name).to_owned(),
            }
            .into());
        };
        let Some(tag) = def.tag(variant) else {
            return Err(LowerError::UnknownVariant {
                enum_name: self.cx.text(enum_name).to_owned(),
                variant: self.cx.text(variant).to_owned(),
            });
        };
        let ty = self.cx.pool.enum_type(enum_name);
        Ok(self.constant(ty, Literal::Int(tag)))
    }

    // ── Places ─────────────────────────────────────────────────────

    /// Storage denoted by `expr`. Non-place expressions are evaluated into
    /// a temporary.
    pub(crate) fn lower_place(&mut self, expr: &Expr) -> Result<PlaceRef, LowerError> {
        match expr {
            Expr::Path(name) => {
                let Some(local) = self.lookup(*name) else {
                    // Constants are values, not storage.
                    let value = self.lower_path(*name)?;
                    return Ok(PlaceRef {
                        place: Place::Var(value.var),
                        ty: value.ty,
                    });
                };
                let place = if local.indirect {
                    Place::Ptr(local.var)
                } else {
                    Place::Var(local.var)
                };
                Ok(PlaceRef {
                    place,
                    ty: local.ty,
                })
            }
            Expr::Deref(operand) => {
                let ptr = self.lower_expr(operand, None)?;
                let Some(pointee) = self.cx.pool.pointee(ptr.ty) else {
                    return Err(LowerError::UnsupportedOperation {
                        detail: format!("dereference of non-pointer `{}`", self.cx.display(ptr.ty)),
                    });
                };
                Ok(PlaceRef {
                    place: Place::Ptr(ptr.var),
                    ty: pointee,
                })
            }
            Expr::Field { base, field } => self.lower_field_place(base, *field),
            Expr::TupleField { base, index } => self.lower_tuple_field_place(base, *index),
            Expr::Index { base, index } => self.lower_index_place(base, index),
            _ => {
                let value = self.lower_expr(expr, None)?;
                Ok(PlaceRef {
                    place: Place::Var(value.var),
                    ty: value.ty,
                })
            }
        }
    }

    /// Pointer to the aggregate `base` denotes, looking through one level of
    /// pointer (`self.field`, `ptr.field`). The flag is set when `base`
    /// itself was a pointer.
    fn aggregate_pointer(&mut self, base: &Expr) -> Result<(Value, bool), LowerError> {
        let place = self.lower_place(base)?;
        if self.cx.pool.pointee(place.ty).is_some() {
            Ok((self.read(place), true))
        } else {
            Ok((self.address(place, true), false))
        }
    }

    /// Storage of member `index` of the aggregate behind `ptr`.
    fn member_place(&mut self, ptr: Value, index: u32, ty: Idx) -> PlaceRef {
        let member_ptr_ty = self.cx.pool.pointer(ty, true);
        let dst = self.b.temp(member_ptr_ty);
        self.b.emit(Inst::FieldPtr {
            dst,
            base: ptr.var,
            field: index,
        });
        PlaceRef {
            place: Place::Ptr(dst),
            ty,
        }
    }

    /// Data pointer and length of the slice behind `slice_ptr`.
    pub(super) fn slice_parts(&mut self, slice_ptr: Value, elem: Idx, mutable: bool) -> (Value, Value) {
        let data_ty = self.cx.pool.pointer(elem, mutable);
        let data = self.member_place(slice_ptr, 0, data_ty);
        let data = self.read(data);
        let len = self.member_place(slice_ptr, 1, Idx::USIZE);
        let len = self.read(len);
        (data, len)
    }

    fn lower_field_place(&mut self, base: &Expr, field: Name) -> Result<PlaceRef, LowerError> {
        let (ptr, _) = self.aggregate_pointer(base)?;
        let struct_ty = self.cx.pool.pointee(ptr.ty).unwrap_or(ptr.ty);
        if self.cx.pool.slice_elem(struct_ty).is_some() && self.cx.text(field) == "len" {
            return Ok(self.member_place(ptr, 1, Idx::USIZE));
        }
        let TypeData::Struct(name) = *self.cx.pool.data(struct_ty) else {
            return Err(LowerError::UnsupportedOperation {
                detail: format!("field access on `{}`", self.cx.display(struct_ty)),
            });
        };
        let Some(def) = self.cx.registry.struct_def(name) else {
            return Err(LayoutError::IncompleteType {
                name: self.cx.text(name).to_owned(),
            }
            .into());
        };
        let Some(index) = def.field_index(field) else {
            return Err(LowerError::UnknownField {
                ty: self.cx.text(name).to_owned(),
                field: self.cx.text(field).to_owned(),
            });
        };
        let field_ty = def.fields[index].ty;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "structs never have u32::MAX fields"
        )]
        Ok(self.member_place(ptr, index as u32, field_ty))
    }

    fn lower_tuple_field_place(&mut self, base: &Expr, index: u32) -> Result<PlaceRef, LowerError> {
        let (ptr, _) = self.aggregate_pointer(base)?;
        let tuple_ty = self.cx.pool.pointee(ptr.ty).unwrap_or(ptr.ty);
        let Some(elems) = self.cx.pool.tuple_elems(tuple_ty) else {
            return Err(LowerError::UnsupportedOperation {
                detail: format!("tuple field on `{}`", self.cx.display(tuple_ty)),
            });
        };
        let Some(&elem_ty) = elems.get(index as usize) else {
            return Err(LowerError::UnknownField {
                ty: self.cx.display(tuple_ty),
                field: index.to_string(),
            });
        };
        Ok(self.member_place(ptr, index, elem_ty))
    }

    fn lower_index_place(&mut self, base: &Expr, index: &Expr) -> Result<PlaceRef, LowerError> {
        let (mut ptr, through_pointer) = self.aggregate_pointer(base)?;
        let target = self.cx.pool.pointee(ptr.ty).unwrap_or(ptr.ty);
        let elem = match *self.cx.pool.data(target) {
            TypeData::Array { elem, .. } => elem,
            TypeData::Slice { elem, mutable } => {
                ptr = self.slice_parts(ptr, elem, mutable).0;
                elem
            }
            // Raw pointer indexing: `p[i]` on `&T`.
            _ if through_pointer => target,
            _ => {
                return Err(LowerError::UnsupportedOperation {
                    detail: format!("indexing `{}`", self.cx.display(target)),
                })
            }
        };

        let index = self.index_value(index)?;

        let elem_ptr_ty = self.cx.pool.pointer(elem, true);
        let dst = self.b.temp(elem_ptr_ty);
        self.b.emit(Inst::ElemPtr {
            dst,
            base: ptr.var,
            index: index.var,
        });
        Ok(PlaceRef {
            place: Place::Ptr(dst),
            ty: elem,
        })
    }

    // ── Aggregates ─────────────────────────────────────────────────

    fn lower_struct_lit(
        &mut self,
        ty: &TypeExpr,
        fields: &[(Name, Expr)],
    ) -> Result<Value, LowerError> {
        let struct_ty = self.cx.resolve(ty, &self.types)?;
        let TypeData::Struct(name) = *self.cx.pool.data(struct_ty) else {
            return Err(LowerError::UnsupportedOperation {
                detail: format!("struct literal of `{}`", self.cx.display(struct_ty)),
            });
        };
        let Some(def) = self.cx.registry.struct_def(name).cloned() else {
            return Err(LayoutError::IncompleteType {
                name: self.cx.text(name).to_owned(),
            }
            .into());
        };

        let mut members = Vec::with_capacity(fields.len());
        for (i, (field, init)) in fields.iter().enumerate() {
            let Some(index) = def.field_index(*field) else {
                return Err(LowerError::UnknownField {
                    ty: self.cx.text(name).to_owned(),
                    field: self.cx.text(*field).to_owned(),
                });
            };
            let field_ty = def.fields[index].ty;
            let value = self.lower_expr(init, Some(field_ty))?;
            let value = self.coerce(value, field_ty)?;
            let value = self.hold(value, fields[i + 1..].iter().map(|(_, e)| e));
            #[expect(
                clippy::cast_possible_truncation,
                reason = "structs never have u32::MAX fields"
            )]
            members.push((index as u32, value.var));
        }

        let dst = self.b.temp(struct_ty);
        self.b.emit(Inst::Construct { dst, members });
        Ok(Value {
            var: dst,
            ty: struct_ty,
        })
    }

    fn lower_array_lit(&mut self, elem: &TypeExpr, elems: &[Expr]) -> Result<Value, LowerError> {
        let elem_ty = self.cx.resolve(elem, &self.types)?;
        let array_ty = self.cx.pool.array(elem_ty, elems.len() as u64);

        let mut members = Vec::with_capacity(elems.len());
        for (i, init) in elems.iter().enumerate() {
            let value = self.lower_expr(init, Some(elem_ty))?;
            let value = self.coerce(value, elem_ty)?;
            let value = self.hold(value, &elems[i + 1..]);
            #[expect(
                clippy::cast_possible_truncation,
                reason = "array literals never have u32::MAX elements"
            )]
            members.push((i as u32, value.var));
        }

        let dst = self.b.temp(array_ty);
        self.b.emit(Inst::Construct { dst, members });
        Ok(Value {
            var: dst,
            ty: array_ty,
        })
    }

    fn lower_tuple_lit(&mut self, elems: &[Expr], expected: Option<Idx>) -> Result<Value, LowerError> {
        let hints: Vec<Idx> = expected
            .and_then(|t| self.cx.pool.tuple_elems(t))
            .filter(|hints| hints.len() == elems.len())
            .map(<[Idx]>::to_vec)
            .unwrap_or_default();

        let mut values = Vec::with_capacity(elems.len());
        for (i, init) in elems.iter().enumerate() {
            let hint = hints.get(i).copied();
            let value = self.lower_expr(init, hint)?;
            let value = match hint {
                Some(ty) => self.coerce(value, ty)?,
                None => value,
            };
            if value.ty == Idx::VOID {
                return Err(LayoutError::Unsized {
                    ty: "tuple literal".to_owned(),
                }
                .into());
            }
            values.push(self.hold(value, &elems[i + 1..]));
        }

        let elem_tys: Vec<Idx> = values.iter().map(|v| v.ty).collect();
        let tuple_ty = self.cx.pool.tuple(&elem_tys);
        let members = (0u32..).zip(values.iter().map(|v| v.var)).collect();
        let dst = self.b.temp(tuple_ty);
        self.b.emit(Inst::Construct { dst, members });
        Ok(Value {
            var: dst,
            ty: tuple_ty,
        })
    }

    fn lower_union_lit(
        &mut self,
        union_name: Name,
        variant: Name,
        value: &Expr,
    ) -> Result<Value, LowerError> {
        let Some(def) = self.cx.registry.union_def(union_name).cloned() else {
            return Err(if self.cx.registry.kind(union_name).is_some() {
                LayoutError::IncompleteType {
                    name: self.cx.text(union_name).to_owned(),
                }
                .into()
            } else {
                uya_mono::GenericError::UnknownType {
                    name: self.cx.text(union_name).to_owned(),
                }
                .into()
            });
        };
        let Some(index) = def.variant_index(variant) else {
            return Err(LowerError::UnknownVariant {
                enum_name: self.cx.text(union_name).to_owned(),
                variant: self.cx.text(variant).to_owned(),
            });
        };
        let variant_ty = def.variants[index].ty;
        let payload = self.lower_expr(value, Some(variant_ty))?;
        let payload = self.coerce(payload, variant_ty)?;

        let union_ty = self.cx.pool.union_type(union_name);
        let dst = self.b.temp(union_ty);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "unions never have u32::MAX variants"
        )]
        self.b.emit(Inst::MakeUnion {
            dst,
            tag: index as u32,
            value: payload.var,
        });
        Ok(Value {
            var: dst,
            ty: union_ty,
        })
    }

    /// `&base[start:len]` over an array, a slice or a pointer. The slice is
    /// mutable when the context asks for `&mut [T]` and the base allows it.
    fn lower_slice_of(
        &mut self,
        base: &Expr,
        start: &Expr,
        len: &Expr,
        expected: Option<Idx>,
    ) -> Result<Value, LowerError> {
        let wants_mut = expected
            .and_then(|t| self.cx.pool.slice_elem(t))
            .is_some_and(|(_, mutable)| mutable);

        let place = self.lower_place(base)?;
        let (first, elem, mutable) = match *self.cx.pool.data(place.ty) {
            TypeData::Array { elem, .. } => (self.address(place, wants_mut), elem, wants_mut),
            TypeData::Slice { elem, mutable } => {
                let slice_ptr = self.address(place, false);
                let (data, _) = self.slice_parts(slice_ptr, elem, mutable);
                (data, elem, mutable && wants_mut)
            }
            TypeData::Pointer { pointee, mutable } => {
                (self.read(place), pointee, mutable && wants_mut)
            }
            _ => {
                return Err(LowerError::UnsupportedOperation {
                    detail: format!("slicing `{}`", self.cx.display(place.ty)),
                })
            }
        };
        let first = self.hold(first, [start, len]);

        let start = self.index_value(start)?;
        let start = self.hold(start, [len]);
        let len = self.index_value(len)?;

        let data_ty = self.cx.pool.pointer(elem, mutable);
        let data = self.b.temp(data_ty);
        self.b.emit(Inst::ElemPtr {
            dst: data,
            base: first.var,
            index: start.var,
        });
        let slice_ty = self.cx.pool.slice(elem, mutable);
        let dst = self.b.temp(slice_ty);
        self.b.emit(Inst::Construct {
            dst,
            members: vec![(0, data), (1, len.var)],
        });
        Ok(Value {
            var: dst,
            ty: slice_ty,
        })
    }

    /// An integer operand used as an index or length.
    fn index_value(&mut self, expr: &Expr) -> Result<Value, LowerError> {
        let value = self.lower_expr(expr, Some(Idx::USIZE))?;
        if !self.cx.pool.flags(value.ty).contains(TypeFlags::IS_INTEGER) {
            return Err(LowerError::NonIntegerIndex {
                found: self.cx.display(value.ty),
            });
        }
        Ok(value)
    }

    fn lower_type_info(&mut self, ty: &TypeExpr) -> Result<Value, LowerError> {
        let ty = self.cx.resolve(ty, &self.types)?;
        let env = TypeEnv {
            pool: self.cx.pool,
            registry: self.cx.registry,
            target: self.cx.target,
        };
        let record = describe(self.cx.layouts, env, ty)?;
        let info_name = type_info_name(self.cx.registry);
        if self.cx.registry.struct_def(info_name).is_none() {
            return Err(LayoutError::IncompleteType {
                name: TYPE_INFO.to_owned(),
            }
            .into());
        }
        let info_ty = self.cx.pool.struct_type(info_name);

        let name_ptr = self.cx.pool.pointer(Idx::I8, false);
        let literals = [
            (name_ptr, Literal::Str(record.name)),
            (Idx::I32, Literal::Int(i64::from(record.size))),
            (Idx::I32, Literal::Int(i64::from(record.align))),
            (Idx::I32, Literal::Int(record.kind as i64)),
            (Idx::BOOL, Literal::Bool(record.is_integer)),
            (Idx::BOOL, Literal::Bool(record.is_float)),
            (Idx::BOOL, Literal::Bool(record.is_bool)),
            (Idx::BOOL, Literal::Bool(record.is_pointer)),
            (Idx::BOOL, Literal::Bool(record.is_array)),
            (Idx::BOOL, Literal::Bool(record.is_void)),
        ];
        let mut members = Vec::with_capacity(literals.len());
        for (i, (ty, literal)) in (0u32..).zip(literals) {
            members.push((i, self.constant(ty, literal).var));
        }

        let dst = self.b.temp(info_ty);
        self.b.emit(Inst::Construct { dst, members });
        Ok(Value {
            var: dst,
            ty: info_ty,
        })
    }

    // ── Operators ──────────────────────────────────────────────────

    fn lower_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        expected: Option<Idx>,
    ) -> Result<Value, LowerError> {
        let value = self.lower_expr(operand, expected)?;
        let flags = self.cx.pool.flags(value.ty);
        let ok = match op {
            UnaryOp::Neg => flags.intersects(TypeFlags::IS_INTEGER | TypeFlags::IS_FLOAT),
            UnaryOp::BitNot => flags.contains(TypeFlags::IS_INTEGER),
            UnaryOp::Not => value.ty == Idx::BOOL,
        };
        if !ok {
            return Err(LowerError::UnsupportedOperation {
                detail: format!("unary operator on `{}`", self.cx.display(value.ty)),
            });
        }
        let dst = self.b.temp(value.ty);
        self.b.emit(Inst::Unary {
            dst,
            op,
            operand: value.var,
        });
        Ok(Value { var: dst, ty: value.ty })
    }

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        expected: Option<Idx>,
    ) -> Result<Value, LowerError> {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            return self.lower_short_circuit(op, lhs, rhs);
        }

        let operand_hint = if op.yields_bool() { None } else { expected };
        // A literal operand takes its type from the other side; literals have
        // no side effects, so evaluating it second is unobservable.
        let (l, r) = if is_literal(lhs) && !is_literal(rhs) {
            let r = self.lower_expr(rhs, operand_hint)?;
            let l = self.lower_expr(lhs, Some(r.ty))?;
            (l, r)
        } else {
            let l = self.lower_expr(lhs, operand_hint)?;
            let l = self.hold(l, [rhs]);
            let r = self.lower_expr(rhs, Some(l.ty))?;
            (l, r)
        };
        if l.ty != r.ty {
            return Err(self.mismatch(l.ty, r.ty));
        }

        let flags = self.cx.pool.flags(l.ty);
        let numeric = flags.intersects(TypeFlags::IS_INTEGER | TypeFlags::IS_FLOAT);
        let ok = match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => numeric,
            BinaryOp::Rem
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::Shl
            | BinaryOp::Shr => flags.contains(TypeFlags::IS_INTEGER),
            BinaryOp::Eq | BinaryOp::Ne => flags.is_scalar(),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                numeric || flags.contains(TypeFlags::IS_POINTER)
            }
            BinaryOp::And | BinaryOp::Or => false,
        };
        if !ok {
            return Err(LowerError::UnsupportedOperation {
                detail: format!("`{}` on `{}`", op.symbol(), self.cx.display(l.ty)),
            });
        }

        let ty = if op.yields_bool() { Idx::BOOL } else { l.ty };
        let dst = self.b.temp(ty);
        self.b.emit(Inst::Binary {
            dst,
            op,
            lhs: l.var,
            rhs: r.var,
        });
        Ok(Value { var: dst, ty })
    }

    /// `a && b` / `a || b`: `b` is evaluated only when it decides the result.
    fn lower_short_circuit(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<Value, LowerError> {
        let result = self.b.temp(Idx::BOOL);
        let l = self.lower_bool(lhs)?;
        self.b.emit(Inst::Copy {
            dst: result,
            src: l.var,
        });

        let eval_rhs = self.b.new_block();
        let merge = self.b.new_block();
        let (then_block, else_block) = match op {
            BinaryOp::And => (eval_rhs, merge),
            _ => (merge, eval_rhs),
        };
        self.b.terminate(Terminator::Branch {
            cond: l.var,
            then_block,
            else_block,
        });

        self.b.position_at(eval_rhs);
        let r = self.lower_bool(rhs)?;
        self.b.emit(Inst::Copy {
            dst: result,
            src: r.var,
        });
        self.b.terminate(Terminator::Jump(merge));

        self.b.position_at(merge);
        Ok(Value {
            var: result,
            ty: Idx::BOOL,
        })
    }

    pub(crate) fn lower_bool(&mut self, expr: &Expr) -> Result<Value, LowerError> {
        let value = self.lower_expr(expr, Some(Idx::BOOL))?;
        if value.ty != Idx::BOOL {
            return Err(self.mismatch(Idx::BOOL, value.ty));
        }
        Ok(value)
    }

    /// Keep an already evaluated `value` stable while `later` operands are
    /// evaluated: a local read is copied out when one of them may write.
    pub(super) fn hold<'e>(
        &mut self,
        value: Value,
        later: impl IntoIterator<Item = &'e Expr>,
    ) -> Value {
        if later.into_iter().all(is_pure) {
            value
        } else {
            self.detach(value)
        }
    }
}

pub(super) fn is_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::Int(_) | Expr::Float(_))
}

/// Evaluating `expr` neither calls code nor writes memory.
fn is_pure(expr: &Expr) -> bool {
    match expr {
        Expr::Int(_)
        | Expr::Float(_)
        | Expr::Bool(_)
        | Expr::Path(_)
        | Expr::ErrorLit(_)
        | Expr::EnumVariant { .. }
        | Expr::SizeOf(_)
        | Expr::AlignOf(_)
        | Expr::TypeInfoOf(_) => true,
        Expr::Field { base: inner, .. }
        | Expr::TupleField { base: inner, .. }
        | Expr::Deref(inner)
        | Expr::AddrOf { operand: inner, .. }
        | Expr::Unary { operand: inner, .. }
        | Expr::UnionLit { value: inner, .. } => is_pure(inner),
        Expr::Index { base, index } => is_pure(base) && is_pure(index),
        Expr::Binary { lhs, rhs, .. } => is_pure(lhs) && is_pure(rhs),
        Expr::SliceOf { base, start, len } => is_pure(base) && is_pure(start) && is_pure(len),
        Expr::StructLit { fields, .. } => fields.iter().all(|(_, e)| is_pure(e)),
        Expr::ArrayLit { elems, .. } | Expr::TupleLit(elems) => elems.iter().all(is_pure),
        Expr::Call { .. } | Expr::MethodCall { .. } | Expr::Try(_) | Expr::Catch { .. } => false,
    }
}
