//! Compile-time constant folding.
//!
//! `const` declarations form a DAG through references. The evaluator folds
//! them on demand with memoization; a reference back into a constant that is
//! still being folded is a cycle and is reported with its path. Integer
//! arithmetic is checked `i64` arithmetic, so overflow is an error rather
//! than a wrap.
//!
//! Folded values end up in a [`ConstTable`], which later passes (array
//! lengths in types, enum tags) evaluate further expressions against.
//!
//! Constants of earlier units are visible through [`ConstEvaluator::with_known`]
//! but never override a declaration of the unit being folded: a name resolves
//! to the unit's own constant first and to a known one only otherwise.

use rustc_hash::{FxHashMap, FxHashSet};
use uya_diagnostic::ErrorCode;
use uya_ir::{BinaryOp, ConstDecl, ConstExpr, Name, StringInterner, TypeExpr, UnaryOp};

use crate::stack::ensure_sufficient_stack;
use crate::{Idx, IntWidth, TypeData};

/// A folded constant.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ConstValue {
    pub fn as_int(self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Natural type of the value when no type is declared. Integers are
    /// `i32` unless the value needs 64 bits.
    pub fn default_type(self) -> Idx {
        match self {
            Self::Int(v) if int_fits(v, IntWidth::W32, true) => Idx::I32,
            Self::Int(_) => Idx::I64,
            Self::Float(_) => Idx::F64,
            Self::Bool(_) => Idx::BOOL,
        }
    }

    fn kind(self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConstError {
    #[error("constants depend on each other in a cycle: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("division by zero while folding `{name}`")]
    DivisionByZero { name: String },

    #[error("integer overflow while folding `{name}`")]
    Overflow { name: String },

    #[error("type mismatch in `{name}`: {detail}")]
    TypeMismatch { name: String, detail: String },

    #[error("unknown constant `{name}`")]
    UnknownConst { name: String },

    #[error("`{name}` is not a compile-time constant")]
    NotConstant { name: String },

    #[error("array length must not be negative, found {value}")]
    NegativeArrayLength { value: i64 },
}

impl ConstError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CircularDependency { .. } => ErrorCode::E4001,
            Self::DivisionByZero { .. } => ErrorCode::E4002,
            Self::Overflow { .. } => ErrorCode::E4003,
            Self::TypeMismatch { .. } => ErrorCode::E4004,
            Self::UnknownConst { .. } => ErrorCode::E4005,
            Self::NotConstant { .. } => ErrorCode::E4006,
            Self::NegativeArrayLength { .. } => ErrorCode::E4007,
        }
    }
}

/// Folded constants of one compilation unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstTable {
    values: FxHashMap<Name, (ConstValue, Idx)>,
}

impl ConstTable {
    pub fn get(&self, name: Name) -> Option<ConstValue> {
        self.values.get(&name).map(|&(v, _)| v)
    }

    /// Folded value together with its (declared or default) type.
    pub fn get_typed(&self, name: Name) -> Option<(ConstValue, Idx)> {
        self.values.get(&name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merge another unit's constants. Later entries win on name clashes.
    pub fn extend(&mut self, other: ConstTable) {
        self.values.extend(other.values);
    }

    /// Fold an expression whose references must already be in the table.
    pub fn eval_expr(
        &self,
        expr: &ConstExpr,
        interner: &StringInterner,
    ) -> Result<ConstValue, ConstError> {
        let cx = Context {
            interner,
            subject: "<expr>",
        };
        fold(expr, &cx, &mut |name| {
            self.get(name).ok_or_else(|| ConstError::UnknownConst {
                name: interner.lookup(name).to_owned(),
            })
        })
    }

    /// Fold an array length: a non-negative integer.
    pub fn array_len(
        &self,
        expr: &ConstExpr,
        interner: &StringInterner,
    ) -> Result<u64, ConstError> {
        match self.eval_expr(expr, interner)? {
            ConstValue::Int(v) => u64::try_from(v).map_err(|_| ConstError::NegativeArrayLength {
                value: v,
            }),
            other => Err(ConstError::TypeMismatch {
                name: "<array length>".to_owned(),
                detail: format!("expected integer, found {}", other.kind()),
            }),
        }
    }
}

/// Memoizing evaluator over a set of `const` declarations.
pub struct ConstEvaluator<'a> {
    interner: &'a StringInterner,
    decls: FxHashMap<Name, &'a ConstDecl>,
    order: Vec<Name>,
    /// Names of non-constant items (functions, types) for better errors.
    runtime: FxHashSet<Name>,
    /// Constants folded by earlier units.
    known: Option<&'a ConstTable>,
    /// Known names that must not be used, because a unit not yet folded
    /// redefines them.
    hidden: FxHashSet<Name>,
    table: ConstTable,
    in_progress: Vec<Name>,
}

impl<'a> ConstEvaluator<'a> {
    pub fn new(decls: impl IntoIterator<Item = &'a ConstDecl>, interner: &'a StringInterner) -> Self {
        let mut map = FxHashMap::default();
        let mut order = Vec::new();
        for decl in decls {
            if map.insert(decl.name, decl).is_none() {
                order.push(decl.name);
            }
        }
        Self {
            interner,
            decls: map,
            order,
            runtime: FxHashSet::default(),
            known: None,
            hidden: FxHashSet::default(),
            table: ConstTable::default(),
            in_progress: Vec::new(),
        }
    }

    /// Resolve names this unit does not declare against constants folded
    /// elsewhere (e.g. earlier units). They are not copied into the result.
    #[must_use]
    pub fn with_known(mut self, known: &'a ConstTable) -> Self {
        self.known = Some(known);
        self
    }

    /// Treat these known names as undeclared.
    #[must_use]
    pub fn with_hidden(mut self, names: impl IntoIterator<Item = Name>) -> Self {
        self.hidden.extend(names);
        self
    }

    /// Register names of non-constant items.
    #[must_use]
    pub fn with_runtime_names(mut self, names: impl IntoIterator<Item = Name>) -> Self {
        self.runtime.extend(names);
        self
    }

    /// Fold the constant `name` and everything it depends on.
    pub fn eval(&mut self, name: Name) -> Result<ConstValue, ConstError> {
        if let Some(value) = self.table.get(name) {
            return Ok(value);
        }
        if let Some(start) = self.in_progress.iter().position(|&n| n == name) {
            let mut path: Vec<String> = self.in_progress[start..]
                .iter()
                .map(|&n| self.interner.lookup(n).to_owned())
                .collect();
            path.push(self.interner.lookup(name).to_owned());
            return Err(ConstError::CircularDependency { path });
        }
        let Some(decl) = self.decls.get(&name).copied() else {
            if let Some(value) = self.known_value(name) {
                return Ok(value);
            }
            let name_str = self.interner.lookup(name).to_owned();
            return Err(if self.runtime.contains(&name) {
                ConstError::NotConstant { name: name_str }
            } else {
                ConstError::UnknownConst { name: name_str }
            });
        };

        self.in_progress.push(name);
        let cx = Context {
            interner: self.interner,
            subject: self.interner.lookup(name),
        };
        let folded = ensure_sufficient_stack(|| fold(&decl.value, &cx, &mut |r| self.eval(r)));
        self.in_progress.pop();

        let (value, ty) = coerce_declared(folded?, decl.ty.as_ref(), &cx)?;
        tracing::trace!(name = cx.subject, ?value, "folded constant");
        self.table.values.insert(name, (value, ty));
        Ok(value)
    }

    fn known_value(&self, name: Name) -> Option<ConstValue> {
        if self.hidden.contains(&name) {
            return None;
        }
        self.known?.get(name)
    }

    /// Fold every declaration, in declaration order. The table holds this
    /// unit's constants only.
    #[tracing::instrument(level = "debug", skip_all, fields(count = self.order.len()))]
    pub fn eval_all(mut self) -> Result<ConstTable, ConstError> {
        for name in self.order.clone() {
            self.eval(name)?;
        }
        Ok(self.table)
    }
}

struct Context<'a> {
    interner: &'a StringInterner,
    /// Constant being folded, for error messages.
    subject: &'a str,
}

impl Context<'_> {
    fn overflow(&self) -> ConstError {
        ConstError::Overflow {
            name: self.subject.to_owned(),
        }
    }

    fn mismatch(&self, detail: String) -> ConstError {
        ConstError::TypeMismatch {
            name: self.subject.to_owned(),
            detail,
        }
    }
}

fn fold(
    expr: &ConstExpr,
    cx: &Context<'_>,
    resolve: &mut dyn FnMut(Name) -> Result<ConstValue, ConstError>,
) -> Result<ConstValue, ConstError> {
    match expr {
        ConstExpr::Int(v) => Ok(ConstValue::Int(*v)),
        ConstExpr::Float(v) => Ok(ConstValue::Float(*v)),
        ConstExpr::Bool(v) => Ok(ConstValue::Bool(*v)),
        ConstExpr::Ref(name) => resolve(*name),
        ConstExpr::Unary { op, operand } => {
            let v = ensure_sufficient_stack(|| fold(operand, cx, resolve))?;
            apply_unary(*op, v, cx)
        }
        ConstExpr::Binary { op, lhs, rhs } => {
            let l = ensure_sufficient_stack(|| fold(lhs, cx, resolve))?;
            let r = ensure_sufficient_stack(|| fold(rhs, cx, resolve))?;
            apply_binary(*op, l, r, cx)
        }
    }
}

fn apply_unary(op: UnaryOp, v: ConstValue, cx: &Context<'_>) -> Result<ConstValue, ConstError> {
    match (op, v) {
        (UnaryOp::Neg, ConstValue::Int(i)) => {
            i.checked_neg().map(ConstValue::Int).ok_or_else(|| cx.overflow())
        }
        (UnaryOp::Neg, ConstValue::Float(f)) => Ok(ConstValue::Float(-f)),
        (UnaryOp::Not, ConstValue::Bool(b)) => Ok(ConstValue::Bool(!b)),
        (UnaryOp::BitNot, ConstValue::Int(i)) => Ok(ConstValue::Int(!i)),
        (op, v) => Err(cx.mismatch(format!("operator {op:?} does not apply to {}", v.kind()))),
    }
}

fn apply_binary(
    op: BinaryOp,
    l: ConstValue,
    r: ConstValue,
    cx: &Context<'_>,
) -> Result<ConstValue, ConstError> {
    use ConstValue::{Bool, Float, Int};

    match (l, r) {
        (Int(a), Int(b)) => int_binary(op, a, b, cx),
        (Float(a), Float(b)) => {
            let value = match op {
                BinaryOp::Add => Float(a + b),
                BinaryOp::Sub => Float(a - b),
                BinaryOp::Mul => Float(a * b),
                BinaryOp::Div => Float(a / b),
                BinaryOp::Eq => Bool(a == b),
                BinaryOp::Ne => Bool(a != b),
                BinaryOp::Lt => Bool(a < b),
                BinaryOp::Le => Bool(a <= b),
                BinaryOp::Gt => Bool(a > b),
                BinaryOp::Ge => Bool(a >= b),
                _ => {
                    return Err(cx.mismatch(format!(
                        "operator `{}` does not apply to floats",
                        op.symbol()
                    )))
                }
            };
            Ok(value)
        }
        (Bool(a), Bool(b)) => {
            let value = match op {
                BinaryOp::And => a && b,
                BinaryOp::Or => a || b,
                BinaryOp::Eq => a == b,
                BinaryOp::Ne => a != b,
                _ => {
                    return Err(cx.mismatch(format!(
                        "operator `{}` does not apply to bools",
                        op.symbol()
                    )))
                }
            };
            Ok(Bool(value))
        }
        (l, r) => Err(cx.mismatch(format!(
            "`{}` between {} and {}",
            op.symbol(),
            l.kind(),
            r.kind()
        ))),
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64, cx: &Context<'_>) -> Result<ConstValue, ConstError> {
    let div_zero = || ConstError::DivisionByZero {
        name: cx.subject.to_owned(),
    };
    let checked = |v: Option<i64>| v.map(ConstValue::Int).ok_or_else(|| cx.overflow());
    let shift = || u32::try_from(b).ok().filter(|&s| s < 64);

    match op {
        BinaryOp::Add => checked(a.checked_add(b)),
        BinaryOp::Sub => checked(a.checked_sub(b)),
        BinaryOp::Mul => checked(a.checked_mul(b)),
        BinaryOp::Div if b == 0 => Err(div_zero()),
        BinaryOp::Div => checked(a.checked_div(b)),
        BinaryOp::Rem if b == 0 => Err(div_zero()),
        BinaryOp::Rem => checked(a.checked_rem(b)),
        BinaryOp::BitAnd => Ok(ConstValue::Int(a & b)),
        BinaryOp::BitOr => Ok(ConstValue::Int(a | b)),
        BinaryOp::BitXor => Ok(ConstValue::Int(a ^ b)),
        BinaryOp::Shl => {
            let s = shift().ok_or_else(|| cx.overflow())?;
            // Bits shifted out of the value are overflow, not truncation.
            let shifted = a.checked_shl(s).filter(|v| v >> s == a);
            checked(shifted)
        }
        BinaryOp::Shr => checked(shift().map(|s| a >> s)),
        BinaryOp::Eq => Ok(ConstValue::Bool(a == b)),
        BinaryOp::Ne => Ok(ConstValue::Bool(a != b)),
        BinaryOp::Lt => Ok(ConstValue::Bool(a < b)),
        BinaryOp::Le => Ok(ConstValue::Bool(a <= b)),
        BinaryOp::Gt => Ok(ConstValue::Bool(a > b)),
        BinaryOp::Ge => Ok(ConstValue::Bool(a >= b)),
        BinaryOp::And | BinaryOp::Or => Err(cx.mismatch(format!(
            "operator `{}` does not apply to integers",
            op.symbol()
        ))),
    }
}

/// Check a folded value against the declared type, converting integer
/// literals to floats where a float is declared.
fn coerce_declared(
    value: ConstValue,
    declared: Option<&TypeExpr>,
    cx: &Context<'_>,
) -> Result<(ConstValue, Idx), ConstError> {
    let Some(declared) = declared else {
        return Ok((value, value.default_type()));
    };
    let ty = match declared {
        TypeExpr::Named { name, args } if args.is_empty() => {
            Idx::from_primitive_name(cx.interner.lookup(*name))
        }
        _ => None,
    }
    .filter(|&ty| ty != Idx::VOID)
    .ok_or_else(|| cx.mismatch("constants must have a primitive type".to_owned()))?;

    let shape = TypeData::primitive(ty);
    match (shape, value) {
        (Some(TypeData::Bool), ConstValue::Bool(_))
        | (Some(TypeData::Float { .. }), ConstValue::Float(_)) => Ok((value, ty)),
        (Some(TypeData::Float { .. }), ConstValue::Int(i)) => {
            Ok((ConstValue::Float(int_to_float(i)), ty))
        }
        (Some(TypeData::Int { width, signed }), ConstValue::Int(i)) => {
            if int_fits(i, width, signed) {
                Ok((value, ty))
            } else {
                Err(cx.overflow())
            }
        }
        (_, value) => Err(cx.mismatch(format!(
            "declared `{}` but value is {}",
            ty,
            value.kind()
        ))),
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "integer literals assigned to float constants round like C"
)]
fn int_to_float(i: i64) -> f64 {
    i as f64
}

/// Whether `v` is representable in an integer of the given shape.
/// Pointer-sized integers are checked against 64 bits.
pub fn int_fits(v: i64, width: IntWidth, signed: bool) -> bool {
    let bits = match width {
        IntWidth::W8 => 8,
        IntWidth::W16 => 16,
        IntWidth::W32 => 32,
        IntWidth::W64 | IntWidth::Ptr => 64,
    };
    if signed {
        bits == 64 || (v >= -(1i64 << (bits - 1)) && v < (1i64 << (bits - 1)))
    } else {
        v >= 0 && (bits == 64 || v < (1i64 << bits))
    }
}
