//! Item-level AST consumed by the backend.
//!
//! This is the boundary between the front end and the backend core: the
//! declarations of one compilation unit plus the bodies of its functions.
//! Types are written as [`TypeExpr`]s (unresolved syntax); resolution to pool
//! indices happens in `uya_mono`.

use crate::Name;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Binary operators shared by constant and body expressions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Comparison and logical operators produce `bool`.
    pub const fn yields_bool(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::And | Self::Or
        )
    }

    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

// ---------------------------------------------------------------------------
// Types and constants
// ---------------------------------------------------------------------------

/// A type as written in source.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    /// `void`
    Void,
    /// A primitive, a user type, a type parameter, or a generic application
    /// such as `Box<i32>`.
    Named { name: Name, args: Vec<TypeExpr> },
    /// `&T` / `*T`
    Pointer { pointee: Box<TypeExpr>, mutable: bool },
    /// `[T: N]`, where `N` must fold to a constant.
    Array { elem: Box<TypeExpr>, len: ConstExpr },
    /// `!T`
    ErrorUnion(Box<TypeExpr>),
    /// `&[T]` / `&mut [T]`: pointer plus length.
    Slice { elem: Box<TypeExpr>, mutable: bool },
    /// `(A, B, ...)`
    Tuple(Vec<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: Name) -> Self {
        Self::Named {
            name,
            args: Vec::new(),
        }
    }

    pub fn applied(name: Name, args: Vec<TypeExpr>) -> Self {
        Self::Named { name, args }
    }

    pub fn pointer(pointee: TypeExpr, mutable: bool) -> Self {
        Self::Pointer {
            pointee: Box::new(pointee),
            mutable,
        }
    }

    pub fn array(elem: TypeExpr, len: ConstExpr) -> Self {
        Self::Array {
            elem: Box::new(elem),
            len,
        }
    }

    pub fn error_union(payload: TypeExpr) -> Self {
        Self::ErrorUnion(Box::new(payload))
    }

    pub fn slice(elem: TypeExpr, mutable: bool) -> Self {
        Self::Slice {
            elem: Box::new(elem),
            mutable,
        }
    }
}

/// A compile-time constant expression.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstExpr {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Reference to another `const` declaration.
    Ref(Name),
    Unary {
        op: UnaryOp,
        operand: Box<ConstExpr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<ConstExpr>,
        rhs: Box<ConstExpr>,
    },
}

impl ConstExpr {
    pub fn binary(op: BinaryOp, lhs: ConstExpr, rhs: ConstExpr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOp, operand: ConstExpr) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

/// Body expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// A local, a parameter, or a `const`.
    Path(Name),
    /// `error.Name`
    ErrorLit(Name),
    /// `Enum.Variant`
    EnumVariant { enum_name: Name, variant: Name },
    /// Free function call, with explicit type arguments for generics.
    Call {
        callee: Name,
        type_args: Vec<TypeExpr>,
        args: Vec<Expr>,
    },
    /// `receiver.method(args)`, static for structs, dynamic for interfaces.
    MethodCall {
        receiver: Box<Expr>,
        method: Name,
        args: Vec<Expr>,
    },
    Field { base: Box<Expr>, field: Name },
    Index { base: Box<Expr>, index: Box<Expr> },
    StructLit { ty: TypeExpr, fields: Vec<(Name, Expr)> },
    ArrayLit { elem: TypeExpr, elems: Vec<Expr> },
    /// `(a, b, ...)`
    TupleLit(Vec<Expr>),
    /// `t.0`
    TupleField { base: Box<Expr>, index: u32 },
    /// `Union.variant(value)`: a tagged union holding `variant`.
    UnionLit {
        union_name: Name,
        variant: Name,
        value: Box<Expr>,
    },
    /// `&base[start:len]`: a slice over an array, a slice, or a pointer.
    SliceOf {
        base: Box<Expr>,
        start: Box<Expr>,
        len: Box<Expr>,
    },
    AddrOf { operand: Box<Expr>, mutable: bool },
    Deref(Box<Expr>),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `try e`: propagate a nonzero error id to the caller.
    Try(Box<Expr>),
    /// `e catch |err| { handler; value }`: intercept without propagating.
    Catch {
        operand: Box<Expr>,
        binding: Option<Name>,
        handler: Vec<Stmt>,
        value: Box<Expr>,
    },
    /// `@size_of(T)`
    SizeOf(TypeExpr),
    /// `@align_of(T)`
    AlignOf(TypeExpr),
    /// `@type_info(T)`: the builtin reflection record for `T`.
    TypeInfoOf(TypeExpr),
}

impl Expr {
    pub fn path(name: Name) -> Self {
        Self::Path(name)
    }

    pub fn call(callee: Name, args: Vec<Expr>) -> Self {
        Self::Call {
            callee,
            type_args: Vec::new(),
            args,
        }
    }

    pub fn generic_call(callee: Name, type_args: Vec<TypeExpr>, args: Vec<Expr>) -> Self {
        Self::Call {
            callee,
            type_args,
            args,
        }
    }

    pub fn method_call(receiver: Expr, method: Name, args: Vec<Expr>) -> Self {
        Self::MethodCall {
            receiver: Box::new(receiver),
            method,
            args,
        }
    }

    pub fn field(base: Expr, field: Name) -> Self {
        Self::Field {
            base: Box::new(base),
            field,
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn try_(operand: Expr) -> Self {
        Self::Try(Box::new(operand))
    }

    pub fn addr_of(operand: Expr, mutable: bool) -> Self {
        Self::AddrOf {
            operand: Box::new(operand),
            mutable,
        }
    }
}

/// Body statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Let {
        name: Name,
        ty: Option<TypeExpr>,
        init: Expr,
    },
    Assign { target: Expr, value: Expr },
    Expr(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    While { cond: Expr, body: Vec<Stmt> },
    /// `for binding in iter`: element by element over an array or slice,
    /// otherwise driven by the `next`/`value` iterator protocol.
    For {
        binding: Name,
        iter: Expr,
        body: Vec<Stmt>,
    },
    /// `for start..end |binding|`, or an endless `start..` loop when `end`
    /// is absent.
    ForRange {
        binding: Option<Name>,
        start: Expr,
        end: Option<Expr>,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    /// Runs when the enclosing block is left, after the statements before it.
    Defer(Vec<Stmt>),
    /// Like [`Stmt::Defer`], but only when the function returns an error.
    ErrDefer(Vec<Stmt>),
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: Name,
    pub ty: TypeExpr,
}

impl Param {
    pub fn new(name: Name, ty: TypeExpr) -> Self {
        Self { name, ty }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub name: Name,
    pub ty: TypeExpr,
}

impl FieldDecl {
    pub fn new(name: Name, ty: TypeExpr) -> Self {
        Self { name, ty }
    }
}

/// `struct Name<T...> : I1, I2 { fields }`.
///
/// `fields == None` is a forward declaration; a later declaration with the
/// same name supplies the body.
#[derive(Clone, Debug, PartialEq)]
pub struct StructDecl {
    pub name: Name,
    pub type_params: Vec<Name>,
    pub fields: Option<Vec<FieldDecl>>,
    pub implements: Vec<Name>,
}

/// `union Name { variant: T, ... }`, stored with a tag selecting the active
/// variant.
#[derive(Clone, Debug, PartialEq)]
pub struct UnionDecl {
    pub name: Name,
    pub variants: Vec<FieldDecl>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariantDecl {
    pub name: Name,
    /// Explicit tag value; implicit tags continue from the previous one.
    pub value: Option<ConstExpr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDecl {
    pub name: Name,
    pub underlying: Option<TypeExpr>,
    pub variants: Vec<VariantDecl>,
}

/// Method signature inside an interface; `self` is implicit.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodSig {
    pub name: Name,
    pub params: Vec<Param>,
    pub ret: TypeExpr,
}

/// `interface Name { Embedded; fn m(...) ret; }`.
///
/// Embedded interfaces and own methods keep their relative source order in
/// `members`, which fixes the vtable slot order.
#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceDecl {
    pub name: Name,
    pub members: Vec<InterfaceMember>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InterfaceMember {
    Embed(Name),
    Method(MethodSig),
}

/// Function declaration. `body == None` marks an `extern` C function.
#[derive(Clone, Debug, PartialEq)]
pub struct FnDecl {
    pub name: Name,
    pub type_params: Vec<Name>,
    pub params: Vec<Param>,
    pub ret: TypeExpr,
    pub body: Option<Vec<Stmt>>,
}

impl FnDecl {
    pub fn is_extern(&self) -> bool {
        self.body.is_none()
    }

    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }
}

/// Methods attached to a struct. Each method takes an implicit `self`
/// pointer to the target as its first parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodBlock {
    pub target: Name,
    pub methods: Vec<FnDecl>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstDecl {
    pub name: Name,
    pub ty: Option<TypeExpr>,
    pub value: ConstExpr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Struct(StructDecl),
    Union(UnionDecl),
    Enum(EnumDecl),
    Interface(InterfaceDecl),
    Function(FnDecl),
    Methods(MethodBlock),
    Const(ConstDecl),
}

/// One compilation unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Module {
    pub name: Name,
    pub items: Vec<Item>,
}

impl Module {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    pub fn consts(&self) -> impl Iterator<Item = &ConstDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Const(c) => Some(c),
            _ => None,
        })
    }
}
