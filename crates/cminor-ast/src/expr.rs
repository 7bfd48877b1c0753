//! Expression nodes. Each `Expression` owns its sub-tree outright (no
//! sharing within one declaration/function body), so the semantic
//! analyser's AST walk (C5) can rewrite it in place through an ordinary
//! `&mut Expression` - no interior mutability needed here, only on the
//! declarations/typedefs that are shared across a translation unit's
//! header index (see `decl.rs`).
//!
//! Variant shapes follow `ExpressionKind`/the anonymous union in
//! `ast.h`, collapsed into Rust enums where the original split near-
//! identical cases only because C unions can't be generic (e.g. every
//! arithmetic/bitwise/comparison operator becomes one `Binary` variant
//! tagged by `BinaryOp`, matching spec.md S9's note to re-express the
//! visitor table as an exhaustive match).

use crate::decl::{DeclarationRef, EnumMember, FunctionRef};
use crate::types::{CastKind, TypeSpecifier};
use crate::Location;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    LShift,
    RShift,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    LShiftAssign,
    RShiftAssign,
}

impl AssignOp {
    /// Compound assignments allow implicit narrowing (spec.md S4.5
    /// "Assignment" point 4, "per Java's rule").
    pub fn is_compound(&self) -> bool {
        !matches!(self, AssignOp::Assign)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdentifierResolution {
    Unresolved,
    Variable(DeclarationRef),
    Function(FunctionRef),
    EnumMember(Rc<EnumMember>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierExpr {
    pub name: String,
    pub resolution: IdentifierResolution,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCallExpr {
    pub callee: Box<Expression>,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayExpr {
    pub array: Box<Expression>,
    pub index: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpr {
    pub target: Box<Expression>,
    pub member_name: String,
    pub via_pointer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentExpr {
    pub op: AssignOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpr {
    pub condition: Box<Expression>,
    pub then_expr: Box<Expression>,
    pub else_expr: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SizeofOperand {
    Type(TypeSpecifier),
    Expr(Box<Expression>),
}

/// `computed_value`: element count for `sizeof` of an array identifier or
/// `*arr`, `0` for `sizeof(type)` (spec.md S4.5 "sizeof").
#[derive(Debug, Clone, PartialEq)]
pub struct SizeofExpr {
    pub operand: SizeofOperand,
    pub computed_value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignatedInitializer {
    pub field_name: String,
    pub value: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Double(f64),
    Float(f32),
    Long(i64),
    ULong(u64),
    Bool(bool),
    /// The literal `NULL`; typed `void*` until context propagates a
    /// concrete pointer type onto it (spec.md S4.5 "Literal typing").
    Null,
    Int(i32),
    UInt(u32),
    /// Length-prefixed bytes; embedded nulls are legal (spec.md S4.1
    /// "Token emission").
    Str(Vec<u8>),
    Identifier(IdentifierExpr),
    IncDec {
        target: Box<Expression>,
        is_increment: bool,
        is_prefix: bool,
    },
    Call(FunctionCallExpr),
    Minus(Box<Expression>),
    Plus(Box<Expression>),
    LogicalNot(Box<Expression>),
    BitNot(Box<Expression>),
    Address(Box<Expression>),
    Dereference(Box<Expression>),
    Sizeof(SizeofExpr),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    LogicalAnd(Box<Expression>, Box<Expression>),
    LogicalOr(Box<Expression>, Box<Expression>),
    Assign(AssignmentExpr),
    /// Implicit conversion inserted by semantic analysis.
    Cast(CastKind, Box<Expression>),
    /// Explicit `(T)expr` written by the user.
    TypeCast(TypeSpecifier, Box<Expression>),
    Array(ArrayExpr),
    Member(MemberExpr),
    InitializerList(Vec<Expression>),
    DesignatedInitializer(DesignatedInitializer),
    Conditional(ConditionalExpr),
    Comma(Box<Expression>, Box<Expression>),
    /// Array-to-pointer decay, inserted by semantic analysis.
    ArrayToPointer(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub resolved_type: Option<TypeSpecifier>,
    pub location: Location,
}

impl Expression {
    pub fn new(kind: ExpressionKind, location: Location) -> Self {
        Expression {
            kind,
            resolved_type: None,
            location,
        }
    }

    pub fn ty(&self) -> Option<&TypeSpecifier> {
        self.resolved_type.as_ref()
    }

    /// Wrap `self` in an implicit cast node, inheriting its location.
    pub fn wrap_cast(self, cast: CastKind, result_type: TypeSpecifier) -> Expression {
        let location = self.location.clone();
        Expression {
            resolved_type: Some(result_type),
            location,
            kind: ExpressionKind::Cast(cast, Box::new(self)),
        }
    }

    pub fn wrap_array_to_pointer(self, result_type: TypeSpecifier) -> Expression {
        let location = self.location.clone();
        Expression {
            resolved_type: Some(result_type),
            location,
            kind: ExpressionKind::ArrayToPointer(Box::new(self)),
        }
    }
}
