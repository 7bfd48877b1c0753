//! Pass C expression leave-handlers (spec.md S4.5 "Literal typing" through
//! "Ternary"). One method per expression shape, each assigning
//! `expr.resolved_type` and occasionally rewriting the node in place
//! (implicit casts, array-to-pointer decay, NULL-type propagation).

use cminor_ast::{
    AssignOp, BasicType, BinaryOp, CastKind, Expression, ExpressionKind, FunctionRef, IdentifierExpr,
    IdentifierResolution, Location, SizeofOperand, StructMember, TypeSpecifier,
};
use std::rc::Rc;

use super::Analyzer;

impl<'idx> Analyzer<'idx> {
    pub(super) fn analyze_expr(&mut self, expr: &mut Expression) {
        let loc = expr.location.clone();
        let ty = match &mut expr.kind {
            ExpressionKind::Bool(_) => TypeSpecifier::basic(BasicType::Bool),
            ExpressionKind::Null => TypeSpecifier::void_pointer(),
            ExpressionKind::Str(_) => TypeSpecifier::basic(BasicType::Char).pointer_to(),
            ExpressionKind::Int(_) => TypeSpecifier::basic(BasicType::Int),
            ExpressionKind::UInt(_) => TypeSpecifier::unsigned_basic(BasicType::Int),
            ExpressionKind::Long(_) => TypeSpecifier::basic(BasicType::Long),
            ExpressionKind::ULong(_) => TypeSpecifier::unsigned_basic(BasicType::Long),
            ExpressionKind::Float(_) => TypeSpecifier::basic(BasicType::Float),
            ExpressionKind::Double(_) => TypeSpecifier::basic(BasicType::Double),

            ExpressionKind::Identifier(id) => self.resolve_identifier(id, &loc),

            ExpressionKind::IncDec { target, .. } => {
                self.analyze_expr(target);
                target.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int))
            }

            ExpressionKind::Minus(inner) | ExpressionKind::Plus(inner) => {
                self.analyze_expr(inner);
                let ity = inner.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
                if !ity.is_numeric() {
                    self.log(loc.clone(), "unary +/- requires a numeric operand");
                }
                crate::types::unary_promote(&ity)
            }

            ExpressionKind::LogicalNot(inner) => {
                self.analyze_expr(inner);
                let ity = inner.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
                if !condition_compatible(&ity) {
                    self.log(
                        loc.clone(),
                        "'!' requires bool, small integer, or pointer; use an explicit comparison for long/float/double",
                    );
                }
                TypeSpecifier::basic(BasicType::Bool)
            }

            ExpressionKind::BitNot(inner) => {
                self.analyze_expr(inner);
                let ity = inner.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
                if !ity.is_integral() {
                    self.log(loc.clone(), "'~' requires an integral operand");
                }
                crate::types::unary_promote(&ity)
            }

            ExpressionKind::Address(inner) => self.analyze_address_of(inner, &loc),

            ExpressionKind::Dereference(inner) => {
                self.analyze_expr(inner);
                let ity = inner.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
                match ity {
                    TypeSpecifier::Pointer { inner: elem, .. } => *elem,
                    TypeSpecifier::Array { element, .. } => *element,
                    _ => {
                        self.log(loc.clone(), "'*' requires a pointer or array operand");
                        TypeSpecifier::basic(BasicType::Int)
                    }
                }
            }

            ExpressionKind::Sizeof(s) => {
                match &mut s.operand {
                    SizeofOperand::Type(ty) => {
                        *ty = super::resolve_named_leaves(ty, self.index);
                        s.computed_value = 0;
                    }
                    SizeofOperand::Expr(inner) => {
                        self.analyze_expr(inner);
                        let ity = inner.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
                        match &ity {
                            TypeSpecifier::Array { .. } => {
                                s.computed_value = crate::types::compute_array_size(&ity).unwrap_or(1);
                            }
                            TypeSpecifier::Pointer { .. } if matches!(inner.kind, ExpressionKind::Dereference(_)) => {
                                s.computed_value = 1;
                            }
                            _ => {
                                self.log(
                                    loc.clone(),
                                    "sizeof expr requires an array identifier or an array dereference, not a raw pointer",
                                );
                                s.computed_value = 1;
                            }
                        }
                    }
                }
                TypeSpecifier::unsigned_basic(BasicType::Long)
            }

            ExpressionKind::Binary(op, lhs, rhs) => self.analyze_binary(*op, lhs, rhs, &loc),

            ExpressionKind::LogicalAnd(lhs, rhs) | ExpressionKind::LogicalOr(lhs, rhs) => {
                self.analyze_expr(lhs);
                self.analyze_expr(rhs);
                self.check_condition(lhs, "&&/|| operand");
                self.check_condition(rhs, "&&/|| operand");
                TypeSpecifier::basic(BasicType::Bool)
            }

            ExpressionKind::Assign(assign) => {
                self.analyze_expr(&mut assign.left);
                self.analyze_expr(&mut assign.right);
                let target = assign.left.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
                if assign.op == AssignOp::Assign {
                    self.check_assignment(&target, &mut assign.right, false);
                } else {
                    self.check_assignment(&target, &mut assign.right, true);
                }
                target
            }

            ExpressionKind::Cast(_, inner) => {
                self.analyze_expr(inner);
                expr.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int))
            }

            ExpressionKind::TypeCast(ty, inner) => {
                self.analyze_expr(inner);
                super::resolve_named_leaves(ty, self.index)
            }

            ExpressionKind::Array(arr) => {
                self.analyze_expr(&mut arr.array);
                self.analyze_expr(&mut arr.index);
                let base = arr.array.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
                let elem = match &base {
                    TypeSpecifier::Array { element, .. } => (**element).clone(),
                    TypeSpecifier::Pointer { inner, .. } => (**inner).clone(),
                    _ => {
                        self.log(loc.clone(), "subscript requires an array or pointer operand");
                        TypeSpecifier::basic(BasicType::Int)
                    }
                };
                self.check_assignment(&TypeSpecifier::basic(BasicType::Int), &mut arr.index, false);
                elem
            }

            ExpressionKind::Member(member) => {
                self.analyze_expr(&mut member.target);
                let target_ty = member.target.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
                self.resolve_member(&target_ty, &member.member_name, member.via_pointer, &loc)
            }

            ExpressionKind::InitializerList(elements) => {
                for e in elements.iter_mut() {
                    self.analyze_expr(e);
                }
                TypeSpecifier::basic(BasicType::Int)
            }

            ExpressionKind::DesignatedInitializer(d) => {
                self.analyze_expr(&mut d.value);
                d.value.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int))
            }

            ExpressionKind::Conditional(cond) => {
                self.analyze_expr(&mut cond.condition);
                self.check_condition(&cond.condition, "ternary condition");
                self.analyze_expr(&mut cond.then_expr);
                self.analyze_expr(&mut cond.else_expr);
                self.unify_ternary(&mut cond.then_expr, &mut cond.else_expr, &loc)
            }

            ExpressionKind::Comma(lhs, rhs) => {
                self.analyze_expr(lhs);
                self.analyze_expr(rhs);
                rhs.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int))
            }

            ExpressionKind::ArrayToPointer(inner) => {
                self.analyze_expr(inner);
                inner.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int)).decay()
            }

            ExpressionKind::Call(call) => self.analyze_call(call, &loc),
        };
        expr.resolved_type = Some(ty);
    }

    /// Resolves an identifier against the scope stack, then this TU's own
    /// globals, then the header index's globals, then the function table,
    /// then the enum-member table (spec.md S4.5 "Identifier resolution").
    fn resolve_identifier(&mut self, id: &mut IdentifierExpr, loc: &Location) -> TypeSpecifier {
        if let Some(decl) = self.find_local(&id.name) {
            id.resolution = IdentifierResolution::Variable(decl.clone());
            return decl.resolved_type.borrow().clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
        }
        if let Some(decl) = self.index.find_declaration(&id.name) {
            id.resolution = IdentifierResolution::Variable(decl.clone());
            return decl.resolved_type.borrow().clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
        }
        if let Some(func) = self.index.find_function(&id.name) {
            id.resolution = IdentifierResolution::Function(func.clone());
            return func.return_type.borrow().clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
        }
        if let Some(member) = self.index.find_enum_member(&id.name) {
            id.resolution = IdentifierResolution::EnumMember(member.clone());
            return TypeSpecifier::basic(BasicType::Int);
        }
        self.log(loc.clone(), format!("unresolved identifier {:?}", id.name));
        id.resolution = IdentifierResolution::Unresolved;
        TypeSpecifier::basic(BasicType::Int)
    }

    /// `&lval` (spec.md S4.5 "Unary"). Identifiers pointing at a
    /// non-global, non-static local get `needs_heap_lift` set; member
    /// access through a pointer or array subscript is already on the heap;
    /// `&s.member` where `s` is a stack struct is an explicit diagnostic.
    fn analyze_address_of(&mut self, inner: &mut Expression, loc: &Location) -> TypeSpecifier {
        self.analyze_expr(inner);
        let pointee = inner.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
        match &inner.kind {
            ExpressionKind::Identifier(id) => {
                if let IdentifierResolution::Variable(decl) = &id.resolution {
                    if !decl.is_static && !decl.is_extern.get() && self.find_local(&decl.name).is_some() {
                        decl.needs_heap_lift.set(true);
                    }
                }
            }
            ExpressionKind::Member(member) if member.via_pointer => {}
            ExpressionKind::Array(_) => {}
            ExpressionKind::Member(_) => {
                self.log(
                    loc.clone(),
                    "cannot take the address of a member of a stack-allocated struct",
                );
            }
            _ => {}
        }
        pointee.pointer_to()
    }

    fn analyze_binary(&mut self, op: BinaryOp, lhs: &mut Expression, rhs: &mut Expression, loc: &Location) -> TypeSpecifier {
        self.analyze_expr(lhs);
        self.analyze_expr(rhs);
        let lty = lhs.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
        let rty = rhs.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));

        if matches!(op, BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Lt | BinaryOp::Le) {
            return self.analyze_relational(lty, rty, loc);
        }
        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            return self.analyze_equality(lhs, rhs, lty, rty, loc);
        }

        let l_ptr = lty.is_pointer() || lty.is_array();
        let r_ptr = rty.is_pointer() || rty.is_array();
        if l_ptr || r_ptr {
            return self.analyze_pointer_arith(op, lhs, rhs, lty, rty, loc);
        }

        if !lty.is_numeric() || !rty.is_numeric() {
            self.log(loc.clone(), "arithmetic operand must be numeric");
            return TypeSpecifier::basic(BasicType::Int);
        }
        if lty.is_enum() && rty.is_enum() && !crate::types::equals(&lty, &rty) {
            self.log(loc.clone(), "mixing distinct enum types in an arithmetic expression");
        }
        if matches!(op, BinaryOp::Div | BinaryOp::Mod) && !crate::types::mixed_signedness_allowed(&lty, &rty) {
            self.log(loc.clone(), "division/modulo requires matching signedness");
        }
        let result = crate::types::binary_promote(&lty, &rty);
        insert_widening_cast(lhs, &result);
        insert_widening_cast(rhs, &result);
        result
    }

    fn analyze_relational(&mut self, lty: TypeSpecifier, rty: TypeSpecifier, loc: &Location) -> TypeSpecifier {
        if lty.is_pointer() && rty.is_pointer() {
            if !crate::types::equals(&lty, &rty) {
                self.log(loc.clone(), "comparison requires identical pointer types");
            }
            return TypeSpecifier::basic(BasicType::Bool);
        }
        if lty.is_pointer() || rty.is_pointer() {
            self.log(loc.clone(), "cannot compare a pointer with a non-pointer; use NULL for null checks");
            return TypeSpecifier::basic(BasicType::Bool);
        }
        if !crate::types::mixed_signedness_allowed(&lty, &rty) {
            self.log(loc.clone(), "comparison requires matching signedness");
        }
        TypeSpecifier::basic(BasicType::Bool)
    }

    /// `== !=`: any two pointers are comparable (NULL checks); NULL's
    /// void-pointer type is propagated onto the concrete side; bare `int 0`
    /// against a pointer is rejected (spec.md S4.5 "Comparisons").
    fn analyze_equality(
        &mut self,
        lhs: &mut Expression,
        rhs: &mut Expression,
        lty: TypeSpecifier,
        rty: TypeSpecifier,
        loc: &Location,
    ) -> TypeSpecifier {
        let l_ptr = lty.is_pointer();
        let r_ptr = rty.is_pointer();
        if l_ptr && r_ptr {
            if lty.is_void_pointer() {
                lhs.resolved_type = Some(rty);
            } else if rty.is_void_pointer() {
                rhs.resolved_type = Some(lty);
            }
            return TypeSpecifier::basic(BasicType::Bool);
        }
        if l_ptr && matches!(rhs.kind, ExpressionKind::Int(0)) {
            self.log(loc.clone(), "comparing a pointer to 'int 0'; use NULL instead");
        } else if r_ptr && matches!(lhs.kind, ExpressionKind::Int(0)) {
            self.log(loc.clone(), "comparing a pointer to 'int 0'; use NULL instead");
        } else if l_ptr != r_ptr {
            self.log(loc.clone(), "cannot compare a pointer with a non-pointer; use NULL for null checks");
        } else if !crate::types::mixed_signedness_allowed(&lty, &rty) {
            self.log(loc.clone(), "comparison requires matching signedness");
        }
        TypeSpecifier::basic(BasicType::Bool)
    }

    fn analyze_pointer_arith(
        &mut self,
        op: BinaryOp,
        lhs: &mut Expression,
        rhs: &mut Expression,
        lty: TypeSpecifier,
        rty: TypeSpecifier,
        loc: &Location,
    ) -> TypeSpecifier {
        let l_ptr = lty.is_pointer() || lty.is_array();
        let r_ptr = rty.is_pointer() || rty.is_array();
        match op {
            BinaryOp::Add if l_ptr && rty.is_integral() => lty.decay(),
            BinaryOp::Add if r_ptr && lty.is_integral() => rty.decay(),
            BinaryOp::Sub if l_ptr && rty.is_integral() => lty.decay(),
            BinaryOp::Sub if l_ptr && r_ptr => {
                if !crate::types::equals(&lty.decay(), &rty.decay()) {
                    self.log(loc.clone(), "pointer subtraction requires identical pointer types");
                }
                TypeSpecifier::basic(BasicType::Int)
            }
            _ => {
                self.log(loc.clone(), "invalid pointer arithmetic");
                TypeSpecifier::basic(BasicType::Int)
            }
        }
    }

    pub(super) fn check_condition(&mut self, e: &Expression, what: &str) {
        let ty = e.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
        if !condition_compatible(&ty) {
            self.log(
                e.location.clone(),
                format!(
                    "{} must be bool, small integer, or pointer; long/float/double require an explicit comparison",
                    what
                ),
            );
        }
    }

    fn unify_ternary(&mut self, then_expr: &mut Expression, else_expr: &mut Expression, loc: &Location) -> TypeSpecifier {
        let tty = then_expr.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
        let ety = else_expr.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
        if crate::types::equals(&tty, &ety) {
            return tty;
        }
        if tty.is_void_pointer() && ety.is_pointer() {
            then_expr.resolved_type = Some(ety.clone());
            return ety;
        }
        if ety.is_void_pointer() && tty.is_pointer() {
            else_expr.resolved_type = Some(tty.clone());
            return tty;
        }
        if tty.is_numeric() && ety.is_numeric() {
            let result = crate::types::binary_promote(&tty, &ety);
            insert_widening_cast(then_expr, &result);
            insert_widening_cast(else_expr, &result);
            return result;
        }
        self.log(loc.clone(), "ternary branches have incompatible types");
        tty
    }

    /// `s.m` / `p->m`: looks the member up on the canonical struct type
    /// (spec.md S4.5 "Member access").
    fn resolve_member(&mut self, target_ty: &TypeSpecifier, member_name: &str, via_pointer: bool, loc: &Location) -> TypeSpecifier {
        let struct_ty = if via_pointer {
            match target_ty {
                TypeSpecifier::Pointer { inner, .. } => (**inner).clone(),
                _ => {
                    self.log(loc.clone(), "'->' requires a pointer operand");
                    return TypeSpecifier::basic(BasicType::Int);
                }
            }
        } else {
            if target_ty.is_pointer() {
                self.log(loc.clone(), "use '->' to access a member through a pointer");
                return TypeSpecifier::basic(BasicType::Int);
            }
            target_ty.clone()
        };
        let canonical = crate::types::canonical(&struct_ty, self.index);
        let members: Option<Rc<Vec<Rc<StructMember>>>> = match &canonical {
            TypeSpecifier::Named { members: Some(m), .. } => Some(m.clone()),
            _ => None,
        };
        match members.and_then(|m| m.iter().find(|mem| mem.name == member_name).cloned()) {
            Some(member) => member.resolved_type.borrow().clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int)),
            None => {
                self.log(loc.clone(), format!("unknown struct member {:?}", member_name));
                TypeSpecifier::basic(BasicType::Int)
            }
        }
    }

    fn analyze_call(&mut self, call: &mut cminor_ast::FunctionCallExpr, loc: &Location) -> TypeSpecifier {
        let mut callee_name: Option<String> = None;
        let mut resolved_func: Option<FunctionRef> = None;
        if let ExpressionKind::Identifier(id) = &mut call.callee.kind {
            if let Some(func) = self.index.find_function(&id.name) {
                id.resolution = IdentifierResolution::Function(func.clone());
                call.callee.resolved_type = func.return_type.borrow().clone();
                callee_name = Some(id.name.clone());
                resolved_func = Some(func);
            } else {
                self.analyze_expr(&mut call.callee);
                callee_name = Some(id.name.clone());
            }
        } else {
            self.analyze_expr(&mut call.callee);
        }

        for arg in call.arguments.iter_mut() {
            self.analyze_expr(arg);
        }

        let result_ty = if let Some(func) = &resolved_func {
            self.check_call_arguments(func, call, loc);
            func.return_type.borrow().clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int))
        } else {
            match callee_name.as_deref() {
                Some("calloc") => self.check_calloc(call, loc),
                Some("va_start") | Some("va_end") => TypeSpecifier::basic(BasicType::Void),
                Some("va_arg") => call.arguments.last().and_then(|a| a.resolved_type.clone()).unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int)),
                _ => {
                    self.log(loc.clone(), format!("call to unresolved function {:?}", callee_name.unwrap_or_default()));
                    TypeSpecifier::basic(BasicType::Int)
                }
            }
        };
        result_ty
    }

    fn check_call_arguments(&mut self, func: &FunctionRef, call: &mut cminor_ast::FunctionCallExpr, loc: &Location) {
        let fixed = func.fixed_param_count();
        if func.is_variadic {
            if call.arguments.len() < fixed {
                self.log(loc.clone(), format!("too few arguments to {:?}: expected at least {}, found {}", func.name, fixed, call.arguments.len()));
            }
        } else if call.arguments.len() != fixed {
            self.log(loc.clone(), format!("argument count mismatch calling {:?}: expected {}, found {}", func.name, fixed, call.arguments.len()));
        }
        let params: Vec<_> = func.params.iter().filter(|p| !p.is_ellipsis).cloned().collect();
        for (param, arg) in params.iter().zip(call.arguments.iter_mut()) {
            let target = param.resolved_type.borrow().clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
            self.check_assignment(&target, arg, false);
        }
    }

    /// `calloc(n, sizeof(T))`: the second argument must be a `sizeof(type)`
    /// expression (spec.md S4.5 "Function calls").
    fn check_calloc(&mut self, call: &cminor_ast::FunctionCallExpr, loc: &Location) -> TypeSpecifier {
        if call.arguments.len() != 2 {
            self.log(loc.clone(), "calloc requires exactly two arguments");
            return TypeSpecifier::void_pointer();
        }
        match &call.arguments[1].kind {
            ExpressionKind::Sizeof(s) if matches!(s.operand, SizeofOperand::Type(_)) => {}
            _ => self.log(loc.clone(), "calloc's second argument must be sizeof(type)"),
        }
        TypeSpecifier::void_pointer()
    }
}

/// True if `ty` is legal in a condition position (spec.md S4.5 "Logical
/// && || and conditions"): bool, small integer, or pointer; long/float/
/// double are explicitly rejected.
fn condition_compatible(ty: &TypeSpecifier) -> bool {
    match ty {
        TypeSpecifier::Basic {
            basic_type: BasicType::Bool | BasicType::Char | BasicType::Short | BasicType::Int,
            ..
        } => true,
        TypeSpecifier::Pointer { .. } => true,
        TypeSpecifier::Named { basic_type: BasicType::Enum, .. } => true,
        _ => false,
    }
}

fn insert_widening_cast(e: &mut Expression, target: &TypeSpecifier) {
    let current = e.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
    if crate::types::equals(&current, target) {
        return;
    }
    if let Some(kind) = widening_cast_kind(&current, target) {
        let loc = e.location.clone();
        let taken = std::mem::replace(e, Expression::new(ExpressionKind::Null, loc));
        *e = taken.wrap_cast(kind, target.clone());
    } else {
        e.resolved_type = Some(target.clone());
    }
}

fn widening_cast_kind(from: &TypeSpecifier, to: &TypeSpecifier) -> Option<CastKind> {
    use BasicType::*;
    let (fb, fu) = match from {
        TypeSpecifier::Basic { basic_type, is_unsigned, .. } => (*basic_type, *is_unsigned),
        TypeSpecifier::Named { basic_type: Enum, .. } => (Int, false),
        _ => return None,
    };
    let tb = match to {
        TypeSpecifier::Basic { basic_type, .. } => *basic_type,
        _ => return None,
    };
    match (fb, tb) {
        (Char, Int) if fu => Some(CastKind::UCharToInt),
        (Char, Int) => Some(CastKind::CharToInt),
        (Short, Int) if fu => Some(CastKind::UShortToInt),
        (Short, Int) => Some(CastKind::ShortToInt),
        (Int, Long) if fu => Some(CastKind::UIntToULong),
        (Int, Long) => Some(CastKind::IntToLong),
        (Int, Float) => Some(CastKind::IntToFloat),
        (Int, Double) => Some(CastKind::IntToDouble),
        (Long, Float) => Some(CastKind::LongToFloat),
        (Long, Double) => Some(CastKind::LongToDouble),
        (Float, Double) => Some(CastKind::FloatToDouble),
        _ => None,
    }
}

/// Inserts whatever cast node applies to a literal-fits assignment
/// (`check_numeric_assignment`'s fast path), trying the widening pairs
/// first and falling back to a narrowing pair. spec.md S4.5 "Assignment"
/// point 4's "insert the cast silently" is literal: a fitting `long` or
/// `float`/`double` literal narrowed into a smaller numeric type still
/// gets a cast node, just no diagnostic - matching `meanvisitor.c`'s
/// fitting-narrow branches, which build the cast node and explicitly
/// don't return early ("we still need JVM type conversion").
fn insert_literal_fit_cast(e: &mut Expression, target: &TypeSpecifier) {
    let current = e.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
    if crate::types::equals(&current, target) {
        return;
    }
    let kind = widening_cast_kind(&current, target).or_else(|| match (&current, target) {
        (TypeSpecifier::Basic { basic_type: fb, .. }, TypeSpecifier::Basic { basic_type: tb, .. }) => {
            narrowing_cast_kind(*fb, *tb)
        }
        _ => None,
    });
    if let Some(kind) = kind {
        let loc = e.location.clone();
        let taken = std::mem::replace(e, Expression::new(ExpressionKind::Null, loc));
        *e = taken.wrap_cast(kind, target.clone());
    } else {
        e.resolved_type = Some(target.clone());
    }
}

fn narrowing_cast_kind(from: BasicType, to: BasicType) -> Option<CastKind> {
    use BasicType::*;
    match (from, to) {
        (Int, Char) => Some(CastKind::IntToChar),
        (Int, Short) => Some(CastKind::IntToShort),
        (Long, Int) => Some(CastKind::LongToInt),
        (Float, Int) => Some(CastKind::FloatToInt),
        (Float, Long) => Some(CastKind::FloatToLong),
        (Double, Int) => Some(CastKind::DoubleToInt),
        (Double, Long) => Some(CastKind::DoubleToLong),
        (Double, Float) => Some(CastKind::DoubleToFloat),
        _ => None,
    }
}

impl<'idx> Analyzer<'idx> {
    /// The shared 4-point assignment rule (spec.md S4.5 "Assignment"),
    /// reused by initializers, plain `=`, return statements, and
    /// argument-passing. `allow_narrowing` is set for compound assignment
    /// operators, which accept implicit narrowing per Java's rule.
    pub(super) fn check_assignment(&mut self, target: &TypeSpecifier, src: &mut Expression, allow_narrowing: bool) {
        let source = src.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));

        // 1. Array-to-pointer decay / void-pointer (NULL) propagation.
        if let ExpressionKind::ArrayToPointer(_) = &src.kind {
        } else if source.is_array() && target.is_pointer() {
            let loc = src.location.clone();
            let decayed = source.decay();
            let taken = std::mem::replace(src, Expression::new(ExpressionKind::Null, loc));
            *src = taken.wrap_array_to_pointer(decayed);
        }
        if source.is_void_pointer() && target.is_pointer() {
            src.resolved_type = Some(target.clone());
            return;
        }

        let source = src.resolved_type.clone().unwrap_or(source);

        // 2. Same canonical type.
        let ct = crate::types::canonical(target, self.index);
        let cs = crate::types::canonical(&source, self.index);
        if crate::types::equals(&ct, &cs) {
            return;
        }

        // 3. Enum rules.
        if ct.is_enum() || cs.is_enum() {
            if ct.is_enum() && cs.is_enum() {
                self.log(src.location.clone(), "assigning between distinct enum types");
            } else if ct.is_enum() && cs.is_integral() {
                // enum <- int accepted.
            } else if cs.is_enum() && ct.is_integral() {
                // int <- enum accepted.
            } else {
                self.log(src.location.clone(), "incompatible enum assignment");
            }
            return;
        }

        // 4. Numeric rules.
        if ct.is_numeric() && cs.is_numeric() {
            self.check_numeric_assignment(&ct, &cs, src, allow_narrowing);
            return;
        }

        if ct.is_pointer() && cs.is_pointer() {
            if !crate::types::compatible(&ct, &cs, self.index) {
                self.log(src.location.clone(), "assigning between incompatible pointer types");
            }
            return;
        }

        if !crate::types::compatible(&ct, &cs, self.index) {
            self.log(src.location.clone(), "incompatible types in assignment");
        }
    }

    fn check_numeric_assignment(&mut self, target: &TypeSpecifier, source: &TypeSpecifier, src: &mut Expression, allow_narrowing: bool) {
        let (tb, tu) = match target {
            TypeSpecifier::Basic { basic_type, is_unsigned, .. } => (*basic_type, *is_unsigned),
            _ => return,
        };
        let (sb, su) = match source {
            TypeSpecifier::Basic { basic_type, is_unsigned, .. } => (*basic_type, *is_unsigned),
            _ => return,
        };

        if let Some(value) = literal_value(src) {
            if crate::types::value_fits_in(value, su, tb, tu) {
                insert_literal_fit_cast(src, target);
                return;
            }
        }

        if let Some(kind) = widening_cast_kind(source, target) {
            let loc = src.location.clone();
            let taken = std::mem::replace(src, Expression::new(ExpressionKind::Null, loc));
            *src = taken.wrap_cast(kind, target.clone());
            return;
        }

        if tb == sb && tu != su {
            src.resolved_type = Some(target.clone());
            return;
        }

        if tb == sb && tu == su {
            return;
        }

        // Narrowing.
        if allow_narrowing {
            if let Some(kind) = narrowing_cast_kind(sb, tb) {
                let loc = src.location.clone();
                let taken = std::mem::replace(src, Expression::new(ExpressionKind::Null, loc));
                *src = taken.wrap_cast(kind, target.clone());
            } else {
                src.resolved_type = Some(target.clone());
            }
            return;
        }

        if matches!(src.kind, ExpressionKind::TypeCast(_, _)) {
            return;
        }

        self.log(
            src.location.clone(),
            format!(
                "narrowing conversion from {} to {} requires explicit cast",
                basic_keyword(sb),
                basic_keyword(tb)
            ),
        );
    }
}

/// Source-level spelling of a `BasicType`, for diagnostic messages (spec.md
/// S6 keyword set).
pub(super) fn basic_keyword(bt: BasicType) -> &'static str {
    match bt {
        BasicType::Void => "void",
        BasicType::Char => "char",
        BasicType::Short => "short",
        BasicType::Bool => "bool",
        BasicType::Int => "int",
        BasicType::Long => "long",
        BasicType::Float => "float",
        BasicType::Double => "double",
        BasicType::Struct => "struct",
        BasicType::Union => "union",
        BasicType::Enum => "enum",
        BasicType::TypedefName => "typedef",
    }
}

fn literal_value(e: &Expression) -> Option<i64> {
    match &e.kind {
        ExpressionKind::Int(v) => Some(*v as i64),
        ExpressionKind::UInt(v) => Some(*v as i64),
        ExpressionKind::Long(v) => Some(*v),
        ExpressionKind::ULong(v) => Some(*v as i64),
        ExpressionKind::Minus(inner) => literal_value(inner).map(|v| -v),
        _ => None,
    }
}
