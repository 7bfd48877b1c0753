//! Pass C statement walk (spec.md S4.5 "Declarations at statement level"
//! through "Function entry"). Each `StatementKind` variant is a single
//! match arm; compound statements push/pop the scope stack, switches push/
//! pop the switch-type stack.

use cminor_ast::{BasicType, ExpressionKind, StatementKind, TypeSpecifier};

use super::Analyzer;

impl<'idx> Analyzer<'idx> {
    pub(super) fn analyze_statement(&mut self, stmt: &mut cminor_ast::Statement) {
        match &mut stmt.kind {
            StatementKind::Expression(e) => self.analyze_expr(e),

            StatementKind::Declaration(decls) => {
                for decl in decls.iter() {
                    let mut ty = self.index.resolve_parsed_type(&decl.parsed_type);
                    {
                        let mut guard = decl.initializer.borrow_mut();
                        if let Some(init) = guard.as_mut() {
                            self.analyze_expr(init);
                            if let ExpressionKind::InitializerList(elems) = &init.kind {
                                ty = super::infer_incomplete_array_size(ty, elems.len() as i64);
                            }
                        }
                    }
                    *decl.resolved_type.borrow_mut() = Some(ty.clone());
                    {
                        let mut guard = decl.initializer.borrow_mut();
                        if let Some(init) = guard.as_mut() {
                            self.analyze_initializer(init, &ty);
                        }
                    }
                    self.declare_local(decl.clone());
                }
            }

            StatementKind::Compound(stmts) => {
                self.push_scope();
                for s in stmts.iter_mut() {
                    self.analyze_statement(s);
                }
                self.pop_scope();
            }

            StatementKind::If(if_stmt) => {
                self.analyze_expr(&mut if_stmt.condition);
                self.check_condition(&if_stmt.condition, "if condition");
                self.analyze_statement(&mut if_stmt.then_branch);
                if let Some(else_branch) = &mut if_stmt.else_branch {
                    self.analyze_statement(else_branch);
                }
            }

            StatementKind::While(w) => {
                self.analyze_expr(&mut w.condition);
                self.check_condition(&w.condition, "while condition");
                self.analyze_statement(&mut w.body);
            }

            StatementKind::DoWhile(d) => {
                self.analyze_statement(&mut d.body);
                self.analyze_expr(&mut d.condition);
                self.check_condition(&d.condition, "do-while condition");
            }

            StatementKind::For(f) => {
                self.push_scope();
                if let Some(init) = &mut f.init {
                    self.analyze_statement(init);
                }
                if let Some(cond) = &mut f.condition {
                    self.analyze_expr(cond);
                    self.check_condition(cond, "for condition");
                }
                if let Some(step) = &mut f.step {
                    self.analyze_expr(step);
                }
                self.analyze_statement(&mut f.body);
                self.pop_scope();
            }

            StatementKind::Switch(s) => {
                self.analyze_expr(&mut s.subject);
                let ty = s.subject.resolved_type.clone().unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
                self.switch_types.push(ty);
                self.analyze_statement(&mut s.body);
                self.switch_types.pop();
            }

            StatementKind::Case(c) => {
                if let Some(switch_ty) = self.switch_types.last().cloned() {
                    self.check_case_value(c.value, &switch_ty, &stmt.location);
                }
                self.analyze_statement(&mut c.body);
            }

            StatementKind::Default(body) => self.analyze_statement(body),

            StatementKind::Goto(_) | StatementKind::Break | StatementKind::Continue => {}

            StatementKind::Label(l) => self.analyze_statement(&mut l.body),

            StatementKind::Return(expr) => {
                if let Some(e) = expr {
                    self.analyze_expr(e);
                    let declared = self.current_function.as_ref().and_then(|f| f.return_type.borrow().clone());
                    if let Some(declared) = declared {
                        if declared.is_pointer() && e.resolved_type.as_ref().is_some_and(|t| t.is_void_pointer()) {
                            e.resolved_type = Some(declared.clone());
                        }
                        self.check_assignment(&declared, e, false);
                    }
                }
            }
        }
    }

    /// `case` value range-checking against the switch-type stack (spec.md
    /// S4.5 "Switch / case"): the case value must be integral-or-enum
    /// compatible with the subject's type, and for a basic integral subject
    /// the value must fit in its range.
    fn check_case_value(&mut self, value: i64, switch_ty: &TypeSpecifier, loc: &cminor_ast::Location) {
        match switch_ty {
            TypeSpecifier::Basic { basic_type, is_unsigned, .. } => {
                if !crate::types::value_fits_in(value, false, *basic_type, *is_unsigned) {
                    self.log(
                        loc.clone(),
                        format!("case value {} is out of range for switch type {}", value, super::expr::basic_keyword(*basic_type)),
                    );
                }
            }
            TypeSpecifier::Named { basic_type: BasicType::Enum, .. } => {}
            _ => {
                self.log(loc.clone(), "switch subject must be integral or enum");
            }
        }
    }
}
