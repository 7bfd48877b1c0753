//! Semantic analysis (C5 - "mean-check"): typedef/aggregate resolution
//! (Pass A/B) and a full AST walk (Pass C) that assigns a type to every
//! expression, inserts implicit casts, and marks variables that must be
//! heap-lifted. Grounded on `meanvisitor.c`'s two-pass-then-walk structure
//! in `original_source/`, re-expressed as an exhaustive match per spec.md S9
//! "Dynamic dispatch" instead of a visitor-function table.

mod expr;
mod stmt;

use std::rc::Rc;

use cminor_ast::{BasicType, DeclarationRef, FunctionRef, Location, TypeSpecifier};

use crate::header::{FileDecl, HeaderIndex};

/// A fatal threshold on the number of real diagnostics logged before the
/// analyser stops producing more output (spec.md S4.5 "error log", S8
/// property 6, SPEC_FULL.md supplemented behavior #5: one additional
/// "stopping" line is appended once the cap is hit).
const MAX_DIAGNOSTICS: usize = 200;

/// A single formatted diagnostic. Kept as plain data, not
/// `std::error::Error` - see `error.rs`'s module doc for why.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub location: Location,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Runs Pass A, Pass B, then the Pass C AST walk over `file` - the TU's own
/// source file, not every header absorbed into `index` (SPEC_FULL.md's
/// noted Open Question: re-walking a shared header's bodies once per
/// including TU would duplicate diagnostics non-deterministically across
/// TUs; see DESIGN.md).
pub fn analyze(index: &HeaderIndex, file: &FileDecl) -> Vec<Diagnostic> {
    let mut analyzer = Analyzer::new(index);
    analyzer.run_pass_a();
    analyzer.run_pass_b();
    analyzer.analyze_translation_unit(file);
    analyzer.diagnostics
}

struct Analyzer<'idx> {
    index: &'idx HeaderIndex,
    diagnostics: Vec<Diagnostic>,
    stopped: bool,
    scopes: Vec<Vec<DeclarationRef>>,
    switch_types: Vec<TypeSpecifier>,
    current_function: Option<FunctionRef>,
}

impl<'idx> Analyzer<'idx> {
    fn new(index: &'idx HeaderIndex) -> Self {
        Analyzer {
            index,
            diagnostics: Vec::new(),
            stopped: false,
            scopes: Vec::new(),
            switch_types: Vec::new(),
            current_function: None,
        }
    }

    fn log(&mut self, location: Location, message: impl Into<String>) {
        if self.stopped {
            return;
        }
        self.diagnostics.push(Diagnostic {
            location,
            message: message.into(),
        });
        if self.diagnostics.len() >= MAX_DIAGNOSTICS {
            self.diagnostics.push(Diagnostic {
                location: Location::synthesized(),
                message: "too many errors, stopping analysis".to_string(),
            });
            self.stopped = true;
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare_local(&mut self, decl: DeclarationRef) {
        if let Some(top) = self.scopes.last_mut() {
            top.push(decl);
        }
    }

    /// Current scope stack only - global/function/enum lookup is layered
    /// on top in `expr::resolve_identifier` (spec.md S4.5 "Identifier
    /// resolution").
    fn find_local(&self, name: &str) -> Option<DeclarationRef> {
        self.scopes.iter().rev().find_map(|scope| scope.iter().find(|d| d.name == name).cloned())
    }

    /// Pass A - typedef resolution (spec.md S4.5 "Pass A"). Resolves every
    /// typedef's `parsed_type` first (order-independent), then computes
    /// `canonical` by repeatedly applying `types::canonical` to a fixpoint,
    /// which is robust regardless of which typedef in a chain is visited
    /// first.
    fn run_pass_a(&mut self) {
        for file in self.index.files() {
            for t in file.typedefs.borrow().iter() {
                if t.resolved_type.borrow().is_none() {
                    let resolved = self.index.resolve_parsed_type(&t.parsed_type);
                    *t.resolved_type.borrow_mut() = Some(resolved);
                }
            }
        }
        for file in self.index.files() {
            for t in file.typedefs.borrow().iter() {
                if t.canonical.borrow().is_some() {
                    continue;
                }
                let mut current = t
                    .resolved_type
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| TypeSpecifier::basic(BasicType::Int));
                loop {
                    let next = crate::types::canonical(&current, self.index);
                    if next == current {
                        break;
                    }
                    current = next;
                }
                *t.canonical.borrow_mut() = Some(current);
            }
        }
    }

    /// Pass B - aggregate & function resolution (spec.md S4.5 "Pass B").
    fn run_pass_b(&mut self) {
        for file in self.index.files() {
            for s in file.structs.borrow().iter() {
                for m in s.members.iter() {
                    if m.resolved_type.borrow().is_none() {
                        *m.resolved_type.borrow_mut() = Some(self.index.resolve_parsed_type(&m.parsed_type));
                    }
                }
            }
            for f in file.functions.borrow().iter() {
                if f.return_type.borrow().is_none() {
                    *f.return_type.borrow_mut() = Some(self.index.resolve_parsed_type(&f.return_parsed_type));
                }
                for p in f.params.iter() {
                    if p.is_ellipsis {
                        continue;
                    }
                    if p.resolved_type.borrow().is_none() {
                        *p.resolved_type.borrow_mut() = Some(self.index.resolve_parsed_type(&p.parsed_type));
                    }
                }
            }
        }
    }

    fn analyze_translation_unit(&mut self, file: &FileDecl) {
        let globals: Vec<DeclarationRef> = file.externs.borrow().clone();
        for decl in &globals {
            self.analyze_global_declaration(decl);
        }
        let functions: Vec<FunctionRef> = file.functions.borrow().clone();
        for func in &functions {
            self.analyze_function(func);
        }
    }

    /// Statement-level declaration handling for a top-level (no enclosing
    /// scope) global (spec.md S4.5 "Declarations at statement level").
    fn analyze_global_declaration(&mut self, decl: &DeclarationRef) {
        let mut ty = self.index.resolve_parsed_type(&decl.parsed_type);
        if let Some(init) = decl.initializer.borrow().as_ref() {
            if let cminor_ast::ExpressionKind::InitializerList(elems) = &init.kind {
                ty = infer_incomplete_array_size(ty, elems.len() as i64);
            }
        }
        *decl.resolved_type.borrow_mut() = Some(ty.clone());

        {
            let mut guard = decl.initializer.borrow_mut();
            if let Some(init) = guard.as_mut() {
                self.analyze_initializer(init, &ty);
            }
        }

        if !decl.is_static && !decl.is_extern.get() {
            if let Some(existing) = self.index.find_declaration(&decl.name) {
                if !Rc::ptr_eq(&existing, decl) {
                    existing.is_extern.set(false);
                    *existing.class_name.borrow_mut() = decl.class_name.borrow().clone();
                }
            }
        }
    }

    /// Function entry/exit (spec.md S4.5 "Function entry"). `long`/`double`
    /// parameters take two local-index slots on the target VM's operand
    /// stack.
    fn analyze_function(&mut self, func: &FunctionRef) {
        let return_type = self
            .index
            .resolve_parsed_type(&func.return_parsed_type);
        *func.return_type.borrow_mut() = Some(return_type);

        self.push_scope();
        let mut index_counter: i32 = 0;
        for param in &func.params {
            if param.is_ellipsis {
                continue;
            }
            let resolved = self.index.resolve_parsed_type(&param.parsed_type);
            let wide = matches!(
                resolved,
                TypeSpecifier::Basic {
                    basic_type: BasicType::Long | BasicType::Double,
                    ..
                }
            );
            *param.resolved_type.borrow_mut() = Some(resolved.clone());
            let decl = Rc::new(cminor_ast::Declaration::new(
                param.name.clone(),
                param.parsed_type.clone(),
                param.location.clone(),
                false,
                false,
            ));
            *decl.resolved_type.borrow_mut() = Some(resolved);
            decl.index.set(index_counter);
            index_counter += if wide { 2 } else { 1 };
            *param.decl.borrow_mut() = Some(decl.clone());
            self.declare_local(decl);
        }

        self.current_function = Some(func.clone());
        if let Some(body) = func.body.borrow_mut().as_mut() {
            self.analyze_statement(body);
        }
        self.current_function = None;
        self.pop_scope();
    }

    /// Propagates the declared type recursively into every nested
    /// initialiser list, matching designated initializers by field name
    /// (spec.md S4.5 "Declarations at statement level").
    fn analyze_initializer(&mut self, init: &mut cminor_ast::Expression, declared: &TypeSpecifier) {
        use cminor_ast::ExpressionKind;
        match &mut init.kind {
            ExpressionKind::InitializerList(elements) => {
                let element_ty = match declared {
                    TypeSpecifier::Array { element, .. } => (**element).clone(),
                    other => other.clone(),
                };
                for elem in elements.iter_mut() {
                    if let ExpressionKind::DesignatedInitializer(designated) = &mut elem.kind {
                        let member_ty = match declared {
                            TypeSpecifier::Named {
                                members: Some(members), ..
                            } => members
                                .iter()
                                .find(|m| m.name == designated.field_name)
                                .and_then(|m| m.resolved_type.borrow().clone()),
                            _ => None,
                        };
                        match member_ty {
                            Some(ty) => {
                                self.analyze_initializer(&mut designated.value, &ty);
                                elem.resolved_type = Some(ty);
                            }
                            None => {
                                self.log(
                                    elem.location.clone(),
                                    format!("unknown struct member {:?}", designated.field_name),
                                );
                            }
                        }
                    } else {
                        self.analyze_initializer(elem, &element_ty);
                    }
                }
                init.resolved_type = Some(declared.clone());
            }
            _ => {
                self.analyze_expr(init);
                self.check_assignment(declared, init, false);
            }
        }
    }
}

/// Infers an incomplete array's size from an initialiser-list length,
/// writing it into the resolved type (spec.md S4.5 "Declarations at
/// statement level").
fn infer_incomplete_array_size(ty: TypeSpecifier, len: i64) -> TypeSpecifier {
    match ty {
        TypeSpecifier::Array {
            element,
            size: cminor_ast::ArraySize::Incomplete,
            is_const,
        } => TypeSpecifier::Array {
            element,
            size: cminor_ast::ArraySize::Constant(len),
            is_const,
        },
        other => other,
    }
}

/// Resolves any `Named` leaf in a `TypeSpecifier` built straight from a
/// `ParsedType` by the parser (an explicit cast or `sizeof(type)`, which
/// run before a header index exists) against this TU's index. Pointer and
/// array children recurse; typedef leaves also pick up the accumulated
/// canonical-chain state left over from Pass A.
pub(super) fn resolve_named_leaves(ty: &TypeSpecifier, index: &HeaderIndex) -> TypeSpecifier {
    match ty {
        TypeSpecifier::Pointer { inner, is_const } => TypeSpecifier::Pointer {
            inner: Box::new(resolve_named_leaves(inner, index)),
            is_const: *is_const,
        },
        TypeSpecifier::Array { element, size, is_const } => TypeSpecifier::Array {
            element: Box::new(resolve_named_leaves(element, index)),
            size: *size,
            is_const: *is_const,
        },
        TypeSpecifier::Named {
            basic_type,
            identity,
            is_const,
            is_unsigned,
            ..
        } => {
            let tag = identity.search_name.clone().unwrap_or_else(|| identity.name.clone());
            match basic_type {
                BasicType::Struct | BasicType::Union => index
                    .find_struct(&tag)
                    .map(|def| TypeSpecifier::Named {
                        basic_type: *basic_type,
                        identity: def.identity.clone(),
                        is_typedef: false,
                        is_unsigned: false,
                        is_const: *is_const,
                        members: Some(def.members.clone()),
                    })
                    .unwrap_or_else(|| ty.clone()),
                BasicType::Enum => index
                    .find_enum(&tag)
                    .map(|def| TypeSpecifier::Named {
                        basic_type: BasicType::Enum,
                        identity: def.identity.clone(),
                        is_typedef: false,
                        is_unsigned: false,
                        is_const: *is_const,
                        members: None,
                    })
                    .unwrap_or_else(|| ty.clone()),
                BasicType::TypedefName => index
                    .find_typedef(&tag)
                    .map(|def| {
                        let resolved = def
                            .canonical
                            .borrow()
                            .clone()
                            .or_else(|| def.resolved_type.borrow().clone())
                            .unwrap_or_else(|| ty.clone());
                        if *is_unsigned {
                            crate::types::force_unsigned(resolved, true)
                        } else {
                            resolved
                        }
                    })
                    .unwrap_or_else(|| ty.clone()),
                _ => ty.clone(),
            }
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::store::HeaderStore;
    use crate::preprocessor::lexer;
    use crate::parser::Parser;
    use cminor_ast::Location;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn analyze_source(src: &str) -> (Vec<Diagnostic>, crate::header::FileDeclRef, HeaderIndex) {
        let offsets = vec![(0usize, Location::new(Rc::from("t.c"), 1))];
        let tokens = lexer::tokenize(src, &offsets).unwrap();
        let store = HeaderStore::new();
        let file = store.get_or_create("t.c");
        let index = HeaderIndex::new();
        index.add_file(file.clone());
        let mut parser = Parser::new(&tokens, file.clone(), Rc::from("t.c"));
        parser.parse_translation_unit().unwrap();
        let diags = analyze(&index, &file);
        (diags, file, index)
    }

    #[test]
    fn s3_narrowing_requires_explicit_cast() {
        let (diags, _, _) = analyze_source("long n = 1; int i = n;\n");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("narrowing conversion from long to int requires explicit cast"));
    }

    #[test]
    fn s3_explicit_cast_produces_no_error() {
        let (diags, file, _) = analyze_source("long n = 1; int i = (int)n;\n");
        assert!(diags.is_empty());
        let externs = file.externs.borrow();
        let i_decl = externs.iter().find(|d| d.name == "i").unwrap();
        let init = i_decl.initializer.borrow();
        assert!(matches!(init.as_ref().unwrap().kind, cminor_ast::ExpressionKind::TypeCast(_, _)));
    }

    #[test]
    fn literal_fits_narrowing_still_inserts_a_cast_node() {
        let (diags, file, _) = analyze_source("int i = 1000L;\n");
        assert!(diags.is_empty(), "{:?}", diags);
        let externs = file.externs.borrow();
        let i_decl = externs.iter().find(|d| d.name == "i").unwrap();
        let init = i_decl.initializer.borrow();
        match &init.as_ref().unwrap().kind {
            cminor_ast::ExpressionKind::Cast(cminor_ast::CastKind::LongToInt, _) => {}
            other => panic!("expected a LongToInt cast node, got {:?}", other),
        }
    }

    #[test]
    fn s4_null_propagates_declared_pointer_type() {
        let (diags, file, _) = analyze_source("char *p = NULL;\n");
        assert!(diags.is_empty());
        let externs = file.externs.borrow();
        let p = externs.iter().find(|d| d.name == "p").unwrap();
        let ty = p.resolved_type.borrow().clone().unwrap();
        assert!(matches!(ty, TypeSpecifier::Pointer { ref inner, .. } if matches!(**inner, TypeSpecifier::Basic{basic_type: BasicType::Char, ..})));
        let init_ty = p.initializer.borrow().as_ref().unwrap().resolved_type.clone().unwrap();
        assert_eq!(init_ty, ty);
    }

    #[test]
    fn heap_lift_marks_address_taken_locals_only() {
        let (diags, file, _) = analyze_source(
            "int g;\nvoid f(){ int x; int *p = &x; int *q = &g; }\n",
        );
        assert!(diags.is_empty(), "{:?}", diags);
        let func = file.functions.borrow()[0].clone();
        // x is declared inside the function body; inspect via the body statements.
        let body = func.body.borrow();
        let stmts = match &body.as_ref().unwrap().kind {
            cminor_ast::StatementKind::Compound(stmts) => stmts,
            _ => panic!("expected compound body"),
        };
        let x_decl = stmts.iter().find_map(|s| match &s.kind {
            cminor_ast::StatementKind::Declaration(decls) => decls.iter().find(|d| d.name == "x").cloned(),
            _ => None,
        }).unwrap();
        assert!(x_decl.needs_heap_lift.get());
        let g_decl = file.externs.borrow().iter().find(|d| d.name == "g").unwrap().clone();
        assert!(!g_decl.needs_heap_lift.get());
    }
}
