//! Statement parsing (spec.md S3 "statement list", S4.5 passes over
//! every statement kind).

use std::rc::Rc;

use cminor_ast::{
    CaseStatement, DoWhileStatement, ForStatement, GotoStatement, IfStatement, LabelStatement, Statement,
    StatementKind, SwitchStatement, WhileStatement,
};

use crate::error::ParseError;
use crate::preprocessor::lexer::{Keyword, Punct, TokenKind};

use super::Parser;

impl<'t> Parser<'t> {
    pub(super) fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let loc = self.loc();
        match self.peek().clone() {
            TokenKind::Punct(Punct::LBrace) => self.parse_compound(),
            TokenKind::Keyword(Keyword::If) => {
                self.bump();
                self.eat_punct(Punct::LParen)?;
                let condition = self.parse_comma_expression()?;
                self.eat_punct(Punct::RParen)?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.at_keyword(Keyword::Else) {
                    self.bump();
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Statement::new(
                    StatementKind::If(IfStatement { condition, then_branch, else_branch }),
                    loc,
                ))
            }
            TokenKind::Keyword(Keyword::While) => {
                self.bump();
                self.eat_punct(Punct::LParen)?;
                let condition = self.parse_comma_expression()?;
                self.eat_punct(Punct::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::new(StatementKind::While(WhileStatement { condition, body }), loc))
            }
            TokenKind::Keyword(Keyword::Do) => {
                self.bump();
                let body = Box::new(self.parse_statement()?);
                self.eat_keyword(Keyword::While)?;
                self.eat_punct(Punct::LParen)?;
                let condition = self.parse_comma_expression()?;
                self.eat_punct(Punct::RParen)?;
                self.eat_punct(Punct::Semicolon)?;
                Ok(Statement::new(StatementKind::DoWhile(DoWhileStatement { body, condition }), loc))
            }
            TokenKind::Keyword(Keyword::For) => {
                self.bump();
                self.eat_punct(Punct::LParen)?;
                let init = if self.at_punct(Punct::Semicolon) {
                    None
                } else {
                    Some(Box::new(self.parse_simple_statement_no_semi()?))
                };
                self.eat_punct(Punct::Semicolon)?;
                let condition = if self.at_punct(Punct::Semicolon) {
                    None
                } else {
                    Some(self.parse_comma_expression()?)
                };
                self.eat_punct(Punct::Semicolon)?;
                let step = if self.at_punct(Punct::RParen) {
                    None
                } else {
                    Some(self.parse_comma_expression()?)
                };
                self.eat_punct(Punct::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::new(
                    StatementKind::For(ForStatement { init, condition, step, body }),
                    loc,
                ))
            }
            TokenKind::Keyword(Keyword::Switch) => {
                self.bump();
                self.eat_punct(Punct::LParen)?;
                let subject = self.parse_comma_expression()?;
                self.eat_punct(Punct::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::new(StatementKind::Switch(SwitchStatement { subject, body }), loc))
            }
            TokenKind::Keyword(Keyword::Case) => {
                self.bump();
                let expr = self.parse_expression()?;
                let value = super::expr::const_eval(&expr).unwrap_or(0);
                self.eat_punct(Punct::Colon)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::new(StatementKind::Case(CaseStatement { value, body }), loc))
            }
            TokenKind::Keyword(Keyword::Default) => {
                self.bump();
                self.eat_punct(Punct::Colon)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::new(StatementKind::Default(body), loc))
            }
            TokenKind::Keyword(Keyword::Goto) => {
                self.bump();
                let label = self.eat_identifier()?;
                self.eat_punct(Punct::Semicolon)?;
                Ok(Statement::new(StatementKind::Goto(GotoStatement { label }), loc))
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.bump();
                self.eat_punct(Punct::Semicolon)?;
                Ok(Statement::new(StatementKind::Break, loc))
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.bump();
                self.eat_punct(Punct::Semicolon)?;
                Ok(Statement::new(StatementKind::Continue, loc))
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.bump();
                let value = if self.at_punct(Punct::Semicolon) {
                    None
                } else {
                    Some(self.parse_comma_expression()?)
                };
                self.eat_punct(Punct::Semicolon)?;
                Ok(Statement::new(StatementKind::Return(value), loc))
            }
            TokenKind::Identifier(name) if *self.peek_at(1) == TokenKind::Punct(Punct::Colon) => {
                self.bump();
                self.bump();
                let body = Box::new(self.parse_statement()?);
                Ok(Statement::new(StatementKind::Label(LabelStatement { label: name, body }), loc))
            }
            TokenKind::Punct(Punct::Semicolon) => {
                self.bump();
                Ok(Statement::new(StatementKind::Compound(Vec::new()), loc))
            }
            _ if self.at_local_declaration_start() => self.parse_local_declaration(),
            _ => {
                let expr = self.parse_comma_expression()?;
                self.eat_punct(Punct::Semicolon)?;
                Ok(Statement::new(StatementKind::Expression(expr), loc))
            }
        }
    }

    fn parse_compound(&mut self) -> Result<Statement, ParseError> {
        let loc = self.loc();
        self.eat_punct(Punct::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at_punct(Punct::RBrace) {
            stmts.push(self.parse_statement()?);
        }
        self.eat_punct(Punct::RBrace)?;
        Ok(Statement::new(StatementKind::Compound(stmts), loc))
    }

    /// A `for`-init clause is either a declaration or an expression, but
    /// without its own terminating `;` (the `for` header supplies it).
    fn parse_simple_statement_no_semi(&mut self) -> Result<Statement, ParseError> {
        let loc = self.loc();
        if self.at_local_declaration_start() {
            self.parse_local_declaration_no_semi()
        } else {
            let expr = self.parse_comma_expression()?;
            Ok(Statement::new(StatementKind::Expression(expr), loc))
        }
    }

    fn at_local_declaration_start(&self) -> bool {
        self.at_keyword(Keyword::Static) || self.at_keyword(Keyword::Extern) || self.at_keyword(Keyword::Typedef) || self.at_type_start()
    }

    fn parse_local_declaration(&mut self) -> Result<Statement, ParseError> {
        let stmt = self.parse_local_declaration_no_semi()?;
        self.eat_punct(Punct::Semicolon)?;
        Ok(stmt)
    }

    fn parse_local_declaration_no_semi(&mut self) -> Result<Statement, ParseError> {
        let loc = self.loc();
        let is_static = if self.at_keyword(Keyword::Static) {
            self.bump();
            true
        } else {
            false
        };
        let is_extern = if self.at_keyword(Keyword::Extern) {
            self.bump();
            true
        } else {
            false
        };
        let (base, _) = self.parse_type_specifier_base()?;
        let mut decls = Vec::new();
        loop {
            let (name, ty) = self.parse_declarator(base.clone())?;
            let decl = Rc::new(cminor_ast::Declaration::new(name, ty, loc.clone(), is_static, is_extern));
            if self.at_punct(Punct::Assign) {
                self.bump();
                let init = self.parse_initializer()?;
                *decl.initializer.borrow_mut() = Some(init);
            }
            decls.push(decl);
            if self.at_punct(Punct::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        Ok(Statement::new(StatementKind::Declaration(decls), loc))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tokenize_for_test;
    use super::Parser;
    use crate::header::store::HeaderStore;
    use std::rc::Rc;

    #[test]
    fn local_extern_declaration_keeps_its_is_extern_flag() {
        let tokens = tokenize_for_test("void f(void){ extern int x; }\n");
        let store = HeaderStore::new();
        let file = store.get_or_create("t.c");
        let mut parser = Parser::new(&tokens, file.clone(), Rc::from("t.c"));
        parser.parse_translation_unit().unwrap();
        let functions = file.functions.borrow();
        let body = functions[0].body.borrow();
        let stmts = match &body.as_ref().unwrap().kind {
            cminor_ast::StatementKind::Compound(stmts) => stmts,
            other => panic!("expected a compound body, got {:?}", other),
        };
        let x_decl = stmts
            .iter()
            .find_map(|s| match &s.kind {
                cminor_ast::StatementKind::Declaration(decls) => decls.iter().find(|d| d.name == "x").cloned(),
                _ => None,
            })
            .unwrap();
        assert!(x_decl.is_extern.get());
    }
}
