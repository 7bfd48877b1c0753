//! The minimal statement/declaration recognizer consuming tokens produced
//! by C1. spec.md S1 treats "the scanner/parser grammar" as an external
//! collaborator ("the parser calls 'creator' constructors and registers
//! declarations into the current translation-unit context") - this module
//! is that collaborator, scaled to exactly the constructs spec.md S6's
//! dialect needs and no further (no function pointers, no K&R
//! declarations, no arbitrary expression forms beyond S4.5's catalogue).
//! See DESIGN.md for the Open Question this raises and the decision kept.
//!
//! Declarations are registered into the current `FileDecl` as soon as
//! they're recognized (spec.md S4.3 "Adding declarations"), mirroring the
//! original's "creator" constructors calling straight into the header
//! store while parsing.

pub mod decl;
pub mod expr;
pub mod stmt;
pub mod types;

use std::rc::Rc;

use cminor_ast::{DeclarationRef, FunctionRef, Location};

use crate::error::ParseError;
use crate::header::FileDeclRef;
use crate::preprocessor::lexer::{Keyword, Punct, Token, TokenKind};

pub struct ParsedUnit {
    pub global_vars: Vec<DeclarationRef>,
    pub functions: Vec<FunctionRef>,
}

pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    file: FileDeclRef,
    path: Rc<str>,
    anon_counter: std::cell::Cell<usize>,
    /// Names introduced by `typedef`, consulted by `parse_type_specifier_base`
    /// to disambiguate an identifier-as-type from an identifier-as-value -
    /// the one piece of symbol-table state the recognizer needs ahead of
    /// full semantic analysis.
    typedef_names: std::cell::RefCell<std::collections::HashSet<String>>,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token], file: FileDeclRef, path: Rc<str>) -> Self {
        Parser {
            tokens,
            pos: 0,
            file,
            path,
            anon_counter: std::cell::Cell::new(0),
            typedef_names: std::cell::RefCell::new(std::collections::HashSet::new()),
        }
    }

    pub fn parse_translation_unit(&mut self) -> Result<ParsedUnit, ParseError> {
        let mut global_vars = Vec::new();
        let mut functions = Vec::new();
        while !self.at_eof() {
            match decl::parse_external_declaration(self)? {
                decl::ExternalItem::GlobalVar(d) => global_vars.push(d),
                decl::ExternalItem::Function(f) => functions.push(f),
                decl::ExternalItem::TypeOnly => {}
            }
        }
        Ok(ParsedUnit { global_vars, functions })
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn loc(&self) -> Location {
        self.tokens[self.pos.min(self.tokens.len() - 1)].location.clone()
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        ParseError::Unexpected {
            location: self.loc().to_string(),
            expected: expected.into(),
        }
    }

    fn eat_punct(&mut self, p: Punct) -> Result<(), ParseError> {
        if *self.peek() == TokenKind::Punct(p) {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected(format!("{:?}", p)))
        }
    }

    fn at_punct(&self, p: Punct) -> bool {
        *self.peek() == TokenKind::Punct(p)
    }

    fn eat_keyword(&mut self, k: Keyword) -> Result<(), ParseError> {
        if *self.peek() == TokenKind::Keyword(k) {
            self.bump();
            Ok(())
        } else {
            Err(self.unexpected(format!("{:?}", k)))
        }
    }

    fn at_keyword(&self, k: Keyword) -> bool {
        *self.peek() == TokenKind::Keyword(k)
    }

    fn eat_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.bump();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Anonymous structs/enums get a monotonic counter per file (spec.md
    /// S3 "Type identity").
    fn next_anon_index(&self) -> usize {
        let idx = self.anon_counter.get();
        self.anon_counter.set(idx + 1);
        idx
    }
}

#[cfg(test)]
pub(crate) fn tokenize_for_test(src: &str) -> Vec<Token> {
    let offsets = vec![(0usize, Location::new(Rc::from("t.c"), 1))];
    crate::preprocessor::lexer::tokenize(src, &offsets).unwrap()
}
