//! Top-level (external) declaration parsing: typedefs, standalone
//! struct/union/enum definitions, global variables, and function
//! prototypes/definitions. Declarations are registered into the current
//! `FileDecl` as soon as they are recognized (spec.md S4.3 "Adding
//! declarations"), mirroring the original's "creator" constructors
//! calling straight into the header store while parsing.

use std::rc::Rc;

use cminor_ast::{
    AttributeSpecifier, Declaration, DeclarationRef, FunctionDeclaration, FunctionRef, Location, Parameter,
    ParsedType, TypedefDefinition,
};

use crate::error::ParseError;
use crate::preprocessor::lexer::{Keyword, Punct, TokenKind};

use super::Parser;

pub(super) enum ExternalItem {
    GlobalVar(DeclarationRef),
    Function(FunctionRef),
    /// A standalone `struct Foo { ... };` / `enum E { ... };` with no
    /// declarator - already registered into the file by
    /// `parse_type_specifier_base` as a side effect.
    TypeOnly,
}

/// Reads zero or more `[[ ... ]]` attribute blocks preceding a
/// declaration, validating and classifying each one at construction time
/// (spec.md S6, SPEC_FULL.md supplemented behavior #6) rather than
/// deferring argument-shape checks to semantic analysis.
fn parse_attributes(p: &mut Parser) -> Result<Vec<AttributeSpecifier>, ParseError> {
    let mut attrs = Vec::new();
    while let TokenKind::Attribute(text) = p.peek().clone() {
        let loc = p.loc();
        p.bump();
        let spec = AttributeSpecifier::parse(&text, loc.clone()).map_err(|detail| ParseError::MalformedAttribute {
            location: loc.to_string(),
            text,
            detail,
        })?;
        attrs.push(spec);
    }
    Ok(attrs)
}

pub(super) fn parse_external_declaration(p: &mut Parser) -> Result<ExternalItem, ParseError> {
    let attributes = parse_attributes(p)?;
    let loc = p.loc();

    if p.at_keyword(Keyword::Typedef) {
        p.bump();
        let (base, _) = p.parse_type_specifier_base()?;
        let (name, ty) = p.parse_declarator(base)?;
        p.eat_punct(Punct::Semicolon)?;
        p.typedef_names.borrow_mut().insert(name.clone());
        let def = Rc::new(TypedefDefinition {
            name: name.clone(),
            parsed_type: ty,
            resolved_type: std::cell::RefCell::new(None),
            canonical: std::cell::RefCell::new(None),
            source_path: loc.path.clone(),
        });
        p.file.add_typedef(def);
        return Ok(ExternalItem::TypeOnly);
    }

    let is_static = if p.at_keyword(Keyword::Static) {
        p.bump();
        true
    } else {
        false
    };
    let is_extern = if p.at_keyword(Keyword::Extern) {
        p.bump();
        true
    } else {
        false
    };

    let (base, _) = p.parse_type_specifier_base()?;

    // `struct Foo { ... };` with no declarator: already registered by
    // `parse_type_specifier_base`'s inline-definition path.
    if p.at_punct(Punct::Semicolon) {
        p.bump();
        return Ok(ExternalItem::TypeOnly);
    }

    let mut pointer_level = 0u32;
    while p.at_punct(Punct::Star) {
        p.bump();
        pointer_level += 1;
    }
    let name = p.eat_identifier()?;

    if p.at_punct(Punct::LParen) {
        let return_type = ParsedType::wrap_pointer(base, pointer_level);
        let func = parse_function_tail(p, name, return_type, is_static, attributes, loc)?;
        let func = Rc::new(func);
        p.file.add_function(func.clone());
        return Ok(ExternalItem::Function(func));
    }

    let first_type = p.parse_array_suffix(ParsedType::wrap_pointer(base.clone(), pointer_level))?;
    let mut last_decl = make_global(p, name, first_type, &loc, is_static, is_extern)?;

    while p.at_punct(Punct::Comma) {
        p.bump();
        let (name, ty) = p.parse_declarator(base.clone())?;
        last_decl = make_global(p, name, ty, &loc, is_static, is_extern)?;
    }
    p.eat_punct(Punct::Semicolon)?;
    Ok(ExternalItem::GlobalVar(last_decl))
}

fn make_global(
    p: &mut Parser,
    name: String,
    ty: ParsedType,
    loc: &Location,
    is_static: bool,
    is_extern: bool,
) -> Result<DeclarationRef, ParseError> {
    let decl = Rc::new(Declaration::new(name, ty, loc.clone(), is_static, is_extern));
    if p.at_punct(Punct::Assign) {
        p.bump();
        let init = p.parse_initializer()?;
        *decl.initializer.borrow_mut() = Some(init);
    }
    p.file.add_extern(decl.clone());
    Ok(decl)
}

/// True if the parameter list so far is a bare `(void)` - "no
/// parameters", not a single `void`-typed parameter.
fn at_void_only_param(p: &Parser, seen_any: bool) -> bool {
    !seen_any && p.at_keyword(Keyword::Void) && *p.peek_at(1) == TokenKind::Punct(Punct::RParen)
}

fn parse_function_tail(
    p: &mut Parser,
    name: String,
    return_type: ParsedType,
    is_static: bool,
    attributes: Vec<AttributeSpecifier>,
    loc: Location,
) -> Result<FunctionDeclaration, ParseError> {
    p.eat_punct(Punct::LParen)?;
    let mut params = Vec::new();
    let mut is_variadic = false;
    if !p.at_punct(Punct::RParen) {
        loop {
            if p.at_punct(Punct::Ellipsis) {
                let ploc = p.loc();
                p.bump();
                params.push(Rc::new(Parameter::ellipsis(ploc)));
                is_variadic = true;
                break;
            }
            if at_void_only_param(p, !params.is_empty()) {
                p.bump();
                break;
            }
            let ploc = p.loc();
            let (base, _) = p.parse_type_specifier_base()?;
            let (pname, pty) = p.parse_declarator(base)?;
            params.push(Rc::new(Parameter::new(pname, pty, ploc)));
            if p.at_punct(Punct::Comma) {
                p.bump();
                continue;
            }
            break;
        }
    }
    p.eat_punct(Punct::RParen)?;

    let body = if p.at_punct(Punct::LBrace) {
        Some(p.parse_statement()?)
    } else {
        p.eat_punct(Punct::Semicolon)?;
        None
    };

    Ok(FunctionDeclaration {
        name,
        return_parsed_type: return_type,
        return_type: std::cell::RefCell::new(None),
        params,
        is_variadic,
        is_static,
        attributes,
        body: std::cell::RefCell::new(body),
        class_name: std::cell::RefCell::new(String::new()),
        source_path: loc.path.clone(),
        location: loc,
        index: std::cell::Cell::new(0),
        varargs_index: std::cell::Cell::new(0),
    })
}
