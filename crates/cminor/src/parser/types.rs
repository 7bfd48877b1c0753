//! Type-specifier and declarator parsing: spec.md S3's "syntactic type,
//! produced by the parser before any lookup" - `ParsedType` construction
//! only, no name resolution (that's C2/C5's job on the TU's header
//! index).

use std::rc::Rc;

use cminor_ast::{BasicType, ParsedType, TypeIdentity, TypeNamespace};

use crate::error::ParseError;
use crate::preprocessor::lexer::{Keyword, Punct, TokenKind};

use super::Parser;

impl<'t> Parser<'t> {
    /// Parses the base type-specifier: qualifiers (`const`, `unsigned`),
    /// a basic keyword, a `struct`/`union`/`enum` tag (defining it inline
    /// if a `{` follows), or a previously-seen typedef name. Does not
    /// consume pointer stars, array brackets, or a declarator name.
    pub(super) fn parse_type_specifier_base(&mut self) -> Result<(ParsedType, bool), ParseError> {
        let mut is_const = false;
        let mut is_unsigned = false;
        loop {
            if self.at_keyword(Keyword::Const) {
                self.bump();
                is_const = true;
                continue;
            }
            if self.at_keyword(Keyword::Unsigned) {
                self.bump();
                is_unsigned = true;
                continue;
            }
            break;
        }

        let mut ty = match self.peek().clone() {
            TokenKind::Keyword(Keyword::Void) => {
                self.bump();
                ParsedType::basic(BasicType::Void)
            }
            TokenKind::Keyword(Keyword::Char) => {
                self.bump();
                ParsedType::basic(BasicType::Char)
            }
            TokenKind::Keyword(Keyword::Short) => {
                self.bump();
                ParsedType::basic(BasicType::Short)
            }
            TokenKind::Keyword(Keyword::Bool) => {
                self.bump();
                ParsedType::basic(BasicType::Bool)
            }
            TokenKind::Keyword(Keyword::Int) => {
                self.bump();
                ParsedType::basic(BasicType::Int)
            }
            TokenKind::Keyword(Keyword::Long) => {
                self.bump();
                ParsedType::basic(BasicType::Long)
            }
            TokenKind::Keyword(Keyword::Float) => {
                self.bump();
                ParsedType::basic(BasicType::Float)
            }
            TokenKind::Keyword(Keyword::Double) => {
                self.bump();
                ParsedType::basic(BasicType::Double)
            }
            TokenKind::Keyword(Keyword::Struct) => self.parse_aggregate_specifier(false)?,
            TokenKind::Keyword(Keyword::Union) => self.parse_aggregate_specifier(true)?,
            TokenKind::Keyword(Keyword::Enum) => self.parse_enum_specifier()?,
            TokenKind::Identifier(name) if self.is_typedef_name(&name) => {
                self.bump();
                ParsedType::named(BasicType::TypedefName, TypeNamespace::Typedef, name)
            }
            _ if is_unsigned => {
                // Bare `unsigned` defaults to `unsigned int`.
                ParsedType::basic(BasicType::Int)
            }
            _ => return Err(self.unexpected("a type specifier")),
        };

        // Trailing qualifiers, e.g. `int const`.
        loop {
            if self.at_keyword(Keyword::Const) {
                self.bump();
                is_const = true;
                continue;
            }
            if self.at_keyword(Keyword::Unsigned) {
                self.bump();
                is_unsigned = true;
                continue;
            }
            break;
        }

        ty.set_unsigned(is_unsigned);
        ty.set_const(is_const);
        Ok((ty, is_const))
    }

    fn parse_aggregate_specifier(&mut self, is_union: bool) -> Result<ParsedType, ParseError> {
        self.bump(); // struct/union
        let tag = match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.bump();
                Some(name)
            }
            _ => None,
        };

        if self.at_punct(Punct::LBrace) {
            self.bump();
            let mut members = Vec::new();
            while !self.at_punct(Punct::RBrace) {
                let (base, _) = self.parse_type_specifier_base()?;
                loop {
                    let (name, member_ty) = self.parse_declarator(base.clone())?;
                    members.push(Rc::new(cminor_ast::StructMember::new(name, member_ty)));
                    if self.at_punct(Punct::Comma) {
                        self.bump();
                        continue;
                    }
                    break;
                }
                self.eat_punct(Punct::Semicolon)?;
            }
            self.eat_punct(Punct::RBrace)?;

            let identity = match &tag {
                Some(t) => TypeIdentity::named(&self.file.class_name, self.file.is_header, t),
                None => TypeIdentity::anonymous(&self.file.class_name, self.file.is_header, self.next_anon_index()),
            };
            let members_rc = Rc::new(members);
            self.file.add_struct(Rc::new(cminor_ast::StructDefinition {
                identity: identity.clone(),
                members: members_rc,
                is_union,
            }));
            let name = identity.search_name.clone().unwrap_or(identity.name.clone());
            Ok(ParsedType::named(
                if is_union { BasicType::Union } else { BasicType::Struct },
                if is_union { TypeNamespace::Union } else { TypeNamespace::Struct },
                name,
            ))
        } else {
            let tag = tag.ok_or_else(|| self.unexpected("a struct/union tag or '{'"))?;
            Ok(ParsedType::named(
                if is_union { BasicType::Union } else { BasicType::Struct },
                if is_union { TypeNamespace::Union } else { TypeNamespace::Struct },
                tag,
            ))
        }
    }

    fn parse_enum_specifier(&mut self) -> Result<ParsedType, ParseError> {
        self.bump(); // enum
        let tag = match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.bump();
                Some(name)
            }
            _ => None,
        };

        if self.at_punct(Punct::LBrace) {
            self.bump();
            let mut members = Vec::new();
            let mut next_value: i64 = 0;
            while !self.at_punct(Punct::RBrace) {
                let name = self.eat_identifier()?;
                let loc = self.loc();
                let (value, has_explicit_value) = if self.at_punct(Punct::Assign) {
                    self.bump();
                    let expr = self.parse_expression()?;
                    (super::expr::const_eval(&expr).unwrap_or(next_value), true)
                } else {
                    (next_value, false)
                };
                next_value = value + 1;
                members.push(Rc::new(cminor_ast::EnumMember {
                    name,
                    value,
                    has_explicit_value,
                    location: loc,
                }));
                if self.at_punct(Punct::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
            self.eat_punct(Punct::RBrace)?;

            let identity = match &tag {
                Some(t) => TypeIdentity::named(&self.file.class_name, self.file.is_header, t),
                None => TypeIdentity::anonymous(&self.file.class_name, self.file.is_header, self.next_anon_index()),
            };
            self.file.add_enum(Rc::new(cminor_ast::EnumDefinition {
                identity: identity.clone(),
                members,
            }));
            let name = identity.search_name.clone().unwrap_or(identity.name.clone());
            Ok(ParsedType::named(BasicType::Enum, TypeNamespace::Enum, name))
        } else {
            let tag = tag.ok_or_else(|| self.unexpected("an enum tag or '{'"))?;
            Ok(ParsedType::named(BasicType::Enum, TypeNamespace::Enum, tag))
        }
    }

    /// Wraps `base` in pointer levels, then reads the declarator name and
    /// any trailing array dimensions (spec.md S3 "ParsedType": "a pointer
    /// or array node owns a child `ParsedType`").
    pub(super) fn parse_declarator(&mut self, base: ParsedType) -> Result<(String, ParsedType), ParseError> {
        let mut pointer_level = 0u32;
        while self.at_punct(Punct::Star) {
            self.bump();
            pointer_level += 1;
            while self.at_keyword(Keyword::Const) {
                self.bump();
            }
        }
        let pointed = ParsedType::wrap_pointer(base, pointer_level);
        let name = self.eat_identifier()?;
        let ty = self.parse_array_suffix(pointed)?;
        Ok((name, ty))
    }

    /// Abstract declarator for `sizeof(type)` / explicit casts: pointer
    /// levels and array brackets, no name.
    pub(super) fn parse_abstract_declarator(&mut self, base: ParsedType) -> Result<ParsedType, ParseError> {
        let mut pointer_level = 0u32;
        while self.at_punct(Punct::Star) {
            self.bump();
            pointer_level += 1;
        }
        let pointed = ParsedType::wrap_pointer(base, pointer_level);
        self.parse_array_suffix(pointed)
    }

    pub(super) fn parse_array_suffix(&mut self, base: ParsedType) -> Result<ParsedType, ParseError> {
        let mut dims: Vec<Option<Rc<cminor_ast::Expression>>> = Vec::new();
        while self.at_punct(Punct::LBracket) {
            self.bump();
            let size = if self.at_punct(Punct::RBracket) {
                None
            } else {
                Some(Rc::new(self.parse_expression()?))
            };
            self.eat_punct(Punct::RBracket)?;
            dims.push(size);
        }
        let mut result = base;
        for dim in dims.into_iter().rev() {
            result = ParsedType::wrap_array(result, dim);
        }
        Ok(result)
    }

    /// True if `*text` is a type keyword start, used to disambiguate cast
    /// parentheses from plain parenthesized expressions.
    pub(super) fn at_type_start(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Keyword(
                Keyword::Void
                    | Keyword::Char
                    | Keyword::Short
                    | Keyword::Bool
                    | Keyword::Int
                    | Keyword::Long
                    | Keyword::Float
                    | Keyword::Double
                    | Keyword::Struct
                    | Keyword::Union
                    | Keyword::Enum
                    | Keyword::Const
                    | Keyword::Unsigned
            )
        ) || matches!(self.peek(), TokenKind::Identifier(name) if self.is_typedef_name(name))
    }

    fn is_typedef_name(&self, name: &str) -> bool {
        self.typedef_names.borrow().contains(name)
    }

    /// Converts a freshly-parsed `ParsedType` (from a cast or `sizeof`
    /// abstract declarator) into an as-yet-unresolved `TypeSpecifier`:
    /// `Named` leaves keep only their syntactic identity (no `members`)
    /// until semantic analysis looks them up against the TU's header
    /// index, exactly as any other `Named` type does before resolution
    /// (spec.md S3 "Two parallel type representations").
    pub(super) fn parsed_type_to_specifier(pt: &ParsedType) -> cminor_ast::TypeSpecifier {
        use cminor_ast::{TypeKind, TypeSpecifier};
        match pt.kind {
            TypeKind::Basic => TypeSpecifier::Basic {
                basic_type: pt.basic_type,
                is_unsigned: pt.is_unsigned,
                is_const: pt.is_const,
            },
            TypeKind::Pointer => TypeSpecifier::Pointer {
                inner: Box::new(Self::parsed_type_to_specifier(
                    pt.child.as_deref().expect("pointer ParsedType always has a child"),
                )),
                is_const: pt.is_const,
            },
            TypeKind::Array => TypeSpecifier::Array {
                element: Box::new(Self::parsed_type_to_specifier(
                    pt.child.as_deref().expect("array ParsedType always has a child"),
                )),
                size: cminor_ast::ArraySize::Incomplete,
                is_const: pt.is_const,
            },
            TypeKind::Named => TypeSpecifier::Named {
                basic_type: pt.basic_type,
                identity: TypeIdentity {
                    name: pt.name.clone().unwrap_or_default(),
                    search_name: pt.name.clone(),
                },
                is_typedef: pt.basic_type == BasicType::TypedefName,
                is_unsigned: pt.is_unsigned,
                is_const: pt.is_const,
                members: None,
            },
        }
    }
}
