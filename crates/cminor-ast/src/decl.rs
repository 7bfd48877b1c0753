//! Declarations: variables, functions, and the type-definition catalogue
//! (struct/union, enum, typedef). Grounded on `definitions.h`/`ast.h` in
//! the original source; lists are `Vec` rather than the original's
//! intrusive linked lists (declaration order is still preserved, spec.md
//! S3 invariant), per spec.md S9's guidance to re-express C idioms
//! (pointers, visitor tables) the idiomatic-Rust way.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::expr::Expression;
use crate::stmt::Statement;
use crate::types::{ParsedType, StructMember, TypeSpecifier};
use crate::Location;

/// A variable declaration, global or local. `needs_heap_lift` and
/// `is_extern` are interior-mutable: semantic analysis (C5) sets them
/// after the declaration has already been registered and possibly shared
/// (spec.md S4.5 "Unary", "Declarations at statement level").
#[derive(Debug)]
pub struct Declaration {
    pub name: String,
    pub parsed_type: ParsedType,
    pub resolved_type: RefCell<Option<TypeSpecifier>>,
    pub initializer: RefCell<Option<Expression>>,
    pub class_name: RefCell<String>,
    pub source_path: Option<Rc<str>>,
    pub location: Location,
    pub index: Cell<i32>,
    pub needs_heap_lift: Cell<bool>,
    pub is_static: bool,
    pub is_extern: Cell<bool>,
}

impl Declaration {
    pub fn new(
        name: impl Into<String>,
        parsed_type: ParsedType,
        location: Location,
        is_static: bool,
        is_extern: bool,
    ) -> Self {
        Declaration {
            name: name.into(),
            parsed_type,
            resolved_type: RefCell::new(None),
            initializer: RefCell::new(None),
            class_name: RefCell::new(String::new()),
            source_path: location.path.clone(),
            location,
            index: Cell::new(0),
            needs_heap_lift: Cell::new(false),
            is_static,
            is_extern: Cell::new(is_extern),
        }
    }
}

pub type DeclarationRef = Rc<Declaration>;

/// A function parameter. `decl` is filled in by the analyser on function
/// entry, mirroring `ParameterList::decl` in the original, so the
/// synthetic local declaration can be tracked for heap-lift purposes.
#[derive(Debug)]
pub struct Parameter {
    pub name: String,
    pub parsed_type: ParsedType,
    pub resolved_type: RefCell<Option<TypeSpecifier>>,
    pub is_ellipsis: bool,
    pub location: Location,
    pub decl: RefCell<Option<DeclarationRef>>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, parsed_type: ParsedType, location: Location) -> Self {
        Parameter {
            name: name.into(),
            parsed_type,
            resolved_type: RefCell::new(None),
            is_ellipsis: false,
            location,
            decl: RefCell::new(None),
        }
    }

    pub fn ellipsis(location: Location) -> Self {
        Parameter {
            name: "...".to_string(),
            parsed_type: ParsedType::basic(crate::types::BasicType::Void),
            resolved_type: RefCell::new(None),
            is_ellipsis: true,
            location,
            decl: RefCell::new(None),
        }
    }
}

/// `CS_AttributeKind`: the `[[cminor::...]]` forms spec.md S6 names
/// exactly. Argument-shape validation (triple-quoted-string forms require
/// exactly three strings, `new` requires one) happens at construction
/// time, per original_source's `create.c` (SPEC_FULL.md supplement #6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    Deprecated,
    GetStatic { class: String, member: String, descriptor: String },
    InvokeVirtual { class: String, member: String, descriptor: String },
    InvokeStatic { class: String, member: String, descriptor: String },
    InvokeSpecial { class: String, member: String, descriptor: String },
    GetField { class: String, member: String, descriptor: String },
    New { class: String },
    ArrayLength,
    AaLoad,
    ClInit,
}

#[derive(Debug, Clone)]
pub struct AttributeSpecifier {
    pub kind: AttributeKind,
    pub text: String,
    pub location: Location,
}

impl AttributeSpecifier {
    /// Validates and classifies the interior text of a `[[ ... ]]` block
    /// at construction time, per `original_source/create.c`
    /// (SPEC_FULL.md supplemented behavior #6) rather than deferring
    /// argument-shape checks to semantic analysis.
    pub fn parse(text: &str, location: Location) -> Result<Self, String> {
        let trimmed = text.trim();
        let kind = match trimmed {
            "deprecated" => AttributeKind::Deprecated,
            "cminor::arraylength" => AttributeKind::ArrayLength,
            "cminor::aaload" => AttributeKind::AaLoad,
            "cminor::clinit" => AttributeKind::ClInit,
            _ => {
                if let Some(args) = strip_call(trimmed, "cminor::get_static") {
                    let (class, member, descriptor) = triple_string(&args)?;
                    AttributeKind::GetStatic { class, member, descriptor }
                } else if let Some(args) = strip_call(trimmed, "cminor::invoke_virtual") {
                    let (class, member, descriptor) = triple_string(&args)?;
                    AttributeKind::InvokeVirtual { class, member, descriptor }
                } else if let Some(args) = strip_call(trimmed, "cminor::invoke_static") {
                    let (class, member, descriptor) = triple_string(&args)?;
                    AttributeKind::InvokeStatic { class, member, descriptor }
                } else if let Some(args) = strip_call(trimmed, "cminor::invoke_special") {
                    let (class, member, descriptor) = triple_string(&args)?;
                    AttributeKind::InvokeSpecial { class, member, descriptor }
                } else if let Some(args) = strip_call(trimmed, "cminor::get_field") {
                    let (class, member, descriptor) = triple_string(&args)?;
                    AttributeKind::GetField { class, member, descriptor }
                } else if let Some(args) = strip_call(trimmed, "cminor::new") {
                    let class = single_string(&args)?;
                    AttributeKind::New { class }
                } else {
                    return Err(format!("unrecognized attribute {:?}", trimmed));
                }
            }
        };
        Ok(AttributeSpecifier {
            kind,
            text: trimmed.to_string(),
            location,
        })
    }
}

fn strip_call<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?.trim();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some(inner.trim())
}

fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    for c in args.chars() {
        match c {
            '"' => {
                in_string = !in_string;
                current.push(c);
            }
            ',' if !in_string => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || !out.is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

fn unquote(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        Ok(s[1..s.len() - 1].to_string())
    } else {
        Err(format!("expected a quoted string, found {:?}", s))
    }
}

fn triple_string(args: &str) -> Result<(String, String, String), String> {
    let parts = split_args(args);
    if parts.len() != 3 {
        return Err(format!("expected three comma-separated quoted strings, found {}", parts.len()));
    }
    Ok((unquote(&parts[0])?, unquote(&parts[1])?, unquote(&parts[2])?))
}

fn single_string(args: &str) -> Result<String, String> {
    let parts = split_args(args);
    if parts.len() != 1 {
        return Err(format!("expected exactly one quoted string, found {}", parts.len()));
    }
    unquote(&parts[0])
}

/// `FunctionDeclaration`. Body absent (`None`) means this is a prototype.
#[derive(Debug)]
pub struct FunctionDeclaration {
    pub name: String,
    pub return_parsed_type: ParsedType,
    pub return_type: RefCell<Option<TypeSpecifier>>,
    pub params: Vec<Rc<Parameter>>,
    pub is_variadic: bool,
    pub is_static: bool,
    pub attributes: Vec<AttributeSpecifier>,
    pub body: RefCell<Option<Statement>>,
    pub class_name: RefCell<String>,
    pub source_path: Option<Rc<str>>,
    pub location: Location,
    pub index: Cell<i32>,
    pub varargs_index: Cell<i32>,
}

impl FunctionDeclaration {
    pub fn has_body(&self) -> bool {
        self.body.borrow().is_some()
    }

    pub fn fixed_param_count(&self) -> usize {
        self.params.iter().filter(|p| !p.is_ellipsis).count()
    }
}

pub type FunctionRef = Rc<FunctionDeclaration>;

#[derive(Debug)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
    pub has_explicit_value: bool,
    pub location: Location,
}

#[derive(Debug)]
pub struct EnumDefinition {
    pub identity: crate::types::TypeIdentity,
    pub members: Vec<Rc<EnumMember>>,
}

pub type EnumDefinitionRef = Rc<EnumDefinition>;

#[derive(Debug)]
pub struct StructDefinition {
    pub identity: crate::types::TypeIdentity,
    pub members: Rc<Vec<Rc<StructMember>>>,
    pub is_union: bool,
}

pub type StructDefinitionRef = Rc<StructDefinition>;

/// `canonical` starts `None` and is filled in by semantic-analysis pass A
/// (spec.md S4.5 "Pass A - typedef resolution").
#[derive(Debug)]
pub struct TypedefDefinition {
    pub name: String,
    pub parsed_type: ParsedType,
    pub resolved_type: RefCell<Option<TypeSpecifier>>,
    pub canonical: RefCell<Option<TypeSpecifier>>,
    pub source_path: Option<Rc<str>>,
}

pub type TypedefDefinitionRef = Rc<TypedefDefinition>;
