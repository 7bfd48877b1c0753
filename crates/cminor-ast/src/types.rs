//! The dual type representation of spec.md S3/S4.2: `ParsedType` (syntactic,
//! produced by the parser before any lookup) and `TypeSpecifier` (resolved,
//! produced by semantic analysis). Grounded on `parsed_type.h`/
//! `type_specifier.h`/`cminor_base.h` in the original source.

use std::cell::RefCell;
use std::rc::Rc;

use crate::expr::Expression;

/// `CS_BasicType` in the original (`cminor_base.h`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    Void,
    Char,
    Short,
    Bool,
    Int,
    Long,
    Float,
    Double,
    Struct,
    Union,
    Enum,
    TypedefName,
}

/// `CS_TypeKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Basic,
    Pointer,
    Array,
    Named,
}

/// `CS_TypeNamespace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeNamespace {
    None,
    Struct,
    Union,
    Enum,
    Typedef,
}

/// Implicit conversions inserted by semantic analysis (`CS_CastType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    CharToInt,
    ShortToInt,
    IntToLong,
    IntToFloat,
    IntToDouble,
    LongToFloat,
    LongToDouble,
    FloatToDouble,
    UCharToInt,
    UShortToInt,
    UIntToULong,
    IntToChar,
    IntToShort,
    LongToInt,
    FloatToInt,
    FloatToLong,
    DoubleToInt,
    DoubleToLong,
    DoubleToFloat,
}

/// Classification of a union declaration (spec.md S4.2 "Union kinds").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnionKind {
    TypePunIntFloat,
    TypePunLongDouble,
    Reference,
}

/// Every declared struct/union/enum has two names: `search_name` (the
/// source-level tag, used for per-TU lookup) and `name` (a globally
/// unique, codegen-friendly qualified name). Anonymous types have
/// `search_name: None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeIdentity {
    pub name: String,
    pub search_name: Option<String>,
}

impl TypeIdentity {
    pub fn named(owner_class: &str, in_header: bool, tag: &str) -> Self {
        TypeIdentity {
            name: format!("{}{}${}", owner_class, if in_header { "_h" } else { "" }, tag),
            search_name: Some(tag.to_string()),
        }
    }

    pub fn anonymous(owner_class: &str, in_header: bool, index: usize) -> Self {
        TypeIdentity {
            name: format!("{}{}${}", owner_class, if in_header { "_h" } else { "" }, index),
            search_name: None,
        }
    }
}

/// The constant size of an array type, or a marker that it has not been
/// determined yet (incomplete array awaiting initializer-list inference,
/// spec.md S4.5 "Declarations at statement level").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArraySize {
    Constant(i64),
    Incomplete,
}

/// Syntactic type, produced by the parser before any name lookup has
/// happened. Carries only what was written in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedType {
    pub kind: TypeKind,
    pub basic_type: BasicType,
    pub namespace: TypeNamespace,
    /// Type name as written (e.g. "Color", or a generated "Foo$0" once an
    /// anonymous aggregate type has been assigned an identity downstream).
    pub name: Option<String>,
    pub child: Option<Box<ParsedType>>,
    pub array_size: Option<Rc<Expression>>,
    pub is_unsigned: bool,
    pub is_const: bool,
}

impl ParsedType {
    pub fn basic(basic_type: BasicType) -> Self {
        ParsedType {
            kind: TypeKind::Basic,
            basic_type,
            namespace: TypeNamespace::None,
            name: None,
            child: None,
            array_size: None,
            is_unsigned: false,
            is_const: false,
        }
    }

    pub fn named(basic_type: BasicType, namespace: TypeNamespace, name: impl Into<String>) -> Self {
        ParsedType {
            kind: TypeKind::Named,
            basic_type,
            namespace,
            name: Some(name.into()),
            child: None,
            array_size: None,
            is_unsigned: false,
            is_const: false,
        }
    }

    pub fn wrap_pointer(base: ParsedType, pointer_level: u32) -> Self {
        let mut result = base;
        for _ in 0..pointer_level {
            result = ParsedType {
                kind: TypeKind::Pointer,
                basic_type: BasicType::Void,
                namespace: TypeNamespace::None,
                name: None,
                child: Some(Box::new(result)),
                array_size: None,
                is_unsigned: false,
                is_const: false,
            };
        }
        result
    }

    pub fn wrap_array(base: ParsedType, array_size: Option<Rc<Expression>>) -> Self {
        ParsedType {
            kind: TypeKind::Array,
            basic_type: BasicType::Void,
            namespace: TypeNamespace::None,
            name: None,
            child: Some(Box::new(base)),
            array_size,
            is_unsigned: false,
            is_const: false,
        }
    }

    pub fn set_unsigned(&mut self, is_unsigned: bool) {
        self.is_unsigned = is_unsigned;
    }

    pub fn set_const(&mut self, is_const: bool) {
        self.is_const = is_const;
    }
}

/// A single member of a struct or union, shared between the definition
/// that owns it and any `TypeSpecifier::Named` that caches a handle to
/// the member list (spec.md S9 design note (c)).
#[derive(Debug, Clone)]
pub struct StructMember {
    pub name: String,
    pub parsed_type: ParsedType,
    pub resolved_type: RefCell<Option<TypeSpecifier>>,
}

impl StructMember {
    pub fn new(name: impl Into<String>, parsed_type: ParsedType) -> Self {
        StructMember {
            name: name.into(),
            parsed_type,
            resolved_type: RefCell::new(None),
        }
    }
}

/// Resolved type: the form every expression and declaration carries after
/// semantic analysis. Unlike the C source's `union`, every variant here is
/// self-describing, so the analyser can use an exhaustive `match` instead
/// of checking `kind` before reading the union (spec.md S9 "Dynamic
/// dispatch").
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpecifier {
    Basic {
        basic_type: BasicType,
        is_unsigned: bool,
        is_const: bool,
    },
    Pointer {
        inner: Box<TypeSpecifier>,
        is_const: bool,
    },
    Array {
        element: Box<TypeSpecifier>,
        size: ArraySize,
        is_const: bool,
    },
    /// A struct, union, enum, or (pre-canonicalization) a typedef name.
    Named {
        basic_type: BasicType,
        identity: TypeIdentity,
        is_typedef: bool,
        is_unsigned: bool,
        is_const: bool,
        members: Option<Rc<Vec<Rc<StructMember>>>>,
    },
}

impl TypeSpecifier {
    pub fn kind(&self) -> TypeKind {
        match self {
            TypeSpecifier::Basic { .. } => TypeKind::Basic,
            TypeSpecifier::Pointer { .. } => TypeKind::Pointer,
            TypeSpecifier::Array { .. } => TypeKind::Array,
            TypeSpecifier::Named { .. } => TypeKind::Named,
        }
    }

    pub fn is_unsigned(&self) -> bool {
        match self {
            TypeSpecifier::Basic { is_unsigned, .. } => *is_unsigned,
            TypeSpecifier::Named { is_unsigned, .. } => *is_unsigned,
            TypeSpecifier::Pointer { .. } | TypeSpecifier::Array { .. } => false,
        }
    }

    pub fn basic(basic_type: BasicType) -> Self {
        TypeSpecifier::Basic {
            basic_type,
            is_unsigned: false,
            is_const: false,
        }
    }

    pub fn unsigned_basic(basic_type: BasicType) -> Self {
        TypeSpecifier::Basic {
            basic_type,
            is_unsigned: true,
            is_const: false,
        }
    }

    pub fn void_pointer() -> Self {
        TypeSpecifier::Pointer {
            inner: Box::new(TypeSpecifier::basic(BasicType::Void)),
            is_const: false,
        }
    }

    pub fn is_void_pointer(&self) -> bool {
        matches!(
            self,
            TypeSpecifier::Pointer { inner, .. } if matches!(**inner, TypeSpecifier::Basic { basic_type: BasicType::Void, .. })
        )
    }

    pub fn pointer_to(self) -> Self {
        TypeSpecifier::Pointer {
            inner: Box::new(self),
            is_const: false,
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            TypeSpecifier::Basic {
                basic_type: BasicType::Char
                    | BasicType::Short
                    | BasicType::Int
                    | BasicType::Long
                    | BasicType::Bool,
                ..
            } | TypeSpecifier::Named {
                basic_type: BasicType::Enum,
                ..
            }
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(
            self,
            TypeSpecifier::Basic {
                basic_type: BasicType::Float | BasicType::Double,
                ..
            }
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_floating()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeSpecifier::Pointer { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeSpecifier::Array { .. })
    }

    pub fn is_enum(&self) -> bool {
        matches!(
            self,
            TypeSpecifier::Named {
                basic_type: BasicType::Enum,
                ..
            }
        )
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            TypeSpecifier::Named {
                basic_type: BasicType::Struct | BasicType::Union,
                ..
            }
        )
    }

    /// Array-to-pointer decay, used for function arguments and assignment
    /// compatibility (spec.md S4.5 "Assignment").
    pub fn decay(&self) -> TypeSpecifier {
        match self {
            TypeSpecifier::Array { element, .. } => TypeSpecifier::Pointer {
                inner: element.clone(),
                is_const: false,
            },
            other => other.clone(),
        }
    }
}
