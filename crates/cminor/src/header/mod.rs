//! Header store and per-translation-unit visibility index (C3). Grounded
//! on `header_store.h`/`header_store.c`; see `store.rs` for `FileDecl` and
//! `HeaderStore` themselves. `HeaderIndex` is the per-TU lookup surface
//! (spec.md S4.3 "Per-TU header index", S4.4 step 2/4).

pub mod store;

pub use store::{FileDecl, FileDeclRef, HeaderStore};

use std::rc::Rc;

use cminor_ast::{
    BasicType, DeclarationRef, EnumDefinitionRef, EnumMember, FunctionRef, ParsedType, StructDefinitionRef,
    TypeIdentity, TypeKind, TypeSpecifier, TypedefDefinitionRef,
};

/// The set of `FileDecl`s visible to one translation unit: the source
/// file itself plus the transitive closure of its `#include`s. Ephemeral
/// - discarded when the TU is done (spec.md S4.3 "Per-TU header index").
#[derive(Debug)]
pub struct HeaderIndex {
    store: Rc<HeaderStore>,
    files: std::cell::RefCell<Vec<FileDeclRef>>,
}

impl Default for HeaderIndex {
    fn default() -> Self {
        HeaderIndex::new()
    }
}

impl HeaderIndex {
    pub fn new() -> Self {
        HeaderIndex {
            store: Rc::new(HeaderStore::new()),
            files: std::cell::RefCell::new(Vec::new()),
        }
    }

    /// Builds an index over a store shared with other TUs (spec.md S4.3
    /// "Store" is process-lifetime and append-only; every TU the driver
    /// creates gets its own `HeaderIndex` but they all share one
    /// `HeaderStore`, per spec.md S9 "Global mutable state").
    pub fn with_store(store: Rc<HeaderStore>) -> Self {
        HeaderIndex {
            store,
            files: std::cell::RefCell::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &HeaderStore {
        &self.store
    }

    /// Adds `file` to this TU's visibility window. A no-op if the same
    /// `FileDecl` is already present (spec.md S3 invariant: "the same
    /// FileDecl pointer never appears twice in a header index").
    pub fn add_file(&self, file: FileDeclRef) {
        let mut files = self.files.borrow_mut();
        if !files.iter().any(|f| Rc::ptr_eq(f, &file)) {
            files.push(file);
        }
    }

    pub fn files(&self) -> Vec<FileDeclRef> {
        self.files.borrow().clone()
    }

    /// Lookup by `search_name` first, then by globally qualified `name`,
    /// over every visible file in insertion order (spec.md S4.3
    /// "Visibility").
    pub fn find_struct(&self, tag: &str) -> Option<StructDefinitionRef> {
        let files = self.files.borrow();
        files
            .iter()
            .flat_map(|f| f.structs.borrow().clone())
            .find(|s| s.identity.search_name.as_deref() == Some(tag))
            .or_else(|| {
                files
                    .iter()
                    .flat_map(|f| f.structs.borrow().clone())
                    .find(|s| s.identity.name == tag)
            })
    }

    pub fn find_enum(&self, tag: &str) -> Option<EnumDefinitionRef> {
        let files = self.files.borrow();
        files
            .iter()
            .flat_map(|f| f.enums.borrow().clone())
            .find(|e| e.identity.search_name.as_deref() == Some(tag))
            .or_else(|| {
                files
                    .iter()
                    .flat_map(|f| f.enums.borrow().clone())
                    .find(|e| e.identity.name == tag)
            })
    }

    pub fn find_typedef(&self, name: &str) -> Option<TypedefDefinitionRef> {
        self.files
            .borrow()
            .iter()
            .flat_map(|f| f.typedefs.borrow().clone())
            .find(|t| t.name == name)
    }

    pub fn find_function(&self, name: &str) -> Option<FunctionRef> {
        self.files
            .borrow()
            .iter()
            .flat_map(|f| f.functions.borrow().clone())
            .find(|f| f.name == name)
    }

    /// Global (extern/static) variable declarations only - local scopes
    /// are searched separately by the analyser's scope stack (spec.md
    /// S4.5 "Identifier resolution").
    pub fn find_declaration(&self, name: &str) -> Option<DeclarationRef> {
        self.files
            .borrow()
            .iter()
            .flat_map(|f| f.externs.borrow().clone())
            .find(|d| d.name == name)
    }

    pub fn find_enum_member(&self, name: &str) -> Option<Rc<EnumMember>> {
        self.files.borrow().iter().find_map(|f| {
            f.enums
                .borrow()
                .iter()
                .find_map(|e| e.members.iter().find(|m| m.name == name).cloned())
        })
    }

    /// Turns a syntactic `ParsedType` into a resolved `TypeSpecifier` by
    /// looking up struct/union/enum tags and typedef names against this
    /// TU's visible files (spec.md S4.5 "Pass A"/"Pass B": both passes
    /// resolve every `parsed_type` they touch through the index). A tag
    /// that doesn't resolve is left as an unresolved `Named` leaf so the
    /// caller can log a diagnostic rather than panicking.
    pub fn resolve_parsed_type(&self, pt: &ParsedType) -> TypeSpecifier {
        match pt.kind {
            TypeKind::Basic => TypeSpecifier::Basic {
                basic_type: pt.basic_type,
                is_unsigned: pt.is_unsigned,
                is_const: pt.is_const,
            },
            TypeKind::Pointer => TypeSpecifier::Pointer {
                inner: Box::new(self.resolve_parsed_type(pt.child.as_deref().expect("pointer has a child"))),
                is_const: pt.is_const,
            },
            TypeKind::Array => {
                let element = self.resolve_parsed_type(pt.child.as_deref().expect("array has a child"));
                let size = match &pt.array_size {
                    Some(expr) => match crate::types::const_eval_with_index(expr, self) {
                        Some(n) => cminor_ast::ArraySize::Constant(n),
                        None => cminor_ast::ArraySize::Incomplete,
                    },
                    None => cminor_ast::ArraySize::Incomplete,
                };
                TypeSpecifier::Array {
                    element: Box::new(element),
                    size,
                    is_const: pt.is_const,
                }
            }
            TypeKind::Named => {
                let tag = pt.name.clone().unwrap_or_default();
                match pt.basic_type {
                    BasicType::Struct | BasicType::Union => match self.find_struct(&tag) {
                        Some(def) => TypeSpecifier::Named {
                            basic_type: pt.basic_type,
                            identity: def.identity.clone(),
                            is_typedef: false,
                            is_unsigned: false,
                            is_const: pt.is_const,
                            members: Some(def.members.clone()),
                        },
                        None => unresolved_named(pt.basic_type, tag, pt.is_const),
                    },
                    BasicType::Enum => match self.find_enum(&tag) {
                        Some(def) => TypeSpecifier::Named {
                            basic_type: BasicType::Enum,
                            identity: def.identity.clone(),
                            is_typedef: false,
                            is_unsigned: false,
                            is_const: pt.is_const,
                            members: None,
                        },
                        None => unresolved_named(BasicType::Enum, tag, pt.is_const),
                    },
                    BasicType::TypedefName => match self.find_typedef(&tag) {
                        Some(def) => TypeSpecifier::Named {
                            basic_type: BasicType::TypedefName,
                            identity: TypeIdentity {
                                name: def.name.clone(),
                                search_name: Some(def.name.clone()),
                            },
                            is_typedef: true,
                            is_unsigned: pt.is_unsigned,
                            is_const: pt.is_const,
                            members: None,
                        },
                        None => unresolved_named(BasicType::TypedefName, tag, pt.is_const),
                    },
                    other => unresolved_named(other, tag, pt.is_const),
                }
            }
        }
    }
}

fn unresolved_named(basic_type: BasicType, tag: String, is_const: bool) -> TypeSpecifier {
    TypeSpecifier::Named {
        basic_type,
        identity: TypeIdentity {
            search_name: Some(tag.clone()),
            name: tag,
        },
        is_typedef: basic_type == BasicType::TypedefName,
        is_unsigned: false,
        is_const,
        members: None,
    }
}
