//! `FileDecl` and the process-lifetime `HeaderStore`. Grounded on
//! `header_store.h`/`header_store.c`: a `FileDecl` is the authoritative
//! container for one parsed file's declarations, and the store guards
//! parse-once by keying on canonical path (spec.md S4.3 "Store").

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use cminor_ast::{DeclarationRef, EnumDefinitionRef, FunctionRef, StructDefinitionRef, TypedefDefinitionRef};

/// One parsed file's declarations. `Rc<RefCell<_>>` because a single
/// `FileDecl` is referenced from the store and from every `HeaderIndex`
/// that pulled it in (spec.md S9 design note (c)).
#[derive(Debug)]
pub struct FileDecl {
    pub path: String,
    pub class_name: String,
    pub is_header: bool,
    pub functions: RefCell<Vec<FunctionRef>>,
    pub structs: RefCell<Vec<StructDefinitionRef>>,
    pub enums: RefCell<Vec<EnumDefinitionRef>>,
    pub typedefs: RefCell<Vec<TypedefDefinitionRef>>,
    pub externs: RefCell<Vec<DeclarationRef>>,
    /// `(path, is_embedded)` pairs; populated exactly once per spec.md S3
    /// invariant "a parsed header's dependency list is populated exactly
    /// once and reused on every subsequent inclusion".
    dependencies: RefCell<Option<Vec<(String, bool)>>>,
}

pub type FileDeclRef = Rc<FileDecl>;

impl FileDecl {
    fn new(path: &str) -> Self {
        let class_name = Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        let is_header = path.ends_with(".h");
        FileDecl {
            path: path.to_string(),
            class_name,
            is_header,
            functions: RefCell::new(Vec::new()),
            structs: RefCell::new(Vec::new()),
            enums: RefCell::new(Vec::new()),
            typedefs: RefCell::new(Vec::new()),
            externs: RefCell::new(Vec::new()),
            dependencies: RefCell::new(None),
        }
    }

    pub fn add_function(&self, f: FunctionRef) {
        if f.class_name.borrow().is_empty() {
            *f.class_name.borrow_mut() = self.class_name.clone();
        }
        self.functions.borrow_mut().push(f);
    }

    pub fn add_struct(&self, s: StructDefinitionRef) {
        self.structs.borrow_mut().push(s);
    }

    pub fn add_enum(&self, e: EnumDefinitionRef) {
        self.enums.borrow_mut().push(e);
    }

    pub fn add_typedef(&self, t: TypedefDefinitionRef) {
        self.typedefs.borrow_mut().push(t);
    }

    pub fn add_extern(&self, d: DeclarationRef) {
        if d.class_name.borrow().is_empty() {
            *d.class_name.borrow_mut() = self.class_name.clone();
        }
        self.externs.borrow_mut().push(d);
    }

    pub fn dependencies(&self) -> Option<Vec<(String, bool)>> {
        self.dependencies.borrow().clone()
    }

    pub fn set_dependencies_once(&self, deps: Vec<(String, bool)>) {
        let mut slot = self.dependencies.borrow_mut();
        if slot.is_none() {
            *slot = Some(deps);
        }
    }
}

/// Process-lifetime catalogue of every parsed file, keyed by path.
/// Append-only (spec.md S5 "No shared-memory mutation hazards"); owned by
/// a `CompilerContext`, never placed at module scope (spec.md S9 "Global
/// mutable state").
#[derive(Debug, Default)]
pub struct HeaderStore {
    files: RefCell<HashMap<String, FileDeclRef>>,
}

impl HeaderStore {
    pub fn new() -> Self {
        HeaderStore {
            files: RefCell::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, path: &str) -> FileDeclRef {
        if let Some(existing) = self.files.borrow().get(path) {
            return existing.clone();
        }
        let decl = Rc::new(FileDecl::new(path));
        self.files.borrow_mut().insert(path.to_string(), decl.clone());
        decl
    }

    pub fn get(&self, path: &str) -> Option<FileDeclRef> {
        self.files.borrow().get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
