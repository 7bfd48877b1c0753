//! `SourceProvider`: abstracts "where file bytes come from" so the
//! preprocessor and driver never call `std::fs` directly. Generalizes the
//! original's embedded-file table (spec.md S4.1/S6) into something shared
//! by the whole pipeline, not just the `#include` resolver
//! (SPEC_FULL.md C1).

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

pub trait SourceProvider {
    fn read(&self, path: &Path) -> io::Result<String>;
    fn exists(&self, path: &Path) -> bool;
}

/// Reads real files off disk.
#[derive(Debug, Default, Clone)]
pub struct FsProvider;

impl SourceProvider for FsProvider {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// An in-memory table, keyed by path as written in source. Used for the
/// embedded-file table and for tests that want to drive the driver without
/// touching a filesystem.
#[derive(Debug, Default, Clone)]
pub struct MapProvider {
    files: HashMap<PathBuf, String>,
}

impl MapProvider {
    pub fn new() -> Self {
        MapProvider {
            files: HashMap::new(),
        }
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> &mut Self {
        self.files.insert(path.into(), contents.into());
        self
    }
}

impl SourceProvider for MapProvider {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not in embedded file table", path.display()),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

/// Checks the embedded table first, then (for quoted includes) the
/// including file's own directory, then the `-I` search roots (checked
/// for both quoted and angle-bracket includes, matching `cc`'s own
/// extra-search-path semantics) - the order spec.md S6 "Preprocessor
/// grammar" requires, extended with `include_dirs` per SPEC_FULL.md's
/// `-I` flag.
pub fn resolve_include(
    embedded: &dyn SourceProvider,
    disk: &dyn SourceProvider,
    including_dir: Option<&Path>,
    include_dirs: &[PathBuf],
    target: &str,
    is_quoted: bool,
) -> Option<(PathBuf, bool)> {
    let basename = Path::new(target);
    if embedded.exists(basename) {
        return Some((basename.to_path_buf(), true));
    }
    if is_quoted {
        if let Some(dir) = including_dir {
            let candidate = dir.join(target);
            if disk.exists(&candidate) {
                return Some((candidate, false));
            }
        }
    }
    for dir in include_dirs {
        let candidate = dir.join(target);
        if disk.exists(&candidate) {
            return Some((candidate, false));
        }
    }
    let plain = PathBuf::from(target);
    if disk.exists(&plain) {
        return Some((plain, false));
    }
    None
}
