//! `#include` search-path resolution (spec.md §4.1 "Include resolution").
//!
//! Grounded on the teacher's `resolver.rs`: a small path-search struct kept
//! separate from directive parsing, with a `FileLoader` seam so tests never
//! have to touch the real filesystem (the teacher's own resolver tests feed
//! it from in-memory fixtures the same way).

use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Abstraction over "read a file's text", so unit tests can supply an
/// in-memory tree instead of real files.
pub trait FileLoader {
    fn read_to_string(&self, path: &Path) -> std::io::Result<Rc<str>>;
    fn is_file(&self, path: &Path) -> bool;
}

#[derive(Default)]
pub struct RealFileLoader;

impl FileLoader for RealFileLoader {
    fn read_to_string(&self, path: &Path) -> std::io::Result<Rc<str>> {
        std::fs::read_to_string(path).map(Rc::from)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Whether `#include` named its target with `"..."` or `<...>`; the two
/// forms search different path lists before falling back to the shared
/// system directories (C11 §6.10.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeForm {
    Quoted,
    Angled,
}

pub struct IncludeSearch {
    /// `-I` directories, searched (for both forms) after the form-specific
    /// directory and before the system defaults.
    pub user_paths: Vec<PathBuf>,
    system_paths: Vec<PathBuf>,
}

impl IncludeSearch {
    pub fn new(user_paths: Vec<PathBuf>) -> Self {
        IncludeSearch {
            user_paths,
            system_paths: vec![
                PathBuf::from("/usr/local/include"),
                PathBuf::from("/usr/include"),
            ],
        }
    }

    /// Resolves `name` given the directory of the file containing the
    /// `#include` (used only for the quoted form's first search location).
    pub fn resolve(
        &self,
        loader: &dyn FileLoader,
        name: &str,
        form: IncludeForm,
        including_dir: &Path,
    ) -> Option<PathBuf> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if form == IncludeForm::Quoted {
            candidates.push(including_dir.join(name));
        }
        candidates.push(PathBuf::from(".").join(name));
        for dir in &self.user_paths {
            candidates.push(dir.join(name));
        }
        for dir in &self.system_paths {
            candidates.push(dir.join(name));
        }
        candidates.into_iter().find(|p| loader.is_file(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct MemLoader(RefCell<HashMap<PathBuf, String>>);

    impl FileLoader for MemLoader {
        fn read_to_string(&self, path: &Path) -> std::io::Result<Rc<str>> {
            self.0
                .borrow()
                .get(path)
                .cloned()
                .map(Rc::from)
                .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
        }

        fn is_file(&self, path: &Path) -> bool {
            self.0.borrow().contains_key(path)
        }
    }

    #[test]
    fn quoted_include_prefers_including_directory() {
        let loader = MemLoader(RefCell::new(HashMap::from([(
            PathBuf::from("src/util.h"),
            "".to_string(),
        )])));
        let search = IncludeSearch::new(vec![]);
        let found = search.resolve(&loader, "util.h", IncludeForm::Quoted, Path::new("src"));
        assert_eq!(found, Some(PathBuf::from("src/util.h")));
    }

    #[test]
    fn angled_include_uses_user_path() {
        let loader = MemLoader(RefCell::new(HashMap::from([(
            PathBuf::from("/opt/inc/foo.h"),
            "".to_string(),
        )])));
        let search = IncludeSearch::new(vec![PathBuf::from("/opt/inc")]);
        let found = search.resolve(&loader, "foo.h", IncludeForm::Angled, Path::new("src"));
        assert_eq!(found, Some(PathBuf::from("/opt/inc/foo.h")));
    }

    #[test]
    fn missing_header_resolves_to_none() {
        let loader = MemLoader(RefCell::new(HashMap::new()));
        let search = IncludeSearch::new(vec![]);
        assert!(search.resolve(&loader, "nope.h", IncludeForm::Angled, Path::new(".")).is_none());
    }
}
