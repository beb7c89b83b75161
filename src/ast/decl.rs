//! AST declarations (spec.md §3 "AST", §4.2 "Global traversal").
//!
//! Grounded on `original_source/src/parser/ast.h`'s `gdecl_t`. K&R-style
//! old-style function definitions (separate identifier list + parameter
//! declarations) are not represented here: the parser accepts only
//! prototype (ANSI) parameter lists, narrowing spec.md's call-translation
//! rule to call sites, not definitions (SPEC_FULL.md §4.2 supplement,
//! recorded as an Open Question decision in DESIGN.md).

use super::expr::Expr;
use super::stmt::Stmt;
use super::types::{CType, Param};
use crate::mark::SourceMark;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageClass {
    pub is_static: bool,
    pub is_extern: bool,
    pub is_typedef: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: Rc<str>,
    pub ty: Rc<CType>,
    pub storage: StorageClass,
    /// Present only for the positional, designator-free form the
    /// typechecker's initializer canonicaliser produces.
    pub init: Option<Expr>,
    pub mark: SourceMark,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: Rc<str>,
    pub ret: Rc<CType>,
    pub params: Rc<Vec<Param>>,
    pub variadic: bool,
    pub storage: StorageClass,
    /// `None` for a prototype-only declaration; `Some` for a definition.
    pub body: Option<Stmt>,
    pub mark: SourceMark,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Var(VarDecl),
    Func(FuncDecl),
    /// `struct`/`union`/`enum` tag declaration or definition with no
    /// accompanying variable, e.g. `struct S { ... };`.
    Tag(Rc<CType>),
    Typedef { name: Rc<str>, underlying: Rc<CType> },
}

impl Decl {
    pub fn name(&self) -> Option<&str> {
        match self {
            Decl::Var(v) => Some(&v.name),
            Decl::Func(f) => Some(&f.name),
            Decl::Typedef { name, .. } => Some(name),
            Decl::Tag(_) => None,
        }
    }
}

/// A whole translation unit's worth of top-level declarations, in source
/// order (spec.md §4.2 "Global traversal" walks this list twice: once to
/// pre-register every function, once to emit bodies/globals).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub decls: Vec<Decl>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn func_decl_without_body_is_a_prototype() {
        let f = FuncDecl {
            name: Rc::from("f"),
            ret: Rc::new(CType::Void),
            params: Rc::new(vec![]),
            variadic: false,
            storage: StorageClass::default(),
            body: None,
            mark: SourceMark::synthetic(),
        };
        assert!(f.body.is_none());
    }
}
