//! Macro table: object-like and function-like macro definitions, with the
//! redefinition-equality law from spec.md §3/§8.

use crate::token::Token;
use std::collections::HashMap;
use std::rc::Rc;

/// Ordered, possibly-variadic parameter list of a function-like macro.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub names: Vec<Rc<str>>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arity {
    /// Object-like macro (`#define NAME body`).
    ObjectLike,
    /// Function-like macro with its parameter list.
    FunctionLike(Params),
}

#[derive(Debug, Clone)]
pub struct Macro {
    pub name: Rc<str>,
    pub arity: Arity,
    pub body: Vec<Token>,
}

impl Macro {
    /// Two macros are equal iff same name, same parameter names in order,
    /// and the same body token sequence ignoring whitespace (spec.md §3).
    pub fn semantically_equal(&self, other: &Macro) -> bool {
        if self.name != other.name || self.arity != other.arity {
            return false;
        }
        let a: Vec<_> = self.body.iter().filter(|t| !t.is_whitespace()).collect();
        let b: Vec<_> = other.body.iter().filter(|t| !t.is_whitespace()).collect();
        if a.len() != b.len() {
            return false;
        }
        a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.kind == y.kind && x.payload == y.payload)
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        match &self.arity {
            Arity::FunctionLike(p) => p.names.iter().position(|n| n.as_ref() == name),
            Arity::ObjectLike => None,
        }
    }

    pub fn is_function_like(&self) -> bool {
        matches!(self.arity, Arity::FunctionLike(_))
    }

    pub fn is_variadic(&self) -> bool {
        matches!(&self.arity, Arity::FunctionLike(p) if p.variadic)
    }
}

/// `char * -> cpp_macro_t` in `original_source`; here `Rc<str> -> Macro`.
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<Rc<str>, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        MacroTable::default()
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Returns `Err(existing)` when the redefinition is not semantically
    /// equal to the existing definition (spec.md §4.1 "Macro definition").
    pub fn define(&mut self, new_macro: Macro) -> Result<(), Macro> {
        if let Some(existing) = self.macros.get(&new_macro.name) {
            if !existing.semantically_equal(&new_macro) {
                return Err(existing.clone());
            }
        }
        self.macros.insert(new_macro.name.clone(), new_macro);
        Ok(())
    }

    /// `#undef NAME` removes the entry; no error if absent (spec.md §4.1
    /// supplement).
    pub fn undef(&mut self, name: &str) {
        self.macros.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::SourceMark;
    use crate::token::TokenKind;

    fn tok(kind: TokenKind) -> Token {
        Token::new(kind, SourceMark::synthetic())
    }

    #[test]
    fn redefinition_with_equal_body_is_allowed() {
        let mut table = MacroTable::new();
        let m1 = Macro {
            name: Rc::from("FOO"),
            arity: Arity::ObjectLike,
            body: vec![tok(TokenKind::IntLit)],
        };
        let m2 = m1.clone();
        assert!(table.define(m1).is_ok());
        assert!(table.define(m2).is_ok());
    }

    #[test]
    fn redefinition_with_different_body_is_rejected() {
        let mut table = MacroTable::new();
        let m1 = Macro {
            name: Rc::from("FOO"),
            arity: Arity::ObjectLike,
            body: vec![tok(TokenKind::IntLit)],
        };
        let m2 = Macro {
            name: Rc::from("FOO"),
            arity: Arity::ObjectLike,
            body: vec![tok(TokenKind::FloatLit)],
        };
        assert!(table.define(m1).is_ok());
        assert!(table.define(m2).is_err());
    }

    #[test]
    fn whitespace_is_ignored_for_equality() {
        let m1 = Macro {
            name: Rc::from("FOO"),
            arity: Arity::ObjectLike,
            body: vec![tok(TokenKind::IntLit), tok(TokenKind::Space)],
        };
        let m2 = Macro {
            name: Rc::from("FOO"),
            arity: Arity::ObjectLike,
            body: vec![tok(TokenKind::Space), tok(TokenKind::IntLit)],
        };
        assert!(m1.semantically_equal(&m2));
    }
}
