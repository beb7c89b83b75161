//! Scoped symbol table mapping identifiers to IR values, used both for a
//! function's locals and (at unit scope) for globals (spec.md §3 "IR
//! function"/"IR translation unit").

use super::value::Value;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SymTab {
    scopes: Vec<HashMap<String, Value>>,
}

impl SymTab {
    pub fn new() -> Self {
        SymTab { scopes: vec![HashMap::new()] }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty(), "popped the outermost symbol table scope");
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.scopes.last_mut().expect("at least one scope").insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    /// True if `name` is bound in the *innermost* scope only — used to
    /// reject `for`-loop-declaration shadowing surprises before they
    /// happen (not currently enforced upstream, kept permissive).
    pub fn is_bound_locally(&self, name: &str) -> bool {
        self.scopes.last().map(|s| s.contains_key(name)).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::IrType;

    #[test]
    fn inner_scope_shadows_outer() {
        let mut tab = SymTab::new();
        tab.insert("x", Value::var("x_outer", IrType::I32, true));
        tab.push_scope();
        tab.insert("x", Value::var("x_inner", IrType::I32, true));
        assert_eq!(tab.lookup("x"), Some(&Value::var("x_inner", IrType::I32, true)));
        tab.pop_scope();
        assert_eq!(tab.lookup("x"), Some(&Value::var("x_outer", IrType::I32, true)));
    }
}
