//! IR function (spec.md §3 "IR function").
//!
//! The prefix/body split and the monotonic temp/label counters are
//! grounded on `original_source/src/ir/ir.h`'s `ir_func_t`. The spec's
//! "doubly-linked list of statements" is realised here as two plain
//! `Vec<Stmt>`s: the translator only ever appends to the body and
//! (separately) to the prefix, and only ever peeks the body's tail
//! (`last_label`) — a `Vec` gives that at lower cost than a real linked
//! list without losing any capability the translator needs.

use super::stmt::{Label, Stmt};
use super::symtab::SymTab;
use super::types::IrType;
use super::value::Value;
use std::rc::Rc;

pub struct Function {
    pub name: Rc<str>,
    pub func_ty: IrType,
    /// `alloca`s and parameter-store setup, emitted before `body`.
    pub prefix: Vec<Stmt>,
    pub body: Vec<Stmt>,
    pub params: Vec<Value>,
    pub locals: SymTab,
    next_temp: u32,
    next_label: u32,
    /// The most recently emitted `Label`, so constructs that need to
    /// know "which block are we actually in right now" (phi predecessor
    /// tracking) don't have to scan `body` backwards.
    pub last_label: Option<Label>,
}

impl Function {
    pub fn new(name: impl Into<Rc<str>>, func_ty: IrType, params: Vec<Value>) -> Self {
        Function {
            name: name.into(),
            func_ty,
            prefix: Vec::new(),
            body: Vec::new(),
            params,
            locals: SymTab::new(),
            next_temp: 0,
            next_label: 0,
            last_label: None,
        }
    }

    pub fn fresh_temp(&mut self) -> Rc<str> {
        let name = Rc::from(format!("t{}", self.next_temp));
        self.next_temp += 1;
        name
    }

    /// A fresh unnamed numeric label (spec.md §3 "Labels created by
    /// `numlabel_create` are unique within a function").
    pub fn fresh_label(&mut self, hint: &str) -> Label {
        let name = Rc::from(format!("{}.{}", hint, self.next_label));
        self.next_label += 1;
        Label(name)
    }

    pub fn push_prefix(&mut self, stmt: Stmt) {
        self.prefix.push(stmt);
    }

    pub fn emit(&mut self, stmt: Stmt) {
        if let Stmt::Label(l) = &stmt {
            self.last_label = Some(l.clone());
        }
        self.body.push(stmt);
    }

    /// True if the body's last statement is a terminator — used to avoid
    /// emitting dead code after a statement that always jumps (spec.md
    /// §4.2 "ignore_until_label").
    pub fn body_ends_in_terminator(&self) -> bool {
        self.body.last().map(|s| s.is_terminator()).unwrap_or(false)
    }

    /// All labels actually defined in this function, for the label
    /// uniqueness invariant (spec.md §8).
    pub fn defined_labels(&self) -> Vec<&Label> {
        self.prefix
            .iter()
            .chain(self.body.iter())
            .filter_map(|s| match s {
                Stmt::Label(l) => Some(l),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_unique_within_a_function() {
        let mut f = Function::new("f", IrType::Void, vec![]);
        let l1 = f.fresh_label("if.then");
        let l2 = f.fresh_label("if.then");
        assert_ne!(l1, l2);
    }

    #[test]
    fn emitting_a_label_updates_last_label() {
        let mut f = Function::new("f", IrType::Void, vec![]);
        let l = f.fresh_label("entry");
        f.emit(Stmt::Label(l.clone()));
        assert_eq!(f.last_label, Some(l));
    }
}
