//! IR translation unit (spec.md §3 "IR translation unit").

use super::function::Function;
use super::stmt::Label;
use super::symtab::SymTab;
use super::types::{IrType, StructId, StructKind, StructTable};
use super::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A global not yet materialised because nothing has referenced it yet
/// (spec.md §4.2 "extern globals are recorded in a lazy-emit table").
pub struct PendingGlobal {
    pub name: Rc<str>,
    pub ty: super::types::IrType,
    pub is_function: bool,
}

#[derive(Default)]
pub struct TranslationUnit {
    pub structs: StructTable,
    /// Non-extern, non-function globals, materialised eagerly in
    /// declaration order.
    pub decls: Vec<(Rc<str>, super::types::IrType, Option<Value>)>,
    pub funcs: Vec<Function>,
    pub globals: SymTab,
    labels: HashMap<Rc<str>, Label>,
    /// Declarations (function prototypes, extern globals) only emitted
    /// once actually referenced.
    pub global_decls: Vec<PendingGlobal>,
    referenced_pending: std::collections::HashSet<Rc<str>>,
    /// raw string -> (global name, length including NUL).
    strings: HashMap<Rc<str>, (Rc<str>, u32)>,
    string_counter: u32,
    pub static_counter: u32,
    /// Set once `llvm.memcpy.p0i8.p0i8.i64` has been declared (spec.md
    /// §4.2 "lazily declared on first use").
    pub memcpy_declared: bool,
    pub va_intrinsics_declared: bool,
    va_list_struct: RefCell<Option<StructId>>,
}

impl TranslationUnit {
    pub fn new() -> Self {
        TranslationUnit::default()
    }

    /// Interns `s`: identical raw strings resolve to the same global
    /// (spec.md §3 "String literals are interned"). The backing global is
    /// appended to `decls` at first use so string globals print
    /// interleaved with other globals in declaration order, matching
    /// `original_source/src/ir/ir_print.c` (spec.md §4.3 supplement).
    pub fn intern_string(&mut self, s: &str) -> (Rc<str>, u32) {
        if let Some(existing) = self.strings.get(s) {
            return existing.clone();
        }
        let name: Rc<str> = Rc::from(format!("@.str.{}", self.string_counter));
        self.string_counter += 1;
        let len = s.len() as u32 + 1;
        let entry = (name.clone(), len);
        self.strings.insert(Rc::from(s), entry.clone());
        let ty = super::types::IrType::Arr(len as u64, Rc::new(super::types::IrType::I8));
        let value = Value::Const { ty: ty.clone(), value: super::value::Const::Str(Rc::from(s), len) };
        self.decls.push((name, ty, Some(value)));
        entry
    }

    pub fn interned_strings(&self) -> Vec<(Rc<str>, Rc<str>, u32)> {
        let mut v: Vec<_> = self.strings.iter().map(|(raw, (name, len))| (raw.clone(), name.clone(), *len)).collect();
        v.sort_by(|a, b| a.1.cmp(&b.1));
        v
    }

    pub fn intern_label(&mut self, name: &str) -> Label {
        self.labels
            .entry(Rc::from(name))
            .or_insert_with(|| Label(Rc::from(name)))
            .clone()
    }

    pub fn declare_pending(&mut self, name: impl Into<Rc<str>>, ty: super::types::IrType, is_function: bool) {
        let name = name.into();
        if self.referenced_pending.contains(&name) {
            return;
        }
        self.referenced_pending.insert(name.clone());
        self.global_decls.push(PendingGlobal { name, ty, is_function });
    }

    pub fn declare_struct(&self, name: impl Into<Rc<str>>, kind: super::types::StructKind) -> StructId {
        self.structs.declare(name.into(), kind)
    }

    /// The single `%struct.__va_list_tag` named struct backing
    /// `__builtin_va_list` (spec.md §9 "`va_list` representation"),
    /// declared on first use.
    pub fn va_list_struct_id(&self) -> StructId {
        let mut cached = self.va_list_struct.borrow_mut();
        if let Some(id) = *cached {
            return id;
        }
        let id = self.structs.declare(Rc::from("__va_list_tag"), StructKind::Struct);
        self.structs.define_body(id, vec![Rc::new(IrType::I32), Rc::new(IrType::I32), Rc::new(IrType::i8_ptr()), Rc::new(IrType::i8_ptr())]);
        *cached = Some(id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_share_one_global() {
        let mut unit = TranslationUnit::new();
        let (n1, _) = unit.intern_string("hello");
        let (n2, _) = unit.intern_string("hello");
        assert_eq!(n1, n2);
        assert_eq!(unit.interned_strings().len(), 1);
    }

    #[test]
    fn different_strings_get_different_globals() {
        let mut unit = TranslationUnit::new();
        let (n1, _) = unit.intern_string("a");
        let (n2, _) = unit.intern_string("b");
        assert_ne!(n1, n2);
    }
}
