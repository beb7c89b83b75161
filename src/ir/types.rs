//! IR type algebra (spec.md §3 "IR type").
//!
//! Grounded on `original_source/src/ir/ir.h`'s `ir_type_t` tagged union.
//! `IdStruct` is the one variant with identity rather than structural
//! equality/hashing — two distinct `id_struct`s with the same name and
//! body are still different types, matching C's nominal struct typing —
//! so it is represented as a handle into the translation unit's struct
//! arena rather than inline data.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Opaque handle identifying one named (`struct`/`union`) type. Equality
/// and hashing are by handle, never by the type's (possibly still
/// incomplete) body — this is what lets a self-referential struct's body
/// reference its own handle before the body exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum IrType {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    Float,
    Double,
    X86Fp80,
    Ptr(Rc<IrType>),
    Arr(u64, Rc<IrType>),
    /// Anonymous struct, e.g. the x86-64 `va_list` tag or a one-off
    /// compiler-synthesised aggregate.
    Struct(Vec<Rc<IrType>>),
    /// Named struct/union; the body is back-patched once (see
    /// [`StructTable::define_body`]) so self- and mutually-recursive
    /// layouts can be represented during lowering.
    IdStruct(StructId),
    Func {
        ret: Rc<IrType>,
        params: Vec<Rc<IrType>>,
        varargs: bool,
    },
    Opaque,
}

impl IrType {
    pub fn ptr_to(t: IrType) -> IrType {
        IrType::Ptr(Rc::new(t))
    }

    pub fn i8_ptr() -> IrType {
        IrType::ptr_to(IrType::I8)
    }

    pub fn is_aggregate(&self, _structs: &StructTable) -> bool {
        matches!(self, IrType::Struct(_) | IrType::Arr(..) | IrType::IdStruct(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, IrType::I1 | IrType::I8 | IrType::I16 | IrType::I32 | IrType::I64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, IrType::Float | IrType::Double | IrType::X86Fp80)
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, IrType::Ptr(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructKind {
    Struct,
    Union,
}

struct NamedStruct {
    name: Rc<str>,
    kind: StructKind,
    /// `None` until the recursive lowering that created this handle
    /// returns and back-patches the field list (spec.md §9 "Cyclic type
    /// references").
    body: Option<Vec<Rc<IrType>>>,
}

/// Owns every named struct/union type in a translation unit, handed out
/// as stable [`StructId`] handles so recursive/self-referential layouts
/// can reference a struct before its body is known.
#[derive(Default)]
pub struct StructTable {
    entries: RefCell<Vec<NamedStruct>>,
}

impl StructTable {
    pub fn new() -> Self {
        StructTable::default()
    }

    /// Registers a new named struct with an empty body, returning its
    /// handle immediately so field lowering can reference it.
    pub fn declare(&self, name: Rc<str>, kind: StructKind) -> StructId {
        let mut entries = self.entries.borrow_mut();
        let id = StructId(entries.len() as u32);
        entries.push(NamedStruct { name, kind, body: None });
        id
    }

    pub fn define_body(&self, id: StructId, fields: Vec<Rc<IrType>>) {
        self.entries.borrow_mut()[id.0 as usize].body = Some(fields);
    }

    pub fn name(&self, id: StructId) -> Rc<str> {
        self.entries.borrow()[id.0 as usize].name.clone()
    }

    pub fn kind(&self, id: StructId) -> StructKind {
        self.entries.borrow()[id.0 as usize].kind
    }

    pub fn is_defined(&self, id: StructId) -> bool {
        self.entries.borrow()[id.0 as usize].body.is_some()
    }

    pub fn fields(&self, id: StructId) -> Vec<Rc<IrType>> {
        self.entries.borrow()[id.0 as usize]
            .body
            .clone()
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.entries.borrow().len()
    }

    /// All handles in declaration order, for deterministic printing
    /// (spec.md §4.3 "named struct declarations").
    pub fn ids_in_order(&self) -> Vec<StructId> {
        (0..self.entries.borrow().len() as u32).map(StructId).collect()
    }
}

impl fmt::Display for StructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%struct.{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_referential_struct_back_patches() {
        let table = StructTable::new();
        let id = table.declare(Rc::from("N"), StructKind::Struct);
        assert!(!table.is_defined(id));
        let fields = vec![Rc::new(IrType::ptr_to(IrType::IdStruct(id))), Rc::new(IrType::I32)];
        table.define_body(id, fields);
        assert!(table.is_defined(id));
        assert_eq!(table.fields(id).len(), 2);
    }

    #[test]
    fn distinct_handles_are_never_equal_even_with_same_name() {
        let table = StructTable::new();
        let a = table.declare(Rc::from("T"), StructKind::Struct);
        let b = table.declare(Rc::from("T"), StructKind::Struct);
        assert_ne!(a, b);
    }
}
