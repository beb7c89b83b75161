//! `CType` → `IrType` lowering (spec.md §9 "Cyclic type references").
//!
//! Grounded on `original_source/src/trans/trans_type.c`. Named structs
//! are declared (empty body) before their members are lowered so a
//! self-referential member type resolves to the same handle instead of
//! recursing forever; bitfield runs collapse to a single trailing
//! `[N x i8]` field per run, matching the translator's bitfield lowering.

use super::Translator;
use crate::ast::types::{CType, Member, StructOrUnion};
use crate::ir::types::{IrType, StructKind};
use crate::typeck::layout::bitfield_run_bytes;
use std::rc::Rc;

impl<'a> Translator<'a> {
    pub fn lower_type(&mut self, ty: &CType) -> IrType {
        match ty.unwrap_typedef() {
            CType::Void => IrType::Void,
            CType::Bool => IrType::I1,
            CType::Char { .. } => IrType::I8,
            CType::Short { .. } => IrType::I16,
            CType::Int { .. } | CType::Enum { .. } => IrType::I32,
            CType::Long { .. } | CType::LongLong { .. } => IrType::I64,
            CType::Float => IrType::Float,
            CType::Double => IrType::Double,
            CType::LongDouble => IrType::X86Fp80,
            CType::Ptr(inner) => IrType::ptr_to(self.lower_type(inner)),
            CType::Array { elem, len } => IrType::Arr(len.unwrap_or(0), Rc::new(self.lower_type(elem))),
            CType::Func { ret, params, variadic, .. } => IrType::Func {
                ret: Rc::new(self.lower_type(ret)),
                params: params.iter().map(|p| Rc::new(self.lower_type(&p.ty))).collect(),
                varargs: *variadic,
            },
            CType::VaList => IrType::ptr_to(IrType::IdStruct(self.unit.va_list_struct_id())),
            CType::Record { kind, tag, members } => self.lower_record(*kind, tag.clone(), members.clone()),
            CType::Typedef { .. } => unreachable!("unwrap_typedef already stripped this"),
        }
    }

    fn lower_record(&mut self, kind: StructOrUnion, tag: Option<Rc<str>>, members: Option<Rc<Vec<Member>>>) -> IrType {
        match tag {
            Some(name) => {
                if let Some(&id) = self.struct_cache.get(&name) {
                    if !self.unit.structs.is_defined(id) {
                        if let Some(m) = &members {
                            let fields = self.lower_fields(kind, m);
                            self.unit.structs.define_body(id, fields);
                        }
                    }
                    return IrType::IdStruct(id);
                }
                let sk = match kind {
                    StructOrUnion::Struct => StructKind::Struct,
                    StructOrUnion::Union => StructKind::Union,
                };
                let id = self.unit.declare_struct(name.clone(), sk);
                self.struct_cache.insert(name.clone(), id);
                if let Some(m) = &members {
                    let fields = self.lower_fields(kind, m);
                    self.unit.structs.define_body(id, fields);
                }
                IrType::IdStruct(id)
            }
            None => {
                let fields = members.as_ref().map(|m| self.lower_fields(kind, m)).unwrap_or_default();
                IrType::Struct(fields)
            }
        }
    }

    fn lower_fields(&mut self, kind: StructOrUnion, members: &[Member]) -> Vec<Rc<IrType>> {
        match kind {
            StructOrUnion::Struct => self.lower_member_fields(members),
            StructOrUnion::Union => vec![Rc::new(self.union_stored_type(members))],
        }
    }

    /// A union is represented as a one-field struct wrapping its widest
    /// member's IR type; member access bitcasts that single field's
    /// pointer to the accessed member's type when they differ.
    pub fn union_stored_type(&mut self, members: &[Member]) -> IrType {
        let widest = members.iter().max_by_key(|m| crate::typeck::layout::size_of(&m.ty));
        match widest {
            Some(m) => self.lower_type(&m.ty),
            None => IrType::Opaque,
        }
    }

    /// One IR field per non-bitfield member, plus one `[N x i8]` field per
    /// contiguous bitfield run (spec.md §4.2 "Bitfield lowering").
    fn lower_member_fields(&mut self, members: &[Member]) -> Vec<Rc<IrType>> {
        let runs = bitfield_run_bytes(members);
        let mut run_idx = 0;
        let mut fields = Vec::new();
        let mut i = 0;
        while i < members.len() {
            if members[i].bit_width.is_some() {
                fields.push(Rc::new(IrType::Arr(runs[run_idx], Rc::new(IrType::I8))));
                run_idx += 1;
                while i < members.len() && members[i].bit_width.is_some() && members[i].bit_width != Some(0) {
                    i += 1;
                }
                if i < members.len() && members[i].bit_width == Some(0) {
                    i += 1;
                }
                continue;
            }
            fields.push(Rc::new(self.lower_type(&members[i].ty)));
            i += 1;
        }
        fields
    }
}
