//! Bitfield read/write lowering (spec.md §4.2 "Bitfield lowering", §8
//! scenario 2).
//!
//! Grounded on `original_source/src/trans/trans_expr.c`'s bitfield member
//! access path. Reads/writes walk the owning run's `[N x i8]` field one
//! byte at a time, computing per byte the overlap between the field's bit
//! range and that byte's bit range.

use super::emit_assign;
use crate::ast::types::Member;
use crate::ir::function::Function;
use crate::ir::stmt::Stmt;
use crate::ir::types::IrType;
use crate::ir::value::{BinOp, Value};
use std::rc::Rc;

/// Where one bitfield member lives: which IR struct field holds its run,
/// how many bytes that run spans, and the member's bit offset/width
/// within the run.
pub struct BitfieldLoc {
    pub struct_field_index: usize,
    pub run_bytes: u64,
    pub bit_offset: u32,
    pub bit_width: u32,
}

/// Locates `field` within `members` if it is a bitfield member; `None`
/// for an ordinary member (the caller falls back to plain GEP/load/store).
pub fn locate(members: &[Member], field: &str) -> Option<BitfieldLoc> {
    let mut struct_field_index = 0usize;
    let mut i = 0;
    while i < members.len() {
        if members[i].bit_width.is_some() {
            let run_start = i;
            while i < members.len() && members[i].bit_width.is_some() && members[i].bit_width != Some(0) {
                i += 1;
            }
            if i < members.len() && members[i].bit_width == Some(0) {
                i += 1;
            }
            let run = &members[run_start..i];
            let mut bit_offset = 0u32;
            for m in run {
                if &*m.name == field {
                    let bits: u32 = run.iter().filter_map(|x| x.bit_width).sum();
                    let run_bytes = (((bits + 7) / 8).max(1)) as u64;
                    return Some(BitfieldLoc { struct_field_index, run_bytes, bit_offset, bit_width: m.bit_width.unwrap() });
                }
                bit_offset += m.bit_width.unwrap_or(0);
            }
            struct_field_index += 1;
            continue;
        }
        if &*members[i].name == field {
            return None;
        }
        struct_field_index += 1;
        i += 1;
    }
    None
}

/// IR struct-field index of an ordinary (non-bitfield) member, counting
/// one field per bitfield run the way `type_lower`'s `lower_member_fields`
/// does. `None` if `field` names a bitfield member instead.
pub fn ordinary_field_index(members: &[Member], field: &str) -> Option<usize> {
    let mut idx = 0usize;
    let mut i = 0;
    while i < members.len() {
        if members[i].bit_width.is_some() {
            while i < members.len() && members[i].bit_width.is_some() && members[i].bit_width != Some(0) {
                i += 1;
            }
            if i < members.len() && members[i].bit_width == Some(0) {
                i += 1;
            }
            idx += 1;
            continue;
        }
        if &*members[i].name == field {
            return Some(idx);
        }
        idx += 1;
        i += 1;
    }
    None
}

/// Pointer to the byte at `run_bytes_index` within the run field
/// `struct_field_index` of the struct addressed by `struct_ptr`.
fn byte_ptr(f: &mut Function, struct_ptr: &Value, run_bytes: u64, struct_field_index: usize, byte_index: u64) -> Value {
    let arr_ty = IrType::Arr(run_bytes, Rc::new(IrType::I8));
    let arr_ptr = emit_assign(
        f,
        IrType::ptr_to(arr_ty.clone()),
        Value::GetElemPtr {
            result_ty: IrType::ptr_to(arr_ty.clone()),
            ptr_ty: struct_ptr.ty(),
            ptr: Box::new(struct_ptr.clone()),
            indices: vec![Value::int(IrType::I32, 0), Value::int(IrType::I32, struct_field_index as i128)],
        },
    );
    emit_assign(
        f,
        IrType::ptr_to(IrType::I8),
        Value::GetElemPtr {
            result_ty: IrType::ptr_to(IrType::I8),
            ptr_ty: arr_ptr.ty(),
            ptr: Box::new(arr_ptr),
            indices: vec![Value::int(IrType::I32, 0), Value::int(IrType::I32, byte_index as i128)],
        },
    )
}

/// Each byte of the run that at least partially overlaps the field:
/// `(byte_index, bits_in_byte, shift_within_byte, shift_within_value)`.
fn overlapping_bytes(loc: &BitfieldLoc) -> Vec<(u64, u32, u32, u32)> {
    let mut out = Vec::new();
    for b in 0..loc.run_bytes {
        let byte_lo = (b * 8) as u32;
        let byte_hi = byte_lo + 7;
        let field_lo = loc.bit_offset;
        let field_hi = loc.bit_offset + loc.bit_width - 1;
        let overlap_lo = byte_lo.max(field_lo);
        let overlap_hi = byte_hi.min(field_hi);
        if overlap_lo > overlap_hi {
            continue;
        }
        let bits_in_byte = overlap_hi - overlap_lo + 1;
        let shift_within_byte = overlap_lo - byte_lo;
        let shift_within_value = overlap_lo - field_lo;
        out.push((b, bits_in_byte, shift_within_byte, shift_within_value));
    }
    out
}

/// Reads a bitfield member, producing a value of `result_ty` (the
/// member's lowered integer type, e.g. `i32`) with all bits above the
/// field's width cleared (spec.md §4.2 "reads do `load, mask, shift, or`
/// across bytes").
pub fn load_bitfield(f: &mut Function, struct_ptr: &Value, loc: &BitfieldLoc, result_ty: IrType) -> Value {
    let mut result = Value::zero(result_ty.clone());
    for (byte_index, bits_in_byte, shift_within_byte, shift_within_value) in overlapping_bytes(loc) {
        let ptr = byte_ptr(f, struct_ptr, loc.run_bytes, loc.struct_field_index, byte_index);
        let byte_val = emit_assign(f, IrType::I8, Value::Load { ty: IrType::I8, ptr: Box::new(ptr) });
        let mask_in_byte = ((1u32 << bits_in_byte) - 1) << shift_within_byte;
        let masked = emit_assign(f, IrType::I8, Value::Binop { op: BinOp::And, ty: IrType::I8, lhs: Box::new(byte_val), rhs: Box::new(Value::int(IrType::I8, mask_in_byte as i128)) });
        let shifted = if shift_within_byte > 0 {
            emit_assign(f, IrType::I8, Value::Binop { op: BinOp::LShr, ty: IrType::I8, lhs: Box::new(masked), rhs: Box::new(Value::int(IrType::I8, shift_within_byte as i128)) })
        } else {
            masked
        };
        let widened = emit_assign(f, result_ty.clone(), Value::Convert { kind: crate::ir::value::ConvertKind::Zext, src_ty: IrType::I8, val: Box::new(shifted), dst_ty: result_ty.clone() });
        let placed = if shift_within_value > 0 {
            emit_assign(f, result_ty.clone(), Value::Binop { op: BinOp::Shl, ty: result_ty.clone(), lhs: Box::new(widened), rhs: Box::new(Value::int(result_ty.clone(), shift_within_value as i128)) })
        } else {
            widened
        };
        result = emit_assign(f, result_ty.clone(), Value::Binop { op: BinOp::Or, ty: result_ty.clone(), lhs: Box::new(result), rhs: Box::new(placed) });
    }
    result
}

/// Writes `value` (already the member's lowered integer type) into a
/// bitfield member (spec.md §4.2 "writes do `load, mask, or, store`").
pub fn store_bitfield(f: &mut Function, struct_ptr: &Value, loc: &BitfieldLoc, value: Value, value_ty: IrType) {
    for (byte_index, bits_in_byte, shift_within_byte, shift_within_value) in overlapping_bytes(loc) {
        let ptr = byte_ptr(f, struct_ptr, loc.run_bytes, loc.struct_field_index, byte_index);
        let old_byte = emit_assign(f, IrType::I8, Value::Load { ty: IrType::I8, ptr: Box::new(ptr.clone()) });
        let mask_in_byte = ((1u32 << bits_in_byte) - 1) << shift_within_byte;
        let cleared_mask = ((!mask_in_byte) as i128) & 0xFF;
        let cleared = emit_assign(f, IrType::I8, Value::Binop { op: BinOp::And, ty: IrType::I8, lhs: Box::new(old_byte), rhs: Box::new(Value::int(IrType::I8, cleared_mask)) });
        let shifted_val = if shift_within_value > 0 {
            emit_assign(f, value_ty.clone(), Value::Binop { op: BinOp::LShr, ty: value_ty.clone(), lhs: Box::new(value.clone()), rhs: Box::new(Value::int(value_ty.clone(), shift_within_value as i128)) })
        } else {
            value.clone()
        };
        let narrowed = emit_assign(f, IrType::I8, Value::Convert { kind: crate::ir::value::ConvertKind::Trunc, src_ty: value_ty.clone(), val: Box::new(shifted_val), dst_ty: IrType::I8 });
        let bits_mask = ((1u32 << bits_in_byte) - 1) as i128;
        let value_masked = emit_assign(f, IrType::I8, Value::Binop { op: BinOp::And, ty: IrType::I8, lhs: Box::new(narrowed), rhs: Box::new(Value::int(IrType::I8, bits_mask)) });
        let contribution = if shift_within_byte > 0 {
            emit_assign(f, IrType::I8, Value::Binop { op: BinOp::Shl, ty: IrType::I8, lhs: Box::new(value_masked), rhs: Box::new(Value::int(IrType::I8, shift_within_byte as i128)) })
        } else {
            value_masked
        };
        let new_byte = emit_assign(f, IrType::I8, Value::Binop { op: BinOp::Or, ty: IrType::I8, lhs: Box::new(cleared), rhs: Box::new(contribution) });
        f.emit(Stmt::Store { ty: IrType::I8, val: new_byte, ptr });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::CType;

    fn members() -> Vec<Member> {
        vec![
            Member { name: Rc::from("a"), ty: Rc::new(CType::Int { unsigned: true }), bit_width: Some(3) },
            Member { name: Rc::from("b"), ty: Rc::new(CType::Int { unsigned: true }), bit_width: Some(5) },
        ]
    }

    #[test]
    fn locates_second_bitfield_with_offset_three() {
        let loc = locate(&members(), "b").unwrap();
        assert_eq!(loc.bit_offset, 3);
        assert_eq!(loc.bit_width, 5);
        assert_eq!(loc.run_bytes, 1);
        assert_eq!(loc.struct_field_index, 0);
    }

    #[test]
    fn store_then_load_round_trips_through_emitted_ir() {
        let mut f = Function::new("f", IrType::Void, vec![]);
        let ptr = Value::var("s", IrType::ptr_to(IrType::IdStruct(crate::ir::types::StructId(0))), true);
        let loc = locate(&members(), "b").unwrap();
        store_bitfield(&mut f, &ptr, &loc, Value::int(IrType::I32, 17), IrType::I32);
        assert!(f.body.iter().any(|s| matches!(s, Stmt::Store { .. })));
        let _ = load_bitfield(&mut f, &ptr, &loc, IrType::I32);
        assert!(f.body.len() > 2);
    }
}
