//! Struct/union layout: size, alignment, member offsets (spec.md §4.2
//! "`sizeof`/`_Alignof`/`offsetof` fold to integer constants using the
//! AST's type layout functions").
//!
//! Grounded on `original_source/src/trans/trans_type.c`'s `ast_type_size`/
//! `ast_type_align`. The x86-64 SysV layout rules (natural alignment,
//! struct size rounded up to its alignment, union size = max member size)
//! are implemented directly rather than deferred to LLVM, since the
//! translator needs concrete offsets to build `getelementptr` index paths
//! and memcpy sizes before any IR is emitted.

use crate::ast::types::{CType, StructOrUnion};

pub fn size_of(ty: &CType) -> u64 {
    match ty.unwrap_typedef() {
        CType::Void => 0,
        CType::Bool | CType::Char { .. } => 1,
        CType::Short { .. } => 2,
        CType::Int { .. } | CType::Float | CType::Enum { .. } => 4,
        CType::Long { .. } | CType::LongLong { .. } | CType::Double => 8,
        CType::LongDouble => 16,
        CType::Ptr(_) | CType::VaList => 8,
        CType::Array { elem, len } => size_of(elem) * len.unwrap_or(0),
        CType::Record { kind, members, .. } => match members {
            Some(m) => record_size(*kind, m),
            None => 0,
        },
        CType::Func { .. } => 0,
        CType::Typedef { underlying, .. } => size_of(underlying),
    }
}

pub fn align_of(ty: &CType) -> u64 {
    match ty.unwrap_typedef() {
        CType::Void => 1,
        CType::Bool | CType::Char { .. } => 1,
        CType::Short { .. } => 2,
        CType::Int { .. } | CType::Float | CType::Enum { .. } => 4,
        CType::Long { .. } | CType::LongLong { .. } | CType::Double | CType::Ptr(_) | CType::VaList => 8,
        CType::LongDouble => 16,
        CType::Array { elem, .. } => align_of(elem),
        CType::Record { members, .. } => match members {
            Some(m) => m.iter().map(|f| align_of(&f.ty)).max().unwrap_or(1),
            None => 1,
        },
        CType::Func { .. } => 1,
        CType::Typedef { underlying, .. } => align_of(underlying),
    }
}

fn round_up(n: u64, align: u64) -> u64 {
    if align == 0 {
        return n;
    }
    (n + align - 1) / align * align
}

fn record_size(kind: StructOrUnion, members: &[crate::ast::types::Member]) -> u64 {
    match kind {
        StructOrUnion::Union => {
            let size = members.iter().filter(|m| m.bit_width.is_none()).map(|m| size_of(&m.ty)).max().unwrap_or(0);
            let bitfield_bytes = bitfield_run_bytes(members).into_iter().sum::<u64>();
            let align = members.iter().map(|m| align_of(&m.ty)).max().unwrap_or(1);
            round_up(size.max(bitfield_bytes), align)
        }
        StructOrUnion::Struct => {
            let mut offset = 0u64;
            let mut max_align = 1u64;
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
                    let run_bits: u32 = members[run_start..i].iter().filter_map(|m| m.bit_width).sum();
                    let run_bytes = ((run_bits + 7) / 8).max(1) as u64;
                    offset += run_bytes;
                    max_align = max_align.max(1);
                    continue;
                }
                let a = align_of(&members[i].ty);
                offset = round_up(offset, a);
                offset += size_of(&members[i].ty);
                max_align = max_align.max(a);
                i += 1;
            }
            round_up(offset, max_align)
        }
    }
}

/// Byte length of each contiguous bitfield run, in member order — used
/// both by layout and by the translator's bitfield lowering (spec.md
/// §4.2 "target struct has a trailing per-run `[N x i8]` field").
pub fn bitfield_run_bytes(members: &[crate::ast::types::Member]) -> Vec<u64> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < members.len() {
        if members[i].bit_width.is_none() {
            i += 1;
            continue;
        }
        let start = i;
        while i < members.len() && members[i].bit_width.is_some() && members[i].bit_width != Some(0) {
            i += 1;
        }
        if i < members.len() && members[i].bit_width == Some(0) {
            i += 1;
        }
        let bits: u32 = members[start..i].iter().filter_map(|m| m.bit_width).sum();
        runs.push((((bits + 7) / 8).max(1)) as u64);
    }
    runs
}

/// Byte offset of `field` within `ty`, for `offsetof` and for member-GEP
/// translation of non-bitfield members.
pub fn offset_of(ty: &CType, field: &str) -> Option<u64> {
    match ty.unwrap_typedef() {
        CType::Record { kind: StructOrUnion::Union, members: Some(m), .. } => {
            m.iter().find(|mem| &*mem.name == field).map(|_| 0)
        }
        CType::Record { kind: StructOrUnion::Struct, members: Some(m), .. } => {
            let mut offset = 0u64;
            let mut i = 0;
            while i < m.len() {
                if m[i].bit_width.is_some() {
                    let run_start = i;
                    while i < m.len() && m[i].bit_width.is_some() && m[i].bit_width != Some(0) {
                        i += 1;
                    }
                    if i < m.len() && m[i].bit_width == Some(0) {
                        i += 1;
                    }
                    if m[run_start..i].iter().any(|mem| &*mem.name == field) {
                        return Some(offset);
                    }
                    let run_bits: u32 = m[run_start..i].iter().filter_map(|mem| mem.bit_width).sum();
                    offset += ((run_bits + 7) / 8).max(1) as u64;
                    continue;
                }
                let a = align_of(&m[i].ty);
                offset = round_up(offset, a);
                if &*m[i].name == field {
                    return Some(offset);
                }
                offset += size_of(&m[i].ty);
                i += 1;
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::Member;
    use std::rc::Rc;

    #[test]
    fn bitfield_struct_packs_into_one_byte() {
        let members = vec![
            Member { name: Rc::from("a"), ty: Rc::new(CType::Int { unsigned: true }), bit_width: Some(3) },
            Member { name: Rc::from("b"), ty: Rc::new(CType::Int { unsigned: true }), bit_width: Some(5) },
        ];
        let ty = CType::Record { kind: StructOrUnion::Struct, tag: Some(Rc::from("S")), members: Some(Rc::new(members)) };
        assert_eq!(size_of(&ty), 1);
    }

    #[test]
    fn struct_with_trailing_padding_rounds_to_alignment() {
        let members = vec![
            Member { name: Rc::from("a"), ty: Rc::new(CType::Char { unsigned: false }), bit_width: None },
            Member { name: Rc::from("b"), ty: Rc::new(CType::Int { unsigned: false }), bit_width: None },
        ];
        let ty = CType::Record { kind: StructOrUnion::Struct, tag: None, members: Some(Rc::new(members)) };
        assert_eq!(size_of(&ty), 8);
        assert_eq!(offset_of(&ty, "b"), Some(4));
    }

    #[test]
    fn union_size_is_largest_member() {
        let members = vec![
            Member { name: Rc::from("i"), ty: Rc::new(CType::Int { unsigned: false }), bit_width: None },
            Member { name: Rc::from("d"), ty: Rc::new(CType::Double), bit_width: None },
        ];
        let ty = CType::Record { kind: StructOrUnion::Union, tag: None, members: Some(Rc::new(members)) };
        assert_eq!(size_of(&ty), 8);
        assert_eq!(offset_of(&ty, "i"), Some(0));
        assert_eq!(offset_of(&ty, "d"), Some(0));
    }
}
