//! Initializer canonicalisation (spec.md §4.2 "Initializer
//! canonicalisation", §8 "Initializer canonical form").
//!
//! Grounded on `original_source/src/typecheck/typecheck_init.c`. Given a
//! flat list of initializer elements (the parser already flattened
//! designators into a plain element stream — see `ast::parser`'s
//! `parse_braced_init` doc comment) and the target aggregate's member/
//! element count, produces a positional vector of exactly that length,
//! with `None` meaning zero-initialised.

use crate::ast::expr::Expr;
use crate::ast::types::CType;
use crate::diagnostics::Diagnostics;
use crate::mark::SourceMark;

/// Canonicalises `elems` (already-flattened, designator-free initializer
/// elements) against `target`'s member/element count.
///
/// - Fewer elements than the target's count: missing positions are
///   zero-filled (spec.md §4.2 "missing elements zero-fill").
/// - More elements than the target's count: a warning, excess elements
///   are dropped (spec.md §4.2 "Excess elements at the outermost list are
///   a warning").
pub fn canonicalize(target: &CType, elems: Vec<Option<Expr>>, mark: &SourceMark, diags: &mut Diagnostics) -> Vec<Option<Expr>> {
    let count = member_count(target);
    let mut out: Vec<Option<Expr>> = elems;
    if out.len() > count {
        diags.warn(Some(mark.clone()), format!("excess elements in initializer ({} given, {} expected)", out.len(), count));
        out.truncate(count);
    }
    while out.len() < count {
        out.push(None);
    }
    out
}

fn member_count(ty: &CType) -> usize {
    match ty.unwrap_typedef() {
        CType::Record { members: Some(m), .. } => m.len(),
        CType::Array { len: Some(n), .. } => *n as usize,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::{Expr, ExprKind, Literal};
    use crate::ast::types::{CType, Member};
    use std::rc::Rc;

    fn int_lit(v: i128) -> Expr {
        Expr::new(ExprKind::Literal(Literal::Int { value: v, ty: CType::Int { unsigned: false } }), SourceMark::synthetic())
    }

    #[test]
    fn missing_elements_zero_fill() {
        let members = vec![
            Member { name: Rc::from("a"), ty: Rc::new(CType::Int { unsigned: false }), bit_width: None },
            Member { name: Rc::from("b"), ty: Rc::new(CType::Int { unsigned: false }), bit_width: None },
            Member { name: Rc::from("c"), ty: Rc::new(CType::Int { unsigned: false }), bit_width: None },
        ];
        let ty = CType::Record { kind: crate::ast::types::StructOrUnion::Struct, tag: None, members: Some(Rc::new(members)) };
        let mut diags = Diagnostics::new(false);
        let out = canonicalize(&ty, vec![Some(int_lit(1))], &SourceMark::synthetic(), &mut diags);
        assert_eq!(out.len(), 3);
        assert!(out[1].is_none());
        assert!(out[2].is_none());
        assert!(!diags.has_errors());
    }

    #[test]
    fn excess_elements_warn_and_truncate() {
        let ty = CType::Array { elem: Rc::new(CType::Int { unsigned: false }), len: Some(2) };
        let mut diags = Diagnostics::new(false);
        let out = canonicalize(&ty, vec![Some(int_lit(1)), Some(int_lit(2)), Some(int_lit(3))], &SourceMark::synthetic(), &mut diags);
        assert_eq!(out.len(), 2);
        assert_eq!(diags.entries().len(), 1);
    }
}
