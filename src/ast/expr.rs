//! AST expression tree (spec.md §3 "AST", §4.2 "Expression translation").
//!
//! Grounded on `original_source/src/parser/ast.h`'s `expr_t`/`oper_t`,
//! widened to the full C11 operator set spec.md §4.2 names (compound
//! assignment, comparisons, short-circuit logic, ternary, cast, calls,
//! member/array access, compound literals, `sizeof`/`_Alignof`/`offsetof`,
//! `va_*` builtins) the source's older `oper_t` enum doesn't enumerate on
//! its own but `trans_expr.c` clearly translates.

use super::types::CType;
use crate::mark::SourceMark;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    LogAnd,
    LogOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Plus,
    BitNot,
    LogNot,
    AddrOf,
    Deref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int { value: i128, ty: CType },
    Float { value: f64, ty: CType },
    Str(Rc<str>),
    Char(i128),
}

/// Designator-free initializer element produced by the typechecker's
/// canonicalisation pass (spec.md §4.2 "Initializer canonicalisation");
/// `None` means zero-initialised.
pub type CanonicalInit = Vec<Option<Expr>>;

/// One AST expression node. `etype` is populated by the (external)
/// typechecker before translation ever runs — every variant below is
/// wrapped by [`Expr`], which carries the slot uniformly rather than
/// duplicating it per-variant, mirroring `original_source/src/parser/ast.h`'s
/// single `expr_t` wrapper around a `union`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Ident(Rc<str>),
    Literal(Literal),
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Unary { op: UnOp, operand: Box<Expr> },
    IncDec { op: IncDecOp, operand: Box<Expr> },
    Assign { lhs: Box<Expr>, rhs: Box<Expr> },
    /// `lhs op= rhs`; `op` is the underlying arithmetic/bitwise op.
    CompoundAssign { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Ternary { cond: Box<Expr>, then: Box<Expr>, else_: Box<Expr> },
    Cast { ty: Rc<CType>, operand: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Member { base: Box<Expr>, field: Rc<str>, arrow: bool },
    Index { base: Box<Expr>, index: Box<Expr> },
    SizeofExpr(Box<Expr>),
    SizeofType(Rc<CType>),
    AlignofType(Rc<CType>),
    Offsetof { ty: Rc<CType>, field: Rc<str> },
    /// Brace-enclosed compound literal `(T){ ... }`, already canonicalised
    /// by the typechecker into positional form.
    CompoundLiteral { ty: Rc<CType>, init: CanonicalInit },
    VaStart { ap: Box<Expr>, last_named: Rc<str> },
    VaEnd(Box<Expr>),
    VaCopy { dst: Box<Expr>, src: Box<Expr> },
    VaArg { ap: Box<Expr>, ty: Rc<CType> },
    /// Parenthesised comma expression; only the last value is live.
    Comma(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub mark: SourceMark,
    /// Populated by the typechecker before translation; `None` only
    /// transiently while the parser builds the tree.
    pub etype: RefCell<Option<Rc<CType>>>,
}

impl Expr {
    pub fn new(kind: ExprKind, mark: SourceMark) -> Self {
        Expr { kind, mark, etype: RefCell::new(None) }
    }

    pub fn etype(&self) -> Rc<CType> {
        self.etype
            .borrow()
            .clone()
            .expect("etype read before typechecking (translator precondition, spec.md §7 category 4)")
    }

    pub fn set_etype(&self, ty: Rc<CType>) {
        *self.etype.borrow_mut() = Some(ty);
    }

    /// True for expressions that denote a storage location the `addrof`
    /// expression-translation flag (spec.md §4.2) can take the address
    /// of: identifiers, member/array access, and dereferences.
    pub fn is_lvalue(&self) -> bool {
        matches!(self.kind, ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. } | ExprKind::Unary { op: UnOp::Deref, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::SourceMark;

    #[test]
    fn member_and_index_are_lvalues_binary_is_not() {
        let m = SourceMark::synthetic();
        let ident = Expr::new(ExprKind::Ident(Rc::from("x")), m.clone());
        assert!(ident.is_lvalue());
        let bin = Expr::new(
            ExprKind::Binary { op: BinOp::Add, lhs: Box::new(Expr::new(ExprKind::Ident(Rc::from("a")), m.clone())), rhs: Box::new(Expr::new(ExprKind::Ident(Rc::from("b")), m.clone())) },
            m,
        );
        assert!(!bin.is_lvalue());
    }

    #[test]
    fn etype_round_trips() {
        let e = Expr::new(ExprKind::Ident(Rc::from("x")), SourceMark::synthetic());
        e.set_etype(Rc::new(CType::Int { unsigned: false }));
        assert_eq!(*e.etype(), CType::Int { unsigned: false });
    }
}
