//! AST statement tree (spec.md §3 "AST", §4.2 "Statement translation").
//!
//! Grounded on `original_source/src/parser/ast.h`'s `stmt_t`, extended with
//! `switch`'s case/default list the way `trans.c`'s `trans_stmt` walks it
//! (spec.md §4.2 "For `switch`: the translator first walks the cases...").

use super::decl::Decl;
use super::expr::Expr;
use crate::mark::SourceMark;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// Case constants are folded by the typechecker's constant-expression
    /// evaluator before the translator ever sees them (spec.md §4.2).
    pub value: i128,
    pub body: Stmt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Compound(Vec<Stmt>),
    Expr(Expr),
    Decl(Vec<Decl>),
    If { cond: Expr, then: Box<Stmt>, else_: Option<Box<Stmt>> },
    Switch { expr: Expr, cases: Vec<SwitchCase>, default: Option<Box<Stmt>> },
    While { cond: Expr, body: Box<Stmt> },
    DoWhile { body: Box<Stmt>, cond: Expr },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Goto(Rc<str>),
    Labeled { label: Rc<str>, stmt: Box<Stmt> },
    Return(Option<Expr>),
    Break,
    Continue,
    /// Empty statement (`;`).
    Nop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub mark: SourceMark,
}

impl Stmt {
    pub fn new(kind: StmtKind, mark: SourceMark) -> Self {
        Stmt { kind, mark }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::SourceMark;

    #[test]
    fn labeled_goto_targets_match_by_name() {
        let m = SourceMark::synthetic();
        let label: Rc<str> = Rc::from("done");
        let labeled = Stmt::new(StmtKind::Labeled { label: label.clone(), stmt: Box::new(Stmt::new(StmtKind::Nop, m.clone())) }, m.clone());
        let goto = Stmt::new(StmtKind::Goto(label.clone()), m);
        match (&labeled.kind, &goto.kind) {
            (StmtKind::Labeled { label: l, .. }, StmtKind::Goto(g)) => assert_eq!(l, g),
            _ => unreachable!(),
        }
    }
}
