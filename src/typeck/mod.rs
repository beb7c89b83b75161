//! Typechecker (external per spec.md §1, but implemented here so the
//! pipeline runs end to end): annotates every expression with an
//! `etype`, resolves identifiers through nested scopes, and builds the
//! struct/union member tables the translator looks members up in.
//!
//! Grounded on `original_source/src/typecheck/typecheck.c`'s top-level
//! `typecheck_trans_unit` walking every `gdecl_t`, recursing into
//! statements and expressions.

pub mod init;
pub mod layout;

use crate::ast::decl::{Decl, Program};
use crate::ast::expr::{BinOp, Expr, ExprKind, IncDecOp, Literal, UnOp};
use crate::ast::stmt::{Stmt, StmtKind};
use crate::ast::types::{CType, StructOrUnion};
use crate::diagnostics::Diagnostics;
use std::collections::HashMap;
use std::rc::Rc;

/// One lexical scope's worth of identifier -> type bindings. Enum
/// constants and ordinary variables/functions share one namespace here,
/// matching C's single ordinary-identifier namespace.
#[derive(Default)]
struct Scope {
    vars: HashMap<Rc<str>, Rc<CType>>,
}

pub struct TypeChecker<'a> {
    scopes: Vec<Scope>,
    /// struct/union tag name -> full (possibly still-incomplete) type,
    /// populated as tags are declared so member lookups later in the file
    /// see a completed definition.
    tags: HashMap<Rc<str>, Rc<CType>>,
    diags: &'a mut Diagnostics,
    current_return_ty: Option<Rc<CType>>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(diags: &'a mut Diagnostics) -> Self {
        TypeChecker { scopes: vec![Scope::default()], tags: HashMap::new(), diags, current_return_ty: None }
    }

    fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: Rc<str>, ty: Rc<CType>) {
        self.scopes.last_mut().expect("at least one scope").vars.insert(name, ty);
    }

    fn lookup(&self, name: &str) -> Option<Rc<CType>> {
        self.scopes.iter().rev().find_map(|s| s.vars.get(name).cloned())
    }

    fn register_tag(&mut self, ty: &CType) {
        if let CType::Record { tag: Some(name), members: Some(_), .. } = ty {
            self.tags.insert(name.clone(), Rc::new(ty.clone()));
        }
        if let CType::Enum { tag: Some(name), constants } = ty {
            self.tags.insert(name.clone(), Rc::new(ty.clone()));
            for c in constants.iter() {
                self.bind(c.name.clone(), Rc::new(CType::Int { unsigned: false }));
            }
        }
    }

    /// Resolves a possibly-incomplete `Record`/`Enum` reference (a bare
    /// `struct S` used as a type after its tag was registered elsewhere)
    /// against the tag table, returning the completed type when known.
    fn resolve_tag(&self, ty: &CType) -> CType {
        match ty {
            CType::Record { kind, tag: Some(name), members: None } => {
                if let Some(full) = self.tags.get(name) {
                    (**full).clone()
                } else {
                    CType::Record { kind: *kind, tag: Some(name.clone()), members: None }
                }
            }
            other => other.clone(),
        }
    }

    pub fn check_program(&mut self, prog: &Program) {
        for d in &prog.decls {
            if let Decl::Func(f) = d {
                self.bind(f.name.clone(), Rc::new(CType::Func { ret: f.ret.clone(), params: f.params.clone(), variadic: f.variadic, unspecified: false }));
            }
        }
        for d in &prog.decls {
            self.check_decl(d);
        }
    }

    fn check_decl(&mut self, d: &Decl) {
        match d {
            Decl::Tag(ty) => self.register_tag(ty),
            Decl::Typedef { underlying, .. } => self.register_tag(underlying),
            Decl::Var(v) => {
                self.register_tag(&v.ty);
                self.bind(v.name.clone(), v.ty.clone());
                if let Some(init) = &v.init {
                    self.check_expr(init);
                }
            }
            Decl::Func(f) => {
                self.register_tag(&f.ret);
                if !self.lookup(&f.name).is_some() {
                    self.bind(f.name.clone(), Rc::new(CType::Func { ret: f.ret.clone(), params: f.params.clone(), variadic: f.variadic, unspecified: false }));
                }
                if let Some(body) = &f.body {
                    self.push_scope();
                    for p in f.params.iter() {
                        if let Some(name) = &p.name {
                            self.bind(name.clone(), p.ty.clone());
                        }
                    }
                    let prev_ret = self.current_return_ty.replace(f.ret.clone());
                    self.check_stmt(body);
                    self.current_return_ty = prev_ret;
                    self.pop_scope();
                }
            }
        }
    }

    fn check_stmt(&mut self, s: &Stmt) {
        match &s.kind {
            StmtKind::Compound(stmts) => {
                self.push_scope();
                for st in stmts {
                    self.check_stmt(st);
                }
                self.pop_scope();
            }
            StmtKind::Expr(e) => self.check_expr(e),
            StmtKind::Decl(decls) => {
                for d in decls {
                    self.check_decl(d);
                }
            }
            StmtKind::If { cond, then, else_ } => {
                self.check_expr(cond);
                self.check_stmt(then);
                if let Some(e) = else_ {
                    self.check_stmt(e);
                }
            }
            StmtKind::Switch { expr, cases, default } => {
                self.check_expr(expr);
                for c in cases {
                    self.check_stmt(&c.body);
                }
                if let Some(d) = default {
                    self.check_stmt(d);
                }
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                self.check_expr(cond);
                self.check_stmt(body);
            }
            StmtKind::For { init, cond, step, body } => {
                self.push_scope();
                if let Some(i) = init {
                    self.check_stmt(i);
                }
                if let Some(c) = cond {
                    self.check_expr(c);
                }
                if let Some(st) = step {
                    self.check_expr(st);
                }
                self.check_stmt(body);
                self.pop_scope();
            }
            StmtKind::Labeled { stmt, .. } => self.check_stmt(stmt),
            StmtKind::Return(Some(e)) => self.check_expr(e),
            StmtKind::Return(None) | StmtKind::Goto(_) | StmtKind::Break | StmtKind::Continue | StmtKind::Nop => {}
        }
    }

    fn check_expr(&mut self, e: &Expr) {
        let ty = self.infer_expr(e);
        e.set_etype(ty);
    }

    fn infer_expr(&mut self, e: &Expr) -> Rc<CType> {
        match &e.kind {
            ExprKind::Ident(name) => self.lookup(name).unwrap_or_else(|| {
                self.diags.error(Some(e.mark.clone()), format!("undeclared identifier `{}`", name));
                Rc::new(CType::Int { unsigned: false })
            }),
            ExprKind::Literal(Literal::Int { ty, .. }) => Rc::new(ty.clone()),
            ExprKind::Literal(Literal::Char(_)) => Rc::new(CType::Int { unsigned: false }),
            ExprKind::Literal(Literal::Float { ty, .. }) => Rc::new(ty.clone()),
            ExprKind::Literal(Literal::Str(_)) => Rc::new(CType::Ptr(Rc::new(CType::Char { unsigned: false }))),
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.infer_expr(lhs);
                lhs.set_etype(l.clone());
                let r = self.infer_expr(rhs);
                rhs.set_etype(r.clone());
                match op {
                    BinOp::LogAnd | BinOp::LogOr | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne => Rc::new(CType::Int { unsigned: false }),
                    BinOp::Add | BinOp::Sub if l.is_ptr() => l,
                    BinOp::Add if r.is_ptr() => r,
                    _ => Rc::new(type_max(&l, &r)),
                }
            }
            ExprKind::Unary { op, operand } => {
                let t = self.infer_expr(operand);
                operand.set_etype(t.clone());
                match op {
                    UnOp::AddrOf => Rc::new(CType::Ptr(t)),
                    UnOp::Deref => match self.resolve_tag(&t).clone() {
                        CType::Ptr(inner) | CType::Array { elem: inner, .. } => inner,
                        _ => t,
                    },
                    UnOp::LogNot => Rc::new(CType::Int { unsigned: false }),
                    _ => t,
                }
            }
            ExprKind::IncDec { op: _, operand } => {
                let t = self.infer_expr(operand);
                operand.set_etype(t.clone());
                t
            }
            ExprKind::Assign { lhs, rhs } => {
                let t = self.infer_expr(lhs);
                lhs.set_etype(t.clone());
                let rt = self.infer_expr(rhs);
                rhs.set_etype(rt);
                t
            }
            ExprKind::CompoundAssign { lhs, rhs, .. } => {
                let t = self.infer_expr(lhs);
                lhs.set_etype(t.clone());
                let rt = self.infer_expr(rhs);
                rhs.set_etype(rt);
                t
            }
            ExprKind::Ternary { cond, then, else_ } => {
                let c = self.infer_expr(cond);
                cond.set_etype(c);
                let t = self.infer_expr(then);
                then.set_etype(t.clone());
                let e2 = self.infer_expr(else_);
                else_.set_etype(e2.clone());
                if t.is_ptr() {
                    t
                } else {
                    Rc::new(type_max(&t, &e2))
                }
            }
            ExprKind::Cast { ty, operand } => {
                let t = self.infer_expr(operand);
                operand.set_etype(t);
                ty.clone()
            }
            ExprKind::Call { callee, args } => {
                let ct = self.infer_expr(callee);
                callee.set_etype(ct.clone());
                for a in args {
                    let at = self.infer_expr(a);
                    a.set_etype(at);
                }
                match self.resolve_tag(&ct) {
                    CType::Func { ret, .. } => ret,
                    CType::Ptr(inner) => match &*inner {
                        CType::Func { ret, .. } => ret.clone(),
                        _ => Rc::new(CType::Int { unsigned: false }),
                    },
                    _ => Rc::new(CType::Int { unsigned: false }),
                }
            }
            ExprKind::Member { base, field, arrow } => {
                let bt = self.infer_expr(base);
                base.set_etype(bt.clone());
                let record_ty = if *arrow {
                    match self.resolve_tag(&bt) {
                        CType::Ptr(inner) => self.resolve_tag(&inner),
                        other => other,
                    }
                } else {
                    self.resolve_tag(&bt)
                };
                match &record_ty {
                    CType::Record { members: Some(m), .. } => m.iter().find(|mem| &*mem.name == &**field).map(|mem| mem.ty.clone()).unwrap_or_else(|| {
                        self.diags.error(Some(e.mark.clone()), format!("no member named `{}`", field));
                        Rc::new(CType::Int { unsigned: false })
                    }),
                    _ => {
                        self.diags.error(Some(e.mark.clone()), format!("member access `{}` on non-aggregate type", field));
                        Rc::new(CType::Int { unsigned: false })
                    }
                }
            }
            ExprKind::Index { base, index } => {
                let bt = self.infer_expr(base);
                base.set_etype(bt.clone());
                let it = self.infer_expr(index);
                index.set_etype(it);
                match self.resolve_tag(&bt) {
                    CType::Ptr(inner) | CType::Array { elem: inner, .. } => inner,
                    _ => Rc::new(CType::Int { unsigned: false }),
                }
            }
            ExprKind::SizeofExpr(operand) => {
                let t = self.infer_expr(operand);
                operand.set_etype(t);
                Rc::new(CType::Long { unsigned: true })
            }
            ExprKind::SizeofType(_) | ExprKind::AlignofType(_) | ExprKind::Offsetof { .. } => Rc::new(CType::Long { unsigned: true }),
            ExprKind::CompoundLiteral { ty, init } => {
                for el in init.iter().flatten() {
                    self.check_expr(el);
                }
                // Runs purely for the excess/missing-element diagnostics;
                // the translator's `store_canonical_init` already bounds
                // its own walk to the target's member/element count.
                crate::typeck::init::canonicalize(ty.as_ref(), init.clone(), &e.mark, &mut *self.diags);
                ty.clone()
            }
            ExprKind::VaStart { ap, .. } | ExprKind::VaEnd(ap) => {
                let t = self.infer_expr(ap);
                ap.set_etype(t);
                Rc::new(CType::Void)
            }
            ExprKind::VaCopy { dst, src } => {
                let t = self.infer_expr(dst);
                dst.set_etype(t);
                let s = self.infer_expr(src);
                src.set_etype(s);
                Rc::new(CType::Void)
            }
            ExprKind::VaArg { ap, ty } => {
                let t = self.infer_expr(ap);
                ap.set_etype(t);
                ty.clone()
            }
            ExprKind::Comma(exprs) => {
                let mut last = Rc::new(CType::Void);
                for ex in exprs {
                    last = self.infer_expr(ex);
                    ex.set_etype(last.clone());
                }
                last
            }
        }
    }
}

/// The C11 §6.3.1.8 "usual arithmetic conversions", narrowed to the
/// subset this crate's arithmetic translation needs: pick the operand
/// with the higher [`CType::arithmetic_rank`], preferring unsigned on a
/// tie in rank with differing signedness.
pub fn type_max(a: &CType, b: &CType) -> CType {
    let (ra, rb) = (a.arithmetic_rank(), b.arithmetic_rank());
    if ra != rb {
        return if ra > rb { promote(a) } else { promote(b) };
    }
    if a.is_unsigned() {
        promote(a)
    } else {
        promote(b)
    }
}

/// Integer promotion (C11 §6.3.1.1): anything narrower than `int`
/// promotes to `int` before arithmetic.
fn promote(t: &CType) -> CType {
    match t.unwrap_typedef() {
        CType::Bool | CType::Char { .. } | CType::Short { .. } => CType::Int { unsigned: false },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parser::parse_program;
    use crate::lex::Lexer;

    fn check(src: &str) -> Diagnostics {
        let tokens = Lexer::new(src, Rc::from("t.c"), None).lex_all();
        let mut diags = Diagnostics::new(false);
        let prog = parse_program(&tokens, &mut diags);
        let mut tc = TypeChecker::new(&mut diags);
        tc.check_program(&prog);
        diags
    }

    #[test]
    fn hello_program_typechecks_clean() {
        let diags = check("int main(void){return 0;}");
        assert!(!diags.has_errors());
    }

    #[test]
    fn undeclared_identifier_is_an_error() {
        let diags = check("int main(void){return x;}");
        assert!(diags.has_errors());
    }

    #[test]
    fn char_and_int_promote_to_int() {
        assert_eq!(type_max(&CType::Char { unsigned: false }, &CType::Int { unsigned: false }), CType::Int { unsigned: false });
    }

    #[test]
    fn unsigned_wins_tie_in_rank() {
        assert_eq!(type_max(&CType::Int { unsigned: true }, &CType::Int { unsigned: false }), CType::Int { unsigned: true });
    }
}
