//! Statement translation (spec.md §4.2 "Statement translation").
//!
//! Grounded on `trans_stmt` in `original_source/src/trans/trans.c:307`. Each statement
//! returns whether it always transfers control away (`return`, `goto`,
//! `break`, `continue`, or a compound/if/loop whose every path does) so
//! the caller can skip emitting a redundant fallthrough branch and the
//! function-body wrapper can skip the implicit `ret` it would otherwise
//! append.

use super::decl::translate_local_var;
use super::expr::{to_i1, translate_expr};
use super::state::TransState;
use super::Translator;
use crate::ast::decl::Decl;
use crate::ast::stmt::{Stmt as AstStmt, StmtKind, SwitchCase};
use crate::ir::function::Function;
use crate::ir::stmt::{Label, Stmt};
use crate::ir::types::IrType;
use crate::ir::value::Value;

pub fn translate_stmt(tr: &mut Translator, f: &mut Function, stmt: &AstStmt, state: &mut TransState) -> bool {
    let dead = state.ignore_until_label;
    match &stmt.kind {
        StmtKind::Compound(stmts) => translate_compound(tr, f, stmts, state),
        StmtKind::Expr(e) => {
            if !dead {
                translate_expr(tr, f, e, false);
            }
            false
        }
        StmtKind::Decl(decls) => {
            translate_local_decls(tr, f, decls, dead);
            false
        }
        StmtKind::If { cond, then, else_ } => {
            if dead {
                translate_stmt(tr, f, then, state);
                if let Some(e) = else_ {
                    translate_stmt(tr, f, e, state);
                }
                true
            } else {
                translate_if(tr, f, cond, then, else_.as_deref(), state)
            }
        }
        StmtKind::Switch { expr, cases, default } => {
            if dead {
                for c in cases {
                    translate_stmt(tr, f, &c.body, state);
                }
                if let Some(d) = default {
                    translate_stmt(tr, f, d, state);
                }
                true
            } else {
                translate_switch(tr, f, expr, cases, default.as_deref(), state)
            }
        }
        StmtKind::While { cond, body } => {
            if dead {
                translate_stmt(tr, f, body, state);
                true
            } else {
                translate_while(tr, f, cond, body, state)
            }
        }
        StmtKind::DoWhile { body, cond } => {
            if dead {
                translate_stmt(tr, f, body, state);
                true
            } else {
                translate_do_while(tr, f, body, cond, state)
            }
        }
        StmtKind::For { init, cond, step, body } => {
            if dead {
                translate_stmt(tr, f, body, state);
                true
            } else {
                translate_for(tr, f, init.as_deref(), cond.as_ref(), step.as_ref(), body, state)
            }
        }
        StmtKind::Goto(label) => {
            if !dead {
                let l = tr.unit.intern_label(label);
                f.emit(Stmt::Br { cond: None, targets: vec![l] });
            }
            true
        }
        StmtKind::Labeled { label, stmt: inner } => {
            // A label is always reachable via `goto` regardless of the
            // surrounding code's reachability, so it always clears
            // suppression — this is the only place that does.
            let l = tr.unit.intern_label(label);
            if !f.body_ends_in_terminator() {
                f.emit(Stmt::Br { cond: None, targets: vec![l.clone()] });
            }
            f.emit(Stmt::Label(l));
            state.ignore_until_label = false;
            translate_stmt(tr, f, inner, state)
        }
        StmtKind::Return(val) => {
            if !dead {
                translate_return(tr, f, val.as_ref());
            }
            true
        }
        StmtKind::Break => {
            if dead {
                true
            } else {
                match state.break_target.clone() {
                    Some(l) => {
                        f.emit(Stmt::Br { cond: None, targets: vec![l] });
                        true
                    }
                    None => {
                        tr.diags.error(Some(stmt.mark.clone()), "break statement not within a loop or switch");
                        false
                    }
                }
            }
        }
        StmtKind::Continue => {
            if dead {
                true
            } else {
                match state.continue_target.clone() {
                    Some(l) => {
                        f.emit(Stmt::Br { cond: None, targets: vec![l] });
                        true
                    }
                    None => {
                        tr.diags.error(Some(stmt.mark.clone()), "continue statement not within a loop");
                        false
                    }
                }
            }
        }
        StmtKind::Nop => false,
    }
}

/// Walks a compound's statements left to right, tracking whether control
/// has unconditionally left the block so far. Once it has,
/// `state.ignore_until_label` is set so every statement translated after
/// it — no matter how deeply nested — suppresses its own IR emission
/// until a `Labeled` statement clears the flag again (spec.md §9, §8
/// "Block shape").
fn translate_compound(tr: &mut Translator, f: &mut Function, stmts: &[AstStmt], state: &mut TransState) -> bool {
    f.locals.push_scope();
    let mut terminated = false;
    for s in stmts {
        let t = translate_stmt(tr, f, s, state);
        if !state.ignore_until_label {
            terminated = t;
            if terminated {
                state.ignore_until_label = true;
            }
        }
    }
    f.locals.pop_scope();
    terminated
}

fn translate_local_decls(tr: &mut Translator, f: &mut Function, decls: &[Decl], dead: bool) {
    for d in decls {
        match d {
            Decl::Var(v) => translate_local_var(tr, f, v, dead),
            Decl::Tag(ty) => {
                tr.lower_type(ty);
            }
            Decl::Typedef { underlying, .. } => {
                tr.lower_type(underlying);
            }
            Decl::Func(func) => super::decl::pre_register_func(tr, func),
        }
    }
}

fn translate_return(tr: &mut Translator, f: &mut Function, val: Option<&crate::ast::expr::Expr>) {
    let ret_ty = match &f.func_ty {
        IrType::Func { ret, .. } => (**ret).clone(),
        other => other.clone(),
    };
    match val {
        None => f.emit(Stmt::Ret { ty: ret_ty, val: None }),
        Some(e) => {
            let v = translate_expr(tr, f, e, false);
            f.emit(Stmt::Ret { ty: ret_ty, val: Some(v) });
        }
    }
}

fn translate_if(
    tr: &mut Translator,
    f: &mut Function,
    cond: &crate::ast::expr::Expr,
    then: &AstStmt,
    else_: Option<&AstStmt>,
    state: &mut TransState,
) -> bool {
    let then_label = f.fresh_label("if.then");
    let end_label = f.fresh_label("if.end");
    let else_label = if else_.is_some() { f.fresh_label("if.else") } else { end_label.clone() };

    let cond_cty = cond.etype();
    let c = translate_expr(tr, f, cond, false);
    let c = to_i1(tr, f, c, &cond_cty);
    f.emit(Stmt::Br { cond: Some(c), targets: vec![then_label.clone(), else_label.clone()] });

    f.emit(Stmt::Label(then_label));
    let then_terminates = translate_stmt(tr, f, then, state);
    if !then_terminates {
        f.emit(Stmt::Br { cond: None, targets: vec![end_label.clone()] });
    }
    // `then` and `else` are independent branches, not a sequential
    // continuation: dead code trailing inside `then` (with no label to
    // clear it) must not make `else` look unreachable too.
    state.ignore_until_label = false;

    let else_terminates = match else_ {
        Some(else_stmt) => {
            f.emit(Stmt::Label(else_label));
            let terminates = translate_stmt(tr, f, else_stmt, state);
            if !terminates {
                f.emit(Stmt::Br { cond: None, targets: vec![end_label.clone()] });
            }
            terminates
        }
        None => false,
    };
    state.ignore_until_label = false;

    f.emit(Stmt::Label(end_label));
    then_terminates && else_terminates
}

/// `case N:` immediately followed by another `case`/`default` parses to
/// an empty `Compound` (see `ast::parser::parse_case_body`) — the
/// "stacked labels" form of fallthrough, as opposed to a case whose body
/// just doesn't `break`.
fn is_empty_case_body(body: &AstStmt) -> bool {
    matches!(&body.kind, StmtKind::Compound(stmts) if stmts.is_empty())
}

/// The translator walks every `case`/`default` first (in source order)
/// to assign labels, then emits the `switch` dispatch referencing them,
/// then emits each non-empty case's body — matching `trans_stmt`'s
/// two-pass case handling in `original_source/src/trans/trans.c:307`.
/// An empty case shares the label of whatever follows it rather than
/// getting its own empty block, so `case 1: case 2: body` puts both
/// constants on the one block `body` translates to (spec.md §8 scenario
/// 5: "both case labels target the same block").
fn translate_switch(
    tr: &mut Translator,
    f: &mut Function,
    expr: &crate::ast::expr::Expr,
    cases: &[SwitchCase],
    default: Option<&AstStmt>,
    state: &mut TransState,
) -> bool {
    tracing::trace!(cases = cases.len(), has_default = default.is_some(), "translating switch");
    let end_label = f.fresh_label("switch.end");
    let default_label = if default.is_some() { f.fresh_label("switch.default") } else { end_label.clone() };

    let mut case_labels: Vec<Label> = vec![end_label.clone(); cases.len()];
    let mut next_label = default_label.clone();
    for i in (0..cases.len()).rev() {
        if is_empty_case_body(&cases[i].body) {
            case_labels[i] = next_label.clone();
        } else {
            let l = f.fresh_label("switch.case");
            case_labels[i] = l.clone();
            next_label = l;
        }
    }
    // Where a non-empty case's body falls to if it doesn't terminate on
    // its own (a real C fallthrough — no `break`, but more statements
    // follow): the textually next case's block, or `default`/`end` past
    // the last case.
    let fall_targets: Vec<Label> =
        (0..cases.len()).map(|i| if i + 1 < cases.len() { case_labels[i + 1].clone() } else { default_label.clone() }).collect();

    let v = translate_expr(tr, f, expr, false);
    let switch_cases: Vec<(Value, Label)> = cases
        .iter()
        .zip(case_labels.iter())
        .map(|(c, l)| (Value::int(v.ty(), c.value), l.clone()))
        .collect();
    f.emit(Stmt::Switch { expr: v, default: default_label.clone(), cases: switch_cases });

    let mut inner_state = state.with_break(end_label.clone());
    let mut all_terminate = default.is_some();
    for (i, case) in cases.iter().enumerate() {
        if is_empty_case_body(&case.body) {
            continue;
        }
        f.emit(Stmt::Label(case_labels[i].clone()));
        let terminates = translate_stmt(tr, f, &case.body, &mut inner_state);
        if !terminates {
            f.emit(Stmt::Br { cond: None, targets: vec![fall_targets[i].clone()] });
            all_terminate = false;
        }
        // Each case is its own entry point via the jump table, not a
        // continuation of the previous one's reachability.
        inner_state.ignore_until_label = false;
    }
    if let Some(def) = default {
        f.emit(Stmt::Label(default_label));
        let terminates = translate_stmt(tr, f, def, &mut inner_state);
        if !terminates {
            f.emit(Stmt::Br { cond: None, targets: vec![end_label.clone()] });
            all_terminate = false;
        }
        inner_state.ignore_until_label = false;
    }
    if !f.body_ends_in_terminator() {
        f.emit(Stmt::Br { cond: None, targets: vec![end_label.clone()] });
    }
    f.emit(Stmt::Label(end_label));
    all_terminate
}

fn translate_while(
    tr: &mut Translator,
    f: &mut Function,
    cond: &crate::ast::expr::Expr,
    body: &AstStmt,
    state: &mut TransState,
) -> bool {
    let cond_label = f.fresh_label("while.cond");
    let body_label = f.fresh_label("while.body");
    let end_label = f.fresh_label("while.end");

    f.emit(Stmt::Br { cond: None, targets: vec![cond_label.clone()] });
    f.emit(Stmt::Label(cond_label.clone()));
    let cond_cty = cond.etype();
    let c = translate_expr(tr, f, cond, false);
    let c = to_i1(tr, f, c, &cond_cty);
    f.emit(Stmt::Br { cond: Some(c), targets: vec![body_label.clone(), end_label.clone()] });

    f.emit(Stmt::Label(body_label));
    let mut inner_state = state.with_loop(end_label.clone(), cond_label.clone());
    let terminates = translate_stmt(tr, f, body, &mut inner_state);
    if !terminates {
        f.emit(Stmt::Br { cond: None, targets: vec![cond_label] });
    }

    f.emit(Stmt::Label(end_label));
    false
}

fn translate_do_while(
    tr: &mut Translator,
    f: &mut Function,
    body: &AstStmt,
    cond: &crate::ast::expr::Expr,
    state: &mut TransState,
) -> bool {
    let body_label = f.fresh_label("do.body");
    let cond_label = f.fresh_label("do.cond");
    let end_label = f.fresh_label("do.end");

    f.emit(Stmt::Br { cond: None, targets: vec![body_label.clone()] });
    f.emit(Stmt::Label(body_label));
    let mut inner_state = state.with_loop(end_label.clone(), cond_label.clone());
    let terminates = translate_stmt(tr, f, body, &mut inner_state);
    if !terminates {
        f.emit(Stmt::Br { cond: None, targets: vec![cond_label.clone()] });
    }

    f.emit(Stmt::Label(cond_label));
    let cond_cty = cond.etype();
    let c = translate_expr(tr, f, cond, false);
    let c = to_i1(tr, f, c, &cond_cty);
    f.emit(Stmt::Br { cond: Some(c), targets: vec![body_label, end_label.clone()] });

    f.emit(Stmt::Label(end_label));
    false
}

fn translate_for(
    tr: &mut Translator,
    f: &mut Function,
    init: Option<&AstStmt>,
    cond: Option<&crate::ast::expr::Expr>,
    step: Option<&crate::ast::expr::Expr>,
    body: &AstStmt,
    state: &mut TransState,
) -> bool {
    f.locals.push_scope();
    if let Some(init) = init {
        translate_stmt(tr, f, init, state);
    }

    let cond_label = f.fresh_label("for.cond");
    let body_label = f.fresh_label("for.body");
    let step_label = f.fresh_label("for.step");
    let end_label = f.fresh_label("for.end");

    f.emit(Stmt::Br { cond: None, targets: vec![cond_label.clone()] });
    f.emit(Stmt::Label(cond_label.clone()));
    match cond {
        Some(cond) => {
            let cond_cty = cond.etype();
            let c = translate_expr(tr, f, cond, false);
            let c = to_i1(tr, f, c, &cond_cty);
            f.emit(Stmt::Br { cond: Some(c), targets: vec![body_label.clone(), end_label.clone()] });
        }
        None => f.emit(Stmt::Br { cond: None, targets: vec![body_label.clone()] }),
    }

    f.emit(Stmt::Label(body_label));
    let mut inner_state = state.with_loop(end_label.clone(), step_label.clone());
    let terminates = translate_stmt(tr, f, body, &mut inner_state);
    if !terminates {
        f.emit(Stmt::Br { cond: None, targets: vec![step_label.clone()] });
    }

    f.emit(Stmt::Label(step_label));
    if let Some(step) = step {
        translate_expr(tr, f, step, false);
    }
    f.emit(Stmt::Br { cond: None, targets: vec![cond_label] });

    f.emit(Stmt::Label(end_label));
    f.locals.pop_scope();
    false
}
