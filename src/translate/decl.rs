//! Global traversal and declaration translation (spec.md §4.2 "Global
//! traversal").
//!
//! Grounded on `original_source/src/trans/trans.c`'s two-pass
//! `trans_trans_unit`: pass one pre-registers every function (definition
//! or prototype) as a global so a call that textually precedes its
//! callee's definition still resolves; pass two emits function bodies
//! and non-extern globals.

use super::expr::translate_function_body;
use super::Translator;
use crate::ast::decl::{Decl, FuncDecl, VarDecl};
use crate::ast::expr::{Expr, ExprKind, Literal};
use crate::ir::function::Function;
use crate::ir::types::IrType;
use crate::ir::value::{Const, Value};
use std::rc::Rc;

pub fn pre_register_func(tr: &mut Translator, f: &FuncDecl) {
    let func_ty = tr.lower_type(&func_ctype(f));
    tr.unit.globals.insert(f.name.to_string(), Value::var(f.name.clone(), func_ty.clone(), false));
    if f.body.is_none() {
        tr.unit.declare_pending(f.name.clone(), func_ty, true);
    }
}

fn func_ctype(f: &FuncDecl) -> crate::ast::types::CType {
    crate::ast::types::CType::Func { ret: f.ret.clone(), params: f.params.clone(), variadic: f.variadic, unspecified: false }
}

pub fn translate_decl(tr: &mut Translator, d: &Decl) {
    match d {
        Decl::Tag(ty) => {
            register_enum_consts(tr, ty);
            tr.lower_type(ty);
        }
        Decl::Typedef { underlying, .. } => {
            tr.lower_type(underlying);
        }
        Decl::Var(v) => translate_global_var(tr, v),
        Decl::Func(f) => {
            if let Some(body) = &f.body {
                tracing::debug!(name = %f.name, "translating function");
                let func = translate_function_body(tr, f, body);
                tr.unit.funcs.push(func);
            }
        }
    }
}

fn register_enum_consts(tr: &mut Translator, ty: &crate::ast::types::CType) {
    if let crate::ast::types::CType::Enum { constants, .. } = ty {
        for c in constants.iter() {
            tr.enum_consts.insert(c.name.clone(), c.value);
        }
    }
}

fn translate_global_var(tr: &mut Translator, v: &VarDecl) {
    let ty = tr.lower_type(&v.ty);
    tr.unit.globals.insert(v.name.to_string(), Value::var(v.name.clone(), IrType::ptr_to(ty.clone()), false));
    if v.storage.is_extern && v.init.is_none() {
        tr.unit.declare_pending(v.name.clone(), ty, false);
        return;
    }
    let init = v.init.as_ref().map(|e| global_const(&ty, e)).unwrap_or_else(|| Value::zero(ty.clone()));
    tr.unit.decls.push((v.name.clone(), ty, Some(init)));
}

/// Folds a global initializer expression to a compile-time `Const`.
/// Only literal scalars are supported here; any richer initializer
/// (string literals producing a GEP, brace-enclosed aggregate lists)
/// falls back to zero-initialisation — full constant-expression
/// evaluation for global initializers is the typechecker's constant
/// evaluator's job and not yet wired into this path.
fn global_const(ty: &IrType, e: &Expr) -> Value {
    match &e.kind {
        ExprKind::Literal(Literal::Int { value, .. }) => Value::Const { ty: ty.clone(), value: Const::Int(*value) },
        ExprKind::Literal(Literal::Char(v)) => Value::Const { ty: ty.clone(), value: Const::Int(*v) },
        ExprKind::Literal(Literal::Float { value, .. }) => Value::Const { ty: ty.clone(), value: Const::Float(*value) },
        _ => Value::zero(ty.clone()),
    }
}

/// Allocates stack storage for a function-local variable and, if it has
/// an initializer, stores it — used by `translate::stmt`'s `Decl`
/// handling.
///
/// The `Alloca` always lands in the function's prefix (hoisted to the
/// entry block, like every other local's), since a `goto` can skip over
/// this declaration and still needs the storage to exist for the rest of
/// the scope. `dead` suppresses only the initializer's `Store`/`memcpy`:
/// when this declaration is unreachable (spec.md §9 `ignore_until_label`),
/// running its initializer would emit IR after a block terminator with no
/// intervening label, which violates the "Block shape" invariant.
pub fn translate_local_var(tr: &mut Translator, f: &mut Function, v: &VarDecl, dead: bool) {
    let ty = tr.lower_type(&v.ty);
    let align = crate::typeck::layout::align_of(&v.ty).max(1) as u32;
    let ptr_name = f.fresh_temp();
    let ptr = Value::var(ptr_name, IrType::ptr_to(ty.clone()), true);
    f.push_prefix(crate::ir::stmt::Stmt::Assign {
        dest: ptr.clone(),
        src: Value::Alloca { ty: ty.clone(), count_ty: None, n_elems: None, align },
    });
    f.locals.insert(v.name.to_string(), ptr.clone());
    if dead {
        return;
    }
    if let Some(init) = &v.init {
        if v.ty.is_aggregate() {
            if let ExprKind::CompoundLiteral { .. } = &init.kind {
                let src_addr = super::expr::translate_expr(tr, f, init, true);
                super::aggregate::emit_memcpy(tr, f, ptr, src_addr, crate::typeck::layout::size_of(&v.ty), align as u64);
            }
        } else {
            let val = super::expr::translate_expr(tr, f, init, false);
            f.emit(crate::ir::stmt::Stmt::Store { ty, val, ptr });
        }
    }
}
