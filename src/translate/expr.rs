//! Expression and function-body translation (spec.md §4.2 "Expression
//! translation").
//!
//! Grounded on `original_source/src/trans/trans_expr.c`. Every lvalue
//! expression is translated through an `addrof` flag: `true` yields the
//! address (used by `&`, assignment targets, and member/array chains that
//! need a pointer for a further GEP step); `false` yields the loaded
//! scalar value. Aggregate-typed expressions always denote an address
//! regardless of the flag (spec.md §3 invariant).

use super::bitfield::{self, BitfieldLoc};
use super::intrinsics::{self, declare_va_intrinsics};
use super::state::TransState;
use super::{emit_assign, Translator};
use crate::ast::decl::FuncDecl;
use crate::ast::expr::{BinOp, Expr, ExprKind, IncDecOp, Literal, UnOp};
use crate::ast::stmt::Stmt as AstStmt;
use crate::ast::types::{CType, StructOrUnion};
use crate::ir::function::Function;
use crate::ir::stmt::Stmt;
use crate::ir::types::IrType;
use crate::ir::value::{Const, ConvertKind, FloatCond, IntCond, Value};
use std::rc::Rc;

pub fn translate_function_body(tr: &mut Translator, fdecl: &FuncDecl, body: &AstStmt) -> Function {
    let ret_ty = tr.lower_type(&fdecl.ret);
    let param_tys: Vec<Rc<IrType>> = fdecl.params.iter().map(|p| Rc::new(tr.lower_type(&p.ty))).collect();
    let func_ty = IrType::Func { ret: Rc::new(ret_ty.clone()), params: param_tys.clone(), varargs: fdecl.variadic };
    let param_values: Vec<Value> = fdecl
        .params
        .iter()
        .zip(param_tys.iter())
        .map(|(p, ty)| Value::var(p.name.clone().unwrap_or_else(|| Rc::from("_")), (**ty).clone(), true))
        .collect();
    let mut f = Function::new(fdecl.name.clone(), func_ty, param_values);
    f.locals.push_scope();
    for (p, pty) in fdecl.params.iter().zip(param_tys.iter()) {
        if let Some(pname) = &p.name {
            let align = crate::typeck::layout::align_of(&p.ty).max(1) as u32;
            let ptr_name = f.fresh_temp();
            let ptr = Value::var(ptr_name, IrType::ptr_to((**pty).clone()), true);
            f.push_prefix(Stmt::Assign { dest: ptr.clone(), src: Value::Alloca { ty: (**pty).clone(), count_ty: None, n_elems: None, align } });
            f.push_prefix(Stmt::Store { ty: (**pty).clone(), val: Value::var(pname.clone(), (**pty).clone(), true), ptr: ptr.clone() });
            f.locals.insert(pname.to_string(), ptr);
        }
    }
    let entry = f.fresh_label("entry");
    f.emit(Stmt::Label(entry));
    let mut state = TransState::new();
    let terminates = super::stmt::translate_stmt(tr, &mut f, body, &mut state);
    if !terminates && !f.body_ends_in_terminator() {
        if matches!(ret_ty, IrType::Void) {
            f.emit(Stmt::Ret { ty: IrType::Void, val: None });
        } else {
            f.emit(Stmt::Ret { ty: ret_ty.clone(), val: Some(Value::zero(ret_ty.clone())) });
        }
    }
    f
}

pub fn translate_expr(tr: &mut Translator, f: &mut Function, e: &Expr, addrof: bool) -> Value {
    match &e.kind {
        ExprKind::Ident(name) => translate_ident(tr, f, e, name, addrof),
        ExprKind::Literal(lit) => translate_literal(tr, f, lit),
        ExprKind::Binary { op, lhs, rhs } => translate_binary(tr, f, *op, lhs, rhs),
        ExprKind::Unary { op, operand } => translate_unary(tr, f, e, *op, operand, addrof),
        ExprKind::IncDec { op, operand } => translate_inc_dec(tr, f, *op, operand),
        ExprKind::Assign { lhs, rhs } => translate_assign(tr, f, lhs, rhs, None),
        ExprKind::CompoundAssign { op, lhs, rhs } => translate_assign(tr, f, lhs, rhs, Some(*op)),
        ExprKind::Ternary { cond, then, else_ } => translate_ternary(tr, f, e, cond, then, else_, addrof),
        ExprKind::Cast { ty, operand } => translate_cast(tr, f, ty, operand, addrof),
        ExprKind::Call { callee, args } => translate_call(tr, f, callee, args),
        ExprKind::Member { base, field, arrow } => translate_member(tr, f, base, field, *arrow, addrof),
        ExprKind::Index { base, index } => translate_index(tr, f, base, index, addrof),
        ExprKind::SizeofExpr(operand) => Value::int(IrType::I64, crate::typeck::layout::size_of(&operand.etype()) as i128),
        ExprKind::SizeofType(ty) => Value::int(IrType::I64, crate::typeck::layout::size_of(ty) as i128),
        ExprKind::AlignofType(ty) => Value::int(IrType::I64, crate::typeck::layout::align_of(ty) as i128),
        ExprKind::Offsetof { ty, field } => Value::int(IrType::I64, crate::typeck::layout::offset_of(ty, field).unwrap_or(0) as i128),
        ExprKind::CompoundLiteral { ty, init } => translate_compound_literal(tr, f, ty, init, addrof),
        ExprKind::VaStart { ap, .. } => translate_va_start(tr, f, ap),
        ExprKind::VaEnd(ap) => translate_va_end(tr, f, ap),
        ExprKind::VaCopy { dst, src } => translate_va_copy(tr, f, dst, src),
        ExprKind::VaArg { ap, ty } => translate_va_arg(tr, f, ap, ty),
        ExprKind::Comma(exprs) => {
            let mut last = Value::zero(IrType::Void);
            let n = exprs.len();
            for (i, ex) in exprs.iter().enumerate() {
                last = translate_expr(tr, f, ex, i + 1 == n && addrof);
            }
            last
        }
    }
}

fn translate_ident(tr: &mut Translator, f: &mut Function, e: &Expr, name: &Rc<str>, addrof: bool) -> Value {
    if let Some(v) = f.locals.lookup(name).or_else(|| tr.unit.globals.lookup(name)).cloned() {
        let cty = e.etype();
        if matches!(cty.unwrap_typedef(), CType::Func { .. }) {
            return v;
        }
        if addrof || cty.is_aggregate() {
            return v;
        }
        let ty = tr.lower_type(&cty);
        return emit_assign(f, ty.clone(), Value::Load { ty, ptr: Box::new(v) });
    }
    if let Some(val) = tr.enum_consts.get(name.as_ref()).copied() {
        return Value::int(IrType::I32, val);
    }
    tr.diags.error(Some(e.mark.clone()), format!("undeclared identifier `{}`", name));
    Value::zero(IrType::I32)
}

fn translate_literal(tr: &mut Translator, f: &mut Function, lit: &Literal) -> Value {
    match lit {
        Literal::Int { value, ty } => Value::Const { ty: tr.lower_type(ty), value: Const::Int(*value) },
        Literal::Char(v) => Value::Const { ty: IrType::I32, value: Const::Int(*v) },
        Literal::Float { value, ty } => Value::Const { ty: tr.lower_type(ty), value: Const::Float(*value) },
        Literal::Str(s) => {
            let (name, len) = tr.unit.intern_string(s);
            let arr_ty = IrType::Arr(len as u64, Rc::new(IrType::I8));
            let arr_ptr = Value::var(name, IrType::ptr_to(arr_ty.clone()), false);
            emit_assign(
                f,
                IrType::ptr_to(IrType::I8),
                Value::GetElemPtr { result_ty: IrType::ptr_to(IrType::I8), ptr_ty: IrType::ptr_to(arr_ty), ptr: Box::new(arr_ptr), indices: vec![Value::int(IrType::I32, 0), Value::int(IrType::I32, 0)] },
            )
        }
    }
}

pub(super) fn to_i1(tr: &mut Translator, f: &mut Function, v: Value, cty: &CType) -> Value {
    let ty = tr.lower_type(cty);
    if cty.is_float() {
        emit_assign(f, IrType::I1, Value::FCmp { cond: FloatCond::One, ty: ty.clone(), lhs: Box::new(v), rhs: Box::new(Value::Const { ty, value: Const::Float(0.0) }) })
    } else {
        emit_assign(f, IrType::I1, Value::ICmp { cond: IntCond::Ne, ty: ty.clone(), lhs: Box::new(v), rhs: Box::new(Value::zero(ty)) })
    }
}

/// Dispatches on (dest, src) kind per spec.md §4.2's cast table. Boolean
/// destinations lower to a `!= 0` comparison rather than a `trunc`.
fn convert_numeric(tr: &mut Translator, f: &mut Function, v: Value, from: &CType, to: &CType) -> Value {
    let from_ty = tr.lower_type(from);
    let to_ty = tr.lower_type(to);
    if from_ty == to_ty {
        return v;
    }
    if matches!(to.unwrap_typedef(), CType::Bool) {
        return to_i1(tr, f, v, from);
    }
    if from.is_ptr() && to.is_ptr() {
        return emit_assign(f, to_ty.clone(), Value::Convert { kind: ConvertKind::Bitcast, src_ty: from_ty, val: Box::new(v), dst_ty: to_ty });
    }
    if from.is_ptr() && to.is_integer() {
        return emit_assign(f, to_ty.clone(), Value::Convert { kind: ConvertKind::PtrToInt, src_ty: from_ty, val: Box::new(v), dst_ty: to_ty });
    }
    if from.is_integer() && to.is_ptr() {
        return emit_assign(f, to_ty.clone(), Value::Convert { kind: ConvertKind::IntToPtr, src_ty: from_ty, val: Box::new(v), dst_ty: to_ty });
    }
    if from.is_integer() && to.is_float() {
        let kind = if from.is_unsigned() { ConvertKind::UiToFp } else { ConvertKind::SiToFp };
        return emit_assign(f, to_ty.clone(), Value::Convert { kind, src_ty: from_ty, val: Box::new(v), dst_ty: to_ty });
    }
    if from.is_float() && to.is_integer() {
        let kind = if to.is_unsigned() { ConvertKind::FpToUi } else { ConvertKind::FpToSi };
        return emit_assign(f, to_ty.clone(), Value::Convert { kind, src_ty: from_ty, val: Box::new(v), dst_ty: to_ty });
    }
    if from.is_float() && to.is_float() {
        let kind = if to.arithmetic_rank() > from.arithmetic_rank() { ConvertKind::FpExt } else { ConvertKind::FpTrunc };
        return emit_assign(f, to_ty.clone(), Value::Convert { kind, src_ty: from_ty, val: Box::new(v), dst_ty: to_ty });
    }
    let from_size = crate::typeck::layout::size_of(from);
    let to_size = crate::typeck::layout::size_of(to);
    let kind = if to_size > from_size {
        if from.is_unsigned() {
            ConvertKind::Zext
        } else {
            ConvertKind::Sext
        }
    } else {
        ConvertKind::Trunc
    };
    emit_assign(f, to_ty.clone(), Value::Convert { kind, src_ty: from_ty, val: Box::new(v), dst_ty: to_ty })
}

fn arith_binop(op: BinOp, is_float: bool, unsigned: bool) -> crate::ir::value::BinOp {
    use crate::ir::value::BinOp as I;
    match op {
        BinOp::Add => if is_float { I::FAdd } else { I::Add },
        BinOp::Sub => if is_float { I::FSub } else { I::Sub },
        BinOp::Mul => if is_float { I::FMul } else { I::Mul },
        BinOp::Div => if is_float { I::FDiv } else if unsigned { I::UDiv } else { I::SDiv },
        BinOp::Mod => if unsigned { I::URem } else { I::SRem },
        BinOp::BitAnd => I::And,
        BinOp::BitOr => I::Or,
        BinOp::BitXor => I::Xor,
        BinOp::Shl => I::Shl,
        BinOp::Shr => if unsigned { I::LShr } else { I::AShr },
        _ => unreachable!("non-arithmetic BinOp passed to arith_binop"),
    }
}

fn int_cond(op: BinOp, unsigned: bool) -> IntCond {
    match op {
        BinOp::Eq => IntCond::Eq,
        BinOp::Ne => IntCond::Ne,
        BinOp::Lt => if unsigned { IntCond::Ult } else { IntCond::Slt },
        BinOp::Le => if unsigned { IntCond::Ule } else { IntCond::Sle },
        BinOp::Gt => if unsigned { IntCond::Ugt } else { IntCond::Sgt },
        BinOp::Ge => if unsigned { IntCond::Uge } else { IntCond::Sge },
        _ => unreachable!("non-comparison BinOp passed to int_cond"),
    }
}

fn float_cond(op: BinOp) -> FloatCond {
    match op {
        BinOp::Eq => FloatCond::Oeq,
        BinOp::Ne => FloatCond::One,
        BinOp::Lt => FloatCond::Olt,
        BinOp::Le => FloatCond::Ole,
        BinOp::Gt => FloatCond::Ogt,
        BinOp::Ge => FloatCond::Oge,
        _ => unreachable!("non-comparison BinOp passed to float_cond"),
    }
}

fn ptr_elem_cty(ptr_cty: &CType) -> CType {
    match ptr_cty.unwrap_typedef() {
        CType::Ptr(inner) => (**inner).clone(),
        other => other.clone(),
    }
}

fn to_i64_index(tr: &mut Translator, f: &mut Function, idx: &Expr) -> Value {
    let idx_cty = idx.etype();
    let idx_val = translate_expr(tr, f, idx, false);
    let idx_ty = tr.lower_type(&idx_cty);
    if idx_ty == IrType::I64 {
        return idx_val;
    }
    let kind = if idx_cty.is_unsigned() { ConvertKind::Zext } else { ConvertKind::Sext };
    emit_assign(f, IrType::I64, Value::Convert { kind, src_ty: idx_ty, val: Box::new(idx_val), dst_ty: IrType::I64 })
}

fn translate_ptr_add(tr: &mut Translator, f: &mut Function, ptr_expr: &Expr, idx_expr: &Expr, ptr_cty: &CType, negate: bool) -> Value {
    let base = translate_expr(tr, f, ptr_expr, false);
    let mut idx_val = to_i64_index(tr, f, idx_expr);
    if negate {
        idx_val = emit_assign(f, IrType::I64, Value::Binop { op: crate::ir::value::BinOp::Sub, ty: IrType::I64, lhs: Box::new(Value::int(IrType::I64, 0)), rhs: Box::new(idx_val) });
    }
    let elem_cty = ptr_elem_cty(ptr_cty);
    let elem_ty = tr.lower_type(&elem_cty);
    let result_ty = IrType::ptr_to(elem_ty);
    emit_assign(f, result_ty.clone(), Value::GetElemPtr { result_ty, ptr_ty: base.ty(), ptr: Box::new(base), indices: vec![idx_val] })
}

fn translate_binary(tr: &mut Translator, f: &mut Function, op: BinOp, lhs: &Expr, rhs: &Expr) -> Value {
    match op {
        BinOp::LogAnd | BinOp::LogOr => translate_logical(tr, f, op, lhs, rhs),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne => translate_comparison(tr, f, op, lhs, rhs),
        _ => {
            let lty = lhs.etype();
            let rty = rhs.etype();
            if matches!(op, BinOp::Add) && lty.is_ptr() {
                return translate_ptr_add(tr, f, lhs, rhs, &lty, false);
            }
            if matches!(op, BinOp::Add) && rty.is_ptr() {
                return translate_ptr_add(tr, f, rhs, lhs, &rty, false);
            }
            if matches!(op, BinOp::Sub) && lty.is_ptr() && !rty.is_ptr() {
                return translate_ptr_add(tr, f, lhs, rhs, &lty, true);
            }
            let result_cty = crate::typeck::type_max(&lty, &rty);
            let ty = tr.lower_type(&result_cty);
            let lv = translate_expr(tr, f, lhs, false);
            let lv = convert_numeric(tr, f, lv, &lty, &result_cty);
            let rv = translate_expr(tr, f, rhs, false);
            let rv = convert_numeric(tr, f, rv, &rty, &result_cty);
            let bop = arith_binop(op, result_cty.is_float(), result_cty.is_unsigned());
            emit_assign(f, ty.clone(), Value::Binop { op: bop, ty, lhs: Box::new(lv), rhs: Box::new(rv) })
        }
    }
}

fn translate_logical(tr: &mut Translator, f: &mut Function, op: BinOp, lhs: &Expr, rhs: &Expr) -> Value {
    let is_and = matches!(op, BinOp::LogAnd);
    let l_cty = lhs.etype();
    let lv = translate_expr(tr, f, lhs, false);
    let l_bool = to_i1(tr, f, lv, &l_cty);
    let rhs_label = f.fresh_label(if is_and { "land.rhs" } else { "lor.rhs" });
    let end_label = f.fresh_label(if is_and { "land.end" } else { "lor.end" });
    let targets = if is_and { vec![rhs_label.clone(), end_label.clone()] } else { vec![end_label.clone(), rhs_label.clone()] };
    f.emit(Stmt::Br { cond: Some(l_bool), targets });
    let pred1 = f.last_label.clone().expect("branch just emitted a label-bearing block");
    f.emit(Stmt::Label(rhs_label));
    let r_cty = rhs.etype();
    let rv = translate_expr(tr, f, rhs, false);
    let r_bool = to_i1(tr, f, rv, &r_cty);
    let r_int = emit_assign(f, IrType::I32, Value::Convert { kind: ConvertKind::Zext, src_ty: IrType::I1, val: Box::new(r_bool), dst_ty: IrType::I32 });
    f.emit(Stmt::Br { cond: None, targets: vec![end_label.clone()] });
    let pred2 = f.last_label.clone().expect("rhs block has a label");
    f.emit(Stmt::Label(end_label));
    let short_val = if is_and { 0 } else { 1 };
    emit_assign(f, IrType::I32, Value::Phi { ty: IrType::I32, incoming: vec![(Value::int(IrType::I32, short_val), pred1), (r_int, pred2)] })
}

fn translate_comparison(tr: &mut Translator, f: &mut Function, op: BinOp, lhs: &Expr, rhs: &Expr) -> Value {
    let lty = lhs.etype();
    let rty = rhs.etype();
    let result_cty = crate::typeck::type_max(&lty, &rty);
    let ty = tr.lower_type(&result_cty);
    let lv = translate_expr(tr, f, lhs, false);
    let lv = convert_numeric(tr, f, lv, &lty, &result_cty);
    let rv = translate_expr(tr, f, rhs, false);
    let rv = convert_numeric(tr, f, rv, &rty, &result_cty);
    let bit = if result_cty.is_float() {
        emit_assign(f, IrType::I1, Value::FCmp { cond: float_cond(op), ty, lhs: Box::new(lv), rhs: Box::new(rv) })
    } else {
        emit_assign(f, IrType::I1, Value::ICmp { cond: int_cond(op, result_cty.is_unsigned()), ty, lhs: Box::new(lv), rhs: Box::new(rv) })
    };
    emit_assign(f, IrType::I32, Value::Convert { kind: ConvertKind::Zext, src_ty: IrType::I1, val: Box::new(bit), dst_ty: IrType::I32 })
}

fn translate_unary(tr: &mut Translator, f: &mut Function, e: &Expr, op: UnOp, operand: &Expr, addrof: bool) -> Value {
    match op {
        UnOp::AddrOf => translate_expr(tr, f, operand, true),
        UnOp::Deref => {
            let ptr_val = translate_expr(tr, f, operand, false);
            let cty = e.etype();
            if addrof || cty.is_aggregate() {
                ptr_val
            } else {
                let ty = tr.lower_type(&cty);
                emit_assign(f, ty.clone(), Value::Load { ty, ptr: Box::new(ptr_val) })
            }
        }
        UnOp::LogNot => {
            let cty = operand.etype();
            let v = translate_expr(tr, f, operand, false);
            let bit = to_i1(tr, f, v, &cty);
            let inv = emit_assign(f, IrType::I1, Value::ICmp { cond: IntCond::Eq, ty: IrType::I1, lhs: Box::new(bit), rhs: Box::new(Value::int(IrType::I1, 0)) });
            emit_assign(f, IrType::I32, Value::Convert { kind: ConvertKind::Zext, src_ty: IrType::I1, val: Box::new(inv), dst_ty: IrType::I32 })
        }
        UnOp::Neg => {
            let cty = operand.etype();
            let ty = tr.lower_type(&cty);
            let v = translate_expr(tr, f, operand, false);
            if cty.is_float() {
                emit_assign(f, ty.clone(), Value::Binop { op: crate::ir::value::BinOp::FSub, ty: ty.clone(), lhs: Box::new(Value::Const { ty: ty.clone(), value: Const::Float(0.0) }), rhs: Box::new(v) })
            } else {
                emit_assign(f, ty.clone(), Value::Binop { op: crate::ir::value::BinOp::Sub, ty: ty.clone(), lhs: Box::new(Value::zero(ty.clone())), rhs: Box::new(v) })
            }
        }
        UnOp::Plus => translate_expr(tr, f, operand, false),
        UnOp::BitNot => {
            let cty = operand.etype();
            let ty = tr.lower_type(&cty);
            let v = translate_expr(tr, f, operand, false);
            emit_assign(f, ty.clone(), Value::Binop { op: crate::ir::value::BinOp::Xor, ty: ty.clone(), lhs: Box::new(v), rhs: Box::new(Value::int(ty, -1)) })
        }
    }
}

fn translate_inc_dec(tr: &mut Translator, f: &mut Function, op: IncDecOp, operand: &Expr) -> Value {
    let cty = operand.etype();
    let ty = tr.lower_type(&cty);
    let addr = translate_expr(tr, f, operand, true);
    let old = emit_assign(f, ty.clone(), Value::Load { ty: ty.clone(), ptr: Box::new(addr.clone()) });
    let is_inc = matches!(op, IncDecOp::PreInc | IncDecOp::PostInc);
    let new_val = if cty.is_ptr() {
        let elem_cty = ptr_elem_cty(&cty);
        let elem_ty = tr.lower_type(&elem_cty);
        let one = if is_inc { Value::int(IrType::I64, 1) } else { Value::int(IrType::I64, -1) };
        emit_assign(f, ty.clone(), Value::GetElemPtr { result_ty: ty.clone(), ptr_ty: ty.clone(), ptr: Box::new(old.clone()), indices: vec![one] })
    } else if cty.is_float() {
        let one = Value::Const { ty: ty.clone(), value: Const::Float(1.0) };
        let bop = if is_inc { crate::ir::value::BinOp::FAdd } else { crate::ir::value::BinOp::FSub };
        emit_assign(f, ty.clone(), Value::Binop { op: bop, ty: ty.clone(), lhs: Box::new(old.clone()), rhs: Box::new(one) })
    } else {
        let one = Value::int(ty.clone(), 1);
        let bop = if is_inc { crate::ir::value::BinOp::Add } else { crate::ir::value::BinOp::Sub };
        emit_assign(f, ty.clone(), Value::Binop { op: bop, ty: ty.clone(), lhs: Box::new(old.clone()), rhs: Box::new(one) })
    };
    f.emit(Stmt::Store { ty, val: new_val.clone(), ptr: addr });
    match op {
        IncDecOp::PreInc | IncDecOp::PreDec => new_val,
        IncDecOp::PostInc | IncDecOp::PostDec => old,
    }
}

fn translate_ternary(tr: &mut Translator, f: &mut Function, e: &Expr, cond: &Expr, then: &Expr, else_: &Expr, addrof: bool) -> Value {
    let cond_cty = cond.etype();
    let cv = translate_expr(tr, f, cond, false);
    let cbit = to_i1(tr, f, cv, &cond_cty);
    let then_label = f.fresh_label("cond.true");
    let else_label = f.fresh_label("cond.false");
    let end_label = f.fresh_label("cond.end");
    f.emit(Stmt::Br { cond: Some(cbit), targets: vec![then_label.clone(), else_label.clone()] });
    f.emit(Stmt::Label(then_label));
    let result_cty = e.etype();
    let result_ty = tr.lower_type(&result_cty);
    let then_cty = then.etype();
    let tv_raw = translate_expr(tr, f, then, addrof);
    let tv = if result_cty.is_aggregate() { tv_raw } else { convert_numeric(tr, f, tv_raw, &then_cty, &result_cty) };
    f.emit(Stmt::Br { cond: None, targets: vec![end_label.clone()] });
    let then_pred = f.last_label.clone().expect("then arm has a label");
    f.emit(Stmt::Label(else_label));
    let else_cty = else_.etype();
    let ev_raw = translate_expr(tr, f, else_, addrof);
    let ev = if result_cty.is_aggregate() { ev_raw } else { convert_numeric(tr, f, ev_raw, &else_cty, &result_cty) };
    f.emit(Stmt::Br { cond: None, targets: vec![end_label.clone()] });
    let else_pred = f.last_label.clone().expect("else arm has a label");
    f.emit(Stmt::Label(end_label));
    emit_assign(f, result_ty.clone(), Value::Phi { ty: result_ty, incoming: vec![(tv, then_pred), (ev, else_pred)] })
}

fn translate_cast(tr: &mut Translator, f: &mut Function, ty: &CType, operand: &Expr, addrof: bool) -> Value {
    if ty.is_aggregate() {
        return translate_expr(tr, f, operand, addrof);
    }
    let from_cty = operand.etype();
    let v = translate_expr(tr, f, operand, false);
    convert_numeric(tr, f, v, &from_cty, ty)
}

fn translate_arg(tr: &mut Translator, f: &mut Function, a: &Expr) -> Value {
    let cty = a.etype();
    if cty.is_aggregate() {
        let addr = translate_expr(tr, f, a, true);
        let ty = tr.lower_type(&cty);
        emit_assign(f, ty.clone(), Value::Load { ty, ptr: Box::new(addr) })
    } else {
        translate_expr(tr, f, a, false)
    }
}

fn translate_call(tr: &mut Translator, f: &mut Function, callee: &Expr, args: &[Expr]) -> Value {
    let callee_val = translate_expr(tr, f, callee, false);
    let callee_cty = callee.etype();
    let func_cty = match callee_cty.unwrap_typedef() {
        CType::Ptr(inner) => (**inner).clone(),
        _ => (*callee_cty).clone(),
    };
    let (ret_cty, unspecified) = match func_cty.unwrap_typedef() {
        CType::Func { ret, unspecified, .. } => ((**ret).clone(), *unspecified),
        _ => (CType::Int { unsigned: false }, false),
    };
    let arg_vals: Vec<Value> = args.iter().map(|a| translate_arg(tr, f, a)).collect();
    let ret_ty = tr.lower_type(&ret_cty);
    let func_ty = if unspecified && !arg_vals.is_empty() {
        IrType::Func { ret: Rc::new(ret_ty.clone()), params: arg_vals.iter().map(|v| Rc::new(v.ty())).collect(), varargs: true }
    } else {
        tr.lower_type(&func_cty)
    };
    let call = Value::Call { func_ty, func: Box::new(callee_val), args: arg_vals };
    if matches!(ret_cty.unwrap_typedef(), CType::Void) {
        f.emit(Stmt::Expr(call));
        Value::zero(IrType::Void)
    } else {
        emit_assign(f, ret_ty, call)
    }
}

enum MemberTarget {
    Addr(Value, CType),
    Bitfield(Value, BitfieldLoc, CType),
}

fn resolve_member(tr: &mut Translator, f: &mut Function, base: &Expr, field: &Rc<str>, arrow: bool) -> MemberTarget {
    let base_cty = base.etype();
    let (struct_addr, record_cty) = if arrow {
        let ptr = translate_expr(tr, f, base, false);
        (ptr, ptr_elem_cty(&base_cty))
    } else {
        let addr = translate_expr(tr, f, base, true);
        (addr, (*base_cty).clone())
    };
    let (kind, members) = match record_cty.unwrap_typedef() {
        CType::Record { kind, members: Some(m), .. } => (*kind, m.clone()),
        _ => panic!("translator precondition: member access on non-record type (spec.md §7 category 4)"),
    };
    if matches!(kind, StructOrUnion::Struct) {
        if let Some(loc) = bitfield::locate(&members, field) {
            let mem = members.iter().find(|m| &*m.name == &**field).expect("bitfield::locate found the member");
            return MemberTarget::Bitfield(struct_addr, loc, (*mem.ty).clone());
        }
    }
    let mem = members.iter().find(|m| &*m.name == &**field).expect("translator precondition: unknown member name");
    let mem_cty = (*mem.ty).clone();
    match kind {
        StructOrUnion::Struct => {
            let idx = bitfield::ordinary_field_index(&members, field).unwrap_or(0);
            let mem_ty = tr.lower_type(&mem_cty);
            let result_ty = IrType::ptr_to(mem_ty);
            let addr = emit_assign(
                f,
                result_ty.clone(),
                Value::GetElemPtr { result_ty, ptr_ty: struct_addr.ty(), ptr: Box::new(struct_addr), indices: vec![Value::int(IrType::I32, 0), Value::int(IrType::I32, idx as i128)] },
            );
            MemberTarget::Addr(addr, mem_cty)
        }
        StructOrUnion::Union => {
            let widest_ty = tr.union_stored_type(&members);
            let field_ptr_ty = IrType::ptr_to(widest_ty.clone());
            let field_addr = emit_assign(
                f,
                field_ptr_ty.clone(),
                Value::GetElemPtr { result_ty: field_ptr_ty, ptr_ty: struct_addr.ty(), ptr: Box::new(struct_addr), indices: vec![Value::int(IrType::I32, 0), Value::int(IrType::I32, 0)] },
            );
            let mem_ty = tr.lower_type(&mem_cty);
            let addr = if mem_ty == widest_ty {
                field_addr
            } else {
                let ptr_ty = IrType::ptr_to(mem_ty);
                emit_assign(f, ptr_ty.clone(), Value::Convert { kind: ConvertKind::Bitcast, src_ty: field_addr.ty(), val: Box::new(field_addr), dst_ty: ptr_ty })
            };
            MemberTarget::Addr(addr, mem_cty)
        }
    }
}

fn translate_member(tr: &mut Translator, f: &mut Function, base: &Expr, field: &Rc<str>, arrow: bool, addrof: bool) -> Value {
    match resolve_member(tr, f, base, field, arrow) {
        MemberTarget::Addr(addr, mem_cty) => {
            if addrof || mem_cty.is_aggregate() {
                addr
            } else {
                let ty = tr.lower_type(&mem_cty);
                emit_assign(f, ty.clone(), Value::Load { ty, ptr: Box::new(addr) })
            }
        }
        MemberTarget::Bitfield(struct_addr, loc, mem_cty) => {
            let ty = tr.lower_type(&mem_cty);
            bitfield::load_bitfield(f, &struct_addr, &loc, ty)
        }
    }
}

fn translate_index(tr: &mut Translator, f: &mut Function, base: &Expr, index: &Expr, addrof: bool) -> Value {
    let base_cty = base.etype();
    let idx_val = to_i64_index(tr, f, index);
    let (base_val, indices, elem_cty) = match base_cty.unwrap_typedef() {
        CType::Array { elem, .. } => {
            let addr = translate_expr(tr, f, base, true);
            (addr, vec![Value::int(IrType::I32, 0), idx_val], (**elem).clone())
        }
        CType::Ptr(elem) => {
            let ptr = translate_expr(tr, f, base, false);
            (ptr, vec![idx_val], (**elem).clone())
        }
        _ => panic!("translator precondition: index on non-array/pointer type"),
    };
    let elem_ty = tr.lower_type(&elem_cty);
    let result_ty = IrType::ptr_to(elem_ty.clone());
    let addr = emit_assign(f, result_ty.clone(), Value::GetElemPtr { result_ty, ptr_ty: base_val.ty(), ptr: Box::new(base_val), indices });
    if addrof || elem_cty.is_aggregate() {
        addr
    } else {
        emit_assign(f, elem_ty.clone(), Value::Load { ty: elem_ty, ptr: Box::new(addr) })
    }
}

/// Assigns `rhs` into `lhs`, handling the bitfield-member dispatch and
/// compound-operator combine (spec.md §4.2 "Assignment with compound
/// op"). The positional-scalar simplification noted in
/// `translate_compound_literal`'s doc applies here too: nested aggregate
/// assignment through a compound-assign is not meaningful in C and isn't
/// handled.
fn translate_assign(tr: &mut Translator, f: &mut Function, lhs: &Expr, rhs: &Expr, compound_op: Option<BinOp>) -> Value {
    if let ExprKind::Member { base, field, arrow } = &lhs.kind {
        if let MemberTarget::Bitfield(struct_addr, loc, mem_cty) = resolve_member(tr, f, base, field, *arrow) {
            let mem_ty = tr.lower_type(&mem_cty);
            let rhs_cty = rhs.etype();
            let rv = translate_expr(tr, f, rhs, false);
            let new_val = if let Some(op) = compound_op {
                let old = bitfield::load_bitfield(f, &struct_addr, &loc, mem_ty.clone());
                let result_cty = crate::typeck::type_max(&mem_cty, &rhs_cty);
                let result_ty = tr.lower_type(&result_cty);
                let old_c = convert_numeric(tr, f, old, &mem_cty, &result_cty);
                let rv_c = convert_numeric(tr, f, rv, &rhs_cty, &result_cty);
                let bop = arith_binop(op, result_cty.is_float(), result_cty.is_unsigned());
                let combined = emit_assign(f, result_ty.clone(), Value::Binop { op: bop, ty: result_ty.clone(), lhs: Box::new(old_c), rhs: Box::new(rv_c) });
                convert_numeric(tr, f, combined, &result_cty, &mem_cty)
            } else {
                convert_numeric(tr, f, rv, &rhs_cty, &mem_cty)
            };
            bitfield::store_bitfield(f, &struct_addr, &loc, new_val.clone(), mem_ty);
            return new_val;
        }
    }
    let lhs_cty = lhs.etype();
    let addr = translate_expr(tr, f, lhs, true);
    let ty = tr.lower_type(&lhs_cty);
    let rhs_cty = rhs.etype();
    if compound_op.is_none() && lhs_cty.is_aggregate() {
        let src_addr = translate_expr(tr, f, rhs, true);
        let size = crate::typeck::layout::size_of(&lhs_cty);
        let align = crate::typeck::layout::align_of(&lhs_cty).max(1);
        super::aggregate::emit_memcpy(tr, f, addr.clone(), src_addr, size, align);
        return addr;
    }
    let new_val = if let Some(op) = compound_op {
        let old = emit_assign(f, ty.clone(), Value::Load { ty: ty.clone(), ptr: Box::new(addr.clone()) });
        if lhs_cty.is_ptr() && matches!(op, BinOp::Add | BinOp::Sub) {
            let mut idx_val = to_i64_index(tr, f, rhs);
            if matches!(op, BinOp::Sub) {
                idx_val = emit_assign(f, IrType::I64, Value::Binop { op: crate::ir::value::BinOp::Sub, ty: IrType::I64, lhs: Box::new(Value::int(IrType::I64, 0)), rhs: Box::new(idx_val) });
            }
            emit_assign(f, ty.clone(), Value::GetElemPtr { result_ty: ty.clone(), ptr_ty: ty.clone(), ptr: Box::new(old), indices: vec![idx_val] })
        } else {
            let result_cty = crate::typeck::type_max(&lhs_cty, &rhs_cty);
            let result_ty = tr.lower_type(&result_cty);
            let old_c = convert_numeric(tr, f, old, &lhs_cty, &result_cty);
            let rv = translate_expr(tr, f, rhs, false);
            let rv_c = convert_numeric(tr, f, rv, &rhs_cty, &result_cty);
            let bop = arith_binop(op, result_cty.is_float(), result_cty.is_unsigned());
            let combined = emit_assign(f, result_ty.clone(), Value::Binop { op: bop, ty: result_ty.clone(), lhs: Box::new(old_c), rhs: Box::new(rv_c) });
            convert_numeric(tr, f, combined, &result_cty, &lhs_cty)
        }
    } else {
        let rv = translate_expr(tr, f, rhs, false);
        convert_numeric(tr, f, rv, &rhs_cty, &lhs_cty)
    };
    f.emit(Stmt::Store { ty, val: new_val.clone(), ptr: addr });
    new_val
}

/// Initialises a freshly-allocated aggregate/scalar from its canonical
/// (flat, positional) initializer list. Mirrors `typeck::init`'s own
/// simplification: each slot maps to one member/element directly, so a
/// member that is itself an aggregate is left uninitialised rather than
/// recursed into — the parser already flattens nested brace-lists before
/// canonicalisation, so a faithful nested lowering would need the
/// canonical form to carry nested structure it currently doesn't.
fn store_canonical_init(tr: &mut Translator, f: &mut Function, base_ptr: &Value, ty: &CType, init: &[Option<Expr>]) {
    match ty.unwrap_typedef() {
        CType::Record { kind, members: Some(m), .. } => {
            for (i, elem) in init.iter().enumerate().take(m.len()) {
                let Some(e) = elem else { continue };
                let mem = &m[i];
                if mem.ty.is_aggregate() {
                    continue;
                }
                let field_index = match kind {
                    StructOrUnion::Union => 0,
                    StructOrUnion::Struct => bitfield::ordinary_field_index(m, &mem.name).unwrap_or(i),
                };
                let mem_cty = (*mem.ty).clone();
                let mem_ty = tr.lower_type(&mem_cty);
                let result_ty = IrType::ptr_to(mem_ty.clone());
                let addr = emit_assign(
                    f,
                    result_ty.clone(),
                    Value::GetElemPtr { result_ty, ptr_ty: base_ptr.ty(), ptr: Box::new(base_ptr.clone()), indices: vec![Value::int(IrType::I32, 0), Value::int(IrType::I32, field_index as i128)] },
                );
                let val = translate_expr(tr, f, e, false);
                f.emit(Stmt::Store { ty: mem_ty, val, ptr: addr });
            }
        }
        CType::Array { elem, len } if !elem.is_aggregate() => {
            let bound = len.map(|n| n as usize).unwrap_or(init.len());
            for (i, e_opt) in init.iter().enumerate().take(bound) {
                let Some(e) = e_opt else { continue };
                let elem_ty = tr.lower_type(elem);
                let result_ty = IrType::ptr_to(elem_ty.clone());
                let addr = emit_assign(f, result_ty.clone(), Value::GetElemPtr { result_ty, ptr_ty: base_ptr.ty(), ptr: Box::new(base_ptr.clone()), indices: vec![Value::int(IrType::I32, 0), Value::int(IrType::I32, i as i128)] });
                let val = translate_expr(tr, f, e, false);
                f.emit(Stmt::Store { ty: elem_ty, val, ptr: addr });
            }
        }
        CType::Array { .. } => {}
        _ => {
            if let Some(Some(e)) = init.get(0) {
                let val = translate_expr(tr, f, e, false);
                let ir_ty = tr.lower_type(ty);
                f.emit(Stmt::Store { ty: ir_ty, val, ptr: base_ptr.clone() });
            }
        }
    }
}

fn translate_compound_literal(tr: &mut Translator, f: &mut Function, ty: &CType, init: &[Option<Expr>], addrof: bool) -> Value {
    let ir_ty = tr.lower_type(ty);
    let align = crate::typeck::layout::align_of(ty).max(1) as u32;
    let ptr_name = f.fresh_temp();
    let ptr = Value::var(ptr_name, IrType::ptr_to(ir_ty.clone()), true);
    f.push_prefix(Stmt::Assign { dest: ptr.clone(), src: Value::Alloca { ty: ir_ty.clone(), count_ty: None, n_elems: None, align } });
    store_canonical_init(tr, f, &ptr, ty, init);
    if addrof || ty.is_aggregate() {
        ptr
    } else {
        emit_assign(f, ir_ty.clone(), Value::Load { ty: ir_ty, ptr: Box::new(ptr) })
    }
}

fn translate_va_start(tr: &mut Translator, f: &mut Function, ap: &Expr) -> Value {
    declare_va_intrinsics(&mut tr.unit);
    let ap_val = translate_expr(tr, f, ap, false);
    let i8ptr = IrType::ptr_to(IrType::I8);
    let casted = emit_assign(f, i8ptr.clone(), Value::Convert { kind: ConvertKind::Bitcast, src_ty: ap_val.ty(), val: Box::new(ap_val), dst_ty: i8ptr.clone() });
    let func_ty = IrType::Func { ret: Rc::new(IrType::Void), params: vec![Rc::new(i8ptr)], varargs: false };
    let callee = Value::var(intrinsics::VA_START_NAME, func_ty.clone(), false);
    f.emit(Stmt::Expr(Value::Call { func_ty, func: Box::new(callee), args: vec![casted] }));
    Value::zero(IrType::Void)
}

fn translate_va_end(tr: &mut Translator, f: &mut Function, ap: &Expr) -> Value {
    declare_va_intrinsics(&mut tr.unit);
    let ap_val = translate_expr(tr, f, ap, false);
    let i8ptr = IrType::ptr_to(IrType::I8);
    let casted = emit_assign(f, i8ptr.clone(), Value::Convert { kind: ConvertKind::Bitcast, src_ty: ap_val.ty(), val: Box::new(ap_val), dst_ty: i8ptr.clone() });
    let func_ty = IrType::Func { ret: Rc::new(IrType::Void), params: vec![Rc::new(i8ptr)], varargs: false };
    let callee = Value::var(intrinsics::VA_END_NAME, func_ty.clone(), false);
    f.emit(Stmt::Expr(Value::Call { func_ty, func: Box::new(callee), args: vec![casted] }));
    Value::zero(IrType::Void)
}

fn translate_va_copy(tr: &mut Translator, f: &mut Function, dst: &Expr, src: &Expr) -> Value {
    declare_va_intrinsics(&mut tr.unit);
    let i8ptr = IrType::ptr_to(IrType::I8);
    let dst_val = translate_expr(tr, f, dst, false);
    let dst_cast = emit_assign(f, i8ptr.clone(), Value::Convert { kind: ConvertKind::Bitcast, src_ty: dst_val.ty(), val: Box::new(dst_val), dst_ty: i8ptr.clone() });
    let src_val = translate_expr(tr, f, src, false);
    let src_cast = emit_assign(f, i8ptr.clone(), Value::Convert { kind: ConvertKind::Bitcast, src_ty: src_val.ty(), val: Box::new(src_val), dst_ty: i8ptr.clone() });
    let func_ty = IrType::Func { ret: Rc::new(IrType::Void), params: vec![Rc::new(i8ptr.clone()), Rc::new(i8ptr)], varargs: false };
    let callee = Value::var(intrinsics::VA_COPY_NAME, func_ty.clone(), false);
    f.emit(Stmt::Expr(Value::Call { func_ty, func: Box::new(callee), args: vec![dst_cast, src_cast] }));
    Value::zero(IrType::Void)
}

fn translate_va_arg(tr: &mut Translator, f: &mut Function, ap: &Expr, ty: &CType) -> Value {
    let ap_val = translate_expr(tr, f, ap, false);
    let arg_ty = tr.lower_type(ty);
    emit_assign(f, arg_ty.clone(), Value::VaArg { va_list: Box::new(ap_val), arg_ty })
}
