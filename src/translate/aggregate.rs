//! Aggregate (struct/union) assignment via `llvm.memcpy` (spec.md §4.2
//! "Aggregate copy", §8 scenario 6).

use super::emit_assign;
use super::intrinsics::{declare_memcpy, MEMCPY_NAME};
use super::Translator;
use crate::ir::function::Function;
use crate::ir::stmt::Stmt;
use crate::ir::types::IrType;
use crate::ir::value::Value;
use std::rc::Rc;

/// Emits `call void @llvm.memcpy.p0i8.p0i8.i64(i8* dst, i8* src, i64 size,
/// i32 align, i1 false)`, declaring the intrinsic on first use.
pub fn emit_memcpy(tr: &mut Translator, f: &mut Function, dst: Value, src: Value, size: u64, align: u64) {
    declare_memcpy(&mut tr.unit);
    let i8_ptr = IrType::ptr_to(IrType::I8);
    let dst_cast = emit_assign(f, i8_ptr.clone(), Value::Convert { kind: crate::ir::value::ConvertKind::Bitcast, src_ty: dst.ty(), val: Box::new(dst), dst_ty: i8_ptr.clone() });
    let src_cast = emit_assign(f, i8_ptr.clone(), Value::Convert { kind: crate::ir::value::ConvertKind::Bitcast, src_ty: src.ty(), val: Box::new(src), dst_ty: i8_ptr.clone() });
    let func_ty = IrType::Func {
        ret: Rc::new(IrType::Void),
        params: vec![Rc::new(i8_ptr.clone()), Rc::new(i8_ptr), Rc::new(IrType::I64), Rc::new(IrType::I32), Rc::new(IrType::I1)],
        varargs: false,
    };
    let callee = Value::var(MEMCPY_NAME, func_ty.clone(), false);
    let call = Value::Call {
        func_ty,
        func: Box::new(callee),
        args: vec![dst_cast, src_cast, Value::int(IrType::I64, size as i128), Value::int(IrType::I32, align as i128), Value::int(IrType::I1, 0)],
    };
    f.emit(Stmt::Expr(call));
}
