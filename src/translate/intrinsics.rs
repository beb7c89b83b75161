//! Lazily-declared platform intrinsics (spec.md §4.2 "Aggregate copy",
//! "`va_start`/`va_end`/`va_copy`/`va_arg`").

use crate::ir::types::IrType;
use crate::ir::unit::TranslationUnit;
use std::rc::Rc;

pub const MEMCPY_NAME: &str = "llvm.memcpy.p0i8.p0i8.i64";
pub const VA_START_NAME: &str = "llvm.va_start";
pub const VA_END_NAME: &str = "llvm.va_end";
pub const VA_COPY_NAME: &str = "llvm.va_copy";

/// Declares `llvm.memcpy.p0i8.p0i8.i64` exactly once per translation
/// unit (spec.md §8 scenario 6).
pub fn declare_memcpy(unit: &mut TranslationUnit) {
    if unit.memcpy_declared {
        return;
    }
    let ty = IrType::Func {
        ret: Rc::new(IrType::Void),
        params: vec![Rc::new(IrType::i8_ptr()), Rc::new(IrType::i8_ptr()), Rc::new(IrType::I64), Rc::new(IrType::I32), Rc::new(IrType::I1)],
        varargs: false,
    };
    unit.declare_pending(MEMCPY_NAME, ty, true);
    unit.memcpy_declared = true;
}

/// Declares the three `llvm.va_*` intrinsics used to lower
/// `va_start`/`va_end`/`va_copy`; `va_arg` itself is a native IR
/// instruction ([`crate::ir::value::Value::VaArg`]), not a call.
pub fn declare_va_intrinsics(unit: &mut TranslationUnit) {
    if unit.va_intrinsics_declared {
        return;
    }
    let one_arg = IrType::Func { ret: Rc::new(IrType::Void), params: vec![Rc::new(IrType::i8_ptr())], varargs: false };
    unit.declare_pending(VA_START_NAME, one_arg.clone(), true);
    unit.declare_pending(VA_END_NAME, one_arg, true);
    let two_arg = IrType::Func { ret: Rc::new(IrType::Void), params: vec![Rc::new(IrType::i8_ptr()), Rc::new(IrType::i8_ptr())], varargs: false };
    unit.declare_pending(VA_COPY_NAME, two_arg, true);
    unit.va_intrinsics_declared = true;
}
