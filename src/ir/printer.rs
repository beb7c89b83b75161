//! Deterministic textual IR emission (spec.md §4.3).
//!
//! Grounded stylistically on the teacher's `codegen/globals.rs` (string
//! escaping + `writeln!` into a growing buffer) but targeting the LLVM IR
//! surface from spec.md §6 rather than the teacher's own value
//! representation.

use super::function::Function;
use super::stmt::{Label, Stmt};
use super::types::{IrType, StructTable};
use super::unit::TranslationUnit;
use super::value::{Const, Value};
use std::fmt::Write as _;

const DATALAYOUT: &str = "e-m:e-i64:64-f80:128-n8:16:32:64-S128";
const TRIPLE: &str = "x86_64-unknown-linux-gnu";

pub fn print_module(unit: &TranslationUnit, module_id: &str) -> String {
    let mut out = String::new();
    writeln!(out, "; ModuleID = '{}'", module_id).unwrap();
    writeln!(out, "target datalayout = \"{}\"", DATALAYOUT).unwrap();
    writeln!(out, "target triple = \"{}\"", TRIPLE).unwrap();
    out.push('\n');

    for id in unit.structs.ids_in_order() {
        let fields = unit.structs.fields(id);
        let body = if unit.structs.is_defined(id) {
            format!("{{ {} }}", fields.iter().map(|f| print_type(f, &unit.structs)).collect::<Vec<_>>().join(", "))
        } else {
            "opaque".to_string()
        };
        writeln!(out, "{} = type {}", print_struct_ref(id, &unit.structs), body).unwrap();
    }
    if unit.structs.count() > 0 {
        out.push('\n');
    }

    for (name, ty, init) in &unit.decls {
        let rhs = match init {
            Some(v) => print_global_initializer(v, &unit.structs),
            None => format!("zeroinitializer"),
        };
        writeln!(out, "{} = global {} {}", name, print_type(ty, &unit.structs), rhs).unwrap();
    }
    if !unit.decls.is_empty() {
        out.push('\n');
    }

    for decl in &unit.global_decls {
        if decl.is_function {
            if let IrType::Func { ret, params, varargs } = &decl.ty {
                let plist = params.iter().map(|p| print_type(p, &unit.structs)).collect::<Vec<_>>().join(", ");
                let va = if *varargs {
                    if plist.is_empty() { "...".to_string() } else { format!(", ...") }
                } else {
                    String::new()
                };
                writeln!(out, "declare {} {}({}{})", print_type(ret, &unit.structs), decl.name, plist, va).unwrap();
            }
        } else {
            writeln!(out, "{} = external global {}", decl.name, print_type(&decl.ty, &unit.structs)).unwrap();
        }
    }
    if !unit.global_decls.is_empty() {
        out.push('\n');
    }

    for f in &unit.funcs {
        print_function(&mut out, f, &unit.structs);
        out.push('\n');
    }

    out
}

fn print_global_initializer(v: &Value, structs: &StructTable) -> String {
    match v {
        Value::Const { value, .. } => print_const(value, structs),
        other => print_value(other, structs),
    }
}

pub fn print_struct_ref(id: super::types::StructId, structs: &StructTable) -> String {
    format!("%struct.{}", structs.name(id))
}

pub fn print_type(ty: &IrType, structs: &StructTable) -> String {
    match ty {
        IrType::Void => "void".to_string(),
        IrType::I1 => "i1".to_string(),
        IrType::I8 => "i8".to_string(),
        IrType::I16 => "i16".to_string(),
        IrType::I32 => "i32".to_string(),
        IrType::I64 => "i64".to_string(),
        IrType::Float => "float".to_string(),
        IrType::Double => "double".to_string(),
        IrType::X86Fp80 => "x86_fp80".to_string(),
        IrType::Ptr(t) => format!("{}*", print_type(t, structs)),
        IrType::Arr(n, t) => format!("[{} x {}]", n, print_type(t, structs)),
        IrType::Struct(fields) => format!("{{ {} }}", fields.iter().map(|f| print_type(f, structs)).collect::<Vec<_>>().join(", ")),
        IrType::IdStruct(id) => print_struct_ref(*id, structs),
        IrType::Func { ret, params, varargs } => {
            let plist = params.iter().map(|p| print_type(p, structs)).collect::<Vec<_>>().join(", ");
            let va = if *varargs { if plist.is_empty() { "...".into() } else { ", ...".into() } } else { String::new() };
            format!("{} ({}{})", print_type(ret, structs), plist, va)
        }
        IrType::Opaque => "opaque".to_string(),
    }
}

fn print_const(c: &Const, structs: &StructTable) -> String {
    match c {
        Const::Int(v) => v.to_string(),
        Const::Float(v) => format!("{:?}", v),
        Const::Null => "null".to_string(),
        Const::Zero => "zeroinitializer".to_string(),
        Const::Str(s, _) => format!("c\"{}\\00\"", escape_llvm_string(s)),
        Const::Arr(elems) | Const::Struct(elems) => {
            let open = if matches!(c, Const::Arr(_)) { "[" } else { "{" };
            let close = if matches!(c, Const::Arr(_)) { "]" } else { "}" };
            format!("{}{}{}", open, elems.iter().map(|e| print_const(e, structs)).collect::<Vec<_>>().join(", "), close)
        }
        Const::Undef => "undef".to_string(),
    }
}

/// Escapes a string for LLVM IR `c"..."` literals: printable ASCII passes
/// through, everything else becomes `\XX` hex.
pub fn escape_llvm_string(s: &str) -> String {
    let mut out = String::new();
    for b in s.bytes() {
        match b {
            b' '..=b'!' | b'#'..=b'[' | b']'..=b'~' => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{:02X}", b);
            }
        }
    }
    out
}

pub fn print_value(v: &Value, structs: &StructTable) -> String {
    match v {
        Value::Var { name, is_local, .. } => {
            if *is_local {
                format!("%{}", name)
            } else {
                format!("@{}", name)
            }
        }
        Value::Const { value, .. } => print_const(value, structs),
        _ => format!("%{}", inline_expr_placeholder(v)),
    }
}

/// A small number of `Value` variants (`GetElemPtr`, `Convert`, `Binop`,
/// …) only ever appear as the RHS of an `Assign`/`Store`/`Ret` in this
/// printer's input, never nested as a bare operand — the translator
/// always names them via a temporary first. This placeholder exists only
/// so a stray nested expression still prints *something* recognisable
/// instead of panicking.
fn inline_expr_placeholder(v: &Value) -> String {
    format!("<{:?}>", v)
}

/// Renders the right-hand side of an instruction (everything after the
/// `=` for value-producing instructions), dispatching on the `Value`'s
/// own shape.
pub fn print_rhs(v: &Value, structs: &StructTable) -> String {
    match v {
        Value::Binop { op, ty, lhs, rhs } => {
            format!("{} {} {}, {}", op.mnemonic(), print_type(ty, structs), print_value(lhs, structs), print_value_bare(rhs, structs))
        }
        Value::Alloca { ty, n_elems, align, .. } => match n_elems {
            Some(n) => format!("alloca {}, {} {}, align {}", print_type(ty, structs), print_type(&n.ty(), structs), print_value_bare(n, structs), align),
            None => format!("alloca {}, align {}", print_type(ty, structs), align),
        },
        Value::Load { ty, ptr } => format!("load {}, {} {}", print_type(ty, structs), print_type(&ptr.ty(), structs), print_value_bare(ptr, structs)),
        Value::GetElemPtr { ptr_ty, ptr, indices, .. } => {
            let idx = indices
                .iter()
                .map(|i| format!("{} {}", print_type(&i.ty(), structs), print_value_bare(i, structs)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("getelementptr {}, {} {}, {}", print_type(ptr_ty, structs), print_type(&ptr.ty(), structs), print_value_bare(ptr, structs), idx)
        }
        Value::Convert { kind, src_ty, val, dst_ty } => {
            format!("{} {} {} to {}", kind.mnemonic(), print_type(src_ty, structs), print_value_bare(val, structs), print_type(dst_ty, structs))
        }
        Value::ICmp { cond, ty, lhs, rhs } => {
            format!("icmp {} {} {}, {}", cond.mnemonic(), print_type(ty, structs), print_value_bare(lhs, structs), print_value_bare(rhs, structs))
        }
        Value::FCmp { cond, ty, lhs, rhs } => {
            format!("fcmp {} {} {}, {}", cond.mnemonic(), print_type(ty, structs), print_value_bare(lhs, structs), print_value_bare(rhs, structs))
        }
        Value::Phi { ty, incoming } => {
            let pairs = incoming
                .iter()
                .map(|(val, label)| format!("[ {}, %{} ]", print_value_bare(val, structs), label))
                .collect::<Vec<_>>()
                .join(", ");
            format!("phi {} {}", print_type(ty, structs), pairs)
        }
        Value::Select { cond, ty, lhs, rhs } => format!(
            "select i1 {}, {} {}, {} {}",
            print_value_bare(cond, structs),
            print_type(ty, structs),
            print_value_bare(lhs, structs),
            print_type(ty, structs),
            print_value_bare(rhs, structs)
        ),
        Value::Call { func_ty, func, args } => {
            let ret = match func_ty {
                IrType::Func { ret, .. } => (**ret).clone(),
                other => other.clone(),
            };
            let args_str = args
                .iter()
                .map(|a| format!("{} {}", print_type(&a.ty(), structs), print_value_bare(a, structs)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("call {} {}({})", print_type(&ret, structs), print_value_bare(func, structs), args_str)
        }
        Value::VaArg { va_list, arg_ty } => {
            format!("va_arg {} {}, {}", print_type(&va_list.ty(), structs), print_value_bare(va_list, structs), print_type(arg_ty, structs))
        }
        Value::Var { .. } | Value::Const { .. } => print_value(v, structs),
    }
}

/// An operand reference *without* a leading type (used where the
/// surrounding syntax already carries the type, e.g. inside a `getelementptr`
/// index list this function is not used — see [`print_rhs`] for the full
/// `type value` pairs).
fn print_value_bare(v: &Value, structs: &StructTable) -> String {
    print_value(v, structs)
}

fn print_function(out: &mut String, f: &Function, structs: &StructTable) {
    let (ret, params_ty, varargs) = match &f.func_ty {
        IrType::Func { ret, params, varargs } => (ret.clone(), params.clone(), *varargs),
        _ => unreachable!("function's own type is always IrType::Func"),
    };
    let params_str = f
        .params
        .iter()
        .map(|p| format!("{} {}", print_type(&p.ty(), structs), print_value(p, structs)))
        .collect::<Vec<_>>()
        .join(", ");
    let va = if varargs { if params_str.is_empty() { "...".to_string() } else { ", ...".to_string() } } else { String::new() };
    let _ = params_ty;
    writeln!(out, "define {} @{}({}{}) {{", print_type(&ret, structs), f.name, params_str, va).unwrap();
    for stmt in f.prefix.iter().chain(f.body.iter()) {
        print_stmt(out, stmt, structs);
    }
    writeln!(out, "}}").unwrap();
}

fn print_stmt(out: &mut String, stmt: &Stmt, structs: &StructTable) {
    match stmt {
        Stmt::Label(Label(name)) => {
            writeln!(out, "{}:", name).unwrap();
        }
        Stmt::Expr(v) => {
            writeln!(out, "  {}", print_rhs(v, structs)).unwrap();
        }
        Stmt::Ret { ty, val } => match val {
            Some(v) => {
                writeln!(out, "  ret {} {}", print_type(ty, structs), print_value(v, structs)).unwrap();
            }
            None => {
                writeln!(out, "  ret void").unwrap();
            }
        },
        Stmt::Br { cond, targets } => match (cond, targets.as_slice()) {
            (Some(c), [t, f]) => {
                writeln!(out, "  br i1 {}, label %{}, label %{}", print_value(c, structs), t.0, f.0).unwrap();
            }
            (None, [t]) => {
                writeln!(out, "  br label %{}", t.0).unwrap();
            }
            _ => unreachable!("Br always has either one unconditional or two conditional targets"),
        },
        Stmt::Switch { expr, default, cases } => {
            let arms = cases.iter().map(|(v, l)| format!("{} {}, label %{}", print_type(&v.ty(), structs), print_value(v, structs), l.0)).collect::<Vec<_>>().join(" ");
            writeln!(out, "  switch {} {}, label %{} [ {} ]", print_type(&expr.ty(), structs), print_value(expr, structs), default.0, arms).unwrap();
        }
        Stmt::IndirBr { addr, possible } => {
            let labels = possible.iter().map(|l| format!("label %{}", l.0)).collect::<Vec<_>>().join(", ");
            writeln!(out, "  indirectbr i8* {}, [ {} ]", print_value(addr, structs), labels).unwrap();
        }
        Stmt::Assign { dest, src } => {
            writeln!(out, "  {} = {}", print_value(dest, structs), print_rhs(src, structs)).unwrap();
        }
        Stmt::Store { ty, val, ptr } => {
            writeln!(out, "  store {} {}, {} {}", print_type(ty, structs), print_value(val, structs), print_type(&ptr.ty(), structs), print_value(ptr, structs)).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::function::Function;
    use crate::ir::stmt::Label;
    use std::rc::Rc;

    #[test]
    fn hello_program_prints_ret_i32_0() {
        let mut unit = TranslationUnit::new();
        let mut f = Function::new("main", IrType::Func { ret: Rc::new(IrType::I32), params: vec![], varargs: false }, vec![]);
        f.emit(Stmt::Label(Label(Rc::from("entry"))));
        f.emit(Stmt::Ret { ty: IrType::I32, val: Some(Value::int(IrType::I32, 0)) });
        unit.funcs.push(f);
        let text = print_module(&unit, "t.c");
        assert!(text.contains("define i32 @main() {"));
        assert!(text.contains("ret i32 0"));
        assert!(text.contains("target triple = \"x86_64-unknown-linux-gnu\""));
    }

    #[test]
    fn identical_strings_print_one_global() {
        let mut unit = TranslationUnit::new();
        unit.intern_string("hi");
        unit.intern_string("hi");
        let text = print_module(&unit, "t.c");
        assert_eq!(text.matches("= global").count(), 1);
    }
}
