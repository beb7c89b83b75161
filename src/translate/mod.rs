//! AST → IR translator (spec.md §4.2).
//!
//! Grounded on `original_source/src/trans/trans.c`'s top-level
//! `trans_trans_unit`: a two-pass global traversal (pre-register every
//! function definition, then emit bodies and non-extern globals) feeding
//! a recursive-descent lowering of statements and expressions.

pub mod aggregate;
pub mod bitfield;
pub mod decl;
pub mod expr;
pub mod intrinsics;
pub mod state;
pub mod stmt;
pub mod type_lower;

use crate::ast::decl::{Decl, Program};
use crate::diagnostics::Diagnostics;
use crate::ir::function::Function;
use crate::ir::stmt::Stmt;
use crate::ir::types::{IrType, StructId};
use crate::ir::unit::TranslationUnit;
use crate::ir::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Carries everything translation needs beyond the statement/expression
/// tree itself: the growing IR unit, a tag-name → struct-handle cache so
/// `type_lower` only declares each named struct once, and the
/// enum-constant value table the typechecker's scopes don't retain
/// (they record each constant's *type*, not its value).
pub struct Translator<'a> {
    pub unit: TranslationUnit,
    pub struct_cache: HashMap<Rc<str>, StructId>,
    pub enum_consts: HashMap<Rc<str>, i128>,
    pub diags: &'a mut Diagnostics,
}

impl<'a> Translator<'a> {
    pub fn new(diags: &'a mut Diagnostics) -> Self {
        Translator { unit: TranslationUnit::new(), struct_cache: HashMap::new(), enum_consts: HashMap::new(), diags }
    }
}

/// Appends an `Assign` statement binding a fresh temporary to `rhs`,
/// returning that temporary as a `Value::Var` — the one place every
/// submodule goes through to name a computed value (spec.md §3 "IR
/// statement" `Assign{dest: Var, src: Value}`).
pub fn emit_assign(f: &mut Function, ty: IrType, rhs: Value) -> Value {
    let name = f.fresh_temp();
    let dest = Value::var(name, ty, true);
    f.emit(Stmt::Assign { dest: dest.clone(), src: rhs });
    dest
}

pub fn translate_program(prog: &Program, diags: &mut Diagnostics) -> TranslationUnit {
    tracing::debug!(decls = prog.decls.len(), "translating program");
    let mut tr = Translator::new(diags);
    for d in &prog.decls {
        if let Decl::Func(func) = d {
            decl::pre_register_func(&mut tr, func);
        }
    }
    for d in &prog.decls {
        decl::translate_decl(&mut tr, d);
    }
    tracing::trace!(functions = tr.unit.funcs.len(), "translation finished");
    tr.unit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parser::parse_program;
    use crate::ir::printer::print_module;
    use crate::lex::Lexer;
    use crate::typeck::TypeChecker;

    fn compile(src: &str) -> String {
        let tokens = Lexer::new(src, Rc::from("t.c"), None).lex_all();
        let mut diags = Diagnostics::new(false);
        let prog = parse_program(&tokens, &mut diags);
        let mut tc = TypeChecker::new(&mut diags);
        tc.check_program(&prog);
        let unit = translate_program(&prog, &mut diags);
        print_module(&unit, "t.c")
    }

    #[test]
    fn hello_program_emits_ret_i32_0() {
        let ir = compile("int main(void){return 0;}");
        assert!(ir.contains("define i32 @main() {"));
        assert!(ir.contains("ret i32 0"));
    }

    #[test]
    fn self_referential_struct_emits_one_id_struct() {
        let ir = compile("struct N { struct N *next; int v; };\nint main(void){return 0;}");
        assert!(ir.contains("%struct.N = type { %struct.N*, i32 }"));
    }

    #[test]
    fn bare_brace_initializer_on_local_array_stores_each_element() {
        let ir = compile("int main(void){ int a[3] = {1, 2, 3}; return a[0]; }");
        assert!(ir.contains("alloca [3 x i32]"));
        assert!(ir.contains("store i32 1"));
        assert!(ir.contains("store i32 2"));
        assert!(ir.contains("store i32 3"));
    }

    #[test]
    fn excess_initializer_elements_warn_but_still_compile() {
        let tokens = Lexer::new("int main(void){ int a[2] = {1, 2, 3}; return 0; }", Rc::from("t.c"), None).lex_all();
        let mut diags = Diagnostics::new(false);
        let prog = parse_program(&tokens, &mut diags);
        let mut tc = TypeChecker::new(&mut diags);
        tc.check_program(&prog);
        assert!(!diags.has_errors());
        assert!(diags.entries().iter().any(|d| d.message.contains("excess elements")));
    }

    #[test]
    fn code_after_unconditional_return_emits_no_ir() {
        // Nothing after `ret i32 1` should be emitted without an
        // intervening label — a dead `store` there would violate the
        // printed IR's block shape (no instructions follow a terminator
        // except across a label).
        let ir = compile("int f(void){ return 1; int x = 5; return x; }");
        let body = ir.split("define i32 @f()").nth(1).expect("f's body");
        let ret_pos = body.find("ret i32 1").expect("first return");
        let after_ret = &body[ret_pos + "ret i32 1".len()..];
        let stop = after_ret.find('}').unwrap_or(after_ret.len());
        let tail = &after_ret[..stop];
        assert!(!tail.contains("store"), "dead store leaked into the IR: {tail}");
        assert!(!tail.contains("alloca"), "dead alloca leaked into the body after the terminator: {tail}");
    }

    #[test]
    fn goto_into_dead_code_still_resumes_emission_at_the_label() {
        let ir = compile("int f(void){ goto skip; return 1; skip: return 2; }");
        assert!(ir.contains("ret i32 2"));
        assert!(!ir.contains("ret i32 1"));
    }
}
