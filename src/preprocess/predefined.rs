//! Predefined macro table (spec.md §6 "Predefined macros").

use super::macros::{Arity, Macro, MacroTable};
use crate::mark::SourceMark;
use crate::token::{Payload, Token, TokenKind};
use std::rc::Rc;

fn int_macro(name: &str, value: i128) -> Macro {
    Macro {
        name: Rc::from(name),
        arity: Arity::ObjectLike,
        body: vec![Token::with_payload(
            TokenKind::IntLit,
            SourceMark::built_in(),
            Payload::Int { value, suffix: Default::default() },
        )],
    }
}

fn str_macro(name: &str, value: &str) -> Macro {
    Macro {
        name: Rc::from(name),
        arity: Arity::ObjectLike,
        body: vec![Token::with_payload(
            TokenKind::Str,
            SourceMark::built_in(),
            Payload::Str(Rc::from(value)),
        )],
    }
}

/// An `#define NAME` with an empty body (still "defined" for `#ifdef`/`defined`).
fn empty_macro(name: &str) -> Macro {
    Macro { name: Rc::from(name), arity: Arity::ObjectLike, body: Vec::new() }
}

/// Builds the baseline macro table a translation unit starts with, before
/// any `-D` command-line definitions or in-file `#define`s are applied.
/// Target-identifying macros are fixed to the x86-64 Linux ELF target
/// described in spec.md §6; there is no cross-compilation switch.
pub fn predefined_macros() -> MacroTable {
    let mut table = MacroTable::new();
    let defs = [
        int_macro("__STDC__", 1),
        int_macro("__STDC_VERSION__", 201112),
        int_macro("__STDC_HOSTED__", 1),
        int_macro("__STDC_UTF_16__", 1),
        int_macro("__STDC_UTF_32__", 1),
        int_macro("__STDC_NO_ATOMICS__", 1),
        int_macro("__STDC_NO_COMPLEX__", 1),
        int_macro("__STDC_NO_THREADS__", 1),
        int_macro("__STDC_NO_VLA__", 1),
        empty_macro("__amd64__"),
        empty_macro("__x86_64__"),
        empty_macro("__linux__"),
        empty_macro("__gnu_linux__"),
        empty_macro("__unix__"),
        empty_macro("_LP64"),
        empty_macro("__LP64__"),
        empty_macro("__ELF__"),
    ];
    for m in defs {
        table.define(m).expect("predefined macros never collide");
    }
    table
}

/// `__FUNCTION__` is defined contextually (per translated function) rather
/// than once for the whole unit; callers push/pop it as they enter/leave a
/// function body.
pub fn function_name_macro(name: &str) -> Macro {
    str_macro("__FUNCTION__", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdc_version_is_c11() {
        let table = predefined_macros();
        let m = table.get("__STDC_VERSION__").unwrap();
        match &m.body[0].payload {
            Payload::Int { value, .. } => assert_eq!(*value, 201112),
            _ => panic!("expected int payload"),
        }
    }

    #[test]
    fn target_macros_are_defined_but_empty() {
        let table = predefined_macros();
        assert!(table.is_defined("__x86_64__"));
        assert!(table.get("__x86_64__").unwrap().body.is_empty());
    }
}
