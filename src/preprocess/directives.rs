//! Directive-line parsing (spec.md §4.1 "Directive dispatch").
//!
//! `original_source/src/lex/cpp_directives.c` stubs every directive but
//! `#include` (`return CCC_ESYNTAX`); spec.md §9 is explicit that this is a
//! placeholder to replace, not a behaviour to imitate, so every handler
//! here does real work.

use super::conditional::ConstExprEval;
use super::include::IncludeForm;
use super::macros::{Arity, Macro, MacroTable, Params};
use crate::diagnostics::Diagnostics;
use crate::mark::SourceMark;
use crate::token::{Token, TokenKind};
use std::rc::Rc;

fn skip_ws(line: &[Token], mut i: usize) -> usize {
    while i < line.len() && line[i].is_whitespace() {
        i += 1;
    }
    i
}

/// The directive name token, if `line` (tokens after the leading `#`,
/// still including whitespace) starts with one, and the index just past it.
pub fn directive_name(line: &[Token]) -> Option<(&str, usize)> {
    let i = skip_ws(line, 0);
    let t = line.get(i)?;
    let name = t.ident_name()?;
    Some((name, i + 1))
}

/// `#define NAME body` / `#define NAME(params) body`.
pub fn parse_define(line: &[Token], diags: &mut Diagnostics) -> Option<Macro> {
    let i = skip_ws(line, 0);
    let name_tok = line.get(i)?;
    let name: Rc<str> = match name_tok.ident_name() {
        Some(s) => Rc::from(s),
        None => {
            diags.error(Some(name_tok.mark.clone()), "macro names must be identifiers");
            return None;
        }
    };
    let mut j = i + 1;
    // Function-like iff '(' immediately follows the name with no space.
    if line.get(j).map(|t| t.kind) == Some(TokenKind::LParen) {
        j += 1;
        let (params, next) = parse_param_list(line, j, diags)?;
        let body_start = skip_ws(line, next);
        let body = trim_body(&line[body_start..]);
        return Some(Macro { name, arity: Arity::FunctionLike(params), body });
    }
    let body_start = skip_ws(line, j);
    let body = trim_body(&line[body_start..]);
    Some(Macro { name, arity: Arity::ObjectLike, body })
}

fn parse_param_list(line: &[Token], mut i: usize, diags: &mut Diagnostics) -> Option<(Params, usize)> {
    let mut names = Vec::new();
    let mut variadic = false;
    i = skip_ws(line, i);
    if line.get(i).map(|t| t.kind) == Some(TokenKind::RParen) {
        return Some((Params { names, variadic }, i + 1));
    }
    loop {
        i = skip_ws(line, i);
        match line.get(i) {
            Some(t) if t.kind == TokenKind::Ellipsis => {
                variadic = true;
                i += 1;
            }
            Some(t) => {
                let Some(name) = t.ident_name() else {
                    diags.error(Some(t.mark.clone()), "expected parameter name");
                    return None;
                };
                names.push(Rc::from(name));
                i += 1;
            }
            None => {
                diags.error(None, "unterminated macro parameter list");
                return None;
            }
        }
        i = skip_ws(line, i);
        match line.get(i).map(|t| t.kind) {
            Some(TokenKind::Comma) if !variadic => {
                i += 1;
            }
            Some(TokenKind::RParen) => return Some((Params { names, variadic }, i + 1)),
            _ => {
                diags.error(None, "expected ',' or ')' in macro parameter list");
                return None;
            }
        }
    }
}

/// Strips a leading/trailing whitespace run from a macro body (spec.md §3:
/// body tokens never include the surrounding horizontal whitespace).
fn trim_body(toks: &[Token]) -> Vec<Token> {
    let start = toks.iter().position(|t| !t.is_whitespace()).unwrap_or(toks.len());
    let end = toks.iter().rposition(|t| !t.is_whitespace()).map(|i| i + 1).unwrap_or(start);
    toks[start..end].to_vec()
}

/// `#undef NAME`.
pub fn parse_undef<'a>(line: &'a [Token], diags: &mut Diagnostics) -> Option<&'a str> {
    let i = skip_ws(line, 0);
    let t = line.get(i)?;
    match t.ident_name() {
        Some(name) => Some(name),
        None => {
            diags.error(Some(t.mark.clone()), "#undef requires an identifier");
            None
        }
    }
}

/// `#include "path"` / `#include <path>`. The angle-bracket form isn't one
/// lexer token (`<`, identifiers, `.`, `/`, `>`), so its spelling is
/// reassembled from the punctuator/identifier run between the brackets.
pub fn parse_include_target(line: &[Token], diags: &mut Diagnostics) -> Option<(String, IncludeForm)> {
    let i = skip_ws(line, 0);
    match line.get(i) {
        Some(t) if t.kind == TokenKind::Str => {
            let name = match &t.payload {
                crate::token::Payload::Str(s) => s.to_string(),
                _ => unreachable!(),
            };
            Some((name, IncludeForm::Quoted))
        }
        Some(t) if t.kind == TokenKind::Lt => {
            let mut j = i + 1;
            let mut name = String::new();
            loop {
                match line.get(j) {
                    Some(t) if t.kind == TokenKind::Gt => return Some((name, IncludeForm::Angled)),
                    Some(t) if !t.is_whitespace() => {
                        name.push_str(&t.spelling());
                        j += 1;
                    }
                    Some(_) => j += 1,
                    None => {
                        diags.error(Some(t.mark.clone()), "missing terminating '>' in #include");
                        return None;
                    }
                }
            }
        }
        Some(t) => {
            diags.error(Some(t.mark.clone()), "#include expects \"FILENAME\" or <FILENAME>");
            None
        }
        None => {
            diags.error(None, "#include expects a filename");
            None
        }
    }
}

/// `#line number "filename"` — rewrites the line/filename the *next*
/// physical line reports. Returns `(line, Some(filename))`.
pub fn parse_line_directive(line: &[Token], diags: &mut Diagnostics) -> Option<(u32, Option<Rc<str>>)> {
    let i = skip_ws(line, 0);
    let num_tok = line.get(i)?;
    let n = match &num_tok.payload {
        crate::token::Payload::Int { value, .. } => *value as u32,
        _ => {
            diags.error(Some(num_tok.mark.clone()), "#line requires a digit sequence");
            return None;
        }
    };
    let j = skip_ws(line, i + 1);
    let filename = match line.get(j) {
        Some(t) if t.kind == TokenKind::Str => match &t.payload {
            crate::token::Payload::Str(s) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    };
    Some((n, filename))
}

/// `#error`/`#warning` message text: the raw spelling of the rest of the
/// line, whitespace-collapsed like stringification.
pub fn directive_message(line: &[Token]) -> String {
    let mut s = String::new();
    let mut prev_space = true;
    for t in line {
        if t.is_whitespace() {
            if !prev_space {
                s.push(' ');
            }
            prev_space = true;
            continue;
        }
        s.push_str(&t.spelling());
        prev_space = false;
    }
    s.trim().to_string()
}

/// Evaluates the already-macro-expanded tokens of an `#if`/`#elif` line,
/// first resolving `defined X` / `defined(X)` against the *unexpanded*
/// identifier (spec.md §4.1: `defined` inspects the macro table directly,
/// never expands its own operand).
pub fn resolve_defined(line: &[Token], macros: &MacroTable) -> Vec<Token> {
    let mut out = Vec::with_capacity(line.len());
    let mut i = 0;
    while i < line.len() {
        let t = &line[i];
        if t.ident_name() == Some("defined") {
            let mut j = skip_ws(line, i + 1);
            let (name, after) = if line.get(j).map(|t| t.kind) == Some(TokenKind::LParen) {
                j = skip_ws(line, j + 1);
                let name = line.get(j).and_then(|t| t.ident_name());
                let after = skip_ws(line, j + 1);
                let after = if line.get(after).map(|t| t.kind) == Some(TokenKind::RParen) { after + 1 } else { after };
                (name, after)
            } else {
                (line.get(j).and_then(|t| t.ident_name()), j + 1)
            };
            let defined = name.map(|n| macros.is_defined(n)).unwrap_or(false);
            out.push(Token::with_payload(
                TokenKind::IntLit,
                t.mark.clone(),
                crate::token::Payload::Int { value: defined as i128, suffix: Default::default() },
            ));
            i = after;
            continue;
        }
        out.push(t.clone());
        i += 1;
    }
    out
}

/// Evaluates a fully macro/`defined`-resolved `#if`/`#elif` condition line.
pub fn eval_condition(line: &[Token], mark: SourceMark, diags: &mut Diagnostics) -> bool {
    let mut toks: Vec<Token> = line.iter().filter(|t| !t.is_whitespace()).cloned().collect();
    toks.push(Token::new(TokenKind::Eof, mark.clone()));
    match ConstExprEval::new(&toks).eval() {
        Ok(v) => v != 0,
        Err(msg) => {
            diags.error(Some(mark), format!("invalid #if expression: {}", msg));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::Lexer;

    fn lex_line(src: &str) -> Vec<Token> {
        let mut toks = Lexer::new(src, Rc::from("t.c"), None).lex_all();
        toks.retain(|t| t.kind != TokenKind::Eof && t.kind != TokenKind::Newline);
        toks
    }

    #[test]
    fn parses_object_like_define() {
        let line = lex_line("WIDTH 80");
        let mut diags = Diagnostics::new(false);
        let m = parse_define(&line, &mut diags).unwrap();
        assert_eq!(m.name.as_ref(), "WIDTH");
        assert!(matches!(m.arity, Arity::ObjectLike));
        assert_eq!(m.body.len(), 1);
    }

    #[test]
    fn parses_function_like_define_with_variadic() {
        let line = lex_line("LOG(fmt, ...) printf(fmt, __VA_ARGS__)");
        let mut diags = Diagnostics::new(false);
        let m = parse_define(&line, &mut diags).unwrap();
        match &m.arity {
            Arity::FunctionLike(p) => {
                assert_eq!(p.names, vec![Rc::from("fmt")]);
                assert!(p.variadic);
            }
            _ => panic!("expected function-like macro"),
        }
    }

    #[test]
    fn parses_quoted_include() {
        let line = lex_line("\"foo.h\"");
        let mut diags = Diagnostics::new(false);
        let (name, form) = parse_include_target(&line, &mut diags).unwrap();
        assert_eq!(name, "foo.h");
        assert_eq!(form, IncludeForm::Quoted);
    }

    #[test]
    fn parses_angled_include() {
        let line = lex_line("<sys/types.h>");
        let mut diags = Diagnostics::new(false);
        let (name, form) = parse_include_target(&line, &mut diags).unwrap();
        assert_eq!(name, "sys/types.h");
        assert_eq!(form, IncludeForm::Angled);
    }

    #[test]
    fn resolve_defined_handles_both_syntaxes() {
        let mut macros = MacroTable::new();
        macros.define(Macro { name: Rc::from("FOO"), arity: Arity::ObjectLike, body: vec![] }).unwrap();
        let line = lex_line("defined FOO && defined(BAR)");
        let resolved = resolve_defined(&line, &macros);
        let condition = eval_condition(&resolved, SourceMark::synthetic(), &mut Diagnostics::new(false));
        assert!(!condition); // FOO defined, BAR is not -> 1 && 0
    }
}
