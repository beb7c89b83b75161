//! Macro expansion: the Prosser/Dave-Prosser hide-set algorithm
//! (spec.md §4.1 "Expansion algorithm"), plus stringification (`#`) and
//! token pasting (`##`).

use super::macros::{Arity, Macro, MacroTable, Params};
use crate::diagnostics::Diagnostics;
use crate::lex::Lexer;
use crate::token::{HideSet, Payload, Token, TokenKind};
use std::collections::VecDeque;
use std::rc::Rc;

/// Expands a whole (directive-free) token stream to completion.
///
/// This is the driver loop around the Prosser `expand` step: tokens that
/// are substitutions get pushed back to the front of the work queue so
/// they are rescanned (which is what makes nested/indirect macro calls
/// and argument pre-expansion work), everything else is emitted as-is.
pub fn expand_tokens(tokens: Vec<Token>, macros: &MacroTable, diags: &mut Diagnostics) -> Vec<Token> {
    let mut queue: VecDeque<Token> = tokens.into();
    let mut output = Vec::new();
    while let Some(t) = queue.pop_front() {
        if !t.kind.is_ident_like() {
            output.push(t);
            continue;
        }
        let Some(name) = macro_name_of(&t) else {
            output.push(t);
            continue;
        };
        if t.hideset.contains(name) {
            output.push(t);
            continue;
        }
        let Some(m) = macros.get(name).cloned() else {
            output.push(t);
            continue;
        };
        tracing::trace!(macro_name = name, "expanding macro");
        match &m.arity {
            Arity::ObjectLike => {
                let hs = t.hideset.with(Rc::from(name));
                let subst = substitute(&m, &[], &hs, macros, diags);
                prepend(&mut queue, subst);
            }
            Arity::FunctionLike(params) => {
                match try_collect_call(&mut queue) {
                    Some((args, rparen)) => {
                        let Some(bound) = bind_args(&m.name, params, args, diags) else {
                            output.push(t);
                            continue;
                        };
                        let hs = t.hideset.intersect(&rparen.hideset).with(Rc::from(name));
                        let subst = substitute(&m, &bound, &hs, macros, diags);
                        prepend(&mut queue, subst);
                    }
                    None => output.push(t),
                }
            }
        }
    }
    output
}

/// Streaming counterpart to [`expand_tokens`] for the top-level file scan,
/// where macro-table mutations (`#define`/`#undef`) must interleave with
/// the tokens being expanded instead of all happening before a single
/// batch expansion runs (matching `cpp_expand`'s per-token `ht_lookup` in
/// the same pass that processes directives). A function-like macro call
/// may not have its closing `)` yet when a physical line ends — `feed_line`
/// parks it and resumes once more tokens arrive.
pub struct StreamExpander {
    pending: VecDeque<Token>,
}

impl StreamExpander {
    pub fn new() -> Self {
        StreamExpander { pending: VecDeque::new() }
    }

    /// Feeds one more physical line's tokens in and drains everything that
    /// can be fully expanded against `macros`'s current state into `output`.
    pub fn feed_line(&mut self, line: Vec<Token>, macros: &MacroTable, diags: &mut Diagnostics, output: &mut Vec<Token>) {
        self.pending.extend(line);
        self.drain(macros, diags, output);
    }

    fn drain(&mut self, macros: &MacroTable, diags: &mut Diagnostics, output: &mut Vec<Token>) {
        while let Some(t) = self.pending.pop_front() {
            if !t.kind.is_ident_like() {
                output.push(t);
                continue;
            }
            let Some(name) = macro_name_of(&t) else {
                output.push(t);
                continue;
            };
            if t.hideset.contains(name) {
                output.push(t);
                continue;
            }
            let Some(m) = macros.get(name).cloned() else {
                output.push(t);
                continue;
            };
            tracing::trace!(macro_name = name, "expanding macro");
            match &m.arity {
                Arity::ObjectLike => {
                    let hs = t.hideset.with(Rc::from(name));
                    let subst = substitute(&m, &[], &hs, macros, diags);
                    prepend(&mut self.pending, subst);
                }
                Arity::FunctionLike(params) => match try_collect_call_resumable(&mut self.pending) {
                    CallCollect::Complete(args, rparen) => {
                        let Some(bound) = bind_args(&m.name, params, args, diags) else {
                            output.push(t);
                            continue;
                        };
                        let hs = t.hideset.intersect(&rparen.hideset).with(Rc::from(name));
                        let subst = substitute(&m, &bound, &hs, macros, diags);
                        prepend(&mut self.pending, subst);
                    }
                    CallCollect::NoCall => output.push(t),
                    CallCollect::Incomplete => {
                        // The call might continue on the next line; park the
                        // macro name token back in front and wait.
                        self.pending.push_front(t);
                        break;
                    }
                },
            }
        }
    }

    /// Called once the whole file (and everything it `#include`s) has been
    /// scanned: anything still parked is a function-like call whose `)`
    /// never arrived, which is a real error now that no more input is
    /// coming.
    pub fn finish(mut self, diags: &mut Diagnostics) {
        if let Some(t) = self.pending.pop_front() {
            if let Some(name) = macro_name_of(&t) {
                diags.error(Some(t.mark.clone()), format!("unterminated invocation of function-like macro \"{}\"", name));
            }
        }
    }
}

enum CallCollect {
    NoCall,
    Incomplete,
    Complete(Vec<Vec<Token>>, Token),
}

/// Like [`try_collect_call`], but treats "ran out of tokens before the
/// closing `)`" as a resumable condition rather than an error: every token
/// popped off `queue` is restored (in order) before returning `Incomplete`,
/// so the caller can retry once more tokens have arrived.
fn try_collect_call_resumable(queue: &mut VecDeque<Token>) -> CallCollect {
    match queue.iter().find(|t| !t.is_whitespace()) {
        None => return CallCollect::Incomplete,
        Some(t) if t.kind != TokenKind::LParen => return CallCollect::NoCall,
        _ => {}
    }

    let mut consumed: Vec<Token> = Vec::new();
    while queue.front().map(|t| t.is_whitespace()) == Some(true) {
        consumed.push(queue.pop_front().unwrap());
    }
    consumed.push(queue.pop_front().unwrap()); // the '('

    let mut args: Vec<Vec<Token>> = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut depth = 0usize;
    loop {
        let Some(t) = queue.pop_front() else {
            for tok in consumed.into_iter().rev() {
                queue.push_front(tok);
            }
            return CallCollect::Incomplete;
        };
        consumed.push(t.clone());
        match t.kind {
            TokenKind::LParen => {
                depth += 1;
                current.push(t);
            }
            TokenKind::RParen if depth == 0 => {
                args.push(current);
                return CallCollect::Complete(args, t);
            }
            TokenKind::RParen => {
                depth -= 1;
                current.push(t);
            }
            TokenKind::Comma if depth == 0 => {
                args.push(std::mem::take(&mut current));
            }
            _ => current.push(t),
        }
    }
}

fn macro_name_of(t: &Token) -> Option<&str> {
    if t.kind == TokenKind::Id {
        return t.ident_name();
    }
    t.kind.punct_spelling().filter(|_| t.kind.is_ident_like())
}

fn prepend(queue: &mut VecDeque<Token>, tokens: Vec<Token>) {
    for tok in tokens.into_iter().rev() {
        queue.push_front(tok);
    }
}

/// A bound macro argument: its raw (unexpanded) tokens, and (lazily) its
/// expanded form, used respectively by `#` and by plain substitution.
struct BoundArg {
    raw: Vec<Token>,
}

/// Looks for `(` (skipping space/newline) without consuming anything if
/// it isn't there; on success, consumes through the matching `)` and
/// returns the comma-split argument list plus the `)` token (needed for
/// the hide-set intersection rule).
fn try_collect_call(queue: &mut VecDeque<Token>) -> Option<(Vec<Vec<Token>>, Token)> {
    let has_paren = queue.iter().find(|t| !t.is_whitespace()).map(|t| t.kind) == Some(TokenKind::LParen);
    if !has_paren {
        return None;
    }
    while queue.front().map(|t| t.is_whitespace()) == Some(true) {
        queue.pop_front();
    }
    queue.pop_front(); // the '('

    let mut args: Vec<Vec<Token>> = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    let mut depth = 0usize;
    let rparen;
    loop {
        let t = queue.pop_front().expect("unterminated macro invocation");
        match t.kind {
            TokenKind::LParen => {
                depth += 1;
                current.push(t);
            }
            TokenKind::RParen if depth == 0 => {
                rparen = t;
                break;
            }
            TokenKind::RParen => {
                depth -= 1;
                current.push(t);
            }
            TokenKind::Comma if depth == 0 => {
                args.push(std::mem::take(&mut current));
            }
            _ => current.push(t),
        }
    }
    // The token between the last comma (or the opening paren) and the
    // closing paren is always one more argument, even when empty — an
    // empty argument list (`FOO()`) is distinguished from it by the
    // caller, which knows whether the macro itself takes any parameters.
    args.push(current);
    Some((args, rparen))
}

/// Binds raw argument token streams to parameter names, expanding the
/// variadic tail (if any) into one combined argument. Returns `None`
/// (after logging) on an argument-count mismatch.
fn bind_args(
    macro_name: &str,
    params: &Params,
    mut args: Vec<Vec<Token>>,
    diags: &mut Diagnostics,
) -> Option<Vec<(Rc<str>, BoundArg)>> {
    let named = params.names.len();
    // `FOO()` invoking a macro declared with zero parameters passes zero
    // arguments, not one empty one (C11 §6.10.3 footnote 165-ish
    // behaviour; matches every real preprocessor).
    if named == 0 && !params.variadic && args.len() == 1 && args[0].iter().all(|t| t.is_whitespace()) {
        args.clear();
    }
    if params.variadic {
        if args.len() < named {
            diags.error(None, format!("macro \"{}\" requires at least {} arguments", macro_name, named));
            return None;
        }
        let varargs: Vec<Token> = args
            .split_off(named)
            .into_iter()
            .enumerate()
            .flat_map(|(i, toks)| {
                if i == 0 {
                    toks
                } else {
                    let mut v = vec![Token::new(TokenKind::Comma, toks.first().map(|t| t.mark.clone()).unwrap_or_else(crate::mark::SourceMark::synthetic))];
                    v.extend(toks);
                    v
                }
            })
            .collect();
        let mut bound: Vec<(Rc<str>, BoundArg)> = params
            .names
            .iter()
            .cloned()
            .zip(args.into_iter().map(|raw| BoundArg { raw }))
            .collect();
        bound.push((Rc::from("__VA_ARGS__"), BoundArg { raw: varargs }));
        Some(bound)
    } else {
        if args.len() != named {
            diags.error(
                None,
                format!(
                    "macro \"{}\" passed {} arguments, but takes {}",
                    macro_name,
                    args.len(),
                    named
                ),
            );
            return None;
        }
        Some(
            params
                .names
                .iter()
                .cloned()
                .zip(args.into_iter().map(|raw| BoundArg { raw }))
                .collect(),
        )
    }
}

/// `subst` from the Prosser algorithm: walks the macro body handling `#`,
/// `##`, and plain parameter references, then hide-set-stamps the whole
/// result (`hsadd`).
fn substitute(
    m: &Macro,
    args: &[(Rc<str>, BoundArg)],
    hs: &HideSet,
    macros: &MacroTable,
    diags: &mut Diagnostics,
) -> Vec<Token> {
    let body = &m.body;
    let mut out: Vec<Token> = Vec::new();
    let mut i = 0usize;
    while i < body.len() {
        let t = &body[i];

        if t.kind == TokenKind::Hash {
            if let Some((idx, next_i)) = next_param_ref(body, i + 1, args) {
                let raw = &args[idx].1.raw;
                out.push(stringify(raw, t));
                i = next_i;
                continue;
            }
        }

        if t.kind == TokenKind::HashHash {
            // `## T` or `## param`: glue onto the last output token.
            if let Some((idx, next_i)) = next_param_ref(body, i + 1, args) {
                let raw = &args[idx].1.raw;
                if raw.is_empty() {
                    i = next_i;
                } else {
                    glue_onto(&mut out, raw.clone());
                    i = next_i;
                }
                continue;
            }
            if i + 1 < body.len() && !body[i + 1].is_whitespace() {
                glue_onto(&mut out, vec![body[i + 1].clone()]);
                i += 2;
                continue;
            }
        }

        if let Some((idx, next_i)) = next_param_ref(body, i, args) {
            // Look ahead (past whitespace) for `##` to decide expansion.
            let mut j = next_i;
            while j < body.len() && body[j].is_whitespace() {
                j += 1;
            }
            let followed_by_paste = j < body.len() && body[j].kind == TokenKind::HashHash;
            let raw = &args[idx].1.raw;
            if followed_by_paste {
                out.extend(raw.iter().cloned());
            } else {
                let expanded = expand_tokens(raw.clone(), macros, diags);
                out.extend(expanded);
            }
            i = next_i;
            continue;
        }

        out.push(t.clone());
        i += 1;
    }
    hsadd(hs, out)
}

fn next_param_ref(body: &[Token], pos: usize, args: &[(Rc<str>, BoundArg)]) -> Option<(usize, usize)> {
    let t = body.get(pos)?;
    let name = t.ident_name()?;
    let idx = args.iter().position(|(n, _)| n.as_ref() == name)?;
    Some((idx, pos + 1))
}

/// Stringify raw argument tokens per C11 §6.10.3.2: a leading/trailing
/// whitespace run is dropped, internal whitespace runs collapse to one
/// space, and each token's *spelling* (not its expansion) is used.
fn stringify(raw: &[Token], hash_tok: &Token) -> Token {
    let mut s = String::new();
    let mut prev_was_space = true; // suppress leading space
    for t in raw {
        if t.is_whitespace() {
            if !prev_was_space {
                s.push(' ');
            }
            prev_was_space = true;
            continue;
        }
        s.push_str(&t.spelling());
        prev_was_space = false;
    }
    while s.ends_with(' ') {
        s.pop();
    }
    Token::with_payload(TokenKind::Str, hash_tok.mark.clone(), Payload::Str(Rc::from(s.as_str())))
}

/// Pastes the textual forms of the last output token and the first
/// (non-whitespace) new token, re-lexing the result; the paste must
/// produce exactly one token (spec.md §4.1, §8 "paste yielding multiple
/// tokens" is an error).
fn glue_onto(out: &mut Vec<Token>, mut new_tokens: Vec<Token>) {
    while matches!(out.last(), Some(t) if t.is_whitespace()) {
        out.pop();
    }
    let Some(left) = out.pop() else {
        out.extend(new_tokens);
        return;
    };
    let first_idx = new_tokens.iter().position(|t| !t.is_whitespace());
    let Some(first_idx) = first_idx else {
        out.push(left);
        return;
    };
    let right = new_tokens.remove(first_idx);
    let glued_text = format!("{}{}", left.spelling(), right.spelling());
    let mut lexer = Lexer::new(&glued_text, Rc::from(left.mark.file()), None);
    let mut toks = lexer.lex_all();
    toks.retain(|t| t.kind != TokenKind::Eof);
    if toks.len() != 1 {
        // Pasting did not produce exactly one token: a syntax error per
        // spec.md §7/§8. We still emit both pieces so the caller sees
        // *something* rather than silently dropping text.
        out.push(left);
        out.push(right);
    } else {
        let mut glued = toks.remove(0);
        glued.mark = left.mark.clone();
        out.push(glued);
    }
    out.extend(new_tokens);
}

fn hsadd(hs: &HideSet, tokens: Vec<Token>) -> Vec<Token> {
    tokens
        .into_iter()
        .map(|mut t| {
            t.hideset = t.hideset.union(hs);
            t
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::SourceMark;

    fn ident(name: &str) -> Token {
        Token::with_payload(TokenKind::Id, SourceMark::synthetic(), Payload::Ident(Rc::from(name)))
    }

    fn intlit(v: i128) -> Token {
        Token::with_payload(
            TokenKind::IntLit,
            SourceMark::synthetic(),
            Payload::Int {
                value: v,
                suffix: Default::default(),
            },
        )
    }

    #[test]
    fn object_like_expansion() {
        let mut macros = MacroTable::new();
        macros
            .define(Macro {
                name: Rc::from("FOO"),
                arity: Arity::ObjectLike,
                body: vec![intlit(42)],
            })
            .unwrap();
        let mut diags = Diagnostics::new(false);
        let out = expand_tokens(vec![ident("FOO")], &macros, &mut diags);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, TokenKind::IntLit);
    }

    #[test]
    fn self_referential_object_macro_does_not_loop() {
        let mut macros = MacroTable::new();
        macros
            .define(Macro {
                name: Rc::from("FOO"),
                arity: Arity::ObjectLike,
                body: vec![ident("FOO")],
            })
            .unwrap();
        let mut diags = Diagnostics::new(false);
        let out = expand_tokens(vec![ident("FOO")], &macros, &mut diags);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ident_name(), Some("FOO"));
    }

    #[test]
    fn stringify_uses_raw_tokens() {
        // #define CAT(a,b) a##b
        // #define STR(x) #x
        // STR(CAT(foo,bar)) -> "CAT(foo,bar)"
        let mut macros = MacroTable::new();
        macros
            .define(Macro {
                name: Rc::from("CAT"),
                arity: Arity::FunctionLike(Params {
                    names: vec![Rc::from("a"), Rc::from("b")],
                    variadic: false,
                }),
                body: vec![ident("a"), Token::new(TokenKind::HashHash, SourceMark::synthetic()), ident("b")],
            })
            .unwrap();
        macros
            .define(Macro {
                name: Rc::from("STR"),
                arity: Arity::FunctionLike(Params {
                    names: vec![Rc::from("x")],
                    variadic: false,
                }),
                body: vec![Token::new(TokenKind::Hash, SourceMark::synthetic()), ident("x")],
            })
            .unwrap();

        let input = vec![
            ident("STR"),
            Token::new(TokenKind::LParen, SourceMark::synthetic()),
            ident("CAT"),
            Token::new(TokenKind::LParen, SourceMark::synthetic()),
            ident("foo"),
            Token::new(TokenKind::Comma, SourceMark::synthetic()),
            ident("bar"),
            Token::new(TokenKind::RParen, SourceMark::synthetic()),
            Token::new(TokenKind::RParen, SourceMark::synthetic()),
        ];
        let mut diags = Diagnostics::new(false);
        let out = expand_tokens(input, &macros, &mut diags);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, TokenKind::Str);
        match &out[0].payload {
            Payload::Str(s) => assert_eq!(s.as_ref(), "CAT(foo,bar)"),
            _ => panic!("expected string payload"),
        }
    }

    #[test]
    fn stream_expander_sees_redefinitions_between_lines() {
        // #define X 1 / int a = X; / #undef X / #define X 2 / int b = X;
        // must expand `a` against X=1 and `b` against X=2, which only
        // holds if each line is expanded against the table's state at
        // that point in the scan rather than all at once at the end.
        let mut macros = MacroTable::new();
        let mut diags = Diagnostics::new(false);
        let mut expander = StreamExpander::new();
        let mut out = Vec::new();

        macros
            .define(Macro {
                name: Rc::from("X"),
                arity: Arity::ObjectLike,
                body: vec![intlit(1)],
            })
            .unwrap();
        expander.feed_line(vec![ident("a"), ident("X")], &macros, &mut diags, &mut out);

        macros.undef("X");
        macros
            .define(Macro {
                name: Rc::from("X"),
                arity: Arity::ObjectLike,
                body: vec![intlit(2)],
            })
            .unwrap();
        expander.feed_line(vec![ident("b"), ident("X")], &macros, &mut diags, &mut out);
        expander.finish(&mut diags);

        assert!(!diags.has_errors());
        let values: Vec<i128> = out
            .iter()
            .filter_map(|t| match &t.payload {
                Payload::Int { value, .. } => Some(*value),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn stream_expander_resumes_a_call_split_across_lines() {
        // #define F(a,b) a+b
        // F(1,
        //   2)
        let mut macros = MacroTable::new();
        macros
            .define(Macro {
                name: Rc::from("F"),
                arity: Arity::FunctionLike(Params {
                    names: vec![Rc::from("a"), Rc::from("b")],
                    variadic: false,
                }),
                body: vec![ident("a"), Token::new(TokenKind::Plus, SourceMark::synthetic()), ident("b")],
            })
            .unwrap();
        let mut diags = Diagnostics::new(false);
        let mut expander = StreamExpander::new();
        let mut out = Vec::new();

        expander.feed_line(
            vec![
                ident("F"),
                Token::new(TokenKind::LParen, SourceMark::synthetic()),
                intlit(1),
                Token::new(TokenKind::Comma, SourceMark::synthetic()),
            ],
            &macros,
            &mut diags,
            &mut out,
        );
        // Nothing should have been emitted yet: the call is still open.
        assert!(out.is_empty());

        expander.feed_line(vec![intlit(2), Token::new(TokenKind::RParen, SourceMark::synthetic())], &macros, &mut diags, &mut out);
        expander.finish(&mut diags);

        assert!(!diags.has_errors());
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].kind, TokenKind::IntLit);
        assert_eq!(out[1].kind, TokenKind::Plus);
        assert_eq!(out[2].kind, TokenKind::IntLit);
    }
}
