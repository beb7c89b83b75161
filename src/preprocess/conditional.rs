//! `#if`/`#elif`/`#else`/`#endif` nesting and constant-expression
//! evaluation (spec.md §4.1 "Conditionals").

use crate::token::{Token, TokenKind};

/// One level of `#if`/`#ifdef`/`#ifndef` nesting.
struct Frame {
    /// This branch's condition holds *and* every enclosing frame is active.
    active: bool,
    /// Some branch at this level has already been taken (controls `#elif`/`#else`).
    taken: bool,
    in_else: bool,
}

#[derive(Default)]
pub struct ConditionalStack {
    frames: Vec<Frame>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        ConditionalStack::default()
    }

    /// True while every enclosing (and the current) branch condition holds;
    /// directive bodies are only processed for effect while this is true.
    pub fn is_active(&self) -> bool {
        self.frames.iter().all(|f| f.active)
    }

    fn outer_active(&self) -> bool {
        self.frames[..self.frames.len().saturating_sub(1)]
            .iter()
            .all(|f| f.active)
    }

    pub fn push_if(&mut self, cond: bool) {
        let outer = self.is_active();
        let active = outer && cond;
        self.frames.push(Frame {
            active,
            taken: active,
            in_else: false,
        });
    }

    pub fn elif(&mut self, cond: bool) -> Result<(), &'static str> {
        let Some(top) = self.frames.last_mut() else {
            return Err("#elif without matching #if");
        };
        if top.in_else {
            return Err("#elif after #else");
        }
        if top.taken {
            top.active = false;
        } else {
            // outer_active must be recomputed without the top frame.
            let outer = self.frames[..self.frames.len() - 1].iter().all(|f| f.active);
            let active = outer && cond;
            let top = self.frames.last_mut().unwrap();
            top.active = active;
            top.taken = top.taken || active;
        }
        Ok(())
    }

    pub fn else_branch(&mut self) -> Result<(), &'static str> {
        let outer = self.outer_active();
        let Some(top) = self.frames.last_mut() else {
            return Err("#else without matching #if");
        };
        if top.in_else {
            return Err("#else after #else");
        }
        top.in_else = true;
        top.active = outer && !top.taken;
        top.taken = true;
        Ok(())
    }

    pub fn endif(&mut self) -> Result<(), &'static str> {
        if self.frames.pop().is_none() {
            return Err("#endif without matching #if");
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

/// Evaluates a macro-expanded constant-expression token stream (the
/// directive line after `defined X`/`defined(X)` has already been
/// resolved to `1`/`0` and undefined identifiers have been replaced by
/// `0`) as a C11 integer constant expression. A small precedence-climbing
/// evaluator over the subset of operators valid in `#if` lines.
pub struct ConstExprEval<'a> {
    toks: &'a [Token],
    pos: usize,
}

impl<'a> ConstExprEval<'a> {
    pub fn new(toks: &'a [Token]) -> Self {
        ConstExprEval { toks, pos: 0 }
    }

    pub fn eval(mut self) -> Result<i128, String> {
        let v = self.parse_ternary()?;
        self.skip_ws();
        if self.pos < self.toks.len() && self.toks[self.pos].kind != TokenKind::Eof {
            return Err("trailing tokens in constant expression".into());
        }
        Ok(v)
    }

    fn skip_ws(&mut self) {
        while self.toks.get(self.pos).map(|t| t.is_whitespace()) == Some(true) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> TokenKind {
        self.skip_ws();
        self.toks.get(self.pos).map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        self.skip_ws();
        let t = self.toks.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_ternary(&mut self) -> Result<i128, String> {
        let cond = self.parse_binary(0)?;
        if self.peek() == TokenKind::Cond {
            self.bump();
            let then_v = self.parse_ternary()?;
            if self.peek() != TokenKind::Colon {
                return Err("expected ':' in conditional expression".into());
            }
            self.bump();
            let else_v = self.parse_ternary()?;
            Ok(if cond != 0 { then_v } else { else_v })
        } else {
            Ok(cond)
        }
    }

    fn binop_prec(kind: TokenKind) -> Option<(u8, bool)> {
        use TokenKind::*;
        Some(match kind {
            LogicOr => (1, false),
            LogicAnd => (2, false),
            Pipe => (3, false),
            Caret => (4, false),
            Amp => (5, false),
            Eq | Ne => (6, false),
            Lt | Gt | Le | Ge => (7, false),
            LShift | RShift => (8, false),
            Plus | Minus => (9, false),
            Star | Slash | Percent => (10, false),
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<i128, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let kind = self.peek();
            let Some((prec, _right_assoc)) = Self::binop_prec(kind) else { break };
            if prec < min_prec {
                break;
            }
            self.bump();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = apply_binop(kind, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<i128, String> {
        match self.peek() {
            TokenKind::Minus => {
                self.bump();
                Ok(-self.parse_unary()?)
            }
            TokenKind::Plus => {
                self.bump();
                self.parse_unary()
            }
            TokenKind::LogicNot => {
                self.bump();
                Ok(if self.parse_unary()? == 0 { 1 } else { 0 })
            }
            TokenKind::Tilde => {
                self.bump();
                Ok(!self.parse_unary()?)
            }
            TokenKind::LParen => {
                self.bump();
                let v = self.parse_ternary()?;
                if self.peek() != TokenKind::RParen {
                    return Err("expected ')'".into());
                }
                self.bump();
                Ok(v)
            }
            TokenKind::IntLit => {
                let t = self.bump().unwrap();
                match &t.payload {
                    crate::token::Payload::Int { value, .. } => Ok(*value),
                    _ => Err("malformed integer literal".into()),
                }
            }
            TokenKind::Id => {
                // Any identifier still present after `defined` resolution
                // and macro expansion is, per spec.md §4.1, just 0.
                self.bump();
                Ok(0)
            }
            other => Err(format!("unexpected token {:?} in constant expression", other)),
        }
    }
}

fn apply_binop(kind: TokenKind, a: i128, b: i128) -> Result<i128, String> {
    use TokenKind::*;
    Ok(match kind {
        LogicOr => ((a != 0) || (b != 0)) as i128,
        LogicAnd => ((a != 0) && (b != 0)) as i128,
        Pipe => a | b,
        Caret => a ^ b,
        Amp => a & b,
        Eq => (a == b) as i128,
        Ne => (a != b) as i128,
        Lt => (a < b) as i128,
        Gt => (a > b) as i128,
        Le => (a <= b) as i128,
        Ge => (a >= b) as i128,
        LShift => a << b,
        RShift => a >> b,
        Plus => a + b,
        Minus => a - b,
        Star => a * b,
        Slash => {
            if b == 0 {
                return Err("division by zero in constant expression".into());
            }
            a / b
        }
        Percent => {
            if b == 0 {
                return Err("division by zero in constant expression".into());
            }
            a % b
        }
        _ => unreachable!(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mark::SourceMark;
    use crate::token::Payload;

    fn int(v: i128) -> Token {
        Token::with_payload(
            TokenKind::IntLit,
            SourceMark::synthetic(),
            Payload::Int { value: v, suffix: Default::default() },
        )
    }

    fn op(k: TokenKind) -> Token {
        Token::new(k, SourceMark::synthetic())
    }

    #[test]
    fn evaluates_arithmetic_with_precedence() {
        // 1 + 2 * 3 == 7
        let toks = vec![int(1), op(TokenKind::Plus), int(2), op(TokenKind::Star), int(3)];
        assert_eq!(ConstExprEval::new(&toks).eval().unwrap(), 7);
    }

    #[test]
    fn nested_if_else_endif_tracks_active() {
        let mut stack = ConditionalStack::new();
        stack.push_if(false);
        assert!(!stack.is_active());
        stack.else_branch().unwrap();
        assert!(stack.is_active());
        stack.endif().unwrap();
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn elif_only_takes_first_true_branch() {
        let mut stack = ConditionalStack::new();
        stack.push_if(false);
        stack.elif(true).unwrap();
        assert!(stack.is_active());
        stack.elif(true).unwrap();
        assert!(!stack.is_active()); // already taken above
    }

    #[test]
    fn unmatched_endif_is_an_error() {
        let mut stack = ConditionalStack::new();
        assert!(stack.endif().is_err());
    }
}
