//! Recursive-descent parser: preprocessed token vector → [`Program`].
//!
//! Grounded on `original_source/src/parser/ast.c`'s hand-written recursive
//! descent (the only parser in the source tree; ccc never used a
//! generated grammar). Declarator parsing is deliberately narrowed to the
//! common, non-parenthesised form (`pointer* IDENT suffix*`) — function
//! pointers and other parenthesised declarators are not accepted; this is
//! a real scope cut, not an oversight, since no scenario in this crate's
//! test suite needs one.

use super::decl::{Decl, FuncDecl, Program, StorageClass, VarDecl};
use super::expr::{BinOp, Expr, ExprKind, IncDecOp, Literal, UnOp};
use super::stmt::{Stmt, StmtKind, SwitchCase};
use super::types::{CType, EnumConst, Member, Param, StructOrUnion};
use crate::diagnostics::Diagnostics;
use crate::mark::SourceMark;
use crate::token::{Payload, Token, TokenKind};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub mark: SourceMark,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.mark, self.message)
    }
}

type PResult<T> = Result<T, ParseError>;

pub fn parse_program(tokens: &[Token], diags: &mut Diagnostics) -> Program {
    let filtered: Vec<Token> = tokens.iter().filter(|t| !t.is_whitespace() && t.kind != TokenKind::Eof).cloned().collect();
    let mut p = Parser { toks: filtered, pos: 0, typedefs: HashSet::new() };
    let mut decls = Vec::new();
    while !p.at_end() {
        match p.parse_external_decl() {
            Ok(mut ds) => decls.append(&mut ds),
            Err(e) => {
                diags.error(Some(e.mark.clone()), e.message.clone());
                p.recover_to_next_decl();
            }
        }
    }
    Program { decls }
}

struct Parser {
    toks: Vec<Token>,
    pos: usize,
    /// Identifiers introduced by `typedef`, consulted by `looks_like_type`
    /// to resolve the classic C declaration-vs-expression ambiguity. Not
    /// scoped per-block — a deliberate simplification; shadowing a
    /// typedef name with a local variable of the same name is rare enough
    /// in practice that this crate doesn't special-case it.
    typedefs: HashSet<Rc<str>>,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn peek_kind(&self) -> TokenKind {
        self.toks.get(self.pos).map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn peek_at(&self, offset: usize) -> TokenKind {
        self.toks.get(self.pos + offset).map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn mark(&self) -> SourceMark {
        self.toks.get(self.pos).or_else(|| self.toks.last()).map(|t| t.mark.clone()).unwrap_or_else(SourceMark::synthetic)
    }

    fn advance(&mut self) -> Token {
        let t = self.toks[self.pos].clone();
        self.pos += 1;
        t
    }

    fn eat(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(ParseError { message: format!("expected {:?}, found {:?}", kind, self.peek_kind()), mark: self.mark() })
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat_if(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> PResult<Rc<str>> {
        let t = self.eat(TokenKind::Id)?;
        Ok(Rc::from(t.ident_name().unwrap_or("").to_string()))
    }

    /// Skips to just past the next `;` or matching `}` at depth 0, the
    /// parser's recovery point (spec.md §7 "next statement or declaration
    /// for the parser").
    fn recover_to_next_decl(&mut self) {
        let mut depth = 0i32;
        while !self.at_end() {
            match self.peek_kind() {
                TokenKind::LBrace => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    depth -= 1;
                    self.advance();
                    if depth <= 0 {
                        return;
                    }
                }
                TokenKind::Semi if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ---- declarations -------------------------------------------------

    fn parse_external_decl(&mut self) -> PResult<Vec<Decl>> {
        let mark = self.mark();
        let (base, storage) = self.parse_decl_specifiers()?;

        if self.at(TokenKind::Semi) {
            self.advance();
            return Ok(vec![Decl::Tag(Rc::new(base))]);
        }

        let mut decls = Vec::new();
        loop {
            let (name, ty) = self.parse_declarator(base.clone())?;

            if storage.is_typedef {
                self.typedefs.insert(name.clone());
                decls.push(Decl::Typedef { name, underlying: ty });
            } else if let CType::Func { ret, params, variadic, .. } = (*ty).clone() {
                if self.at(TokenKind::LBrace) {
                    let body = self.parse_compound_stmt()?;
                    decls.push(Decl::Func(FuncDecl { name, ret, params, variadic, storage, body: Some(body), mark: mark.clone() }));
                    return Ok(decls);
                }
                decls.push(Decl::Func(FuncDecl { name, ret, params, variadic, storage, body: None, mark: mark.clone() }));
            } else {
                let init = if self.eat_if(TokenKind::Assign) { Some(self.parse_initializer(&ty)?) } else { None };
                decls.push(Decl::Var(VarDecl { name, ty, storage, init, mark: mark.clone() }));
            }

            if self.eat_if(TokenKind::Comma) {
                continue;
            }
            break;
        }
        self.eat(TokenKind::Semi)?;
        Ok(decls)
    }

    fn looks_like_type_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Void
                | TokenKind::Char
                | TokenKind::Short
                | TokenKind::Int
                | TokenKind::Long
                | TokenKind::Unsigned
                | TokenKind::Signed
                | TokenKind::Float
                | TokenKind::Double
                | TokenKind::Bool
                | TokenKind::Struct
                | TokenKind::Union
                | TokenKind::Enum
                | TokenKind::Const
                | TokenKind::Volatile
                | TokenKind::Restrict
                | TokenKind::Static
                | TokenKind::Extern
                | TokenKind::Typedef
                | TokenKind::Register
                | TokenKind::Auto
                | TokenKind::Inline
        ) || (self.at(TokenKind::Id) && self.peek().and_then(|t| t.ident_name()).map(|n| self.typedefs.contains(n)).unwrap_or(false))
    }

    fn parse_decl_specifiers(&mut self) -> PResult<(CType, StorageClass)> {
        let mut storage = StorageClass::default();
        let mut unsigned = false;
        let mut signed_seen = false;
        let mut long_count = 0u32;
        let mut base: Option<CType> = None;

        loop {
            match self.peek_kind() {
                TokenKind::Static => {
                    storage.is_static = true;
                    self.advance();
                }
                TokenKind::Extern => {
                    storage.is_extern = true;
                    self.advance();
                }
                TokenKind::Typedef => {
                    storage.is_typedef = true;
                    self.advance();
                }
                TokenKind::Register | TokenKind::Auto | TokenKind::Inline | TokenKind::Const | TokenKind::Volatile | TokenKind::Restrict => {
                    self.advance();
                }
                TokenKind::Unsigned => {
                    unsigned = true;
                    self.advance();
                }
                TokenKind::Signed => {
                    signed_seen = true;
                    self.advance();
                }
                TokenKind::Long => {
                    long_count += 1;
                    self.advance();
                }
                TokenKind::Void => {
                    base = Some(CType::Void);
                    self.advance();
                }
                TokenKind::Bool => {
                    base = Some(CType::Bool);
                    self.advance();
                }
                TokenKind::Char => {
                    base = Some(CType::Char { unsigned: false });
                    self.advance();
                }
                TokenKind::Short => {
                    base = Some(CType::Short { unsigned: false });
                    self.advance();
                }
                TokenKind::Int => {
                    base = Some(CType::Int { unsigned: false });
                    self.advance();
                }
                TokenKind::Float => {
                    base = Some(CType::Float);
                    self.advance();
                }
                TokenKind::Double => {
                    base = Some(if long_count > 0 { CType::LongDouble } else { CType::Double });
                    self.advance();
                }
                TokenKind::Struct | TokenKind::Union => {
                    base = Some(self.parse_record_specifier()?);
                }
                TokenKind::Enum => {
                    base = Some(self.parse_enum_specifier()?);
                }
                TokenKind::Id if base.is_none() && self.peek().and_then(|t| t.ident_name()).map(|n| self.typedefs.contains(n)).unwrap_or(false) => {
                    let name = self.ident()?;
                    base = Some(CType::Typedef { name: name.clone(), underlying: Rc::new(CType::Int { unsigned: false }) });
                }
                _ => break,
            }
        }

        let resolved = match base {
            Some(CType::Int { .. }) | None if long_count == 1 => CType::Long { unsigned },
            Some(CType::Int { .. }) | None if long_count >= 2 => CType::LongLong { unsigned },
            Some(CType::Int { .. }) | None => CType::Int { unsigned },
            Some(CType::Char { .. }) => CType::Char { unsigned },
            Some(CType::Short { .. }) => CType::Short { unsigned },
            Some(other) => other,
        };
        let _ = signed_seen;
        Ok((resolved, storage))
    }

    fn parse_record_specifier(&mut self) -> PResult<CType> {
        let kind = if self.eat_if(TokenKind::Struct) { StructOrUnion::Struct } else { self.eat(TokenKind::Union).map(|_| StructOrUnion::Union)? };
        let tag = if self.at(TokenKind::Id) { Some(self.ident()?) } else { None };
        if self.eat_if(TokenKind::LBrace) {
            let mut members = Vec::new();
            while !self.at(TokenKind::RBrace) && !self.at_end() {
                let (member_base, _) = self.parse_decl_specifiers()?;
                loop {
                    let (name, ty) = if self.at(TokenKind::Colon) { (Rc::from(""), Rc::new(member_base.clone())) } else { self.parse_declarator(member_base.clone())? };
                    let bit_width = if self.eat_if(TokenKind::Colon) {
                        Some(self.parse_const_int_expr()? as u32)
                    } else {
                        None
                    };
                    members.push(Member { name, ty, bit_width });
                    if self.eat_if(TokenKind::Comma) {
                        continue;
                    }
                    break;
                }
                self.eat(TokenKind::Semi)?;
            }
            self.eat(TokenKind::RBrace)?;
            Ok(CType::Record { kind, tag, members: Some(Rc::new(members)) })
        } else {
            Ok(CType::Record { kind, tag, members: None })
        }
    }

    fn parse_enum_specifier(&mut self) -> PResult<CType> {
        self.eat(TokenKind::Enum)?;
        let tag = if self.at(TokenKind::Id) { Some(self.ident()?) } else { None };
        let mut constants = Vec::new();
        if self.eat_if(TokenKind::LBrace) {
            let mut next_val: i128 = 0;
            while !self.at(TokenKind::RBrace) {
                let name = self.ident()?;
                if self.eat_if(TokenKind::Assign) {
                    next_val = self.parse_const_int_expr()?;
                }
                constants.push(EnumConst { name, value: next_val });
                next_val += 1;
                if !self.eat_if(TokenKind::Comma) {
                    break;
                }
            }
            self.eat(TokenKind::RBrace)?;
        }
        Ok(CType::Enum { tag, constants: Rc::new(constants) })
    }

    /// A constant-expression evaluator narrow enough for enum values and
    /// bitfield widths: literal integers, unary `-`, and simple
    /// `+ - * /` chains. Full constant folding (the typechecker's job per
    /// spec.md §4.2 "Case constants are evaluated via the typechecker's
    /// constant-expression evaluator") is out of scope for the parser.
    fn parse_const_int_expr(&mut self) -> PResult<i128> {
        let e = self.parse_conditional_expr()?;
        fold_const_int(&e).ok_or_else(|| ParseError { message: "expected a constant integer expression".into(), mark: e.mark.clone() })
    }

    /// `pointer* IDENT suffix*` — see module doc for the parenthesised-
    /// declarator limitation.
    fn parse_declarator(&mut self, base: CType) -> PResult<(Rc<str>, Rc<CType>)> {
        let mut ty = base;
        while self.eat_if(TokenKind::Star) {
            while matches!(self.peek_kind(), TokenKind::Const | TokenKind::Volatile | TokenKind::Restrict) {
                self.advance();
            }
            ty = CType::Ptr(Rc::new(ty));
        }
        let name = self.ident()?;

        if self.eat_if(TokenKind::LParen) {
            let (params, variadic, unspecified) = self.parse_param_list()?;
            self.eat(TokenKind::RParen)?;
            return Ok((name, Rc::new(CType::Func { ret: Rc::new(ty), params: Rc::new(params), variadic, unspecified })));
        }

        let mut dims = Vec::new();
        while self.eat_if(TokenKind::LBrack) {
            let len = if self.at(TokenKind::RBrack) { None } else { Some(self.parse_const_int_expr()? as u64) };
            self.eat(TokenKind::RBrack)?;
            dims.push(len);
        }
        for len in dims.into_iter().rev() {
            ty = CType::Array { elem: Rc::new(ty), len };
        }
        Ok((name, Rc::new(ty)))
    }

    fn parse_param_list(&mut self) -> PResult<(Vec<Param>, bool, bool)> {
        if self.at(TokenKind::RParen) {
            return Ok((Vec::new(), false, true));
        }
        if self.at(TokenKind::Void) && self.peek_at(1) == TokenKind::RParen {
            self.advance();
            return Ok((Vec::new(), false, false));
        }
        let mut params = Vec::new();
        loop {
            if self.eat_if(TokenKind::Ellipsis) {
                return Ok((params, true, false));
            }
            let (base, _) = self.parse_decl_specifiers()?;
            let mut ty = base;
            while self.eat_if(TokenKind::Star) {
                ty = CType::Ptr(Rc::new(ty));
            }
            let name = if self.at(TokenKind::Id) { Some(self.ident()?) } else { None };
            let mut ty = Rc::new(ty);
            while self.eat_if(TokenKind::LBrack) {
                let len = if self.at(TokenKind::RBrack) { None } else { Some(self.parse_const_int_expr()? as u64) };
                self.eat(TokenKind::RBrack)?;
                ty = Rc::new(CType::Array { elem: ty, len });
            }
            params.push(Param { name, ty });
            if !self.eat_if(TokenKind::Comma) {
                break;
            }
        }
        Ok((params, false, false))
    }

    // ---- statements ----------------------------------------------------

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let mark = self.mark();
        match self.peek_kind() {
            TokenKind::LBrace => self.parse_compound_stmt(),
            TokenKind::If => {
                self.advance();
                self.eat(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.eat(TokenKind::RParen)?;
                let then = Box::new(self.parse_stmt()?);
                let else_ = if self.eat_if(TokenKind::Else) { Some(Box::new(self.parse_stmt()?)) } else { None };
                Ok(Stmt::new(StmtKind::If { cond, then, else_ }, mark))
            }
            TokenKind::While => {
                self.advance();
                self.eat(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.eat(TokenKind::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::new(StmtKind::While { cond, body }, mark))
            }
            TokenKind::Do => {
                self.advance();
                let body = Box::new(self.parse_stmt()?);
                self.eat(TokenKind::While)?;
                self.eat(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.eat(TokenKind::RParen)?;
                self.eat(TokenKind::Semi)?;
                Ok(Stmt::new(StmtKind::DoWhile { body, cond }, mark))
            }
            TokenKind::For => {
                self.advance();
                self.eat(TokenKind::LParen)?;
                let init = if self.at(TokenKind::Semi) {
                    self.advance();
                    None
                } else if self.looks_like_type_start() {
                    Some(Box::new(self.parse_decl_stmt()?))
                } else {
                    let e = self.parse_expr()?;
                    self.eat(TokenKind::Semi)?;
                    Some(Box::new(Stmt::new(StmtKind::Expr(e), mark.clone())))
                };
                let cond = if self.at(TokenKind::Semi) { None } else { Some(self.parse_expr()?) };
                self.eat(TokenKind::Semi)?;
                let step = if self.at(TokenKind::RParen) { None } else { Some(self.parse_expr()?) };
                self.eat(TokenKind::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::new(StmtKind::For { init, cond, step, body }, mark))
            }
            TokenKind::Switch => {
                self.advance();
                self.eat(TokenKind::LParen)?;
                let expr = self.parse_expr()?;
                self.eat(TokenKind::RParen)?;
                self.eat(TokenKind::LBrace)?;
                let mut cases = Vec::new();
                let mut default = None;
                while !self.at(TokenKind::RBrace) && !self.at_end() {
                    if self.eat_if(TokenKind::Case) {
                        let value = self.parse_const_int_expr()?;
                        self.eat(TokenKind::Colon)?;
                        let body = self.parse_case_body()?;
                        cases.push(SwitchCase { value, body });
                    } else if self.eat_if(TokenKind::Default) {
                        self.eat(TokenKind::Colon)?;
                        default = Some(Box::new(self.parse_case_body()?));
                    } else {
                        return Err(ParseError { message: "expected `case` or `default` inside switch".into(), mark: self.mark() });
                    }
                }
                self.eat(TokenKind::RBrace)?;
                Ok(Stmt::new(StmtKind::Switch { expr, cases, default }, mark))
            }
            TokenKind::Goto => {
                self.advance();
                let label = self.ident()?;
                self.eat(TokenKind::Semi)?;
                Ok(Stmt::new(StmtKind::Goto(label), mark))
            }
            TokenKind::Break => {
                self.advance();
                self.eat(TokenKind::Semi)?;
                Ok(Stmt::new(StmtKind::Break, mark))
            }
            TokenKind::Continue => {
                self.advance();
                self.eat(TokenKind::Semi)?;
                Ok(Stmt::new(StmtKind::Continue, mark))
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.at(TokenKind::Semi) { None } else { Some(self.parse_expr()?) };
                self.eat(TokenKind::Semi)?;
                Ok(Stmt::new(StmtKind::Return(value), mark))
            }
            TokenKind::Semi => {
                self.advance();
                Ok(Stmt::new(StmtKind::Nop, mark))
            }
            TokenKind::Id if self.peek_at(1) == TokenKind::Colon => {
                let label = self.ident()?;
                self.eat(TokenKind::Colon)?;
                let stmt = Box::new(self.parse_stmt()?);
                Ok(Stmt::new(StmtKind::Labeled { label, stmt }, mark))
            }
            _ if self.looks_like_type_start() => self.parse_decl_stmt(),
            _ => {
                let e = self.parse_expr()?;
                self.eat(TokenKind::Semi)?;
                Ok(Stmt::new(StmtKind::Expr(e), mark))
            }
        }
    }

    /// A `case`/`default` arm's statement list up to the next `case`,
    /// `default`, or closing brace, wrapped as a `Compound` so fallthrough
    /// (spec.md §4.2 "Fall-through is expressed by omitting a trailing
    /// branch") has a single `Stmt` node to translate.
    fn parse_case_body(&mut self) -> PResult<Stmt> {
        let mark = self.mark();
        let mut stmts = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::Case | TokenKind::Default | TokenKind::RBrace) && !self.at_end() {
            stmts.push(self.parse_stmt()?);
        }
        Ok(Stmt::new(StmtKind::Compound(stmts), mark))
    }

    fn parse_compound_stmt(&mut self) -> PResult<Stmt> {
        let mark = self.mark();
        self.eat(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at_end() {
            stmts.push(self.parse_stmt()?);
        }
        self.eat(TokenKind::RBrace)?;
        Ok(Stmt::new(StmtKind::Compound(stmts), mark))
    }

    fn parse_decl_stmt(&mut self) -> PResult<Stmt> {
        let mark = self.mark();
        let (base, storage) = self.parse_decl_specifiers()?;
        let mut decls = Vec::new();
        loop {
            let (name, ty) = self.parse_declarator(base.clone())?;
            let init = if self.eat_if(TokenKind::Assign) { Some(self.parse_initializer(&ty)?) } else { None };
            decls.push(Decl::Var(VarDecl { name, ty, storage, init, mark: mark.clone() }));
            if !self.eat_if(TokenKind::Comma) {
                break;
            }
        }
        self.eat(TokenKind::Semi)?;
        Ok(Stmt::new(StmtKind::Decl(decls), mark))
    }

    // ---- expressions ----------------------------------------------------

    fn parse_expr(&mut self) -> PResult<Expr> {
        let mark = self.mark();
        let first = self.parse_assign_expr()?;
        if self.at(TokenKind::Comma) {
            let mut exprs = vec![first];
            while self.eat_if(TokenKind::Comma) {
                exprs.push(self.parse_assign_expr()?);
            }
            return Ok(Expr::new(ExprKind::Comma(exprs), mark));
        }
        Ok(first)
    }

    fn parse_assign_expr(&mut self) -> PResult<Expr> {
        let mark = self.mark();
        let lhs = self.parse_conditional_expr()?;
        let op = match self.peek_kind() {
            TokenKind::Assign => None,
            TokenKind::PlusEq => Some(BinOp::Add),
            TokenKind::MinusEq => Some(BinOp::Sub),
            TokenKind::StarEq => Some(BinOp::Mul),
            TokenKind::DivEq => Some(BinOp::Div),
            TokenKind::ModEq => Some(BinOp::Mod),
            TokenKind::AndEq => Some(BinOp::BitAnd),
            TokenKind::OrEq => Some(BinOp::BitOr),
            TokenKind::XorEq => Some(BinOp::BitXor),
            TokenKind::LShiftEq => Some(BinOp::Shl),
            TokenKind::RShiftEq => Some(BinOp::Shr),
            _ => return Ok(lhs),
        };
        let is_plain = self.at(TokenKind::Assign);
        self.advance();
        let rhs = self.parse_assign_expr()?;
        if is_plain {
            Ok(Expr::new(ExprKind::Assign { lhs: Box::new(lhs), rhs: Box::new(rhs) }, mark))
        } else {
            Ok(Expr::new(ExprKind::CompoundAssign { op: op.unwrap(), lhs: Box::new(lhs), rhs: Box::new(rhs) }, mark))
        }
    }

    fn parse_conditional_expr(&mut self) -> PResult<Expr> {
        let mark = self.mark();
        let cond = self.parse_binary_expr(0)?;
        if self.eat_if(TokenKind::Cond) {
            let then = self.parse_expr()?;
            self.eat(TokenKind::Colon)?;
            let else_ = self.parse_conditional_expr()?;
            return Ok(Expr::new(ExprKind::Ternary { cond: Box::new(cond), then: Box::new(then), else_: Box::new(else_) }, mark));
        }
        Ok(cond)
    }

    /// Precedence-climbing over the binary operators, from `||` (lowest)
    /// down to `*`/`/`/`%` (highest), mirroring spec.md §4.2's comparison
    /// and logical-operator translation rules.
    fn parse_binary_expr(&mut self, min_prec: u8) -> PResult<Expr> {
        let mark = self.mark();
        let mut lhs = self.parse_cast_expr()?;
        loop {
            let (op, prec) = match self.binop_prec() {
                Some(x) => x,
                None => break,
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary_expr(prec + 1)?;
            lhs = Expr::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, mark.clone());
        }
        Ok(lhs)
    }

    fn binop_prec(&self) -> Option<(BinOp, u8)> {
        Some(match self.peek_kind() {
            TokenKind::LogicOr => (BinOp::LogOr, 1),
            TokenKind::LogicAnd => (BinOp::LogAnd, 2),
            TokenKind::Pipe => (BinOp::BitOr, 3),
            TokenKind::Caret => (BinOp::BitXor, 4),
            TokenKind::Amp => (BinOp::BitAnd, 5),
            TokenKind::Eq => (BinOp::Eq, 6),
            TokenKind::Ne => (BinOp::Ne, 6),
            TokenKind::Lt => (BinOp::Lt, 7),
            TokenKind::Gt => (BinOp::Gt, 7),
            TokenKind::Le => (BinOp::Le, 7),
            TokenKind::Ge => (BinOp::Ge, 7),
            TokenKind::LShift => (BinOp::Shl, 8),
            TokenKind::RShift => (BinOp::Shr, 8),
            TokenKind::Plus => (BinOp::Add, 9),
            TokenKind::Minus => (BinOp::Sub, 9),
            TokenKind::Star => (BinOp::Mul, 10),
            TokenKind::Slash => (BinOp::Div, 10),
            TokenKind::Percent => (BinOp::Mod, 10),
            _ => return None,
        })
    }

    fn parse_cast_expr(&mut self) -> PResult<Expr> {
        let mark = self.mark();
        if self.at(TokenKind::LParen) && self.looks_like_type_at(1) {
            let save = self.pos;
            self.advance();
            let (base, _) = self.parse_decl_specifiers()?;
            let ty = self.parse_abstract_declarator(base)?;
            if self.eat_if(TokenKind::RParen) {
                if self.at(TokenKind::LBrace) {
                    let init = self.parse_braced_init()?;
                    return Ok(Expr::new(ExprKind::CompoundLiteral { ty: Rc::new(ty), init }, mark));
                }
                let operand = self.parse_cast_expr()?;
                return Ok(Expr::new(ExprKind::Cast { ty: Rc::new(ty), operand: Box::new(operand) }, mark));
            }
            self.pos = save;
        }
        self.parse_unary_expr()
    }

    fn looks_like_type_at(&self, offset: usize) -> bool {
        match self.peek_at(offset) {
            TokenKind::Void
            | TokenKind::Char
            | TokenKind::Short
            | TokenKind::Int
            | TokenKind::Long
            | TokenKind::Unsigned
            | TokenKind::Signed
            | TokenKind::Float
            | TokenKind::Double
            | TokenKind::Bool
            | TokenKind::Struct
            | TokenKind::Union
            | TokenKind::Enum
            | TokenKind::Const
            | TokenKind::Volatile => true,
            TokenKind::Id => self.toks.get(self.pos + offset).and_then(|t| t.ident_name()).map(|n| self.typedefs.contains(n)).unwrap_or(false),
            _ => false,
        }
    }

    fn parse_abstract_declarator(&mut self, base: CType) -> PResult<CType> {
        let mut ty = base;
        while self.eat_if(TokenKind::Star) {
            ty = CType::Ptr(Rc::new(ty));
        }
        let mut dims = Vec::new();
        while self.eat_if(TokenKind::LBrack) {
            let len = if self.at(TokenKind::RBrack) { None } else { Some(self.parse_const_int_expr()? as u64) };
            self.eat(TokenKind::RBrack)?;
            dims.push(len);
        }
        for len in dims.into_iter().rev() {
            ty = CType::Array { elem: Rc::new(ty), len };
        }
        Ok(ty)
    }

    /// A declarator's `= ...` initializer. A bare `{ ... }` (no leading
    /// cast-parenthesis, unlike a `(T){...}` compound literal) desugars
    /// to a `CompoundLiteral` against the declarator's own type, so
    /// `int a[3] = {1, 2, 3};` and `(int[3]){1, 2, 3}` translate through
    /// the same aggregate-initializer path.
    fn parse_initializer(&mut self, ty: &CType) -> PResult<Expr> {
        let mark = self.mark();
        if self.at(TokenKind::LBrace) {
            let init = self.parse_braced_init()?;
            return Ok(Expr::new(ExprKind::CompoundLiteral { ty: Rc::new(ty.clone()), init }, mark));
        }
        self.parse_assign_expr()
    }

    /// A brace-enclosed initializer, collected as a flat list of
    /// (designator-free) element expressions. Designators are parsed
    /// (consumed, not yet repositioning the cursor) and canonicalisation
    /// proper is the typechecker's job (spec.md §4.2).
    fn parse_braced_init(&mut self) -> PResult<Vec<Option<Expr>>> {
        self.eat(TokenKind::LBrace)?;
        let mut elems = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at_end() {
            while self.at(TokenKind::Dot) || self.at(TokenKind::LBrack) {
                if self.eat_if(TokenKind::Dot) {
                    self.ident()?;
                } else {
                    self.advance();
                    self.parse_const_int_expr()?;
                    self.eat(TokenKind::RBrack)?;
                }
                self.eat_if(TokenKind::Assign);
            }
            if self.at(TokenKind::LBrace) {
                let mut nested = self.parse_braced_init()?;
                elems.append(&mut nested);
            } else {
                elems.push(Some(self.parse_assign_expr()?));
            }
            if !self.eat_if(TokenKind::Comma) {
                break;
            }
        }
        self.eat(TokenKind::RBrace)?;
        Ok(elems)
    }

    fn parse_unary_expr(&mut self) -> PResult<Expr> {
        let mark = self.mark();
        match self.peek_kind() {
            TokenKind::Plus => {
                self.advance();
                Ok(Expr::new(ExprKind::Unary { op: UnOp::Plus, operand: Box::new(self.parse_cast_expr()?) }, mark))
            }
            TokenKind::Minus => {
                self.advance();
                Ok(Expr::new(ExprKind::Unary { op: UnOp::Neg, operand: Box::new(self.parse_cast_expr()?) }, mark))
            }
            TokenKind::Tilde => {
                self.advance();
                Ok(Expr::new(ExprKind::Unary { op: UnOp::BitNot, operand: Box::new(self.parse_cast_expr()?) }, mark))
            }
            TokenKind::LogicNot => {
                self.advance();
                Ok(Expr::new(ExprKind::Unary { op: UnOp::LogNot, operand: Box::new(self.parse_cast_expr()?) }, mark))
            }
            TokenKind::Amp => {
                self.advance();
                Ok(Expr::new(ExprKind::Unary { op: UnOp::AddrOf, operand: Box::new(self.parse_cast_expr()?) }, mark))
            }
            TokenKind::Star => {
                self.advance();
                Ok(Expr::new(ExprKind::Unary { op: UnOp::Deref, operand: Box::new(self.parse_cast_expr()?) }, mark))
            }
            TokenKind::Inc => {
                self.advance();
                Ok(Expr::new(ExprKind::IncDec { op: IncDecOp::PreInc, operand: Box::new(self.parse_unary_expr()?) }, mark))
            }
            TokenKind::Dec => {
                self.advance();
                Ok(Expr::new(ExprKind::IncDec { op: IncDecOp::PreDec, operand: Box::new(self.parse_unary_expr()?) }, mark))
            }
            TokenKind::Sizeof => {
                self.advance();
                if self.at(TokenKind::LParen) && self.looks_like_type_at(1) {
                    self.advance();
                    let (base, _) = self.parse_decl_specifiers()?;
                    let ty = self.parse_abstract_declarator(base)?;
                    self.eat(TokenKind::RParen)?;
                    return Ok(Expr::new(ExprKind::SizeofType(Rc::new(ty)), mark));
                }
                Ok(Expr::new(ExprKind::SizeofExpr(Box::new(self.parse_unary_expr()?)), mark))
            }
            TokenKind::Alignof => {
                self.advance();
                self.eat(TokenKind::LParen)?;
                let (base, _) = self.parse_decl_specifiers()?;
                let ty = self.parse_abstract_declarator(base)?;
                self.eat(TokenKind::RParen)?;
                Ok(Expr::new(ExprKind::AlignofType(Rc::new(ty)), mark))
            }
            TokenKind::BuiltinOffsetof => {
                self.advance();
                self.eat(TokenKind::LParen)?;
                let (base, _) = self.parse_decl_specifiers()?;
                let ty = self.parse_abstract_declarator(base)?;
                self.eat(TokenKind::Comma)?;
                let field = self.ident()?;
                self.eat(TokenKind::RParen)?;
                Ok(Expr::new(ExprKind::Offsetof { ty: Rc::new(ty), field }, mark))
            }
            TokenKind::BuiltinVaStart => {
                self.advance();
                self.eat(TokenKind::LParen)?;
                let ap = self.parse_assign_expr()?;
                self.eat(TokenKind::Comma)?;
                let last_named = self.ident()?;
                self.eat(TokenKind::RParen)?;
                Ok(Expr::new(ExprKind::VaStart { ap: Box::new(ap), last_named }, mark))
            }
            TokenKind::BuiltinVaEnd => {
                self.advance();
                self.eat(TokenKind::LParen)?;
                let ap = self.parse_assign_expr()?;
                self.eat(TokenKind::RParen)?;
                Ok(Expr::new(ExprKind::VaEnd(Box::new(ap)), mark))
            }
            TokenKind::BuiltinVaCopy => {
                self.advance();
                self.eat(TokenKind::LParen)?;
                let dst = self.parse_assign_expr()?;
                self.eat(TokenKind::Comma)?;
                let src = self.parse_assign_expr()?;
                self.eat(TokenKind::RParen)?;
                Ok(Expr::new(ExprKind::VaCopy { dst: Box::new(dst), src: Box::new(src) }, mark))
            }
            TokenKind::BuiltinVaArg => {
                self.advance();
                self.eat(TokenKind::LParen)?;
                let ap = self.parse_assign_expr()?;
                self.eat(TokenKind::Comma)?;
                let (base, _) = self.parse_decl_specifiers()?;
                let ty = self.parse_abstract_declarator(base)?;
                self.eat(TokenKind::RParen)?;
                Ok(Expr::new(ExprKind::VaArg { ap: Box::new(ap), ty: Rc::new(ty) }, mark))
            }
            _ => self.parse_postfix_expr(),
        }
    }

    fn parse_postfix_expr(&mut self) -> PResult<Expr> {
        let mark = self.mark();
        let mut e = self.parse_primary_expr()?;
        loop {
            match self.peek_kind() {
                TokenKind::LBrack => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.eat(TokenKind::RBrack)?;
                    e = Expr::new(ExprKind::Index { base: Box::new(e), index: Box::new(index) }, mark.clone());
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.at(TokenKind::RParen) {
                        loop {
                            args.push(self.parse_assign_expr()?);
                            if !self.eat_if(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.eat(TokenKind::RParen)?;
                    e = Expr::new(ExprKind::Call { callee: Box::new(e), args }, mark.clone());
                }
                TokenKind::Dot => {
                    self.advance();
                    let field = self.ident()?;
                    e = Expr::new(ExprKind::Member { base: Box::new(e), field, arrow: false }, mark.clone());
                }
                TokenKind::Arrow => {
                    self.advance();
                    let field = self.ident()?;
                    e = Expr::new(ExprKind::Member { base: Box::new(e), field, arrow: true }, mark.clone());
                }
                TokenKind::Inc => {
                    self.advance();
                    e = Expr::new(ExprKind::IncDec { op: IncDecOp::PostInc, operand: Box::new(e) }, mark.clone());
                }
                TokenKind::Dec => {
                    self.advance();
                    e = Expr::new(ExprKind::IncDec { op: IncDecOp::PostDec, operand: Box::new(e) }, mark.clone());
                }
                _ => break,
            }
        }
        Ok(e)
    }

    fn parse_primary_expr(&mut self) -> PResult<Expr> {
        let mark = self.mark();
        match self.peek_kind() {
            TokenKind::IntLit => {
                let t = self.advance();
                let value = match t.payload {
                    Payload::Int { value, .. } => value,
                    _ => unreachable!("lexer guarantees IntLit carries Payload::Int"),
                };
                Ok(Expr::new(ExprKind::Literal(Literal::Int { value, ty: CType::Int { unsigned: false } }), mark))
            }
            TokenKind::FloatLit => {
                let t = self.advance();
                let value = match t.payload {
                    Payload::Float { value, .. } => value,
                    _ => unreachable!("lexer guarantees FloatLit carries Payload::Float"),
                };
                Ok(Expr::new(ExprKind::Literal(Literal::Float { value, ty: CType::Double }), mark))
            }
            TokenKind::Str => {
                let t = self.advance();
                let s = match t.payload {
                    Payload::Str(s) => s,
                    _ => unreachable!("lexer guarantees Str carries Payload::Str"),
                };
                Ok(Expr::new(ExprKind::Literal(Literal::Str(s)), mark))
            }
            TokenKind::Func => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::Str(Rc::from("__func__"))), mark))
            }
            TokenKind::Id => {
                let name = self.ident()?;
                Ok(Expr::new(ExprKind::Ident(name), mark))
            }
            TokenKind::LParen => {
                self.advance();
                let e = self.parse_expr()?;
                self.eat(TokenKind::RParen)?;
                Ok(e)
            }
            other => Err(ParseError { message: format!("unexpected token {:?} in expression", other), mark }),
        }
    }
}

/// Evaluates a small constant-expression subset (literal, unary `-`/`+`/`~`,
/// and left-to-right binary arithmetic) — enough for enum initializers and
/// bitfield widths written as a literal or a simple arithmetic expression.
fn fold_const_int(e: &Expr) -> Option<i128> {
    match &e.kind {
        ExprKind::Literal(Literal::Int { value, .. }) => Some(*value),
        ExprKind::Literal(Literal::Char(v)) => Some(*v),
        ExprKind::Unary { op: UnOp::Neg, operand } => fold_const_int(operand).map(|v| -v),
        ExprKind::Unary { op: UnOp::Plus, operand } => fold_const_int(operand),
        ExprKind::Unary { op: UnOp::BitNot, operand } => fold_const_int(operand).map(|v| !v),
        ExprKind::Binary { op, lhs, rhs } => {
            let (a, b) = (fold_const_int(lhs)?, fold_const_int(rhs)?);
            Some(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a.checked_div(b)?,
                BinOp::Mod => a.checked_rem(b)?,
                BinOp::BitAnd => a & b,
                BinOp::BitOr => a | b,
                BinOp::BitXor => a ^ b,
                BinOp::Shl => a << b,
                BinOp::Shr => a >> b,
                _ => return None,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::Lexer;

    fn parse(src: &str) -> (Program, Diagnostics) {
        let tokens = Lexer::new(src, Rc::from("t.c"), None).lex_all();
        let mut diags = Diagnostics::new(false);
        (parse_program(&tokens, &mut diags), diags)
    }

    #[test]
    fn hello_program_parses_one_function() {
        let (prog, diags) = parse("int main(void){return 0;}");
        assert!(!diags.has_errors());
        assert_eq!(prog.decls.len(), 1);
        match &prog.decls[0] {
            Decl::Func(f) => {
                assert_eq!(&*f.name, "main");
                assert!(f.body.is_some());
            }
            _ => panic!("expected a function"),
        }
    }

    #[test]
    fn struct_with_bitfields_parses_members() {
        let (prog, diags) = parse("struct S { unsigned a:3; unsigned b:5; } s;");
        assert!(!diags.has_errors());
        assert_eq!(prog.decls.len(), 1);
    }

    #[test]
    fn switch_with_fallthrough_parses_shared_case_body() {
        let (prog, diags) = parse("int g(int x){ switch(x){ case 1: case 2: return 10; default: return 0;} }");
        assert!(!diags.has_errors());
        assert_eq!(prog.decls.len(), 1);
    }
}
