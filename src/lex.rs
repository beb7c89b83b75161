//! Character-level tokenizer.
//!
//! Out of scope per spec.md §1 ("the lexer's character-level state
//! machine — its contract is only that it produces the token stream
//! consumed here"). This module is the thin stand-in that contract
//! describes: enough of a real C11 tokenizer to drive the preprocessor and
//! parser end to end, without chasing every lexical corner case (raw
//! unicode identifiers, digraphs beyond `%:`/`%:%:`, trigraphs). Grounded
//! on `original_source/src/lex/lexer.c`'s character classes and backslash
//! line-splicing (`lex_getc_splice`).

use crate::mark::SourceMark;
use crate::token::{FloatSuffix, IntSuffix, Payload, Token, TokenKind};
use std::rc::Rc;

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    file: Rc<str>,
    line: u32,
    column: u32,
    previous: Option<SourceMark>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, file: Rc<str>, previous: Option<SourceMark>) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            file,
            line: 1,
            column: 1,
            previous,
        }
    }

    fn mark(&self) -> SourceMark {
        SourceMark::new(self.file.clone(), self.line, self.column, self.previous.clone())
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    /// Reads one (possibly backslash-newline spliced) character.
    fn getc(&mut self) -> Option<u8> {
        loop {
            let c = self.peek()?;
            if c == b'\\' && self.peek_at(1) == Some(b'\n') {
                self.pos += 2;
                self.line += 1;
                self.column = 1;
                continue;
            }
            self.pos += 1;
            if c == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            return Some(c);
        }
    }

    fn bump(&mut self) {
        self.getc();
    }

    /// Tokenizes the whole buffer, preserving whitespace/newline tokens —
    /// the preprocessor needs `Newline` to find directive lines and
    /// `Space` to decide macro-invocation adjacency.
    pub fn lex_all(&mut self) -> Vec<Token> {
        let mut out = Vec::new();
        while let Some(c) = self.peek() {
            let mark = self.mark();
            match c {
                b' ' | b'\t' | b'\r' => {
                    while matches!(self.peek(), Some(b' ') | Some(b'\t') | Some(b'\r')) {
                        self.bump();
                    }
                    out.push(Token::new(TokenKind::Space, mark));
                }
                b'\n' => {
                    self.bump();
                    out.push(Token::new(TokenKind::Newline, mark));
                }
                b'/' if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.bump();
                    }
                }
                b'/' if self.peek_at(1) == Some(b'*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => break,
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            _ => {
                                self.bump();
                            }
                        }
                    }
                }
                c if is_ident_start(c) => out.push(self.lex_ident(mark)),
                c if c.is_ascii_digit() => out.push(self.lex_number(mark)),
                b'"' => out.push(self.lex_string(mark)),
                b'\'' => out.push(self.lex_char(mark)),
                _ => out.push(self.lex_punct(mark)),
            }
        }
        out.push(Token::new(TokenKind::Eof, self.mark()));
        out
    }

    fn lex_ident(&mut self, mark: SourceMark) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_cont(c)) {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or("");
        if let Some(kw) = keyword_kind(text) {
            return Token::new(kw, mark);
        }
        Token::with_payload(TokenKind::Id, mark, Payload::Ident(Rc::from(text)))
    }

    fn lex_number(&mut self, mark: SourceMark) -> Token {
        let start = self.pos;
        let mut is_float = false;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.bump();
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.bump();
            }
        } else {
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
            if self.peek() == Some(b'.') {
                is_float = true;
                self.bump();
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
            }
            if matches!(self.peek(), Some(b'e') | Some(b'E')) {
                is_float = true;
                self.bump();
                if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                    self.bump();
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        let digits_end = self.pos;
        let mut has_u = false;
        let mut has_l = false;
        let mut has_ll = false;
        let mut has_f = false;
        loop {
            match self.peek() {
                Some(b'u') | Some(b'U') => {
                    has_u = true;
                    self.bump();
                }
                Some(b'f') | Some(b'F') => {
                    has_f = true;
                    is_float = true;
                    self.bump();
                }
                Some(b'l') | Some(b'L') => {
                    if has_l {
                        has_ll = true;
                    }
                    has_l = true;
                    self.bump();
                }
                _ => break,
            }
        }
        let digits = std::str::from_utf8(&self.src[start..digits_end]).unwrap_or("0");
        if is_float {
            let value: f64 = digits.parse().unwrap_or(0.0);
            Token::with_payload(
                TokenKind::FloatLit,
                mark,
                Payload::Float {
                    value,
                    suffix: FloatSuffix { has_f, has_l },
                },
            )
        } else {
            let value: i128 = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
                i128::from_str_radix(hex, 16).unwrap_or(0)
            } else {
                digits.parse().unwrap_or(0)
            };
            Token::with_payload(
                TokenKind::IntLit,
                mark,
                Payload::Int {
                    value,
                    suffix: IntSuffix { has_u, has_l, has_ll },
                },
            )
        }
    }

    fn lex_string(&mut self, mark: SourceMark) -> Token {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.getc() {
                None | Some(b'\n') => break,
                Some(b'"') => break,
                Some(b'\\') => {
                    if let Some(esc) = self.getc() {
                        s.push(unescape(esc));
                    }
                }
                Some(c) => s.push(c as char),
            }
        }
        Token::with_payload(TokenKind::Str, mark, Payload::Str(Rc::from(s.as_str())))
    }

    fn lex_char(&mut self, mark: SourceMark) -> Token {
        self.bump();
        let mut value = 0i128;
        loop {
            match self.getc() {
                None | Some(b'\n') | Some(b'\'') => break,
                Some(b'\\') => {
                    if let Some(esc) = self.getc() {
                        value = unescape(esc) as i128;
                    }
                }
                Some(c) => value = c as i128,
            }
        }
        Token::with_payload(
            TokenKind::IntLit,
            mark,
            Payload::Int {
                value,
                suffix: IntSuffix::default(),
            },
        )
    }

    fn lex_punct(&mut self, mark: SourceMark) -> Token {
        use TokenKind::*;
        macro_rules! two {
            ($a:expr, $b:expr, $two:expr, $one:expr) => {{
                self.bump();
                if self.peek() == Some($b) {
                    self.bump();
                    $two
                } else {
                    $one
                }
            }};
        }
        let c = self.peek().unwrap();
        let kind = match c {
            b'#' => {
                self.bump();
                if self.peek() == Some(b'#') {
                    self.bump();
                    HashHash
                } else {
                    Hash
                }
            }
            b'{' => { self.bump(); LBrace }
            b'}' => { self.bump(); RBrace }
            b'(' => { self.bump(); LParen }
            b')' => { self.bump(); RParen }
            b';' => { self.bump(); Semi }
            b',' => { self.bump(); Comma }
            b'[' => { self.bump(); LBrack }
            b']' => { self.bump(); RBrack }
            b'?' => { self.bump(); Cond }
            b':' => { self.bump(); Colon }
            b'~' => { self.bump(); Tilde }
            b'.' => {
                if self.peek_at(1) == Some(b'.') && self.peek_at(2) == Some(b'.') {
                    self.bump();
                    self.bump();
                    self.bump();
                    Ellipsis
                } else {
                    self.bump();
                    Dot
                }
            }
            b'-' => {
                self.bump();
                match self.peek() {
                    Some(b'>') => { self.bump(); Arrow }
                    Some(b'-') => { self.bump(); Dec }
                    Some(b'=') => { self.bump(); MinusEq }
                    _ => Minus,
                }
            }
            b'+' => {
                self.bump();
                match self.peek() {
                    Some(b'+') => { self.bump(); Inc }
                    Some(b'=') => { self.bump(); PlusEq }
                    _ => Plus,
                }
            }
            b'*' => two!(b'*', b'=', StarEq, Star),
            b'/' => two!(b'/', b'=', DivEq, Slash),
            b'%' => two!(b'%', b'=', ModEq, Percent),
            b'^' => two!(b'^', b'=', XorEq, Caret),
            b'=' => two!(b'=', b'=', Eq, Assign),
            b'!' => two!(b'!', b'=', Ne, LogicNot),
            b'&' => {
                self.bump();
                match self.peek() {
                    Some(b'&') => { self.bump(); LogicAnd }
                    Some(b'=') => { self.bump(); AndEq }
                    _ => Amp,
                }
            }
            b'|' => {
                self.bump();
                match self.peek() {
                    Some(b'|') => { self.bump(); LogicOr }
                    Some(b'=') => { self.bump(); OrEq }
                    _ => Pipe,
                }
            }
            b'<' => {
                self.bump();
                match self.peek() {
                    Some(b'<') => {
                        self.bump();
                        if self.peek() == Some(b'=') {
                            self.bump();
                            LShiftEq
                        } else {
                            LShift
                        }
                    }
                    Some(b'=') => { self.bump(); Le }
                    _ => Lt,
                }
            }
            b'>' => {
                self.bump();
                match self.peek() {
                    Some(b'>') => {
                        self.bump();
                        if self.peek() == Some(b'=') {
                            self.bump();
                            RShiftEq
                        } else {
                            RShift
                        }
                    }
                    Some(b'=') => { self.bump(); Ge }
                    _ => Gt,
                }
            }
            _ => {
                self.bump();
                Id // unrecognised byte: surfaced as a syntax error upstream
            }
        };
        Token::new(kind, mark)
    }
}

fn unescape(c: u8) -> char {
    match c {
        b'n' => '\n',
        b't' => '\t',
        b'r' => '\r',
        b'0' => '\0',
        b'\\' => '\\',
        b'\'' => '\'',
        b'"' => '"',
        other => other as char,
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_cont(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn keyword_kind(s: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match s {
        "auto" => Auto,
        "break" => Break,
        "case" => Case,
        "const" => Const,
        "continue" => Continue,
        "default" => Default,
        "do" => Do,
        "else" => Else,
        "enum" => Enum,
        "extern" => Extern,
        "for" => For,
        "goto" => Goto,
        "if" => If,
        "inline" => Inline,
        "register" => Register,
        "restrict" => Restrict,
        "return" => Return,
        "sizeof" => Sizeof,
        "static" => Static,
        "struct" => Struct,
        "switch" => Switch,
        "typedef" => Typedef,
        "union" => Union,
        "volatile" => Volatile,
        "while" => While,
        "_Alignas" => Alignas,
        "_Alignof" | "__alignof__" => Alignof,
        "_Bool" => Bool,
        "_Complex" => Complex,
        "_Generic" => Generic,
        "_Imaginary" => Imaginary,
        "_Static_assert" => StaticAssert,
        "_Thread_local" => ThreadLocal,
        "__builtin_offsetof" => BuiltinOffsetof,
        "__builtin_va_list" => BuiltinVaList,
        "__builtin_va_start" => BuiltinVaStart,
        "__builtin_va_arg" => BuiltinVaArg,
        "__builtin_va_end" => BuiltinVaEnd,
        "__builtin_va_copy" => BuiltinVaCopy,
        "void" => Void,
        "char" => Char,
        "short" => Short,
        "int" => Int,
        "long" => Long,
        "unsigned" => Unsigned,
        "signed" => Signed,
        "double" => Double,
        "float" => Float,
        "__func__" | "__FUNCTION__" => Func,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<Token> {
        Lexer::new(src, Rc::from("test.c"), None).lex_all()
    }

    #[test]
    fn lexes_hello_world_shape() {
        let toks = lex("int main(void){return 0;}");
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Int,
                TokenKind::Id,
                TokenKind::LParen,
                TokenKind::Void,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::Return,
                TokenKind::IntLit,
                TokenKind::Semi,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn splices_backslash_newline() {
        let toks = lex("int\\\nmain");
        assert_eq!(toks[0].kind, TokenKind::Int);
        assert_eq!(toks[1].kind, TokenKind::Id);
    }

    #[test]
    fn hash_hash_combines() {
        let toks = lex("##");
        assert_eq!(toks[0].kind, TokenKind::HashHash);
    }
}
