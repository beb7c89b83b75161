//! The preprocessor: directive dispatch, conditional compilation, macro
//! expansion, and `#include` resolution, tied together into one entry
//! point that turns a root source file into a flat, directive-free token
//! vector ready for the parser (spec.md §4.1).

pub mod conditional;
pub mod directives;
pub mod expand;
pub mod include;
pub mod macros;
pub mod predefined;

use conditional::ConditionalStack;
use include::{FileLoader, IncludeForm, IncludeSearch, RealFileLoader};
use macros::MacroTable;

use crate::diagnostics::Diagnostics;
use crate::lex::Lexer;
use crate::mark::SourceMark;
use crate::token::{Token, TokenKind};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Active `#line` remapping: physical line `base_line` of `base_file` is
/// reported as `declared_line` (optionally under `declared_file`).
struct LineOverride {
    base_line: u32,
    declared_line: u32,
    declared_file: Option<Rc<str>>,
}

pub struct Preprocessor {
    pub macros: MacroTable,
    cond: ConditionalStack,
    search: IncludeSearch,
    loader: Box<dyn FileLoader>,
    line_override: Option<LineOverride>,
}

impl Preprocessor {
    pub fn new(user_include_paths: Vec<PathBuf>) -> Self {
        Preprocessor {
            macros: predefined::predefined_macros(),
            cond: ConditionalStack::new(),
            search: IncludeSearch::new(user_include_paths),
            loader: Box::new(RealFileLoader),
            line_override: None,
        }
    }

    pub fn with_loader(user_include_paths: Vec<PathBuf>, loader: Box<dyn FileLoader>) -> Self {
        Preprocessor {
            macros: predefined::predefined_macros(),
            cond: ConditionalStack::new(),
            search: IncludeSearch::new(user_include_paths),
            loader,
            line_override: None,
        }
    }

    /// Installs a `-D NAME[=value]` command-line definition (spec.md §6).
    pub fn define_command_line(&mut self, name: &str, value: Option<&str>, diags: &mut Diagnostics) {
        let body_src = value.unwrap_or("1");
        let mut toks = Lexer::new(body_src, Rc::from(crate::mark::COMMAND_LINE_FILENAME), None).lex_all();
        toks.retain(|t| t.kind != TokenKind::Eof);
        if let Err(existing) = self.macros.define(macros::Macro {
            name: Rc::from(name),
            arity: macros::Arity::ObjectLike,
            body: toks,
        }) {
            diags.warn(None, format!("redefinition of command-line macro \"{}\" (was {:?})", name, existing.name));
        }
    }

    pub fn undef_command_line(&mut self, name: &str) {
        self.macros.undef(name);
    }

    /// Preprocesses `path` (and everything it transitively `#include`s)
    /// into one flat, macro-expanded, directive-free, whitespace-free
    /// token vector.
    ///
    /// Expansion is interleaved with directive dispatch line by line (via
    /// [`expand::StreamExpander`]), not deferred to a single pass over the
    /// whole file: a `#define`/`#undef` must take effect for the lines
    /// scanned after it and not for the ones already expanded before it,
    /// the same way `cpp_expand` looks macros up per-token in one pass
    /// that also mutates the table.
    pub fn preprocess_file(&mut self, path: &Path, diags: &mut Diagnostics) -> Vec<Token> {
        tracing::debug!(file = %path.display(), "preprocessing");
        let raw = self.read_and_lex(path, None, diags);
        let mut out = Vec::new();
        let mut expander = expand::StreamExpander::new();
        self.process_lines(raw, path, diags, &mut expander, &mut out);
        if self.cond.depth() != 0 {
            diags.error(None, format!("unterminated conditional directive in {}", path.display()));
        }
        expander.finish(diags);
        tracing::trace!(file = %path.display(), tokens = out.len(), "preprocessing finished");
        out
    }

    fn read_and_lex(&self, path: &Path, including_mark: Option<SourceMark>, diags: &mut Diagnostics) -> Vec<Token> {
        match self.loader.read_to_string(path) {
            Ok(text) => {
                let file_name: Rc<str> = Rc::from(path.to_string_lossy().as_ref());
                Lexer::new(&text, file_name, including_mark).lex_all()
            }
            Err(e) => {
                diags.error(including_mark, format!("{}: {}", path.display(), e));
                Vec::new()
            }
        }
    }

    /// Walks physical lines, dispatching `#`-lines as directives (which may
    /// mutate `self.macros`) and feeding everything else through `expander`
    /// only while the conditional stack is active, so each line is
    /// macro-expanded against the table's state as of that exact line.
    /// Recursively inlines `#include`d files at the point of inclusion,
    /// sharing the same `expander` so a function-like call can still be
    /// split across an include boundary and so macros the included file
    /// defines are visible to the includer's remaining lines.
    fn process_lines(
        &mut self,
        tokens: Vec<Token>,
        current_file: &Path,
        diags: &mut Diagnostics,
        expander: &mut expand::StreamExpander,
        out: &mut Vec<Token>,
    ) {
        let mut i = 0usize;
        while i < tokens.len() {
            if tokens[i].kind == TokenKind::Eof {
                break;
            }
            let line_start = i;
            while i < tokens.len() && !matches!(tokens[i].kind, TokenKind::Newline | TokenKind::Eof) {
                i += 1;
            }
            let mut line = tokens[line_start..i].to_vec();
            if i < tokens.len() && tokens[i].kind == TokenKind::Newline {
                i += 1;
            }
            self.apply_line_override(&mut line);

            let first_non_ws = line.iter().position(|t| !t.is_whitespace());
            let is_directive = first_non_ws.map(|idx| line[idx].kind == TokenKind::Hash).unwrap_or(false);
            if is_directive {
                let hash_idx = first_non_ws.unwrap();
                let rest = &line[hash_idx + 1..];
                self.handle_directive(rest, current_file, diags, expander, out);
                continue;
            }

            if self.cond.is_active() {
                expander.feed_line(line, &self.macros, diags, out);
            }
        }
    }

    fn apply_line_override(&self, line: &mut [Token]) {
        let Some(ov) = &self.line_override else { return };
        for t in line.iter_mut() {
            let orig_line = t.mark.line();
            let new_line = ov.declared_line + orig_line.saturating_sub(ov.base_line);
            let file = ov.declared_file.clone().unwrap_or_else(|| Rc::from(t.mark.file()));
            t.mark = SourceMark::new(file, new_line, t.mark.column(), t.mark.previous().cloned());
        }
    }

    fn handle_directive(
        &mut self,
        rest: &[Token],
        current_file: &Path,
        diags: &mut Diagnostics,
        expander: &mut expand::StreamExpander,
        out: &mut Vec<Token>,
    ) {
        let Some((name, after)) = directives::directive_name(rest) else {
            // A bare '#' with nothing (or only whitespace) after it is a
            // legal null directive.
            return;
        };
        let body = &rest[after..];
        let active = self.cond.is_active();

        match name {
            "if" => {
                if active {
                    let expanded = expand::expand_tokens(body.to_vec(), &self.macros, diags);
                    let resolved = directives::resolve_defined(&expanded, &self.macros);
                    let mark = body.first().map(|t| t.mark.clone()).unwrap_or_else(SourceMark::synthetic);
                    let cond = directives::eval_condition(&resolved, mark, diags);
                    self.cond.push_if(cond);
                } else {
                    self.cond.push_if(false);
                }
            }
            "ifdef" | "ifndef" => {
                if active {
                    let i = body.iter().position(|t| !t.is_whitespace());
                    let defined = i.and_then(|i| body[i].ident_name()).map(|n| self.macros.is_defined(n)).unwrap_or(false);
                    let cond = if name == "ifdef" { defined } else { !defined };
                    self.cond.push_if(cond);
                } else {
                    self.cond.push_if(false);
                }
            }
            "elif" => {
                let expanded = expand::expand_tokens(body.to_vec(), &self.macros, diags);
                let resolved = directives::resolve_defined(&expanded, &self.macros);
                let mark = body.first().map(|t| t.mark.clone()).unwrap_or_else(SourceMark::synthetic);
                let cond = directives::eval_condition(&resolved, mark, diags);
                if let Err(msg) = self.cond.elif(cond) {
                    diags.error(None, msg);
                }
            }
            "else" => {
                if let Err(msg) = self.cond.else_branch() {
                    diags.error(None, msg);
                }
            }
            "endif" => {
                if let Err(msg) = self.cond.endif() {
                    diags.error(None, msg);
                }
            }
            _ if !active => {
                // Every other directive is a no-op inside a skipped branch.
            }
            "define" => {
                if let Some(m) = directives::parse_define(body, diags) {
                    if let Err(existing) = self.macros.define(m) {
                        diags.warn(None, format!("redefinition of macro \"{}\" with a different body", existing.name));
                    }
                }
            }
            "undef" => {
                if let Some(n) = directives::parse_undef(body, diags) {
                    let owned = n.to_string();
                    self.macros.undef(&owned);
                }
            }
            "include" => {
                if let Some((target, form)) = directives::parse_include_target(body, diags) {
                    self.include_file(&target, form, current_file, diags, expander, out);
                }
            }
            "error" => {
                diags.error(None, format!("#error {}", directives::directive_message(body)));
            }
            "warning" => {
                diags.warn(None, format!("#warning {}", directives::directive_message(body)));
            }
            "pragma" => {
                // Unrecognised pragmas are accepted and ignored (spec.md
                // §4.1); we don't implement any pragma with translator
                // effect (e.g. `pack`) so every one falls in that bucket.
            }
            "line" => {
                if let Some((n, filename)) = directives::parse_line_directive(body, diags) {
                    let base = body.first().map(|t| t.mark.line()).unwrap_or(1);
                    self.line_override = Some(LineOverride {
                        base_line: base + 1,
                        declared_line: n,
                        declared_file: filename,
                    });
                }
            }
            other => {
                diags.error(None, format!("unknown preprocessing directive #{}", other));
            }
        }
    }

    fn include_file(
        &mut self,
        target: &str,
        form: IncludeForm,
        current_file: &Path,
        diags: &mut Diagnostics,
        expander: &mut expand::StreamExpander,
        out: &mut Vec<Token>,
    ) {
        let dir = current_file.parent().unwrap_or_else(|| Path::new("."));
        let Some(resolved) = self.search.resolve(self.loader.as_ref(), target, form, dir) else {
            diags.error(None, format!("'{}' file not found", target));
            return;
        };
        tracing::trace!(target, resolved = %resolved.display(), "including");
        let raw = self.read_and_lex(&resolved, None, diags);
        let saved_override = self.line_override.take();
        self.process_lines(raw, &resolved, diags, expander, out);
        self.line_override = saved_override;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use include::FileLoader;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct MemLoader(RefCell<HashMap<PathBuf, String>>);

    impl FileLoader for MemLoader {
        fn read_to_string(&self, path: &Path) -> std::io::Result<Rc<str>> {
            self.0
                .borrow()
                .get(path)
                .cloned()
                .map(Rc::from)
                .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
        }
        fn is_file(&self, path: &Path) -> bool {
            self.0.borrow().contains_key(path)
        }
    }

    fn run(files: &[(&str, &str)], root: &str) -> (Vec<Token>, Diagnostics) {
        let mut map = HashMap::new();
        for (name, text) in files {
            map.insert(PathBuf::from(name), text.to_string());
        }
        let mut pp = Preprocessor::with_loader(vec![], Box::new(MemLoader(RefCell::new(map))));
        let mut diags = Diagnostics::new(false);
        let toks = pp.preprocess_file(Path::new(root), &mut diags);
        (toks, diags)
    }

    fn spellings(toks: &[Token]) -> Vec<String> {
        toks.iter().filter(|t| !t.is_whitespace()).map(|t| t.spelling()).collect()
    }

    #[test]
    fn object_macro_expands_through_pipeline() {
        let (toks, diags) = run(&[("a.c", "#define N 3\nint x = N;\n")], "a.c");
        assert!(!diags.has_errors());
        assert_eq!(spellings(&toks), vec!["int", "x", "=", "3", ";"]);
    }

    #[test]
    fn ifdef_skips_untaken_branch() {
        let src = "#define FOO\n#ifdef FOO\nint a;\n#else\nint b;\n#endif\n";
        let (toks, diags) = run(&[("a.c", src)], "a.c");
        assert!(!diags.has_errors());
        assert_eq!(spellings(&toks), vec!["int", "a", ";"]);
    }

    #[test]
    fn include_inlines_the_target_file() {
        let (toks, diags) = run(
            &[("a.c", "#include \"b.h\"\nint x;\n"), ("b.h", "int y;\n")],
            "a.c",
        );
        assert!(!diags.has_errors());
        assert_eq!(spellings(&toks), vec!["int", "y", ";", "int", "x", ";"]);
    }

    #[test]
    fn undefined_include_is_an_error() {
        let (_, diags) = run(&[("a.c", "#include \"missing.h\"\n")], "a.c");
        assert!(diags.has_errors());
    }

    #[test]
    fn error_directive_in_active_branch_is_reported() {
        let (_, diags) = run(&[("a.c", "#error boom\n")], "a.c");
        assert!(diags.has_errors());
    }

    #[test]
    fn error_directive_in_skipped_branch_is_not_reported() {
        let src = "#if 0\n#error boom\n#endif\n";
        let (_, diags) = run(&[("a.c", src)], "a.c");
        assert!(!diags.has_errors());
    }

    #[test]
    fn redefinition_between_uses_expands_each_against_its_own_state() {
        // Each use of X must see the table as it stood at that point in
        // the scan, not the table's state once the whole file is done.
        let src = "#define X 1\nint a = X;\n#undef X\n#define X 2\nint b = X;\n";
        let (toks, diags) = run(&[("a.c", src)], "a.c");
        assert!(!diags.has_errors());
        assert_eq!(
            spellings(&toks),
            vec!["int", "a", "=", "1", ";", "int", "b", "=", "2", ";"]
        );
    }
}
