//! Source marks: `{file, line_start, line, column, previous_mark}`.
//!
//! The `previous` link forms a stack used to report include and
//! macro-expansion contexts (so a diagnostic inside a macro expanded from
//! an included file can show the whole chain). Grounded on
//! `original_source/src/util/file_mark.h` (`fmark_t`).

use std::fmt;
use std::rc::Rc;

/// Pseudo-filename used for predefined/builtin tokens that have no real
/// source location, matching `original_source`'s `BUILT_IN_FILENAME`.
pub const BUILT_IN_FILENAME: &str = "<built-in>";
/// Pseudo-filename used for `-D`/`-U` command-line macro definitions.
pub const COMMAND_LINE_FILENAME: &str = "<command-line>";

#[derive(Debug, Clone, PartialEq, Eq)]
struct MarkData {
    file: Rc<str>,
    line: u32,
    column: u32,
    previous: Option<SourceMark>,
}

/// A location in a file, interned behind an `Rc` so that copying a token
/// (common during macro substitution) is O(1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMark(Rc<MarkData>);

impl SourceMark {
    pub fn new(file: Rc<str>, line: u32, column: u32, previous: Option<SourceMark>) -> Self {
        SourceMark(Rc::new(MarkData {
            file,
            line,
            column,
            previous,
        }))
    }

    pub fn built_in() -> Self {
        SourceMark::new(Rc::from(BUILT_IN_FILENAME), 0, 0, None)
    }

    pub fn command_line() -> Self {
        SourceMark::new(Rc::from(COMMAND_LINE_FILENAME), 0, 0, None)
    }

    /// A mark with no meaningful location, used by unit tests that build
    /// tokens/IR by hand rather than through the lexer.
    pub fn synthetic() -> Self {
        SourceMark::new(Rc::from("<test>"), 1, 1, None)
    }

    pub fn file(&self) -> &str {
        &self.0.file
    }

    pub fn line(&self) -> u32 {
        self.0.line
    }

    pub fn column(&self) -> u32 {
        self.0.column
    }

    pub fn previous(&self) -> Option<&SourceMark> {
        self.0.previous.as_ref()
    }

    /// A mark at the same file with an advanced line/column, chained to
    /// `self` as `previous` only when entering a nested context (include,
    /// macro expansion); for plain same-file advance the previous link is
    /// carried through unchanged.
    pub fn advance(&self, line: u32, column: u32) -> Self {
        SourceMark::new(self.0.file.clone(), line, column, self.0.previous.clone())
    }

    /// Push a new context (e.g. entering an `#include`d file or a macro
    /// expansion) with `self` as the resuming point.
    pub fn push(&self, file: Rc<str>, line: u32, column: u32) -> Self {
        SourceMark::new(file, line, column, Some(self.clone()))
    }
}

impl fmt::Display for SourceMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file(), self.line(), self.column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop_context() {
        let root = SourceMark::new(Rc::from("main.c"), 3, 1, None);
        let inc = root.push(Rc::from("header.h"), 1, 1);
        assert_eq!(inc.file(), "header.h");
        assert_eq!(inc.previous().unwrap().file(), "main.c");
        assert_eq!(inc.previous().unwrap().line(), 3);
    }

    #[test]
    fn advance_keeps_previous() {
        let root = SourceMark::new(Rc::from("main.c"), 1, 1, None);
        let inc = root.push(Rc::from("header.h"), 1, 1);
        let inc2 = inc.advance(2, 1);
        assert_eq!(inc2.previous().unwrap().file(), "main.c");
    }
}
