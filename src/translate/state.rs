//! Control-flow state threaded down the statement-translation recursion
//! (spec.md §9 "the source's scattered flags... must be carried in a
//! `TransState` struct passed by mutable reference down the recursion").
//!
//! The source's `break_count`/`in_switch`/`branch_next_labeled`/
//! `cur_case_jumps` bookkeeping collapses here into `break_target` and
//! `continue_target` alone: a `switch` rebinds only `break_target`
//! (`continue` passes through to the enclosing loop, exactly like C), so
//! tracking "are we in a switch" separately from "what does break target"
//! is redundant once both are carried explicitly.
//!
//! `ignore_until_label` is the third piece (spec.md §9): once a statement
//! unconditionally transfers control away, every statement translated
//! after it is unreachable and must not emit IR of its own until a
//! `Labeled` statement is reached (a `goto` can still target a label
//! buried inside dead code).

use crate::ir::stmt::Label;

#[derive(Clone, Default)]
pub struct TransState {
    pub break_target: Option<Label>,
    pub continue_target: Option<Label>,
    pub ignore_until_label: bool,
}

impl TransState {
    pub fn new() -> Self {
        TransState::default()
    }

    pub fn with_loop(&self, break_target: Label, continue_target: Label) -> Self {
        TransState {
            break_target: Some(break_target),
            continue_target: Some(continue_target),
            ignore_until_label: self.ignore_until_label,
        }
    }

    pub fn with_break(&self, break_target: Label) -> Self {
        TransState {
            break_target: Some(break_target),
            continue_target: self.continue_target.clone(),
            ignore_until_label: self.ignore_until_label,
        }
    }
}
