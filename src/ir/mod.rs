//! Typed LLVM-IR-subset model (spec.md §3, §4.3).
//!
//! This module owns the in-memory representation emitted by `translate`
//! and consumed by `printer`: types with identity-based named structs,
//! an SSA-ish value algebra with a shape-derivable type, statements, and
//! the per-function/per-unit containers that own them.

pub mod arena;
pub mod function;
pub mod printer;
pub mod stmt;
pub mod symtab;
pub mod types;
pub mod unit;
pub mod value;

pub use arena::{Arena, ArenaId};
pub use function::Function;
pub use printer::print_module;
pub use stmt::{Label, Stmt};
pub use symtab::SymTab;
pub use types::{IrType, StructId, StructKind, StructTable};
pub use unit::{PendingGlobal, TranslationUnit};
pub use value::{BinOp, Const, ConvertKind, FloatCond, IntCond, Value};
