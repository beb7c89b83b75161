//! Abstract syntax tree and its recursive-descent parser (spec.md §2 "AST").
//!
//! The AST is produced from the preprocessor's flat token vector; each
//! node is untyped (`etype` slots empty) until `typeck` annotates it.

pub mod decl;
pub mod expr;
pub mod parser;
pub mod stmt;
pub mod types;

pub use decl::{Decl, FuncDecl, Program, StorageClass, VarDecl};
pub use expr::{BinOp, Expr, ExprKind, IncDecOp, Literal, UnOp};
pub use parser::{parse_program, ParseError};
pub use stmt::{Stmt, StmtKind, SwitchCase};
pub use types::{CType, EnumConst, Member, Param, StructOrUnion, TypeQuals};
