//! IR statement algebra (spec.md §3 "IR statement").

use super::types::IrType;
use super::value::Value;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Label(pub Rc<str>);

impl Label {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Label(Label),
    /// A value computed only for its side effects (a bare `call`).
    Expr(Value),
    Ret {
        ty: IrType,
        val: Option<Value>,
    },
    Br {
        cond: Option<Value>,
        targets: Vec<Label>,
    },
    Switch {
        expr: Value,
        default: Label,
        cases: Vec<(Value, Label)>,
    },
    IndirBr {
        addr: Value,
        possible: Vec<Label>,
    },
    Assign {
        dest: Value,
        src: Value,
    },
    Store {
        ty: IrType,
        val: Value,
        ptr: Value,
    },
}

impl Stmt {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Stmt::Ret { .. } | Stmt::Br { .. } | Stmt::Switch { .. } | Stmt::IndirBr { .. })
    }

    pub fn is_label(&self) -> bool {
        matches!(self, Stmt::Label(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ret_and_br_are_terminators_label_is_not() {
        assert!(Stmt::Ret { ty: IrType::Void, val: None }.is_terminator());
        assert!(Stmt::Br { cond: None, targets: vec![Label(Rc::from("L"))] }.is_terminator());
        assert!(!Stmt::Label(Label(Rc::from("L"))).is_terminator());
    }
}
