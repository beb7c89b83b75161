//! AST type algebra (spec.md §3 "AST", §9 "Tagged unions").
//!
//! Grounded on `original_source/src/parser/ast.h`'s `type_t` tagged union,
//! reshaped into a Rust sum type. Struct/union member lists carry an
//! optional bit-width so the translator's bitfield lowering (spec.md §4.2)
//! has what it needs without a second lookup.

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeQuals {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructOrUnion {
    Struct,
    Union,
}

/// One member of a struct/union, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: Rc<str>,
    pub ty: Rc<CType>,
    /// `Some(n)` for `name : n;` bitfield members; zero-width anonymous
    /// members (`: 0;`) terminate the current byte run (spec.md §4.2
    /// "Bitfield lowering").
    pub bit_width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumConst {
    pub name: Rc<str>,
    pub value: i128,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<Rc<str>>,
    pub ty: Rc<CType>,
}

/// Source-level C type. Distinct from [`crate::ir::IrType`]: this tree
/// retains tag names and qualifiers the translator needs to look up
/// members and decide conversions; it is lowered to `IrType` once during
/// translation (`translate::type_lower`).
#[derive(Debug, Clone, PartialEq)]
pub enum CType {
    Void,
    Bool,
    Char { unsigned: bool },
    Short { unsigned: bool },
    Int { unsigned: bool },
    Long { unsigned: bool },
    LongLong { unsigned: bool },
    Float,
    Double,
    LongDouble,
    /// Named or anonymous struct/union. `members` is `None` for a
    /// forward-declared (incomplete) tag.
    Record {
        kind: StructOrUnion,
        tag: Option<Rc<str>>,
        members: Option<Rc<Vec<Member>>>,
    },
    Enum {
        tag: Option<Rc<str>>,
        constants: Rc<Vec<EnumConst>>,
    },
    Ptr(Rc<CType>),
    /// `len = None` for an incomplete array type (`extern int a[];`) or a
    /// function parameter's decayed `T[]` (§6.7.6.3).
    Array { elem: Rc<CType>, len: Option<u64> },
    Func {
        ret: Rc<CType>,
        params: Rc<Vec<Param>>,
        /// ANSI `(...)` variadic tail. K&R-style empty `()` parameter
        /// lists are represented as `params: []`, `variadic: false`,
        /// `unspecified: true` — a legal "unspecified parameters"
        /// prototype distinct from a zero-argument `(void)` prototype
        /// (SPEC_FULL.md §4.2 supplement).
        variadic: bool,
        unspecified: bool,
    },
    /// `__builtin_va_list`: pointer to one element of
    /// `%struct.__va_list_tag` (spec.md §9 "`va_list` representation").
    VaList,
    Typedef { name: Rc<str>, underlying: Rc<CType> },
}

impl CType {
    pub fn with_quals(self, _quals: TypeQuals) -> CType {
        self
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            CType::Bool
                | CType::Char { .. }
                | CType::Short { .. }
                | CType::Int { .. }
                | CType::Long { .. }
                | CType::LongLong { .. }
                | CType::Enum { .. }
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, CType::Float | CType::Double | CType::LongDouble)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, CType::Ptr(_))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, CType::Record { .. } | CType::Array { .. })
    }

    pub fn is_unsigned(&self) -> bool {
        match self {
            CType::Char { unsigned }
            | CType::Short { unsigned }
            | CType::Int { unsigned }
            | CType::Long { unsigned }
            | CType::LongLong { unsigned } => *unsigned,
            CType::Bool => true,
            _ => false,
        }
    }

    /// Strips one level of `Typedef` without recursing into pointee/array
    /// element types — most callers want exactly one level of unwrapping
    /// at a time so chained typedefs still resolve via repeated calls.
    pub fn unwrap_typedef(&self) -> &CType {
        match self {
            CType::Typedef { underlying, .. } => underlying.unwrap_typedef(),
            other => other,
        }
    }

    /// A strict ranking used by the typechecker's `type_max` (usual
    /// arithmetic conversions, spec.md §4.2). Higher wins; ties with
    /// differing signedness favour unsigned, matching C11 §6.3.1.8.
    pub fn arithmetic_rank(&self) -> u8 {
        match self.unwrap_typedef() {
            CType::Bool => 0,
            CType::Char { .. } => 1,
            CType::Short { .. } => 2,
            CType::Int { .. } | CType::Enum { .. } => 3,
            CType::Long { .. } => 4,
            CType::LongLong { .. } => 5,
            CType::Float => 6,
            CType::Double => 7,
            CType::LongDouble => 8,
            _ => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typedef_unwraps_to_underlying() {
        let ty = CType::Typedef { name: Rc::from("u32"), underlying: Rc::new(CType::Int { unsigned: true }) };
        assert_eq!(ty.unwrap_typedef(), &CType::Int { unsigned: true });
        assert!(ty.unwrap_typedef().is_unsigned());
    }

    #[test]
    fn double_outranks_int() {
        assert!(CType::Double.arithmetic_rank() > CType::Int { unsigned: false }.arithmetic_rank());
    }
}
