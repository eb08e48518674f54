use crate::operator::{BinaryOp, UnaryOp};
use std::fmt::{self, Display};
use thiserror::Error;

/// The sort of an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Int,
    Bool,
    BitVector(u32),
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Bool => write!(f, "Bool"),
            Type::BitVector(width) => write!(f, "(_ BitVec {})", width),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("`{op}` expects {expected}, found {found}")]
    UnaryMismatch {
        op: UnaryOp,
        expected: &'static str,
        found: Type,
    },
    #[error("`{op}` expects {expected}, found {lhs} and {rhs}")]
    BinaryMismatch {
        op: BinaryOp,
        expected: &'static str,
        lhs: Type,
        rhs: Type,
    },
    #[error("`{op}` operands have different widths: {lhs} and {rhs}")]
    WidthMismatch { op: BinaryOp, lhs: u32, rhs: u32 },
    #[error("`ite` condition must be Bool, found {0}")]
    NonBooleanCondition(Type),
    #[error("`ite` branches differ: {0} and {1}")]
    BranchMismatch(Type, Type),
    #[error("constraint must be Bool, found {0}")]
    NotAFormula(Type),
    #[error("bit-vector width must be in 1..=64, found {0}")]
    InvalidWidth(u32),
}
