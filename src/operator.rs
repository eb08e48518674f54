use crate::types::{Type, TypeError};
use std::fmt::{self, Display};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    // Integer negation.
    Neg,

    // Boolean negation.
    Not,

    // Bit-vector complement and two's complement negation.
    BvNot,
    BvNeg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Integer arithmetic.
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Integer relations.
    Lt,
    Le,
    Gt,
    Ge,

    // Polymorphic equality.
    Eq,

    // Boolean connectives.
    And,
    Or,
    Implies,
    Iff,

    // Bit-vector arithmetic.
    BvAdd,
    BvSub,
    BvMul,
    BvUDiv,
    BvSDiv,
    BvURem,
    BvSRem,
    BvSMod,
    BvAnd,
    BvOr,
    BvXor,
    BvShl,
    BvLShr,
    BvAShr,

    // Bit-vector relations.
    BvULt,
    BvULe,
    BvUGt,
    BvUGe,
    BvSLt,
    BvSLe,
    BvSGt,
    BvSGe,
}

impl UnaryOp {
    pub fn result_type(&self, operand: Type) -> Result<Type, TypeError> {
        let mismatch = |expected| TypeError::UnaryMismatch {
            op: *self,
            expected,
            found: operand,
        };
        match (self, operand) {
            (UnaryOp::Neg, Type::Int) => Ok(Type::Int),
            (UnaryOp::Neg, _) => Err(mismatch("Int")),
            (UnaryOp::Not, Type::Bool) => Ok(Type::Bool),
            (UnaryOp::Not, _) => Err(mismatch("Bool")),
            (UnaryOp::BvNot, Type::BitVector(w)) | (UnaryOp::BvNeg, Type::BitVector(w)) => {
                Ok(Type::BitVector(w))
            }
            (UnaryOp::BvNot, _) | (UnaryOp::BvNeg, _) => Err(mismatch("a bit-vector")),
        }
    }
}

impl BinaryOp {
    pub fn is_bit_vector(&self) -> bool {
        matches!(
            self,
            BinaryOp::BvAdd
                | BinaryOp::BvSub
                | BinaryOp::BvMul
                | BinaryOp::BvUDiv
                | BinaryOp::BvSDiv
                | BinaryOp::BvURem
                | BinaryOp::BvSRem
                | BinaryOp::BvSMod
                | BinaryOp::BvAnd
                | BinaryOp::BvOr
                | BinaryOp::BvXor
                | BinaryOp::BvShl
                | BinaryOp::BvLShr
                | BinaryOp::BvAShr
                | BinaryOp::BvULt
                | BinaryOp::BvULe
                | BinaryOp::BvUGt
                | BinaryOp::BvUGe
                | BinaryOp::BvSLt
                | BinaryOp::BvSLe
                | BinaryOp::BvSGt
                | BinaryOp::BvSGe
        )
    }

    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::Eq
                | BinaryOp::BvULt
                | BinaryOp::BvULe
                | BinaryOp::BvUGt
                | BinaryOp::BvUGe
                | BinaryOp::BvSLt
                | BinaryOp::BvSLe
                | BinaryOp::BvSGt
                | BinaryOp::BvSGe
        )
    }

    pub fn result_type(&self, lhs: Type, rhs: Type) -> Result<Type, TypeError> {
        let mismatch = |expected| TypeError::BinaryMismatch {
            op: *self,
            expected,
            lhs,
            rhs,
        };
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                match (lhs, rhs) {
                    (Type::Int, Type::Int) => Ok(Type::Int),
                    _ => Err(mismatch("Int operands")),
                }
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => match (lhs, rhs) {
                (Type::Int, Type::Int) => Ok(Type::Bool),
                _ => Err(mismatch("Int operands")),
            },
            BinaryOp::Eq => match (lhs, rhs) {
                (Type::BitVector(l), Type::BitVector(r)) if l != r => {
                    Err(TypeError::WidthMismatch {
                        op: *self,
                        lhs: l,
                        rhs: r,
                    })
                }
                _ if lhs == rhs => Ok(Type::Bool),
                _ => Err(mismatch("operands of one type")),
            },
            BinaryOp::And | BinaryOp::Or | BinaryOp::Implies | BinaryOp::Iff => {
                match (lhs, rhs) {
                    (Type::Bool, Type::Bool) => Ok(Type::Bool),
                    _ => Err(mismatch("Bool operands")),
                }
            }
            _ => match (lhs, rhs) {
                (Type::BitVector(l), Type::BitVector(r)) if l != r => {
                    Err(TypeError::WidthMismatch {
                        op: *self,
                        lhs: l,
                        rhs: r,
                    })
                }
                (Type::BitVector(w), Type::BitVector(_)) => {
                    if self.is_relation() {
                        Ok(Type::Bool)
                    } else {
                        Ok(Type::BitVector(w))
                    }
                }
                _ => Err(mismatch("bit-vector operands")),
            },
        }
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "not"),
            UnaryOp::BvNot => write!(f, "bvnot"),
            UnaryOp::BvNeg => write!(f, "bvneg"),
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "div"),
            BinaryOp::Mod => write!(f, "mod"),
            BinaryOp::Lt => write!(f, "<"),
            BinaryOp::Le => write!(f, "<="),
            BinaryOp::Gt => write!(f, ">"),
            BinaryOp::Ge => write!(f, ">="),
            BinaryOp::Eq => write!(f, "="),
            BinaryOp::And => write!(f, "and"),
            BinaryOp::Or => write!(f, "or"),
            BinaryOp::Implies => write!(f, "=>"),
            BinaryOp::Iff => write!(f, "iff"),
            BinaryOp::BvAdd => write!(f, "bvadd"),
            BinaryOp::BvSub => write!(f, "bvsub"),
            BinaryOp::BvMul => write!(f, "bvmul"),
            BinaryOp::BvUDiv => write!(f, "bvudiv"),
            BinaryOp::BvSDiv => write!(f, "bvsdiv"),
            BinaryOp::BvURem => write!(f, "bvurem"),
            BinaryOp::BvSRem => write!(f, "bvsrem"),
            BinaryOp::BvSMod => write!(f, "bvsmod"),
            BinaryOp::BvAnd => write!(f, "bvand"),
            BinaryOp::BvOr => write!(f, "bvor"),
            BinaryOp::BvXor => write!(f, "bvxor"),
            BinaryOp::BvShl => write!(f, "bvshl"),
            BinaryOp::BvLShr => write!(f, "bvlshr"),
            BinaryOp::BvAShr => write!(f, "bvashr"),
            BinaryOp::BvULt => write!(f, "bvult"),
            BinaryOp::BvULe => write!(f, "bvule"),
            BinaryOp::BvUGt => write!(f, "bvugt"),
            BinaryOp::BvUGe => write!(f, "bvuge"),
            BinaryOp::BvSLt => write!(f, "bvslt"),
            BinaryOp::BvSLe => write!(f, "bvsle"),
            BinaryOp::BvSGt => write!(f, "bvsgt"),
            BinaryOp::BvSGe => write!(f, "bvsge"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_operator() {
        assert_eq!(BinaryOp::BvLShr.to_string(), "bvlshr");
        assert_eq!(UnaryOp::Neg.to_string(), "-");
    }

    #[test]
    fn arithmetic_rejects_booleans() {
        assert_eq!(
            BinaryOp::Add.result_type(Type::Int, Type::Bool),
            Err(TypeError::BinaryMismatch {
                op: BinaryOp::Add,
                expected: "Int operands",
                lhs: Type::Int,
                rhs: Type::Bool,
            })
        );
    }

    #[test]
    fn bit_vector_widths_must_agree() {
        assert_eq!(
            BinaryOp::BvAdd.result_type(Type::BitVector(8), Type::BitVector(16)),
            Err(TypeError::WidthMismatch {
                op: BinaryOp::BvAdd,
                lhs: 8,
                rhs: 16,
            })
        );
        assert_eq!(
            BinaryOp::BvULt.result_type(Type::BitVector(8), Type::BitVector(8)),
            Ok(Type::Bool)
        );
    }

    #[test]
    fn equality_is_polymorphic() {
        assert_eq!(BinaryOp::Eq.result_type(Type::Bool, Type::Bool), Ok(Type::Bool));
        assert!(BinaryOp::Eq.result_type(Type::Int, Type::Bool).is_err());
    }
}
