//! Constant folding.
//!
//! The `build_*` helpers construct an operator application, folding it to a
//! literal when every operand is a literal. Folding follows SMT-LIB
//! semantics so a folded candidate agrees with what the solver assumed about
//! it. Integer division by zero and `i64` overflow are left unfolded.

use crate::node::{mask, BitVector, Expr, Node};
use crate::operator::{BinaryOp, UnaryOp};
use crate::variable::Variable;
use std::collections::HashMap;

/// Substitute `assignment` into `node` and fold the result.
pub fn evaluate(node: &Node, assignment: &HashMap<Variable, Node>) -> Node {
    node.substitute(assignment).transform(&mut fold)
}

/// Fold one node whose children are already folded.
pub fn fold(node: Node) -> Node {
    let folded = match node.expr() {
        Expr::Unary(op, a) => fold_unary(*op, a),
        Expr::Binary(op, a, b) => fold_binary(*op, a, b),
        Expr::Ite(c, a, b) => match c.expr() {
            Expr::BoolConst(true) => Some(a.clone()),
            Expr::BoolConst(false) => Some(b.clone()),
            _ => None,
        },
        _ => None,
    };
    folded.unwrap_or(node)
}

pub fn build_unary(op: UnaryOp, operand: Node) -> Node {
    fold_unary(op, &operand).unwrap_or_else(|| Node::unary(op, operand))
}

pub fn build_binary(op: BinaryOp, lhs: Node, rhs: Node) -> Node {
    fold_binary(op, &lhs, &rhs).unwrap_or_else(|| Node::binary(op, lhs, rhs))
}

pub fn build_ite(condition: Node, then: Node, otherwise: Node) -> Node {
    fold(Node::ite(condition, then, otherwise))
}

pub fn build_add(lhs: Node, rhs: Node) -> Node {
    build_binary(BinaryOp::Add, lhs, rhs)
}

pub fn build_less(lhs: Node, rhs: Node) -> Node {
    build_binary(BinaryOp::Lt, lhs, rhs)
}

pub fn build_less_or_equal(lhs: Node, rhs: Node) -> Node {
    build_binary(BinaryOp::Le, lhs, rhs)
}

pub fn build_greater(lhs: Node, rhs: Node) -> Node {
    build_binary(BinaryOp::Gt, lhs, rhs)
}

pub fn build_greater_or_equal(lhs: Node, rhs: Node) -> Node {
    build_binary(BinaryOp::Ge, lhs, rhs)
}

fn fold_unary(op: UnaryOp, a: &Node) -> Option<Node> {
    match (op, a.expr()) {
        (UnaryOp::Neg, Expr::IntConst(a)) => a.checked_neg().map(Node::int),
        (UnaryOp::Not, Expr::BoolConst(a)) => Some(Node::bool(!a)),
        (UnaryOp::BvNot, Expr::BitVecConst(a)) => Some(bv(!a.value(), a.width())),
        (UnaryOp::BvNeg, Expr::BitVecConst(a)) => Some(bv(a.value().wrapping_neg(), a.width())),
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, a: &Node, b: &Node) -> Option<Node> {
    if op == BinaryOp::Eq && a.is_constant() && b.is_constant() {
        return Some(Node::bool(a == b));
    }
    match (a.expr(), b.expr()) {
        (Expr::IntConst(a), Expr::IntConst(b)) => fold_int(op, *a, *b),
        (Expr::BoolConst(a), Expr::BoolConst(b)) => fold_bool(op, *a, *b),
        (Expr::BitVecConst(a), Expr::BitVecConst(b)) if a.width() == b.width() => {
            fold_bit_vector(op, *a, *b)
        }
        _ => None,
    }
}

fn fold_int(op: BinaryOp, a: i64, b: i64) -> Option<Node> {
    let int = |v: Option<i64>| v.map(Node::int);
    match op {
        BinaryOp::Add => int(a.checked_add(b)),
        BinaryOp::Sub => int(a.checked_sub(b)),
        BinaryOp::Mul => int(a.checked_mul(b)),
        BinaryOp::Div => int(a.checked_div_euclid(b)),
        BinaryOp::Mod => int(a.checked_rem_euclid(b)),
        BinaryOp::Lt => Some(Node::bool(a < b)),
        BinaryOp::Le => Some(Node::bool(a <= b)),
        BinaryOp::Gt => Some(Node::bool(a > b)),
        BinaryOp::Ge => Some(Node::bool(a >= b)),
        _ => None,
    }
}

fn fold_bool(op: BinaryOp, a: bool, b: bool) -> Option<Node> {
    match op {
        BinaryOp::And => Some(Node::bool(a && b)),
        BinaryOp::Or => Some(Node::bool(a || b)),
        BinaryOp::Implies => Some(Node::bool(!a || b)),
        BinaryOp::Iff => Some(Node::bool(a == b)),
        _ => None,
    }
}

fn bv(value: u64, width: u32) -> Node {
    Node::bit_vector(value, width)
}

fn fold_bit_vector(op: BinaryOp, a: BitVector, b: BitVector) -> Option<Node> {
    let w = a.width();
    let m = mask(w);
    let (x, y) = (a.value(), b.value());
    let msb = |v: u64| w > 0 && (v >> (w - 1)) & 1 == 1;
    let neg = |v: u64| v.wrapping_neg() & m;
    let udiv = |x: u64, y: u64| if y == 0 { m } else { x / y };
    let urem = |x: u64, y: u64| if y == 0 { x } else { x % y };
    let folded = match op {
        BinaryOp::BvAdd => bv(x.wrapping_add(y), w),
        BinaryOp::BvSub => bv(x.wrapping_sub(y), w),
        BinaryOp::BvMul => bv(x.wrapping_mul(y), w),
        BinaryOp::BvUDiv => bv(udiv(x, y), w),
        BinaryOp::BvURem => bv(urem(x, y), w),
        BinaryOp::BvSDiv => bv(
            match (msb(x), msb(y)) {
                (false, false) => udiv(x, y),
                (true, false) => neg(udiv(neg(x), y)),
                (false, true) => neg(udiv(x, neg(y))),
                (true, true) => udiv(neg(x), neg(y)),
            },
            w,
        ),
        BinaryOp::BvSRem => bv(
            match (msb(x), msb(y)) {
                (false, false) => urem(x, y),
                (true, false) => neg(urem(neg(x), y)),
                (false, true) => urem(x, neg(y)),
                (true, true) => neg(urem(neg(x), neg(y))),
            },
            w,
        ),
        BinaryOp::BvSMod => {
            let abs = |v: u64| if msb(v) { neg(v) } else { v };
            let u = urem(abs(x), abs(y));
            let r = if u == 0 {
                u
            } else {
                match (msb(x), msb(y)) {
                    (false, false) => u,
                    (true, false) => neg(u).wrapping_add(y),
                    (false, true) => u.wrapping_add(y),
                    (true, true) => neg(u),
                }
            };
            bv(r, w)
        }
        BinaryOp::BvAnd => bv(x & y, w),
        BinaryOp::BvOr => bv(x | y, w),
        BinaryOp::BvXor => bv(x ^ y, w),
        BinaryOp::BvShl => bv(if y >= w as u64 { 0 } else { x << y }, w),
        BinaryOp::BvLShr => bv(if y >= w as u64 { 0 } else { x >> y }, w),
        BinaryOp::BvAShr => {
            if y >= w as u64 {
                bv(if msb(x) { m } else { 0 }, w)
            } else {
                bv((a.signed() >> y) as u64, w)
            }
        }
        BinaryOp::BvULt => Node::bool(x < y),
        BinaryOp::BvULe => Node::bool(x <= y),
        BinaryOp::BvUGt => Node::bool(x > y),
        BinaryOp::BvUGe => Node::bool(x >= y),
        BinaryOp::BvSLt => Node::bool(a.signed() < b.signed()),
        BinaryOp::BvSLe => Node::bool(a.signed() <= b.signed()),
        BinaryOp::BvSGt => Node::bool(a.signed() > b.signed()),
        BinaryOp::BvSGe => Node::bool(a.signed() >= b.signed()),
        _ => return None,
    };
    Some(folded)
}
