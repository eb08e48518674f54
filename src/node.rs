//! The expression tree.
//!
//! A [`Node`] is an immutable, reference-counted handle to an [`Expr`].
//! Equality and hashing are structural. Sub-expressions may be shared between
//! several parents; the traversals below memoize on the address of each
//! shared `Expr` so shared structure is visited once.

use crate::operator::{BinaryOp, UnaryOp};
use crate::types::{Type, TypeError};
use crate::variable::{TestId, Variable};
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Display};
use std::rc::Rc;

/// A fixed-width bit-vector literal. `value` never has bits set above
/// `width`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BitVector {
    width: u32,
    value: u64,
}

impl BitVector {
    pub fn new(value: u64, width: u32) -> Self {
        BitVector {
            width,
            value: value & mask(width),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    /// The value read as a two's complement signed integer.
    pub fn signed(&self) -> i64 {
        if self.width == 0 || self.width >= 64 {
            return self.value as i64;
        }
        let shift = 64 - self.width;
        ((self.value << shift) as i64) >> shift
    }
}

pub(crate) fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    IntConst(i64),
    BoolConst(bool),
    BitVecConst(BitVector),
    Var(Variable),
    Unary(UnaryOp, Node),
    Binary(BinaryOp, Node, Node),
    Ite(Node, Node, Node),
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Node(Rc<Expr>);

impl Node {
    pub fn new(expr: Expr) -> Self {
        Node(Rc::new(expr))
    }

    pub fn expr(&self) -> &Expr {
        &self.0
    }

    pub fn int(value: i64) -> Self {
        Node::new(Expr::IntConst(value))
    }

    pub fn bool(value: bool) -> Self {
        Node::new(Expr::BoolConst(value))
    }

    pub fn bit_vector(value: u64, width: u32) -> Self {
        Node::new(Expr::BitVecConst(BitVector::new(value, width)))
    }

    pub fn var(variable: Variable) -> Self {
        Node::new(Expr::Var(variable))
    }

    pub fn unary(op: UnaryOp, operand: Node) -> Self {
        Node::new(Expr::Unary(op, operand))
    }

    pub fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Self {
        Node::new(Expr::Binary(op, lhs, rhs))
    }

    pub fn ite(condition: Node, then: Node, otherwise: Node) -> Self {
        Node::new(Expr::Ite(condition, then, otherwise))
    }

    pub fn equal(lhs: Node, rhs: Node) -> Self {
        Node::binary(BinaryOp::Eq, lhs, rhs)
    }

    pub fn not(operand: Node) -> Self {
        Node::unary(UnaryOp::Not, operand)
    }

    pub fn implies(lhs: Node, rhs: Node) -> Self {
        Node::binary(BinaryOp::Implies, lhs, rhs)
    }

    pub fn and(lhs: Node, rhs: Node) -> Self {
        Node::binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(lhs: Node, rhs: Node) -> Self {
        Node::binary(BinaryOp::Or, lhs, rhs)
    }

    /// Right-nested conjunction; `true` when empty.
    pub fn conjunction(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self::fold_right(nodes, BinaryOp::And, true)
    }

    /// Right-nested disjunction; `false` when empty.
    pub fn disjunction(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self::fold_right(nodes, BinaryOp::Or, false)
    }

    fn fold_right(nodes: impl IntoIterator<Item = Node>, op: BinaryOp, unit: bool) -> Self {
        let mut nodes: Vec<_> = nodes.into_iter().collect();
        let mut acc = match nodes.pop() {
            Some(last) => last,
            None => return Node::bool(unit),
        };
        while let Some(node) = nodes.pop() {
            acc = Node::binary(op, node, acc);
        }
        acc
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self.expr() {
            Expr::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(
            self.expr(),
            Expr::IntConst(_) | Expr::BoolConst(_) | Expr::BitVecConst(_)
        )
    }

    fn children(&self) -> Vec<&Node> {
        match self.expr() {
            Expr::IntConst(_) | Expr::BoolConst(_) | Expr::BitVecConst(_) | Expr::Var(_) => {
                vec![]
            }
            Expr::Unary(_, a) => vec![a],
            Expr::Binary(_, a, b) => vec![a, b],
            Expr::Ite(c, a, b) => vec![c, a, b],
        }
    }

    pub fn type_of(&self) -> Result<Type, TypeError> {
        TypeChecker::default().check(self)
    }

    /// Rebuild the tree bottom-up, applying `rewrite` to every node after its
    /// children have been rebuilt.
    pub fn transform(&self, rewrite: &mut impl FnMut(Node) -> Node) -> Node {
        let mut memo = HashMap::new();
        self.transform_memo(rewrite, &mut memo)
    }

    fn transform_memo(
        &self,
        rewrite: &mut impl FnMut(Node) -> Node,
        memo: &mut HashMap<*const Expr, Node>,
    ) -> Node {
        let key = Rc::as_ptr(&self.0);
        if let Some(done) = memo.get(&key) {
            return done.clone();
        }
        let rebuilt = match self.expr() {
            Expr::IntConst(_) | Expr::BoolConst(_) | Expr::BitVecConst(_) | Expr::Var(_) => {
                self.clone()
            }
            Expr::Unary(op, a) => {
                let a2 = a.transform_memo(rewrite, memo);
                if Rc::ptr_eq(&a.0, &a2.0) {
                    self.clone()
                } else {
                    Node::unary(*op, a2)
                }
            }
            Expr::Binary(op, a, b) => {
                let a2 = a.transform_memo(rewrite, memo);
                let b2 = b.transform_memo(rewrite, memo);
                if Rc::ptr_eq(&a.0, &a2.0) && Rc::ptr_eq(&b.0, &b2.0) {
                    self.clone()
                } else {
                    Node::binary(*op, a2, b2)
                }
            }
            Expr::Ite(c, a, b) => {
                let c2 = c.transform_memo(rewrite, memo);
                let a2 = a.transform_memo(rewrite, memo);
                let b2 = b.transform_memo(rewrite, memo);
                Node::ite(c2, a2, b2)
            }
        };
        let result = rewrite(rebuilt);
        memo.insert(key, result.clone());
        result
    }

    pub fn substitute(&self, mapping: &HashMap<Variable, Node>) -> Node {
        if mapping.is_empty() {
            return self.clone();
        }
        self.transform(&mut |node| {
            let replacement = node.as_variable().and_then(|v| mapping.get(v)).cloned();
            replacement.unwrap_or(node)
        })
    }

    /// Replace every test-instantiable variable `v` with its per-test copy.
    pub fn instantiate(&self, test: TestId) -> Node {
        self.transform(&mut |node| {
            let copy = match node.as_variable() {
                Some(v) if v.is_test_instantiable() => Some(Node::var(v.instantiate(test))),
                _ => None,
            };
            copy.unwrap_or(node)
        })
    }

    /// Distinct variables in order of first occurrence.
    pub fn variables(&self) -> Vec<Variable> {
        let mut seen = HashSet::new();
        let mut visited = HashSet::new();
        let mut out = vec![];
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if !visited.insert(Rc::as_ptr(&node.0)) {
                continue;
            }
            if let Expr::Var(v) = node.expr() {
                if seen.insert(v.clone()) {
                    out.push(v.clone());
                }
            }
            stack.extend(node.children().into_iter().rev());
        }
        out
    }
}

/// Bottom-up type inference, one type per distinct shared node.
#[derive(Default)]
struct TypeChecker {
    memo: HashMap<*const Expr, Type>,
}

impl TypeChecker {
    fn check(&mut self, node: &Node) -> Result<Type, TypeError> {
        let key = Rc::as_ptr(&node.0);
        if let Some(ty) = self.memo.get(&key) {
            return Ok(*ty);
        }
        let ty = match node.expr() {
            Expr::IntConst(_) => Type::Int,
            Expr::BoolConst(_) => Type::Bool,
            Expr::BitVecConst(bv) => {
                if bv.width == 0 || bv.width > 64 {
                    return Err(TypeError::InvalidWidth(bv.width));
                }
                Type::BitVector(bv.width)
            }
            Expr::Var(v) => v.ty(),
            Expr::Unary(op, a) => {
                let a = self.check(a)?;
                op.result_type(a)?
            }
            Expr::Binary(op, a, b) => {
                let a = self.check(a)?;
                let b = self.check(b)?;
                op.result_type(a, b)?
            }
            Expr::Ite(c, a, b) => {
                let c = self.check(c)?;
                if c != Type::Bool {
                    return Err(TypeError::NonBooleanCondition(c));
                }
                let a = self.check(a)?;
                let b = self.check(b)?;
                if a != b {
                    return Err(TypeError::BranchMismatch(a, b));
                }
                a
            }
        };
        self.memo.insert(key, ty);
        Ok(ty)
    }
}

impl From<Variable> for Node {
    fn from(variable: Variable) -> Self {
        Node::var(variable)
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.expr() {
            Expr::IntConst(i) => write!(f, "{}", i),
            Expr::BoolConst(b) => write!(f, "{}", b),
            Expr::BitVecConst(bv) => write!(f, "(_ bv{} {})", bv.value, bv.width),
            Expr::Var(v) => write!(f, "{}", v),
            Expr::Unary(op, a) => write!(f, "({} {})", op, a),
            Expr::Binary(op, a, b) => write!(f, "({} {} {})", op, a, b),
            Expr::Ite(c, a, b) => write!(f, "(ite {} {} {})", c, a, b),
        }
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}
