use crate::node::Node;
use crate::operator::{BinaryOp, UnaryOp};
use crate::types::{Type, TypeError};
use crate::variable::{Accepts, ComponentId, Hole, Variable};
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

/// One usable copy of a template expression.
///
/// The template's holes are the component's formal inputs. Every component
/// has its own identity, so two copies of the same template are different
/// components.
#[derive(Clone, Debug)]
pub struct Component {
    id: ComponentId,
    semantics: Node,
    holes: Vec<Hole>,
    ty: Type,
}

impl Component {
    pub fn new(semantics: Node) -> Result<Component, TypeError> {
        let ty = semantics.type_of()?;
        let holes = semantics
            .variables()
            .into_iter()
            .filter_map(|v| match v {
                Variable::Hole(hole) => Some(hole),
                _ => None,
            })
            .collect();
        Ok(Component {
            id: ComponentId::fresh(),
            semantics,
            holes,
            ty,
        })
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn semantics(&self) -> &Node {
        &self.semantics
    }

    /// Holes in order of first occurrence in the template.
    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn is_leaf(&self) -> bool {
        self.holes.is_empty()
    }

    pub fn output(&self) -> Variable {
        Variable::ComponentOutput {
            component: self.id,
            ty: self.ty,
        }
    }

    pub fn input(&self, hole: &Hole) -> Variable {
        Variable::ComponentInput {
            component: self.id,
            hole: hole.clone(),
        }
    }

    /// The parameters occurring in the template.
    pub fn parameters(&self) -> impl Iterator<Item = Variable> {
        self.semantics
            .variables()
            .into_iter()
            .filter(|v| matches!(v, Variable::Parameter { .. }))
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Component {}

impl Hash for Component {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.semantics)
    }
}

pub fn hole(name: &str, ty: Type) -> Node {
    Node::var(Variable::Hole(Hole::new(name, ty)))
}

pub fn var(name: &str, ty: Type) -> Node {
    Node::var(Variable::program(name, ty))
}

pub fn parameter(name: &str, ty: Type) -> Node {
    Node::var(Variable::parameter(name, ty))
}

fn int_binary(op: BinaryOp) -> Node {
    Node::binary(op, hole("a", Type::Int), hole("b", Type::Int))
}

fn bool_binary(op: BinaryOp) -> Node {
    Node::binary(op, hole("a", Type::Bool), hole("b", Type::Bool))
}

fn bv_binary(op: BinaryOp, width: u32) -> Node {
    Node::binary(
        op,
        hole("a", Type::BitVector(width)),
        hole("b", Type::BitVector(width)),
    )
}

pub fn add() -> Node {
    int_binary(BinaryOp::Add)
}

pub fn sub() -> Node {
    int_binary(BinaryOp::Sub)
}

pub fn mul() -> Node {
    int_binary(BinaryOp::Mul)
}

pub fn div() -> Node {
    int_binary(BinaryOp::Div)
}

pub fn neg() -> Node {
    Node::unary(UnaryOp::Neg, hole("a", Type::Int))
}

/// Integer negation whose operand is restricted to nodes `accepts` admits.
pub fn neg_of(accepts: Accepts) -> Node {
    let operand = Hole::new("a", Type::Int).accepting(accepts);
    Node::unary(UnaryOp::Neg, Node::var(Variable::Hole(operand)))
}

pub fn less() -> Node {
    int_binary(BinaryOp::Lt)
}

pub fn less_or_equal() -> Node {
    int_binary(BinaryOp::Le)
}

pub fn greater() -> Node {
    int_binary(BinaryOp::Gt)
}

pub fn greater_or_equal() -> Node {
    int_binary(BinaryOp::Ge)
}

pub fn equal(ty: Type) -> Node {
    Node::equal(hole("a", ty), hole("b", ty))
}

pub fn and() -> Node {
    bool_binary(BinaryOp::And)
}

pub fn or() -> Node {
    bool_binary(BinaryOp::Or)
}

pub fn not() -> Node {
    Node::not(hole("a", Type::Bool))
}

pub fn ite(ty: Type) -> Node {
    Node::ite(hole("c", Type::Bool), hole("a", ty), hole("b", ty))
}

pub fn bv_add(width: u32) -> Node {
    bv_binary(BinaryOp::BvAdd, width)
}

pub fn bv_sub(width: u32) -> Node {
    bv_binary(BinaryOp::BvSub, width)
}

pub fn bv_and(width: u32) -> Node {
    bv_binary(BinaryOp::BvAnd, width)
}

pub fn bv_or(width: u32) -> Node {
    bv_binary(BinaryOp::BvOr, width)
}

pub fn bv_xor(width: u32) -> Node {
    bv_binary(BinaryOp::BvXor, width)
}

pub fn bv_shl(width: u32) -> Node {
    bv_binary(BinaryOp::BvShl, width)
}

pub fn bv_lshr(width: u32) -> Node {
    bv_binary(BinaryOp::BvLShr, width)
}
