//! Variable-like leaves of the expression tree.
//!
//! Program variables and parameters are identified by name and type. The
//! synthetic symbols introduced by the encoders (component inputs and
//! outputs, locations, selectors, branch outputs) are identified by a unique
//! id drawn from a global counter, so two of them are equal only if they were
//! created by the same call.

use crate::node::{Expr, Node};
use crate::types::Type;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(0);

fn next_symbol() -> u64 {
    NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    pub(crate) fn fresh() -> Self {
        ComponentId(next_symbol())
    }
}

impl Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Identity of one test case inside a suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestId(u64);

impl TestId {
    pub(crate) fn fresh() -> Self {
        TestId(next_symbol())
    }
}

impl Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Which nodes may fill a hole.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Accepts {
    Any,
    /// Literal constants and parameters.
    Constant,
    /// Program variables.
    Variable,
}

impl Accepts {
    pub fn admits(&self, node: &Node) -> bool {
        match self {
            Accepts::Any => true,
            Accepts::Constant => match node.expr() {
                Expr::IntConst(_) | Expr::BoolConst(_) | Expr::BitVecConst(_) => true,
                Expr::Var(Variable::Parameter { .. }) => true,
                _ => false,
            },
            Accepts::Variable => matches!(node.expr(), Expr::Var(Variable::Program { .. })),
        }
    }
}

/// A formal input of a component template.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Hole {
    name: String,
    ty: Type,
    accepts: Accepts,
}

impl Hole {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Hole {
            name: name.into(),
            ty,
            accepts: Accepts::Any,
        }
    }

    pub fn accepting(self, accepts: Accepts) -> Self {
        Hole { accepts, ..self }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn accepts(&self) -> Accepts {
        self.accepts
    }
}

/// How location variables of the DAG encoding are represented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LocationEncoding {
    Integer,
    BitVector(u32),
}

impl LocationEncoding {
    pub fn ty(&self) -> Type {
        match self {
            LocationEncoding::Integer => Type::Int,
            LocationEncoding::BitVector(width) => Type::BitVector(*width),
        }
    }
}

/// Where a component output or input sits in the DAG encoding.
#[derive(Clone, Debug)]
pub struct Location {
    of: Box<Variable>,
    encoding: LocationEncoding,
}

impl Location {
    pub fn of(&self) -> &Variable {
        &self.of
    }

    pub fn encoding(&self) -> LocationEncoding {
        self.encoding
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.of == other.of
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.of.hash(state);
    }
}

/// Indicator of one choice in the tree-bounded encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(u64);

impl Selector {
    pub fn fresh() -> Self {
        Selector(next_symbol())
    }
}

/// The value produced by one branch of the bounded tree.
#[derive(Clone, Copy, Debug)]
pub struct BranchOutput {
    id: u64,
    ty: Type,
}

impl BranchOutput {
    pub fn fresh(ty: Type) -> Self {
        BranchOutput {
            id: next_symbol(),
            ty,
        }
    }

    pub fn ty(&self) -> Type {
        self.ty
    }
}

impl PartialEq for BranchOutput {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BranchOutput {}

impl Hash for BranchOutput {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Variable {
    /// An input of the program being synthesized.
    Program { name: String, ty: Type },

    /// A free constant whose value the solver chooses.
    Parameter { name: String, ty: Type },

    Hole(Hole),

    ComponentOutput { component: ComponentId, ty: Type },

    ComponentInput { component: ComponentId, hole: Hole },

    Location(Location),

    Selector(Selector),

    BranchOutput(BranchOutput),

    /// The copy of a variable used by the constraints of one test case.
    TestInstance(Box<Variable>, TestId),
}

impl Variable {
    pub fn program(name: impl Into<String>, ty: Type) -> Self {
        Variable::Program {
            name: name.into(),
            ty,
        }
    }

    pub fn parameter(name: impl Into<String>, ty: Type) -> Self {
        Variable::Parameter {
            name: name.into(),
            ty,
        }
    }

    pub fn location(of: Variable, encoding: LocationEncoding) -> Self {
        Variable::Location(Location {
            of: Box::new(of),
            encoding,
        })
    }

    pub fn ty(&self) -> Type {
        match self {
            Variable::Program { ty, .. }
            | Variable::Parameter { ty, .. }
            | Variable::ComponentOutput { ty, .. } => *ty,
            Variable::Hole(hole) | Variable::ComponentInput { hole, .. } => hole.ty(),
            Variable::Location(location) => location.encoding.ty(),
            Variable::Selector(_) => Type::Bool,
            Variable::BranchOutput(branch) => branch.ty,
            Variable::TestInstance(variable, _) => variable.ty(),
        }
    }

    /// Whether constraints of different test cases need separate copies of
    /// this variable. Locations, selectors and parameters are shared by all
    /// tests of one synthesis call.
    pub fn is_test_instantiable(&self) -> bool {
        match self {
            Variable::Program { .. }
            | Variable::Hole(_)
            | Variable::ComponentOutput { .. }
            | Variable::ComponentInput { .. }
            | Variable::BranchOutput(_) => true,
            Variable::Parameter { .. }
            | Variable::Location(_)
            | Variable::Selector(_)
            | Variable::TestInstance(..) => false,
        }
    }

    pub fn instantiate(&self, test: TestId) -> Variable {
        debug_assert!(self.is_test_instantiable());
        Variable::TestInstance(Box::new(self.clone()), test)
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Variable::Program { name, .. } | Variable::Parameter { name, .. } => {
                write!(f, "{}", name)
            }
            Variable::Hole(hole) => write!(f, "?{}", hole.name),
            Variable::ComponentOutput { component, .. } => write!(f, "{}.out", component),
            Variable::ComponentInput { component, hole } => {
                write!(f, "{}.{}", component, hole.name)
            }
            Variable::Location(location) => write!(f, "loc({})", location.of),
            Variable::Selector(Selector(id)) => write!(f, "sel{}", id),
            Variable::BranchOutput(branch) => write!(f, "branch{}", branch.id),
            Variable::TestInstance(variable, test) => write!(f, "{}@{}", variable, test),
        }
    }
}
