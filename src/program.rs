use crate::component::Component;
use crate::node::Node;
use crate::variable::{Hole, Variable};
use crate::Error;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::rc::Rc;

/// Solver-chosen values of parameters.
pub type Valuation = HashMap<Variable, Node>;

/// A tree of components with every hole bound to a child program.
#[derive(Clone, Debug)]
pub enum Program {
    Leaf(Rc<Component>),
    App(Rc<Component>, Vec<(Hole, Program)>),
}

impl Program {
    pub fn leaf(component: Rc<Component>) -> Result<Program, Error> {
        if !component.is_leaf() {
            return Err(Error::MalformedProgram(format!(
                "{} has {} holes",
                component,
                component.holes().len()
            )));
        }
        Ok(Program::Leaf(component))
    }

    /// Bind the component's holes, in template order, to `children`.
    pub fn app(component: Rc<Component>, children: Vec<Program>) -> Result<Program, Error> {
        if component.holes().len() != children.len() {
            return Err(Error::MalformedProgram(format!(
                "{} has {} holes but {} children were given",
                component,
                component.holes().len(),
                children.len()
            )));
        }
        for (hole, child) in component.holes().iter().zip(&children) {
            if hole.ty() != child.component().ty()
                || !hole.accepts().admits(child.component().semantics())
            {
                return Err(Error::MalformedProgram(format!(
                    "hole {} of {} cannot hold {}",
                    hole.name(),
                    component,
                    child
                )));
            }
        }
        if children.is_empty() {
            return Ok(Program::Leaf(component));
        }
        let bindings = component.holes().iter().cloned().zip(children).collect();
        Ok(Program::App(component, bindings))
    }

    pub fn component(&self) -> &Rc<Component> {
        match self {
            Program::Leaf(c) | Program::App(c, _) => c,
        }
    }

    pub fn children(&self) -> impl Iterator<Item = &Program> {
        let bindings: &[(Hole, Program)] = match self {
            Program::Leaf(_) => &[],
            Program::App(_, bindings) => bindings,
        };
        bindings.iter().map(|(_, p)| p)
    }

    /// The expression this program denotes, with `valuation` substituted for
    /// its parameters.
    pub fn semantics(&self, valuation: &Valuation) -> Node {
        self.template().substitute(valuation)
    }

    fn template(&self) -> Node {
        match self {
            Program::Leaf(c) => c.semantics().clone(),
            Program::App(c, bindings) => {
                let mapping = bindings
                    .iter()
                    .map(|(hole, child)| (Variable::Hole(hole.clone()), child.template()))
                    .collect();
                c.semantics().substitute(&mapping)
            }
        }
    }

    /// Number of components in the tree.
    pub fn size(&self) -> usize {
        1 + self.children().map(Program::size).sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        1 + self.children().map(Program::depth).max().unwrap_or(0)
    }
}

/// Programs are equal when they apply the same templates in the same shape,
/// whichever component copies they were built from.
impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.component().semantics() == other.component().semantics()
            && self.children().count() == other.children().count()
            && self.children().zip(other.children()).all(|(a, b)| a == b)
    }
}

impl Eq for Program {}

impl Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.template())
    }
}
