//! Component-based program synthesis.
//!
//! Given a [`Library`] of expression templates and a suite of [`TestCase`]s,
//! search for a well-typed expression built from the library's components
//! that passes every test. The search is compiled into a constraint system
//! for an SMT [`Solver`] in one of two ways:
//!
//! * [`dag`]: components are placed at integer locations and wired into an
//!   acyclic graph, every component used at most once;
//! * [`tree`]: a size-bounded expression tree where every node chooses among
//!   all templates, optionally excluding previously found programs.
//!
//! [`cegis`] grows the set of tests a strategy synthesizes against until the
//! candidate passes the whole suite.

#![deny(missing_debug_implementations)]

pub mod cegis;
pub mod component;
pub mod conflict;
pub mod dag;
pub mod fold;
mod node;
mod operator;
mod program;
pub mod solver;
mod test_case;
pub mod tree;
mod types;
mod variable;

pub use component::Component;
pub use conflict::ConflictDatabase;
pub use node::{BitVector, Expr, Node};
pub use operator::{BinaryOp, UnaryOp};
pub use program::{Program, Valuation};
pub use solver::{Answer, Model, Solver, Z3Solver};
pub use test_case::TestCase;
pub use types::{Type, TypeError};
pub use variable::{
    Accepts, BranchOutput, ComponentId, Hole, Location, LocationEncoding, Selector, TestId,
    Variable,
};

use std::fmt::{self, Display};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// The solver's model violates an invariant the encoding guarantees.
    #[error("inconsistent model: {0}")]
    Inconsistent(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("solver failure: {0}")]
    Solver(String),

    #[error("the library has no components")]
    NoComponents,

    #[error("the test suite is empty")]
    NoTests,

    #[error("malformed program: {0}")]
    MalformedProgram(String),

    #[error("component is not part of the conflict database")]
    UnknownComponent,
}

/// A collection of component templates.
///
/// Each template may be available in several copies, allowing the DAG
/// encoding to use it several times. The tree encoding treats every template
/// as available without limit.
#[derive(Clone, Debug, Default)]
pub struct Library {
    templates: Vec<(Node, usize)>,
}

impl Library {
    pub fn new() -> Self {
        Library::default()
    }

    /// Add `count` copies of `template`.
    pub fn with(mut self, template: Node, count: usize) -> Self {
        match self.templates.iter_mut().find(|(t, _)| *t == template) {
            Some((_, n)) => *n += count,
            None => self.templates.push((template, count)),
        }
        self
    }

    pub fn templates(&self) -> impl Iterator<Item = (&Node, usize)> {
        self.templates.iter().map(|(t, n)| (t, *n))
    }

    /// Total number of copies.
    pub fn len(&self) -> usize {
        self.templates.iter().map(|(_, n)| n).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One fresh component per copy.
    pub fn flatten(&self) -> Result<Vec<Rc<Component>>, Error> {
        let mut components = Vec::with_capacity(self.len());
        for (template, count) in self.templates() {
            for _ in 0..count {
                components.push(Rc::new(Component::new(template.clone())?));
            }
        }
        Ok(components)
    }

    /// One fresh component per template.
    pub fn distinct(&self) -> Result<Vec<Rc<Component>>, Error> {
        self.templates()
            .filter(|(_, count)| *count > 0)
            .map(|(template, _)| Ok(Rc::new(Component::new(template.clone())?)))
            .collect()
    }
}

/// A program found by a synthesis strategy, with the values the solver chose
/// for its parameters.
#[derive(Clone, Debug)]
pub struct Synthesized {
    pub program: Program,
    pub valuation: Valuation,
}

impl Synthesized {
    pub fn semantics(&self) -> Node {
        self.program.semantics(&self.valuation)
    }
}

impl Display for Synthesized {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.semantics())
    }
}

/// A synthesis strategy: find a program passing every test in `tests`, or
/// `None` if the strategy's search space has none.
pub trait Synthesizer {
    fn synthesize(&mut self, tests: &[&TestCase]) -> Result<Option<Synthesized>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{add, var};

    #[test]
    fn library_counts_copies() {
        let library = Library::new()
            .with(var("x", Type::Int), 1)
            .with(add(), 2)
            .with(var("x", Type::Int), 1);
        assert_eq!(library.len(), 4);
        assert_eq!(library.templates().count(), 2);
        assert_eq!(library.flatten().unwrap().len(), 4);
        assert_eq!(library.distinct().unwrap().len(), 2);
    }

    #[test]
    fn library_reports_type_errors() {
        let bad = Node::binary(BinaryOp::And, var("x", Type::Int), Node::bool(true));
        let library = Library::new().with(bad, 1);
        assert!(matches!(library.flatten(), Err(Error::Type(_))));
    }

    #[test]
    fn display_error() {
        assert_eq!(
            Error::Inconsistent("dangling pointer".into()).to_string(),
            "inconsistent model: dangling pointer"
        );
    }
}
