//! Size-bounded expression trees.
//!
//! Every branch of the tree has an output variable and a set of boolean
//! selectors, one per component that may produce the branch's value. Exactly
//! one selector of each branch holds, and a selected component ties the
//! branch output to its semantics over the outputs of child branches.
//!
//! Child branches are pooled: components of one branch share the children
//! for holes of equal type and accepted subtype, so the encoding grows with
//! the widest component rather than with the sum over all components.
//!
//! Previously found programs can be forbidden. A forbidden program is
//! excluded by the conjunction of the selectors that would rebuild it.

use crate::component::Component;
use crate::node::{Expr, Node};
use crate::program::{Program, Valuation};
use crate::solver::{Model, Solver};
use crate::test_case::TestCase;
use crate::types::Type;
use crate::variable::{Accepts, BranchOutput, Selector, Variable};
use crate::{Error, Library, Synthesized, Synthesizer};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

#[derive(Clone, Debug)]
pub struct TreeConfig {
    size: usize,
    forbidden: Vec<Program>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            size: 2,
            forbidden: vec![],
        }
    }
}

impl TreeConfig {
    /// Maximum depth of the tree; a tree of size 1 is a single leaf.
    pub fn with_size(self, size: usize) -> Self {
        TreeConfig { size, ..self }
    }

    pub fn with_forbidden(self, forbidden: Vec<Program>) -> Self {
        TreeConfig { forbidden, ..self }
    }

    /// Forbid one more program, keeping those already forbidden.
    pub fn forbid(mut self, program: Program) -> Self {
        self.forbidden.push(program);
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn forbidden(&self) -> &[Program] {
        &self.forbidden
    }
}

/// Synthesize with one component per template, each usable any number of
/// times.
#[derive(Debug)]
pub struct TreeSynthesizer<S> {
    solver: S,
    library: Library,
    config: TreeConfig,
}

impl<S: Solver> TreeSynthesizer<S> {
    pub fn new(solver: S, library: Library, config: TreeConfig) -> Self {
        TreeSynthesizer {
            solver,
            library,
            config,
        }
    }
}

impl<S: Solver> Synthesizer for TreeSynthesizer<S> {
    fn synthesize(&mut self, tests: &[&TestCase]) -> Result<Option<Synthesized>, Error> {
        let components = self.library.distinct()?;
        synthesize(&mut self.solver, &components, tests, &self.config)
    }
}

pub fn synthesize<S: Solver + ?Sized>(
    solver: &mut S,
    components: &[Rc<Component>],
    tests: &[&TestCase],
    config: &TreeConfig,
) -> Result<Option<Synthesized>, Error> {
    let first = tests.first().ok_or(Error::NoTests)?;
    if components.is_empty() {
        return Err(Error::NoComponents);
    }
    let mut tree = Tree::new(components);
    let root = BranchOutput::fresh(first.output_type()?);
    let forbidden: Vec<&Program> = config.forbidden.iter().collect();
    let (viable, excluded) = tree.encode_branch(root, Accepts::Any, config.size, &forbidden);
    if !viable {
        debug!("no component can produce the result");
        tree.shared.push(Node::bool(false));
    }
    for selectors in excluded.into_iter().flatten() {
        tree.shared.push(Node::not(Node::conjunction(
            selectors.into_iter().map(selected),
        )));
    }

    let clauses = tree.clauses(root, tests);
    debug!(
        "tree encoding: size {}, {} branches, {} clauses",
        config.size,
        tree.choices.len(),
        clauses.len()
    );
    match solver.model(&clauses)? {
        None => Ok(None),
        Some(model) => {
            let mut valuation = Valuation::new();
            let program = tree.decode(&model, root, &mut valuation)?;
            debug!("decoded {}", program);
            Ok(Some(Synthesized { program, valuation }))
        }
    }
}

fn selected(selector: Selector) -> Node {
    Node::var(Variable::Selector(selector))
}

fn branch(output: BranchOutput) -> Node {
    Node::var(Variable::BranchOutput(output))
}

#[derive(Debug)]
struct Choice {
    selector: Selector,
    component: Rc<Component>,
    children: Vec<BranchOutput>,
}

/// A child branch of the pool, with the forbidden subprograms routed to it.
struct Slot<'p> {
    output: BranchOutput,
    accepts: Accepts,
    requests: Vec<&'p Program>,
}

struct Tree<'a> {
    components: &'a [Rc<Component>],
    choices: HashMap<BranchOutput, Vec<Choice>>,
    /// Clauses over selectors only.
    shared: Vec<Node>,
    /// Clauses over branch outputs, copied for every test.
    templates: Vec<Node>,
}

impl<'a> Tree<'a> {
    fn new(components: &'a [Rc<Component>]) -> Self {
        Tree {
            components,
            choices: HashMap::new(),
            shared: vec![],
            templates: vec![],
        }
    }

    fn offered(&self, ty: Type, accepts: Accepts) -> impl Iterator<Item = &'a Rc<Component>> {
        let components = self.components;
        components
            .iter()
            .filter(move |c| c.ty() == ty && accepts.admits(c.semantics()))
    }

    fn choose(
        &mut self,
        output: BranchOutput,
        component: &Rc<Component>,
        children: Vec<BranchOutput>,
    ) -> Selector {
        let selector = Selector::fresh();
        let mapping = component
            .holes()
            .iter()
            .zip(&children)
            .map(|(hole, child)| (Variable::Hole(hole.clone()), branch(*child)))
            .collect();
        self.templates.push(Node::implies(
            selected(selector),
            Node::equal(branch(output), component.semantics().substitute(&mapping)),
        ));
        self.choices.entry(output).or_default().push(Choice {
            selector,
            component: Rc::clone(component),
            children,
        });
        selector
    }

    /// Encode the choices for `output` within `size` levels. Returns whether
    /// any choice exists and, for each of `forbidden`, the selectors that
    /// together rebuild it here, if it can be rebuilt.
    fn encode_branch<'p>(
        &mut self,
        output: BranchOutput,
        accepts: Accepts,
        size: usize,
        forbidden: &[&'p Program],
    ) -> (bool, Vec<Option<Vec<Selector>>>) {
        let mut excluded = vec![None; forbidden.len()];
        if size == 0 {
            return (false, excluded);
        }
        let ty = output.ty();

        for c in self.offered(ty, accepts).filter(|c| c.is_leaf()) {
            let selector = self.choose(output, c, vec![]);
            for (i, &p) in forbidden.iter().enumerate() {
                if p.children().next().is_none() && p.component().semantics() == c.semantics() {
                    excluded[i] = Some(vec![selector]);
                }
            }
        }

        if size > 1 {
            let mut slots: Vec<Slot<'p>> = vec![];
            let mut pool: HashMap<(Type, Accepts), Vec<usize>> = HashMap::new();
            let mut uses = vec![];
            // (forbidden index, component, slot and request index per child)
            let mut routes = vec![];

            for c in self.offered(ty, accepts).filter(|c| !c.is_leaf()) {
                let mut taken: HashMap<(Type, Accepts), usize> = HashMap::new();
                let mut assigned = Vec::with_capacity(c.holes().len());
                for hole in c.holes() {
                    let key = (hole.ty(), hole.accepts());
                    let n = taken.entry(key).or_insert(0);
                    let indices = pool.entry(key).or_default();
                    if *n == indices.len() {
                        indices.push(slots.len());
                        slots.push(Slot {
                            output: BranchOutput::fresh(hole.ty()),
                            accepts: hole.accepts(),
                            requests: vec![],
                        });
                    }
                    assigned.push(indices[*n]);
                    *n += 1;
                }

                for (i, &p) in forbidden.iter().enumerate() {
                    if p.component().semantics() != c.semantics()
                        || p.children().count() != assigned.len()
                    {
                        continue;
                    }
                    let mut route = Vec::with_capacity(assigned.len());
                    for (slot, child) in assigned.iter().zip(p.children()) {
                        route.push((*slot, slots[*slot].requests.len()));
                        slots[*slot].requests.push(child);
                    }
                    routes.push((i, Rc::clone(c), route));
                }
                uses.push((Rc::clone(c), assigned));
            }

            let mut outcomes = Vec::with_capacity(slots.len());
            for slot in &slots {
                outcomes.push(self.encode_branch(
                    slot.output,
                    slot.accepts,
                    size - 1,
                    &slot.requests,
                ));
            }

            let mut selectors = HashMap::new();
            for (c, assigned) in uses {
                if !assigned.iter().all(|s| outcomes[*s].0) {
                    trace!("{} has a hole no component fits", c);
                    continue;
                }
                let children = assigned.iter().map(|s| slots[*s].output).collect();
                let selector = self.choose(output, &c, children);
                selectors.insert(c.id(), selector);
            }

            for (i, c, route) in routes {
                let Some(selector) = selectors.get(&c.id()) else {
                    continue;
                };
                let mut rebuild = vec![*selector];
                let complete = route.iter().all(|(slot, request)| {
                    match &outcomes[*slot].1[*request] {
                        Some(below) => {
                            rebuild.extend(below.iter().copied());
                            true
                        }
                        None => false,
                    }
                });
                if complete {
                    excluded[i] = Some(rebuild);
                }
            }
        }

        let viable = match self.choices.get(&output) {
            Some(choices) if !choices.is_empty() => {
                let selectors: Vec<_> = choices.iter().map(|c| selected(c.selector)).collect();
                self.shared.push(Node::disjunction(selectors.iter().cloned()));
                for (i, a) in selectors.iter().enumerate() {
                    for b in &selectors[i + 1..] {
                        self.shared.push(Node::not(Node::and(a.clone(), b.clone())));
                    }
                }
                true
            }
            _ => false,
        };
        (viable, excluded)
    }

    fn clauses(&self, root: BranchOutput, tests: &[&TestCase]) -> Vec<Node> {
        let mut clauses = self.shared.clone();
        let output = branch(root);
        for test in tests {
            let id = test.id();
            clauses.extend(self.templates.iter().map(|t| t.instantiate(id)));
            clauses.extend(test.constraints(&output).iter().map(|c| c.instantiate(id)));
        }
        clauses
    }

    fn decode(
        &self,
        model: &Model,
        output: BranchOutput,
        valuation: &mut Valuation,
    ) -> Result<Program, Error> {
        let choice = self
            .choices
            .get(&output)
            .into_iter()
            .flatten()
            .find(|c| {
                matches!(
                    model.get(&Variable::Selector(c.selector)).map(Node::expr),
                    Some(Expr::BoolConst(true))
                )
            })
            .ok_or_else(|| {
                Error::Inconsistent(format!(
                    "no component selected for {}",
                    Variable::BranchOutput(output)
                ))
            })?;

        for parameter in choice.component.parameters() {
            let value = model.get(&parameter).cloned().ok_or_else(|| {
                Error::Inconsistent(format!("no value for parameter {}", parameter))
            })?;
            valuation.insert(parameter, value);
        }

        let children = choice
            .children
            .iter()
            .map(|child| self.decode(model, *child, valuation))
            .collect::<Result<_, _>>()?;
        Program::app(Rc::clone(&choice.component), children)
    }
}
