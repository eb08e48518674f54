//! Location-based encoding of component-based synthesis.
//!
//! Every component output and every component input is assigned a location.
//! Leaf outputs occupy `[0, #leaves)`, the other outputs `[#leaves, N)`, and
//! an input is connected to the output sharing its location. Requiring every
//! input to sit strictly before its own component's output makes the wiring
//! acyclic.
//!
//! Locations are shared by all test cases; component values are copied per
//! test so one wiring has to explain every test.

use crate::component::{self, Component};
use crate::node::{Expr, Node};
use crate::operator::BinaryOp;
use crate::program::{Program, Valuation};
use crate::solver::{Model, Solver};
use crate::test_case::TestCase;
use crate::variable::{LocationEncoding, Variable};
use crate::{Error, Library, Synthesized, Synthesizer};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

/// How locations are represented in the solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LocationSort {
    #[default]
    Integer,
    /// Unsigned bit-vectors just wide enough for the component count.
    BitVector,
}

#[derive(Clone, Debug, Default)]
pub struct DagConfig {
    bound: Option<usize>,
    locations: LocationSort,
}

impl DagConfig {
    /// Limit the result to the leaves plus at most `bound` further locations.
    pub fn with_bound(self, bound: usize) -> Self {
        DagConfig {
            bound: Some(bound),
            ..self
        }
    }

    pub fn with_locations(self, locations: LocationSort) -> Self {
        DagConfig { locations, ..self }
    }

    pub fn bound(&self) -> Option<usize> {
        self.bound
    }
}

/// Synthesize with a fresh set of components, one per copy in the library.
#[derive(Debug)]
pub struct DagSynthesizer<S> {
    solver: S,
    library: Library,
    config: DagConfig,
}

impl<S: Solver> DagSynthesizer<S> {
    pub fn new(solver: S, library: Library, config: DagConfig) -> Self {
        DagSynthesizer {
            solver,
            library,
            config,
        }
    }
}

impl<S: Solver> Synthesizer for DagSynthesizer<S> {
    fn synthesize(&mut self, tests: &[&TestCase]) -> Result<Option<Synthesized>, Error> {
        let components = self.library.flatten()?;
        synthesize(&mut self.solver, &components, tests, &self.config)
    }
}

pub fn synthesize<S: Solver + ?Sized>(
    solver: &mut S,
    components: &[Rc<Component>],
    tests: &[&TestCase],
    config: &DagConfig,
) -> Result<Option<Synthesized>, Error> {
    let first = tests.first().ok_or(Error::NoTests)?;
    let dag = Dag::new(components, first, config)?;
    let clauses = dag.encode(tests);
    debug!(
        "dag encoding: {} components, {} tests, {} clauses",
        components.len(),
        tests.len(),
        clauses.len()
    );
    match solver.model(&clauses)? {
        None => Ok(None),
        Some(model) => dag.decode(&model).map(Some),
    }
}

struct Dag<'a> {
    components: &'a [Rc<Component>],
    /// Stands for the program's output; its single hole is wired to the
    /// synthesized expression.
    result: Component,
    encoding: LocationEncoding,
    num_leaves: usize,
    bound: Option<usize>,
}

impl<'a> Dag<'a> {
    fn new(
        components: &'a [Rc<Component>],
        test: &TestCase,
        config: &DagConfig,
    ) -> Result<Self, Error> {
        if components.is_empty() {
            return Err(Error::NoComponents);
        }
        let result = Component::new(component::hole("result", test.output_type()?))?;
        let encoding = match config.locations {
            LocationSort::Integer => LocationEncoding::Integer,
            LocationSort::BitVector => {
                let n = components.len() as u64;
                LocationEncoding::BitVector((u64::BITS - n.leading_zeros()).max(1))
            }
        };
        Ok(Dag {
            components,
            result,
            encoding,
            num_leaves: components.iter().filter(|c| c.is_leaf()).count(),
            bound: config.bound,
        })
    }

    fn location(&self, variable: Variable) -> Node {
        Node::var(Variable::location(variable, self.encoding))
    }

    fn line(&self, n: usize) -> Node {
        match self.encoding {
            LocationEncoding::Integer => Node::int(n as i64),
            LocationEncoding::BitVector(width) => Node::bit_vector(n as u64, width),
        }
    }

    fn line_lt(&self, lhs: Node, rhs: Node) -> Node {
        match self.encoding {
            LocationEncoding::Integer => Node::binary(BinaryOp::Lt, lhs, rhs),
            LocationEncoding::BitVector(_) => Node::binary(BinaryOp::BvULt, lhs, rhs),
        }
    }

    fn line_le(&self, lhs: Node, rhs: Node) -> Node {
        match self.encoding {
            LocationEncoding::Integer => Node::binary(BinaryOp::Le, lhs, rhs),
            LocationEncoding::BitVector(_) => Node::binary(BinaryOp::BvULe, lhs, rhs),
        }
    }

    /// `lo <= l < hi`
    fn within(&self, l: &Node, lo: usize, hi: usize) -> [Node; 2] {
        [
            self.line_le(self.line(lo), l.clone()),
            self.line_lt(l.clone(), self.line(hi)),
        ]
    }

    fn result_hole(&self) -> Variable {
        self.result.input(&self.result.holes()[0])
    }

    fn encode(&self, tests: &[&TestCase]) -> Vec<Node> {
        let mut clauses = self.well_formed_program();
        let (pruned, connections) = self.connectivity();
        clauses.extend(pruned);

        let mut templates = self.library();
        templates.extend(connections);

        let output = Node::var(self.result.output());
        for test in tests {
            let id = test.id();
            clauses.extend(templates.iter().map(|t| t.instantiate(id)));
            clauses.extend(test.constraints(&output).iter().map(|c| c.instantiate(id)));
        }
        for clause in &clauses {
            trace!("{}", clause);
        }
        clauses
    }

    /// Encoding well-formed programs.
    fn well_formed_program(&self) -> Vec<Node> {
        let n = self.components.len();
        let mut wfp = Vec::with_capacity(
            // Bounds on every output and input.
            4 * n
                // Consistency.
                + n * n / 2,
        );

        for c in self.components {
            let l = self.location(c.output());
            if c.is_leaf() {
                wfp.extend(self.within(&l, 0, self.num_leaves));
            } else {
                wfp.extend(self.within(&l, self.num_leaves, n));
            }
            for hole in c.holes() {
                let l = self.location(c.input(hole));
                wfp.extend(self.within(&l, 0, n));
            }
        }

        let limit = match self.bound {
            Some(bound) => n.min(self.num_leaves.saturating_add(bound)),
            None => n,
        };
        wfp.extend(self.within(&self.location(self.result_hole()), 0, limit));

        wfp.extend(self.consistent());
        wfp.extend(self.acyclic());
        wfp
    }

    fn consistent(&self) -> Vec<Node> {
        let mut cons = vec![];
        for (i, x) in self.components.iter().enumerate() {
            for y in &self.components[i + 1..] {
                cons.push(Node::not(Node::equal(
                    self.location(x.output()),
                    self.location(y.output()),
                )));
            }
        }
        cons
    }

    fn acyclic(&self) -> Vec<Node> {
        let mut acycs = vec![];
        for c in self.components {
            let result_location = self.location(c.output());
            for hole in c.holes() {
                let param_location = self.location(c.input(hole));
                acycs.push(self.line_lt(param_location, result_location.clone()));
            }
        }
        acycs
    }

    /// Encoding the components' semantics, before per-test instantiation.
    fn library(&self) -> Vec<Node> {
        let mut exprs = Vec::with_capacity(self.components.len() + 1);
        for c in self.components.iter().map(|c| &**c).chain(Some(&self.result)) {
            let inputs = c
                .holes()
                .iter()
                .map(|hole| (Variable::Hole(hole.clone()), Node::var(c.input(hole))))
                .collect();
            exprs.push(Node::equal(
                Node::var(c.output()),
                c.semantics().substitute(&inputs),
            ));
        }
        exprs
    }

    /// Encoding dataflow. Returns the test-independent clauses separating
    /// inputs from outputs they can never be connected to, and the
    /// per-test clauses equating connected values.
    fn connectivity(&self) -> (Vec<Node>, Vec<Node>) {
        let mut pruned = vec![];
        let mut conn = vec![];
        for c in self.components.iter().map(|c| &**c).chain(Some(&self.result)) {
            for hole in c.holes() {
                let input = c.input(hole);
                let l_x = self.location(input.clone());
                for d in self.components {
                    let l_y = self.location(d.output());
                    let same = Node::equal(l_x.clone(), l_y);
                    if hole.ty() == d.ty() && hole.accepts().admits(d.semantics()) {
                        conn.push(Node::implies(
                            same,
                            Node::equal(Node::var(input.clone()), Node::var(d.output())),
                        ));
                    } else {
                        pruned.push(Node::not(same));
                    }
                }
            }
        }
        (pruned, conn)
    }

    fn location_value(&self, model: &Model, variable: Variable) -> Result<u64, Error> {
        let location = Variable::location(variable, self.encoding);
        match model.get(&location).map(Node::expr) {
            Some(Expr::IntConst(i)) if *i >= 0 => Ok(*i as u64),
            Some(Expr::BitVecConst(bv)) => Ok(bv.value()),
            _ => Err(Error::Inconsistent(format!("undefined location {}", location))),
        }
    }

    fn decode(&self, model: &Model) -> Result<Synthesized, Error> {
        let mut placed = HashMap::with_capacity(self.components.len());
        for c in self.components {
            let line = self.location_value(model, c.output())?;
            if placed.insert(line, c).is_some() {
                return Err(Error::Inconsistent(format!(
                    "two components placed at location {}",
                    line
                )));
            }
        }

        let root = self.location_value(model, self.result_hole())?;
        let mut valuation = Valuation::new();
        let program = self.decode_at(model, &placed, root, None, &mut valuation)?;
        debug!("decoded {}", program);
        Ok(Synthesized { program, valuation })
    }

    fn decode_at(
        &self,
        model: &Model,
        placed: &HashMap<u64, &Rc<Component>>,
        line: u64,
        parent: Option<u64>,
        valuation: &mut Valuation,
    ) -> Result<Program, Error> {
        if let Some(parent) = parent {
            if line >= parent {
                return Err(Error::Inconsistent(format!(
                    "input at location {} does not precede its component at {}",
                    line, parent
                )));
            }
        }
        let c = placed
            .get(&line)
            .ok_or_else(|| Error::Inconsistent(format!("dangling pointer to location {}", line)))?;

        for parameter in c.parameters() {
            let value = model.get(&parameter).cloned().ok_or_else(|| {
                Error::Inconsistent(format!("no value for parameter {}", parameter))
            })?;
            valuation.insert(parameter, value);
        }

        let mut children = Vec::with_capacity(c.holes().len());
        for hole in c.holes() {
            let input = self.location_value(model, c.input(hole))?;
            children.push(self.decode_at(model, placed, input, Some(line), valuation)?);
        }
        Program::app(Rc::clone(c), children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{add, greater, greater_or_equal, neg_of, parameter, var};
    use crate::solver::Z3Solver;
    use crate::types::Type;
    use crate::variable::Accepts;

    fn context() -> z3::Context {
        let mut config = z3::Config::new();
        config.set_model_generation(true);
        z3::Context::new(&config)
    }

    fn x() -> Variable {
        Variable::program("x", Type::Int)
    }

    fn y() -> Variable {
        Variable::program("y", Type::Int)
    }

    fn test(x_value: i64, y_value: i64, output: Node) -> TestCase {
        TestCase::new(
            vec![(x(), Node::int(x_value)), (y(), Node::int(y_value))],
            output,
        )
    }

    fn run(library: &Library, tests: &[TestCase], config: &DagConfig) -> Option<Synthesized> {
        let context = context();
        let mut solver = Z3Solver::new(&context);
        let components = library.flatten().unwrap();
        let tests: Vec<_> = tests.iter().collect();
        synthesize(&mut solver, &components, &tests, config).unwrap()
    }

    fn assert_sound(found: &Synthesized, tests: &[TestCase]) {
        let semantics = found.semantics();
        for t in tests {
            assert!(t.accepts(&semantics), "{} fails {}", semantics, t);
        }
    }

    #[test]
    fn synthesize_sum() {
        let library = Library::new()
            .with(var("x", Type::Int), 1)
            .with(var("y", Type::Int), 1)
            .with(add(), 1);
        let tests = vec![test(1, 1, Node::int(2)), test(1, 2, Node::int(3))];
        let found = run(&library, &tests, &DagConfig::default()).unwrap();
        assert_sound(&found, &tests);
        let s = found.to_string();
        assert!(s == "(+ x y)" || s == "(+ y x)", "{}", s);
    }

    #[test]
    fn synthesize_sum_with_bit_vector_locations() {
        let library = Library::new()
            .with(var("x", Type::Int), 1)
            .with(var("y", Type::Int), 1)
            .with(add(), 1);
        let tests = vec![test(1, 1, Node::int(2)), test(1, 2, Node::int(3))];
        let config = DagConfig::default().with_locations(LocationSort::BitVector);
        let found = run(&library, &tests, &config).unwrap();
        assert_sound(&found, &tests);
    }

    #[test]
    fn synthesize_comparison() {
        let library = Library::new()
            .with(var("x", Type::Int), 1)
            .with(var("y", Type::Int), 1)
            .with(greater(), 1)
            .with(greater_or_equal(), 1);
        let tests = vec![
            test(2, 1, Node::bool(true)),
            test(1, 2, Node::bool(false)),
            test(1, 1, Node::bool(false)),
        ];
        let found = run(&library, &tests, &DagConfig::default()).unwrap();
        assert_eq!(found.to_string(), "(> x y)");
    }

    #[test]
    fn constant_hole_rejects_variables() {
        let library = Library::new()
            .with(var("x", Type::Int), 1)
            .with(neg_of(Accepts::Constant), 1);
        let tests = vec![TestCase::new(vec![(x(), Node::int(1))], Node::int(-1))];
        assert!(run(&library, &tests, &DagConfig::default()).is_none());
    }

    #[test]
    fn parameters_are_solved_once_for_all_tests() {
        let library = Library::new()
            .with(var("x", Type::Int), 1)
            .with(parameter("k", Type::Int), 1)
            .with(add(), 1);
        let tests = vec![
            TestCase::new(vec![(x(), Node::int(1))], Node::int(8)),
            TestCase::new(vec![(x(), Node::int(5))], Node::int(12)),
        ];
        let found = run(&library, &tests, &DagConfig::default()).unwrap();
        assert_eq!(
            found.valuation[&Variable::parameter("k", Type::Int)],
            Node::int(7)
        );
        assert_sound(&found, &tests);
    }

    #[test]
    fn bound_excludes_larger_programs() {
        let library = Library::new()
            .with(var("x", Type::Int), 1)
            .with(var("y", Type::Int), 1)
            .with(add(), 1);
        let tests = vec![test(1, 1, Node::int(2)), test(1, 2, Node::int(3))];
        assert!(run(&library, &tests, &DagConfig::default().with_bound(0)).is_none());
        assert!(run(&library, &tests, &DagConfig::default().with_bound(1)).is_some());
    }

    #[test]
    fn bound_beyond_component_count() {
        let library = Library::new()
            .with(var("x", Type::Int), 1)
            .with(var("y", Type::Int), 1)
            .with(add(), 1);
        let tests = vec![test(1, 1, Node::int(2)), test(1, 2, Node::int(3))];
        for bound in [10, usize::MAX] {
            let found = run(&library, &tests, &DagConfig::default().with_bound(bound)).unwrap();
            assert_sound(&found, &tests);
        }
    }

    #[test]
    fn reuses_outputs_in_a_dag() {
        // x + x + x needs two adders, the second consuming the first.
        let library = Library::new()
            .with(var("x", Type::Int), 1)
            .with(add(), 2);
        let tests = vec![
            TestCase::new(vec![(x(), Node::int(1))], Node::int(3)),
            TestCase::new(vec![(x(), Node::int(2))], Node::int(6)),
        ];
        let found = run(&library, &tests, &DagConfig::default()).unwrap();
        assert_sound(&found, &tests);
        assert_eq!(found.program.size(), 5);
    }

    #[test]
    fn empty_inputs_are_errors() {
        let context = context();
        let mut solver = Z3Solver::new(&context);
        let tests = vec![test(1, 1, Node::int(2))];
        let tests: Vec<_> = tests.iter().collect();
        assert!(matches!(
            synthesize(&mut solver, &[], &tests, &DagConfig::default()),
            Err(Error::NoComponents)
        ));
        let components = Library::new()
            .with(var("x", Type::Int), 1)
            .flatten()
            .unwrap();
        assert!(matches!(
            synthesize(&mut solver, &components, &[], &DagConfig::default()),
            Err(Error::NoTests)
        ));
    }

    #[test]
    fn dangling_pointer_is_inconsistent() {
        let components = Library::new()
            .with(var("x", Type::Int), 1)
            .flatten()
            .unwrap();
        let t = test(1, 1, Node::int(1));
        let dag = Dag::new(&components, &t, &DagConfig::default()).unwrap();
        let mut model = Model::new();
        model.insert(
            Variable::location(components[0].output(), LocationEncoding::Integer),
            Node::int(0),
        );
        model.insert(
            Variable::location(dag.result_hole(), LocationEncoding::Integer),
            Node::int(1),
        );
        assert!(matches!(dag.decode(&model), Err(Error::Inconsistent(_))));
    }

    #[test]
    fn cyclic_model_is_inconsistent() {
        let components = Library::new()
            .with(var("x", Type::Int), 1)
            .with(add(), 1)
            .flatten()
            .unwrap();
        let t = test(1, 1, Node::int(1));
        let dag = Dag::new(&components, &t, &DagConfig::default()).unwrap();
        let loc = |v: Variable| Variable::location(v, LocationEncoding::Integer);
        let mut model = Model::new();
        model.insert(loc(components[0].output()), Node::int(0));
        model.insert(loc(components[1].output()), Node::int(1));
        for hole in components[1].holes() {
            model.insert(loc(components[1].input(hole)), Node::int(1));
        }
        model.insert(loc(dag.result_hole()), Node::int(1));
        assert!(matches!(dag.decode(&model), Err(Error::Inconsistent(_))));
    }
}
