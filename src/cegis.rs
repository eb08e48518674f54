//! Counterexample-guided synthesis.
//!
//! Synthesizing against a whole suite is expensive, and most tests are
//! redundant. Start from a single test, and whenever a candidate fails some
//! test of the suite, add that counterexample and synthesize again.

use crate::test_case::TestCase;
use crate::{Error, Synthesized, Synthesizer};
use tracing::{debug, info};

/// Find a program passing every test of `suite`, or `None` when the
/// synthesizer runs out of candidates.
pub fn cegis<S: Synthesizer + ?Sized>(
    synthesizer: &mut S,
    suite: &[TestCase],
) -> Result<Option<Synthesized>, Error> {
    let (first, rest) = suite.split_first().ok_or(Error::NoTests)?;
    let mut current = vec![first];
    let mut pending: Vec<&TestCase> = rest.iter().collect();

    // Each round moves one test into `current`, so this ends after at most
    // `suite.len()` rounds.
    let mut iteration = 0;
    loop {
        iteration += 1;
        info!(
            "cegis iteration {}: synthesizing against {} of {} tests",
            iteration,
            current.len(),
            suite.len()
        );
        let candidate = match synthesizer.synthesize(&current)? {
            Some(candidate) => candidate,
            None => {
                info!("cegis: no program passes the current tests");
                return Ok(None);
            }
        };

        let semantics = candidate.semantics();
        debug!("cegis candidate: {}", semantics);
        match pending.iter().position(|test| !test.accepts(&semantics)) {
            None => {
                info!("cegis: {} passes all {} tests", semantics, suite.len());
                return Ok(Some(candidate));
            }
            Some(failing) => {
                let counterexample = pending.remove(failing);
                debug!("cegis counterexample: {}", counterexample);
                current.push(counterexample);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{add, greater, greater_or_equal, var, Component};
    use crate::dag::{DagConfig, DagSynthesizer};
    use crate::node::Node;
    use crate::program::{Program, Valuation};
    use crate::solver::Z3Solver;
    use crate::tree::{TreeConfig, TreeSynthesizer};
    use crate::types::Type;
    use crate::variable::{TestId, Variable};
    use crate::Library;
    use std::rc::Rc;

    /// Proposes fixed candidates in turn, recording the tests it was asked
    /// about.
    struct Scripted {
        candidates: Vec<Node>,
        asked: Vec<Vec<TestId>>,
    }

    impl Synthesizer for Scripted {
        fn synthesize(&mut self, tests: &[&TestCase]) -> Result<Option<Synthesized>, Error> {
            self.asked.push(tests.iter().map(|t| t.id()).collect());
            if self.candidates.is_empty() {
                return Ok(None);
            }
            let program =
                Program::leaf(Rc::new(Component::new(self.candidates.remove(0)).unwrap()))
                    .unwrap();
            Ok(Some(Synthesized {
                program,
                valuation: Valuation::new(),
            }))
        }
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

    fn context() -> z3::Context {
        let mut config = z3::Config::new();
        config.set_model_generation(true);
        z3::Context::new(&config)
    }

    #[test]
    fn counterexamples_accumulate() {
        let suite = vec![
            test(1, 1, Node::int(1)),
            test(2, 1, Node::int(2)),
            test(1, 2, Node::int(2)),
        ];
        // x fails only the last test, then y fails the second.
        let mut synthesizer = Scripted {
            candidates: vec![var("x", Type::Int), var("y", Type::Int), var("y", Type::Int)],
            asked: vec![],
        };
        let found = cegis(&mut synthesizer, &suite).unwrap().unwrap();
        assert_eq!(found.to_string(), "y");
        assert_eq!(
            synthesizer.asked,
            vec![
                vec![suite[0].id()],
                vec![suite[0].id(), suite[2].id()],
                vec![suite[0].id(), suite[2].id(), suite[1].id()],
            ]
        );
    }

    #[test]
    fn first_passing_candidate_is_returned() {
        let suite = vec![test(1, 1, Node::int(1)), test(3, 1, Node::int(3))];
        let mut synthesizer = Scripted {
            candidates: vec![var("x", Type::Int)],
            asked: vec![],
        };
        let found = cegis(&mut synthesizer, &suite).unwrap().unwrap();
        assert_eq!(found.to_string(), "x");
        assert_eq!(synthesizer.asked.len(), 1);
    }

    #[test]
    fn exhausted_synthesizer_fails() {
        let suite = vec![test(1, 1, Node::int(1))];
        let mut synthesizer = Scripted {
            candidates: vec![],
            asked: vec![],
        };
        assert!(cegis(&mut synthesizer, &suite).unwrap().is_none());
    }

    #[test]
    fn empty_suite_is_an_error() {
        let mut synthesizer = Scripted {
            candidates: vec![],
            asked: vec![],
        };
        assert!(matches!(cegis(&mut synthesizer, &[]), Err(Error::NoTests)));
        assert!(synthesizer.asked.is_empty());
    }

    #[test]
    fn dag_cegis_finds_comparison() {
        let context = context();
        let library = Library::new()
            .with(var("x", Type::Int), 1)
            .with(var("y", Type::Int), 1)
            .with(greater(), 1)
            .with(greater_or_equal(), 1);
        let mut synthesizer =
            DagSynthesizer::new(Z3Solver::new(&context), library, DagConfig::default());
        let suite = vec![
            test(2, 1, Node::bool(true)),
            test(1, 2, Node::bool(false)),
            test(1, 1, Node::bool(false)),
            test(5, 3, Node::bool(true)),
        ];
        let found = cegis(&mut synthesizer, &suite).unwrap().unwrap();
        assert_eq!(found.to_string(), "(> x y)");
    }

    #[test]
    fn tree_cegis_finds_sum() {
        let context = context();
        let library = Library::new()
            .with(var("x", Type::Int), 1)
            .with(var("y", Type::Int), 1)
            .with(add(), 1);
        let mut synthesizer =
            TreeSynthesizer::new(Z3Solver::new(&context), library, TreeConfig::default());
        let suite = vec![
            test(1, 1, Node::int(2)),
            test(1, 2, Node::int(3)),
            test(4, 0, Node::int(4)),
        ];
        let found = cegis(&mut synthesizer, &suite).unwrap().unwrap();
        for t in &suite {
            assert!(t.accepts(&found.semantics()));
        }
    }
}
