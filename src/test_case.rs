use crate::fold;
use crate::node::Node;
use crate::types::{Type, TypeError};
use crate::variable::{TestId, Variable};
use std::collections::HashMap;
use std::fmt::{self, Display};

/// One input/output sample.
///
/// Test cases are not `Clone`: encodings refer to a test by its identity, so
/// a copy would alias the original's instantiated variables.
#[derive(Debug)]
pub struct TestCase {
    id: TestId,
    assignment: HashMap<Variable, Node>,
    output: Node,
}

impl TestCase {
    pub fn new(assignment: impl IntoIterator<Item = (Variable, Node)>, output: Node) -> Self {
        TestCase {
            id: TestId::fresh(),
            assignment: assignment.into_iter().collect(),
            output,
        }
    }

    pub fn id(&self) -> TestId {
        self.id
    }

    pub fn assignment(&self) -> &HashMap<Variable, Node> {
        &self.assignment
    }

    pub fn output(&self) -> &Node {
        &self.output
    }

    pub fn output_type(&self) -> Result<Type, TypeError> {
        self.output.type_of()
    }

    /// One equality per assigned program variable, and `output == expected`.
    pub fn constraints(&self, output: &Node) -> Vec<Node> {
        let mut inputs: Vec<_> = self.assignment.iter().collect();
        inputs.sort_by_key(|(v, _)| v.to_string());
        inputs
            .into_iter()
            .map(|(v, value)| Node::equal(Node::var(v.clone()), value.clone()))
            .chain(std::iter::once(Node::equal(output.clone(), self.output.clone())))
            .collect()
    }

    /// Whether the closed-over `candidate` evaluates to the expected output.
    pub fn accepts(&self, candidate: &Node) -> bool {
        fold::evaluate(candidate, &self.assignment) == self.output
    }
}

impl Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut inputs: Vec<_> = self
            .assignment
            .iter()
            .map(|(v, value)| format!("{}={}", v, value))
            .collect();
        inputs.sort();
        write!(f, "({}) -> {}", inputs.join(", "), self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::BinaryOp;

    fn x() -> Variable {
        Variable::program("x", Type::Int)
    }

    fn y() -> Variable {
        Variable::program("y", Type::Int)
    }

    #[test]
    fn constraints_bind_inputs_and_output() {
        let test = TestCase::new(vec![(y(), Node::int(2)), (x(), Node::int(1))], Node::int(3));
        let out = Node::var(Variable::parameter("out", Type::Int));
        let constraints: Vec<_> = test
            .constraints(&out)
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(constraints, vec!["(= x 1)", "(= y 2)", "(= out 3)"]);
        assert_eq!(test.output_type(), Ok(Type::Int));
    }

    #[test]
    fn accepts_evaluates_candidate() {
        let test = TestCase::new(vec![(x(), Node::int(1)), (y(), Node::int(2))], Node::int(3));
        let sum = Node::binary(BinaryOp::Add, Node::var(x()), Node::var(y()));
        let diff = Node::binary(BinaryOp::Sub, Node::var(x()), Node::var(y()));
        assert!(test.accepts(&sum));
        assert!(!test.accepts(&diff));
    }

    #[test]
    fn tests_have_distinct_identities() {
        let a = TestCase::new(vec![], Node::bool(true));
        let b = TestCase::new(vec![], Node::bool(true));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.to_string(), "() -> true");
    }
}
