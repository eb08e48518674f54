//! The constraint solver seam.
//!
//! Encoders talk to a [`Solver`]; [`Z3Solver`] implements it on top of z3 by
//! translating each [`Node`] into a z3 term and reading the model back into
//! literal nodes.

use crate::node::{Expr, Node};
use crate::operator::{BinaryOp, UnaryOp};
use crate::types::{Type, TypeError};
use crate::variable::Variable;
use crate::Error;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, trace};
use z3::ast::{Ast, Bool, Dynamic, Int, BV as BitVec};

/// A satisfying assignment, restricted to the variables that occurred in the
/// query.
pub type Model = HashMap<Variable, Node>;

#[derive(Debug)]
pub enum Answer<T> {
    Sat(Model),
    Unsat(T),
}

pub trait Solver {
    /// `None` when `clauses` are unsatisfiable.
    fn model(&mut self, clauses: &[Node]) -> Result<Option<Model>, Error>;

    /// On refutation, the subset of `assumptions` forming an unsatisfiable
    /// core together with `clauses`.
    fn model_or_core(
        &mut self,
        clauses: &[Node],
        assumptions: &[Node],
    ) -> Result<Answer<Vec<Node>>, Error>;

    /// On refutation, a formula over the shared vocabulary implied by `left`
    /// and inconsistent with `right`.
    fn model_or_interpolant(
        &mut self,
        left: &[Node],
        right: &[Node],
    ) -> Result<Answer<Node>, Error>;
}

pub struct Z3Solver<'ctx> {
    context: &'ctx z3::Context,
    solver: z3::Solver<'ctx>,
}

impl fmt::Debug for Z3Solver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Z3Solver").finish_non_exhaustive()
    }
}

impl<'ctx> Z3Solver<'ctx> {
    /// `context` must have model generation enabled.
    pub fn new(context: &'ctx z3::Context) -> Self {
        Z3Solver {
            context,
            solver: z3::Solver::new(context),
        }
    }

    fn assert_all(&self, translation: &mut Translation<'ctx>, clauses: &[Node]) -> Result<(), Error> {
        for clause in clauses {
            trace!("assert {}", clause);
            let formula = translation.formula(clause)?;
            self.solver.assert(&formula);
        }
        Ok(())
    }

    fn check(&self, assumptions: &[Bool<'ctx>]) -> Result<bool, Error> {
        let result = if assumptions.is_empty() {
            self.solver.check()
        } else {
            self.solver.check_assumptions(assumptions)
        };
        match result {
            z3::SatResult::Sat => Ok(true),
            z3::SatResult::Unsat => Ok(false),
            z3::SatResult::Unknown => Err(Error::Solver(
                self.solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "unknown".to_string()),
            )),
        }
    }

    fn read_model(&self, translation: &Translation<'ctx>) -> Result<Model, Error> {
        let model = self
            .solver
            .get_model()
            .ok_or_else(|| Error::Solver("satisfiable query produced no model".to_string()))?;
        let mut values = Model::with_capacity(translation.symbols.len());
        for (variable, symbol) in &translation.symbols {
            let value = model
                .eval(symbol, true)
                .ok_or_else(|| Error::Solver(format!("no value for {}", variable)))?;
            values.insert(variable.clone(), literal(variable, &value)?);
        }
        Ok(values)
    }
}

impl<'ctx> Solver for Z3Solver<'ctx> {
    fn model(&mut self, clauses: &[Node]) -> Result<Option<Model>, Error> {
        debug!("solving {} clauses", clauses.len());
        self.solver.reset();
        let mut translation = Translation::new(self.context);
        self.assert_all(&mut translation, clauses)?;
        if self.check(&[])? {
            self.read_model(&translation).map(Some)
        } else {
            Ok(None)
        }
    }

    fn model_or_core(
        &mut self,
        clauses: &[Node],
        assumptions: &[Node],
    ) -> Result<Answer<Vec<Node>>, Error> {
        debug!(
            "solving {} clauses under {} assumptions",
            clauses.len(),
            assumptions.len()
        );
        self.solver.reset();
        let mut translation = Translation::new(self.context);
        self.assert_all(&mut translation, clauses)?;

        // z3 only accepts literals as assumptions, so each assumption is
        // guarded by a fresh indicator.
        let mut indicators = Vec::with_capacity(assumptions.len());
        for assumption in assumptions {
            let formula = translation.formula(assumption)?;
            let indicator = Bool::fresh_const(self.context, "assumption");
            self.solver.assert(&indicator.implies(&formula));
            indicators.push(indicator);
        }

        if self.check(&indicators)? {
            return self.read_model(&translation).map(Answer::Sat);
        }
        let core: HashSet<String> = self
            .solver
            .get_unsat_core()
            .iter()
            .map(|b| b.to_string())
            .collect();
        let core = indicators
            .iter()
            .zip(assumptions)
            .filter(|(indicator, _)| core.contains(&indicator.to_string()))
            .map(|(_, assumption)| assumption.clone())
            .collect();
        Ok(Answer::Unsat(core))
    }

    fn model_or_interpolant(
        &mut self,
        left: &[Node],
        right: &[Node],
    ) -> Result<Answer<Node>, Error> {
        self.solver.reset();
        let mut translation = Translation::new(self.context);
        self.assert_all(&mut translation, left)?;
        self.assert_all(&mut translation, right)?;
        if self.check(&[])? {
            self.read_model(&translation).map(Answer::Sat)
        } else {
            Err(Error::Unsupported(
                "z3 does not compute Craig interpolants".to_string(),
            ))
        }
    }
}

fn literal(variable: &Variable, value: &Dynamic) -> Result<Node, Error> {
    let not_literal = || Error::Solver(format!("{} = {} is not a literal", variable, value));
    match variable.ty() {
        Type::Int => value
            .as_int()
            .and_then(|i| i.as_i64())
            .map(Node::int)
            .ok_or_else(|| {
                Error::Unsupported(format!("{} = {} does not fit in 64 bits", variable, value))
            }),
        Type::Bool => value
            .as_bool()
            .and_then(|b| b.as_bool())
            .map(Node::bool)
            .ok_or_else(not_literal),
        Type::BitVector(width) => value
            .as_bv()
            .and_then(|bv| bv.as_u64())
            .map(|v| Node::bit_vector(v, width))
            .ok_or_else(not_literal),
    }
}

/// Maps one query's nodes to z3 terms, one fresh constant per variable.
struct Translation<'ctx> {
    context: &'ctx z3::Context,
    symbols: HashMap<Variable, Dynamic<'ctx>>,
}

impl<'ctx> Translation<'ctx> {
    fn new(context: &'ctx z3::Context) -> Self {
        Translation {
            context,
            symbols: HashMap::new(),
        }
    }

    fn formula(&mut self, clause: &Node) -> Result<Bool<'ctx>, Error> {
        let ty = clause.type_of()?;
        if ty != Type::Bool {
            return Err(TypeError::NotAFormula(ty).into());
        }
        self.boolean(clause)
    }

    fn symbol(&mut self, variable: &Variable) -> Dynamic<'ctx> {
        if let Some(symbol) = self.symbols.get(variable) {
            return symbol.clone();
        }
        let context = self.context;
        let prefix = variable.to_string();
        let symbol = match variable.ty() {
            Type::Int => Dynamic::from_ast(&Int::fresh_const(context, &prefix)),
            Type::Bool => Dynamic::from_ast(&Bool::fresh_const(context, &prefix)),
            Type::BitVector(width) => {
                Dynamic::from_ast(&BitVec::fresh_const(context, &prefix, width))
            }
        };
        self.symbols.insert(variable.clone(), symbol.clone());
        symbol
    }

    fn int(&mut self, node: &Node) -> Result<Int<'ctx>, Error> {
        self.term(node)?.as_int().ok_or_else(|| ill_sorted(node))
    }

    fn boolean(&mut self, node: &Node) -> Result<Bool<'ctx>, Error> {
        self.term(node)?.as_bool().ok_or_else(|| ill_sorted(node))
    }

    fn bit_vector(&mut self, node: &Node) -> Result<BitVec<'ctx>, Error> {
        self.term(node)?.as_bv().ok_or_else(|| ill_sorted(node))
    }

    fn term(&mut self, node: &Node) -> Result<Dynamic<'ctx>, Error> {
        let context = self.context;
        let term = match node.expr() {
            Expr::IntConst(i) => Dynamic::from_ast(&Int::from_i64(context, *i)),
            Expr::BoolConst(b) => Dynamic::from_ast(&Bool::from_bool(context, *b)),
            Expr::BitVecConst(bv) => Dynamic::from_ast(&BitVec::from_i64(
                context,
                bv.value() as i64,
                bv.width(),
            )),
            Expr::Var(v) => self.symbol(v),
            Expr::Unary(op, a) => match op {
                UnaryOp::Neg => Dynamic::from_ast(&self.int(a)?.unary_minus()),
                UnaryOp::Not => Dynamic::from_ast(&self.boolean(a)?.not()),
                UnaryOp::BvNot => Dynamic::from_ast(&self.bit_vector(a)?.bvnot()),
                UnaryOp::BvNeg => Dynamic::from_ast(&self.bit_vector(a)?.bvneg()),
            },
            Expr::Binary(op, a, b) => self.binary(*op, a, b)?,
            Expr::Ite(c, a, b) => {
                let c = self.boolean(c)?;
                let a = self.term(a)?;
                let b = self.term(b)?;
                c.ite(&a, &b)
            }
        };
        Ok(term)
    }

    fn binary(&mut self, op: BinaryOp, a: &Node, b: &Node) -> Result<Dynamic<'ctx>, Error> {
        let context = self.context;
        if op == BinaryOp::Eq {
            let a = self.term(a)?;
            let b = self.term(b)?;
            return Ok(Dynamic::from_ast(&a._eq(&b)));
        }
        if op.is_bit_vector() {
            let x = self.bit_vector(a)?;
            let y = self.bit_vector(b)?;
            let term = match op {
                BinaryOp::BvAdd => Dynamic::from_ast(&x.bvadd(&y)),
                BinaryOp::BvSub => Dynamic::from_ast(&x.bvsub(&y)),
                BinaryOp::BvMul => Dynamic::from_ast(&x.bvmul(&y)),
                BinaryOp::BvUDiv => Dynamic::from_ast(&x.bvudiv(&y)),
                BinaryOp::BvSDiv => Dynamic::from_ast(&x.bvsdiv(&y)),
                BinaryOp::BvURem => Dynamic::from_ast(&x.bvurem(&y)),
                BinaryOp::BvSRem => Dynamic::from_ast(&x.bvsrem(&y)),
                BinaryOp::BvSMod => Dynamic::from_ast(&x.bvsmod(&y)),
                BinaryOp::BvAnd => Dynamic::from_ast(&x.bvand(&y)),
                BinaryOp::BvOr => Dynamic::from_ast(&x.bvor(&y)),
                BinaryOp::BvXor => Dynamic::from_ast(&x.bvxor(&y)),
                BinaryOp::BvShl => Dynamic::from_ast(&x.bvshl(&y)),
                BinaryOp::BvLShr => Dynamic::from_ast(&x.bvlshr(&y)),
                BinaryOp::BvAShr => Dynamic::from_ast(&x.bvashr(&y)),
                BinaryOp::BvULt => Dynamic::from_ast(&x.bvult(&y)),
                BinaryOp::BvULe => Dynamic::from_ast(&x.bvule(&y)),
                BinaryOp::BvUGt => Dynamic::from_ast(&x.bvugt(&y)),
                BinaryOp::BvUGe => Dynamic::from_ast(&x.bvuge(&y)),
                BinaryOp::BvSLt => Dynamic::from_ast(&x.bvslt(&y)),
                BinaryOp::BvSLe => Dynamic::from_ast(&x.bvsle(&y)),
                BinaryOp::BvSGt => Dynamic::from_ast(&x.bvsgt(&y)),
                BinaryOp::BvSGe => Dynamic::from_ast(&x.bvsge(&y)),
                _ => return Err(Error::Unsupported(format!("bit-vector operator {}", op))),
            };
            return Ok(term);
        }
        let term = match op {
            BinaryOp::And | BinaryOp::Or | BinaryOp::Implies | BinaryOp::Iff => {
                let x = self.boolean(a)?;
                let y = self.boolean(b)?;
                let formula = match op {
                    BinaryOp::And => Bool::and(context, &[&x, &y]),
                    BinaryOp::Or => Bool::or(context, &[&x, &y]),
                    BinaryOp::Implies => x.implies(&y),
                    _ => x.iff(&y),
                };
                Dynamic::from_ast(&formula)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let x = self.int(a)?;
                let y = self.int(b)?;
                let formula = match op {
                    BinaryOp::Lt => x.lt(&y),
                    BinaryOp::Le => x.le(&y),
                    BinaryOp::Gt => x.gt(&y),
                    _ => x.ge(&y),
                };
                Dynamic::from_ast(&formula)
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let x = self.int(a)?;
                let y = self.int(b)?;
                let value = match op {
                    BinaryOp::Add => Int::add(context, &[&x, &y]),
                    BinaryOp::Sub => Int::sub(context, &[&x, &y]),
                    BinaryOp::Mul => Int::mul(context, &[&x, &y]),
                    BinaryOp::Div => x.div(&y),
                    _ => x.modulo(&y),
                };
                Dynamic::from_ast(&value)
            }
            _ => return Err(Error::Unsupported(format!("operator {}", op))),
        };
        Ok(term)
    }
}

fn ill_sorted(node: &Node) -> Error {
    Error::Solver(format!("ill-sorted term {}", node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn context() -> z3::Context {
        let mut config = z3::Config::new();
        config.set_model_generation(true);
        z3::Context::new(&config)
    }

    fn x() -> Node {
        Node::var(Variable::program("x", Type::Int))
    }

    #[test]
    fn model_of_linear_constraints() {
        let context = context();
        let mut solver = Z3Solver::new(&context);
        let clauses = vec![
            Node::equal(Node::binary(BinaryOp::Add, x(), Node::int(2)), Node::int(5)),
        ];
        let model = solver.model(&clauses).unwrap().unwrap();
        assert_eq!(model[&Variable::program("x", Type::Int)], Node::int(3));
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn unsatisfiable_is_not_an_error() {
        let context = context();
        let mut solver = Z3Solver::new(&context);
        let clauses = vec![
            Node::binary(BinaryOp::Gt, x(), Node::int(2)),
            Node::binary(BinaryOp::Lt, x(), Node::int(1)),
        ];
        assert!(solver.model(&clauses).unwrap().is_none());
        // The session is reset between calls.
        assert!(solver.model(&clauses[..1]).unwrap().is_some());
    }

    #[test]
    fn bit_vector_model() {
        let context = context();
        let mut solver = Z3Solver::new(&context);
        let b = Node::var(Variable::program("b", Type::BitVector(8)));
        let clauses = vec![Node::equal(
            Node::binary(BinaryOp::BvAdd, b, Node::bit_vector(1, 8)),
            Node::bit_vector(0, 8),
        )];
        let model = solver.model(&clauses).unwrap().unwrap();
        assert_eq!(
            model[&Variable::program("b", Type::BitVector(8))],
            Node::bit_vector(0xff, 8)
        );
    }

    #[test]
    fn unsat_core_names_conflicting_assumptions() {
        let context = context();
        let mut solver = Z3Solver::new(&context);
        let clauses = vec![Node::binary(BinaryOp::Ge, x(), Node::int(0))];
        let negative = Node::binary(BinaryOp::Lt, x(), Node::int(0));
        let small = Node::binary(BinaryOp::Lt, x(), Node::int(10));
        match solver
            .model_or_core(&clauses, &[small.clone(), negative.clone()])
            .unwrap()
        {
            Answer::Unsat(core) => {
                assert!(core.contains(&negative));
                assert!(!core.contains(&small));
            }
            Answer::Sat(model) => panic!("unexpected model {:?}", model),
        }
        match solver.model_or_core(&clauses, &[small]).unwrap() {
            Answer::Sat(_) => {}
            Answer::Unsat(core) => panic!("unexpected core {:?}", core),
        }
    }

    #[test]
    fn interpolation_is_unsupported() {
        let context = context();
        let mut solver = Z3Solver::new(&context);
        let left = vec![Node::binary(BinaryOp::Gt, x(), Node::int(2))];
        let right = vec![Node::binary(BinaryOp::Lt, x(), Node::int(1))];
        assert!(matches!(
            solver.model_or_interpolant(&left, &left),
            Ok(Answer::Sat(_))
        ));
        assert!(matches!(
            solver.model_or_interpolant(&left, &right),
            Err(Error::Unsupported(_))
        ));
    }

    fn random_term(rng: &mut SmallRng, ty: Type, depth: u32) -> Node {
        const INT_OPS: [BinaryOp; 5] = [
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Mul,
            BinaryOp::Div,
            BinaryOp::Mod,
        ];
        const BV_OPS: [BinaryOp; 14] = [
            BinaryOp::BvAdd,
            BinaryOp::BvSub,
            BinaryOp::BvMul,
            BinaryOp::BvUDiv,
            BinaryOp::BvSDiv,
            BinaryOp::BvURem,
            BinaryOp::BvSRem,
            BinaryOp::BvSMod,
            BinaryOp::BvAnd,
            BinaryOp::BvOr,
            BinaryOp::BvXor,
            BinaryOp::BvShl,
            BinaryOp::BvLShr,
            BinaryOp::BvAShr,
        ];
        if depth == 0 || rng.gen_bool(0.3) {
            return match ty {
                Type::BitVector(width) => Node::bit_vector(rng.gen(), width),
                _ => Node::int(rng.gen_range(-9..10)),
            };
        }
        let op = match ty {
            Type::BitVector(_) => BV_OPS[rng.gen_range(0..BV_OPS.len())],
            _ => INT_OPS[rng.gen_range(0..INT_OPS.len())],
        };
        let lhs = random_term(rng, ty, depth - 1);
        let rhs = random_term(rng, ty, depth - 1);
        Node::binary(op, lhs, rhs)
    }

    #[test]
    fn folding_agrees_with_z3() {
        let context = context();
        let mut solver = Z3Solver::new(&context);
        let mut rng = SmallRng::seed_from_u64(42);
        let mut checked = 0;
        for i in 0..200 {
            let ty = if i % 2 == 0 { Type::Int } else { Type::BitVector(8) };
            let term = random_term(&mut rng, ty, 3);
            let folded = fold::evaluate(&term, &HashMap::new());
            // Integer division by zero is left to the solver.
            if !folded.is_constant() {
                continue;
            }
            let differs = Node::not(Node::equal(term.clone(), folded.clone()));
            assert!(
                solver.model(&[differs]).unwrap().is_none(),
                "{} folded to {}",
                term,
                folded
            );
            checked += 1;
        }
        assert!(checked >= 100);
    }

    #[test]
    fn non_boolean_clause_is_a_type_error() {
        let context = context();
        let mut solver = Z3Solver::new(&context);
        assert!(matches!(
            solver.model(&[x()]),
            Err(Error::Type(TypeError::NotAFormula(Type::Int)))
        ));
    }
}
