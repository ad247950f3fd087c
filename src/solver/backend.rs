use super::model::{Model, Value};
use super::optimizer::{Optimizer, SatResult};
use super::term::{Context, Sort, TermId, TermNode, VarKind};
use crate::error::SolverError;
use z3::ast::{Ast, Bool, Int};

/// [`Optimizer`] backed by Z3's `Optimize` engine.
///
/// Every `check` lowers the recorded terms into a fresh Z3 context, so the optimizer
/// itself holds no Z3 state and can move between threads. Variables that no assertion
/// or objective mentions take their preferred value (a boolean's phase, an integer's
/// lower bound).
#[derive(Debug, Default)]
pub struct Z3Optimizer {
    assertions: Vec<TermId>,
    objectives: Vec<TermId>,
    model: Option<Model>,
    timeout_ms: Option<u64>,
}

impl Z3Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives up with [`SolverError::Undecided`] once a check runs longer than `ms`.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }
}

impl Optimizer for Z3Optimizer {
    fn assert(&mut self, ctx: &Context, formula: TermId) -> Result<(), SolverError> {
        if ctx.sort(formula) != Sort::Bool {
            return Err(SolverError::NonBooleanAssertion(formula.0));
        }
        self.assertions.push(formula);
        Ok(())
    }

    fn minimize(&mut self, ctx: &Context, objective: TermId) -> Result<(), SolverError> {
        if ctx.sort(objective) != Sort::Int {
            return Err(SolverError::NonIntegerObjective(objective.0));
        }
        self.objectives.push(objective);
        Ok(())
    }

    fn check(&mut self, ctx: &Context) -> Result<SatResult, SolverError> {
        let mut config = z3::Config::new();
        config.set_model_generation(true);
        if let Some(ms) = self.timeout_ms {
            config.set_timeout_msec(ms);
        }
        let z3 = z3::Context::new(&config);
        let optimize = z3::Optimize::new(&z3);

        let mut roots = self.assertions.clone();
        roots.extend_from_slice(&self.objectives);
        let lowered = Lowering::run(&z3, ctx, &roots)?;

        for bound in &lowered.bounds {
            optimize.assert(bound);
        }
        for &assertion in &self.assertions {
            optimize.assert(lowered.boolean(assertion)?);
        }
        for &objective in &self.objectives {
            optimize.minimize(lowered.integer(objective)?);
        }
        log::debug!(
            "Z3 lowered {} terms for {} assertions and {} objectives",
            lowered.count,
            self.assertions.len(),
            self.objectives.len()
        );

        match optimize.check(&[]) {
            z3::SatResult::Unsat => {
                self.model = None;
                Ok(SatResult::Unsat)
            }
            z3::SatResult::Unknown => {
                self.model = None;
                Err(SolverError::Undecided)
            }
            z3::SatResult::Sat => {
                let found = optimize.get_model().ok_or(SolverError::NoModel)?;
                let values = ctx
                    .variables()
                    .iter()
                    .map(|variable| match &lowered.terms[variable.term.index()] {
                        Some(Lowered::Bool(b)) => found
                            .eval(b, true)
                            .and_then(|v| v.as_bool())
                            .map(Value::Bool)
                            .ok_or_else(|| SolverError::MissingValue(variable.name.clone())),
                        Some(Lowered::Int(i)) => found
                            .eval(i, true)
                            .and_then(|v| v.as_i64())
                            .map(Value::Int)
                            .ok_or_else(|| SolverError::MissingValue(variable.name.clone())),
                        None => Ok(preferred(variable.kind)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.model = Some(Model::new(values));
                Ok(SatResult::Sat)
            }
        }
    }

    fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }
}

fn preferred(kind: VarKind) -> Value {
    match kind {
        VarKind::Bool { phase } => Value::Bool(phase),
        VarKind::Int { lo, .. } => Value::Int(lo),
    }
}

enum Lowered<'z> {
    Bool(Bool<'z>),
    Int(Int<'z>),
}

/// Z3 counterparts of the terms reachable from a set of roots, indexed by term.
struct Lowering<'z> {
    terms: Vec<Option<Lowered<'z>>>,
    /// Domain constraints of the integer variables that were lowered.
    bounds: Vec<Bool<'z>>,
    count: usize,
}

impl<'z> Lowering<'z> {
    fn run(z3: &'z z3::Context, ctx: &Context, roots: &[TermId]) -> Result<Self, SolverError> {
        let mut lowering = Self {
            terms: (0..ctx.len()).map(|_| None).collect(),
            bounds: Vec::new(),
            count: 0,
        };
        // Children are interned before their parents, so ascending ids are bottom-up.
        let mut order = ctx.reachable(roots);
        order.sort_unstable();
        for term in order {
            let lowered = lowering.lower(z3, ctx, term)?;
            lowering.terms[term.index()] = Some(lowered);
            lowering.count += 1;
        }
        Ok(lowering)
    }

    fn lower(
        &mut self,
        z3: &'z z3::Context,
        ctx: &Context,
        term: TermId,
    ) -> Result<Lowered<'z>, SolverError> {
        Ok(match ctx.node(term) {
            TermNode::Bool(b) => Lowered::Bool(Bool::from_bool(z3, *b)),
            TermNode::Int(v) => Lowered::Int(Int::from_i64(z3, *v)),
            TermNode::Var(var) => match ctx.variable(*var).kind {
                VarKind::Bool { .. } => Lowered::Bool(Bool::new_const(z3, var.0)),
                VarKind::Int { lo, hi } => {
                    let constant = Int::new_const(z3, var.0);
                    self.bounds.push(constant.ge(&Int::from_i64(z3, lo)));
                    self.bounds.push(constant.le(&Int::from_i64(z3, hi)));
                    Lowered::Int(constant)
                }
            },
            TermNode::Not(t) => Lowered::Bool(self.boolean(*t)?.not()),
            TermNode::And(ts) => {
                let operands = self.booleans(ts)?;
                Lowered::Bool(Bool::and(z3, &operands))
            }
            TermNode::Or(ts) => {
                let operands = self.booleans(ts)?;
                Lowered::Bool(Bool::or(z3, &operands))
            }
            TermNode::Xor(a, b) => Lowered::Bool(self.boolean(*a)?.xor(self.boolean(*b)?)),
            TermNode::Ite(c, t, e) => {
                let cond = self.boolean(*c)?;
                match ctx.sort(term) {
                    Sort::Bool => Lowered::Bool(cond.ite(self.boolean(*t)?, self.boolean(*e)?)),
                    Sort::Int => Lowered::Int(cond.ite(self.integer(*t)?, self.integer(*e)?)),
                }
            }
            TermNode::Eq(a, b) => match ctx.sort(*a) {
                Sort::Bool => Lowered::Bool(self.boolean(*a)?._eq(self.boolean(*b)?)),
                Sort::Int => Lowered::Bool(self.integer(*a)?._eq(self.integer(*b)?)),
            },
            TermNode::Add(ts) => {
                let operands = ts
                    .iter()
                    .map(|&t| self.integer(t))
                    .collect::<Result<Vec<_>, _>>()?;
                Lowered::Int(Int::add(z3, &operands))
            }
            TermNode::Mul(k, t) => {
                let factor = Int::from_i64(z3, *k);
                Lowered::Int(Int::mul(z3, &[&factor, self.integer(*t)?]))
            }
        })
    }

    fn booleans(&self, terms: &[TermId]) -> Result<Vec<&Bool<'z>>, SolverError> {
        terms.iter().map(|&t| self.boolean(t)).collect()
    }

    fn boolean(&self, term: TermId) -> Result<&Bool<'z>, SolverError> {
        match self.terms.get(term.index()).and_then(Option::as_ref) {
            Some(Lowered::Bool(b)) => Ok(b),
            _ => Err(SolverError::SortMismatch {
                term: term.0,
                expected: "bool",
            }),
        }
    }

    fn integer(&self, term: TermId) -> Result<&Int<'z>, SolverError> {
        match self.terms.get(term.index()).and_then(Option::as_ref) {
            Some(Lowered::Int(i)) => Ok(i),
            _ => Err(SolverError::SortMismatch {
                term: term.0,
                expected: "int",
            }),
        }
    }
}
