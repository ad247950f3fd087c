use super::term::{Context, TermId, TermNode, VarId};
use crate::error::SolverError;
use ahash::AHashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
        }
    }
}

/// A total assignment of the context's variables, as found by an optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    values: Vec<Value>,
}

impl Model {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn value(&self, var: VarId) -> Option<Value> {
        self.values.get(var.index()).copied()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Evaluates any term of `ctx` under this model.
    pub fn eval(&self, ctx: &Context, term: TermId) -> Result<Value, SolverError> {
        // Children are interned before their parents, so ascending ids are bottom-up.
        let mut order = ctx.reachable(&[term]);
        order.sort_unstable();
        let mut values = AHashMap::with_capacity(order.len());
        for t in order {
            let value = self.step(ctx, t, &values)?;
            values.insert(t, value);
        }
        values.get(&term).copied().ok_or(SolverError::NoModel)
    }

    pub fn eval_bool(&self, ctx: &Context, term: TermId) -> Result<bool, SolverError> {
        match self.eval(ctx, term)? {
            Value::Bool(b) => Ok(b),
            Value::Int(_) => Err(SolverError::SortMismatch {
                term: term.0,
                expected: "bool",
            }),
        }
    }

    pub fn eval_int(&self, ctx: &Context, term: TermId) -> Result<i64, SolverError> {
        match self.eval(ctx, term)? {
            Value::Int(v) => Ok(v),
            Value::Bool(_) => Err(SolverError::SortMismatch {
                term: term.0,
                expected: "int",
            }),
        }
    }

    fn step(
        &self,
        ctx: &Context,
        term: TermId,
        done: &AHashMap<TermId, Value>,
    ) -> Result<Value, SolverError> {
        let value = |t: TermId| done.get(&t).copied().ok_or(SolverError::NoModel);
        let boolean = |t: TermId| match value(t)? {
            Value::Bool(b) => Ok(b),
            Value::Int(_) => Err(SolverError::SortMismatch {
                term: t.0,
                expected: "bool",
            }),
        };
        let integer = |t: TermId| match value(t)? {
            Value::Int(v) => Ok(v),
            Value::Bool(_) => Err(SolverError::SortMismatch {
                term: t.0,
                expected: "int",
            }),
        };
        Ok(match ctx.node(term) {
            TermNode::Bool(b) => Value::Bool(*b),
            TermNode::Int(v) => Value::Int(*v),
            TermNode::Var(var) => self.value(*var).ok_or(SolverError::NoModel)?,
            TermNode::Not(t) => Value::Bool(!boolean(*t)?),
            TermNode::And(ts) => {
                let mut all = true;
                for &t in ts {
                    all &= boolean(t)?;
                }
                Value::Bool(all)
            }
            TermNode::Or(ts) => {
                let mut any = false;
                for &t in ts {
                    any |= boolean(t)?;
                }
                Value::Bool(any)
            }
            TermNode::Xor(a, b) => Value::Bool(boolean(*a)? != boolean(*b)?),
            TermNode::Ite(c, t, e) => value(if boolean(*c)? { *t } else { *e })?,
            TermNode::Eq(a, b) => Value::Bool(value(*a)? == value(*b)?),
            TermNode::Add(ts) => {
                let mut sum: i64 = 0;
                for &t in ts {
                    sum = sum.saturating_add(integer(t)?);
                }
                Value::Int(sum)
            }
            TermNode::Mul(k, t) => Value::Int(integer(*t)?.saturating_mul(*k)),
        })
    }
}
