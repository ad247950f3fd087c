use super::model::Model;
use super::term::{Context, TermId};
use crate::error::SolverError;

/// Outcome of [`Optimizer::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
}

/// The narrow contract the repair driver needs from an optimization engine.
///
/// Terms and variables live in a [`Context`] owned by the caller; the optimizer only
/// records which of them are asserted and minimized, and produces a [`Model`].
pub trait Optimizer: Send {
    fn assert(&mut self, ctx: &Context, formula: TermId) -> Result<(), SolverError>;
    /// Adds an integer objective. Objectives are minimized lexicographically, in the
    /// order they were added.
    fn minimize(&mut self, ctx: &Context, objective: TermId) -> Result<(), SolverError>;
    /// Blocks until the assertions are decided; on `Sat` the model is optimal.
    fn check(&mut self, ctx: &Context) -> Result<SatResult, SolverError>;
    fn model(&self) -> Option<&Model>;
}
