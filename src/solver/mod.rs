//! Boolean/integer terms and the optimizer contract the repair driver encodes into.
//!
//! A [`Context`] owns every term of one repair request. Encoders build formulas in it,
//! an [`Optimizer`] decides them, and the resulting [`Model`] evaluates any term back.
//! The default optimizer lowers the terms into Z3.
mod backend;
mod display;
mod model;
mod optimizer;
mod term;

pub use backend::Z3Optimizer;
pub use display::DisplayTerm;
pub use model::{Model, Value};
pub use optimizer::{Optimizer, SatResult};
pub use term::{Context, Sort, TermId, TermNode, VarId, VarKind, Variable};
