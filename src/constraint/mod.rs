//! The "never flows" constraint language.
mod builder;
pub mod relevance;
pub mod selector;

pub use builder::ConstraintBuilder;
pub use relevance::RelevantLabels;
pub use selector::{Constraint, Selector, SelectorKind, SelectorRole};
