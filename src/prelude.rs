//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the flowmend
//! crate. Import it to get the diagram model, the constraint builder and the repair
//! driver without importing each type individually.
//!
//! # Example
//!
//! ```rust,no_run
//! use flowmend::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let json = std::fs::read_to_string("path/to/diagram.json")?;
//! let diagram = Diagram::from_json(&json)?;
//! let graph = FlowGraph::unroll(&diagram)?;
//! let constraints: Vec<Constraint> = Vec::new();
//!
//! let result = Repairer::builder(&diagram, &graph, &constraints).build().repair()?;
//! println!("Repair found: {} (cost {})", result.satisfiable, result.cost);
//! # Ok(())
//! # }
//! ```

// Diagram model
pub use crate::model::{
    Assignment, Diagram, DiagramDefinition, FlowGraph, FlowId, IntoDiagram, Label, NodeId, PinId,
    Term, VertexId, VertexType,
};

// Constraints
pub use crate::constraint::{Constraint, Selector, SelectorRole};

// Repair driver
pub use crate::repair::{
    RepairAction, RepairConfig, RepairRequest, RepairResult, Repairer, repair, repair_batch,
};

// Extension points
pub use crate::solver::{Optimizer, Z3Optimizer};
pub use crate::translator::SelectorHandler;

// Error types
pub use crate::error::{ConversionError, ModelError, RepairError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
