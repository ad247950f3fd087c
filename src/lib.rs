//! # Flowmend - Confidentiality Repair for Data-Flow Diagrams
//!
//! **Flowmend** finds the cheapest set of label edits that removes every confidentiality
//! violation from a data-flow diagram. Constraints such as "data labeled PII never flows
//! to an external vertex" are compiled into boolean formulas over the diagram's unrolled
//! flow graph, and an optimizer picks the edits with the lowest total weight.
//!
//! ## Core Workflow
//!
//! 1.  **Describe the Diagram**: Build a [`model::Diagram`] directly, load one from a
//!     [`model::DiagramDefinition`], or implement [`model::IntoDiagram`] for your own format.
//! 2.  **Unroll**: [`model::FlowGraph::unroll`] turns the diagram into an acyclic graph of
//!     flows with resolved label dependencies.
//! 3.  **Constrain**: Write constraints with [`constraint::Constraint::builder`].
//! 4.  **Repair**: [`repair::Repairer::builder`] encodes label propagation, constraints and
//!     edit costs, solves, and returns the edits together with the repaired diagram.
//!
//! ## Quick Start
//!
//! ```rust
//! use flowmend::prelude::*;
//!
//! fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let definition = DiagramDefinition::from_json(r#"{
//!         "nodes": [
//!             { "name": "clinic", "type": "Process",
//!               "outputs": [{ "name": "out", "assignments": [
//!                   { "kind": "set", "labels": ["Sensitivity.PII"] } ] }] },
//!             { "name": "insurer", "type": "External", "inputs": ["in"] }
//!         ],
//!         "edges": [
//!             { "name": "claim", "source": "clinic", "source_pin": "out",
//!               "target": "insurer", "target_pin": "in" }
//!         ]
//!     }"#)?;
//!     let diagram = definition.into_diagram()?;
//!     let graph = FlowGraph::unroll(&diagram)?;
//!
//!     let pii = Label::parse("Sensitivity.PII")?;
//!     let constraints = vec![
//!         Constraint::builder("pii-stays-inside")
//!             .of_data()
//!             .with_label(pii.clone())
//!             .never_flows()
//!             .to_vertex()
//!             .with_type(VertexType::External)
//!             .create(),
//!     ];
//!
//!     let result = Repairer::builder(&diagram, &graph, &constraints)
//!         .with_label_costs([(pii, 1)])
//!         .build()
//!         .repair()?;
//!
//!     assert!(result.satisfiable);
//!     for action in &result.actions {
//!         println!("{}", action.describe(&diagram)?);
//!     }
//!     println!("Total cost: {}", result.cost);
//!     Ok(())
//! }
//! ```

pub mod constraint;
pub mod cost;
pub mod encoder;
pub mod error;
pub mod model;
pub mod prelude;
pub mod repair;
pub mod solver;
pub mod translator;
