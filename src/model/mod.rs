//! The data-flow diagram and its unrolled flow graph.
pub mod conversion;
pub mod definition;
pub mod graph;

pub use conversion::{
    AssignmentDefinition, DiagramDefinition, EdgeDefinition, IntoDiagram, NodeDefinition,
    OutputPinDefinition, TermDefinition,
};
pub use definition::{
    Assignment, Diagram, Edge, EdgeId, Label, Node, NodeId, Pin, PinDirection, PinId, Term,
    VertexType,
};
pub use graph::{Flow, FlowGraph, FlowId, Vertex, VertexId};
