use crate::model::{EdgeId, FlowId, NodeId, PinId, VertexId};
use thiserror::Error;

/// Errors raised while building or editing a diagram or its flow graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Node {0} does not exist in the diagram")]
    UnknownNode(NodeId),

    #[error("Pin {0} does not exist in the diagram")]
    UnknownPin(PinId),

    #[error("Edge {0} does not exist in the diagram")]
    UnknownEdge(EdgeId),

    #[error("Vertex {0} does not exist in the flow graph")]
    UnknownVertex(VertexId),

    #[error("Flow {0} does not exist in the flow graph")]
    UnknownFlow(FlowId),

    #[error("Edge '{edge}' does not connect the nodes of vertices {src_vertex} and {dst_vertex}")]
    FlowEndpoint {
        edge: String,
        src_vertex: VertexId,
        dst_vertex: VertexId,
    },

    #[error("Pin '{pin}' is an {found} pin, but an {expected} pin was required")]
    PinDirection {
        pin: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Assignment {index} on pin '{pin}' does not exist")]
    UnknownAssignment { pin: String, index: usize },

    #[error("Assignment on pin '{pin}' reads pin '{input}', which is not an input of node '{node}'")]
    ForeignInput {
        pin: String,
        input: String,
        node: String,
    },

    #[error("The diagram contains a cycle through node '{0}' and cannot be unrolled")]
    CyclicDiagram(String),

    #[error("Invalid label '{0}': expected the form 'Type.value'")]
    InvalidLabel(String),
}

/// Errors raised by the term context or an optimizer backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Only boolean terms can be asserted, but term #{0} is an integer")]
    NonBooleanAssertion(u32),

    #[error("Only integer terms can be minimized, but term #{0} is boolean")]
    NonIntegerObjective(u32),

    #[error("Integer variable '{name}' has an empty domain [{lo}, {hi}]")]
    EmptyDomain { name: String, lo: i64, hi: i64 },

    #[error("The optimizer could not decide the problem (timeout or incomplete theory)")]
    Undecided,

    #[error("The optimizer's model assigns no value to variable '{0}'")]
    MissingValue(String),

    #[error("The optimal objective value {0} is negative")]
    NegativeObjective(i64),

    #[error("Sort mismatch while evaluating term #{term}: expected {expected}")]
    SortMismatch { term: u32, expected: &'static str },

    #[error("No model is available; the last check was not satisfiable or never ran")]
    NoModel,
}

/// Errors that make a repair request fail before or during encoding.
///
/// An unsatisfiable request is not an error; it is reported through
/// [`RepairResult::satisfiable`](crate::repair::RepairResult).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepairError {
    #[error("Selector kind '{kind}' cannot be evaluated in the {role} role")]
    UnsupportedSelectorRole { kind: String, role: String },

    #[error("No selector handler is registered for selector kind '{0}'")]
    UnregisteredSelectorKind(String),

    #[error("Flow {flow} was re-entered before its encoding completed; the flow graph is not acyclic")]
    StructuralCycle { flow: FlowId },

    #[error("The {category} '{name}' referenced by a selector has no coded value in the diagram")]
    MissingMapping { category: &'static str, name: String },

    #[error("Evaluate term on pin {pin} is nested deeper than {limit} levels")]
    TermDepthExceeded { pin: PinId, limit: usize },

    #[error("Failed to write debug output: {0}")]
    DebugOutput(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Errors that can occur when converting a custom user format into a flowmend `Diagram`.
#[derive(Error, Debug, Clone)]
pub enum ConversionError {
    #[error("Failed to parse diagram JSON: {0}")]
    JsonParseError(String),

    #[error("Node '{0}' is defined more than once")]
    DuplicateNode(String),

    #[error("Node '{missing}' not found, which is referenced by {referenced_by}")]
    NodeNotFound {
        missing: String,
        referenced_by: String,
    },

    #[error("Pin '{pin}' not found on node '{node}'")]
    PinNotFound { node: String, pin: String },

    #[error("Invalid custom data: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}
