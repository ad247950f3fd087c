//! Symbolic encoding of a flow graph: decision variables, name codes and label propagation.
pub mod dedup;
pub mod fabric;
pub mod mappings;
pub mod propagation;

pub use dedup::{CanonicalFlowId, DedupStats, FlowKey, StructuralCache};
pub use fabric::{DecisionFabric, EditPolarity, NodeLabelVar, PinEditVar};
pub use mappings::Mappings;
pub use propagation::{
    FlowLabels, LabelSpace, MAX_TERM_DEPTH, PropagationEncoder, PropagationStats,
};
