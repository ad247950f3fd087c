use crate::error::ModelError;
use crate::model::{Flow, FlowGraph, PinId};
use crate::solver::TermId;
use ahash::AHashMap;
use std::sync::Arc;

/// Content hash of a flow's endpoints, stable across unrolled copies of the same edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalFlowId(pub u64);

impl CanonicalFlowId {
    pub fn of(graph: &FlowGraph, flow: &Flow) -> Result<Self, ModelError> {
        let hasher = ahash::RandomState::with_seeds(
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
            0x082e_fa98_ec4e_6c89,
        );
        let endpoints = (
            graph.vertex(flow.src_vertex)?.node,
            flow.src_pin,
            graph.vertex(flow.dst_vertex)?.node,
            flow.dst_pin,
        );
        Ok(Self(hasher.hash_one(endpoints)))
    }
}

/// Index of a structural equivalence class of flows.
pub type ClassId = usize;

/// A dependency as seen by the structural key: its endpoints and its own class.
pub type DependencyRef = (CanonicalFlowId, ClassId);

/// Everything a flow's label formulas are derived from.
///
/// Dependency lists are aligned with the source pin's assignment list, sorted and
/// free of duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub pin: PinId,
    pub forwards: Vec<Vec<DependencyRef>>,
    pub evaluates: Vec<Vec<DependencyRef>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub lookups: usize,
    pub hits: usize,
    pub classes: usize,
}

/// Content-addressed store of per-flow label formulas.
#[derive(Debug, Default)]
pub struct StructuralCache {
    classes: AHashMap<FlowKey, ClassId>,
    formulas: Vec<Arc<[TermId]>>,
    stats: DedupStats,
}

impl StructuralCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&mut self, key: &FlowKey) -> Option<(ClassId, Arc<[TermId]>)> {
        self.stats.lookups += 1;
        let class = *self.classes.get(key)?;
        self.stats.hits += 1;
        Some((class, Arc::clone(&self.formulas[class])))
    }

    pub fn insert(&mut self, key: FlowKey, formulas: Arc<[TermId]>) -> ClassId {
        let class = self.formulas.len();
        self.formulas.push(formulas);
        self.classes.insert(key, class);
        self.stats.classes += 1;
        class
    }

    pub fn stats(&self) -> DedupStats {
        self.stats
    }
}
