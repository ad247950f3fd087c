//! Translation of constraint selectors into boolean formulas.
use crate::constraint::{Constraint, Selector, SelectorKind, SelectorRole};
use crate::encoder::{DecisionFabric, FlowLabels, Mappings};
use crate::error::RepairError;
use crate::model::{Diagram, FlowGraph, VertexId};
use crate::solver::{Context, TermId};
use ahash::AHashMap;

mod handlers;

pub use handlers::{
    DataCharacteristicListHandler, DataCharacteristicsHandler, VariableNameHandler,
    VertexCharacteristicsHandler, VertexCharacteristicsListHandler, VertexNameHandler,
    VertexTypeHandler,
};

/// Everything a selector handler may read while encoding.
pub struct TranslationEnv<'a> {
    pub diagram: &'a Diagram,
    pub graph: &'a FlowGraph,
    pub mappings: &'a Mappings,
    pub fabric: &'a DecisionFabric,
    pub flow_labels: &'a FlowLabels,
}

/// Defines the contract for encoding one kind of selector at a vertex.
pub trait SelectorHandler: Send + Sync {
    fn kind(&self) -> SelectorKind;
    fn encode(
        &self,
        selector: &Selector,
        vertex: VertexId,
        role: SelectorRole,
        env: &TranslationEnv<'_>,
        ctx: &mut Context,
    ) -> Result<TermId, RepairError>;
}

/// Registry of selector handlers keyed by selector kind.
///
/// Lookup tries the selector's own kind, then its fallback kind. The role table of
/// [`SelectorKind::supports`] is checked before any handler runs.
pub struct SelectorTranslator {
    registry: AHashMap<SelectorKind, Box<dyn SelectorHandler>>,
}

impl Default for SelectorTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectorTranslator {
    /// A translator with the built-in handlers for every kind except `Conditional`.
    pub fn new() -> Self {
        let mut registry: AHashMap<SelectorKind, Box<dyn SelectorHandler>> = AHashMap::new();
        handlers::register_default_handlers(&mut registry);
        Self { registry }
    }

    pub fn empty() -> Self {
        Self {
            registry: AHashMap::new(),
        }
    }

    /// Registers a handler under its own kind, returning the handler it replaces.
    pub fn register(
        &mut self,
        handler: Box<dyn SelectorHandler>,
    ) -> Option<Box<dyn SelectorHandler>> {
        self.registry.insert(handler.kind(), handler)
    }

    pub fn handler_for(&self, kind: SelectorKind) -> Option<&dyn SelectorHandler> {
        self.registry
            .get(&kind)
            .or_else(|| kind.fallback().and_then(|k| self.registry.get(&k)))
            .map(|h| h.as_ref())
    }

    pub fn to_bool(
        &self,
        selector: &Selector,
        vertex: VertexId,
        role: SelectorRole,
        env: &TranslationEnv<'_>,
        ctx: &mut Context,
    ) -> Result<TermId, RepairError> {
        let kind = selector.kind();
        if !kind.supports(role) {
            return Err(RepairError::UnsupportedSelectorRole {
                kind: kind.to_string(),
                role: role.to_string(),
            });
        }
        let handler = self
            .handler_for(kind)
            .ok_or_else(|| RepairError::UnregisteredSelectorKind(kind.to_string()))?;
        handler.encode(selector, vertex, role, env, ctx)
    }

    /// The formula under which `constraint` is violated at `vertex`: every selector holds.
    pub fn violation(
        &self,
        constraint: &Constraint,
        vertex: VertexId,
        env: &TranslationEnv<'_>,
        ctx: &mut Context,
    ) -> Result<TermId, RepairError> {
        let mut parts = Vec::new();
        for (selector, role) in constraint.selectors() {
            parts.push(self.to_bool(selector, vertex, role, env, ctx)?);
        }
        Ok(ctx.and(parts))
    }
}
