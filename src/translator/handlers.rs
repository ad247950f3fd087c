use super::{SelectorHandler, TranslationEnv};
use crate::constraint::{Selector, SelectorKind, SelectorRole};
use crate::error::RepairError;
use crate::model::VertexId;
use crate::solver::{Context, TermId};
use ahash::AHashMap;

/// Defines the built-in handler structs and their registration.
macro_rules! define_selector_handlers {
    ( $( ($handler:ident, $kind:path, $encode:ident) ),* $(,)? ) => {
        $(
            pub struct $handler;
            impl SelectorHandler for $handler {
                fn kind(&self) -> SelectorKind { $kind }
                fn encode(
                    &self,
                    selector: &Selector,
                    vertex: VertexId,
                    role: SelectorRole,
                    env: &TranslationEnv<'_>,
                    ctx: &mut Context,
                ) -> Result<TermId, RepairError> {
                    $encode(selector, vertex, role, env, ctx)
                }
            }
        )*

        pub(super) fn register_default_handlers(
            registry: &mut AHashMap<SelectorKind, Box<dyn SelectorHandler>>,
        ) {
            $( registry.insert($kind, Box::new($handler)); )*
        }
    };
}

define_selector_handlers! {
    (VertexNameHandler, SelectorKind::VertexName, encode_vertex_name),
    (VertexTypeHandler, SelectorKind::VertexType, encode_vertex_type),
    (VertexCharacteristicsHandler, SelectorKind::VertexCharacteristics, encode_vertex_characteristics),
    (VertexCharacteristicsListHandler, SelectorKind::VertexCharacteristicsList, encode_vertex_characteristics),
    (DataCharacteristicsHandler, SelectorKind::DataCharacteristics, encode_data_characteristics),
    (DataCharacteristicListHandler, SelectorKind::DataCharacteristicList, encode_data_characteristics),
    (VariableNameHandler, SelectorKind::VariableName, encode_variable_name),
}

fn unsupported(selector: &Selector, role: SelectorRole) -> RepairError {
    RepairError::UnsupportedSelectorRole {
        kind: selector.kind().to_string(),
        role: role.to_string(),
    }
}

fn negate_if(ctx: &mut Context, term: TermId, inverted: bool) -> TermId {
    if inverted { ctx.not(term) } else { term }
}

/// Applies a per-vertex match in the destination role, or ORs it over the vertex and
/// all its ancestors in the source role.
fn vertex_scoped(
    selector: &Selector,
    vertex: VertexId,
    role: SelectorRole,
    env: &TranslationEnv<'_>,
    ctx: &mut Context,
    matches_at: impl Fn(VertexId, &mut Context) -> Result<TermId, RepairError>,
) -> Result<TermId, RepairError> {
    match role {
        SelectorRole::VertexDestination => matches_at(vertex, ctx),
        SelectorRole::VertexSource => {
            let mut parts = vec![matches_at(vertex, ctx)?];
            for ancestor in env.graph.ancestors(vertex) {
                parts.push(matches_at(ancestor, ctx)?);
            }
            Ok(ctx.or(parts))
        }
        SelectorRole::DataSource => Err(unsupported(selector, role)),
    }
}

fn encode_vertex_name(
    selector: &Selector,
    vertex: VertexId,
    role: SelectorRole,
    env: &TranslationEnv<'_>,
    ctx: &mut Context,
) -> Result<TermId, RepairError> {
    let Selector::VertexName { name, inverted } = selector else {
        return Err(RepairError::UnregisteredSelectorKind(selector.kind().to_string()));
    };
    let target = env.mappings.node_name(name)?;
    vertex_scoped(selector, vertex, role, env, ctx, |v, ctx| {
        let node = env.diagram.node(env.graph.vertex(v)?.node)?;
        let own = env.mappings.node_name(&node.name)?;
        let (lhs, rhs) = (ctx.int(target), ctx.int(own));
        let equal = ctx.eq(lhs, rhs);
        Ok(negate_if(ctx, equal, *inverted))
    })
}

fn encode_vertex_type(
    selector: &Selector,
    vertex: VertexId,
    role: SelectorRole,
    env: &TranslationEnv<'_>,
    ctx: &mut Context,
) -> Result<TermId, RepairError> {
    let Selector::VertexType {
        vertex_type,
        inverted,
    } = selector
    else {
        return Err(RepairError::UnregisteredSelectorKind(selector.kind().to_string()));
    };
    let target = env.mappings.vertex_type(*vertex_type)?;
    vertex_scoped(selector, vertex, role, env, ctx, |v, ctx| {
        let node = env.diagram.node(env.graph.vertex(v)?.node)?;
        let own = env.mappings.vertex_type(node.vertex_type)?;
        let (lhs, rhs) = (ctx.int(target), ctx.int(own));
        let equal = ctx.eq(lhs, rhs);
        Ok(negate_if(ctx, equal, *inverted))
    })
}

// Handles the single-label and list forms alike.
fn encode_vertex_characteristics(
    selector: &Selector,
    vertex: VertexId,
    role: SelectorRole,
    env: &TranslationEnv<'_>,
    ctx: &mut Context,
) -> Result<TermId, RepairError> {
    if !selector.is_vertex_characteristic() {
        return Err(RepairError::UnregisteredSelectorKind(selector.kind().to_string()));
    }
    let labels = selector.labels();
    let inverted = selector.is_inverted();
    vertex_scoped(selector, vertex, role, env, ctx, |v, ctx| {
        let node = env.diagram.node(env.graph.vertex(v)?.node)?;
        let mut present = Vec::with_capacity(labels.len());
        for label in labels {
            let term = match env.fabric.node_label(node.id, label) {
                Some(term) => term,
                None => ctx.bool_const(node.has_label(label)),
            };
            present.push(term);
        }
        let any = ctx.or(present);
        Ok(negate_if(ctx, any, inverted))
    })
}

// Handles the single-label and list forms alike.
fn encode_data_characteristics(
    selector: &Selector,
    vertex: VertexId,
    role: SelectorRole,
    env: &TranslationEnv<'_>,
    ctx: &mut Context,
) -> Result<TermId, RepairError> {
    if role != SelectorRole::DataSource {
        return Err(unsupported(selector, role));
    }
    if !selector.is_data_characteristic() {
        return Err(RepairError::UnregisteredSelectorKind(selector.kind().to_string()));
    }
    let incoming = env.graph.incoming(vertex);
    if incoming.is_empty() {
        return Ok(ctx.ff());
    }
    let mut per_flow = Vec::with_capacity(incoming.len());
    for &flow in incoming {
        let mut present = Vec::new();
        for label in selector.labels() {
            let term = env.flow_labels.get(flow, label).ok_or_else(|| {
                RepairError::MissingMapping {
                    category: "data label",
                    name: label.to_string(),
                }
            })?;
            present.push(term);
        }
        per_flow.push(ctx.or(present));
    }
    let any = ctx.or(per_flow);
    Ok(negate_if(ctx, any, selector.is_inverted()))
}

fn encode_variable_name(
    selector: &Selector,
    vertex: VertexId,
    role: SelectorRole,
    env: &TranslationEnv<'_>,
    ctx: &mut Context,
) -> Result<TermId, RepairError> {
    let Selector::VariableName { name, inverted } = selector else {
        return Err(RepairError::UnregisteredSelectorKind(selector.kind().to_string()));
    };
    if role != SelectorRole::DataSource {
        return Err(unsupported(selector, role));
    }
    let incoming = env.graph.incoming(vertex);
    if incoming.is_empty() {
        return Ok(ctx.ff());
    }
    let target = env.mappings.flow_name(name)?;
    let mut matches = Vec::with_capacity(incoming.len());
    for &flow in incoming {
        let edge = env.diagram.edge(env.graph.flow(flow)?.edge)?;
        let own = env.mappings.flow_name(&edge.name)?;
        let (lhs, rhs) = (ctx.int(target), ctx.int(own));
        matches.push(ctx.eq(lhs, rhs));
    }
    let any = ctx.or(matches);
    Ok(negate_if(ctx, any, *inverted))
}
