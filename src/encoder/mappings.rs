use crate::constraint::RelevantLabels;
use crate::error::RepairError;
use crate::model::{Diagram, VertexType};
use ahash::AHashMap;
use std::hash::Hash;

/// Dense integer codes for the names and types selectors compare against.
#[derive(Debug, Clone, Default)]
pub struct Mappings {
    node_names: AHashMap<String, i64>,
    flow_names: AHashMap<String, i64>,
    vertex_types: AHashMap<VertexType, i64>,
}

fn index_map<T: Hash + Eq>(items: impl IntoIterator<Item = T>) -> AHashMap<T, i64> {
    let mut map = AHashMap::new();
    for item in items {
        let next = map.len() as i64;
        map.entry(item).or_insert(next);
    }
    map
}

impl Mappings {
    pub fn build(diagram: &Diagram, relevant: &RelevantLabels) -> Self {
        Self {
            node_names: index_map(diagram.nodes().iter().map(|n| n.name.clone())),
            flow_names: index_map(diagram.edges().iter().map(|e| e.name.clone())),
            vertex_types: index_map(
                relevant
                    .vertex_types
                    .iter()
                    .copied()
                    .chain(diagram.nodes().iter().map(|n| n.vertex_type)),
            ),
        }
    }

    pub fn node_name(&self, name: &str) -> Result<i64, RepairError> {
        self.node_names
            .get(name)
            .copied()
            .ok_or_else(|| RepairError::MissingMapping {
                category: "node name",
                name: name.to_string(),
            })
    }

    pub fn flow_name(&self, name: &str) -> Result<i64, RepairError> {
        self.flow_names
            .get(name)
            .copied()
            .ok_or_else(|| RepairError::MissingMapping {
                category: "flow name",
                name: name.to_string(),
            })
    }

    pub fn vertex_type(&self, vertex_type: VertexType) -> Result<i64, RepairError> {
        self.vertex_types
            .get(&vertex_type)
            .copied()
            .ok_or_else(|| RepairError::MissingMapping {
                category: "vertex type",
                name: vertex_type.to_string(),
            })
    }
}
