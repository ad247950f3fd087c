use super::selector::{Constraint, Selector};
use crate::model::{Label, VertexType};
use itertools::Itertools;

/// Labels and vertex types a constraint set can be satisfied by editing.
///
/// An inverted characteristic selector ("without label") can be defused by adding the
/// label; a plain one by removing it. Lists keep first-seen order without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelevantLabels {
    pub node_add: Vec<Label>,
    pub node_remove: Vec<Label>,
    pub data_add: Vec<Label>,
    pub data_remove: Vec<Label>,
    pub vertex_types: Vec<VertexType>,
}

impl RelevantLabels {
    pub fn from_constraints(constraints: &[Constraint]) -> Self {
        let selectors = || constraints.iter().flat_map(|c| c.selectors().map(|(s, _)| s));
        let labels_where = |pick: fn(&Selector) -> bool, inverted: bool| -> Vec<Label> {
            selectors()
                .filter(|s| pick(s) && s.is_inverted() == inverted)
                .flat_map(|s| s.labels().iter().cloned())
                .unique()
                .collect()
        };

        Self {
            node_add: labels_where(Selector::is_vertex_characteristic, true),
            node_remove: labels_where(Selector::is_vertex_characteristic, false),
            data_add: labels_where(Selector::is_data_characteristic, true),
            data_remove: labels_where(Selector::is_data_characteristic, false),
            vertex_types: selectors()
                .filter_map(|s| match s {
                    Selector::VertexType { vertex_type, .. } => Some(*vertex_type),
                    _ => None,
                })
                .unique()
                .collect(),
        }
    }

    /// Node labels in either position, add-position first.
    pub fn node_labels(&self) -> Vec<Label> {
        self.node_add
            .iter()
            .chain(&self.node_remove)
            .unique()
            .cloned()
            .collect()
    }

    /// Data labels in either position, add-position first.
    pub fn data_labels(&self) -> Vec<Label> {
        self.data_add
            .iter()
            .chain(&self.data_remove)
            .unique()
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.node_add.is_empty()
            && self.node_remove.is_empty()
            && self.data_add.is_empty()
            && self.data_remove.is_empty()
    }
}
