use crate::constraint::RelevantLabels;
use crate::model::{Diagram, FlowGraph, Label, NodeId, PinId};
use crate::repair::RepairConfig;
use crate::solver::{Context, TermId};
use ahash::AHashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditPolarity {
    Set,
    Unset,
}

impl fmt::Display for EditPolarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditPolarity::Set => write!(f, "set"),
            EditPolarity::Unset => write!(f, "unset"),
        }
    }
}

/// A node label the optimizer may flip.
#[derive(Debug, Clone)]
pub struct NodeLabelVar {
    pub node: NodeId,
    pub label: Label,
    /// Constant holding the label's presence in the input diagram.
    pub reference: TermId,
    pub proposed: TermId,
}

/// A proposed `Set` or `Unset` of a data label at an output pin. Its reference is false.
#[derive(Debug, Clone)]
pub struct PinEditVar {
    pub pin: PinId,
    pub label: Label,
    pub polarity: EditPolarity,
    pub reference: TermId,
    pub proposed: TermId,
}

/// Reference/decision pairs for every editable (node, label) and (pin, label, polarity).
///
/// Node label terms exist for every node and relevant node label: a free variable
/// when the configuration allows the label to change at that node, otherwise the
/// constant reference value. Pin edits exist only where allowed.
#[derive(Debug, Clone, Default)]
pub struct DecisionFabric {
    node_vars: Vec<NodeLabelVar>,
    node_terms: AHashMap<(NodeId, Label), TermId>,
    pin_vars: Vec<PinEditVar>,
    pin_terms: AHashMap<(PinId, Label, EditPolarity), TermId>,
}

impl DecisionFabric {
    /// Declares all decision variables in `ctx`.
    ///
    /// Node variables come first, then pin variables with pins deeper in the flow graph
    /// declared earlier. Keeping earlier variables at their reference value first
    /// therefore places equally cheap edits upstream.
    pub fn build(
        ctx: &mut Context,
        diagram: &Diagram,
        graph: &FlowGraph,
        relevant: &RelevantLabels,
        config: &RepairConfig,
    ) -> Self {
        let mut fabric = Self::default();
        let widen = !config.only_relevant_labels;

        let node_labels = relevant.node_labels();
        for node in diagram.nodes() {
            for label in &node_labels {
                let has = node.has_label(label);
                let can_add = config.add_node_labels && (widen || relevant.node_add.contains(label));
                let can_remove =
                    config.remove_node_labels && (widen || relevant.node_remove.contains(label));
                let reference = ctx.bool_const(has);
                let term = if (!has && can_add) || (has && can_remove) {
                    let proposed = ctx.bool_var(format!("{}_label_{}", node.name, label), has);
                    fabric.node_vars.push(NodeLabelVar {
                        node: node.id,
                        label: label.clone(),
                        reference,
                        proposed,
                    });
                    proposed
                } else {
                    reference
                };
                fabric.node_terms.insert((node.id, label.clone()), term);
            }
        }

        let (mut set_labels, mut unset_labels) = if widen {
            (relevant.data_labels(), relevant.data_labels())
        } else {
            (relevant.data_add.clone(), relevant.data_remove.clone())
        };
        if !config.add_data_labels {
            set_labels.clear();
        }
        if !config.remove_data_labels {
            unset_labels.clear();
        }
        if set_labels.is_empty() && unset_labels.is_empty() {
            return fabric;
        }

        let flow_depths = graph.flow_depths();
        let mut pin_depth: AHashMap<PinId, usize> = AHashMap::new();
        for flow in graph.flows() {
            let depth = pin_depth.entry(flow.src_pin).or_insert(0);
            *depth = (*depth).max(flow_depths[flow.id.0]);
        }
        let mut pins: Vec<_> = diagram.output_pins().collect();
        pins.sort_by_key(|p| (std::cmp::Reverse(pin_depth.get(&p.id).copied().unwrap_or(0)), p.id));

        let false_ref = ctx.ff();
        for pin in pins {
            let owner = diagram
                .node(pin.node)
                .map(|n| n.name.as_str())
                .unwrap_or("?");
            let edits = set_labels
                .iter()
                .map(|l| (l, EditPolarity::Set))
                .chain(unset_labels.iter().map(|l| (l, EditPolarity::Unset)));
            for (label, polarity) in edits {
                let proposed =
                    ctx.bool_var(format!("{}.{}_{}_{}", owner, pin.name, polarity, label), false);
                fabric.pin_vars.push(PinEditVar {
                    pin: pin.id,
                    label: label.clone(),
                    polarity,
                    reference: false_ref,
                    proposed,
                });
                fabric.pin_terms.insert((pin.id, label.clone(), polarity), proposed);
            }
        }
        fabric
    }

    /// The node-label term, if the label is relevant.
    pub fn node_label(&self, node: NodeId, label: &Label) -> Option<TermId> {
        self.node_terms.get(&(node, label.clone())).copied()
    }

    pub fn pin_edit(&self, pin: PinId, label: &Label, polarity: EditPolarity) -> Option<TermId> {
        self.pin_terms.get(&(pin, label.clone(), polarity)).copied()
    }

    pub fn node_vars(&self) -> &[NodeLabelVar] {
        &self.node_vars
    }

    pub fn pin_vars(&self) -> &[PinEditVar] {
        &self.pin_vars
    }

    pub fn decision_count(&self) -> usize {
        self.node_vars.len() + self.pin_vars.len()
    }
}
