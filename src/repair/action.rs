use crate::error::ModelError;
use crate::model::{Assignment, Diagram, Label, NodeId, PinId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete, reversible edit chosen by the optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepairAction {
    AddNodeLabel { node: NodeId, label: Label },
    RemoveNodeLabel { node: NodeId, label: Label },
    /// Appends `Set {label}` to the pin's assignment list.
    SetAtPin { pin: PinId, label: Label },
    /// Appends `Unset {label}` to the pin's assignment list.
    UnsetAtPin { pin: PinId, label: Label },
}

impl RepairAction {
    pub fn label(&self) -> &Label {
        match self {
            RepairAction::AddNodeLabel { label, .. }
            | RepairAction::RemoveNodeLabel { label, .. }
            | RepairAction::SetAtPin { label, .. }
            | RepairAction::UnsetAtPin { label, .. } => label,
        }
    }

    fn pin_assignment(&self) -> Option<(PinId, Assignment)> {
        match self {
            RepairAction::SetAtPin { pin, label } => {
                Some((*pin, Assignment::set([label.clone()])))
            }
            RepairAction::UnsetAtPin { pin, label } => {
                Some((*pin, Assignment::unset([label.clone()])))
            }
            _ => None,
        }
    }

    pub fn apply(&self, diagram: &mut Diagram) -> Result<(), ModelError> {
        match self {
            RepairAction::AddNodeLabel { node, label } => {
                diagram.add_property(*node, label.clone())?;
            }
            RepairAction::RemoveNodeLabel { node, label } => {
                diagram.remove_property(*node, label)?;
            }
            RepairAction::SetAtPin { .. } | RepairAction::UnsetAtPin { .. } => {
                if let Some((pin, assignment)) = self.pin_assignment() {
                    diagram.push_assignment(pin, assignment)?;
                }
            }
        }
        Ok(())
    }

    /// Reverts [`RepairAction::apply`]. Pin edits remove the last matching assignment.
    pub fn undo(&self, diagram: &mut Diagram) -> Result<(), ModelError> {
        match self {
            RepairAction::AddNodeLabel { node, label } => {
                diagram.remove_property(*node, label)?;
            }
            RepairAction::RemoveNodeLabel { node, label } => {
                diagram.add_property(*node, label.clone())?;
            }
            RepairAction::SetAtPin { .. } | RepairAction::UnsetAtPin { .. } => {
                if let Some((pin, assignment)) = self.pin_assignment() {
                    let position = diagram
                        .pin(pin)?
                        .assignments
                        .iter()
                        .rposition(|a| *a == assignment);
                    match position {
                        Some(index) => {
                            diagram.remove_assignment(pin, index)?;
                        }
                        None => log::debug!("Nothing to undo for '{}' on pin {}", self, pin),
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies the action to a copy of `diagram`.
    pub fn applied(&self, diagram: &Diagram) -> Result<Diagram, ModelError> {
        let mut next = diagram.clone();
        self.apply(&mut next)?;
        Ok(next)
    }

    /// Human-readable form using the diagram's node and pin names.
    pub fn describe(&self, diagram: &Diagram) -> Result<String, ModelError> {
        Ok(match self {
            RepairAction::AddNodeLabel { node, label } => {
                format!("add label {} to node '{}'", label, diagram.node(*node)?.name)
            }
            RepairAction::RemoveNodeLabel { node, label } => {
                format!("remove label {} from node '{}'", label, diagram.node(*node)?.name)
            }
            RepairAction::SetAtPin { pin, label } | RepairAction::UnsetAtPin { pin, label } => {
                let pin = diagram.pin(*pin)?;
                let verb = if matches!(self, RepairAction::SetAtPin { .. }) {
                    "set"
                } else {
                    "unset"
                };
                format!(
                    "{} data label {} at pin '{}.{}'",
                    verb,
                    label,
                    diagram.node(pin.node)?.name,
                    pin.name
                )
            }
        })
    }
}

impl fmt::Display for RepairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairAction::AddNodeLabel { node, label } => write!(f, "AddNodeLabel({}, {})", node, label),
            RepairAction::RemoveNodeLabel { node, label } => {
                write!(f, "RemoveNodeLabel({}, {})", node, label)
            }
            RepairAction::SetAtPin { pin, label } => write!(f, "SetAtPin({}, {})", pin, label),
            RepairAction::UnsetAtPin { pin, label } => write!(f, "UnsetAtPin({}, {})", pin, label),
        }
    }
}
