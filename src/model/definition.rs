use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

macro_rules! define_ids {
    ( $( $(#[$meta:meta])* $name:ident => $prefix:expr ),* $(,)? ) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            pub struct $name(pub usize);

            impl $name {
                pub fn index(self) -> usize {
                    self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}{}", $prefix, self.0)
                }
            }
        )*
    };
}

define_ids! {
    /// Index of a node inside a [`Diagram`].
    NodeId => "n",
    /// Index of a pin inside a [`Diagram`].
    PinId => "p",
    /// Index of a named diagram edge inside a [`Diagram`].
    EdgeId => "e",
}

/// A security tag such as `Sensitivity.personal`.
///
/// Labels are compared by `(kind, value)`; the same type is used for node labels
/// (properties of a node) and data labels (carried by flows).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    pub kind: String,
    pub value: String,
}

impl Label {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Parses the textual `Type.value` form. The first dot separates the two parts.
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        match text.split_once('.') {
            Some((kind, value)) if !kind.is_empty() && !value.is_empty() => {
                Ok(Self::new(kind.trim(), value.trim()))
            }
            _ => Err(ModelError::InvalidLabel(text.to_string())),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VertexType {
    External,
    Process,
    Store,
}

impl fmt::Display for VertexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VertexType::External => write!(f, "External"),
            VertexType::Process => write!(f, "Process"),
            VertexType::Store => write!(f, "Store"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinDirection {
    Input,
    Output,
}

impl PinDirection {
    fn as_str(self) -> &'static str {
        match self {
            PinDirection::Input => "input",
            PinDirection::Output => "output",
        }
    }
}

/// A boolean condition of an [`Assignment::Evaluate`], read against the incoming flows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    True,
    Not(Box<Term>),
    And(Vec<Term>),
    Or(Vec<Term>),
    /// True iff any of the evaluated incoming flows carries the label.
    LabelRef(Label),
}

impl Term {
    pub fn label(label: Label) -> Self {
        Term::LabelRef(label)
    }

    pub fn negate(term: Term) -> Self {
        Term::Not(Box::new(term))
    }

    /// Nesting depth, a leaf counting as 1.
    pub fn depth(&self) -> usize {
        match self {
            Term::True | Term::LabelRef(_) => 1,
            Term::Not(inner) => 1 + inner.depth(),
            Term::And(terms) | Term::Or(terms) => {
                1 + terms.iter().map(Term::depth).max().unwrap_or(0)
            }
        }
    }

    /// Collects every label the term references.
    pub fn collect_labels<'a>(&'a self, out: &mut Vec<&'a Label>) {
        match self {
            Term::True => {}
            Term::LabelRef(label) => out.push(label),
            Term::Not(inner) => inner.collect_labels(out),
            Term::And(terms) | Term::Or(terms) => {
                for term in terms {
                    term.collect_labels(out);
                }
            }
        }
    }
}

/// One rule in the ordered assignment list of an output pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Assignment {
    Set {
        labels: Vec<Label>,
    },
    Unset {
        labels: Vec<Label>,
    },
    /// Passes through the labels of the flows entering the listed input pins.
    Forward {
        inputs: Vec<PinId>,
    },
    /// Sets `labels` iff `term` holds on the flows entering `inputs`, removes them otherwise.
    Evaluate {
        inputs: Vec<PinId>,
        term: Term,
        labels: Vec<Label>,
    },
}

impl Assignment {
    pub fn set(labels: impl IntoIterator<Item = Label>) -> Self {
        Assignment::Set {
            labels: labels.into_iter().collect(),
        }
    }

    pub fn unset(labels: impl IntoIterator<Item = Label>) -> Self {
        Assignment::Unset {
            labels: labels.into_iter().collect(),
        }
    }

    pub fn forward(inputs: impl IntoIterator<Item = PinId>) -> Self {
        Assignment::Forward {
            inputs: inputs.into_iter().collect(),
        }
    }

    pub fn evaluate(
        inputs: impl IntoIterator<Item = PinId>,
        term: Term,
        labels: impl IntoIterator<Item = Label>,
    ) -> Self {
        Assignment::Evaluate {
            inputs: inputs.into_iter().collect(),
            term,
            labels: labels.into_iter().collect(),
        }
    }

    /// Input pins the assignment reads from.
    pub fn inputs(&self) -> &[PinId] {
        match self {
            Assignment::Forward { inputs } | Assignment::Evaluate { inputs, .. } => inputs,
            Assignment::Set { .. } | Assignment::Unset { .. } => &[],
        }
    }

    /// Labels written by a `Set`, `Unset` or `Evaluate`; empty for `Forward`.
    pub fn output_labels(&self) -> &[Label] {
        match self {
            Assignment::Set { labels }
            | Assignment::Unset { labels }
            | Assignment::Evaluate { labels, .. } => labels,
            Assignment::Forward { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: PinId,
    pub name: String,
    pub node: NodeId,
    pub direction: PinDirection,
    /// Only output pins carry assignments.
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub vertex_type: VertexType,
    pub properties: BTreeSet<Label>,
    pub pins: Vec<PinId>,
}

impl Node {
    pub fn has_label(&self, label: &Label) -> bool {
        self.properties.contains(label)
    }
}

/// A named connection from an output pin to an input pin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub name: String,
    pub source: PinId,
    pub target: PinId,
}

/// The editable data-flow diagram: nodes with labels, pins with assignments, and named edges.
///
/// Repair actions are the only way the repair engine mutates a diagram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    nodes: Vec<Node>,
    pins: Vec<Pin>,
    edges: Vec<Edge>,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, vertex_type: VertexType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            name: name.into(),
            vertex_type,
            properties: BTreeSet::new(),
            pins: Vec::new(),
        });
        id
    }

    pub fn add_input_pin(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
    ) -> Result<PinId, ModelError> {
        self.add_pin(node, name.into(), PinDirection::Input)
    }

    pub fn add_output_pin(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
    ) -> Result<PinId, ModelError> {
        self.add_pin(node, name.into(), PinDirection::Output)
    }

    fn add_pin(
        &mut self,
        node: NodeId,
        name: String,
        direction: PinDirection,
    ) -> Result<PinId, ModelError> {
        let id = PinId(self.pins.len());
        self.node_mut(node)?.pins.push(id);
        self.pins.push(Pin {
            id,
            name,
            node,
            direction,
            assignments: Vec::new(),
        });
        Ok(id)
    }

    /// Connects an output pin to an input pin of another node.
    pub fn add_edge(
        &mut self,
        name: impl Into<String>,
        source: PinId,
        target: PinId,
    ) -> Result<EdgeId, ModelError> {
        self.expect_direction(source, PinDirection::Output)?;
        self.expect_direction(target, PinDirection::Input)?;
        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            id,
            name: name.into(),
            source,
            target,
        });
        Ok(id)
    }

    /// Appends an assignment to an output pin. Inputs must be input pins of the same node.
    pub fn push_assignment(
        &mut self,
        pin: PinId,
        assignment: Assignment,
    ) -> Result<(), ModelError> {
        self.expect_direction(pin, PinDirection::Output)?;
        let owner = self.pin(pin)?.node;
        for &input in assignment.inputs() {
            let input_pin = self.pin(input)?;
            if input_pin.node != owner || input_pin.direction != PinDirection::Input {
                return Err(ModelError::ForeignInput {
                    pin: self.pin(pin)?.name.clone(),
                    input: input_pin.name.clone(),
                    node: self.node(owner)?.name.clone(),
                });
            }
        }
        self.pin_mut(pin)?.assignments.push(assignment);
        Ok(())
    }

    pub fn remove_assignment(&mut self, pin: PinId, index: usize) -> Result<Assignment, ModelError> {
        let pin = self.pin_mut(pin)?;
        if index >= pin.assignments.len() {
            return Err(ModelError::UnknownAssignment {
                pin: pin.name.clone(),
                index,
            });
        }
        Ok(pin.assignments.remove(index))
    }

    /// Adds a label to a node, returning whether it was newly inserted.
    pub fn add_property(&mut self, node: NodeId, label: Label) -> Result<bool, ModelError> {
        Ok(self.node_mut(node)?.properties.insert(label))
    }

    /// Removes a label from a node, returning whether it was present.
    pub fn remove_property(&mut self, node: NodeId, label: &Label) -> Result<bool, ModelError> {
        Ok(self.node_mut(node)?.properties.remove(label))
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, ModelError> {
        self.nodes.get(id.0).ok_or(ModelError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ModelError> {
        self.nodes.get_mut(id.0).ok_or(ModelError::UnknownNode(id))
    }

    pub fn pin(&self, id: PinId) -> Result<&Pin, ModelError> {
        self.pins.get(id.0).ok_or(ModelError::UnknownPin(id))
    }

    fn pin_mut(&mut self, id: PinId) -> Result<&mut Pin, ModelError> {
        self.pins.get_mut(id.0).ok_or(ModelError::UnknownPin(id))
    }

    pub fn edge(&self, id: EdgeId) -> Result<&Edge, ModelError> {
        self.edges.get(id.0).ok_or(ModelError::UnknownEdge(id))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn output_pins(&self) -> impl Iterator<Item = &Pin> {
        self.pins
            .iter()
            .filter(|p| p.direction == PinDirection::Output)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn pin_by_name(&self, node: NodeId, name: &str) -> Option<&Pin> {
        let node = self.nodes.get(node.0)?;
        node.pins
            .iter()
            .filter_map(|p| self.pins.get(p.0))
            .find(|p| p.name == name)
    }

    /// Edges ending at any input pin of `node`.
    pub fn incoming_edges(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| {
            self.pins
                .get(e.target.0)
                .is_some_and(|target| target.node == node)
        })
    }

    /// Edges starting at any output pin of `node`.
    pub fn outgoing_edges(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| {
            self.pins
                .get(e.source.0)
                .is_some_and(|source| source.node == node)
        })
    }

    fn expect_direction(&self, pin: PinId, expected: PinDirection) -> Result<(), ModelError> {
        let found = self.pin(pin)?;
        if found.direction != expected {
            return Err(ModelError::PinDirection {
                pin: found.name.clone(),
                expected: expected.as_str(),
                found: found.direction.as_str(),
            });
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
