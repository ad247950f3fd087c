use super::definition::{Assignment, Diagram, Label, NodeId, PinId, Term, VertexType};
use crate::error::ConversionError;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// A trait for custom data models that can be converted into a flowmend `Diagram`.
///
/// This is the extension point for reading any diagram format. Implement it on your own
/// parsed structs to hand them to the repair engine.
///
/// # Example
///
/// ```rust,no_run
/// use flowmend::prelude::*;
/// use flowmend::error::ConversionError;
/// use std::result::Result;
///
/// struct MyComponent { name: String, external: bool }
/// struct MyArchitecture { components: Vec<MyComponent> }
///
/// impl IntoDiagram for MyArchitecture {
///     fn into_diagram(self) -> Result<Diagram, ConversionError> {
///         let mut diagram = Diagram::new();
///         for component in self.components {
///             let vertex_type = if component.external {
///                 VertexType::External
///             } else {
///                 VertexType::Process
///             };
///             diagram.add_node(component.name, vertex_type);
///         }
///         // Pins, assignments and edges are converted the same way.
///         Ok(diagram)
///     }
/// }
/// ```
pub trait IntoDiagram {
    /// Consumes the object and converts it into a diagram.
    fn into_diagram(self) -> Result<Diagram, ConversionError>;
}

impl IntoDiagram for Diagram {
    fn into_diagram(self) -> Result<Diagram, ConversionError> {
        Ok(self)
    }
}

/// Name-based description of a diagram, as found in JSON model files.
///
/// Labels use the `Type.value` form; pins are referenced by node and pin name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagramDefinition {
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub vertex_type: VertexType,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<OutputPinDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPinDefinition {
    pub name: String,
    #[serde(default)]
    pub assignments: Vec<AssignmentDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AssignmentDefinition {
    Set {
        labels: Vec<String>,
    },
    Unset {
        labels: Vec<String>,
    },
    Forward {
        inputs: Vec<String>,
    },
    Evaluate {
        inputs: Vec<String>,
        term: TermDefinition,
        labels: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermDefinition {
    True,
    Not(Box<TermDefinition>),
    And(Vec<TermDefinition>),
    Or(Vec<TermDefinition>),
    Label(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub name: String,
    pub source: String,
    pub source_pin: String,
    pub target: String,
    pub target_pin: String,
}

impl DiagramDefinition {
    pub fn from_json(json: &str) -> Result<Self, ConversionError> {
        serde_json::from_str(json).map_err(|e| ConversionError::JsonParseError(e.to_string()))
    }
}

fn parse_labels(labels: &[String]) -> Result<Vec<Label>, ConversionError> {
    Ok(labels
        .iter()
        .map(|l| Label::parse(l))
        .collect::<Result<Vec<_>, _>>()?)
}

fn convert_term(term: TermDefinition) -> Result<Term, ConversionError> {
    Ok(match term {
        TermDefinition::True => Term::True,
        TermDefinition::Not(inner) => Term::negate(convert_term(*inner)?),
        TermDefinition::And(terms) => Term::And(
            terms
                .into_iter()
                .map(convert_term)
                .collect::<Result<_, _>>()?,
        ),
        TermDefinition::Or(terms) => Term::Or(
            terms
                .into_iter()
                .map(convert_term)
                .collect::<Result<_, _>>()?,
        ),
        TermDefinition::Label(label) => Term::LabelRef(Label::parse(&label)?),
    })
}

struct PinIndex {
    nodes: AHashMap<String, NodeId>,
    pins: AHashMap<(String, String), PinId>,
}

impl PinIndex {
    fn resolve(&self, node: &str, pin: &str) -> Result<PinId, ConversionError> {
        self.pins
            .get(&(node.to_string(), pin.to_string()))
            .copied()
            .ok_or_else(|| ConversionError::PinNotFound {
                node: node.to_string(),
                pin: pin.to_string(),
            })
    }

    fn node(&self, name: &str, referenced_by: &str) -> Result<NodeId, ConversionError> {
        self.nodes
            .get(name)
            .copied()
            .ok_or_else(|| ConversionError::NodeNotFound {
                missing: name.to_string(),
                referenced_by: referenced_by.to_string(),
            })
    }
}

impl IntoDiagram for DiagramDefinition {
    fn into_diagram(self) -> Result<Diagram, ConversionError> {
        let mut diagram = Diagram::new();
        let mut index = PinIndex {
            nodes: AHashMap::new(),
            pins: AHashMap::new(),
        };

        // Nodes and pins first, so assignments and edges can refer to any of them.
        for def in &self.nodes {
            if index.nodes.contains_key(&def.name) {
                return Err(ConversionError::DuplicateNode(def.name.clone()));
            }
            let node = diagram.add_node(def.name.clone(), def.vertex_type);
            index.nodes.insert(def.name.clone(), node);
            for label in parse_labels(&def.labels)? {
                diagram.add_property(node, label)?;
            }
            for input in &def.inputs {
                let pin = diagram.add_input_pin(node, input.clone())?;
                index.pins.insert((def.name.clone(), input.clone()), pin);
            }
            for output in &def.outputs {
                let pin = diagram.add_output_pin(node, output.name.clone())?;
                index.pins.insert((def.name.clone(), output.name.clone()), pin);
            }
        }

        for def in self.nodes {
            for output in def.outputs {
                let pin = index.resolve(&def.name, &output.name)?;
                for assignment in output.assignments {
                    let inputs = |names: &[String]| -> Result<Vec<PinId>, ConversionError> {
                        names.iter().map(|n| index.resolve(&def.name, n)).collect()
                    };
                    let converted = match assignment {
                        AssignmentDefinition::Set { labels } => {
                            Assignment::set(parse_labels(&labels)?)
                        }
                        AssignmentDefinition::Unset { labels } => {
                            Assignment::unset(parse_labels(&labels)?)
                        }
                        AssignmentDefinition::Forward { inputs: names } => {
                            Assignment::forward(inputs(&names)?)
                        }
                        AssignmentDefinition::Evaluate {
                            inputs: names,
                            term,
                            labels,
                        } => Assignment::evaluate(
                            inputs(&names)?,
                            convert_term(term)?,
                            parse_labels(&labels)?,
                        ),
                    };
                    diagram.push_assignment(pin, converted)?;
                }
            }
        }

        for edge in self.edges {
            let referenced_by = format!("edge '{}'", edge.name);
            index.node(&edge.source, &referenced_by)?;
            index.node(&edge.target, &referenced_by)?;
            let source = index.resolve(&edge.source, &edge.source_pin)?;
            let target = index.resolve(&edge.target, &edge.target_pin)?;
            diagram.add_edge(edge.name, source, target)?;
        }

        Ok(diagram)
    }
}
