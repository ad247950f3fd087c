use crate::model::{Label, VertexType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The position a selector occupies inside a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectorRole {
    VertexSource,
    VertexDestination,
    DataSource,
}

impl fmt::Display for SelectorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorRole::VertexSource => write!(f, "vertex source"),
            SelectorRole::VertexDestination => write!(f, "vertex destination"),
            SelectorRole::DataSource => write!(f, "data source"),
        }
    }
}

/// An atomic predicate of the constraint language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    VertexName {
        name: String,
        inverted: bool,
    },
    VertexType {
        vertex_type: VertexType,
        inverted: bool,
    },
    VertexCharacteristics {
        label: Label,
        inverted: bool,
    },
    VertexCharacteristicsList {
        labels: Vec<Label>,
        inverted: bool,
    },
    DataCharacteristics {
        label: Label,
        inverted: bool,
    },
    DataCharacteristicList {
        labels: Vec<Label>,
        inverted: bool,
    },
    /// Matches incoming flows by the name of their diagram edge.
    VariableName {
        name: String,
        inverted: bool,
    },
    /// A free-form condition over flow variables. No built-in handler encodes it.
    Conditional {
        expression: String,
    },
}

/// Discriminant of [`Selector`], used as the handler registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SelectorKind {
    VertexName,
    VertexType,
    VertexCharacteristics,
    VertexCharacteristicsList,
    DataCharacteristics,
    DataCharacteristicList,
    VariableName,
    Conditional,
}

impl SelectorKind {
    pub const ALL: [SelectorKind; 8] = [
        SelectorKind::VertexName,
        SelectorKind::VertexType,
        SelectorKind::VertexCharacteristics,
        SelectorKind::VertexCharacteristicsList,
        SelectorKind::DataCharacteristics,
        SelectorKind::DataCharacteristicList,
        SelectorKind::VariableName,
        SelectorKind::Conditional,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SelectorKind::VertexName => "VertexName",
            SelectorKind::VertexType => "VertexType",
            SelectorKind::VertexCharacteristics => "VertexCharacteristics",
            SelectorKind::VertexCharacteristicsList => "VertexCharacteristicsList",
            SelectorKind::DataCharacteristics => "DataCharacteristics",
            SelectorKind::DataCharacteristicList => "DataCharacteristicList",
            SelectorKind::VariableName => "VariableName",
            SelectorKind::Conditional => "Conditional",
        }
    }

    /// The role table: which roles a selector kind has defined semantics in.
    pub fn supports(self, role: SelectorRole) -> bool {
        match self {
            SelectorKind::VertexName
            | SelectorKind::VertexType
            | SelectorKind::VertexCharacteristics
            | SelectorKind::VertexCharacteristicsList => matches!(
                role,
                SelectorRole::VertexSource | SelectorRole::VertexDestination
            ),
            SelectorKind::DataCharacteristics
            | SelectorKind::DataCharacteristicList
            | SelectorKind::VariableName
            | SelectorKind::Conditional => role == SelectorRole::DataSource,
        }
    }

    /// The more general kind whose handler also accepts this kind.
    pub fn fallback(self) -> Option<SelectorKind> {
        match self {
            SelectorKind::VertexCharacteristicsList => Some(SelectorKind::VertexCharacteristics),
            SelectorKind::DataCharacteristicList => Some(SelectorKind::DataCharacteristics),
            _ => None,
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Selector {
    pub fn kind(&self) -> SelectorKind {
        match self {
            Selector::VertexName { .. } => SelectorKind::VertexName,
            Selector::VertexType { .. } => SelectorKind::VertexType,
            Selector::VertexCharacteristics { .. } => SelectorKind::VertexCharacteristics,
            Selector::VertexCharacteristicsList { .. } => SelectorKind::VertexCharacteristicsList,
            Selector::DataCharacteristics { .. } => SelectorKind::DataCharacteristics,
            Selector::DataCharacteristicList { .. } => SelectorKind::DataCharacteristicList,
            Selector::VariableName { .. } => SelectorKind::VariableName,
            Selector::Conditional { .. } => SelectorKind::Conditional,
        }
    }

    pub fn is_inverted(&self) -> bool {
        match self {
            Selector::VertexName { inverted, .. }
            | Selector::VertexType { inverted, .. }
            | Selector::VertexCharacteristics { inverted, .. }
            | Selector::VertexCharacteristicsList { inverted, .. }
            | Selector::DataCharacteristics { inverted, .. }
            | Selector::DataCharacteristicList { inverted, .. }
            | Selector::VariableName { inverted, .. } => *inverted,
            Selector::Conditional { .. } => false,
        }
    }

    /// Labels named by a characteristic selector, single or list form alike.
    pub fn labels(&self) -> &[Label] {
        match self {
            Selector::VertexCharacteristics { label, .. }
            | Selector::DataCharacteristics { label, .. } => std::slice::from_ref(label),
            Selector::VertexCharacteristicsList { labels, .. }
            | Selector::DataCharacteristicList { labels, .. } => labels,
            _ => &[],
        }
    }

    pub fn is_vertex_characteristic(&self) -> bool {
        matches!(
            self,
            Selector::VertexCharacteristics { .. } | Selector::VertexCharacteristicsList { .. }
        )
    }

    pub fn is_data_characteristic(&self) -> bool {
        matches!(
            self,
            Selector::DataCharacteristics { .. } | Selector::DataCharacteristicList { .. }
        )
    }
}

/// A "never flows" rule: no vertex may match all of its selectors at once.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    #[serde(default)]
    pub data_source: Vec<Selector>,
    #[serde(default)]
    pub vertex_source: Vec<Selector>,
    #[serde(default)]
    pub vertex_destination: Vec<Selector>,
}

impl Constraint {
    /// Every selector paired with the role it is evaluated in.
    pub fn selectors(&self) -> impl Iterator<Item = (&Selector, SelectorRole)> {
        self.vertex_destination
            .iter()
            .map(|s| (s, SelectorRole::VertexDestination))
            .chain(self.data_source.iter().map(|s| (s, SelectorRole::DataSource)))
            .chain(
                self.vertex_source
                    .iter()
                    .map(|s| (s, SelectorRole::VertexSource)),
            )
    }
}
