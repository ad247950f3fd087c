use super::selector::{Constraint, Selector};
use crate::model::{Label, VertexType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Data,
    VertexSource,
    VertexDestination,
}

/// Fluent construction of a [`Constraint`].
///
/// Selectors are added to the section opened last: `of_data()` for data selectors,
/// `from_vertex()` for vertex-source selectors and `to_vertex()` for destination selectors.
///
/// ```rust
/// use flowmend::prelude::*;
///
/// let personal = Label::new("Sensitivity", "personal");
/// let constraint = Constraint::builder("no-personal-data-abroad")
///     .of_data()
///     .with_label(personal.clone())
///     .never_flows()
///     .to_vertex()
///     .with_type(VertexType::External)
///     .create();
///
/// assert_eq!(constraint.data_source.len(), 1);
/// assert_eq!(constraint.vertex_destination.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ConstraintBuilder {
    constraint: Constraint,
    section: Section,
}

impl Constraint {
    pub fn builder(name: impl Into<String>) -> ConstraintBuilder {
        ConstraintBuilder {
            constraint: Constraint {
                name: name.into(),
                ..Constraint::default()
            },
            section: Section::Data,
        }
    }
}

impl ConstraintBuilder {
    pub fn of_data(mut self) -> Self {
        self.section = Section::Data;
        self
    }

    pub fn from_vertex(mut self) -> Self {
        self.section = Section::VertexSource;
        self
    }

    /// Reads as the verb of the rule; selectors added afterwards still need `to_vertex()`.
    pub fn never_flows(self) -> Self {
        self
    }

    pub fn to_vertex(mut self) -> Self {
        self.section = Section::VertexDestination;
        self
    }

    pub fn with_label(self, label: Label) -> Self {
        self.characteristic(label, false)
    }

    pub fn without_label(self, label: Label) -> Self {
        self.characteristic(label, true)
    }

    pub fn with_characteristic(self, label: Label) -> Self {
        self.characteristic(label, false)
    }

    pub fn without_characteristic(self, label: Label) -> Self {
        self.characteristic(label, true)
    }

    /// Matches when any of `labels` is present.
    pub fn with_any_label(self, labels: impl IntoIterator<Item = Label>) -> Self {
        self.characteristic_list(labels.into_iter().collect(), false)
    }

    /// Matches when none of `labels` is present.
    pub fn without_any_label(self, labels: impl IntoIterator<Item = Label>) -> Self {
        self.characteristic_list(labels.into_iter().collect(), true)
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.named(name.into(), false)
    }

    pub fn without_name(self, name: impl Into<String>) -> Self {
        self.named(name.into(), true)
    }

    pub fn with_type(self, vertex_type: VertexType) -> Self {
        self.push(Selector::VertexType {
            vertex_type,
            inverted: false,
        })
    }

    pub fn without_type(self, vertex_type: VertexType) -> Self {
        self.push(Selector::VertexType {
            vertex_type,
            inverted: true,
        })
    }

    pub fn with_condition(self, expression: impl Into<String>) -> Self {
        self.push(Selector::Conditional {
            expression: expression.into(),
        })
    }

    pub fn create(self) -> Constraint {
        self.constraint
    }

    fn characteristic(self, label: Label, inverted: bool) -> Self {
        let selector = match self.section {
            Section::Data => Selector::DataCharacteristics { label, inverted },
            Section::VertexSource | Section::VertexDestination => {
                Selector::VertexCharacteristics { label, inverted }
            }
        };
        self.push(selector)
    }

    fn characteristic_list(self, labels: Vec<Label>, inverted: bool) -> Self {
        let selector = match self.section {
            Section::Data => Selector::DataCharacteristicList { labels, inverted },
            Section::VertexSource | Section::VertexDestination => {
                Selector::VertexCharacteristicsList { labels, inverted }
            }
        };
        self.push(selector)
    }

    fn named(self, name: String, inverted: bool) -> Self {
        let selector = match self.section {
            Section::Data => Selector::VariableName { name, inverted },
            Section::VertexSource | Section::VertexDestination => {
                Selector::VertexName { name, inverted }
            }
        };
        self.push(selector)
    }

    // Selectors are stored as given; misplaced kinds are reported at translation time.
    fn push(mut self, selector: Selector) -> Self {
        match self.section {
            Section::Data => self.constraint.data_source.push(selector),
            Section::VertexSource => self.constraint.vertex_source.push(selector),
            Section::VertexDestination => self.constraint.vertex_destination.push(selector),
        }
        self
    }
}
