use serde::{Deserialize, Serialize};

/// Switches for which edits a repair may propose.
///
/// Disabling an edit kind fixes the corresponding decisions at their reference value.
/// Field names are read in camelCase (`onlyRelevantLabels`, ...); missing fields keep
/// their defaults, which enable everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepairConfig {
    /// Restrict each label to the edit direction the constraints call for.
    pub only_relevant_labels: bool,
    pub add_node_labels: bool,
    pub remove_node_labels: bool,
    pub add_data_labels: bool,
    pub remove_data_labels: bool,
    /// Share formulas between structurally identical flows.
    pub deduplicate: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            only_relevant_labels: true,
            add_node_labels: true,
            remove_node_labels: true,
            add_data_labels: true,
            remove_data_labels: true,
            deduplicate: true,
        }
    }
}

impl RepairConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
