//! Category filter configuration for capture backends.

use serde::{Deserialize, Serialize};

/// How a capture backend behaves once its buffer is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordMode {
    /// Stop recording new events once the buffer is full
    #[default]
    RecordUntilFull,
    /// Overwrite the oldest events once the buffer is full
    RecordContinuously,
}

/// Category filter handed to agents when a capture window opens.
///
/// An empty include list (or one containing `*`) enables every category.
/// Excluded categories always win over included ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceConfig {
    pub included_categories: Vec<String>,
    pub excluded_categories: Vec<String>,
    pub record_mode: RecordMode,
}

impl TraceConfig {
    /// Build a config from the category list of a start request.
    ///
    /// Entries prefixed with `-` are exclusions; empty entries are ignored.
    pub fn from_categories(categories: &[String]) -> Self {
        let mut config = Self::default();
        for category in categories.iter().map(|c| c.trim()) {
            if category.is_empty() {
                continue;
            }
            match category.strip_prefix('-') {
                Some(excluded) if !excluded.is_empty() => {
                    config.excluded_categories.push(excluded.to_string())
                }
                Some(_) => {}
                None => config.included_categories.push(category.to_string()),
            }
        }
        config
    }

    pub fn with_record_mode(mut self, record_mode: RecordMode) -> Self {
        self.record_mode = record_mode;
        self
    }

    /// Check whether an event category passes this filter.
    ///
    /// Event categories may themselves be comma-separated groups; the event is
    /// enabled if any of its groups is.
    pub fn is_category_enabled(&self, category: &str) -> bool {
        category.split(',').map(str::trim).any(|group| self.is_group_enabled(group))
    }

    fn is_group_enabled(&self, group: &str) -> bool {
        if self.excluded_categories.iter().any(|c| c == group) {
            return false;
        }
        self.included_categories.is_empty()
            || self.included_categories.iter().any(|c| c == "*" || c == group)
    }

    /// Render the filter back into its comma-separated form
    pub fn to_filter_string(&self) -> String {
        self.included_categories
            .iter()
            .cloned()
            .chain(self.excluded_categories.iter().map(|c| format!("-{}", c)))
            .collect::<Vec<_>>()
            .join(",")
    }
}
