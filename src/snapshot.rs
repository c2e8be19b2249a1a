//! Freeze/resume state of a tracing session.
//!
//! Only the minimal resumable state is kept: whether tracing was active and the
//! category list it was started with. Events collected but not yet emitted are not
//! part of the snapshot.

use crate::Result;
use serde::{Deserialize, Serialize};

/// Serialized session state, `{"started": bool, "categories": [string]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingSnapshot {
    pub started: bool,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl TracingSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TracelinkError;

    #[test]
    fn test_wire_form() {
        let snapshot = TracingSnapshot {
            started: true,
            categories: vec!["net".to_string(), "gpu".to_string()],
        };
        assert_eq!(snapshot.to_json().unwrap(), r#"{"started":true,"categories":["net","gpu"]}"#);
    }

    #[test]
    fn test_from_json() {
        let snapshot = TracingSnapshot::from_json(r#"{"started":true,"categories":["a"]}"#).unwrap();
        assert!(snapshot.started);
        assert_eq!(snapshot.categories, vec!["a".to_string()]);
    }

    #[test]
    fn test_missing_categories_default_to_empty() {
        let snapshot = TracingSnapshot::from_json(r#"{"started":false}"#).unwrap();
        assert_eq!(snapshot, TracingSnapshot::default());
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let result = TracingSnapshot::from_json("{started}");
        assert!(matches!(result, Err(TracelinkError::SerializationError(_))));
    }
}
