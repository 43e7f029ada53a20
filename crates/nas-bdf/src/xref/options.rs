//! Cross-reference pass configuration.

use serde::{Deserialize, Serialize};

/// What happens once the tolerated error count exceeds `max_errors`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Report the backlog and keep resolving
    #[default]
    Flush,
    /// Report the backlog and stop the pass
    Abort,
}

/// Categories to resolve and the tolerated-error policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefOptions {
    pub coordinates: bool,
    pub nodes: bool,
    pub elements: bool,
    pub nodes_with_elements: bool,
    pub properties: bool,
    pub masses: bool,
    pub materials: bool,
    pub loads: bool,
    pub constraints: bool,
    pub aero: bool,
    pub sets: bool,
    pub optimization: bool,
    pub max_errors: usize,
    pub overflow: OverflowPolicy,
}

impl Default for XrefOptions {
    fn default() -> Self {
        Self {
            coordinates: true,
            nodes: true,
            elements: true,
            nodes_with_elements: true,
            properties: true,
            masses: true,
            materials: true,
            loads: true,
            constraints: true,
            aero: true,
            sets: true,
            optimization: true,
            max_errors: 100,
            overflow: OverflowPolicy::Flush,
        }
    }
}

impl XrefOptions {
    /// Only coordinates and nodes
    pub fn geometry_only() -> Self {
        Self {
            elements: false,
            nodes_with_elements: false,
            properties: false,
            masses: false,
            materials: false,
            loads: false,
            constraints: false,
            aero: false,
            sets: false,
            optimization: false,
            ..Self::default()
        }
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let o = XrefOptions::default();
        assert!(o.coordinates && o.aero && o.optimization);
        assert_eq!(o.max_errors, 100);
        assert_eq!(o.overflow, OverflowPolicy::Flush);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let o: XrefOptions =
            serde_json::from_str(r#"{"loads": false, "overflow": "abort"}"#).unwrap();
        assert!(!o.loads);
        assert!(o.elements);
        assert_eq!(o.overflow, OverflowPolicy::Abort);
    }

    #[test]
    fn geometry_only_keeps_nodes() {
        let o = XrefOptions::geometry_only();
        assert!(o.coordinates && o.nodes);
        assert!(!o.elements && !o.loads);
    }
}
