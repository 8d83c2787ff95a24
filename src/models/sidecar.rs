//! Sidecar Document Model
//!
//! The sidecar is a single JSON object per project root. Known top-level
//! sections are listed here; any other key is carried through untouched.

use serde_json::{Map, Value};

/// Top-level sections of the sidecar document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SidecarSection {
    /// `analysisResults`: analysis id -> AnalysisResult
    AnalysisResults,
    /// `pluginExecutions`: plugin id -> PluginExecution
    PluginExecutions,
}

impl SidecarSection {
    pub const ALL: [SidecarSection; 2] = [
        SidecarSection::AnalysisResults,
        SidecarSection::PluginExecutions,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SidecarSection::AnalysisResults => "analysisResults",
            SidecarSection::PluginExecutions => "pluginExecutions",
        }
    }
}

impl std::fmt::Display for SidecarSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A fresh document with every known section present and empty
pub fn empty_sidecar_document() -> Map<String, Value> {
    let mut doc = Map::new();
    for section in SidecarSection::ALL {
        doc.insert(section.key().to_string(), Value::Object(Map::new()));
    }
    doc
}
