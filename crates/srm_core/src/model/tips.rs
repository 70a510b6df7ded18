//! Supplementary implementation tips keyed by control label.
//!
//! Tips are optional. A control without tips (or with only empty tips)
//! simply has no tip panel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Guidance attached to one control label.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ControlTips {
    #[serde(default)]
    pub evidence_artifacts: Vec<String>,
    #[serde(default)]
    pub implementation_tips: String,
}

impl ControlTips {
    pub fn is_empty(&self) -> bool {
        self.implementation_tips.trim().is_empty() && self.evidence_artifacts.is_empty()
    }
}

/// Lookup table from control label to tips.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TipsIndex {
    by_label: BTreeMap<String, ControlTips>,
}

#[derive(Deserialize)]
struct PracticesDocument {
    #[serde(rename = "CMMC_Level_2_Practices")]
    families: Vec<PracticeFamily>,
}

#[derive(Deserialize)]
struct PracticeFamily {
    #[serde(default)]
    practices: Vec<Practice>,
}

#[derive(Deserialize)]
struct Practice {
    id: String,
    #[serde(default)]
    evidence_artifacts: Vec<String>,
    #[serde(default)]
    implementation_tips: String,
}

impl TipsIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses either the grouped practices document or a flat label map.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, String> {
        if let Ok(document) = serde_json::from_slice::<PracticesDocument>(bytes) {
            let by_label = document
                .families
                .into_iter()
                .flat_map(|family| family.practices)
                .map(|practice| {
                    (
                        practice.id,
                        ControlTips {
                            evidence_artifacts: practice.evidence_artifacts,
                            implementation_tips: practice.implementation_tips,
                        },
                    )
                })
                .collect();
            return Ok(Self { by_label });
        }

        serde_json::from_slice::<BTreeMap<String, ControlTips>>(bytes)
            .map(|by_label| Self { by_label })
            .map_err(|err| format!("invalid tips json: {err}"))
    }

    pub fn insert(&mut self, control_label: impl Into<String>, tips: ControlTips) {
        self.by_label.insert(control_label.into(), tips);
    }

    /// Returns displayable tips for a control label, if any.
    pub fn tips_for(&self, control_label: &str) -> Option<&ControlTips> {
        self.by_label
            .get(control_label)
            .filter(|tips| !tips.is_empty())
    }

    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::TipsIndex;

    #[test]
    fn parses_grouped_practices_document() {
        let json = br#"{
            "CMMC_Level_2_Practices": [
                { "practices": [
                    { "id": "AC.L2-3.1.1", "evidence_artifacts": ["access policy"], "implementation_tips": "Use SSO." },
                    { "id": "AC.L2-3.1.2" }
                ] }
            ]
        }"#;
        let index = TipsIndex::from_json_slice(json).unwrap();
        assert_eq!(index.len(), 2);
        let tips = index.tips_for("AC.L2-3.1.1").unwrap();
        assert_eq!(tips.implementation_tips, "Use SSO.");
        assert_eq!(tips.evidence_artifacts, vec!["access policy".to_string()]);
        assert!(index.tips_for("AC.L2-3.1.2").is_none());
    }

    #[test]
    fn parses_flat_label_map() {
        let json = br#"{ "AU.L2-3.3.1": { "evidence_artifacts": [], "implementation_tips": "Ship logs." } }"#;
        let index = TipsIndex::from_json_slice(json).unwrap();
        assert!(index.tips_for("AU.L2-3.3.1").is_some());
        assert!(index.tips_for("missing").is_none());
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(TipsIndex::from_json_slice(b"[1, 2]").is_err());
    }
}
