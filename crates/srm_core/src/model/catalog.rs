//! Catalog reference tree.
//!
//! # Responsibility
//! - Define the read-only Catalog -> Family -> Control -> Objective shape.
//! - Provide rendering helpers for placeholder-bearing prose.
//!
//! # Invariants
//! - Family ids are unique within a catalog.
//! - Objective ids are unique within a catalog and join into annotations.
//! - Rendered prose never contains raw `{{ ... }}` markup.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Token substituted for every prose placeholder.
pub const BLANK_FILLER: &str = "___";

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{.*?\}\}").expect("valid placeholder regex"));

/// Full catalog for one revision.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub families: Vec<Family>,
}

/// Top-level control family (e.g. `03.01 Access Control`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    /// Dotted sort key, e.g. `03.01`.
    pub id: String,
    pub title: String,
    pub label: String,
    pub controls: Vec<Control>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub id: String,
    pub title: String,
    /// Canonical external identifier, e.g. `AC.L2-3.1.1`.
    pub label: String,
    pub statement: String,
    pub objectives: Vec<Objective>,
}

/// Assessment objective, the unit a user annotates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    pub prose: String,
    pub label: String,
}

/// Structural problem found in a parsed catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogValidationError {
    DuplicateFamilyId(String),
    DuplicateObjectiveId(String),
}

impl Display for CatalogValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateFamilyId(id) => write!(f, "duplicate family id `{id}`"),
            Self::DuplicateObjectiveId(id) => write!(f, "duplicate objective id `{id}`"),
        }
    }
}

impl Error for CatalogValidationError {}

/// One objective with its enclosing family and control.
#[derive(Debug, Clone, Copy)]
pub struct ObjectiveRef<'a> {
    pub family: &'a Family,
    pub control: &'a Control,
    pub objective: &'a Objective,
}

impl Catalog {
    /// Parses and validates a catalog document.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, String> {
        let catalog: Catalog =
            serde_json::from_slice(bytes).map_err(|err| format!("invalid catalog json: {err}"))?;
        catalog.validate().map_err(|err| err.to_string())?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), CatalogValidationError> {
        let mut family_ids = HashSet::new();
        let mut objective_ids = HashSet::new();
        for family in &self.families {
            if !family_ids.insert(family.id.as_str()) {
                return Err(CatalogValidationError::DuplicateFamilyId(
                    family.id.clone(),
                ));
            }
            for objective in family.objectives() {
                if !objective_ids.insert(objective.id.as_str()) {
                    return Err(CatalogValidationError::DuplicateObjectiveId(
                        objective.id.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn family(&self, id: &str) -> Option<&Family> {
        self.families.iter().find(|family| family.id == id)
    }

    /// Iterates every objective in catalog order.
    pub fn objectives(&self) -> impl Iterator<Item = ObjectiveRef<'_>> + '_ {
        self.families.iter().flat_map(|family| {
            family.controls.iter().flat_map(move |control| {
                control.objectives.iter().map(move |objective| ObjectiveRef {
                    family,
                    control,
                    objective,
                })
            })
        })
    }

    pub fn objective_count(&self) -> usize {
        self.families.iter().map(Family::objective_count).sum()
    }

    pub fn contains_objective(&self, id: &str) -> bool {
        self.objectives().any(|item| item.objective.id == id)
    }
}

impl Family {
    /// Last dotted segment of the id (`03.01` -> `01`).
    pub fn short_id(&self) -> &str {
        self.id.rsplit('.').next().unwrap_or(self.id.as_str())
    }

    pub fn objectives(&self) -> impl Iterator<Item = &Objective> + '_ {
        self.controls
            .iter()
            .flat_map(|control| control.objectives.iter())
    }

    pub fn objective_count(&self) -> usize {
        self.controls
            .iter()
            .map(|control| control.objectives.len())
            .sum()
    }
}

impl Control {
    /// Statement with literal `\n` escapes turned into line breaks.
    pub fn rendered_statement(&self) -> String {
        self.statement.replace("\\n", "\n")
    }
}

impl Objective {
    /// Prose with every placeholder replaced by [`BLANK_FILLER`].
    pub fn rendered_prose(&self) -> String {
        render_placeholders(&self.prose)
    }

    /// Short objective id used in report rows (`..._DS-A.03.01.01.a` -> `03.01.01.a`).
    pub fn display_id(&self) -> &str {
        let tail = self.id.rsplit('_').next().unwrap_or(self.id.as_str());
        tail.strip_prefix("DS-A.").unwrap_or(tail)
    }
}

/// Replaces non-greedy `{{ ... }}` markers with the blank-filler token.
pub fn render_placeholders(text: &str) -> String {
    PLACEHOLDER_RE.replace_all(text, BLANK_FILLER).into_owned()
}

#[cfg(test)]
mod tests {
    use super::{render_placeholders, Catalog, CatalogValidationError, Control, Family, Objective};

    fn objective(id: &str) -> Objective {
        Objective {
            id: id.to_string(),
            prose: String::new(),
            label: String::new(),
        }
    }

    fn family(id: &str, objective_ids: &[&str]) -> Family {
        Family {
            id: id.to_string(),
            title: format!("family {id}"),
            label: id.to_string(),
            controls: vec![Control {
                id: format!("{id}.01"),
                title: "control".to_string(),
                label: "AC.L2-3.1.1".to_string(),
                statement: "line one\\nline two".to_string(),
                objectives: objective_ids.iter().map(|id| objective(id)).collect(),
            }],
        }
    }

    #[test]
    fn placeholders_are_replaced_non_greedily() {
        let rendered = render_placeholders("limit {{ insert: param, a }} and {{ b }} now");
        assert_eq!(rendered, "limit ___ and ___ now");
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn statement_escapes_become_newlines() {
        let family = family("03.01", &["o1"]);
        assert_eq!(
            family.controls[0].rendered_statement(),
            "line one\nline two"
        );
    }

    #[test]
    fn family_lookup_is_by_exact_id() {
        let catalog = Catalog {
            families: vec![family("03.01", &["o1"]), family("03.02", &["o2"])],
        };
        assert_eq!(catalog.family("03.02").map(|found| found.title.as_str()), Some("family 03.02"));
        assert!(catalog.family("03").is_none());
    }

    #[test]
    fn display_id_strips_prefix_and_path() {
        let mut item = objective("SP_800_171_DS-A.03.01.01.a");
        assert_eq!(item.display_id(), "03.01.01.a");
        item.id = "3.1.1[a]".to_string();
        assert_eq!(item.display_id(), "3.1.1[a]");
    }

    #[test]
    fn short_id_is_last_dotted_segment() {
        assert_eq!(family("03.14", &[]).short_id(), "14");
    }

    #[test]
    fn validate_rejects_duplicate_objective_ids() {
        let catalog = Catalog {
            families: vec![family("03.01", &["o1"]), family("03.02", &["o1"])],
        };
        assert_eq!(
            catalog.validate(),
            Err(CatalogValidationError::DuplicateObjectiveId("o1".to_string()))
        );
    }

    #[test]
    fn objectives_iterate_in_catalog_order() {
        let catalog = Catalog {
            families: vec![family("03.01", &["a", "b"]), family("03.02", &["c"])],
        };
        let ids: Vec<&str> = catalog
            .objectives()
            .map(|item| item.objective.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(catalog.objective_count(), 3);
        assert!(catalog.contains_objective("c"));
    }
}
