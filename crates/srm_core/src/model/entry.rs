//! Annotation values attached to catalog objectives.
//!
//! # Responsibility
//! - Define `Responsibility`, `Revision`, `Entry` and partial updates.
//! - Provide default-expanding lookups over entry maps.
//!
//! # Invariants
//! - The default entry is `{ Customer, "" }`.
//! - Entry maps are keyed by objective id and never validated against a
//!   catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Objective identifier, unique within one catalog revision.
pub type ObjectiveId = String;

/// Stored annotations keyed by objective id.
pub type EntryMap = BTreeMap<ObjectiveId, Entry>;

/// Who is accountable for satisfying an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Responsibility {
    #[default]
    Customer,
    /// Older exports carry the provider's brand name instead.
    #[serde(alias = "Corvid")]
    Provider,
    Shared,
}

impl Responsibility {
    pub const ALL: [Responsibility; 3] = [
        Responsibility::Customer,
        Responsibility::Provider,
        Responsibility::Shared,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Provider => "Provider",
            Self::Shared => "Shared",
        }
    }
}

impl Display for Responsibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Responsibility {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "provider" | "corvid" => Ok(Self::Provider),
            "shared" => Ok(Self::Shared),
            other => Err(format!(
                "unknown responsibility `{other}`; expected customer|provider|shared"
            )),
        }
    }
}

/// Catalog revision selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Revision {
    Rev2,
    #[default]
    Rev3,
}

impl Revision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rev2 => "rev2",
            Self::Rev3 => "rev3",
        }
    }

    /// Human-facing label used in report headers and prompts.
    pub fn label(self) -> &'static str {
        match self {
            Self::Rev2 => "Rev 2",
            Self::Rev3 => "Rev 3",
        }
    }

    /// Fixed document identifier of the static catalog for this revision.
    pub fn catalog_document(self) -> &'static str {
        match self {
            Self::Rev2 => "controls-v2.json",
            Self::Rev3 => "controls.json",
        }
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Revision {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rev2" | "2" => Ok(Self::Rev2),
            "rev3" | "3" => Ok(Self::Rev3),
            other => Err(format!("unknown revision `{other}`; expected rev2|rev3")),
        }
    }
}

/// Responsibility and implementation note for one objective.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    pub responsibility: Responsibility,
    pub implementation: String,
}

impl Entry {
    pub fn new(responsibility: Responsibility, implementation: impl Into<String>) -> Self {
        Self {
            responsibility,
            implementation: implementation.into(),
        }
    }

    /// Returns a copy of `base` (or the default entry) with `patch` applied.
    pub fn merged(base: Option<&Entry>, patch: &EntryPatch) -> Self {
        let base = base.cloned().unwrap_or_default();
        Self {
            responsibility: patch.responsibility.unwrap_or(base.responsibility),
            implementation: patch
                .implementation
                .clone()
                .unwrap_or(base.implementation),
        }
    }
}

/// Partial update for `AnnotationStore::set_entry`.
///
/// `None` keeps the stored value; `Some("")` clears the implementation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryPatch {
    pub responsibility: Option<Responsibility>,
    pub implementation: Option<String>,
}

impl EntryPatch {
    pub fn responsibility(value: Responsibility) -> Self {
        Self {
            responsibility: Some(value),
            implementation: None,
        }
    }

    pub fn implementation(value: impl Into<String>) -> Self {
        Self {
            responsibility: None,
            implementation: Some(value.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.responsibility.is_none() && self.implementation.is_none()
    }
}

/// Default-expanding read access to annotations.
pub trait EntryLookup {
    /// Returns the stored entry for `id`, or the default entry.
    fn effective_entry(&self, id: &str) -> Entry;

    fn effective_responsibility(&self, id: &str) -> Responsibility {
        self.effective_entry(id).responsibility
    }
}

impl EntryLookup for EntryMap {
    fn effective_entry(&self, id: &str) -> Entry {
        self.get(id).cloned().unwrap_or_default()
    }

    fn effective_responsibility(&self, id: &str) -> Responsibility {
        self.get(id)
            .map(|entry| entry.responsibility)
            .unwrap_or_default()
    }
}
