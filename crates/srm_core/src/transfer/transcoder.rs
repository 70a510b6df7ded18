//! Export/import transcoder.
//!
//! # Responsibility
//! - Produce `{ version, revision, exportedAt, entries }` export documents.
//! - Accept the export shape or a legacy bare `{ id: entry }` mapping.
//! - Gate cross-revision imports behind a caller-supplied confirmation.
//!
//! # Invariants
//! - Parse failures leave the store untouched.
//! - A declined revision switch leaves the store untouched.
//! - An accepted import replaces revision and entries together; keys missing
//!   from the document fall back to defaults afterwards.

use crate::model::catalog::Catalog;
use crate::model::entry::{Entry, EntryLookup, EntryMap, Responsibility, Revision};
use crate::repo::snapshot_repo::{RepoError, Snapshot, SnapshotRepository};
use crate::store::annotation_store::AnnotationStore;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Export document format version.
pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug)]
pub enum ImportError {
    /// Document is not JSON or matches neither accepted shape.
    InvalidImport(String),
    /// The replacement could not be persisted.
    Store(RepoError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidImport(message) => write!(f, "invalid import file: {message}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidImport(_) => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Serialized export file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    pub revision: Revision,
    /// RFC 3339 UTC timestamp with millisecond precision.
    pub exported_at: String,
    pub entries: EntryMap,
}

impl ExportDocument {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn file_name(&self) -> String {
        export_file_name(self.revision)
    }
}

/// Export file name for a revision (`nist-800-171-rev3-srm-data.json`).
pub fn export_file_name(revision: Revision) -> String {
    format!("nist-800-171-{revision}-srm-data.json")
}

/// Emits the effective entry of every catalog objective.
pub fn export_document(
    catalog: &Catalog,
    entries: &impl EntryLookup,
    revision: Revision,
    exported_at: DateTime<Utc>,
) -> ExportDocument {
    let entries: EntryMap = catalog
        .objectives()
        .map(|item| {
            (
                item.objective.id.clone(),
                entries.effective_entry(&item.objective.id),
            )
        })
        .collect();

    info!(
        "event=export module=transfer status=ok revision={} entry_count={}",
        revision,
        entries.len()
    );
    ExportDocument {
        version: EXPORT_VERSION,
        revision,
        exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        entries,
    }
}

/// Which accepted shape an import document matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportShape {
    Export,
    LegacyEntries,
}

/// Parsed, not yet applied, import document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDocument {
    pub shape: ImportShape,
    /// Revision declared by the document, if any.
    pub revision: Option<Revision>,
    pub entries: EntryMap,
}

impl ImportDocument {
    /// Revision the store switches to when this document is applied.
    pub fn target_revision(&self) -> Revision {
        self.revision.unwrap_or(Revision::Rev3)
    }
}

/// Confirmation request raised before a cross-revision import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionMismatch {
    pub active: Revision,
    pub incoming: Revision,
}

impl RevisionMismatch {
    /// User-facing confirmation prompt.
    pub fn prompt(&self) -> String {
        format!(
            "This file was exported from {}. Switch to {} and import?",
            self.incoming.label(),
            self.incoming.label()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Applied {
        revision: Revision,
        entry_count: usize,
        revision_changed: bool,
    },
    Declined(RevisionMismatch),
}

#[derive(Deserialize)]
struct ExportShape {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    revision: Option<Revision>,
    entries: BTreeMap<String, ImportedEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ImportedEntry {
    #[serde(default)]
    responsibility: Option<Responsibility>,
    #[serde(default)]
    implementation: Option<String>,
}

impl ImportedEntry {
    fn has_known_field(&self) -> bool {
        self.responsibility.is_some() || self.implementation.is_some()
    }
}

impl From<ImportedEntry> for Entry {
    fn from(value: ImportedEntry) -> Self {
        Entry {
            responsibility: value.responsibility.unwrap_or_default(),
            implementation: value.implementation.unwrap_or_default(),
        }
    }
}

fn into_entry_map(entries: BTreeMap<String, ImportedEntry>) -> EntryMap {
    entries
        .into_iter()
        .map(|(id, entry)| (id, Entry::from(entry)))
        .collect()
}

/// Parses an import document: export shape first, then the legacy mapping.
pub fn parse_import(bytes: &[u8]) -> Result<ImportDocument, ImportError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| ImportError::InvalidImport(format!("not valid json: {err}")))?;

    let strict = ExportShape::deserialize(&value)
        .ok()
        .filter(|shape| shape.version.map_or(true, |version| version == EXPORT_VERSION));
    if let Some(shape) = strict {
        return Ok(ImportDocument {
            shape: ImportShape::Export,
            revision: shape.revision,
            entries: into_entry_map(shape.entries),
        });
    }

    let entries = BTreeMap::<String, ImportedEntry>::deserialize(&value).map_err(|err| {
        ImportError::InvalidImport(format!(
            "expected an export document or an objective-id mapping: {err}"
        ))
    })?;
    if let Some((id, _)) = entries.iter().find(|(_, entry)| !entry.has_known_field()) {
        return Err(ImportError::InvalidImport(format!(
            "entry `{id}` has neither responsibility nor implementation"
        )));
    }
    Ok(ImportDocument {
        shape: ImportShape::LegacyEntries,
        revision: None,
        entries: into_entry_map(entries),
    })
}

/// Applies a parsed document to the store.
///
/// `confirm` is consulted only when the document declares a revision other
/// than the active one; returning `false` aborts without any change.
pub fn apply_import<R: SnapshotRepository>(
    store: &mut AnnotationStore<R>,
    document: ImportDocument,
    confirm: impl FnOnce(&RevisionMismatch) -> bool,
) -> Result<ImportOutcome, ImportError> {
    let active = store.revision();
    if let Some(incoming) = document.revision.filter(|incoming| *incoming != active) {
        let mismatch = RevisionMismatch { active, incoming };
        if !confirm(&mismatch) {
            info!(
                "event=import module=transfer status=declined active={} incoming={}",
                active, incoming
            );
            return Ok(ImportOutcome::Declined(mismatch));
        }
    }

    let revision = document.target_revision();
    let entry_count = document.entries.len();
    store.replace_snapshot(Snapshot::new(revision, document.entries))?;

    info!(
        "event=import module=transfer status=ok revision={} entry_count={}",
        revision, entry_count
    );
    Ok(ImportOutcome::Applied {
        revision,
        entry_count,
        revision_changed: revision != active,
    })
}

/// Parses `bytes` and applies them; see [`parse_import`] and [`apply_import`].
pub fn import_bytes<R: SnapshotRepository>(
    store: &mut AnnotationStore<R>,
    bytes: &[u8],
    confirm: impl FnOnce(&RevisionMismatch) -> bool,
) -> Result<ImportOutcome, ImportError> {
    let document = parse_import(bytes).map_err(|err| {
        warn!("event=import module=transfer status=invalid error={}", err);
        err
    })?;
    apply_import(store, document, confirm)
}
