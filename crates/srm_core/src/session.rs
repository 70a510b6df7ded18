//! Running-instance orchestration.
//!
//! # Responsibility
//! - Tie the annotation store to the catalog loader: revision switches and
//!   imports that change the revision trigger a catalog reload.
//! - Offer derived views (stats, graph, report, export) against the catalog
//!   of the active revision only.
//!
//! # Invariants
//! - Derived views never use a catalog loaded for another revision.
//! - Store mutations do not wait on catalog loads.

use crate::catalog::loader::{CatalogLoadError, CatalogLoader, CatalogStatus, LoadedCatalog};
use crate::model::catalog::Catalog;
use crate::model::entry::{Entry, EntryPatch, Revision};
use crate::model::tips::{ControlTips, TipsIndex};
use crate::repo::snapshot_repo::{RepoError, SnapshotRepository};
use crate::stats::aggregate::{build_graph, compute_family_stats, FamilyStat, GraphModel};
use crate::stats::report::{build_report, SrmReport};
use crate::store::annotation_store::AnnotationStore;
use crate::transfer::transcoder::{
    export_document, import_bytes, ExportDocument, ImportError, ImportOutcome, RevisionMismatch,
};
use chrono::{DateTime, Utc};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug)]
pub enum SessionError {
    Store(RepoError),
    Catalog(CatalogLoadError),
    Import(ImportError),
    /// No catalog for the active revision has been installed yet.
    CatalogUnavailable(Revision),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Catalog(err) => write!(f, "{err}"),
            Self::Import(err) => write!(f, "{err}"),
            Self::CatalogUnavailable(revision) => {
                write!(f, "no {revision} catalog is loaded")
            }
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Catalog(err) => Some(err),
            Self::Import(err) => Some(err),
            Self::CatalogUnavailable(_) => None,
        }
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

impl From<CatalogLoadError> for SessionError {
    fn from(value: CatalogLoadError) -> Self {
        Self::Catalog(value)
    }
}

impl From<ImportError> for SessionError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One user's editing session over the persisted store.
pub struct SrmSession<R: SnapshotRepository> {
    store: AnnotationStore<R>,
    loader: Arc<CatalogLoader>,
    tips: TipsIndex,
}

impl<R: SnapshotRepository> SrmSession<R> {
    pub fn new(store: AnnotationStore<R>, loader: Arc<CatalogLoader>) -> Self {
        Self {
            store,
            loader,
            tips: TipsIndex::new(),
        }
    }

    pub fn store(&self) -> &AnnotationStore<R> {
        &self.store
    }

    /// Direct store access, e.g. for registering listeners.
    pub fn store_mut(&mut self) -> &mut AnnotationStore<R> {
        &mut self.store
    }

    pub fn loader(&self) -> &Arc<CatalogLoader> {
        &self.loader
    }

    pub fn revision(&self) -> Revision {
        self.store.revision()
    }

    /// Loads tips and the catalog of the persisted revision.
    pub async fn start(&mut self) -> SessionResult<LoadedCatalog> {
        self.tips = self.loader.load_tips().await;
        self.reload_catalog().await
    }

    /// Loads the catalog for the active revision again.
    pub async fn reload_catalog(&self) -> SessionResult<LoadedCatalog> {
        Ok(self.loader.load(self.store.revision()).await?)
    }

    /// Persists the new revision, then loads its catalog.
    ///
    /// Entries are untouched. Selecting the active revision again retries a
    /// failed load.
    pub async fn switch_revision(&mut self, revision: Revision) -> SessionResult<LoadedCatalog> {
        self.store.set_revision(revision)?;
        self.reload_catalog().await
    }

    pub fn catalog_status(&self) -> CatalogStatus {
        self.loader.status()
    }

    /// Catalog of the active revision, if installed.
    pub fn active_catalog(&self) -> Option<Arc<Catalog>> {
        self.loader.current_for(self.store.revision())
    }

    pub fn get_entry(&self, objective_id: &str) -> Entry {
        self.store.get_entry(objective_id)
    }

    pub fn set_entry(&mut self, objective_id: &str, patch: EntryPatch) -> SessionResult<()> {
        Ok(self.store.set_entry(objective_id, patch)?)
    }

    pub fn reset(&mut self) -> SessionResult<()> {
        Ok(self.store.reset()?)
    }

    pub fn tips_for(&self, control_label: &str) -> Option<&ControlTips> {
        self.tips.tips_for(control_label)
    }

    pub fn family_stats(&self) -> SessionResult<Vec<FamilyStat>> {
        let catalog = self.require_catalog()?;
        Ok(compute_family_stats(&catalog, &self.store))
    }

    pub fn graph(&self) -> SessionResult<GraphModel> {
        let catalog = self.require_catalog()?;
        Ok(build_graph(&catalog, &self.store, self.store.revision()))
    }

    /// Builds the report; `None` uses the persisted column preference.
    pub fn report(&self, include_implementation: Option<bool>) -> SessionResult<SrmReport> {
        let catalog = self.require_catalog()?;
        let include = match include_implementation {
            Some(value) => value,
            None => self.store.include_implementation()?,
        };
        Ok(build_report(
            &catalog,
            &self.store,
            self.store.revision(),
            include,
        ))
    }

    pub fn set_include_implementation(&mut self, include: bool) -> SessionResult<()> {
        Ok(self.store.set_include_implementation(include)?)
    }

    pub fn export(&self, exported_at: DateTime<Utc>) -> SessionResult<ExportDocument> {
        let catalog = self.require_catalog()?;
        Ok(export_document(
            &catalog,
            &self.store,
            self.store.revision(),
            exported_at,
        ))
    }

    /// Imports a document, reloading the catalog when the revision changed.
    ///
    /// A failed reload after a successful import is logged and reflected in
    /// `catalog_status()`; the import itself stands.
    pub async fn import(
        &mut self,
        bytes: &[u8],
        confirm: impl FnOnce(&RevisionMismatch) -> bool,
    ) -> SessionResult<ImportOutcome> {
        let outcome = import_bytes(&mut self.store, bytes, confirm)?;
        if let ImportOutcome::Applied {
            revision_changed: true,
            ..
        } = outcome
        {
            if let Err(err) = self.reload_catalog().await {
                warn!(
                    "event=import_reload module=session status=error revision={} error={}",
                    self.store.revision(),
                    err
                );
            }
        }
        Ok(outcome)
    }

    fn require_catalog(&self) -> SessionResult<Arc<Catalog>> {
        self.active_catalog()
            .ok_or(SessionError::CatalogUnavailable(self.store.revision()))
    }
}
