//! Revision-aware catalog loader with stale-response suppression.
//!
//! # Responsibility
//! - Resolve a revision to its catalog document and fetch it.
//! - Install the parsed catalog as the working catalog.
//! - Cancel and discard loads superseded by a newer request.
//!
//! # Invariants
//! - Only the most recently issued load may install a catalog, regardless of
//!   completion order.
//! - A failed load never replaces the installed catalog.
//! - There is no automatic retry; callers load again to recover.

use crate::catalog::source::{CatalogSource, SourceError};
use crate::model::catalog::Catalog;
use crate::model::entry::Revision;
use crate::model::tips::TipsIndex;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Document id of the optional tips document.
pub const TIPS_DOCUMENT: &str = "control-tips.json";

/// A parsed catalog together with the revision it was requested for.
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub revision: Revision,
    pub catalog: Arc<Catalog>,
}

/// Visible loading state of the working catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CatalogStatus {
    #[default]
    Idle,
    Loading(Revision),
    Ready(Revision),
    /// Retryable; the previously installed catalog is still available.
    LoadFailed { revision: Revision, reason: String },
}

#[derive(Debug)]
pub enum CatalogLoadError {
    Fetch {
        revision: Revision,
        source: SourceError,
    },
    Malformed {
        revision: Revision,
        message: String,
    },
    /// A newer load was issued before this one resolved.
    Superseded { revision: Revision },
}

impl CatalogLoadError {
    /// `true` for fetch and parse failures, `false` for superseded loads.
    pub fn is_load_failed(&self) -> bool {
        !matches!(self, Self::Superseded { .. })
    }

    pub fn revision(&self) -> Revision {
        match self {
            Self::Fetch { revision, .. }
            | Self::Malformed { revision, .. }
            | Self::Superseded { revision } => *revision,
        }
    }
}

impl Display for CatalogLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch { revision, source } => {
                write!(f, "failed to load {revision} catalog: {source}")
            }
            Self::Malformed { revision, message } => {
                write!(f, "malformed {revision} catalog: {message}")
            }
            Self::Superseded { revision } => {
                write!(f, "{revision} catalog load superseded by a newer request")
            }
        }
    }
}

impl Error for CatalogLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Identity of one issued load.
#[derive(Debug, Clone)]
pub struct LoadTicket {
    revision: Revision,
    generation: u64,
    token: CancellationToken,
}

impl LoadTicket {
    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Default)]
struct LoaderState {
    generation: u64,
    token: CancellationToken,
    status: CatalogStatus,
    current: Option<LoadedCatalog>,
}

/// Fetches catalogs and holds the current working catalog.
pub struct CatalogLoader {
    source: Arc<dyn CatalogSource>,
    state: Mutex<LoaderState>,
}

impl CatalogLoader {
    pub fn new(source: impl CatalogSource + 'static) -> Self {
        Self::from_shared(Arc::new(source))
    }

    pub fn from_shared(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            state: Mutex::new(LoaderState::default()),
        }
    }

    /// Loads the catalog for `revision` and installs it when still current.
    ///
    /// Starting this load cancels any load still in flight.
    ///
    /// # Errors
    /// - `Fetch` / `Malformed` when the document cannot be fetched or parsed;
    ///   the status becomes `LoadFailed` and the prior catalog is kept.
    /// - `Superseded` when a newer load was issued meanwhile.
    pub async fn load(&self, revision: Revision) -> Result<LoadedCatalog, CatalogLoadError> {
        let started_at = Instant::now();
        let ticket = self.begin(revision);
        let document = revision.catalog_document();
        info!(
            "event=catalog_load module=catalog status=start revision={} document={} source={}",
            revision,
            document,
            self.source.describe()
        );

        let token = ticket.token.clone();
        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => {
                return self.finish(ticket, Err(CatalogLoadError::Superseded { revision }));
            }
            fetched = self.source.fetch(document) => fetched,
        };

        let parsed = fetched
            .map_err(|source| CatalogLoadError::Fetch { revision, source })
            .and_then(|bytes| {
                Catalog::from_json_slice(&bytes)
                    .map_err(|message| CatalogLoadError::Malformed { revision, message })
            });

        let result = self.finish(ticket, parsed);
        if let Ok(loaded) = &result {
            info!(
                "event=catalog_load module=catalog status=ok revision={} family_count={} objective_count={} duration_ms={}",
                revision,
                loaded.catalog.families.len(),
                loaded.catalog.objective_count(),
                started_at.elapsed().as_millis()
            );
        }
        result
    }

    /// Issues a new load ticket, cancelling the previous one.
    pub fn begin(&self, revision: Revision) -> LoadTicket {
        let mut state = self.lock_state();
        state.generation += 1;
        state.token.cancel();
        state.token = CancellationToken::new();
        state.status = CatalogStatus::Loading(revision);
        LoadTicket {
            revision,
            generation: state.generation,
            token: state.token.clone(),
        }
    }

    /// Resolves a ticket: installs a catalog only if the ticket is current.
    pub fn finish(
        &self,
        ticket: LoadTicket,
        result: Result<Catalog, CatalogLoadError>,
    ) -> Result<LoadedCatalog, CatalogLoadError> {
        let revision = ticket.revision;
        let mut state = self.lock_state();
        if ticket.generation != state.generation {
            debug!(
                "event=catalog_load module=catalog status=superseded revision={} generation={} current_generation={}",
                revision, ticket.generation, state.generation
            );
            return Err(CatalogLoadError::Superseded { revision });
        }

        match result {
            Ok(catalog) => {
                let loaded = LoadedCatalog {
                    revision,
                    catalog: Arc::new(catalog),
                };
                state.current = Some(loaded.clone());
                state.status = CatalogStatus::Ready(revision);
                Ok(loaded)
            }
            Err(CatalogLoadError::Superseded { .. }) => {
                Err(CatalogLoadError::Superseded { revision })
            }
            Err(err) => {
                warn!(
                    "event=catalog_load module=catalog status=error revision={} error={}",
                    revision, err
                );
                state.status = CatalogStatus::LoadFailed {
                    revision,
                    reason: err.to_string(),
                };
                Err(err)
            }
        }
    }

    /// Most recently installed catalog, whatever its revision.
    pub fn current(&self) -> Option<LoadedCatalog> {
        self.lock_state().current.clone()
    }

    /// Installed catalog only if it belongs to `revision`.
    pub fn current_for(&self, revision: Revision) -> Option<Arc<Catalog>> {
        self.lock_state()
            .current
            .as_ref()
            .filter(|loaded| loaded.revision == revision)
            .map(|loaded| Arc::clone(&loaded.catalog))
    }

    pub fn status(&self) -> CatalogStatus {
        self.lock_state().status.clone()
    }

    /// Loads the optional tips document; any failure yields an empty index.
    pub async fn load_tips(&self) -> TipsIndex {
        let parsed = match self.source.fetch(TIPS_DOCUMENT).await {
            Ok(bytes) => TipsIndex::from_json_slice(&bytes),
            Err(err) => Err(err.to_string()),
        };
        match parsed {
            Ok(index) => {
                info!(
                    "event=tips_load module=catalog status=ok tip_count={}",
                    index.len()
                );
                index
            }
            Err(reason) => {
                warn!(
                    "event=tips_load module=catalog status=skipped reason={}",
                    reason
                );
                TipsIndex::new()
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
