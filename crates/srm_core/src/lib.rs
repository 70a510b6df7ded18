//! Core state and derived views for the shared responsibility matrix editor.
//! This crate is the single source of truth for annotation invariants.

pub mod catalog;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod session;
pub mod stats;
pub mod store;
pub mod transfer;

pub use catalog::loader::{
    CatalogLoadError, CatalogLoader, CatalogStatus, LoadTicket, LoadedCatalog, TIPS_DOCUMENT,
};
pub use catalog::source::{
    source_for_location, CatalogSource, FileCatalogSource, HttpCatalogSource, SourceError,
};
pub use config::SrmConfig;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::catalog::{render_placeholders, Catalog, Control, Family, Objective};
pub use model::entry::{
    Entry, EntryLookup, EntryMap, EntryPatch, ObjectiveId, Responsibility, Revision,
};
pub use model::tips::{ControlTips, TipsIndex};
pub use repo::snapshot_repo::{
    RepoError, RepoResult, Snapshot, SnapshotRepository, SqliteSnapshotRepository,
};
pub use session::{SessionError, SessionResult, SrmSession};
pub use stats::aggregate::{build_graph, compute_family_stats, FamilyStat, GraphModel};
pub use stats::report::{
    build_report, report_file_name, ReportRow, ReportSink, SrmReport, TextReportSink,
};
pub use store::annotation_store::{AnnotationStore, StoreEvent, SubscriptionId};
pub use transfer::transcoder::{
    apply_import, export_document, export_file_name, import_bytes, parse_import, ExportDocument,
    ImportDocument, ImportError, ImportOutcome, ImportShape, RevisionMismatch,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
