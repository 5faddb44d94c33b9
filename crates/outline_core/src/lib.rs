//! Core domain logic for the outliner.
//! This crate is the single source of truth for outline invariants.

pub mod db;
pub mod export;
pub mod history;
pub mod logging;
pub mod model;
pub mod outline;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use export::json::{import_archive, ImportError, ImportedArchive};
pub use export::{export_project, ExportArtifact, ExportError, ExportFormat};
pub use history::{HistoryManager, Snapshot, MAX_HISTORY};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogSink};
pub use model::id::{ItemId, NoteId, ProjectId};
pub use model::item::{Item, ListType, Note, NoteKind};
pub use model::project::{Project, ProjectSettings};
pub use outline::tree::Direction;
pub use repo::kv_repo::{KeyValueRepository, RepoError, RepoResult, SqliteKeyValueRepository};
pub use service::outline_store::{ImportReport, OutlineStore};

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
