pub mod catalog;
pub mod config;
pub mod error;
pub mod extractor;
pub mod models;
pub mod orchestrator;
pub mod pacing;
pub mod sanitize;
pub mod store;
pub mod stores;
pub mod traits;

pub use catalog::CamaraCatalogClient;
pub use config::{
    parse_kinds, HttpConfig, IngestionConfig, DEFAULT_BASE_URL, DEFAULT_KINDS,
    DEFAULT_MAX_DOCUMENT_BYTES,
};
pub use error::{ConfigError, ExtractError, FetchError, StoreError};
pub use extractor::{locate_article_one, HttpDocumentExtractor, LopdfExtractor, PdfExtractor};
pub use models::{
    ArticleExcerpt, KindReport, ListQuery, NaturalKey, Proposition, PropositionDetail,
    PropositionSummary, RunReport, SortOrder, Termination, DOWNLOAD_FAILED_SENTINEL,
    NOT_LOCATED_SENTINEL, NO_DOCUMENT_SENTINEL,
};
pub use orchestrator::IngestionOrchestrator;
pub use pacing::{FixedDelayPacer, Pacer, PacingPolicy, Pause};
pub use sanitize::{normalize_whitespace, sanitize_text};
pub use stores::{DatabaseBackend, PostgresStore, SqliteStore};
pub use traits::{Catalog, DocumentSource, PropositionStore};
