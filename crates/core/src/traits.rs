use crate::{
    ArticleExcerpt, FetchError, ListQuery, NaturalKey, Proposition, PropositionDetail,
    PropositionSummary, StoreError,
};
use async_trait::async_trait;

/// Remote catalog of propositions.
#[async_trait]
pub trait Catalog {
    /// An empty page means the listing is exhausted.
    async fn list_page(&self, query: &ListQuery) -> Result<Vec<PropositionSummary>, FetchError>;

    async fn detail(&self, id: i64) -> Result<PropositionDetail, FetchError>;
}

/// Turns a document URL into the article-one excerpt. Infallible by contract:
/// failures come back as sentinel values.
#[async_trait]
pub trait DocumentSource {
    async fn excerpt(&self, url: &str) -> ArticleExcerpt;
}

/// Narrow read/write contract against `proposicoes_legislativas`.
#[async_trait]
pub trait PropositionStore {
    async fn exists(&self, key: &NaturalKey) -> Result<bool, StoreError>;

    /// Multi-row insert that silently skips rows whose natural key is already
    /// stored. Returns the number of rows actually inserted.
    async fn upsert_batch(&self, records: &[Proposition]) -> Result<u64, StoreError>;

    async fn find(&self, key: &NaturalKey) -> Result<Option<Proposition>, StoreError>;
}
