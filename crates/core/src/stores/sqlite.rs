use crate::store::{InsertValues, PropositionRow, INSERT_PREFIX, ON_CONFLICT_SKIP};
use crate::traits::PropositionStore;
use crate::{NaturalKey, Proposition, StoreError};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS proposicoes_legislativas (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    numero            INTEGER NOT NULL,
    tipo              TEXT NOT NULL,
    ano               INTEGER NOT NULL,
    data_apresentacao TEXT,
    ementa_resumo     TEXT NOT NULL DEFAULT '',
    artigo_1_trecho   TEXT,
    link_pdf          TEXT,
    criado_em         TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (tipo, numero, ano)
)
"#;

/// SQLite-backed store for local runs and tests.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// Private in-memory database; a single connection keeps it alive.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM proposicoes_legislativas")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }
}

#[async_trait]
impl PropositionStore for SqliteStore {
    async fn exists(&self, key: &NaturalKey) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM proposicoes_legislativas WHERE tipo = ? AND numero = ? AND ano = ? LIMIT 1",
        )
        .bind(&key.kind)
        .bind(key.number)
        .bind(key.year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    async fn upsert_batch(&self, records: &[Proposition]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        if self.pool.is_closed() {
            return Err(StoreError::NotReady("connection pool is closed".to_string()));
        }

        let mut builder = QueryBuilder::<Sqlite>::new(INSERT_PREFIX);
        builder.push_values(records.iter().map(InsertValues::from), |mut row, values| {
            row.push_bind(values.numero)
                .push_bind(values.tipo)
                .push_bind(values.ano)
                .push_bind(values.data_apresentacao)
                .push_bind(values.ementa_resumo)
                .push_bind(values.artigo_1_trecho)
                .push_bind(values.link_pdf);
        });
        builder.push(ON_CONFLICT_SKIP);

        let inserted = builder.build().execute(&self.pool).await?.rows_affected();
        debug!(batch = records.len(), inserted, "batch written");
        Ok(inserted)
    }

    async fn find(&self, key: &NaturalKey) -> Result<Option<Proposition>, StoreError> {
        let row = sqlx::query_as::<_, PropositionRow>(
            r#"
            SELECT tipo, numero, ano, data_apresentacao, ementa_resumo, artigo_1_trecho, link_pdf
            FROM proposicoes_legislativas
            WHERE tipo = ? AND numero = ? AND ano = ?
            LIMIT 1
            "#,
        )
        .bind(&key.kind)
        .bind(key.number)
        .bind(key.year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Proposition::from))
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use crate::traits::PropositionStore;
    use crate::{ArticleExcerpt, NaturalKey, Proposition};
    use chrono::NaiveDate;

    fn record(number: i32) -> Proposition {
        Proposition {
            kind: "PL".to_string(),
            number,
            year: 2024,
            presented_on: NaiveDate::from_ymd_opt(2024, 2, number as u32),
            summary: format!("Institui normas {number}"),
            article_one: ArticleExcerpt::Found(format!("Art. 1º Texto {number}")),
            document_url: Some(format!("https://example.org/{number}.pdf")),
        }
    }

    async fn store() -> Result<SqliteStore, Box<dyn std::error::Error>> {
        let store = SqliteStore::in_memory().await?;
        store.ensure_schema().await?;
        Ok(store)
    }

    #[tokio::test]
    async fn batch_with_existing_keys_inserts_only_new_rows() -> Result<(), Box<dyn std::error::Error>> {
        let store = store().await?;
        let batch = (1..=5).map(record).collect::<Vec<_>>();

        assert_eq!(store.upsert_batch(&[record(2), record(4)]).await?, 2);
        assert_eq!(store.upsert_batch(&batch).await?, 3);
        assert_eq!(store.count().await?, 5);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_batch_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
        let store = store().await?;
        let batch = (1..=3).map(record).collect::<Vec<_>>();

        assert_eq!(store.upsert_batch(&batch).await?, 3);
        assert_eq!(store.upsert_batch(&batch).await?, 0);
        assert_eq!(store.count().await?, 3);
        Ok(())
    }

    #[tokio::test]
    async fn conflicting_row_is_not_overwritten() -> Result<(), Box<dyn std::error::Error>> {
        let store = store().await?;
        store.upsert_batch(&[record(1)]).await?;

        let mut changed = record(1);
        changed.summary = "outra ementa".to_string();
        changed.article_one = ArticleExcerpt::DownloadFailed;
        assert_eq!(store.upsert_batch(&[changed]).await?, 0);

        let stored = store
            .find(&NaturalKey::new("PL", 1, 2024))
            .await?
            .ok_or("row should exist")?;
        assert_eq!(stored, record(1));
        Ok(())
    }

    #[tokio::test]
    async fn exists_checks_the_full_natural_key() -> Result<(), Box<dyn std::error::Error>> {
        let store = store().await?;
        store.upsert_batch(&[record(7)]).await?;

        assert!(store.exists(&NaturalKey::new("PL", 7, 2024)).await?);
        assert!(!store.exists(&NaturalKey::new("PL", 7, 2023)).await?);
        assert!(!store.exists(&NaturalKey::new("PEC", 7, 2024)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn sentinels_and_missing_values_survive_storage() -> Result<(), Box<dyn std::error::Error>> {
        let store = store().await?;
        let bare = Proposition {
            kind: "MPV".to_string(),
            number: 1201,
            year: 2024,
            presented_on: None,
            summary: String::new(),
            article_one: ArticleExcerpt::NoDocument,
            document_url: None,
        };
        store.upsert_batch(std::slice::from_ref(&bare)).await?;

        let stored = store.find(&bare.key()).await?.ok_or("row should exist")?;
        assert_eq!(stored, bare);
        Ok(())
    }

    #[tokio::test]
    async fn closed_pool_is_reported_as_not_ready() -> Result<(), Box<dyn std::error::Error>> {
        let store = store().await?;
        store.pool().close().await;

        let result = store.upsert_batch(&[record(1)]).await;
        assert!(matches!(result, Err(crate::StoreError::NotReady(_))));
        Ok(())
    }

    #[tokio::test]
    async fn empty_batch_touches_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let store = store().await?;
        assert_eq!(store.upsert_batch(&[]).await?, 0);
        store.ensure_schema().await?;
        assert_eq!(store.count().await?, 0);
        Ok(())
    }
}
