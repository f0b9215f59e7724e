use crate::store::{InsertValues, PropositionRow, INSERT_PREFIX, ON_CONFLICT_SKIP};
use crate::traits::PropositionStore;
use crate::{NaturalKey, Proposition, StoreError};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS proposicoes_legislativas (
    id                SERIAL PRIMARY KEY,
    numero            INTEGER NOT NULL,
    tipo              VARCHAR(10) NOT NULL,
    ano               INTEGER NOT NULL,
    data_apresentacao DATE,
    ementa_resumo     TEXT NOT NULL DEFAULT '',
    artigo_1_trecho   TEXT,
    link_pdf          TEXT,
    criado_em         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT proposicoes_legislativas_chave UNIQUE (tipo, numero, ano)
)
"#;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the table and its unique key when missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PropositionStore for PostgresStore {
    async fn exists(&self, key: &NaturalKey) -> Result<bool, StoreError> {
        let found: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM proposicoes_legislativas WHERE tipo = $1 AND numero = $2 AND ano = $3 LIMIT 1",
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

        let mut builder = QueryBuilder::<Postgres>::new(INSERT_PREFIX);
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
            WHERE tipo = $1 AND numero = $2 AND ano = $3
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
