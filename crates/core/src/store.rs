use crate::models::{ArticleExcerpt, Proposition};
use chrono::NaiveDate;
use sqlx::FromRow;

/// Column order shared by every INSERT.
pub const INSERT_PREFIX: &str = "INSERT INTO proposicoes_legislativas \
     (numero, tipo, ano, data_apresentacao, ementa_resumo, artigo_1_trecho, link_pdf) ";

pub const ON_CONFLICT_SKIP: &str = " ON CONFLICT (tipo, numero, ano) DO NOTHING";

#[derive(Debug, Clone, FromRow)]
pub struct PropositionRow {
    pub tipo: String,
    pub numero: i32,
    pub ano: i32,
    pub data_apresentacao: Option<NaiveDate>,
    pub ementa_resumo: Option<String>,
    pub artigo_1_trecho: Option<String>,
    pub link_pdf: Option<String>,
}

impl From<PropositionRow> for Proposition {
    fn from(row: PropositionRow) -> Self {
        Self {
            kind: row.tipo,
            number: row.numero,
            year: row.ano,
            presented_on: row.data_apresentacao,
            summary: row.ementa_resumo.unwrap_or_default(),
            article_one: row
                .artigo_1_trecho
                .map(ArticleExcerpt::from)
                .unwrap_or(ArticleExcerpt::NoDocument),
            document_url: row.link_pdf,
        }
    }
}

/// Bound values of one row, in `INSERT_PREFIX` column order.
pub(crate) struct InsertValues {
    pub numero: i32,
    pub tipo: String,
    pub ano: i32,
    pub data_apresentacao: Option<NaiveDate>,
    pub ementa_resumo: String,
    pub artigo_1_trecho: String,
    pub link_pdf: Option<String>,
}

impl From<&Proposition> for InsertValues {
    fn from(record: &Proposition) -> Self {
        Self {
            numero: record.number,
            tipo: record.kind.clone(),
            ano: record.year,
            data_apresentacao: record.presented_on,
            ementa_resumo: record.summary.clone(),
            artigo_1_trecho: record.article_one.as_str().to_string(),
            link_pdf: record.document_url.clone(),
        }
    }
}
