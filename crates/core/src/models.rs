use crate::error::ConfigError;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

pub const NOT_LOCATED_SENTINEL: &str = "Artigo 1º não localizado.";
pub const NO_DOCUMENT_SENTINEL: &str = "Sem PDF";
pub const DOWNLOAD_FAILED_SENTINEL: &str = "Erro no download do PDF.";

/// `(kind, number, year)`, unique across the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    pub kind: String,
    pub number: i32,
    pub year: i32,
}

impl NaturalKey {
    pub fn new(kind: impl Into<String>, number: i32, year: i32) -> Self {
        Self {
            kind: kind.into(),
            number,
            year,
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.number, self.year)
    }
}

fn reference_pattern() -> Result<&'static Regex, regex::Error> {
    static REFERENCE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    REFERENCE
        .get_or_init(|| Regex::new(r"^\s*([A-Za-z]+)\s*(\d+)\s*/\s*(\d{4})\s*$"))
        .as_ref()
        .map_err(Clone::clone)
}

impl FromStr for NaturalKey {
    type Err = ConfigError;

    /// Parses references such as `PL 295/2024` or `pec 3/2023`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidReference(value.to_string());

        let captures = reference_pattern()?.captures(value).ok_or_else(invalid)?;
        let number = captures[2].parse::<i32>().map_err(|_| invalid())?;
        let year = captures[3].parse::<i32>().map_err(|_| invalid())?;
        if number <= 0 {
            return Err(invalid());
        }

        Ok(Self {
            kind: captures[1].to_uppercase(),
            number,
            year,
        })
    }
}

/// Text stored in `artigo_1_trecho`: the excerpt itself or a fixed sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArticleExcerpt {
    Found(String),
    NotLocated,
    NoDocument,
    DownloadFailed,
}

impl ArticleExcerpt {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Found(text) => text,
            Self::NotLocated => NOT_LOCATED_SENTINEL,
            Self::NoDocument => NO_DOCUMENT_SENTINEL,
            Self::DownloadFailed => DOWNLOAD_FAILED_SENTINEL,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

impl From<String> for ArticleExcerpt {
    fn from(stored: String) -> Self {
        match stored.as_str() {
            NOT_LOCATED_SENTINEL => Self::NotLocated,
            NO_DOCUMENT_SENTINEL => Self::NoDocument,
            DOWNLOAD_FAILED_SENTINEL => Self::DownloadFailed,
            _ => Self::Found(stored),
        }
    }
}

impl From<ArticleExcerpt> for String {
    fn from(excerpt: ArticleExcerpt) -> Self {
        match excerpt {
            ArticleExcerpt::Found(text) => text,
            other => other.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposition {
    pub kind: String,
    pub number: i32,
    pub year: i32,
    pub presented_on: Option<NaiveDate>,
    pub summary: String,
    pub article_one: ArticleExcerpt,
    pub document_url: Option<String>,
}

impl Proposition {
    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(self.kind.clone(), self.number, self.year)
    }
}

/// One entry of a listing page (`GET /proposicoes`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropositionSummary {
    pub id: i64,
    #[serde(rename = "siglaTipo")]
    pub kind: String,
    #[serde(rename = "numero")]
    pub number: i32,
    #[serde(rename = "ano")]
    pub year: i32,
}

impl PropositionSummary {
    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(self.kind.clone(), self.number, self.year)
    }
}

/// Detail payload (`GET /proposicoes/{id}`), reduced to what the pipeline keeps.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PropositionDetail {
    #[serde(rename = "ementa", default)]
    pub summary: Option<String>,
    #[serde(rename = "urlInteiroTeor", default)]
    pub document_url: Option<String>,
    #[serde(rename = "dataApresentacao", default)]
    pub presented_at: Option<String>,
}

impl PropositionDetail {
    /// Date part of `dataApresentacao` (`2024-03-12T10:30` -> 2024-03-12).
    pub fn presented_on(&self) -> Option<NaiveDate> {
        let raw = self.presented_at.as_deref()?.trim();
        let date_part = raw.split('T').next().unwrap_or(raw);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }

    pub fn document_url(&self) -> Option<&str> {
        self.document_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub kind: String,
    pub year: i32,
    pub page: u32,
    pub page_size: u32,
    pub sort_field: String,
    pub sort_order: SortOrder,
}

/// How a kind's pagination loop ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    EmptyPage,
    LimitReached,
    RetriesExhausted,
    Cancelled,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::EmptyPage => "empty_page",
            Self::LimitReached => "limit_reached",
            Self::RetriesExhausted => "retries_exhausted",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KindReport {
    pub kind: String,
    /// Items accounted against the limit: already present plus newly enriched.
    pub collected: u64,
    pub inserted: u64,
    pub already_present: u64,
    pub failed_items: u64,
    pub pages: u32,
    pub termination: Termination,
}

impl KindReport {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            collected: 0,
            inserted: 0,
            already_present: 0,
            failed_items: 0,
            pages: 0,
            termination: Termination::EmptyPage,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub year: i32,
    pub kinds: Vec<KindReport>,
}

impl RunReport {
    pub fn total_collected(&self) -> u64 {
        self.kinds.iter().map(|kind| kind.collected).sum()
    }

    pub fn total_inserted(&self) -> u64 {
        self.kinds.iter().map(|kind| kind.inserted).sum()
    }

    pub fn was_cancelled(&self) -> bool {
        self.kinds
            .iter()
            .any(|kind| kind.termination == Termination::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_parses_case_insensitively() {
        let key: NaturalKey = "pl 295/2024".parse().expect("reference should parse");
        assert_eq!(key, NaturalKey::new("PL", 295, 2024));
        assert_eq!(key.to_string(), "PL 295/2024");
    }

    #[test]
    fn reference_rejects_missing_year() {
        assert!("PL 295".parse::<NaturalKey>().is_err());
        assert!("PL 0/2024".parse::<NaturalKey>().is_err());
        assert!("PL 295/24".parse::<NaturalKey>().is_err());
        assert!("PL 99999999999/2024".parse::<NaturalKey>().is_err());
        assert!("P-L 295/2024".parse::<NaturalKey>().is_err());
    }

    #[test]
    fn reference_tolerates_loose_spacing() {
        let key: NaturalKey = "  mpv1201 / 2024 ".parse().expect("reference should parse");
        assert_eq!(key, NaturalKey::new("MPV", 1201, 2024));
    }

    #[test]
    fn sentinels_round_trip_through_stored_text() {
        for excerpt in [
            ArticleExcerpt::NotLocated,
            ArticleExcerpt::NoDocument,
            ArticleExcerpt::DownloadFailed,
        ] {
            let stored = String::from(excerpt.clone());
            assert_eq!(ArticleExcerpt::from(stored), excerpt);
        }

        let found = ArticleExcerpt::from("Art. 1º Fica instituído".to_string());
        assert!(found.is_found());
    }

    #[test]
    fn detail_keeps_only_the_date_part() {
        let detail: PropositionDetail = serde_json::from_value(serde_json::json!({
            "ementa": "Institui normas",
            "urlInteiroTeor": "https://example.org/doc.pdf",
            "dataApresentacao": "2024-03-12T10:30",
            "statusProposicao": {"descricaoSituacao": "Aguardando"}
        }))
        .expect("detail should deserialize");

        assert_eq!(detail.presented_on(), NaiveDate::from_ymd_opt(2024, 3, 12));
        assert_eq!(detail.document_url(), Some("https://example.org/doc.pdf"));
    }

    #[test]
    fn detail_tolerates_missing_fields() {
        let detail: PropositionDetail =
            serde_json::from_value(serde_json::json!({"urlInteiroTeor": null}))
                .expect("detail should deserialize");

        assert_eq!(detail.presented_on(), None);
        assert_eq!(detail.document_url(), None);
        assert_eq!(detail.summary, None);
    }
}
