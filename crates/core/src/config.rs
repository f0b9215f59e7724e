use crate::error::ConfigError;
use crate::models::SortOrder;
use crate::pacing::PacingPolicy;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://dadosabertos.camara.leg.br/api/v2";
pub const DEFAULT_KINDS: [&str; 3] = ["PL", "PEC", "MPV"];
/// The listing endpoint refuses `itens` above this.
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout for detail calls and document downloads.
    pub request_timeout: Duration,
    pub list_timeout: Duration,
    /// Skips TLS certificate verification for every upstream call.
    pub accept_invalid_certs: bool,
    pub user_agent: String,
    /// Downloads above this size are abandoned.
    pub max_document_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            list_timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
            user_agent: "Mozilla/5.0".to_string(),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

impl HttpConfig {
    pub fn client(&self, timeout: Duration) -> Result<reqwest::Client, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(self.user_agent.clone())
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;
        Ok(client)
    }
}

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub base_url: String,
    pub year: i32,
    pub kinds: Vec<String>,
    /// Per-kind cap on collected items, 0 = unlimited.
    pub limit_per_kind: u64,
    pub page_size: u32,
    pub sort_field: String,
    pub sort_order: SortOrder,
    pub page_delay: Duration,
    pub retry_delay: Duration,
    /// Consecutive failures tolerated on one page, 0 = retry forever.
    pub max_page_retries: u32,
    pub item_concurrency: usize,
    pub http: HttpConfig,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            year: 2024,
            kinds: DEFAULT_KINDS.iter().map(|kind| kind.to_string()).collect(),
            limit_per_kind: 20,
            page_size: 15,
            sort_field: "id".to_string(),
            sort_order: SortOrder::Desc,
            page_delay: Duration::from_millis(1_500),
            retry_delay: Duration::from_secs(5),
            max_page_retries: 0,
            item_concurrency: 1,
            http: HttpConfig::default(),
        }
    }
}

impl IngestionConfig {
    /// Checks everything that can be checked without touching the network.
    /// Kinds are upper-cased in place.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|source| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            source,
        })?;

        if self.kinds.is_empty() {
            return Err(ConfigError::NoKinds);
        }
        for kind in &mut self.kinds {
            let trimmed = kind.trim();
            let valid = !trimmed.is_empty()
                && trimmed.len() <= 10
                && trimmed.chars().all(|ch| ch.is_ascii_alphabetic());
            if !valid {
                return Err(ConfigError::InvalidKind(kind.clone()));
            }
            *kind = trimmed.to_uppercase();
        }

        if !(1000..=9999).contains(&self.year) {
            return Err(ConfigError::InvalidArgument(format!(
                "year must have four digits, got {}",
                self.year
            )));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidArgument(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }

        if self.item_concurrency == 0 {
            return Err(ConfigError::InvalidArgument(
                "item concurrency must be at least 1".to_string(),
            ));
        }

        if self.sort_field.trim().is_empty() {
            return Err(ConfigError::InvalidArgument(
                "sort field is empty".to_string(),
            ));
        }

        if self.http.request_timeout.is_zero() || self.http.list_timeout.is_zero() {
            return Err(ConfigError::InvalidArgument(
                "timeouts must be greater than zero".to_string(),
            ));
        }

        if self.http.max_document_bytes == 0 {
            return Err(ConfigError::InvalidArgument(
                "document size cap must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn limit(&self) -> Option<u64> {
        (self.limit_per_kind > 0).then_some(self.limit_per_kind)
    }

    pub fn pacing_policy(&self) -> PacingPolicy {
        PacingPolicy {
            page_delay: self.page_delay,
            retry_delay: self.retry_delay,
        }
    }
}

/// Parses a comma separated kind list such as `PL,PEC, mpv`.
pub fn parse_kinds(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|kind| !kind.is_empty())
        .map(str::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let mut config = IngestionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limit(), Some(20));
        assert_eq!(config.max_page_retries, 0, "pages retry until they succeed by default");
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let config = IngestionConfig {
            limit_per_kind: 0,
            ..IngestionConfig::default()
        };
        assert_eq!(config.limit(), None);
    }

    #[test]
    fn kinds_are_normalized() {
        let mut config = IngestionConfig {
            kinds: vec![" pl ".to_string(), "Pec".to_string()],
            ..IngestionConfig::default()
        };
        config.validate().expect("kinds should be accepted");
        assert_eq!(config.kinds, vec!["PL", "PEC"]);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let cases = [
            IngestionConfig {
                base_url: "not a url".to_string(),
                ..IngestionConfig::default()
            },
            IngestionConfig {
                kinds: Vec::new(),
                ..IngestionConfig::default()
            },
            IngestionConfig {
                kinds: vec!["P L".to_string()],
                ..IngestionConfig::default()
            },
            IngestionConfig {
                page_size: 0,
                ..IngestionConfig::default()
            },
            IngestionConfig {
                page_size: MAX_PAGE_SIZE + 1,
                ..IngestionConfig::default()
            },
            IngestionConfig {
                item_concurrency: 0,
                ..IngestionConfig::default()
            },
            IngestionConfig {
                year: 24,
                ..IngestionConfig::default()
            },
            IngestionConfig {
                http: HttpConfig {
                    max_document_bytes: 0,
                    ..HttpConfig::default()
                },
                ..IngestionConfig::default()
            },
        ];

        for mut config in cases {
            assert!(config.validate().is_err(), "{config:?} should be rejected");
        }
    }

    #[test]
    fn kind_list_parsing_skips_blanks() {
        assert_eq!(parse_kinds("PL, pec,,MPV "), vec!["PL", "PEC", "MPV"]);
    }
}
