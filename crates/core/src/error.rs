use thiserror::Error;

/// Failure talking to the catalog API. Always treated as transient by the
/// orchestrator: page-level failures are retried, item-level ones skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("unexpected payload from {url}: {details}")]
    Payload { url: String, details: String },
}

/// Failure while turning a downloaded document into text. Never leaves the
/// extractor: it is folded into `ArticleExcerpt::DownloadFailed`.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{url} exceeds the {limit} byte document cap")]
    TooLarge { url: String, limit: u64 },

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("pdf has no pages")]
    NoPages,

    #[error("render task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<lopdf::Error> for ExtractError {
    fn from(error: lopdf::Error) -> Self {
        Self::PdfParse(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store not available yet: {0}")]
    NotReady(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base url {url}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("no proposition kinds configured")]
    NoKinds,

    #[error("invalid proposition kind {0:?}")]
    InvalidKind(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid proposition reference {0:?}, expected something like \"PL 295/2024\"")]
    InvalidReference(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("database url is missing")]
    MissingDatabaseUrl,

    #[error("unsupported database url scheme: {0}")]
    UnsupportedDatabase(String),

    #[error("http client could not be built: {0}")]
    HttpClient(#[from] reqwest::Error),
}
