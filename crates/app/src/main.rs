use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use legis_ingest_core::{
    parse_kinds, CamaraCatalogClient, DatabaseBackend, FixedDelayPacer, HttpConfig,
    HttpDocumentExtractor, IngestionConfig, IngestionOrchestrator, NaturalKey, PostgresStore,
    PropositionStore, RunReport, SortOrder, SqliteStore, DEFAULT_BASE_URL,
    DEFAULT_MAX_DOCUMENT_BYTES,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "legis-ingest", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Database URL, `postgres://...` or `sqlite:...`
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, enrich and store propositions for every configured kind.
    Ingest(IngestArgs),
    /// Create the propositions table when it does not exist yet.
    InitSchema,
    /// Print a stored proposition as JSON.
    Lookup {
        /// Reference such as "PL 295/2024".
        reference: String,
    },
}

#[derive(Args)]
struct IngestArgs {
    /// Catalog API base URL
    #[arg(long, env = "LEGIS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Presentation year to collect
    #[arg(long, env = "LEGIS_YEAR", default_value_t = 2024)]
    year: i32,

    /// Comma separated proposition kinds
    #[arg(long, env = "LEGIS_KINDS", default_value = "PL,PEC,MPV")]
    kinds: String,

    /// Items collected per kind, 0 for no limit
    #[arg(long, env = "LEGIS_LIMIT", default_value_t = 20)]
    limit: u64,

    #[arg(long, env = "LEGIS_PAGE_SIZE", default_value_t = 15)]
    page_size: u32,

    /// Pause between listing pages, in milliseconds
    #[arg(long, env = "LEGIS_PAGE_DELAY_MS", default_value_t = 1_500)]
    page_delay_ms: u64,

    /// Pause before retrying a failed page, in milliseconds
    #[arg(long, env = "LEGIS_RETRY_DELAY_MS", default_value_t = 5_000)]
    retry_delay_ms: u64,

    /// Consecutive failures tolerated on one page, 0 retries forever
    #[arg(long, env = "LEGIS_MAX_PAGE_RETRIES", default_value_t = 0)]
    max_page_retries: u32,

    /// Timeout for detail calls and PDF downloads, in seconds
    #[arg(long, env = "LEGIS_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    request_timeout_secs: u64,

    /// Timeout for listing calls, in seconds
    #[arg(long, env = "LEGIS_LIST_TIMEOUT_SECS", default_value_t = 30)]
    list_timeout_secs: u64,

    /// Largest PDF downloaded, in bytes
    #[arg(long, env = "LEGIS_MAX_DOCUMENT_BYTES", default_value_t = DEFAULT_MAX_DOCUMENT_BYTES)]
    max_document_bytes: u64,

    /// Items of one page enriched concurrently
    #[arg(long, env = "LEGIS_ITEM_CONCURRENCY", default_value_t = 1)]
    item_concurrency: usize,

    /// Skip TLS certificate verification on upstream calls.
    #[arg(long, env = "LEGIS_ACCEPT_INVALID_CERTS", default_value_t = false)]
    accept_invalid_certs: bool,

    /// Create the table before ingesting.
    #[arg(long, default_value_t = false)]
    ensure_schema: bool,

    /// Print the run report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl IngestArgs {
    fn to_config(&self) -> IngestionConfig {
        IngestionConfig {
            base_url: self.base_url.clone(),
            year: self.year,
            kinds: parse_kinds(&self.kinds),
            limit_per_kind: self.limit,
            page_size: self.page_size,
            sort_field: "id".to_string(),
            sort_order: SortOrder::Desc,
            page_delay: Duration::from_millis(self.page_delay_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_page_retries: self.max_page_retries,
            item_concurrency: self.item_concurrency,
            http: HttpConfig {
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                list_timeout: Duration::from_secs(self.list_timeout_secs),
                accept_invalid_certs: self.accept_invalid_certs,
                max_document_bytes: self.max_document_bytes,
                ..HttpConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let database_url = cli.database_url.unwrap_or_default();
    let backend = DatabaseBackend::from_url(&database_url)?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        backend = ?backend,
        "legis-ingest boot"
    );

    match cli.command {
        Command::Ingest(args) => {
            let mut config = args.to_config();
            config.validate()?;
            if config.http.accept_invalid_certs {
                warn!("TLS certificate verification is disabled for upstream calls");
            }

            let catalog = CamaraCatalogClient::new(&config.base_url, &config.http)?;
            let documents = HttpDocumentExtractor::new(&config.http)?;

            let report = match backend {
                DatabaseBackend::Postgres => {
                    let store = PostgresStore::connect(&database_url).await?;
                    if args.ensure_schema {
                        store.ensure_schema().await?;
                    }
                    ingest(catalog, documents, store, config).await
                }
                DatabaseBackend::Sqlite => {
                    let store = SqliteStore::connect(&database_url).await?;
                    if args.ensure_schema {
                        store.ensure_schema().await?;
                    }
                    ingest(catalog, documents, store, config).await
                }
            };

            print_report(&report, args.json)?;
        }
        Command::InitSchema => {
            match backend {
                DatabaseBackend::Postgres => {
                    PostgresStore::connect(&database_url)
                        .await?
                        .ensure_schema()
                        .await?
                }
                DatabaseBackend::Sqlite => {
                    SqliteStore::connect(&database_url)
                        .await?
                        .ensure_schema()
                        .await?
                }
            }
            println!("schema ready");
        }
        Command::Lookup { reference } => {
            let key: NaturalKey = reference.parse()?;
            let found = match backend {
                DatabaseBackend::Postgres => {
                    PostgresStore::connect(&database_url).await?.find(&key).await?
                }
                DatabaseBackend::Sqlite => {
                    SqliteStore::connect(&database_url).await?.find(&key).await?
                }
            };

            match found {
                Some(proposition) => println!("{}", serde_json::to_string_pretty(&proposition)?),
                None => println!("{key} not found"),
            }
        }
    }

    Ok(())
}

async fn ingest<S>(
    catalog: CamaraCatalogClient,
    documents: HttpDocumentExtractor,
    store: S,
    config: IngestionConfig,
) -> RunReport
where
    S: PropositionStore + Send + Sync,
{
    let pacer = FixedDelayPacer::new(config.pacing_policy());
    let orchestrator = IngestionOrchestrator::new(catalog, documents, store, pacer, config);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing the current page");
            interrupt.cancel();
        }
    });

    orchestrator.run(&cancel).await
}

fn print_report(report: &RunReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for kind in &report.kinds {
        println!(
            "{}: {}/{} new propositions inserted ({} already stored, {} failed, {} pages, {})",
            kind.kind,
            kind.inserted,
            kind.collected,
            kind.already_present,
            kind.failed_items,
            kind.pages,
            kind.termination
        );
    }

    let state = if report.was_cancelled() {
        "interrupted"
    } else {
        "finished"
    };
    println!(
        "ingestion for {} {state} at {}: {} inserted, {} collected",
        report.year,
        Utc::now().to_rfc3339(),
        report.total_inserted(),
        report.total_collected()
    );
    Ok(())
}
