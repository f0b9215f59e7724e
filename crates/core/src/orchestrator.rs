use crate::config::IngestionConfig;
use crate::pacing::{Pacer, Pause};
use crate::sanitize::sanitize_optional;
use crate::traits::{Catalog, DocumentSource, PropositionStore};
use crate::{
    ArticleExcerpt, FetchError, KindReport, ListQuery, Proposition, PropositionSummary,
    RunReport, StoreError, Termination,
};
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Anything that makes a whole page attempt worth retrying.
#[derive(Debug, Error)]
enum PageError {
    #[error("listing failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Default)]
struct PageOutcome {
    listed: usize,
    already_present: u64,
    enriched: u64,
    failed: u64,
    inserted: u64,
    limit_hit: bool,
}

/// Drives the fetch / filter / enrich / write loop for every configured kind.
pub struct IngestionOrchestrator<C, D, S, P>
where
    C: Catalog,
    D: DocumentSource,
    S: PropositionStore,
    P: Pacer,
{
    catalog: C,
    documents: D,
    store: S,
    pacer: P,
    config: IngestionConfig,
}

impl<C, D, S, P> IngestionOrchestrator<C, D, S, P>
where
    C: Catalog + Send + Sync,
    D: DocumentSource + Send + Sync,
    S: PropositionStore + Send + Sync,
    P: Pacer + Send + Sync,
{
    pub fn new(catalog: C, documents: D, store: S, pacer: P, config: IngestionConfig) -> Self {
        Self {
            catalog,
            documents,
            store,
            pacer,
            config,
        }
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Processes the configured kinds one after the other. A cancelled kind
    /// ends the run; kinds not yet started are left out of the report.
    pub async fn run(&self, cancel: &CancellationToken) -> RunReport {
        let mut report = RunReport {
            year: self.config.year,
            kinds: Vec::with_capacity(self.config.kinds.len()),
        };

        for kind in &self.config.kinds {
            if cancel.is_cancelled() {
                break;
            }

            let kind_report = self.ingest_kind(kind, cancel).await;
            let cancelled = kind_report.termination == Termination::Cancelled;
            report.kinds.push(kind_report);
            if cancelled {
                break;
            }
        }

        info!(
            year = report.year,
            kinds = report.kinds.len(),
            collected = report.total_collected(),
            inserted = report.total_inserted(),
            "ingestion run finished"
        );
        report
    }

    pub async fn ingest_kind(&self, kind: &str, cancel: &CancellationToken) -> KindReport {
        info!(kind, year = self.config.year, "processing kind");

        let limit = self.config.limit();
        let mut report = KindReport::new(kind);
        let mut page = 1u32;
        let mut consecutive_failures = 0u32;

        report.termination = loop {
            if cancel.is_cancelled() {
                break Termination::Cancelled;
            }
            if limit.is_some_and(|limit| report.collected >= limit) {
                break Termination::LimitReached;
            }

            match self.process_page(kind, page, report.collected).await {
                Ok(None) => {
                    debug!(kind, page, "empty page, listing exhausted");
                    break Termination::EmptyPage;
                }
                Ok(Some(outcome)) => {
                    consecutive_failures = 0;
                    report.pages += 1;
                    report.already_present += outcome.already_present;
                    report.collected += outcome.already_present + outcome.enriched;
                    report.failed_items += outcome.failed;
                    report.inserted += outcome.inserted;

                    if outcome.limit_hit {
                        break Termination::LimitReached;
                    }

                    page += 1;
                    if !self.pause(Pause::BetweenPages, cancel).await {
                        break Termination::Cancelled;
                    }
                }
                Err(page_error) => {
                    consecutive_failures += 1;
                    let max = self.config.max_page_retries;
                    if max > 0 && consecutive_failures > max {
                        error!(
                            kind,
                            page,
                            attempts = consecutive_failures,
                            error = %page_error,
                            "page kept failing, giving up on kind"
                        );
                        break Termination::RetriesExhausted;
                    }

                    warn!(
                        kind,
                        page,
                        attempt = consecutive_failures,
                        error = %page_error,
                        "page failed, retrying after backoff"
                    );
                    let pause = Pause::AfterFailure {
                        attempt: consecutive_failures,
                    };
                    if !self.pause(pause, cancel).await {
                        break Termination::Cancelled;
                    }
                }
            }
        };

        info!(
            kind,
            collected = report.collected,
            inserted = report.inserted,
            pages = report.pages,
            failed_items = report.failed_items,
            termination = %report.termination,
            "kind finished"
        );
        report
    }

    /// One attempt at a page. `Ok(None)` signals an empty listing. Counters
    /// only reach the kind report when the whole attempt succeeds.
    async fn process_page(
        &self,
        kind: &str,
        page: u32,
        collected_before: u64,
    ) -> Result<Option<PageOutcome>, PageError> {
        let query = ListQuery {
            kind: kind.to_string(),
            year: self.config.year,
            page,
            page_size: self.config.page_size,
            sort_field: self.config.sort_field.clone(),
            sort_order: self.config.sort_order,
        };

        let items = self.catalog.list_page(&query).await?;
        if items.is_empty() {
            return Ok(None);
        }

        let mut outcome = PageOutcome {
            listed: items.len(),
            ..PageOutcome::default()
        };
        let remaining = self
            .config
            .limit()
            .map(|limit| limit.saturating_sub(collected_before));

        let mut batch = Vec::new();
        let mut pending = items.iter();
        // Failed details free their slot, so refill from the rest of the page
        // until the budget is met or the page runs out.
        loop {
            let mut selected = Vec::new();
            loop {
                let accounted =
                    outcome.already_present + batch.len() as u64 + selected.len() as u64;
                if remaining.is_some_and(|remaining| accounted >= remaining) {
                    break;
                }
                let Some(item) = pending.next() else {
                    break;
                };

                let key = item.key();
                if self.store.exists(&key).await? {
                    debug!(kind, page, item_id = item.id, key = %key, "already stored, skipping");
                    outcome.already_present += 1;
                } else {
                    selected.push(item);
                }
            }
            if selected.is_empty() {
                break;
            }

            let enriched = stream::iter(selected)
                .map(|item| async move { (item, self.enrich(item).await) })
                .buffered(self.config.item_concurrency.max(1))
                .collect::<Vec<_>>()
                .await;

            for (item, result) in enriched {
                match result {
                    Ok(record) => batch.push(record),
                    Err(fetch_error) => {
                        outcome.failed += 1;
                        warn!(
                            kind,
                            page,
                            item_id = item.id,
                            number = item.number,
                            year = item.year,
                            error = %fetch_error,
                            "detail fetch failed, item skipped"
                        );
                    }
                }
            }
        }
        outcome.enriched = batch.len() as u64;

        outcome.inserted = self.store.upsert_batch(&batch).await?;
        outcome.limit_hit = remaining
            .is_some_and(|remaining| outcome.already_present + outcome.enriched >= remaining);

        info!(
            kind,
            page,
            listed = outcome.listed,
            already_present = outcome.already_present,
            enriched = outcome.enriched,
            failed = outcome.failed,
            inserted = outcome.inserted,
            "page processed"
        );
        Ok(Some(outcome))
    }

    async fn enrich(&self, item: &PropositionSummary) -> Result<Proposition, FetchError> {
        let detail = self.catalog.detail(item.id).await?;

        let presented_on = detail.presented_on();
        if presented_on.is_none() {
            if let Some(raw) = detail.presented_at.as_deref() {
                warn!(item_id = item.id, raw, "unparseable presentation date dropped");
            }
        }

        let document_url = detail.document_url().map(str::to_string);
        let article_one = match document_url.as_deref() {
            Some(url) => self.documents.excerpt(url).await,
            None => ArticleExcerpt::NoDocument,
        };

        Ok(Proposition {
            kind: item.kind.clone(),
            number: item.number,
            year: item.year,
            presented_on,
            summary: sanitize_optional(detail.summary.as_deref()),
            article_one,
            document_url,
        })
    }

    /// Returns `false` when the run was cancelled during the pause.
    async fn pause(&self, pause: Pause, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.pacer.pause(pause) => true,
        }
    }
}
