//! Crawl coordination
//!
//! This module wires the pieces of a crawl together, including:
//! - The per-page pipeline: split, normalize, enrich with contacts, store
//! - Building one worker per source with its own session and cursor
//! - Running sources one after another, or side by side when configured
//! - Recording each crawl in the runs table and publishing its status

use crate::config::{Config, QueryEntry, SourceConfig};
use crate::crawler::fetcher::{FetchPolicy, PageFetcher};
use crate::crawler::scheduler::SourceWorker;
use crate::crawler::session::{HttpSessionFactory, SessionFactory};
use crate::extract::extract_contacts;
use crate::normalize::{build_normalizer, Fragment, ListingRecord, Normalizer, ParseOutcome, TaxonomyMatcher};
use crate::output::{RunSummary, SourceCounts, SourceOutcome};
use crate::state::CrawlStatus;
use crate::storage::{Admission, ListingStore, RunStatus, SharedStore, SqliteStorage, StorageResult};
use crate::{HarvestError, Result};
use scraper::Html;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Counts for one processed page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTally {
    /// Listing-sized fragments found on the page
    pub fragments: u64,
    /// Fragments that parsed as listings, new or duplicate
    pub listings: u64,
    pub new: u64,
    pub duplicate: u64,
    pub skipped: u64,
}

/// Turns fetched pages into stored records
///
/// Shared by every source worker of a harvester. Records inserted during the
/// current run are kept in memory for callers.
pub struct Pipeline {
    store: SharedStore,
    records: Mutex<Vec<ListingRecord>>,
}

impl Pipeline {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Forgets the previous run's records and seen keys
    pub fn begin_run(&self) -> StorageResult<()> {
        self.records_guard().clear();
        self.store.clear_seen()
    }

    /// Processes one page of markup
    ///
    /// # Arguments
    ///
    /// * `normalizer` - Splitter and parser for the page's source
    /// * `markup` - Page markup as fetched
    /// * `query` - Search entry that produced the page, if any
    ///
    /// # Returns
    ///
    /// * `Ok(PageTally)` - Fragment, listing, new, duplicate and skipped counts
    /// * `Err(StorageError)` - The store failed; records offered before the
    ///   failure stay stored
    pub fn process_page(
        &self,
        normalizer: &dyn Normalizer,
        markup: &str,
        query: Option<&QueryEntry>,
    ) -> StorageResult<PageTally> {
        let document = Html::parse_document(markup);
        let elements = normalizer.split(&document);

        let mut tally = PageTally {
            fragments: elements.len() as u64,
            ..PageTally::default()
        };

        for element in elements {
            let fragment = Fragment::new(element);

            let mut record = match normalizer.parse(&fragment, query) {
                ParseOutcome::Listing(record) => record,
                ParseOutcome::NotAListing => {
                    tally.skipped += 1;
                    continue;
                }
                ParseOutcome::Excluded(title) => {
                    tracing::debug!(source = normalizer.source_name(), "Excluded: {}", title);
                    tally.skipped += 1;
                    continue;
                }
            };

            tally.listings += 1;
            record.contacts = extract_contacts(fragment.text(), Some(fragment.html()));

            match self.store.offer(&record)? {
                Admission::Inserted => {
                    tracing::debug!(
                        source = normalizer.source_name(),
                        key = %record.identity_key,
                        "New listing: {}",
                        record.title
                    );
                    tally.new += 1;
                    self.records_guard().push(*record);
                }
                Admission::Duplicate => tally.duplicate += 1,
            }
        }

        Ok(tally)
    }

    /// Records inserted so far in the current run
    pub fn records(&self) -> Vec<ListingRecord> {
        self.records_guard().clone()
    }

    fn records_guard(&self) -> MutexGuard<'_, Vec<ListingRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Runs crawls over the configured sources
pub struct Harvester {
    config: Arc<Config>,
    config_hash: String,
    taxonomy: Arc<TaxonomyMatcher>,
    pipeline: Arc<Pipeline>,
    sessions: Arc<dyn SessionFactory>,
    status: CrawlStatus,
}

impl Harvester {
    /// Creates a harvester over an existing store
    ///
    /// Sessions default to plain HTTP with the configured user agent.
    pub fn new(config: Config, store: Box<dyn ListingStore>, config_hash: &str) -> Result<Self> {
        let taxonomy = Arc::new(TaxonomyMatcher::new(&config.taxonomy)?);
        let sessions = Arc::new(HttpSessionFactory::new(config.user_agent.clone()));

        Ok(Self {
            config: Arc::new(config),
            config_hash: config_hash.to_string(),
            taxonomy,
            pipeline: Arc::new(Pipeline::new(SharedStore::new(store))),
            sessions,
            status: CrawlStatus::new(),
        })
    }

    /// Creates a harvester over the configured SQLite database
    pub fn open(config: Config, config_hash: &str) -> Result<Self> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        Self::new(config, Box::new(storage), config_hash)
    }

    /// Replaces the session factory
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionFactory>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle on the crawl status, safe to poll from other tasks
    pub fn status(&self) -> CrawlStatus {
        self.status.clone()
    }

    /// Records inserted by the latest crawl
    pub fn records(&self) -> Vec<ListingRecord> {
        self.pipeline.records()
    }

    pub fn store(&self) -> &SharedStore {
        self.pipeline.store()
    }

    /// Resolves source names, or every configured source when `names` is empty
    pub fn select_sources(&self, names: &[String]) -> Result<Vec<SourceConfig>> {
        if names.is_empty() {
            return Ok(self.config.sources.clone());
        }

        names
            .iter()
            .map(|name| {
                self.config
                    .source(name)
                    .cloned()
                    .ok_or_else(|| HarvestError::UnknownSource(name.clone()))
            })
            .collect()
    }

    /// Crawls every configured source up to the configured page limit
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary> {
        let sources = self.config.sources.clone();
        self.run_crawl(&sources, self.config.crawler.max_pages, cancel)
            .await
    }

    /// Crawls `sources`, at most `max_pages` pages per source segment
    ///
    /// Failures inside a source are counted in its [`SourceCounts`] and never
    /// stop the other sources. Cancelling `cancel` stops every source at the
    /// next page boundary; what was stored so far is kept.
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - Counts for the run and for every source
    /// * `Err(HarvestError::AlreadyRunning)` - Another crawl is in progress
    /// * `Err(HarvestError)` - The runs table could not be written
    pub async fn run_crawl(
        &self,
        sources: &[SourceConfig],
        max_pages: u32,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        if !self
            .status
            .try_begin(format!("Starting crawl of {} source(s)", sources.len()))
        {
            return Err(HarvestError::AlreadyRunning);
        }

        let started = self.pipeline.begin_run().and_then(|()| {
            self.store()
                .with_store(|store| store.create_run(&self.config_hash))
        });
        let run_id = match started {
            Ok(id) => id,
            Err(e) => {
                self.status.finish(format!("Failed to start: {}", e));
                return Err(e.into());
            }
        };

        tracing::info!(run_id, "Starting crawl of {} source(s)", sources.len());

        let summary = if self.config.crawler.parallel_sources {
            self.crawl_parallel(sources, max_pages, &cancel).await
        } else {
            self.crawl_sequential(sources, max_pages, &cancel).await
        };

        let run_status = if summary.cancelled {
            RunStatus::Interrupted
        } else if !summary.per_source.is_empty()
            && summary
                .per_source
                .values()
                .all(|c| matches!(c.outcome, SourceOutcome::Failed { .. }))
        {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };

        let message = format!(
            "Finished ({}): {} new, {} duplicate, {} errors",
            run_status.to_db_string(),
            summary.new_count,
            summary.duplicate_count,
            summary.error_count
        );
        tracing::info!(run_id, "{}", message);

        let ledger = self
            .store()
            .with_store(|store| store.finish_run(run_id, run_status, &summary));
        self.status.finish(message);
        ledger?;

        Ok(summary)
    }

    async fn crawl_sequential(
        &self,
        sources: &[SourceConfig],
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        for source in sources {
            let counts = match self.worker(source, max_pages) {
                Ok(worker) => worker.run(cancel.clone()).await,
                Err(e) => {
                    tracing::error!(source = %source.name, "Could not start source: {}", e);
                    SourceCounts::failed(&source.name, e)
                }
            };
            summary.add_source(counts);
        }

        summary
    }

    async fn crawl_parallel(
        &self,
        sources: &[SourceConfig],
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut handles = Vec::with_capacity(sources.len());

        for source in sources {
            match self.worker(source, max_pages) {
                Ok(worker) => {
                    let handle = tokio::spawn(worker.run(cancel.clone()));
                    handles.push((source.name.clone(), handle));
                }
                Err(e) => {
                    tracing::error!(source = %source.name, "Could not start source: {}", e);
                    summary.add_source(SourceCounts::failed(&source.name, e));
                }
            }
        }

        for (name, handle) in handles {
            let counts = match handle.await {
                Ok(counts) => counts,
                Err(e) => {
                    tracing::error!(source = %name, "Source worker crashed: {}", e);
                    SourceCounts::failed(&name, e)
                }
            };
            summary.add_source(counts);
        }

        summary
    }

    fn worker(&self, source: &SourceConfig, max_pages: u32) -> Result<SourceWorker> {
        let normalizer = build_normalizer(source, Arc::clone(&self.taxonomy))?;
        let session = self.sessions.open(source)?;
        let fetcher = PageFetcher::new(session, FetchPolicy::from(&self.config.fetcher));

        let mut crawler = self.config.crawler.clone();
        crawler.max_pages = max_pages;

        Ok(SourceWorker::new(
            source.clone(),
            crawler,
            PathBuf::from(&self.config.output.diagnostics_dir),
            normalizer,
            fetcher,
            Arc::clone(&self.pipeline),
            self.status.clone(),
        ))
    }
}

/// Runs one crawl of every configured source against the configured database
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Hash of the configuration file, recorded with the run
/// * `cancel` - Cancels the crawl at the next page boundary
///
/// # Returns
///
/// * `Ok(RunSummary)` - Crawl finished or was cancelled
/// * `Err(HarvestError)` - Storage could not be opened or written
pub async fn run_crawl(
    config: Config,
    config_hash: &str,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    Harvester::open(config, config_hash)?.run(cancel).await
}
