//! Per-source crawl loop
//!
//! A [`SourceWorker`] owns everything one source needs: its normalizer, its
//! page fetcher and session, and its cursor. It walks the source's query
//! segments page by page until the cursor reports done or aborted.

use crate::config::{CrawlerConfig, QueryEntry, SourceConfig};
use crate::crawler::coordinator::Pipeline;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::pacing::{pause, Pacer};
use crate::crawler::source::{segments, PageDescriptor};
use crate::normalize::Normalizer;
use crate::output::{SourceCounts, SourceOutcome};
use crate::state::{AbortReason, CrawlCursor, CrawlStatus, CursorLimits, SourceState, Transition};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Crawls a single source
pub struct SourceWorker {
    source: SourceConfig,
    crawler: CrawlerConfig,
    diagnostics_dir: PathBuf,
    normalizer: Box<dyn Normalizer>,
    fetcher: PageFetcher,
    pipeline: Arc<Pipeline>,
    status: CrawlStatus,
}

/// What happened to one page
enum PageResult {
    Processed { listings: u64, markup: String },
    FetchFailed,
    StoreFailed(String),
}

impl SourceWorker {
    pub fn new(
        source: SourceConfig,
        crawler: CrawlerConfig,
        diagnostics_dir: PathBuf,
        normalizer: Box<dyn Normalizer>,
        fetcher: PageFetcher,
        pipeline: Arc<Pipeline>,
        status: CrawlStatus,
    ) -> Self {
        Self {
            source,
            crawler,
            diagnostics_dir,
            normalizer,
            fetcher,
            pipeline,
            status,
        }
    }

    /// Crawls every segment of the source
    ///
    /// # Page Loop
    ///
    /// For each query segment, starting at page 1:
    /// 1. Stop if cancelled or past `max-pages`
    /// 2. Take the long break if the request budget is spent
    /// 3. Fetch, then split, normalize and store the page; every load sent
    ///    counts against the budget
    /// 4. Let the cursor decide, treating a page without listings as empty:
    ///    next page, same page, segment done, or abort
    /// 5. Wait a random page delay, or the error cooldown after a failure
    ///
    /// Never fails: every problem ends up in the returned counts.
    pub async fn run(mut self, cancel: CancellationToken) -> SourceCounts {
        let limits = CursorLimits::for_source(&self.crawler, &self.source);
        let pacer = Pacer::from_config(&self.crawler);
        let budget_cooldown = Duration::from_millis(self.crawler.budget_cooldown_ms);
        let error_cooldown = Duration::from_millis(self.crawler.error_cooldown_ms);

        let mut counts = SourceCounts::new(&self.source.name);
        let mut cursor = CrawlCursor::new(&self.source.name);
        let segments = segments(&self.source);
        let last_segment = segments.len().saturating_sub(1);

        tracing::info!(
            source = %self.source.name,
            "Crawling {} segment(s), up to {} page(s) each",
            segments.len(),
            self.crawler.max_pages
        );

        'segments: for (index, query) in segments.iter().enumerate() {
            cursor.start_segment(query.as_ref().map(|q| q.term.as_str()));

            loop {
                if cancel.is_cancelled() {
                    cursor.on_cancelled();
                    break 'segments;
                }

                if cursor.page_number > self.crawler.max_pages {
                    cursor.finish();
                    break;
                }

                if cursor.budget_exhausted(&limits) {
                    tracing::info!(
                        source = %self.source.name,
                        "Request budget spent, pausing for {:?}",
                        budget_cooldown
                    );
                    self.status.update(format!(
                        "{}: cooling down for {}s",
                        self.source.name,
                        budget_cooldown.as_secs()
                    ));
                    if !pause(budget_cooldown, &cancel).await {
                        cursor.on_cancelled();
                        break 'segments;
                    }
                    cursor.take_break();
                }

                let page = match PageDescriptor::new(&self.source, query.as_ref(), cursor.page_number) {
                    Ok(page) => page,
                    Err(e) => {
                        tracing::error!(source = %self.source.name, "Bad page URL: {}", e);
                        counts.errors += 1;
                        counts.outcome = SourceOutcome::Failed {
                            error: e.to_string(),
                        };
                        return counts;
                    }
                };

                counts.pages_requested += 1;
                self.status.update(progress_message(&self.source.name, query.as_ref(), page.page_number));

                let fetched = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    result = self.fetcher.fetch(&page) => Some(result),
                };
                cursor.record_requests(self.fetcher.take_request_count());
                let Some(fetched) = fetched else {
                    cursor.on_cancelled();
                    break 'segments;
                };

                let result = match fetched {
                    Ok(fetched) => {
                        match self
                            .pipeline
                            .process_page(self.normalizer.as_ref(), &fetched.markup, query.as_ref())
                        {
                            Ok(tally) => {
                                counts.new += tally.new;
                                counts.duplicate += tally.duplicate;
                                counts.skipped += tally.skipped;
                                tracing::info!(
                                    source = %self.source.name,
                                    page = page.page_number,
                                    "{} fragment(s), {} listing(s): {} new, {} duplicate, {} skipped",
                                    tally.fragments,
                                    tally.listings,
                                    tally.new,
                                    tally.duplicate,
                                    tally.skipped
                                );
                                PageResult::Processed {
                                    listings: tally.listings,
                                    markup: fetched.markup,
                                }
                            }
                            Err(e) => PageResult::StoreFailed(e.to_string()),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(source = %self.source.name, page = page.page_number, "Skipping page: {}", e);
                        counts.errors += 1;
                        PageResult::FetchFailed
                    }
                };

                let (transition, failed) = match result {
                    PageResult::Processed { listings: 0, markup } => {
                        let transition = cursor.on_page_empty(&limits);
                        if transition == Transition::Abort(AbortReason::EmptyFirstPage) {
                            counts.errors += 1;
                            save_snapshot(&self.diagnostics_dir, &page, &markup).await;
                        }
                        (transition, false)
                    }
                    PageResult::Processed { .. } => (cursor.on_page_ok(), false),
                    PageResult::FetchFailed => (cursor.on_page_error(&limits), true),
                    PageResult::StoreFailed(error) => {
                        tracing::error!(source = %self.source.name, "Storage failed: {}", error);
                        counts.errors += 1;
                        counts.outcome = SourceOutcome::Failed { error };
                        return counts;
                    }
                };

                match transition {
                    Transition::Continue | Transition::RetrySamePage => {
                        if cursor.page_number > self.crawler.max_pages && index == last_segment {
                            continue;
                        }
                        let delay = if failed {
                            error_cooldown
                        } else {
                            pacer.next_delay()
                        };
                        if !pause(delay, &cancel).await {
                            cursor.on_cancelled();
                            break 'segments;
                        }
                    }
                    Transition::Done => {
                        tracing::info!(
                            source = %self.source.name,
                            "No more listings after page {}",
                            page.page_number
                        );
                        if index < last_segment && !pause(pacer.next_delay(), &cancel).await {
                            cursor.on_cancelled();
                            break 'segments;
                        }
                        break;
                    }
                    Transition::Abort(reason) => {
                        tracing::error!(source = %self.source.name, "Aborting source: {}", reason);
                        break 'segments;
                    }
                }
            }
        }

        counts.outcome = match cursor.state() {
            SourceState::Running | SourceState::Done => SourceOutcome::Completed,
            SourceState::Aborted(AbortReason::Cancelled) => SourceOutcome::Cancelled,
            SourceState::Aborted(reason) => SourceOutcome::Aborted {
                reason: reason.to_string(),
            },
        };

        tracing::info!(
            source = %self.source.name,
            "Finished: {} new, {} duplicate, {} errors over {} page(s)",
            counts.new,
            counts.duplicate,
            counts.errors,
            counts.pages_requested
        );

        counts
    }
}

/// Saves the markup of an empty first page for inspection
async fn save_snapshot(dir: &Path, page: &PageDescriptor, markup: &str) {
    let path = snapshot_path(dir, page);

    let written = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, markup).await
    };

    match written.await {
        Ok(()) => tracing::warn!(
            source = %page.source_name,
            "Empty first page saved to {}",
            path.display()
        ),
        Err(e) => tracing::warn!(
            source = %page.source_name,
            "Could not save page snapshot to {}: {}",
            path.display(),
            e
        ),
    }
}

fn progress_message(source: &str, query: Option<&QueryEntry>, page: u32) -> String {
    match query {
        Some(query) => format!("{}: \"{}\" page {}", source, query.term.trim(), page),
        None => format!("{}: page {}", source, page),
    }
}

/// `<dir>/<source>[_<query>]_<timestamp>.html`
fn snapshot_path(dir: &Path, page: &PageDescriptor) -> PathBuf {
    let mut name = page.source_name.clone();
    if let Some(query) = &page.query {
        name.push('_');
        name.extend(query.term.trim().chars().map(|c| {
            if c.is_alphanumeric() {
                c
            } else {
                '-'
            }
        }));
    }
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
    dir.join(format!("{}_{}.html", name, stamp))
}
