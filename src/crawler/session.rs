//! Crawl session - main crawl orchestration logic
//!
//! The session is the single owner of the task queue, the robots.txt cache,
//! the report counters and the record sink. Workers only fetch and extract;
//! each one hands its outcome back to the session loop, which decides what
//! to enqueue next.
//!
//! The loop:
//! 1. Dispatches queued tasks while fewer than `max-concurrent-requests` are in flight
//!    and the download delay has elapsed (robots.txt is checked here)
//! 2. Waits for a worker to finish, a shutdown request, or the next dispatch slot
//! 3. Routes listing outcomes back into the queue and detail outcomes to the sink
//! 4. Ends once the queue is empty and no worker is in flight

use crate::config::Config;
use crate::crawler::detail::{DetailRules, Extraction};
use crate::crawler::fetcher::{fetch_with_retry, FetchFailure, HttpTransport, RetryPolicy, Transport};
use crate::crawler::listing::{ListingPage, ListingRules};
use crate::crawler::task::{FetchTask, Stage};
use crate::output::{open_sink, write_markdown_report, CrawlReport, RecordSink};
use crate::robots::RobotsCache;
use crate::url::{parse_seed, DomainPolicy};
use crate::MarqueeError;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

/// Progress is logged after this many completed tasks
const PROGRESS_INTERVAL: u64 = 25;

/// Requested shutdown level; only ever escalates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownSignal {
    Running,
    /// Stop dispatching, let in-flight fetches finish
    Stop,
    /// Stop dispatching and cancel in-flight fetches
    Abort,
}

/// Cloneable handle for stopping a running session from elsewhere
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<ShutdownSignal>>,
}

impl ShutdownHandle {
    /// Stops issuing new fetches; in-flight ones drain normally
    pub fn stop(&self) {
        self.escalate(ShutdownSignal::Stop);
    }

    /// Stops issuing new fetches and abandons in-flight ones
    pub fn abort(&self) {
        self.escalate(ShutdownSignal::Abort);
    }

    pub fn signal(&self) -> ShutdownSignal {
        *self.tx.borrow()
    }

    fn escalate(&self, to: ShutdownSignal) {
        self.tx.send_modify(|current| {
            if to > *current {
                *current = to;
            }
        });
    }
}

/// What a worker found at its URL
#[derive(Debug)]
enum TaskOutcome {
    Listing { task: FetchTask, page: ListingPage },
    Detail { task: FetchTask, extraction: Extraction },
    Failed { task: FetchTask, failure: FetchFailure },
}

#[derive(Debug)]
struct WorkerResult {
    outcome: TaskOutcome,
    retries: u32,
}

/// One crawl, from seed to drained queue
pub struct CrawlSession {
    seed: Url,
    policy: DomainPolicy,
    listing_rules: Arc<ListingRules>,
    detail_rules: Arc<DetailRules>,
    transport: Arc<dyn Transport>,
    sink: Box<dyn RecordSink>,
    robots: Option<RobotsCache>,
    retry: RetryPolicy,
    max_concurrent: usize,
    download_delay: Duration,
    max_records: u64,
    report_path: Option<PathBuf>,
    shutdown_tx: Arc<watch::Sender<ShutdownSignal>>,
    shutdown_rx: watch::Receiver<ShutdownSignal>,
}

impl CrawlSession {
    /// Creates a session over an explicit transport and sink
    ///
    /// Fails if the seed URL is invalid or outside the allowed domains, or if
    /// a selector does not compile.
    pub fn new(
        config: &Config,
        transport: Arc<dyn Transport>,
        sink: Box<dyn RecordSink>,
    ) -> Result<Self, MarqueeError> {
        let crawler = &config.crawler;

        let seed = parse_seed(&crawler.seed_url)?;
        let policy = DomainPolicy::new(crawler.allowed_domains.clone());
        if !policy.allows(&seed) {
            return Err(MarqueeError::SeedOffsite {
                url: seed.to_string(),
            });
        }

        let listing_rules = ListingRules::compile(&config.selectors.listing)?;
        let detail_rules = DetailRules::compile(&config.selectors.detail)?;

        let robots = crawler
            .obey_robots
            .then(|| RobotsCache::new(&config.user_agent.crawler_name));

        let (tx, rx) = watch::channel(ShutdownSignal::Running);

        Ok(Self {
            seed,
            policy,
            listing_rules: Arc::new(listing_rules),
            detail_rules: Arc::new(detail_rules),
            transport,
            sink,
            robots,
            retry: RetryPolicy::new(crawler.max_retries, Duration::from_millis(crawler.retry_delay)),
            max_concurrent: crawler.max_concurrent_requests.max(1) as usize,
            download_delay: Duration::from_millis(crawler.download_delay),
            max_records: crawler.max_records,
            report_path: config.output.report_path.as_ref().map(PathBuf::from),
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        })
    }

    /// Creates a session with the HTTP transport and the configured sink
    pub fn from_config(config: &Config, config_hash: &str, fresh: bool) -> Result<Self, MarqueeError> {
        let transport = HttpTransport::new(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout),
            DomainPolicy::new(config.crawler.allowed_domains.clone()),
        )?;
        let sink = open_sink(&config.output, &config.crawler.seed_url, config_hash, fresh)?;

        Self::new(config, Arc::new(transport), sink)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Runs the crawl to completion and returns its report
    ///
    /// Per-task failures are counted, never returned. Errors come only from
    /// finishing the sink or writing the markdown report.
    pub async fn run(mut self) -> Result<CrawlReport, MarqueeError> {
        let started = Instant::now();
        let mut report = CrawlReport::new(self.seed.as_str());

        tracing::info!(
            "Starting crawl at {} (concurrency {}, robots.txt {})",
            self.seed,
            self.max_concurrent,
            if self.robots.is_some() { "on" } else { "off" }
        );

        let mut queue = VecDeque::from([FetchTask::listing(self.seed.clone(), 1)]);
        let mut workers: JoinSet<WorkerResult> = JoinSet::new();
        let mut shutdown = self.shutdown_rx.clone();
        let mut state = ShutdownSignal::Running;
        let mut next_dispatch = tokio::time::Instant::now();
        let mut completed: u64 = 0;

        loop {
            let requested = *shutdown.borrow_and_update();
            if requested > state {
                self.enter_shutdown(requested, &mut state, &mut queue, &mut workers, &mut report);
            }

            while state == ShutdownSignal::Running
                && workers.len() < self.max_concurrent
                && !queue.is_empty()
                && tokio::time::Instant::now() >= next_dispatch
            {
                let Some(task) = queue.pop_front() else {
                    break;
                };

                if !self.admit(&task, &mut report).await {
                    continue;
                }

                if !self.download_delay.is_zero() {
                    next_dispatch = tokio::time::Instant::now() + self.download_delay;
                }

                tracing::debug!("Dispatching {}", task);
                self.spawn_worker(&mut workers, task);
            }

            let awaiting_slot = state == ShutdownSignal::Running
                && workers.len() < self.max_concurrent
                && !queue.is_empty();

            if workers.is_empty() && !awaiting_slot {
                break;
            }

            tokio::select! {
                changed = shutdown.changed(), if state != ShutdownSignal::Abort => {
                    if changed.is_err() {
                        tracing::debug!("Shutdown channel closed");
                    }
                }
                _ = tokio::time::sleep_until(next_dispatch), if awaiting_slot => {}
                joined = workers.join_next(), if !workers.is_empty() => {
                    let Some(joined) = joined else {
                        continue;
                    };
                    completed += 1;

                    match joined {
                        Ok(result) => {
                            report.retries += u64::from(result.retries);
                            self.handle_outcome(result.outcome, state, &mut queue, &mut report);
                        }
                        Err(e) if e.is_cancelled() => {
                            report.abandoned_tasks += 1;
                        }
                        Err(e) => {
                            tracing::error!("Worker panicked: {}", e);
                            report.abandoned_tasks += 1;
                        }
                    }

                    if self.max_records > 0
                        && report.records_emitted >= self.max_records
                        && state == ShutdownSignal::Running
                    {
                        tracing::info!("Reached record limit of {}, stopping", self.max_records);
                        self.enter_shutdown(
                            ShutdownSignal::Stop,
                            &mut state,
                            &mut queue,
                            &mut workers,
                            &mut report,
                        );
                    }

                    if completed % PROGRESS_INTERVAL == 0 {
                        tracing::info!(
                            "Progress: {} listing pages, {} detail pages, {} records, {} queued, {} in flight",
                            report.listing_pages_fetched,
                            report.detail_pages_fetched,
                            report.records_emitted,
                            queue.len(),
                            workers.len()
                        );
                    }
                }
            }
        }

        report.elapsed = started.elapsed();

        if let Err(e) = self.sink.finish(&report) {
            tracing::error!("Failed to finish output: {}", e);
            return Err(e.into());
        }

        if let Some(path) = &self.report_path {
            write_markdown_report(&report, path)?;
            tracing::info!("Report written to {}", path.display());
        }

        tracing::info!(
            "Crawl finished: {} records from {} listing pages in {:?}",
            report.records_emitted,
            report.listing_pages_fetched,
            report.elapsed
        );

        Ok(report)
    }

    fn enter_shutdown(
        &self,
        requested: ShutdownSignal,
        state: &mut ShutdownSignal,
        queue: &mut VecDeque<FetchTask>,
        workers: &mut JoinSet<WorkerResult>,
        report: &mut CrawlReport,
    ) {
        *state = requested;
        report.stopped_early = true;
        report.abandoned_tasks += queue.len() as u64;
        queue.clear();

        match requested {
            ShutdownSignal::Abort => {
                tracing::warn!("Aborting crawl, cancelling {} in-flight fetches", workers.len());
                workers.abort_all();
            }
            ShutdownSignal::Stop => {
                tracing::info!("Stopping crawl, draining {} in-flight fetches", workers.len());
            }
            ShutdownSignal::Running => {}
        }
    }

    /// Robots.txt check before dispatch
    async fn admit(&mut self, task: &FetchTask, report: &mut CrawlReport) -> bool {
        let Some(robots) = self.robots.as_mut() else {
            return true;
        };

        if robots.is_allowed(self.transport.as_ref(), &task.url).await {
            true
        } else {
            tracing::warn!("Disallowed by robots.txt: {}", task.url);
            report.robots_denied += 1;
            false
        }
    }

    fn spawn_worker(&self, workers: &mut JoinSet<WorkerResult>, task: FetchTask) {
        let transport = Arc::clone(&self.transport);
        let listing_rules = Arc::clone(&self.listing_rules);
        let detail_rules = Arc::clone(&self.detail_rules);
        let policy = self.policy.clone();
        let retry = self.retry;

        workers.spawn(async move {
            let fetched = fetch_with_retry(transport.as_ref(), &task.url, &retry).await;

            let outcome = match fetched.result {
                // Transports that follow redirects on their own can still land offsite
                Ok(page) if !policy.allows(&page.final_url) => TaskOutcome::Failed {
                    failure: FetchFailure::OffsiteRedirect {
                        location: page.final_url.to_string(),
                    },
                    task,
                },
                Ok(page) if !page.is_html() => TaskOutcome::Failed {
                    failure: FetchFailure::ContentMismatch {
                        content_type: page.content_type.unwrap_or_default(),
                    },
                    task,
                },
                Ok(page) => match task.stage {
                    Stage::Listing => {
                        let listing = listing_rules.walk(&page.body, &page.final_url, task.listing_page);
                        TaskOutcome::Listing {
                            task,
                            page: listing,
                        }
                    }
                    Stage::Detail => TaskOutcome::Detail {
                        extraction: detail_rules.extract(&page.body),
                        task,
                    },
                },
                Err(failure) => TaskOutcome::Failed { task, failure },
            };

            WorkerResult {
                outcome,
                retries: fetched.retries,
            }
        });
    }

    fn handle_outcome(
        &mut self,
        outcome: TaskOutcome,
        state: ShutdownSignal,
        queue: &mut VecDeque<FetchTask>,
        report: &mut CrawlReport,
    ) {
        match outcome {
            TaskOutcome::Listing { task, page } => {
                report.listing_pages_fetched += 1;

                if page.is_empty() {
                    tracing::warn!(
                        "Listing page {} matched no item headers, treating as end of listing: {}",
                        task.listing_page,
                        task.url
                    );
                    report.suspected_drift += 1;
                } else {
                    tracing::debug!(
                        "Listing page {} yielded {} detail links{}",
                        task.listing_page,
                        page.detail_tasks.len(),
                        if page.next_page.is_some() {
                            " and a next page"
                        } else {
                            ""
                        }
                    );
                }

                for follow_up in page.into_tasks() {
                    if state != ShutdownSignal::Running {
                        report.abandoned_tasks += 1;
                    } else if !self.policy.allows(&follow_up.url) {
                        tracing::debug!("Dropping offsite link {}", follow_up.url);
                        report.offsite_dropped += 1;
                    } else {
                        queue.push_back(follow_up);
                    }
                }
            }

            TaskOutcome::Detail { task, extraction } => {
                report.detail_pages_fetched += 1;

                if self.max_records > 0 && report.records_emitted >= self.max_records {
                    tracing::debug!("Record limit reached, discarding {}", task.url);
                    report.abandoned_tasks += 1;
                    return;
                }

                for error in &extraction.errors {
                    tracing::warn!("Partial extraction for {}: {}", task.url, error);
                }
                report.extraction_failures += extraction.errors.len() as u64;

                match self.sink.write_record(&task.url, &extraction.record) {
                    Ok(()) => report.records_emitted += 1,
                    Err(e) => {
                        tracing::error!("Failed to store record for {}: {}", task.url, e);
                        report.sink_failures += 1;
                    }
                }
            }

            TaskOutcome::Failed {
                task,
                failure: FetchFailure::OffsiteRedirect { location },
            } => {
                tracing::debug!("Dropping {} redirected offsite to {}", task.url, location);
                report.offsite_dropped += 1;
            }

            TaskOutcome::Failed { task, failure } => {
                tracing::warn!("Fetch failed for {}: {}", task, failure);
                report.record_failure(failure.kind());
            }
        }
    }
}
