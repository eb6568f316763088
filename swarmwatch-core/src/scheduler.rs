// Drives extract -> relay -> render on a timer for the lifetime of the page.
//
// Everything here runs on one thread: cycles are spawned with `spawn_local`
// and must be driven from inside a `tokio::task::LocalSet`.

use crate::config::ScanConfig;
use crate::relay::{RelayHandle, TransportError};
use crate::render::{self, RenderSummary};
use futures::future::join_all;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use swarmwatch_scanner::{AdapterRegistry, ExtractOptions, Extraction, Extractor, Page};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Unsupported host; nothing to do.
    NoAdapter,
    /// Nothing unscanned and long enough on the page.
    Idle,
    /// Another cycle was still in flight (single-flight mode only).
    Skipped,
    /// The relay failed or went away; the batch is dropped.
    Failed(TransportError),
    Rendered(RenderSummary),
}

/// Called once per finished cycle.
pub type CycleCallback = Rc<dyn Fn(&CycleOutcome)>;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub initial_delay: Duration,
    pub interval: Duration,
    /// Skip a tick while an earlier cycle is still waiting on the relay.
    pub single_flight: bool,
    pub extract: ExtractOptions,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

impl From<&ScanConfig> for SchedulerConfig {
    fn from(config: &ScanConfig) -> Self {
        Self {
            initial_delay: config.initial_delay(),
            interval: config.interval(),
            single_flight: config.single_flight,
            extract: config.extract_options(),
        }
    }
}

#[derive(Clone)]
pub struct ScanScheduler {
    page: Rc<RefCell<Page>>,
    registry: Rc<AdapterRegistry>,
    relay: RelayHandle,
    extractor: Extractor,
    config: SchedulerConfig,
    in_flight: Rc<Cell<usize>>,
    callback: Option<CycleCallback>,
}

/// Holds one slot of the in-flight count; released on drop, including when
/// the cycle's task is aborted mid-await.
struct InFlightGuard(Rc<Cell<usize>>);

impl InFlightGuard {
    fn enter(counter: &Rc<Cell<usize>>) -> Self {
        counter.set(counter.get() + 1);
        Self(counter.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl ScanScheduler {
    pub fn new(
        page: Rc<RefCell<Page>>,
        registry: Rc<AdapterRegistry>,
        relay: RelayHandle,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            page,
            registry,
            relay,
            extractor: Extractor::new(config.extract),
            config,
            in_flight: Rc::new(Cell::new(0)),
            callback: None,
        }
    }

    pub fn with_cycle_callback(mut self, callback: CycleCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn page(&self) -> Rc<RefCell<Page>> {
        self.page.clone()
    }

    /// Cycles currently waiting on the relay.
    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    /// One extract -> relay -> render pass.
    ///
    /// The identity map built by this pass's extraction is the only one its
    /// results are ever rendered with.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let extraction = {
            let page = self.page.borrow();
            let Some(adapter) = self.registry.resolve(page.host()) else {
                debug!("No adapter for {}, skipping cycle", page.host());
                return CycleOutcome::NoAdapter;
            };
            self.extractor.extract(&page, Some(adapter))
        };

        if extraction.is_empty() {
            debug!("No unscanned comments this cycle");
            return CycleOutcome::Idle;
        }

        let Extraction { records, identity } = extraction;
        let batch_size = records.len();
        debug!("Sending {} comments to the relay", batch_size);

        let results = match self.relay.analyze(records).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Cycle abandoned ({} comments): {}", batch_size, e);
                return CycleOutcome::Failed(e);
            }
        };

        let mut page = self.page.borrow_mut();
        let Some(adapter) = self.registry.resolve(page.host()) else {
            return CycleOutcome::NoAdapter;
        };
        let summary = render::render(&mut page, adapter, results, identity);
        info!(
            "Cycle complete: {} annotated, {} stale, {} already scanned",
            summary.rendered, summary.stale, summary.already_scanned
        );
        CycleOutcome::Rendered(summary)
    }

    async fn tick(&self) -> CycleOutcome {
        let outcome = if self.config.single_flight && self.in_flight.get() > 0 {
            debug!("Previous cycle still in flight, skipping tick");
            CycleOutcome::Skipped
        } else {
            let _guard = InFlightGuard::enter(&self.in_flight);
            self.run_cycle().await
        };

        if let Some(callback) = &self.callback {
            callback(&outcome);
        }
        outcome
    }

    /// Starts a cycle without waiting for it. Cycles may overlap.
    pub fn spawn_cycle(&self) -> JoinHandle<CycleOutcome> {
        let scheduler = self.clone();
        tokio::task::spawn_local(async move { scheduler.tick().await })
    }

    /// First cycle after `initial_delay`, then one every `interval` counted from
    /// the start, until `limit` cycles have been started (or forever).
    async fn schedule(&self, limit: Option<usize>) -> Vec<JoinHandle<CycleOutcome>> {
        let start = Instant::now();
        let mut ticker = time::interval_at(start + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut handles = Vec::new();
        if limit == Some(0) {
            return handles;
        }

        time::sleep_until(start + self.config.initial_delay).await;
        handles.push(self.spawn_cycle());

        while limit.is_none_or(|limit| handles.len() < limit) {
            ticker.tick().await;
            let handle = self.spawn_cycle();
            if limit.is_some() {
                handles.push(handle);
            }
        }
        handles
    }

    /// Scans for as long as the page lives. Never returns.
    pub async fn run(&self) {
        info!(
            "Scanning every {:?} after an initial {:?}",
            self.config.interval, self.config.initial_delay
        );
        self.schedule(None).await;
    }

    /// Runs `cycles` scheduled cycles and waits for all of them to settle.
    pub async fn run_cycles(&self, cycles: usize) -> Vec<CycleOutcome> {
        let handles = self.schedule(Some(cycles)).await;
        join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!("Cycle task failed: {}", e);
                    None
                }
            })
            .collect()
    }
}
