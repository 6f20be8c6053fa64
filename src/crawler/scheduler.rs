//! Per-source crawl scheduler
//!
//! Each started source gets one background task that runs the engine on a
//! fixed interval until the source is stopped, plus a one-shot task for the
//! immediate first run. Stopping only prevents future ticks; a run already in
//! progress completes. Runs of the same source never overlap.

use crate::config::SourceConfig;
use crate::crawler::engine::{CrawlEngine, RunOptions};
use crate::SchedulerError;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Shortest tick period accepted; a zero period would never yield
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// A configured source and the lock serializing its runs
struct SourceSlot {
    config: SourceConfig,
    gate: tokio::sync::Mutex<()>,
}

/// Registry entry of a started source
#[derive(Debug)]
struct ScheduledSource {
    interval: Duration,
    cancel: CancellationToken,
    is_active: bool,
}

/// Starts and stops periodic crawls, independently per source name
pub struct SourceScheduler {
    engine: CrawlEngine,
    sources: HashMap<String, Arc<SourceSlot>>,
    entries: RwLock<HashMap<String, ScheduledSource>>,
    page_delay: Option<Duration>,
}

impl SourceScheduler {
    /// Creates a scheduler for the given sources; nothing is started yet
    pub fn new(engine: CrawlEngine, sources: impl IntoIterator<Item = SourceConfig>) -> Self {
        let sources = sources
            .into_iter()
            .map(|config| {
                let name = config.name.clone();
                let slot = SourceSlot {
                    config,
                    gate: tokio::sync::Mutex::new(()),
                };
                (name, Arc::new(slot))
            })
            .collect();

        Self {
            engine,
            sources,
            entries: RwLock::new(HashMap::new()),
            page_delay: None,
        }
    }

    /// Overrides the inter-page delay of every scheduled run
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    /// Starts a source on its configured interval
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, name: &str) -> Result<(), SchedulerError> {
        let interval = self
            .sources
            .get(name)
            .map(|slot| slot.config.interval())
            .ok_or_else(|| SchedulerError::UnknownSource(name.to_string()))?;
        self.start_with_interval(name, interval)
    }

    /// Starts a source: one run right away, then one per `interval`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The source is now active
    /// * `Err(SchedulerError::AlreadyRunning)` - The source was already active
    /// * `Err(SchedulerError::UnknownSource)` - No source has this name
    pub fn start_with_interval(&self, name: &str, interval: Duration) -> Result<(), SchedulerError> {
        let slot = self
            .sources
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownSource(name.to_string()))?;

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.get(name).is_some_and(|entry| entry.is_active) {
            return Err(SchedulerError::AlreadyRunning(name.to_string()));
        }

        let interval = interval.max(MIN_INTERVAL);
        let cancel = CancellationToken::new();
        let mut options = RunOptions::for_source(&slot.config);
        options.page_delay = self.page_delay;

        tokio::spawn(run_once(
            self.engine.clone(),
            slot.clone(),
            options.clone(),
            cancel.clone(),
        ));
        tokio::spawn(tick_loop(
            self.engine.clone(),
            slot,
            options,
            interval,
            cancel.clone(),
        ));

        entries.insert(
            name.to_string(),
            ScheduledSource {
                interval,
                cancel,
                is_active: true,
            },
        );

        tracing::info!("Started {} (every {:?})", name, interval);
        Ok(())
    }

    /// Stops future runs of a source
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The source will not be run again
    /// * `Err(SchedulerError::NotRunning)` - The source was not active
    pub fn stop(&self, name: &str) -> Result<(), SchedulerError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(name) {
            Some(entry) if entry.is_active => {
                deactivate(entry);
                tracing::info!("Stopped {}", name);
                Ok(())
            }
            _ => Err(SchedulerError::NotRunning(name.to_string())),
        }
    }

    /// Stops every active source, returning their names in sorted order
    pub fn stop_all(&self) -> Vec<String> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut stopped: Vec<String> = entries
            .iter_mut()
            .filter(|(_, entry)| entry.is_active)
            .map(|(name, entry)| {
                deactivate(entry);
                name.clone()
            })
            .collect();
        stopped.sort();

        if !stopped.is_empty() {
            tracing::info!("Stopped {} sources", stopped.len());
        }
        stopped
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .is_some_and(|entry| entry.is_active)
    }

    /// Names of active sources, sorted
    pub fn list_active(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_active)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Tick period of an active source
    pub fn interval_of(&self, name: &str) -> Option<Duration> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .filter(|entry| entry.is_active)
            .map(|entry| entry.interval)
    }
}

impl Drop for SourceScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn deactivate(entry: &mut ScheduledSource) {
    entry.cancel.cancel();
    entry.is_active = false;
}

async fn run_once(
    engine: CrawlEngine,
    slot: Arc<SourceSlot>,
    options: RunOptions,
    cancel: CancellationToken,
) {
    if cancel.is_cancelled() {
        return;
    }
    run_source(&engine, &slot, &options).await;
}

async fn tick_loop(
    engine: CrawlEngine,
    slot: Arc<SourceSlot>,
    options: RunOptions,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => run_source(&engine, &slot, &options).await,
        }
    }

    tracing::debug!("Ticker for {} finished", slot.config.name);
}

async fn run_source(engine: &CrawlEngine, slot: &SourceSlot, options: &RunOptions) {
    let _guard = slot.gate.lock().await;
    let result = engine.run(&slot.config, options).await;
    if result.has_errors() {
        tracing::warn!(
            "Scheduled run of {} finished with {} errors",
            slot.config.name,
            result.errors.len()
        );
    }
}
