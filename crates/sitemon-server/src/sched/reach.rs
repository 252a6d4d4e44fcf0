//! Periodic reachability recheck cycle.
//!
//! Every tick, the full registry is rechecked with bounded fan-out. Each
//! target runs in its own task, so one hanging or failing host never
//! stalls the rest of the cycle. A target whose previous check is still
//! in flight when it comes due again is skipped, not queued.

use crate::engine::Engine;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration};

pub struct ReachScheduler {
    engine: Arc<Engine>,
    tick_secs: u64,
    max_concurrent: usize,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ReachScheduler {
    pub fn new(engine: Arc<Engine>, tick_secs: u64, max_concurrent: usize) -> Self {
        Self {
            engine,
            tick_secs,
            max_concurrent,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            tick_secs = self.tick_secs,
            max_concurrent = self.max_concurrent,
            "Reachability scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "Reachability cycle failed");
            }
        }
    }

    /// One full pass over the registry.
    pub async fn run_cycle(&self) -> Result<()> {
        let targets = self.engine.list_targets()?;
        if targets.is_empty() {
            return Ok(());
        }

        tracing::debug!(count = targets.len(), "Rechecking targets");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::new();

        for target in targets {
            {
                let mut in_flight = self
                    .in_flight
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if !in_flight.insert(target.url.clone()) {
                    tracing::debug!(url = %target.url, "Previous check still in flight, skipping");
                    continue;
                }
            }

            let permit = semaphore.clone().acquire_owned().await?;
            let engine = self.engine.clone();
            let url = target.url.clone();

            let handle = tokio::spawn(async move {
                if let Err(e) = engine.recheck_target(&url).await {
                    tracing::error!(url = %url, error = %e, "Reachability recheck failed");
                }
                drop(permit);
            });
            handles.push((target.url, handle));
        }

        for (url, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!(url = %url, error = %e, "Reachability check task panicked");
            }
            self.in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .remove(&url);
        }

        Ok(())
    }
}
