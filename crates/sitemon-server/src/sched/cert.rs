//! Periodic certificate refresh cycle.
//!
//! Runs on its own, slower cadence than reachability. The same isolation
//! rules apply: bounded fan-out, one task per target, failures degrade to
//! pending records inside the engine rather than aborting the cycle.

use crate::engine::Engine;
use anyhow::Result;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration};

pub struct CertScheduler {
    engine: Arc<Engine>,
    tick_secs: u64,
    max_concurrent: usize,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl CertScheduler {
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
            "Certificate scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "Certificate cycle failed");
            }
        }
    }

    pub async fn run_cycle(&self) -> Result<()> {
        let targets = self.engine.list_targets()?;
        if targets.is_empty() {
            return Ok(());
        }

        tracing::debug!(count = targets.len(), "Refreshing certificates");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::new();

        for target in targets {
            {
                let mut in_flight = self
                    .in_flight
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if !in_flight.insert(target.url.clone()) {
                    tracing::debug!(url = %target.url, "Previous inspection still in flight, skipping");
                    continue;
                }
            }

            let permit = semaphore.clone().acquire_owned().await?;
            let engine = self.engine.clone();
            let url = target.url.clone();

            let handle = tokio::spawn(async move {
                if let Err(e) = engine.refresh_certificate(&target).await {
                    tracing::error!(url = %target.url, error = %e, "Certificate refresh failed");
                }
                drop(permit);
            });
            handles.push((url, handle));
        }

        for (url, handle) in handles {
            if let Err(e) = handle.await {
                tracing::error!(url = %url, error = %e, "Certificate refresh task panicked");
            }
            self.in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .remove(&url);
        }

        Ok(())
    }
}
