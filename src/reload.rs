//! Background reload driver.
//!
//! Table reloads and geographic rebuilds run as blocking jobs on the tokio
//! blocking pool, bounded by a semaphore. A failed job is logged and the
//! driver carries on.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::HubOptions;
use crate::hub::{DataHub, ReloadSummary};
use crate::types::ReloadRequest;

/// Schedules table reloads and geographic rebuilds for one [`DataHub`].
pub struct ReloadDriver {
    hub: Arc<DataHub>,
    workers: Arc<Semaphore>,
    table_interval: Duration,
    geo_interval: Duration,
    shutdown: watch::Sender<bool>,
}

impl ReloadDriver {
    pub fn new(hub: Arc<DataHub>, workers: usize, table_interval: Duration, geo_interval: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            hub,
            workers: Arc::new(Semaphore::new(workers.max(1))),
            table_interval,
            geo_interval,
            shutdown,
        }
    }

    pub fn from_options(hub: Arc<DataHub>, options: &HubOptions) -> Self {
        Self::new(
            hub,
            options.reload_workers,
            options.reload_interval(),
            options.geo_reload_interval(),
        )
    }

    pub fn hub(&self) -> &Arc<DataHub> {
        &self.hub
    }

    /// Reload the requested kinds in the background.
    ///
    /// Returns immediately; the handle may be dropped.
    pub fn spawn_reload(&self, request: ReloadRequest) -> JoinHandle<ReloadSummary> {
        let hub = Arc::clone(&self.hub);
        let workers = Arc::clone(&self.workers);
        tokio::spawn(reload_tables(hub, workers, request))
    }

    /// Refresh the catalog and rebuild the geographic sets in the background
    pub fn spawn_geo_reload(&self, force_download: bool) -> JoinHandle<()> {
        let hub = Arc::clone(&self.hub);
        let workers = Arc::clone(&self.workers);
        tokio::spawn(reload_geo(hub, workers, force_download))
    }

    /// Start the periodic table and geographic loops.
    ///
    /// The first reload happens one interval after start; both loops stop
    /// on [`ReloadDriver::shutdown`].
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let tables = {
            let hub = Arc::clone(&self.hub);
            let workers = Arc::clone(&self.workers);
            let mut stop = self.shutdown.subscribe();
            let period = self.table_interval;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval.tick().await;
                loop {
                    tokio::select! {
                        biased;
                        _ = stop.changed() => break,
                        _ = interval.tick() => {
                            let summary = reload_tables(Arc::clone(&hub), Arc::clone(&workers), ReloadRequest::all()).await;
                            log::debug!("scheduled table reload: {:?}", summary);
                        }
                    }
                }
                log::info!("table reload loop stopped");
            })
        };

        let geo = {
            let hub = Arc::clone(&self.hub);
            let workers = Arc::clone(&self.workers);
            let mut stop = self.shutdown.subscribe();
            let period = self.geo_interval;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval.tick().await;
                loop {
                    tokio::select! {
                        biased;
                        _ = stop.changed() => break,
                        _ = interval.tick() => {
                            reload_geo(Arc::clone(&hub), Arc::clone(&workers), false).await;
                        }
                    }
                }
                log::info!("geo reload loop stopped");
            })
        };

        log::info!(
            "reload driver started: tables every {:?}, geo every {:?}",
            self.table_interval,
            self.geo_interval
        );
        vec![tables, geo]
    }

    /// Stop the periodic loops; jobs already running finish
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for ReloadDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn reload_tables(hub: Arc<DataHub>, workers: Arc<Semaphore>, request: ReloadRequest) -> ReloadSummary {
    let mut handles = Vec::new();
    for table in hub.tables_for(&request) {
        let Ok(permit) = Arc::clone(&workers).acquire_owned().await else {
            break;
        };
        let hub = Arc::clone(&hub);
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            hub.reload_table(&table)
        }));
    }

    let mut summary = ReloadSummary::default();
    for handle in handles {
        match handle.await {
            Ok(result) => summary.record(&result),
            Err(e) => {
                log::error!("reload job aborted: {}", e);
                summary.failed += 1;
            }
        }
    }
    if summary.reloaded > 0 || summary.failed > 0 {
        log::info!(
            "reload {:?}: {} reloaded, {} unchanged, {} failed",
            request.kinds(),
            summary.reloaded,
            summary.unchanged,
            summary.failed
        );
    }
    summary
}

async fn reload_geo(hub: Arc<DataHub>, workers: Arc<Semaphore>, force_download: bool) {
    let Ok(permit) = workers.acquire_owned().await else {
        return;
    };
    let job = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        hub.reload_geo(force_download)
    });
    match job.await {
        Ok(Ok(())) => log::info!("geo sets reloaded"),
        Ok(Err(e)) => log::error!("geo reload failed: {}", e),
        Err(e) => log::error!("geo reload job aborted: {}", e),
    }
}
