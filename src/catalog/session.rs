//! The loading session: owns the catalog and applies fetch completions.
//!
//! All catalog writes happen on the session task, one completion at a time,
//! and are published as whole [`CatalogSnapshot`]s over a watch channel.

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Catalog, CatalogSnapshot, FetchToken};
use crate::cache::CacheGate;
use crate::config::DatasetConfig;
use crate::models::Dataset;
use crate::source::DatasetSource;

enum SessionCommand {
    Refresh {
        key: String,
        reply: oneshot::Sender<bool>,
    },
}

/// Owned session driving the initial load and later refreshes
pub struct Session<S> {
    catalog: Catalog,
    gate: Arc<CacheGate<S>>,
    commands: mpsc::Receiver<SessionCommand>,
    snapshots: watch::Sender<Arc<CatalogSnapshot>>,
    shutdown: CancellationToken,
}

/// Cheap handle used by readers and by the host surface
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<Arc<CatalogSnapshot>>,
    shutdown: CancellationToken,
}

impl<S: DatasetSource + 'static> Session<S> {
    pub fn init(catalog: Catalog, gate: Arc<CacheGate<S>>) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(catalog.snapshot()));
        let shutdown = CancellationToken::new();

        let session = Self {
            catalog,
            gate,
            commands: command_rx,
            snapshots: snapshot_tx,
            shutdown: shutdown.clone(),
        };
        let handle = SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            shutdown,
        };
        (session, handle)
    }

    /// Load every dataset, then serve refresh requests until disposed.
    pub async fn run(mut self) {
        let mut in_flight = FuturesUnordered::new();

        let keys: Vec<String> = self.catalog.datasets().iter().map(|d| d.key.clone()).collect();
        info!("Loading {} datasets...", keys.len());
        for key in keys {
            if let Some(job) = self.start(&key, false) {
                in_flight.push(job);
            }
        }

        let mut accepting = true;

        loop {
            if !accepting && in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Session disposed");
                    break;
                }

                Some((token, dataset)) = in_flight.next(), if !in_flight.is_empty() => {
                    if self.catalog.apply(&token, dataset) {
                        self.publish();
                    }
                }

                command = self.commands.recv(), if accepting => match command {
                    Some(SessionCommand::Refresh { key, reply }) => {
                        let job = self.start(&key, true);
                        let accepted = job.is_some();
                        if let Some(job) = job {
                            in_flight.push(job);
                        } else {
                            warn!("Refresh requested for unknown dataset '{}'", key);
                        }
                        let _ = reply.send(accepted);
                    }
                    None => {
                        debug!("All session handles dropped");
                        accepting = false;
                    }
                },
            }
        }
    }

    fn start(&mut self, key: &str, refresh: bool) -> Option<FetchJob> {
        let token = self.catalog.begin_fetch(key)?;
        let dataset = self.catalog.dataset(key)?.clone();
        Some(fetch_dataset(
            Arc::clone(&self.gate),
            dataset,
            token,
            refresh,
        ))
    }

    fn publish(&self) {
        self.snapshots.send_replace(Arc::new(self.catalog.snapshot()));
    }
}

type FetchJob = BoxFuture<'static, (FetchToken, Dataset)>;

fn fetch_dataset<S: DatasetSource + 'static>(
    gate: Arc<CacheGate<S>>,
    dataset: DatasetConfig,
    token: FetchToken,
    refresh: bool,
) -> FetchJob {
    async move {
        let loaded = if refresh {
            gate.refresh(&dataset).await
        } else {
            gate.load(&dataset).await
        };
        (token, loaded)
    }
    .boxed()
}

impl SessionHandle {
    pub fn subscribe(&self) -> watch::Receiver<Arc<CatalogSnapshot>> {
        self.snapshots.clone()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Wait until every dataset completed its first fetch
    pub async fn wait_loaded(&self) -> Option<Arc<CatalogSnapshot>> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx.wait_for(|s| !s.loading).await.ok()?;
        Some(Arc::clone(&snapshot))
    }

    /// Refetch one dataset. Returns `false` for unknown datasets or a closed
    /// session.
    pub async fn refresh(&self, key: &str) -> bool {
        let (reply, response) = oneshot::channel();
        let command = SessionCommand::Refresh {
            key: key.to_string(),
            reply,
        };
        if self.commands.send(command).await.is_err() {
            return false;
        }
        response.await.unwrap_or(false)
    }

    pub fn dispose(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{record, DatasetCache, FakeSource};
    use crate::config::Config;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    const CONFIG: &str = r#"
        [source]
        base_url = "http://localhost:8080"

        [[datasets]]
        key = "municipal_health_units"
        endpoint = "/api/municipal-health-units"
        cache_key = "municipal_health_units_cache"

        [[datasets]]
        key = "squares"
        endpoint = "/api/squares"
        cache_key = "squares_cache"

        [[categories]]
        name = "hospital"
        datasets = ["municipal_health_units"]
    "#;

    fn spawn_session(source: FakeSource) -> SessionHandle {
        let config = Config::from_toml_str(CONFIG).unwrap();
        let catalog = Catalog::new(&config).unwrap();
        let gate = Arc::new(CacheGate::new(source, DatasetCache::temporary().unwrap()));
        let (session, handle) = Session::init(catalog, gate);
        tokio::spawn(session.run());
        handle
    }

    #[tokio::test]
    async fn test_initial_load_publishes_snapshot() {
        // squares endpoint is missing: that dataset degrades to empty
        let source = FakeSource::default().with(
            "/api/municipal-health-units",
            vec![record(json!({ "latitude": -22.9, "longitude": -43.2 }))],
        );
        let handle = spawn_session(source);

        assert!(handle.snapshot().loading);
        let snapshot = handle.wait_loaded().await.unwrap();
        assert_eq!(snapshot.category("hospital").unwrap().points.len(), 1);
        assert_eq!(snapshot.dataset("squares").unwrap().records, 0);
        handle.dispose();
    }

    #[tokio::test]
    async fn test_refresh_goes_to_source() {
        let source = FakeSource::default()
            .with("/api/municipal-health-units", Vec::new())
            .with("/api/squares", Vec::new());
        let calls = Arc::clone(&source.calls);
        let handle = spawn_session(source);
        handle.wait_loaded().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let mut rx = handle.subscribe();
        rx.borrow_and_update();

        assert!(handle.refresh("squares").await);
        assert!(!handle.refresh("bus_stops").await);

        // Wait for the refresh to land
        rx.changed().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        handle.dispose();
    }
}
