//! The probe scheduler task and its handle.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::state::Debouncer;
use crate::catalog::CatalogSnapshot;
use crate::config::ProbeConfig;
use crate::models::{Coordinate, ProbeBatch, ProbeView};

#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub settle: Duration,
    pub ceiling: f64,
    /// Touch surfaces never send a meaningful pointer-leave
    pub ignore_pointer_leave: bool,
}

impl ProbeSettings {
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self {
            settle: config.settle(),
            ceiling: config.ceiling_m,
            ignore_pointer_leave: false,
        }
    }

    pub fn touch(mut self, touch: bool) -> Self {
        self.ignore_pointer_leave = touch;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeEvent {
    /// Pointer move or tap
    Move(Coordinate),
    Leave,
}

pub struct ProbeScheduler {
    settings: ProbeSettings,
    debouncer: Debouncer,
    catalog: watch::Receiver<Arc<CatalogSnapshot>>,
    events: mpsc::UnboundedReceiver<ProbeEvent>,
    view: watch::Sender<ProbeView>,
    running: JoinSet<ProbeBatch>,
    batches_run: Arc<AtomicU64>,
    shutdown: CancellationToken,
}

impl ProbeScheduler {
    /// Start a scheduler reading from `catalog`. The task lives until the
    /// returned handle is disposed or dropped.
    pub fn spawn(
        settings: ProbeSettings,
        mut catalog: watch::Receiver<Arc<CatalogSnapshot>>,
    ) -> ProbeHandle {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let loading = catalog.borrow_and_update().loading;
        let (view_tx, view_rx) = watch::channel(ProbeView {
            loading,
            ..ProbeView::default()
        });
        let batches_run = Arc::new(AtomicU64::new(0));
        let shutdown = CancellationToken::new();

        let scheduler = Self {
            settings,
            debouncer: Debouncer::new(settings.settle),
            catalog,
            events: event_rx,
            view: view_tx,
            running: JoinSet::new(),
            batches_run: Arc::clone(&batches_run),
            shutdown: shutdown.clone(),
        };
        tokio::spawn(scheduler.run());

        ProbeHandle {
            events: event_tx,
            view: view_rx,
            batches_run,
            shutdown,
        }
    }

    async fn run(mut self) {
        let mut catalog_open = true;

        loop {
            let deadline = self.debouncer.deadline();

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!("Probe scheduler disposed");
                    break;
                }

                event = self.events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.dispatch();
                }

                Some(done) = self.running.join_next(), if !self.running.is_empty() => {
                    self.complete(done);
                }

                changed = self.catalog.changed(), if catalog_open => {
                    if changed.is_err() {
                        catalog_open = false;
                        continue;
                    }
                    let loading = self.catalog.borrow_and_update().loading;
                    self.view.send_if_modified(|view| {
                        let modified = view.loading != loading;
                        view.loading = loading;
                        modified
                    });
                }
            }
        }
    }

    fn handle(&mut self, event: ProbeEvent) {
        match event {
            ProbeEvent::Move(at) => {
                if self.catalog.borrow().loading {
                    trace!("Datasets still loading, dropping move");
                    self.view.send_modify(|view| {
                        view.visible = true;
                        view.loading = true;
                    });
                    return;
                }
                let request = self.debouncer.on_move(at, Instant::now());
                trace!("Probe request {} pending", request.request_id);
                self.view.send_if_modified(|view| {
                    let modified = !view.visible || view.loading;
                    view.visible = true;
                    view.loading = false;
                    modified
                });
            }
            ProbeEvent::Leave => {
                if self.settings.ignore_pointer_leave {
                    return;
                }
                self.debouncer.cancel();
                self.view.send_if_modified(|view| {
                    let modified = view.visible;
                    view.visible = false;
                    modified
                });
            }
        }
    }

    fn dispatch(&mut self) {
        let Some(request) = self.debouncer.fire(Instant::now()) else {
            return;
        };

        let snapshot = Arc::clone(&self.catalog.borrow());
        if snapshot.loading {
            return;
        }

        let ceiling = self.settings.ceiling;
        self.batches_run.fetch_add(1, Ordering::Relaxed);
        debug!("Running probe request {}", request.request_id);

        self.running.spawn(async move {
            let origin = request.coordinate();
            ProbeBatch {
                request_id: request.request_id,
                origin,
                results: snapshot.probe(origin, ceiling),
                computed_at: Utc::now(),
            }
        });
    }

    fn complete(&mut self, done: Result<ProbeBatch, JoinError>) {
        let batch = match done {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Probe computation failed: {}", e);
                return;
            }
        };

        if !self.debouncer.is_current(batch.request_id) {
            debug!("Discarding stale probe batch {}", batch.request_id);
            return;
        }
        self.view.send_modify(|view| view.batch = Some(batch));
    }
}

/// Input side of a probe scheduler. Dropping the handle stops the task.
pub struct ProbeHandle {
    events: mpsc::UnboundedSender<ProbeEvent>,
    view: watch::Receiver<ProbeView>,
    batches_run: Arc<AtomicU64>,
    shutdown: CancellationToken,
}

impl ProbeHandle {
    pub fn probe(&self, at: Coordinate) {
        let _ = self.events.send(ProbeEvent::Move(at));
    }

    pub fn clear_probe(&self) {
        let _ = self.events.send(ProbeEvent::Leave);
    }

    pub fn subscribe(&self) -> watch::Receiver<ProbeView> {
        self.view.clone()
    }

    pub fn view(&self) -> ProbeView {
        self.view.borrow().clone()
    }

    /// Number of batch computations started so far
    pub fn batches_run(&self) -> u64 {
        self.batches_run.load(Ordering::Relaxed)
    }

    pub fn dispose(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CategoryPoints;
    use crate::models::{GeoPoint, ProbeRequest};
    use tokio::time::{sleep, timeout};

    fn settings() -> ProbeSettings {
        ProbeSettings {
            settle: Duration::from_millis(200),
            ceiling: 5000.0,
            ignore_pointer_leave: false,
        }
    }

    fn snapshot(loading: bool) -> Arc<CatalogSnapshot> {
        Arc::new(CatalogSnapshot {
            loading,
            categories: vec![CategoryPoints {
                name: "school".to_string(),
                label: "Escola mais próxima".to_string(),
                points: Arc::new(vec![GeoPoint::at(-22.90, -43.40)]),
            }],
            datasets: Default::default(),
        })
    }

    async fn next_batch(handle: &ProbeHandle) -> ProbeBatch {
        let mut rx = handle.subscribe();
        timeout(Duration::from_secs(5), async {
            loop {
                if let Some(batch) = rx.borrow_and_update().batch.clone() {
                    return batch;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_moves_coalesce_into_one_batch() {
        let (_catalog_tx, catalog_rx) = watch::channel(snapshot(false));
        let handle = ProbeScheduler::spawn(settings(), catalog_rx);

        let start = Instant::now();
        let moves = [
            Coordinate::new(-22.901, -43.401),
            Coordinate::new(-22.902, -43.402),
            Coordinate::new(-22.903, -43.403),
            Coordinate::new(-22.904, -43.404),
        ];
        handle.probe(moves[0]);
        sleep(Duration::from_millis(50)).await;
        handle.probe(moves[1]);
        sleep(Duration::from_millis(50)).await;
        handle.probe(moves[2]);
        sleep(Duration::from_millis(40)).await;
        handle.probe(moves[3]);

        let batch = next_batch(&handle).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(340), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(345), "{:?}", elapsed);
        assert_eq!(batch.origin, moves[3]);
        assert_eq!(batch.request_id, 4);
        assert!(batch.result("school").unwrap().distance_meters.unwrap() > 0.0);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.batches_run(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_hides_but_keeps_distances() {
        let (_catalog_tx, catalog_rx) = watch::channel(snapshot(false));
        let handle = ProbeScheduler::spawn(settings(), catalog_rx);

        handle.probe(Coordinate::new(-22.905, -43.405));
        let batch = next_batch(&handle).await;
        assert!(handle.view().visible);

        handle.clear_probe();
        sleep(Duration::from_millis(10)).await;
        let view = handle.view();
        assert!(!view.visible);
        assert_eq!(view.batch, Some(batch));

        // Leave also cancels a pending request
        handle.probe(Coordinate::new(-22.91, -43.41));
        sleep(Duration::from_millis(100)).await;
        handle.clear_probe();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.batches_run(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_surface_ignores_leave() {
        let (_catalog_tx, catalog_rx) = watch::channel(snapshot(false));
        let handle = ProbeScheduler::spawn(settings().touch(true), catalog_rx);

        handle.probe(Coordinate::new(-22.905, -43.405));
        next_batch(&handle).await;
        handle.clear_probe();
        sleep(Duration::from_millis(10)).await;
        assert!(handle.view().visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_probe_while_loading() {
        let (catalog_tx, catalog_rx) = watch::channel(snapshot(true));
        let handle = ProbeScheduler::spawn(settings(), catalog_rx);

        handle.probe(Coordinate::new(-22.905, -43.405));
        sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.batches_run(), 0);
        let view = handle.view();
        assert!(view.visible);
        assert!(view.loading);
        assert!(view.batch.is_none());

        catalog_tx.send(snapshot(false)).unwrap();
        sleep(Duration::from_millis(10)).await;
        assert!(!handle.view().loading);

        handle.probe(Coordinate::new(-22.905, -43.405));
        next_batch(&handle).await;
        assert_eq!(handle.batches_run(), 1);
    }

    #[tokio::test]
    async fn test_superseded_batch_is_discarded() {
        let (_catalog_tx, catalog_rx) = watch::channel(snapshot(false));
        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(ProbeView::default());
        let mut scheduler = ProbeScheduler {
            settings: settings(),
            debouncer: Debouncer::new(settings().settle),
            catalog: catalog_rx,
            events: event_rx,
            view: view_tx,
            running: JoinSet::new(),
            batches_run: Arc::new(AtomicU64::new(0)),
            shutdown: CancellationToken::new(),
        };

        let now = Instant::now();
        let first = scheduler
            .debouncer
            .on_move(Coordinate::new(-22.901, -43.401), now);
        let second = scheduler
            .debouncer
            .on_move(Coordinate::new(-22.902, -43.402), now);

        let batch_for = |request: ProbeRequest| ProbeBatch {
            request_id: request.request_id,
            origin: request.coordinate(),
            results: snapshot(false).probe(request.coordinate(), 5000.0),
            computed_at: Utc::now(),
        };

        // The older request finishes late
        scheduler.complete(Ok(batch_for(first)));
        assert!(view_rx.borrow().batch.is_none());

        scheduler.complete(Ok(batch_for(second)));
        let view = view_rx.borrow().clone();
        assert_eq!(view.batch.map(|b| b.request_id), Some(second.request_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_scheduling() {
        let (_catalog_tx, catalog_rx) = watch::channel(snapshot(false));
        let handle = ProbeScheduler::spawn(settings(), catalog_rx);

        handle.dispose();
        sleep(Duration::from_millis(10)).await;
        handle.probe(Coordinate::new(-22.905, -43.405));
        sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.batches_run(), 0);
    }
}
