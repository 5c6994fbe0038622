use std::io;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pinyin_core::dict::ToneVariant;
use pinyin_core::Engine;
use tracing::{debug, warn};

/// Work the migration thread accepts besides its own schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationRequest {
    /// Forced batch merge of one variant.
    MergeNow(ToneVariant),
    /// Forced demotion pass.
    DemoteNow,
    Flush,
    Shutdown,
}

/// Owns the thread that runs scheduled tier migrations for an [`Engine`].
///
/// Every `tick` the worker attempts a scheduled merge for both tone
/// variants and a scheduled demotion; the learner's own thresholds and
/// intervals decide whether anything happens. Explicit requests are
/// served in the order they were sent.
pub struct MigrationWorker {
    tx: mpsc::Sender<MigrationRequest>,
    handle: Option<JoinHandle<()>>,
}

impl MigrationWorker {
    pub fn spawn(engine: Arc<Engine>, tick: Duration) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<MigrationRequest>();
        let handle = thread::Builder::new()
            .name("pinyin-migration".into())
            .spawn(move || migration_worker(&engine, &rx, tick))?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Queue a request. Returns false once the worker has stopped.
    pub fn submit(&self, request: MigrationRequest) -> bool {
        self.tx.send(request).is_ok()
    }

    pub fn merge_now(&self, variant: ToneVariant) -> bool {
        self.submit(MigrationRequest::MergeNow(variant))
    }

    pub fn demote_now(&self) -> bool {
        self.submit(MigrationRequest::DemoteNow)
    }

    pub fn flush(&self) -> bool {
        self.submit(MigrationRequest::Flush)
    }

    /// Serve everything already queued, flush, and join the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.tx.send(MigrationRequest::Shutdown);
        if handle.join().is_err() {
            warn!("migration worker panicked");
        }
    }
}

impl Drop for MigrationWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn migration_worker(engine: &Engine, rx: &mpsc::Receiver<MigrationRequest>, tick: Duration) {
    let mut next_tick = Instant::now() + tick;
    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(MigrationRequest::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Ok(request) => serve(engine, request),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                scheduled(engine);
                next_tick = Instant::now() + tick;
            }
        }
    }

    // Requests that raced with shutdown.
    while let Ok(request) = rx.try_recv() {
        if request != MigrationRequest::Shutdown {
            serve(engine, request);
        }
    }
    match engine.flush() {
        Ok(saved) => debug!(saved, "migration worker stopped"),
        Err(e) => warn!(error = %e, "final flush failed"),
    }
}

fn scheduled(engine: &Engine) {
    for variant in ToneVariant::ALL {
        if let Err(e) = engine.merge(variant, false) {
            warn!(variant = variant.name(), error = %e, "scheduled merge failed");
        }
    }
    if let Err(e) = engine.demote(false) {
        warn!(error = %e, "scheduled demotion failed");
    }
}

fn serve(engine: &Engine, request: MigrationRequest) {
    let result = match request {
        MigrationRequest::MergeNow(variant) => engine.merge(variant, true).map(|r| r.merged.len()),
        MigrationRequest::DemoteNow => engine.demote(true).map(|r| r.demoted.len()),
        MigrationRequest::Flush => engine.flush(),
        MigrationRequest::Shutdown => return,
    };
    match result {
        Ok(moved) => debug!(?request, moved, "migration request served"),
        Err(e) => warn!(?request, error = %e, "migration request failed"),
    }
}
