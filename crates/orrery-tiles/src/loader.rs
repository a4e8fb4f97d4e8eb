//! Background tile loading.
//!
//! Requests go through a bounded channel to a pool of named worker threads.
//! A worker reads the tile and builds its patch mesh without holding the
//! tree lock, then takes the lock just long enough to commit the result.
//! Loads are never cancelled: a `Prefetching` node stays alive until its
//! commit lands.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, error, trace, warn};

use crate::tree::{LoadedTile, SharedTileTree};
use crate::{PatchMesh, PatchParams, TextureCache, TileError, TileHandle, TileKey, TileLayer, TileSource};

/// A request for one tile's data.
#[derive(Clone, Copy, Debug)]
struct LoadRequest {
    handle: TileHandle,
    key: TileKey,
}

/// Everything a worker needs besides the request.
struct WorkerContext {
    tree: SharedTileTree,
    source: Arc<dyn TileSource>,
    cache: Arc<TextureCache>,
    body: Arc<str>,
    layer: TileLayer,
    params: PatchParams,
    in_flight: Arc<AtomicU64>,
}

/// Outcome of [`TileLoader::request`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The request is queued.
    Queued,
    /// The queue is full; ask again next frame.
    Full,
}

/// Pool of loader threads feeding one tile tree.
pub struct TileLoader {
    sender: Option<Sender<LoadRequest>>,
    workers: Vec<JoinHandle<()>>,
    in_flight: Arc<AtomicU64>,
}

impl TileLoader {
    /// Start `threads` workers (0 picks a count from the CPU cores) with a
    /// request queue of `capacity`.
    pub fn spawn(
        tree: SharedTileTree,
        source: Arc<dyn TileSource>,
        cache: Arc<TextureCache>,
        threads: usize,
        capacity: usize,
    ) -> Result<Self, TileError> {
        let threads = if threads == 0 { Self::default_threads() } else { threads };
        let (sender, receiver) = bounded::<LoadRequest>(capacity.max(1));
        let in_flight = Arc::new(AtomicU64::new(0));
        let (body, layer, params) = {
            let guard = tree.lock();
            (Arc::clone(guard.body()), guard.layer(), *guard.params())
        };

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let ctx = WorkerContext {
                tree: tree.clone(),
                source: Arc::clone(&source),
                cache: Arc::clone(&cache),
                body: Arc::clone(&body),
                layer,
                params,
                in_flight: Arc::clone(&in_flight),
            };
            let receiver = receiver.clone();
            let worker = std::thread::Builder::new()
                .name(format!("tile-loader-{i}"))
                .spawn(move || run_worker(ctx, receiver))
                .map_err(|e| TileError::Spawn(e.to_string()))?;
            workers.push(worker);
        }
        debug!(body = %body, %layer, threads, capacity, "tile loader started");

        Ok(Self {
            sender: Some(sender),
            workers,
            in_flight,
        })
    }

    /// Worker count used when the configuration leaves it open.
    pub fn default_threads() -> usize {
        (num_cpus::get() / 2).clamp(1, 4)
    }

    /// Queue a load for a node the caller has just moved to `Prefetching`.
    pub(crate) fn request(&self, handle: TileHandle, key: TileKey) -> Result<RequestOutcome, TileError> {
        let Some(sender) = &self.sender else {
            return Err(TileError::LoaderShutDown);
        };
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        match sender.try_send(LoadRequest { handle, key }) {
            Ok(()) => {
                trace!(%key, "tile load queued");
                Ok(RequestOutcome::Queued)
            }
            Err(TrySendError::Full(_)) => {
                self.in_flight.fetch_sub(1, Ordering::Relaxed);
                Ok(RequestOutcome::Full)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.in_flight.fetch_sub(1, Ordering::Relaxed);
                Err(TileError::LoaderShutDown)
            }
        }
    }

    /// Requests queued or being worked on.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Block until every request has been committed or `timeout` passes.
    /// Returns true if the loader went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

impl Drop for TileLoader {
    fn drop(&mut self) {
        // Closing the channel lets workers finish queued requests and exit.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let name = worker.thread().name().unwrap_or("tile-loader").to_string();
            if worker.join().is_err() {
                error!(thread = %name, "tile loader thread panicked");
            }
        }
    }
}

fn run_worker(ctx: WorkerContext, receiver: Receiver<LoadRequest>) {
    while let Ok(request) = receiver.recv() {
        let loaded = load_tile(&ctx, &request.key);
        {
            let mut tree = ctx.tree.lock();
            tree.commit(request.handle, loaded);
        }
        ctx.in_flight.fetch_sub(1, Ordering::Release);
    }
}

/// Read and build one tile. Runs without the tree lock.
///
/// The texture enters the cache only once every fallible step has passed,
/// so a failed load leaves nothing behind for the tree to release.
fn load_tile(ctx: &WorkerContext, key: &TileKey) -> LoadedTile {
    let texture = ctx.source.load_texture(ctx.layer, key);

    let (texture, elevation) = match ctx.source.load_elevation(ctx.layer, key) {
        Ok(grid) => (texture, grid),
        Err(err) if err.is_fatal() => (Err(err), None),
        Err(err) => {
            warn!(%key, error = %err, "tile elevation unavailable");
            (texture, None)
        }
    };
    let texture = texture.map(|tex| ctx.cache.insert(&ctx.body, ctx.layer, *key, tex));

    let mesh = PatchMesh::build(key, &ctx.params, elevation.as_ref());
    LoadedTile {
        mesh,
        texture,
        elevation,
    }
}
