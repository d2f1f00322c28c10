use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, error, info, trace, warn};

use crate::foundation::core::{LayerId, VideoFormat};
use crate::foundation::error::{PlayoutError, PlayoutResult};
use crate::frame::composite::CompositeFrame;
use crate::frame::frame::Frame;
use crate::processor::backend::FrameProcessor;
use crate::producer::frame_producer::{BoxedProducer, ProducerId, ProducerInfo};
use crate::producer::registry::ProducerRegistry;
use crate::renderer::layer::{Layer, LayerState, LoadMode};

/// Options for [`RenderDevice::new`].
#[derive(Clone, Debug, Default)]
pub struct RenderDeviceOpts {
    /// Worker threads for the per-layer fan-out. `None` reads `PLAYOUT_RENDER_THREADS`, then
    /// falls back to rayon's default.
    pub threads: Option<usize>,
}

/// Render loop counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Ticks whose composite reached the backend.
    pub ticks: u64,
    /// Ticks that failed and cleared every layer.
    pub tick_faults: u64,
    /// Producer faults contained by individual layers.
    pub layer_faults: u64,
}

/// Consistent view of one layer, taken under a single lock acquisition.
#[derive(Clone, Debug)]
pub struct LayerSnapshot {
    /// Layer id.
    pub id: LayerId,
    /// Layer state.
    pub state: LayerState,
    /// Active producer.
    pub active: Option<ProducerInfo>,
    /// Background producer.
    pub background: Option<ProducerInfo>,
    /// Cached frame.
    pub last_frame: Option<Frame>,
}

#[derive(Default)]
struct Counters {
    ticks: AtomicU64,
    tick_faults: AtomicU64,
    layer_faults: AtomicU64,
}

struct Shared {
    layers: Mutex<BTreeMap<LayerId, Layer>>,
    running: AtomicBool,
    counters: Counters,
    processor: Arc<dyn FrameProcessor>,
}

/// Owns the layers and the render thread.
///
/// Control operations may be called from any thread. Each one takes the layer-map lock for a
/// single O(1) layer operation, so it applies entirely between two render ticks.
pub struct RenderDevice {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl RenderDevice {
    /// Start the render thread, sending one composite per tick to `processor`.
    pub fn new(processor: Arc<dyn FrameProcessor>, opts: RenderDeviceOpts) -> PlayoutResult<Self> {
        let pool = build_thread_pool(resolve_threads(opts.threads)?)?;
        let shared = Arc::new(Shared {
            layers: Mutex::new(BTreeMap::new()),
            running: AtomicBool::new(true),
            counters: Counters::default(),
            processor,
        });

        let thread = std::thread::Builder::new()
            .name("playout-render".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run(&shared, &pool)
            })
            .map_err(|e| PlayoutError::Other(anyhow::anyhow!("failed to spawn render thread: {e}")))?;

        Ok(Self {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Output format of the backend.
    pub fn format(&self) -> &VideoFormat {
        self.shared.processor.format()
    }

    /// Initialize `producer` and load it into `layer`, creating the layer if needed.
    ///
    /// Initialization runs before the layer lock is taken. If it fails the producer is dropped,
    /// the layer is left as it was, and `None` is returned.
    pub fn load(
        &self,
        layer: LayerId,
        mut producer: BoxedProducer,
        mode: LoadMode,
    ) -> Option<ProducerId> {
        let processor = self.shared.processor.as_ref();
        let init = catch_unwind(AssertUnwindSafe(|| producer.initialize(processor)))
            .unwrap_or_else(|p| Err(PlayoutError::from_panic(p, PlayoutError::ProducerFault)));
        if let Err(e) = init {
            self.shared.counters.layer_faults.fetch_add(1, Ordering::Relaxed);
            warn!(layer = %layer, producer = %producer.describe(), error = %e, "initialize failed, producer discarded");
            return None;
        }

        let mut layers = self.shared.layers.lock();
        let entry = layers.entry(layer).or_insert_with(|| Layer::new(layer));
        Some(entry.load(producer, mode))
    }

    /// Build a producer from `params` with `registry` and load it.
    ///
    /// Unmatched parameters fail with `NullArgument`; malformed ones with `InvalidArgument`.
    pub fn load_params(
        &self,
        layer: LayerId,
        registry: &ProducerRegistry,
        params: &[String],
        mode: LoadMode,
    ) -> PlayoutResult<Option<ProducerId>> {
        let producer = registry.create_required(params)?;
        Ok(self.load(layer, producer, mode))
    }

    /// Promote the background producer of `layer`, or resume it. Returns `false` for an unknown
    /// layer.
    pub fn play(&self, layer: LayerId) -> bool {
        self.with_layer(layer, "play", Layer::play)
    }

    /// Freeze `layer` on its cached frame.
    pub fn pause(&self, layer: LayerId) -> bool {
        self.with_layer(layer, "pause", Layer::pause)
    }

    /// Blank `layer`, keeping its background producer.
    pub fn stop(&self, layer: LayerId) -> bool {
        self.with_layer(layer, "stop", Layer::stop)
    }

    /// Remove `layer` entirely.
    pub fn clear(&self, layer: LayerId) -> bool {
        let removed = self.shared.layers.lock().remove(&layer);
        debug!(layer = %layer, found = removed.is_some(), "clear");
        removed.is_some()
    }

    /// Remove every layer.
    pub fn clear_all(&self) {
        let mut layers = self.shared.layers.lock();
        debug!(count = layers.len(), "clear all layers");
        layers.clear();
    }

    /// Active producer of `layer`.
    pub fn active(&self, layer: LayerId) -> Option<ProducerInfo> {
        self.shared.layers.lock().get(&layer).and_then(Layer::active)
    }

    /// Background producer of `layer`.
    pub fn background(&self, layer: LayerId) -> Option<ProducerInfo> {
        self.shared.layers.lock().get(&layer).and_then(Layer::background)
    }

    /// State of `layer`, or `None` if it does not exist.
    pub fn layer_state(&self, layer: LayerId) -> Option<LayerState> {
        self.shared.layers.lock().get(&layer).map(Layer::state)
    }

    /// Full view of `layer` taken under one lock.
    pub fn snapshot(&self, layer: LayerId) -> Option<LayerSnapshot> {
        self.shared.layers.lock().get(&layer).map(|l| LayerSnapshot {
            id: l.id(),
            state: l.state(),
            active: l.active(),
            background: l.background(),
            last_frame: l.last_frame().cloned(),
        })
    }

    /// Ids of existing layers, ascending.
    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.shared.layers.lock().keys().copied().collect()
    }

    /// Render loop counters.
    pub fn stats(&self) -> RenderStats {
        let c = &self.shared.counters;
        RenderStats {
            ticks: c.ticks.load(Ordering::Relaxed),
            tick_faults: c.tick_faults.load(Ordering::Acquire),
            layer_faults: c.layer_faults.load(Ordering::Relaxed),
        }
    }

    /// Return `true` until [`RenderDevice::shutdown`] runs.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Stop the backend, stop the render loop and join the render thread. Idempotent.
    pub fn shutdown(&self) {
        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        self.shared.processor.stop();
        self.shared.running.store(false, Ordering::Release);
        if handle.join().is_err() {
            error!("render thread panicked");
        }
        info!(stats = ?self.stats(), "render device shut down");
    }

    fn with_layer(&self, layer: LayerId, op: &str, f: impl FnOnce(&mut Layer)) -> bool {
        let mut layers = self.shared.layers.lock();
        let found = layers.get_mut(&layer).map(f).is_some();
        debug!(layer = %layer, op, found, "control");
        found
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: &Shared, pool: &rayon::ThreadPool) {
    info!(format = %shared.processor.format().name, "started render thread");
    let mut tick = 0u64;

    while shared.running.load(Ordering::Acquire) {
        let result = catch_unwind(AssertUnwindSafe(|| render_tick(shared, pool, tick)))
            .unwrap_or_else(|p| Err(PlayoutError::from_panic(p, PlayoutError::TickFault)));

        match result {
            Ok(()) => {
                shared.counters.ticks.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                shared.layers.lock().clear();
                shared.counters.tick_faults.fetch_add(1, Ordering::Release);
                error!(tick, error = %e, "unexpected failure, cleared layers in render device");
            }
        }
        tick = tick.wrapping_add(1);
    }

    info!("ended render thread");
}

fn render_tick(shared: &Shared, pool: &rayon::ThreadPool, tick: u64) -> PlayoutResult<()> {
    let frames = {
        let mut guard = shared.layers.lock();
        let layers: &mut BTreeMap<LayerId, Layer> = &mut guard;
        let frames: Vec<(LayerId, Option<Frame>)> = pool.install(|| {
            layers
                .par_iter_mut()
                .map(|(id, layer)| (*id, layer.get_frame()))
                .collect()
        });
        let faults: u64 = layers.values_mut().map(Layer::take_faults).sum();
        if faults > 0 {
            shared
                .counters
                .layer_faults
                .fetch_add(faults, Ordering::Relaxed);
        }
        frames
    };

    let mut composite = CompositeFrame::new(tick);
    for (id, frame) in frames {
        if let Some(frame) = frame {
            composite.push(id, frame)?;
        }
    }
    trace!(tick, layers = composite.len(), "composited");
    shared.processor.send(composite)
}

fn resolve_threads(threads: Option<usize>) -> PlayoutResult<Option<usize>> {
    if threads.is_some() {
        return Ok(threads);
    }
    match std::env::var("PLAYOUT_RENDER_THREADS") {
        Ok(v) => v.trim().parse::<usize>().map(Some).map_err(|_| {
            PlayoutError::config(format!("PLAYOUT_RENDER_THREADS must be an integer, got '{v}'"))
        }),
        Err(_) => Ok(None),
    }
}

fn build_thread_pool(threads: Option<usize>) -> PlayoutResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(PlayoutError::config(
            "render device 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("playout-layer-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| PlayoutError::config(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/renderer/device.rs"]
mod tests;
