//! Thread-pool model loader
//!
//! Runs a [`ModelDecoder`] on a fixed set of worker threads, registers the
//! decoded resources as handles and completes the request's sink.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};

use super::loader::ModelLoader;
use super::request::{LoadRequest, LoadedModel, ModelKind, ModelSource};
use super::sink::CompletionSink;
use crate::core::LoaderConfig;
use crate::handles::{HandleError, ScopedHandle};
use crate::scene::{Geometry, Material, NativeRegistries, Node};

// ============================================================================
// Decoder
// ============================================================================

/// Geometry description produced by a decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedGeometry {
    /// Geometry name
    pub name: String,
    /// Number of vertices
    pub vertex_count: usize,
}

/// Plain model data, before registration.
#[derive(Debug, Default)]
pub struct DecodedModel {
    /// Unique materials in load order
    pub materials: Vec<Material>,
    /// Standalone geometry, using all of `materials`
    pub geometry: Option<DecodedGeometry>,
    /// Node subgraph
    pub children: Vec<Node>,
}

/// Turns a model source into model data. Runs on a worker thread.
pub trait ModelDecoder: Send + Sync + 'static {
    /// Decode the model, or describe why it cannot be loaded
    fn decode(&self, source: &ModelSource, kind: ModelKind) -> Result<DecodedModel, String>;
}

impl<F> ModelDecoder for F
where
    F: Fn(&ModelSource, ModelKind) -> Result<DecodedModel, String> + Send + Sync + 'static,
{
    fn decode(&self, source: &ModelSource, kind: ModelKind) -> Result<DecodedModel, String> {
        self(source, kind)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while starting a loader
#[derive(Debug)]
pub enum LoaderError {
    /// A worker thread could not be spawned
    Spawn(std::io::Error),
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "Failed to spawn loader thread: {e}"),
        }
    }
}

impl std::error::Error for LoaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
        }
    }
}

// ============================================================================
// Worker Loader
// ============================================================================

/// A queued load
struct Job {
    request: LoadRequest,
    sink: CompletionSink,
}

/// State shared by all workers
struct WorkerShared {
    decoder: Box<dyn ModelDecoder>,
    registries: NativeRegistries,
}

/// [`ModelLoader`] backed by a pool of named worker threads.
///
/// Dropping the loader stops accepting work, lets queued jobs finish and
/// joins the workers.
pub struct WorkerLoader {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    config: LoaderConfig,
}

impl WorkerLoader {
    /// Start the worker threads
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn new(
        config: LoaderConfig,
        decoder: impl ModelDecoder,
        registries: NativeRegistries,
    ) -> Result<Self, LoaderError> {
        // A zero-capacity channel only accepts a job while a worker waits in recv
        let (sender, receiver) = match config.queue_capacity {
            Some(capacity) => bounded(capacity.max(1)),
            None => unbounded(),
        };
        let shared = Arc::new(WorkerShared {
            decoder: Box::new(decoder),
            registries,
        });

        let worker_count = config.worker_count.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver = receiver.clone();
            let shared = Arc::clone(&shared);
            let worker = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name))
                .spawn(move || run_worker(&receiver, &shared))
                .map_err(LoaderError::Spawn)?;
            workers.push(worker);
        }

        log::info!(
            "Started {worker_count} model loader threads ({})",
            config.thread_name
        );

        Ok(Self {
            sender: Some(sender),
            workers,
            config,
        })
    }

    /// Configuration the loader was started with
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Number of worker threads
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of jobs waiting for a worker
    #[must_use]
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, Sender::len)
    }
}

impl ModelLoader for WorkerLoader {
    fn load_async(&self, request: LoadRequest, sink: CompletionSink) {
        let Some(sender) = &self.sender else {
            sink.fail("model loader has shut down");
            return;
        };

        match sender.try_send(Job { request, sink }) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                log::warn!("Load queue full, rejecting {}", job.request.source);
                job.sink.fail("model load queue is full");
            }
            Err(TrySendError::Disconnected(job)) => {
                log::error!("Loader workers gone, rejecting {}", job.request.source);
                job.sink.fail("model loader has shut down");
            }
        }
    }
}

impl Drop for WorkerLoader {
    fn drop(&mut self) {
        // Closing the channel ends each worker's receive loop
        self.sender.take();
        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            // The last owner may be a worker applying a completion
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                log::error!("Model loader thread panicked");
            }
        }
        log::debug!("Model loader {} stopped", self.config.thread_name);
    }
}

impl fmt::Debug for WorkerLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerLoader")
            .field("workers", &self.workers.len())
            .field("config", &self.config)
            .finish()
    }
}

fn run_worker(receiver: &Receiver<Job>, shared: &WorkerShared) {
    for Job { request, sink } in receiver.iter() {
        if sink.is_orphaned() {
            log::debug!("Skipping load {} for dropped node", request.request_id);
            continue;
        }

        let decoded = catch_unwind(AssertUnwindSafe(|| {
            shared.decoder.decode(&request.source, request.kind)
        }));

        match decoded {
            Ok(Ok(model)) => match register(&shared.registries, model) {
                Ok(loaded) => {
                    log::debug!("Loaded {} ({})", request.source, request.request_id);
                    sink.succeed(loaded, request.kind);
                }
                Err(e) => {
                    log::error!("Failed to register {}: {e}", request.source);
                    sink.fail(e.to_string());
                }
            },
            Ok(Err(message)) => {
                log::warn!("Failed to load {}: {message}", request.source);
                sink.fail(message);
            }
            Err(_) => {
                log::error!("Decoder panicked while loading {}", request.source);
                sink.fail(format!("decoder panicked while loading {}", request.source));
            }
        }
    }
}

/// Register decoded resources, producing owned handles.
///
/// Handles registered before a failure are released again when the partial
/// result drops.
fn register(registries: &NativeRegistries, model: DecodedModel) -> Result<LoadedModel, HandleError> {
    let shared: Vec<Arc<Material>> = model.materials.into_iter().map(Arc::new).collect();

    let geometry = model
        .geometry
        .map(|geometry| {
            let geometry = Geometry::new(geometry.name, geometry.vertex_count, shared.clone());
            ScopedHandle::new(registries.geometries(), Arc::new(geometry))
        })
        .transpose()?;

    let materials = shared
        .into_iter()
        .map(|material| ScopedHandle::new(registries.materials(), material))
        .collect::<Result<_, _>>()?;

    Ok(LoadedModel {
        materials,
        geometry,
        children: model.children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::HandleRegistry;
    use crate::loading::FnListener;
    use crate::scene::Object3D;
    use glam::Vec3;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn cube(source: &ModelSource, _kind: ModelKind) -> Result<DecodedModel, String> {
        if source.model().contains("missing") {
            return Err("file not found".to_string());
        }
        Ok(DecodedModel {
            materials: vec![
                Material::new("red", Vec3::X),
                Material::new("green", Vec3::Y),
            ],
            geometry: Some(DecodedGeometry {
                name: "cube".to_string(),
                vertex_count: 36,
            }),
            children: vec![Node::new("pivot")],
        })
    }

    /// Listener forwarding results over a channel
    fn channel_listener() -> (
        Arc<dyn crate::loading::Object3DListener>,
        Receiver<Result<usize, String>>,
    ) {
        let (tx, rx) = unbounded();
        let failed_tx = tx.clone();
        let listener = FnListener::new(
            move |node: &Object3D, _kind: ModelKind| {
                let _ = tx.send(Ok(node.materials().len()));
            },
            move |message: &str| {
                let _ = failed_tx.send(Err(message.to_string()));
            },
        );
        (Arc::new(listener), rx)
    }

    #[test]
    fn test_loads_on_worker_threads() {
        let registries = NativeRegistries::new();
        let loader = Arc::new(
            WorkerLoader::new(
                LoaderConfig::default().with_workers(2).with_thread_name("test-loader"),
                cube,
                registries.clone(),
            )
            .unwrap(),
        );
        assert_eq!(loader.worker_count(), 2);

        let node = Object3D::new("cube", loader.clone(), registries.clone());
        let (listener, rx) = channel_listener();
        node.load_model(ModelSource::uri("cube.obj"), ModelKind::Obj, Some(listener))
            .unwrap();

        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Ok(2));
        let geometry = node.geometry().unwrap();
        assert_eq!(geometry.vertex_count(), 36);
        assert_eq!(geometry.materials().len(), 2);
        assert_eq!(node.child_count(), 1);
        assert_eq!(registries.live_handles(), 3);

        node.dispose();
        assert_eq!(registries.live_handles(), 0);
    }

    #[test]
    fn test_decoder_failure_reaches_listener() {
        let registries = NativeRegistries::new();
        let loader = Arc::new(
            WorkerLoader::new(LoaderConfig::default().with_workers(1), cube, registries.clone())
                .unwrap(),
        );

        let node = Object3D::new("cube", loader, registries);
        let (listener, rx) = channel_listener();
        node.load_model(ModelSource::uri("missing.obj"), ModelKind::Obj, Some(listener))
            .unwrap();

        assert_eq!(
            rx.recv_timeout(TIMEOUT).unwrap(),
            Err("file not found".to_string())
        );
    }

    #[test]
    fn test_decoder_panic_becomes_failure() {
        let registries = NativeRegistries::new();
        let decoder = |_: &ModelSource, _: ModelKind| -> Result<DecodedModel, String> {
            panic!("corrupt model")
        };
        let loader = Arc::new(
            WorkerLoader::new(LoaderConfig::default().with_workers(1), decoder, registries.clone())
                .unwrap(),
        );

        let node = Object3D::new("cube", loader, registries);
        let (listener, rx) = channel_listener();
        node.load_model(ModelSource::uri("bad.obj"), ModelKind::Obj, Some(listener))
            .unwrap();

        let message = rx.recv_timeout(TIMEOUT).unwrap().unwrap_err();
        assert!(message.contains("bad.obj"));
    }

    #[test]
    fn test_full_queue_rejects_load() {
        let registries = NativeRegistries::new();
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let decoder = move |source: &ModelSource, kind: ModelKind| {
            let _ = gate_rx.recv();
            cube(source, kind)
        };
        let loader = Arc::new(
            WorkerLoader::new(
                LoaderConfig::default().with_workers(1).with_queue_capacity(1),
                decoder,
                registries.clone(),
            )
            .unwrap(),
        );

        let nodes: Vec<_> = (0..3)
            .map(|i| Object3D::new(format!("node{i}"), loader.clone(), registries.clone()))
            .collect();
        let (listener, rx) = channel_listener();

        // The first job occupies the worker, wait until it has been picked up
        nodes[0]
            .load_model(ModelSource::uri("a.obj"), ModelKind::Obj, Some(listener.clone()))
            .unwrap();
        let deadline = std::time::Instant::now() + TIMEOUT;
        while loader.queued() > 0 && std::time::Instant::now() < deadline {
            thread::yield_now();
        }

        nodes[1]
            .load_model(ModelSource::uri("b.obj"), ModelKind::Obj, Some(listener.clone()))
            .unwrap();
        nodes[2]
            .load_model(ModelSource::uri("c.obj"), ModelKind::Obj, Some(listener))
            .unwrap();

        assert_eq!(
            rx.recv_timeout(TIMEOUT).unwrap(),
            Err("model load queue is full".to_string())
        );

        drop(gate_tx);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Ok(2));
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Ok(2));
    }

    #[test]
    fn test_register_shares_materials_with_geometry() {
        let registries = NativeRegistries::new();
        let loaded = register(
            &registries,
            cube(&ModelSource::uri("cube.obj"), ModelKind::Obj).unwrap(),
        )
        .unwrap();

        let geometry = loaded.geometry.as_ref().unwrap().shared();
        assert!(Arc::ptr_eq(
            &geometry.materials()[0],
            &loaded.materials[0].shared()
        ));
        assert_eq!(registries.live_handles(), 3);

        drop(loaded);
        assert_eq!(registries.live_handles(), 0);
    }

    #[test]
    fn test_zero_queue_capacity_still_accepts_loads() {
        let registries = NativeRegistries::new();
        let config = LoaderConfig {
            worker_count: 1,
            queue_capacity: Some(0),
            ..Default::default()
        };
        let loader = Arc::new(WorkerLoader::new(config, cube, registries.clone()).unwrap());

        let nodes: Vec<_> = (0..3)
            .map(|i| Object3D::new(format!("node{i}"), loader.clone(), registries.clone()))
            .collect();
        let (listener, rx) = channel_listener();
        // Dispatched back to back, before the worker can be waiting in recv
        for node in &nodes {
            node.load_model(ModelSource::uri("cube.obj"), ModelKind::Obj, Some(listener.clone()))
                .unwrap();
        }

        let results: Vec<_> = (0..3).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
        assert!(results.contains(&Ok(2)));
    }

    #[test]
    fn test_full_registry_fails_load() {
        let registries = NativeRegistries::with_registries(
            Arc::new(HandleRegistry::with_max_slots("material", 1)),
            Arc::new(HandleRegistry::new("geometry")),
        );
        let loader = Arc::new(
            WorkerLoader::new(LoaderConfig::default().with_workers(1), cube, registries.clone())
                .unwrap(),
        );

        let node = Object3D::new("cube", loader, registries.clone());
        let (listener, rx) = channel_listener();
        node.load_model(ModelSource::uri("cube.obj"), ModelKind::Obj, Some(listener))
            .unwrap();

        let message = rx.recv_timeout(TIMEOUT).unwrap().unwrap_err();
        assert!(message.contains("material registry is full"));
        // Nothing registered for the failed load stays live
        assert_eq!(registries.live_handles(), 0);
    }
}
