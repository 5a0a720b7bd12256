//! Asynchronously loaded 3D model node
//!
//! An [`Object3D`] is a node that loads OBJ or FBX model data through a
//! [`ModelLoader`] and adopts the resulting materials, geometry and subgraph.
//!
//! # Request ids
//!
//! Every `load_model` call takes the next request id and supersedes whatever
//! load came before it. Nothing is sent to the loader to cancel the old load;
//! its completion is simply ignored when it arrives, because its id no longer
//! matches. Completions arriving after `dispose` are ignored the same way.
//!
//! The id, the disposed flag, the listener and the adopted resources sit
//! behind one lock, so the "is this completion still current?" decision and
//! the adoption it guards happen as a single step.
//!
//! # Example
//!
//! ```ignore
//! let node = Object3D::new("heart", loader, registries);
//! node.load_model(
//!     ModelSource::uri("file:///models/heart.obj"),
//!     ModelKind::Obj,
//!     Some(Arc::new(FnListener::new(
//!         |node, kind| log::info!("{kind} loaded: {} materials", node.materials().len()),
//!         |message| log::warn!("load failed: {message}"),
//!     ))),
//! )?;
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use super::geometry::Geometry;
use super::material::Material;
use super::node::Node;
use super::registries::NativeRegistries;
use crate::handles::{Handle, HandleRegistry, ScopedHandle};
use crate::loading::{
    CompletionFate, CompletionRoute, CompletionSink, CompletionStats, LoadOutcome, LoadRequest,
    LoadedModel, ModelKind, ModelLoader, ModelSource, Object3DListener, RequestId,
};

// ============================================================================
// Status and Errors
// ============================================================================

/// Observable load state of an [`Object3D`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No load in flight
    Idle,
    /// Waiting for the completion of this request
    Loading(RequestId),
    /// Disposed; no further loads or completions have any effect
    Disposed,
}

/// Errors returned by [`Object3D::load_model`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The node was disposed
    Disposed,
    /// The node has issued every possible request id
    RequestIdsExhausted,
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disposed => write!(f, "Node has been disposed"),
            Self::RequestIdsExhausted => write!(f, "Node has no request ids left"),
        }
    }
}

impl std::error::Error for NodeError {}

// ============================================================================
// Settings
// ============================================================================

/// Optional wiring for an [`Object3D`]
#[derive(Debug, Clone, Default)]
pub struct Object3DSettings {
    /// How completions reach the node
    pub route: CompletionRoute,
    /// Counters to record completion fates into, possibly shared by many nodes
    pub stats: Arc<CompletionStats>,
}

// ============================================================================
// Load State
// ============================================================================

type Materials = SmallVec<[ScopedHandle<Material>; 4]>;

/// Everything the completion decision reads or writes
struct LoadState {
    /// Id of the most recent load
    active_request: RequestId,
    /// Id of the last load whose completion was handled
    completed_request: RequestId,
    /// Listener for the most recent load
    listener: Option<Arc<dyn Object3DListener>>,
    /// Materials adopted from the last current success
    materials: Materials,
    /// Geometry and subgraph
    node: Node,
}

/// Resources detached under the lock, released after it
struct Released {
    _materials: Materials,
    _geometry: Option<ScopedHandle<Geometry>>,
    _children: Vec<Node>,
    _discarded: Option<ScopedHandle<Geometry>>,
}

impl LoadState {
    fn release_content(&mut self) -> Released {
        Released {
            _materials: std::mem::take(&mut self.materials),
            _geometry: self.node.take_geometry(),
            _children: self.node.remove_all_children(),
            _discarded: None,
        }
    }
}

/// Listener call decided under the lock, made after it
enum Notify {
    Loaded(Arc<dyn Object3DListener>, ModelKind),
    Failed(Arc<dyn Object3DListener>, String),
}

// ============================================================================
// Object3D
// ============================================================================

/// A scene node that loads model data asynchronously.
pub struct Object3D {
    /// Request, listener and resource state
    state: Mutex<LoadState>,
    /// External loader
    loader: Arc<dyn ModelLoader>,
    /// Registries used to adopt raw handles
    registries: NativeRegistries,
    /// Completion routing
    route: CompletionRoute,
    /// Completion counters
    stats: Arc<CompletionStats>,
    /// Weak self reference handed to completion sinks
    self_ref: Weak<Object3D>,
}

impl Object3D {
    /// Create a node whose completions are applied on the loader's thread
    pub fn new(
        name: impl Into<String>,
        loader: Arc<dyn ModelLoader>,
        registries: NativeRegistries,
    ) -> Arc<Self> {
        Self::with_settings(name, loader, registries, Object3DSettings::default())
    }

    /// Create a node with explicit completion routing and stats
    pub fn with_settings(
        name: impl Into<String>,
        loader: Arc<dyn ModelLoader>,
        registries: NativeRegistries,
        settings: Object3DSettings,
    ) -> Arc<Self> {
        let node = Node::new(name);
        Arc::new_cyclic(|self_ref| Self {
            state: Mutex::new(LoadState {
                active_request: RequestId::NONE,
                completed_request: RequestId::NONE,
                listener: None,
                materials: SmallVec::new(),
                node,
            }),
            loader,
            registries,
            route: settings.route,
            stats: settings.stats,
            self_ref: self_ref.clone(),
        })
    }

    /// Load a model into this node, replacing whatever it held.
    ///
    /// Previously loaded materials, geometry and children are released
    /// immediately, and `listener` replaces any earlier listener. Returns
    /// once the load is dispatched; a load still in flight becomes stale.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Disposed`] if the node was disposed; nothing is
    /// dispatched and the request id does not change.
    pub fn load_model(
        &self,
        source: ModelSource,
        kind: ModelKind,
        listener: Option<Arc<dyn Object3DListener>>,
    ) -> Result<RequestId, NodeError> {
        let (request_id, released) = {
            let mut state = self.state.lock();
            if state.node.is_disposed() {
                return Err(NodeError::Disposed);
            }
            let request_id = state
                .active_request
                .next()
                .ok_or(NodeError::RequestIdsExhausted)?;

            state.active_request = request_id;
            state.listener = listener;
            (request_id, state.release_content())
        };
        drop(released);

        log::debug!(
            "{}: dispatching {kind} load {request_id} from {source}",
            self.name()
        );

        let sink = CompletionSink::new(self.self_ref.clone(), request_id, self.route.clone());
        self.loader.load_async(
            LoadRequest {
                source,
                kind,
                request_id,
            },
            sink,
        );
        Ok(request_id)
    }

    /// Apply a completion if it belongs to the current load.
    ///
    /// Completions for superseded requests or disposed nodes are dropped
    /// silently; their resources are released.
    pub(crate) fn complete(&self, request_id: RequestId, outcome: LoadOutcome) {
        let notify = {
            let mut state = self.state.lock();
            if state.node.is_disposed() {
                self.stats.record(CompletionFate::Disposed);
                log::debug!(
                    "{}: dropping completion {request_id} for disposed node",
                    state.node.name()
                );
                return;
            }
            if request_id != state.active_request {
                self.stats.record(CompletionFate::Stale);
                log::debug!(
                    "{}: dropping stale completion {request_id} (current {})",
                    state.node.name(),
                    state.active_request
                );
                return;
            }
            if request_id == state.completed_request {
                self.stats.record(CompletionFate::Stale);
                log::warn!(
                    "{}: ignoring repeated completion {request_id}",
                    state.node.name()
                );
                return;
            }
            state.completed_request = request_id;

            match outcome {
                LoadOutcome::Success { model, kind } => {
                    self.stats.record(CompletionFate::Applied);
                    let released = adopt(&mut state, model, kind);
                    let notify = state.listener.clone().map(|l| Notify::Loaded(l, kind));
                    drop(state);
                    drop(released);
                    notify
                }
                LoadOutcome::Failure { message } => {
                    self.stats.record(CompletionFate::Failed);
                    log::warn!("{}: load {request_id} failed: {message}", state.node.name());
                    state.listener.clone().map(|l| Notify::Failed(l, message))
                }
            }
        };

        match notify {
            Some(Notify::Loaded(listener, kind)) => listener.on_loaded(self, kind),
            Some(Notify::Failed(listener, message)) => listener.on_failed(&message),
            None => {}
        }
    }

    /// Boundary entry point for a successful load reported with raw handles.
    ///
    /// Ownership of every handle passes to this node. Handles that are not
    /// live, or that belong to another registry, are logged and skipped; they
    /// never affect request tracking. A material handle listed more than once
    /// is adopted once.
    pub fn on_load_success(
        &self,
        request_id: RequestId,
        materials: &[Handle],
        kind: ModelKind,
        geometry: Option<Handle>,
    ) {
        let mut seen = FxHashSet::default();
        let materials = materials
            .iter()
            .filter(|&&handle| {
                let first = seen.insert(handle);
                if !first {
                    log::warn!(
                        "{}: material handle {handle} delivered more than once",
                        self.name()
                    );
                }
                first
            })
            .filter_map(|&handle| self.adopt_handle(self.registries.materials(), handle))
            .collect();
        let geometry =
            geometry.and_then(|handle| self.adopt_handle(self.registries.geometries(), handle));

        self.complete(
            request_id,
            LoadOutcome::Success {
                model: LoadedModel {
                    materials,
                    geometry,
                    children: Vec::new(),
                },
                kind,
            },
        );
    }

    /// Boundary entry point for a failed load
    pub fn on_load_failure(&self, request_id: RequestId, message: impl Into<String>) {
        self.complete(
            request_id,
            LoadOutcome::Failure {
                message: message.into(),
            },
        );
    }

    fn adopt_handle<T: ?Sized>(
        &self,
        registry: &Arc<HandleRegistry<T>>,
        handle: Handle,
    ) -> Option<ScopedHandle<T>> {
        match ScopedHandle::adopt(registry, handle) {
            Ok(scoped) => Some(scoped),
            Err(e) => {
                log::warn!("{}: skipping delivered resource: {e}", self.name());
                None
            }
        }
    }

    /// Release everything and ignore all future completions.
    ///
    /// Safe to call while a load is in flight, and more than once.
    pub fn dispose(&self) {
        let released = {
            let mut state = self.state.lock();
            if state.node.is_disposed() {
                return;
            }
            state.listener = None;
            let released = state.release_content();
            state.node.dispose();
            released
        };
        drop(released);
        log::debug!("{}: disposed", self.name());
    }

    /// Materials adopted from the last successful load (empty until then)
    #[must_use]
    pub fn materials(&self) -> Vec<Arc<Material>> {
        self.state
            .lock()
            .materials
            .iter()
            .map(ScopedHandle::shared)
            .collect()
    }

    /// Standalone geometry attached by the last successful OBJ load
    #[must_use]
    pub fn geometry(&self) -> Option<Arc<Geometry>> {
        self.state.lock().node.geometry()
    }

    /// Number of direct children adopted from the last successful load
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.state.lock().node.child_count()
    }

    /// Names of the direct children
    #[must_use]
    pub fn child_names(&self) -> Vec<String> {
        self.state
            .lock()
            .node
            .children()
            .map(|child| child.name().to_string())
            .collect()
    }

    /// Id of the most recent load (zero before the first)
    #[must_use]
    pub fn active_request_id(&self) -> RequestId {
        self.state.lock().active_request
    }

    /// Current load status
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        let state = self.state.lock();
        if state.node.is_disposed() {
            LoadStatus::Disposed
        } else if state.completed_request == state.active_request {
            LoadStatus::Idle
        } else {
            LoadStatus::Loading(state.active_request)
        }
    }

    /// Check whether the node has been disposed
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.lock().node.is_disposed()
    }

    /// Node name
    #[must_use]
    pub fn name(&self) -> String {
        self.state.lock().node.name().to_string()
    }

    /// Set the light receiving mask on this node and the loaded subgraph
    pub fn set_light_receiving_bit_mask(&self, mask: u32) {
        self.state.lock().node.set_light_receiving_bit_mask(mask, true);
    }

    /// Set the shadow casting mask on this node and the loaded subgraph
    pub fn set_shadow_casting_bit_mask(&self, mask: u32) {
        self.state.lock().node.set_shadow_casting_bit_mask(mask, true);
    }

    /// Light receiving mask of this node
    #[must_use]
    pub fn light_receiving_bit_mask(&self) -> u32 {
        self.state.lock().node.light_receiving_bit_mask()
    }

    /// Shadow casting mask of this node
    #[must_use]
    pub fn shadow_casting_bit_mask(&self) -> u32 {
        self.state.lock().node.shadow_casting_bit_mask()
    }

    /// Completion counters this node records into
    #[must_use]
    pub fn stats(&self) -> &Arc<CompletionStats> {
        &self.stats
    }
}

/// Move a current success into the node, returning what it replaced
fn adopt(state: &mut LoadState, model: LoadedModel, kind: ModelKind) -> Released {
    let LoadedModel {
        materials,
        geometry,
        children,
    } = model;

    let mut released = state.release_content();

    state.materials = materials.into_iter().collect();

    if kind.yields_standalone_geometry() {
        state.node.set_geometry(geometry);
    } else {
        released._discarded = geometry;
    }

    let light_mask = state.node.light_receiving_bit_mask();
    let shadow_mask = state.node.shadow_casting_bit_mask();
    for child in children {
        state.node.add_child(child);
    }
    // The loaded subgraph inherits the masks already set on this node
    state.node.set_light_receiving_bit_mask(light_mask, true);
    state.node.set_shadow_casting_bit_mask(shadow_mask, true);

    released
}

impl Drop for Object3D {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.node.is_disposed() {
            log::warn!(
                "Object3D '{}' dropped without dispose(); releasing its resources",
                state.node.name()
            );
            state.listener = None;
            state.node.dispose();
        }
    }
}

impl fmt::Debug for Object3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Object3D")
            .field("name", &state.node.name())
            .field("active_request", &state.active_request)
            .field("materials", &state.materials.len())
            .field("disposed", &state.node.is_disposed())
            .finish()
    }
}
