//! Completion delivery
//!
//! A loader reports back through a [`CompletionSink`], a one-shot capability
//! tied to a single request. `succeed` and `fail` consume the sink, so a
//! request can be completed at most once; dropping the sink unused means the
//! request is never completed, which the node tolerates.
//!
//! Completions are either applied on the loader's thread
//! ([`CompletionRoute::Immediate`]) or parked in a [`CompletionQueue`] until
//! the owning thread drains it.
//!
//! # Example
//!
//! ```ignore
//! let queue = CompletionQueue::new();
//! let node = Object3D::with_settings("model", loader, registries, Object3DSettings {
//!     route: queue.route(),
//!     ..Default::default()
//! });
//!
//! node.load_model(ModelSource::uri("file:///model.obj"), ModelKind::Obj, Some(listener))?;
//!
//! // Once per frame on the owning thread
//! queue.drain();
//! ```

use std::fmt;
use std::sync::Weak;

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::request::{LoadOutcome, LoadedModel, ModelKind, RequestId};
use crate::scene::Object3D;

// ============================================================================
// Route
// ============================================================================

/// How completions travel back to their node.
#[derive(Clone, Default)]
pub enum CompletionRoute {
    /// Apply on whichever thread the loader completes on
    #[default]
    Immediate,
    /// Park in a [`CompletionQueue`] until drained
    Queued(Sender<PendingCompletion>),
}

impl fmt::Debug for CompletionRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => write!(f, "Immediate"),
            Self::Queued(_) => write!(f, "Queued"),
        }
    }
}

// ============================================================================
// Sink
// ============================================================================

/// One-shot completion capability for a single request.
pub struct CompletionSink {
    node: Weak<Object3D>,
    request_id: RequestId,
    route: CompletionRoute,
}

impl CompletionSink {
    pub(crate) fn new(node: Weak<Object3D>, request_id: RequestId, route: CompletionRoute) -> Self {
        Self {
            node,
            request_id,
            route,
        }
    }

    /// The request this sink completes
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Whether the target node still exists. Loaders may use this to skip
    /// work nobody can observe.
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        self.node.strong_count() == 0
    }

    /// Report a successful load
    pub fn succeed(self, model: LoadedModel, kind: ModelKind) {
        self.deliver(LoadOutcome::Success { model, kind });
    }

    /// Report a failed load
    pub fn fail(self, message: impl Into<String>) {
        self.deliver(LoadOutcome::Failure {
            message: message.into(),
        });
    }

    fn deliver(self, outcome: LoadOutcome) {
        let pending = PendingCompletion {
            node: self.node,
            request_id: self.request_id,
            outcome,
        };
        match self.route {
            CompletionRoute::Immediate => pending.apply(),
            CompletionRoute::Queued(sender) => {
                if let Err(err) = sender.send(pending) {
                    log::debug!(
                        "Completion queue closed, dropping completion {}",
                        err.0.request_id
                    );
                }
            }
        }
    }
}

impl fmt::Debug for CompletionSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSink")
            .field("request_id", &self.request_id)
            .field("route", &self.route)
            .finish()
    }
}

// ============================================================================
// Queue
// ============================================================================

/// A completion waiting to be applied to its node.
pub struct PendingCompletion {
    node: Weak<Object3D>,
    request_id: RequestId,
    outcome: LoadOutcome,
}

impl PendingCompletion {
    /// Apply to the node, if it still exists
    fn apply(self) {
        match self.node.upgrade() {
            Some(node) => node.complete(self.request_id, self.outcome),
            None => log::debug!("Node dropped before completion {} arrived", self.request_id),
        }
    }
}

/// Multi-producer queue of completions, drained by the owning thread.
///
/// Loader threads only ever push; node state is touched exclusively by the
/// thread calling [`CompletionQueue::drain`].
#[derive(Debug)]
pub struct CompletionQueue {
    sender: Sender<PendingCompletion>,
    receiver: Receiver<PendingCompletion>,
}

impl CompletionQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Route that delivers into this queue
    #[must_use]
    pub fn route(&self) -> CompletionRoute {
        CompletionRoute::Queued(self.sender.clone())
    }

    /// Apply every parked completion, returning how many were processed.
    ///
    /// Completions pushed while draining are applied in the same call.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        while let Ok(pending) = self.receiver.try_recv() {
            pending.apply();
            count += 1;
        }
        count
    }

    /// Number of parked completions
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if nothing is parked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for CompletionQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loading::testing::{ManualLoader, RecordingListener};
    use crate::loading::ModelSource;
    use crate::scene::{NativeRegistries, Object3DSettings};
    use std::sync::Arc;

    fn queued_node(queue: &CompletionQueue) -> (Arc<ManualLoader>, Arc<Object3D>) {
        let loader = ManualLoader::new();
        let node = Object3D::with_settings(
            "queued",
            loader.clone(),
            NativeRegistries::new(),
            Object3DSettings {
                route: queue.route(),
                ..Default::default()
            },
        );
        (loader, node)
    }

    #[test]
    fn test_drain_applies_in_arrival_order() {
        let queue = CompletionQueue::new();
        let (loader, node) = queued_node(&queue);
        let listener = RecordingListener::new();

        node.load_model(ModelSource::uri("a.obj"), ModelKind::Obj, Some(listener.clone()))
            .unwrap();
        node.load_model(ModelSource::uri("b.obj"), ModelKind::Obj, Some(listener.clone()))
            .unwrap();

        loader.take(2).1.fail("second failed");
        loader.take(1).1.fail("first failed");
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.drain(), 2);
        assert_eq!(listener.heard().len(), 1);
        assert_eq!(node.stats().snapshot().stale, 1);
        assert_eq!(queue.drain(), 0);
    }

    #[test]
    fn test_orphaned_sink() {
        let queue = CompletionQueue::new();
        let (loader, node) = queued_node(&queue);

        node.load_model(ModelSource::uri("a.obj"), ModelKind::Obj, None)
            .unwrap();
        let (_, sink) = loader.take(1);
        assert_eq!(sink.request_id(), RequestId::from_raw(1));
        assert!(!sink.is_orphaned());

        drop(node);
        assert!(sink.is_orphaned());

        sink.fail("too late");
        assert_eq!(queue.drain(), 1);
    }

    #[test]
    fn test_closed_queue_drops_completion() {
        let queue = CompletionQueue::new();
        let (loader, node) = queued_node(&queue);

        node.load_model(ModelSource::uri("a.obj"), ModelKind::Obj, None)
            .unwrap();
        drop(queue);

        // No receiver remains, so the completion is dropped
        loader.take(1).1.fail("unheard");
        assert_eq!(node.status(), crate::scene::LoadStatus::Loading(RequestId::from_raw(1)));
        assert_eq!(node.stats().snapshot().total(), 0);
    }

    #[test]
    fn test_immediate_route_is_default() {
        let route = CompletionRoute::default();
        assert!(matches!(route, CompletionRoute::Immediate));
        assert_eq!(format!("{route:?}"), "Immediate");
    }
}
