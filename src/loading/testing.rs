//! Test doubles for the loading protocol

use std::sync::Arc;

use parking_lot::Mutex;

use super::listener::Object3DListener;
use super::loader::ModelLoader;
use super::request::{LoadRequest, ModelKind};
use super::sink::CompletionSink;
use crate::scene::Object3D;

/// Loader that parks every request so tests decide when and how it completes
#[derive(Default)]
pub(crate) struct ManualLoader {
    pending: Mutex<Vec<(LoadRequest, CompletionSink)>>,
}

impl ManualLoader {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take the parked request with the given raw id
    pub(crate) fn take(&self, raw_id: u64) -> (LoadRequest, CompletionSink) {
        let mut pending = self.pending.lock();
        let index = pending
            .iter()
            .position(|(request, _)| request.request_id.raw() == raw_id)
            .expect("no parked request with that id");
        pending.remove(index)
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl ModelLoader for ManualLoader {
    fn load_async(&self, request: LoadRequest, sink: CompletionSink) {
        self.pending.lock().push((request, sink));
    }
}

/// Something a listener was told
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Heard {
    Loaded { kind: ModelKind, materials: usize },
    Failed(String),
}

/// Listener that records every call
#[derive(Default)]
pub(crate) struct RecordingListener {
    heard: Mutex<Vec<Heard>>,
}

impl RecordingListener {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn heard(&self) -> Vec<Heard> {
        self.heard.lock().clone()
    }
}

impl Object3DListener for RecordingListener {
    fn on_loaded(&self, node: &Object3D, kind: ModelKind) {
        self.heard.lock().push(Heard::Loaded {
            kind,
            materials: node.materials().len(),
        });
    }

    fn on_failed(&self, message: &str) {
        self.heard.lock().push(Heard::Failed(message.to_string()));
    }
}
