//! Load listeners

use std::fmt;

use super::request::ModelKind;
use crate::scene::Object3D;

/// Receives the result of the current load on an [`Object3D`].
///
/// Only the listener passed to the most recent `load_model` call is kept;
/// completions for superseded loads or disposed nodes never reach it.
pub trait Object3DListener: Send + Sync {
    /// The model finished loading into `node`
    fn on_loaded(&self, node: &Object3D, kind: ModelKind);

    /// The model failed to load
    fn on_failed(&self, message: &str);
}

/// Listener built from two closures.
pub struct FnListener<L, F> {
    loaded: L,
    failed: F,
}

impl<L, F> FnListener<L, F>
where
    L: Fn(&Object3D, ModelKind) + Send + Sync,
    F: Fn(&str) + Send + Sync,
{
    /// Create a listener from success and failure callbacks
    pub fn new(loaded: L, failed: F) -> Self {
        Self { loaded, failed }
    }
}

impl<L, F> Object3DListener for FnListener<L, F>
where
    L: Fn(&Object3D, ModelKind) + Send + Sync,
    F: Fn(&str) + Send + Sync,
{
    fn on_loaded(&self, node: &Object3D, kind: ModelKind) {
        (self.loaded)(node, kind);
    }

    fn on_failed(&self, message: &str) {
        (self.failed)(message);
    }
}

impl<L, F> fmt::Debug for FnListener<L, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnListener").finish_non_exhaustive()
    }
}
