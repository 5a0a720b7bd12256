//! Scene-graph bridge to natively owned model resources
//!
//! This crate provides:
//! - Opaque integer handles over shared native objects
//! - Asynchronously loaded model nodes immune to stale completions
//! - A thread-pool loader and an optional completion queue
//! - RON/JSON configuration

pub mod core;
pub mod handles;
pub mod loading;
pub mod scene;

// Re-exports for convenience
pub use glam;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::core::{BridgeConfig, DispatchMode, LoaderConfig};
    pub use crate::handles::{Handle, HandleError, HandleRegistry, ScopedHandle};
    pub use crate::loading::{
        CompletionQueue, CompletionRoute, CompletionStats, DecodedGeometry, DecodedModel,
        FnListener, ModelDecoder, ModelKind, ModelLoader, ModelSource, Object3DListener,
        RequestId, WorkerLoader,
    };
    pub use crate::scene::{
        Geometry, LoadStatus, Material, NativeRegistries, Node, NodeError, Object3D,
        Object3DSettings,
    };
    pub use glam::Vec3;
}
