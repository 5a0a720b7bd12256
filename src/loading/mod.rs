//! Asynchronous model loading
//!
//! Provides the contract between nodes and model loaders:
//! - Request ids and outcomes tagged with them
//! - One-shot completion sinks, applied immediately or through a queue
//! - A thread-pool loader running a pluggable decoder
//! - Counters distinguishing applied, failed, stale and dropped completions

mod listener;
mod loader;
mod request;
mod sink;
mod stats;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use listener::{FnListener, Object3DListener};
pub use loader::ModelLoader;
pub use request::{LoadOutcome, LoadRequest, LoadedModel, ModelKind, ModelSource, RequestId};
pub use sink::{CompletionQueue, CompletionRoute, CompletionSink, PendingCompletion};
pub use stats::{CompletionFate, CompletionSnapshot, CompletionStats};
pub use worker::{DecodedGeometry, DecodedModel, LoaderError, ModelDecoder, WorkerLoader};
