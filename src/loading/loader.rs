//! Loader contract

use super::request::LoadRequest;
use super::sink::CompletionSink;

/// Performs model loads on behalf of nodes.
///
/// `load_async` must return without waiting for the load. The loader then
/// completes the sink exactly once, or drops it if the load can never finish
/// (for example during shutdown). Loads are never cancelled explicitly: a
/// node simply ignores completions it no longer wants.
pub trait ModelLoader: Send + Sync {
    /// Start loading `request`, reporting through `sink`
    fn load_async(&self, request: LoadRequest, sink: CompletionSink);
}
