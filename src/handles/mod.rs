//! Opaque handle management
//!
//! Provides handle-based ownership for objects crossing the boundary:
//! - Opaque, non-zero integer handles
//! - A thread-safe registry resolving handles to shared references
//! - Scoped ownership that destroys a handle when its owner drops

mod handle;
mod registry;
mod scoped;

pub use handle::Handle;
pub use registry::{HandleError, HandleRegistry};
pub use scoped::ScopedHandle;
