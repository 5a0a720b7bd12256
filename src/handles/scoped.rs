//! Scoped handle ownership
//!
//! A [`ScopedHandle`] owns exactly one handle in a registry and destroys it
//! when dropped, so ownership follows the owning value's lifetime instead of
//! depending on someone remembering to call `destroy`.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::handle::Handle;
use super::registry::{HandleError, HandleRegistry};

/// An owned handle plus the shared reference it resolves to.
pub struct ScopedHandle<T: ?Sized> {
    /// Registry the handle belongs to
    registry: Arc<HandleRegistry<T>>,
    /// Owned handle (`None` once released with `into_raw`)
    handle: Option<Handle>,
    /// Resolved shared reference
    object: Arc<T>,
}

impl<T: ?Sized> ScopedHandle<T> {
    /// Register `object` and take ownership of the new handle
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::Exhausted`] if the registry is full.
    pub fn new(registry: &Arc<HandleRegistry<T>>, object: Arc<T>) -> Result<Self, HandleError> {
        let handle = registry.create(Arc::clone(&object))?;
        Ok(Self {
            registry: Arc::clone(registry),
            handle: Some(handle),
            object,
        })
    }

    /// Take ownership of a handle issued elsewhere.
    ///
    /// After adoption the handle is destroyed when the returned value drops;
    /// the previous owner must not destroy it again.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::InvalidHandle`] if the handle is not live.
    pub fn adopt(registry: &Arc<HandleRegistry<T>>, handle: Handle) -> Result<Self, HandleError> {
        let object = registry.resolve(handle)?;
        Ok(Self {
            registry: Arc::clone(registry),
            handle: Some(handle),
            object,
        })
    }

    /// The owned handle
    #[must_use]
    pub fn handle(&self) -> Option<Handle> {
        self.handle
    }

    /// Another shared reference to the object
    #[must_use]
    pub fn shared(&self) -> Arc<T> {
        Arc::clone(&self.object)
    }

    /// Give up ownership without destroying the handle.
    ///
    /// The caller becomes responsible for destroying the returned value
    /// exactly once.
    #[must_use]
    pub fn into_raw(mut self) -> u64 {
        self.handle.take().map_or(0, Handle::raw)
    }
}

impl<T: ?Sized> Deref for ScopedHandle<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.object
    }
}

impl<T: ?Sized> Drop for ScopedHandle<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // Failures are already logged by the registry
            let _ = self.registry.destroy(handle);
        }
    }
}

impl<T: ?Sized> fmt::Debug for ScopedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedHandle")
            .field("registry", &self.registry.name())
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_destroys_handle() {
        let registry = Arc::new(HandleRegistry::new("test"));
        let scoped = ScopedHandle::new(&registry, Arc::new(10_i32)).unwrap();
        let handle = scoped.handle().unwrap();

        assert!(registry.contains(handle));
        assert_eq!(*scoped, 10);

        drop(scoped);
        assert!(!registry.contains(handle));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_adopt_takes_ownership() {
        let registry = Arc::new(HandleRegistry::new("test"));
        let handle = registry.create(Arc::new("geometry".to_string())).unwrap();

        let adopted = ScopedHandle::adopt(&registry, handle).unwrap();
        assert_eq!(adopted.as_str(), "geometry");

        drop(adopted);
        assert!(registry.resolve(handle).is_err());
    }

    #[test]
    fn test_adopt_dead_handle_fails() {
        let registry = Arc::new(HandleRegistry::new("test"));
        let handle = registry.create(Arc::new(1_u8)).unwrap();
        registry.destroy(handle).unwrap();

        assert!(ScopedHandle::adopt(&registry, handle).is_err());
    }

    #[test]
    fn test_into_raw_keeps_handle_alive() {
        let registry = Arc::new(HandleRegistry::new("test"));
        let scoped = ScopedHandle::new(&registry, Arc::new(3.5_f32)).unwrap();

        let raw = scoped.into_raw();
        let handle = Handle::from_raw(raw).unwrap();
        assert!(registry.contains(handle));

        registry.destroy(handle).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_shared_outlives_scope() {
        let registry = Arc::new(HandleRegistry::new("test"));
        let shared = {
            let scoped = ScopedHandle::new(&registry, Arc::new(vec![1_u32, 2])).unwrap();
            scoped.shared()
        };

        assert!(registry.is_empty());
        assert_eq!(*shared, vec![1, 2]);
    }
}
