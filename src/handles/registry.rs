//! Handle registry
//!
//! Maps opaque [`Handle`] values back to shared references. Each entry holds
//! one `Arc`, so the object lives as long as its handle or any other holder.
//!
//! # Design
//!
//! Entries live in a slot arena with a free list. Destroying a handle bumps
//! the slot generation before the slot is reused, which turns a stale handle
//! value into a detectable [`HandleError::InvalidHandle`] instead of an alias
//! for whatever object occupies the slot next. Every registry stamps its own
//! tag into the handles it issues and rejects handles carrying another tag.
//!
//! # Example
//!
//! ```ignore
//! let registry = HandleRegistry::new("geometry");
//! let handle = registry.create(Arc::new(geometry))?;
//!
//! // Later, from any thread
//! let geometry = registry.resolve(handle)?;
//!
//! registry.destroy(handle)?;
//! assert!(registry.resolve(handle).is_err());
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::handle::{Handle, MAX_SLOTS, next_registry_tag};

// ============================================================================
// Slots
// ============================================================================

/// Internal slot state for registry entries.
enum Slot<T: ?Sized> {
    /// Slot holds a live shared reference
    Occupied { generation: u16, object: Arc<T> },
    /// Slot is free and links to the next free slot
    Vacant { generation: u16, next_free: usize },
    /// Slot generation is exhausted and the slot is never reused
    Retired,
}

struct Slots<T: ?Sized> {
    /// Tag stamped into every handle this registry issues
    tag: u16,
    /// Storage for all slots
    entries: Vec<Slot<T>>,
    /// Head of the free list (or `NONE`)
    free_head: usize,
    /// Number of live handles
    live: usize,
}

impl<T: ?Sized> Slots<T> {
    /// Sentinel value indicating end of free list.
    const NONE: usize = usize::MAX;

    fn lookup(&self, handle: Handle) -> Option<&Arc<T>> {
        if handle.tag() != self.tag {
            return None;
        }
        match self.entries.get(handle.slot()) {
            Some(Slot::Occupied { generation, object }) if *generation == handle.generation() => {
                Some(object)
            }
            _ => None,
        }
    }

    /// Unlink the head of the free list, returning its index and generation
    fn pop_free(&mut self) -> Option<(usize, u16)> {
        let index = self.free_head;
        if let Some(&Slot::Vacant {
            generation,
            next_free,
        }) = self.entries.get(index)
        {
            self.free_head = next_free;
            Some((index, generation))
        } else {
            None
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by handle misuse.
///
/// These are programming errors on the caller's side of the boundary, not
/// runtime conditions to recover from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// The handle was never issued by this registry or was already destroyed
    InvalidHandle {
        /// Registry the handle was presented to
        registry: &'static str,
        /// Raw handle value
        raw: u64,
    },
    /// Every slot of the registry is in use
    Exhausted {
        /// Registry that ran out of slots
        registry: &'static str,
        /// Slot limit of the registry
        max_slots: usize,
    },
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle { registry, raw } => {
                write!(f, "Invalid {registry} handle: {raw:#x}")
            }
            Self::Exhausted {
                registry,
                max_slots,
            } => write!(f, "The {registry} registry is full ({max_slots} slots)"),
        }
    }
}

impl std::error::Error for HandleError {}

// ============================================================================
// Registry
// ============================================================================

/// Thread-safe table translating handles into shared references.
///
/// `create` and `destroy` take the write lock and `resolve` takes the read
/// lock, so a resolve never observes a half-destroyed entry.
pub struct HandleRegistry<T: ?Sized> {
    /// Registry name, used in errors and logs
    name: &'static str,
    /// Most slots the registry will allocate
    max_slots: usize,
    /// Slot storage
    slots: RwLock<Slots<T>>,
}

impl<T: ?Sized> HandleRegistry<T> {
    /// Create an empty registry
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self::with_max_slots(name, MAX_SLOTS)
    }

    /// Create an empty registry that allocates at most `max_slots` slots.
    ///
    /// The limit is clamped to what a handle can encode.
    #[must_use]
    pub fn with_max_slots(name: &'static str, max_slots: usize) -> Self {
        Self {
            name,
            max_slots: max_slots.min(MAX_SLOTS),
            slots: RwLock::new(Slots {
                tag: next_registry_tag(),
                entries: Vec::new(),
                free_head: Slots::<T>::NONE,
                live: 0,
            }),
        }
    }

    /// Registry name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Store a shared reference and issue a new handle for it.
    ///
    /// The registry keeps exactly one clone of `object` until the handle is
    /// destroyed.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::Exhausted`] if no free slot is left; `object`
    /// is not retained.
    pub fn create(&self, object: Arc<T>) -> Result<Handle, HandleError> {
        let mut slots = self.slots.write();
        let tag = slots.tag;

        if let Some((index, generation)) = slots.pop_free() {
            slots.entries[index] = Slot::Occupied { generation, object };
            slots.live += 1;
            return Ok(Handle::new(tag, index, generation));
        }

        let index = slots.entries.len();
        if index >= self.max_slots {
            log::error!(
                "{} registry exhausted ({} slots), refusing to issue a handle",
                self.name,
                self.max_slots
            );
            return Err(HandleError::Exhausted {
                registry: self.name,
                max_slots: self.max_slots,
            });
        }

        slots.entries.push(Slot::Occupied {
            generation: 0,
            object,
        });
        slots.live += 1;
        Ok(Handle::new(tag, index, 0))
    }

    /// Get a new shared reference to the object behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::InvalidHandle`] if the handle was never issued
    /// by this registry or has been destroyed.
    pub fn resolve(&self, handle: Handle) -> Result<Arc<T>, HandleError> {
        let slots = self.slots.read();
        match slots.lookup(handle) {
            Some(object) => Ok(Arc::clone(object)),
            None => Err(self.invalid(handle.raw())),
        }
    }

    /// Resolve a raw value received across the boundary
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::InvalidHandle`] for zero, malformed or dead values.
    pub fn resolve_raw(&self, raw: u64) -> Result<Arc<T>, HandleError> {
        match Handle::from_raw(raw) {
            Some(handle) => self.resolve(handle),
            None => Err(self.invalid(raw)),
        }
    }

    /// Release the registry's reference and invalidate `handle`.
    ///
    /// The object itself is dropped only if no other holder remains, and never
    /// while the registry lock is held.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::InvalidHandle`] if the handle is unknown or was
    /// already destroyed. A second destroy is always rejected.
    pub fn destroy(&self, handle: Handle) -> Result<(), HandleError> {
        let released = {
            let mut slots = self.slots.write();
            if slots.lookup(handle).is_none() {
                return Err(self.invalid(handle.raw()));
            }

            let index = handle.slot();
            let generation = handle.generation();
            let next = if generation == u16::MAX {
                Slot::Retired
            } else {
                Slot::Vacant {
                    generation: generation + 1,
                    next_free: slots.free_head,
                }
            };
            let reusable = matches!(next, Slot::Vacant { .. });
            let previous = std::mem::replace(&mut slots.entries[index], next);
            if reusable {
                slots.free_head = index;
            } else {
                log::debug!("{} slot {index} retired after generation wrap", self.name);
            }
            slots.live -= 1;
            previous
        };

        drop(released);
        Ok(())
    }

    /// Check whether `handle` is currently live
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.slots.read().lookup(handle).is_some()
    }

    /// Number of live handles
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().live
    }

    /// Check if no handles are live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn invalid(&self, raw: u64) -> HandleError {
        log::error!("{} handle {raw:#x} used after destroy or never issued", self.name);
        HandleError::InvalidHandle {
            registry: self.name,
            raw,
        }
    }
}

impl<T: ?Sized> fmt::Debug for HandleRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("name", &self.name)
            .field("max_slots", &self.max_slots)
            .field("live", &self.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
