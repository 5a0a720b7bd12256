//! Opaque handle values
//!
//! A handle is the only thing that crosses the boundary: a plain non-zero
//! integer with no type or lifetime information attached. The value carries
//! the tag of the registry that issued it, so a handle presented to any other
//! registry is rejected instead of resolving to an unrelated object.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU16, Ordering};

/// Mask selecting the slot part of a raw handle value
const SLOT_MASK: u64 = 0xFFFF_FFFF;

/// Bit offset of the generation
const GENERATION_SHIFT: u32 = 32;

/// Bit offset of the registry tag
const TAG_SHIFT: u32 = 48;

/// Largest number of slots a registry can address
pub(crate) const MAX_SLOTS: usize = (u32::MAX - 1) as usize;

/// Next registry tag to hand out
static NEXT_TAG: AtomicU16 = AtomicU16::new(1);

/// Allocate a registry tag. Zero is never issued.
pub(crate) fn next_registry_tag() -> u16 {
    loop {
        let tag = NEXT_TAG.fetch_add(1, Ordering::Relaxed);
        if tag != 0 {
            return tag;
        }
    }
}

/// An opaque handle to an object stored in a [`HandleRegistry`].
///
/// The raw value packs `(tag << 48) | (generation << 32) | (slot + 1)`. It is
/// never zero, a value from a destroyed handle never matches the slot's next
/// occupant, and handles from different registries never compare equal.
///
/// [`HandleRegistry`]: super::HandleRegistry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(NonZeroU64);

impl Handle {
    /// Build a handle for a registry tag, slot and generation
    pub(crate) fn new(tag: u16, slot: usize, generation: u16) -> Self {
        debug_assert!(slot < MAX_SLOTS, "handle slot index out of range");
        let packed = (u64::from(tag) << TAG_SHIFT)
            | (u64::from(generation) << GENERATION_SHIFT)
            | (slot as u64 & SLOT_MASK);
        Self(NonZeroU64::MIN.saturating_add(packed))
    }

    /// Reinterpret a raw value received from the other side of the boundary.
    ///
    /// Returns `None` for values no registry can ever have issued.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        if raw & SLOT_MASK == 0 || raw >> TAG_SHIFT == 0 {
            return None;
        }
        match NonZeroU64::new(raw) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// The raw integer passed across the boundary
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0.get()
    }

    /// Tag of the registry that issued this handle
    #[must_use]
    pub(crate) const fn tag(self) -> u16 {
        (self.0.get() >> TAG_SHIFT) as u16
    }

    /// Slot index inside the owning registry
    #[must_use]
    pub(crate) const fn slot(self) -> usize {
        ((self.0.get() & SLOT_MASK) - 1) as usize
    }

    /// Generation of the slot when this handle was issued
    #[must_use]
    pub(crate) const fn generation(self) -> u16 {
        (self.0.get() >> GENERATION_SHIFT) as u16
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.raw())
    }
}
