//! Scene graph nodes
//!
//! A node owns its geometry handle and its child subgraph. Dropping or
//! disposing a node releases everything below it.

use std::sync::Arc;

use super::geometry::Geometry;
use crate::handles::ScopedHandle;

/// Default light and shadow mask for new nodes
const DEFAULT_BIT_MASK: u32 = 1;

/// A node in the scene graph
#[derive(Debug)]
pub struct Node {
    /// Node name
    name: String,
    /// Attached geometry, owned through its handle
    geometry: Option<ScopedHandle<Geometry>>,
    /// Owned children
    children: Vec<Node>,
    /// Lights whose mask intersects this one illuminate the node
    light_receiving_bit_mask: u32,
    /// Lights whose mask intersects this one cast shadows from the node
    shadow_casting_bit_mask: u32,
    /// One-way disposal flag
    disposed: bool,
}

impl Node {
    /// Create an empty node
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            geometry: None,
            children: Vec::new(),
            light_receiving_bit_mask: DEFAULT_BIT_MASK,
            shadow_casting_bit_mask: DEFAULT_BIT_MASK,
            disposed: false,
        }
    }

    /// Builder form of [`Node::add_child`]
    #[must_use]
    pub fn with_child(mut self, child: Node) -> Self {
        self.add_child(child);
        self
    }

    /// Builder form of [`Node::set_geometry`]
    #[must_use]
    pub fn with_geometry(mut self, geometry: ScopedHandle<Geometry>) -> Self {
        self.set_geometry(Some(geometry));
        self
    }

    /// Node name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attached geometry, if any
    #[must_use]
    pub fn geometry(&self) -> Option<Arc<Geometry>> {
        self.geometry.as_ref().map(ScopedHandle::shared)
    }

    /// Attach or detach a geometry. A replaced geometry's handle is destroyed.
    pub fn set_geometry(&mut self, geometry: Option<ScopedHandle<Geometry>>) {
        self.geometry = geometry;
    }

    /// Detach the geometry, returning its owned handle
    pub fn take_geometry(&mut self) -> Option<ScopedHandle<Geometry>> {
        self.geometry.take()
    }

    /// Add a child node
    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Detach every child, returning them to the caller
    pub fn remove_all_children(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.children)
    }

    /// Direct children
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.iter()
    }

    /// Number of direct children
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Number of nodes below this one
    #[must_use]
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// Light receiving mask
    #[must_use]
    pub const fn light_receiving_bit_mask(&self) -> u32 {
        self.light_receiving_bit_mask
    }

    /// Shadow casting mask
    #[must_use]
    pub const fn shadow_casting_bit_mask(&self) -> u32 {
        self.shadow_casting_bit_mask
    }

    /// Set the light receiving mask, optionally for the whole subgraph
    pub fn set_light_receiving_bit_mask(&mut self, mask: u32, recursive: bool) {
        self.light_receiving_bit_mask = mask;
        if recursive {
            for child in &mut self.children {
                child.set_light_receiving_bit_mask(mask, true);
            }
        }
    }

    /// Set the shadow casting mask, optionally for the whole subgraph
    pub fn set_shadow_casting_bit_mask(&mut self, mask: u32, recursive: bool) {
        self.shadow_casting_bit_mask = mask;
        if recursive {
            for child in &mut self.children {
                child.set_shadow_casting_bit_mask(mask, true);
            }
        }
    }

    /// Release the geometry and children. Disposal cannot be undone.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.geometry = None;
        self.children.clear();
    }

    /// Check whether the node has been disposed
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }
}
