//! Typed registries for scene resources

use std::sync::Arc;

use super::geometry::Geometry;
use super::material::Material;
use crate::handles::HandleRegistry;

/// The registries through which scene resources cross the boundary.
///
/// Cloning is cheap and every clone shares the same tables, so loaders and
/// nodes on different threads agree on every handle.
#[derive(Debug, Clone)]
pub struct NativeRegistries {
    materials: Arc<HandleRegistry<Material>>,
    geometries: Arc<HandleRegistry<Geometry>>,
}

impl NativeRegistries {
    /// Create empty registries
    #[must_use]
    pub fn new() -> Self {
        Self {
            materials: Arc::new(HandleRegistry::new("material")),
            geometries: Arc::new(HandleRegistry::new("geometry")),
        }
    }

    /// Bundle existing registries, for example ones created with a slot limit
    #[must_use]
    pub fn with_registries(
        materials: Arc<HandleRegistry<Material>>,
        geometries: Arc<HandleRegistry<Geometry>>,
    ) -> Self {
        Self {
            materials,
            geometries,
        }
    }

    /// Material registry
    #[must_use]
    pub fn materials(&self) -> &Arc<HandleRegistry<Material>> {
        &self.materials
    }

    /// Geometry registry
    #[must_use]
    pub fn geometries(&self) -> &Arc<HandleRegistry<Geometry>> {
        &self.geometries
    }

    /// Total live handles across all registries
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.materials.len() + self.geometries.len()
    }
}

impl Default for NativeRegistries {
    fn default() -> Self {
        Self::new()
    }
}
