//! Standalone geometry produced by single-mesh model formats

use std::sync::Arc;

use parking_lot::RwLock;

use super::material::Material;

/// A native geometry attached to a node.
///
/// The material list can be replaced at runtime, for example to inject
/// materials into an OBJ model that shipped without an MTL file.
#[derive(Debug)]
pub struct Geometry {
    /// Geometry name from the model file
    name: String,
    /// Number of vertices in the geometry
    vertex_count: usize,
    /// Materials applied to the geometry's elements
    materials: RwLock<Vec<Arc<Material>>>,
}

impl Geometry {
    /// Create a geometry
    pub fn new(name: impl Into<String>, vertex_count: usize, materials: Vec<Arc<Material>>) -> Self {
        Self {
            name: name.into(),
            vertex_count,
            materials: RwLock::new(materials),
        }
    }

    /// Geometry name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of vertices
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Snapshot of the current materials
    #[must_use]
    pub fn materials(&self) -> Vec<Arc<Material>> {
        self.materials.read().clone()
    }

    /// Replace the materials
    pub fn set_materials(&self, materials: Vec<Arc<Material>>) {
        *self.materials.write() = materials;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_materials() {
        let geometry = Geometry::new("cube", 24, Vec::new());
        assert!(geometry.materials().is_empty());

        geometry.set_materials(vec![Arc::new(Material::default())]);
        assert_eq!(geometry.materials().len(), 1);
        assert_eq!(geometry.vertex_count(), 24);
        assert_eq!(geometry.name(), "cube");
    }
}
