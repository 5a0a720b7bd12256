//! Material system for loaded models

use glam::Vec3;

/// Surface properties of a loaded model.
///
/// Model loaders name materials after the names found in the model file,
/// which is usually the easiest way to find one to modify at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Name assigned by the model loader
    pub name: String,
    /// Base color
    pub color: Vec3,
    /// Specular reflectivity (0.0 - 1.0)
    pub specular: f32,
    /// Shininess exponent
    pub shininess: f32,
    /// Diffuse texture, relative to the model's base path
    pub diffuse_texture: Option<String>,
}

impl Material {
    /// Create a new material with a name and color
    pub fn new(name: impl Into<String>, color: Vec3) -> Self {
        Self {
            name: name.into(),
            color,
            specular: 0.5,
            shininess: 32.0,
            diffuse_texture: None,
        }
    }

    /// Create a diffuse material (no specular)
    pub fn diffuse(name: impl Into<String>, color: Vec3) -> Self {
        Self {
            specular: 0.0,
            shininess: 1.0,
            ..Self::new(name, color)
        }
    }

    /// Create a textured material with white tint
    pub fn textured(name: impl Into<String>, texture: impl Into<String>) -> Self {
        Self {
            diffuse_texture: Some(texture.into()),
            ..Self::new(name, Vec3::ONE)
        }
    }

    /// Set the specular strength
    #[must_use]
    pub fn with_specular(mut self, specular: f32) -> Self {
        self.specular = specular.clamp(0.0, 1.0);
        self
    }

    /// Set the shininess
    #[must_use]
    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess.max(1.0);
        self
    }

    /// Whether this material samples a texture
    #[must_use]
    pub fn is_textured(&self) -> bool {
        self.diffuse_texture.is_some()
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default", Vec3::new(0.8, 0.8, 0.8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_clamp() {
        let material = Material::new("steel", Vec3::splat(0.6))
            .with_specular(3.0)
            .with_shininess(0.0);

        assert!((material.specular - 1.0).abs() < f32::EPSILON);
        assert!((material.shininess - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_textured() {
        let material = Material::textured("body", "body_diffuse.png");
        assert!(material.is_textured());
        assert_eq!(material.color, Vec3::ONE);
        assert!(!Material::default().is_textured());
    }
}
