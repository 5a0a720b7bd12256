//! Load requests and outcomes

use std::fmt;

use rustc_hash::FxHashMap;

use crate::handles::ScopedHandle;
use crate::scene::{Geometry, Material, Node};

// ============================================================================
// Request Id
// ============================================================================

/// Identifies one load attempt on one node.
///
/// Ids start at zero (no load issued yet) and only ever grow, so a completion
/// carrying an older id can always be recognized as superseded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// The id of a node that has never loaded anything
    pub const NONE: Self = Self(0);

    /// Wrap a raw id received from a loader
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The id following this one, or `None` once the id space is exhausted
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Model Kind
// ============================================================================

/// Supported model formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// OBJ, optionally with MTL materials. Loads as a single geometry.
    Obj,
    /// FBX (converted ahead of time). Loads as a node subgraph.
    Fbx,
}

impl ModelKind {
    /// Map the native `is_fbx` flag to a kind
    #[must_use]
    pub const fn from_is_fbx(is_fbx: bool) -> Self {
        if is_fbx { Self::Fbx } else { Self::Obj }
    }

    /// Whether models of this kind produce one standalone geometry that is
    /// attached directly to the loading node
    #[must_use]
    pub const fn yields_standalone_geometry(self) -> bool {
        matches!(self, Self::Obj)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Obj => write!(f, "OBJ"),
            Self::Fbx => write!(f, "FBX"),
        }
    }
}

// ============================================================================
// Model Source
// ============================================================================

/// Where a model is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A model URI. Textures and other resources sit next to it.
    Uri(String),
    /// A bundled model resource plus a map from resource names referenced by
    /// the model file to the URIs they resolve to
    Resources {
        /// Model resource name
        model: String,
        /// Referenced resource name to URI
        resources: FxHashMap<String, String>,
    },
}

impl ModelSource {
    /// Create a URI source
    pub fn uri(uri: impl Into<String>) -> Self {
        Self::Uri(uri.into())
    }

    /// Create a bundled resource source
    pub fn resources<K, V>(model: impl Into<String>, resources: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Resources {
            model: model.into(),
            resources: resources
                .into_iter()
                .map(|(name, uri)| (name.into(), uri.into()))
                .collect(),
        }
    }

    /// The model URI or resource name
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            Self::Uri(uri) => uri,
            Self::Resources { model, .. } => model,
        }
    }

    /// Resolve a resource referenced by the model file
    #[must_use]
    pub fn resolve_resource(&self, name: &str) -> Option<&str> {
        match self {
            Self::Uri(_) => None,
            Self::Resources { resources, .. } => resources.get(name).map(String::as_str),
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uri(uri) => write!(f, "{uri}"),
            Self::Resources { model, resources } => {
                write!(f, "{model} (+{} resources)", resources.len())
            }
        }
    }
}

// ============================================================================
// Requests and Outcomes
// ============================================================================

/// One dispatched load.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// What to load
    pub source: ModelSource,
    /// Requested format
    pub kind: ModelKind,
    /// Id the completion must carry
    pub request_id: RequestId,
}

/// Resources produced by a successful load, already registered as handles.
#[derive(Debug, Default)]
pub struct LoadedModel {
    /// Every unique material used by the model, in load order
    pub materials: Vec<ScopedHandle<Material>>,
    /// Standalone geometry (single-geometry formats)
    pub geometry: Option<ScopedHandle<Geometry>>,
    /// Node subgraph (hierarchical formats)
    pub children: Vec<Node>,
}

/// Result of a load, as reported by the loader.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The model loaded
    Success {
        /// Loaded resources
        model: LoadedModel,
        /// Format the loader actually produced
        kind: ModelKind,
    },
    /// The model failed to load
    Failure {
        /// Error description from the loader
        message: String,
    },
}
