//! Self-contained stand-ins for the engine-side collaborators of a labelling
//! session: a projected scene graph, simulated world tracking, billboard
//! textures, the asset catalogue and the debug text sink.

pub mod camera;
pub mod graph;
pub mod label_texture;
pub mod library;
pub mod tracking;

pub use camera::{PinholeCamera, Ray};
pub use graph::{OBJECT_FOOTPRINT_M, SceneGraph, SceneNode, SceneNodeKind};
pub use label_texture::rasterize_label;
pub use library::{AssetLibrary, DEFAULT_OBJECT_ASSET, DebugText};
pub use tracking::{FEATURE_TOLERANCE_M, HorizontalPlane, SimulatedTracking};
