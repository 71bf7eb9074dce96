//! Scene-side collaborators of the guardian: attribute transitions, shared
//! lights, clip planes and textures, geometry batches and the node tree.

mod attrib;
mod geom;
mod light;
mod material;
mod node;
mod texture;
mod traverse;

pub use attrib::*;
pub use geom::{Binding, Cursor, Geom, GeomKind, Stream};
pub use light::{ClipPlane, Light};
pub use material::{Fog, FogMode, Material};
pub use node::{GeomNode, SceneNode};
pub use texture::{FilterType, Texture, WrapMode};
pub use traverse::{DepthFirstTraverser, Traverser};
