use std::rc::Rc;

use super::{Attrib, AttribSet, Geom};

/// A leaf holding drawable geometry.
#[derive(Debug, Clone, Default)]
pub struct GeomNode {
    pub name: String,
    pub geoms: Vec<Geom>,
}

impl GeomNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), geoms: Vec::new() }
    }

    pub fn with_geom(mut self, geom: Geom) -> Self {
        self.geoms.push(geom);
        self
    }
}

/// One scene-graph node.
///
/// When `decal` is set, the node's own geometry is the base surface and
/// every child is drawn as a decal layered onto it.
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub name: String,
    pub attribs: AttribSet,
    pub geometry: Option<Rc<GeomNode>>,
    pub children: Vec<Rc<SceneNode>>,
    pub decal: bool,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn with_attrib(mut self, attrib: Attrib) -> Self {
        self.attribs.set(attrib);
        self
    }

    pub fn with_geometry(mut self, geometry: GeomNode) -> Self {
        self.geometry = Some(Rc::new(geometry));
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(Rc::new(child));
        self
    }

    pub fn as_decal(mut self) -> Self {
        self.decal = true;
        self
    }

    /// Node count of this subtree.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(|c| c.count()).sum::<usize>()
    }
}
