use crate::backend::Backend;
use crate::gsg::GraphicsStateGuardian;

use super::{AttribSet, SceneNode};

/// Walks a subgraph and feeds the guardian.
///
/// The order of visits is the traverser's business; the guardian only sees
/// the resulting stream of attribute sets and draws.
pub trait Traverser<B: Backend> {
    /// Visits `node` with `net` as the composed state of its ancestors.
    fn traverse(&mut self, gsg: &mut GraphicsStateGuardian<B>, node: &SceneNode, net: &AttribSet);
}

/// Children in order, parent geometry before children.
#[derive(Debug, Default)]
pub struct DepthFirstTraverser {
    pub visited: usize,
}

impl<B: Backend> Traverser<B> for DepthFirstTraverser {
    fn traverse(&mut self, gsg: &mut GraphicsStateGuardian<B>, node: &SceneNode, net: &AttribSet) {
        self.visited += 1;
        let net = net.compose(&node.attribs);

        match (&node.geometry, node.decal) {
            (Some(base), true) => {
                gsg.set_attribs(&net);
                gsg.begin_decal(base);
                for child in &node.children {
                    self.traverse(gsg, child, &net);
                }
                gsg.set_attribs(&net);
                gsg.end_decal(base);
            }
            (geometry, _) => {
                if let Some(geometry) = geometry {
                    gsg.set_attribs(&net);
                    gsg.draw_geom_node(geometry);
                }
                for child in &node.children {
                    self.traverse(gsg, child, &net);
                }
            }
        }
    }
}
