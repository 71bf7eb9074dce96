//! Frame driving: display regions, cameras and the scene walk.

use std::rc::Rc;

use glam::{Mat4, Vec3};

use super::GraphicsStateGuardian;
use crate::backend::{Backend, MatrixMode, RenderBuffer};
use crate::coords::Region;
use crate::paint::Color;
use crate::scene::{AttribKind, AttribSet, DepthFirstTraverser, SceneNode, Traverser};

/// Projection plus the world-to-eye view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub projection: Mat4,
    pub view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self { projection: Mat4::IDENTITY, view: Mat4::IDENTITY }
    }
}

impl Camera {
    /// Right-handed GL-style perspective, `fov_y` in radians.
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self { projection: Mat4::perspective_rh_gl(fov_y, aspect, near, far), view: Mat4::IDENTITY }
    }

    pub fn looking_at(mut self, eye: Vec3, target: Vec3, up: Vec3) -> Self {
        self.view = Mat4::look_at_rh(eye, target, up);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearRequest {
    pub buffers: RenderBuffer,
    pub color: Color,
    pub depth: f32,
}

impl ClearRequest {
    /// Color and depth of the back buffer.
    pub fn back_and_depth(color: Color) -> Self {
        Self { buffers: RenderBuffer::BACK | RenderBuffer::DEPTH, color, depth: 1.0 }
    }
}

/// One display region of a frame: where to draw, what to clear first, and
/// which scene to draw through which camera.
#[derive(Debug, Clone)]
pub struct RenderRegion {
    pub region: Region,
    pub clear: Option<ClearRequest>,
    pub camera: Camera,
    pub scene: Rc<SceneNode>,
}

impl<B: Backend> GraphicsStateGuardian<B> {
    /// Renders every region in order. Returns `false` without touching the
    /// backend when the context cannot be made current.
    pub fn render_frame(&mut self, regions: &[RenderRegion]) -> bool {
        self.texture_record.clear();
        self.lighting_enabled_this_frame = false;
        if !self.activate() {
            return false;
        }

        for r in regions {
            self.push_display_region(r.region);
            if let Some(clear) = r.clear {
                self.set_clear_color(clear.color);
                self.set_clear_depth(clear.depth);
                self.clear(clear.buffers);
            }
            self.render_scene(&r.scene, &r.camera);
            self.pop_display_region();
        }

        if self.lighting_enabled_this_frame {
            self.disable_all_lights();
        }
        log::trace!(
            "frame done: {} regions, {} textures applied",
            regions.len(),
            self.textures_applied_this_frame()
        );
        self.report_errors();
        true
    }

    /// Loads `camera` and walks `scene` depth first from the initial state.
    pub fn render_scene(&mut self, scene: &SceneNode, camera: &Camera) {
        self.load_matrix(MatrixMode::Projection, camera.projection);
        self.set_view(camera.view);
        let mut traverser = DepthFirstTraverser::default();
        self.render_subgraph(&mut traverser, scene, &AttribSet::initial());
    }

    /// Hands `node` to an external traverser with `net` as the inherited
    /// state.
    pub fn render_subgraph<T: Traverser<B>>(&mut self, traverser: &mut T, node: &SceneNode, net: &AttribSet) {
        traverser.traverse(self, node, net);
    }

    /// Switches cameras. Lights and clip planes live in view space, so a new
    /// view invalidates their uploads.
    pub fn set_view(&mut self, view: Mat4) {
        if self.view == view {
            return;
        }
        self.view = view;
        self.lights.clear_bindings();
        self.clip_planes.clear_bindings();
        self.reissue(AttribKind::Transform);
        self.reissue(AttribKind::Light);
        self.reissue(AttribKind::ClipPlane);
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use crate::backend::Capability;
    use crate::backend::recording::Call;
    use crate::scene::{Attrib, Binding, Geom, GeomNode, Light, LightAttrib, Texture, TextureAttrib};

    fn square(color: Color) -> GeomNode {
        GeomNode::new("square").with_geom(
            Geom::quads(vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ])
            .with_colors(Binding::Overall, vec![color])
            .with_normals(Binding::Overall, vec![Vec3::Z]),
        )
    }

    fn region(scene: SceneNode, at: Region, clear: Color) -> RenderRegion {
        RenderRegion {
            region: at,
            clear: Some(ClearRequest::back_and_depth(clear)),
            camera: Camera::default(),
            scene: Rc::new(scene),
        }
    }

    fn lit_scene() -> SceneNode {
        let light = Rc::new(Light::directional(Color::WHITE, Vec3::NEG_Z));
        SceneNode::new("root")
            .with_attrib(Attrib::Light(LightAttrib::new([light])))
            .with_geometry(square(Color::WHITE))
    }

    // ── frames ──────────────────────────────────────────────────────────

    #[test]
    fn frame_clears_then_draws() {
        let mut g = gsg(8, 8);
        let empty = region(SceneNode::new("empty"), Region::sized(8, 8), Color::rgb(0.0, 0.0, 1.0));
        assert!(g.render_frame(&[empty]));
        assert_eq!(g.backend().inner().pixel(3, 3), [0, 0, 255, 255]);

        let drawn = region(
            SceneNode::new("root").with_geometry(square(Color::rgb(1.0, 0.0, 0.0))),
            Region::sized(8, 8),
            Color::BLACK,
        );
        assert!(g.render_frame(&[drawn]));
        assert_eq!(g.backend().inner().pixel(3, 3), [255, 0, 0, 255]);
    }

    #[test]
    fn regions_are_independent() {
        let mut g = gsg(8, 4);
        let left = region(SceneNode::new("l"), Region::new(0, 0, 4, 4), Color::rgb(1.0, 0.0, 0.0));
        let right = region(SceneNode::new("r"), Region::new(4, 0, 4, 4), Color::rgb(0.0, 1.0, 0.0));
        g.render_frame(&[left, right]);
        assert_eq!(g.backend().inner().pixel(1, 1), [255, 0, 0, 255]);
        assert_eq!(g.backend().inner().pixel(6, 1), [0, 255, 0, 255]);
        assert_eq!(g.state().viewport, g.full_region());
    }

    #[test]
    fn lost_context_renders_nothing() {
        let mut g = gsg(4, 4);
        let _other = gsg(4, 4);
        g.backend_mut().inner_mut().lose_context();
        g.backend_mut().clear();
        let r = region(SceneNode::new("root"), Region::sized(4, 4), Color::WHITE);
        assert!(!g.render_frame(&[r]));
        assert_eq!(g.backend().count(|c| matches!(c, Call::Clear(_))), 0);
    }

    // ── per-frame lighting ──────────────────────────────────────────────

    #[test]
    fn lighting_is_off_between_frames() {
        let mut g = gsg(4, 4);
        let r = region(lit_scene(), Region::sized(4, 4), Color::BLACK);
        g.render_frame(std::slice::from_ref(&r));
        assert!(!g.state().is_enabled(Capability::LIGHTING));
        assert_eq!(g.enabled_light_slots(), 0);

        // The slot binding survives, so the next frame is a cache hit.
        g.render_frame(&[r]);
        assert_eq!(g.backend().count(|c| matches!(c, Call::Light(..))), 1);
        assert_eq!(g.backend().count(|c| matches!(c, Call::EnableLight(0, true))), 2);
    }

    #[test]
    fn new_view_reuploads_lights() {
        let mut g = gsg(4, 4);
        let light = Rc::new(Light::point(Color::WHITE, Vec3::ZERO));
        g.issue(&Attrib::Light(LightAttrib::new([light])));
        g.set_view(Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0)));
        g.set_view(Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0)));
        assert_eq!(g.backend().count(|c| matches!(c, Call::Light(..))), 2);
        assert_eq!(g.enabled_light_slots(), 1);
    }

    #[test]
    fn view_moves_the_modelview() {
        let mut g = gsg(4, 4);
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));
        let model = Mat4::from_translation(Vec3::X);
        g.issue(&Attrib::Transform(model));
        g.set_view(view);
        assert_eq!(g.state().modelview, view * model);
        assert_eq!(g.view(), view);
    }

    // ── texture record ──────────────────────────────────────────────────

    #[test]
    fn applied_textures_are_counted_per_frame() {
        let mut g = gsg(4, 4);
        let tex = Rc::new(Texture::new("t", crate::backend::PixelBuffer::filled(2, 2, Color::WHITE)));
        let scene = SceneNode::new("root")
            .with_attrib(Attrib::Texture(TextureAttrib::On(tex)))
            .with_geometry(square(Color::WHITE));
        g.render_frame(&[region(scene, Region::sized(4, 4), Color::BLACK)]);
        assert_eq!(g.textures_applied_this_frame(), 1);

        g.render_frame(&[]);
        assert_eq!(g.textures_applied_this_frame(), 0);
    }

    #[test]
    fn custom_traversers_drive_the_guardian() {
        struct Counter(usize);
        impl<B: Backend> Traverser<B> for Counter {
            fn traverse(&mut self, gsg: &mut GraphicsStateGuardian<B>, node: &SceneNode, net: &AttribSet) {
                self.0 += 1;
                gsg.set_attribs(&net.compose(&node.attribs));
                for child in &node.children {
                    self.traverse(gsg, child, net);
                }
            }
        }
        let mut g = gsg(4, 4);
        let scene = SceneNode::new("a").with_child(SceneNode::new("b")).with_child(SceneNode::new("c"));
        let mut counter = Counter(0);
        g.render_subgraph(&mut counter, &scene, &AttribSet::initial());
        assert_eq!(counter.0, 3);
    }
}
