//! Clears, display regions, pixel transfer and frame-buffer save/restore.

use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3};

use super::GraphicsStateGuardian;
use crate::backend::{Backend, Capability, MatrixMode, PixelBuffer, PixelFormat, PrimitiveKind, RenderBuffer};
use crate::coords::Region;
use crate::paint::Color;
use crate::scene::{
    Attrib, AttribSet, ClipPlaneAttrib, ColorAttrib, ColorBlendMode, ColorMaskAttrib, CompareMode, CullFaceMode,
    FilterType, FogAttrib, LightAttrib, PolygonOffsetAttrib, RenderMode, RenderModeAttrib, StencilAction,
    StencilAttrib, TexGenAttrib, Texture, TextureApplyMode, TextureAttrib, TransparencyMode, WrapMode,
};

/// Captured planes of one display region, replayable with
/// [`GraphicsStateGuardian::restore_frame_buffer`].
#[derive(Debug)]
pub struct SavedFrameBuffer {
    pub buffer: RenderBuffer,
    pub region: Region,
    pub depth: Option<PixelBuffer>,
    pub color: Option<Rc<Texture>>,
}

impl<B: Backend> GraphicsStateGuardian<B> {
    fn default_color_buffer(&self) -> RenderBuffer {
        if self.limits.double_buffered { RenderBuffer::BACK } else { RenderBuffer::FRONT }
    }

    // ── clear ───────────────────────────────────────────────────────────

    /// Clears the planes of `buffer` this context has, with the cached clear
    /// values. Depth is cleared even when depth writes are off.
    pub fn clear(&mut self, buffer: RenderBuffer) {
        let planes = buffer & self.buffer_mask;
        if planes.is_empty() {
            return;
        }
        let prior_draw = self.state.draw_buffer;
        let color = planes.color_planes();
        if !color.is_empty() {
            self.set_draw_buffer(color);
        }
        let prior_mask = self.state.depth_mask;
        let depth = planes.contains(RenderBuffer::DEPTH);
        if depth {
            self.set_depth_mask(true);
        }

        self.backend.clear(planes);

        if depth {
            self.set_depth_mask(prior_mask);
        }
        self.set_draw_buffer(prior_draw);
        self.report_errors();
    }

    pub fn clear_region(&mut self, buffer: RenderBuffer, region: Region) {
        self.push_display_region(region);
        self.clear(buffer);
        self.pop_display_region();
    }

    // ── display regions ─────────────────────────────────────────────────

    pub fn push_display_region(&mut self, region: Region) {
        self.regions.push(region);
        self.apply_region(region);
    }

    pub fn pop_display_region(&mut self) {
        debug_assert!(!self.regions.is_empty(), "pop_display_region on an empty stack");
        self.regions.pop();
        let region = self.regions.last().copied().unwrap_or_else(|| self.full_region());
        self.apply_region(region);
    }

    pub fn current_region(&self) -> Region {
        self.regions.last().copied().unwrap_or_else(|| self.full_region())
    }

    /// Viewport plus scissor; a full-window region needs no scissor.
    fn apply_region(&mut self, region: Region) {
        self.set_viewport(region);
        if region.covers(self.full_region()) {
            self.enable(Capability::SCISSOR_TEST, false);
        } else {
            self.set_scissor(region);
            self.enable(Capability::SCISSOR_TEST, true);
        }
    }

    // ── pixel transfer ──────────────────────────────────────────────────

    /// Reads `region` into `pb`, from the plane its format names. Color
    /// reads come from `buffer` (default: the back buffer).
    pub fn copy_pixel_buffer(&mut self, pb: &mut PixelBuffer, region: Region, buffer: Option<RenderBuffer>) {
        self.issue(&Attrib::Texture(TextureAttrib::Off));
        if pb.format.is_color() {
            let buffer = buffer.unwrap_or_else(|| self.default_color_buffer()).color_planes();
            self.set_read_buffer(buffer);
        }
        self.backend.read_pixels(region, pb);
        self.report_errors();
    }

    /// Writes `pb` back at its origin. Depth buffers go to the depth plane
    /// only, color buffers to the color planes only.
    pub fn draw_pixel_buffer(&mut self, pb: &PixelBuffer, region: Region, buffer: Option<RenderBuffer>) {
        let saved = self.attribs.clone();
        self.issue(&Attrib::Light(LightAttrib::default()));
        self.issue(&Attrib::Texture(TextureAttrib::Off));
        self.issue(&Attrib::Transform(Mat4::IDENTITY));
        self.issue(&Attrib::Stencil(StencilAttrib {
            mode: CompareMode::None,
            action: StencilAction::Keep,
            reference: 0,
        }));
        if pb.format == PixelFormat::Depth {
            self.issue(&Attrib::ColorMask(ColorMaskAttrib::NONE));
            self.issue(&Attrib::DepthTest(CompareMode::Always));
            self.issue(&Attrib::DepthWrite(true));
        } else {
            self.issue(&Attrib::ColorMask(ColorMaskAttrib::ALL));
            self.issue(&Attrib::DepthTest(CompareMode::None));
            self.issue(&Attrib::DepthWrite(false));
        }

        self.push_display_region(region);
        let prior_draw = self.state.draw_buffer;
        if pb.format.is_color() {
            let buffer = buffer.unwrap_or_else(|| self.default_color_buffer()).color_planes();
            self.set_draw_buffer(buffer);
        }
        self.backend.draw_pixels(pb.x_origin, pb.y_origin, pb);
        self.set_draw_buffer(prior_draw);
        self.pop_display_region();

        self.set_attribs(&saved);
        self.report_errors();
    }

    /// Draws `texture` as a full-region quad with depth untouched. A texture
    /// carrying a requested size is sampled only over that part.
    pub fn draw_texture(&mut self, texture: &Rc<Texture>, region: Region, buffer: Option<RenderBuffer>) {
        let saved = self.attribs.clone();
        let overrides = AttribSet::new()
            .with(Attrib::CullFace(CullFaceMode::None))
            .with(Attrib::DepthTest(CompareMode::None))
            .with(Attrib::DepthWrite(false))
            .with(Attrib::Light(LightAttrib::default()))
            .with(Attrib::ClipPlane(ClipPlaneAttrib::default()))
            .with(Attrib::ColorBlend(ColorBlendMode::None))
            .with(Attrib::Transparency(TransparencyMode::None))
            .with(Attrib::Texture(TextureAttrib::On(texture.clone())))
            .with(Attrib::TextureApply(TextureApplyMode::Decal))
            .with(Attrib::TexGen(TexGenAttrib::None))
            .with(Attrib::TexMatrix(Mat4::IDENTITY))
            .with(Attrib::Transform(Mat4::IDENTITY))
            .with(Attrib::ColorTransform(Mat4::IDENTITY))
            .with(Attrib::AlphaTransform { scale: 1.0, offset: 0.0 })
            .with(Attrib::Fog(FogAttrib::Off))
            .with(Attrib::Color(ColorAttrib::Off))
            .with(Attrib::RenderMode(RenderModeAttrib { mode: RenderMode::Filled, line_width: 1.0 }))
            .with(Attrib::PolygonOffset(PolygonOffsetAttrib { units: 0.0, factor: 0.0 }));
        for attrib in overrides.iter() {
            self.issue(attrib);
        }

        let (mut u, mut v) = (1.0, 1.0);
        if let Some((rw, rh)) = texture.requested_size()
            && let Some(tc) = texture.context(self.id).and_then(|id| self.textures.get(&id))
        {
            let (w, h) = tc.size();
            u = (rw as f32 / w.max(1) as f32).min(1.0);
            v = (rh as f32 / h.max(1) as f32).min(1.0);
        }

        self.push_display_region(region);
        let prior_draw = self.state.draw_buffer;
        let prior_projection = self.state.projection;
        let prior_modelview = self.state.modelview;
        let buffer = buffer.unwrap_or_else(|| self.default_color_buffer()).color_planes();
        self.set_draw_buffer(buffer);
        self.load_matrix(MatrixMode::Projection, Mat4::orthographic_rh_gl(0.0, 1.0, 0.0, 1.0, -1.0, 1.0));
        // The identity transform above still carries the camera.
        self.load_matrix(MatrixMode::ModelView, Mat4::IDENTITY);

        self.backend.color(Color::WHITE);
        self.backend.begin(PrimitiveKind::Quads);
        for (uv, xy) in [
            (Vec2::new(0.0, 0.0), Vec3::new(0.0, 0.0, 0.0)),
            (Vec2::new(u, 0.0), Vec3::new(1.0, 0.0, 0.0)),
            (Vec2::new(u, v), Vec3::new(1.0, 1.0, 0.0)),
            (Vec2::new(0.0, v), Vec3::new(0.0, 1.0, 0.0)),
        ] {
            self.backend.tex_coord(uv);
            self.backend.vertex(xy);
        }
        self.backend.end();

        self.load_matrix(MatrixMode::ModelView, prior_modelview);
        self.load_matrix(MatrixMode::Projection, prior_projection);
        self.set_draw_buffer(prior_draw);
        self.pop_display_region();
        self.set_attribs(&saved);
        self.report_errors();
    }

    /// Copies `texture`'s image into `pb`. A texture whose contents live
    /// only on the GPU is rendered into `region` and read back.
    pub fn texture_to_pixel_buffer(&mut self, texture: &Rc<Texture>, pb: &mut PixelBuffer, region: Option<Region>) {
        {
            let image = texture.image();
            if image.has_data() {
                *pb = image.clone();
                return;
            }
        }
        let region = region.unwrap_or_else(|| {
            let (w, h) = texture.requested_size().unwrap_or_else(|| {
                let image = texture.image();
                (image.width, image.height)
            });
            Region::sized(w, h)
        });
        self.draw_texture(texture, region, None);
        self.copy_pixel_buffer(pb, region, None);
    }

    // ── save / restore ──────────────────────────────────────────────────

    /// Captures the depth plane into a pixel buffer and the back color plane
    /// into a texture, for whichever of the two `buffer` names.
    pub fn save_frame_buffer(&mut self, buffer: RenderBuffer, region: Region) -> SavedFrameBuffer {
        let mut saved = SavedFrameBuffer { buffer, region, depth: None, color: None };

        if buffer.contains(RenderBuffer::DEPTH) {
            let mut pb = PixelBuffer::depth(region.width, region.height);
            self.copy_pixel_buffer(&mut pb, region, None);
            saved.depth = Some(pb);
        }

        let back = buffer & RenderBuffer::BACK;
        if !back.is_empty() {
            let texture = Rc::new(
                Texture::empty("saved frame buffer", region.width, region.height, PixelFormat::Rgb8)
                    .with_wrap(WrapMode::Clamp, WrapMode::Clamp)
                    .with_filters(FilterType::Nearest, FilterType::Nearest),
            );
            self.set_read_buffer(back);
            self.copy_texture(&texture, region);
            saved.color = Some(texture);
        }
        saved
    }

    /// Replays a capture: color first, then depth, so whatever draws next
    /// depth-tests against the captured scene.
    pub fn restore_frame_buffer(&mut self, saved: &SavedFrameBuffer) {
        if let Some(texture) = &saved.color {
            self.draw_texture(texture, saved.region, Some(saved.buffer & RenderBuffer::BACK));
        }
        if let Some(depth) = &saved.depth {
            self.draw_pixel_buffer(depth, saved.region, None);
        }
    }

    /// Releases the GPU side of a capture.
    pub fn discard_frame_buffer(&mut self, saved: SavedFrameBuffer) {
        if let Some(id) = saved.color.as_ref().and_then(|t| t.context(self.id)) {
            self.release_texture(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use crate::backend::recording::Call;
    use crate::scene::Geom;

    fn paint_scene(g: &mut TestGsg) {
        g.issue(&Attrib::DepthTest(CompareMode::Less));
        g.set_clear_color(Color::rgb(0.1, 0.2, 0.3));
        g.clear(RenderBuffer::BACK | RenderBuffer::DEPTH);
        let tri = |z: f32, c: Color| {
            Geom::tris(vec![Vec3::new(-1.0, -1.0, z), Vec3::new(1.0, -1.0, z), Vec3::new(-0.2, 0.9, z)])
                .with_colors(crate::scene::Binding::Overall, vec![c])
        };
        g.draw_geom(&tri(0.3, Color::rgb(1.0, 0.5, 0.0)));
        g.issue(&Attrib::Transform(Mat4::from_rotation_z(0.7)));
        g.draw_geom(&tri(-0.4, Color::rgb(0.0, 0.5, 1.0)));
        g.issue(&Attrib::Transform(Mat4::IDENTITY));
    }

    // ── clear ───────────────────────────────────────────────────────────

    #[test]
    fn clear_values_are_cached() {
        let mut g = gsg(4, 4);
        g.set_clear_color(Color::BLACK);
        g.set_clear_color(Color::BLACK);
        assert_eq!(g.backend().count(|c| matches!(c, Call::ClearColor(_))), 1);
    }

    #[test]
    fn depth_clear_forces_writes_and_restores_mask() {
        let mut g = gsg(4, 4);
        g.issue(&Attrib::DepthWrite(false));
        g.backend_mut().inner_mut().clear_depth(0.25);
        g.clear(RenderBuffer::DEPTH);
        assert_eq!(g.backend().inner().depth_at(1, 1), 0.25);
        assert!(!g.state().depth_mask);
        assert!(!g.backend().inner().depth_write_enabled());
    }

    #[test]
    fn unsupported_planes_are_skipped() {
        let mut g = gsg(4, 4);
        g.backend_mut().clear();
        g.clear(RenderBuffer::FRONT_RIGHT);
        assert!(g.backend().calls().is_empty());
    }

    #[test]
    fn clear_region_scissors_and_restores() {
        let mut g = gsg(8, 8);
        g.set_clear_color(Color::WHITE);
        g.clear_region(RenderBuffer::BACK, Region::new(2, 2, 2, 2));
        assert_eq!(g.backend().inner().pixel(2, 2), [255, 255, 255, 255]);
        assert_ne!(g.backend().inner().pixel(0, 0), [255, 255, 255, 255]);
        assert!(!g.state().is_enabled(Capability::SCISSOR_TEST));
        assert_eq!(g.state().viewport, Region::sized(8, 8));
    }

    // ── pixel transfer ──────────────────────────────────────────────────

    #[test]
    fn copy_pixel_buffer_reads_the_region() {
        let mut g = gsg(4, 4);
        g.set_clear_color(Color::rgb(0.0, 1.0, 0.0));
        g.clear(RenderBuffer::BACK);
        let mut pb = PixelBuffer::empty(0, 0, PixelFormat::Rgba8);
        g.copy_pixel_buffer(&mut pb, Region::new(1, 1, 2, 3), None);
        assert_eq!((pb.width, pb.height, pb.x_origin, pb.y_origin), (2, 3, 1, 1));
        assert_eq!(pb.rgba_at(1, 2), Some([0, 255, 0, 255]));
        assert!(!g.state().is_enabled(Capability::TEXTURE_2D));
    }

    #[test]
    fn draw_pixel_buffer_restores_attributes() {
        let mut g = gsg(4, 4);
        g.issue(&Attrib::DepthTest(CompareMode::Less));
        g.issue(&Attrib::DepthWrite(false));
        let before = g.attribs().clone();
        let pb = PixelBuffer::filled(2, 2, Color::WHITE);
        g.draw_pixel_buffer(&pb, Region::sized(4, 4), None);
        assert_eq!(g.backend().inner().pixel(1, 1), [255, 255, 255, 255]);
        assert_eq!(g.attribs(), &before);
        assert!(g.state().is_enabled(Capability::DEPTH_TEST));
    }

    #[test]
    fn draw_texture_clamps_to_the_requested_size() {
        let mut g = gsg(8, 8);
        let tex = Rc::new(Texture::empty("t", 1, 1, PixelFormat::Rgb8));
        g.copy_texture(&tex, Region::sized(6, 3));
        g.backend_mut().clear();
        g.draw_texture(&tex, Region::sized(6, 3), None);
        let uvs: Vec<_> = g
            .backend()
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::TexCoord(uv) => Some(*uv),
                _ => None,
            })
            .collect();
        assert_eq!(uvs[2], Vec2::new(6.0 / 8.0, 3.0 / 4.0));
    }

    // ── save / restore ──────────────────────────────────────────────────

    #[test]
    fn save_then_restore_reproduces_both_planes() {
        let mut g = gsg(16, 12);
        paint_scene(&mut g);
        let color_before = g.backend().inner().back_rgba().to_vec();
        let depth_before = g.backend().inner().depth_plane().to_vec();

        let region = g.full_region();
        let saved = g.save_frame_buffer(RenderBuffer::BACK | RenderBuffer::DEPTH, region);
        assert!(saved.depth.is_some() && saved.color.is_some());

        // Wreck both planes.
        g.set_clear_color(Color::BLACK);
        g.set_clear_depth(0.0);
        g.clear(RenderBuffer::BACK | RenderBuffer::DEPTH);

        g.restore_frame_buffer(&saved);
        assert_eq!(g.backend().inner().back_rgba(), color_before.as_slice());
        for (a, b) in g.backend().inner().depth_plane().iter().zip(&depth_before) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
        assert_eq!(g.errors_reported(), 0);

        g.discard_frame_buffer(saved);
        assert_eq!(g.prepared_textures(), 0);
    }

    #[test]
    fn restore_leaves_guardian_state_alone() {
        let mut g = gsg(8, 8);
        paint_scene(&mut g);
        let attribs = g.attribs().clone();
        let saved = g.save_frame_buffer(RenderBuffer::BACK | RenderBuffer::DEPTH, Region::new(2, 2, 4, 4));
        g.restore_frame_buffer(&saved);
        assert_eq!(g.attribs(), &attribs);
        assert_eq!(g.state().viewport, Region::sized(8, 8));
    }

    #[test]
    fn texture_to_pixel_buffer_copies_cpu_images() {
        let mut g = gsg(4, 4);
        let tex = Rc::new(Texture::new("t", PixelBuffer::filled(2, 2, Color::WHITE)));
        let mut pb = PixelBuffer::empty(0, 0, PixelFormat::Rgba8);
        g.texture_to_pixel_buffer(&tex, &mut pb, None);
        assert_eq!(pb, *tex.image());
    }

    #[test]
    fn texture_to_pixel_buffer_reads_back_gpu_only_textures() {
        let mut g = gsg(8, 8);
        g.set_clear_color(Color::rgb(1.0, 0.0, 0.0));
        g.clear(RenderBuffer::BACK);
        let tex = Rc::new(Texture::empty("t", 1, 1, PixelFormat::Rgb8).with_filters(FilterType::Nearest, FilterType::Nearest));
        g.copy_texture(&tex, Region::sized(3, 3));
        g.set_clear_color(Color::BLACK);
        g.clear(RenderBuffer::BACK);

        let mut pb = PixelBuffer::empty(0, 0, PixelFormat::Rgba8);
        g.texture_to_pixel_buffer(&tex, &mut pb, None);
        assert_eq!((pb.width, pb.height), (3, 3));
        assert_eq!(pb.rgba_at(2, 2), Some([255, 0, 0, 255]));
    }
}
