//! Decals: geometry layered coplanar onto a base without depth fighting.
//!
//! `begin_decal(base)` / `end_decal(base)` bracket the decal geometry and
//! must balance. How the layering works is a [`DecalStrategy`] picked once
//! from the config when the guardian is built.

use super::GraphicsStateGuardian;
use crate::backend::{Backend, BlendFactor, Capability, ColorWrites};
use crate::scene::{AttribKind, GeomNode};

pub trait DecalStrategy<B: Backend> {
    /// Called after the nesting level went up to `level`.
    fn begin(&self, gsg: &mut GraphicsStateGuardian<B>, base: &GeomNode, level: u32);
    /// Called after the nesting level went down to `level`.
    fn end(&self, gsg: &mut GraphicsStateGuardian<B>, base: &GeomNode, level: u32);
    fn name(&self) -> &'static str;
}

/// Draws the base, then biases depth by `per_level × level` so decals at
/// the same depth win the depth test.
#[derive(Debug, Clone, Copy)]
pub struct DepthOffsetDecals {
    pub per_level: f32,
}

impl DepthOffsetDecals {
    fn apply<B: Backend>(&self, gsg: &mut GraphicsStateGuardian<B>, level: u32) {
        gsg.set_polygon_offset(0.0, self.per_level * level as f32);
    }
}

impl<B: Backend> DecalStrategy<B> for DepthOffsetDecals {
    fn begin(&self, gsg: &mut GraphicsStateGuardian<B>, base: &GeomNode, level: u32) {
        gsg.draw_geom_node(base);
        self.apply(gsg, level);
    }

    fn end(&self, gsg: &mut GraphicsStateGuardian<B>, _base: &GeomNode, level: u32) {
        if level == 0 {
            // Back to whatever offset the attributes ask for.
            gsg.reissue(AttribKind::PolygonOffset);
        } else {
            self.apply(gsg, level);
        }
    }

    fn name(&self) -> &'static str {
        "depth offset"
    }
}

/// How the three-pass strategy keeps its depth-only pass out of the color
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSuppression {
    /// All-false color write mask.
    Mask,
    /// Blending with (zero, one), for drivers with a broken color mask.
    Blend,
}

/// For backends without usable depth bias.
///
/// Outermost begin: depth writes off, base drawn, then every nested decal.
/// Outermost end: base drawn again with depth writes on and color
/// suppressed, purely to fix up the depth buffer. Nested levels only count.
#[derive(Debug, Clone, Copy)]
pub struct ThreePassDecals {
    pub suppress: ColorSuppression,
}

impl<B: Backend> DecalStrategy<B> for ThreePassDecals {
    fn begin(&self, gsg: &mut GraphicsStateGuardian<B>, base: &GeomNode, level: u32) {
        if level != 1 {
            return;
        }
        gsg.decal_depth_suppressed = true;
        gsg.set_depth_mask(false);
        gsg.draw_geom_node(base);
    }

    fn end(&self, gsg: &mut GraphicsStateGuardian<B>, base: &GeomNode, level: u32) {
        if level != 0 {
            return;
        }
        gsg.decal_depth_suppressed = false;
        gsg.set_depth_mask(true);
        match self.suppress {
            ColorSuppression::Mask => gsg.set_color_mask(ColorWrites::empty()),
            ColorSuppression::Blend => {
                gsg.enable(Capability::BLEND, true);
                gsg.set_blend_func(BlendFactor::Zero, BlendFactor::One);
            }
        }
        // Depth only; texturing would be wasted work.
        let textured = gsg.state.is_enabled(Capability::TEXTURE_2D);
        gsg.enable(Capability::TEXTURE_2D, false);
        gsg.draw_geom_node(base);
        gsg.enable(Capability::TEXTURE_2D, textured);

        gsg.reissue(AttribKind::DepthWrite);
        gsg.reissue(AttribKind::ColorMask);
        gsg.refresh_blending();
    }

    fn name(&self) -> &'static str {
        match self.suppress {
            ColorSuppression::Mask => "three-pass (mask)",
            ColorSuppression::Blend => "three-pass (blend)",
        }
    }
}

impl<B: Backend> GraphicsStateGuardian<B> {
    /// Starts a decal over `base`. The base is drawn here; the caller then
    /// draws the decal geometry and calls [`end_decal`](Self::end_decal).
    pub fn begin_decal(&mut self, base: &GeomNode) {
        self.decal_level += 1;
        log::trace!("begin decal over {:?}, level {}", base.name, self.decal_level);
        let strategy = self.decal.clone();
        strategy.begin(self, base, self.decal_level);
    }

    pub fn end_decal(&mut self, base: &GeomNode) {
        debug_assert!(self.decal_level > 0, "end_decal without begin_decal");
        self.decal_level = self.decal_level.saturating_sub(1);
        log::trace!("end decal over {:?}, level {}", base.name, self.decal_level);
        let strategy = self.decal.clone();
        strategy.end(self, base, self.decal_level);
    }

    pub fn decal_level(&self) -> u32 {
        self.decal_level
    }

    /// Depth bias currently in effect, zero when offset is off.
    pub fn depth_bias(&self) -> f32 {
        if self.state.is_enabled(Capability::POLYGON_OFFSET_FILL) {
            self.state.polygon_offset.1
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::super::test_util::*;
    use super::*;
    use crate::backend::recording::Call;
    use crate::backend::soft::SoftBackend;
    use crate::config::{DecalMode, GsgConfig};
    use crate::paint::Color;
    use std::rc::Rc;

    use crate::backend::PixelBuffer;
    use crate::scene::{
        Attrib, AttribSet, ColorAttrib, CompareMode, Geom, PolygonOffsetAttrib, Texture, TextureAttrib,
    };

    fn square(z: f32) -> GeomNode {
        GeomNode::new("square").with_geom(Geom::quads(vec![
            Vec3::new(-1.0, -1.0, z),
            Vec3::new(1.0, -1.0, z),
            Vec3::new(1.0, 1.0, z),
            Vec3::new(-1.0, 1.0, z),
        ]))
    }

    // ── depth offset ────────────────────────────────────────────────────

    #[test]
    fn nested_offsets_scale_with_level_and_unwind_to_zero() {
        let mut g = gsg(4, 4);
        let base = square(0.0);
        for k in 1..=4u32 {
            g.begin_decal(&base);
            assert_eq!(g.decal_level(), k);
            assert_eq!(g.depth_bias(), -2.0 * k as f32);
        }
        for k in (0..4u32).rev() {
            g.end_decal(&base);
            assert_eq!(g.decal_level(), k);
            assert_eq!(g.depth_bias(), -2.0 * k as f32);
        }
        assert_eq!(g.depth_bias(), 0.0);
        assert!(!g.state().is_enabled(Capability::POLYGON_OFFSET_FILL));
    }

    #[test]
    fn offset_draws_the_base_once_per_begin() {
        let mut g = gsg(4, 4);
        let base = square(0.0);
        g.begin_decal(&base);
        g.begin_decal(&base);
        g.end_decal(&base);
        g.end_decal(&base);
        assert_eq!(g.backend().count(|c| matches!(c, Call::Begin(_))), 2);
    }

    #[test]
    fn offset_decal_wins_on_the_same_plane() {
        let mut g = gsg(8, 8);
        g.set_view(Mat4::IDENTITY);
        let net = AttribSet::new()
            .with(Attrib::DepthTest(CompareMode::Less))
            .with(Attrib::Color(ColorAttrib::On(Color::rgb(1.0, 0.0, 0.0))));
        g.set_attribs(&net);
        g.clear(crate::backend::RenderBuffer::BACK | crate::backend::RenderBuffer::DEPTH);

        let base = square(0.0);
        g.begin_decal(&base);
        g.set_attribs(&net.clone().with(Attrib::Color(ColorAttrib::On(Color::rgb(0.0, 0.0, 1.0)))));
        g.draw_geom_node(&square(0.0));
        g.end_decal(&base);

        assert_eq!(g.backend().inner().pixel(4, 4), [0, 0, 255, 255]);
    }

    #[test]
    fn outermost_end_restores_the_attribute_offset() {
        let mut g = gsg(4, 4);
        g.issue(&Attrib::PolygonOffset(PolygonOffsetAttrib { units: 3.0, factor: 0.0 }));
        let base = square(0.0);
        g.begin_decal(&base);
        assert_eq!(g.depth_bias(), -2.0);
        g.end_decal(&base);
        assert_eq!(g.depth_bias(), 3.0);
        assert!(g.state().is_enabled(Capability::POLYGON_OFFSET_FILL));
    }

    // ── three-pass ──────────────────────────────────────────────────────

    fn three_pass(mode: DecalMode) -> TestGsg {
        gsg_with(SoftBackend::new(8, 8), GsgConfig { decal_mode: mode, ..GsgConfig::default() })
    }

    #[test]
    fn three_pass_mask_structure() {
        let mut g = three_pass(DecalMode::Mask);
        let base = square(0.0);
        g.begin_decal(&base);
        assert!(!g.state().depth_mask);
        g.begin_decal(&base);
        g.end_decal(&base);
        assert_eq!(g.backend().count(|c| matches!(c, Call::Begin(_))), 1);

        g.backend_mut().clear();
        g.end_decal(&base);
        let calls = g.backend().calls();
        let mask_off = calls.iter().position(|c| *c == Call::ColorMask(ColorWrites::empty())).unwrap();
        let redraw = calls.iter().position(|c| matches!(c, Call::Begin(_))).unwrap();
        let mask_on = calls.iter().rposition(|c| *c == Call::ColorMask(ColorWrites::ALL)).unwrap();
        assert!(calls.contains(&Call::DepthMask(true)));
        assert!(mask_off < redraw && redraw < mask_on);
        assert_eq!(g.state().color_mask, ColorWrites::ALL);
        assert!(g.state().depth_mask);
        assert_eq!(g.decal_level(), 0);
    }

    #[test]
    fn three_pass_blend_restores_blending() {
        let mut g = three_pass(DecalMode::Blend);
        let base = square(0.0);
        g.begin_decal(&base);
        g.end_decal(&base);
        assert!(g.backend().calls().contains(&Call::BlendFunc(BlendFactor::Zero, BlendFactor::One)));
        assert!(!g.state().is_enabled(Capability::BLEND));
    }

    #[test]
    fn three_pass_fixup_draws_untextured() {
        let mut g = three_pass(DecalMode::Mask);
        let tex = Rc::new(Texture::new("t", PixelBuffer::filled(2, 2, Color::WHITE)));
        g.issue(&Attrib::Texture(TextureAttrib::On(tex)));
        let base = square(0.0);
        g.begin_decal(&base);

        g.backend_mut().clear();
        g.end_decal(&base);
        let calls = g.backend().calls();
        let off = calls.iter().position(|c| *c == Call::Capability(Capability::TEXTURE_2D, false)).unwrap();
        let redraw = calls.iter().position(|c| matches!(c, Call::Begin(_))).unwrap();
        let on = calls.iter().rposition(|c| *c == Call::Capability(Capability::TEXTURE_2D, true)).unwrap();
        assert!(off < redraw && redraw < on);
        assert!(g.state().is_enabled(Capability::TEXTURE_2D));
    }

    #[test]
    fn three_pass_holds_depth_writes_for_nested_geometry() {
        let mut g = three_pass(DecalMode::Mask);
        let base = square(0.0);
        g.begin_decal(&base);
        g.issue(&Attrib::DepthWrite(true));
        assert!(!g.state().depth_mask);
        g.end_decal(&base);
        assert!(g.state().depth_mask);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "end_decal without begin_decal")]
    fn unbalanced_end_asserts() {
        let mut g = gsg(4, 4);
        g.end_decal(&square(0.0));
    }
}
