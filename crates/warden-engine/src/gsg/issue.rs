//! Attribute issuance: one handler per transition kind.
//!
//! Handlers work only through the cached setters in `state.rs`, so issuing a
//! value equal to the current one reaches the backend zero times.

use glam::Mat4;

use super::mapping::{self, BlendPlan};
use super::state::projector_planes;
use super::{ColorTransform, GraphicsStateGuardian};
use crate::backend::{
    Backend, Capability, ColorMaterial, ColorWrites, MaterialParams, MatrixMode, StencilOperation, TexGenCoord,
    TexGenMode,
};
use crate::scene::{
    Attrib, AttribKind, AttribSet, ColorAttrib, ColorBlendMode, ColorMaskAttrib, CompareMode, CullFaceMode, FogAttrib,
    MaterialAttrib, PointShape, PolygonOffsetAttrib, RenderModeAttrib, StencilAttrib, TexGenAttrib, TextureApplyMode,
    TextureAttrib, TransparencyMode,
};

impl<B: Backend> GraphicsStateGuardian<B> {
    /// Brings the guardian to the net state `net`. Kinds missing from `net`
    /// go back to their initial value; kinds already current are skipped.
    pub fn set_attribs(&mut self, net: &AttribSet) {
        for kind in AttribKind::ALL {
            let wanted = net.get(kind).cloned().unwrap_or_else(|| Attrib::initial(kind));
            if self.attribs.get(kind) != Some(&wanted) {
                self.issue(&wanted);
            }
        }
    }

    /// Attribute of `kind` currently in effect.
    pub fn current_attrib(&self, kind: AttribKind) -> Attrib {
        self.attribs.get(kind).cloned().unwrap_or_else(|| Attrib::initial(kind))
    }

    /// Issues one attribute unconditionally (the handlers still skip
    /// backend calls for axes that do not change).
    pub fn issue(&mut self, attrib: &Attrib) {
        self.attribs.set(attrib.clone());
        match attrib {
            Attrib::Transform(m) => self.issue_transform(*m),
            Attrib::ColorTransform(m) => self.issue_color_transform(*m),
            Attrib::AlphaTransform { scale, offset } => self.issue_alpha_transform(*scale, *offset),
            Attrib::TexMatrix(m) => self.issue_tex_matrix(*m),
            Attrib::Color(c) => self.issue_color(*c),
            Attrib::Texture(t) => self.issue_texture(t),
            Attrib::TexGen(t) => self.issue_tex_gen(*t),
            Attrib::Material(m) => self.issue_material(*m),
            Attrib::Fog(f) => self.issue_fog(*f),
            Attrib::RenderMode(r) => self.issue_render_mode(*r),
            Attrib::Light(l) => self.issue_light(l),
            Attrib::ClipPlane(c) => self.issue_clip_plane(c),
            Attrib::ColorBlend(_) => self.issue_color_blend(),
            Attrib::Transparency(t) => self.issue_transparency(*t),
            Attrib::TextureApply(t) => self.issue_texture_apply(*t),
            Attrib::ColorMask(m) => self.issue_color_mask(*m),
            Attrib::DepthTest(m) => self.issue_depth_test(*m),
            Attrib::DepthWrite(w) => self.issue_depth_write(*w),
            Attrib::Stencil(s) => self.issue_stencil(*s),
            Attrib::CullFace(c) => self.issue_cull_face(*c),
            Attrib::LineSmooth(on) => self.enable(Capability::LINE_SMOOTH, *on),
            Attrib::PointShape(p) => self.issue_point_shape(*p),
            Attrib::PolygonOffset(p) => self.issue_polygon_offset(*p),
        }
    }

    /// Issues the current value of `kind` again, e.g. after a multi-pass
    /// trick overrode its axes behind the attribute's back.
    pub(crate) fn reissue(&mut self, kind: AttribKind) {
        let attrib = self.current_attrib(kind);
        self.issue(&attrib);
    }

    // ── transforms ──────────────────────────────────────────────────────

    pub fn issue_transform(&mut self, transform: Mat4) {
        self.transform = transform;
        self.load_matrix(MatrixMode::ModelView, self.view * transform);
    }

    pub fn issue_color_transform(&mut self, matrix: Mat4) {
        self.color_transform.matrix = matrix;
    }

    pub fn issue_alpha_transform(&mut self, scale: f32, offset: f32) {
        self.color_transform.alpha_scale = scale;
        self.color_transform.alpha_offset = offset;
    }

    pub fn issue_tex_matrix(&mut self, matrix: Mat4) {
        self.load_matrix(MatrixMode::Texture, matrix);
    }

    // ── color and texture ───────────────────────────────────────────────

    pub fn issue_color(&mut self, color: ColorAttrib) {
        self.scene_color = match color {
            ColorAttrib::Off => None,
            ColorAttrib::On(c) => Some(c),
        };
    }

    pub fn issue_texture(&mut self, texture: &TextureAttrib) {
        match texture {
            TextureAttrib::Off => self.enable(Capability::TEXTURE_2D, false),
            TextureAttrib::On(tex) => {
                let tc = self.prepare(tex);
                self.apply_texture(tc);
                self.enable(Capability::TEXTURE_2D, true);
            }
        }
    }

    pub fn issue_texture_apply(&mut self, mode: TextureApplyMode) {
        self.set_tex_env(mapping::tex_env(mode));
    }

    pub fn issue_tex_gen(&mut self, tex_gen: TexGenAttrib) {
        match tex_gen {
            TexGenAttrib::None => {
                for coord in TexGenCoord::ALL {
                    self.set_tex_gen(coord, None);
                }
            }
            TexGenAttrib::TextureProjector(m) => {
                let planes = projector_planes(&m);
                for coord in TexGenCoord::ALL {
                    self.set_tex_gen(coord, Some(TexGenMode::ObjectLinear(planes[coord.index()])));
                }
            }
            TexGenAttrib::SphereMap => {
                self.set_tex_gen(TexGenCoord::S, Some(TexGenMode::SphereMap));
                self.set_tex_gen(TexGenCoord::T, Some(TexGenMode::SphereMap));
                self.set_tex_gen(TexGenCoord::R, None);
                self.set_tex_gen(TexGenCoord::Q, None);
            }
            TexGenAttrib::Unknown(mode) => log::error!("unknown texture generation mode {mode}"),
        }
    }

    // ── surface ─────────────────────────────────────────────────────────

    pub fn issue_material(&mut self, material: MaterialAttrib) {
        let m = match material {
            MaterialAttrib::Off => crate::scene::Material::default(),
            MaterialAttrib::On(m) => m,
        };
        // Whichever of ambient and diffuse is absent follows the vertex color.
        let tracking = match (m.ambient.is_some(), m.diffuse.is_some()) {
            (true, true) => None,
            (true, false) => Some(ColorMaterial::Diffuse),
            (false, true) => Some(ColorMaterial::Ambient),
            (false, false) => Some(ColorMaterial::AmbientAndDiffuse),
        };
        self.set_color_material(tracking);
        self.set_material(MaterialParams {
            ambient: m.ambient,
            diffuse: m.diffuse,
            specular: m.specular,
            emission: m.emission,
            shininess: m.shininess,
        });
        self.set_local_viewer(m.local);
        self.set_two_side(m.two_side);
    }

    pub fn issue_fog(&mut self, fog: FogAttrib) {
        match fog {
            FogAttrib::Off => self.enable(Capability::FOG, false),
            FogAttrib::On(f) => {
                self.set_fog(mapping::fog(&f));
                self.enable(Capability::FOG, true);
            }
        }
    }

    pub fn issue_render_mode(&mut self, render_mode: RenderModeAttrib) {
        let Some(mode) = mapping::polygon_mode(render_mode.mode) else {
            log::error!("unknown render mode {:?}", render_mode.mode);
            return;
        };
        self.set_polygon_mode(mode);
        if mode == crate::backend::PolygonMode::Line {
            self.set_line_width(render_mode.line_width);
        }
    }

    pub fn issue_cull_face(&mut self, mode: CullFaceMode) {
        match mapping::cull_face(mode) {
            Some(None) => self.enable(Capability::CULL_FACE, false),
            Some(Some(face)) => {
                self.enable(Capability::CULL_FACE, true);
                self.set_cull_face(face);
            }
            None => log::error!("unknown cull face mode {mode:?}"),
        }
    }

    pub fn issue_point_shape(&mut self, shape: PointShape) {
        self.enable(Capability::POINT_SMOOTH, shape == PointShape::Round);
    }

    /// Any non-zero offset uploads with factor 1; zero turns it off.
    pub fn issue_polygon_offset(&mut self, offset: PolygonOffsetAttrib) {
        if offset.units == 0.0 && offset.factor == 0.0 {
            self.set_polygon_offset(0.0, 0.0);
        } else {
            self.set_polygon_offset(1.0, offset.units);
        }
    }

    // ── per-fragment tests ──────────────────────────────────────────────

    pub fn issue_depth_test(&mut self, mode: CompareMode) {
        match mapping::compare_function(mode) {
            None => self.enable(Capability::DEPTH_TEST, false),
            Some(func) => {
                self.enable(Capability::DEPTH_TEST, true);
                self.set_depth_func(func);
            }
        }
    }

    /// Held off while a three-pass decal owns the depth mask.
    pub fn issue_depth_write(&mut self, write: bool) {
        self.set_depth_mask(write && !self.decal_depth_suppressed);
    }

    pub fn issue_stencil(&mut self, stencil: StencilAttrib) {
        match mapping::compare_function(stencil.mode) {
            None => self.enable(Capability::STENCIL_TEST, false),
            Some(func) => {
                self.enable(Capability::STENCIL_TEST, true);
                self.set_stencil_func(func, stencil.reference);
                let pass = mapping::stencil_operation(stencil.action);
                self.set_stencil_op(StencilOperation::Keep, StencilOperation::Keep, pass);
            }
        }
    }

    pub fn issue_color_mask(&mut self, mask: ColorMaskAttrib) {
        let mut writes = ColorWrites::empty();
        writes.set(ColorWrites::RED, mask.red);
        writes.set(ColorWrites::GREEN, mask.green);
        writes.set(ColorWrites::BLUE, mask.blue);
        writes.set(ColorWrites::ALPHA, mask.alpha);
        self.set_color_mask(writes);
    }

    // ── blending ────────────────────────────────────────────────────────

    pub fn issue_color_blend(&mut self) {
        self.refresh_blending();
    }

    pub fn issue_transparency(&mut self, mode: TransparencyMode) {
        let Some(plan) = mapping::transparency(mode) else {
            log::error!("unknown transparency mode {mode:?}");
            return;
        };
        self.enable(Capability::SAMPLE_ALPHA_TO_ONE, plan.alpha_to_one);
        self.enable(Capability::SAMPLE_ALPHA_TO_COVERAGE, plan.alpha_to_coverage);
        match plan.alpha_test {
            Some((func, reference)) => {
                self.enable(Capability::ALPHA_TEST, true);
                self.set_alpha_func(func, reference);
            }
            None => self.enable(Capability::ALPHA_TEST, false),
        }
        self.refresh_blending();
    }

    /// Resolves blending from the current color-blend and transparency
    /// attributes. An explicit color blend wins; with none, transparency
    /// decides. Unknown modes leave blending as it was.
    pub(crate) fn refresh_blending(&mut self) {
        let color_blend = match self.current_attrib(AttribKind::ColorBlend) {
            Attrib::ColorBlend(mode) => mode,
            _ => ColorBlendMode::None,
        };
        let plan = match mapping::color_blend(color_blend) {
            Some(BlendPlan::Off) => match self.current_attrib(AttribKind::Transparency) {
                Attrib::Transparency(t) => mapping::transparency(t).map(|p| p.blend),
                _ => Some(BlendPlan::Off),
            },
            Some(plan) => Some(plan),
            None => {
                log::error!("unknown color blend mode {color_blend:?}");
                None
            }
        };
        match plan {
            Some(BlendPlan::Off) => self.enable(Capability::BLEND, false),
            Some(BlendPlan::On(src, dst)) => {
                self.enable(Capability::BLEND, true);
                self.set_blend_func(src, dst);
            }
            None => {}
        }
    }

    pub(crate) fn color_transform(&self) -> Option<ColorTransform> {
        (!self.color_transform.is_identity()).then_some(self.color_transform)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use glam::Vec3;

    use super::super::test_util::*;
    use super::*;
    use crate::backend::recording::Call;
    use crate::backend::{BlendFactor, CompareFunction, CullFace, PolygonMode};
    use crate::paint::Color;
    use crate::scene::{Fog, Material, RenderMode, StencilAction};

    fn every_kind() -> Vec<Attrib> {
        vec![
            Attrib::Transform(Mat4::from_translation(Vec3::X)),
            Attrib::TexMatrix(Mat4::from_scale(Vec3::splat(2.0))),
            Attrib::TexGen(TexGenAttrib::SphereMap),
            Attrib::Material(MaterialAttrib::On(Material::diffuse(Color::rgb(1.0, 0.0, 0.0)))),
            Attrib::Fog(FogAttrib::On(Fog::linear(1.0, 5.0, Color::WHITE))),
            Attrib::RenderMode(RenderModeAttrib { mode: RenderMode::Wireframe, line_width: 3.0 }),
            Attrib::ColorBlend(ColorBlendMode::Add),
            Attrib::Transparency(TransparencyMode::Binary),
            Attrib::TextureApply(TextureApplyMode::Replace),
            Attrib::ColorMask(ColorMaskAttrib { red: true, green: false, blue: true, alpha: false }),
            Attrib::DepthTest(CompareMode::LessEqual),
            Attrib::DepthWrite(false),
            Attrib::Stencil(StencilAttrib { mode: CompareMode::Equal, action: StencilAction::Replace, reference: 3 }),
            Attrib::CullFace(CullFaceMode::All),
            Attrib::LineSmooth(true),
            Attrib::PointShape(PointShape::Round),
            Attrib::PolygonOffset(PolygonOffsetAttrib { units: 4.0, factor: 0.0 }),
        ]
    }

    // ── idempotence ─────────────────────────────────────────────────────

    #[test]
    fn reissuing_any_attribute_emits_nothing() {
        let mut g = gsg(8, 8);
        for attrib in every_kind() {
            g.issue(&attrib);
            let first = g.backend().calls().len();
            assert!(first > 0, "{attrib:?} emitted nothing");
            g.backend_mut().clear();
            g.issue(&attrib);
            assert_eq!(g.backend().calls(), &[], "{attrib:?} was not idempotent");
        }
    }

    #[test]
    fn set_attribs_twice_is_silent() {
        let mut g = gsg(8, 8);
        let net: AttribSet = every_kind().into_iter().collect();
        g.set_attribs(&net);
        g.backend_mut().clear();
        g.set_attribs(&net);
        assert!(g.backend().calls().is_empty());
    }

    #[test]
    fn missing_kinds_revert_to_initial() {
        let mut g = gsg(8, 8);
        g.set_attribs(&AttribSet::new().with(Attrib::DepthTest(CompareMode::Less)));
        assert!(g.state().is_enabled(Capability::DEPTH_TEST));
        g.set_attribs(&AttribSet::new());
        assert!(!g.state().is_enabled(Capability::DEPTH_TEST));
    }

    // ── disable-not-neutral policy ──────────────────────────────────────

    #[test]
    fn none_modes_disable_features() {
        let mut g = gsg(8, 8);
        g.issue_depth_test(CompareMode::Greater);
        assert_eq!(g.state().depth_func, CompareFunction::Greater);
        g.backend_mut().clear();
        g.issue_depth_test(CompareMode::None);
        assert_eq!(g.backend().calls(), &[Call::Capability(Capability::DEPTH_TEST, false)]);

        g.issue_polygon_offset(PolygonOffsetAttrib { units: 2.0, factor: 9.0 });
        assert_eq!(g.state().polygon_offset, (1.0, 2.0));
        g.issue_polygon_offset(PolygonOffsetAttrib { units: 0.0, factor: 0.0 });
        assert!(!g.state().is_enabled(Capability::POLYGON_OFFSET_FILL));
    }

    #[test]
    fn cull_modes() {
        let mut g = gsg(8, 8);
        g.issue_cull_face(CullFaceMode::CounterClockwise);
        assert_eq!(g.state().cull_face, CullFace::Front);
        g.issue_cull_face(CullFaceMode::Clockwise);
        assert_eq!(g.state().cull_face, CullFace::Back);
        g.backend_mut().clear();
        g.issue_cull_face(CullFaceMode::Unknown(42));
        assert!(g.backend().calls().is_empty());
        assert!(g.state().is_enabled(Capability::CULL_FACE));
    }

    // ── blending ────────────────────────────────────────────────────────

    #[test]
    fn unknown_color_blend_keeps_prior_blending() {
        let mut g = gsg(8, 8);
        g.issue(&Attrib::ColorBlend(ColorBlendMode::Add));
        assert_eq!(g.state().blend_func, (BlendFactor::One, BlendFactor::One));
        g.backend_mut().clear();
        g.issue(&Attrib::ColorBlend(ColorBlendMode::Unknown(9)));
        assert!(g.backend().calls().is_empty());
        assert!(g.state().is_enabled(Capability::BLEND));
    }

    #[test]
    fn color_blend_wins_over_transparency() {
        let mut g = gsg(8, 8);
        g.issue(&Attrib::Transparency(TransparencyMode::Alpha));
        assert_eq!(g.state().blend_func, (BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha));
        g.issue(&Attrib::ColorBlend(ColorBlendMode::Multiply));
        assert_eq!(g.state().blend_func, (BlendFactor::Dst, BlendFactor::Zero));
        g.issue(&Attrib::ColorBlend(ColorBlendMode::None));
        assert_eq!(g.state().blend_func, (BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha));
        g.issue(&Attrib::Transparency(TransparencyMode::None));
        assert!(!g.state().is_enabled(Capability::BLEND));
    }

    #[test]
    fn binary_transparency_uses_alpha_test() {
        let mut g = gsg(8, 8);
        g.issue(&Attrib::Transparency(TransparencyMode::Binary));
        assert!(g.state().is_enabled(Capability::ALPHA_TEST));
        assert_eq!(g.state().alpha_func, (CompareFunction::Equal, 1.0));
        assert!(!g.state().is_enabled(Capability::BLEND));
    }

    // ── surface ─────────────────────────────────────────────────────────

    #[test]
    fn material_presence_selects_color_material() {
        let mut g = gsg(8, 8);
        let m = Material { ambient: Some(Color::BLACK), ..Material::default() };
        g.issue_material(MaterialAttrib::On(m));
        assert!(g.state().is_enabled(Capability::COLOR_MATERIAL));
        assert_eq!(g.state().color_material, ColorMaterial::Diffuse);

        g.issue_material(MaterialAttrib::On(Material::diffuse(Color::WHITE)));
        assert!(!g.state().is_enabled(Capability::COLOR_MATERIAL));
    }

    #[test]
    fn wireframe_sets_line_width() {
        let mut g = gsg(8, 8);
        g.issue_render_mode(RenderModeAttrib { mode: RenderMode::Wireframe, line_width: 2.5 });
        assert_eq!(g.state().polygon_mode, PolygonMode::Line);
        assert_eq!(g.state().line_width, 2.5);
    }

    #[test]
    fn tex_gen_modes() {
        let mut g = gsg(8, 8);
        g.issue_tex_gen(TexGenAttrib::TextureProjector(Mat4::IDENTITY));
        for coord in TexGenCoord::ALL {
            assert!(g.state().is_enabled(coord.capability()));
        }
        g.issue_tex_gen(TexGenAttrib::SphereMap);
        assert!(g.state().is_enabled(Capability::TEXTURE_GEN_T));
        assert!(!g.state().is_enabled(Capability::TEXTURE_GEN_R));
        g.issue_tex_gen(TexGenAttrib::None);
        assert!(!g.state().is_enabled(Capability::TEXTURE_GEN_S));
    }

    #[test]
    fn texture_attrib_prepares_once() {
        let mut g = gsg(8, 8);
        let tex = Rc::new(crate::scene::Texture::new("t", crate::backend::PixelBuffer::filled(2, 2, Color::WHITE)));
        g.issue_texture(&TextureAttrib::On(tex.clone()));
        g.issue_texture(&TextureAttrib::Off);
        g.issue_texture(&TextureAttrib::On(tex.clone()));
        assert_eq!(g.backend().count(|c| matches!(c, Call::GenTexture(_))), 1);
        assert!(tex.is_prepared_on(g.id()));
    }

    #[test]
    fn transform_includes_view() {
        let mut g = gsg(8, 8);
        g.issue_transform(Mat4::from_translation(Vec3::Y));
        assert_eq!(g.state().modelview, Mat4::from_translation(Vec3::Y));
    }
}
