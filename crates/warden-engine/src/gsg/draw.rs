//! Primitive draw dispatch.
//!
//! Draws assume the attributes are already issued. Each stream of the geom
//! is read through its own cursor, advanced at the stream's binding.

use glam::{Vec2, Vec3, Vec4};

use super::{ColorTransform, GraphicsStateGuardian};
use crate::backend::{Backend, Capability, PrimitiveKind, ShadeModel, TexGenCoord, TexGenMode};
use crate::paint::Color;
use crate::scene::{Binding, Cursor, Geom, GeomKind, GeomNode};

/// Streams actually emitted for one draw.
struct Issuer<'g> {
    colors: Option<(Binding, Cursor<'g, Color>)>,
    normals: Option<(Binding, Cursor<'g, Vec3>)>,
    texcoords: Option<(Binding, Cursor<'g, Vec2>)>,
    transform: Option<ColorTransform>,
}

fn transform_color(t: &ColorTransform, c: Color) -> Color {
    let rgb = t.matrix * Vec4::new(c.r, c.g, c.b, 1.0);
    Color::new(rgb.x, rgb.y, rgb.z, c.a * t.alpha_scale + t.alpha_offset).clamped()
}

impl Issuer<'_> {
    /// Emits every stream bound at `at`: color, normal, then texcoord.
    fn issue<B: Backend>(&mut self, backend: &mut B, at: Binding) {
        if let Some((binding, cursor)) = &mut self.colors
            && *binding == at
            && let Some(c) = cursor.next()
        {
            backend.color(self.transform.as_ref().map_or(c, |t| transform_color(t, c)));
        }
        if let Some((binding, cursor)) = &mut self.normals
            && *binding == at
            && let Some(n) = cursor.next()
        {
            backend.normal(n);
        }
        if let Some((binding, cursor)) = &mut self.texcoords
            && *binding == at
            && let Some(uv) = cursor.next()
        {
            backend.tex_coord(uv);
        }
    }

    fn varies_per_vertex(&self) -> bool {
        let per_vertex = |b: Binding| b == Binding::PerVertex;
        self.colors.as_ref().is_some_and(|(b, _)| per_vertex(*b))
            || self.normals.as_ref().is_some_and(|(b, _)| per_vertex(*b))
    }
}

impl<B: Backend> GraphicsStateGuardian<B> {
    fn wants_normals(&self) -> bool {
        self.state.is_enabled(Capability::LIGHTING)
            || (self.state.is_enabled(Capability::TEXTURE_GEN_S)
                && self.state.tex_gen[TexGenCoord::S.index()] == Some(TexGenMode::SphereMap))
    }

    fn wants_texcoords(&self) -> bool {
        self.state.is_enabled(Capability::TEXTURE_2D)
    }

    fn wants_colors(&self) -> bool {
        self.scene_color.is_none()
    }

    /// Sets up the shade model and anything emitted once per draw, and
    /// returns the issuer for the rest.
    fn start_draw<'g>(&mut self, geom: &'g Geom) -> Issuer<'g> {
        debug_assert!(geom.is_consistent(), "geom streams do not match its bindings");
        let live = |b: Binding| b != Binding::Off;
        let mut issuer = Issuer {
            colors: (self.wants_colors() && live(geom.colors.binding))
                .then(|| (geom.colors.binding, geom.colors.cursor())),
            normals: (self.wants_normals() && live(geom.normals.binding))
                .then(|| (geom.normals.binding, geom.normals.cursor())),
            texcoords: (self.wants_texcoords() && live(geom.texcoords.binding))
                .then(|| (geom.texcoords.binding, geom.texcoords.cursor())),
            transform: self.color_transform(),
        };

        let model = if issuer.varies_per_vertex() { ShadeModel::Smooth } else { ShadeModel::Flat };
        self.set_shade_model(model);

        // Without a color stream the scene color (or white) holds for the
        // whole draw.
        if issuer.colors.is_none() {
            let c = self.scene_color.unwrap_or(Color::WHITE);
            let c = issuer.transform.as_ref().map_or(c, |t| transform_color(t, c));
            self.backend.color(c);
        }
        issuer.issue(&mut self.backend, Binding::Overall);
        issuer
    }

    /// One `begin`/`end` around all primitives of a fixed-size kind.
    fn draw_independent(&mut self, geom: &Geom, kind: PrimitiveKind) {
        if geom.num_prims() == 0 {
            return;
        }
        let mut issuer = self.start_draw(geom);
        let mut coords = geom.coords();
        self.backend.begin(kind);
        for p in 0..geom.num_prims() {
            issuer.issue(&mut self.backend, Binding::PerPrimitive);
            issuer.issue(&mut self.backend, Binding::PerComponent);
            for _ in 0..geom.prim_len(p) {
                issuer.issue(&mut self.backend, Binding::PerVertex);
                if let Some(v) = coords.next() {
                    self.backend.vertex(v);
                }
            }
        }
        self.backend.end();
        self.report_errors();
    }

    /// One `begin`/`end` per primitive: polygons, strips and fans.
    fn draw_composite(&mut self, geom: &Geom, kind: PrimitiveKind) {
        if geom.num_prims() == 0 {
            return;
        }
        let lead = geom.kind().component_lead();
        let mut issuer = self.start_draw(geom);
        let mut coords = geom.coords();
        for p in 0..geom.num_prims() {
            issuer.issue(&mut self.backend, Binding::PerPrimitive);
            self.backend.begin(kind);
            for v in 0..geom.prim_len(p) {
                let starts_component = match lead {
                    Some(lead) => v == 0 || v > lead,
                    None => v == 0,
                };
                if starts_component {
                    issuer.issue(&mut self.backend, Binding::PerComponent);
                }
                issuer.issue(&mut self.backend, Binding::PerVertex);
                if let Some(v) = coords.next() {
                    self.backend.vertex(v);
                }
            }
            self.backend.end();
        }
        self.report_errors();
    }

    pub fn draw_point(&mut self, geom: &Geom) {
        self.set_point_size(geom.size);
        self.draw_independent(geom, PrimitiveKind::Points);
    }

    pub fn draw_line(&mut self, geom: &Geom) {
        self.set_line_width(geom.size);
        self.draw_independent(geom, PrimitiveKind::Lines);
    }

    pub fn draw_linestrip(&mut self, geom: &Geom) {
        self.set_line_width(geom.size);
        self.draw_composite(geom, PrimitiveKind::LineStrip);
    }

    pub fn draw_polygon(&mut self, geom: &Geom) {
        self.draw_composite(geom, PrimitiveKind::Polygon);
    }

    pub fn draw_tri(&mut self, geom: &Geom) {
        self.draw_independent(geom, PrimitiveKind::Triangles);
    }

    pub fn draw_quad(&mut self, geom: &Geom) {
        self.draw_independent(geom, PrimitiveKind::Quads);
    }

    pub fn draw_tristrip(&mut self, geom: &Geom) {
        self.draw_composite(geom, PrimitiveKind::TriangleStrip);
    }

    pub fn draw_trifan(&mut self, geom: &Geom) {
        self.draw_composite(geom, PrimitiveKind::TriangleFan);
    }

    pub fn draw_geom(&mut self, geom: &Geom) {
        match geom.kind() {
            GeomKind::Point => self.draw_point(geom),
            GeomKind::Line => self.draw_line(geom),
            GeomKind::LineStrip => self.draw_linestrip(geom),
            GeomKind::Polygon => self.draw_polygon(geom),
            GeomKind::Tri => self.draw_tri(geom),
            GeomKind::Quad => self.draw_quad(geom),
            GeomKind::TriStrip => self.draw_tristrip(geom),
            GeomKind::TriFan => self.draw_trifan(geom),
        }
    }

    pub fn draw_geom_node(&mut self, node: &GeomNode) {
        for geom in &node.geoms {
            self.draw_geom(geom);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::super::test_util::*;
    use super::*;
    use crate::backend::recording::Call;
    use crate::scene::{Attrib, ColorAttrib, Light, LightAttrib};

    fn tri() -> Vec<Vec3> {
        vec![Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)]
    }

    fn geometry(calls: &[Call]) -> Vec<Call> {
        calls.iter().filter(|c| c.is_geometry()).cloned().collect()
    }

    // ── stream cadence ──────────────────────────────────────────────────

    #[test]
    fn per_vertex_colors_precede_each_vertex() {
        let mut g = gsg(8, 8);
        let colors = vec![Color::rgb(1.0, 0.0, 0.0), Color::rgb(0.0, 1.0, 0.0), Color::rgb(0.0, 0.0, 1.0)];
        let geom = Geom::tris(tri()).with_colors(Binding::PerVertex, colors.clone());
        g.draw_tri(&geom);

        let calls = geometry(g.backend().calls());
        assert_eq!(calls[0], Call::Begin(PrimitiveKind::Triangles));
        for (i, c) in colors.iter().enumerate() {
            assert_eq!(calls[1 + i * 2], Call::Color(*c));
            assert!(matches!(calls[2 + i * 2], Call::Vertex(_)));
        }
        assert_eq!(calls.last(), Some(&Call::End));
        assert_eq!(g.state().shade_model, ShadeModel::Smooth);
    }

    #[test]
    fn overall_color_is_emitted_once_before_begin() {
        let mut g = gsg(8, 8);
        let geom = Geom::tris([tri(), tri()].concat()).with_colors(Binding::Overall, vec![Color::WHITE]);
        g.draw_tri(&geom);
        let calls = geometry(g.backend().calls());
        assert_eq!(calls[0], Call::Color(Color::WHITE));
        assert_eq!(calls[1], Call::Begin(PrimitiveKind::Triangles));
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::Color(_))).count(), 1);
        assert_eq!(g.state().shade_model, ShadeModel::Flat);
    }

    #[test]
    fn strips_issue_per_component_for_each_triangle() {
        let mut g = gsg(8, 8);
        let coords = vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
        ];
        let geom = Geom::tristrips(vec![5], coords).with_colors(Binding::PerComponent, vec![Color::WHITE; 3]);
        g.draw_tristrip(&geom);
        let calls = geometry(g.backend().calls());
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::Color(_))).count(), 3);
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::Begin(_))).count(), 1);
        // First component color comes before the first vertex.
        assert!(matches!(calls[1], Call::Color(_)));
    }

    #[test]
    fn polygons_get_their_own_begin() {
        let mut g = gsg(8, 8);
        let geom = Geom::polygons(vec![3, 4], vec![Vec3::ZERO; 7]);
        g.draw_geom(&geom);
        assert_eq!(g.backend().count(|c| matches!(c, Call::Begin(PrimitiveKind::Polygon))), 2);
    }

    // ── what gets emitted ───────────────────────────────────────────────

    #[test]
    fn scene_color_overrides_geometry_colors() {
        let mut g = gsg(8, 8);
        let red = Color::rgb(1.0, 0.0, 0.0);
        g.issue(&Attrib::Color(ColorAttrib::On(red)));
        let geom = Geom::tris(tri()).with_colors(Binding::PerVertex, vec![Color::WHITE; 3]);
        g.draw_tri(&geom);
        let colors: Vec<_> = g.backend().calls().iter().filter(|c| matches!(c, Call::Color(_))).cloned().collect();
        assert_eq!(colors, vec![Call::Color(red)]);
    }

    #[test]
    fn normals_only_when_lit() {
        let mut g = gsg(8, 8);
        let geom = Geom::tris(tri()).with_normals(Binding::PerVertex, vec![Vec3::Z; 3]);
        g.draw_tri(&geom);
        assert_eq!(g.backend().count(|c| matches!(c, Call::Normal(_))), 0);

        g.issue_light(&LightAttrib::new([Rc::new(Light::directional(Color::WHITE, Vec3::NEG_Z))]));
        g.backend_mut().clear();
        g.draw_tri(&geom);
        assert_eq!(g.backend().count(|c| matches!(c, Call::Normal(_))), 3);
    }

    #[test]
    fn color_transform_scales_emitted_colors() {
        let mut g = gsg(8, 8);
        g.issue(&Attrib::ColorTransform(glam::Mat4::from_scale(Vec3::splat(0.5))));
        g.issue(&Attrib::AlphaTransform { scale: 0.5, offset: 0.0 });
        g.draw_tri(&Geom::tris(tri()));
        assert!(g.backend().calls().contains(&Call::Color(Color::new(0.5, 0.5, 0.5, 0.5))));
    }

    #[test]
    fn points_set_their_size() {
        let mut g = gsg(8, 8);
        g.draw_geom(&Geom::points(vec![Vec3::ZERO]).with_size(4.0));
        assert_eq!(g.state().point_size, 4.0);
        assert_eq!(g.errors_reported(), 0);
    }

    #[test]
    fn draws_reach_the_framebuffer() {
        let mut g = gsg(8, 8);
        g.issue(&Attrib::Color(ColorAttrib::On(Color::rgb(0.0, 1.0, 0.0))));
        g.draw_geom(&Geom::quads(vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ]));
        assert_eq!(g.backend().inner().pixel(0, 0), [0, 255, 0, 255]);
        assert_eq!(g.backend().inner().pixel(7, 7), [0, 255, 0, 255]);
    }
}
