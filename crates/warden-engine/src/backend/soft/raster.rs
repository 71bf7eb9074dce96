//! Vertex processing, primitive assembly, rasterization and per-fragment
//! operations for the software backend.

use glam::{Mat3, Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

use super::planes::Planes;
use super::{SoftBackend, MAX_CLIP_PLANES};
use crate::backend::*;
use crate::paint::Color;

/// Depth change of one polygon-offset unit.
const DEPTH_UNIT: f32 = 1.0 / (1u32 << 20) as f32;

/// A vertex after transform, lighting and texgen.
#[derive(Debug, Clone, Copy)]
pub(super) struct Vertex {
    clip: Vec4,
    color: Vec4,
    uv: Vec2,
    eye_depth: f32,
    clip_dist: [f32; MAX_CLIP_PLANES],
}

/// Window-space vertex.
#[derive(Clone, Copy)]
struct Win {
    pos: Vec3,
    inv_w: f32,
    v: Vertex,
}

struct Fragment {
    color: Vec4,
    uv: Vec2,
    eye_depth: f32,
    clip_dist: [f32; MAX_CLIP_PLANES],
}

impl Fragment {
    fn of(v: &Vertex) -> Self {
        Self { color: v.color, uv: v.uv, eye_depth: v.eye_depth, clip_dist: v.clip_dist }
    }

    /// Perspective-correct blend of vertices with normalized weights.
    fn blend(vs: [&Vertex; 3], w: [f32; 3]) -> Self {
        let mix = |f: &dyn Fn(&Vertex) -> f32| f(vs[0]) * w[0] + f(vs[1]) * w[1] + f(vs[2]) * w[2];
        Self {
            color: vs[0].color * w[0] + vs[1].color * w[1] + vs[2].color * w[2],
            uv: vs[0].uv * w[0] + vs[1].uv * w[1] + vs[2].uv * w[2],
            eye_depth: mix(&|v| v.eye_depth),
            clip_dist: std::array::from_fn(|i| mix(&|v| v.clip_dist[i])),
        }
    }
}

impl SoftBackend {
    // ── vertex stage ─────────────────────────────────────────────────────

    pub(super) fn process_vertex(&self, position: Vec3) -> Vertex {
        let f = &self.fixed;
        let obj = position.extend(1.0);
        let eye = f.modelview * obj;
        let clip = f.projection * eye;

        let mut normal = Mat3::from_mat4(f.modelview).inverse().transpose() * self.current.normal;
        if f.caps.contains(Capability::NORMALIZE) {
            normal = normal.normalize_or_zero();
        }

        let color = if f.caps.contains(Capability::LIGHTING) {
            self.light_vertex(eye, normal)
        } else {
            self.current.color
        };

        let mut clip_dist = [0.0; MAX_CLIP_PLANES];
        for (i, (&on, plane)) in f.clip_on.iter().zip(&f.clip_planes).enumerate() {
            if on {
                clip_dist[i] = plane.dot(eye);
            }
        }

        Vertex {
            clip,
            color: color.clamp(Vec4::ZERO, Vec4::ONE),
            uv: self.gen_tex_coord(obj, eye, normal),
            eye_depth: eye.z.abs(),
            clip_dist,
        }
    }

    fn light_vertex(&self, eye: Vec4, n: Vec3) -> Vec4 {
        let f = &self.fixed;
        let m = &f.material;
        let current = self.current.color;

        let mut ambient = m.ambient.unwrap_or(Color::rgb(0.2, 0.2, 0.2)).to_vec4();
        let mut diffuse = m.diffuse.unwrap_or(Color::rgb(0.8, 0.8, 0.8)).to_vec4();
        if f.caps.contains(Capability::COLOR_MATERIAL) {
            match f.color_material {
                ColorMaterial::Ambient => ambient = current,
                ColorMaterial::Diffuse => diffuse = current,
                ColorMaterial::AmbientAndDiffuse => {
                    ambient = current;
                    diffuse = current;
                }
            }
        }

        let p = if eye.w != 0.0 { eye.xyz() / eye.w } else { eye.xyz() };
        let view = if f.local_viewer { (-p).normalize_or_zero() } else { Vec3::Z };

        let mut rgb = m.emission.rgb_vec() + f.light_ambient.rgb_vec() * ambient.xyz();
        for (light, _) in f.lights.iter().zip(&f.light_on).filter(|(_, on)| **on) {
            let (l, attenuation) = if light.position.w == 0.0 {
                (light.position.xyz().normalize_or_zero(), 1.0)
            } else {
                let d = light.position.xyz() / light.position.w - p;
                let dist = d.length();
                let [k0, k1, k2] = light.attenuation;
                let denom = k0 + k1 * dist + k2 * dist * dist;
                (d.normalize_or_zero(), if denom > 0.0 { 1.0 / denom } else { 1.0 })
            };

            let spot = if light.spot_cutoff >= 180.0 {
                1.0
            } else {
                let cos = (-l).dot(light.spot_direction.normalize_or_zero());
                if cos < light.spot_cutoff.to_radians().cos() {
                    0.0
                } else {
                    cos.max(0.0).powf(light.spot_exponent)
                }
            };

            let n_dot_l = n.dot(l).max(0.0);
            let mut term = light.ambient.rgb_vec() * ambient.xyz() + light.diffuse.rgb_vec() * diffuse.xyz() * n_dot_l;
            if n_dot_l > 0.0 {
                let h = (l + view).normalize_or_zero();
                let s = n.dot(h).max(0.0).powf(m.shininess);
                term += light.specular.rgb_vec() * m.specular.rgb_vec() * s;
            }
            rgb += term * attenuation * spot;
        }
        rgb.extend(diffuse.w)
    }

    fn gen_tex_coord(&self, obj: Vec4, eye: Vec4, n: Vec3) -> Vec2 {
        let f = &self.fixed;
        let mut stq = Vec4::new(self.current.uv.x, self.current.uv.y, 0.0, 1.0);

        let sphere = || {
            let u = eye.xyz().normalize_or_zero();
            let r = u - 2.0 * n.dot(u) * n;
            let m = 2.0 * (r.x * r.x + r.y * r.y + (r.z + 1.0) * (r.z + 1.0)).sqrt();
            if m > 0.0 { Vec2::new(r.x / m + 0.5, r.y / m + 0.5) } else { Vec2::splat(0.5) }
        };

        for coord in TexGenCoord::ALL {
            if !f.caps.contains(coord.capability()) {
                continue;
            }
            let i = coord.index();
            stq[i] = match f.tex_gen[i] {
                TexGenMode::ObjectLinear(plane) => plane.dot(obj),
                TexGenMode::SphereMap => match coord {
                    TexGenCoord::S => sphere().x,
                    TexGenCoord::T => sphere().y,
                    _ => stq[i],
                },
            };
        }

        let t = f.texture_matrix * stq;
        if t.w != 0.0 { t.xy() / t.w } else { t.xy() }
    }

    // ── primitive assembly ───────────────────────────────────────────────

    pub(super) fn assemble(&mut self, kind: PrimitiveKind, verts: &[Vertex]) {
        let n = verts.len();
        match kind {
            PrimitiveKind::Points => {
                for v in verts {
                    self.draw_point(v);
                }
            }
            PrimitiveKind::Lines => {
                for pair in verts.chunks_exact(2) {
                    self.draw_line(&pair[0], &pair[1]);
                }
            }
            PrimitiveKind::LineStrip => {
                for pair in verts.windows(2) {
                    self.draw_line(&pair[0], &pair[1]);
                }
            }
            PrimitiveKind::Triangles => {
                for tri in verts.chunks_exact(3) {
                    self.draw_polygon(tri, 2);
                }
            }
            PrimitiveKind::TriangleStrip => {
                for i in 0..n.saturating_sub(2) {
                    // Odd triangles swap their first two vertices to keep the winding.
                    let tri = if i % 2 == 0 {
                        [verts[i], verts[i + 1], verts[i + 2]]
                    } else {
                        [verts[i + 1], verts[i], verts[i + 2]]
                    };
                    self.draw_polygon(&tri, 2);
                }
            }
            PrimitiveKind::TriangleFan => {
                for i in 1..n.saturating_sub(1) {
                    self.draw_polygon(&[verts[0], verts[i], verts[i + 1]], 2);
                }
            }
            PrimitiveKind::Quads => {
                for quad in verts.chunks_exact(4) {
                    self.draw_polygon(quad, 3);
                }
            }
            PrimitiveKind::Polygon => {
                if n >= 3 {
                    self.draw_polygon(verts, 0);
                }
            }
        }
    }

    fn to_window(&self, v: &Vertex) -> Option<Win> {
        if v.clip.w <= 0.0 {
            return None;
        }
        let inv_w = 1.0 / v.clip.w;
        let ndc = v.clip.xyz() * inv_w;
        let vp = self.fixed.viewport;
        Some(Win {
            pos: Vec3::new(
                vp.x as f32 + (ndc.x + 1.0) * 0.5 * vp.width as f32,
                vp.y as f32 + (ndc.y + 1.0) * 0.5 * vp.height as f32,
                (ndc.z + 1.0) * 0.5,
            ),
            inv_w,
            v: *v,
        })
    }

    fn draw_polygon(&mut self, verts: &[Vertex], provoking: usize) {
        let Some(mut win) = verts.iter().map(|v| self.to_window(v)).collect::<Option<Vec<Win>>>() else {
            log::trace!("dropping polygon behind the eye");
            return;
        };
        if self.fixed.shade_model == ShadeModel::Flat {
            let c = win[provoking].v.color;
            win.iter_mut().for_each(|w| w.v.color = c);
        }

        let len = win.len();
        let twice_area: f32 = (0..len)
            .map(|i| {
                let (a, b) = (win[i].pos, win[(i + 1) % len].pos);
                a.x * b.y - b.x * a.y
            })
            .sum();
        if twice_area == 0.0 || !twice_area.is_finite() {
            return;
        }

        let front = (twice_area > 0.0) == self.fixed.front_ccw;
        if self.fixed.caps.contains(Capability::CULL_FACE) {
            match self.fixed.cull_face {
                CullFace::Back if !front => return,
                CullFace::Front if front => return,
                CullFace::FrontAndBack => return,
                _ => {}
            }
        }

        match self.fixed.polygon_mode {
            PolygonMode::Fill => {
                for i in 1..len - 1 {
                    self.fill_triangle(win[0], win[i], win[i + 1]);
                }
            }
            PolygonMode::Line => {
                for i in 0..len {
                    self.raster_line(win[i], win[(i + 1) % len]);
                }
            }
            PolygonMode::Point => {
                for w in &win {
                    self.raster_point(w);
                }
            }
        }
    }

    fn draw_line(&mut self, a: &Vertex, b: &Vertex) {
        let (Some(mut wa), Some(wb)) = (self.to_window(a), self.to_window(b)) else {
            return;
        };
        if self.fixed.shade_model == ShadeModel::Flat {
            wa.v.color = wb.v.color;
        }
        self.raster_line(wa, wb);
    }

    fn draw_point(&mut self, v: &Vertex) {
        if let Some(w) = self.to_window(v) {
            self.raster_point(&w);
        }
    }

    // ── rasterization ────────────────────────────────────────────────────

    /// Pixels a primitive may touch: viewport, scissor, planes.
    fn raster_bounds(&self) -> Option<Region> {
        self.fixed.viewport.intersect(self.pixel_bounds()?)
    }

    /// Pixels a pixel transfer may touch: scissor and planes.
    fn pixel_bounds(&self) -> Option<Region> {
        let planes = self.planes.bounds();
        if self.fixed.caps.contains(Capability::SCISSOR_TEST) {
            self.fixed.scissor.intersect(planes)
        } else {
            Some(planes)
        }
    }

    fn fill_triangle(&mut self, a: Win, b: Win, c: Win) {
        let area = edge(a.pos, b.pos, c.pos.xy());
        if area == 0.0 || !area.is_finite() {
            return;
        }
        let (a, b, c) = if area < 0.0 { (a, c, b) } else { (a, b, c) };
        let area = area.abs();

        let Some(bounds) = self.raster_bounds() else {
            return;
        };
        let lo = a.pos.min(b.pos).min(c.pos);
        let hi = a.pos.max(b.pos).max(c.pos);
        let x0 = (lo.x.floor().max(bounds.x as f32)) as u32;
        let y0 = (lo.y.floor().max(bounds.y as f32)) as u32;
        let x1 = (hi.x.ceil().min(bounds.right() as f32)) as u32;
        let y1 = (hi.y.ceil().min(bounds.top() as f32)) as u32;

        let offset = if self.fixed.caps.contains(Capability::POLYGON_OFFSET_FILL) {
            let (factor, units) = self.fixed.polygon_offset;
            let dzdx = ((b.pos.z - a.pos.z) * (c.pos.y - a.pos.y) - (c.pos.z - a.pos.z) * (b.pos.y - a.pos.y)) / area;
            let dzdy = ((c.pos.z - a.pos.z) * (b.pos.x - a.pos.x) - (b.pos.z - a.pos.z) * (c.pos.x - a.pos.x)) / area;
            factor * dzdx.abs().max(dzdy.abs()) + units * DEPTH_UNIT
        } else {
            0.0
        };
        let lod = self.triangle_lod(&a, &b, &c, area);

        for py in y0..y1 {
            for px in x0..x1 {
                let p = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
                let w0 = edge(b.pos, c.pos, p);
                let w1 = edge(c.pos, a.pos, p);
                let w2 = edge(a.pos, b.pos, p);
                if !(covers(w0, b.pos, c.pos) && covers(w1, c.pos, a.pos) && covers(w2, a.pos, b.pos)) {
                    continue;
                }
                let (l0, l1, l2) = (w0 / area, w1 / area, w2 / area);
                let z = l0 * a.pos.z + l1 * b.pos.z + l2 * c.pos.z;
                if !(0.0..=1.0).contains(&z) {
                    continue;
                }
                let (p0, p1, p2) = (l0 * a.inv_w, l1 * b.inv_w, l2 * c.inv_w);
                let sum = p0 + p1 + p2;
                let frag = Fragment::blend([&a.v, &b.v, &c.v], [p0 / sum, p1 / sum, p2 / sum]);
                self.fragment(px, py, (z + offset).clamp(0.0, 1.0), frag, lod);
            }
        }
    }

    /// Level of detail from the texel-to-pixel area ratio of the whole triangle.
    fn triangle_lod(&self, a: &Win, b: &Win, c: &Win, pixel_area: f32) -> f32 {
        if !self.fixed.caps.contains(Capability::TEXTURE_2D) {
            return 0.0;
        }
        let Some((w, h)) = self
            .textures
            .get(&self.fixed.bound_texture)
            .and_then(|t| t.level_size(0))
        else {
            return 0.0;
        };
        let scale = Vec2::new(w as f32, h as f32);
        let d1 = (b.v.uv - a.v.uv) * scale;
        let d2 = (c.v.uv - a.v.uv) * scale;
        let texel_area = (d1.x * d2.y - d1.y * d2.x).abs();
        if texel_area == 0.0 {
            return 0.0;
        }
        0.5 * (texel_area / pixel_area).log2()
    }

    fn raster_line(&mut self, a: Win, b: Win) {
        let Some(bounds) = self.raster_bounds() else {
            return;
        };
        let d = b.pos - a.pos;
        let steps = d.x.abs().max(d.y.abs()).ceil() as usize;
        if steps == 0 {
            return;
        }
        let wide = self.fixed.line_width.round().max(1.0) as i64;
        let x_major = d.x.abs() >= d.y.abs();

        for i in 0..steps {
            let t = i as f32 / steps as f32;
            let pos = a.pos + d * t;
            if !(0.0..=1.0).contains(&pos.z) {
                continue;
            }
            let (pa, pb) = ((1.0 - t) * a.inv_w, t * b.inv_w);
            let sum = pa + pb;
            let (pa, pb) = (pa / sum, pb / sum);
            for k in 0..wide {
                let off = k - (wide - 1) / 2;
                let (x, y) = if x_major {
                    (pos.x.floor() as i64, pos.y.floor() as i64 + off)
                } else {
                    (pos.x.floor() as i64 + off, pos.y.floor() as i64)
                };
                if !bounds.contains(x, y) {
                    continue;
                }
                let frag = Fragment::blend([&a.v, &b.v, &b.v], [pa, pb, 0.0]);
                self.fragment(x as u32, y as u32, pos.z, frag, 0.0);
            }
        }
    }

    fn raster_point(&mut self, w: &Win) {
        let Some(bounds) = self.raster_bounds() else {
            return;
        };
        if !(0.0..=1.0).contains(&w.pos.z) {
            return;
        }
        let size = self.fixed.point_size.round().max(1.0);
        let x0 = (w.pos.x - size * 0.5 + 0.5).floor() as i64;
        let y0 = (w.pos.y - size * 0.5 + 0.5).floor() as i64;
        let n = size as i64;
        for y in y0..y0 + n {
            for x in x0..x0 + n {
                if bounds.contains(x, y) {
                    self.fragment(x as u32, y as u32, w.pos.z, Fragment::of(&w.v), 0.0);
                }
            }
        }
    }

    // ── per-fragment operations ──────────────────────────────────────────

    fn fragment(&mut self, x: u32, y: u32, z: f32, frag: Fragment, lod: f32) {
        let f = &self.fixed;
        let caps = f.caps;

        let clipped = f
            .clip_on
            .iter()
            .zip(&frag.clip_dist)
            .any(|(&on, &d)| on && d < 0.0);
        if clipped {
            return;
        }

        let mut color = frag.color;
        if caps.contains(Capability::TEXTURE_2D) {
            if let Some(texel) = self.textures.get(&f.bound_texture).and_then(|t| t.sample(frag.uv, lod)) {
                color = tex_env(f.tex_env, color, texel);
            }
        }
        if caps.contains(Capability::FOG) {
            let k = f.fog.factor(frag.eye_depth);
            let fog = f.fog.color.rgb_vec();
            color = (color.xyz() * k + fog * (1.0 - k)).extend(color.w);
        }
        let color = color.clamp(Vec4::ZERO, Vec4::ONE);

        if caps.contains(Capability::ALPHA_TEST) && !compare(f.alpha_func.0, color.w, f.alpha_func.1) {
            return;
        }

        let idx = self.planes.index(x, y);
        let stencil_on = caps.contains(Capability::STENCIL_TEST);
        let (s_func, s_ref, s_mask) = f.stencil_func;
        let [s_fail, s_zfail, s_pass] = f.stencil_op;

        if stencil_on {
            let stored = self.planes.stencil[idx] as u32;
            if !compare(s_func, s_ref & s_mask, stored & s_mask) {
                self.planes.stencil[idx] = stencil_apply(s_fail, self.planes.stencil[idx], s_ref);
                return;
            }
        }

        if caps.contains(Capability::DEPTH_TEST) {
            if !compare(f.depth_func, z, self.planes.depth[idx]) {
                if stencil_on {
                    self.planes.stencil[idx] = stencil_apply(s_zfail, self.planes.stencil[idx], s_ref);
                }
                return;
            }
            if f.depth_mask {
                self.planes.depth[idx] = z;
            }
        }

        if stencil_on {
            self.planes.stencil[idx] = stencil_apply(s_pass, self.planes.stencil[idx], s_ref);
        }

        let blend = caps.contains(Capability::BLEND).then_some(f.blend);
        write_color(&mut self.planes, idx, color, f.draw_buffer, blend, f.color_mask);
    }

    /// `draw_pixels` body. Depth pixels go through the depth test and mask;
    /// color pixels through blending and the color mask; stencil pixels
    /// are stored as-is.
    pub(super) fn write_pixels(&mut self, x: u32, y: u32, source: &PixelBuffer) {
        let Some(bounds) = self.pixel_bounds() else {
            return;
        };
        let f = &self.fixed;
        let w = source.width as usize;

        for j in 0..source.height {
            for i in 0..source.width {
                let (px, py) = (x as i64 + i as i64, y as i64 + j as i64);
                if !bounds.contains(px, py) {
                    continue;
                }
                let idx = self.planes.index(px as u32, py as u32);
                let src = j as usize * w + i as usize;
                match (&source.data, source.format) {
                    (PixelData::F32(values), PixelFormat::Depth) => {
                        let z = values[src];
                        if f.caps.contains(Capability::DEPTH_TEST) && !compare(f.depth_func, z, self.planes.depth[idx]) {
                            continue;
                        }
                        if f.depth_mask {
                            self.planes.depth[idx] = z;
                        }
                    }
                    (PixelData::U8(values), PixelFormat::Stencil8) => {
                        self.planes.stencil[idx] = values[src];
                    }
                    (PixelData::U8(_), PixelFormat::Rgb8 | PixelFormat::Rgba8) => {
                        let Some(px) = source.rgba_at(i, j) else {
                            continue;
                        };
                        let color = Color::from_rgba8(px).to_vec4();
                        let blend = f.caps.contains(Capability::BLEND).then_some(f.blend);
                        write_color(&mut self.planes, idx, color, f.draw_buffer, blend, f.color_mask);
                    }
                    _ => {
                        self.errors.push_back(BackendError::InvalidOperation("draw_pixels data/format mismatch"));
                        return;
                    }
                }
            }
        }
    }
}

/// Signed edge function: positive when `p` is left of `a → b`.
#[inline]
fn edge(a: Vec3, b: Vec3, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Coverage with a tie rule so a shared edge belongs to exactly one triangle.
#[inline]
fn covers(w: f32, from: Vec3, to: Vec3) -> bool {
    if w != 0.0 {
        return w > 0.0;
    }
    let d = to - from;
    d.y > 0.0 || (d.y == 0.0 && d.x < 0.0)
}

#[inline]
fn compare<T: PartialOrd>(func: CompareFunction, incoming: T, stored: T) -> bool {
    match func {
        CompareFunction::Never => false,
        CompareFunction::Less => incoming < stored,
        CompareFunction::Equal => incoming == stored,
        CompareFunction::LessEqual => incoming <= stored,
        CompareFunction::Greater => incoming > stored,
        CompareFunction::NotEqual => incoming != stored,
        CompareFunction::GreaterEqual => incoming >= stored,
        CompareFunction::Always => true,
    }
}

fn stencil_apply(op: StencilOperation, value: u8, reference: u32) -> u8 {
    match op {
        StencilOperation::Keep => value,
        StencilOperation::Zero => 0,
        StencilOperation::Replace => reference as u8,
        StencilOperation::Invert => !value,
        StencilOperation::IncrementClamp => value.saturating_add(1),
        StencilOperation::DecrementClamp => value.saturating_sub(1),
        StencilOperation::IncrementWrap => value.wrapping_add(1),
        StencilOperation::DecrementWrap => value.wrapping_sub(1),
    }
}

fn tex_env(mode: TexEnvMode, c: Vec4, t: Vec4) -> Vec4 {
    match mode {
        TexEnvMode::Modulate => c * t,
        TexEnvMode::Decal => c.xyz().lerp(t.xyz(), t.w).extend(c.w),
        // Environment color is black.
        TexEnvMode::Blend => (c.xyz() * (Vec3::ONE - t.xyz())).extend(c.w * t.w),
        TexEnvMode::Replace => t,
        TexEnvMode::Add => (c.xyz() + t.xyz()).min(Vec3::ONE).extend(c.w * t.w),
    }
}

fn blend_factor(f: BlendFactor, src: Vec4, dst: Vec4) -> Vec4 {
    match f {
        BlendFactor::Zero => Vec4::ZERO,
        BlendFactor::One => Vec4::ONE,
        BlendFactor::Src => src,
        BlendFactor::OneMinusSrc => Vec4::ONE - src,
        BlendFactor::SrcAlpha => Vec4::splat(src.w),
        BlendFactor::OneMinusSrcAlpha => Vec4::splat(1.0 - src.w),
        BlendFactor::Dst => dst,
        BlendFactor::OneMinusDst => Vec4::ONE - dst,
        BlendFactor::DstAlpha => Vec4::splat(dst.w),
        BlendFactor::OneMinusDstAlpha => Vec4::splat(1.0 - dst.w),
        BlendFactor::SrcAlphaSaturated => {
            let s = src.w.min(1.0 - dst.w);
            Vec4::new(s, s, s, 1.0)
        }
        // Constant and dual-source factors are not modeled.
        _ => Vec4::ONE,
    }
}

fn write_color(
    planes: &mut Planes,
    idx: usize,
    src: Vec4,
    draw_buffer: RenderBuffer,
    blend: Option<(BlendFactor, BlendFactor)>,
    mask: ColorWrites,
) {
    planes.for_each_draw_plane(draw_buffer, |plane| {
        let out = match blend {
            Some((s, d)) => {
                let dst = Color::from_rgba8(plane[idx]).to_vec4();
                src * blend_factor(s, src, dst) + dst * blend_factor(d, src, dst)
            }
            None => src,
        };
        masked_write(&mut plane[idx], Color::from_vec4(out).to_rgba8(), mask);
    });
}

#[inline]
pub(super) fn masked_write(px: &mut [u8; 4], value: [u8; 4], mask: ColorWrites) {
    let channels = [ColorWrites::RED, ColorWrites::GREEN, ColorWrites::BLUE, ColorWrites::ALPHA];
    for (i, ch) in channels.into_iter().enumerate() {
        if mask.contains(ch) {
            px[i] = value[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    fn unit_backend(w: u32, h: u32) -> SoftBackend {
        let mut b = SoftBackend::new(w, h);
        b.load_matrix(MatrixMode::Projection, &Mat4::orthographic_rh_gl(0.0, 1.0, 0.0, 1.0, -1.0, 1.0));
        b
    }

    fn tri(b: &mut SoftBackend, pts: [(f32, f32, f32); 3]) {
        b.begin(PrimitiveKind::Triangles);
        for (x, y, z) in pts {
            b.vertex(Vec3::new(x, y, z));
        }
        b.end();
    }

    #[test]
    fn shared_diagonal_is_drawn_once() {
        let mut b = unit_backend(4, 4);
        b.set_capability(Capability::BLEND, true);
        b.blend_func(BlendFactor::One, BlendFactor::One);
        b.color(Color::new(0.2, 0.2, 0.2, 0.2));
        tri(&mut b, [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (1.0, 1.0, 0.0)]);
        tri(&mut b, [(0.0, 0.0, 0.0), (1.0, 1.0, 0.0), (0.0, 1.0, 0.0)]);
        assert!(b.back_rgba().chunks_exact(4).all(|p| p == [51, 51, 51, 51]));
    }

    #[test]
    fn polygon_offset_pulls_depth_forward() {
        let mut b = unit_backend(2, 2);
        b.set_capability(Capability::DEPTH_TEST, true);
        tri(&mut b, [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)]);
        let base = b.depth_at(0, 0);
        b.clear(RenderBuffer::DEPTH);
        b.set_capability(Capability::POLYGON_OFFSET_FILL, true);
        b.polygon_offset(0.0, -2.0);
        tri(&mut b, [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)]);
        assert!((base - b.depth_at(0, 0) - 2.0 * DEPTH_UNIT).abs() < 1e-7);
    }

    #[test]
    fn flat_shading_uses_last_vertex() {
        let mut b = unit_backend(4, 4);
        b.shade_model(ShadeModel::Flat);
        b.begin(PrimitiveKind::Triangles);
        b.color(Color::rgb(1.0, 0.0, 0.0));
        b.vertex(Vec3::new(0.0, 0.0, 0.0));
        b.color(Color::rgb(0.0, 1.0, 0.0));
        b.vertex(Vec3::new(1.0, 0.0, 0.0));
        b.color(Color::rgb(0.0, 0.0, 1.0));
        b.vertex(Vec3::new(0.0, 1.0, 0.0));
        b.end();
        assert_eq!(b.pixel(0, 0), [0, 0, 255, 255]);
        assert_eq!(b.pixel(2, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn directional_light_scales_with_angle() {
        let mut b = unit_backend(2, 2);
        b.set_capability(Capability::LIGHTING, true);
        b.enable_light(0, true);
        b.light_model_ambient(Color::BLACK);
        b.material(&MaterialParams { diffuse: Some(Color::WHITE), ..MaterialParams::default() });
        b.light(0, &LightParams { diffuse: Color::WHITE, position: Vec4::new(0.0, 0.0, 1.0, 0.0), ..LightParams::default() });
        b.normal(Vec3::Z);
        b.begin(PrimitiveKind::Points);
        b.vertex(Vec3::new(0.25, 0.25, 0.0));
        b.end();
        assert_eq!(b.pixel(0, 0), [255, 255, 255, 255]);

        b.normal(Vec3::new(1.0, 0.0, 1.0).normalize());
        b.begin(PrimitiveKind::Points);
        b.vertex(Vec3::new(0.75, 0.75, 0.0));
        b.end();
        let v = (std::f32::consts::FRAC_1_SQRT_2 * 255.0 + 0.5) as u8;
        assert_eq!(b.pixel(1, 1), [v, v, v, 255]);
    }

    #[test]
    fn clip_plane_discards_negative_side() {
        let mut b = unit_backend(4, 1);
        b.clip_plane(0, Vec4::new(1.0, 0.0, 0.0, -0.5));
        b.enable_clip_plane(0, true);
        b.color(Color::WHITE);
        b.begin(PrimitiveKind::Quads);
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            b.vertex(Vec3::new(x, y, 0.0));
        }
        b.end();
        assert_eq!(b.pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(b.pixel(3, 0), [255; 4]);
    }

    #[test]
    fn stencil_replace_then_equal() {
        let mut b = unit_backend(2, 2);
        b.set_capability(Capability::STENCIL_TEST, true);
        b.stencil_func(CompareFunction::Always, 3, 0xff);
        b.stencil_op(StencilOperation::Keep, StencilOperation::Keep, StencilOperation::Replace);
        tri(&mut b, [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)]);
        assert_eq!(b.stencil_at(0, 0), 3);
        assert_eq!(b.stencil_at(1, 1), 0);
    }

    #[test]
    fn exp_fog_darkens_with_distance() {
        let mut b = SoftBackend::new(1, 1);
        b.set_capability(Capability::FOG, true);
        b.fog(&FogParams { equation: FogEquation::Linear { start: 0.0, end: 2.0 }, color: Color::BLACK });
        b.load_matrix(MatrixMode::Projection, &Mat4::orthographic_rh_gl(0.0, 1.0, 0.0, 1.0, 0.0, 4.0));
        b.color(Color::WHITE);
        b.begin(PrimitiveKind::Points);
        b.vertex(Vec3::new(0.5, 0.5, -1.0));
        b.end();
        assert_eq!(b.pixel(0, 0), [128, 128, 128, 255]);
    }

    #[test]
    fn tex_env_modes() {
        let c = Vec4::new(0.5, 0.5, 0.5, 1.0);
        let t = Vec4::new(1.0, 0.0, 0.0, 0.5);
        assert_eq!(tex_env(TexEnvMode::Replace, c, t), t);
        assert_eq!(tex_env(TexEnvMode::Modulate, c, t), Vec4::new(0.5, 0.0, 0.0, 0.5));
        assert_eq!(tex_env(TexEnvMode::Decal, c, t), Vec4::new(0.75, 0.25, 0.25, 1.0));
    }

    #[test]
    fn masked_write_only_touches_enabled_channels() {
        let mut px = [1, 2, 3, 4];
        masked_write(&mut px, [9, 9, 9, 9], ColorWrites::RED | ColorWrites::ALPHA);
        assert_eq!(px, [9, 2, 3, 9]);
    }
}
