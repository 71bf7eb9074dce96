//! Reference software backend.
//!
//! A deterministic CPU implementation of the fixed-function pipeline, with
//! color (front and back), depth, stencil and accumulation planes. It exists
//! so the guardian's output can be checked pixel by pixel, and it is what
//! the studio presents through wgpu.
//!
//! Coverage: points, lines, polygons (no near-plane clipping; primitives
//! with a vertex behind the eye are dropped), per-vertex lighting, texgen,
//! textures with wrap, filter and mip chains, fog, user clip planes, alpha,
//! stencil and depth tests, polygon offset for filled polygons, blending and
//! color masks.

mod planes;
mod raster;
mod texture;

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::*;
use planes::Planes;
use raster::Vertex;
use texture::{Level, SoftTexture};

pub const MAX_LIGHTS: usize = 8;
pub const MAX_CLIP_PLANES: usize = 6;
pub const MAX_TEXTURE_SIZE: u32 = 4096;

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_CONTEXT: Cell<u64> = const { Cell::new(0) };
}

/// Fixed-function state, initialized to the usual immediate-mode defaults.
pub(super) struct Fixed {
    pub caps: Capability,
    pub light_on: Vec<bool>,
    /// Eye-space parameters, transformed at upload.
    pub lights: Vec<LightParams>,
    pub clip_on: Vec<bool>,
    /// Eye-space planes, transformed at upload.
    pub clip_planes: Vec<Vec4>,
    pub depth_func: CompareFunction,
    pub depth_mask: bool,
    pub blend: (BlendFactor, BlendFactor),
    pub color_mask: ColorWrites,
    pub cull_face: CullFace,
    pub front_ccw: bool,
    pub shade_model: ShadeModel,
    pub polygon_mode: PolygonMode,
    pub line_width: f32,
    pub point_size: f32,
    pub polygon_offset: (f32, f32),
    pub alpha_func: (CompareFunction, f32),
    pub stencil_func: (CompareFunction, u32, u32),
    pub stencil_op: [StencilOperation; 3],
    pub fog: FogParams,
    pub light_ambient: Color,
    pub local_viewer: bool,
    pub two_side: bool,
    pub material: MaterialParams,
    pub color_material: ColorMaterial,
    pub tex_env: TexEnvMode,
    pub tex_gen: [TexGenMode; 4],
    pub modelview: Mat4,
    pub projection: Mat4,
    pub texture_matrix: Mat4,
    pub viewport: Region,
    pub scissor: Region,
    pub clear_color: Color,
    pub clear_depth: f32,
    pub clear_stencil: u32,
    pub clear_accum: Color,
    pub draw_buffer: RenderBuffer,
    pub read_buffer: RenderBuffer,
    pub bound_texture: TextureHandle,
}

impl Fixed {
    fn new(width: u32, height: u32, max_lights: usize, max_clip_planes: usize) -> Self {
        // Slot 0 starts with a white diffuse and specular term.
        let mut lights = vec![LightParams::default(); max_lights];
        if let Some(l) = lights.first_mut() {
            l.diffuse = Color::WHITE;
            l.specular = Color::WHITE;
        }
        Self {
            caps: Capability::DITHER | Capability::MULTISAMPLE,
            light_on: vec![false; max_lights],
            lights,
            clip_on: vec![false; max_clip_planes],
            clip_planes: vec![Vec4::ZERO; max_clip_planes],
            depth_func: CompareFunction::Less,
            depth_mask: true,
            blend: (BlendFactor::One, BlendFactor::Zero),
            color_mask: ColorWrites::ALL,
            cull_face: CullFace::Back,
            front_ccw: true,
            shade_model: ShadeModel::Smooth,
            polygon_mode: PolygonMode::Fill,
            line_width: 1.0,
            point_size: 1.0,
            polygon_offset: (0.0, 0.0),
            alpha_func: (CompareFunction::Always, 0.0),
            stencil_func: (CompareFunction::Always, 0, u32::MAX),
            stencil_op: [StencilOperation::Keep; 3],
            fog: FogParams { equation: FogEquation::Exp { density: 1.0 }, color: Color::TRANSPARENT },
            light_ambient: Color::rgb(0.2, 0.2, 0.2),
            local_viewer: false,
            two_side: false,
            material: MaterialParams::default(),
            color_material: ColorMaterial::AmbientAndDiffuse,
            tex_env: TexEnvMode::Modulate,
            tex_gen: [
                TexGenMode::ObjectLinear(Vec4::X),
                TexGenMode::ObjectLinear(Vec4::Y),
                TexGenMode::ObjectLinear(Vec4::ZERO),
                TexGenMode::ObjectLinear(Vec4::ZERO),
            ],
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            texture_matrix: Mat4::IDENTITY,
            viewport: Region::sized(width, height),
            scissor: Region::sized(width, height),
            clear_color: Color::TRANSPARENT,
            clear_depth: 1.0,
            clear_stencil: 0,
            clear_accum: Color::TRANSPARENT,
            draw_buffer: RenderBuffer::BACK,
            read_buffer: RenderBuffer::BACK,
            bound_texture: TextureHandle::NONE,
        }
    }
}

/// Attributes latched by `color`/`normal`/`tex_coord`.
#[derive(Clone, Copy)]
pub(super) struct Current {
    pub color: Vec4,
    pub normal: Vec3,
    pub uv: Vec2,
}

pub struct SoftBackend {
    context: u64,
    context_switches: u64,
    lost: bool,
    limits: BackendLimits,
    planes: Planes,
    fixed: Fixed,
    current: Current,
    pending: Option<(PrimitiveKind, Vec<Vertex>)>,
    textures: HashMap<TextureHandle, SoftTexture>,
    next_texture: u32,
    errors: VecDeque<BackendError>,
}

impl SoftBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_slots(width, height, MAX_LIGHTS, MAX_CLIP_PLANES)
    }

    /// Backend with a custom number of light and clip-plane slots.
    pub fn with_slots(width: u32, height: u32, max_lights: usize, max_clip_planes: usize) -> Self {
        let max_clip_planes = max_clip_planes.min(MAX_CLIP_PLANES);
        Self {
            context: NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed),
            context_switches: 0,
            lost: false,
            limits: BackendLimits {
                max_lights,
                max_clip_planes,
                max_texture_size: MAX_TEXTURE_SIZE,
                double_buffered: true,
                stereo: false,
                width,
                height,
            },
            planes: Planes::new(width, height),
            fixed: Fixed::new(width, height, max_lights, max_clip_planes),
            current: Current { color: Vec4::ONE, normal: Vec3::Z, uv: Vec2::ZERO },
            pending: None,
            textures: HashMap::new(),
            next_texture: 1,
            errors: VecDeque::new(),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.planes.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.planes.height
    }

    /// Reallocates every plane. Contents are lost; fixed-function state is kept.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.planes = Planes::new(width, height);
        self.limits.width = width;
        self.limits.height = height;
    }

    /// Copies the back color plane to the front.
    pub fn swap_buffers(&mut self) {
        self.planes.front.copy_from_slice(&self.planes.back);
    }

    /// Marks the context unusable; later `make_current` calls fail.
    pub fn lose_context(&mut self) {
        self.lost = true;
    }

    /// Real context switches performed by `make_current`.
    pub fn context_switches(&self) -> u64 {
        self.context_switches
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.planes.back[self.planes.index(x, y)]
    }

    pub fn front_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.planes.front[self.planes.index(x, y)]
    }

    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.planes.depth[self.planes.index(x, y)]
    }

    pub fn stencil_at(&self, x: u32, y: u32) -> u8 {
        self.planes.stencil[self.planes.index(x, y)]
    }

    /// Back color plane as tightly packed RGBA8 rows, bottom row first.
    pub fn back_rgba(&self) -> &[u8] {
        bytemuck::cast_slice(&self.planes.back)
    }

    /// Front color plane, laid out like [`Self::back_rgba`].
    pub fn front_rgba(&self) -> &[u8] {
        bytemuck::cast_slice(&self.planes.front)
    }

    pub fn depth_plane(&self) -> &[f32] {
        &self.planes.depth
    }

    pub fn is_enabled(&self, cap: Capability) -> bool {
        self.fixed.caps.contains(cap)
    }

    pub fn is_light_enabled(&self, slot: usize) -> bool {
        self.fixed.light_on.get(slot).copied().unwrap_or(false)
    }

    pub fn depth_write_enabled(&self) -> bool {
        self.fixed.depth_mask
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_level_size(&self, handle: TextureHandle, level: u32) -> Option<(u32, u32)> {
        self.textures.get(&handle)?.level_size(level)
    }

    pub fn texture_texel(&self, handle: TextureHandle, level: u32, x: u32, y: u32) -> Option<[u8; 4]> {
        self.textures.get(&handle)?.texel(level, x, y)
    }

    #[inline]
    fn error(&mut self, e: BackendError) {
        log::trace!("soft backend error: {e}");
        self.errors.push_back(e);
    }

    /// Rejects state calls between `begin` and `end`.
    #[inline]
    fn in_primitive(&mut self, call: &'static str) -> bool {
        if self.pending.is_some() {
            self.error(BackendError::InvalidOperation(call));
            true
        } else {
            false
        }
    }

    fn bound_texture_mut(&mut self, call: &'static str) -> Option<&mut SoftTexture> {
        let handle = self.fixed.bound_texture;
        if handle.is_none() {
            self.error(BackendError::InvalidOperation(call));
            return None;
        }
        self.textures.get_mut(&handle)
    }
}

impl Backend for SoftBackend {
    fn limits(&self) -> BackendLimits {
        self.limits
    }

    fn is_current(&self) -> bool {
        CURRENT_CONTEXT.with(|c| c.get() == self.context)
    }

    fn make_current(&mut self) -> Result<(), BackendError> {
        if self.lost {
            return Err(BackendError::ContextLost(format!("soft context {}", self.context)));
        }
        if !self.is_current() {
            CURRENT_CONTEXT.with(|c| c.set(self.context));
            self.context_switches += 1;
        }
        Ok(())
    }

    fn set_capability(&mut self, cap: Capability, enabled: bool) {
        if self.in_primitive("set_capability") {
            return;
        }
        self.fixed.caps.set(cap, enabled);
    }

    fn enable_light(&mut self, slot: usize, enabled: bool) {
        match self.fixed.light_on.get_mut(slot) {
            Some(on) => *on = enabled,
            None => self.error(BackendError::InvalidEnum("light slot")),
        }
    }

    fn enable_clip_plane(&mut self, slot: usize, enabled: bool) {
        match self.fixed.clip_on.get_mut(slot) {
            Some(on) => *on = enabled,
            None => self.error(BackendError::InvalidEnum("clip plane slot")),
        }
    }

    fn depth_func(&mut self, func: CompareFunction) {
        self.fixed.depth_func = func;
    }

    fn depth_mask(&mut self, write: bool) {
        self.fixed.depth_mask = write;
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.fixed.blend = (src, dst);
    }

    fn color_mask(&mut self, mask: ColorWrites) {
        self.fixed.color_mask = mask;
    }

    fn cull_face(&mut self, face: CullFace) {
        self.fixed.cull_face = face;
    }

    fn front_face_ccw(&mut self, ccw: bool) {
        self.fixed.front_ccw = ccw;
    }

    fn shade_model(&mut self, model: ShadeModel) {
        self.fixed.shade_model = model;
    }

    fn polygon_mode(&mut self, mode: PolygonMode) {
        self.fixed.polygon_mode = mode;
    }

    fn line_width(&mut self, width: f32) {
        if width <= 0.0 {
            self.error(BackendError::InvalidValue("line width"));
            return;
        }
        self.fixed.line_width = width;
    }

    fn point_size(&mut self, size: f32) {
        if size <= 0.0 {
            self.error(BackendError::InvalidValue("point size"));
            return;
        }
        self.fixed.point_size = size;
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.fixed.polygon_offset = (factor, units);
    }

    fn alpha_func(&mut self, func: CompareFunction, reference: f32) {
        self.fixed.alpha_func = (func, reference.clamp(0.0, 1.0));
    }

    fn stencil_func(&mut self, func: CompareFunction, reference: u32, mask: u32) {
        self.fixed.stencil_func = (func, reference, mask);
    }

    fn stencil_op(&mut self, fail: StencilOperation, depth_fail: StencilOperation, pass: StencilOperation) {
        self.fixed.stencil_op = [fail, depth_fail, pass];
    }

    fn perspective_hint_fastest(&mut self, _fastest: bool) {
        // Interpolation is always perspective-correct here.
    }

    fn fog(&mut self, params: &FogParams) {
        self.fixed.fog = *params;
    }

    fn light_model_ambient(&mut self, color: Color) {
        self.fixed.light_ambient = color;
    }

    fn light_model_local_viewer(&mut self, local: bool) {
        self.fixed.local_viewer = local;
    }

    fn light_model_two_side(&mut self, two_side: bool) {
        self.fixed.two_side = two_side;
    }

    fn light(&mut self, slot: usize, params: &LightParams) {
        if self.in_primitive("light") {
            return;
        }
        let mv = self.fixed.modelview;
        let Some(dst) = self.fixed.lights.get_mut(slot) else {
            self.error(BackendError::InvalidEnum("light slot"));
            return;
        };
        *dst = LightParams {
            position: mv * params.position,
            spot_direction: mv.transform_vector3(params.spot_direction),
            ..*params
        };
    }

    fn clip_plane(&mut self, slot: usize, plane: Vec4) {
        if self.in_primitive("clip_plane") {
            return;
        }
        let eye = self.fixed.modelview.inverse().transpose() * plane;
        match self.fixed.clip_planes.get_mut(slot) {
            Some(dst) => *dst = eye,
            None => self.error(BackendError::InvalidEnum("clip plane slot")),
        }
    }

    fn material(&mut self, params: &MaterialParams) {
        let m = &mut self.fixed.material;
        if params.ambient.is_some() {
            m.ambient = params.ambient;
        }
        if params.diffuse.is_some() {
            m.diffuse = params.diffuse;
        }
        m.specular = params.specular;
        m.emission = params.emission;
        m.shininess = params.shininess;
    }

    fn color_material(&mut self, mode: ColorMaterial) {
        self.fixed.color_material = mode;
    }

    fn tex_env(&mut self, mode: TexEnvMode) {
        self.fixed.tex_env = mode;
    }

    fn tex_gen(&mut self, coord: TexGenCoord, mode: TexGenMode) {
        self.fixed.tex_gen[coord.index()] = mode;
    }

    fn load_matrix(&mut self, mode: MatrixMode, matrix: &Mat4) {
        if self.in_primitive("load_matrix") {
            return;
        }
        match mode {
            MatrixMode::ModelView => self.fixed.modelview = *matrix,
            MatrixMode::Projection => self.fixed.projection = *matrix,
            MatrixMode::Texture => self.fixed.texture_matrix = *matrix,
        }
    }

    fn viewport(&mut self, region: Region) {
        self.fixed.viewport = region;
    }

    fn scissor(&mut self, region: Region) {
        self.fixed.scissor = region;
    }

    fn clear_color(&mut self, color: Color) {
        self.fixed.clear_color = color.clamped();
    }

    fn clear_depth(&mut self, depth: f32) {
        self.fixed.clear_depth = depth.clamp(0.0, 1.0);
    }

    fn clear_stencil(&mut self, value: u32) {
        self.fixed.clear_stencil = value;
    }

    fn clear_accum(&mut self, color: Color) {
        self.fixed.clear_accum = color;
    }

    fn clear(&mut self, planes: RenderBuffer) {
        if self.in_primitive("clear") {
            return;
        }
        let region = if self.fixed.caps.contains(Capability::SCISSOR_TEST) {
            self.fixed.scissor
        } else {
            self.planes.bounds()
        };
        let mut indices = Vec::with_capacity(region.area());
        self.planes.for_each_index(region, |i| indices.push(i));

        let color_planes = planes.color_planes() & self.fixed.draw_buffer;
        if !color_planes.is_empty() {
            let value = self.fixed.clear_color.to_rgba8();
            let mask = self.fixed.color_mask;
            self.planes.for_each_draw_plane(color_planes, |plane| {
                for &i in &indices {
                    raster::masked_write(&mut plane[i], value, mask);
                }
            });
        }
        if planes.contains(RenderBuffer::DEPTH) && self.fixed.depth_mask {
            let d = self.fixed.clear_depth;
            for &i in &indices {
                self.planes.depth[i] = d;
            }
        }
        if planes.contains(RenderBuffer::STENCIL) {
            let s = self.fixed.clear_stencil as u8;
            for &i in &indices {
                self.planes.stencil[i] = s;
            }
        }
        if planes.contains(RenderBuffer::ACCUM) {
            let c = self.fixed.clear_accum;
            for &i in &indices {
                self.planes.accum[i] = [c.r, c.g, c.b, c.a];
            }
        }
    }

    fn draw_buffer(&mut self, buffer: RenderBuffer) {
        if buffer.color_planes().is_empty() {
            self.error(BackendError::InvalidEnum("draw buffer"));
            return;
        }
        self.fixed.draw_buffer = buffer.color_planes();
    }

    fn read_buffer(&mut self, buffer: RenderBuffer) {
        if buffer.color_planes().is_empty() {
            self.error(BackendError::InvalidEnum("read buffer"));
            return;
        }
        self.fixed.read_buffer = buffer.color_planes();
    }

    fn gen_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(handle, SoftTexture::default());
        handle
    }

    fn bind_texture(&mut self, handle: TextureHandle) {
        if self.in_primitive("bind_texture") {
            return;
        }
        if !handle.is_none() && !self.textures.contains_key(&handle) {
            self.error(BackendError::InvalidValue("bind of an unknown texture"));
            return;
        }
        self.fixed.bound_texture = handle;
    }

    fn texture_params(&mut self, wrap_u: AddressMode, wrap_v: AddressMode, filter: SamplerFilter) {
        if let Some(tex) = self.bound_texture_mut("texture_params") {
            tex.wrap_u = wrap_u;
            tex.wrap_v = wrap_v;
            tex.filter = filter;
        }
    }

    fn tex_image(&mut self, level: u32, image: &PixelBuffer) {
        if image.width > MAX_TEXTURE_SIZE || image.height > MAX_TEXTURE_SIZE {
            self.error(BackendError::InvalidValue("texture larger than the maximum size"));
            return;
        }
        let Some(data) = Level::from_pixels(image) else {
            self.error(BackendError::InvalidValue("texture image format or size"));
            return;
        };
        if let Some(tex) = self.bound_texture_mut("tex_image") {
            tex.set_level(level, data);
        }
    }

    fn copy_tex_image(&mut self, level: u32, source: Region, format: PixelFormat) {
        if !format.is_color() {
            self.error(BackendError::InvalidEnum("copy_tex_image format"));
            return;
        }
        let plane = self.planes.read_plane(self.fixed.read_buffer);
        let width = self.planes.width;
        let height = self.planes.height;
        let mut texels = Vec::with_capacity(source.area());
        for y in source.y..source.top() {
            for x in source.x..source.right() {
                // Outside the framebuffer reads as black.
                let px = if x < width && y < height {
                    plane[y as usize * width as usize + x as usize]
                } else {
                    [0, 0, 0, 0]
                };
                let px = if format == PixelFormat::Rgb8 { [px[0], px[1], px[2], 255] } else { px };
                texels.push(px);
            }
        }
        let data = Level { width: source.width, height: source.height, texels };
        if let Some(tex) = self.bound_texture_mut("copy_tex_image") {
            tex.set_level(level, data);
        }
    }

    fn delete_texture(&mut self, handle: TextureHandle) {
        if self.textures.remove(&handle).is_none() {
            self.error(BackendError::InvalidValue("delete of an unknown texture"));
            return;
        }
        if self.fixed.bound_texture == handle {
            self.fixed.bound_texture = TextureHandle::NONE;
        }
    }

    fn read_pixels(&mut self, region: Region, target: &mut PixelBuffer) {
        if self.in_primitive("read_pixels") {
            return;
        }
        let n = region.area();
        let width = self.planes.width;
        let height = self.planes.height;
        let inside = |x: u32, y: u32| x < width && y < height;
        let idx = |x: u32, y: u32| y as usize * width as usize + x as usize;

        let data = match target.format {
            PixelFormat::Rgba8 | PixelFormat::Rgb8 => {
                let plane = self.planes.read_plane(self.fixed.read_buffer);
                let comps = target.format.components();
                let mut out = Vec::with_capacity(n * comps);
                for y in region.y..region.top() {
                    for x in region.x..region.right() {
                        let px = if inside(x, y) { plane[idx(x, y)] } else { [0; 4] };
                        out.extend_from_slice(&px[..comps]);
                    }
                }
                PixelData::U8(out)
            }
            PixelFormat::Depth => {
                let mut out = Vec::with_capacity(n);
                for y in region.y..region.top() {
                    for x in region.x..region.right() {
                        out.push(if inside(x, y) { self.planes.depth[idx(x, y)] } else { 1.0 });
                    }
                }
                PixelData::F32(out)
            }
            PixelFormat::Stencil8 => {
                let mut out = Vec::with_capacity(n);
                for y in region.y..region.top() {
                    for x in region.x..region.right() {
                        out.push(if inside(x, y) { self.planes.stencil[idx(x, y)] } else { 0 });
                    }
                }
                PixelData::U8(out)
            }
        };
        target.width = region.width;
        target.height = region.height;
        target.x_origin = region.x;
        target.y_origin = region.y;
        target.data = data;
    }

    fn draw_pixels(&mut self, x: u32, y: u32, source: &PixelBuffer) {
        if self.in_primitive("draw_pixels") {
            return;
        }
        if !source.has_data() {
            self.error(BackendError::InvalidValue("draw_pixels without data"));
            return;
        }
        self.write_pixels(x, y, source);
    }

    fn begin(&mut self, kind: PrimitiveKind) {
        if self.in_primitive("begin") {
            return;
        }
        self.pending = Some((kind, Vec::new()));
    }

    fn color(&mut self, color: Color) {
        self.current.color = color.to_vec4();
    }

    fn normal(&mut self, normal: Vec3) {
        self.current.normal = normal;
    }

    fn tex_coord(&mut self, uv: Vec2) {
        self.current.uv = uv;
    }

    fn vertex(&mut self, position: Vec3) {
        if self.pending.is_none() {
            self.error(BackendError::InvalidOperation("vertex outside begin/end"));
            return;
        }
        let v = self.process_vertex(position);
        if let Some((_, verts)) = self.pending.as_mut() {
            verts.push(v);
        }
    }

    fn end(&mut self) {
        let Some((kind, verts)) = self.pending.take() else {
            self.error(BackendError::InvalidOperation("end without begin"));
            return;
        };
        self.assemble(kind, &verts);
    }

    fn poll_error(&mut self) -> Option<BackendError> {
        self.errors.pop_front()
    }
}
