//! Shadow state and the cached setters that keep it in step with the
//! backend.
//!
//! Every setter compares against the shadow copy and only calls through on
//! change. Nothing else in the guardian talks to the backend's state calls
//! directly.

use glam::{Mat4, Vec4};

use super::GraphicsStateGuardian;
use crate::backend::{
    Backend, BackendLimits, BlendFactor, Capability, ColorMaterial, ColorWrites, CompareFunction, CullFace,
    FogParams, MaterialParams, MatrixMode, PolygonMode, RenderBuffer, ShadeModel, StencilOperation, TexEnvMode,
    TexGenCoord, TexGenMode, TextureHandle,
};
use crate::coords::Region;
use crate::paint::Color;

/// Stores `value` into `slot`, returning whether it changed.
#[inline]
pub fn update<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// What the guardian believes the backend's state to be.
///
/// Axes held as `Option` start unknown after a reset, so their first use
/// always reaches the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub capabilities: Capability,
    pub lights: Vec<bool>,
    pub clip_planes: Vec<bool>,
    pub depth_func: CompareFunction,
    pub depth_mask: bool,
    pub blend_func: (BlendFactor, BlendFactor),
    pub color_mask: ColorWrites,
    pub cull_face: CullFace,
    pub front_face_ccw: bool,
    pub shade_model: ShadeModel,
    pub polygon_mode: PolygonMode,
    pub line_width: f32,
    pub point_size: f32,
    /// Factor and units.
    pub polygon_offset: (f32, f32),
    pub alpha_func: (CompareFunction, f32),
    pub stencil_func: (CompareFunction, u32),
    pub stencil_op: [StencilOperation; 3],
    pub perspective_hint_fastest: bool,
    pub light_model_ambient: Color,
    pub local_viewer: bool,
    pub two_side: bool,
    pub color_material: ColorMaterial,
    pub tex_env: TexEnvMode,
    pub modelview: Mat4,
    pub projection: Mat4,
    pub texture_matrix: Mat4,
    pub viewport: Region,
    pub scissor: Region,
    pub draw_buffer: RenderBuffer,
    pub read_buffer: RenderBuffer,
    pub bound_texture: TextureHandle,

    pub fog: Option<FogParams>,
    pub material: Option<MaterialParams>,
    pub tex_gen: [Option<TexGenMode>; 4],
    pub clear_color: Option<Color>,
    pub clear_depth: Option<f32>,
    pub clear_stencil: Option<u32>,
    pub clear_accum: Option<Color>,
}

impl State {
    /// The documented initial state of a fresh immediate-mode context.
    pub fn initial(limits: &BackendLimits) -> Self {
        let full = Region::sized(limits.width, limits.height);
        let buffer = if limits.double_buffered { RenderBuffer::BACK } else { RenderBuffer::FRONT };
        Self {
            capabilities: Capability::DITHER | Capability::MULTISAMPLE,
            lights: vec![false; limits.max_lights],
            clip_planes: vec![false; limits.max_clip_planes],
            depth_func: CompareFunction::Less,
            depth_mask: true,
            blend_func: (BlendFactor::One, BlendFactor::Zero),
            color_mask: ColorWrites::ALL,
            cull_face: CullFace::Back,
            front_face_ccw: true,
            shade_model: ShadeModel::Smooth,
            polygon_mode: PolygonMode::Fill,
            line_width: 1.0,
            point_size: 1.0,
            polygon_offset: (0.0, 0.0),
            alpha_func: (CompareFunction::Always, 0.0),
            stencil_func: (CompareFunction::Always, 0),
            stencil_op: [StencilOperation::Keep; 3],
            perspective_hint_fastest: false,
            light_model_ambient: Color::rgb(0.2, 0.2, 0.2),
            local_viewer: false,
            two_side: false,
            color_material: ColorMaterial::AmbientAndDiffuse,
            tex_env: TexEnvMode::Modulate,
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            texture_matrix: Mat4::IDENTITY,
            viewport: full,
            scissor: full,
            draw_buffer: buffer,
            read_buffer: buffer,
            bound_texture: TextureHandle::NONE,
            fog: None,
            material: None,
            tex_gen: [None; 4],
            clear_color: None,
            clear_depth: None,
            clear_stencil: None,
            clear_accum: None,
        }
    }

    /// Pushes every known axis to `backend` unconditionally, so the device
    /// matches the shadow copy whatever was done to it before.
    pub fn apply_to<B: Backend>(&self, backend: &mut B) {
        for cap in Capability::all().iter() {
            backend.set_capability(cap, self.capabilities.contains(cap));
        }
        for (slot, on) in self.lights.iter().enumerate() {
            backend.enable_light(slot, *on);
        }
        for (slot, on) in self.clip_planes.iter().enumerate() {
            backend.enable_clip_plane(slot, *on);
        }
        backend.depth_func(self.depth_func);
        backend.depth_mask(self.depth_mask);
        backend.blend_func(self.blend_func.0, self.blend_func.1);
        backend.color_mask(self.color_mask);
        backend.cull_face(self.cull_face);
        backend.front_face_ccw(self.front_face_ccw);
        backend.shade_model(self.shade_model);
        backend.polygon_mode(self.polygon_mode);
        backend.line_width(self.line_width);
        backend.point_size(self.point_size);
        backend.polygon_offset(self.polygon_offset.0, self.polygon_offset.1);
        backend.alpha_func(self.alpha_func.0, self.alpha_func.1);
        backend.stencil_func(self.stencil_func.0, self.stencil_func.1, u32::MAX);
        let [fail, depth_fail, pass] = self.stencil_op;
        backend.stencil_op(fail, depth_fail, pass);
        backend.perspective_hint_fastest(self.perspective_hint_fastest);
        backend.light_model_ambient(self.light_model_ambient);
        backend.light_model_local_viewer(self.local_viewer);
        backend.light_model_two_side(self.two_side);
        backend.color_material(self.color_material);
        backend.tex_env(self.tex_env);
        backend.load_matrix(MatrixMode::ModelView, &self.modelview);
        backend.load_matrix(MatrixMode::Projection, &self.projection);
        backend.load_matrix(MatrixMode::Texture, &self.texture_matrix);
        backend.viewport(self.viewport);
        backend.scissor(self.scissor);
        backend.draw_buffer(self.draw_buffer);
        backend.read_buffer(self.read_buffer);
        backend.bind_texture(self.bound_texture);
    }

    #[inline]
    pub fn is_enabled(&self, cap: Capability) -> bool {
        self.capabilities.contains(cap)
    }
}

impl<B: Backend> GraphicsStateGuardian<B> {
    pub(crate) fn enable(&mut self, cap: Capability, on: bool) {
        if self.state.capabilities.contains(cap) != on {
            self.state.capabilities.set(cap, on);
            self.backend.set_capability(cap, on);
        }
    }

    pub(crate) fn enable_light_slot(&mut self, slot: usize, on: bool) {
        if let Some(s) = self.state.lights.get_mut(slot)
            && update(s, on)
        {
            self.backend.enable_light(slot, on);
        }
    }

    pub(crate) fn enable_clip_plane_slot(&mut self, slot: usize, on: bool) {
        if let Some(s) = self.state.clip_planes.get_mut(slot)
            && update(s, on)
        {
            self.backend.enable_clip_plane(slot, on);
        }
    }

    pub(crate) fn set_depth_func(&mut self, func: CompareFunction) {
        if update(&mut self.state.depth_func, func) {
            self.backend.depth_func(func);
        }
    }

    pub(crate) fn set_depth_mask(&mut self, write: bool) {
        if update(&mut self.state.depth_mask, write) {
            self.backend.depth_mask(write);
        }
    }

    pub(crate) fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        if update(&mut self.state.blend_func, (src, dst)) {
            self.backend.blend_func(src, dst);
        }
    }

    pub(crate) fn set_color_mask(&mut self, mask: ColorWrites) {
        if update(&mut self.state.color_mask, mask) {
            self.backend.color_mask(mask);
        }
    }

    pub(crate) fn set_cull_face(&mut self, face: CullFace) {
        if update(&mut self.state.cull_face, face) {
            self.backend.cull_face(face);
        }
    }

    pub(crate) fn set_shade_model(&mut self, model: ShadeModel) {
        if update(&mut self.state.shade_model, model) {
            self.backend.shade_model(model);
        }
    }

    pub(crate) fn set_polygon_mode(&mut self, mode: PolygonMode) {
        if update(&mut self.state.polygon_mode, mode) {
            self.backend.polygon_mode(mode);
        }
    }

    pub(crate) fn set_line_width(&mut self, width: f32) {
        if update(&mut self.state.line_width, width) {
            self.backend.line_width(width);
        }
    }

    pub(crate) fn set_point_size(&mut self, size: f32) {
        if update(&mut self.state.point_size, size) {
            self.backend.point_size(size);
        }
    }

    /// Zero factor and units turn the offset off rather than uploading a
    /// zero offset.
    pub(crate) fn set_polygon_offset(&mut self, factor: f32, units: f32) {
        if factor == 0.0 && units == 0.0 {
            self.enable(Capability::POLYGON_OFFSET_FILL, false);
            return;
        }
        if update(&mut self.state.polygon_offset, (factor, units)) {
            self.backend.polygon_offset(factor, units);
        }
        self.enable(Capability::POLYGON_OFFSET_FILL, true);
    }

    pub(crate) fn set_alpha_func(&mut self, func: CompareFunction, reference: f32) {
        if update(&mut self.state.alpha_func, (func, reference)) {
            self.backend.alpha_func(func, reference);
        }
    }

    pub(crate) fn set_stencil_func(&mut self, func: CompareFunction, reference: u32) {
        if update(&mut self.state.stencil_func, (func, reference)) {
            self.backend.stencil_func(func, reference, u32::MAX);
        }
    }

    pub(crate) fn set_stencil_op(&mut self, fail: StencilOperation, depth_fail: StencilOperation, pass: StencilOperation) {
        if update(&mut self.state.stencil_op, [fail, depth_fail, pass]) {
            self.backend.stencil_op(fail, depth_fail, pass);
        }
    }

    pub(crate) fn set_perspective_hint_fastest(&mut self, fastest: bool) {
        if update(&mut self.state.perspective_hint_fastest, fastest) {
            self.backend.perspective_hint_fastest(fastest);
        }
    }

    pub(crate) fn set_fog(&mut self, params: FogParams) {
        if update(&mut self.state.fog, Some(params)) {
            self.backend.fog(&params);
        }
    }

    pub(crate) fn set_light_model_ambient(&mut self, color: Color) {
        if update(&mut self.state.light_model_ambient, color) {
            self.backend.light_model_ambient(color);
        }
    }

    pub(crate) fn set_local_viewer(&mut self, local: bool) {
        if update(&mut self.state.local_viewer, local) {
            self.backend.light_model_local_viewer(local);
        }
    }

    pub(crate) fn set_two_side(&mut self, two_side: bool) {
        if update(&mut self.state.two_side, two_side) {
            self.backend.light_model_two_side(two_side);
        }
    }

    pub(crate) fn set_material(&mut self, params: MaterialParams) {
        if update(&mut self.state.material, Some(params)) {
            self.backend.material(&params);
        }
    }

    /// `None` turns color-material tracking off.
    pub(crate) fn set_color_material(&mut self, mode: Option<ColorMaterial>) {
        if let Some(mode) = mode
            && update(&mut self.state.color_material, mode)
        {
            self.backend.color_material(mode);
        }
        self.enable(Capability::COLOR_MATERIAL, mode.is_some());
    }

    pub(crate) fn set_tex_env(&mut self, mode: TexEnvMode) {
        if update(&mut self.state.tex_env, mode) {
            self.backend.tex_env(mode);
        }
    }

    /// `None` turns generation off for `coord`.
    pub(crate) fn set_tex_gen(&mut self, coord: TexGenCoord, mode: Option<TexGenMode>) {
        if let Some(mode) = mode
            && update(&mut self.state.tex_gen[coord.index()], Some(mode))
        {
            self.backend.tex_gen(coord, mode);
        }
        self.enable(coord.capability(), mode.is_some());
    }

    pub(crate) fn load_matrix(&mut self, mode: MatrixMode, matrix: Mat4) {
        let slot = match mode {
            MatrixMode::ModelView => &mut self.state.modelview,
            MatrixMode::Projection => &mut self.state.projection,
            MatrixMode::Texture => &mut self.state.texture_matrix,
        };
        if update(slot, matrix) {
            self.backend.load_matrix(mode, &matrix);
        }
    }

    pub(crate) fn set_viewport(&mut self, region: Region) {
        if update(&mut self.state.viewport, region) {
            self.backend.viewport(region);
        }
    }

    pub(crate) fn set_scissor(&mut self, region: Region) {
        if update(&mut self.state.scissor, region) {
            self.backend.scissor(region);
        }
    }

    pub fn set_clear_color(&mut self, color: Color) {
        if update(&mut self.state.clear_color, Some(color)) {
            self.backend.clear_color(color);
        }
    }

    pub fn set_clear_depth(&mut self, depth: f32) {
        if update(&mut self.state.clear_depth, Some(depth)) {
            self.backend.clear_depth(depth);
        }
    }

    pub fn set_clear_stencil(&mut self, value: u32) {
        if update(&mut self.state.clear_stencil, Some(value)) {
            self.backend.clear_stencil(value);
        }
    }

    pub fn set_clear_accum(&mut self, color: Color) {
        if update(&mut self.state.clear_accum, Some(color)) {
            self.backend.clear_accum(color);
        }
    }

    pub(crate) fn set_draw_buffer(&mut self, buffer: RenderBuffer) {
        if update(&mut self.state.draw_buffer, buffer) {
            self.backend.draw_buffer(buffer);
        }
    }

    pub(crate) fn set_read_buffer(&mut self, buffer: RenderBuffer) {
        if update(&mut self.state.read_buffer, buffer) {
            self.backend.read_buffer(buffer);
        }
    }

    pub(crate) fn bind_texture(&mut self, handle: TextureHandle) {
        if update(&mut self.state.bound_texture, handle) {
            self.backend.bind_texture(handle);
        }
    }
}

/// Object-linear planes from the rows of a projector matrix.
pub(crate) fn projector_planes(m: &Mat4) -> [Vec4; 4] {
    [m.row(0), m.row(1), m.row(2), m.row(3)]
}
