//! Call-logging decorator.
//!
//! Wraps any [`Backend`], forwards every call unchanged, and keeps an
//! ordered [`Call`] log. Tests assert on the log to check what the guardian
//! actually emitted (redundant-call elimination, upload counts, pass order).

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::*;

/// One forwarded backend call. Bulk payloads are reduced to their shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    MakeCurrent,
    Capability(Capability, bool),
    EnableLight(usize, bool),
    EnableClipPlane(usize, bool),
    DepthFunc(CompareFunction),
    DepthMask(bool),
    BlendFunc(BlendFactor, BlendFactor),
    ColorMask(ColorWrites),
    CullFace(CullFace),
    FrontFaceCcw(bool),
    ShadeModel(ShadeModel),
    PolygonMode(PolygonMode),
    LineWidth(f32),
    PointSize(f32),
    PolygonOffset(f32, f32),
    AlphaFunc(CompareFunction, f32),
    StencilFunc(CompareFunction, u32, u32),
    StencilOp(StencilOperation, StencilOperation, StencilOperation),
    PerspectiveHintFastest(bool),
    Fog(FogParams),
    LightModelAmbient(Color),
    LightModelLocalViewer(bool),
    LightModelTwoSide(bool),
    Light(usize, LightParams),
    ClipPlane(usize, Vec4),
    Material(MaterialParams),
    ColorMaterial(ColorMaterial),
    TexEnv(TexEnvMode),
    TexGen(TexGenCoord, TexGenMode),
    LoadMatrix(MatrixMode, Mat4),
    Viewport(Region),
    Scissor(Region),
    ClearColor(Color),
    ClearDepth(f32),
    ClearStencil(u32),
    ClearAccum(Color),
    Clear(RenderBuffer),
    DrawBuffer(RenderBuffer),
    ReadBuffer(RenderBuffer),
    GenTexture(TextureHandle),
    BindTexture(TextureHandle),
    TextureParams(AddressMode, AddressMode, SamplerFilter),
    TexImage { level: u32, width: u32, height: u32 },
    CopyTexImage { level: u32, source: Region, format: PixelFormat },
    DeleteTexture(TextureHandle),
    ReadPixels(Region, PixelFormat),
    DrawPixels { x: u32, y: u32, width: u32, height: u32, format: PixelFormat },
    Begin(PrimitiveKind),
    Color(Color),
    Normal(Vec3),
    TexCoord(Vec2),
    Vertex(Vec3),
    End,
}

impl Call {
    /// Calls emitted inside `begin`/`end` plus the brackets themselves.
    pub fn is_geometry(&self) -> bool {
        matches!(
            self,
            Call::Begin(_) | Call::Color(_) | Call::Normal(_) | Call::TexCoord(_) | Call::Vertex(_) | Call::End
        )
    }
}

pub struct Recording<B> {
    inner: B,
    calls: Vec<Call>,
}

impl<B: Backend> Recording<B> {
    pub fn new(inner: B) -> Self {
        Self { inner, calls: Vec::new() }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.inner
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Returns the log so far and starts a fresh one.
    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Calls that change state, i.e. everything but geometry emission.
    pub fn state_calls(&self) -> usize {
        self.count(|c| !c.is_geometry())
    }

    #[inline]
    fn log(&mut self, call: Call) {
        log::trace!("{call:?}");
        self.calls.push(call);
    }
}

impl<B: Backend> Backend for Recording<B> {
    fn limits(&self) -> BackendLimits {
        self.inner.limits()
    }

    fn is_current(&self) -> bool {
        self.inner.is_current()
    }

    fn make_current(&mut self) -> Result<(), BackendError> {
        self.log(Call::MakeCurrent);
        self.inner.make_current()
    }

    fn set_capability(&mut self, cap: Capability, enabled: bool) {
        self.log(Call::Capability(cap, enabled));
        self.inner.set_capability(cap, enabled);
    }

    fn enable_light(&mut self, slot: usize, enabled: bool) {
        self.log(Call::EnableLight(slot, enabled));
        self.inner.enable_light(slot, enabled);
    }

    fn enable_clip_plane(&mut self, slot: usize, enabled: bool) {
        self.log(Call::EnableClipPlane(slot, enabled));
        self.inner.enable_clip_plane(slot, enabled);
    }

    fn depth_func(&mut self, func: CompareFunction) {
        self.log(Call::DepthFunc(func));
        self.inner.depth_func(func);
    }

    fn depth_mask(&mut self, write: bool) {
        self.log(Call::DepthMask(write));
        self.inner.depth_mask(write);
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.log(Call::BlendFunc(src, dst));
        self.inner.blend_func(src, dst);
    }

    fn color_mask(&mut self, mask: ColorWrites) {
        self.log(Call::ColorMask(mask));
        self.inner.color_mask(mask);
    }

    fn cull_face(&mut self, face: CullFace) {
        self.log(Call::CullFace(face));
        self.inner.cull_face(face);
    }

    fn front_face_ccw(&mut self, ccw: bool) {
        self.log(Call::FrontFaceCcw(ccw));
        self.inner.front_face_ccw(ccw);
    }

    fn shade_model(&mut self, model: ShadeModel) {
        self.log(Call::ShadeModel(model));
        self.inner.shade_model(model);
    }

    fn polygon_mode(&mut self, mode: PolygonMode) {
        self.log(Call::PolygonMode(mode));
        self.inner.polygon_mode(mode);
    }

    fn line_width(&mut self, width: f32) {
        self.log(Call::LineWidth(width));
        self.inner.line_width(width);
    }

    fn point_size(&mut self, size: f32) {
        self.log(Call::PointSize(size));
        self.inner.point_size(size);
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.log(Call::PolygonOffset(factor, units));
        self.inner.polygon_offset(factor, units);
    }

    fn alpha_func(&mut self, func: CompareFunction, reference: f32) {
        self.log(Call::AlphaFunc(func, reference));
        self.inner.alpha_func(func, reference);
    }

    fn stencil_func(&mut self, func: CompareFunction, reference: u32, mask: u32) {
        self.log(Call::StencilFunc(func, reference, mask));
        self.inner.stencil_func(func, reference, mask);
    }

    fn stencil_op(&mut self, fail: StencilOperation, depth_fail: StencilOperation, pass: StencilOperation) {
        self.log(Call::StencilOp(fail, depth_fail, pass));
        self.inner.stencil_op(fail, depth_fail, pass);
    }

    fn perspective_hint_fastest(&mut self, fastest: bool) {
        self.log(Call::PerspectiveHintFastest(fastest));
        self.inner.perspective_hint_fastest(fastest);
    }

    fn fog(&mut self, params: &FogParams) {
        self.log(Call::Fog(*params));
        self.inner.fog(params);
    }

    fn light_model_ambient(&mut self, color: Color) {
        self.log(Call::LightModelAmbient(color));
        self.inner.light_model_ambient(color);
    }

    fn light_model_local_viewer(&mut self, local: bool) {
        self.log(Call::LightModelLocalViewer(local));
        self.inner.light_model_local_viewer(local);
    }

    fn light_model_two_side(&mut self, two_side: bool) {
        self.log(Call::LightModelTwoSide(two_side));
        self.inner.light_model_two_side(two_side);
    }

    fn light(&mut self, slot: usize, params: &LightParams) {
        self.log(Call::Light(slot, *params));
        self.inner.light(slot, params);
    }

    fn clip_plane(&mut self, slot: usize, plane: Vec4) {
        self.log(Call::ClipPlane(slot, plane));
        self.inner.clip_plane(slot, plane);
    }

    fn material(&mut self, params: &MaterialParams) {
        self.log(Call::Material(*params));
        self.inner.material(params);
    }

    fn color_material(&mut self, mode: ColorMaterial) {
        self.log(Call::ColorMaterial(mode));
        self.inner.color_material(mode);
    }

    fn tex_env(&mut self, mode: TexEnvMode) {
        self.log(Call::TexEnv(mode));
        self.inner.tex_env(mode);
    }

    fn tex_gen(&mut self, coord: TexGenCoord, mode: TexGenMode) {
        self.log(Call::TexGen(coord, mode));
        self.inner.tex_gen(coord, mode);
    }

    fn load_matrix(&mut self, mode: MatrixMode, matrix: &Mat4) {
        self.log(Call::LoadMatrix(mode, *matrix));
        self.inner.load_matrix(mode, matrix);
    }

    fn viewport(&mut self, region: Region) {
        self.log(Call::Viewport(region));
        self.inner.viewport(region);
    }

    fn scissor(&mut self, region: Region) {
        self.log(Call::Scissor(region));
        self.inner.scissor(region);
    }

    fn clear_color(&mut self, color: Color) {
        self.log(Call::ClearColor(color));
        self.inner.clear_color(color);
    }

    fn clear_depth(&mut self, depth: f32) {
        self.log(Call::ClearDepth(depth));
        self.inner.clear_depth(depth);
    }

    fn clear_stencil(&mut self, value: u32) {
        self.log(Call::ClearStencil(value));
        self.inner.clear_stencil(value);
    }

    fn clear_accum(&mut self, color: Color) {
        self.log(Call::ClearAccum(color));
        self.inner.clear_accum(color);
    }

    fn clear(&mut self, planes: RenderBuffer) {
        self.log(Call::Clear(planes));
        self.inner.clear(planes);
    }

    fn draw_buffer(&mut self, buffer: RenderBuffer) {
        self.log(Call::DrawBuffer(buffer));
        self.inner.draw_buffer(buffer);
    }

    fn read_buffer(&mut self, buffer: RenderBuffer) {
        self.log(Call::ReadBuffer(buffer));
        self.inner.read_buffer(buffer);
    }

    fn gen_texture(&mut self) -> TextureHandle {
        let handle = self.inner.gen_texture();
        self.log(Call::GenTexture(handle));
        handle
    }

    fn bind_texture(&mut self, handle: TextureHandle) {
        self.log(Call::BindTexture(handle));
        self.inner.bind_texture(handle);
    }

    fn texture_params(&mut self, wrap_u: AddressMode, wrap_v: AddressMode, filter: SamplerFilter) {
        self.log(Call::TextureParams(wrap_u, wrap_v, filter));
        self.inner.texture_params(wrap_u, wrap_v, filter);
    }

    fn tex_image(&mut self, level: u32, image: &PixelBuffer) {
        self.log(Call::TexImage { level, width: image.width, height: image.height });
        self.inner.tex_image(level, image);
    }

    fn copy_tex_image(&mut self, level: u32, source: Region, format: PixelFormat) {
        self.log(Call::CopyTexImage { level, source, format });
        self.inner.copy_tex_image(level, source, format);
    }

    fn delete_texture(&mut self, handle: TextureHandle) {
        self.log(Call::DeleteTexture(handle));
        self.inner.delete_texture(handle);
    }

    fn read_pixels(&mut self, region: Region, target: &mut PixelBuffer) {
        self.log(Call::ReadPixels(region, target.format));
        self.inner.read_pixels(region, target);
    }

    fn draw_pixels(&mut self, x: u32, y: u32, source: &PixelBuffer) {
        self.log(Call::DrawPixels { x, y, width: source.width, height: source.height, format: source.format });
        self.inner.draw_pixels(x, y, source);
    }

    fn begin(&mut self, kind: PrimitiveKind) {
        self.log(Call::Begin(kind));
        self.inner.begin(kind);
    }

    fn color(&mut self, color: Color) {
        self.log(Call::Color(color));
        self.inner.color(color);
    }

    fn normal(&mut self, normal: Vec3) {
        self.log(Call::Normal(normal));
        self.inner.normal(normal);
    }

    fn tex_coord(&mut self, uv: Vec2) {
        self.log(Call::TexCoord(uv));
        self.inner.tex_coord(uv);
    }

    fn vertex(&mut self, position: Vec3) {
        self.log(Call::Vertex(position));
        self.inner.vertex(position);
    }

    fn end(&mut self) {
        self.log(Call::End);
        self.inner.end();
    }

    fn poll_error(&mut self) -> Option<BackendError> {
        self.inner.poll_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::soft::SoftBackend;

    #[test]
    fn forwards_and_logs_in_order() {
        let mut rec = Recording::new(SoftBackend::new(8, 8));
        rec.depth_mask(false);
        rec.begin(PrimitiveKind::Points);
        rec.vertex(Vec3::ZERO);
        rec.end();

        assert_eq!(rec.calls().len(), 4);
        assert_eq!(rec.calls()[0], Call::DepthMask(false));
        assert_eq!(rec.state_calls(), 1);
        assert!(!rec.inner().depth_write_enabled());
    }

    #[test]
    fn take_calls_resets_log() {
        let mut rec = Recording::new(SoftBackend::new(4, 4));
        rec.clear_depth(1.0);
        assert_eq!(rec.take_calls(), vec![Call::ClearDepth(1.0)]);
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn gen_texture_logs_returned_handle() {
        let mut rec = Recording::new(SoftBackend::new(4, 4));
        let h = rec.gen_texture();
        assert_eq!(rec.calls(), &[Call::GenTexture(h)]);
        assert!(!h.is_none());
    }
}
