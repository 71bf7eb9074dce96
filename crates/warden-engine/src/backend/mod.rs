//! The immediate-mode API seam.
//!
//! A [`Backend`] is a current-context style graphics API: every call mutates
//! hidden device state, and nothing is deduplicated. The guardian in
//! [`crate::gsg`] is the only intended caller and is responsible for
//! skipping redundant calls.
//!
//! Implementations:
//! - [`soft::SoftBackend`]: CPU reference rasterizer
//! - [`recording::Recording`]: call-logging decorator over any backend

mod error;
pub mod recording;
pub mod soft;
mod types;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::coords::Region;
use crate::paint::Color;

pub use error::BackendError;
pub use types::*;

/// Immediate-mode graphics API.
///
/// Calls between [`begin`](Backend::begin) and [`end`](Backend::end) are
/// restricted to `color`, `normal`, `tex_coord` and `vertex`; anything else
/// is an invalid operation reported through [`poll_error`](Backend::poll_error).
pub trait Backend {
    fn limits(&self) -> BackendLimits;

    /// True when this backend's context is current on the calling thread.
    fn is_current(&self) -> bool;
    fn make_current(&mut self) -> Result<(), BackendError>;

    // ── fixed-function state ─────────────────────────────────────────────

    fn set_capability(&mut self, cap: Capability, enabled: bool);
    fn enable_light(&mut self, slot: usize, enabled: bool);
    fn enable_clip_plane(&mut self, slot: usize, enabled: bool);

    fn depth_func(&mut self, func: CompareFunction);
    fn depth_mask(&mut self, write: bool);
    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor);
    fn color_mask(&mut self, mask: ColorWrites);
    fn cull_face(&mut self, face: CullFace);
    /// `true` makes counter-clockwise windings front-facing.
    fn front_face_ccw(&mut self, ccw: bool);
    fn shade_model(&mut self, model: ShadeModel);
    fn polygon_mode(&mut self, mode: PolygonMode);
    fn line_width(&mut self, width: f32);
    fn point_size(&mut self, size: f32);
    fn polygon_offset(&mut self, factor: f32, units: f32);
    fn alpha_func(&mut self, func: CompareFunction, reference: f32);
    fn stencil_func(&mut self, func: CompareFunction, reference: u32, mask: u32);
    fn stencil_op(&mut self, fail: StencilOperation, depth_fail: StencilOperation, pass: StencilOperation);
    fn perspective_hint_fastest(&mut self, fastest: bool);

    fn fog(&mut self, params: &FogParams);
    fn light_model_ambient(&mut self, color: Color);
    fn light_model_local_viewer(&mut self, local: bool);
    fn light_model_two_side(&mut self, two_side: bool);
    /// Uploads one light. Positions and directions are transformed by the
    /// current modelview matrix at upload time.
    fn light(&mut self, slot: usize, params: &LightParams);
    /// Uploads one clip plane, transformed by the current modelview matrix.
    fn clip_plane(&mut self, slot: usize, plane: Vec4);
    fn material(&mut self, params: &MaterialParams);
    fn color_material(&mut self, mode: ColorMaterial);
    fn tex_env(&mut self, mode: TexEnvMode);
    fn tex_gen(&mut self, coord: TexGenCoord, mode: TexGenMode);
    fn load_matrix(&mut self, mode: MatrixMode, matrix: &Mat4);

    // ── framebuffer ──────────────────────────────────────────────────────

    fn viewport(&mut self, region: Region);
    fn scissor(&mut self, region: Region);
    fn clear_color(&mut self, color: Color);
    fn clear_depth(&mut self, depth: f32);
    fn clear_stencil(&mut self, value: u32);
    fn clear_accum(&mut self, color: Color);
    /// Clears the planes in `planes`, honoring masks and scissor.
    fn clear(&mut self, planes: RenderBuffer);
    fn draw_buffer(&mut self, buffer: RenderBuffer);
    fn read_buffer(&mut self, buffer: RenderBuffer);

    // ── textures ─────────────────────────────────────────────────────────

    fn gen_texture(&mut self) -> TextureHandle;
    fn bind_texture(&mut self, handle: TextureHandle);
    /// Sampler parameters of the bound texture.
    fn texture_params(&mut self, wrap_u: AddressMode, wrap_v: AddressMode, filter: SamplerFilter);
    /// Uploads one mip level of the bound texture.
    fn tex_image(&mut self, level: u32, image: &PixelBuffer);
    /// Copies a region of the read buffer into level `level` of the bound
    /// texture, stored as `format`.
    fn copy_tex_image(&mut self, level: u32, source: Region, format: PixelFormat);
    fn delete_texture(&mut self, handle: TextureHandle);

    // ── pixel transfer ───────────────────────────────────────────────────

    /// Reads `region` of the plane matching `target.format` into `target`,
    /// resizing it to the region.
    fn read_pixels(&mut self, region: Region, target: &mut PixelBuffer);
    /// Writes `source` to the plane matching its format with its lower-left
    /// corner at window pixel (x, y), through the fragment tests.
    fn draw_pixels(&mut self, x: u32, y: u32, source: &PixelBuffer);

    // ── immediate-mode primitives ────────────────────────────────────────

    fn begin(&mut self, kind: PrimitiveKind);
    fn color(&mut self, color: Color);
    fn normal(&mut self, normal: Vec3);
    fn tex_coord(&mut self, uv: Vec2);
    fn vertex(&mut self, position: Vec3);
    fn end(&mut self);

    /// Pops the oldest pending error, if any.
    fn poll_error(&mut self) -> Option<BackendError>;
}
