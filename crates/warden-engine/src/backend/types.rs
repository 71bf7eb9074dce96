//! Backend vocabulary.
//!
//! Comparison functions, blend factors, write masks, stencil operations,
//! polygon modes, address modes and filter modes are the `wgpu` enums, so a
//! guardian's shadow state can also key a wgpu pipeline. The rest are
//! fixed-function notions wgpu has no word for.

use bitflags::bitflags;
use glam::{Vec3, Vec4};

use crate::paint::Color;

pub use wgpu::{
    AddressMode, BlendFactor, ColorWrites, CompareFunction, FilterMode, PolygonMode,
    StencilOperation,
};

bitflags! {
    /// Fixed-function features toggled with enable/disable.
    ///
    /// Per-slot light and clip-plane enables are separate calls.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capability: u32 {
        const LIGHTING = 1 << 0;
        const TEXTURE_2D = 1 << 1;
        const BLEND = 1 << 2;
        const DEPTH_TEST = 1 << 3;
        const STENCIL_TEST = 1 << 4;
        const FOG = 1 << 5;
        const ALPHA_TEST = 1 << 6;
        const POLYGON_OFFSET_FILL = 1 << 7;
        const CULL_FACE = 1 << 8;
        const LINE_SMOOTH = 1 << 9;
        const POINT_SMOOTH = 1 << 10;
        const MULTISAMPLE = 1 << 11;
        const SAMPLE_ALPHA_TO_ONE = 1 << 12;
        const SAMPLE_ALPHA_TO_COVERAGE = 1 << 13;
        const DITHER = 1 << 14;
        const SCISSOR_TEST = 1 << 15;
        const NORMALIZE = 1 << 16;
        const COLOR_MATERIAL = 1 << 17;
        const TEXTURE_GEN_S = 1 << 18;
        const TEXTURE_GEN_T = 1 << 19;
        const TEXTURE_GEN_R = 1 << 20;
        const TEXTURE_GEN_Q = 1 << 21;
    }
}

bitflags! {
    /// One or more framebuffer planes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderBuffer: u32 {
        const FRONT_LEFT = 1 << 0;
        const BACK_LEFT = 1 << 1;
        const FRONT_RIGHT = 1 << 2;
        const BACK_RIGHT = 1 << 3;
        const DEPTH = 1 << 4;
        const STENCIL = 1 << 5;
        const ACCUM = 1 << 6;

        const FRONT = Self::FRONT_LEFT.bits() | Self::FRONT_RIGHT.bits();
        const BACK = Self::BACK_LEFT.bits() | Self::BACK_RIGHT.bits();
        const LEFT = Self::FRONT_LEFT.bits() | Self::BACK_LEFT.bits();
        const RIGHT = Self::FRONT_RIGHT.bits() | Self::BACK_RIGHT.bits();
        const COLOR = Self::FRONT.bits() | Self::BACK.bits();
    }
}

impl RenderBuffer {
    #[inline]
    pub fn color_planes(self) -> RenderBuffer {
        self & RenderBuffer::COLOR
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullFace {
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadeModel {
    Flat,
    Smooth,
}

/// How a texel combines with the incoming fragment color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexEnvMode {
    Modulate,
    Decal,
    Blend,
    Replace,
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexGenCoord {
    S,
    T,
    R,
    Q,
}

impl TexGenCoord {
    pub const ALL: [TexGenCoord; 4] = [Self::S, Self::T, Self::R, Self::Q];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn capability(self) -> Capability {
        match self {
            Self::S => Capability::TEXTURE_GEN_S,
            Self::T => Capability::TEXTURE_GEN_T,
            Self::R => Capability::TEXTURE_GEN_R,
            Self::Q => Capability::TEXTURE_GEN_Q,
        }
    }
}

/// Texture-coordinate generation function for one coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TexGenMode {
    /// `dot(plane, object_position)`.
    ObjectLinear(Vec4),
    SphereMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixMode {
    ModelView,
    Projection,
    Texture,
}

/// Which material colors follow the current vertex color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMaterial {
    Ambient,
    Diffuse,
    AmbientAndDiffuse,
}

/// Sampler filtering. `mipmap == None` samples the base level only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerFilter {
    pub min: FilterMode,
    pub mag: FilterMode,
    pub mipmap: Option<FilterMode>,
}

impl Default for SamplerFilter {
    fn default() -> Self {
        Self { min: FilterMode::Linear, mag: FilterMode::Linear, mipmap: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    /// One `f32` per pixel in `[0, 1]`.
    Depth,
    Stencil8,
}

impl PixelFormat {
    /// Components per pixel.
    #[inline]
    pub fn components(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
            Self::Depth | Self::Stencil8 => 1,
        }
    }

    #[inline]
    pub fn is_color(self) -> bool {
        matches!(self, Self::Rgb8 | Self::Rgba8)
    }

    /// The framebuffer plane a buffer of this format reads from or writes to.
    #[inline]
    pub fn plane(self, color: RenderBuffer) -> RenderBuffer {
        match self {
            Self::Rgb8 | Self::Rgba8 => color,
            Self::Depth => RenderBuffer::DEPTH,
            Self::Stencil8 => RenderBuffer::STENCIL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    U8(Vec<u8>),
    F32(Vec<f32>),
}

/// CPU-side image: texture source, readback target, or draw-pixels source.
///
/// Rows run bottom to top. `data` may be empty, meaning "sized but not
/// filled" (e.g. a texture whose contents only exist on the GPU).
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    /// Framebuffer origin the contents were captured from, if any.
    pub x_origin: u32,
    pub y_origin: u32,
    pub format: PixelFormat,
    pub data: PixelData,
}

impl PixelBuffer {
    /// Sized buffer with no contents.
    pub fn empty(width: u32, height: u32, format: PixelFormat) -> Self {
        let data = match format {
            PixelFormat::Depth => PixelData::F32(Vec::new()),
            _ => PixelData::U8(Vec::new()),
        };
        Self { width, height, x_origin: 0, y_origin: 0, format, data }
    }

    /// Zero-filled buffer.
    pub fn zeroed(width: u32, height: u32, format: PixelFormat) -> Self {
        let n = width as usize * height as usize * format.components();
        let data = match format {
            PixelFormat::Depth => PixelData::F32(vec![0.0; n]),
            _ => PixelData::U8(vec![0; n]),
        };
        Self { width, height, x_origin: 0, y_origin: 0, format, data }
    }

    pub fn rgba8(width: u32, height: u32, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), width as usize * height as usize * 4);
        Self { width, height, x_origin: 0, y_origin: 0, format: PixelFormat::Rgba8, data: PixelData::U8(bytes) }
    }

    /// Solid-color RGBA8 image.
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let px = color.to_rgba8();
        let bytes = px.iter().copied().cycle().take(width as usize * height as usize * 4).collect();
        Self::rgba8(width, height, bytes)
    }

    /// Depth buffer to be filled by a readback.
    pub fn depth(width: u32, height: u32) -> Self {
        Self::zeroed(width, height, PixelFormat::Depth)
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    pub fn has_data(&self) -> bool {
        match &self.data {
            PixelData::U8(v) => !v.is_empty(),
            PixelData::F32(v) => !v.is_empty(),
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.data {
            PixelData::U8(v) => Some(v),
            PixelData::F32(_) => None,
        }
    }

    pub fn depth_values(&self) -> Option<&[f32]> {
        match &self.data {
            PixelData::F32(v) => Some(v),
            PixelData::U8(_) => None,
        }
    }

    /// Raw bytes regardless of component type, for GPU uploads.
    pub fn as_raw_bytes(&self) -> &[u8] {
        match &self.data {
            PixelData::U8(v) => v,
            PixelData::F32(v) => bytemuck::cast_slice(v),
        }
    }

    /// RGBA of pixel (x, y), expanding RGB to opaque. Color formats only.
    pub fn rgba_at(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let bytes = self.bytes()?;
        let i = (y as usize * self.width as usize + x as usize) * self.format.components();
        match self.format {
            PixelFormat::Rgba8 => bytes.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]]),
            PixelFormat::Rgb8 => bytes.get(i..i + 3).map(|p| [p[0], p[1], p[2], 255]),
            _ => None,
        }
    }
}

/// Opaque backend texture name. `TextureHandle::NONE` unbinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureHandle(pub u32);

impl TextureHandle {
    pub const NONE: TextureHandle = TextureHandle(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Everything uploaded for one light slot.
///
/// `position.w == 0` makes the light directional (position is a direction
/// toward the light). `spot_cutoff == 180` disables the spot cone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub position: Vec4,
    pub spot_direction: Vec3,
    pub spot_exponent: f32,
    pub spot_cutoff: f32,
    /// Constant, linear, quadratic.
    pub attenuation: [f32; 3],
}

impl Default for LightParams {
    fn default() -> Self {
        Self {
            ambient: Color::BLACK,
            diffuse: Color::BLACK,
            specular: Color::BLACK,
            position: Vec4::new(0.0, 0.0, 1.0, 0.0),
            spot_direction: Vec3::new(0.0, 0.0, -1.0),
            spot_exponent: 0.0,
            spot_cutoff: 180.0,
            attenuation: [1.0, 0.0, 0.0],
        }
    }
}

/// Material upload. `None` ambient/diffuse leave those terms to the
/// color-material path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    pub ambient: Option<Color>,
    pub diffuse: Option<Color>,
    pub specular: Color,
    pub emission: Color,
    pub shininess: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            ambient: Some(Color::rgb(0.2, 0.2, 0.2)),
            diffuse: Some(Color::rgb(0.8, 0.8, 0.8)),
            specular: Color::BLACK,
            emission: Color::BLACK,
            shininess: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FogEquation {
    Linear { start: f32, end: f32 },
    Exp { density: f32 },
    Exp2 { density: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogParams {
    pub equation: FogEquation,
    pub color: Color,
}

impl FogParams {
    /// Fraction of the fragment color kept at eye distance `z`.
    pub fn factor(&self, z: f32) -> f32 {
        let f = match self.equation {
            FogEquation::Linear { start, end } => {
                if (end - start).abs() <= f32::EPSILON {
                    1.0
                } else {
                    (end - z) / (end - start)
                }
            }
            FogEquation::Exp { density } => (-density * z).exp(),
            FogEquation::Exp2 { density } => (-(density * z) * (density * z)).exp(),
        };
        f.clamp(0.0, 1.0)
    }
}

/// Hardware limits and framebuffer layout, queried at reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendLimits {
    pub max_lights: usize,
    pub max_clip_planes: usize,
    pub max_texture_size: u32,
    pub double_buffered: bool,
    pub stereo: bool,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Quads,
    Polygon,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_buffer_composites() {
        assert_eq!(RenderBuffer::COLOR.bits().count_ones(), 4);
        assert!(RenderBuffer::BACK.contains(RenderBuffer::BACK_RIGHT));
        assert_eq!((RenderBuffer::BACK | RenderBuffer::DEPTH).color_planes(), RenderBuffer::BACK);
    }

    #[test]
    fn empty_vs_zeroed_pixel_buffers() {
        let e = PixelBuffer::empty(4, 4, PixelFormat::Rgba8);
        assert!(!e.has_data());
        let z = PixelBuffer::zeroed(4, 2, PixelFormat::Rgb8);
        assert_eq!(z.bytes().map(<[u8]>::len), Some(24));
        let d = PixelBuffer::depth(3, 3);
        assert_eq!(d.depth_values().map(<[f32]>::len), Some(9));
        assert_eq!(d.as_raw_bytes().len(), 36);
    }

    #[test]
    fn rgba_at_expands_rgb() {
        let pb = PixelBuffer {
            width: 2,
            height: 1,
            x_origin: 0,
            y_origin: 0,
            format: PixelFormat::Rgb8,
            data: PixelData::U8(vec![1, 2, 3, 4, 5, 6]),
        };
        assert_eq!(pb.rgba_at(1, 0), Some([4, 5, 6, 255]));
    }

    #[test]
    fn fog_factors() {
        let lin = FogParams { equation: FogEquation::Linear { start: 10.0, end: 20.0 }, color: Color::BLACK };
        assert_eq!(lin.factor(5.0), 1.0);
        assert_eq!(lin.factor(15.0), 0.5);
        assert_eq!(lin.factor(25.0), 0.0);

        let exp = FogParams { equation: FogEquation::Exp { density: 0.5 }, color: Color::BLACK };
        assert!((exp.factor(2.0) - (-1.0f32).exp()).abs() < 1e-6);
    }
}
