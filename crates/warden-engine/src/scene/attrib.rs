//! Attribute transitions.
//!
//! Each attribute is an immutable description of one piece of desired render
//! state. Lights, clip planes and textures are shared objects and compare by
//! identity; everything else compares by value.

use std::collections::BTreeMap;
use std::rc::Rc;

use glam::Mat4;

use super::{ClipPlane, Fog, Light, Material, Texture};
use crate::paint::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttribKind {
    Transform,
    ColorTransform,
    AlphaTransform,
    TexMatrix,
    Color,
    Texture,
    TexGen,
    Material,
    Fog,
    RenderMode,
    Light,
    ClipPlane,
    ColorBlend,
    Transparency,
    TextureApply,
    ColorMask,
    DepthTest,
    DepthWrite,
    Stencil,
    CullFace,
    LineSmooth,
    PointShape,
    PolygonOffset,
}

impl AttribKind {
    pub const ALL: [AttribKind; 23] = [
        Self::Transform,
        Self::ColorTransform,
        Self::AlphaTransform,
        Self::TexMatrix,
        Self::Color,
        Self::Texture,
        Self::TexGen,
        Self::Material,
        Self::Fog,
        Self::RenderMode,
        Self::Light,
        Self::ClipPlane,
        Self::ColorBlend,
        Self::Transparency,
        Self::TextureApply,
        Self::ColorMask,
        Self::DepthTest,
        Self::DepthWrite,
        Self::Stencil,
        Self::CullFace,
        Self::LineSmooth,
        Self::PointShape,
        Self::PolygonOffset,
    ];
}

/// Depth and stencil comparison modes; `None` disables the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    None,
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilAction {
    Keep,
    Zero,
    Replace,
    Increment,
    Decrement,
    Invert,
}

/// Stencil test plus the action taken when both stencil and depth pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilAttrib {
    pub mode: CompareMode,
    pub action: StencilAction,
    pub reference: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorBlendMode {
    None,
    Multiply,
    Add,
    MultiplyAdd,
    Alpha,
    Unknown(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransparencyMode {
    None,
    Alpha,
    AlphaSorted,
    Multisample,
    MultisampleMask,
    Binary,
    Unknown(u32),
}

/// Which winding gets culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullFaceMode {
    None,
    Clockwise,
    CounterClockwise,
    All,
    Unknown(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Filled,
    Wireframe,
    Unknown(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderModeAttrib {
    pub mode: RenderMode,
    /// Used by wireframe.
    pub line_width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TexGenAttrib {
    None,
    /// Object-linear S/T/R/Q planes from the rows of the projector matrix.
    TextureProjector(Mat4),
    SphereMap,
    Unknown(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureApplyMode {
    Modulate,
    Decal,
    Blend,
    Replace,
    Add,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointShape {
    Square,
    Round,
}

/// Zero units and factor disable the offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonOffsetAttrib {
    pub units: f32,
    pub factor: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorMaskAttrib {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub alpha: bool,
}

impl ColorMaskAttrib {
    pub const ALL: Self = Self { red: true, green: true, blue: true, alpha: true };
    pub const NONE: Self = Self { red: false, green: false, blue: false, alpha: false };
}

/// Scene color. When on, it replaces every color stream of the geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorAttrib {
    Off,
    On(Color),
}

#[derive(Debug, Clone)]
pub enum TextureAttrib {
    Off,
    On(Rc<Texture>),
}

impl PartialEq for TextureAttrib {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Off, Self::Off) => true,
            (Self::On(a), Self::On(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialAttrib {
    Off,
    On(Material),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FogAttrib {
    Off,
    On(Fog),
}

/// The complete set of active lights. An empty set turns lighting off.
#[derive(Debug, Clone, Default)]
pub struct LightAttrib {
    pub lights: Vec<Rc<Light>>,
}

impl LightAttrib {
    pub fn new(lights: impl IntoIterator<Item = Rc<Light>>) -> Self {
        Self { lights: lights.into_iter().collect() }
    }
}

impl PartialEq for LightAttrib {
    fn eq(&self, other: &Self) -> bool {
        ptr_eq_all(&self.lights, &other.lights)
    }
}

/// The complete set of active clip planes.
#[derive(Debug, Clone, Default)]
pub struct ClipPlaneAttrib {
    pub planes: Vec<Rc<ClipPlane>>,
}

impl ClipPlaneAttrib {
    pub fn new(planes: impl IntoIterator<Item = Rc<ClipPlane>>) -> Self {
        Self { planes: planes.into_iter().collect() }
    }
}

impl PartialEq for ClipPlaneAttrib {
    fn eq(&self, other: &Self) -> bool {
        ptr_eq_all(&self.planes, &other.planes)
    }
}

fn ptr_eq_all<T>(a: &[Rc<T>], b: &[Rc<T>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Rc::ptr_eq(x, y))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attrib {
    Transform(Mat4),
    /// Applied to every emitted vertex color as `M * rgb`.
    ColorTransform(Mat4),
    AlphaTransform { scale: f32, offset: f32 },
    TexMatrix(Mat4),
    Color(ColorAttrib),
    Texture(TextureAttrib),
    TexGen(TexGenAttrib),
    Material(MaterialAttrib),
    Fog(FogAttrib),
    RenderMode(RenderModeAttrib),
    Light(LightAttrib),
    ClipPlane(ClipPlaneAttrib),
    ColorBlend(ColorBlendMode),
    Transparency(TransparencyMode),
    TextureApply(TextureApplyMode),
    ColorMask(ColorMaskAttrib),
    DepthTest(CompareMode),
    DepthWrite(bool),
    Stencil(StencilAttrib),
    CullFace(CullFaceMode),
    LineSmooth(bool),
    PointShape(PointShape),
    PolygonOffset(PolygonOffsetAttrib),
}

impl Attrib {
    pub fn kind(&self) -> AttribKind {
        match self {
            Attrib::Transform(_) => AttribKind::Transform,
            Attrib::ColorTransform(_) => AttribKind::ColorTransform,
            Attrib::AlphaTransform { .. } => AttribKind::AlphaTransform,
            Attrib::TexMatrix(_) => AttribKind::TexMatrix,
            Attrib::Color(_) => AttribKind::Color,
            Attrib::Texture(_) => AttribKind::Texture,
            Attrib::TexGen(_) => AttribKind::TexGen,
            Attrib::Material(_) => AttribKind::Material,
            Attrib::Fog(_) => AttribKind::Fog,
            Attrib::RenderMode(_) => AttribKind::RenderMode,
            Attrib::Light(_) => AttribKind::Light,
            Attrib::ClipPlane(_) => AttribKind::ClipPlane,
            Attrib::ColorBlend(_) => AttribKind::ColorBlend,
            Attrib::Transparency(_) => AttribKind::Transparency,
            Attrib::TextureApply(_) => AttribKind::TextureApply,
            Attrib::ColorMask(_) => AttribKind::ColorMask,
            Attrib::DepthTest(_) => AttribKind::DepthTest,
            Attrib::DepthWrite(_) => AttribKind::DepthWrite,
            Attrib::Stencil(_) => AttribKind::Stencil,
            Attrib::CullFace(_) => AttribKind::CullFace,
            Attrib::LineSmooth(_) => AttribKind::LineSmooth,
            Attrib::PointShape(_) => AttribKind::PointShape,
            Attrib::PolygonOffset(_) => AttribKind::PolygonOffset,
        }
    }

    /// The attribute a freshly reset guardian behaves as if it had issued.
    pub fn initial(kind: AttribKind) -> Attrib {
        match kind {
            AttribKind::Transform => Attrib::Transform(Mat4::IDENTITY),
            AttribKind::ColorTransform => Attrib::ColorTransform(Mat4::IDENTITY),
            AttribKind::AlphaTransform => Attrib::AlphaTransform { scale: 1.0, offset: 0.0 },
            AttribKind::TexMatrix => Attrib::TexMatrix(Mat4::IDENTITY),
            AttribKind::Color => Attrib::Color(ColorAttrib::Off),
            AttribKind::Texture => Attrib::Texture(TextureAttrib::Off),
            AttribKind::TexGen => Attrib::TexGen(TexGenAttrib::None),
            AttribKind::Material => Attrib::Material(MaterialAttrib::Off),
            AttribKind::Fog => Attrib::Fog(FogAttrib::Off),
            AttribKind::RenderMode => {
                Attrib::RenderMode(RenderModeAttrib { mode: RenderMode::Filled, line_width: 1.0 })
            }
            AttribKind::Light => Attrib::Light(LightAttrib::default()),
            AttribKind::ClipPlane => Attrib::ClipPlane(ClipPlaneAttrib::default()),
            AttribKind::ColorBlend => Attrib::ColorBlend(ColorBlendMode::None),
            AttribKind::Transparency => Attrib::Transparency(TransparencyMode::None),
            AttribKind::TextureApply => Attrib::TextureApply(TextureApplyMode::Modulate),
            AttribKind::ColorMask => Attrib::ColorMask(ColorMaskAttrib::ALL),
            AttribKind::DepthTest => Attrib::DepthTest(CompareMode::None),
            AttribKind::DepthWrite => Attrib::DepthWrite(true),
            AttribKind::Stencil => Attrib::Stencil(StencilAttrib {
                mode: CompareMode::None,
                action: StencilAction::Keep,
                reference: 0,
            }),
            AttribKind::CullFace => Attrib::CullFace(CullFaceMode::Clockwise),
            AttribKind::LineSmooth => Attrib::LineSmooth(false),
            AttribKind::PointShape => Attrib::PointShape(PointShape::Square),
            AttribKind::PolygonOffset => Attrib::PolygonOffset(PolygonOffsetAttrib { units: 0.0, factor: 0.0 }),
        }
    }
}

/// At most one attribute per kind, iterated in kind order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttribSet {
    attribs: BTreeMap<AttribKind, Attrib>,
}

impl AttribSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every kind at its initial value.
    pub fn initial() -> Self {
        AttribKind::ALL.into_iter().map(Attrib::initial).collect()
    }

    pub fn with(mut self, attrib: Attrib) -> Self {
        self.set(attrib);
        self
    }

    /// Inserts `attrib`, returning the one it replaced.
    pub fn set(&mut self, attrib: Attrib) -> Option<Attrib> {
        self.attribs.insert(attrib.kind(), attrib)
    }

    pub fn get(&self, kind: AttribKind) -> Option<&Attrib> {
        self.attribs.get(&kind)
    }

    pub fn remove(&mut self, kind: AttribKind) -> Option<Attrib> {
        self.attribs.remove(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attrib> {
        self.attribs.values()
    }

    pub fn kinds(&self) -> impl Iterator<Item = AttribKind> + '_ {
        self.attribs.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.attribs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attribs.is_empty()
    }

    /// Net state below a node: the child's attributes override the parent's,
    /// except transforms, which multiply (`parent * child`).
    pub fn compose(&self, child: &AttribSet) -> AttribSet {
        let mut out = self.clone();
        for attrib in child.iter() {
            let composed = match (self.get(AttribKind::Transform), attrib) {
                (Some(Attrib::Transform(parent)), Attrib::Transform(local)) => Attrib::Transform(*parent * *local),
                _ => attrib.clone(),
            };
            out.set(composed);
        }
        out
    }
}

impl FromIterator<Attrib> for AttribSet {
    fn from_iter<I: IntoIterator<Item = Attrib>>(iter: I) -> Self {
        let mut set = AttribSet::new();
        for a in iter {
            set.set(a);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn kinds_are_consistent() {
        for kind in AttribKind::ALL {
            assert_eq!(Attrib::initial(kind).kind(), kind);
        }
        assert_eq!(AttribSet::initial().len(), AttribKind::ALL.len());
    }

    #[test]
    fn light_sets_compare_by_identity() {
        let a = Rc::new(Light::point(Color::WHITE, Vec3::ZERO));
        let twin = Rc::new(Light::point(Color::WHITE, Vec3::ZERO));
        assert_eq!(LightAttrib::new([a.clone()]), LightAttrib::new([a.clone()]));
        assert_ne!(LightAttrib::new([a]), LightAttrib::new([twin]));
    }

    #[test]
    fn compose_overrides_and_multiplies_transforms() {
        let parent = AttribSet::new()
            .with(Attrib::Transform(Mat4::from_translation(Vec3::X)))
            .with(Attrib::DepthWrite(true))
            .with(Attrib::CullFace(CullFaceMode::None));
        let child = AttribSet::new()
            .with(Attrib::Transform(Mat4::from_scale(Vec3::splat(2.0))))
            .with(Attrib::DepthWrite(false));
        let net = parent.compose(&child);

        assert_eq!(net.get(AttribKind::DepthWrite), Some(&Attrib::DepthWrite(false)));
        assert_eq!(net.get(AttribKind::CullFace), Some(&Attrib::CullFace(CullFaceMode::None)));
        let Some(Attrib::Transform(m)) = net.get(AttribKind::Transform) else {
            panic!("transform missing");
        };
        assert_eq!(m.transform_point3(Vec3::ONE), Vec3::new(3.0, 2.0, 2.0));
    }

    #[test]
    fn set_replaces_same_kind() {
        let mut s = AttribSet::new();
        assert!(s.set(Attrib::LineSmooth(true)).is_none());
        assert_eq!(s.set(Attrib::LineSmooth(false)), Some(Attrib::LineSmooth(true)));
        assert_eq!(s.len(), 1);
    }
}
