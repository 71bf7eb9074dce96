//! The graphics state guardian.
//!
//! A [`GraphicsStateGuardian`] sits between the scene and one immediate-mode
//! [`Backend`] context. It keeps a shadow copy of the backend's state,
//! turns attribute transitions into the minimal call sequence, owns the GPU
//! side of textures, allocates light and clip-plane slots, and runs the
//! multi-pass tricks (decals, frame-buffer save/restore).
//!
//! One guardian per context, used from the thread that owns the context.

mod decal;
mod draw;
mod framebuffer;
mod issue;
mod lights;
pub mod mapping;
mod render;
mod slots;
mod state;
mod texture;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context as _;
use glam::Mat4;

use crate::backend::{Backend, BackendLimits, Capability, RenderBuffer};
use crate::config::{DecalMode, GsgConfig};
use crate::coords::Region;
use crate::scene::{AttribSet, ClipPlane, Light};

pub use decal::{ColorSuppression, DecalStrategy, DepthOffsetDecals, ThreePassDecals};
pub use framebuffer::SavedFrameBuffer;
pub use render::{Camera, ClearRequest, RenderRegion};
pub use slots::{Assignment, SlotIdentity, SlotPool};
pub use state::{State, update};
pub use texture::{TextureContext, TextureContextId};

static NEXT_GSG: AtomicU64 = AtomicU64::new(1);

/// Identifies one guardian; textures key their GPU contexts by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GsgId(u64);

/// Software color transform applied to every emitted vertex color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ColorTransform {
    pub matrix: Mat4,
    pub alpha_scale: f32,
    pub alpha_offset: f32,
}

impl ColorTransform {
    pub const IDENTITY: Self = Self { matrix: Mat4::IDENTITY, alpha_scale: 1.0, alpha_offset: 0.0 };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

pub struct GraphicsStateGuardian<B: Backend> {
    id: GsgId,
    backend: B,
    config: GsgConfig,
    valid: bool,
    limits: BackendLimits,
    /// Planes this context actually has.
    buffer_mask: RenderBuffer,
    state: State,

    /// Attributes last issued, one per kind.
    attribs: AttribSet,
    transform: Mat4,
    view: Mat4,
    color_transform: ColorTransform,
    scene_color: Option<crate::paint::Color>,
    decal_depth_suppressed: bool,

    lights: SlotPool<Rc<Light>>,
    clip_planes: SlotPool<Rc<ClipPlane>>,
    lighting_enabled_this_frame: bool,

    textures: HashMap<TextureContextId, TextureContext>,
    next_texture_context: u64,
    texture_record: HashSet<TextureContextId>,

    decal: Rc<dyn DecalStrategy<B>>,
    decal_level: u32,

    regions: Vec<Region>,
    errors_reported: usize,
}

impl<B: Backend> GraphicsStateGuardian<B> {
    /// Binds a guardian to `backend`'s context, activates it and resets.
    ///
    /// Fails when the context cannot be made current; the backend is then
    /// unusable and no guardian exists for it.
    pub fn new(backend: B, config: GsgConfig) -> anyhow::Result<Self> {
        let decal: Rc<dyn DecalStrategy<B>> = match config.decal_mode {
            DecalMode::Offset => Rc::new(DepthOffsetDecals { per_level: config.decal_offset_per_level }),
            DecalMode::Mask => Rc::new(ThreePassDecals { suppress: ColorSuppression::Mask }),
            DecalMode::Blend => Rc::new(ThreePassDecals { suppress: ColorSuppression::Blend }),
        };
        let limits = backend.limits();
        let mut gsg = Self {
            id: GsgId(NEXT_GSG.fetch_add(1, Ordering::Relaxed)),
            backend,
            config,
            valid: false,
            limits,
            buffer_mask: RenderBuffer::empty(),
            state: State::initial(&limits),
            attribs: AttribSet::new(),
            transform: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            color_transform: ColorTransform::IDENTITY,
            scene_color: None,
            decal_depth_suppressed: false,
            lights: SlotPool::new(0),
            clip_planes: SlotPool::new(0),
            lighting_enabled_this_frame: false,
            textures: HashMap::new(),
            next_texture_context: 1,
            texture_record: HashSet::new(),
            decal,
            decal_level: 0,
            regions: Vec::new(),
            errors_reported: 0,
        };

        if let Err(e) = gsg.backend.make_current().context("activating backend context") {
            log::error!("guardian creation failed: {e:#}");
            return Err(e);
        }
        gsg.reset();
        log::info!(
            "guardian {:?} ready: {} light slots, {} clip planes, decals via {}",
            gsg.id,
            gsg.limits.max_lights,
            gsg.limits.max_clip_planes,
            gsg.decal.name()
        );
        Ok(gsg)
    }

    /// Makes this guardian's context current. Cheap when it already is.
    ///
    /// Returns `false` (and logs) when the context is gone; the guardian is
    /// marked invalid and callers must stop issuing.
    pub fn activate(&mut self) -> bool {
        if self.backend.is_current() {
            return self.valid;
        }
        match self.backend.make_current() {
            Ok(()) => self.valid,
            Err(e) => {
                log::error!("guardian {:?}: context activation failed: {e}", self.id);
                self.valid = false;
                false
            }
        }
    }

    /// Re-synchronizes the shadow state with the backend.
    ///
    /// Runs once after creation and again whenever something outside the
    /// guardian may have touched the context (or the framebuffer was
    /// resized). Slot bindings and texture contexts survive; everything else
    /// is pushed from scratch.
    pub fn reset(&mut self) {
        let limits = self.backend.limits();
        self.limits = limits;

        let mut mask = RenderBuffer::FRONT_LEFT | RenderBuffer::DEPTH | RenderBuffer::STENCIL | RenderBuffer::ACCUM;
        if limits.double_buffered {
            mask |= RenderBuffer::BACK_LEFT;
        }
        if limits.stereo {
            mask |= RenderBuffer::FRONT_RIGHT;
            if limits.double_buffered {
                mask |= RenderBuffer::BACK_RIGHT;
            }
        }
        self.buffer_mask = mask;

        if self.lights.len() != limits.max_lights {
            self.lights = SlotPool::new(limits.max_lights);
        }
        if self.clip_planes.len() != limits.max_clip_planes {
            self.clip_planes = SlotPool::new(limits.max_clip_planes);
        }
        self.lights.clear_bindings();
        self.clip_planes.clear_bindings();

        self.state = State::initial(&limits);
        self.state.apply_to(&mut self.backend);

        self.enable(Capability::DITHER, false);
        self.enable(Capability::LINE_SMOOTH, false);
        self.enable(Capability::MULTISAMPLE, true);
        self.enable(Capability::NORMALIZE, self.config.auto_normalize_lighting);
        if self.config.cheap_textures {
            self.set_perspective_hint_fastest(true);
        }

        self.attribs = AttribSet::new();
        self.transform = Mat4::IDENTITY;
        self.view = Mat4::IDENTITY;
        self.color_transform = ColorTransform::IDENTITY;
        self.scene_color = None;
        self.decal_depth_suppressed = false;
        self.decal_level = 0;
        self.regions.clear();
        self.set_attribs(&AttribSet::initial());

        self.valid = true;
        self.report_errors();
    }

    #[inline]
    pub fn id(&self) -> GsgId {
        self.id
    }

    /// False once activation failed.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Direct access to the backend. Anything changed through it is
    /// invisible to the shadow state until the next [`reset`](Self::reset).
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn config(&self) -> &GsgConfig {
        &self.config
    }

    pub fn limits(&self) -> &BackendLimits {
        &self.limits
    }

    pub fn buffer_mask(&self) -> RenderBuffer {
        self.buffer_mask
    }

    pub fn attribs(&self) -> &AttribSet {
        &self.attribs
    }

    /// Window-sized region of this context.
    pub fn full_region(&self) -> Region {
        Region::sized(self.limits.width, self.limits.height)
    }

    /// Backend errors drained so far.
    pub fn errors_reported(&self) -> usize {
        self.errors_reported
    }

    /// Drains and logs pending backend errors. Debug builds only.
    pub fn report_errors(&mut self) {
        if !cfg!(debug_assertions) {
            return;
        }
        while let Some(err) = self.backend.poll_error() {
            log::error!("guardian {:?}: backend error: {err}", self.id);
            self.errors_reported += 1;
        }
    }
}

impl<B: Backend> Drop for GraphicsStateGuardian<B> {
    fn drop(&mut self) {
        self.release_all_textures();
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::backend::recording::Recording;
    use crate::backend::soft::SoftBackend;

    pub type TestGsg = GraphicsStateGuardian<Recording<SoftBackend>>;

    pub fn gsg(width: u32, height: u32) -> TestGsg {
        gsg_with(SoftBackend::new(width, height), GsgConfig::default())
    }

    pub fn gsg_with(backend: SoftBackend, config: GsgConfig) -> TestGsg {
        let mut g = GraphicsStateGuardian::new(Recording::new(backend), config).expect("guardian");
        g.backend_mut().clear();
        g
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use crate::backend::recording::{Call, Recording};
    use crate::backend::soft::SoftBackend;

    // ── creation ────────────────────────────────────────────────────────

    #[test]
    fn new_resets_and_is_valid() {
        let g = gsg(8, 8);
        assert!(g.is_valid());
        assert_eq!(g.limits().max_lights, crate::backend::soft::MAX_LIGHTS);
        assert!(g.buffer_mask().contains(RenderBuffer::BACK_LEFT));
        assert!(!g.buffer_mask().contains(RenderBuffer::FRONT_RIGHT));
        assert!(g.state().is_enabled(Capability::MULTISAMPLE));
        assert!(!g.state().is_enabled(Capability::DITHER));
        assert_eq!(g.errors_reported(), 0);
    }

    #[test]
    fn lost_context_fails_creation() {
        let mut soft = SoftBackend::new(4, 4);
        soft.lose_context();
        assert!(GraphicsStateGuardian::new(Recording::new(soft), GsgConfig::default()).is_err());
    }

    #[test]
    fn reset_matches_the_backend() {
        let mut g = gsg(4, 4);
        g.backend_mut().inner_mut().set_capability(Capability::FOG, true);
        g.reset();
        assert!(!g.backend().inner().is_enabled(Capability::FOG));
        assert!(!g.backend().inner().is_enabled(Capability::DITHER));
        assert!(g.backend().inner().depth_write_enabled());
    }

    #[test]
    fn activate_is_cheap_when_current() {
        let mut g = gsg(4, 4);
        assert!(g.activate());
        assert_eq!(g.backend().count(|c| *c == Call::MakeCurrent), 0);

        let mut other = gsg(4, 4);
        assert!(other.activate());
        assert!(g.activate());
        assert_eq!(g.backend().count(|c| *c == Call::MakeCurrent), 1);
    }

    #[test]
    fn lost_context_invalidates_on_activate() {
        let mut g = gsg(4, 4);
        let _other = gsg(4, 4);
        g.backend_mut().inner_mut().lose_context();
        assert!(!g.activate());
        assert!(!g.is_valid());
    }
}
