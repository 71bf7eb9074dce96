use std::cell::{Cell, Ref, RefCell};

use crate::backend::{PixelBuffer, PixelFormat};
use crate::gsg::{GsgId, TextureContextId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Clamp,
    Repeat,
    Mirror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl FilterType {
    #[inline]
    pub fn is_mipmap(self) -> bool {
        !matches!(self, FilterType::Nearest | FilterType::Linear)
    }
}

/// A logical texture: a CPU image plus sampling modes.
///
/// GPU residency is tracked per guardian through a back-reference to the
/// live [`TextureContextId`]. A guardian releasing the GPU side clears the
/// back-reference, so the next use prepares the texture again.
#[derive(Debug)]
pub struct Texture {
    name: String,
    image: RefCell<PixelBuffer>,
    wrap_u: WrapMode,
    wrap_v: WrapMode,
    min_filter: FilterType,
    mag_filter: FilterType,
    requested_size: Cell<Option<(u32, u32)>>,
    contexts: RefCell<Vec<(GsgId, TextureContextId)>>,
}

impl Texture {
    pub fn new(name: impl Into<String>, image: PixelBuffer) -> Self {
        Self {
            name: name.into(),
            image: RefCell::new(image),
            wrap_u: WrapMode::Repeat,
            wrap_v: WrapMode::Repeat,
            min_filter: FilterType::Linear,
            mag_filter: FilterType::Linear,
            requested_size: Cell::new(None),
            contexts: RefCell::new(Vec::new()),
        }
    }

    /// Sized texture whose contents will come from the framebuffer.
    pub fn empty(name: impl Into<String>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self::new(name, PixelBuffer::empty(width, height, format))
    }

    pub fn with_wrap(mut self, u: WrapMode, v: WrapMode) -> Self {
        self.wrap_u = u;
        self.wrap_v = v;
        self
    }

    pub fn with_filters(mut self, min: FilterType, mag: FilterType) -> Self {
        self.min_filter = min;
        self.mag_filter = mag;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> Ref<'_, PixelBuffer> {
        self.image.borrow()
    }

    pub(crate) fn replace_image(&self, image: PixelBuffer) {
        *self.image.borrow_mut() = image;
    }

    pub fn wrap_u(&self) -> WrapMode {
        self.wrap_u
    }

    pub fn wrap_v(&self) -> WrapMode {
        self.wrap_v
    }

    pub fn min_filter(&self) -> FilterType {
        self.min_filter
    }

    pub fn mag_filter(&self) -> FilterType {
        self.mag_filter
    }

    /// Size the caller asked for when the backing store was promoted to a
    /// power of two. `None` when the image is used as-is.
    pub fn requested_size(&self) -> Option<(u32, u32)> {
        self.requested_size.get()
    }

    pub(crate) fn set_requested_size(&self, size: Option<(u32, u32)>) {
        self.requested_size.set(size);
    }

    /// Live context on guardian `gsg`, if prepared there.
    pub fn context(&self, gsg: GsgId) -> Option<TextureContextId> {
        self.contexts.borrow().iter().find(|(g, _)| *g == gsg).map(|(_, id)| *id)
    }

    pub fn is_prepared_on(&self, gsg: GsgId) -> bool {
        self.context(gsg).is_some()
    }

    pub(crate) fn bind_context(&self, gsg: GsgId, id: TextureContextId) {
        let mut contexts = self.contexts.borrow_mut();
        debug_assert!(
            contexts.iter().all(|(g, _)| *g != gsg),
            "texture {:?} already has a context on {gsg:?}",
            self.name
        );
        contexts.push((gsg, id));
    }

    pub(crate) fn unbind_context(&self, gsg: GsgId) -> Option<TextureContextId> {
        let mut contexts = self.contexts.borrow_mut();
        let i = contexts.iter().position(|(g, _)| *g == gsg)?;
        Some(contexts.swap_remove(i).1)
    }
}
