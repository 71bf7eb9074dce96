//! GPU texture contexts.
//!
//! A [`TextureContext`] owns one backend texture name for one logical
//! [`Texture`]. The guardian keeps the prepared set; the texture keeps a
//! back-reference so it can find (or lose) its context.

use std::rc::{Rc, Weak};

use super::{GraphicsStateGuardian, mapping};
use crate::backend::{Backend, PixelBuffer, PixelFormat, SamplerFilter, TextureHandle};
use crate::coords::Region;
use crate::paint::Color;
use crate::scene::Texture;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureContextId(pub(crate) u64);

#[derive(Debug)]
pub struct TextureContext {
    id: TextureContextId,
    handle: TextureHandle,
    texture: Weak<Texture>,
    width: u32,
    height: u32,
    mipmapped: bool,
}

impl TextureContext {
    pub fn id(&self) -> TextureContextId {
        self.id
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    /// Backing-store size.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_mipmapped(&self) -> bool {
        self.mipmapped
    }

    pub fn texture(&self) -> Option<Rc<Texture>> {
        self.texture.upgrade()
    }
}

/// Level colors for visualizing mip selection.
const MIP_PALETTE: [Color; 10] = [
    Color::new(1.0, 1.0, 1.0, 1.0),
    Color::new(1.0, 0.0, 0.0, 1.0),
    Color::new(0.0, 1.0, 0.0, 1.0),
    Color::new(0.0, 0.0, 1.0, 1.0),
    Color::new(1.0, 1.0, 0.0, 1.0),
    Color::new(0.0, 1.0, 1.0, 1.0),
    Color::new(1.0, 0.0, 1.0, 1.0),
    Color::new(1.0, 0.5, 0.0, 1.0),
    Color::new(0.0, 1.0, 0.5, 1.0),
    Color::new(0.7, 0.6, 1.0, 1.0),
];

/// Sizes of every level below `(w, h)` down to 1×1. Once one side reaches
/// 1 the chain continues as N×1 or 1×N.
fn mip_sizes(width: u32, height: u32) -> Vec<(u32, u32)> {
    let mut sizes = Vec::new();
    let (mut w, mut h) = (width.max(1), height.max(1));
    while w > 1 || h > 1 {
        w = (w / 2).max(1);
        h = (h / 2).max(1);
        sizes.push((w, h));
    }
    sizes
}

/// 2×2 box filter of an RGB/RGBA image into RGBA8 of size `(w, h)`.
fn downsample(src: &PixelBuffer, w: u32, h: u32) -> PixelBuffer {
    let mut out = Vec::with_capacity(w as usize * h as usize * 4);
    for y in 0..h {
        for x in 0..w {
            let mut sum = [0u32; 4];
            let mut n = 0;
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let sx = (x * 2 + dx).min(src.width.saturating_sub(1));
                let sy = (y * 2 + dy).min(src.height.saturating_sub(1));
                if let Some(px) = src.rgba_at(sx, sy) {
                    for (s, p) in sum.iter_mut().zip(px) {
                        *s += u32::from(p);
                    }
                    n += 1;
                }
            }
            let n = n.max(1);
            out.extend(sum.iter().map(|s| ((s + n / 2) / n) as u8));
        }
    }
    PixelBuffer::rgba8(w, h, out)
}

impl<B: Backend> GraphicsStateGuardian<B> {
    /// Creates the GPU side of `texture`: a new backend name with sampler
    /// parameters and image data (or a mip chain). Preparing a texture that
    /// already has a context here is a contract violation.
    pub fn prepare_texture(&mut self, texture: &Rc<Texture>) -> TextureContextId {
        debug_assert!(
            !texture.is_prepared_on(self.id),
            "texture {:?} prepared twice on {:?}",
            texture.name(),
            self.id
        );

        let handle = self.backend.gen_texture();
        self.bind_texture(handle);

        let (min, mipmap) = mapping::min_filter(
            texture.min_filter(),
            self.config.force_mipmaps,
            self.config.ignore_mipmaps,
        );
        let mag = mapping::mag_filter(texture.mag_filter(), self.config.force_mipmaps, self.config.ignore_mipmaps);
        let filter = SamplerFilter { min, mag, mipmap };
        self.backend.texture_params(
            mapping::wrap_mode(texture.wrap_u()),
            mapping::wrap_mode(texture.wrap_v()),
            filter,
        );

        let mipmapped = mipmap.is_some();
        let (width, height) = {
            let image = texture.image();
            if image.has_data() {
                self.upload_image(&image, mipmapped);
            }
            (image.width, image.height)
        };

        let id = TextureContextId(self.next_texture_context);
        self.next_texture_context += 1;
        self.textures.insert(
            id,
            TextureContext { id, handle, texture: Rc::downgrade(texture), width, height, mipmapped },
        );
        texture.bind_context(self.id, id);
        log::debug!("prepared texture {:?} as {id:?} ({width}x{height})", texture.name());
        self.report_errors();
        id
    }

    fn upload_image(&mut self, image: &PixelBuffer, mipmapped: bool) {
        let phony = mipmapped && cfg!(debug_assertions) && self.config.show_mipmaps;
        if phony {
            self.backend.tex_image(0, &PixelBuffer::filled(image.width, image.height, MIP_PALETTE[0]));
        } else {
            self.backend.tex_image(0, image);
        }
        if !mipmapped {
            return;
        }
        let mut prev: Option<PixelBuffer> = None;
        for (level, (w, h)) in mip_sizes(image.width, image.height).into_iter().enumerate() {
            let level = level as u32 + 1;
            let data = if phony {
                let color = MIP_PALETTE[level as usize % MIP_PALETTE.len()];
                log::info!("phony mipmap level {level}: {w}x{h} {color:?}");
                PixelBuffer::filled(w, h, color)
            } else {
                downsample(prev.as_ref().unwrap_or(image), w, h)
            };
            self.backend.tex_image(level, &data);
            prev = Some(data);
        }
    }

    /// Context for `texture` on this guardian, preparing it on first use.
    pub fn prepare(&mut self, texture: &Rc<Texture>) -> TextureContextId {
        match texture.context(self.id) {
            Some(id) if self.textures.contains_key(&id) => id,
            _ => self.prepare_texture(texture),
        }
    }

    /// Binds an already prepared texture. No upload happens here.
    pub fn apply_texture(&mut self, id: TextureContextId) {
        let Some(handle) = self.textures.get(&id).map(|tc| tc.handle) else {
            debug_assert!(false, "apply of texture context {id:?} not prepared on {:?}", self.id);
            return;
        };
        self.bind_texture(handle);
        self.texture_record.insert(id);
    }

    /// Deletes the GPU texture, drops the context from the prepared set and
    /// clears the texture's back-reference. Releasing a context that is not
    /// prepared here is a contract violation.
    pub fn release_texture(&mut self, id: TextureContextId) {
        let ctx = self.textures.remove(&id);
        debug_assert!(ctx.is_some(), "release of texture context {id:?} not prepared on {:?}", self.id);
        let Some(ctx) = ctx else {
            return;
        };
        if self.state.bound_texture == ctx.handle {
            self.bind_texture(TextureHandle::NONE);
        }
        self.backend.delete_texture(ctx.handle);
        self.texture_record.remove(&id);
        if let Some(texture) = ctx.texture.upgrade() {
            texture.unbind_context(self.id);
            log::debug!("released texture {:?} ({id:?})", texture.name());
        }
        self.report_errors();
    }

    pub fn release_all_textures(&mut self) {
        let mut ids: Vec<_> = self.textures.keys().copied().collect();
        ids.sort();
        for id in ids {
            self.release_texture(id);
        }
    }

    pub fn texture_context(&self, id: TextureContextId) -> Option<&TextureContext> {
        self.textures.get(&id)
    }

    /// Size of the prepared set.
    pub fn prepared_textures(&self) -> usize {
        self.textures.len()
    }

    /// Distinct textures bound since the frame started.
    pub fn textures_applied_this_frame(&self) -> usize {
        self.texture_record.len()
    }

    /// Copies `region` of the read buffer into `texture`.
    ///
    /// The backing store is the smallest power of two covering the region,
    /// capped at the configured maximum; the requested size is kept on the
    /// texture so sampling can clamp to the valid part.
    pub fn copy_texture(&mut self, texture: &Rc<Texture>, region: Region) -> TextureContextId {
        let cap = self.config.max_copy_texture_size.min(self.limits.max_texture_size).max(1);
        let w = region.width.max(1).next_power_of_two().min(cap);
        let h = region.height.max(1).next_power_of_two().min(cap);
        let format = match texture.image().format {
            f if f.is_color() => f,
            _ => PixelFormat::Rgba8,
        };

        texture.set_requested_size(Some((region.width, region.height)));
        texture.replace_image(PixelBuffer::empty(w, h, format));

        let id = self.prepare(texture);
        if let Some(tc) = self.textures.get_mut(&id) {
            tc.width = w;
            tc.height = h;
        }
        self.apply_texture(id);
        self.backend.copy_tex_image(0, Region::new(region.x, region.y, w, h), format);
        self.report_errors();
        id
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::*;
    use crate::backend::recording::Call;
    use crate::backend::soft::SoftBackend;
    use crate::config::GsgConfig;
    use crate::scene::FilterType;

    fn checker() -> Rc<Texture> {
        let mut bytes = Vec::new();
        for i in 0..16 {
            let v = if i % 2 == 0 { 255 } else { 0 };
            bytes.extend([v, v, v, 255]);
        }
        Rc::new(Texture::new("checker", PixelBuffer::rgba8(4, 4, bytes)))
    }

    // ── lifecycle ───────────────────────────────────────────────────────

    #[test]
    fn prepare_then_release_empties_the_set() {
        let mut g = gsg(4, 4);
        let tex = checker();
        let id = g.prepare_texture(&tex);
        assert_eq!(g.prepared_textures(), 1);
        assert_eq!(tex.context(g.id()), Some(id));
        assert_eq!(g.backend().inner().live_textures(), 1);

        g.release_texture(id);
        assert_eq!(g.prepared_textures(), 0);
        assert_eq!(tex.context(g.id()), None);
        assert_eq!(g.backend().inner().live_textures(), 0);
        assert_eq!(g.errors_reported(), 0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "not prepared")]
    fn double_release_asserts() {
        let mut g = gsg(4, 4);
        let id = g.prepare_texture(&checker());
        g.release_texture(id);
        g.release_texture(id);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "prepared twice")]
    fn double_prepare_asserts() {
        let mut g = gsg(4, 4);
        let tex = checker();
        g.prepare_texture(&tex);
        g.prepare_texture(&tex);
    }

    #[test]
    fn release_then_use_prepares_again() {
        let mut g = gsg(4, 4);
        let tex = checker();
        let first = g.prepare(&tex);
        g.release_texture(first);
        let second = g.prepare(&tex);
        assert_ne!(first, second);
        assert_eq!(g.prepared_textures(), 1);
    }

    #[test]
    fn apply_binds_without_upload() {
        let mut g = gsg(4, 4);
        let tex = checker();
        let id = g.prepare_texture(&tex);
        g.bind_texture(TextureHandle::NONE);
        g.backend_mut().clear();

        g.apply_texture(id);
        assert_eq!(g.backend().calls().len(), 1);
        assert!(matches!(g.backend().calls()[0], Call::BindTexture(_)));
        assert_eq!(g.textures_applied_this_frame(), 1);
    }

    #[test]
    fn drop_releases_everything() {
        let tex = checker();
        let id = {
            let mut g = gsg(4, 4);
            g.prepare_texture(&tex);
            assert!(tex.is_prepared_on(g.id()));
            g.id()
        };
        assert!(!tex.is_prepared_on(id));
    }

    // ── mipmaps ─────────────────────────────────────────────────────────

    #[test]
    fn mip_chain_goes_to_one_by_one() {
        assert_eq!(mip_sizes(8, 2), vec![(4, 1), (2, 1), (1, 1)]);
        assert!(mip_sizes(1, 1).is_empty());

        let mut g = gsg(4, 4);
        let tex = Rc::new(
            Texture::new("m", PixelBuffer::filled(4, 4, Color::WHITE))
                .with_filters(FilterType::LinearMipmapLinear, FilterType::Linear),
        );
        g.prepare_texture(&tex);
        assert_eq!(g.backend().count(|c| matches!(c, Call::TexImage { .. })), 3);
    }

    #[test]
    fn ignore_mipmaps_uploads_one_level_unless_forced() {
        let tex = || {
            Rc::new(
                Texture::new("m", PixelBuffer::filled(4, 4, Color::WHITE))
                    .with_filters(FilterType::NearestMipmapNearest, FilterType::Nearest),
            )
        };
        let config = GsgConfig { ignore_mipmaps: true, ..GsgConfig::default() };
        let mut g = gsg_with(SoftBackend::new(4, 4), config.clone());
        g.prepare_texture(&tex());
        assert_eq!(g.backend().count(|c| matches!(c, Call::TexImage { .. })), 1);

        let mut g = gsg_with(SoftBackend::new(4, 4), GsgConfig { force_mipmaps: true, ..config });
        let id = g.prepare_texture(&tex());
        assert!(g.texture_context(id).unwrap().is_mipmapped());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn show_mipmaps_paints_each_level() {
        let config = GsgConfig { show_mipmaps: true, ..GsgConfig::default() };
        let mut g = gsg_with(SoftBackend::new(4, 4), config);
        let tex = Rc::new(
            Texture::new("m", PixelBuffer::filled(8, 2, Color::BLACK))
                .with_filters(FilterType::LinearMipmapLinear, FilterType::Linear),
        );
        let id = g.prepare_texture(&tex);
        let handle = g.texture_context(id).unwrap().handle();

        let levels: Vec<_> = g
            .backend()
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::TexImage { level, width, height } => Some((*level, *width, *height)),
                _ => None,
            })
            .collect();
        assert_eq!(levels, vec![(0, 8, 2), (1, 4, 1), (2, 2, 1), (3, 1, 1)]);

        for (level, w, h) in levels {
            let want = MIP_PALETTE[level as usize].to_rgba8();
            let soft = g.backend().inner();
            assert_eq!(soft.texture_texel(handle, level, 0, 0), Some(want), "level {level}");
            assert_eq!(soft.texture_texel(handle, level, w - 1, h - 1), Some(want), "level {level}");
        }
    }

    #[test]
    fn box_filter_averages() {
        let src = PixelBuffer::rgba8(2, 1, vec![0, 0, 0, 255, 255, 255, 255, 255]);
        let out = downsample(&src, 1, 1);
        assert_eq!(out.rgba_at(0, 0), Some([128, 128, 128, 255]));
    }

    // ── copy from the framebuffer ───────────────────────────────────────

    #[test]
    fn copy_texture_promotes_to_power_of_two() {
        let mut g = gsg(64, 64);
        for (w, h, pw, ph) in [(5, 3, 8, 4), (16, 16, 16, 16), (33, 1, 64, 1)] {
            let tex = Rc::new(Texture::empty("copy", 1, 1, PixelFormat::Rgb8));
            let id = g.copy_texture(&tex, Region::new(1, 2, w, h));
            assert_eq!(g.texture_context(id).unwrap().size(), (pw, ph));
            assert_eq!(tex.requested_size(), Some((w, h)));
            assert_eq!(tex.image().width, pw);
            let handle = g.texture_context(id).unwrap().handle();
            assert_eq!(g.backend().inner().texture_level_size(handle, 0), Some((pw, ph)));
        }
    }

    #[test]
    fn copy_texture_respects_the_cap() {
        let config = GsgConfig { max_copy_texture_size: 16, ..GsgConfig::default() };
        let mut g = gsg_with(SoftBackend::new(64, 64), config);
        let tex = Rc::new(Texture::empty("copy", 1, 1, PixelFormat::Rgba8));
        let id = g.copy_texture(&tex, Region::sized(40, 9));
        assert_eq!(g.texture_context(id).unwrap().size(), (16, 16));
        assert_eq!(tex.requested_size(), Some((40, 9)));
    }
}
