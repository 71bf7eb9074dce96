//! Texture objects and sampling for the software backend.

use glam::{Vec2, Vec4};

use crate::backend::{AddressMode, FilterMode, PixelBuffer, PixelFormat, SamplerFilter};

pub(super) struct Level {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[u8; 4]>,
}

impl Level {
    /// Converts a color pixel buffer. Non-color formats are rejected.
    pub fn from_pixels(image: &PixelBuffer) -> Option<Level> {
        let bytes = image.bytes()?;
        let n = image.pixel_count();
        let texels: Vec<[u8; 4]> = match image.format {
            PixelFormat::Rgba8 if bytes.len() == n * 4 => {
                bytes.chunks_exact(4).map(|p| [p[0], p[1], p[2], p[3]]).collect()
            }
            PixelFormat::Rgb8 if bytes.len() == n * 3 => {
                bytes.chunks_exact(3).map(|p| [p[0], p[1], p[2], 255]).collect()
            }
            _ => return None,
        };
        Some(Level { width: image.width, height: image.height, texels })
    }

    #[inline]
    fn fetch(&self, x: u32, y: u32) -> Vec4 {
        let [r, g, b, a] = self.texels[y as usize * self.width as usize + x as usize];
        Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
    }
}

pub(super) struct SoftTexture {
    pub levels: Vec<Option<Level>>,
    pub wrap_u: AddressMode,
    pub wrap_v: AddressMode,
    pub filter: SamplerFilter,
}

impl Default for SoftTexture {
    fn default() -> Self {
        Self {
            levels: Vec::new(),
            wrap_u: AddressMode::Repeat,
            wrap_v: AddressMode::Repeat,
            filter: SamplerFilter {
                min: FilterMode::Nearest,
                mag: FilterMode::Linear,
                mipmap: Some(FilterMode::Linear),
            },
        }
    }
}

impl SoftTexture {
    pub fn set_level(&mut self, level: u32, data: Level) {
        let i = level as usize;
        if self.levels.len() <= i {
            self.levels.resize_with(i + 1, || None);
        }
        self.levels[i] = Some(data);
    }

    pub fn level_size(&self, level: u32) -> Option<(u32, u32)> {
        self.levels.get(level as usize)?.as_ref().map(|l| (l.width, l.height))
    }

    pub fn texel(&self, level: u32, x: u32, y: u32) -> Option<[u8; 4]> {
        let l = self.levels.get(level as usize)?.as_ref()?;
        if x >= l.width || y >= l.height {
            return None;
        }
        Some(l.texels[y as usize * l.width as usize + x as usize])
    }

    /// Number of leading levels present without gaps.
    fn complete_levels(&self) -> usize {
        self.levels.iter().take_while(|l| l.is_some()).count()
    }

    /// Samples at `uv` with level-of-detail `lod` (log2 texels per pixel).
    /// Returns `None` when the base level is missing.
    pub fn sample(&self, uv: Vec2, lod: f32) -> Option<Vec4> {
        let base = self.levels.first()?.as_ref()?;
        if lod <= 0.0 {
            return Some(self.sample_level(base, uv, self.filter.mag));
        }
        let count = self.complete_levels();
        let Some(mip) = self.filter.mipmap.filter(|_| count > 1) else {
            return Some(self.sample_level(base, uv, self.filter.min));
        };
        let max = (count - 1) as f32;
        let lod = lod.min(max);
        let level = |i: usize| self.levels[i].as_ref();
        match mip {
            FilterMode::Nearest => {
                let l = level(lod.round() as usize)?;
                Some(self.sample_level(l, uv, self.filter.min))
            }
            FilterMode::Linear => {
                let lo = lod.floor() as usize;
                let hi = (lo + 1).min(count - 1);
                let t = lod - lo as f32;
                let a = self.sample_level(level(lo)?, uv, self.filter.min);
                let b = self.sample_level(level(hi)?, uv, self.filter.min);
                Some(a.lerp(b, t))
            }
        }
    }

    fn sample_level(&self, level: &Level, uv: Vec2, filter: FilterMode) -> Vec4 {
        let (w, h) = (level.width as i64, level.height as i64);
        let u = uv.x * w as f32;
        let v = uv.y * h as f32;
        match filter {
            FilterMode::Nearest => {
                let x = wrap(u.floor() as i64, w, self.wrap_u);
                let y = wrap(v.floor() as i64, h, self.wrap_v);
                level.fetch(x, y)
            }
            FilterMode::Linear => {
                let (u, v) = (u - 0.5, v - 0.5);
                let (x0, y0) = (u.floor(), v.floor());
                let (fx, fy) = (u - x0, v - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);
                let xa = wrap(x0, w, self.wrap_u);
                let xb = wrap(x0 + 1, w, self.wrap_u);
                let ya = wrap(y0, h, self.wrap_v);
                let yb = wrap(y0 + 1, h, self.wrap_v);
                let bottom = level.fetch(xa, ya).lerp(level.fetch(xb, ya), fx);
                let top = level.fetch(xa, yb).lerp(level.fetch(xb, yb), fx);
                bottom.lerp(top, fy)
            }
        }
    }
}

fn wrap(i: i64, size: i64, mode: AddressMode) -> u32 {
    let i = match mode {
        AddressMode::Repeat => i.rem_euclid(size),
        AddressMode::MirrorRepeat => {
            let period = i.rem_euclid(2 * size);
            if period < size { period } else { 2 * size - 1 - period }
        }
        // No border color: clamp to the edge texel.
        AddressMode::ClampToEdge | AddressMode::ClampToBorder => i.clamp(0, size - 1),
    };
    i as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Level {
        // 2x2: black, white / white, black
        Level {
            width: 2,
            height: 2,
            texels: vec![[0, 0, 0, 255], [255; 4], [255; 4], [0, 0, 0, 255]],
        }
    }

    fn nearest() -> SamplerFilter {
        SamplerFilter { min: FilterMode::Nearest, mag: FilterMode::Nearest, mipmap: None }
    }

    #[test]
    fn wrap_modes() {
        assert_eq!(wrap(-1, 4, AddressMode::Repeat), 3);
        assert_eq!(wrap(5, 4, AddressMode::Repeat), 1);
        assert_eq!(wrap(-1, 4, AddressMode::ClampToEdge), 0);
        assert_eq!(wrap(9, 4, AddressMode::ClampToEdge), 3);
        assert_eq!(wrap(4, 4, AddressMode::MirrorRepeat), 3);
    }

    #[test]
    fn nearest_sampling_hits_texel_centers() {
        let mut t = SoftTexture { filter: nearest(), ..SoftTexture::default() };
        t.set_level(0, checker());
        assert_eq!(t.sample(Vec2::new(0.25, 0.25), 0.0), Some(Vec4::new(0.0, 0.0, 0.0, 1.0)));
        assert_eq!(t.sample(Vec2::new(0.75, 0.25), 0.0), Some(Vec4::ONE));
    }

    #[test]
    fn linear_sampling_blends_neighbors() {
        let mut t = SoftTexture {
            filter: SamplerFilter { min: FilterMode::Linear, mag: FilterMode::Linear, mipmap: None },
            wrap_u: AddressMode::ClampToEdge,
            wrap_v: AddressMode::ClampToEdge,
            ..SoftTexture::default()
        };
        t.set_level(0, checker());
        let c = t.sample(Vec2::new(0.5, 0.5), 0.0).unwrap();
        assert!((c.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn mip_selection_uses_lod() {
        let mut t = SoftTexture {
            filter: SamplerFilter {
                min: FilterMode::Nearest,
                mag: FilterMode::Nearest,
                mipmap: Some(FilterMode::Nearest),
            },
            ..SoftTexture::default()
        };
        t.set_level(0, checker());
        t.set_level(1, Level { width: 1, height: 1, texels: vec![[255, 0, 0, 255]] });
        assert_eq!(t.sample(Vec2::new(0.25, 0.25), 1.0), Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(t.sample(Vec2::new(0.25, 0.25), 5.0), Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn missing_base_level_samples_nothing() {
        assert!(SoftTexture::default().sample(Vec2::ZERO, 0.0).is_none());
    }

    #[test]
    fn rgb_levels_are_opaque() {
        let pb = PixelBuffer {
            width: 1,
            height: 1,
            x_origin: 0,
            y_origin: 0,
            format: PixelFormat::Rgb8,
            data: crate::backend::PixelData::U8(vec![10, 20, 30]),
        };
        let level = Level::from_pixels(&pb).unwrap();
        assert_eq!(level.texels, vec![[10, 20, 30, 255]]);
    }
}
