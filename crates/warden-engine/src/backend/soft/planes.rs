//! Framebuffer planes of the software backend.
//!
//! Row 0 is the bottom row. Stereo is not modeled: left and right bits of a
//! [`RenderBuffer`] select the same plane.

use crate::backend::RenderBuffer;
use crate::coords::Region;

pub(super) struct Planes {
    pub width: u32,
    pub height: u32,
    pub front: Vec<[u8; 4]>,
    pub back: Vec<[u8; 4]>,
    pub depth: Vec<f32>,
    pub stencil: Vec<u8>,
    pub accum: Vec<[f32; 4]>,
}

impl Planes {
    pub fn new(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            front: vec![[0; 4]; n],
            back: vec![[0; 4]; n],
            depth: vec![1.0; n],
            stencil: vec![0; n],
            accum: vec![[0.0; 4]; n],
        }
    }

    #[inline]
    pub fn bounds(&self) -> Region {
        Region::sized(self.width, self.height)
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Color plane a read from `buffer` comes from. Back wins when both are named.
    pub fn read_plane(&self, buffer: RenderBuffer) -> &[[u8; 4]] {
        if buffer.intersects(RenderBuffer::BACK) {
            &self.back
        } else {
            &self.front
        }
    }

    /// Applies `f` to each color plane selected by `buffer`.
    pub fn for_each_draw_plane(&mut self, buffer: RenderBuffer, mut f: impl FnMut(&mut [[u8; 4]])) {
        if buffer.intersects(RenderBuffer::BACK) {
            f(&mut self.back);
        }
        if buffer.intersects(RenderBuffer::FRONT) {
            f(&mut self.front);
        }
    }

    /// Visits every pixel index of `region` clipped to the planes.
    pub fn for_each_index(&self, region: Region, mut f: impl FnMut(usize)) {
        let Some(r) = region.intersect(self.bounds()) else {
            return;
        };
        for y in r.y..r.top() {
            let row = y as usize * self.width as usize;
            for x in r.x..r.right() {
                f(row + x as usize);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_planes_have_far_depth() {
        let p = Planes::new(3, 2);
        assert_eq!(p.depth.len(), 6);
        assert!(p.depth.iter().all(|&d| d == 1.0));
        assert_eq!(p.index(2, 1), 5);
    }

    #[test]
    fn draw_plane_selection() {
        let mut p = Planes::new(1, 1);
        p.for_each_draw_plane(RenderBuffer::BACK_LEFT, |plane| plane[0] = [9; 4]);
        assert_eq!(p.back[0], [9; 4]);
        assert_eq!(p.front[0], [0; 4]);
        p.for_each_draw_plane(RenderBuffer::COLOR, |plane| plane[0] = [7; 4]);
        assert_eq!(p.front[0], [7; 4]);
        assert_eq!(p.read_plane(RenderBuffer::FRONT)[0], [7; 4]);
    }

    #[test]
    fn region_iteration_is_clipped() {
        let p = Planes::new(4, 4);
        let mut n = 0;
        p.for_each_index(Region::new(2, 2, 10, 10), |_| n += 1);
        assert_eq!(n, 4);
    }
}
