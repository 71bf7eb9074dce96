/// Axis-aligned pixel rectangle in framebuffer space (bottom-left origin).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Region anchored at the origin.
    #[inline]
    pub const fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Exclusive right edge.
    #[inline]
    pub fn right(self) -> u32 {
        self.x + self.width
    }

    /// Exclusive top edge.
    #[inline]
    pub fn top(self) -> u32 {
        self.y + self.height
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Half-open containment: [min, max).
    #[inline]
    pub fn contains(self, x: i64, y: i64) -> bool {
        x >= self.x as i64 && y >= self.y as i64 && x < self.right() as i64 && y < self.top() as i64
    }

    #[inline]
    pub fn intersect(self, other: Region) -> Option<Region> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.top().min(other.top());

        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(Region::new(x0, y0, x1 - x0, y1 - y0))
        }
    }

    /// True when `self` covers all of `other`.
    #[inline]
    pub fn covers(self, other: Region) -> bool {
        self.x <= other.x && self.y <= other.y && self.right() >= other.right() && self.top() >= other.top()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: u32, y: u32, w: u32, h: u32) -> Region { Region::new(x, y, w, h) }

    // ── contains ──────────────────────────────────────────────────────────

    #[test]
    fn contains_interior_point() {
        assert!(r(0, 0, 10, 10).contains(5, 5));
    }

    #[test]
    fn contains_origin_inclusive() {
        assert!(r(2, 3, 10, 10).contains(2, 3));
    }

    #[test]
    fn contains_far_edge_exclusive() {
        assert!(!r(0, 0, 10, 10).contains(10, 10));
        assert!(!r(0, 0, 10, 10).contains(9, 10));
    }

    #[test]
    fn contains_negative_coords() {
        assert!(!r(0, 0, 10, 10).contains(-1, 5));
    }

    // ── intersect ─────────────────────────────────────────────────────────

    #[test]
    fn intersect_overlapping() {
        assert_eq!(r(0, 0, 10, 10).intersect(r(5, 5, 10, 10)), Some(r(5, 5, 5, 5)));
    }

    #[test]
    fn intersect_contained() {
        let inner = r(10, 10, 20, 20);
        assert_eq!(r(0, 0, 100, 100).intersect(inner), Some(inner));
    }

    #[test]
    fn intersect_touching_edge_returns_none() {
        assert!(r(0, 0, 10, 10).intersect(r(10, 0, 10, 10)).is_none());
    }

    // ── covers / area ─────────────────────────────────────────────────────

    #[test]
    fn covers_self_and_subregion() {
        let full = Region::sized(64, 32);
        assert!(full.covers(full));
        assert!(full.covers(r(1, 1, 8, 8)));
        assert!(!r(1, 1, 8, 8).covers(full));
    }

    #[test]
    fn empty_and_area() {
        assert!(r(0, 0, 0, 5).is_empty());
        assert_eq!(r(3, 4, 5, 6).area(), 30);
        assert!(!r(3, 4, 5, 6).is_empty());
    }
}
