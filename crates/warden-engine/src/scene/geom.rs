//! Geometry storage and iteration.
//!
//! A [`Geom`] is a batch of primitives of one kind. Each attribute stream
//! carries a [`Binding`] that says how often its cursor advances while the
//! batch is drawn.

use glam::{Vec2, Vec3};

use crate::paint::Color;

/// How often a stream advances during a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    #[default]
    Off,
    /// Once for the whole batch.
    Overall,
    PerPrimitive,
    /// Once per component of a composite primitive (each triangle of a
    /// strip or fan, each segment of a line strip).
    PerComponent,
    PerVertex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeomKind {
    Point,
    Line,
    LineStrip,
    Polygon,
    Tri,
    Quad,
    TriStrip,
    TriFan,
}

impl GeomKind {
    /// Vertices per primitive for fixed-size kinds.
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            GeomKind::Point => Some(1),
            GeomKind::Line => Some(2),
            GeomKind::Tri => Some(3),
            GeomKind::Quad => Some(4),
            GeomKind::LineStrip | GeomKind::Polygon | GeomKind::TriStrip | GeomKind::TriFan => None,
        }
    }

    /// Leading vertices of a composite primitive that do not start a new
    /// component.
    pub fn component_lead(self) -> Option<usize> {
        match self {
            GeomKind::LineStrip => Some(1),
            GeomKind::TriStrip | GeomKind::TriFan => Some(2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stream<T> {
    pub binding: Binding,
    pub data: Vec<T>,
}

impl<T> Default for Stream<T> {
    fn default() -> Self {
        Self { binding: Binding::Off, data: Vec::new() }
    }
}

impl<T: Copy> Stream<T> {
    pub fn new(binding: Binding, data: Vec<T>) -> Self {
        Self { binding, data }
    }

    pub fn cursor(&self) -> Cursor<'_, T> {
        Cursor { data: &self.data, pos: 0 }
    }
}

/// Forward-only reader over one stream.
#[derive(Debug, Clone)]
pub struct Cursor<'a, T> {
    data: &'a [T],
    pos: usize,
}

impl<T: Copy> Iterator for Cursor<'_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        let v = self.data.get(self.pos).copied()?;
        self.pos += 1;
        Some(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geom {
    kind: GeomKind,
    /// Vertex count of each primitive. Empty for fixed-size kinds.
    lengths: Vec<usize>,
    num_prims: usize,
    coords: Vec<Vec3>,
    pub normals: Stream<Vec3>,
    pub texcoords: Stream<Vec2>,
    pub colors: Stream<Color>,
    /// Point size or line width.
    pub size: f32,
}

impl Geom {
    fn fixed(kind: GeomKind, coords: Vec<Vec3>) -> Self {
        let per = kind.fixed_len().unwrap_or(1);
        debug_assert_eq!(coords.len() % per, 0, "{kind:?} coords not a multiple of {per}");
        Self {
            kind,
            lengths: Vec::new(),
            num_prims: coords.len() / per,
            coords,
            normals: Stream::default(),
            texcoords: Stream::default(),
            colors: Stream::default(),
            size: 1.0,
        }
    }

    fn composite(kind: GeomKind, lengths: Vec<usize>, coords: Vec<Vec3>) -> Self {
        debug_assert_eq!(lengths.iter().sum::<usize>(), coords.len(), "{kind:?} lengths mismatch");
        Self {
            kind,
            num_prims: lengths.len(),
            lengths,
            coords,
            normals: Stream::default(),
            texcoords: Stream::default(),
            colors: Stream::default(),
            size: 1.0,
        }
    }

    pub fn points(coords: Vec<Vec3>) -> Self {
        Self::fixed(GeomKind::Point, coords)
    }

    pub fn lines(coords: Vec<Vec3>) -> Self {
        Self::fixed(GeomKind::Line, coords)
    }

    pub fn tris(coords: Vec<Vec3>) -> Self {
        Self::fixed(GeomKind::Tri, coords)
    }

    pub fn quads(coords: Vec<Vec3>) -> Self {
        Self::fixed(GeomKind::Quad, coords)
    }

    pub fn polygons(lengths: Vec<usize>, coords: Vec<Vec3>) -> Self {
        Self::composite(GeomKind::Polygon, lengths, coords)
    }

    pub fn linestrips(lengths: Vec<usize>, coords: Vec<Vec3>) -> Self {
        Self::composite(GeomKind::LineStrip, lengths, coords)
    }

    pub fn tristrips(lengths: Vec<usize>, coords: Vec<Vec3>) -> Self {
        Self::composite(GeomKind::TriStrip, lengths, coords)
    }

    pub fn trifans(lengths: Vec<usize>, coords: Vec<Vec3>) -> Self {
        Self::composite(GeomKind::TriFan, lengths, coords)
    }

    pub fn with_normals(mut self, binding: Binding, data: Vec<Vec3>) -> Self {
        self.normals = Stream::new(binding, data);
        self
    }

    pub fn with_texcoords(mut self, binding: Binding, data: Vec<Vec2>) -> Self {
        self.texcoords = Stream::new(binding, data);
        self
    }

    pub fn with_colors(mut self, binding: Binding, data: Vec<Color>) -> Self {
        self.colors = Stream::new(binding, data);
        self
    }

    pub fn with_size(mut self, size: f32) -> Self {
        self.size = size;
        self
    }

    #[inline]
    pub fn kind(&self) -> GeomKind {
        self.kind
    }

    #[inline]
    pub fn num_prims(&self) -> usize {
        self.num_prims
    }

    /// Vertex count of primitive `i`.
    pub fn prim_len(&self, i: usize) -> usize {
        match self.kind.fixed_len() {
            Some(n) => n,
            None => self.lengths.get(i).copied().unwrap_or(0),
        }
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn coords(&self) -> Cursor<'_, Vec3> {
        Cursor { data: &self.coords, pos: 0 }
    }

    pub fn num_vertices(&self) -> usize {
        self.coords.len()
    }

    /// Element count a stream with `binding` must hold.
    pub fn expected_len(&self, binding: Binding) -> usize {
        match binding {
            Binding::Off => 0,
            Binding::Overall => 1,
            Binding::PerPrimitive => self.num_prims,
            Binding::PerVertex => self.coords.len(),
            Binding::PerComponent => match self.kind.component_lead() {
                Some(lead) => self.lengths.iter().map(|l| l.saturating_sub(lead)).sum(),
                None => self.num_prims,
            },
        }
    }

    /// True when every stream holds exactly as many elements as its binding
    /// consumes.
    pub fn is_consistent(&self) -> bool {
        self.normals.data.len() == self.expected_len(self.normals.binding)
            && self.texcoords.data.len() == self.expected_len(self.texcoords.binding)
            && self.colors.data.len() == self.expected_len(self.colors.binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_strip() -> Geom {
        Geom::tristrips(vec![4, 5], vec![Vec3::ZERO; 9])
    }

    #[test]
    fn fixed_kinds_count_prims() {
        let g = Geom::tris(vec![Vec3::ZERO; 6]);
        assert_eq!(g.num_prims(), 2);
        assert_eq!(g.prim_len(1), 3);
        assert_eq!(g.expected_len(Binding::PerComponent), 2);
    }

    #[test]
    fn per_component_counts_strip_triangles() {
        let g = quad_strip();
        assert_eq!(g.expected_len(Binding::PerComponent), 2 + 3);
        assert_eq!(g.expected_len(Binding::PerVertex), 9);

        let l = Geom::linestrips(vec![3], vec![Vec3::ZERO; 3]);
        assert_eq!(l.expected_len(Binding::PerComponent), 2);
    }

    #[test]
    fn consistency_checks_every_stream() {
        let g = quad_strip().with_colors(Binding::PerPrimitive, vec![Color::WHITE; 2]);
        assert!(g.is_consistent());
        let bad = quad_strip().with_normals(Binding::PerVertex, vec![Vec3::Z; 3]);
        assert!(!bad.is_consistent());
    }

    #[test]
    fn cursor_advances_and_ends() {
        let s = Stream::new(Binding::PerVertex, vec![1, 2]);
        let mut c = s.cursor();
        assert_eq!(c.next(), Some(1));
        assert_eq!(c.next(), Some(2));
        assert_eq!(c.next(), None);
    }
}
