use std::cell::Cell;
use std::fmt;

use glam::DVec3;
use tracing::{error, trace};

use crate::coord::coord_equal;
use crate::elements::VertexPool;
use crate::error::ClipError;
use crate::plane::{Plane, vec_equal};

/// Hard cap on the number of sides a primitive can have.
///
/// Splitting can grow a polygon by up to two sides, so the splitter checks
/// this cap and reports [`ClipError::TooManySides`] when it would be broken.
pub const MAX_SIDES: usize = 15;

/// A lazily memoized value guarded by an explicit validity flag.
///
/// Uses a [`Cell`] so caches can be filled through a shared reference. That
/// keeps the geometric predicates `&self`, which is what allows the clipper
/// to look at a front and a back primitive of the same group at once.
#[derive(Debug, Clone)]
struct Cached<T: Copy>(Cell<Option<T>>);

impl<T: Copy> Default for Cached<T> {
    fn default() -> Self {
        Self(Cell::new(None))
    }
}

impl<T: Copy> Cached<T> {
    #[inline]
    fn get(&self) -> Option<T> {
        self.0.get()
    }

    #[inline]
    fn set(&self, value: T) {
        self.0.set(Some(value));
    }

    #[inline]
    fn invalidate(&self) {
        self.0.set(None);
    }
}

/// Axis-aligned bounding box of a primitive's vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    pub low: DVec3,
    pub high: DVec3,
}

/// A colored planar polygon (or degenerate line/point) defined by an
/// ordered list of vertex indices into a [`VertexPool`].
///
/// Winding order defines the front face; reversing the sides flips the
/// normal. The normal and bounding box are memoized and every mutation of
/// the side list drops the stale caches.
#[derive(Debug, Clone, Default)]
pub struct Primitive {
    colour: u32,
    id: usize,
    sides: Vec<usize>,
    normal: Cached<DVec3>,
    bbox: Cached<Bbox>,
}

impl Primitive {
    /// Create a new empty primitive with colour and id 0.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn num_sides(&self) -> usize {
        self.sides.len()
    }

    /// The vertex index at side `n`.
    #[inline]
    pub fn side(&self, n: usize) -> Option<usize> {
        let side = self.sides.get(n).copied();
        if side.is_none() {
            trace!(n, "invalid side number");
        }
        side
    }

    /// The vertex indices in winding order.
    #[inline]
    pub fn sides(&self) -> impl ExactSizeIterator<Item = usize> + Clone + '_ {
        self.sides.iter().copied()
    }

    /// Appends a vertex index, dropping the memoized normal and bbox.
    pub fn add_side(&mut self, v: usize) -> Result<(), ClipError> {
        if self.sides.len() >= MAX_SIDES {
            trace!(v, "primitive would have more than {MAX_SIDES} sides");
            return Err(ClipError::TooManySides);
        }
        self.sides.push(v);
        self.normal.invalidate();
        self.bbox.invalidate();
        Ok(())
    }

    /// Removes every side and drops both caches.
    pub fn delete_all(&mut self) {
        trace!(nsides = self.sides.len(), "deleting all sides");
        self.sides.clear();
        self.normal.invalidate();
        self.bbox.invalidate();
    }

    /// Reverses the winding order in place.
    ///
    /// This flips the normal's direction, so the memoized normal is
    /// dropped. The vertex set is unchanged and the bbox stays valid.
    pub fn reverse_sides(&mut self) {
        self.sides.reverse();
        self.normal.invalidate();
    }

    #[inline]
    pub fn colour(&self) -> u32 {
        self.colour
    }

    #[inline]
    pub fn set_colour(&mut self, colour: u32) {
        self.colour = colour;
    }

    /// Stable identifier used in verbose reports; survives splitting.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    /// The unit normal defined by the first non-degenerate triangle of the
    /// polygon, memoized until the sides change.
    ///
    /// `None` for points and lines, and for polygons whose first three
    /// vertices are collinear (the cross product cannot be normalized).
    /// A side index missing from the pool is logged as an error but also
    /// yields `None`, deliberately folded into the degenerate bucket: the
    /// read-only cache fills have no failure channel, and the splitter
    /// validates its indices and raises
    /// [`ClipError::MissingVertex`](crate::ClipError::MissingVertex) before
    /// any geometry depends on them.
    pub fn normal(&self, pool: &VertexPool) -> Option<DVec3> {
        if let Some(normal) = self.normal.get() {
            return Some(normal);
        }

        if self.sides.len() < 3 {
            trace!(nsides = self.sides.len(), "too few sides for a normal");
            return None;
        }

        let mut coords = [DVec3::ZERO; 3];
        for (side, c) in coords.iter_mut().enumerate() {
            match pool.coords(self.sides[side]) {
                Some(found) => *c = found,
                None => {
                    error!(v = self.sides[side], "vertex of primitive not in pool");
                    return None;
                }
            }
        }

        let side_one = coords[1] - coords[0];
        let side_two = coords[2] - coords[1];
        let normal = side_one.cross(side_two).try_normalize();
        match normal {
            Some(normal) => {
                trace!(?normal, "computed normal");
                self.normal.set(normal);
            }
            None => trace!("first three vertices are collinear"),
        }
        normal
    }

    /// The memoized normal, if any, without computing one.
    pub(crate) fn cached_normal(&self) -> Option<DVec3> {
        self.normal.get()
    }

    /// Reinstates a memoized normal known to be valid for the current
    /// sides, e.g. after a split rebuilt them within the same plane.
    pub(crate) fn set_cached_normal(&self, normal: DVec3) {
        self.normal.set(normal);
    }

    /// Imposes a winding: reverses the sides if the polygon's normal is not
    /// ε-equal to `target`. Returns whether the sides were reversed.
    pub fn orient_normal(&mut self, target: DVec3, pool: &VertexPool) -> bool {
        match self.normal(pool) {
            Some(normal) if !vec_equal(normal, target) => {
                self.reverse_sides();
                true
            }
            _ => false,
        }
    }

    /// The axis-aligned bounding box of the polygon's vertices, memoized
    /// until the sides change. `None` for an empty primitive, or for a side
    /// index missing from the pool (the same contract as [`Self::normal`]).
    pub fn bbox(&self, pool: &VertexPool) -> Option<Bbox> {
        if let Some(bbox) = self.bbox.get() {
            return Some(bbox);
        }

        let mut sides = self.sides();
        let first = pool.coords(sides.next()?)?;

        let mut bbox = Bbox {
            low: first,
            high: first,
        };
        for v in sides {
            let coords = pool.coords(v)?;
            bbox.low = bbox.low.min(coords);
            bbox.high = bbox.high.max(coords);
        }

        trace!(?bbox, "computed bbox");
        self.bbox.set(bbox);
        Some(bbox)
    }

    /// The 2D projection plane in which this polygon has the largest area.
    pub fn find_plane(&self, pool: &VertexPool) -> Option<Plane> {
        self.normal(pool).map(Plane::from_normal)
    }

    /// Marks every vertex referenced by this primitive as used.
    pub fn set_used(&self, pool: &mut VertexPool) {
        for v in self.sides() {
            pool.set_used(v);
        }
    }

    /// The first side at which this polygon leaves the plane of its first
    /// three vertices, if any.
    ///
    /// Checks the scalar triple product of the normal with the offset of
    /// each vertex beyond the defining triangle; a non-ε-zero volume means
    /// the polygon is skew. Points, lines and triangles cannot be skew.
    pub fn skew_side(&self, pool: &VertexPool) -> Option<usize> {
        if self.sides.len() < 4 {
            return None;
        }

        let first = pool.coords(self.sides[0])?;
        for s in 3..self.sides.len() {
            let coords = pool.coords(self.sides[s])?;
            let offset = coords - first;
            let volume = self.normal(pool)?.dot(offset).abs();
            if !coord_equal(volume, 0.0) {
                trace!(s, volume, "skew polygon");
                return Some(s);
            }
        }
        None
    }

    /// Adapter that renders the primitive's vertices for verbose reports.
    pub fn display<'a>(&'a self, pool: &'a VertexPool) -> PrimitiveDisplay<'a> {
        PrimitiveDisplay {
            primitive: self,
            pool,
        }
    }
}

/// Renders a primitive's vertex indices and coordinates, one per line.
pub struct PrimitiveDisplay<'a> {
    primitive: &'a Primitive,
    pool: &'a VertexPool,
}

impl fmt::Display for PrimitiveDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (s, v) in self.primitive.sides().enumerate() {
            if s > 0 {
                writeln!(f, ",")?;
            }
            match self.pool.coords(v) {
                Some(c) => write!(f, "{}:{{{},{},{}}}", v, c.x, c.y, c.z)?,
                None => write!(f, "{v}:{{?}}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_pool() -> (VertexPool, Primitive) {
        let mut pool = VertexPool::new();
        let mut prim = Primitive::new();
        for coords in [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ] {
            let v = pool.add(coords);
            prim.add_side(v).unwrap();
        }
        (pool, prim)
    }

    #[test]
    fn test_add_side_caps_at_max_sides() {
        let mut pool = VertexPool::new();
        let mut prim = Primitive::new();
        for i in 0..MAX_SIDES {
            let v = pool.add(DVec3::new(i as f64, 0.0, 0.0));
            prim.add_side(v).unwrap();
        }
        let v = pool.add(DVec3::new(99.0, 0.0, 0.0));
        assert_eq!(prim.add_side(v), Err(ClipError::TooManySides));
        assert_eq!(prim.num_sides(), MAX_SIDES);
    }

    #[test]
    fn test_normal_of_ccw_square_points_up() {
        let (pool, prim) = square_pool();
        let normal = prim.normal(&pool).unwrap();
        assert!(vec_equal(normal, DVec3::Z));
    }

    #[test]
    fn test_reverse_sides_is_an_involution_and_flips_the_normal() {
        let (pool, mut prim) = square_pool();
        let before: Vec<usize> = prim.sides().collect();
        let normal = prim.normal(&pool).unwrap();

        prim.reverse_sides();
        let flipped = prim.normal(&pool).unwrap();
        assert!(vec_equal(flipped, -normal));

        prim.reverse_sides();
        assert_eq!(prim.sides().collect::<Vec<_>>(), before);
        assert!(vec_equal(prim.normal(&pool).unwrap(), normal));
    }

    #[test]
    fn test_no_normal_for_degenerate_primitives() {
        let mut pool = VertexPool::new();
        let mut prim = Primitive::new();
        let a = pool.add(DVec3::ZERO);
        let b = pool.add(DVec3::X);
        prim.add_side(a).unwrap();
        prim.add_side(b).unwrap();
        assert!(prim.normal(&pool).is_none());

        // Three collinear vertices have no normal either.
        let c = pool.add(DVec3::new(2.0, 0.0, 0.0));
        prim.add_side(c).unwrap();
        assert!(prim.normal(&pool).is_none());
    }

    #[test]
    fn test_orient_normal_reverses_opposed_winding() {
        let (pool, mut prim) = square_pool();
        assert!(!prim.orient_normal(DVec3::Z, &pool));
        assert!(prim.orient_normal(DVec3::NEG_Z, &pool));
        assert!(vec_equal(prim.normal(&pool).unwrap(), DVec3::NEG_Z));
    }

    #[test]
    fn test_bbox() {
        let (pool, prim) = square_pool();
        let bbox = prim.bbox(&pool).unwrap();
        assert_eq!(bbox.low, DVec3::new(0.0, 0.0, 0.0));
        assert_eq!(bbox.high, DVec3::new(1.0, 1.0, 0.0));

        assert!(Primitive::new().bbox(&pool).is_none());
    }

    #[test]
    fn test_delete_all_resets() {
        let (pool, mut prim) = square_pool();
        assert!(prim.normal(&pool).is_some());
        prim.delete_all();
        assert_eq!(prim.num_sides(), 0);
        assert!(prim.normal(&pool).is_none());
        assert!(prim.bbox(&pool).is_none());
    }

    #[test]
    fn test_find_plane_projects_out_the_normal_axis() {
        let (pool, prim) = square_pool();
        let plane = prim.find_plane(&pool).unwrap();
        assert_eq!(plane, Plane { x: 0, y: 1, z: 2 });
    }

    #[test]
    fn test_skew_side() {
        let (mut pool, mut prim) = square_pool();
        assert_eq!(prim.skew_side(&pool), None);

        let v = pool.add(DVec3::new(0.5, 0.5, 3.0));
        prim.add_side(v).unwrap();
        assert_eq!(prim.skew_side(&pool), Some(4));
    }

    #[test]
    fn test_set_used_marks_every_vertex() {
        let (mut pool, prim) = square_pool();
        prim.set_used(&mut pool);
        for v in 0..4 {
            assert!(pool.is_used(v));
        }
    }
}
