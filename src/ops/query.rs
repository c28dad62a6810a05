//! Geometric predicates used to decide occlusion between primitives.

use itertools::Itertools;
use tracing::trace;

use crate::coord::{Coord, coord_equal, coord_less_than};
use crate::elements::{Primitive, VertexPool};
use crate::plane::{Plane, vec_equal, xy_greater_or_equal};
use crate::utils::unwrap_or_return;

/// Outcome of casting the horizontal test ray against one polygon edge.
enum RayHit {
    /// The point lies on the edge itself.
    OnEdge,
    /// The ray crosses the edge right of the point.
    Crossing,
    Miss,
}

/// Casts a ray from (px, py) towards +x against the edge (sx, sy)..(ex, ey).
///
/// `top_y` is the highest y of the whole polygon: the upper endpoint of an
/// edge only counts as a crossing at the very top of the polygon, so shared
/// corners are counted once rather than twice.
fn ray_hits_edge(
    px: Coord,
    py: Coord,
    sx: Coord,
    sy: Coord,
    ex: Coord,
    ey: Coord,
    top_y: Coord,
) -> RayHit {
    // Ignore edges entirely left of the point.
    if coord_less_than(sx.max(ex), px) {
        return RayHit::Miss;
    }

    // Horizontal edges are handled specially to avoid dividing by zero.
    if coord_equal(ey, sy) {
        // Ignore horizontal edges entirely right of the point.
        if coord_less_than(px, sx.min(ex)) {
            return RayHit::Miss;
        }
        if coord_equal(py, ey) || coord_equal(py, sy) {
            return RayHit::OnEdge;
        }
        // Horizontal edges parallel to the ray never contribute a crossing.
        return RayHit::Miss;
    }

    // Be precise about the y extent so that x crossings with the polygon
    // are actually inside it, not just level with a nearby corner.
    let low_y = sy.min(ey);
    let high_y = sy.max(ey);
    if py < low_y || py > high_y {
        return RayHit::Miss;
    }

    // Exclude the highest endpoint of each edge except the top one(s).
    if py == high_y && high_y != top_y {
        return RayHit::Miss;
    }

    let intersect_x = if coord_equal(ex, sx) {
        // Vertical edge crosses the ray at its own x.
        sx
    } else {
        let m = (ey - sy) / (ex - sx);
        sx + (py - sy) / m
    };

    // An inexact comparison here allows more leeway for points near steep
    // edges than shallow ones.
    if coord_equal(px, intersect_x) {
        return RayHit::OnEdge;
    }
    if coord_less_than(px, intersect_x) {
        return RayHit::Crossing;
    }
    RayHit::Miss
}

impl Primitive {
    /// True if `self` and `other` lie in the same plane facing the same way.
    ///
    /// Coplanarity requires *equal* normals, not merely parallel ones:
    /// polygons with antiparallel normals (back-to-back walls) are never
    /// coplanar, so plot-order clipping leaves them alone. When one of the
    /// two has no normal (a point or line), every one of its vertices is
    /// tested against the other's plane instead. Two normal-less primitives
    /// are never coplanar.
    pub fn coplanar(&self, other: &Primitive, pool: &VertexPool) -> bool {
        let self_normal = self.normal(pool);
        let other_normal = other.normal(pool);

        // `base` supplies the plane, `probe` the vertices tested against it.
        let (base, probe, normal, probe_sides) = match (self_normal, other_normal) {
            (None, None) => {
                trace!("neither primitive has a normal");
                return false;
            }
            (Some(sn), Some(on)) => {
                // Polygons cannot be coplanar without the same normal.
                if !vec_equal(sn, on) {
                    trace!("primitives have different normals");
                    return false;
                }
                // Facing the same way: one vertex of the probe suffices.
                (self, other, sn, 1)
            }
            // Only one normal: check every vertex of the other primitive,
            // since nothing proves it faces the same direction.
            (Some(sn), None) => (self, other, sn, other.num_sides()),
            (None, Some(on)) => (other, self, on, self.num_sides()),
        };

        let vp = unwrap_or_return!(base.side(0), "Base primitive has no sides", false);
        let pcoords = unwrap_or_return!(pool.coords(vp), "Base vertex not in pool", false);

        for s in 0..probe_sides {
            let vq = unwrap_or_return!(probe.side(s), "Probe side out of range", false);
            let qcoords = unwrap_or_return!(pool.coords(vq), "Probe vertex not in pool", false);

            // Project the offset between the two polygons onto the normal;
            // the result is the distance from the probe vertex to the base
            // plane, which must be ε-zero.
            let dist = normal.dot(pcoords - qcoords).abs();
            if !coord_equal(dist, 0.0) {
                trace!(vq, dist, "vertex is out of plane");
                return false;
            }
        }
        true
    }

    /// True if the vertex at index `v` lies inside or on the boundary of
    /// this polygon, tested in the projected plane.
    ///
    /// Ray casting with ε coincidence: a point on an edge or corner counts
    /// as inside, which is what lets the clipper decide which half of a
    /// split polygon is the covered one.
    pub fn contains_point(&self, pool: &VertexPool, v: usize, plane: Plane) -> bool {
        let nsides = self.num_sides();
        if nsides < 3 {
            trace!(nsides, "point or line cannot contain a point");
            return false;
        }

        let last_vertex = unwrap_or_return!(self.side(nsides - 1), "Side out of range", false);
        if last_vertex == v {
            trace!(v, "point is the end of the last edge");
            return true;
        }
        let mut end = unwrap_or_return!(pool.coords(last_vertex), "Vertex not in pool", false);

        let point = unwrap_or_return!(pool.coords(v), "Point vertex not in pool", false);

        // Outside the bounding box, even allowing for error, means outside
        // the polygon.
        let bbox = unwrap_or_return!(self.bbox(pool), "Polygon has no bbox", false);
        if !xy_greater_or_equal(point, bbox.low, plane)
            || !xy_greater_or_equal(bbox.high, point, plane)
        {
            trace!(v, "point is outside the bounding box");
            return false;
        }
        let top_y = plane.y_of(bbox.high);

        let px = plane.x_of(point);
        let py = plane.y_of(point);

        let mut is_inside = false;
        for s in 0..nsides {
            let start_v = unwrap_or_return!(self.side(s), "Side out of range", false);
            if start_v == v {
                trace!(v, s, "point is the start of an edge");
                return true;
            }
            let start = unwrap_or_return!(pool.coords(start_v), "Vertex not in pool", false);

            match ray_hits_edge(
                px,
                py,
                plane.x_of(start),
                plane.y_of(start),
                plane.x_of(end),
                plane.y_of(end),
                top_y,
            ) {
                RayHit::OnEdge => {
                    trace!(v, s, "point is coincident with an edge");
                    return true;
                }
                RayHit::Crossing => is_inside = !is_inside,
                RayHit::Miss => {}
            }

            end = start;
        }

        is_inside
    }

    /// True if every vertex of `other` lies inside or on the boundary of
    /// this polygon, tested in the projected plane.
    pub fn contains(&self, other: &Primitive, pool: &VertexPool, plane: Plane) -> bool {
        let sbox = unwrap_or_return!(self.bbox(pool), "Cannot nest incomplete primitive", false);
        let obox = unwrap_or_return!(other.bbox(pool), "Cannot nest incomplete primitive", false);

        // This bounding box must include the other one.
        if !xy_greater_or_equal(obox.low, sbox.low, plane)
            || !xy_greater_or_equal(sbox.high, obox.high, plane)
        {
            trace!("bbox does not cover the other primitive");
            return false;
        }

        for side in other.sides() {
            if !self.contains_point(pool, side, plane) {
                trace!(side, "vertex is outside");
                return false;
            }
        }
        true
    }

    /// True if the two primitives reference the same cyclic sequence of
    /// vertex indices.
    ///
    /// Winding matters: a polygon is not `equal` to its own reversal.
    pub fn equal(&self, other: &Primitive) -> bool {
        let nsides = self.num_sides();
        if nsides != other.num_sides() {
            trace!("different number of sides");
            return false;
        }
        if nsides == 0 {
            return true;
        }

        // Find the other's first vertex in this polygon's cycle, then the
        // remaining vertices must follow in order, wrapping around.
        let first = other.side(0);
        let Some(found) = (0..nsides).find(|&s| self.side(s) == first) else {
            trace!("first vertex not shared");
            return false;
        };

        let mut s = found + 1;
        for t in 1..nsides {
            if s >= nsides {
                s = 0;
            }
            if self.side(s) != other.side(t) {
                trace!(s, t, "sides mismatch");
                return false;
            }
            s += 1;
        }
        true
    }

    /// True if the edge between vertex indices `a` and `b` crosses any edge
    /// of this polygon.
    ///
    /// Edges that share a vertex index with (a, b) are skipped, and
    /// intersections ε-coincident with a's or b's coordinates are ignored:
    /// the endpoints of the clipping edge are exclusive so that polygons
    /// merely touching at a corner are not treated as overlapping. The
    /// endpoints of this polygon's own edges stay inclusive, because a
    /// splitting line commonly passes exactly through a back corner.
    pub fn intersects_edge(&self, a: usize, b: usize, pool: &VertexPool, plane: Plane) -> bool {
        if self.num_sides() < 3 {
            trace!(nsides = self.num_sides(), "point or line cannot intersect an edge");
            return false;
        }

        for (last_side, side) in self.sides().circular_tuple_windows() {
            if a == last_side || b == last_side || a == side || b == side {
                trace!(a, b, last_side, side, "edges share a vertex");
            } else if let Some(intersect) = pool.edges_intersect(a, b, last_side, side, plane) {
                let acoords = unwrap_or_return!(pool.coords(a), "Vertex not in pool", false);
                if vec_equal(intersect, acoords) {
                    trace!(a, "edges join at A");
                } else {
                    let bcoords = unwrap_or_return!(pool.coords(b), "Vertex not in pool", false);
                    if vec_equal(intersect, bcoords) {
                        trace!(b, "edges join at B");
                    } else {
                        trace!(side, "polygon edge intersects the clipping edge");
                        return true;
                    }
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::get_tracing_subscriber;
    use glam::DVec3;

    const XY: Plane = Plane { x: 0, y: 1, z: 2 };

    fn polygon(pool: &mut VertexPool, corners: &[DVec3]) -> Primitive {
        let mut prim = Primitive::new();
        for &c in corners {
            let v = pool.add(c);
            prim.add_side(v).unwrap();
        }
        prim
    }

    fn unit_square(pool: &mut VertexPool, x: f64, y: f64, size: f64) -> Primitive {
        polygon(
            pool,
            &[
                DVec3::new(x, y, 0.0),
                DVec3::new(x + size, y, 0.0),
                DVec3::new(x + size, y + size, 0.0),
                DVec3::new(x, y + size, 0.0),
            ],
        )
    }

    #[test]
    fn test_coplanar_same_plane() {
        let mut pool = VertexPool::new();
        let a = unit_square(&mut pool, 0.0, 0.0, 1.0);
        let b = unit_square(&mut pool, 5.0, 5.0, 2.0);
        assert!(a.coplanar(&b, &pool));
        assert!(b.coplanar(&a, &pool));
    }

    #[test]
    fn test_coplanar_rejects_offset_planes() {
        let mut pool = VertexPool::new();
        let a = unit_square(&mut pool, 0.0, 0.0, 1.0);
        let b = polygon(
            &mut pool,
            &[
                DVec3::new(0.0, 0.0, 1.0),
                DVec3::new(1.0, 0.0, 1.0),
                DVec3::new(1.0, 1.0, 1.0),
            ],
        );
        assert!(!a.coplanar(&b, &pool));
    }

    #[test]
    fn test_coplanar_rejects_antiparallel_normals() {
        get_tracing_subscriber();

        let mut pool = VertexPool::new();
        let a = unit_square(&mut pool, 0.0, 0.0, 1.0);
        // Same plane, opposite winding.
        let b = polygon(
            &mut pool,
            &[
                DVec3::new(0.0, 1.0, 0.0),
                DVec3::new(1.0, 1.0, 0.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, 0.0, 0.0),
            ],
        );
        assert!(!a.coplanar(&b, &pool));
    }

    #[test]
    fn test_coplanar_with_point_and_line() {
        let mut pool = VertexPool::new();
        let square = unit_square(&mut pool, 0.0, 0.0, 4.0);

        let in_plane = polygon(
            &mut pool,
            &[DVec3::new(9.0, 9.0, 0.0), DVec3::new(10.0, 8.0, 0.0)],
        );
        assert!(square.coplanar(&in_plane, &pool));
        assert!(in_plane.coplanar(&square, &pool));

        let out_of_plane = polygon(
            &mut pool,
            &[DVec3::new(1.0, 1.0, 0.0), DVec3::new(2.0, 1.0, 3.0)],
        );
        assert!(!square.coplanar(&out_of_plane, &pool));

        // Two normal-less primitives are never coplanar.
        assert!(!in_plane.coplanar(&out_of_plane, &pool));
    }

    #[test]
    fn test_contains_point_own_vertices() {
        let mut pool = VertexPool::new();
        let square = unit_square(&mut pool, 0.0, 0.0, 2.0);
        for v in square.sides() {
            assert!(square.contains_point(&pool, v, XY));
        }
    }

    #[test]
    fn test_contains_point_interior_boundary_exterior() {
        let mut pool = VertexPool::new();
        let square = unit_square(&mut pool, 0.0, 0.0, 2.0);

        let inside = pool.add(DVec3::new(1.0, 1.0, 0.0));
        assert!(square.contains_point(&pool, inside, XY));

        // On an edge, and exactly on a corner's coordinates.
        let on_edge = pool.add(DVec3::new(2.0, 1.0, 0.0));
        assert!(square.contains_point(&pool, on_edge, XY));
        let on_corner = pool.add(DVec3::new(0.0, 0.0, 0.0));
        assert!(square.contains_point(&pool, on_corner, XY));

        let outside = pool.add(DVec3::new(3.0, 1.0, 0.0));
        assert!(!square.contains_point(&pool, outside, XY));
        let below = pool.add(DVec3::new(1.0, -1.0, 0.0));
        assert!(!square.contains_point(&pool, below, XY));
    }

    #[test]
    fn test_contains_point_in_concave_polygon() {
        let mut pool = VertexPool::new();
        // An L shape with the notch at the top right.
        let poly = polygon(
            &mut pool,
            &[
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(4.0, 0.0, 0.0),
                DVec3::new(4.0, 2.0, 0.0),
                DVec3::new(2.0, 2.0, 0.0),
                DVec3::new(2.0, 4.0, 0.0),
                DVec3::new(0.0, 4.0, 0.0),
            ],
        );

        let in_foot = pool.add(DVec3::new(3.0, 1.0, 0.0));
        assert!(poly.contains_point(&pool, in_foot, XY));
        let in_leg = pool.add(DVec3::new(1.0, 3.0, 0.0));
        assert!(poly.contains_point(&pool, in_leg, XY));
        let in_notch = pool.add(DVec3::new(3.0, 3.0, 0.0));
        assert!(!poly.contains_point(&pool, in_notch, XY));
    }

    #[test]
    fn test_contains() {
        let mut pool = VertexPool::new();
        let big = unit_square(&mut pool, 0.0, 0.0, 4.0);
        let small = unit_square(&mut pool, 1.0, 1.0, 1.0);
        let overlapping = unit_square(&mut pool, 3.0, 3.0, 4.0);

        assert!(big.contains(&small, &pool, XY));
        assert!(!small.contains(&big, &pool, XY));
        assert!(!big.contains(&overlapping, &pool, XY));

        // A polygon contains itself: every vertex is on the boundary.
        assert!(big.contains(&big, &pool, XY));
    }

    #[test]
    fn test_equal_is_cyclic_and_winding_sensitive() {
        let mut pool = VertexPool::new();
        let square = unit_square(&mut pool, 0.0, 0.0, 1.0);

        assert!(square.equal(&square));

        // Same cycle, rotated start.
        let mut rotated = Primitive::new();
        for s in [2, 3, 0, 1] {
            rotated.add_side(square.side(s).unwrap()).unwrap();
        }
        assert!(square.equal(&rotated));
        assert!(rotated.equal(&square));

        // Reversed winding is a different polygon.
        let mut reversed = rotated.clone();
        reversed.reverse_sides();
        assert!(!square.equal(&reversed));

        // Different lengths are never equal.
        let triangle = polygon(
            &mut pool,
            &[DVec3::ZERO, DVec3::X, DVec3::Y],
        );
        assert!(!square.equal(&triangle));
    }

    #[test]
    fn test_intersects_edge() {
        let mut pool = VertexPool::new();
        let square = unit_square(&mut pool, 0.0, 0.0, 2.0);

        // An edge passing right through the square.
        let a = pool.add(DVec3::new(-1.0, 1.0, 0.0));
        let b = pool.add(DVec3::new(3.0, 1.0, 0.0));
        assert!(square.intersects_edge(a, b, &pool, XY));

        // An edge wholly outside.
        let c = pool.add(DVec3::new(5.0, 0.0, 0.0));
        let d = pool.add(DVec3::new(5.0, 2.0, 0.0));
        assert!(!square.intersects_edge(c, d, &pool, XY));

        // An edge that only touches the boundary at one of its endpoints
        // does not count: the clipping edge's endpoints are exclusive.
        let e = pool.add(DVec3::new(2.0, 1.0, 0.0));
        let f = pool.add(DVec3::new(4.0, 1.0, 0.0));
        assert!(!square.intersects_edge(e, f, &pool, XY));

        // Edges sharing a vertex index with the polygon are skipped.
        let corner = square.side(0).unwrap();
        let g = pool.add(DVec3::new(1.0, 1.0, 0.0));
        assert!(!square.intersects_edge(corner, g, &pool, XY));
    }
}
