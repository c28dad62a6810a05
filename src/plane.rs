//! Projection of 3D geometry onto a 2D working plane.
//!
//! All clipping decisions are made in two dimensions. A [`Plane`] names
//! which spatial axes act as the working (x, y) axes and which one is
//! projected out, chosen so the projected polygon has non-degenerate area.

use glam::DVec3;
use tracing::trace;

use crate::coord::{Coord, coord_equal, coord_less_than};

/// An axis permutation mapping 3D space onto a 2D working plane.
///
/// `x`, `y` and `z` are a permutation of `{0, 1, 2}`. The dimensions named
/// by `x` and `y` are the working axes; the dimension named by `z` is
/// ignored when projecting and is the axis in which the source normal is
/// largest in magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Plane {
    /// Picks the projection plane for a polygon with the given normal.
    ///
    /// The dimension with the biggest normal component becomes the ignored
    /// axis, which guarantees the projected polygon has nonzero area.
    pub fn from_normal(normal: DVec3) -> Self {
        let mut bd = 0;
        let mut biggest = Coord::NEG_INFINITY;
        for dim in 0..3 {
            let mag = normal[dim].abs();
            if mag > biggest {
                biggest = mag;
                bd = dim;
            }
        }
        trace!(dim = bd, "biggest normal component");

        Self {
            x: if bd == 0 { 2 } else { 0 },
            y: if bd == 1 { 2 } else { 1 },
            z: bd,
        }
    }

    /// The working x coordinate of `v` in this plane.
    #[inline]
    pub fn x_of(self, v: DVec3) -> Coord {
        v[self.x]
    }

    /// The working y coordinate of `v` in this plane.
    #[inline]
    pub fn y_of(self, v: DVec3) -> Coord {
        v[self.y]
    }

    /// The projected-out coordinate of `v` in this plane.
    #[inline]
    pub fn z_of(self, v: DVec3) -> Coord {
        v[self.z]
    }

    /// The plane with its working y axis and ignored axis swapped.
    ///
    /// Evaluating a line equation in this plane works in (x, z), which is
    /// how the ignored coordinate of an intersection point is recovered.
    #[inline]
    fn swapped_yz(self) -> Self {
        Self {
            x: self.x,
            y: self.z,
            z: self.y,
        }
    }
}

/// Componentwise ε-equality of two points.
#[inline]
pub fn vec_equal(a: DVec3, b: DVec3) -> bool {
    (0..3).all(|dim| coord_equal(a[dim], b[dim]))
}

/// True if `a` is strictly below-left of `b` in the working plane.
#[inline]
pub fn xy_less_than(a: DVec3, b: DVec3, p: Plane) -> bool {
    coord_less_than(p.x_of(a), p.x_of(b)) && coord_less_than(p.y_of(a), p.y_of(b))
}

/// True if `a` is above-right of or ε-equal to `b` in the working plane.
#[inline]
pub fn xy_greater_or_equal(a: DVec3, b: DVec3, p: Plane) -> bool {
    !coord_less_than(p.x_of(a), p.x_of(b)) && !coord_less_than(p.y_of(a), p.y_of(b))
}

/// Gradient of the line through `a` and `b` in the working plane.
///
/// The line must not be vertical in that plane.
pub fn y_gradient(a: DVec3, b: DVec3, p: Plane) -> Coord {
    let ex = p.x_of(b) - p.x_of(a);
    let ey = p.y_of(b) - p.y_of(a);
    debug_assert!(ex != 0.0, "no vertical lines");
    ey / ex
}

/// Y intercept of the line with gradient `m` through `a` in the working plane.
pub fn y_intercept(a: DVec3, m: Coord, p: Plane) -> Coord {
    p.y_of(a) - m * p.x_of(a)
}

/// Intersection of the infinite lines through AB and CD.
///
/// Both lines are treated as infinite in extent. The intersection is found
/// in the projected (x, y) plane and the ignored coordinate is then lifted
/// through the same line equation in (x, z); when AB is vertical in (x, y)
/// the (x, z) gradient of CD is used instead. Returns `None` when the lines
/// are parallel: both vertical, both horizontal, or ε-equal gradients.
pub fn line_intersection(a: DVec3, b: DVec3, c: DVec3, d: DVec3, p: Plane) -> Option<DVec3> {
    let (ax, ay) = (p.x_of(a), p.y_of(a));
    let (bx, by) = (p.x_of(b), p.y_of(b));
    let (cx, cy) = (p.x_of(c), p.y_of(c));
    let (dx, dy) = (p.x_of(d), p.y_of(d));

    let ix;
    let iy;
    if coord_equal(ax, bx) {
        trace!("line AB is vertical");
        // If the lines overlap in the x dimension then there is only one
        // place that they could cross.
        ix = ax;

        if coord_equal(cx, dx) {
            trace!("line CD is vertical too, so the lines are parallel");
            return None;
        }

        let m2 = y_gradient(c, d, p);
        let c2 = y_intercept(c, m2, p);
        iy = m2 * ix + c2;
    } else if coord_equal(ay, by) {
        trace!("line AB is horizontal");
        iy = ay;

        if coord_equal(cx, dx) {
            trace!("line CD is vertical");
            ix = cx;
        } else {
            if coord_equal(cy, dy) {
                trace!("line CD is horizontal too, so the lines are parallel");
                return None;
            }
            let m2 = y_gradient(c, d, p);
            let c2 = y_intercept(c, m2, p);
            // y = mx + c rearranged for x.
            ix = (iy - c2) / m2;
        }
    } else {
        // AB is neither vertical nor horizontal.
        let m1 = y_gradient(a, b, p);
        let c1 = y_intercept(a, m1, p);

        if coord_equal(cx, dx) {
            trace!("line CD is vertical");
            ix = cx;
        } else {
            let m2 = y_gradient(c, d, p);
            if coord_equal(m1, m2) {
                trace!("lines AB and CD are parallel");
                return None;
            }
            let c2 = y_intercept(c, m2, p);
            // Where the two lines have equal y:
            // (m1 * x) + c1 = (m2 * x) + c2
            ix = (c2 - c1) / (m1 - m2);
        }

        iy = m1 * ix + c1;
    }

    // Recover the ignored coordinate from a line equation in (x, z).
    let p2 = p.swapped_yz();
    let iz = if coord_equal(ax, bx) {
        let m3 = y_gradient(c, d, p2);
        let c3 = y_intercept(c, m3, p2);
        m3 * ix + c3
    } else {
        let m4 = y_gradient(a, b, p2);
        let c4 = y_intercept(a, m4, p2);
        m4 * ix + c4
    };

    let mut intersect = DVec3::ZERO;
    intersect[p.x] = ix;
    intersect[p.y] = iy;
    intersect[p.z] = iz;
    trace!(?intersect, "lines intersect");

    Some(intersect)
}
