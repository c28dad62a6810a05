//! Scalar coordinate type and its tolerance-aware comparisons.

/// Scalar type used for all vertex coordinates.
pub type Coord = f64;

/// Comparison tolerance for coordinates.
///
/// Tuned so that single-precision arithmetic could be substituted for
/// double-precision. If it is too small the polygon clipping breaks, e.g.
/// by creating zero-length edges after failing to recognise equal vertex
/// coordinates.
pub const EPSILON: Coord = 0.001;

/// Returns true if `a` and `b` are equal within [`EPSILON`].
///
/// This relation is reflexive and symmetric but only approximately
/// transitive: three values spaced just under ε apart compare equal
/// pairwise at the ends but not across the span.
#[inline]
pub fn coord_equal(a: Coord, b: Coord) -> bool {
    (a - b).abs() < EPSILON
}

/// Returns true if `a` is less than `b` by at least [`EPSILON`].
///
/// Together with [`coord_equal`] this does not form a total order:
/// `!coord_less_than(a, b) && !coord_less_than(b, a)` is exactly the
/// equivalence tested by `coord_equal`.
#[inline]
pub fn coord_less_than(a: Coord, b: Coord) -> bool {
    (b - a) >= EPSILON
}
