//! Splitting a polygon in two along an infinite line.

use tracing::{instrument, trace};

use crate::elements::{Primitive, VertexPool};
use crate::error::ClipError;
use crate::plane::Plane;

/// Progress of a split while walking the polygon's directed edges.
///
/// A split starts when the first edge/line intersection is consumed and
/// completes at the second; any further intersections (possible with a
/// concave polygon) are left for a later pass.
enum SplitState {
    None,
    InProgress,
    Complete,
}

impl Primitive {
    /// Cuts this polygon along the infinite line through vertices `a` and
    /// `b`, which are typically corners of a clipping polygon.
    ///
    /// When a cut happens the retained half replaces this primitive's sides
    /// and the other half is returned as a new primitive carrying the same
    /// colour, id and (if memoized) normal. Both halves are coplanar with
    /// the original and have at least three sides. `Ok(None)` means the
    /// line misses the polygon, touches it only at a corner, or the
    /// polygon is a point or line.
    ///
    /// Intersection points are found-or-added in the pool, so splitting a
    /// polygon along an edge it already shares vertices with does not grow
    /// the pool.
    ///
    /// A side or line vertex index with no vertex behind it in the pool is
    /// a fatal inconsistency, reported as [`ClipError::MissingVertex`];
    /// growing either half past the side cap is [`ClipError::TooManySides`].
    #[instrument(skip(self, pool))]
    pub fn split_along(
        &mut self,
        a: usize,
        b: usize,
        pool: &mut VertexPool,
        plane: Plane,
    ) -> Result<Option<Primitive>, ClipError> {
        let num_sides = self.num_sides();
        if num_sides < 3 {
            trace!(num_sides, "cannot split a point or line");
            return Ok(None);
        }

        // A vertex index with no vertex behind it is an internal
        // inconsistency, not a geometric no-op. Check up front so the edge
        // walk below cannot mistake a corrupt index for a missed
        // intersection.
        for v in self.sides().chain([a, b]) {
            if pool.get(v).is_none() {
                return Err(ClipError::MissingVertex(v));
            }
        }

        let mut retained = Primitive::new();
        let mut split_off = Primitive::new();
        let mut state = SplitState::None;

        let Some(mut last_side) = self.side(num_sides - 1) else {
            return Ok(None);
        };

        for s in 0..num_sides {
            let Some(side) = self.side(s) else {
                return Ok(None);
            };
            trace!(s, side, "back side");

            if !matches!(state, SplitState::Complete)
                && let Some(intersect) = pool.edge_intersects_line(last_side, side, a, b, plane)
            {
                trace!(last_side, side, a, b, "splitting edge with line");

                let v = match pool.find(intersect) {
                    Some(v) => v,
                    None => pool.add(intersect),
                };

                match state {
                    SplitState::None => {
                        trace!("starting split");
                        state = SplitState::InProgress;

                        // Clip the original polygon at the intersection,
                        // which may simply be the previous vertex.
                        if v != last_side {
                            retained.add_side(v)?;
                        }

                        // Begin the new polygon at the intersection.
                        if v != side {
                            split_off.add_side(v)?;
                        }
                    }
                    SplitState::InProgress => {
                        trace!("finishing split");
                        state = SplitState::Complete;

                        if v != last_side {
                            split_off.add_side(v)?;
                        }

                        // Restart the retained polygon at the intersection
                        // unless it coincides with the vertex we are about
                        // to keep anyway.
                        if v != side {
                            retained.add_side(v)?;
                        }
                    }
                    SplitState::Complete => unreachable!(),
                }
            }

            // Vertices between the two intersections belong to the new
            // polygon; everything else stays with the original.
            match state {
                SplitState::InProgress => split_off.add_side(side)?,
                _ => retained.add_side(side)?,
            }

            last_side = side;
        }

        if !matches!(state, SplitState::Complete) {
            trace!("no split");
            return Ok(None);
        }

        debug_assert!(retained.num_sides() > 2);
        debug_assert!(split_off.num_sides() > 2);

        // Both halves lie in the original's plane, so its memoized normal
        // stays valid for them.
        let normal = self.cached_normal();

        self.delete_all();
        for side in retained.sides() {
            self.add_side(side)?;
        }

        split_off.set_colour(self.colour());
        split_off.set_id(self.id());

        if let Some(normal) = normal {
            self.set_cached_normal(normal);
            split_off.set_cached_normal(normal);
        }

        Ok(Some(split_off))
    }
}
