//! Removal of occluded coplanar polygon regions.
//!
//! Groups are clipped in a caller-supplied plot order: a higher plot-order
//! position means more foreground. Every polygon is clipped against the
//! coplanar polygons that follow it in its own group and against every
//! group later in the plot order, until no polygon lies partially behind
//! another.

use tracing::{debug, instrument, trace};

use crate::elements::{Group, Primitive, VertexPool};
use crate::error::ClipError;
use crate::plane::{Plane, xy_less_than};

/// Split budget per [`clip_polygons`] invocation.
///
/// Each split grows a group by one primitive, so the budget bounds the
/// worst case cost and catches pathological input.
pub const MAX_SPLITS: usize = 1024;

impl Primitive {
    /// Attempts to clip this (back) polygon by one edge of `front`.
    ///
    /// Each edge of the front polygon is considered in turn as a potential
    /// subdividing line; the back polygon is split as soon as an edge lies
    /// inside it or crosses it, and the new polygon is returned so the
    /// caller can re-evaluate which pieces are still occluded. `Ok(None)`
    /// means no edge produced a cut; in particular, the bounding boxes may
    /// not even overlap in the working plane, or either primitive may be
    /// degenerate.
    pub fn clip_by(
        &mut self,
        front: &Primitive,
        pool: &mut VertexPool,
        plane: Plane,
    ) -> Result<Option<Primitive>, ClipError> {
        debug_assert!(!std::ptr::eq(self, front));

        // Degenerate primitives are unclippable, not an error.
        let (Some(front_bbox), Some(back_bbox)) = (front.bbox(pool), self.bbox(pool)) else {
            trace!("cannot clip an incomplete primitive");
            return Ok(None);
        };

        // If the rectangles don't overlap then the polygons don't either.
        if !xy_less_than(front_bbox.low, back_bbox.high, plane)
            || !xy_less_than(back_bbox.low, front_bbox.high, plane)
        {
            trace!("bounding boxes do not overlap");
            return Ok(None);
        }

        let num_sides = front.num_sides();
        if num_sides < 3 {
            trace!(num_sides, "cannot clip with a point or line");
            return Ok(None);
        }

        let Some(mut last_side) = front.side(num_sides - 1) else {
            return Ok(None);
        };
        let mut last_inside = self.contains_point(pool, last_side, plane);

        for t in 0..num_sides {
            let Some(side) = front.side(t) else {
                return Ok(None);
            };
            trace!(t, side, "front side");

            let this_inside = self.contains_point(pool, side, plane);
            if (last_inside && this_inside) || self.intersects_edge(last_side, side, pool, plane)
            {
                // The back polygon contains or is crossed by this front
                // edge, so split it along the edge's line.
                if let Some(split_off) = self.split_along(last_side, side, pool, plane)? {
                    return Ok(Some(split_off));
                }
            }

            last_side = side;
            last_inside = this_inside;
        }

        trace!("clipping is complete");
        Ok(None)
    }
}

/// Clips every group of polygons against the ones in front of it.
///
/// `plot_order` is a front-to-back permutation of group indices: the group
/// at a higher plot-order position is in front. Groups are mutated in
/// place: covered polygons are deleted and partially covered ones are
/// replaced by their uncovered pieces. With `verbose` set, progress is
/// reported to stdout.
#[instrument(skip(pool, groups))]
pub fn clip_polygons(
    pool: &mut VertexPool,
    groups: &mut [Group],
    plot_order: &[usize],
    verbose: bool,
) -> Result<(), ClipError> {
    let mut nsplit = 0;
    for bg in 0..plot_order.len() {
        clip_group(pool, groups, plot_order, bg, &mut nsplit, verbose)?;
    }
    Ok(())
}

/// Clips one group (selected by plot-order position `bg`) against any
/// polygons in front of it.
fn clip_group(
    pool: &mut VertexPool,
    groups: &mut [Group],
    plot_order: &[usize],
    bg: usize,
    nsplit: &mut usize,
    verbose: bool,
) -> Result<(), ClipError> {
    let back_gi = plot_order[bg];
    debug!(group = back_gi, "back group");

    let group_splits_before = *nsplit;
    let mut ndel = 0;

    // The index advances only past survivors: splitting inserts new pieces
    // after the current polygon and deletion pulls the next one down.
    let mut back = 0;
    while back < groups.get(back_gi).ok_or(ClipError::MissingGroup(back_gi))?.len() {
        // Coplanar polygons later in the same group are in front.
        let mut deleted = clip_group_vs_group(
            pool, groups, back_gi, back, back_gi, back + 1, nsplit, verbose,
        )?;

        // Then the groups that follow in plot order.
        for fg in bg + 1..plot_order.len() {
            if deleted {
                break;
            }
            if plot_order[fg] == back_gi {
                trace!(group = back_gi, "cannot clip group against itself");
                continue;
            }
            deleted = clip_group_vs_group(
                pool,
                groups,
                back_gi,
                back,
                plot_order[fg],
                0,
                nsplit,
                verbose,
            )?;
        }

        if deleted {
            ndel += 1;
        } else {
            back += 1;
        }
    }

    if verbose {
        let group_splits = *nsplit - group_splits_before;
        if group_splits > 0 || ndel > 0 {
            println!("Split {group_splits} and deleted {ndel} in group {bg}");
        }
    }

    Ok(())
}

/// Clips the back primitive at `(bg, back)` against the front group's
/// primitives starting at `front_start`. Returns whether the back
/// primitive was completely covered (and therefore deleted).
#[allow(clippy::too_many_arguments)]
fn clip_group_vs_group(
    pool: &mut VertexPool,
    groups: &mut [Group],
    bg: usize,
    back: usize,
    fg: usize,
    front_start: usize,
    nsplit: &mut usize,
    verbose: bool,
) -> Result<bool, ClipError> {
    trace!(back, bg, "back primitive");

    let missing_back = || ClipError::MissingPrimitive {
        group: bg,
        index: back,
    };

    // The two-dimensional plane in which to clip the two primitives (none
    // if the back primitive is a point or line).
    let plane = {
        let back_group = groups.get(bg).ok_or(ClipError::MissingGroup(bg))?;
        let backp = back_group.get(back).ok_or_else(missing_back)?;
        match backp.find_plane(pool) {
            Some(plane) => plane,
            None => return Ok(false),
        }
    };

    let mut front = front_start;
    loop {
        // Work on a copy of the front polygon: the back group's storage may
        // move or shift while pieces are inserted, and the front polygon
        // may live in that same group. Its caches are warmed in place first
        // so the copy carries them.
        let frontp = {
            let front_group = groups.get(fg).ok_or(ClipError::MissingGroup(fg))?;
            let Some(fp) = front_group.get(front) else {
                break;
            };
            trace!(front, fg, "front primitive");

            if fp.num_sides() < 3 {
                trace!("cannot clip against a point or line");
                front += 1;
                continue;
            }

            fp.normal(pool);
            fp.bbox(pool);
            fp.clone()
        };

        {
            let backp = groups[bg].get(back).ok_or_else(missing_back)?;
            if !frontp.coplanar(backp, pool) {
                front += 1;
                continue;
            }
        }

        let mut covered = false;
        loop {
            let back_group = groups.get_mut(bg).ok_or(ClipError::MissingGroup(bg))?;

            {
                let backp = back_group.get(back).ok_or_else(missing_back)?;
                if frontp.equal(backp) || frontp.contains(backp, pool, plane) {
                    // The back polygon is completely covered by the front
                    // polygon.
                    covered = true;
                    break;
                }
            }

            let backp = back_group.get_mut(back).ok_or_else(missing_back)?;
            let split_off = match backp.clip_by(&frontp, pool, plane) {
                Ok(split_off) => split_off,
                Err(e) => {
                    if verbose {
                        println!("Clipping failed (too many sides?)");
                    }
                    return Err(e);
                }
            };
            let Some(split_off) = split_off else {
                trace!("no split");
                break;
            };

            back_group
                .insert_primitive(back + 1, split_off)
                .ok_or(ClipError::MissingPrimitive {
                    group: bg,
                    index: back + 1,
                })?;

            *nsplit += 1;
            if *nsplit == MAX_SPLITS {
                if verbose {
                    println!("Aborted polygon clipping after {nsplit} splits");
                }
                return Err(ClipError::TooManySplits(*nsplit));
            }

            // The new polygon sits right after the back polygon. When the
            // front polygon is in the same group, its index (and that of
            // everything after the insertion point) moved up by one; our
            // copy of it stays valid either way.
            if fg == bg {
                front += 1;
            }

            if verbose {
                let back_group = groups.get(bg).ok_or(ClipError::MissingGroup(bg))?;
                let backp = back_group.get(back).ok_or_else(missing_back)?;
                let behind =
                    back_group
                        .get(back + 1)
                        .ok_or(ClipError::MissingPrimitive {
                            group: bg,
                            index: back + 1,
                        })?;
                println!(
                    "Split polygon {} in group {} behind {} in group {}:",
                    backp.id(),
                    bg,
                    frontp.id(),
                    fg
                );
                print!("{}", backp.display(pool));
                println!("\n and");
                print!("{}", behind.display(pool));
                println!();
            }

            // Keep clipping the retained piece against the same front
            // polygon until no more cuts occur; the split-off piece gets
            // its own turn in the outer iteration.
        }

        if covered {
            // Report the deletion here so that its cause is visible.
            if verbose {
                let backp = groups[bg].get(back).ok_or_else(missing_back)?;
                println!(
                    "Deleting polygon {} in group {} behind {} in group {}:",
                    backp.id(),
                    bg,
                    frontp.id(),
                    fg
                );
                print!("{}", backp.display(pool));
                println!();
            }
            groups
                .get_mut(bg)
                .ok_or(ClipError::MissingGroup(bg))?
                .delete_primitive(back);
            return Ok(true);
        }

        front += 1;
    }

    Ok(false)
}
