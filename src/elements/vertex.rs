use glam::DVec3;
use tracing::{instrument, trace};

use crate::coord::coord_less_than;
use crate::plane::{Plane, line_intersection, vec_equal};
use crate::utils::unwrap_or_return;

/// A pooled 3D point with a stable public id.
///
/// Vertices are created only by [`VertexPool`] and referenced everywhere
/// else by index.
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    /// Position in space.
    pub coords: DVec3,
    id: usize,
    dup: Option<usize>,
    marked: bool,
}

impl Vertex {
    /// The public id, equal to the insertion index until
    /// [`VertexPool::renumber`] reassigns it.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// The earlier vertex this one duplicates, linked by
    /// [`VertexPool::find_duplicates`]. Chains are at most one hop: a
    /// duplicate points at an original, never at another duplicate.
    #[inline]
    pub fn duplicate_of(&self) -> Option<usize> {
        self.dup
    }

    /// True if at least one surviving primitive references this vertex.
    #[inline]
    pub fn is_marked(&self) -> bool {
        self.marked
    }
}

/// Owning storage for every vertex in a model.
///
/// Vertices keep their insertion index for their whole lifetime, so
/// primitives can hold bare indices across pool growth.
#[derive(Debug, Clone, Default)]
pub struct VertexPool {
    vertices: Vec<Vertex>,
    /// Index view reused between dedup runs.
    sort_scratch: Vec<usize>,
}

impl VertexPool {
    /// Create a new empty vertex pool.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices ever added, including unmarked and duplicate ones.
    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Removes all vertices but keeps the allocations.
    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    /// The vertex at index `v`.
    #[inline]
    pub fn get(&self, v: usize) -> Option<&Vertex> {
        let vertex = self.vertices.get(v);
        if vertex.is_none() {
            trace!(v, "invalid vertex number");
        }
        vertex
    }

    /// The coordinates of the vertex at index `v`.
    #[inline]
    pub fn coords(&self, v: usize) -> Option<DVec3> {
        self.get(v).map(|vertex| vertex.coords)
    }

    /// Appends a vertex and returns its index.
    ///
    /// Never merges coordinate-equal vertices; deduplication is a separate
    /// pass ([`Self::find_duplicates`]).
    pub fn add(&mut self, coords: DVec3) -> usize {
        let v = self.vertices.len();
        self.vertices.push(Vertex {
            coords,
            id: v,
            dup: None,
            marked: false,
        });
        trace!(v, ?coords, "added vertex");
        v
    }

    /// Linear scan for a vertex with ε-equal coordinates.
    pub fn find(&self, coords: DVec3) -> Option<usize> {
        let found = self
            .vertices
            .iter()
            .position(|vertex| vec_equal(vertex.coords, coords));
        match found {
            Some(v) => trace!(v, ?coords, "found coordinates"),
            None => trace!(?coords, "no vertex has coordinates"),
        }
        found
    }

    /// Marks the vertex at `v` as used by a surviving primitive.
    ///
    /// Follows the duplicate chain so that the mark lands on the canonical
    /// vertex, which is the one that gets emitted.
    pub fn set_used(&mut self, v: usize) {
        let mut v = v;
        loop {
            let vertex = unwrap_or_return!(self.vertices.get(v), "Vertex to mark not found");
            match vertex.dup {
                Some(original) => v = original,
                None => break,
            }
        }
        trace!(v, "marking vertex");
        self.vertices[v].marked = true;
    }

    /// Marks every vertex in the pool as used.
    pub fn set_all_used(&mut self) {
        for vertex in &mut self.vertices {
            vertex.marked = true;
        }
    }

    /// True if the vertex at `v` carries the used mark itself.
    ///
    /// Duplicates whose mark was transferred to their original report
    /// `false`, which is what keeps them out of the emitted output.
    pub fn is_used(&self, v: usize) -> bool {
        self.get(v).is_some_and(|vertex| vertex.marked)
    }

    /// The public id of the vertex at `v`, following the duplicate chain to
    /// the canonical vertex.
    pub fn id_of(&self, v: usize) -> Option<usize> {
        let mut vertex = self.get(v)?;
        while let Some(original) = vertex.dup {
            trace!(v, original, "vertex is a duplicate");
            vertex = self.get(original)?;
        }
        Some(vertex.id)
    }

    /// Links coordinate-equal vertices and returns how many duplicates were
    /// found.
    ///
    /// Sorts an index view lexicographically by exact (x, y, z) and links
    /// every later member of an ε-equal run to the run's first vertex, so
    /// duplicate chains stay one hop long. Marks are transferred from the
    /// duplicate to the original, and the duplicate unmarked, so emission
    /// keeps exactly one copy.
    ///
    /// ε-equality is not transitive, so clusters of vertices spaced just
    /// under ε apart can be assigned to runs differently depending on
    /// insertion order. Only adjacent-in-sorted-order equality is
    /// guaranteed to link.
    #[instrument(skip(self))]
    pub fn find_duplicates(&mut self, verbose: bool) -> usize {
        let mut n = 0;

        if !self.vertices.is_empty() {
            let mut sorted = std::mem::take(&mut self.sort_scratch);
            sorted.clear();
            sorted.extend(0..self.vertices.len());

            let vertices = &self.vertices;
            sorted.sort_by(|&a, &b| {
                let va = vertices[a].coords;
                let vb = vertices[b].coords;
                va.x.total_cmp(&vb.x)
                    .then(va.y.total_cmp(&vb.y))
                    .then(va.z.total_cmp(&vb.z))
            });

            // Link duplicates before any renumbering so that we never end
            // up keeping a duplicate while discarding its original.
            let mut last = 0;
            for s in 1..sorted.len() {
                let (orig, v) = (sorted[last], sorted[s]);
                if vec_equal(self.vertices[orig].coords, self.vertices[v].coords) {
                    n += 1;
                    if verbose {
                        let c = self.vertices[v].coords;
                        println!(
                            "Vertex {} duplicates {} {{{},{},{}}}",
                            self.vertices[v].id, self.vertices[orig].id, c.x, c.y, c.z
                        );
                    }

                    // Querying the duplicate's id must return whatever id
                    // the original ends up with after renumbering.
                    self.vertices[v].dup = Some(orig);

                    if self.vertices[v].marked {
                        self.vertices[orig].marked = true;
                        self.vertices[v].marked = false;
                    }
                } else {
                    last = s;
                }
            }

            self.sort_scratch = sorted;
        }

        if verbose {
            println!("{}/{} vertices were duplicates", n, self.vertices.len());
        }
        n
    }

    /// Assigns compact sequential ids to marked vertices, in insertion
    /// order, and returns the surviving count.
    ///
    /// Unmarked vertices keep stale ids but are never emitted.
    #[instrument(skip(self))]
    pub fn renumber(&mut self, verbose: bool) -> usize {
        let mut next_id = 0;
        for v in 0..self.vertices.len() {
            if self.vertices[v].marked {
                if next_id != v {
                    if verbose {
                        let vertex = &self.vertices[v];
                        let c = vertex.coords;
                        println!(
                            "Renumbering vertex {} as {} {{{},{},{}}}",
                            vertex.id, next_id, c.x, c.y, c.z
                        );
                    }
                    self.vertices[v].id = next_id;
                }
                next_id += 1;
            }
        }
        if verbose {
            println!("{}/{} vertices survived", next_id, self.vertices.len());
        }
        next_id
    }

    /// Intersection of the finite edges AB and CD, if any.
    ///
    /// Both edges have inclusive starts and ends. The segments' bounding
    /// ranges are compared with ε slack before and after the infinite-line
    /// intersection.
    pub fn edges_intersect(
        &self,
        a: usize,
        b: usize,
        c: usize,
        d: usize,
        p: Plane,
    ) -> Option<DVec3> {
        debug_assert_ne!(a, b);
        debug_assert_ne!(c, d);
        trace!(a, b, c, d, "testing edge AB against edge CD");

        let va = unwrap_or_return!(self.coords(a), "Edge vertex A not found", None);
        let vb = unwrap_or_return!(self.coords(b), "Edge vertex B not found", None);
        let vc = unwrap_or_return!(self.coords(c), "Edge vertex C not found", None);
        let vd = unwrap_or_return!(self.coords(d), "Edge vertex D not found", None);

        let (ax, bx, cx, dx) = (p.x_of(va), p.x_of(vb), p.x_of(vc), p.x_of(vd));
        let (ab_low_x, ab_high_x) = (ax.min(bx), ax.max(bx));
        let (cd_low_x, cd_high_x) = (cx.min(dx), cx.max(dx));

        // Meant to be less/greater than, but the comparison must be inexact.
        if coord_less_than(cd_high_x, ab_low_x) || coord_less_than(ab_high_x, cd_low_x) {
            trace!("segments do not overlap in x");
            return None;
        }

        let (ay, by, cy, dy) = (p.y_of(va), p.y_of(vb), p.y_of(vc), p.y_of(vd));
        let (ab_low_y, ab_high_y) = (ay.min(by), ay.max(by));
        let (cd_low_y, cd_high_y) = (cy.min(dy), cy.max(dy));

        if coord_less_than(cd_high_y, ab_low_y) || coord_less_than(ab_high_y, cd_low_y) {
            trace!("segments do not overlap in y");
            return None;
        }

        let intersect = line_intersection(va, vb, vc, vd, p)?;

        let ix = p.x_of(intersect);
        if coord_less_than(ix, ab_low_x.max(cd_low_x))
            || coord_less_than(ab_high_x.min(cd_high_x), ix)
        {
            trace!(ix, "intersection is outside the x overlap");
            return None;
        }

        let iy = p.y_of(intersect);
        if coord_less_than(iy, ab_low_y.max(cd_low_y))
            || coord_less_than(ab_high_y.min(cd_high_y), iy)
        {
            trace!(iy, "intersection is outside the y overlap");
            return None;
        }

        Some(intersect)
    }

    /// Intersection of the finite edge AB with the infinite line CD, if any.
    ///
    /// The edge's start is inclusive and its end exclusive: an intersection
    /// ε-equal to B's coordinates is rejected, so that walking a polygon's
    /// edges counts each corner once rather than twice.
    pub fn edge_intersects_line(
        &self,
        a: usize,
        b: usize,
        c: usize,
        d: usize,
        p: Plane,
    ) -> Option<DVec3> {
        debug_assert_ne!(a, b);
        debug_assert_ne!(c, d);
        trace!(a, b, c, d, "testing edge AB against line CD");

        let va = unwrap_or_return!(self.coords(a), "Edge vertex A not found", None);
        let vb = unwrap_or_return!(self.coords(b), "Edge vertex B not found", None);
        let vc = unwrap_or_return!(self.coords(c), "Line vertex C not found", None);
        let vd = unwrap_or_return!(self.coords(d), "Line vertex D not found", None);

        let intersect = line_intersection(va, vb, vc, vd, p)?;

        let ix = p.x_of(intersect);
        let (ax, bx) = (p.x_of(va), p.x_of(vb));
        if coord_less_than(ix, ax.min(bx)) || coord_less_than(ax.max(bx), ix) {
            trace!(ix, "intersection is outside the edge in x");
            return None;
        }

        let iy = p.y_of(intersect);
        let (ay, by) = (p.y_of(va), p.y_of(vb));
        if coord_less_than(iy, ay.min(by)) || coord_less_than(ay.max(by), iy) {
            trace!(iy, "intersection is outside the edge in y");
            return None;
        }

        if vec_equal(intersect, vb) {
            trace!("ignoring intersection at the exclusive end B");
            return None;
        }

        Some(intersect)
    }
}
