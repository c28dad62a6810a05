//! Polyclip mutates a collection of colored, plot-ordered planar polygons
//! so that no polygon is partially hidden behind a coplanar one, leaving a
//! set of non-overlapping polygons ready to be written out as a Wavefront
//! OBJ-style mesh.
//!
//! ## Features
//!
//! - A deduplicating [`VertexPool`] with stable ids and compact renumbering
//! - Tolerance-aware geometric predicates (coplanarity, containment,
//!   edge intersection) in a projected 2D working plane
//! - A polygon splitter and a plot-ordered clipping loop with a bounded
//!   split budget
//! - OBJ record emission with triangle fan/strip re-meshing in [`obj`]
//!
//! ## Usage
//!
//! ```
//! use glam::DVec3;
//! use polyclip::{Group, Primitive, VertexPool, clip_polygons};
//!
//! let mut pool = VertexPool::new();
//! let mut behind = Group::new();
//! let mut in_front = Group::new();
//!
//! // A large square behind and a smaller one in front, both at z = 0.
//! for (group, corners) in [
//!     (&mut behind, [(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)]),
//!     (&mut in_front, [(1.0, 1.0), (3.0, 1.0), (3.0, 3.0), (1.0, 3.0)]),
//! ] {
//!     let mut polygon = Primitive::new();
//!     for (x, y) in corners {
//!         polygon.add_side(pool.add(DVec3::new(x, y, 0.0))).unwrap();
//!     }
//!     group.push(polygon);
//! }
//!
//! // Higher plot-order position means more foreground.
//! let mut groups = [behind, in_front];
//! clip_polygons(&mut pool, &mut groups, &[0, 1], false).unwrap();
//!
//! // The occluded centre of the back square is gone; what remains of it
//! // is a ring of smaller polygons.
//! assert!(groups[0].len() > 1);
//!
//! // Mark surviving vertices, merge duplicates and renumber before
//! // emitting the model.
//! for group in &groups {
//!     group.set_used(&mut pool);
//! }
//! pool.find_duplicates(false);
//! let survivors = pool.renumber(false);
//! assert!(survivors > 0);
//! ```

mod coord;
mod elements;
mod error;
pub mod obj;
mod ops;
mod plane;
mod utils;

pub use coord::*;
pub use elements::*;
pub use error::*;
pub use ops::*;
pub use plane::*;
