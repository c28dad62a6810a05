use derive_more::{Deref, DerefMut};
use tracing::trace;

use crate::elements::{Primitive, VertexPool};

/// An ordered, owning sequence of primitives representing one sub-object.
///
/// Derefs to its `Vec` for read access and simple mutation; the checked
/// insert/delete helpers are what the clipper uses while it iterates, since
/// they keep out-of-range indices from panicking mid-run.
#[derive(Debug, Clone, Default, Deref, DerefMut)]
pub struct Group {
    primitives: Vec<Primitive>,
}

impl Group {
    /// Create a new empty group.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a primitive before index `n`, shifting the tail up.
    ///
    /// `n` may be one past the last primitive to append. Returns `None`
    /// (and leaves the group untouched) for any larger index.
    pub fn insert_primitive(&mut self, n: usize, primitive: Primitive) -> Option<&mut Primitive> {
        if n > self.primitives.len() {
            trace!(n, "invalid primitive number");
            return None;
        }
        self.primitives.insert(n, primitive);
        trace!(n, "inserted primitive");
        self.primitives.get_mut(n)
    }

    /// Deletes the primitive at index `n`, compacting the tail down.
    pub fn delete_primitive(&mut self, n: usize) {
        if n < self.primitives.len() {
            self.primitives.remove(n);
            trace!(n, "deleted primitive");
        } else {
            trace!(n, "invalid primitive number");
        }
    }

    /// Marks every vertex referenced by this group's primitives as used.
    pub fn set_used(&self, pool: &mut VertexPool) {
        for primitive in &self.primitives {
            primitive.set_used(pool);
        }
    }
}
