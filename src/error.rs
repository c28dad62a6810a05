use thiserror::Error;

/// Errors that can abort a clipping run.
///
/// Degenerate geometry (a polygon with no normal or no bounding box) is not
/// an error: predicates report it as `false`/`None` and the clipper skips
/// such primitives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClipError {
    /// A primitive referenced a vertex index that is not in the pool.
    ///
    /// Should not arise with a correctly populated pool; treated as a fatal
    /// internal inconsistency. Raised by the splitter, which validates
    /// every index it is about to cut along. Read-only queries and cache
    /// fills (`Primitive::normal`, `Primitive::bbox`, the predicates) have
    /// no failure channel and instead log the inconsistency and answer as
    /// for degenerate geometry.
    #[error("vertex {0} is not in the pool")]
    MissingVertex(usize),

    /// A primitive index went out of range while a group was being clipped.
    #[error("primitive {index} is not in group {group}")]
    MissingPrimitive { group: usize, index: usize },

    /// The plot order named a group index that does not exist.
    #[error("group {0} does not exist")]
    MissingGroup(usize),

    /// A split would have produced a polygon with more than
    /// [`MAX_SIDES`](crate::MAX_SIDES) sides.
    #[error("polygon has too many sides")]
    TooManySides,

    /// The split budget was exhausted, which indicates pathological input.
    #[error("aborted polygon clipping after {0} splits")]
    TooManySplits(usize),
}
