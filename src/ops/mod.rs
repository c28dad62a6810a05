mod clip;
mod query;
mod split;

pub use clip::*;
