//! Binary decision diagrams with complement edges.
//!
//! A [`Forest`] owns every node; functions are handled as [`Ref`] edges, which are `Copy`
//! and canonical, so two sets are equal iff their edges are equal.

pub mod cache;
pub mod forest;
pub mod reference;

pub use forest::{Forest, ForestConfig, PermutationId};
pub use reference::Ref;
