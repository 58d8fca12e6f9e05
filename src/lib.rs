//! Disk-oriented binary space-partitioning index for exact nearest-neighbor
//! and range search over fixed point sets.
//!
//! A dataset of D-dimensional points is partitioned once into a strict binary
//! tree whose nodes live in an offset-addressed arena, so the built tree is
//! relocatable and can be flattened to a file and reopened without pointer
//! fix-up. Queries prune subtrees through per-node bounding geometry; batch
//! all-pairs queries stream fixed-width result records through a
//! memory-mapped output file.
//!
//! The engine is generic over narrow capability traits (metric, bounding
//! geometry, pivot rule, node statistics, identity discriminator) bundled in
//! a [`tree::Capabilities`]; [`tree::EuclideanKd`] is the stock combination.
//!
//! TODO
//! - [ ] distribute breadth-first levels across worker threads (needs an
//!   atomic allocation cursor in the arena)
//!
pub mod arena;
pub mod bounds;
pub mod dataset;
pub mod discriminator;
pub mod error;
pub mod layout;
pub mod metric;
pub mod node;
pub mod pivot;
pub mod results;
pub mod stats;
pub mod tree;
