//! Per-node cached statistics capability
//!
//! An aggregate recomputed bottom-up during construction: leaves compute it
//! from their points, internal nodes merge their children. Implementations
//! must encode to a fixed width so nodes keep a fixed on-disk size.

use crate::dataset::BinaryDataset;

pub trait NodeStatistics: Clone + Default {
    const ENCODED_SIZE: usize;

    fn from_points(dataset: &BinaryDataset, members: &[u32]) -> Self;

    fn merge(left: &Self, right: &Self) -> Self;

    fn encode(&self, buf: &mut [u8]);

    fn decode(buf: &[u8]) -> Self;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NullStatistics;

impl NodeStatistics for NullStatistics {
    const ENCODED_SIZE: usize = 0;

    fn from_points(_dataset: &BinaryDataset, _members: &[u32]) -> Self {
        NullStatistics
    }

    fn merge(_left: &Self, _right: &Self) -> Self {
        NullStatistics
    }

    fn encode(&self, _buf: &mut [u8]) {}

    fn decode(_buf: &[u8]) -> Self {
        NullStatistics
    }
}
