//! Relocatable tree nodes
//!
//! A node is either internal (two children) or a leaf (a contiguous range
//! into the tree's index permutation); both carry the minimal bounding
//! geometry over their subtree, the subtree point count, and cached
//! statistics. Children are referenced by arena offset, never by address, so
//! a serialized node region can be reopened without pointer fix-up. Nodes
//! encode to a fixed width for a given dimensionality, in the same spirit as
//! the record layouts in `layout`.

use crate::bounds::BoundingGeometry;
use crate::error::Error;
use crate::layout;
use crate::stats::NodeStatistics;
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

///Opaque handle into a `NodeArena`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeOffset(pub usize);

impl fmt::Display for NodeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    Internal { left: NodeOffset, right: NodeOffset },
    Leaf { start: usize, end: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node<B, S> {
    pub bounds: B,
    pub count: usize,
    pub stats: S,
    pub kind: NodeKind,
}

impl<B: BoundingGeometry, S: NodeStatistics> Node<B, S> {
    pub fn leaf(bounds: B, start: usize, end: usize, stats: S) -> Self {
        return Self {
            bounds,
            count: end - start,
            stats,
            kind: NodeKind::Leaf { start, end },
        };
    }

    pub fn internal(bounds: B, left: NodeOffset, right: NodeOffset, count: usize, stats: S) -> Self {
        return Self {
            bounds,
            count,
            stats,
            kind: NodeKind::Internal { left, right },
        };
    }

    pub fn is_leaf(&self) -> bool {
        return matches!(self.kind, NodeKind::Leaf { .. });
    }

    pub fn encoded_size(dimension: usize) -> usize {
        return layout::NODE_FIXED_SIZE + B::encoded_size(dimension) + S::ENCODED_SIZE;
    }

    pub fn to_vec(&self, dimension: usize) -> Vec<u8> {
        let mut buf = vec![0u8; Self::encoded_size(dimension)];

        let (kind, a, b) = match self.kind {
            NodeKind::Internal { left, right } => {
                (layout::NODE_KIND_INTERNAL, left.0 as u64, right.0 as u64)
            }
            NodeKind::Leaf { start, end } => (layout::NODE_KIND_LEAF, start as u64, end as u64),
        };

        buf[layout::NODE_KIND_OFFSET] = kind;
        BigEndian::write_u64(
            &mut buf[layout::NODE_LEFT_OFFSET..layout::NODE_LEFT_OFFSET + layout::NODE_LEFT_SIZE],
            a,
        );
        BigEndian::write_u64(
            &mut buf[layout::NODE_RIGHT_OFFSET..layout::NODE_RIGHT_OFFSET + layout::NODE_RIGHT_SIZE],
            b,
        );
        BigEndian::write_u64(
            &mut buf[layout::NODE_COUNT_OFFSET..layout::NODE_COUNT_OFFSET + layout::NODE_COUNT_SIZE],
            self.count as u64,
        );

        let bounds_start = layout::NODE_FIXED_SIZE;
        let bounds_end = bounds_start + B::encoded_size(dimension);
        self.bounds.encode(&mut buf[bounds_start..bounds_end]);
        self.stats
            .encode(&mut buf[bounds_end..bounds_end + S::ENCODED_SIZE]);

        return buf;
    }

    pub fn from_slice(buf: &[u8], dimension: usize) -> Result<Self, Error> {
        if buf.len() < Self::encoded_size(dimension) {
            return Err(Error::Corrupt(format!(
                "node record of {} bytes is shorter than the {} expected",
                buf.len(),
                Self::encoded_size(dimension)
            )));
        }

        let a = BigEndian::read_u64(
            &buf[layout::NODE_LEFT_OFFSET..layout::NODE_LEFT_OFFSET + layout::NODE_LEFT_SIZE],
        ) as usize;
        let b = BigEndian::read_u64(
            &buf[layout::NODE_RIGHT_OFFSET..layout::NODE_RIGHT_OFFSET + layout::NODE_RIGHT_SIZE],
        ) as usize;
        let count = BigEndian::read_u64(
            &buf[layout::NODE_COUNT_OFFSET..layout::NODE_COUNT_OFFSET + layout::NODE_COUNT_SIZE],
        ) as usize;

        let kind = match buf[layout::NODE_KIND_OFFSET] {
            layout::NODE_KIND_INTERNAL => NodeKind::Internal {
                left: NodeOffset(a),
                right: NodeOffset(b),
            },
            layout::NODE_KIND_LEAF => NodeKind::Leaf { start: a, end: b },
            other => {
                return Err(Error::Corrupt(format!("unknown node kind tag {}", other)));
            }
        };

        let bounds_start = layout::NODE_FIXED_SIZE;
        let bounds_end = bounds_start + B::encoded_size(dimension);
        let bounds = B::decode(&buf[bounds_start..bounds_end], dimension);
        let stats = S::decode(&buf[bounds_end..bounds_end + S::ENCODED_SIZE]);

        return Ok(Self {
            bounds,
            count,
            stats,
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::HyperRectangle;
    use crate::stats::NullStatistics;

    #[test]
    fn quick_leaf_and_internal_round_trip() {
        let mut bounds = HyperRectangle::empty(2);
        bounds.expand(&[-0.4, 0.1]);
        bounds.expand(&[0.3, 0.5]);

        let leaf: Node<HyperRectangle, NullStatistics> =
            Node::leaf(bounds.clone(), 8, 24, NullStatistics);
        let decoded = Node::from_slice(&leaf.to_vec(2), 2).unwrap();
        assert_eq!(decoded, leaf);
        assert!(decoded.is_leaf());
        assert_eq!(decoded.count, 16);

        let internal: Node<HyperRectangle, NullStatistics> =
            Node::internal(bounds, NodeOffset(3), NodeOffset(9), 16, NullStatistics);
        let decoded = Node::from_slice(&internal.to_vec(2), 2).unwrap();
        assert_eq!(decoded, internal);
        assert!(!decoded.is_leaf());
    }

    #[test]
    fn quick_bad_kind_tag_is_rejected() {
        let node: Node<HyperRectangle, NullStatistics> =
            Node::leaf(HyperRectangle::empty(2), 0, 4, NullStatistics);

        let mut buf = node.to_vec(2);
        buf[crate::layout::NODE_KIND_OFFSET] = 9;

        assert!(Node::<HyperRectangle, NullStatistics>::from_slice(&buf, 2).is_err());
    }
}
