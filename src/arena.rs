//! Offset-addressed node storage
//!
//! All tree nodes are carved out of one arena and addressed by `NodeOffset`,
//! so the whole tree is relocatable: nothing in a node depends on where the
//! backing region lives. The arena can be flattened to a file and reopened
//! later (by another process if need be) with no pointer fix-up, only a
//! decode of each fixed-width record.
//!
//! Allocation past the configured capacity is fatal; a half-built tree is not
//! worth recovering, the caller discards and retries from scratch. Single
//! writer during build is assumed and enforced by `&mut self`.

use crate::bounds::BoundingGeometry;
use crate::error::Error;
use crate::node::{Node, NodeOffset};
use crate::stats::NodeStatistics;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

#[derive(Debug)]
pub struct NodeArena<B, S> {
    store: Vec<Node<B, S>>,
    capacity: usize,
    dimension: usize,
}

impl<B: BoundingGeometry, S: NodeStatistics> NodeArena<B, S> {
    pub fn with_capacity(capacity: usize, dimension: usize) -> Self {
        return Self {
            store: Vec::with_capacity(capacity),
            capacity,
            dimension,
        };
    }

    pub fn len(&self) -> usize {
        return self.store.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.store.is_empty();
    }

    pub fn capacity(&self) -> usize {
        return self.capacity;
    }

    pub fn dimension(&self) -> usize {
        return self.dimension;
    }

    ///Carves a slot for `node` and returns its stable offset
    pub fn alloc(&mut self, node: Node<B, S>) -> Result<NodeOffset, Error> {
        if self.store.len() >= self.capacity {
            return Err(Error::ArenaFull {
                capacity: self.capacity,
            });
        }

        self.store.push(node);

        return Ok(NodeOffset(self.store.len() - 1));
    }

    pub fn get(&self, offset: NodeOffset) -> Result<&Node<B, S>, Error> {
        return match self.store.get(offset.0) {
            Some(node) => Ok(node),
            None => Err(Error::OffsetOutOfBounds {
                offset: offset.0,
                len: self.store.len(),
            }),
        };
    }

    pub fn get_mut(&mut self, offset: NodeOffset) -> Result<&mut Node<B, S>, Error> {
        let len = self.store.len();

        return match self.store.get_mut(offset.0) {
            Some(node) => Ok(node),
            None => Err(Error::OffsetOutOfBounds {
                offset: offset.0,
                len,
            }),
        };
    }

    ///Bulk release of every node; offsets handed out so far become invalid
    pub fn clear(&mut self) {
        self.store.clear();
    }

    pub fn to_file(&self, path: &Path) -> Result<(), Error> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);

        writer
            .write_u64::<BigEndian>(self.store.len() as u64)
            .map_err(|e| Error::io(path, e))?;
        writer
            .write_u64::<BigEndian>(self.dimension as u64)
            .map_err(|e| Error::io(path, e))?;

        for node in self.store.iter() {
            writer
                .write_all(&node.to_vec(self.dimension))
                .map_err(|e| Error::io(path, e))?;
        }
        writer.flush().map_err(|e| Error::io(path, e))?;

        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut reader = BufReader::new(file);

        let count = reader
            .read_u64::<BigEndian>()
            .map_err(|e| Error::io(path, e))? as usize;
        let dimension = reader
            .read_u64::<BigEndian>()
            .map_err(|e| Error::io(path, e))? as usize;

        let node_size = Node::<B, S>::encoded_size(dimension);
        let mut arena = Self::with_capacity(count, dimension);
        let mut buf = vec![0u8; node_size];

        for _ in 0..count {
            reader
                .read_exact(&mut buf)
                .map_err(|e| Error::io(path, e))?;
            let node = Node::from_slice(&buf, dimension)?;
            arena.store.push(node);
        }

        return Ok(arena);
    }
}
