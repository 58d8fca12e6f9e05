//! Bounding geometry capability cached on every node
//!
//! The tree only ever asks a bound for three things: grow to include a point,
//! merge with a sibling, and lower-bound the distance from a query to anything
//! inside. The lower bound is what makes pruning sound, so it must never
//! exceed the true distance to any contained point.

use crate::layout;
use byteorder::{BigEndian, ByteOrder};

pub trait BoundingGeometry: Clone {
    fn empty(dimension: usize) -> Self;

    fn dimension(&self) -> usize;

    fn expand(&mut self, point: &[f32]);

    fn merge(&mut self, other: &Self);

    fn contains(&self, point: &[f32]) -> bool;

    ///Lower bound on the distance from `query` to any point inside the bound
    fn min_dist(&self, query: &[f32]) -> f32;

    fn overlaps_ball(&self, center: &[f32], radius: f32) -> bool {
        return self.min_dist(center) < radius;
    }

    fn encoded_size(dimension: usize) -> usize;

    fn encode(&self, buf: &mut [u8]);

    fn decode(buf: &[u8], dimension: usize) -> Self;
}

///Minimal axis-aligned box over a set of points
///
///A fresh box is inverted (+inf mins, -inf maxes) so the first `expand` snaps
///it onto the point. A zero-extent box from identical points is fine: its
///lower bounds are still valid, just useless for pruning.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperRectangle {
    pub min: Vec<f32>,
    pub max: Vec<f32>,
}

impl BoundingGeometry for HyperRectangle {
    fn empty(dimension: usize) -> Self {
        return Self {
            min: vec![f32::INFINITY; dimension],
            max: vec![f32::NEG_INFINITY; dimension],
        };
    }

    fn dimension(&self) -> usize {
        return self.min.len();
    }

    fn expand(&mut self, point: &[f32]) {
        for i in 0..self.min.len() {
            if point[i] < self.min[i] {
                self.min[i] = point[i];
            }
            if point[i] > self.max[i] {
                self.max[i] = point[i];
            }
        }
    }

    fn merge(&mut self, other: &Self) {
        for i in 0..self.min.len() {
            if other.min[i] < self.min[i] {
                self.min[i] = other.min[i];
            }
            if other.max[i] > self.max[i] {
                self.max[i] = other.max[i];
            }
        }
    }

    fn contains(&self, point: &[f32]) -> bool {
        for i in 0..self.min.len() {
            if point[i] < self.min[i] || point[i] > self.max[i] {
                return false;
            }
        }
        return true;
    }

    fn min_dist(&self, query: &[f32]) -> f32 {
        let mut sum: f32 = 0.0;

        for i in 0..self.min.len() {
            let excess = if query[i] < self.min[i] {
                self.min[i] - query[i]
            } else if query[i] > self.max[i] {
                query[i] - self.max[i]
            } else {
                0.0
            };
            sum += excess * excess;
        }

        return sum.sqrt();
    }

    fn encoded_size(dimension: usize) -> usize {
        return 2 * dimension * layout::COORD_SIZE;
    }

    fn encode(&self, buf: &mut [u8]) {
        let dimension = self.min.len();

        for i in 0..dimension {
            let start = i * layout::COORD_SIZE;
            BigEndian::write_f32(&mut buf[start..start + layout::COORD_SIZE], self.min[i]);
        }
        for i in 0..dimension {
            let start = (dimension + i) * layout::COORD_SIZE;
            BigEndian::write_f32(&mut buf[start..start + layout::COORD_SIZE], self.max[i]);
        }
    }

    fn decode(buf: &[u8], dimension: usize) -> Self {
        let mut min = Vec::with_capacity(dimension);
        let mut max = Vec::with_capacity(dimension);

        for i in 0..dimension {
            let start = i * layout::COORD_SIZE;
            min.push(BigEndian::read_f32(&buf[start..start + layout::COORD_SIZE]));
        }
        for i in 0..dimension {
            let start = (dimension + i) * layout::COORD_SIZE;
            max.push(BigEndian::read_f32(&buf[start..start + layout::COORD_SIZE]));
        }

        return Self { min, max };
    }
}
