//! Split selection capability for tree construction
//!
//! A pivoter looks at the points of a range and proposes an axis and value to
//! partition them. Returning `None` means no split separates the points (all
//! coordinates identical) and the range becomes a leaf. A returned split is
//! guaranteed to satisfy `min <= value < max` along the chosen axis, so both
//! sides of a `<= value` partition are non-empty.

use crate::dataset::BinaryDataset;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Split {
    pub axis: usize,
    pub value: f32,
}

pub trait Pivoter {
    fn select(&self, dataset: &BinaryDataset, members: &[u32]) -> Option<Split>;
}

///Axis with the widest spread, with per-pivoter choice of the value on it
fn widest_axis(dataset: &BinaryDataset, members: &[u32]) -> Option<(usize, f32, f32)> {
    let mut best: Option<(usize, f32, f32)> = None;

    for axis in 0..dataset.dimension() {
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;

        for &i in members {
            let value = dataset.coord(i as usize, axis);
            if value < lo {
                lo = value;
            }
            if value > hi {
                hi = value;
            }
        }

        let spread = hi - lo;
        let best_spread = match best {
            Some((_, blo, bhi)) => bhi - blo,
            None => f32::NEG_INFINITY,
        };

        if spread > best_spread {
            best = Some((axis, lo, hi));
        }
    }

    match best {
        Some((_, lo, hi)) if hi > lo => best,
        _ => None,
    }
}

///Splits the widest axis at the midpoint between its extremes
#[derive(Debug, Clone, Copy, Default)]
pub struct MidpointPivoter;

impl Pivoter for MidpointPivoter {
    fn select(&self, dataset: &BinaryDataset, members: &[u32]) -> Option<Split> {
        let (axis, lo, hi) = widest_axis(dataset, members)?;

        let mut value = lo + (hi - lo) / 2.0;
        //midpoint can round onto the maximum when the spread is tiny
        if value >= hi {
            value = lo;
        }

        return Some(Split { axis, value });
    }
}

///Splits the widest axis at the median of the member coordinates
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianPivoter;

impl Pivoter for MedianPivoter {
    fn select(&self, dataset: &BinaryDataset, members: &[u32]) -> Option<Split> {
        let (axis, lo, hi) = widest_axis(dataset, members)?;

        let mut values: Vec<f32> = members
            .iter()
            .map(|&i| dataset.coord(i as usize, axis))
            .collect();

        //because f32 doesn't like being compared
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let mut value = match values.len() % 2 {
            0 => {
                let idx_b: usize = values.len() / 2;
                let idx_a = idx_b - 1;

                (values[idx_a] + values[idx_b]) / 2.0
            }
            _ => values[values.len() / 2],
        };

        //a median equal to the maximum would leave the right side empty
        if value >= hi {
            value = lo;
        }

        return Some(Split { axis, value });
    }
}
