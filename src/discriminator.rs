//! Point identity capability
//!
//! Decides whether two array slots represent the same logical point, so that
//! queries can exclude self-matches even when identities repeat in a dataset.

use crate::dataset::PointId;

pub trait IdentityDiscriminator {
    fn is_same(&self, a: PointId, b: PointId) -> bool;
}

///Treats equal identities as the same logical point
#[derive(Debug, Clone, Copy, Default)]
pub struct IdDiscriminator;

impl IdentityDiscriminator for IdDiscriminator {
    fn is_same(&self, a: PointId, b: PointId) -> bool {
        return a == b;
    }
}
