//! Delivery-chain reconstruction.
//!
//! # Responsibility
//! - Rebuild the branching forest of delivery paths from a flat,
//!   storage-ordered knot sequence.
//! - Track each knot's position inside its branch so later links can be
//!   resolved against the current branch tails.
//!
//! # Invariants
//! - Reconstruction is pure and idempotent: the same input sequence always
//!   yields the same branch sequence, points in order.
//! - Branch count equals origin count plus fork count (links whose source
//!   sits mid-branch rather than at a tail).
//! - A link whose source has not been positioned is reported as an
//!   orphaned edge and dropped from the forest; it never aborts the run.

use crate::model::geo::LatLng;
use crate::model::knot::{Knot, KnotId};
use std::collections::HashMap;

/// Where a knot's destination landed inside the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchPosition {
    /// Index into [`ChainForest::branches`].
    pub branch: usize,
    /// Index of the point within that branch.
    pub index: usize,
}

/// A link that referenced a source no processed knot provided. The caller
/// decides whether to surface or ignore these; display simply omits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrphanedEdge {
    pub knot: KnotId,
    pub missing_source: KnotId,
}

/// Reconstruction output: ordered polylines for rendering plus the edges
/// that could not be attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainForest {
    pub branches: Vec<Vec<LatLng>>,
    pub orphans: Vec<OrphanedEdge>,
}

impl ChainForest {
    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }
}

/// Incremental forest builder. Feed knots in storage order; every knot must
/// appear after the knot it references as `source` for the edge to attach.
#[derive(Debug, Default)]
pub struct ChainBuilder {
    branches: Vec<Vec<LatLng>>,
    positions: HashMap<KnotId, BranchPosition>,
    orphans: Vec<OrphanedEdge>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one knot.
    ///
    /// Origins open a new single-point branch. Links attach to their
    /// source's position: at a branch tail the destination is appended in
    /// place; mid-branch (the source was already extended by an earlier
    /// link, i.e. a fork) a new branch is seeded with the source point and
    /// the destination, leaving the shared history untouched.
    pub fn insert(&mut self, knot: &Knot) {
        let destination = knot.destination.lat_lng();

        if knot.is_origin {
            let branch = self.branches.len();
            self.branches.push(vec![destination]);
            self.positions
                .insert(knot.id, BranchPosition { branch, index: 0 });
            return;
        }

        // Validated non-origin knots always carry a source.
        let source_id = match knot.source {
            Some(id) => id,
            None => return,
        };

        let source_pos = match self.positions.get(&source_id) {
            Some(pos) => *pos,
            None => {
                self.orphans.push(OrphanedEdge {
                    knot: knot.id,
                    missing_source: source_id,
                });
                return;
            }
        };

        let at_tail = source_pos.index == self.branches[source_pos.branch].len() - 1;
        if at_tail {
            self.branches[source_pos.branch].push(destination);
            self.positions.insert(
                knot.id,
                BranchPosition {
                    branch: source_pos.branch,
                    index: source_pos.index + 1,
                },
            );
        } else {
            let fork_point = self.branches[source_pos.branch][source_pos.index];
            let branch = self.branches.len();
            self.branches.push(vec![fork_point, destination]);
            self.positions
                .insert(knot.id, BranchPosition { branch, index: 1 });
        }
    }

    /// Looks up where a processed knot's destination sits in the forest.
    pub fn position_of(&self, id: KnotId) -> Option<BranchPosition> {
        self.positions.get(&id).copied()
    }

    pub fn finish(self) -> ChainForest {
        ChainForest {
            branches: self.branches,
            orphans: self.orphans,
        }
    }
}

/// Reconstructs the full forest from a storage-ordered knot sequence.
pub fn reconstruct<'a, I>(knots: I) -> ChainForest
where
    I: IntoIterator<Item = &'a Knot>,
{
    let mut builder = ChainBuilder::new();
    for knot in knots {
        builder.insert(knot);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::{reconstruct, ChainBuilder};
    use crate::model::geo::GeoPoint;
    use crate::model::knot::{Knot, KnotId, KnotSubmission};
    use uuid::Uuid;

    fn point(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng, 10.0)
    }

    fn origin(lat: f64, lng: f64) -> Knot {
        let sub = KnotSubmission::origin("origin", point(lat, lng));
        Knot::try_from_submission(Uuid::new_v4(), sub).unwrap()
    }

    fn link(source: KnotId, lat: f64, lng: f64) -> Knot {
        let sub = KnotSubmission::link("hop", source, point(lat, lng));
        Knot::try_from_submission(Uuid::new_v4(), sub).unwrap()
    }

    #[test]
    fn single_origin_is_a_one_point_branch() {
        let forest = reconstruct([origin(1.0, 2.0)].iter());
        assert_eq!(forest.branch_count(), 1);
        assert_eq!(forest.branches[0].len(), 1);
        assert_eq!(forest.branches[0][0].lat, 1.0);
    }

    #[test]
    fn tail_links_extend_their_branch_in_place() {
        let root = origin(0.0, 0.0);
        let first = link(root.id, 1.0, 1.0);
        let second = link(first.id, 2.0, 2.0);
        let forest = reconstruct([root, first, second].iter());

        assert_eq!(forest.branch_count(), 1);
        let lats: Vec<f64> = forest.branches[0].iter().map(|p| p.lat).collect();
        assert_eq!(lats, vec![0.0, 1.0, 2.0]);
        assert!(forest.orphans.is_empty());
    }

    #[test]
    fn fork_at_mid_branch_seeds_a_new_branch_from_the_fork_point() {
        let root = origin(0.0, 0.0);
        let a = link(root.id, 1.0, 1.0);
        let b = link(a.id, 2.0, 2.0);
        // Second child of `a`, whose position is no longer the tail.
        let c = link(a.id, 3.0, 3.0);
        let forest = reconstruct([root, a, b, c].iter());

        assert_eq!(forest.branch_count(), 2);
        let fork: Vec<f64> = forest.branches[1].iter().map(|p| p.lat).collect();
        assert_eq!(fork, vec![1.0, 3.0]);
    }

    #[test]
    fn orphaned_links_are_reported_and_dropped() {
        let root = origin(0.0, 0.0);
        let stray = link(Uuid::new_v4(), 5.0, 5.0);
        let forest = reconstruct([root, stray.clone()].iter());

        assert_eq!(forest.branch_count(), 1);
        assert_eq!(forest.orphans.len(), 1);
        assert_eq!(forest.orphans[0].knot, stray.id);
    }

    #[test]
    fn position_tracks_the_growing_tail() {
        let root = origin(0.0, 0.0);
        let hop = link(root.id, 1.0, 1.0);

        let mut builder = ChainBuilder::new();
        builder.insert(&root);
        builder.insert(&hop);

        let root_pos = builder.position_of(root.id).unwrap();
        let hop_pos = builder.position_of(hop.id).unwrap();
        assert_eq!((root_pos.branch, root_pos.index), (0, 0));
        assert_eq!((hop_pos.branch, hop_pos.index), (0, 1));
        assert!(builder.position_of(Uuid::new_v4()).is_none());
    }
}
