//! Tree construction and querying
//!
//! The engine partitions a fixed dataset into a strict binary tree and
//! answers exact nearest-neighbor and range queries against it. Construction
//! never moves the caller's points; it permutes an index array instead, so a
//! leaf is a contiguous range of that permutation. The same partitioning
//! logic runs either depth-first (recursive) or breadth-first (level-order
//! work queue); the two strategies produce identical per-point leaf
//! assignments for the same pivot decisions.

use crate::arena::NodeArena;
use crate::bounds::{BoundingGeometry, HyperRectangle};
use crate::dataset::{BinaryDataset, PointId, PointRef};
use crate::discriminator::{IdDiscriminator, IdentityDiscriminator};
use crate::error::Error;
use crate::metric::{EuclideanMetric, Metric};
use crate::node::{Node, NodeKind, NodeOffset};
use crate::pivot::{MidpointPivoter, Pivoter, Split};
use crate::results::{NNResult, ResultWriter};
use crate::stats::{NodeStatistics, NullStatistics};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::Path;

//slots reserved per query point before a range batch starts growing its map
const RANGE_RESERVE_PER_POINT: usize = 32;

///Capability bundle the engine is generic over
pub trait Capabilities {
    type Metric: Metric + Default;
    type Bounds: BoundingGeometry;
    type Pivoter: Pivoter + Default;
    type Stats: NodeStatistics;
    type Discriminator: IdentityDiscriminator + Default;
}

///Euclidean distance, axis-aligned boxes, widest-axis midpoint splits
#[derive(Debug, Clone, Copy)]
pub struct EuclideanKd;

impl Capabilities for EuclideanKd {
    type Metric = EuclideanMetric;
    type Bounds = HyperRectangle;
    type Pivoter = MidpointPivoter;
    type Stats = NullStatistics;
    type Discriminator = IdDiscriminator;
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TreeConfig {
    ///Ranges at or below this size become leaves
    pub leaf_capacity: usize,
    ///Node slots to provision; defaults to the strict-binary-tree bound of 2N
    pub arena_capacity: Option<usize>,
}

impl TreeConfig {
    pub fn default() -> Self {
        return Self {
            leaf_capacity: 16,
            arena_capacity: None,
        };
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let serialized =
            std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

        return serde_yaml::from_str(&serialized)
            .map_err(|e| Error::Corrupt(format!("{}: {}", path.display(), e)));
    }

    pub fn to_file(&self, path: &Path) -> Result<(), Error> {
        let serialized = serde_yaml::to_string(&self)
            .map_err(|e| Error::Corrupt(format!("{}: {}", path.display(), e)))?;

        let mut file = File::create(path).map_err(|e| Error::io(path, e))?;
        file.write_all(serialized.as_bytes())
            .map_err(|e| Error::io(path, e))?;

        Ok(())
    }
}

///A single query answer: how far, which identity, which array position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f32,
    pub id: PointId,
    pub index: usize,
}

///Keeps the k closest candidates seen so far
///
///Stored ascending by distance; a candidate only displaces the current worst
///once the list is full, so the bound tightens monotonically as leaves are
///visited.
#[derive(Debug)]
pub struct TopHits {
    max_length: usize,
    entries: Vec<Neighbor>,
}

impl TopHits {
    pub fn new(max_length: usize) -> Self {
        return Self {
            max_length,
            entries: Vec::with_capacity(max_length),
        };
    }

    ///The k-th best distance, or infinity while the list is short of k
    pub fn bound(&self) -> f32 {
        if self.entries.len() < self.max_length {
            return f32::INFINITY;
        }
        return self.entries[self.max_length - 1].distance;
    }

    ///To be called on every record under consideration as a neighbor
    pub fn try_add(&mut self, candidate: Neighbor) {
        if candidate.distance >= self.bound() {
            return;
        }

        //find insertion point; ties land after their equals
        let at = self
            .entries
            .iter()
            .position(|e| e.distance > candidate.distance)
            .unwrap_or(self.entries.len());

        self.entries.insert(at, candidate);
        self.entries.truncate(self.max_length);
    }

    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    pub fn into_sorted(self) -> Vec<Neighbor> {
        return self.entries;
    }
}

///Binary space-partitioning tree over a borrowed dataset
///
///Built exactly once, via one of the two strategies, and immutable
///afterwards. Dropping the tree releases the arena; the dataset belongs to
///the caller throughout.
pub struct BinaryTree<'a, T: Capabilities> {
    dataset: &'a BinaryDataset,
    config: TreeConfig,
    arena: NodeArena<T::Bounds, T::Stats>,
    order: Vec<u32>,
    root: Option<NodeOffset>,
    metric: T::Metric,
    pivoter: T::Pivoter,
    discriminator: T::Discriminator,
}

impl<'a, T: Capabilities> BinaryTree<'a, T> {
    pub fn new(dataset: &'a BinaryDataset, config: TreeConfig) -> Result<Self, Error> {
        if dataset.is_empty() {
            return Err(Error::EmptyDataset);
        }

        //a strict binary tree with non-empty leaves has at most 2N - 1 nodes
        let capacity = config.arena_capacity.unwrap_or(2 * dataset.num_points());
        let arena = NodeArena::with_capacity(capacity, dataset.dimension());

        return Ok(Self {
            dataset,
            config,
            arena,
            order: (0..dataset.num_points() as u32).collect(),
            root: None,
            metric: T::Metric::default(),
            pivoter: T::Pivoter::default(),
            discriminator: T::Discriminator::default(),
        });
    }

    pub fn num_points(&self) -> usize {
        return self.dataset.num_points();
    }

    pub fn dimension(&self) -> usize {
        return self.dataset.dimension();
    }

    pub fn num_nodes(&self) -> usize {
        return self.arena.len();
    }

    pub fn root(&self) -> Option<NodeOffset> {
        return self.root;
    }

    pub fn arena(&self) -> &NodeArena<T::Bounds, T::Stats> {
        return &self.arena;
    }

    pub fn max_depth(&self) -> usize {
        let root = match self.root {
            Some(root) => root,
            None => return 0,
        };

        let mut deepest = 0;
        let mut stack = vec![(root, 1usize)];

        while let Some((offset, depth)) = stack.pop() {
            let node = match self.arena.get(offset) {
                Ok(node) => node,
                Err(_) => continue,
            };
            match node.kind {
                NodeKind::Leaf { .. } => {
                    if depth > deepest {
                        deepest = depth;
                    }
                }
                NodeKind::Internal { left, right } => {
                    stack.push((left, depth + 1));
                    stack.push((right, depth + 1));
                }
            }
        }

        return deepest;
    }

    ///Builds the tree by recursing into each half of a split before touching
    ///the other, computing bounds and statistics bottom-up on the way out
    pub fn build_depth_first(&mut self) -> Result<(), Error> {
        if self.root.is_some() {
            return Err(Error::AlreadyBuilt);
        }

        let root = self.build_range(0, self.order.len())?;
        self.root = Some(root);

        info!(
            "depth-first build over {} points: {} nodes, depth {}",
            self.num_points(),
            self.num_nodes(),
            self.max_depth()
        );

        Ok(())
    }

    ///Builds the tree level by level off a work queue
    ///
    ///Same partitioning logic as the depth-first strategy, but expansion
    ///order is breadth-first and nothing depends on recursion depth. Sibling
    ///ranges at a level share no state beyond the arena's allocation cursor,
    ///which is what a parallel build would need to coordinate on.
    pub fn build_breadth_first(&mut self) -> Result<(), Error> {
        if self.root.is_some() {
            return Err(Error::AlreadyBuilt);
        }

        let root = {
            let placeholder = self.placeholder_node();
            self.arena.alloc(placeholder)?
        };

        let mut queue: VecDeque<(usize, usize, NodeOffset)> = VecDeque::new();
        queue.push_back((0, self.order.len(), root));

        while let Some((start, end, slot)) = queue.pop_front() {
            let count = end - start;

            let split = self.select_split(start, end);

            let mut kind = None;
            if let Some(split) = split {
                let mid = self.partition(start, end, &split);
                if mid > start && mid < end {
                    let left = {
                        let placeholder = self.placeholder_node();
                        self.arena.alloc(placeholder)?
                    };
                    let right = {
                        let placeholder = self.placeholder_node();
                        self.arena.alloc(placeholder)?
                    };
                    queue.push_back((start, mid, left));
                    queue.push_back((mid, end, right));
                    kind = Some(NodeKind::Internal { left, right });
                }
            }

            let bounds = self.range_bounds(start, end);
            let node = self.arena.get_mut(slot)?;
            node.bounds = bounds;
            node.count = count;
            node.kind = kind.unwrap_or(NodeKind::Leaf { start, end });
        }

        //children always sit at higher offsets than their parent, so one
        //reverse sweep recomputes statistics bottom-up
        for i in (0..self.arena.len()).rev() {
            let offset = NodeOffset(i);
            let stats = match self.arena.get(offset)?.kind {
                NodeKind::Leaf { start, end } => {
                    T::Stats::from_points(self.dataset, &self.order[start..end])
                }
                NodeKind::Internal { left, right } => {
                    T::Stats::merge(&self.arena.get(left)?.stats, &self.arena.get(right)?.stats)
                }
            };
            self.arena.get_mut(offset)?.stats = stats;
        }

        self.root = Some(root);

        info!(
            "breadth-first build over {} points: {} nodes, depth {}",
            self.num_points(),
            self.num_nodes(),
            self.max_depth()
        );

        Ok(())
    }

    fn build_range(&mut self, start: usize, end: usize) -> Result<NodeOffset, Error> {
        if let Some(split) = self.select_split(start, end) {
            let mid = self.partition(start, end, &split);
            if mid > start && mid < end {
                let left = self.build_range(start, mid)?;
                let right = self.build_range(mid, end)?;

                let (bounds, count, stats) = {
                    let left_node = self.arena.get(left)?;
                    let right_node = self.arena.get(right)?;

                    let mut bounds = left_node.bounds.clone();
                    bounds.merge(&right_node.bounds);

                    (
                        bounds,
                        left_node.count + right_node.count,
                        T::Stats::merge(&left_node.stats, &right_node.stats),
                    )
                };

                return self
                    .arena
                    .alloc(Node::internal(bounds, left, right, count, stats));
            }
            //a split that failed to separate the range degrades to a leaf
        }

        let bounds = self.range_bounds(start, end);
        let stats = T::Stats::from_points(self.dataset, &self.order[start..end]);
        return self.arena.alloc(Node::leaf(bounds, start, end, stats));
    }

    fn select_split(&self, start: usize, end: usize) -> Option<Split> {
        if end - start <= self.config.leaf_capacity {
            return None;
        }
        return self.pivoter.select(self.dataset, &self.order[start..end]);
    }

    ///Stable two-pass partition of the range; returns the first right-side slot
    fn partition(&mut self, start: usize, end: usize, split: &Split) -> usize {
        let mut left: Vec<u32> = Vec::with_capacity(end - start);
        let mut right: Vec<u32> = Vec::with_capacity(end - start);

        for &i in &self.order[start..end] {
            if self.dataset.coord(i as usize, split.axis) <= split.value {
                left.push(i);
            } else {
                right.push(i);
            }
        }

        let mid = start + left.len();
        self.order[start..mid].copy_from_slice(&left);
        self.order[mid..end].copy_from_slice(&right);

        return mid;
    }

    fn range_bounds(&self, start: usize, end: usize) -> T::Bounds {
        let mut bounds = T::Bounds::empty(self.dimension());
        for &i in &self.order[start..end] {
            bounds.expand(self.dataset.coords(i as usize));
        }
        return bounds;
    }

    fn placeholder_node(&self) -> Node<T::Bounds, T::Stats> {
        return Node::leaf(
            T::Bounds::empty(self.dimension()),
            0,
            0,
            T::Stats::default(),
        );
    }

    fn check_query(&self, query: &PointRef<'_>) -> Result<NodeOffset, Error> {
        if query.coords.len() != self.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.dimension(),
                found: query.coords.len(),
            });
        }
        return self.root.ok_or(Error::TreeNotBuilt);
    }

    ///The k nearest neighbors of `query`, ascending by distance
    ///
    ///Self-matches are excluded through the discriminator; fewer than k
    ///neighbors come back when the dataset has fewer to give.
    pub fn nearest_neighbors(
        &self,
        query: &PointRef<'_>,
        k: usize,
    ) -> Result<Vec<Neighbor>, Error> {
        if k == 0 {
            return Err(Error::ZeroNeighbors);
        }
        let root = self.check_query(query)?;

        let mut hits = TopHits::new(k);
        let mut stack: Vec<NodeOffset> = vec![root];

        while let Some(offset) = stack.pop() {
            let node = self.arena.get(offset)?;

            //the subtree cannot beat the current k-th best
            if node.bounds.min_dist(query.coords) >= hits.bound() {
                continue;
            }

            match node.kind {
                NodeKind::Leaf { start, end } => {
                    for &i in &self.order[start..end] {
                        let candidate = self.dataset.point(i as usize);
                        if self.discriminator.is_same(query.id, candidate.id) {
                            continue;
                        }
                        let distance = self.metric.distance(query.coords, candidate.coords);
                        hits.try_add(Neighbor {
                            distance,
                            id: candidate.id,
                            index: i as usize,
                        });
                    }
                }
                NodeKind::Internal { left, right } => {
                    let left_dist = self.arena.get(left)?.bounds.min_dist(query.coords);
                    let right_dist = self.arena.get(right)?.bounds.min_dist(query.coords);

                    //nearer child is popped first to tighten the bound early;
                    //ties descend left
                    if left_dist <= right_dist {
                        stack.push(right);
                        stack.push(left);
                    } else {
                        stack.push(left);
                        stack.push(right);
                    }
                }
            }
        }

        return Ok(hits.into_sorted());
    }

    ///Every neighbor strictly within `radius` of `query`, in no promised order
    pub fn range_neighbors(
        &self,
        query: &PointRef<'_>,
        radius: f32,
    ) -> Result<Vec<Neighbor>, Error> {
        let root = self.check_query(query)?;

        let mut out: Vec<Neighbor> = Vec::new();
        let mut stack: Vec<NodeOffset> = vec![root];

        while let Some(offset) = stack.pop() {
            let node = self.arena.get(offset)?;

            if !node.bounds.overlaps_ball(query.coords, radius) {
                continue;
            }

            match node.kind {
                NodeKind::Leaf { start, end } => {
                    for &i in &self.order[start..end] {
                        let candidate = self.dataset.point(i as usize);
                        if self.discriminator.is_same(query.id, candidate.id) {
                            continue;
                        }
                        let distance = self.metric.distance(query.coords, candidate.coords);
                        if distance < radius {
                            out.push(Neighbor {
                                distance,
                                id: candidate.id,
                                index: i as usize,
                            });
                        }
                    }
                }
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }

        return Ok(out);
    }

    ///Runs the k-NN search for every point in point order and streams the
    ///records to `path`, exactly k slots per query
    pub fn all_pairs_nearest_neighbors(&self, path: &Path, k: usize) -> Result<(), Error> {
        if k == 0 {
            return Err(Error::ZeroNeighbors);
        }

        let n = self.num_points();
        if k > n - 1 {
            return Err(Error::NeighborCountExceedsDataset {
                requested: k,
                available: n - 1,
            });
        }
        self.root.ok_or(Error::TreeNotBuilt)?;

        let mut writer = ResultWriter::create(path, n * k)?;

        for i in 0..n {
            let query = self.dataset.point(i);
            let hits = self.nearest_neighbors(&query, k)?;

            for (j, neighbor) in hits.iter().enumerate() {
                writer.write(
                    i * k + j,
                    &NNResult {
                        point_id: query.id,
                        neighbor_id: neighbor.id,
                        distance: neighbor.distance,
                    },
                )?;
            }
        }

        info!(
            "all-pairs {}-nn over {} points wrote {} records to {}",
            k,
            n,
            writer.written(),
            path.display()
        );

        return writer.close();
    }

    ///Runs the range search for every point in point order and appends the
    ///variable number of records per query behind a running cursor
    pub fn all_pairs_range_neighbors(&self, path: &Path, radius: f32) -> Result<(), Error> {
        let n = self.num_points();
        self.root.ok_or(Error::TreeNotBuilt)?;

        let mut writer = ResultWriter::create(path, n * RANGE_RESERVE_PER_POINT)?;

        for i in 0..n {
            let query = self.dataset.point(i);

            for neighbor in self.range_neighbors(&query, radius)? {
                writer.append(&NNResult {
                    point_id: query.id,
                    neighbor_id: neighbor.id,
                    distance: neighbor.distance,
                })?;
            }
        }

        info!(
            "all-pairs range {} over {} points wrote {} records to {}",
            radius,
            n,
            writer.written(),
            path.display()
        );

        return writer.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ResultReader;
    use assert_approx_eq::assert_approx_eq;
    use kdam::tqdm;
    use std::collections::{HashMap, HashSet};

    type TestTree<'a> = BinaryTree<'a, EuclideanKd>;

    const NUM_POINTS: usize = 1000;
    const DIMENSION: usize = 2;
    const KNNS: usize = 40;
    const RANGE: f32 = 0.2;

    fn test_config() -> TreeConfig {
        return TreeConfig::default();
    }

    ///Brute-force neighbors of `query`, ascending, self excluded
    fn naive(dataset: &BinaryDataset, query: usize) -> Vec<(f32, PointId)> {
        let metric = EuclideanMetric;
        let q = dataset.point(query);

        let mut result: Vec<(f32, PointId)> = Vec::new();
        for i in 0..dataset.num_points() {
            if dataset.id(i) == q.id {
                continue;
            }
            result.push((metric.distance(q.coords, dataset.coords(i)), dataset.id(i)));
        }

        result.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        return result;
    }

    ///Checks the geometric invariants of every node below `offset` and
    ///returns the ids gathered from its leaves
    fn check_subtree(tree: &TestTree<'_>, offset: NodeOffset) -> Vec<u32> {
        let node = tree.arena.get(offset).unwrap();

        match node.kind {
            NodeKind::Leaf { start, end } => {
                assert!(end > start, "leaves are never empty");
                assert_eq!(node.count, end - start);

                for &i in &tree.order[start..end] {
                    assert!(node.bounds.contains(tree.dataset.coords(i as usize)));
                }

                return tree.order[start..end].to_vec();
            }
            NodeKind::Internal { left, right } => {
                let left_node = tree.arena.get(left).unwrap();
                let right_node = tree.arena.get(right).unwrap();

                assert_eq!(node.count, left_node.count + right_node.count);

                //the union of the children's boxes is exactly the parent's
                let mut union = left_node.bounds.clone();
                union.merge(&right_node.bounds);
                for axis in 0..tree.dimension() {
                    assert_approx_eq!(union.min[axis], node.bounds.min[axis], f32::EPSILON);
                    assert_approx_eq!(union.max[axis], node.bounds.max[axis], f32::EPSILON);
                }

                let mut members = check_subtree(tree, left);
                members.extend(check_subtree(tree, right));

                for &i in &members {
                    assert!(node.bounds.contains(tree.dataset.coords(i as usize)));
                }

                return members;
            }
        }
    }

    ///Maps every point id to the sorted ids sharing its leaf
    fn leaf_assignments(tree: &TestTree<'_>) -> HashMap<PointId, Vec<PointId>> {
        let mut map = HashMap::new();
        let mut stack = vec![tree.root.unwrap()];

        while let Some(offset) = stack.pop() {
            let node = tree.arena.get(offset).unwrap();
            match node.kind {
                NodeKind::Leaf { start, end } => {
                    let mut ids: Vec<PointId> = tree.order[start..end]
                        .iter()
                        .map(|&i| tree.dataset.id(i as usize))
                        .collect();
                    ids.sort();
                    for &id in &ids {
                        map.insert(id, ids.clone());
                    }
                }
                NodeKind::Internal { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }

        return map;
    }

    #[test]
    fn build_depth_first_holds_invariants() {
        for n in [1, 2, 17, NUM_POINTS] {
            let dataset = BinaryDataset::random(n, DIMENSION);
            let mut tree = TestTree::new(&dataset, test_config()).unwrap();
            tree.build_depth_first().unwrap();

            let root = tree.root().unwrap();
            assert_eq!(tree.arena.get(root).unwrap().count, n);
            assert!(tree.num_nodes() <= 2 * n);

            let mut members = check_subtree(&tree, root);
            members.sort();
            assert_eq!(members, (0..n as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn build_breadth_first_holds_invariants() {
        for n in [1, 2, 17, NUM_POINTS] {
            let dataset = BinaryDataset::random(n, DIMENSION);
            let mut tree = TestTree::new(&dataset, test_config()).unwrap();
            tree.build_breadth_first().unwrap();

            let root = tree.root().unwrap();
            assert_eq!(tree.arena.get(root).unwrap().count, n);

            let mut members = check_subtree(&tree, root);
            members.sort();
            assert_eq!(members, (0..n as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn build_strategies_agree_on_leaf_assignment() {
        let dataset = BinaryDataset::random(NUM_POINTS, DIMENSION);

        let mut depth_tree = TestTree::new(&dataset, test_config()).unwrap();
        depth_tree.build_depth_first().unwrap();

        let mut breadth_tree = TestTree::new(&dataset, test_config()).unwrap();
        breadth_tree.build_breadth_first().unwrap();

        assert_eq!(
            leaf_assignments(&depth_tree),
            leaf_assignments(&breadth_tree)
        );
    }

    #[test]
    fn build_twice_is_rejected() {
        let dataset = BinaryDataset::random(32, DIMENSION);
        let mut tree = TestTree::new(&dataset, test_config()).unwrap();

        tree.build_depth_first().unwrap();
        assert!(matches!(
            tree.build_breadth_first(),
            Err(Error::AlreadyBuilt)
        ));
    }

    #[test]
    fn degenerate_identical_points_build_a_leaf() {
        let mut dataset = BinaryDataset::new(100, DIMENSION);
        for i in 0..100 {
            dataset.set_coord(i, 0, 0.25);
            dataset.set_coord(i, 1, 0.25);
        }

        let mut tree = TestTree::new(&dataset, test_config()).unwrap();
        tree.build_depth_first().unwrap();

        //no valid split exists, so the whole range is one leaf
        assert_eq!(tree.num_nodes(), 1);

        let query = dataset.point(0);
        let hits = tree.nearest_neighbors(&query, 5).unwrap();
        assert_eq!(hits.len(), 5);
        for hit in hits {
            assert_eq!(hit.distance, 0.0);
        }
    }

    #[test]
    fn knn_matches_brute_force() {
        let _ = env_logger::builder().is_test(true).try_init();

        let dataset = BinaryDataset::random(NUM_POINTS, DIMENSION);
        let mut tree = TestTree::new(&dataset, test_config()).unwrap();
        tree.build_depth_first().unwrap();

        for i in tqdm!(0..NUM_POINTS) {
            let query = dataset.point(i);
            let hits = tree.nearest_neighbors(&query, KNNS).unwrap();
            let expected = naive(&dataset, i);

            assert_eq!(hits.len(), KNNS);
            for j in 0..KNNS {
                assert_approx_eq!(hits[j].distance, expected[j].0, f32::EPSILON);
                assert_eq!(hits[j].id, expected[j].1);
            }
        }
    }

    #[test]
    fn range_matches_brute_force() {
        let dataset = BinaryDataset::random(NUM_POINTS, DIMENSION);
        let mut tree = TestTree::new(&dataset, test_config()).unwrap();
        tree.build_breadth_first().unwrap();

        for i in 0..NUM_POINTS {
            let query = dataset.point(i);
            let hits = tree.range_neighbors(&query, RANGE).unwrap();

            //ties make positional comparison unspecified, so compare as sets
            let got: HashSet<PointId> = hits.iter().map(|h| h.id).collect();
            let expected: HashSet<PointId> = naive(&dataset, i)
                .into_iter()
                .take_while(|(d, _)| *d < RANGE)
                .map(|(_, id)| id)
                .collect();

            assert_eq!(got.len(), hits.len(), "no duplicate neighbors");
            assert_eq!(got, expected);
            for hit in hits {
                assert!(hit.distance < RANGE);
            }
        }
    }

    #[test]
    fn repeated_queries_are_idempotent() {
        let dataset = BinaryDataset::random(200, DIMENSION);
        let mut tree = TestTree::new(&dataset, test_config()).unwrap();
        tree.build_depth_first().unwrap();

        let query = dataset.point(17);

        let first = tree.nearest_neighbors(&query, 10).unwrap();
        let second = tree.nearest_neighbors(&query, 10).unwrap();
        assert_eq!(first, second);

        let first = tree.range_neighbors(&query, RANGE).unwrap();
        let second = tree.range_neighbors(&query, RANGE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn knn_larger_than_dataset_returns_all() {
        let dataset = BinaryDataset::random(10, DIMENSION);
        let mut tree = TestTree::new(&dataset, test_config()).unwrap();
        tree.build_depth_first().unwrap();

        let query = dataset.point(0);
        let hits = tree.nearest_neighbors(&query, 40).unwrap();

        assert_eq!(hits.len(), 9);
        for j in 1..hits.len() {
            assert!(hits[j - 1].distance <= hits[j].distance);
        }
    }

    #[test]
    fn single_point_dataset_has_no_neighbors() {
        let dataset = BinaryDataset::random(1, DIMENSION);
        let mut tree = TestTree::new(&dataset, test_config()).unwrap();
        tree.build_depth_first().unwrap();

        let query = dataset.point(0);
        assert!(tree.nearest_neighbors(&query, 5).unwrap().is_empty());
        assert!(tree.range_neighbors(&query, RANGE).unwrap().is_empty());
    }

    #[test]
    fn invalid_inputs_fail_fast() {
        let empty = BinaryDataset::new(0, DIMENSION);
        assert!(matches!(
            TestTree::new(&empty, test_config()),
            Err(Error::EmptyDataset)
        ));

        let dataset = BinaryDataset::random(10, DIMENSION);
        let mut tree = TestTree::new(&dataset, test_config()).unwrap();

        let query = dataset.point(0);
        assert!(matches!(
            tree.nearest_neighbors(&query, 5),
            Err(Error::TreeNotBuilt)
        ));

        tree.build_depth_first().unwrap();
        assert!(matches!(
            tree.nearest_neighbors(&query, 0),
            Err(Error::ZeroNeighbors)
        ));

        let short = vec![0.0f32; 1];
        let bad_query = PointRef {
            coords: &short,
            id: 0,
        };
        assert!(matches!(
            tree.nearest_neighbors(&bad_query, 5),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn all_pairs_knn_matches_brute_force() {
        let _ = env_logger::builder().is_test(true).try_init();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allnn");

        let dataset = BinaryDataset::random(NUM_POINTS, DIMENSION);
        let mut tree = TestTree::new(&dataset, test_config()).unwrap();
        tree.build_breadth_first().unwrap();

        tree.all_pairs_nearest_neighbors(&path, KNNS).unwrap();

        let reader = ResultReader::open(&path).unwrap();
        assert_eq!(reader.len(), NUM_POINTS * KNNS);

        let mut records = reader.records();
        records.sort_by(|a, b| {
            a.point_id
                .cmp(&b.point_id)
                .then(a.distance.partial_cmp(&b.distance).unwrap())
        });

        for i in tqdm!(0..NUM_POINTS) {
            let block = &records[i * KNNS..(i + 1) * KNNS];
            let point = dataset.find_by_id(block[0].point_id).unwrap();
            let expected = naive(&dataset, point);

            for j in 0..KNNS {
                assert_eq!(block[j].point_id, dataset.id(point));
                assert_approx_eq!(block[j].distance, expected[j].0, f32::EPSILON);
                assert_eq!(block[j].neighbor_id, expected[j].1);
            }
        }
    }

    #[test]
    fn all_pairs_range_matches_brute_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allrange");

        let dataset = BinaryDataset::random(NUM_POINTS, DIMENSION);
        let mut tree = TestTree::new(&dataset, test_config()).unwrap();
        tree.build_breadth_first().unwrap();

        tree.all_pairs_range_neighbors(&path, RANGE).unwrap();

        let reader = ResultReader::open(&path).unwrap();

        let mut by_point: HashMap<PointId, HashSet<PointId>> = HashMap::new();
        for record in reader.records() {
            assert!(record.distance < RANGE);
            by_point
                .entry(record.point_id)
                .or_insert_with(HashSet::new)
                .insert(record.neighbor_id);
        }

        for i in 0..NUM_POINTS {
            let expected: HashSet<PointId> = naive(&dataset, i)
                .into_iter()
                .take_while(|(d, _)| *d < RANGE)
                .map(|(_, id)| id)
                .collect();

            let got = by_point.remove(&dataset.id(i)).unwrap_or_default();
            assert_eq!(got, expected, "range mismatch for point {}", i);
        }

        assert!(by_point.is_empty());
    }

    #[test]
    fn all_pairs_knn_rejects_oversized_k() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allnn");

        let dataset = BinaryDataset::random(10, DIMENSION);
        let mut tree = TestTree::new(&dataset, test_config()).unwrap();
        tree.build_depth_first().unwrap();

        assert!(matches!(
            tree.all_pairs_nearest_neighbors(&path, 10),
            Err(Error::NeighborCountExceedsDataset { .. })
        ));
    }

    #[test]
    fn five_nearest_of_first_point_match_pairwise_distances() {
        let dataset = BinaryDataset::random(NUM_POINTS, DIMENSION);
        let mut tree = TestTree::new(&dataset, test_config()).unwrap();
        tree.build_depth_first().unwrap();

        let query = dataset.point(0);
        let hits = tree.nearest_neighbors(&query, 5).unwrap();

        //independently computed pairwise distances from point 0
        let metric = EuclideanMetric;
        let mut pairwise: Vec<(f32, PointId)> = (1..NUM_POINTS)
            .map(|i| (metric.distance(query.coords, dataset.coords(i)), dataset.id(i)))
            .collect();
        pairwise.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        assert_eq!(hits.len(), 5);
        for j in 0..5 {
            assert_eq!(hits[j].id, pairwise[j].1);
            assert_approx_eq!(hits[j].distance, pairwise[j].0, f32::EPSILON);
        }
    }

    #[test]
    fn quick_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = TreeConfig::default();
        config.leaf_capacity = 64;
        config.arena_capacity = Some(4096);
        config.to_file(&path).unwrap();

        let reloaded = TreeConfig::from_file(&path).unwrap();
        assert_eq!(reloaded.leaf_capacity, 64);
        assert_eq!(reloaded.arena_capacity, Some(4096));
    }

    #[test]
    fn quick_top_hits_orders_and_truncates() {
        let mut hits = TopHits::new(3);
        assert_eq!(hits.bound(), f32::INFINITY);

        for (distance, id) in [(0.5, 1u64), (0.25, 2), (0.75, 3), (0.1, 4), (0.6, 5)] {
            hits.try_add(Neighbor {
                distance,
                id,
                index: id as usize,
            });
        }

        assert_eq!(hits.len(), 3);
        assert_eq!(hits.bound(), 0.5);

        let sorted = hits.into_sorted();
        let ids: Vec<u64> = sorted.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![4, 2, 1]);
    }
}
