use std::num::NonZero;

use kiddo::{immutable::float::kdtree::ImmutableKdTree, SquaredEuclidean};

/// Leaf size of the k-d tree.
const BUCKET_SIZE: usize = 256;

/// A neighbor returned by a spatial query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Index of the point in the indexed set.
    pub index: usize,
    /// Squared euclidean distance to the query.
    pub distance_squared: f64,
}

/// Nearest-neighbor queries over an immutable set of points.
///
/// Implementations are shared read-only across worker threads.
pub trait SpatialIndex: Sync {
    /// The indexed points.
    fn points(&self) -> &[[f64; 3]];

    /// Number of indexed points.
    fn len(&self) -> usize {
        self.points().len()
    }

    /// Whether the index holds no point.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The closest indexed point, `None` for an empty index or a non-finite query.
    fn nearest(&self, query: &[f64; 3]) -> Option<Neighbor>;

    /// Up to `k` closest indexed points sorted by increasing distance.
    fn nearest_k(&self, query: &[f64; 3], k: usize) -> Vec<Neighbor>;
}

/// A k-d tree backed index.
pub struct KdTreeIndex {
    points: Vec<[f64; 3]>,
    tree: Option<ImmutableKdTree<f64, u32, 3, BUCKET_SIZE>>,
}

impl KdTreeIndex {
    /// Build the index over a set of valid points.
    pub fn new(points: Vec<[f64; 3]>) -> Self {
        let tree = (!points.is_empty()).then(|| ImmutableKdTree::new_from_slice(&points));
        Self { points, tree }
    }
}

impl std::fmt::Debug for KdTreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdTreeIndex")
            .field("len", &self.points.len())
            .finish()
    }
}

impl SpatialIndex for KdTreeIndex {
    fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    fn nearest(&self, query: &[f64; 3]) -> Option<Neighbor> {
        let tree = self.tree.as_ref()?;
        if !query.iter().all(|v| v.is_finite()) {
            return None;
        }
        let nn = tree.nearest_one::<SquaredEuclidean>(query);
        Some(Neighbor {
            index: nn.item as usize,
            distance_squared: nn.distance,
        })
    }

    fn nearest_k(&self, query: &[f64; 3], k: usize) -> Vec<Neighbor> {
        let (Some(tree), Some(k)) = (self.tree.as_ref(), NonZero::new(k)) else {
            return Vec::new();
        };
        if !query.iter().all(|v| v.is_finite()) {
            return Vec::new();
        }
        tree.nearest_n::<SquaredEuclidean>(query, k)
            .into_iter()
            .map(|nn| Neighbor {
                index: nn.item as usize,
                distance_squared: nn.distance,
            })
            .collect()
    }
}

/// Exhaustive search, used as a reference and for tiny clouds.
#[derive(Debug, Clone)]
pub struct BruteForceIndex {
    points: Vec<[f64; 3]>,
}

impl BruteForceIndex {
    /// Build the index over a set of valid points.
    pub fn new(points: Vec<[f64; 3]>) -> Self {
        Self { points }
    }

    fn distances<'a>(&'a self, query: &'a [f64; 3]) -> impl Iterator<Item = Neighbor> + 'a {
        self.points.iter().enumerate().map(move |(index, p)| Neighbor {
            index,
            distance_squared: squared_distance(p, query),
        })
    }
}

impl SpatialIndex for BruteForceIndex {
    fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    fn nearest(&self, query: &[f64; 3]) -> Option<Neighbor> {
        if !query.iter().all(|v| v.is_finite()) {
            return None;
        }
        self.distances(query)
            .min_by(|a, b| a.distance_squared.total_cmp(&b.distance_squared))
    }

    fn nearest_k(&self, query: &[f64; 3], k: usize) -> Vec<Neighbor> {
        if k == 0 || !query.iter().all(|v| v.is_finite()) {
            return Vec::new();
        }
        let mut all = self.distances(query).collect::<Vec<_>>();
        all.sort_by(|a, b| {
            a.distance_squared
                .total_cmp(&b.distance_squared)
                .then(a.index.cmp(&b.index))
        });
        all.truncate(k);
        all
    }
}

#[inline]
pub(crate) fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}
