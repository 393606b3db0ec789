//! CART decision tree for binary labels.
//!
//! Nodes live in a flat arena so serialized trees stay shallow JSON
//! regardless of depth.

use claim_processing::Criterion;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeSettings {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub criterion: Criterion,
    /// Candidate features examined per split.
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Share of positive training samples that reached this leaf.
    Leaf { probability: f64, samples: usize },
    /// `row[feature] <= threshold` goes left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

/// Impurity of a node with `positives` out of `total` samples.
pub fn impurity(criterion: Criterion, positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    let q = 1.0 - p;
    match criterion {
        Criterion::Gini => 1.0 - p * p - q * q,
        Criterion::Entropy => {
            let term = |v: f64| if v > 0.0 { -v * v.log2() } else { 0.0 };
            term(p) + term(q)
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    settings: &'a TreeSettings,
    n_features: usize,
    nodes: Vec<Node>,
}

impl Builder<'_> {
    fn positives(&self, indices: &[usize]) -> usize {
        indices.iter().filter(|&&i| self.y[i] == 1).count()
    }

    fn leaf(&mut self, indices: &[usize]) -> usize {
        let samples = indices.len();
        let probability = if samples == 0 {
            0.0
        } else {
            self.positives(indices) as f64 / samples as f64
        };
        self.nodes.push(Node::Leaf {
            probability,
            samples,
        });
        self.nodes.len() - 1
    }

    fn best_split(&self, indices: &[usize], rng: &mut StdRng) -> Option<BestSplit> {
        let n = indices.len();
        let total_pos = self.positives(indices);
        let min_leaf = self.settings.min_samples_leaf.max(1);
        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();
        let mut visited = 0;

        // Constant features do not count toward max_features.
        for feature in sample(rng, self.n_features, self.n_features).into_iter() {
            if visited >= self.settings.max_features {
                break;
            }
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
            let first = self.x[sorted[0]][feature];
            let last = self.x[sorted[n - 1]][feature];
            if first >= last {
                continue;
            }
            visited += 1;

            let mut left_pos = 0usize;
            for k in 1..n {
                left_pos += usize::from(self.y[sorted[k - 1]] == 1);
                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let lo = self.x[sorted[k - 1]][feature];
                let hi = self.x[sorted[k]][feature];
                if lo >= hi {
                    continue;
                }

                let left = impurity(self.settings.criterion, left_pos, k);
                let right = impurity(self.settings.criterion, total_pos - left_pos, n - k);
                let score = (k as f64 * left + (n - k) as f64 * right) / n as f64;
                if best.as_ref().is_none_or(|b| score < b.score) {
                    best = Some(BestSplit {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                        score,
                    });
                }
            }
        }

        best
    }

    fn grow(&mut self, indices: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let n = indices.len();
        let positives = self.positives(&indices);
        if depth >= self.settings.max_depth
            || n < self.settings.min_samples_split
            || positives == 0
            || positives == n
        {
            return self.leaf(&indices);
        }

        let parent = impurity(self.settings.criterion, positives, n);
        let Some(split) = self.best_split(&indices, rng) else {
            return self.leaf(&indices);
        };
        if split.score >= parent - 1e-12 {
            return self.leaf(&indices);
        }

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        // Reserve the slot; children are appended after it.
        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf {
            probability: 0.0,
            samples: n,
        });
        let left = self.grow(left_idx, depth + 1, rng);
        let right = self.grow(right_idx, depth + 1, rng);
        self.nodes[slot] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        slot
    }
}

impl DecisionTree {
    /// Grow a tree on the rows of `x` selected by `indices` (repeats allowed).
    ///
    /// Callers guarantee `x` is non-empty and rectangular and `y` is binary.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        indices: Vec<usize>,
        settings: &TreeSettings,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let settings = TreeSettings {
            max_features: settings.max_features.clamp(1, n_features.max(1)),
            ..*settings
        };
        let mut builder = Builder {
            x,
            y,
            settings: &settings,
            n_features,
            nodes: Vec::new(),
        };
        if n_features == 0 {
            builder.leaf(&indices);
        } else {
            builder.grow(indices, 0, rng);
        }
        Self {
            nodes: builder.nodes,
        }
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(Node::Leaf { probability, .. }) => return *probability,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = row.get(*feature).copied().unwrap_or(f64::NAN);
                    index = if value <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf; a single leaf has depth 0.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match nodes.get(index) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    /// Check child links point forward inside the arena.
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                Node::Leaf { probability, .. } => (0.0..=1.0).contains(probability),
                Node::Split { left, right, .. } => {
                    *left > i && *right > i && *left < self.nodes.len() && *right < self.nodes.len()
                }
            })
    }

    /// Count how often each feature is used to split.
    pub(crate) fn split_counts(&self, counts: &mut [usize]) {
        for node in &self.nodes {
            if let Node::Split { feature, .. } = node {
                if let Some(count) = counts.get_mut(*feature) {
                    *count += 1;
                }
            }
        }
    }
}
