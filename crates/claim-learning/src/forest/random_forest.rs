//! Random forest: bootstrap-aggregated decision trees.

use super::Classifier;
use super::tree::{DecisionTree, TreeSettings};
use crate::error::TrainingError;
use claim_processing::ForestParams;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

fn check_training_data(x: &[Vec<f64>], y: &[u8]) -> Result<usize, TrainingError> {
    if x.is_empty() {
        return Err(TrainingError::EmptyTrainingSet);
    }
    if x.len() != y.len() {
        return Err(TrainingError::ShapeMismatch {
            rows: x.len(),
            labels: y.len(),
        });
    }
    let expected = x[0].len();
    if let Some((row, actual)) = x
        .iter()
        .map(Vec::len)
        .enumerate()
        .find(|(_, width)| *width != expected)
    {
        return Err(TrainingError::InconsistentWidth {
            row,
            expected,
            actual,
        });
    }
    if let Some(&label) = y.iter().find(|&&label| label > 1) {
        return Err(TrainingError::InvalidLabel(label));
    }
    Ok(expected)
}

impl RandomForest {
    /// Fit `params.n_estimators` trees, each on its own bootstrap sample.
    ///
    /// The same params and data always produce the same forest.
    pub fn fit(params: &ForestParams, x: &[Vec<f64>], y: &[u8]) -> Result<Self, TrainingError> {
        let n_features = check_training_data(x, y)?;
        let settings = TreeSettings {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            criterion: params.criterion,
            max_features: params.max_features.resolve(n_features),
        };

        let n = x.len();
        let mut seeder = StdRng::seed_from_u64(params.random_state);
        let trees: Vec<DecisionTree> = (0..params.n_estimators.max(1))
            .map(|_| {
                let mut rng = StdRng::seed_from_u64(seeder.next_u64());
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, y, sample, &settings, &mut rng)
            })
            .collect();

        debug!(
            "Fitted {} trees on {} rows x {} features (max_features {})",
            trees.len(),
            n,
            n_features,
            settings.max_features
        );
        Ok(Self { trees, n_features })
    }

    /// Mean positive-class probability across trees.
    pub fn predict_proba_row(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict_proba(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Share of splits that use each feature, summing to 1.0 when any split exists.
    pub fn split_frequencies(&self) -> Vec<f64> {
        let mut counts = vec![0usize; self.n_features];
        for tree in &self.trees {
            tree.split_counts(&mut counts);
        }
        let total: usize = counts.iter().sum();
        counts
            .into_iter()
            .map(|c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
            .collect()
    }

    /// Check a deserialized forest is usable.
    pub fn is_well_formed(&self) -> bool {
        !self.trees.is_empty() && self.n_features > 0 && self.trees.iter().all(DecisionTree::is_well_formed)
    }
}

impl Classifier for RandomForest {
    fn predict_row(&self, row: &[f64]) -> u8 {
        u8::from(self.predict_proba_row(row) > 0.5)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

static_assertions::assert_impl_all!(RandomForest: Send, Sync);
