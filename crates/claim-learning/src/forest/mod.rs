//! Tree-based binary classification.
//!
//! - [`DecisionTree`]: CART tree grown on a bootstrap sample
//! - [`RandomForest`]: bagged trees with per-split feature subsampling
//! - [`ClassificationMetrics`]: accuracy, precision, recall and F1 for binary labels

mod metrics;
mod random_forest;
mod tree;

pub use metrics::ClassificationMetrics;
pub use random_forest::RandomForest;
pub use tree::{DecisionTree, Node, TreeSettings, impurity};

/// A fitted binary classifier over fixed-width feature rows.
pub trait Classifier: Send + Sync {
    /// Label in {0, 1} for one transformed row.
    fn predict_row(&self, row: &[f64]) -> u8;

    /// Labels for a batch of transformed rows.
    fn predict(&self, rows: &[Vec<f64>]) -> Vec<u8> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Width of the rows the classifier was fit on.
    fn n_features(&self) -> usize;
}
