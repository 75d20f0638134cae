use anyhow::Result;

use super::preprocess::{rows_have_width, validate_training_inputs};

pub const MAX_DEPTH: usize = 8;
/// Nodes with fewer samples than this become leaves.
pub const MIN_SAMPLES_SPLIT: usize = 4;
/// Absolute target variance under which a node is homogeneous. Tuned for salary-scale targets.
pub const MIN_VARIANCE: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn collect_leaves(&self, out: &mut Vec<f64>) {
        match self {
            TreeNode::Leaf { value } => out.push(*value),
            TreeNode::Split { left, right, .. } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
}

/// CART regression tree grown by exhaustive variance-reduction search.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    width: usize,
    max_depth: usize,
    min_samples_split: usize,
    min_variance: f64,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            width: 0,
            max_depth: MAX_DEPTH,
            min_samples_split: MIN_SAMPLES_SPLIT,
            min_variance: MIN_VARIANCE,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Override the homogeneity threshold for targets on a different scale.
    pub fn with_min_variance(mut self, min_variance: f64) -> Self {
        self.min_variance = min_variance;
        self
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    pub fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        self.width = validate_training_inputs(features, targets)?;
        let rows: Vec<usize> = (0..features.len()).collect();
        self.root = Some(self.build(features, targets, &rows, 0));
        Ok(())
    }

    /// Column count seen at fit time; `None` before fitting.
    pub fn n_features(&self) -> Option<usize> {
        self.root.as_ref().map(|_| self.width)
    }

    /// Depth of the deepest leaf; a lone root leaf has depth 0.
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn leaf_values(&self) -> Vec<f64> {
        let mut leaves = Vec::new();
        if let Some(root) = &self.root {
            root.collect_leaves(&mut leaves);
        }
        leaves
    }

    /// `None` before fitting or when `row` does not have the fitted width.
    pub fn predict_row(&self, row: &[f64]) -> Option<f64> {
        let mut node = self.root.as_ref()?;
        if row.len() != self.width {
            return None;
        }
        loop {
            match node {
                TreeNode::Leaf { value } => return Some(*value),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
        if self.root.is_none() || !rows_have_width(features, self.width) {
            return Vec::new();
        }
        features
            .iter()
            .filter_map(|row| self.predict_row(row))
            .collect()
    }

    fn build(&self, features: &[Vec<f64>], targets: &[f64], rows: &[usize], depth: usize) -> TreeNode {
        let values: Vec<f64> = rows.iter().map(|&i| targets[i]).collect();
        let leaf = || TreeNode::Leaf {
            value: mean(&values),
        };

        if depth >= self.max_depth
            || rows.len() < self.min_samples_split
            || variance(&values) < self.min_variance
        {
            return leaf();
        }

        let Some(split) = best_split(features, targets, rows) else {
            return leaf();
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&i| features[i][split.feature] <= split.threshold);

        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(features, targets, &left_rows, depth + 1)),
            right: Box::new(self.build(features, targets, &right_rows, depth + 1)),
        }
    }
}

/// Exhaustive search over midpoints of consecutive distinct values. The first
/// candidate found wins ties; a node with no candidate thresholds yields `None`.
fn best_split(features: &[Vec<f64>], targets: &[f64], rows: &[usize]) -> Option<SplitCandidate> {
    let width = features[rows[0]].len();
    let parent: Vec<f64> = rows.iter().map(|&i| targets[i]).collect();
    let parent_variance = variance(&parent);

    let mut best: Option<SplitCandidate> = None;
    let mut best_gain = -1.0;

    for feature in 0..width {
        let mut distinct: Vec<f64> = rows.iter().map(|&i| features[i][feature]).collect();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();

        for pair in distinct.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let gain = information_gain(features, targets, rows, feature, threshold, parent_variance);
            if gain > best_gain {
                best_gain = gain;
                best = Some(SplitCandidate { feature, threshold });
            }
        }
    }

    best
}

fn information_gain(
    features: &[Vec<f64>],
    targets: &[f64],
    rows: &[usize],
    feature: usize,
    threshold: f64,
    parent_variance: f64,
) -> f64 {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &i in rows {
        if features[i][feature] <= threshold {
            left.push(targets[i]);
        } else {
            right.push(targets[i]);
        }
    }

    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let total = rows.len() as f64;
    let weighted = left.len() as f64 / total * variance(&left)
        + right.len() as f64 / total * variance(&right);

    parent_variance - weighted
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn step_dataset() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let targets: Vec<f64> = (0..12)
            .map(|i| if i < 6 { 1_000_000.0 } else { 3_000_000.0 })
            .collect();
        (features, targets)
    }

    #[test]
    fn unfitted_tree_predicts_nothing() {
        assert!(DecisionTree::new().predict(&[vec![1.0]]).is_empty());
        assert_eq!(DecisionTree::new().depth(), 0);
    }

    #[test]
    fn finds_the_step_threshold() {
        let (features, targets) = step_dataset();
        let mut tree = DecisionTree::new();
        tree.fit(&features, &targets).expect("fit");

        match tree.root() {
            Some(TreeNode::Split {
                feature, threshold, ..
            }) => {
                assert_eq!(*feature, 0);
                assert_abs_diff_eq!(*threshold, 5.5);
            }
            other => panic!("expected split root, got {:?}", other),
        }

        assert_eq!(tree.predict(&[vec![2.0, 0.0], vec![9.0, 1.0]]), vec![1_000_000.0, 3_000_000.0]);
    }

    #[test]
    fn rows_of_another_width_get_no_prediction() {
        let (features, targets) = step_dataset();
        let mut tree = DecisionTree::new();
        tree.fit(&features, &targets).expect("fit");

        assert_eq!(tree.n_features(), Some(2));
        assert_eq!(tree.predict_row(&[9.0]), None);
        assert!(tree.predict(&[vec![9.0]]).is_empty());
        assert!(tree.predict(&[vec![9.0, 1.0], vec![9.0, 1.0, 0.0]]).is_empty());
        assert_eq!(tree.predict(&[vec![9.0, 1.0]]), vec![3_000_000.0]);
    }

    #[test]
    fn small_or_homogeneous_nodes_become_leaves() {
        let mut tree = DecisionTree::new();
        tree.fit(&[vec![1.0], vec![2.0], vec![3.0]], &[1.0, 500.0, 9_000.0])
            .expect("fit");
        assert_eq!(tree.depth(), 0);

        let mut homogeneous = DecisionTree::new();
        homogeneous
            .fit(
                &[vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
                &[100.0, 110.0, 120.0, 130.0],
            )
            .expect("fit");
        assert_eq!(homogeneous.leaf_values(), vec![115.0]);
    }

    #[test]
    fn identical_rows_cannot_be_split() {
        let features = vec![vec![1.0, 1.0]; 6];
        let targets = vec![0.0, 1e6, 2e6, 3e6, 4e6, 5e6];
        let mut tree = DecisionTree::new();
        tree.fit(&features, &targets).expect("fit");

        assert_eq!(tree.leaf_values(), vec![2.5e6]);
    }

    #[test]
    fn depth_never_exceeds_limit_and_predictions_are_leaf_means() {
        let features: Vec<Vec<f64>> = (0..400).map(|i| vec![i as f64, ((i * 37) % 101) as f64]).collect();
        let targets: Vec<f64> = features.iter().map(|r| r[0] * r[0] * 100.0 + r[1] * 5_000.0).collect();

        let mut tree = DecisionTree::new();
        tree.fit(&features, &targets).expect("fit");
        assert!(tree.depth() <= MAX_DEPTH);
        assert_eq!(tree.depth(), MAX_DEPTH);

        let leaves = tree.leaf_values();
        for prediction in tree.predict(&features) {
            assert!(leaves.contains(&prediction));
        }
    }

    #[test]
    fn custom_depth_limit_is_honoured() {
        let (features, targets) = step_dataset();
        let mut tree = DecisionTree::new().with_max_depth(0);
        tree.fit(&features, &targets).expect("fit");
        assert_eq!(tree.leaf_values(), vec![2_000_000.0]);
    }

    #[test]
    fn relative_threshold_can_be_supplied() {
        let features: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..8).map(|i| if i < 4 { 0.1 } else { 0.9 }).collect();

        let mut default_tree = DecisionTree::new();
        default_tree.fit(&features, &targets).expect("fit");
        assert_eq!(default_tree.depth(), 0);

        let mut scaled = DecisionTree::new().with_min_variance(1e-4);
        scaled.fit(&features, &targets).expect("fit");
        assert_eq!(scaled.depth(), 1);
    }
}
