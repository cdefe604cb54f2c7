//! Seeded random forest over dense feature rows.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

const MAX_DEPTH: usize = 32;

/// Per-column standardization fitted on the training rows.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Columns with zero spread keep a unit scale.
    pub fn fit(rows: ArrayView2<f64>) -> Self {
        let cols = rows.ncols();
        let mean = rows
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(cols));
        let scale = rows
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
        Self { mean, scale }
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Array1<f64> {
        (&row - &self.mean) / &self.scale
    }

    pub fn transform(&self, rows: ArrayView2<f64>) -> Array2<f64> {
        (&rows - &self.mean) / &self.scale
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Vec<f64>),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// CART tree grown with Gini impurity and a random feature subset per split.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: Node,
    n_classes: usize,
}

struct Grower<'a> {
    rows: ArrayView2<'a, f64>,
    labels: &'a [usize],
    n_classes: usize,
    max_features: usize,
}

impl DecisionTree {
    pub fn fit<'a>(
        rows: ArrayView2<'a, f64>,
        labels: &'a [usize],
        samples: Vec<usize>,
        n_classes: usize,
        max_features: usize,
        rng: &mut StdRng,
    ) -> Self {
        let grower = Grower {
            rows,
            labels,
            n_classes,
            max_features: max_features.clamp(1, rows.ncols().max(1)),
        };
        Self {
            root: grower.grow(samples, 0, rng),
            n_classes,
        }
    }

    pub fn predict_proba(&self, row: ArrayView1<f64>) -> Vec<f64> {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(probs) => return probs.clone(),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    };
                }
            }
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

impl Grower<'_> {
    fn counts(&self, samples: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &idx in samples {
            counts[self.labels[idx]] += 1.0;
        }
        counts
    }

    fn leaf(&self, samples: &[usize]) -> Node {
        let counts = self.counts(samples);
        let total: f64 = counts.iter().sum();
        if total == 0.0 {
            return Node::Leaf(vec![1.0 / self.n_classes as f64; self.n_classes]);
        }
        Node::Leaf(counts.into_iter().map(|c| c / total).collect())
    }

    fn grow(&self, samples: Vec<usize>, depth: usize, rng: &mut StdRng) -> Node {
        let counts = self.counts(&samples);
        let pure = counts.iter().filter(|c| **c > 0.0).count() <= 1;
        if pure || samples.len() < 2 || depth >= MAX_DEPTH {
            return self.leaf(&samples);
        }

        let Some((feature, threshold)) = self.best_split(&samples, gini(&counts), rng) else {
            return self.leaf(&samples);
        };
        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&idx| self.rows[[idx, feature]] <= threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(self.grow(left, depth + 1, rng)),
            right: Box::new(self.grow(right, depth + 1, rng)),
        }
    }

    /// Best (feature, threshold) among a random feature subset, if any
    /// split lowers the impurity.
    fn best_split(&self, samples: &[usize], parent: f64, rng: &mut StdRng) -> Option<(usize, f64)> {
        let total = samples.len() as f64;
        let mut best: Option<(usize, f64, f64)> = None;

        for feature in sample(rng, self.rows.ncols(), self.max_features).into_iter() {
            let mut ordered: Vec<(f64, usize)> = samples
                .iter()
                .map(|&idx| (self.rows[[idx, feature]], self.labels[idx]))
                .collect();
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0.0; self.n_classes];
            let mut right = self.counts(samples);
            for split in 1..ordered.len() {
                let (value, label) = ordered[split - 1];
                left[label] += 1.0;
                right[label] -= 1.0;
                let next = ordered[split].0;
                if next <= value {
                    continue;
                }
                let n_left = split as f64;
                let impurity = (n_left * gini(&left) + (total - n_left) * gini(&right)) / total;
                if impurity < parent && best.map_or(true, |(_, _, b)| impurity < b) {
                    best = Some((feature, (value + next) / 2.0, impurity));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

fn gini(counts: &[f64]) -> f64 {
    let total: f64 = counts.iter().sum();
    if total == 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total).powi(2)).sum::<f64>()
}

/// Bagged ensemble of [`DecisionTree`]s; probabilities are averaged.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl RandomForest {
    pub fn fit<'a>(
        rows: ArrayView2<'a, f64>,
        labels: &'a [usize],
        n_classes: usize,
        n_estimators: usize,
        seed: u64,
    ) -> Result<Self, String> {
        if rows.ncols() == 0 {
            return Err("rows carry no features".to_string());
        }
        if rows.nrows() == 0 || rows.nrows() != labels.len() {
            return Err(format!(
                "{} rows for {} labels",
                rows.nrows(),
                labels.len()
            ));
        }
        if n_classes == 0 || labels.iter().any(|&l| l >= n_classes) {
            return Err(format!("labels outside 0..{}", n_classes));
        }
        if n_estimators == 0 {
            return Err("forest needs at least one tree".to_string());
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let max_features = (rows.ncols() as f64).sqrt().floor() as usize;
        let n = rows.nrows();
        let trees = (0..n_estimators)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(rows, labels, bootstrap, n_classes, max_features, &mut rng)
            })
            .collect();

        Ok(Self { trees, n_classes })
    }

    pub fn predict_proba(&self, row: ArrayView1<f64>) -> Vec<f64> {
        let mut probs = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in probs.iter_mut().zip(tree.predict_proba(row)) {
                *acc += p;
            }
        }
        let count = self.trees.len().max(1) as f64;
        probs.iter_mut().for_each(|p| *p /= count);
        probs
    }

    /// Index of the most probable class; the lowest index wins ties.
    pub fn predict(&self, row: ArrayView1<f64>) -> usize {
        let probs = self.predict_proba(row);
        crate::math::stats::StatsHelper::argmax(&probs).unwrap_or(0)
    }

    /// Fraction of rows whose prediction matches the label.
    pub fn score(&self, rows: ArrayView2<f64>, labels: &[usize]) -> f64 {
        if labels.is_empty() {
            return 0.0;
        }
        let hits = rows
            .outer_iter()
            .zip(labels)
            .filter(|(row, label)| self.predict(*row) == **label)
            .count();
        hits as f64 / labels.len() as f64
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Vec<usize>) {
        let rows = array![
            [0.0, 5.0],
            [0.1, 4.0],
            [0.2, 6.0],
            [0.3, 5.5],
            [1.0, 5.0],
            [1.1, 4.5],
            [1.2, 6.0],
            [1.3, 5.2]
        ];
        (rows, vec![0, 0, 0, 0, 1, 1, 1, 1])
    }

    #[test]
    fn scaler_maps_constant_column_to_zero() {
        let rows = array![[1.0, 3.0], [3.0, 3.0]];
        let scaler = StandardScaler::fit(rows.view());
        let scaled = scaler.transform(rows.view());
        assert_eq!(scaled, array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn forest_separates_linearly_separable_classes() {
        let (rows, labels) = separable();
        let forest = RandomForest::fit(rows.view(), &labels, 2, 25, 42).unwrap();
        assert_eq!(forest.n_trees(), 25);
        assert_eq!(forest.predict(array![0.05, 5.0].view()), 0);
        assert_eq!(forest.predict(array![1.25, 5.0].view()), 1);
        let probs = forest.predict_proba(array![1.25, 5.0].view());
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_tree_fits_a_bootstrap_subset() {
        let (rows, labels) = separable();
        let mut rng = StdRng::seed_from_u64(3);
        let samples: Vec<usize> = (0..labels.len()).collect();
        let tree = DecisionTree::fit(rows.view(), &labels, samples, 2, 2, &mut rng);
        assert_eq!(tree.predict_proba(array![0.05, 5.0].view()), vec![1.0, 0.0]);
        assert_eq!(tree.predict_proba(array![1.25, 5.0].view()), vec![0.0, 1.0]);
    }

    #[test]
    fn same_seed_gives_same_probabilities() {
        let (rows, labels) = separable();
        let a = RandomForest::fit(rows.view(), &labels, 2, 10, 7).unwrap();
        let b = RandomForest::fit(rows.view(), &labels, 2, 10, 7).unwrap();
        let point = array![0.65, 5.1];
        assert_eq!(a.predict_proba(point.view()), b.predict_proba(point.view()));
    }

    #[test]
    fn mismatched_labels_are_rejected() {
        let (rows, _) = separable();
        assert!(RandomForest::fit(rows.view(), &[0, 1], 2, 5, 1).is_err());
        assert!(RandomForest::fit(rows.view(), &[0, 0, 0, 0, 1, 1, 1, 3], 2, 5, 1).is_err());
    }

    #[test]
    fn gini_of_pure_node_is_zero() {
        assert_eq!(gini(&[4.0, 0.0]), 0.0);
        assert!((gini(&[2.0, 2.0]) - 0.5).abs() < 1e-12);
    }
}
