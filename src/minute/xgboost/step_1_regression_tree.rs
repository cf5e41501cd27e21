// External crates
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Node of a fitted regression tree. Rows with `x[feature] < threshold` go left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    /// L2 penalty on leaf weights
    pub lambda: f64,
    /// Minimum loss reduction required to split
    pub gamma: f64,
    /// Minimum hessian sum per child
    pub min_child_weight: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 6,
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

/// Second-order regression tree grown by exact greedy split enumeration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub root: TreeNode,
}

impl RegressionTree {
    /// Grow a tree on the rows in `rows` from per-row gradients and hessians
    pub fn fit(
        features: ArrayView2<'_, f64>,
        gradients: &[f64],
        hessians: &[f64],
        rows: &[usize],
        params: &TreeParams,
    ) -> Self {
        let grower = TreeGrower {
            features: features.reborrow(),
            gradients,
            hessians,
            params,
        };
        Self {
            root: grower.grow(rows.to_vec(), 0),
        }
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature] < *threshold { left } else { right };
                }
            }
        }
    }

    /// Add this tree's split count per feature into `counts`
    pub fn count_splits(&self, counts: &mut [usize]) {
        fn walk(node: &TreeNode, counts: &mut [usize]) {
            if let TreeNode::Split {
                feature, left, right, ..
            } = node
            {
                if let Some(c) = counts.get_mut(*feature) {
                    *c += 1;
                }
                walk(left, counts);
                walk(right, counts);
            }
        }
        walk(&self.root, counts);
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}

struct TreeGrower<'a> {
    features: ArrayView2<'a, f64>,
    gradients: &'a [f64],
    hessians: &'a [f64],
    params: &'a TreeParams,
}

impl TreeGrower<'_> {
    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(g, h), &i| {
            (g + self.gradients[i], h + self.hessians[i])
        })
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn grow(&self, rows: Vec<usize>, depth: usize) -> TreeNode {
        let (g, h) = self.sums(&rows);
        let leaf = TreeNode::Leaf {
            value: -g / (h + self.params.lambda),
        };
        if depth >= self.params.max_depth || rows.len() < 2 {
            return leaf;
        }
        match self.best_split(&rows, g, h) {
            Some(split) => TreeNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                gain: split.gain,
                left: Box::new(self.grow(split.left, depth + 1)),
                right: Box::new(self.grow(split.right, depth + 1)),
            },
            None => leaf,
        }
    }

    fn best_split(&self, rows: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let parent = self.score(g_total, h_total);
        let mut best: Option<(usize, f64, f64)> = None;

        for feature in 0..self.features.ncols() {
            let column = self.features.column(feature);
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for pos in 0..sorted.len() - 1 {
                let i = sorted[pos];
                g_left += self.gradients[i];
                h_left += self.hessians[i];

                let here = column[i];
                let next = column[sorted[pos + 1]];
                if here == next {
                    continue;
                }
                let g_right = g_total - g_left;
                let h_right = h_total - h_left;
                if h_left < self.params.min_child_weight || h_right < self.params.min_child_weight {
                    continue;
                }

                let gain = 0.5 * (self.score(g_left, h_left) + self.score(g_right, h_right) - parent)
                    - self.params.gamma;
                // Strict comparison keeps the lowest feature index and value on ties
                if gain > 0.0 && best.map_or(true, |(_, _, b)| gain > b) {
                    best = Some((feature, here + (next - here) / 2.0, gain));
                }
            }
        }

        best.map(|(feature, threshold, gain)| {
            let (left, right): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .copied()
                .partition(|&i| self.features[[i, feature]] < threshold);
            SplitCandidate {
                feature,
                threshold,
                gain,
                left,
                right,
            }
        })
    }
}
