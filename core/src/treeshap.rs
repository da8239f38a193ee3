//! Exact path-dependent TreeSHAP for the tree ensemble.
//!
//! Attributions are in raw-score (log-odds) units, the positive-class output
//! of the binary model. For every row, `base_value + sum(values)` equals the
//! model's raw score.

use crate::model::{NodeKind, Tree, TreeEnsemble};
use serde::{Deserialize, Serialize};

/// Feature attributions for a single prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub feature_names: Vec<String>,
    pub values: Vec<f64>,
    /// Feature values the attribution was computed on.
    pub data: Vec<f64>,
    pub base_value: f64,
}

impl Attribution {
    /// Model output implied by the attribution.
    pub fn output(&self) -> f64 {
        self.base_value + self.values.iter().sum::<f64>()
    }

    /// Feature indices ordered by decreasing |attribution|, ties by index.
    pub fn ranked(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.values.len()).collect();
        order.sort_by(|&a, &b| {
            self.values[b]
                .abs()
                .total_cmp(&self.values[a].abs())
                .then(a.cmp(&b))
        });
        order
    }
}

/// Attribute the model's raw score for one row.
pub fn explain_row(model: &TreeEnsemble, row: &[f64]) -> Attribution {
    let mut phi = vec![0.0; model.feature_names.len()];
    for tree in &model.trees {
        tree_shap(tree, row, &mut phi);
    }
    Attribution {
        feature_names: model.feature_names.clone(),
        values: phi,
        data: row.to_vec(),
        base_value: model.expected_value(),
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

fn tree_shap(tree: &Tree, row: &[f64], phi: &mut [f64]) {
    if tree.nodes.len() < 2 {
        return;
    }
    recurse(tree, row, phi, 0, &[], 0, 1.0, 1.0, None);
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    row: &[f64],
    phi: &mut [f64],
    node: usize,
    parent_path: &[PathElement],
    unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let mut path: Vec<PathElement> = Vec::with_capacity(unique_depth + 2);
    path.extend_from_slice(&parent_path[..unique_depth]);
    extend_path(&mut path, zero_fraction, one_fraction, feature);
    let mut unique_depth = unique_depth;

    let current = &tree.nodes[node];
    match &current.kind {
        NodeKind::Leaf { value } => {
            for i in 1..=unique_depth {
                let w = unwound_path_sum(&path, unique_depth, i);
                let el = path[i];
                if let Some(f) = el.feature {
                    phi[f] += w * (el.one_fraction - el.zero_fraction) * value;
                }
            }
        }
        NodeKind::Split {
            feature: split,
            left,
            right,
            ..
        } => {
            let (hot, cold) = if current.goes_left(row) {
                (*left, *right)
            } else {
                (*right, *left)
            };
            let cover = current.cover;
            let hot_zero = tree.nodes[hot].cover / cover;
            let cold_zero = tree.nodes[cold].cover / cover;

            let mut incoming_zero = 1.0;
            let mut incoming_one = 1.0;
            if let Some(k) = (1..=unique_depth).find(|&k| path[k].feature == Some(*split)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind_path(&mut path, unique_depth, k);
                unique_depth -= 1;
            }

            recurse(
                tree,
                row,
                phi,
                hot,
                &path,
                unique_depth + 1,
                hot_zero * incoming_zero,
                incoming_one,
                Some(*split),
            );
            recurse(
                tree,
                row,
                phi,
                cold,
                &path,
                unique_depth + 1,
                cold_zero * incoming_zero,
                0.0,
                Some(*split),
            );
        }
    }
}

/// Append one element; `path.len()` is the new element's depth.
fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let d = depth as f64;
    for i in (0..depth).rev() {
        let fi = i as f64;
        path[i + 1].pweight += one_fraction * path[i].pweight * (fi + 1.0) / (d + 1.0);
        path[i].pweight = zero_fraction * path[i].pweight * (d - fi) / (d + 1.0);
    }
}

/// Undo the extension for element `index`, dropping it from the path.
fn unwind_path(path: &mut Vec<PathElement>, unique_depth: usize, index: usize) {
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let d = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].pweight;
    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        if one != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (d + 1.0) / ((fi + 1.0) * one);
            next_one_portion = tmp - path[i].pweight * zero * (d - fi) / (d + 1.0);
        } else {
            path[i].pweight = path[i].pweight * (d + 1.0) / (zero * (d - fi));
        }
    }
    for i in index..unique_depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `index` removed.
fn unwound_path_sum(path: &[PathElement], unique_depth: usize, index: usize) -> f64 {
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let d = unique_depth as f64;
    let mut next_one_portion = path[unique_depth].pweight;
    let mut total = 0.0;
    for i in (0..unique_depth).rev() {
        let fi = i as f64;
        if one != 0.0 {
            let tmp = next_one_portion * (d + 1.0) / ((fi + 1.0) * one);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero * ((d - fi) / (d + 1.0));
        } else if zero != 0.0 {
            total += (path[i].pweight / zero) / ((d - fi) / (d + 1.0));
        }
    }
    total
}
