//! Fitted gradient-boosted classifier.
//!
//! Loaded from the JSON document LightGBM's `Booster.dump_model()` writes.
//! Only binary objectives are accepted: the raw score is the sum of one leaf
//! per tree and the probability is its sigmoid.

use crate::error::{DeskError, DeskResult};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MissingType {
    None,
    Zero,
    NaN,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SplitRule {
    /// Go left when `value <= threshold`.
    Numerical(f64),
    /// Go left when the category is in the set.
    Categorical(Vec<i64>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        rule: SplitRule,
        default_left: bool,
        missing: MissingType,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub kind: NodeKind,
    /// Number of training rows that reached the node.
    pub cover: f64,
}

/// One tree, nodes in pre-order; the root is node 0.
#[derive(Debug, Clone)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn leaf_value(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx].kind {
                NodeKind::Leaf { value } => return *value,
                NodeKind::Split { left, right, .. } => {
                    idx = if self.nodes[idx].goes_left(row) { *left } else { *right };
                }
            }
        }
    }

    /// Cover-weighted mean leaf value: the tree's output with no feature known.
    pub fn expected_value(&self) -> f64 {
        self.expected_from(0)
    }

    fn expected_from(&self, idx: usize) -> f64 {
        let node = &self.nodes[idx];
        match &node.kind {
            NodeKind::Leaf { value } => *value,
            NodeKind::Split { left, right, .. } => {
                let (l, r) = (&self.nodes[*left], &self.nodes[*right]);
                let total = l.cover + r.cover;
                if total <= 0.0 {
                    return 0.5 * (self.expected_from(*left) + self.expected_from(*right));
                }
                (l.cover * self.expected_from(*left) + r.cover * self.expected_from(*right))
                    / total
            }
        }
    }
}

impl TreeNode {
    /// Routing decision for a split node, following LightGBM's missing-value
    /// rules. Leaves always answer `false`.
    pub fn goes_left(&self, row: &[f64]) -> bool {
        let NodeKind::Split {
            feature,
            rule,
            default_left,
            missing,
            ..
        } = &self.kind
        else {
            return false;
        };
        let raw = row.get(*feature).copied().unwrap_or(f64::NAN);
        match rule {
            SplitRule::Numerical(threshold) => {
                let is_missing = match missing {
                    MissingType::NaN => raw.is_nan(),
                    MissingType::Zero => raw.is_nan() || raw == 0.0,
                    MissingType::None => false,
                };
                if is_missing {
                    return *default_left;
                }
                let value = if raw.is_nan() { 0.0 } else { raw };
                value <= *threshold
            }
            SplitRule::Categorical(categories) => {
                if raw.is_nan() || raw < 0.0 {
                    return false;
                }
                categories.contains(&(raw as i64))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    pub feature_names: Vec<String>,
    pub trees: Vec<Tree>,
    pub sigmoid: f64,
}

impl TreeEnsemble {
    pub fn load(path: &Path) -> DeskResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let model = Self::from_json(&content)?;
        log::info!(
            "loaded model from {}: {} trees over {} features",
            path.display(),
            model.trees.len(),
            model.feature_names.len()
        );
        Ok(model)
    }

    pub fn from_json(content: &str) -> DeskResult<Self> {
        let dump: ModelDump = serde_json::from_str(content)?;
        if dump.num_class != 1 {
            return Err(DeskError::InvalidModel(format!(
                "expected a binary classifier, got num_class={}",
                dump.num_class
            )));
        }
        let sigmoid = parse_sigmoid(&dump.objective)?;
        let n_features = dump.feature_names.len();
        let trees = dump
            .tree_info
            .into_iter()
            .enumerate()
            .map(|(i, info)| flatten_tree(i, info.tree_structure, n_features))
            .collect::<DeskResult<Vec<_>>>()?;
        Ok(Self {
            feature_names: dump.feature_names,
            trees,
            sigmoid,
        })
    }

    pub fn predict_raw(&self, row: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.leaf_value(row)).sum()
    }

    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        1.0 / (1.0 + (-self.sigmoid * self.predict_raw(row)).exp())
    }

    /// Raw-score baseline: the sum of each tree's expected value.
    pub fn expected_value(&self) -> f64 {
        self.trees.iter().map(Tree::expected_value).sum()
    }

    /// The model must consume exactly the feature table's columns, in order.
    pub fn check_features(&self, columns: &[String]) -> DeskResult<()> {
        if self.feature_names.as_slice() == columns {
            return Ok(());
        }
        let first_diff = self
            .feature_names
            .iter()
            .zip(columns)
            .position(|(a, b)| a != b)
            .unwrap_or(self.feature_names.len().min(columns.len()));
        Err(DeskError::FeatureMismatch(format!(
            "model expects {} features, table has {} (first difference at position {first_diff})",
            self.feature_names.len(),
            columns.len()
        )))
    }
}

fn parse_sigmoid(objective: &str) -> DeskResult<f64> {
    let mut parts = objective.split_whitespace();
    if parts.next() != Some("binary") {
        return Err(DeskError::InvalidModel(format!(
            "unsupported objective '{objective}'"
        )));
    }
    for part in parts {
        if let Some(v) = part.strip_prefix("sigmoid:") {
            return v
                .parse()
                .map_err(|_| DeskError::InvalidModel(format!("bad sigmoid in '{objective}'")));
        }
    }
    Ok(1.0)
}

#[derive(Deserialize)]
struct ModelDump {
    #[serde(default = "one")]
    num_class: usize,
    #[serde(default)]
    objective: String,
    feature_names: Vec<String>,
    tree_info: Vec<TreeInfo>,
}

fn one() -> usize {
    1
}

#[derive(Deserialize)]
struct TreeInfo {
    tree_structure: DumpNode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DumpNode {
    Split {
        split_feature: usize,
        threshold: Threshold,
        decision_type: String,
        #[serde(default)]
        default_left: bool,
        #[serde(default = "missing_none")]
        missing_type: MissingType,
        #[serde(default)]
        internal_count: f64,
        left_child: Box<DumpNode>,
        right_child: Box<DumpNode>,
    },
    Leaf {
        leaf_value: f64,
        #[serde(default)]
        leaf_count: f64,
    },
}

fn missing_none() -> MissingType {
    MissingType::None
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Threshold {
    Number(f64),
    Text(String),
}

fn flatten_tree(index: usize, root: DumpNode, n_features: usize) -> DeskResult<Tree> {
    let mut nodes = Vec::new();
    push_node(&mut nodes, root, n_features, index)?;
    if nodes.len() > 1 && nodes[0].cover <= 0.0 {
        return Err(DeskError::InvalidModel(format!(
            "tree {index} has no node counts; re-export with dump_model()"
        )));
    }
    if nodes.len() == 1 {
        nodes[0].cover = nodes[0].cover.max(1.0);
    }
    Ok(Tree { nodes })
}

fn push_node(
    nodes: &mut Vec<TreeNode>,
    node: DumpNode,
    n_features: usize,
    tree: usize,
) -> DeskResult<usize> {
    let idx = nodes.len();
    match node {
        DumpNode::Leaf {
            leaf_value,
            leaf_count,
        } => nodes.push(TreeNode {
            kind: NodeKind::Leaf { value: leaf_value },
            cover: leaf_count,
        }),
        DumpNode::Split {
            split_feature,
            threshold,
            decision_type,
            default_left,
            missing_type,
            internal_count,
            left_child,
            right_child,
        } => {
            if split_feature >= n_features {
                return Err(DeskError::InvalidModel(format!(
                    "tree {tree} splits on feature {split_feature} of {n_features}"
                )));
            }
            let rule = parse_rule(&decision_type, threshold, tree)?;
            // Placeholder, children indices are patched once known.
            nodes.push(TreeNode {
                kind: NodeKind::Leaf { value: 0.0 },
                cover: internal_count,
            });
            let left = push_node(nodes, *left_child, n_features, tree)?;
            let right = push_node(nodes, *right_child, n_features, tree)?;
            nodes[idx].kind = NodeKind::Split {
                feature: split_feature,
                rule,
                default_left,
                missing: missing_type,
                left,
                right,
            };
        }
    }
    Ok(idx)
}

fn parse_rule(decision_type: &str, threshold: Threshold, tree: usize) -> DeskResult<SplitRule> {
    let invalid = || DeskError::InvalidModel(format!("tree {tree}: bad split '{decision_type}'"));
    match (decision_type, threshold) {
        ("<=", Threshold::Number(t)) => Ok(SplitRule::Numerical(t)),
        ("<=", Threshold::Text(t)) => t.parse().map(SplitRule::Numerical).map_err(|_| invalid()),
        ("==", Threshold::Text(t)) => t
            .split("||")
            .map(|c| c.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map(SplitRule::Categorical)
            .map_err(|_| invalid()),
        ("==", Threshold::Number(t)) => Ok(SplitRule::Categorical(vec![t as i64])),
        _ => Err(invalid()),
    }
}
