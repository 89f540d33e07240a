//! Regression trees rebuilt from XGBoost's parallel node arrays

use crate::error::ModelError;
use crate::xgboost::XgbTree;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node {
    Split {
        feature: u32,
        threshold: f32,
        default_left: bool,
        left: u32,
        right: u32,
    },
    Leaf(f32),
}

/// One tree, nodes in XGBoost order with the root at index 0
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Build from an XGBoost tree, checking every index against `num_features`
    pub fn from_xgboost(tree: &XgbTree, index: usize, num_features: usize) -> Result<Self, ModelError> {
        let num_nodes = tree.tree_param.num_nodes.max(0) as usize;
        if num_nodes == 0 {
            return Err(ModelError::EmptyTree(index));
        }

        let arrays = [
            ("base_weights", tree.base_weights.len()),
            ("left_children", tree.left_children.len()),
            ("right_children", tree.right_children.len()),
            ("split_indices", tree.split_indices.len()),
            ("split_conditions", tree.split_conditions.len()),
            ("default_left", tree.default_left.len()),
        ];
        for (name, len) in arrays {
            if len != num_nodes {
                return Err(ModelError::MalformedTree {
                    tree: index,
                    reason: format!("{} has {} entries, expected {}", name, len, num_nodes),
                });
            }
        }

        let mut nodes = Vec::with_capacity(num_nodes);
        for node in 0..num_nodes {
            let left = tree.left_children[node];
            if left == -1 {
                nodes.push(Node::Leaf(tree.base_weights[node]));
                continue;
            }

            if tree.split_type.get(node).copied().unwrap_or(0) != 0 {
                return Err(ModelError::CategoricalSplit { tree: index, node });
            }

            let right = tree.right_children[node];
            for child in [left, right] {
                // children always follow their parent, which also rules out cycles
                if child <= node as i32 || child as usize >= num_nodes {
                    return Err(ModelError::InvalidNodeIndex {
                        tree: index,
                        node,
                        child,
                        num_nodes,
                    });
                }
            }

            let feature = tree.split_indices[node];
            if feature < 0 || feature as usize >= num_features {
                return Err(ModelError::FeatureIndex {
                    tree: index,
                    node,
                    feature,
                    num_features,
                });
            }

            nodes.push(Node::Split {
                feature: feature as u32,
                threshold: tree.split_conditions[node],
                default_left: tree.default_left[node] != 0,
                left: left as u32,
                right: right as u32,
            });
        }

        Ok(Self { nodes })
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Leaf value reached by `features`
    ///
    /// Go left when `x < threshold`; a `NaN` feature follows the node's
    /// default direction. The row length is checked by the caller.
    #[inline]
    pub fn leaf_value(&self, features: &[f32]) -> f32 {
        let mut idx = 0usize;
        loop {
            match self.nodes[idx] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                } => {
                    let x = features[feature as usize];
                    let go_left = if x.is_nan() { default_left } else { x < threshold };
                    let next = if go_left { left } else { right };
                    idx = next as usize;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::xgboost::TreeParam;

    /// `x0 < 0.5 ? (x1 < 2.0 ? 1.0 : 2.0) : 3.0`, missing x0 goes right
    pub(crate) fn two_level_tree() -> XgbTree {
        XgbTree {
            tree_param: TreeParam {
                num_nodes: 5,
                num_feature: 2,
            },
            id: 0,
            base_weights: vec![0.0, 0.0, 3.0, 1.0, 2.0],
            left_children: vec![1, 3, -1, -1, -1],
            right_children: vec![2, 4, -1, -1, -1],
            split_indices: vec![0, 1, 0, 0, 0],
            split_conditions: vec![0.5, 2.0, 3.0, 1.0, 2.0],
            default_left: vec![0, 1, 0, 0, 0],
            split_type: vec![0; 5],
        }
    }

    #[test]
    fn test_traversal() {
        let tree = RegressionTree::from_xgboost(&two_level_tree(), 0, 2).unwrap();
        assert_eq!(tree.num_nodes(), 5);
        assert_eq!(tree.leaf_value(&[0.1, 1.0]), 1.0);
        assert_eq!(tree.leaf_value(&[0.1, 2.0]), 2.0); // equal goes right
        assert_eq!(tree.leaf_value(&[0.9, 0.0]), 3.0);
    }

    #[test]
    fn test_missing_follows_default() {
        let tree = RegressionTree::from_xgboost(&two_level_tree(), 0, 2).unwrap();
        assert_eq!(tree.leaf_value(&[f32::NAN, 0.0]), 3.0);
        assert_eq!(tree.leaf_value(&[0.1, f32::NAN]), 1.0);
    }

    #[test]
    fn test_rejects_bad_child() {
        let mut raw = two_level_tree();
        raw.left_children[1] = 0;
        assert!(matches!(
            RegressionTree::from_xgboost(&raw, 3, 2),
            Err(ModelError::InvalidNodeIndex { tree: 3, node: 1, child: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_feature() {
        assert!(matches!(
            RegressionTree::from_xgboost(&two_level_tree(), 0, 1),
            Err(ModelError::FeatureIndex { feature: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_short_arrays_and_categorical() {
        let mut raw = two_level_tree();
        raw.base_weights.pop();
        assert!(matches!(
            RegressionTree::from_xgboost(&raw, 0, 2),
            Err(ModelError::MalformedTree { .. })
        ));

        let mut raw = two_level_tree();
        raw.split_type[0] = 1;
        assert!(matches!(
            RegressionTree::from_xgboost(&raw, 0, 2),
            Err(ModelError::CategoricalSplit { node: 0, .. })
        ));
    }
}
