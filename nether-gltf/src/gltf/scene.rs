//! Scenes and transform hierarchy evaluation
//!
//! Traversal is pre-order over each root's `children` lists, driven by an
//! explicit stack. A node reached a second time within one traversal (a cycle
//! or a node shared by two parents) is reported and skipped.

use glam::Mat4;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use super::Node;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub nodes: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One visited node and its parent in traversal order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    pub node: usize,
    pub parent: Option<usize>,
}

impl Scene {
    /// Pre-order traversal of all nodes reachable from the scene roots
    pub fn traverse(&self, nodes: &[Node]) -> Vec<Visit> {
        let mut visits = Vec::new();
        let mut visited: HashSet<usize> = HashSet::new();
        let mut stack: Vec<Visit> = self
            .nodes
            .iter()
            .rev()
            .map(|&node| Visit { node, parent: None })
            .collect();

        while let Some(visit) = stack.pop() {
            let Some(node) = nodes.get(visit.node) else {
                tracing::warn!("Scene references missing node {}", visit.node);
                continue;
            };
            if !visited.insert(visit.node) {
                tracing::warn!(
                    "Node {} reached twice while traversing the scene (cycle or shared child); skipping",
                    visit.node
                );
                continue;
            }
            visits.push(visit);
            stack.extend(node.children.iter().rev().map(|&child| Visit {
                node: child,
                parent: Some(visit.node),
            }));
        }
        visits
    }

    /// Flattened list of reachable node indices in traversal order
    pub fn gather_nodes(&self, nodes: &[Node]) -> Vec<usize> {
        self.traverse(nodes)
            .into_iter()
            .map(|v| v.node)
            .collect()
    }

    /// Recompute world, inverse world and normal matrices for reachable nodes
    pub fn apply_transform_hierarchy(&self, nodes: &mut [Node], root_transform: Mat4) {
        for visit in self.traverse(nodes) {
            let parent_world = visit
                .parent
                .map(|p| nodes[p].world_transform)
                .unwrap_or(root_transform);
            let node = &mut nodes[visit.node];
            let local = node.refresh_local_transform();
            node.set_world_transform(parent_world * local);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn node_with_children(children: Vec<usize>) -> Node {
        let mut node = Node::default();
        node.children = children;
        node
    }

    #[test]
    fn single_default_node_has_identity_world() {
        let scene = Scene {
            nodes: vec![0],
            name: None,
        };
        let mut nodes = vec![Node::default()];
        scene.apply_transform_hierarchy(&mut nodes, Mat4::IDENTITY);
        assert_eq!(nodes[0].world_transform.to_cols_array(), Mat4::IDENTITY.to_cols_array());
    }

    #[test]
    fn world_is_parent_times_local() {
        let scene = Scene {
            nodes: vec![0],
            name: None,
        };
        let mut nodes = vec![node_with_children(vec![1]), Node::default()];
        nodes[0].set_translation(Vec3::new(1.0, 0.0, 0.0));
        nodes[0].set_scale(Vec3::splat(2.0));
        nodes[1].set_translation(Vec3::new(0.0, 3.0, 0.0));

        scene.apply_transform_hierarchy(&mut nodes, Mat4::IDENTITY);

        let expected = nodes[0].world_transform * nodes[1].local_transform();
        assert!(nodes[1].world_transform.abs_diff_eq(expected, 1e-6));
        assert_eq!(
            nodes[1].world_transform.w_axis.truncate(),
            Vec3::new(1.0, 6.0, 0.0)
        );

        let inverse = crate::math::invert(&nodes[1].world_transform).unwrap();
        assert!(nodes[1].normal_matrix.abs_diff_eq(inverse.transpose(), 1e-5));
    }

    #[test]
    fn traversal_is_pre_order() {
        let scene = Scene {
            nodes: vec![0, 3],
            name: None,
        };
        let nodes = vec![
            node_with_children(vec![1, 2]),
            Node::default(),
            Node::default(),
            Node::default(),
        ];
        assert_eq!(scene.gather_nodes(&nodes), vec![0, 1, 2, 3]);
    }

    #[test]
    fn cycles_terminate() {
        let scene = Scene {
            nodes: vec![0],
            name: None,
        };
        let mut nodes = vec![node_with_children(vec![1]), node_with_children(vec![0])];
        assert_eq!(scene.gather_nodes(&nodes), vec![0, 1]);
        scene.apply_transform_hierarchy(&mut nodes, Mat4::IDENTITY);
    }

    #[test]
    fn missing_children_are_skipped() {
        let scene = Scene {
            nodes: vec![0, 7],
            name: None,
        };
        let nodes = vec![node_with_children(vec![5])];
        assert_eq!(scene.gather_nodes(&nodes), vec![0]);
    }
}
