use std::ops::{Index, IndexMut};

use nalgebra::Matrix4;

use super::skinning::bone_name;
use super::types::{NodeDesc, TransformSpec};
use crate::error::HierarchyError;
use crate::host::{ArmatureId, BoneId, ObjectId};

/// Stable node identity: the node's position in the flat source array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Membership of a node in a skin's joint list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkinSlot {
    pub skin: usize,
    /// Position of the node inside the skin's `joints`.
    pub joint: usize,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub index: usize,
    pub name: Option<String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub transform: TransformSpec,
    pub mesh: Option<usize>,
    pub source: Option<serde_json::Value>,
    /// Skin deforming this node's mesh.
    pub mesh_skin: Option<usize>,
    /// Skin listing this node as a joint.
    pub skin: Option<SkinSlot>,
    pub object: Option<ObjectId>,
    pub bone: Option<BoneId>,
    pub armature: Option<ArmatureId>,
    /// Host-space world matrix, filled in during object creation.
    pub world: Matrix4<f32>,
    pub removed: bool,
}

impl Node {
    fn from_desc(index: usize, desc: &NodeDesc) -> Self {
        Self {
            index,
            name: desc.name.clone(),
            parent: None,
            children: desc.children.iter().copied().map(NodeId).collect(),
            transform: desc.transform.clone(),
            mesh: desc.mesh,
            source: desc.source.clone(),
            mesh_skin: desc.skin,
            skin: None,
            object: None,
            bone: None,
            armature: None,
            world: Matrix4::identity(),
            removed: false,
        }
    }

    /// Name used for the host object and, for joints, the bone.
    pub fn bone_name(&self) -> String {
        bone_name(self.name.as_deref(), self.index)
    }
}

/// Arena of nodes linked by index into a single-rooted tree.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl SceneGraph {
    /// Link the flat node array into a tree.
    ///
    /// Exactly one node may be parentless and it must be node 0. Every other
    /// node has to be reachable from it.
    pub fn build(descs: &[NodeDesc]) -> Result<Self, HierarchyError> {
        let len = descs.len();
        let mut parent_of: Vec<Option<usize>> = vec![None; len];

        for (parent, desc) in descs.iter().enumerate() {
            for &child in &desc.children {
                if child >= len {
                    return Err(HierarchyError::ChildOutOfRange { parent, child, len });
                }
                if child == parent {
                    return Err(HierarchyError::SelfChild { node: parent });
                }
                if let Some(first) = parent_of[child] {
                    return Err(HierarchyError::MultipleParents {
                        child,
                        first,
                        second: parent,
                    });
                }
                parent_of[child] = Some(parent);
            }
        }

        let roots: Vec<usize> = (0..len).filter(|&i| parent_of[i].is_none()).collect();
        let root = match roots.as_slice() {
            [] => return Err(HierarchyError::NoRoot),
            [0] => NodeId(0),
            [index] => return Err(HierarchyError::RootNotAtZero { index: *index }),
            _ => return Err(HierarchyError::MultipleRoots { roots }),
        };

        let mut nodes: Vec<Node> = descs
            .iter()
            .enumerate()
            .map(|(index, desc)| Node::from_desc(index, desc))
            .collect();
        for (node, parent) in nodes.iter_mut().zip(&parent_of) {
            node.parent = parent.map(NodeId);
        }

        let graph = Self {
            nodes,
            root: Some(root),
        };

        // Every non-root node has exactly one parent here, so anything the
        // walk from the root misses sits on a parent cycle.
        let mut visited = vec![false; len];
        for id in graph.pre_order() {
            visited[id.0] = true;
        }
        let unreachable: Vec<usize> = (0..len).filter(|&i| !visited[i]).collect();
        if !unreachable.is_empty() {
            return Err(HierarchyError::Cycle { unreachable });
        }

        Ok(graph)
    }

    /// `None` once pruning has removed the whole tree.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| !node.removed)
    }

    /// Root first, children in declared order.
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self[id].children.iter().rev().copied());
        }
        order
    }

    /// Children before parents, siblings in declared order.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self[id].children.iter().copied());
        }
        order.reverse();
        order
    }

    /// Unlink a node from its parent and mark it removed.
    pub(crate) fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self[id].parent {
            self[parent].children.retain(|child| *child != id);
        }
        if self.root == Some(id) {
            self.root = None;
        }
        let node = &mut self[id];
        node.parent = None;
        node.removed = true;
    }
}

impl Index<NodeId> for SceneGraph {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for SceneGraph {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(children: &[usize]) -> NodeDesc {
        NodeDesc {
            children: children.to_vec(),
            ..NodeDesc::default()
        }
    }

    #[test]
    fn given_valid_tree_when_building_then_every_node_is_linked_once() {
        let descs = vec![node(&[1, 4]), node(&[2, 3]), node(&[]), node(&[]), node(&[])];
        let graph = SceneGraph::build(&descs).expect("tree should build");

        assert_eq!(graph.root(), Some(NodeId(0)));
        for node in graph.nodes().skip(1) {
            let parent = node.parent.expect("non-root node has a parent");
            let occurrences = graph[parent]
                .children
                .iter()
                .filter(|child| child.0 == node.index)
                .count();
            assert_eq!(occurrences, 1);
        }

        let order: Vec<usize> = graph.pre_order().into_iter().map(|id| id.0).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn given_tree_when_walking_post_order_then_children_precede_parents() {
        let descs = vec![node(&[1, 4]), node(&[2, 3]), node(&[]), node(&[]), node(&[])];
        let graph = SceneGraph::build(&descs).expect("tree should build");

        let order: Vec<usize> = graph.post_order().into_iter().map(|id| id.0).collect();
        assert_eq!(order, vec![2, 3, 1, 4, 0]);
    }

    #[test]
    fn given_two_parentless_nodes_when_building_then_multiple_roots_error_is_returned() {
        let descs = vec![node(&[1]), node(&[]), node(&[])];
        let error = SceneGraph::build(&descs).expect_err("two roots");
        assert_eq!(error, HierarchyError::MultipleRoots { roots: vec![0, 2] });
    }

    #[test]
    fn given_root_at_other_index_when_building_then_error_is_returned() {
        let descs = vec![node(&[]), node(&[0])];
        let error = SceneGraph::build(&descs).expect_err("root is node 1");
        assert_eq!(error, HierarchyError::RootNotAtZero { index: 1 });
    }

    #[test]
    fn given_all_nodes_parented_when_building_then_no_root_error_is_returned() {
        let descs = vec![node(&[1]), node(&[0])];
        let error = SceneGraph::build(&descs).expect_err("cycle without root");
        assert_eq!(error, HierarchyError::NoRoot);
    }

    #[test]
    fn given_detached_cycle_when_building_then_cycle_error_is_returned() {
        let descs = vec![node(&[]), node(&[2]), node(&[1])];
        let error = SceneGraph::build(&descs).expect_err("cycle below nothing");
        assert_eq!(
            error,
            HierarchyError::Cycle {
                unreachable: vec![1, 2]
            }
        );
    }

    #[test]
    fn given_shared_child_when_building_then_multiple_parents_error_is_returned() {
        let descs = vec![node(&[1, 2]), node(&[3]), node(&[3]), node(&[])];
        let error = SceneGraph::build(&descs).expect_err("node 3 has two parents");
        assert_eq!(
            error,
            HierarchyError::MultipleParents {
                child: 3,
                first: 1,
                second: 2
            }
        );
    }

    #[test]
    fn given_out_of_range_child_when_building_then_error_is_returned() {
        let descs = vec![node(&[7])];
        let error = SceneGraph::build(&descs).expect_err("child 7 does not exist");
        assert_eq!(
            error,
            HierarchyError::ChildOutOfRange {
                parent: 0,
                child: 7,
                len: 1
            }
        );
    }

    #[test]
    fn given_unnamed_node_when_naming_then_positional_fallback_is_used() {
        let descs = vec![node(&[1]), node(&[])];
        let graph = SceneGraph::build(&descs).expect("tree should build");
        assert_eq!(graph[NodeId(1)].bone_name(), "_001");
    }
}
