use thiserror::Error;

/// Structural problems found while linking the flat node array into a tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("node {parent} lists child {child}, but only {len} nodes exist")]
    ChildOutOfRange {
        parent: usize,
        child: usize,
        len: usize,
    },

    #[error("node {node} lists itself as a child")]
    SelfChild { node: usize },

    #[error("node {child} is a child of both node {first} and node {second}")]
    MultipleParents {
        child: usize,
        first: usize,
        second: usize,
    },

    #[error("scene has no root node")]
    NoRoot,

    #[error("scene has {} root nodes: {roots:?}", roots.len())]
    MultipleRoots { roots: Vec<usize> },

    #[error("scene root is node {index}, expected node 0")]
    RootNotAtZero { index: usize },

    #[error("nodes {unreachable:?} are not reachable from the root (cycle in children)")]
    Cycle { unreachable: Vec<usize> },
}

/// Fatal conditions that abort a scene import. There is no partial result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("invalid node hierarchy: {0}")]
    Hierarchy(#[from] HierarchyError),

    #[error("node {node} is a joint of multiple skins: {skins:?}")]
    MultipleSkin { node: usize, skins: Vec<usize> },

    #[error("skin {skin} has no joints and no skeleton root")]
    EmptySkin { skin: usize },

    #[error("internal invariant violated at node {node}: {detail}")]
    InternalInvariant { node: usize, detail: String },

    #[error("{kind} index {index} is out of range (count: {len})")]
    InvalidReference {
        kind: &'static str,
        index: usize,
        len: usize,
    },

    #[error(
        "mesh {mesh} vertex {vertex} references joint slot {slot}, but the skin has {joint_count} joints"
    )]
    JointSlotOutOfRange {
        mesh: usize,
        vertex: usize,
        slot: usize,
        joint_count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_multiple_roots_when_formatted_then_all_roots_are_listed() {
        let error = ImportError::from(HierarchyError::MultipleRoots { roots: vec![0, 4] });
        let message = error.to_string();
        assert!(message.contains("2 root nodes"));
        assert!(message.contains("[0, 4]"));
    }

    #[test]
    fn given_joint_slot_error_when_formatted_then_counts_are_included() {
        let error = ImportError::JointSlotOutOfRange {
            mesh: 1,
            vertex: 12,
            slot: 9,
            joint_count: 4,
        };
        let message = error.to_string();
        assert!(message.contains("slot 9"));
        assert!(message.contains("4 joints"));
    }
}
