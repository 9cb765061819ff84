use log::debug;

use super::hierarchy::{NodeId, SceneGraph};
use crate::host::SceneHost;

/// Remove structurally empty nodes, children before parents.
///
/// A node goes when it has no remaining children, no armature and no mesh
/// data on its host object. Removing a leaf can make its parent a leaf, so a
/// whole empty branch disappears in one call; running it again removes
/// nothing. Returns the number of nodes removed.
pub fn prune_empty_nodes<H: SceneHost>(graph: &mut SceneGraph, host: &mut H) -> usize {
    let mut pruned = 0;

    for id in graph.post_order() {
        if !is_prunable(graph, id, host) {
            continue;
        }
        if let Some(object) = graph[id].object {
            host.remove_object(object);
        }
        graph.detach(id);
        debug!("pruned empty node {}", id.0);
        pruned += 1;
    }

    if graph.root().is_none() && pruned > 0 {
        debug!("pruning removed the root; scene is empty");
    }
    pruned
}

fn is_prunable<H: SceneHost>(graph: &SceneGraph, id: NodeId, host: &H) -> bool {
    let node = &graph[id];
    if node.removed || !node.children.is_empty() || node.armature.is_some() {
        return false;
    }
    let has_data = node.mesh.is_some()
        || node
            .object
            .is_some_and(|object| host.object_has_data(object));
    !has_data
}
