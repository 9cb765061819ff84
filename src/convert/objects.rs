use log::{debug, warn};

use super::hierarchy::SceneGraph;
use super::transform::{
    CoordinateRemap, compose_world, matrix_is_degenerate, resolve_local_transform,
};
use super::types::TransformSpec;
use crate::host::SceneHost;

/// Host property holding a node's original glTF JSON.
pub const SOURCE_JSON_PROPERTY: &str = "gltf_node";

/// Create one host object per node, root first.
///
/// Local transforms are resolved through `remap` and world matrices are
/// propagated down the tree in the same pass, so every node's `world` reflects
/// its full ancestor chain once this returns.
pub fn create_objects<H: SceneHost>(
    graph: &mut SceneGraph,
    remap: &CoordinateRemap,
    empty_display_size: f32,
    host: &mut H,
) -> usize {
    let mut created = 0;

    for id in graph.pre_order() {
        let node = &graph[id];
        if let TransformSpec::Matrix(values) = &node.transform
            && matrix_is_degenerate(values)
        {
            warn!(
                "node {} has a degenerate matrix; decomposed scale/rotation may be meaningless",
                node.index
            );
        }

        let local = resolve_local_transform(&node.transform, remap);
        let parent = node.parent.map(|parent| (graph[parent].object, graph[parent].world));
        let world = compose_world(parent.as_ref().map(|(_, world)| world), &local);

        let name = node.bone_name();
        let object = host.create_object(&name, node.mesh);
        if node.mesh.is_none() {
            host.set_empty_display_size(object, empty_display_size);
        }
        if let Some((Some(parent_object), _)) = parent {
            host.set_parent(object, parent_object);
        }
        host.set_local_transform(object, &local);
        if let Some(source) = &node.source {
            host.set_custom_property(object, SOURCE_JSON_PROPERTY, source.clone());
        }
        debug!("created object '{}' for node {}", name, node.index);

        let node = &mut graph[id];
        node.object = Some(object);
        node.world = world;
        created += 1;
    }

    created
}
