mod gltf_utils;
mod hierarchy;
mod objects;
mod prune;
mod skeleton;
mod skinning;
mod transform;
mod types;

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::error::ImportError;
use crate::host::SceneHost;
use crate::logging::ResultExt;
use crate::settings::ImportSettings;

// Re-export public types for callers of this module.
pub use gltf_utils::{load_scene_description, scene_description_from_document};
pub use hierarchy::{Node, NodeId, SceneGraph, SkinSlot};
pub use objects::{SOURCE_JSON_PROPERTY, create_objects};
pub use prune::prune_empty_nodes;
pub use skeleton::{ArmatureOptions, ArmatureSummary, BoneHeadSource, build_armatures};
pub use skinning::{
    Skin, SkinningSummary, VertexWeight, apply_skinning, bind_skin_membership, bone_name,
    collect_vertex_weights, resolve_skins,
};
pub use transform::{
    AxisConversion, CoordinateRemap, LocalTransform, compose_world, decompose_matrix,
    resolve_local_transform, world_translation,
};
pub use types::{
    DEFAULT_CONNECT_COSINE, DEFAULT_EMPTY_DISPLAY_SIZE, DEFAULT_LEAF_BONE_LENGTH, ImportReport,
    MatrixBuffer, MeshDesc, NodeDesc, PrimitiveDesc, SceneDescription, SkinDesc, TransformSpec,
};

/// Result of a successful import: the linked graph, the resolved skins and a
/// summary of what was created in the host.
#[derive(Debug)]
pub struct ImportedScene {
    pub graph: SceneGraph,
    pub skins: Vec<Skin>,
    pub report: ImportReport,
}

// ─── Public API ───────────────────────────────────────────────────────────────

/// Load a glTF/GLB/VRM file and import it into `host`.
pub fn import_gltf_file<H: SceneHost>(
    input_path: &Path,
    settings: &ImportSettings,
    host: &mut H,
) -> Result<ImportedScene> {
    let description = load_scene_description(input_path)?;
    import_scene(&description, settings, host)
        .log_error(Some("scene import failed"))
        .with_context(|| format!("failed to import scene: {}", input_path.display()))
}

/// Run the full import pipeline against `host`.
///
/// Stages run in a fixed order: hierarchy, objects and world transforms, skin
/// membership, armatures, vertex weights, pruning. Any error aborts the
/// import; objects already created in the host are not rolled back.
pub fn import_scene<H: SceneHost>(
    description: &SceneDescription,
    settings: &ImportSettings,
    host: &mut H,
) -> Result<ImportedScene, ImportError> {
    validate_node_references(description)?;

    let mut graph = SceneGraph::build(&description.nodes)?;
    debug!("linked {} nodes into a tree", graph.len());

    let remap = settings.axis_conversion.remap();
    let object_count = create_objects(&mut graph, &remap, settings.empty_display_size, host);
    debug!("created {object_count} host objects");

    let skins = resolve_skins(&description.skins, graph.len())?;
    bind_skin_membership(&mut graph, &skins)?;

    let armatures = build_armatures(&mut graph, &skins, &settings.armature_options(), host)?;
    debug!(
        "built {} armatures with {} bones",
        armatures.armature_names.len(),
        armatures.bone_count
    );

    let skinning = apply_skinning(&graph, &skins, &description.meshes, host)?;

    let pruned_count = if settings.prune_empty {
        prune_empty_nodes(&mut graph, host)
    } else {
        0
    };

    let report = ImportReport {
        node_count: graph.len(),
        object_count,
        armature_names: armatures.armature_names,
        bone_count: armatures.bone_count,
        skinned_mesh_count: skinning.skinned_meshes,
        weight_assignment_count: skinning.assignments,
        pruned_count,
        empty: graph.root().is_none(),
    };
    info!(
        "imported {} nodes: {} armatures, {} bones, {} skinned meshes, {} pruned",
        report.node_count,
        report.armature_names.len(),
        report.bone_count,
        report.skinned_mesh_count,
        report.pruned_count
    );

    Ok(ImportedScene {
        graph,
        skins,
        report,
    })
}

fn validate_node_references(description: &SceneDescription) -> Result<(), ImportError> {
    for node in &description.nodes {
        if let Some(mesh) = node.mesh
            && mesh >= description.meshes.len()
        {
            return Err(ImportError::InvalidReference {
                kind: "mesh",
                index: mesh,
                len: description.meshes.len(),
            });
        }
        if let Some(skin) = node.skin
            && skin >= description.skins.len()
        {
            return Err(ImportError::InvalidReference {
                kind: "skin",
                index: skin,
                len: description.skins.len(),
            });
        }
    }
    Ok(())
}
