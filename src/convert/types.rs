use std::sync::Arc;

use serde::Serialize;

// ─── Heuristic constants ──────────────────────────────────────────────────────

/// Minimum cosine between the parent bone direction and a child direction for
/// the child bone to be welded to its parent's tail.
pub const DEFAULT_CONNECT_COSINE: f32 = 0.8;

/// Length of bones whose tail cannot be inferred from the hierarchy.
pub const DEFAULT_LEAF_BONE_LENGTH: f32 = 0.1;

/// Display size handed to the host for objects without mesh data.
pub const DEFAULT_EMPTY_DISPLAY_SIZE: f32 = 0.1;

// ─── Input model ──────────────────────────────────────────────────────────────

/// Raw node transform as stored in the source file.
///
/// glTF allows either a TRS triple (each part optional) or a full matrix,
/// never both on the same node.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformSpec {
    Trs {
        translation: Option<[f32; 3]>,
        /// Quaternion in `[x, y, z, w]` order.
        rotation: Option<[f32; 4]>,
        scale: Option<[f32; 3]>,
    },
    /// 16 floats, column-major.
    Matrix([f32; 16]),
}

impl Default for TransformSpec {
    fn default() -> Self {
        Self::Trs {
            translation: None,
            rotation: None,
            scale: None,
        }
    }
}

/// One entry of the flat node array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDesc {
    pub name: Option<String>,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
    pub transform: TransformSpec,
    /// The node's original JSON object, kept on the host object as-is.
    pub source: Option<serde_json::Value>,
}

/// Location of a run of column-major `MAT4` floats inside a binary buffer.
#[derive(Debug, Clone)]
pub struct MatrixBuffer {
    pub bytes: Arc<[u8]>,
    pub offset: usize,
    pub stride: usize,
    pub count: usize,
}

/// One entry of the flat skin array.
#[derive(Debug, Clone, Default)]
pub struct SkinDesc {
    pub name: Option<String>,
    /// Joint node indices. Per-vertex joint slots index into this list.
    pub joints: Vec<usize>,
    /// Node whose subtree holds the skeleton. Falls back to the first joint.
    pub skeleton: Option<usize>,
    pub inverse_bind_matrices: Option<MatrixBuffer>,
}

/// Skinning attributes of one mesh primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimitiveDesc {
    /// Number of vertices the primitive contributes to the host mesh.
    pub vertex_count: usize,
    /// `JOINTS_0`, one entry per vertex.
    pub joints: Vec<[u16; 4]>,
    /// `WEIGHTS_0`, one entry per vertex.
    pub weights: Vec<[f32; 4]>,
    /// Loop topology. `None` means non-indexed, vertices visited in order.
    pub indices: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshDesc {
    pub name: Option<String>,
    pub primitives: Vec<PrimitiveDesc>,
}

/// Already-parsed flat scene handed over by the file loader.
#[derive(Debug, Clone, Default)]
pub struct SceneDescription {
    pub nodes: Vec<NodeDesc>,
    pub skins: Vec<SkinDesc>,
    pub meshes: Vec<MeshDesc>,
}

// ─── Output ───────────────────────────────────────────────────────────────────

/// Summary returned by [`super::import_scene`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub node_count: usize,
    pub object_count: usize,
    pub armature_names: Vec<String>,
    pub bone_count: usize,
    pub skinned_mesh_count: usize,
    pub weight_assignment_count: usize,
    pub pruned_count: usize,
    /// `true` when pruning removed the root, leaving nothing in the scene.
    pub empty: bool,
}
