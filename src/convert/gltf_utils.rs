use std::{path::Path, sync::Arc};

use anyhow::{Context, Result, bail};
use gltf::{
    Document, Semantic,
    accessor::{DataType, Dimensions},
    buffer::Data,
    import,
    scene::Transform,
};
use nalgebra::Matrix4;

use super::types::{
    MatrixBuffer, MeshDesc, NodeDesc, PrimitiveDesc, SceneDescription, SkinDesc, TransformSpec,
};

const MAT4_SIZE: usize = 64;

// ─── Matrix buffers ───────────────────────────────────────────────────────────

/// Decode every column-major `MAT4` float entry of a buffer run.
///
/// Entries that would read past the end of the buffer are dropped.
pub(super) fn read_matrix_buffer(buffer: &MatrixBuffer) -> Vec<Matrix4<f32>> {
    (0..buffer.count)
        .map_while(|index| read_mat4(&buffer.bytes, buffer.offset + index * buffer.stride))
        .collect()
}

fn read_mat4(bin: &[u8], offset: usize) -> Option<Matrix4<f32>> {
    let bytes = bin.get(offset..offset + MAT4_SIZE)?;
    let mut values = [0.0f32; 16];
    for (value, chunk) in values.iter_mut().zip(bytes.chunks_exact(4)) {
        *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Some(Matrix4::from_column_slice(&values))
}

// ─── glTF loading ─────────────────────────────────────────────────────────────

/// Read a glTF/GLB/VRM file into the flat scene description.
pub fn load_scene_description(path: &Path) -> Result<SceneDescription> {
    let (document, buffers, _images) =
        import(path).with_context(|| format!("failed to read glTF: {}", path.display()))?;
    scene_description_from_document(&document, buffers)
}

/// Build the flat scene description from an imported document.
pub fn scene_description_from_document(
    document: &Document,
    buffers: Vec<Data>,
) -> Result<SceneDescription> {
    let buffers: Vec<Arc<[u8]>> = buffers.into_iter().map(|data| Arc::from(data.0)).collect();

    let nodes = document
        .nodes()
        .map(|node| -> Result<NodeDesc> {
            let source = serde_json::to_value(&document.as_json().nodes[node.index()])
                .with_context(|| format!("failed to serialize node {} JSON", node.index()))?;
            Ok(NodeDesc {
                name: node.name().map(ToOwned::to_owned),
                children: node.children().map(|child| child.index()).collect(),
                mesh: node.mesh().map(|mesh| mesh.index()),
                skin: node.skin().map(|skin| skin.index()),
                transform: match node.transform() {
                    Transform::Matrix { matrix } => {
                        TransformSpec::Matrix(flatten_columns(&matrix))
                    }
                    Transform::Decomposed {
                        translation,
                        rotation,
                        scale,
                    } => TransformSpec::Trs {
                        translation: Some(translation),
                        rotation: Some(rotation),
                        scale: Some(scale),
                    },
                },
                source: Some(source),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let skins = document
        .skins()
        .map(|skin| -> Result<SkinDesc> {
            let inverse_bind_matrices = match skin.inverse_bind_matrices() {
                Some(accessor) => {
                    if accessor.dimensions() != Dimensions::Mat4
                        || accessor.data_type() != DataType::F32
                    {
                        bail!(
                            "skin {} inverse bind matrices must be MAT4 float (accessor {})",
                            skin.index(),
                            accessor.index()
                        );
                    }
                    let Some(view) = accessor.view() else {
                        bail!(
                            "skin {} inverse bind matrices use a sparse accessor, which is not supported",
                            skin.index()
                        );
                    };
                    let bytes = buffers
                        .get(view.buffer().index())
                        .cloned()
                        .with_context(|| format!("missing buffer {}", view.buffer().index()))?;
                    Some(MatrixBuffer {
                        bytes,
                        offset: view.offset() + accessor.offset(),
                        stride: view.stride().unwrap_or(MAT4_SIZE),
                        count: accessor.count(),
                    })
                }
                None => None,
            };

            Ok(SkinDesc {
                name: skin.name().map(ToOwned::to_owned),
                joints: skin.joints().map(|joint| joint.index()).collect(),
                skeleton: skin.skeleton().map(|node| node.index()),
                inverse_bind_matrices,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let meshes = document
        .meshes()
        .map(|mesh| MeshDesc {
            name: mesh.name().map(ToOwned::to_owned),
            primitives: mesh
                .primitives()
                .map(|primitive| {
                    let reader = primitive
                        .reader(|buffer| buffers.get(buffer.index()).map(|bytes| &bytes[..]));
                    PrimitiveDesc {
                        vertex_count: primitive
                            .get(&Semantic::Positions)
                            .map(|accessor| accessor.count())
                            .unwrap_or(0),
                        joints: reader
                            .read_joints(0)
                            .map(|joints| joints.into_u16().collect())
                            .unwrap_or_default(),
                        weights: reader
                            .read_weights(0)
                            .map(|weights| weights.into_f32().collect())
                            .unwrap_or_default(),
                        indices: reader
                            .read_indices()
                            .map(|indices| indices.into_u32().collect()),
                    }
                })
                .collect(),
        })
        .collect();

    Ok(SceneDescription {
        nodes,
        skins,
        meshes,
    })
}

fn flatten_columns(matrix: &[[f32; 4]; 4]) -> [f32; 16] {
    let mut values = [0.0f32; 16];
    for (column_index, column) in matrix.iter().enumerate() {
        values[column_index * 4..column_index * 4 + 4].copy_from_slice(column);
    }
    values
}
