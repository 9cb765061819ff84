use std::{
    cell::OnceCell,
    collections::{HashMap, HashSet},
};

use log::{debug, warn};
use nalgebra::Matrix4;

use super::gltf_utils::read_matrix_buffer;
use super::hierarchy::{NodeId, SceneGraph, SkinSlot};
use super::types::{MatrixBuffer, MeshDesc, SkinDesc};
use crate::error::ImportError;
use crate::host::SceneHost;

// ─── Naming ───────────────────────────────────────────────────────────────────

/// Bone/object name for a node: its declared name, else `_NNN` from its index.
pub fn bone_name(name: Option<&str>, index: usize) -> String {
    match name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("_{index:03}"),
    }
}

// ─── Skins ────────────────────────────────────────────────────────────────────

/// A skin with validated node references.
///
/// Inverse bind matrices are decoded from the backing buffer on first access
/// and kept for the lifetime of the skin.
#[derive(Debug)]
pub struct Skin {
    pub index: usize,
    pub name: Option<String>,
    pub joints: Vec<NodeId>,
    pub skeleton: NodeId,
    inverse_bind_source: Option<MatrixBuffer>,
    inverse_bind_matrices: OnceCell<Vec<Matrix4<f32>>>,
}

impl Skin {
    pub fn from_desc(index: usize, desc: &SkinDesc, node_count: usize) -> Result<Self, ImportError> {
        let check = |node: usize| {
            if node < node_count {
                Ok(NodeId(node))
            } else {
                Err(ImportError::InvalidReference {
                    kind: "joint node",
                    index: node,
                    len: node_count,
                })
            }
        };

        let joints = desc
            .joints
            .iter()
            .map(|&joint| check(joint))
            .collect::<Result<Vec<_>, _>>()?;
        let skeleton = match desc.skeleton {
            Some(skeleton) => check(skeleton)?,
            None => *joints
                .first()
                .ok_or(ImportError::EmptySkin { skin: index })?,
        };

        Ok(Self {
            index,
            name: desc.name.clone(),
            joints,
            skeleton,
            inverse_bind_source: desc.inverse_bind_matrices.clone(),
            inverse_bind_matrices: OnceCell::new(),
        })
    }

    /// Inverse bind matrix of joint slot `joint`, in source (glTF) space.
    pub fn inverse_bind_matrix(&self, joint: usize) -> Option<Matrix4<f32>> {
        self.inverse_bind_matrices
            .get_or_init(|| {
                self.inverse_bind_source
                    .as_ref()
                    .map(read_matrix_buffer)
                    .unwrap_or_default()
            })
            .get(joint)
            .copied()
    }

    /// Whether the inverse bind matrices were decoded yet.
    pub fn inverse_bind_resolved(&self) -> bool {
        self.inverse_bind_matrices.get().is_some()
    }
}

pub fn resolve_skins(descs: &[SkinDesc], node_count: usize) -> Result<Vec<Skin>, ImportError> {
    descs
        .iter()
        .enumerate()
        .map(|(index, desc)| Skin::from_desc(index, desc, node_count))
        .collect()
}

/// Record, for every joint node, the single skin listing it.
pub fn bind_skin_membership(graph: &mut SceneGraph, skins: &[Skin]) -> Result<(), ImportError> {
    let mut memberships: HashMap<NodeId, Vec<SkinSlot>> = HashMap::new();
    for skin in skins {
        for (joint, &node) in skin.joints.iter().enumerate() {
            let slots = memberships.entry(node).or_default();
            // First occurrence within a skin wins.
            if slots.iter().all(|slot| slot.skin != skin.index) {
                slots.push(SkinSlot {
                    skin: skin.index,
                    joint,
                });
            }
        }
    }

    let mut joint_nodes: Vec<NodeId> = memberships.keys().copied().collect();
    joint_nodes.sort();
    for node in joint_nodes {
        let slots = &memberships[&node];
        if let [slot] = slots.as_slice() {
            graph[node].skin = Some(*slot);
        } else {
            return Err(ImportError::MultipleSkin {
                node: node.0,
                skins: slots.iter().map(|slot| slot.skin).collect(),
            });
        }
    }

    Ok(())
}

// ─── Vertex weights ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct VertexWeight {
    pub vertex: u32,
    pub bone: String,
    pub weight: f32,
}

/// Expand per-vertex joint/weight attributes into bone assignments.
///
/// Vertices are visited in loop order and only the first visit counts.
/// Zero weights are dropped. A repeated vertex/bone pair keeps the last weight.
/// Primitives are concatenated, so vertex indices are offset by the vertex
/// counts of the preceding primitives.
pub fn collect_vertex_weights(
    mesh_index: usize,
    mesh: &MeshDesc,
    bone_names: &[String],
) -> Result<Vec<VertexWeight>, ImportError> {
    let mut assignments: Vec<VertexWeight> = Vec::new();
    let mut positions: HashMap<(u32, usize), usize> = HashMap::new();
    let mut visited: HashSet<u32> = HashSet::new();
    let mut base: u32 = 0;

    for primitive in &mesh.primitives {
        let attribute_count = primitive.joints.len().min(primitive.weights.len());
        let primitive_base = base;
        let primitive_len = primitive.vertex_count.max(attribute_count);
        base = u32::try_from(primitive_len)
            .ok()
            .and_then(|len| base.checked_add(len))
            .ok_or(ImportError::InvalidReference {
                kind: "skinned vertex",
                index: primitive_len,
                len: u32::MAX as usize,
            })?;

        if attribute_count == 0 {
            continue;
        }

        let loops: Box<dyn Iterator<Item = u32> + '_> = match &primitive.indices {
            Some(indices) => Box::new(indices.iter().copied()),
            None => Box::new(0..attribute_count as u32),
        };

        for local in loops {
            let index = local as usize;
            let (Some(joints), Some(weights)) =
                (primitive.joints.get(index), primitive.weights.get(index))
            else {
                return Err(ImportError::InvalidReference {
                    kind: "skinned vertex",
                    index,
                    len: attribute_count,
                });
            };

            // `local` is below `attribute_count`, so this stays under `base`.
            let vertex = primitive_base + local;
            if !visited.insert(vertex) {
                continue;
            }

            for (&slot, &weight) in joints.iter().zip(weights) {
                // Unused lanes usually carry joint 0 with weight 0.
                if weight == 0.0 {
                    continue;
                }
                let slot = slot as usize;
                let Some(bone) = bone_names.get(slot) else {
                    return Err(ImportError::JointSlotOutOfRange {
                        mesh: mesh_index,
                        vertex: vertex as usize,
                        slot,
                        joint_count: bone_names.len(),
                    });
                };

                match positions.get(&(vertex, slot)) {
                    Some(&position) => assignments[position].weight = weight,
                    None => {
                        positions.insert((vertex, slot), assignments.len());
                        assignments.push(VertexWeight {
                            vertex,
                            bone: bone.clone(),
                            weight,
                        });
                    }
                }
            }
        }
    }

    Ok(assignments)
}

/// Totals produced by [`apply_skinning`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkinningSummary {
    pub skinned_meshes: usize,
    pub assignments: usize,
}

/// Create vertex groups and weights for every skinned mesh node and attach
/// the armature built for its skin.
pub fn apply_skinning<H: SceneHost>(
    graph: &SceneGraph,
    skins: &[Skin],
    meshes: &[MeshDesc],
    host: &mut H,
) -> Result<SkinningSummary, ImportError> {
    let mut summary = SkinningSummary::default();

    for node in graph.live_nodes() {
        let (Some(mesh_index), Some(skin_index)) = (node.mesh, node.mesh_skin) else {
            continue;
        };
        let skin = skins.get(skin_index).ok_or(ImportError::InvalidReference {
            kind: "skin",
            index: skin_index,
            len: skins.len(),
        })?;
        let mesh = meshes.get(mesh_index).ok_or(ImportError::InvalidReference {
            kind: "mesh",
            index: mesh_index,
            len: meshes.len(),
        })?;
        let object = node.object.ok_or_else(|| ImportError::InternalInvariant {
            node: node.index,
            detail: "skinned mesh node has no host object".to_string(),
        })?;

        let bone_names: Vec<String> = skin
            .joints
            .iter()
            .map(|&joint| graph[joint].bone_name())
            .collect();
        for name in &bone_names {
            host.create_vertex_group(object, name);
        }

        let weights = collect_vertex_weights(mesh_index, mesh, &bone_names)?;
        for assignment in &weights {
            host.assign_vertex_weight(object, &assignment.bone, assignment.vertex, assignment.weight);
        }
        debug!(
            "node {} mesh {}: {} weight assignments over {} bones",
            node.index,
            mesh_index,
            weights.len(),
            bone_names.len()
        );

        let armature = graph[skin.skeleton].armature.or_else(|| {
            skin.joints
                .iter()
                .find_map(|&joint| graph[joint].armature)
        });
        match armature {
            Some(armature) => host.add_armature_modifier(object, armature),
            None => warn!(
                "skin {} has no armature; mesh node {} is left undeformed",
                skin.index, node.index
            ),
        }

        summary.skinned_meshes += 1;
        summary.assignments += weights.len();
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::convert::types::{NodeDesc, PrimitiveDesc};

    fn names(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("bone{i}")).collect()
    }

    fn single_primitive(primitive: PrimitiveDesc) -> MeshDesc {
        MeshDesc {
            name: None,
            primitives: vec![primitive],
        }
    }

    #[test]
    fn given_declared_and_missing_names_when_naming_bones_then_fallback_is_zero_padded() {
        assert_eq!(bone_name(Some("Hips"), 4), "Hips");
        assert_eq!(bone_name(None, 7), "_007");
        assert_eq!(bone_name(Some(""), 42), "_042");
        assert_eq!(bone_name(None, 1234), "_1234");
    }

    #[test]
    fn given_zero_weight_lanes_when_collecting_then_only_nonzero_lanes_are_assigned() {
        let mesh = single_primitive(PrimitiveDesc {
            vertex_count: 1,
            joints: vec![[0, 3, 7, 0]],
            weights: vec![[0.0, 0.6, 0.4, 0.0]],
            indices: None,
        });

        let weights = collect_vertex_weights(0, &mesh, &names(8)).expect("weights");

        assert_eq!(
            weights,
            vec![
                VertexWeight {
                    vertex: 0,
                    bone: "bone3".to_string(),
                    weight: 0.6
                },
                VertexWeight {
                    vertex: 0,
                    bone: "bone7".to_string(),
                    weight: 0.4
                },
            ]
        );
    }

    #[test]
    fn given_shared_vertices_when_collecting_then_each_vertex_is_visited_once() {
        let mesh = single_primitive(PrimitiveDesc {
            vertex_count: 3,
            joints: vec![[0, 0, 0, 0], [1, 0, 0, 0], [1, 0, 0, 0]],
            weights: vec![[1.0, 0.0, 0.0, 0.0]; 3],
            indices: Some(vec![0, 1, 2, 2, 1, 0]),
        });

        let weights = collect_vertex_weights(0, &mesh, &names(2)).expect("weights");
        let vertices: Vec<u32> = weights.iter().map(|w| w.vertex).collect();
        assert_eq!(vertices, vec![0, 1, 2]);
    }

    #[test]
    fn given_repeated_joint_lane_when_collecting_then_last_weight_replaces() {
        let mesh = single_primitive(PrimitiveDesc {
            vertex_count: 1,
            joints: vec![[2, 2, 0, 0]],
            weights: vec![[0.3, 0.7, 0.0, 0.0]],
            indices: None,
        });

        let weights = collect_vertex_weights(0, &mesh, &names(3)).expect("weights");
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].weight, 0.7);
    }

    #[test]
    fn given_second_primitive_when_collecting_then_vertices_are_offset() {
        let mesh = MeshDesc {
            name: None,
            primitives: vec![
                PrimitiveDesc {
                    vertex_count: 2,
                    joints: vec![[0, 0, 0, 0]; 2],
                    weights: vec![[1.0, 0.0, 0.0, 0.0]; 2],
                    indices: None,
                },
                PrimitiveDesc {
                    vertex_count: 1,
                    joints: vec![[1, 0, 0, 0]],
                    weights: vec![[1.0, 0.0, 0.0, 0.0]],
                    indices: Some(vec![0]),
                },
            ],
        };

        let weights = collect_vertex_weights(0, &mesh, &names(2)).expect("weights");
        let last = weights.last().expect("three assignments");
        assert_eq!(last.vertex, 2);
        assert_eq!(last.bone, "bone1");
    }

    #[test]
    fn given_index_past_attributes_in_second_primitive_when_collecting_then_error_is_returned() {
        let mesh = MeshDesc {
            name: None,
            primitives: vec![
                PrimitiveDesc {
                    vertex_count: 1,
                    joints: vec![[0, 0, 0, 0]],
                    weights: vec![[1.0, 0.0, 0.0, 0.0]],
                    indices: None,
                },
                PrimitiveDesc {
                    vertex_count: 1,
                    joints: vec![[0, 0, 0, 0]],
                    weights: vec![[1.0, 0.0, 0.0, 0.0]],
                    indices: Some(vec![u32::MAX]),
                },
            ],
        };

        let error = collect_vertex_weights(0, &mesh, &names(1)).expect_err("index past attributes");
        assert_eq!(
            error,
            ImportError::InvalidReference {
                kind: "skinned vertex",
                index: u32::MAX as usize,
                len: 1
            }
        );
    }

    #[test]
    fn given_skin_without_joints_or_skeleton_when_resolving_then_empty_skin_error_is_returned() {
        let desc = SkinDesc {
            name: Some("Hair".to_string()),
            ..SkinDesc::default()
        };
        let error = Skin::from_desc(4, &desc, 3).expect_err("no joints");
        assert_eq!(error, ImportError::EmptySkin { skin: 4 });
    }

    #[test]
    fn given_slot_past_joint_list_when_collecting_then_error_is_returned() {
        let mesh = single_primitive(PrimitiveDesc {
            vertex_count: 1,
            joints: vec![[5, 0, 0, 0]],
            weights: vec![[1.0, 0.0, 0.0, 0.0]],
            indices: None,
        });

        let error = collect_vertex_weights(3, &mesh, &names(2)).expect_err("slot 5 of 2");
        assert_eq!(
            error,
            ImportError::JointSlotOutOfRange {
                mesh: 3,
                vertex: 0,
                slot: 5,
                joint_count: 2
            }
        );
    }

    #[test]
    fn given_node_in_two_skins_when_binding_then_multiple_skin_error_is_returned() {
        let descs = vec![
            NodeDesc {
                children: vec![1, 2],
                ..NodeDesc::default()
            },
            NodeDesc::default(),
            NodeDesc::default(),
        ];
        let mut graph = SceneGraph::build(&descs).expect("tree");
        let skins = resolve_skins(
            &[
                SkinDesc {
                    joints: vec![1, 2],
                    ..SkinDesc::default()
                },
                SkinDesc {
                    joints: vec![2],
                    ..SkinDesc::default()
                },
            ],
            graph.len(),
        )
        .expect("skins");

        let error = bind_skin_membership(&mut graph, &skins).expect_err("node 2 shared");
        assert_eq!(
            error,
            ImportError::MultipleSkin {
                node: 2,
                skins: vec![0, 1]
            }
        );
    }

    #[test]
    fn given_joint_list_when_binding_then_slots_follow_joint_order() {
        let descs = vec![
            NodeDesc {
                children: vec![1],
                ..NodeDesc::default()
            },
            NodeDesc {
                children: vec![2],
                ..NodeDesc::default()
            },
            NodeDesc::default(),
        ];
        let mut graph = SceneGraph::build(&descs).expect("tree");
        let skins = resolve_skins(
            &[SkinDesc {
                joints: vec![2, 1],
                ..SkinDesc::default()
            }],
            graph.len(),
        )
        .expect("skins");

        bind_skin_membership(&mut graph, &skins).expect("membership");

        assert_eq!(graph[NodeId(2)].skin, Some(SkinSlot { skin: 0, joint: 0 }));
        assert_eq!(graph[NodeId(1)].skin, Some(SkinSlot { skin: 0, joint: 1 }));
        assert_eq!(graph[NodeId(0)].skin, None);
        assert_eq!(skins[0].skeleton, NodeId(2));
    }

    #[test]
    fn given_matrix_buffer_when_first_requested_then_matrices_are_decoded_once() {
        let translation = Matrix4::new_translation(&nalgebra::Vector3::new(0.0, -1.5, 0.0));
        let mut bytes = Vec::new();
        for matrix in [Matrix4::<f32>::identity(), translation] {
            for value in matrix.as_slice() {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        let desc = SkinDesc {
            joints: vec![0, 1],
            inverse_bind_matrices: Some(MatrixBuffer {
                bytes: Arc::from(bytes),
                offset: 0,
                stride: 64,
                count: 2,
            }),
            ..SkinDesc::default()
        };
        let skin = Skin::from_desc(0, &desc, 2).expect("skin");

        assert!(!skin.inverse_bind_resolved());
        assert_eq!(skin.inverse_bind_matrix(1), Some(translation));
        assert!(skin.inverse_bind_resolved());
        assert_eq!(skin.inverse_bind_matrix(0), Some(Matrix4::identity()));
        assert_eq!(skin.inverse_bind_matrix(2), None);
    }

    #[test]
    fn given_joint_out_of_range_when_resolving_skin_then_error_is_returned() {
        let desc = SkinDesc {
            joints: vec![0, 9],
            ..SkinDesc::default()
        };
        let error = Skin::from_desc(0, &desc, 3).expect_err("joint 9 of 3");
        assert_eq!(
            error,
            ImportError::InvalidReference {
                kind: "joint node",
                index: 9,
                len: 3
            }
        );
    }
}
