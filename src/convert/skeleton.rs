use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::hierarchy::{NodeId, SceneGraph, SkinSlot};
use super::skinning::Skin;
use super::transform::{CoordinateRemap, world_translation, world_up};
use super::types::{DEFAULT_CONNECT_COSINE, DEFAULT_LEAF_BONE_LENGTH};
use crate::error::ImportError;
use crate::host::SceneHost;

const DIRECTION_EPSILON: f32 = 1e-6;

/// Where a bone's head comes from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoneHeadSource {
    /// The joint node's world translation in the imported hierarchy.
    #[default]
    NodeWorld,
    /// The translation of the inverted inverse bind matrix, falling back to
    /// the node position when the skin has no matrix for the joint.
    InverseBind,
}

#[derive(Debug, Clone, Copy)]
pub struct ArmatureOptions {
    pub connect_cosine_threshold: f32,
    pub leaf_bone_length: f32,
    pub head_source: BoneHeadSource,
    /// Maps inverse bind translations into host space.
    pub remap: CoordinateRemap,
}

impl Default for ArmatureOptions {
    fn default() -> Self {
        Self {
            connect_cosine_threshold: DEFAULT_CONNECT_COSINE,
            leaf_bone_length: DEFAULT_LEAF_BONE_LENGTH,
            head_source: BoneHeadSource::NodeWorld,
            remap: CoordinateRemap::IDENTITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArmatureSummary {
    pub armature_names: Vec<String>,
    pub bone_count: usize,
}

// ─── Armature synthesis ───────────────────────────────────────────────────────

/// Create armatures and bones for every skinned node, root first.
///
/// A skinned node joins its parent's armature when the parent is a joint of
/// the same skin and starts a new armature otherwise. Unskinned nodes create
/// nothing but are still walked, since joints may sit below them.
pub fn build_armatures<H: SceneHost>(
    graph: &mut SceneGraph,
    skins: &[Skin],
    options: &ArmatureOptions,
    host: &mut H,
) -> Result<ArmatureSummary, ImportError> {
    let mut builder = ArmatureBuilder {
        skins,
        options,
        host,
        summary: ArmatureSummary::default(),
    };

    let mut stack: Vec<(NodeId, bool)> = graph.root().map(|root| (root, false)).into_iter().collect();
    while let Some((id, connect)) = stack.pop() {
        let child_connects = match graph[id].skin {
            Some(slot) => builder.add_bone(graph, id, slot, connect)?,
            None => vec![false; graph[id].children.len()],
        };
        stack.extend(
            graph[id]
                .children
                .iter()
                .copied()
                .zip(child_connects)
                .rev(),
        );
    }

    Ok(builder.summary)
}

struct ArmatureBuilder<'a, H> {
    skins: &'a [Skin],
    options: &'a ArmatureOptions,
    host: &'a mut H,
    summary: ArmatureSummary,
}

impl<H: SceneHost> ArmatureBuilder<'_, H> {
    /// Create the bone for joint node `id` and return the connect flag of
    /// each of its children.
    fn add_bone(
        &mut self,
        graph: &mut SceneGraph,
        id: NodeId,
        slot: SkinSlot,
        connect: bool,
    ) -> Result<Vec<bool>, ImportError> {
        let node = &graph[id];
        let skin = self
            .skins
            .get(slot.skin)
            .ok_or_else(|| ImportError::InternalInvariant {
                node: node.index,
                detail: format!("skin {} was never resolved", slot.skin),
            })?;
        let node_name = node.bone_name();

        let parent_in_rig = node
            .parent
            .filter(|&parent| graph[parent].skin.is_some_and(|other| other.skin == slot.skin));
        let (armature, parent_bone) = match parent_in_rig {
            Some(parent) => {
                let parent = &graph[parent];
                match (parent.armature, parent.bone) {
                    (Some(armature), Some(bone)) => (armature, Some(bone)),
                    _ => {
                        return Err(ImportError::InternalInvariant {
                            node: node.index,
                            detail: format!(
                                "parent node {} is a joint of skin {} but has no bone yet",
                                parent.index, slot.skin
                            ),
                        });
                    }
                }
            }
            None => {
                let name = match skin.name.as_deref() {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => format!("armature{node_name}"),
                };
                let parent_object = node.parent.and_then(|parent| graph[parent].object);
                let armature = self.host.create_armature(&name, parent_object);
                debug!("created armature '{}' at node {}", name, node.index);
                self.summary.armature_names.push(name);
                (armature, None)
            }
        };

        let position = world_translation(&node.world);
        let head = match self.options.head_source {
            BoneHeadSource::NodeWorld => position,
            BoneHeadSource::InverseBind => skin
                .inverse_bind_matrix(slot.joint)
                .and_then(|inverse_bind| inverse_bind.try_inverse())
                .map(|bind| (self.options.remap.vector)(world_translation(&bind)))
                .unwrap_or(position),
        };

        // A weld onto a parent head at the same position would collapse the
        // parent bone, so such a child stays unconnected.
        let parent_head = parent_bone.map(|parent_bone| self.host.bone_head(parent_bone));
        let welded = connect
            && parent_head.is_some_and(|parent_head| (head - parent_head).norm() > DIRECTION_EPSILON);

        let bone = self.host.add_bone(armature, &node_name, parent_bone, welded);
        self.host.set_bone_head(bone, head);
        if welded && let Some(parent_bone) = parent_bone {
            self.host.set_bone_tail(parent_bone, head);
        }

        // Leaves continue the parent->self direction. Everything else starts
        // with a short bone along the node's up axis until a connected child
        // moves the tail.
        let extrapolated = match parent_head {
            Some(parent_head) if node.children.is_empty() => Some(head + (head - parent_head)),
            _ => None,
        };
        let tail = extrapolated
            .filter(|tail| (tail - head).norm() > DIRECTION_EPSILON)
            .unwrap_or_else(|| {
                head + world_up(&node.world).unwrap_or_else(Vector3::z) * self.options.leaf_bone_length
            });
        self.host.set_bone_tail(bone, tail);

        let connects = if node.children.len() == 1 {
            vec![true]
        } else {
            // Only the best aligned child above the threshold is welded; the
            // parent tail can sit on one head only.
            let parent_direction = (head - parent_head.unwrap_or_else(Vector3::zeros))
                .try_normalize(DIRECTION_EPSILON);
            let welded_child = node
                .children
                .iter()
                .enumerate()
                .filter_map(|(position_in_parent, &child)| {
                    let child_direction = (world_translation(&graph[child].world) - position)
                        .try_normalize(DIRECTION_EPSILON)?;
                    let cosine = parent_direction?.dot(&child_direction);
                    (cosine > self.options.connect_cosine_threshold)
                        .then_some((position_in_parent, cosine))
                })
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
                .map(|(position_in_parent, _)| position_in_parent);
            (0..node.children.len())
                .map(|position_in_parent| welded_child == Some(position_in_parent))
                .collect()
        };

        let node = &mut graph[id];
        node.armature = Some(armature);
        node.bone = Some(bone);
        self.summary.bone_count += 1;

        Ok(connects)
    }
}
