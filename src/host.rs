//! Host scene abstraction.
//!
//! The importer never owns the final scene. It drives a [`SceneHost`] that
//! creates objects, armatures, bones and vertex groups in whatever engine
//! consumes the result. [`MemoryScene`] records every call and is what the
//! CLI and the tests run against.

use std::collections::BTreeMap;

use nalgebra::Vector3;
use serde::Serialize;

use crate::convert::LocalTransform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArmatureId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BoneId(pub usize);

/// Operations the importer needs from the host scene graph.
pub trait SceneHost {
    /// Create an object holding mesh `mesh`, or an empty when `mesh` is `None`.
    fn create_object(&mut self, name: &str, mesh: Option<usize>) -> ObjectId;
    fn set_empty_display_size(&mut self, object: ObjectId, size: f32);
    fn set_parent(&mut self, child: ObjectId, parent: ObjectId);
    fn set_local_transform(&mut self, object: ObjectId, transform: &LocalTransform);
    /// Attach an arbitrary JSON value to the object under `key`.
    fn set_custom_property(&mut self, object: ObjectId, key: &str, value: serde_json::Value);
    /// True when the object carries geometry.
    fn object_has_data(&self, object: ObjectId) -> bool;
    /// Unlink the object from the scene and destroy it.
    fn remove_object(&mut self, object: ObjectId);

    /// Create an armature object with identity world transform.
    fn create_armature(&mut self, name: &str, parent: Option<ObjectId>) -> ArmatureId;
    fn add_bone(
        &mut self,
        armature: ArmatureId,
        name: &str,
        parent: Option<BoneId>,
        connect: bool,
    ) -> BoneId;
    fn bone_head(&self, bone: BoneId) -> Vector3<f32>;
    fn set_bone_head(&mut self, bone: BoneId, head: Vector3<f32>);
    fn set_bone_tail(&mut self, bone: BoneId, tail: Vector3<f32>);

    fn create_vertex_group(&mut self, object: ObjectId, name: &str);
    /// Assign `weight` to `vertex` in group `group`, replacing any earlier value.
    fn assign_vertex_weight(&mut self, object: ObjectId, group: &str, vertex: u32, weight: f32);
    /// Deform `object` by `armature`.
    fn add_armature_modifier(&mut self, object: ObjectId, armature: ArmatureId);
}

// ─── In-memory host ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SceneObject {
    pub name: String,
    pub mesh: Option<usize>,
    pub parent: Option<ObjectId>,
    pub translation: [f32; 3],
    /// `[x, y, z, w]`
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub empty_display_size: Option<f32>,
    pub vertex_groups: BTreeMap<String, BTreeMap<u32, f32>>,
    pub armature_modifiers: Vec<ArmatureId>,
    pub properties: BTreeMap<String, serde_json::Value>,
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneArmature {
    pub name: String,
    pub parent: Option<ObjectId>,
    pub bones: Vec<BoneId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneBone {
    pub name: String,
    pub armature: ArmatureId,
    pub parent: Option<BoneId>,
    pub connect: bool,
    pub head: [f32; 3],
    pub tail: [f32; 3],
}

/// A [`SceneHost`] that keeps everything in plain vectors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryScene {
    objects: Vec<SceneObject>,
    armatures: Vec<SceneArmature>,
    bones: Vec<SceneBone>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object(&self, id: ObjectId) -> &SceneObject {
        &self.objects[id.0]
    }

    /// Objects that were not removed.
    pub fn live_objects(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, object)| !object.removed)
            .map(|(index, object)| (ObjectId(index), object))
    }

    pub fn find_object(&self, name: &str) -> Option<(ObjectId, &SceneObject)> {
        self.live_objects().find(|(_, object)| object.name == name)
    }

    pub fn armatures(&self) -> &[SceneArmature] {
        &self.armatures
    }

    pub fn armature(&self, id: ArmatureId) -> &SceneArmature {
        &self.armatures[id.0]
    }

    pub fn bones(&self) -> &[SceneBone] {
        &self.bones
    }

    pub fn bone(&self, id: BoneId) -> &SceneBone {
        &self.bones[id.0]
    }

    pub fn find_bone(&self, name: &str) -> Option<(BoneId, &SceneBone)> {
        self.bones
            .iter()
            .enumerate()
            .find(|(_, bone)| bone.name == name)
            .map(|(index, bone)| (BoneId(index), bone))
    }

    pub fn vertex_weight(&self, object: ObjectId, group: &str, vertex: u32) -> Option<f32> {
        self.objects
            .get(object.0)?
            .vertex_groups
            .get(group)?
            .get(&vertex)
            .copied()
    }
}

impl SceneHost for MemoryScene {
    fn create_object(&mut self, name: &str, mesh: Option<usize>) -> ObjectId {
        self.objects.push(SceneObject {
            name: name.to_string(),
            mesh,
            parent: None,
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
            empty_display_size: None,
            vertex_groups: BTreeMap::new(),
            armature_modifiers: Vec::new(),
            properties: BTreeMap::new(),
            removed: false,
        });
        ObjectId(self.objects.len() - 1)
    }

    fn set_empty_display_size(&mut self, object: ObjectId, size: f32) {
        self.objects[object.0].empty_display_size = Some(size);
    }

    fn set_parent(&mut self, child: ObjectId, parent: ObjectId) {
        self.objects[child.0].parent = Some(parent);
    }

    fn set_local_transform(&mut self, object: ObjectId, transform: &LocalTransform) {
        let target = &mut self.objects[object.0];
        target.translation = transform.translation.into();
        let coords = transform.rotation.quaternion().coords;
        target.rotation = [coords.x, coords.y, coords.z, coords.w];
        target.scale = transform.scale.into();
    }

    fn set_custom_property(&mut self, object: ObjectId, key: &str, value: serde_json::Value) {
        self.objects[object.0]
            .properties
            .insert(key.to_string(), value);
    }

    fn object_has_data(&self, object: ObjectId) -> bool {
        self.objects[object.0].mesh.is_some()
    }

    fn remove_object(&mut self, object: ObjectId) {
        let target = &mut self.objects[object.0];
        target.removed = true;
        target.parent = None;
    }

    fn create_armature(&mut self, name: &str, parent: Option<ObjectId>) -> ArmatureId {
        self.armatures.push(SceneArmature {
            name: name.to_string(),
            parent,
            bones: Vec::new(),
        });
        ArmatureId(self.armatures.len() - 1)
    }

    fn add_bone(
        &mut self,
        armature: ArmatureId,
        name: &str,
        parent: Option<BoneId>,
        connect: bool,
    ) -> BoneId {
        let id = BoneId(self.bones.len());
        self.bones.push(SceneBone {
            name: name.to_string(),
            armature,
            parent,
            connect,
            head: [0.0; 3],
            tail: [0.0; 3],
        });
        self.armatures[armature.0].bones.push(id);
        id
    }

    fn bone_head(&self, bone: BoneId) -> Vector3<f32> {
        Vector3::from(self.bones[bone.0].head)
    }

    fn set_bone_head(&mut self, bone: BoneId, head: Vector3<f32>) {
        self.bones[bone.0].head = head.into();
    }

    fn set_bone_tail(&mut self, bone: BoneId, tail: Vector3<f32>) {
        self.bones[bone.0].tail = tail.into();
    }

    fn create_vertex_group(&mut self, object: ObjectId, name: &str) {
        self.objects[object.0]
            .vertex_groups
            .entry(name.to_string())
            .or_default();
    }

    fn assign_vertex_weight(&mut self, object: ObjectId, group: &str, vertex: u32, weight: f32) {
        self.objects[object.0]
            .vertex_groups
            .entry(group.to_string())
            .or_default()
            .insert(vertex, weight);
    }

    fn add_armature_modifier(&mut self, object: ObjectId, armature: ArmatureId) {
        self.objects[object.0].armature_modifiers.push(armature);
    }
}
