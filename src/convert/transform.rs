use nalgebra::{Matrix3, Matrix4, Quaternion, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::types::TransformSpec;

const BASIS_EPSILON: f32 = 1e-8;

// ─── Coordinate conventions ───────────────────────────────────────────────────

/// Axis convention conversion applied to every node transform.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AxisConversion {
    /// Keep glTF's Y-up axes.
    None,
    /// Rotate +90° about X so that glTF +Y becomes +Z.
    #[default]
    YUpToZUp,
}

impl AxisConversion {
    pub fn remap(self) -> CoordinateRemap {
        match self {
            Self::None => CoordinateRemap::IDENTITY,
            Self::YUpToZUp => CoordinateRemap::Y_UP_TO_Z_UP,
        }
    }
}

/// Pure functions mapping source-space transform parts into host space.
///
/// Scale is remapped separately from vectors: an axis swap permutes scale
/// components, it does not rotate them.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateRemap {
    pub vector: fn(Vector3<f32>) -> Vector3<f32>,
    pub quaternion: fn(UnitQuaternion<f32>) -> UnitQuaternion<f32>,
    pub scale: fn(Vector3<f32>) -> Vector3<f32>,
}

impl CoordinateRemap {
    pub const IDENTITY: Self = Self {
        vector: keep_vector,
        quaternion: keep_quaternion,
        scale: keep_vector,
    };

    pub const Y_UP_TO_Z_UP: Self = Self {
        vector: y_up_to_z_up_vector,
        quaternion: y_up_to_z_up_quaternion,
        scale: swap_yz_scale,
    };
}

fn keep_vector(v: Vector3<f32>) -> Vector3<f32> {
    v
}

fn keep_quaternion(q: UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    q
}

fn y_up_to_z_up_vector(v: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(v.x, -v.z, v.y)
}

fn y_up_to_z_up_quaternion(q: UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    let q = q.quaternion();
    UnitQuaternion::new_unchecked(Quaternion::new(q.w, q.i, -q.k, q.j))
}

fn swap_yz_scale(s: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(s.x, s.z, s.y)
}

// ─── Local transforms ─────────────────────────────────────────────────────────

/// Canonical local transform applied to a host object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTransform {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl LocalTransform {
    /// `T * R * S`, the glTF composition order.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        let translation_matrix = Translation3::from(self.translation).to_homogeneous();
        let rotation_matrix = self.rotation.to_homogeneous();
        let scale_matrix = Matrix4::new_nonuniform_scaling(&self.scale);
        translation_matrix * rotation_matrix * scale_matrix
    }
}

/// Resolve a raw node transform into host-space translation/rotation/scale.
pub fn resolve_local_transform(spec: &TransformSpec, remap: &CoordinateRemap) -> LocalTransform {
    let source = match spec {
        TransformSpec::Matrix(values) => decompose_matrix(&Matrix4::from_column_slice(values)),
        TransformSpec::Trs {
            translation,
            rotation,
            scale,
        } => LocalTransform {
            translation: translation
                .map(Vector3::from)
                .unwrap_or_else(Vector3::zeros),
            rotation: rotation
                .map(|r| UnitQuaternion::from_quaternion(Quaternion::new(r[3], r[0], r[1], r[2])))
                .unwrap_or_else(UnitQuaternion::identity),
            scale: scale
                .map(Vector3::from)
                .unwrap_or_else(|| Vector3::new(1.0, 1.0, 1.0)),
        },
    };

    LocalTransform {
        translation: (remap.vector)(source.translation),
        rotation: (remap.quaternion)(source.rotation),
        scale: (remap.scale)(source.scale),
    }
}

/// Split an affine matrix into translation, rotation and non-uniform scale.
///
/// A zero-length basis column keeps zero scale on that axis and contributes
/// the unit axis to the rotation. A mirrored basis is folded into negative X
/// scale.
pub fn decompose_matrix(matrix: &Matrix4<f32>) -> LocalTransform {
    let translation = Vector3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]);

    let basis_x = Vector3::new(matrix[(0, 0)], matrix[(1, 0)], matrix[(2, 0)]);
    let basis_y = Vector3::new(matrix[(0, 1)], matrix[(1, 1)], matrix[(2, 1)]);
    let basis_z = Vector3::new(matrix[(0, 2)], matrix[(1, 2)], matrix[(2, 2)]);

    let mut scale_x = basis_x.norm();
    let scale_y = basis_y.norm();
    let scale_z = basis_z.norm();

    let mut rot_x = if scale_x > BASIS_EPSILON {
        basis_x / scale_x
    } else {
        Vector3::x()
    };
    let rot_y = if scale_y > BASIS_EPSILON {
        basis_y / scale_y
    } else {
        Vector3::y()
    };
    let rot_z = if scale_z > BASIS_EPSILON {
        basis_z / scale_z
    } else {
        Vector3::z()
    };

    if rot_x.cross(&rot_y).dot(&rot_z) < 0.0 {
        scale_x = -scale_x;
        rot_x = -rot_x;
    }

    let rotation_matrix = Matrix3::from_columns(&[rot_x, rot_y, rot_z]);
    LocalTransform {
        translation,
        rotation: UnitQuaternion::from_matrix(&rotation_matrix),
        scale: Vector3::new(scale_x, scale_y, scale_z),
    }
}

/// True when a raw matrix has a collapsed basis or non-finite entries.
pub fn matrix_is_degenerate(values: &[f32; 16]) -> bool {
    if values.iter().any(|value| !value.is_finite()) {
        return true;
    }
    let matrix = Matrix4::from_column_slice(values);
    matrix.fixed_view::<3, 3>(0, 0).into_owned().determinant().abs() <= BASIS_EPSILON
}

// ─── World transforms ─────────────────────────────────────────────────────────

pub fn compose_world(parent_world: Option<&Matrix4<f32>>, local: &LocalTransform) -> Matrix4<f32> {
    match parent_world {
        Some(parent) => parent * local.to_matrix(),
        None => local.to_matrix(),
    }
}

pub fn world_translation(world: &Matrix4<f32>) -> Vector3<f32> {
    Vector3::new(world[(0, 3)], world[(1, 3)], world[(2, 3)])
}

/// The node's local +Y axis expressed in world space, normalized.
pub fn world_up(world: &Matrix4<f32>) -> Option<Vector3<f32>> {
    Vector3::new(world[(0, 1)], world[(1, 1)], world[(2, 1)]).try_normalize(BASIS_EPSILON)
}
