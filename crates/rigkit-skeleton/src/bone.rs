//! Bone records: the import-time descriptor and the runtime bone.

use nalgebra::{Isometry3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

const fn default_parent() -> i32 {
    -1
}

/// Import-time bone record, as produced by the model parser.
///
/// `parent` uses the wire convention: −1 (or any negative value) marks a
/// root bone. `rest_position` is the bone's local rest-pose offset from its
/// parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneDescriptor {
    pub name: String,
    #[serde(default = "default_parent")]
    pub parent: i32,
    #[serde(default)]
    pub rest_position: [f32; 3],
}

impl BoneDescriptor {
    /// Convenience constructor for tests and programmatic rigs.
    pub fn new(name: impl Into<String>, parent: i32, rest_position: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            parent,
            rest_position,
        }
    }
}

/// A bone in a [`Skeleton`](crate::Skeleton).
///
/// Local scale is carried for the skinning stage but does not participate
/// in the kinematic composition; the solver preserves it verbatim.
#[derive(Debug, Clone)]
pub struct Bone {
    pub(crate) name: String,
    pub(crate) parent: Option<usize>,
    pub(crate) local_position: Vector3<f32>,
    pub(crate) local_rotation: UnitQuaternion<f32>,
    pub(crate) local_scale: Vector3<f32>,
    /// Cached world transform; valid only after a refresh.
    pub(crate) world: Isometry3<f32>,
}

impl Bone {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent bone index, `None` for a root bone.
    pub const fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub const fn local_position(&self) -> Vector3<f32> {
        self.local_position
    }

    pub const fn local_rotation(&self) -> UnitQuaternion<f32> {
        self.local_rotation
    }

    pub const fn local_scale(&self) -> Vector3<f32> {
        self.local_scale
    }

    /// Cached world transform (position + rotation).
    pub const fn world(&self) -> &Isometry3<f32> {
        &self.world
    }

    /// Cached world position.
    pub fn world_position(&self) -> Vector3<f32> {
        self.world.translation.vector
    }

    /// Cached world rotation.
    pub const fn world_rotation(&self) -> UnitQuaternion<f32> {
        self.world.rotation
    }
}
