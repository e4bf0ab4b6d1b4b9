//! The bone hierarchy and its world-transform bookkeeping.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

use rigkit_core::error::RigError;

use crate::bone::{Bone, BoneDescriptor};

/// An indexed bone tree.
///
/// Bones are stored in import order; construction enforces that every
/// bone's parent has a smaller index, so [`Skeleton::refresh_world`] is a
/// single forward pass and the tree is acyclic by construction.
#[derive(Debug, Clone)]
pub struct Skeleton {
    bones: Vec<Bone>,
    /// Child adjacency, index-aligned with `bones`. Drives subtree refresh.
    children: Vec<Vec<usize>>,
}

impl Skeleton {
    /// Build a skeleton from import-time descriptors.
    ///
    /// # Errors
    ///
    /// [`RigError::ParentOutOfOrder`] if a bone's parent index is not
    /// strictly smaller than its own (roots use a negative parent index).
    pub fn from_descriptors(descs: &[BoneDescriptor]) -> Result<Self, RigError> {
        let mut bones = Vec::with_capacity(descs.len());
        let mut children = vec![Vec::new(); descs.len()];

        for (index, desc) in descs.iter().enumerate() {
            let parent = if desc.parent < 0 {
                None
            } else {
                let parent = desc.parent as usize;
                if parent >= index {
                    return Err(RigError::ParentOutOfOrder {
                        bone: index,
                        parent,
                    });
                }
                children[parent].push(index);
                Some(parent)
            };

            bones.push(Bone {
                name: desc.name.clone(),
                parent,
                local_position: Vector3::from(desc.rest_position),
                local_rotation: UnitQuaternion::identity(),
                local_scale: Vector3::new(1.0, 1.0, 1.0),
                world: Isometry3::identity(),
            });
        }

        let mut skeleton = Self { bones, children };
        skeleton.refresh_world();
        Ok(skeleton)
    }

    /// Number of bones.
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Whether `index` names a bone.
    pub fn contains(&self, index: usize) -> bool {
        index < self.bones.len()
    }

    /// Access a bone. Panics if `index` is out of range; constraint
    /// configuration validates indices up front.
    pub fn bone(&self, index: usize) -> &Bone {
        &self.bones[index]
    }

    /// Find a bone index by name (first match).
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Overwrite a bone's local rotation. Does not refresh world
    /// transforms; callers batch refreshes explicitly.
    pub fn set_local_rotation(&mut self, index: usize, rotation: UnitQuaternion<f32>) {
        self.bones[index].local_rotation = rotation;
    }

    /// Overwrite a bone's local position. Does not refresh world transforms.
    pub fn set_local_position(&mut self, index: usize, position: Vector3<f32>) {
        self.bones[index].local_position = position;
    }

    /// Overwrite a bone's local scale. Scale is carried for skinning only.
    pub fn set_local_scale(&mut self, index: usize, scale: Vector3<f32>) {
        self.bones[index].local_scale = scale;
    }

    /// Recompute every bone's world transform, parents before children.
    pub fn refresh_world(&mut self) {
        for index in 0..self.bones.len() {
            self.recompute_one(index);
        }
    }

    /// Recompute world transforms for `root` and all of its descendants.
    ///
    /// Used by the CCD solver after rotating a link, so downstream bones
    /// (at least the effector) observe the adjustment within the same
    /// iteration.
    pub fn refresh_subtree(&mut self, root: usize) {
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            self.recompute_one(index);
            stack.extend_from_slice(&self.children[index]);
        }
    }

    fn recompute_one(&mut self, index: usize) {
        let local = Isometry3::from_parts(
            Translation3::from(self.bones[index].local_position),
            self.bones[index].local_rotation,
        );
        self.bones[index].world = match self.bones[index].parent {
            Some(parent) => self.bones[parent].world * local,
            None => local,
        };
    }

    /// Iterate ancestor indices of `bone`, nearest first.
    pub fn ancestors(&self, bone: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.bones[bone].parent, move |&i| self.bones[i].parent)
    }

    /// Whether `ancestor` lies on the parent chain of `bone`.
    pub fn is_ancestor(&self, ancestor: usize, bone: usize) -> bool {
        self.ancestors(bone).any(|i| i == ancestor)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn three_bone_chain() -> Skeleton {
        // root at origin, each child 1 unit along +X
        Skeleton::from_descriptors(&[
            BoneDescriptor::new("root", -1, [0.0, 0.0, 0.0]),
            BoneDescriptor::new("mid", 0, [1.0, 0.0, 0.0]),
            BoneDescriptor::new("tip", 1, [1.0, 0.0, 0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn build_and_rest_world_positions() {
        let skeleton = three_bone_chain();
        assert_eq!(skeleton.len(), 3);
        assert_relative_eq!(skeleton.bone(2).world_position().x, 2.0, epsilon = 1e-6);
        assert_relative_eq!(skeleton.bone(2).world_position().y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn parent_after_child_rejected() {
        let err = Skeleton::from_descriptors(&[
            BoneDescriptor::new("a", 1, [0.0; 3]),
            BoneDescriptor::new("b", -1, [0.0; 3]),
        ])
        .unwrap_err();
        assert_eq!(err, RigError::ParentOutOfOrder { bone: 0, parent: 1 });
    }

    #[test]
    fn self_parent_rejected() {
        let err =
            Skeleton::from_descriptors(&[BoneDescriptor::new("a", 0, [0.0; 3])]).unwrap_err();
        assert!(matches!(err, RigError::ParentOutOfOrder { .. }));
    }

    #[test]
    fn rotation_propagates_after_refresh() {
        let mut skeleton = three_bone_chain();
        // Rotate root 90 degrees about +Z: the chain folds onto +Y.
        let rot = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        skeleton.set_local_rotation(0, rot);

        // No refresh yet: cached world positions are stale by design.
        assert_relative_eq!(skeleton.bone(2).world_position().x, 2.0, epsilon = 1e-6);

        skeleton.refresh_world();
        assert_relative_eq!(skeleton.bone(2).world_position().x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(skeleton.bone(2).world_position().y, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn subtree_refresh_skips_siblings() {
        let mut skeleton = Skeleton::from_descriptors(&[
            BoneDescriptor::new("root", -1, [0.0, 0.0, 0.0]),
            BoneDescriptor::new("left", 0, [1.0, 0.0, 0.0]),
            BoneDescriptor::new("right", 0, [-1.0, 0.0, 0.0]),
            BoneDescriptor::new("left_tip", 1, [1.0, 0.0, 0.0]),
        ])
        .unwrap();

        let rot = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        skeleton.set_local_rotation(1, rot);
        skeleton.set_local_rotation(2, rot);
        skeleton.refresh_subtree(1);

        // left_tip moved with its parent...
        assert_relative_eq!(skeleton.bone(3).world_position().y, 1.0, epsilon = 1e-5);
        // ...but the un-refreshed sibling subtree kept its cached transform.
        assert_relative_eq!(
            skeleton.bone(2).world_rotation().angle(),
            0.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn ancestors_walk_nearest_first() {
        let skeleton = three_bone_chain();
        let chain: Vec<usize> = skeleton.ancestors(2).collect();
        assert_eq!(chain, vec![1, 0]);
        assert!(skeleton.is_ancestor(0, 2));
        assert!(!skeleton.is_ancestor(2, 0));
    }

    #[test]
    fn bone_index_by_name() {
        let skeleton = three_bone_chain();
        assert_eq!(skeleton.bone_index("mid"), Some(1));
        assert_eq!(skeleton.bone_index("missing"), None);
    }

    #[test]
    fn scale_untouched_by_refresh() {
        let mut skeleton = three_bone_chain();
        skeleton.set_local_scale(1, Vector3::new(1.0, 2.0, 0.5));
        skeleton.refresh_world();
        assert_eq!(skeleton.bone(1).local_scale(), Vector3::new(1.0, 2.0, 0.5));
    }
}
