//! Cyclic Coordinate Descent over a validated [`IkChain`].
//!
//! Each frame the solver runs the chain's fixed iteration count; within an
//! iteration it visits links nearest-to-effector first, rotating each link
//! so the effector swings toward the target, and refreshes the link's
//! subtree before moving on so later links observe the adjustment.
//!
//! Direction vectors are computed in the link bone's local frame (inverse
//! of its current world rotation), and the correction quaternion is
//! right-multiplied onto the bone's local rotation; the two are equivalent
//! to a world-frame pre-rotation about the world-space axis. There is no
//! convergence check and no failure path: degenerate geometry (zero-length
//! direction, parallel directions) skips the link for that iteration and
//! the bone keeps its previous rotation.

use nalgebra::{Quaternion, UnitQuaternion, UnitVector3, Vector3};

use rigkit_core::config::SolverSettings;
use rigkit_skeleton::Skeleton;

use crate::chain::{IkChain, IkLink};

/// The CCD engine. Stateless between frames; cheap to construct per solve.
#[derive(Debug, Clone)]
pub struct CcdSolver {
    falloff: f32,
    min_angle: f32,
}

impl CcdSolver {
    pub const fn new(settings: &SolverSettings) -> Self {
        Self {
            falloff: settings.falloff,
            min_angle: settings.min_angle,
        }
    }

    /// Run the chain's full iteration count against `target` (world space).
    ///
    /// Mutates the local rotation of every link bone and refreshes their
    /// subtrees; the caller must have refreshed world transforms before
    /// calling. Never fails for a chain that passed construction.
    pub fn solve(&self, chain: &IkChain, skeleton: &mut Skeleton, target: Vector3<f32>) {
        for _ in 0..chain.iterations() {
            // Rotation power starts full at the effector-adjacent link and
            // decays toward the chain root, every iteration.
            let mut power = 1.0_f32;
            for link in chain.links() {
                self.adjust_link(skeleton, link, chain.effector(), target, power, chain.max_angle());
                power *= self.falloff;
            }
        }
    }

    fn adjust_link(
        &self,
        skeleton: &mut Skeleton,
        link: &IkLink,
        effector: usize,
        target: Vector3<f32>,
        power: f32,
        max_angle: Option<f32>,
    ) {
        let bone_pos = skeleton.bone(link.bone).world_position();
        let effector_pos = skeleton.bone(effector).world_position();
        let inv_world = skeleton.bone(link.bone).world_rotation().inverse();

        // Degenerate when the target or the effector coincides with the
        // link bone; the link keeps its rotation this iteration.
        let Some(target_dir) = normalized(inv_world * (target - bone_pos)) else {
            return;
        };
        let Some(effector_dir) = normalized(inv_world * (effector_pos - bone_pos)) else {
            return;
        };

        let cos = target_dir.dot(&effector_dir).clamp(-1.0, 1.0);
        let mut angle = cos.acos() * power;
        if angle.abs() < self.min_angle {
            return;
        }
        if let Some(max) = max_angle {
            if angle >= max {
                angle = max;
            }
        }

        // Parallel directions leave no rotation plane.
        let Some(axis) = normalized(target_dir.cross(&effector_dir)) else {
            return;
        };

        let correction =
            UnitQuaternion::from_axis_angle(&UnitVector3::new_unchecked(axis), -angle);
        let mut rotation = skeleton.bone(link.bone).local_rotation() * correction;
        if let Some(hinge) = &link.hinge {
            rotation = project_onto_hinge(&rotation, hinge);
        }
        skeleton.set_local_rotation(link.bone, rotation);

        // Downstream bones (at least the effector) must see this link's
        // adjustment before the next link is visited.
        skeleton.refresh_subtree(link.bone);
    }
}

/// Collapse a rotation onto a fixed hinge axis, keeping the scalar part.
///
/// Follows the MMD convention: the X component of the axis is negated in
/// the rebuilt quaternion.
fn project_onto_hinge(
    rotation: &UnitQuaternion<f32>,
    hinge: &UnitVector3<f32>,
) -> UnitQuaternion<f32> {
    let c = rotation.w.min(1.0);
    let s = (1.0 - c * c).max(0.0).sqrt();
    UnitQuaternion::new_normalize(Quaternion::new(
        c,
        -hinge.x * s,
        hinge.y * s,
        hinge.z * s,
    ))
}

fn normalized(v: Vector3<f32>) -> Option<Vector3<f32>> {
    let norm = v.norm();
    if norm > 1.0e-8 {
        Some(v / norm)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
