//! Grant (appendix-bone) resolution: bones inheriting a weighted fraction
//! of another bone's rotation.
//!
//! Resolution is recursive with a per-frame memo: resolving a bone first
//! resolves its source, so dependents always observe the source's final
//! post-grant rotation for the frame regardless of iteration order. The
//! memo must be cleared every frame ([`GrantResolver::begin_frame`]); a
//! stale entry would silently freeze that bone's grant contribution.
//!
//! Local-space rotation inheritance and position inheritance (either
//! space) are recognized configuration but deliberately unimplemented:
//! the bound bone keeps its animated value. Conformance tests assert the
//! no-op rather than silently-wrong output.

use std::collections::{BTreeMap, HashMap};

use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};

use rigkit_skeleton::Skeleton;

const fn default_ratio() -> f32 {
    1.0
}
const fn default_true() -> bool {
    true
}

/// Import-time grant record, as produced by the model parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantDescriptor {
    /// The bone that inherits.
    pub bone: usize,
    /// The bone whose rotation is partially inherited.
    pub source: usize,
    /// Inheritance weight; may exceed 1 or be negative.
    #[serde(default = "default_ratio")]
    pub ratio: f32,
    /// Inherit in the source's local space instead of world space.
    /// Currently a recognized no-op.
    #[serde(default)]
    pub is_local: bool,
    #[serde(default = "default_true")]
    pub affects_rotation: bool,
    /// Position inheritance is a recognized no-op.
    #[serde(default)]
    pub affects_position: bool,
}

/// A validated grant binding, keyed by the bound bone in the rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrantBinding {
    pub source: usize,
    pub ratio: f32,
    pub is_local: bool,
    pub affects_rotation: bool,
    pub affects_position: bool,
}

impl GrantBinding {
    pub fn from_descriptor(desc: &GrantDescriptor) -> Self {
        Self {
            source: desc.source,
            ratio: desc.ratio,
            is_local: desc.is_local,
            affects_rotation: desc.affects_rotation,
            affects_position: desc.affects_position,
        }
    }
}

/// Per-frame grant resolution over a binding set.
///
/// Owns the frame-scoped memo; one instance lives inside each
/// [`ConstraintRig`](crate::rig::ConstraintRig).
#[derive(Debug, Default)]
pub struct GrantResolver {
    /// Final local rotation per bone for the current frame. Holds entries
    /// for bound bones and for any bone another binding sourced from.
    resolved: HashMap<usize, UnitQuaternion<f32>>,
}

impl GrantResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the frame memo. Must run once at the start of every frame,
    /// before [`GrantResolver::resolve_all`].
    pub fn begin_frame(&mut self) {
        self.resolved.clear();
    }

    /// Resolve every binding for the frame, writing inherited rotations
    /// back to the skeleton's local rotations.
    ///
    /// The binding graph is acyclic by construction
    /// ([`ConstraintRig::new`](crate::rig::ConstraintRig::new) drops
    /// cyclic bindings), so recursion is bounded by the chain depth.
    pub fn resolve_all(
        &mut self,
        bindings: &BTreeMap<usize, GrantBinding>,
        skeleton: &mut Skeleton,
    ) {
        for &bone in bindings.keys() {
            self.resolve(bone, bindings, skeleton);
        }
    }

    fn resolve(
        &mut self,
        bone: usize,
        bindings: &BTreeMap<usize, GrantBinding>,
        skeleton: &mut Skeleton,
    ) -> UnitQuaternion<f32> {
        if let Some(&rotation) = self.resolved.get(&bone) {
            return rotation;
        }

        // Baseline: the bone's own (animated) rotation before any grant.
        let own = skeleton.bone(bone).local_rotation();
        self.resolved.insert(bone, own);

        let Some(binding) = bindings.get(&bone) else {
            return own;
        };

        if binding.affects_rotation && !binding.is_local {
            let source = self.resolve(binding.source, bindings, skeleton);
            // powf(ratio) is the slerp from identity by `ratio`, and
            // extrapolates naturally for ratios outside [0, 1].
            let delta = source.powf(binding.ratio);
            let granted = own * delta;
            skeleton.set_local_rotation(bone, granted);
            self.resolved.insert(bone, granted);
            return granted;
        }

        // Local-space rotation and position inheritance: recognized no-ops.
        own
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
