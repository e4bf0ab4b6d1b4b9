//! Bevy ECS integration for the constraint solver.
//!
//! Provides [`RigkitIkPlugin`] which runs the grant + IK pass once per
//! frame in [`RigSet::Constrain`] — after keyframe animation
//! ([`RigSet::Animate`]), before skinning reads the pose
//! ([`RigSet::Skin`]).
//!
//! # Usage
//!
//! 1. Add [`RigkitCorePlugin`](rigkit_core::RigkitCorePlugin), then
//!    [`RigkitIkPlugin`].
//! 2. Register each imported skeleton with
//!    [`ConstraintRigMap::build_and_insert`].
//! 3. For chains driven by an external world position, call
//!    [`ConstraintRigMap::set_target`] whenever the goal moves.

use std::collections::HashMap;

use bevy::prelude::*;
use nalgebra::Vector3;

use rigkit_core::config::SolverSettings;
use rigkit_core::types::RigId;
use rigkit_core::RigSet;
use rigkit_skeleton::{BoneDescriptor, Skeleton};

use crate::rig::{ConstraintRig, RigDescriptor};

/// Bevy plugin that adds the per-frame constraint pass.
///
/// Requires [`RigkitCorePlugin`](rigkit_core::RigkitCorePlugin) to be
/// added first (it provides [`SolverSettings`] and the [`RigSet`]
/// ordering).
pub struct RigkitIkPlugin;

impl Plugin for RigkitIkPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ConstraintRigMap>()
            .add_systems(Update, constraint_solve_system.in_set(RigSet::Constrain));
    }
}

/// Per-skeleton entry: the skeleton, its validated constraints, and a
/// pause toggle.
#[derive(Debug)]
pub struct RigEntry {
    pub skeleton: Skeleton,
    pub rig: ConstraintRig,
    /// Paused rigs keep whatever pose the animation layer wrote.
    pub enabled: bool,
}

/// Resource mapping [`RigId`] to its skeleton and constraint set.
#[derive(Resource, Debug, Default)]
pub struct ConstraintRigMap {
    rigs: HashMap<RigId, RigEntry>,
}

impl ConstraintRigMap {
    /// Insert a pre-built entry for a rig.
    pub fn insert(&mut self, rig_id: RigId, entry: RigEntry) {
        self.rigs.insert(rig_id, entry);
    }

    /// Build the skeleton and its constraint rig from import descriptors,
    /// then register them.
    ///
    /// Returns `false` (registering nothing) if the bone list itself is
    /// malformed; individual bad chains/bindings are dropped inside
    /// [`ConstraintRig::new`] instead.
    pub fn build_and_insert(
        &mut self,
        rig_id: RigId,
        bones: &[BoneDescriptor],
        desc: &RigDescriptor,
    ) -> bool {
        let Ok(skeleton) = Skeleton::from_descriptors(bones) else {
            return false;
        };
        let rig = ConstraintRig::new(desc, &skeleton);
        self.rigs.insert(
            rig_id,
            RigEntry {
                skeleton,
                rig,
                enabled: true,
            },
        );
        true
    }

    /// Supply the world position for one of a rig's external-goal chains.
    ///
    /// `chain_index` counts registered chains; see
    /// [`ConstraintRig::set_target`] for how dropped descriptors affect it.
    pub fn set_target(&mut self, rig_id: RigId, chain_index: usize, target: Vector3<f32>) {
        if let Some(entry) = self.rigs.get_mut(&rig_id) {
            entry.rig.set_target(chain_index, target);
        }
    }

    /// Drop a chain's external target; the chain skips until a new one is
    /// set.
    pub fn clear_target(&mut self, rig_id: RigId, chain_index: usize) {
        if let Some(entry) = self.rigs.get_mut(&rig_id) {
            entry.rig.clear_target(chain_index);
        }
    }

    /// Pause or resume the constraint pass for one rig.
    pub fn set_enabled(&mut self, rig_id: RigId, enabled: bool) {
        if let Some(entry) = self.rigs.get_mut(&rig_id) {
            entry.enabled = enabled;
        }
    }

    pub fn get(&self, rig_id: RigId) -> Option<&RigEntry> {
        self.rigs.get(&rig_id)
    }

    pub fn get_mut(&mut self, rig_id: RigId) -> Option<&mut RigEntry> {
        self.rigs.get_mut(&rig_id)
    }
}

/// System that runs the constraint pass for every enabled rig.
#[allow(clippy::needless_pass_by_value)]
pub fn constraint_solve_system(
    mut rigs: ResMut<ConstraintRigMap>,
    settings: Res<SolverSettings>,
) {
    if !settings.enabled {
        return;
    }
    for entry in rigs.rigs.values_mut() {
        if !entry.enabled {
            continue;
        }
        entry.rig.solve_frame(&mut entry.skeleton, &settings);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
