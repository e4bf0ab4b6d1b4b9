//! Per-skeleton constraint registry and the once-per-frame entry point.
//!
//! [`ConstraintRig::new`] validates every chain and grant descriptor
//! against the skeleton, drops malformed entries with a warning, and
//! freezes the rest for the skeleton's lifetime. The only per-frame
//! mutable state is the grant resolver's memo and, for chains targeting
//! an external world position, the target set via
//! [`ConstraintRig::set_target`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use rigkit_core::config::SolverSettings;
use rigkit_core::error::RigError;
use rigkit_skeleton::Skeleton;

use crate::chain::{IkChain, IkChainDescriptor, IkGoal};
use crate::grant::{GrantBinding, GrantDescriptor, GrantResolver};
use crate::solver::CcdSolver;

/// All constraint configuration for one skeleton, as produced by the
/// model-import collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RigDescriptor {
    #[serde(default)]
    pub chains: Vec<IkChainDescriptor>,
    #[serde(default)]
    pub grants: Vec<GrantDescriptor>,
}

/// Validated constraint set for one skeleton.
#[derive(Debug)]
pub struct ConstraintRig {
    chains: Vec<IkChain>,
    /// Grant bindings keyed by the bound bone; BTreeMap for deterministic
    /// resolution order.
    bindings: BTreeMap<usize, GrantBinding>,
    resolver: GrantResolver,
    /// External world targets, keyed by chain index. Only consulted for
    /// chains with [`IkGoal::World`]; such a chain is skipped until a
    /// target is set.
    targets: HashMap<usize, Vector3<f32>>,
}

impl ConstraintRig {
    /// Validate a descriptor against a skeleton.
    ///
    /// Malformed chains and bindings are rejected individually (logged at
    /// `warn`); the rest of the rig solves normally. Grant bindings with a
    /// dangling source, a duplicate bound bone, or a dependency cycle are
    /// among the dropped.
    pub fn new(desc: &RigDescriptor, skeleton: &Skeleton) -> Self {
        let mut chains = Vec::with_capacity(desc.chains.len());
        for chain_desc in &desc.chains {
            match IkChain::new(chain_desc, skeleton) {
                Ok(chain) => chains.push(chain),
                Err(err) => {
                    warn!(effector = chain_desc.effector, %err, "dropping malformed IK chain");
                }
            }
        }

        let mut bindings = BTreeMap::new();
        for grant in &desc.grants {
            if !skeleton.contains(grant.bone) || !skeleton.contains(grant.source) {
                let err = RigError::DanglingGrantSource {
                    bone: grant.bone,
                    grant_source: grant.source,
                };
                warn!(%err, "dropping grant binding");
                continue;
            }
            if bindings
                .insert(grant.bone, GrantBinding::from_descriptor(grant))
                .is_some()
            {
                warn!(bone = grant.bone, "bone bound twice; keeping the later grant");
            }
        }

        for bone in cyclic_bindings(&bindings) {
            bindings.remove(&bone);
            let err = RigError::CyclicGrant { bone };
            warn!(%err, "dropping grant binding");
        }

        Self {
            chains,
            bindings,
            resolver: GrantResolver::new(),
            targets: HashMap::new(),
        }
    }

    /// Number of registered (valid) chains.
    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    /// Number of registered (valid) grant bindings.
    pub fn grant_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn chains(&self) -> &[IkChain] {
        &self.chains
    }

    /// Supply the world position for a chain whose goal is external.
    /// Ignored for chains that target a control bone.
    ///
    /// `chain_index` counts *registered* chains — descriptors dropped as
    /// malformed do not occupy an index, so it can differ from the
    /// descriptor's position in [`RigDescriptor::chains`]. Inspect
    /// [`ConstraintRig::chains`] (e.g. by effector bone) to recover the
    /// index when drops are possible.
    pub fn set_target(&mut self, chain_index: usize, target: Vector3<f32>) {
        self.targets.insert(chain_index, target);
    }

    /// Drop a chain's external target; the chain is skipped until a new
    /// one is set. Indexing follows [`ConstraintRig::set_target`].
    pub fn clear_target(&mut self, chain_index: usize) {
        self.targets.remove(&chain_index);
    }

    /// The per-frame solve: grants first (their rotations must be visible
    /// to IK), then every chain in registration order.
    ///
    /// Later chains see earlier chains' already-updated bones; when chains
    /// share link bones the combined result depends on registration order.
    pub fn solve_frame(&mut self, skeleton: &mut Skeleton, settings: &SolverSettings) {
        self.resolver.begin_frame();
        self.resolver.resolve_all(&self.bindings, skeleton);

        skeleton.refresh_world();

        let solver = CcdSolver::new(settings);
        for (index, chain) in self.chains.iter().enumerate() {
            let target = match chain.goal() {
                IkGoal::Bone(bone) => skeleton.bone(bone).world_position(),
                IkGoal::World => match self.targets.get(&index) {
                    Some(&target) => target,
                    None => continue,
                },
            };
            solver.solve(chain, skeleton, target);
        }
    }
}

/// Bones whose grant bindings sit on a dependency cycle.
///
/// Each bound bone has exactly one outgoing edge (to its source), so a
/// pointer walk with visit marks finds every cycle without recursion.
fn cyclic_bindings(bindings: &BTreeMap<usize, GrantBinding>) -> BTreeSet<usize> {
    #[derive(Debug, Clone, Copy)]
    enum Mark {
        OnPath,
        Explored,
    }

    let mut marks: HashMap<usize, Mark> = HashMap::new();
    let mut cyclic = BTreeSet::new();

    for &start in bindings.keys() {
        let mut path = Vec::new();
        let mut current = start;
        loop {
            match marks.get(&current).copied() {
                Some(Mark::Explored) => break,
                Some(Mark::OnPath) => {
                    let entry = path.iter().position(|&b| b == current);
                    // `current` is on this walk's path by construction
                    if let Some(entry) = entry {
                        cyclic.extend(path[entry..].iter().copied());
                    }
                    break;
                }
                None => {
                    marks.insert(current, Mark::OnPath);
                    path.push(current);
                    match bindings.get(&current) {
                        Some(binding) if bindings.contains_key(&binding.source) => {
                            current = binding.source;
                        }
                        _ => break,
                    }
                }
            }
        }
        for &bone in &path {
            marks.insert(bone, Mark::Explored);
        }
    }

    cyclic
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use rigkit_skeleton::BoneDescriptor;

    use crate::chain::IkLinkDescriptor;
    use crate::grant::GrantDescriptor;

    fn arm() -> Skeleton {
        Skeleton::from_descriptors(&[
            BoneDescriptor::new("root", -1, [0.0, 0.0, 0.0]),
            BoneDescriptor::new("upper_arm", 0, [0.0, 0.0, 0.0]),
            BoneDescriptor::new("fore_arm", 1, [1.0, 0.0, 0.0]),
            BoneDescriptor::new("hand", 2, [1.0, 0.0, 0.0]),
            BoneDescriptor::new("ik_control", 0, [0.0, 1.0, 0.0]),
        ])
        .unwrap()
    }

    fn grant(bone: usize, source: usize, ratio: f32) -> GrantDescriptor {
        GrantDescriptor {
            bone,
            source,
            ratio,
            is_local: false,
            affects_rotation: true,
            affects_position: false,
        }
    }

    fn hand_chain(target_bone: Option<usize>) -> IkChainDescriptor {
        IkChainDescriptor {
            effector: 3,
            target_bone,
            iterations: 10,
            max_angle: None,
            links: vec![IkLinkDescriptor::new(2), IkLinkDescriptor::new(1)],
        }
    }

    #[test]
    fn malformed_chain_dropped_rest_kept() {
        let skeleton = arm();
        let mut bad = hand_chain(None);
        bad.effector = 42;
        let rig = ConstraintRig::new(
            &RigDescriptor {
                chains: vec![bad, hand_chain(None)],
                grants: vec![],
            },
            &skeleton,
        );
        assert_eq!(rig.chain_count(), 1);
    }

    #[test]
    fn target_index_follows_registered_chains() {
        // A dropped descriptor does not occupy a chain index: index 0 is
        // the surviving chain, and setting its target drives it.
        let mut skeleton = arm();
        let mut bad = hand_chain(None);
        bad.effector = 42;
        let mut rig = ConstraintRig::new(
            &RigDescriptor {
                chains: vec![bad, hand_chain(None)],
                grants: vec![],
            },
            &skeleton,
        );
        assert_eq!(rig.chains()[0].effector(), 3);

        rig.set_target(0, Vector3::new(0.0, 1.0, 0.0));
        rig.solve_frame(&mut skeleton, &SolverSettings::default());
        let hand = skeleton.bone(3).world_position();
        assert!((hand - Vector3::new(0.0, 1.0, 0.0)).norm() < 0.01);
    }

    #[test]
    fn dangling_grant_dropped_rest_kept() {
        let skeleton = arm();
        let rig = ConstraintRig::new(
            &RigDescriptor {
                chains: vec![],
                grants: vec![grant(1, 99, 0.5), grant(2, 1, 0.5)],
            },
            &skeleton,
        );
        assert_eq!(rig.grant_count(), 1);
    }

    #[test]
    fn cyclic_grants_dropped() {
        let skeleton = arm();
        let rig = ConstraintRig::new(
            &RigDescriptor {
                chains: vec![],
                grants: vec![grant(1, 2, 0.5), grant(2, 1, 0.5), grant(3, 0, 0.5)],
            },
            &skeleton,
        );
        // The 1 <-> 2 cycle goes; the acyclic binding stays.
        assert_eq!(rig.grant_count(), 1);
    }

    #[test]
    fn self_cycle_dropped() {
        let skeleton = arm();
        let rig = ConstraintRig::new(
            &RigDescriptor {
                chains: vec![],
                grants: vec![grant(1, 1, 0.5)],
            },
            &skeleton,
        );
        assert_eq!(rig.grant_count(), 0);
    }

    #[test]
    fn chain_to_source_outside_cycle_kept() {
        let skeleton = arm();
        // 3 -> 2 -> 1, no cycle: all kept.
        let rig = ConstraintRig::new(
            &RigDescriptor {
                chains: vec![],
                grants: vec![grant(3, 2, 0.5), grant(2, 1, 0.5)],
            },
            &skeleton,
        );
        assert_eq!(rig.grant_count(), 2);
    }

    #[test]
    fn solve_frame_reaches_control_bone() {
        let mut skeleton = arm();
        let mut rig = ConstraintRig::new(
            &RigDescriptor {
                chains: vec![hand_chain(Some(4))],
                grants: vec![],
            },
            &skeleton,
        );
        rig.solve_frame(&mut skeleton, &SolverSettings::default());

        // ik_control sits at world (0, 1, 0)
        let hand = skeleton.bone(3).world_position();
        assert!((hand - Vector3::new(0.0, 1.0, 0.0)).norm() < 0.01);
        assert_relative_eq!(
            skeleton.bone(0).local_rotation().angle(),
            0.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn world_chain_skipped_until_target_set() {
        let mut skeleton = arm();
        let mut rig = ConstraintRig::new(
            &RigDescriptor {
                chains: vec![hand_chain(None)],
                grants: vec![],
            },
            &skeleton,
        );

        rig.solve_frame(&mut skeleton, &SolverSettings::default());
        assert_relative_eq!(skeleton.bone(3).world_position().x, 2.0, epsilon = 1e-6);

        rig.set_target(0, Vector3::new(0.0, 1.0, 0.0));
        rig.solve_frame(&mut skeleton, &SolverSettings::default());
        let hand = skeleton.bone(3).world_position();
        assert!((hand - Vector3::new(0.0, 1.0, 0.0)).norm() < 0.01);

        // Clearing the target freezes the pose again.
        rig.clear_target(0);
        let frozen = skeleton.bone(3).world_position();
        rig.solve_frame(&mut skeleton, &SolverSettings::default());
        assert_relative_eq!(
            (skeleton.bone(3).world_position() - frozen).norm(),
            0.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn grants_resolve_before_ik_each_frame() {
        // The control bone hangs off a pivot that inherits half the
        // spinner's rotation. The grant swings the control 45 degrees
        // before the chain solves, so the hand must chase the granted
        // position.
        let mut skeleton = Skeleton::from_descriptors(&[
            BoneDescriptor::new("root", -1, [0.0, 0.0, 0.0]),
            BoneDescriptor::new("upper_arm", 0, [0.0, 0.0, 0.0]),
            BoneDescriptor::new("fore_arm", 1, [1.0, 0.0, 0.0]),
            BoneDescriptor::new("hand", 2, [1.0, 0.0, 0.0]),
            BoneDescriptor::new("pivot", 0, [0.0, 0.0, 0.0]),
            BoneDescriptor::new("ik_control", 4, [0.0, 1.0, 0.0]),
            BoneDescriptor::new("spinner", 0, [0.0, 0.0, 0.0]),
        ])
        .unwrap();
        skeleton.set_local_rotation(
            6,
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2),
        );

        let mut rig = ConstraintRig::new(
            &RigDescriptor {
                chains: vec![hand_chain(Some(5))],
                grants: vec![grant(4, 6, 0.5)],
            },
            &skeleton,
        );
        rig.solve_frame(&mut skeleton, &SolverSettings::default());

        let expected = Vector3::new(
            -std::f32::consts::FRAC_1_SQRT_2,
            std::f32::consts::FRAC_1_SQRT_2,
            0.0,
        );
        let hand = skeleton.bone(3).world_position();
        assert!(
            (hand - expected).norm() < 0.01,
            "hand at {hand:?} did not chase the granted target"
        );
    }

    #[test]
    fn descriptor_from_toml() {
        let toml_src = r#"
            [[chains]]
            effector = 3
            target_bone = 4
            [[chains.links]]
            bone = 2
            [[chains.links]]
            bone = 1

            [[grants]]
            bone = 4
            source = 0
            ratio = 0.5
        "#;
        let desc: RigDescriptor = toml::from_str(toml_src).unwrap();
        assert_eq!(desc.chains.len(), 1);
        assert_eq!(desc.grants.len(), 1);
        assert_relative_eq!(desc.grants[0].ratio, 0.5);
    }
}
