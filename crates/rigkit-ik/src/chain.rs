//! IK chain configuration: descriptors, validation, and the immutable chain.
//!
//! An [`IkChain`] is built once per skeleton from an [`IkChainDescriptor`]
//! and is immutable afterward. Validation happens entirely here: the solve
//! path assumes every index is in range and every link is an ancestor of
//! the effector, in parent-chain order.

use nalgebra::{UnitVector3, Vector3};
use serde::{Deserialize, Serialize};

use rigkit_core::error::RigError;
use rigkit_skeleton::Skeleton;

const fn default_iterations() -> u32 {
    8
}

/// Import-time link record: bone index plus optional hinge axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IkLinkDescriptor {
    pub bone: usize,
    /// Fixed local rotation axis (e.g. a knee). Solved rotations for this
    /// link are projected onto the axis.
    #[serde(default)]
    pub hinge: Option<[f32; 3]>,
}

impl IkLinkDescriptor {
    pub fn new(bone: usize) -> Self {
        Self { bone, hinge: None }
    }

    pub fn with_hinge(bone: usize, hinge: [f32; 3]) -> Self {
        Self {
            bone,
            hinge: Some(hinge),
        }
    }
}

/// Import-time chain record, as produced by the model parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IkChainDescriptor {
    /// Bone whose world position is driven toward the target.
    pub effector: usize,
    /// Dedicated IK control bone whose world position defines the goal.
    /// `None` means the goal position is supplied externally each frame.
    #[serde(default)]
    pub target_bone: Option<usize>,
    /// Fixed solver pass count per frame (not convergence-driven).
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Optional upper clamp on a single link's per-iteration rotation.
    #[serde(default)]
    pub max_angle: Option<f32>,
    /// Links ordered nearest-to-effector first.
    pub links: Vec<IkLinkDescriptor>,
}

impl IkChainDescriptor {
    /// Build a descriptor by walking `chain_length` parents up from the
    /// effector, nearest first. Stops early at the root. The goal defaults
    /// to an external world position.
    pub fn from_effector_walk(skeleton: &Skeleton, effector: usize, chain_length: usize) -> Self {
        let links = skeleton
            .ancestors(effector)
            .take(chain_length)
            .map(IkLinkDescriptor::new)
            .collect();
        Self {
            effector,
            target_bone: None,
            iterations: default_iterations(),
            max_angle: None,
            links,
        }
    }
}

/// What a chain drives its effector toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IkGoal {
    /// Read this control bone's world position each frame.
    Bone(usize),
    /// Use an externally supplied world position.
    World,
}

/// A validated link: bone index plus optional normalized hinge axis.
#[derive(Debug, Clone)]
pub struct IkLink {
    pub bone: usize,
    pub hinge: Option<UnitVector3<f32>>,
}

/// A validated, immutable IK chain.
#[derive(Debug, Clone)]
pub struct IkChain {
    effector: usize,
    goal: IkGoal,
    links: Vec<IkLink>,
    iterations: u32,
    max_angle: Option<f32>,
}

impl IkChain {
    /// Validate a descriptor against a skeleton.
    ///
    /// # Errors
    ///
    /// - [`RigError::BoneOutOfRange`] for any out-of-range index.
    /// - [`RigError::EmptyChain`] if there are no links.
    /// - [`RigError::NotAnAncestor`] if a link is not on the effector's
    ///   parent chain.
    /// - [`RigError::LinkOutOfOrder`] if links are ancestors but not in
    ///   effector-to-root order.
    /// - [`RigError::DegenerateHinge`] for a zero-length hinge axis.
    pub fn new(desc: &IkChainDescriptor, skeleton: &Skeleton) -> Result<Self, RigError> {
        let bone_count = skeleton.len();
        let check_range = |index: usize| {
            if index < bone_count {
                Ok(())
            } else {
                Err(RigError::BoneOutOfRange { index, bone_count })
            }
        };

        check_range(desc.effector)?;
        if let Some(target) = desc.target_bone {
            check_range(target)?;
        }
        if desc.links.is_empty() {
            return Err(RigError::EmptyChain);
        }

        // Links must appear along the effector's parent chain, nearest
        // first. A single shared ancestor walk enforces both membership
        // and order.
        let mut ancestor_walk = skeleton.ancestors(desc.effector);
        let mut links = Vec::with_capacity(desc.links.len());
        for link in &desc.links {
            check_range(link.bone)?;
            if !ancestor_walk.by_ref().any(|a| a == link.bone) {
                return Err(if skeleton.is_ancestor(link.bone, desc.effector) {
                    RigError::LinkOutOfOrder { link: link.bone }
                } else {
                    RigError::NotAnAncestor {
                        link: link.bone,
                        effector: desc.effector,
                    }
                });
            }

            let hinge = match link.hinge {
                Some(axis) => Some(
                    UnitVector3::try_new(Vector3::from(axis), 1.0e-6)
                        .ok_or(RigError::DegenerateHinge { link: link.bone })?,
                ),
                None => None,
            };
            links.push(IkLink {
                bone: link.bone,
                hinge,
            });
        }

        Ok(Self {
            effector: desc.effector,
            goal: match desc.target_bone {
                Some(bone) => IkGoal::Bone(bone),
                None => IkGoal::World,
            },
            links,
            iterations: desc.iterations,
            max_angle: desc.max_angle,
        })
    }

    pub const fn effector(&self) -> usize {
        self.effector
    }

    pub const fn goal(&self) -> IkGoal {
        self.goal
    }

    /// Links in solve order (nearest to the effector first).
    pub fn links(&self) -> &[IkLink] {
        &self.links
    }

    pub const fn iterations(&self) -> u32 {
        self.iterations
    }

    pub const fn max_angle(&self) -> Option<f32> {
        self.max_angle
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
