//! Skeletal constraint solver: CCD inverse kinematics and rotation grants.
//!
//! Runs once per frame over a [`Skeleton`](rigkit_skeleton::Skeleton),
//! after keyframe animation and before skinning:
//!
//! ```text
//! RigDescriptor ──► ConstraintRig ──► solve_frame ──► final pose
//!                       │
//!                       ├── GrantResolver  (inherited rotations first)
//!                       └── CcdSolver      (one pass per registered chain)
//! ```
//!
//! Chains and grant bindings are validated when the rig is built
//! ([`ConstraintRig::new`]); malformed entries are dropped there and the
//! per-frame solve path is infallible.
//!
//! # Solver conventions
//!
//! This implementation fixes the CCD variant as follows: direction vectors
//! are rotated into the link bone's local frame (inverse of its current
//! world rotation) before the corrective axis/angle is computed, and the
//! correction is right-multiplied onto the bone's local rotation. Links run
//! in configured order, nearest to the effector first, with the rotation
//! power decaying per link within each iteration.

pub mod chain;
pub mod grant;
pub mod plugin;
pub mod rig;
pub mod solver;

pub use chain::{IkChain, IkChainDescriptor, IkGoal, IkLink, IkLinkDescriptor};
pub use grant::{GrantBinding, GrantDescriptor, GrantResolver};
pub use plugin::{ConstraintRigMap, RigEntry, RigkitIkPlugin};
pub use rig::{ConstraintRig, RigDescriptor};
pub use solver::CcdSolver;

pub mod prelude {
    pub use crate::chain::{IkChain, IkChainDescriptor, IkGoal, IkLinkDescriptor};
    pub use crate::grant::{GrantDescriptor, GrantResolver};
    pub use crate::plugin::{ConstraintRigMap, RigkitIkPlugin};
    pub use crate::rig::{ConstraintRig, RigDescriptor};
    pub use crate::solver::CcdSolver;
}
