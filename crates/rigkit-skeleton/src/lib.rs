//! Indexed bone hierarchy for the rigkit constraint solver.
//!
//! A [`Skeleton`] is a flat, index-addressed bone tree with per-bone local
//! position/rotation/scale and a cached world transform. World transforms
//! are recomputed on request ([`Skeleton::refresh_world`] /
//! [`Skeleton::refresh_subtree`]), never automatically on mutation — the
//! constraint pass decides when a recompute is needed.
//!
//! # Architecture
//!
//! ```text
//! [BoneDescriptor] ──► Skeleton ──► world transforms ──► skinning
//! ```
//!
//! Descriptors come from the model-import collaborator (bone name, parent
//! index with −1 meaning root, rest position). Construction validates that
//! parents precede their children in index order, which makes a full world
//! refresh a single forward pass.

pub mod bone;
pub mod skeleton;

pub use bone::{Bone, BoneDescriptor};
pub use skeleton::Skeleton;

pub mod prelude {
    pub use crate::{Bone, BoneDescriptor, Skeleton};
}
