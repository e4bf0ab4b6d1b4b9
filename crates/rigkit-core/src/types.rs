use serde::{Deserialize, Serialize};

/// Identifier for a rigged skeleton instance.
///
/// Used as the key in the constraint-rig registry; assigned by whoever
/// imports/attaches the skeleton.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RigId(pub u64);

impl std::fmt::Display for RigId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rig#{}", self.0)
    }
}
