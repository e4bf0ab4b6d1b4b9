// rigkit-core: Shared types, errors, config, and frame ordering for rigkit.

pub mod config;
pub mod error;
pub mod types;

use bevy::prelude::*;

/// Frame phases for skeletal animation, run in order within `Update`.
///
/// Keyframe playback writes local transforms in [`RigSet::Animate`], the
/// constraint pass (grants, then IK) runs in [`RigSet::Constrain`], and
/// skinning/render extraction reads the final pose in [`RigSet::Skin`].
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RigSet {
    /// Keyframe animation application (external collaborator).
    Animate,
    /// Grant resolution and CCD IK solving.
    Constrain,
    /// Pose consumption by skinning/rendering (external collaborator).
    Skin,
}

/// Core plugin: registers the [`RigSet`] ordering and default solver settings.
///
/// Downstream plugins (notably `rigkit-ik`) expect this to be added first.
pub struct RigkitCorePlugin;

impl Plugin for RigkitCorePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<config::SolverSettings>().configure_sets(
            Update,
            (RigSet::Animate, RigSet::Constrain, RigSet::Skin).chain(),
        );
    }
}

pub mod prelude {
    pub use crate::config::SolverSettings;
    pub use crate::error::{ConfigError, RigError, RigkitError};
    pub use crate::types::RigId;
    pub use crate::{RigSet, RigkitCorePlugin};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
