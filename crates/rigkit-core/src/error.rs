use thiserror::Error;

/// Top-level error type for rigkit.
#[derive(Debug, Error)]
pub enum RigkitError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rig construction error: {0}")]
    Rig(#[from] RigError),
}

/// Solver-settings and config-file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Construction-time rig validation errors.
///
/// A malformed chain or binding is rejected individually; the rest of the
/// rig is unaffected. Copy + static data for cheap propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RigError {
    #[error("Bone index out of range: {index} >= {bone_count}")]
    BoneOutOfRange { index: usize, bone_count: usize },

    #[error("Bone {bone} references parent {parent} at or after it; parents must precede children")]
    ParentOutOfOrder { bone: usize, parent: usize },

    #[error("IK chain has no links")]
    EmptyChain,

    #[error("IK link bone {link} is not an ancestor of effector {effector}")]
    NotAnAncestor { link: usize, effector: usize },

    #[error("IK link bone {link} is out of parent-chain order")]
    LinkOutOfOrder { link: usize },

    #[error("IK link bone {link} has a zero-length hinge axis")]
    DegenerateHinge { link: usize },

    #[error("Grant on bone {bone} references missing source bone {grant_source}")]
    DanglingGrantSource { bone: usize, grant_source: usize },

    #[error("Grant on bone {bone} participates in a dependency cycle")]
    CyclicGrant { bone: usize },
}
