use glam::IVec2;
use thiserror::Error;

use crate::scene::LayerId;

/// Contract violations surfaced by the geometry engine.
///
/// All of these indicate programming or configuration errors upstream of the
/// call, never user-facing runtime conditions; callers are expected to fail
/// fast rather than absorb them, since silently returning wrong geometry
/// corrupts the visualization invisibly.
#[derive(Debug, Error)]
pub enum GeomError {
    /// Two grids of unequal cardinality were interpolated or cloned into one
    /// another. Cardinality is fixed by `resolution` and only changes through
    /// explicit reinitialization.
    #[error("grid resolution mismatch: {left} vs {right}")]
    ShapeResolutionMismatch { left: IVec2, right: IVec2 },

    /// Filter grids were requested for a layer that never registered as a
    /// consumer of this feature map (missing `register_consumer` upstream).
    #[error("layer {0} is not a registered consumer of this feature map")]
    ConsumerNotRegistered(LayerId),

    /// A layer handle that does not resolve in the scene arena.
    #[error("unknown layer id {0}")]
    UnknownLayer(LayerId),

    /// Connecting these two layers would close a dependency cycle; updates
    /// must always traverse input-to-output.
    #[error("connecting {consumer} to input {input} would create a dependency cycle")]
    DependencyCycle { input: LayerId, consumer: LayerId },

    /// Image layers are chain sources and cannot consume another layer.
    #[error("layer {0} cannot accept an input connection")]
    NotInputAccepting(LayerId),

    /// A parameter update was attempted while a propagation pass was already
    /// running (reentrant notification is disallowed by design).
    #[error("parameter update rejected: scene is mid-propagation")]
    ReentrantUpdate,
}

pub type Result<T> = std::result::Result<T, GeomError>;
