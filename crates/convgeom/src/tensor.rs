//! Collaborator interface for numeric tensor values.
//!
//! Loading and indexing trained-model tensors is an external concern; the
//! core only needs a scalar per rendered vertex to drive activation
//! coloring, keyed by layer, training epoch, test sample and the vertex's
//! position in the layer's node ordering (reduced representatives index the
//! first channels of the true tensor).

use crate::scene::LayerId;

pub trait ActivationSource {
    /// Scalar activation for one rendered vertex, or `None` when no tensor
    /// is loaded for this `(layer, epoch)`.
    fn value(&self, layer: LayerId, epoch: usize, sample: usize, vertex: usize) -> Option<f32>;
}

/// Per-recompute rendering inputs passed alongside the activation source.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderSettings {
    pub epoch: usize,
    pub sample: usize,
}
