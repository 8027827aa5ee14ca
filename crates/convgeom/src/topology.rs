//! Per-layer declarative topology and the CNN output-shape formulas.

use glam::{IVec2, Vec2};

/// Structural parameters shared by all layer kinds.
///
/// `depth` is the full channel count of the layer; the number of
/// representative feature maps actually visualized (`reduced_depth`) lives on
/// the layer itself. Any distinct transition of these fields is a topology
/// change: point-array cardinalities move and derived grids must be
/// reallocated rather than mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerTopology {
    /// Receptive-field size of the layer's filters.
    pub conv_shape: IVec2,
    pub stride: IVec2,
    pub dilation: IVec2,
    pub padding: bool,
    /// Full channel count (filters for conv, neurons for fully-connected).
    pub depth: usize,
}

impl Default for LayerTopology {
    fn default() -> Self {
        Self {
            conv_shape: IVec2::new(3, 3),
            stride: IVec2::ONE,
            dilation: IVec2::ONE,
            padding: true,
            depth: 1,
        }
    }
}

impl LayerTopology {
    /// Derived padding amount: `floor(conv_shape / 2)` when padding is on,
    /// zero otherwise.
    pub fn padding_amount(&self) -> IVec2 {
        if self.padding {
            self.conv_shape / 2
        } else {
            IVec2::ZERO
        }
    }
}

/// Which topology fields changed between two descriptor values.
///
/// Produced by [`diff`] exactly once per external parameter update; replaces
/// the shadow-field change detection of typical scene-graph code with a pure,
/// independently testable function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopologyChange {
    pub conv_shape: bool,
    pub stride: bool,
    pub dilation: bool,
    pub padding: bool,
    pub depth: bool,
}

impl TopologyChange {
    pub const NONE: TopologyChange = TopologyChange {
        conv_shape: false,
        stride: false,
        dilation: false,
        padding: false,
        depth: false,
    };

    pub fn any(&self) -> bool {
        self.conv_shape || self.stride || self.dilation || self.padding || self.depth
    }
}

/// Field-by-field comparison of two topology descriptors. Setting a field to
/// its current value reports no change, so downstream consumers see exactly
/// one event per distinct value transition.
pub fn diff(old: &LayerTopology, new: &LayerTopology) -> TopologyChange {
    TopologyChange {
        conv_shape: old.conv_shape != new.conv_shape,
        stride: old.stride != new.stride,
        dilation: old.dilation != new.dilation,
        padding: old.padding != new.padding,
        depth: old.depth != new.depth,
    }
}

/// Fractional CNN output resolution:
/// `(input − conv + 2·padding) / stride + 1` per axis. A fractional part
/// signals stride/padding misalignment and triggers the half-spacing
/// placement correction on derived filter grids.
pub fn theoretical_output_resolution(
    input: IVec2,
    conv_shape: IVec2,
    stride: IVec2,
    padding: IVec2,
) -> Vec2 {
    (input - conv_shape + padding * 2).as_vec2() / stride.as_vec2() + Vec2::ONE
}

/// Integer CNN output resolution: the floored form of
/// [`theoretical_output_resolution`]. Incomplete trailing filter placements
/// are trimmed.
pub fn output_resolution(input: IVec2, conv_shape: IVec2, stride: IVec2, padding: IVec2) -> IVec2 {
    theoretical_output_resolution(input, conv_shape, stride, padding)
        .floor()
        .as_ivec2()
}
