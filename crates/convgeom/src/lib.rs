//! convgeom: feature-map geometry and connection-topology engine for a live
//! 3D visualization of convolutional neural networks.
//!
//! Layers (image input, convolution, max-pool, fully-connected) are point
//! clouds connected by lines for receptive fields and dense weights. Given a
//! chain of layer descriptors (shape, stride, padding, dilation, reduced
//! depth) and a set of continuous expansion parameters, the engine computes:
//!
//! - the 3D position of every reduced representative point of every layer,
//! - the receptive-field (filter) point sets connecting each output point to
//!   its input points,
//! - smooth interpolation between collapsed and fully expanded layouts as the
//!   expansion sliders sweep their ranges.
//!
//! The engine is single-threaded and demand-driven: a parameter change on one
//! layer recomputes that layer and then walks its downstream consumers in
//! dependency order, distinguishing topology changes (point-array
//! cardinalities change, grids are reallocated) from value-only changes
//! (grids are mutated in place). Rendering, model-file loading, GUI and
//! camera control are external collaborators; the sole output contract is
//! [`MeshBuffers`].

mod arrangement;
mod error;
mod featuremap;
mod layer;
mod mesh;
mod scene;
mod shape;
mod tensor;
mod topology;

pub use crate::arrangement::node_positions;
pub use crate::error::{GeomError, Result};
pub use crate::featuremap::{ConsumerSpec, FeatureMap, MapInputProperties, OutputProperties};
pub use crate::layer::{
    AllFeatureMapsDisplay, ConvParams, DenseParams, ImageParams, Layer, LayerKind, LayoutParams,
};
pub use crate::mesh::{color, Color, MeshBuffers};
pub use crate::scene::{LayerId, Scene};
pub use crate::shape::{
    interpolate_points, scaled_unit_circle, scaled_unit_grid, scaled_unit_line, CircleShape,
    GridShape, LineShape,
};
pub use crate::tensor::{ActivationSource, RenderSettings};
pub use crate::topology::{
    diff, output_resolution, theoretical_output_resolution, LayerTopology, TopologyChange,
};
