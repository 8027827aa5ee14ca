//! Layer variants and their connection-drawing policies.
//!
//! A layer is a single record with a kind tag (image, convolution, max-pool,
//! fully-connected) and small per-kind parameter structs; output-shape and
//! mesh-emission behavior dispatch over the tag. Common state (topology,
//! layout sliders, bundling/expansion sliders, feature maps) lives on the
//! record itself.

mod all_feature_maps;
mod conv;
mod dense;
mod image;
mod maxpool;

pub use all_feature_maps::AllFeatureMapsDisplay;

use glam::{IVec2, Vec2, Vec3};

use crate::arrangement;
use crate::error::Result;
use crate::featuremap::{FeatureMap, MapInputProperties};
use crate::mesh::{color, Color, MeshBuffers};
use crate::scene::LayerId;
use crate::shape::GridShape;
use crate::tensor::{ActivationSource, RenderSettings};
use crate::topology::LayerTopology;

/// Node-layout sliders shared by every layer kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    /// Overall scale of the node arrangement.
    pub spread: f32,
    /// Pixel pitch within a feature map.
    pub spacing: f32,
    /// Line → circle over [0, 1], circle → grid over [1, 2].
    pub line_circle_grid: f32,
    /// Blends the line layout from the local X axis to the local Z axis.
    pub line_x_to_z: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            spread: 1.0,
            spacing: 0.05,
            line_circle_grid: 0.0,
            line_x_to_z: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageParams {
    pub full_resolution: IVec2,
    pub reduced_resolution: IVec2,
    /// Distance of the optional full-resolution overlay behind the layer.
    pub fullres_offset: f32,
    pub show_full_resolution: bool,
    /// R/G/B channel coloring for 3-channel inputs; grayscale by activation
    /// otherwise.
    pub rgb: bool,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            full_resolution: IVec2::new(224, 224),
            reduced_resolution: IVec2::new(11, 11),
            fullres_offset: 1.0,
            show_full_resolution: false,
            rgb: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvParams {
    /// Spacing of the true-filter-count overview squares.
    pub all_filters_spacing: f32,
    /// Height of the overview square array above the layer.
    pub full_res_height: f32,
    /// Show every true filter as a small square above the layer.
    pub show_original_depth: bool,
    /// Receptive-field placement to inspect; -1 spreads the filter over the
    /// whole feature map.
    pub conv_location: i32,
}

impl Default for ConvParams {
    fn default() -> Self {
        Self {
            all_filters_spacing: 0.5,
            full_res_height: 5.0,
            show_original_depth: false,
            conv_location: -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenseParams {
    /// Shrinks every input connection grid's spacing toward zero.
    pub collapse_input: f32,
    /// Render the true neuron count as an overview arrangement.
    pub show_original_depth: bool,
}

impl Default for DenseParams {
    fn default() -> Self {
        Self {
            collapse_input: 0.0,
            show_original_depth: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerKind {
    Image(ImageParams),
    Conv(ConvParams),
    MaxPool,
    FullyConnected(DenseParams),
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Image(_) => "image",
            LayerKind::Conv(_) => "conv",
            LayerKind::MaxPool => "max_pool",
            LayerKind::FullyConnected(_) => "fully_connected",
        }
    }
}

/// One layer of the visualized network.
#[derive(Debug, Clone)]
pub struct Layer {
    pub(crate) id: LayerId,
    pub(crate) kind: LayerKind,
    pub(crate) topology: LayerTopology,
    /// Number of representative feature maps actually rendered; independent
    /// of `topology.depth`, the true channel count.
    pub(crate) reduced_depth: usize,
    pub(crate) layout: LayoutParams,
    pub(crate) point_brightness: f32,
    pub(crate) z_offset: f32,
    pub(crate) edge_bundle: f32,
    pub(crate) all_calculations: f32,

    pub(crate) input: Option<LayerId>,
    pub(crate) observers: Vec<LayerId>,

    pub(crate) feature_maps: Vec<FeatureMap>,
    pub(crate) map_resolution: IVec2,
    pub(crate) theoretical_map_resolution: Vec2,
    pub(crate) z_position: f32,
}

impl Layer {
    pub(crate) fn new(
        id: LayerId,
        kind: LayerKind,
        topology: LayerTopology,
        reduced_depth: usize,
    ) -> Self {
        let z_offset = match kind {
            LayerKind::MaxPool => 0.1,
            _ => 1.0,
        };

        Self {
            id,
            kind,
            topology,
            reduced_depth,
            layout: LayoutParams::default(),
            point_brightness: 1.0,
            z_offset,
            edge_bundle: 0.0,
            all_calculations: 0.0,
            input: None,
            observers: Vec::new(),
            feature_maps: Vec::new(),
            map_resolution: IVec2::ZERO,
            theoretical_map_resolution: Vec2::ZERO,
            z_position: 0.0,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    pub fn topology(&self) -> &LayerTopology {
        &self.topology
    }

    pub fn layout(&self) -> &LayoutParams {
        &self.layout
    }

    pub fn reduced_depth(&self) -> usize {
        self.reduced_depth
    }

    pub fn input(&self) -> Option<LayerId> {
        self.input
    }

    pub fn observers(&self) -> &[LayerId] {
        &self.observers
    }

    pub fn feature_maps(&self) -> &[FeatureMap] {
        &self.feature_maps
    }

    pub fn z_position(&self) -> f32 {
        self.z_position
    }

    pub fn edge_bundle(&self) -> f32 {
        self.edge_bundle
    }

    pub fn all_calculations(&self) -> f32 {
        self.all_calculations
    }

    /// The layer's 2D output resolution as seen by downstream consumers.
    pub fn output_resolution_2d(&self) -> IVec2 {
        self.map_resolution
    }

    /// Whether the layer produces 2D feature maps (fully-connected layers
    /// degenerate to single points).
    pub fn is_2d(&self) -> bool {
        !matches!(self.kind, LayerKind::FullyConnected(_))
    }

    /// Current node-arrangement positions, recomputed on every call.
    pub fn node_positions(&self) -> Vec<Vec3> {
        arrangement::node_positions(self.reduced_depth, &self.layout)
    }

    /// Input-properties provider toward this layer's own feature maps.
    pub fn feature_map_input_properties(&self, index: usize) -> MapInputProperties {
        let positions = self.node_positions();
        MapInputProperties {
            position: positions.get(index).copied().unwrap_or(Vec3::ZERO),
            shape: self.map_resolution,
            spacing: self.layout.spacing,
        }
    }

    /// All maps' input properties in one arrangement pass.
    pub(crate) fn map_input_properties_all(&self) -> Vec<MapInputProperties> {
        self.node_positions()
            .into_iter()
            .map(|position| MapInputProperties {
                position,
                shape: self.map_resolution,
                spacing: self.layout.spacing,
            })
            .collect()
    }

    /// Maps the single expansion-level scalar onto this kind's underlying
    /// sliders. Level 0 is maximally bundled/collapsed; raising the level
    /// un-bundles first, then reveals receptive-field instances. Each kind
    /// has its own breakpoints; there is no shared global scale.
    pub(crate) fn apply_expansion_level(&mut self, level: f32) {
        match &mut self.kind {
            LayerKind::Image(_) => {}
            LayerKind::Conv(_) => {
                if level <= 1.0 {
                    self.edge_bundle = (1.0 - level).max(0.0);
                    self.all_calculations = 0.0;
                } else if level <= 2.0 {
                    self.edge_bundle = 0.0;
                    self.all_calculations = 0.0;
                } else {
                    self.edge_bundle = 0.0;
                    self.all_calculations = (level - 2.0).clamp(0.0, 1.0);
                }
            }
            LayerKind::MaxPool => {
                if level <= 1.0 {
                    self.edge_bundle = (1.0 - level).max(0.0);
                    self.all_calculations = 0.0;
                } else {
                    self.edge_bundle = (1.0 - (level - 1.0)).clamp(0.0, 1.0);
                    self.all_calculations = 1.0;
                }
            }
            LayerKind::FullyConnected(params) => {
                if level <= 1.0 {
                    self.edge_bundle = (1.0 - level).max(0.0);
                    params.collapse_input = 1.0;
                } else if level <= 2.0 {
                    self.edge_bundle = 0.0;
                    params.collapse_input = 1.0 - (level - 1.0);
                } else {
                    self.edge_bundle = 0.0;
                    params.collapse_input = 0.0;
                }
            }
        }
    }

    /// Start points for the connection lines a consumer draws into this
    /// layer: one list of filter grids per feature map for 2D layers, the
    /// node points themselves for fully-connected layers.
    pub(crate) fn line_start_shapes(
        &self,
        consumer: LayerId,
        all_calcs: f32,
        location: Option<usize>,
    ) -> Result<Vec<Vec<GridShape>>> {
        match self.kind {
            LayerKind::FullyConnected(_) => Ok(vec![self
                .feature_maps
                .iter()
                .map(|fm| fm.pixel_grid().clone())
                .collect()]),
            _ => self
                .feature_maps
                .iter()
                .map(|fm| fm.filter_grids_at(consumer, all_calcs, location))
                .collect(),
        }
    }

    /// Bundle waypoint for a connection endpoint: the endpoint projected to
    /// this layer's z plane, pulled toward the inter-layer bundle center
    /// `(0, 0, z − z_offset/2)` by `edge_bundle`.
    pub(crate) fn edge_bundle_center(&self, endpoint: Vec3, edge_bundle: f32) -> Vec3 {
        let center = Vec3::new(0.0, 0.0, self.z_position - self.z_offset / 2.0);
        let projected = Vec3::new(endpoint.x, endpoint.y, self.z_position);
        center * edge_bundle + projected * (1.0 - edge_bundle)
    }

    pub(crate) fn node_color(
        &self,
        source: Option<&dyn ActivationSource>,
        settings: &RenderSettings,
        vertex: usize,
    ) -> Color {
        match source.and_then(|s| s.value(self.id, settings.epoch, settings.sample, vertex)) {
            Some(value) => color::gray(value * self.point_brightness),
            None => color::BLACK,
        }
    }

    /// Appends the feature-map pixels as activation-colored points.
    pub(crate) fn add_nodes(
        &self,
        mb: &mut MeshBuffers,
        source: Option<&dyn ActivationSource>,
        settings: &RenderSettings,
    ) {
        let z_pos = Vec3::new(0.0, 0.0, self.z_position);
        let mut vertex = 0usize;
        for fm in &self.feature_maps {
            for &v in fm.pixel_grid().vertices() {
                let color = self.node_color(source, settings, vertex);
                mb.push_point(v + z_pos, color);
                vertex += 1;
            }
        }
    }

    /// Computes this layer's mesh buffers from already-propagated geometry.
    pub(crate) fn mesh(
        &self,
        input: Option<&Layer>,
        source: Option<&dyn ActivationSource>,
        settings: &RenderSettings,
    ) -> Result<MeshBuffers> {
        match &self.kind {
            LayerKind::Image(params) => image::mesh(self, params, source, settings),
            LayerKind::Conv(params) => conv::mesh(self, params, input, source, settings),
            LayerKind::MaxPool => maxpool::mesh(self, input, source, settings),
            LayerKind::FullyConnected(params) => dense::mesh(self, params, input, source, settings),
        }
    }
}
