//! The layer chain: an arena of layers addressed by stable handles, explicit
//! acyclic input/observer edges, and the propagation protocol.
//!
//! Updates never run through implicit event callbacks. Every external
//! parameter change diffs once against the stored value, then performs one
//! explicit topological traversal of the downstream chain: each layer
//! recomputes its own geometry (reallocating on topology changes, mutating
//! in place otherwise) and re-registers against its input's feature maps
//! before any of its own observers run. Control returns to the caller only
//! after the whole downstream chain is consistent; reentrant updates are
//! rejected while a traversal is in flight.

use std::collections::{HashMap, HashSet};
use std::fmt;

use glam::{IVec2, Vec2};

use crate::error::{GeomError, Result};
use crate::featuremap::{ConsumerSpec, FeatureMap};
use crate::layer::{ConvParams, DenseParams, ImageParams, Layer, LayerKind, LayoutParams};
use crate::mesh::MeshBuffers;
use crate::tensor::{ActivationSource, RenderSettings};
use crate::topology::{self, LayerTopology, TopologyChange};

/// Stable handle into the scene's layer arena, assigned at creation time and
/// never reused within a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub(crate) u32);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    layers: Vec<Layer>,
    propagating: bool,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an image (source) layer with `depth` channels at the reduced
    /// resolution given in `params`.
    pub fn add_image(&mut self, params: ImageParams, depth: usize) -> Result<LayerId> {
        let topology = LayerTopology {
            depth,
            ..LayerTopology::default()
        };
        self.add_layer(LayerKind::Image(params), topology, depth)
    }

    /// Adds a convolution layer. `topology.depth` is the true filter count;
    /// `reduced_depth` the number of feature maps rendered.
    pub fn add_conv(
        &mut self,
        reduced_depth: usize,
        topology: LayerTopology,
        params: ConvParams,
    ) -> Result<LayerId> {
        self.add_layer(LayerKind::Conv(params), topology, reduced_depth)
    }

    /// Adds a max-pool layer; `conv_shape`/`stride`/`padding` of `topology`
    /// describe the pooling window. Depth and layout are copy-inherited from
    /// the input on every refresh.
    pub fn add_max_pool(&mut self, topology: LayerTopology) -> Result<LayerId> {
        let reduced = topology.depth;
        self.add_layer(LayerKind::MaxPool, topology, reduced)
    }

    /// Adds a fully-connected layer. `topology.depth` is the true neuron
    /// count; `reduced_depth` the number of nodes rendered.
    pub fn add_fully_connected(
        &mut self,
        reduced_depth: usize,
        full_depth: usize,
        params: DenseParams,
    ) -> Result<LayerId> {
        let topology = LayerTopology {
            depth: full_depth,
            ..LayerTopology::default()
        };
        self.add_layer(LayerKind::FullyConnected(params), topology, reduced_depth)
    }

    fn add_layer(
        &mut self,
        kind: LayerKind,
        topology: LayerTopology,
        reduced_depth: usize,
    ) -> Result<LayerId> {
        let id = LayerId(self.layers.len() as u32);
        self.layers.push(Layer::new(id, kind, topology, reduced_depth));
        log::debug!("added {} ({})", id, self.layers[id.0 as usize].kind().name());
        self.propagate_from(id, true)?;
        Ok(id)
    }

    /// Declares `input` as the single input of `consumer`, replacing any
    /// previous connection, and recomputes the downstream chain. Fails on
    /// cycles and on image consumers; the dependency graph stays a forest
    /// traversed strictly input-to-output.
    pub fn connect(&mut self, input: LayerId, consumer: LayerId) -> Result<()> {
        self.ensure_idle()?;
        self.index(input)?;
        let consumer_index = self.index(consumer)?;

        if matches!(self.layers[consumer_index].kind(), LayerKind::Image(_)) {
            return Err(GeomError::NotInputAccepting(consumer));
        }

        // Walk the ancestry of `input`; finding `consumer` there means the
        // new edge would close a cycle.
        let mut cursor = Some(input);
        while let Some(current) = cursor {
            if current == consumer {
                return Err(GeomError::DependencyCycle { input, consumer });
            }
            cursor = self.layer(current)?.input();
        }

        self.detach(consumer)?;

        self.layers[consumer_index].input = Some(input);
        let input_index = self.index(input)?;
        if !self.layers[input_index].observers.contains(&consumer) {
            self.layers[input_index].observers.push(consumer);
        }

        log::debug!("connected {} -> {}", input, consumer);
        self.propagate_from(consumer, true)
    }

    /// Removes `consumer`'s input connection (if any) and drops its
    /// registration from the former input's feature maps.
    pub fn disconnect(&mut self, consumer: LayerId) -> Result<()> {
        self.ensure_idle()?;
        self.detach(consumer)?;
        self.propagate_from(consumer, true)
    }

    fn detach(&mut self, consumer: LayerId) -> Result<()> {
        let consumer_index = self.index(consumer)?;
        let Some(old_input) = self.layers[consumer_index].input.take() else {
            return Ok(());
        };

        let old_index = self.index(old_input)?;
        self.layers[old_index].observers.retain(|&o| o != consumer);
        for fm in self.layers[old_index].feature_maps.iter_mut() {
            fm.unregister_consumer(consumer);
        }
        Ok(())
    }

    pub fn layer(&self, id: LayerId) -> Result<&Layer> {
        self.layers
            .get(id.0 as usize)
            .ok_or(GeomError::UnknownLayer(id))
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.layers.iter().map(|l| l.id())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn index(&self, id: LayerId) -> Result<usize> {
        let index = id.0 as usize;
        if index < self.layers.len() {
            Ok(index)
        } else {
            Err(GeomError::UnknownLayer(id))
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.propagating {
            Err(GeomError::ReentrantUpdate)
        } else {
            Ok(())
        }
    }

    /// Replaces the layer's structural descriptor. The returned change set
    /// reports which fields actually transitioned; setting the same value
    /// again is a no-op and triggers no recomputation.
    pub fn set_topology(&mut self, id: LayerId, new: LayerTopology) -> Result<TopologyChange> {
        self.ensure_idle()?;
        let index = self.index(id)?;

        let change = topology::diff(self.layers[index].topology(), &new);
        if !change.any() {
            return Ok(change);
        }

        self.layers[index].topology = new;
        log::debug!("{} topology changed: {:?}", id, change);
        self.propagate_from(id, true)?;
        Ok(change)
    }

    /// Changes how many representative feature maps the layer renders.
    /// Ignored for max-pool layers, whose depth follows their input.
    pub fn set_reduced_depth(&mut self, id: LayerId, reduced_depth: usize) -> Result<()> {
        self.ensure_idle()?;
        let index = self.index(id)?;
        if self.layers[index].reduced_depth == reduced_depth {
            return Ok(());
        }
        self.layers[index].reduced_depth = reduced_depth;
        // The refresh pass reconciles feature-map cardinality itself.
        self.propagate_from(id, false)
    }

    /// Value-only layout change: node arrangement and pixel pitch sliders.
    pub fn set_layout(&mut self, id: LayerId, layout: LayoutParams) -> Result<()> {
        self.ensure_idle()?;
        let index = self.index(id)?;
        self.layers[index].layout = layout;
        self.propagate_from(id, false)
    }

    /// Drives the layer's expansion-level state machine (per-kind piecewise
    /// mapping onto the bundling/expansion sliders).
    pub fn set_expansion_level(&mut self, id: LayerId, level: f32) -> Result<()> {
        self.ensure_idle()?;
        let index = self.index(id)?;
        self.layers[index].apply_expansion_level(level);
        self.propagate_from(id, false)
    }

    pub fn set_z_offset(&mut self, id: LayerId, z_offset: f32) -> Result<()> {
        self.ensure_idle()?;
        let index = self.index(id)?;
        self.layers[index].z_offset = z_offset;
        self.propagate_from(id, false)
    }

    pub fn set_point_brightness(&mut self, id: LayerId, brightness: f32) -> Result<()> {
        self.ensure_idle()?;
        let index = self.index(id)?;
        self.layers[index].point_brightness = brightness;
        Ok(())
    }

    /// Image-specific parameters. A reduced-resolution change is a topology
    /// change; the refresh pass detects the cardinality move itself.
    pub fn set_image_params(&mut self, id: LayerId, params: ImageParams) -> Result<()> {
        self.ensure_idle()?;
        let index = self.index(id)?;
        match &mut self.layers[index].kind {
            LayerKind::Image(existing) => *existing = params,
            _ => return Err(GeomError::UnknownLayer(id)),
        }
        self.propagate_from(id, false)
    }

    pub fn set_conv_params(&mut self, id: LayerId, params: ConvParams) -> Result<()> {
        self.ensure_idle()?;
        let index = self.index(id)?;
        match &mut self.layers[index].kind {
            LayerKind::Conv(existing) => *existing = params,
            _ => return Err(GeomError::UnknownLayer(id)),
        }
        self.propagate_from(id, false)
    }

    pub fn set_dense_params(&mut self, id: LayerId, params: DenseParams) -> Result<()> {
        self.ensure_idle()?;
        let index = self.index(id)?;
        match &mut self.layers[index].kind {
            LayerKind::FullyConnected(existing) => *existing = params,
            _ => return Err(GeomError::UnknownLayer(id)),
        }
        self.propagate_from(id, false)
    }

    /// Revalidates a layer and its downstream chain without any parameter
    /// change (value-only refresh).
    pub fn update(&mut self, id: LayerId) -> Result<()> {
        self.ensure_idle()?;
        self.propagate_from(id, false)
    }

    /// All layers in dependency order: sources first, every layer after its
    /// input.
    pub fn topological_order(&self) -> Vec<LayerId> {
        let mut order = Vec::with_capacity(self.layers.len());
        let mut seen = HashSet::new();

        for layer in &self.layers {
            if layer.input().is_none() && seen.insert(layer.id()) {
                order.push(layer.id());
            }
        }

        let mut cursor = 0;
        while cursor < order.len() {
            let current = order[cursor];
            cursor += 1;
            if let Ok(layer) = self.layer(current) {
                for &observer in layer.observers() {
                    if seen.insert(observer) {
                        order.push(observer);
                    }
                }
            }
        }
        order
    }

    /// Mesh buffers for one layer, computed from the already-propagated
    /// geometry.
    pub fn mesh(
        &self,
        id: LayerId,
        source: Option<&dyn ActivationSource>,
        settings: &RenderSettings,
    ) -> Result<MeshBuffers> {
        let layer = self.layer(id)?;
        let input = match layer.input() {
            Some(input_id) => Some(self.layer(input_id)?),
            None => None,
        };
        layer.mesh(input, source, settings)
    }

    /// Mesh buffers for every layer, in dependency order.
    pub fn meshes(
        &self,
        source: Option<&dyn ActivationSource>,
        settings: &RenderSettings,
    ) -> Result<Vec<(LayerId, MeshBuffers)>> {
        self.topological_order()
            .into_iter()
            .map(|id| Ok((id, self.mesh(id, source, settings)?)))
            .collect()
    }

    fn propagate_from(&mut self, origin: LayerId, topology_changed: bool) -> Result<()> {
        self.ensure_idle()?;
        self.propagating = true;
        let result = self.run_propagation(origin, topology_changed);
        self.propagating = false;
        result
    }

    fn run_propagation(&mut self, origin: LayerId, topology_changed: bool) -> Result<()> {
        let order = self.downstream_order(origin)?;
        let mut changed: HashMap<LayerId, bool> = HashMap::new();

        for id in order {
            let upstream = if id == origin {
                topology_changed
            } else {
                // A non-origin layer is reached through its single input,
                // which was refreshed earlier in the traversal.
                self.layer(id)?
                    .input()
                    .and_then(|input| changed.get(&input).copied())
                    .unwrap_or(false)
            };

            let layer_changed = self.refresh_layer(id, upstream)?;
            changed.insert(id, layer_changed);
            log::trace!("refreshed {} (topology change: {})", id, layer_changed);
        }
        Ok(())
    }

    /// Downstream closure of `origin` in dependency order. Every non-origin
    /// layer in the closure has its single input inside the closure as well,
    /// so breadth-first discovery already yields inputs before consumers.
    fn downstream_order(&self, origin: LayerId) -> Result<Vec<LayerId>> {
        self.index(origin)?;

        let mut order = vec![origin];
        let mut seen: HashSet<LayerId> = order.iter().copied().collect();
        let mut cursor = 0;

        while cursor < order.len() {
            let current = order[cursor];
            cursor += 1;
            for &observer in self.layer(current)?.observers() {
                if seen.insert(observer) {
                    order.push(observer);
                }
            }
        }
        Ok(order)
    }

    /// Recomputes one layer's derived state: z position, feature-map
    /// resolution (per-kind output-shape policy), the feature-map list
    /// (reallocated on topology changes, mutated in place otherwise) and its
    /// registration against the input layer's feature maps. Returns whether
    /// the layer's own topology changed, which observers inherit.
    fn refresh_layer(&mut self, id: LayerId, upstream_topology_changed: bool) -> Result<bool> {
        let index = self.index(id)?;

        let input_info = match self.layers[index].input() {
            Some(input_id) => {
                let input = self.layer(input_id)?;
                Some((
                    input_id,
                    input.output_resolution_2d(),
                    input.reduced_depth(),
                    input.z_position(),
                    *input.layout(),
                ))
            }
            None => None,
        };

        let layer = &mut self.layers[index];

        layer.z_position = match input_info {
            Some((_, _, _, input_z, _)) => input_z + layer.z_offset,
            None => 0.0,
        };

        // Max-pool layers inherit arrangement sliders from their input.
        if matches!(layer.kind, LayerKind::MaxPool) {
            if let Some((_, _, _, _, input_layout)) = input_info {
                layer.layout.spread = input_layout.spread;
                layer.layout.spacing = input_layout.spacing;
                layer.layout.line_circle_grid = input_layout.line_circle_grid;
            }
        }

        let (new_resolution, new_theoretical, new_reduced) = match (&layer.kind, input_info) {
            (LayerKind::Image(params), _) => (
                params.reduced_resolution,
                params.reduced_resolution.as_vec2(),
                layer.topology.depth,
            ),
            (LayerKind::Conv(_), Some((_, input_res, _, _, _))) => (
                topology::output_resolution(
                    input_res,
                    layer.topology.conv_shape,
                    layer.topology.stride,
                    layer.topology.padding_amount(),
                ),
                topology::theoretical_output_resolution(
                    input_res,
                    layer.topology.conv_shape,
                    layer.topology.stride,
                    layer.topology.padding_amount(),
                ),
                layer.reduced_depth,
            ),
            (LayerKind::MaxPool, Some((_, input_res, input_depth, _, _))) => (
                topology::output_resolution(
                    input_res,
                    layer.topology.conv_shape,
                    layer.topology.stride,
                    layer.topology.padding_amount(),
                ),
                topology::theoretical_output_resolution(
                    input_res,
                    layer.topology.conv_shape,
                    layer.topology.stride,
                    layer.topology.padding_amount(),
                ),
                input_depth,
            ),
            (LayerKind::FullyConnected(_), _) => {
                (IVec2::ONE, Vec2::ONE, layer.reduced_depth)
            }
            // Not yet connected: keep the current resolution.
            (_, None) => (
                layer.map_resolution,
                layer.theoretical_map_resolution,
                layer.reduced_depth,
            ),
        };

        let topology_changed = upstream_topology_changed
            || new_resolution != layer.map_resolution
            || new_reduced != layer.reduced_depth
            || layer.feature_maps.len() != new_reduced;

        layer.map_resolution = new_resolution;
        layer.theoretical_map_resolution = new_theoretical;
        layer.reduced_depth = new_reduced;
        if matches!(layer.kind, LayerKind::MaxPool) {
            layer.topology.depth = new_reduced;
        }

        let map_props = layer.map_input_properties_all();
        if topology_changed {
            layer.feature_maps = map_props
                .iter()
                .enumerate()
                .map(|(i, props)| FeatureMap::new(i, *props))
                .collect();
        } else {
            for (fm, props) in layer.feature_maps.iter_mut().zip(map_props.iter()) {
                fm.update_for_input_change(*props, false);
            }
        }

        // Register (or refresh) this layer as a consumer of its input's
        // feature maps; the input always precedes us in the traversal.
        if let Some((input_id, _, _, _, _)) = input_info {
            let spec = ConsumerSpec {
                layer: id,
                conv_shape: self.layers[index].topology.conv_shape,
                stride: self.layers[index].topology.stride,
                dilation: self.layers[index].topology.dilation,
                padding: self.layers[index].topology.padding_amount(),
            };
            let input_index = self.index(input_id)?;
            for fm in self.layers[input_index].feature_maps.iter_mut() {
                if topology_changed {
                    fm.register_consumer(&spec);
                } else {
                    fm.refresh_consumer(&spec, false);
                }
            }
        }

        Ok(topology_changed)
    }
}
