//! Feature maps: one layer's reduced output channel and its derived
//! connection geometry.
//!
//! A feature map owns the pixel grid of a single visualized channel and, for
//! every downstream consumer layer registered against it, the derived filter
//! grids that the consumer's connection lines start from. Consumer records
//! are keyed by the stable [`LayerId`] handle assigned by the scene arena, so
//! a feature map's lifetime is decoupled from consumer object identity.

use std::collections::BTreeMap;

use glam::{IVec2, Vec2, Vec3};

use crate::error::{GeomError, Result};
use crate::scene::LayerId;
use crate::shape::GridShape;
use crate::topology::{output_resolution, theoretical_output_resolution};

/// What a feature map pulls from its owning layer (the input-properties
/// provider interface): where the map sits, its 2D resolution and its pixel
/// pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapInputProperties {
    pub position: Vec3,
    pub shape: IVec2,
    pub spacing: f32,
}

/// Topology snapshot of a consumer layer at registration time.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerSpec {
    pub layer: LayerId,
    pub conv_shape: IVec2,
    pub stride: IVec2,
    pub dilation: IVec2,
    pub padding: IVec2,
}

/// Per-consumer derived geometry of one feature map.
#[derive(Debug, Clone)]
pub struct OutputProperties {
    pub conv_shape: IVec2,
    pub stride: IVec2,
    pub dilation: IVec2,
    pub padding: IVec2,

    /// Integer count of receptive-field placements per axis:
    /// `floor((input − conv + 2·padding) / stride) + 1`.
    pub filter_array_shape: IVec2,
    /// The unfloored form of the same formula; disagreement with the integer
    /// form flags stride/padding misalignment.
    pub theoretical_filter_array_shape: Vec2,
    /// Half-spacing correction recentering the placement grid when the
    /// theoretical and integer shapes disagree.
    pub position_offset: Vec3,

    /// One point per receptive-field placement, pitch `spacing × stride`.
    pub filter_instance_grid: GridShape,
    /// The canonical single receptive-field footprint, scaled up so it
    /// visually spans the whole input map.
    pub filter_grid: GridShape,
    /// A `filter_grid`-shaped grid centered at every placement point; drives
    /// the "show every receptive field simultaneously" mode.
    pub all_calc_filter_grids: Vec<GridShape>,
}

/// One reduced output channel of a layer: its pixel grid plus per-consumer
/// connection geometry.
#[derive(Debug, Clone)]
pub struct FeatureMap {
    index: usize,
    position: Vec3,
    shape: IVec2,
    spacing: f32,

    pixel_grid: GridShape,
    consumers: BTreeMap<LayerId, OutputProperties>,
}

impl FeatureMap {
    pub fn new(index: usize, props: MapInputProperties) -> Self {
        Self {
            index,
            position: props.position,
            shape: props.shape,
            spacing: props.spacing,
            pixel_grid: GridShape::new(props.position, props.shape, Vec2::splat(props.spacing)),
            consumers: BTreeMap::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn shape(&self) -> IVec2 {
        self.shape
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    /// The grid providing the points for this map's rendered pixels.
    pub fn pixel_grid(&self) -> &GridShape {
        &self.pixel_grid
    }

    fn spacing2(&self) -> Vec2 {
        Vec2::splat(self.spacing)
    }

    pub fn is_registered(&self, consumer: LayerId) -> bool {
        self.consumers.contains_key(&consumer)
    }

    pub fn consumer_ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.consumers.keys().copied()
    }

    pub fn output_properties(&self, consumer: LayerId) -> Result<&OutputProperties> {
        self.consumers
            .get(&consumer)
            .ok_or(GeomError::ConsumerNotRegistered(consumer))
    }

    /// Computes a fresh consumer record and builds all derived grids from
    /// scratch. Re-registering an already known consumer replaces its record
    /// wholesale.
    pub fn register_consumer(&mut self, spec: &ConsumerSpec) {
        log::trace!(
            "feature map {}: (re)building consumer grids for {}",
            self.index,
            spec.layer
        );
        let props = self.build_output_properties(spec);
        self.consumers.insert(spec.layer, props);
    }

    /// Brings an existing consumer record up to date. With `topology_changed`
    /// (or for a consumer not seen before) this is a full rebuild; otherwise
    /// grid objects are mutated in place without reallocation, the fast path
    /// for continuous slider drags where cardinalities are invariant.
    pub fn refresh_consumer(&mut self, spec: &ConsumerSpec, topology_changed: bool) {
        if topology_changed || !self.consumers.contains_key(&spec.layer) {
            self.register_consumer(spec);
            return;
        }

        let position = self.position;
        let spacing2 = self.spacing2();
        let shape = self.shape;
        if let Some(props) = self.consumers.get_mut(&spec.layer) {
            Self::mutate_props_in_place(props, position, shape, spacing2);
        }
    }

    /// Drops the consumer's record; requesting its filter grids afterwards
    /// fails with [`GeomError::ConsumerNotRegistered`].
    pub fn unregister_consumer(&mut self, consumer: LayerId) {
        self.consumers.remove(&consumer);
    }

    /// Re-pulls the owner-side properties. A shape change (or an upstream
    /// topology change) rebuilds the pixel grid and every derived consumer
    /// grid; value-only drift of position/spacing mutates all grids in place.
    pub fn update_for_input_change(&mut self, props: MapInputProperties, topology_changed: bool) {
        let shape_changed = props.shape != self.shape;
        self.position = props.position;
        self.shape = props.shape;
        self.spacing = props.spacing;

        if topology_changed || shape_changed {
            self.pixel_grid = GridShape::new(self.position, self.shape, self.spacing2());

            // Derived consumer grids are invalid now; rebuild each from its
            // stored topology snapshot so registrations survive the change.
            let specs: Vec<ConsumerSpec> = self
                .consumers
                .iter()
                .map(|(&layer, p)| ConsumerSpec {
                    layer,
                    conv_shape: p.conv_shape,
                    stride: p.stride,
                    dilation: p.dilation,
                    padding: p.padding,
                })
                .collect();
            for spec in &specs {
                self.register_consumer(spec);
            }
        } else {
            self.pixel_grid.position = self.position;
            self.pixel_grid.spacing = self.spacing2();
            self.pixel_grid.recalculate();

            let position = self.position;
            let spacing2 = self.spacing2();
            let shape = self.shape;
            for props in self.consumers.values_mut() {
                Self::mutate_props_in_place(props, position, shape, spacing2);
            }
        }
    }

    /// Grids in the shape of the consumer's filter, serving as the start
    /// points of its incoming connection lines.
    ///
    /// `all_calcs == 0` returns the single canonical footprint; otherwise
    /// every placement's footprint is returned, each interpolated toward the
    /// canonical footprint by `1 − all_calcs` so the N separate receptive
    /// fields collapse smoothly into one as the slider approaches zero.
    pub fn filter_grids(&self, consumer: LayerId, all_calcs: f32) -> Result<Vec<GridShape>> {
        let props = self.output_properties(consumer)?;

        if all_calcs == 0.0 {
            return Ok(vec![props.filter_grid.clone()]);
        }

        props
            .all_calc_filter_grids
            .iter()
            .map(|grid| {
                self.instance_footprint(grid, props)
                    .interpolated(&props.filter_grid, 1.0 - all_calcs)
            })
            .collect()
    }

    /// [`FeatureMap::filter_grids`] restricted to a single receptive-field
    /// placement, for stepping through filter positions. `None` falls back to
    /// the full-array form; out-of-range locations clamp to the last
    /// placement.
    pub fn filter_grids_at(
        &self,
        consumer: LayerId,
        all_calcs: f32,
        location: Option<usize>,
    ) -> Result<Vec<GridShape>> {
        let Some(location) = location else {
            return self.filter_grids(consumer, all_calcs);
        };

        let props = self.output_properties(consumer)?;
        if props.all_calc_filter_grids.is_empty() {
            return Ok(Vec::new());
        }
        let last = props.all_calc_filter_grids.len() - 1;
        if location > last {
            log::debug!(
                "filter location {} clamped to {} for consumer {}",
                location,
                last,
                consumer
            );
        }
        let target =
            self.instance_footprint(&props.all_calc_filter_grids[location.min(last)], props);

        if all_calcs == 0.0 {
            return Ok(vec![target]);
        }

        props
            .all_calc_filter_grids
            .iter()
            .map(|grid| {
                self.instance_footprint(grid, props)
                    .interpolated(&target, 1.0 - all_calcs)
            })
            .collect()
    }

    /// The grid providing the line end points on the consumer side:
    /// degenerate (all points at the map position) at `all_calcs == 0`, the
    /// real pixel grid at `1`, a blend in between.
    pub fn input_endpoint_grid(&self, all_calcs: f32) -> Result<GridShape> {
        if all_calcs == 0.0 {
            Ok(GridShape::new(self.position, self.shape, Vec2::ZERO))
        } else if all_calcs == 1.0 {
            Ok(self.pixel_grid.clone())
        } else {
            let degenerate = GridShape::new(self.position, self.shape, Vec2::ZERO);
            degenerate.interpolated(&self.pixel_grid, all_calcs)
        }
    }

    /// A placement grid rescaled from the canonical footprint's span back to
    /// the true receptive-field span (one input pixel per filter cell).
    fn instance_footprint(&self, grid: &GridShape, props: &OutputProperties) -> GridShape {
        let mut footprint = grid.clone();
        footprint.spacing = if props.conv_shape.x <= 1 {
            // 1-wide filters have no cell pitch to scale.
            Vec2::ZERO
        } else if self.shape.x <= 1 {
            // 1-wide input maps leave the pitch at the input spacing.
            self.spacing2()
        } else {
            grid.spacing * (props.conv_shape.x - 1) as f32 / (self.shape.x - 1) as f32
        };
        footprint.recalculate();
        footprint
    }

    fn build_output_properties(&self, spec: &ConsumerSpec) -> OutputProperties {
        let filter_array_shape =
            output_resolution(self.shape, spec.conv_shape, spec.stride, spec.padding);
        let theoretical =
            theoretical_output_resolution(self.shape, spec.conv_shape, spec.stride, spec.padding);

        let position_offset =
            Self::placement_offset(theoretical, filter_array_shape, self.spacing2());
        let origin = self.position + position_offset;

        let filter_instance_grid = GridShape::new(
            origin,
            filter_array_shape,
            self.spacing2() * spec.stride.as_vec2(),
        );
        let filter_grid = GridShape::new(
            origin,
            spec.conv_shape,
            Self::footprint_spacing(self.shape, spec.conv_shape, self.spacing2()),
        );

        let all_calc_filter_grids: Vec<GridShape> = filter_instance_grid
            .vertices()
            .iter()
            .map(|&center| GridShape::new(center, filter_grid.resolution, filter_grid.spacing))
            .collect();
        debug_assert_eq!(
            all_calc_filter_grids.len(),
            filter_instance_grid.vertex_count()
        );

        OutputProperties {
            conv_shape: spec.conv_shape,
            stride: spec.stride,
            dilation: spec.dilation,
            padding: spec.padding,
            filter_array_shape,
            theoretical_filter_array_shape: theoretical,
            position_offset,
            filter_instance_grid,
            filter_grid,
            all_calc_filter_grids,
        }
    }

    /// Value-only refresh of a consumer record: positions and spacings move,
    /// resolutions (and therefore vertex-array cardinalities) do not.
    fn mutate_props_in_place(
        props: &mut OutputProperties,
        position: Vec3,
        shape: IVec2,
        spacing2: Vec2,
    ) {
        props.position_offset = Self::placement_offset(
            props.theoretical_filter_array_shape,
            props.filter_array_shape,
            spacing2,
        );
        let origin = position + props.position_offset;

        props.filter_instance_grid.position = origin;
        props.filter_instance_grid.spacing = spacing2 * props.stride.as_vec2();
        props.filter_instance_grid.recalculate();

        let footprint_spacing = Self::footprint_spacing(shape, props.conv_shape, spacing2);
        props.filter_grid.position = origin;
        props.filter_grid.spacing = footprint_spacing;
        props.filter_grid.recalculate();

        debug_assert_eq!(
            props.all_calc_filter_grids.len(),
            props.filter_instance_grid.vertex_count()
        );
        let centers: Vec<Vec3> = props.filter_instance_grid.vertices().to_vec();
        for (grid, center) in props.all_calc_filter_grids.iter_mut().zip(centers) {
            grid.position = center;
            grid.spacing = footprint_spacing;
            grid.recalculate();
        }
    }

    fn placement_offset(theoretical: Vec2, integer: IVec2, spacing2: Vec2) -> Vec3 {
        if theoretical != integer.as_vec2() && integer.x > 1 && integer.y > 1 {
            (spacing2 * 0.5).extend(0.0)
        } else {
            Vec3::ZERO
        }
    }

    /// Spacing that stretches a `conv_shape` grid across the whole input
    /// map. A 1-wide filter has no pitch to stretch; spacing degenerates to
    /// zero instead of dividing by zero.
    fn footprint_spacing(shape: IVec2, conv_shape: IVec2, spacing2: Vec2) -> Vec2 {
        if conv_shape.x > 1 {
            spacing2 * (shape.x - 1) as f32 / (conv_shape.x - 1) as f32
        } else {
            Vec2::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_4x4() -> FeatureMap {
        FeatureMap::new(
            0,
            MapInputProperties {
                position: Vec3::ZERO,
                shape: IVec2::splat(4),
                spacing: 0.1,
            },
        )
    }

    fn spec_3x3(layer: LayerId, padding: IVec2) -> ConsumerSpec {
        ConsumerSpec {
            layer,
            conv_shape: IVec2::splat(3),
            stride: IVec2::ONE,
            dilation: IVec2::ONE,
            padding,
        }
    }

    #[test]
    fn unregistered_consumer_is_an_error() {
        let map = map_4x4();
        assert!(matches!(
            map.filter_grids(LayerId(7), 0.0),
            Err(GeomError::ConsumerNotRegistered(_))
        ));
    }

    #[test]
    fn registration_builds_placement_grids() {
        let mut map = map_4x4();
        let consumer = LayerId(1);
        map.register_consumer(&spec_3x3(consumer, IVec2::ONE));

        let props = map.output_properties(consumer).unwrap();
        // padded 3x3 stride 1 keeps the 4x4 resolution
        assert_eq!(props.filter_array_shape, IVec2::splat(4));
        assert_eq!(props.filter_instance_grid.vertex_count(), 16);
        assert_eq!(props.all_calc_filter_grids.len(), 16);
    }

    #[test]
    fn filter_grid_counts_follow_all_calcs() {
        let mut map = map_4x4();
        let consumer = LayerId(1);
        map.register_consumer(&spec_3x3(consumer, IVec2::ONE));

        let collapsed = map.filter_grids(consumer, 0.0).unwrap();
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].vertex_count(), 9);

        let expanded = map.filter_grids(consumer, 1.0).unwrap();
        assert_eq!(expanded.len(), 16);
        for grid in &expanded {
            assert_eq!(grid.vertex_count(), 9);
        }
    }

    #[test]
    fn unpadded_stride_one_shrinks_placements() {
        let mut map = map_4x4();
        let consumer = LayerId(1);
        map.register_consumer(&spec_3x3(consumer, IVec2::ZERO));

        let props = map.output_properties(consumer).unwrap();
        assert_eq!(props.filter_array_shape, IVec2::splat(2));
        assert_eq!(props.filter_instance_grid.vertex_count(), 4);
    }

    #[test]
    fn fractional_shape_triggers_placement_offset() {
        let mut map = FeatureMap::new(
            0,
            MapInputProperties {
                position: Vec3::ZERO,
                shape: IVec2::splat(6),
                spacing: 0.1,
            },
        );
        let consumer = LayerId(1);
        map.register_consumer(&ConsumerSpec {
            layer: consumer,
            conv_shape: IVec2::splat(3),
            stride: IVec2::splat(2),
            dilation: IVec2::ONE,
            padding: IVec2::ZERO,
        });

        let props = map.output_properties(consumer).unwrap();
        assert_eq!(props.filter_array_shape, IVec2::splat(2));
        assert_eq!(props.theoretical_filter_array_shape, Vec2::splat(2.5));
        assert!(props
            .position_offset
            .abs_diff_eq(Vec3::new(0.05, 0.05, 0.0), 1e-6));
    }

    #[test]
    fn refresh_without_topology_change_is_idempotent() {
        let mut map = map_4x4();
        let consumer = LayerId(1);
        let spec = spec_3x3(consumer, IVec2::ONE);
        map.register_consumer(&spec);

        map.refresh_consumer(&spec, false);
        let once: Vec<_> = map
            .output_properties(consumer)
            .unwrap()
            .filter_instance_grid
            .vertices()
            .to_vec();

        map.refresh_consumer(&spec, false);
        let twice = map
            .output_properties(consumer)
            .unwrap()
            .filter_instance_grid
            .vertices();

        assert_eq!(once, twice);
    }

    #[test]
    fn value_only_update_mutates_in_place() {
        let mut map = map_4x4();
        let consumer = LayerId(1);
        map.register_consumer(&spec_3x3(consumer, IVec2::ONE));

        map.update_for_input_change(
            MapInputProperties {
                position: Vec3::new(1.0, 0.0, 0.0),
                shape: IVec2::splat(4),
                spacing: 0.2,
            },
            false,
        );

        assert!(map.is_registered(consumer));
        let props = map.output_properties(consumer).unwrap();
        assert_eq!(props.filter_instance_grid.vertex_count(), 16);
        assert!(props
            .filter_instance_grid
            .position
            .abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));

        // pixel grid centroid followed the position drift
        let centroid: Vec3 =
            map.pixel_grid().vertices().iter().sum::<Vec3>() / map.pixel_grid().vertex_count() as f32;
        assert!(centroid.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn shape_change_rebuilds_consumer_grids() {
        let mut map = map_4x4();
        let consumer = LayerId(1);
        map.register_consumer(&spec_3x3(consumer, IVec2::ONE));

        map.update_for_input_change(
            MapInputProperties {
                position: Vec3::ZERO,
                shape: IVec2::splat(6),
                spacing: 0.1,
            },
            false,
        );

        let props = map.output_properties(consumer).unwrap();
        assert_eq!(props.filter_array_shape, IVec2::splat(6));
        assert_eq!(props.all_calc_filter_grids.len(), 36);
        assert_eq!(
            props.all_calc_filter_grids.len(),
            props.filter_instance_grid.vertex_count()
        );
    }

    #[test]
    fn endpoint_grid_blends_from_degenerate_to_pixels() {
        let map = map_4x4();

        let collapsed = map.input_endpoint_grid(0.0).unwrap();
        assert_eq!(collapsed.vertex_count(), 16);
        for v in collapsed.vertices() {
            assert!(v.abs_diff_eq(Vec3::ZERO, 1e-6));
        }

        let full = map.input_endpoint_grid(1.0).unwrap();
        assert_eq!(full.vertices(), map.pixel_grid().vertices());

        let half = map.input_endpoint_grid(0.5).unwrap();
        for (h, f) in half.vertices().iter().zip(full.vertices()) {
            assert!(h.abs_diff_eq(*f * 0.5, 1e-5));
        }
    }

    #[test]
    fn located_filter_grids_collapse_onto_one_placement() {
        let mut map = map_4x4();
        let consumer = LayerId(1);
        map.register_consumer(&spec_3x3(consumer, IVec2::ONE));

        let single = map.filter_grids_at(consumer, 0.0, Some(5)).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].vertex_count(), 9);

        // all placements, each pulled toward placement 5
        let nearly_collapsed = map.filter_grids_at(consumer, 0.25, Some(5)).unwrap();
        assert_eq!(nearly_collapsed.len(), 16);

        let fallback = map.filter_grids_at(consumer, 1.0, None).unwrap();
        assert_eq!(fallback.len(), 16);
    }
}
