//! Fully-connected mesh policy.
//!
//! A dense layer's receptive field is its entire input: connection grids are
//! requested collapsed (`all_calcs = 0`, one canonical grid per input
//! feature map) and `collapse_input` shrinks their spacing toward zero. At
//! `edge_bundle == 1` the quadratic node × input-point line fan is replaced
//! by a shared bundle center with one line per input point; dense layers
//! carry the largest connection counts in the system.

use glam::Vec3;

use crate::error::Result;
use crate::layer::{DenseParams, Layer};
use crate::mesh::{color, MeshBuffers};
use crate::shape::{interpolate_points, scaled_unit_grid, GridShape};
use crate::tensor::{ActivationSource, RenderSettings};

pub(crate) fn mesh(
    layer: &Layer,
    params: &DenseParams,
    input: Option<&Layer>,
    source: Option<&dyn ActivationSource>,
    settings: &RenderSettings,
) -> Result<MeshBuffers> {
    let mut mb = MeshBuffers::new();
    layer.add_nodes(&mut mb, source, settings);

    if params.show_original_depth {
        add_full_depth_nodes(layer, &mut mb);
    }

    let Some(input) = input else {
        return Ok(mb);
    };

    let mut starts = input.line_start_shapes(layer.id, 0.0, None)?;
    collapse_grids(&mut starts, params.collapse_input);

    if layer.edge_bundle == 1.0 {
        add_fully_bundled_lines(layer, &starts, &mut mb);
    } else {
        add_dense_lines(layer, &starts, &mut mb);
    }

    Ok(mb)
}

fn collapse_grids(starts: &mut [Vec<GridShape>], collapse_input: f32) {
    if collapse_input == 0.0 {
        return;
    }
    for grids in starts.iter_mut() {
        for grid in grids.iter_mut() {
            grid.spacing *= 1.0 - collapse_input;
            grid.recalculate();
        }
    }
}

/// The quadratic path: every node connects to every input point, optionally
/// routed through a per-node bundle waypoint.
fn add_dense_lines(layer: &Layer, starts: &[Vec<GridShape>], mb: &mut MeshBuffers) {
    let z_pos = Vec3::new(0.0, 0.0, layer.z_position);
    let pos_diff = Vec3::new(0.0, 0.0, -layer.z_offset);

    for node in layer.node_positions() {
        let start = mb.push_vertex(node + z_pos, color::BLACK);
        let bundle = (layer.edge_bundle > 0.0).then(|| {
            mb.push_vertex(
                layer.edge_bundle_center(node, layer.edge_bundle),
                color::BLACK,
            )
        });

        for grids in starts {
            for grid in grids {
                for &v in grid.vertices() {
                    let end = mb.push_vertex(v + z_pos + pos_diff, color::BLACK);
                    match bundle {
                        Some(waypoint) => {
                            mb.push_line(start, waypoint);
                            mb.push_line(waypoint, end);
                        }
                        None => mb.push_line(start, end),
                    }
                }
            }
        }
    }
}

/// The fully-bundled fast path: one shared bundle center, one line segment
/// per input point. Reduces O(depth × input points) to O(input points).
fn add_fully_bundled_lines(layer: &Layer, starts: &[Vec<GridShape>], mb: &mut MeshBuffers) {
    let z_pos = Vec3::new(0.0, 0.0, layer.z_position);
    let pos_diff = Vec3::new(0.0, 0.0, -layer.z_offset);

    let first_node = layer.node_positions().first().copied().unwrap_or(Vec3::ZERO);
    let center = mb.push_vertex(layer.edge_bundle_center(first_node, 1.0), color::BLACK);

    for grids in starts {
        for grid in grids {
            for &v in grid.vertices() {
                let end = mb.push_vertex(v + z_pos + pos_diff, color::BLACK);
                mb.push_line(center, end);
            }
        }
    }
}

/// Overview of the true neuron count, blending a line, a stack of concentric
/// circles and a square grid under the layer's `line_circle_grid` slider.
fn add_full_depth_nodes(layer: &Layer, mb: &mut MeshBuffers) {
    let full_depth = layer.topology.depth;
    let depth = layer.reduced_depth.max(1);
    if full_depth == 0 {
        return;
    }

    let center = Vec3::new(0.0, 0.0, layer.z_position);
    let spread = layer.layout.spread;
    let lcg = layer.layout.line_circle_grid;

    let verts = if lcg < 1.0 {
        let line = full_depth_line(center, full_depth, depth, spread);
        let circles = full_depth_circles(center, full_depth, depth, spread);
        interpolate_points(&line, &circles, lcg)
    } else {
        let circles = full_depth_circles(center, full_depth, depth, spread);
        let grid = full_depth_grid(center, full_depth, spread);
        interpolate_points(&circles, &grid, (lcg - 1.0).min(1.0))
    };

    for v in verts {
        mb.push_point(v, color::WHITE);
    }
}

fn full_depth_line(center: Vec3, full_depth: usize, depth: usize, spread: f32) -> Vec<Vec3> {
    let side = (depth as f32).sqrt().ceil();
    crate::shape::scaled_unit_line(full_depth, center, Vec3::X, spread * side / depth as f32)
}

fn full_depth_circles(center: Vec3, full_depth: usize, depth: usize, spread: f32) -> Vec<Vec3> {
    let rings = full_depth.div_ceil(depth);
    let mut out = Vec::with_capacity(rings * depth);
    for ring in 0..rings {
        let radius = spread * 1.3 + ring as f32 * 2.0 * (spread / 10.0);
        out.extend(crate::shape::scaled_unit_circle(depth, center, radius));
    }
    out
}

fn full_depth_grid(center: Vec3, full_depth: usize, spread: f32) -> Vec<Vec3> {
    let side = (full_depth as f32).sqrt().ceil() as i32;
    scaled_unit_grid(glam::IVec2::splat(side), center, spread)
}
