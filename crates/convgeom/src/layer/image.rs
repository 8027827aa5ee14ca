//! Image-layer mesh policy: the source of the chain. Renders the reduced
//! per-channel grids, optionally with the full-resolution pixel grid as an
//! overlay behind the layer, framed by four lines from the reduced center
//! map's bounding box.

use glam::{Vec2, Vec3};

use crate::error::Result;
use crate::layer::{ImageParams, Layer, LayerKind};
use crate::mesh::{color, Color, MeshBuffers};
use crate::shape::GridShape;
use crate::tensor::{ActivationSource, RenderSettings};

pub(crate) fn mesh(
    layer: &Layer,
    params: &ImageParams,
    source: Option<&dyn ActivationSource>,
    settings: &RenderSettings,
) -> Result<MeshBuffers> {
    let mut mb = MeshBuffers::new();

    let z_pos = Vec3::new(0.0, 0.0, layer.z_position);
    let rgb = params.rgb && layer.topology.depth == 3;

    let mut vertex = 0usize;
    for (map, fm) in layer.feature_maps.iter().enumerate() {
        for &v in fm.pixel_grid().vertices() {
            let color = if rgb {
                channel_color(map)
            } else {
                layer.node_color(source, settings, vertex)
            };
            mb.push_point(v + z_pos, color);
            vertex += 1;
        }
    }

    if params.show_full_resolution {
        add_full_resolution_overlay(layer, params, &mut mb);
    }

    Ok(mb)
}

fn channel_color(map: usize) -> Color {
    match map {
        0 => color::RED,
        1 => color::GREEN,
        2 => color::BLUE,
        _ => color::WHITE,
    }
}

fn add_full_resolution_overlay(layer: &Layer, params: &ImageParams, mb: &mut MeshBuffers) {
    debug_assert!(matches!(layer.kind, LayerKind::Image(_)));

    let overlay = GridShape::new(
        Vec3::new(0.0, 0.0, layer.z_position - params.fullres_offset),
        params.full_resolution,
        Vec2::splat(layer.layout.spacing),
    );
    for &v in overlay.vertices() {
        mb.push_point(v, color::WHITE);
    }

    // Frame: the reduced center map's bounding box at the layer plane and at
    // the overlay plane, corners joined front to back.
    let Some(center_map) = layer.feature_maps.get(layer.feature_maps.len() / 2) else {
        return;
    };
    let near = center_map.pixel_grid().bbox_verts(layer.z_position);
    let far = center_map
        .pixel_grid()
        .bbox_verts(layer.z_position - params.fullres_offset);

    let near_inds: Vec<u32> = near
        .iter()
        .map(|&corner| mb.push_vertex(corner, color::BLACK))
        .collect();
    let far_inds: Vec<u32> = far
        .iter()
        .map(|&corner| mb.push_vertex(corner, color::BLACK))
        .collect();

    for (a, b) in near_inds.iter().zip(&far_inds) {
        mb.push_line(*a, *b);
    }
}
