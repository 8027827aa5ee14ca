//! Convolution-layer mesh policy: every rendered feature map connects to the
//! receptive-field grids of every input feature map.

use glam::{Vec2, Vec3};

use crate::error::Result;
use crate::layer::all_feature_maps::AllFeatureMapsDisplay;
use crate::layer::{ConvParams, Layer};
use crate::mesh::{color, MeshBuffers};
use crate::shape::GridShape;
use crate::tensor::{ActivationSource, RenderSettings};

pub(crate) fn mesh(
    layer: &Layer,
    params: &ConvParams,
    input: Option<&Layer>,
    source: Option<&dyn ActivationSource>,
    settings: &RenderSettings,
) -> Result<MeshBuffers> {
    let mut mb = MeshBuffers::new();
    layer.add_nodes(&mut mb, source, settings);

    let Some(input) = input else {
        return Ok(mb);
    };

    let location = (params.conv_location >= 0).then_some(params.conv_location as usize);
    let starts = input.line_start_shapes(layer.id, layer.all_calculations, location)?;

    add_conv_lines(layer, &starts, &mut mb)?;

    if params.show_original_depth {
        add_all_feature_maps_display(layer, params, &mut mb);
    }

    Ok(mb)
}

/// One line fan per (output feature map × input feature map × filter grid):
/// the grid's index selects the matching output pixel as the line endpoint.
fn add_conv_lines(layer: &Layer, starts: &[Vec<GridShape>], mb: &mut MeshBuffers) -> Result<()> {
    let z_pos = Vec3::new(0.0, 0.0, layer.z_position);
    let pos_diff = Vec3::new(0.0, 0.0, -layer.z_offset);

    for fm in &layer.feature_maps {
        let endpoint_grid = fm.input_endpoint_grid(layer.all_calculations)?;
        let endpoints = endpoint_grid.vertices();
        if endpoints.is_empty() {
            continue;
        }

        for grids in starts {
            for (k, grid) in grids.iter().enumerate() {
                let anchor = endpoints[k.min(endpoints.len() - 1)];
                let start = mb.push_vertex(anchor + z_pos, color::BLACK);
                let bundle = (layer.edge_bundle > 0.0).then(|| {
                    mb.push_vertex(
                        layer.edge_bundle_center(anchor, layer.edge_bundle),
                        color::BLACK,
                    )
                });

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

    Ok(())
}

fn add_all_feature_maps_display(layer: &Layer, params: &ConvParams, mb: &mut MeshBuffers) {
    let Some(first_map) = layer.feature_maps.first() else {
        return;
    };

    let display = AllFeatureMapsDisplay::new(
        Vec3::new(0.0, params.full_res_height, layer.z_position),
        layer.topology.depth,
        (layer.layout.line_circle_grid - 1.0).clamp(0.0, 1.0),
        Vec2::splat(params.all_filters_spacing),
    );
    display.add_squares(mb);
    display.add_fan_lines(mb, first_map.pixel_grid().bbox_verts(layer.z_position));
}
