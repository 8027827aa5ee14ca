//! Max-pool mesh policy: pooling never mixes channels, so feature map `h`
//! connects only to input feature map `h`, one pooling-window grid per
//! output pixel.

use glam::Vec3;

use crate::error::Result;
use crate::layer::Layer;
use crate::mesh::{color, MeshBuffers};
use crate::tensor::{ActivationSource, RenderSettings};

pub(crate) fn mesh(
    layer: &Layer,
    input: Option<&Layer>,
    source: Option<&dyn ActivationSource>,
    settings: &RenderSettings,
) -> Result<MeshBuffers> {
    let mut mb = MeshBuffers::new();
    layer.add_nodes(&mut mb, source, settings);

    let Some(input) = input else {
        return Ok(mb);
    };

    let starts = input.line_start_shapes(layer.id, layer.all_calculations, None)?;

    let z_pos = Vec3::new(0.0, 0.0, layer.z_position);
    let pos_diff = Vec3::new(0.0, 0.0, -layer.z_offset);

    for (h, fm) in layer.feature_maps.iter().enumerate() {
        let endpoint_grid = fm.input_endpoint_grid(layer.all_calculations)?;
        let endpoints = endpoint_grid.vertices();

        let Some(grids) = starts.get(h) else {
            continue;
        };

        for (j, grid) in grids.iter().enumerate() {
            // Pooling window j belongs to output pixel j; trailing windows
            // without a pixel are skipped.
            if j >= endpoints.len() {
                continue;
            }

            let anchor = endpoints[j];
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

    Ok(mb)
}
