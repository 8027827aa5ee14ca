//! Depth-arrangement of a layer's nodes.
//!
//! Positions are recomputed on every request rather than cached: the blend
//! sliders change continuously during interaction and the computation is a
//! handful of small vertex arrays.

use glam::Vec3;

use crate::layer::LayoutParams;
use crate::shape::{interpolate_points, scaled_unit_circle, scaled_unit_grid, scaled_unit_line};

/// 3D positions for `depth` nodes under the layout sliders.
///
/// A square grid (side `ceil(sqrt(depth))`), an X-axis and a Z-axis line
/// (scaled by `side / depth` to keep the total span comparable across
/// layouts) and a circle are built around the origin at `spread` scale; the
/// two lines blend by `line_x_to_z`, and `line_circle_grid` sweeps
/// line → circle over `[0, 1]` and circle → grid over `[1, 2]`.
pub fn node_positions(depth: usize, layout: &LayoutParams) -> Vec<Vec3> {
    if depth == 0 {
        return Vec::new();
    }

    let side = (depth as f32).sqrt().ceil() as i32;

    let grid = scaled_unit_grid(glam::IVec2::splat(side), Vec3::ZERO, layout.spread);
    let line_scale = layout.spread * side as f32 / depth as f32;
    let line_x = scaled_unit_line(depth, Vec3::ZERO, Vec3::X, line_scale);
    let line_z = scaled_unit_line(depth, Vec3::ZERO, Vec3::Z, line_scale);
    let line = interpolate_points(&line_x, &line_z, layout.line_x_to_z);
    let circle = scaled_unit_circle(depth, Vec3::ZERO, layout.spread);

    if layout.line_circle_grid < 1.0 {
        interpolate_points(&line, &circle, layout.line_circle_grid)
    } else {
        interpolate_points(&circle, &grid, (layout.line_circle_grid - 1.0).min(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayoutParams;

    fn layout(line_circle_grid: f32, line_x_to_z: f32) -> LayoutParams {
        LayoutParams {
            spread: 1.0,
            spacing: 0.05,
            line_circle_grid,
            line_x_to_z,
        }
    }

    #[test]
    fn always_yields_depth_positions() {
        for depth in [1, 3, 5, 16] {
            for lcg in [0.0, 0.5, 1.0, 1.7, 2.0] {
                assert_eq!(node_positions(depth, &layout(lcg, 0.0)).len(), depth);
            }
        }
    }

    #[test]
    fn slider_extremes_recover_pure_layouts() {
        let depth = 4;

        let line = node_positions(depth, &layout(0.0, 0.0));
        for p in &line {
            assert_eq!(p.y, 0.0);
            assert_eq!(p.z, 0.0);
        }

        let vertical = node_positions(depth, &layout(0.0, 1.0));
        for p in &vertical {
            assert_eq!(p.x, 0.0);
            assert_eq!(p.y, 0.0);
        }

        let circle = node_positions(depth, &layout(1.0, 0.0));
        for p in &circle {
            assert!((p.truncate().length() - 1.0).abs() < 1e-5);
        }

        let grid = node_positions(depth, &layout(2.0, 0.0));
        let expected = scaled_unit_grid(glam::IVec2::splat(2), Vec3::ZERO, 1.0);
        for (g, e) in grid.iter().zip(&expected) {
            assert!(g.abs_diff_eq(*e, 1e-5));
        }
    }
}
