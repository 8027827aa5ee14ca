//! Overview display for a convolution layer's true filter count: one small
//! square per filter, arranged above the layer, with fan lines rising from
//! the first rendered feature map's bounding box into the array.

use glam::{Vec2, Vec3};

use crate::mesh::{color, MeshBuffers};
use crate::shape::{interpolate_points, scaled_unit_grid, scaled_unit_line};

#[derive(Debug, Clone)]
pub struct AllFeatureMapsDisplay {
    pub position: Vec3,
    pub filter_count: usize,
    /// Blend of the square array from a 1D line layout (0) to the full
    /// square grid (1).
    pub line_to_grid: f32,
    pub spacing: Vec2,
}

impl AllFeatureMapsDisplay {
    pub fn new(position: Vec3, filter_count: usize, line_to_grid: f32, spacing: Vec2) -> Self {
        Self {
            position,
            filter_count,
            line_to_grid,
            spacing,
        }
    }

    fn filter_positions(&self) -> Vec<Vec3> {
        let side = (self.filter_count as f32).sqrt().ceil() as i32;
        let grid = scaled_unit_grid(glam::IVec2::splat(side), Vec3::ZERO, self.spacing.x);
        let line = scaled_unit_line(self.filter_count, Vec3::ZERO, Vec3::X, self.spacing.x);

        interpolate_points(&line, &grid, self.line_to_grid.clamp(0.0, 1.0))
    }

    /// One quad (two triangles) per true filter.
    pub fn add_squares(&self, mb: &mut MeshBuffers) {
        for offset in self.filter_positions() {
            let square = square_at(self.position + offset, self.spacing);
            let base = mb.vertices.len() as u32;
            for corner in square {
                mb.push_vertex(corner, color::WHITE);
            }
            mb.push_triangle(base, base + 1, base + 2);
            mb.push_triangle(base, base + 2, base + 3);
        }
    }

    /// Fan lines from the four `start_points` (a feature map's bounding-box
    /// corners) up to the corners of the first filter square. The pairing
    /// crosses sides so the fan reads as a connected sheet.
    pub fn add_fan_lines(&self, mb: &mut MeshBuffers, start_points: [Vec3; 4]) {
        let offsets = self.filter_positions();
        let Some(&first) = offsets.first() else {
            return;
        };
        let square = square_at(self.position + first, self.spacing);

        let base = mb.vertices.len() as u32;
        for corner in start_points {
            mb.push_vertex(corner, color::WHITE);
        }
        for corner in square {
            mb.push_vertex(corner, color::WHITE);
        }

        mb.push_line(base, base + 6);
        mb.push_line(base + 1, base + 7);
        mb.push_line(base + 2, base + 4);
        mb.push_line(base + 3, base + 5);
    }
}

/// Square corners around `pos`, mirrored in x so the first filter lands on
/// the positive x side of the array.
fn square_at(pos: Vec3, spacing: Vec2) -> [Vec3; 4] {
    [
        Vec3::new(-pos.x + spacing.x / 4.0, pos.y + spacing.y / 4.0, pos.z),
        Vec3::new(-pos.x - spacing.x / 4.0, pos.y + spacing.y / 4.0, pos.z),
        Vec3::new(-pos.x - spacing.x / 4.0, pos.y - spacing.y / 4.0, pos.z),
        Vec3::new(-pos.x + spacing.x / 4.0, pos.y - spacing.y / 4.0, pos.z),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_square_per_filter() {
        let display =
            AllFeatureMapsDisplay::new(Vec3::new(0.0, 5.0, 2.0), 10, 1.0, Vec2::splat(0.5));

        let mut mb = MeshBuffers::new();
        display.add_squares(&mut mb);

        assert_eq!(mb.vertices.len(), 40);
        assert_eq!(mb.triangle_count(), 20);
    }

    #[test]
    fn fan_connects_four_corner_pairs() {
        let display =
            AllFeatureMapsDisplay::new(Vec3::new(0.0, 5.0, 2.0), 4, 1.0, Vec2::splat(0.5));

        let mut mb = MeshBuffers::new();
        let corners = [
            Vec3::new(-1.0, -1.0, 2.0),
            Vec3::new(-1.0, 1.0, 2.0),
            Vec3::new(1.0, -1.0, 2.0),
            Vec3::new(1.0, 1.0, 2.0),
        ];
        display.add_fan_lines(&mut mb, corners);

        assert_eq!(mb.vertices.len(), 8);
        assert_eq!(mb.line_count(), 4);
    }
}
