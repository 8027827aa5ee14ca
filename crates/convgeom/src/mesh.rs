//! The engine's sole output contract: flat vertex/color arrays plus index
//! lists for points, lines and triangles, one set per layer per recompute
//! cycle. A render sink turns these into whatever mesh or draw-call format
//! the host needs; the core never touches GPU resources.

use glam::Vec3;

pub type Color = [f32; 4];

pub mod color {
    use super::Color;

    pub const BLACK: Color = [0.0, 0.0, 0.0, 1.0];
    pub const WHITE: Color = [1.0, 1.0, 1.0, 1.0];
    pub const RED: Color = [1.0, 0.0, 0.0, 1.0];
    pub const GREEN: Color = [0.0, 1.0, 0.0, 1.0];
    pub const BLUE: Color = [0.0, 0.0, 1.0, 1.0];

    pub fn gray(value: f32) -> Color {
        [value, value, value, 1.0]
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeshBuffers {
    pub vertices: Vec<Vec3>,
    pub colors: Vec<Color>,
    pub point_indices: Vec<u32>,
    pub line_indices: Vec<u32>,
    pub triangle_indices: Vec<u32>,
}

impl MeshBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a vertex and returns its index.
    pub fn push_vertex(&mut self, position: Vec3, color: Color) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(position);
        self.colors.push(color);
        index
    }

    /// Appends a vertex that is also rendered as a point.
    pub fn push_point(&mut self, position: Vec3, color: Color) -> u32 {
        let index = self.push_vertex(position, color);
        self.point_indices.push(index);
        index
    }

    pub fn push_line(&mut self, from: u32, to: u32) {
        self.line_indices.push(from);
        self.line_indices.push(to);
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.triangle_indices.push(a);
        self.triangle_indices.push(b);
        self.triangle_indices.push(c);
    }

    pub fn line_count(&self) -> usize {
        self.line_indices.len() / 2
    }

    pub fn point_count(&self) -> usize {
        self.point_indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_indices.len() / 3
    }
}
