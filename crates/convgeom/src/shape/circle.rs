use glam::Vec3;

use crate::error::{GeomError, Result};

/// `resolution` points evenly spaced on a circle in the XY plane around
/// `position`; `spacing` is the radius.
#[derive(Debug, Clone, PartialEq)]
pub struct CircleShape {
    pub position: Vec3,
    pub resolution: usize,
    pub spacing: f32,
    verts: Vec<Vec3>,
}

impl CircleShape {
    pub fn new(position: Vec3, resolution: usize, spacing: f32) -> Self {
        let mut shape = Self {
            position,
            resolution,
            spacing,
            verts: vec![Vec3::ZERO; resolution],
        };
        shape.calc_vertices();
        shape
    }

    pub fn vertex_count(&self) -> usize {
        self.verts.len()
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.verts
    }

    pub fn recalculate(&mut self) {
        if self.verts.len() != self.resolution {
            self.verts.resize(self.resolution, Vec3::ZERO);
        }
        self.calc_vertices();
    }

    fn calc_vertices(&mut self) {
        for (i, v) in self.verts.iter_mut().enumerate() {
            let angle = i as f32 / self.resolution as f32 * std::f32::consts::TAU;
            *v = Vec3::new(
                self.position.x + angle.cos() * self.spacing,
                self.position.y + angle.sin() * self.spacing,
                self.position.z,
            );
        }
    }

    /// Same-cardinality linear blend of position and radius; fails with
    /// [`GeomError::ShapeResolutionMismatch`] otherwise.
    pub fn interpolated(&self, target: &CircleShape, alpha: f32) -> Result<CircleShape> {
        if self.resolution != target.resolution {
            return Err(GeomError::ShapeResolutionMismatch {
                left: glam::IVec2::new(self.resolution as i32, 1),
                right: glam::IVec2::new(target.resolution as i32, 1),
            });
        }

        Ok(CircleShape::new(
            self.position * (1.0 - alpha) + target.position * alpha,
            self.resolution,
            self.spacing * (1.0 - alpha) + target.spacing * alpha,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_sit_on_the_radius() {
        let circle = CircleShape::new(Vec3::new(0.0, 0.0, 2.0), 7, 1.5);
        assert_eq!(circle.vertex_count(), 7);
        for v in circle.vertices() {
            assert!((v.truncate().length() - 1.5).abs() < 1e-5);
            assert_eq!(v.z, 2.0);
        }
    }
}
