use glam::Vec3;

use crate::error::{GeomError, Result};

/// `resolution` colinear points centered at `position` along `direction`
/// (normalized at calculation time), neighbor distance `spacing`.
#[derive(Debug, Clone, PartialEq)]
pub struct LineShape {
    pub position: Vec3,
    pub resolution: usize,
    pub spacing: f32,
    pub direction: Vec3,
    verts: Vec<Vec3>,
}

impl LineShape {
    pub fn new(position: Vec3, resolution: usize, spacing: f32) -> Self {
        Self::along(position, resolution, spacing, Vec3::X)
    }

    pub fn along(position: Vec3, resolution: usize, spacing: f32, direction: Vec3) -> Self {
        let mut shape = Self {
            position,
            resolution,
            spacing,
            direction,
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
        let offset = (self.resolution.saturating_sub(1)) as f32 * self.spacing / 2.0;
        let dir = self.direction.normalize_or_zero();

        for (i, v) in self.verts.iter_mut().enumerate() {
            *v = self.position + dir * (i as f32 * self.spacing - offset);
        }
    }

    /// Same-cardinality linear blend of position and spacing; fails with
    /// [`GeomError::ShapeResolutionMismatch`] otherwise.
    pub fn interpolated(&self, target: &LineShape, alpha: f32) -> Result<LineShape> {
        if self.resolution != target.resolution {
            return Err(GeomError::ShapeResolutionMismatch {
                left: glam::IVec2::new(self.resolution as i32, 1),
                right: glam::IVec2::new(target.resolution as i32, 1),
            });
        }

        Ok(LineShape::along(
            self.position * (1.0 - alpha) + target.position * alpha,
            self.resolution,
            self.spacing * (1.0 - alpha) + target.spacing * alpha,
            self.direction * (1.0 - alpha) + target.direction * alpha,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_along_x_by_default() {
        let line = LineShape::new(Vec3::new(1.0, 0.0, 0.0), 5, 2.0);
        let v = line.vertices();
        assert_eq!(v.len(), 5);
        assert!(v[0].abs_diff_eq(Vec3::new(-3.0, 0.0, 0.0), 1e-5));
        assert!(v[2].abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5));
        assert!(v[4].abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn interpolation_needs_equal_resolution() {
        let a = LineShape::new(Vec3::ZERO, 4, 1.0);
        let b = LineShape::new(Vec3::ZERO, 5, 1.0);
        assert!(a.interpolated(&b, 0.5).is_err());
    }
}
