use glam::{IVec2, Vec2, Vec3};

use crate::error::{GeomError, Result};

/// Centered rectangular lattice of points in the XY plane.
///
/// Vertices are ordered row-major (`index = i * resolution.y + j`) with the
/// y axis running downward within a map, and the lattice centroid sits at
/// `position` for any resolution and spacing. The vertex array is computed
/// eagerly on construction and cached; after mutating the public fields call
/// [`GridShape::recalculate`] to refresh the cache in place (no
/// reallocation as long as the resolution is unchanged).
#[derive(Debug, Clone, PartialEq)]
pub struct GridShape {
    pub position: Vec3,
    pub resolution: IVec2,
    pub spacing: Vec2,
    verts: Vec<Vec3>,
}

impl GridShape {
    pub fn new(position: Vec3, resolution: IVec2, spacing: Vec2) -> Self {
        let mut shape = Self {
            position,
            resolution,
            spacing,
            verts: vec![Vec3::ZERO; (resolution.x.max(0) * resolution.y.max(0)) as usize],
        };
        shape.calc_vertices();
        shape
    }

    pub fn vertex_count(&self) -> usize {
        self.verts.len()
    }

    /// Cached vertex array.
    pub fn vertices(&self) -> &[Vec3] {
        &self.verts
    }

    /// Recomputes the cached vertices from the current field values,
    /// reallocating only if the resolution changed cardinality.
    pub fn recalculate(&mut self) {
        let count = (self.resolution.x.max(0) * self.resolution.y.max(0)) as usize;
        if self.verts.len() != count {
            self.verts.resize(count, Vec3::ZERO);
        }
        self.calc_vertices();
    }

    fn calc_vertices(&mut self) {
        let offset = Vec2::new(
            (self.resolution.x - 1) as f32 * self.spacing.x / 2.0,
            (self.resolution.y - 1) as f32 * -self.spacing.y / 2.0,
        );

        for i in 0..self.resolution.x {
            for j in 0..self.resolution.y {
                let x = self.position.x + i as f32 * self.spacing.x - offset.x;
                let y = self.position.y + j as f32 * -self.spacing.y - offset.y;
                self.verts[(i * self.resolution.y + j) as usize] =
                    Vec3::new(x, y, self.position.z);
            }
        }
    }

    /// Returns a new grid whose position and spacing are linearly blended
    /// toward `target` (`alpha = 0` → self, `alpha = 1` → target).
    ///
    /// Fails with [`GeomError::ShapeResolutionMismatch`] when the two
    /// resolutions differ; interpolation never changes cardinality.
    pub fn interpolated(&self, target: &GridShape, alpha: f32) -> Result<GridShape> {
        if self.resolution != target.resolution {
            return Err(GeomError::ShapeResolutionMismatch {
                left: self.resolution,
                right: target.resolution,
            });
        }

        let position = self.position * (1.0 - alpha) + target.position * alpha;
        let spacing = self.spacing * (1.0 - alpha) + target.spacing * alpha;

        Ok(GridShape::new(position, self.resolution, spacing))
    }

    /// Axis-aligned XY bounding box as `[min_x, min_y, max_x, max_y]`.
    pub fn bbox(&self) -> [f32; 4] {
        let offset = Vec2::new(
            (self.resolution.x - 1) as f32 * self.spacing.x / 2.0,
            (self.resolution.y - 1) as f32 * self.spacing.y / 2.0,
        );

        [
            self.position.x - offset.x,
            self.position.y - offset.y,
            self.position.x + offset.x,
            self.position.y + offset.y,
        ]
    }

    /// The four bounding-box corners as 3D points at the grid's z plane
    /// shifted by `z_offset`, ordered (min,min) (min,max) (max,min) (max,max).
    pub fn bbox_verts(&self, z_offset: f32) -> [Vec3; 4] {
        let [min_x, min_y, max_x, max_y] = self.bbox();
        let z = self.position.z + z_offset;

        [
            Vec3::new(min_x, min_y, z),
            Vec3::new(min_x, max_y, z),
            Vec3::new(max_x, min_y, z),
            Vec3::new(max_x, max_y, z),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centroid(verts: &[Vec3]) -> Vec3 {
        verts.iter().sum::<Vec3>() / verts.len() as f32
    }

    #[test]
    fn vertex_count_and_centroid() {
        for (res, spacing) in [
            (IVec2::new(4, 4), Vec2::splat(0.05)),
            (IVec2::new(3, 7), Vec2::new(0.5, 0.25)),
            (IVec2::new(1, 1), Vec2::splat(1.0)),
        ] {
            let grid = GridShape::new(Vec3::new(1.0, -2.0, 3.0), res, spacing);
            assert_eq!(grid.vertex_count(), (res.x * res.y) as usize);
            assert!(centroid(grid.vertices()).abs_diff_eq(Vec3::new(1.0, -2.0, 3.0), 1e-4));
        }
    }

    #[test]
    fn row_major_order_y_down() {
        let grid = GridShape::new(Vec3::ZERO, IVec2::new(2, 2), Vec2::splat(1.0));
        let v = grid.vertices();
        // index = i * res.y + j, j running downward in y
        assert!(v[0].abs_diff_eq(Vec3::new(-0.5, 0.5, 0.0), 1e-5));
        assert!(v[1].abs_diff_eq(Vec3::new(-0.5, -0.5, 0.0), 1e-5));
        assert!(v[2].abs_diff_eq(Vec3::new(0.5, 0.5, 0.0), 1e-5));
        assert!(v[3].abs_diff_eq(Vec3::new(0.5, -0.5, 0.0), 1e-5));
    }

    #[test]
    fn interpolation_endpoints_match() {
        let a = GridShape::new(Vec3::ZERO, IVec2::new(3, 3), Vec2::splat(1.0));
        let b = GridShape::new(Vec3::new(2.0, 0.0, 4.0), IVec2::new(3, 3), Vec2::splat(3.0));

        let at_zero = a.interpolated(&b, 0.0).unwrap();
        let at_one = a.interpolated(&b, 1.0).unwrap();

        for (u, v) in at_zero.vertices().iter().zip(a.vertices()) {
            assert!(u.abs_diff_eq(*v, 1e-5));
        }
        for (u, v) in at_one.vertices().iter().zip(b.vertices()) {
            assert!(u.abs_diff_eq(*v, 1e-5));
        }
    }

    #[test]
    fn interpolation_rejects_resolution_mismatch() {
        let a = GridShape::new(Vec3::ZERO, IVec2::new(3, 3), Vec2::splat(1.0));
        let b = GridShape::new(Vec3::ZERO, IVec2::new(4, 3), Vec2::splat(1.0));

        for alpha in [0.0, 0.5, 1.0] {
            assert!(matches!(
                a.interpolated(&b, alpha),
                Err(GeomError::ShapeResolutionMismatch { .. })
            ));
        }
    }

    #[test]
    fn recalculate_reuses_allocation() {
        let mut grid = GridShape::new(Vec3::ZERO, IVec2::new(3, 3), Vec2::splat(1.0));
        grid.position = Vec3::new(0.0, 5.0, 0.0);
        grid.spacing = Vec2::splat(0.5);
        grid.recalculate();

        assert_eq!(grid.vertex_count(), 9);
        assert!(centroid(grid.vertices()).abs_diff_eq(Vec3::new(0.0, 5.0, 0.0), 1e-5));
    }

    #[test]
    fn bbox_spans_the_lattice() {
        let grid = GridShape::new(Vec3::new(1.0, 1.0, 0.0), IVec2::new(3, 3), Vec2::splat(2.0));
        let [min_x, min_y, max_x, max_y] = grid.bbox();
        assert_eq!([min_x, min_y, max_x, max_y], [-1.0, -1.0, 3.0, 3.0]);

        let corners = grid.bbox_verts(-0.5);
        assert!(corners[0].abs_diff_eq(Vec3::new(-1.0, -1.0, -0.5), 1e-5));
        assert!(corners[3].abs_diff_eq(Vec3::new(3.0, 3.0, -0.5), 1e-5));
    }
}
