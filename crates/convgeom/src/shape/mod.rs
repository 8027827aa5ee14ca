//! Point-set primitives.
//!
//! Every shape produces an ordered, fixed-cardinality array of 3D vertices
//! from a center position, a resolution and a spacing. Cardinality is
//! determined solely by the resolution and never changes without explicit
//! reinitialization; same-kind shapes of equal resolution support linear
//! interpolation in parameter space (origin and spacing are blended, which is
//! a straight-line blend, not a rigid motion).
//!
//! The `scaled_unit_*` helpers produce bare vertex arrays directly, without a
//! shape object; they serve as positioning templates for layer node layouts.

mod circle;
mod grid;
mod line;

pub use circle::CircleShape;
pub use grid::GridShape;
pub use line::LineShape;

use glam::{IVec2, Vec3};

/// Linear blend of two vertex sets, element by element.
///
/// Blends the first `min(a.len(), b.len())` vertices; `alpha = 0` returns the
/// prefix of `a`, `alpha = 1` the prefix of `b`. The relaxed length rule is
/// what lets a `depth`-point circle layout blend into the first `depth` cells
/// of a `ceil(sqrt(depth))²` grid layout.
pub fn interpolate_points(a: &[Vec3], b: &[Vec3], alpha: f32) -> Vec<Vec3> {
    a.iter()
        .zip(b.iter())
        .map(|(&p, &q)| p * (1.0 - alpha) + q * alpha)
        .collect()
}

/// Centered rectangular lattice of `resolution.x * resolution.y` points in
/// the XY plane around `origin`, cell pitch `scale`, row-major
/// (`index = i * resolution.y + j`).
pub fn scaled_unit_grid(resolution: IVec2, origin: Vec3, scale: f32) -> Vec<Vec3> {
    let x_offset = (resolution.x - 1) as f32 / 2.0;
    let y_offset = (resolution.y - 1) as f32 / 2.0;

    let mut out = Vec::with_capacity((resolution.x * resolution.y).max(0) as usize);
    for i in 0..resolution.x {
        for j in 0..resolution.y {
            out.push(Vec3::new(
                origin.x + (i as f32 - x_offset) * scale,
                origin.y + (j as f32 - y_offset) * scale,
                origin.z,
            ));
        }
    }
    out
}

/// `count` colinear points centered at `origin` along `direction`
/// (normalized), neighbor distance `scale`.
pub fn scaled_unit_line(count: usize, origin: Vec3, direction: Vec3, scale: f32) -> Vec<Vec3> {
    let offset = (count.saturating_sub(1)) as f32 / 2.0;
    let step = direction.normalize_or_zero() * scale;

    (0..count)
        .map(|i| origin + (i as f32 - offset) * step)
        .collect()
}

/// `count` points evenly spaced on a circle of radius `scale` in the XY
/// plane around `origin`, starting at angle 0.
pub fn scaled_unit_circle(count: usize, origin: Vec3, scale: f32) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            Vec3::new(
                origin.x + angle.cos() * scale,
                origin.y + angle.sin() * scale,
                origin.z,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_grid_is_centered() {
        let verts = scaled_unit_grid(IVec2::new(3, 3), Vec3::ZERO, 2.0);
        assert_eq!(verts.len(), 9);

        let centroid: Vec3 = verts.iter().sum::<Vec3>() / verts.len() as f32;
        assert!(centroid.abs_diff_eq(Vec3::ZERO, 1e-5));

        // Row-major: index 0 is the (-1, -1) cell, index 8 the (+1, +1) cell.
        assert!(verts[0].abs_diff_eq(Vec3::new(-2.0, -2.0, 0.0), 1e-5));
        assert!(verts[8].abs_diff_eq(Vec3::new(2.0, 2.0, 0.0), 1e-5));
    }

    #[test]
    fn unit_line_follows_direction() {
        let verts = scaled_unit_line(3, Vec3::ZERO, Vec3::Z * 5.0, 1.5);
        assert_eq!(verts.len(), 3);
        assert!(verts[0].abs_diff_eq(Vec3::new(0.0, 0.0, -1.5), 1e-5));
        assert!(verts[1].abs_diff_eq(Vec3::ZERO, 1e-5));
        assert!(verts[2].abs_diff_eq(Vec3::new(0.0, 0.0, 1.5), 1e-5));
    }

    #[test]
    fn unit_circle_has_requested_radius() {
        let verts = scaled_unit_circle(4, Vec3::ZERO, 2.0);
        assert_eq!(verts.len(), 4);
        for v in &verts {
            assert!((v.truncate().length() - 2.0).abs() < 1e-5);
        }
        assert!(verts[0].abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-5));
        assert!(verts[1].abs_diff_eq(Vec3::new(0.0, 2.0, 0.0), 1e-5));
    }

    #[test]
    fn interpolate_points_blends_prefix() {
        let a = vec![Vec3::ZERO, Vec3::X];
        let b = vec![Vec3::Y, Vec3::Y, Vec3::Y];

        let mid = interpolate_points(&a, &b, 0.5);
        assert_eq!(mid.len(), 2);
        assert!(mid[0].abs_diff_eq(Vec3::new(0.0, 0.5, 0.0), 1e-5));
        assert!(mid[1].abs_diff_eq(Vec3::new(0.5, 0.5, 0.0), 1e-5));
    }
}
