/// Compute the absolute difference between two angles (radians),
/// normalized into `[0, π]`.
pub fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * std::f32::consts::PI;
    // Normalize angle difference to [-π, π).
    let mut diff = (b - a).rem_euclid(two_pi);
    if diff >= std::f32::consts::PI {
        diff -= two_pi;
    }
    diff.abs()
}

/// Check whether two undirected axes (angles modulo π) are approximately
/// orthogonal within `tolerance`.
pub fn is_orthogonal(reference_angle: f32, other_angle: f32, tolerance: f32) -> bool {
    let diff_abs = angle_diff_abs(reference_angle, other_angle);
    let axis_diff = diff_abs.min(std::f32::consts::PI - diff_abs);
    (std::f32::consts::FRAC_PI_2 - axis_diff).abs() <= tolerance.abs()
}

/// Angle between an undirected axis `axis_angle` (defined modulo π) and a
/// directed vector angle `vec_angle`. Returns a value in `[0, π/2]`.
pub fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let diff_abs = angle_diff_abs(axis_angle, vec_angle);
    diff_abs.min(std::f32::consts::PI - diff_abs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn orthogonal_cases() {
        let tol = 1e-3;
        assert!(is_orthogonal(0.0, FRAC_PI_2, tol));
        assert!(is_orthogonal(FRAC_PI_4, 3.0 * FRAC_PI_4, tol));
        // Axes wrap at π.
        assert!(is_orthogonal(0.05, PI - FRAC_PI_2 + 0.05, tol));
        assert!(!is_orthogonal(0.0, 0.25, 0.05));
    }

    #[test]
    fn axis_difference_ignores_direction() {
        assert!((axis_vec_diff(0.0, PI) - 0.0).abs() < 1e-6);
        assert!((axis_vec_diff(FRAC_PI_4, 0.0) - FRAC_PI_4).abs() < 1e-6);
        assert!((axis_vec_diff(3.0 * FRAC_PI_4, 0.0) - FRAC_PI_4).abs() < 1e-6);
    }
}
