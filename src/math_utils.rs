use glam::{Vec2, Vec3};

/// Calculates the (x, y) position that results from orbiting around `pivot` at
/// a distance of `radius`.
pub fn rotate_around_pivot(pivot: Vec2, radius: f32, angle_radian: f32) -> Vec2 {
    Vec2 {
        x: pivot.x + radius * f32::sin(angle_radian),
        y: pivot.y + radius * f32::cos(angle_radian),
    }
}

/// Linear interpolation between `a` and `b`.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Moves `current` a fraction `factor` of the way to `target`. Called once per
/// frame this converges exponentially on the target and never overshoots for
/// `factor` in (0, 1].
pub fn damp(current: f32, target: f32, factor: f32) -> f32 {
    current + (target - current) * factor
}

/// Component-wise `damp` for vectors.
pub fn damp_vec3(current: Vec3, target: Vec3, factor: f32) -> Vec3 {
    current + (target - current) * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damp_converges_without_overshoot() {
        let mut value = 0.0;
        let mut last = value;

        for _ in 0..500 {
            value = damp(value, 1.0, 0.03);
            assert!(value >= last && value <= 1.0);
            last = value;
        }

        assert!((1.0 - value).abs() < 1e-3);
    }

    #[test]
    fn orbit_stays_on_radius() {
        let pivot = Vec2::new(1.0, -2.0);

        for step in 0..16 {
            let p = rotate_around_pivot(pivot, 0.8, step as f32 * 0.4);
            assert!(((p - pivot).length() - 0.8).abs() < 1e-5);
        }
    }

    #[test]
    fn lerp_endpoints() {
        assert_eq!(2.0, lerp(2.0, 6.0, 0.0));
        assert_eq!(6.0, lerp(2.0, 6.0, 1.0));
        assert_eq!(4.0, lerp(2.0, 6.0, 0.5));
    }
}
