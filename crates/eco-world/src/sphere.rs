//! Geometry of the spherical world surface.

use eco_core::Position;
use rand::Rng;

/// Scale `point` onto the sphere of the given radius. Returns `None` for the
/// origin or non-finite input, which have no defined surface direction.
pub fn project_to_surface(point: Position, radius: f32) -> Option<Position> {
    let length = point.length();
    if !length.is_finite() || length <= f32::EPSILON {
        return None;
    }
    Some(point * (radius / length))
}

/// Remove the component of `direction` along the outward normal at `at`.
pub fn tangent_component(direction: Position, at: Position) -> Position {
    let normal = at.normalize_or_zero();
    direction - normal * direction.dot(normal)
}

/// Uniformly distributed unit vector
pub fn random_unit<R: Rng + ?Sized>(rng: &mut R) -> Position {
    // Rejection sampling inside the unit ball keeps the direction uniform
    loop {
        let candidate = Position::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        let length_sq = candidate.length_squared();
        if length_sq > 1e-6 && length_sq <= 1.0 {
            return candidate / length_sq.sqrt();
        }
    }
}

/// Uniformly distributed point on the world surface
pub fn random_surface_point<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Position {
    random_unit(rng) * radius
}
