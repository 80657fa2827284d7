//! Geometry helpers for node placement and movement.
//!
//! Contains helper functions for:
//! - Euclidean distance between positions
//! - Clamping positions to the square deployment area `[0, area]²`
//! - Drawing random integer-grid positions and offsets

use rand::Rng;

use super::types::Point;

/// Squared Euclidean distance (avoids a sqrt when only comparing).
pub fn distance2(a: &Point, b: &Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

/// Euclidean distance between two points.
pub fn distance(a: &Point, b: &Point) -> f64 {
    distance2(a, b).sqrt()
}

/// Clamp a point into the square area `[0, area_size]` on both axes.
pub fn clamp_to_area(point: Point, area_size: f64) -> Point {
    Point {
        x: point.x.clamp(0.0, area_size),
        y: point.y.clamp(0.0, area_size),
    }
}

/// Uniform random position on the integer grid of `[0, area_size]²`.
pub fn random_position<R: Rng + ?Sized>(area_size: f64, rng: &mut R) -> Point {
    let max = area_size.floor().max(0.0) as i64;
    Point {
        x: rng.gen_range(0..=max) as f64,
        y: rng.gen_range(0..=max) as f64,
    }
}

/// Random integer offset in `[-step, step]` on both axes.
pub fn random_offset<R: Rng + ?Sized>(step: i64, rng: &mut R) -> (f64, f64) {
    let dx = rng.gen_range(-step..=step) as f64;
    let dy = rng.gen_range(-step..=step) as f64;
    (dx, dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn distance_is_symmetric() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(distance(&a, &b), 5.0);
        assert_eq!(distance(&b, &a), 5.0);
        assert_eq!(distance2(&a, &b), 25.0);
    }

    #[test]
    fn clamp_keeps_points_inside() {
        let p = clamp_to_area(Point::new(-3.0, 120.0), 100.0);
        assert_eq!(p, Point::new(0.0, 100.0));
        let inside = Point::new(42.0, 17.0);
        assert_eq!(clamp_to_area(inside, 100.0), inside);
    }

    #[test]
    fn random_positions_stay_in_area() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            let p = random_position(50.0, &mut rng);
            assert!((0.0..=50.0).contains(&p.x) && (0.0..=50.0).contains(&p.y));
            assert_eq!(p.x.fract(), 0.0);
        }
    }

    #[test]
    fn offsets_respect_step() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..1000 {
            let (dx, dy) = random_offset(2, &mut rng);
            assert!(dx.abs() <= 2.0 && dy.abs() <= 2.0);
        }
    }
}
