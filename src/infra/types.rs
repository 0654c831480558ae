use std::ops::{Add, AddAssign, Mul, Sub};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Arena-local 2D position or direction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(&self, other: &Vec2) -> f32 {
        (*self - *other).length()
    }

    pub fn dot(&self, other: &Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Unit vector in the same direction, or zero for a (near) zero vector.
    pub fn normalized(&self) -> Vec2 {
        let len = self.length();
        if len <= f32::EPSILON {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// Moves toward `target` by at most `max_step`, never overshooting.
    pub fn move_towards(&self, target: Vec2, max_step: f32) -> Vec2 {
        let delta = target - *self;
        let dist = delta.length();
        if dist <= max_step || dist <= f32::EPSILON {
            target
        } else {
            *self + delta * (max_step / dist)
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned rectangle used for random placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn new(min_x: f32, max_x: f32, min_y: f32, max_y: f32) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn from_center_and_extent(center: Vec2, half_x: f32, half_y: f32) -> Self {
        Self {
            min_x: center.x - half_x,
            max_x: center.x + half_x,
            min_y: center.y - half_y,
            max_y: center.y + half_y,
        }
    }

    pub fn contains(&self, pos: &Vec2) -> bool {
        pos.x >= self.min_x && pos.x <= self.max_x && pos.y >= self.min_y && pos.y <= self.max_y
    }

    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    /// Uniform point inside the bounds (degenerate axes collapse to their minimum).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        Vec2::new(
            sample_axis(rng, self.min_x, self.max_x),
            sample_axis(rng, self.min_y, self.max_y),
        )
    }
}

fn sample_axis<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max > min {
        rng.random_range(min..=max)
    } else {
        min
    }
}

/// Facing signal consumed by sprite selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Facing {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Facing {
    /// Dominant-axis facing for a movement direction; `None` for zero movement.
    pub fn from_direction(direction: Vec2) -> Option<Facing> {
        if direction.is_zero() {
            return None;
        }
        if direction.y.abs() > direction.x.abs() {
            if direction.y > 0.0 {
                Some(Facing::Up)
            } else {
                Some(Facing::Down)
            }
        } else if direction.x > 0.0 {
            Some(Facing::Right)
        } else {
            Some(Facing::Left)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_towards_does_not_overshoot() {
        let start = Vec2::new(0.0, 0.0);
        let target = Vec2::new(1.0, 0.0);
        assert_eq!(start.move_towards(target, 5.0), target);

        let halfway = start.move_towards(target, 0.25);
        assert!((halfway.x - 0.25).abs() < 1e-6);
        assert_eq!(halfway.y, 0.0);
    }

    #[test]
    fn normalized_zero_stays_zero() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
        let n = Vec2::new(3.0, 4.0).normalized();
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn facing_uses_dominant_axis() {
        assert_eq!(Facing::from_direction(Vec2::new(0.2, 0.9)), Some(Facing::Up));
        assert_eq!(Facing::from_direction(Vec2::new(0.2, -0.9)), Some(Facing::Down));
        assert_eq!(Facing::from_direction(Vec2::new(0.7, 0.7)), Some(Facing::Right));
        assert_eq!(Facing::from_direction(Vec2::new(-1.0, 0.0)), Some(Facing::Left));
        assert_eq!(Facing::from_direction(Vec2::ZERO), None);
    }

    #[test]
    fn bounds_sample_stays_inside() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let bounds = Bounds::new(-1.5, 1.5, 2.0, 2.0);
        for _ in 0..100 {
            let p = bounds.sample(&mut rng);
            assert!(bounds.contains(&p));
            assert_eq!(p.y, 2.0);
        }
    }
}
