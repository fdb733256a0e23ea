//! 2D vector used both as a point and as a displacement.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// A 2D vector with double precision.
///
/// Values are copied freely; the only in-place mutation is through
/// [`Vector::set`] and the compound-assignment operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Builds a vector from polar coordinates (angle in radians).
    pub fn from_polar(theta: f64, mag: f64) -> Self {
        Self::new(mag * theta.cos(), mag * theta.sin())
    }

    /// Overwrites both components.
    pub fn set(&mut self, x: f64, y: f64) -> &mut Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn subtract(self, other: Vector) -> Vector {
        Vector::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, scalar: f64) -> Vector {
        Vector::new(self.x * scalar, self.y * scalar)
    }

    pub fn dot(self, other: Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Squared magnitude. Prefer this for range checks.
    pub fn square_mag(self) -> f64 {
        self.dot(self)
    }

    pub fn mag(self) -> f64 {
        self.square_mag().sqrt()
    }

    /// Unit vector in the same direction. The zero vector normalizes to zero.
    pub fn normalize(self) -> Vector {
        let m = self.mag();
        if m == 0.0 {
            Vector::ZERO
        } else {
            self.scale(1.0 / m)
        }
    }

    /// Squared distance between two points.
    pub fn distance_sq(self, other: Vector) -> f64 {
        self.subtract(other).square_mag()
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, rhs: Vector) -> Vector {
        self.subtract(rhs)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, rhs: f64) -> Vector {
        self.scale(rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, rhs: Vector) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vector {
    fn sub_assign(&mut self, rhs: Vector) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:.2}, {:.2}>", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_zero_is_zero() {
        assert_eq!(Vector::ZERO.normalize(), Vector::ZERO);
    }

    #[test]
    fn normalize_has_unit_length() {
        let v = Vector::new(3.0, 4.0).normalize();
        assert!((v.mag() - 1.0).abs() < 1e-12);
        assert!((v.x - 0.6).abs() < 1e-12);
    }

    #[test]
    fn polar_quarter_turn() {
        let v = Vector::from_polar(std::f64::consts::FRAC_PI_2, 2.0);
        assert!(v.x.abs() < 1e-12);
        assert!((v.y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn display_two_decimals() {
        assert_eq!(Vector::new(1.0, -2.5).to_string(), "<1.00, -2.50>");
    }
}
