//! 2D fixed-point vector math for world-space positions and velocities.
//!
//! All components are [`Fixed64`] (Q32.32). Square roots use a binary search
//! over the fixed-point range, so every operation here is bit-exact across
//! platforms.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A 2D vector in world units (1 unit = 1 tile edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: Fixed64,
    pub y: Fixed64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 {
        x: Fixed64::ZERO,
        y: Fixed64::ZERO,
    };

    #[inline]
    pub const fn new(x: Fixed64, y: Fixed64) -> Self {
        Self { x, y }
    }

    /// Dot product.
    #[inline]
    pub fn dot(self, other: Vec2) -> Fixed64 {
        self.x * other.x + self.y * other.y
    }

    /// Squared length. Cheaper than [`length`](Self::length); prefer it for
    /// comparisons.
    #[inline]
    pub fn length_squared(self) -> Fixed64 {
        self.dot(self)
    }

    /// Euclidean length via fixed-point square root.
    #[inline]
    pub fn length(self) -> Fixed64 {
        fixed_sqrt(self.length_squared())
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Vec2) -> Fixed64 {
        (other - self).length_squared()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Vec2) -> Fixed64 {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Unit vector in the same direction, or zero if this vector is zero.
    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len == Fixed64::ZERO {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    /// Linear interpolation: `self` at t = 0, `other` at t = 1.
    pub fn lerp(self, other: Vec2, t: Fixed64) -> Vec2 {
        self + (other - self) * t
    }

    /// Rotate 90 degrees counterclockwise.
    #[inline]
    pub fn perp_ccw(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    /// Rotate 90 degrees clockwise.
    #[inline]
    pub fn perp_cw(self) -> Vec2 {
        Vec2::new(self.y, -self.x)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    #[inline]
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    #[inline]
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

impl Mul<Fixed64> for Vec2 {
    type Output = Vec2;
    #[inline]
    fn mul(self, rhs: Fixed64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Fixed-point square root by binary search.
///
/// Returns zero for non-positive inputs. 32 iterations halve the search
/// interval down to the last fractional bit for the magnitudes the
/// simulation uses (world coordinates and velocities).
pub fn fixed_sqrt(value: Fixed64) -> Fixed64 {
    if value <= Fixed64::ZERO {
        return Fixed64::ZERO;
    }
    let one = Fixed64::from_num(1);
    let mut low = Fixed64::ZERO;
    let mut high = if value < one { one } else { value };
    for _ in 0..32 {
        let mid: Fixed64 = (low + high) >> 1;
        let mid_sq = mid.saturating_mul(mid);
        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }
    low
}
