//! Planar vectors and angle helpers shared by every module.

use core::f64::consts::{PI, TAU};
use core::ops::{Add, AddAssign, Mul, Neg, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lengths at or below this are treated as zero: the bearing is undefined.
pub const EPS: f64 = 1e-9;

/// Wrap an angle into (-π, π].
pub fn wrap_angle(x: f64) -> f64 {
    let y = (x + PI).rem_euclid(TAU) - PI;
    // rem_euclid maps +π to -π; keep the closed end on the positive side.
    if y <= -PI {
        PI
    } else {
        y
    }
}

/// Signed shortest rotation from `b` to `a`.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    wrap_angle(a - b)
}

/// A 2-D vector with Cartesian storage and derived polar views.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn from_polar(len: f64, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            x: len * c,
            y: len * s,
        }
    }

    pub fn len(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Raw `atan2` angle. Meaningless for zero vectors; prefer [`Vec2::bearing`].
    pub fn angle(&self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Direction of the vector, or `None` when its length is zero.
    pub fn bearing(&self) -> Option<f64> {
        if self.len() > EPS {
            Some(self.angle())
        } else {
            None
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
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

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, k: f64) -> Vec2 {
        Vec2::new(self.x * k, self.y * k)
    }
}
