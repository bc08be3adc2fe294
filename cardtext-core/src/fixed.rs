//! 26.6 fixed-point numbers for layout arithmetic.
//!
//! Every vertical and horizontal offset the flow engine produces is a
//! [`Fixed`]: an `i32` holding 1/64ths of a layout unit. Conversions from
//! floating point round to the nearest 1/64, so two machines laying out the
//! same document produce bit-identical line positions.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

const SHIFT: i32 = 6;
const ONE_RAW: i32 = 1 << SHIFT;

/// Signed 26.6 fixed-point value.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(ONE_RAW);
    /// Sentinel for "unbounded". Small enough that adding a page height or a
    /// margin to it never overflows `i32`.
    pub const MAX: Fixed = Fixed(i32::MAX / 256);

    pub const fn from_raw(raw: i32) -> Self {
        Fixed(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub const fn from_int(v: i32) -> Self {
        Fixed(v.saturating_mul(ONE_RAW))
    }

    /// Rounds to the nearest 1/64. NaN maps to zero, infinities saturate.
    pub fn from_f32(v: f32) -> Self {
        Fixed((v * ONE_RAW as f32).round() as i32)
    }

    pub fn from_f64(v: f64) -> Self {
        Fixed((v * ONE_RAW as f64).round() as i32)
    }

    pub fn to_f32(self) -> f32 {
        self.0 as f32 / ONE_RAW as f32
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / ONE_RAW as f64
    }

    /// Integer part, rounding toward negative infinity.
    pub const fn truncate(self) -> i32 {
        self.0 >> SHIFT
    }

    /// Nearest integer, halves rounding up.
    pub const fn to_int(self) -> i32 {
        (self.0 + ONE_RAW / 2) >> SHIFT
    }

    pub const fn floor(self) -> Fixed {
        Fixed(self.0 & -ONE_RAW)
    }

    pub const fn ceil(self) -> Fixed {
        Fixed(self.0.saturating_add(ONE_RAW - 1) & -ONE_RAW)
    }

    pub const fn round(self) -> Fixed {
        Fixed(self.0.saturating_add(ONE_RAW / 2) & -ONE_RAW)
    }

    pub fn abs(self) -> Fixed {
        Fixed(self.0.saturating_abs())
    }

    pub fn max(self, other: Fixed) -> Fixed {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Fixed) -> Fixed {
        if self <= other { self } else { other }
    }

    pub const fn is_max(self) -> bool {
        self.0 == Self::MAX.0
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({})", self.to_f64())
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

impl Add for Fixed {
    type Output = Fixed;
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Fixed {
    fn add_assign(&mut self, rhs: Fixed) {
        *self = *self + rhs;
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Fixed {
    fn sub_assign(&mut self, rhs: Fixed) {
        *self = *self - rhs;
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    fn neg(self) -> Fixed {
        Fixed(self.0.saturating_neg())
    }
}

impl Mul<i32> for Fixed {
    type Output = Fixed;
    fn mul(self, rhs: i32) -> Fixed {
        Fixed(self.0.saturating_mul(rhs))
    }
}

impl Div<i32> for Fixed {
    type Output = Fixed;
    fn div(self, rhs: i32) -> Fixed {
        if rhs == 0 {
            return Fixed::MAX;
        }
        Fixed(self.0 / rhs)
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    fn mul(self, rhs: Fixed) -> Fixed {
        let wide = (self.0 as i64 * rhs.0 as i64 + (ONE_RAW as i64 / 2)) >> SHIFT;
        Fixed(wide.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }
}

impl Div for Fixed {
    type Output = Fixed;
    fn div(self, rhs: Fixed) -> Fixed {
        if rhs.0 == 0 {
            return Fixed::MAX;
        }
        let wide = ((self.0 as i64) << SHIFT) / rhs.0 as i64;
        Fixed(wide.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }
}

impl From<i32> for Fixed {
    fn from(v: i32) -> Self {
        Fixed::from_int(v)
    }
}

/// A point in fixed-point layout space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedPoint {
    pub x: Fixed,
    pub y: Fixed,
}

impl FixedPoint {
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }
}

/// A size in fixed-point layout space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedSize {
    pub width: Fixed,
    pub height: Fixed,
}

impl FixedSize {
    pub const fn new(width: Fixed, height: Fixed) -> Self {
        Self { width, height }
    }
}
