//! Integer lattice geometry shared by patterns, worlds, and scanners.
#![forbid(unsafe_code)]

use core::ops::{Add, AddAssign, Neg, RangeInclusive, Sub, SubAssign};

/// Exact 3-D integer displacement (or absolute cell position).
///
/// Ordered lexicographically by `x`, then `y`, then `z`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Offset3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Offset3 {
    pub const ZERO: Offset3 = Offset3 { x: 0, y: 0, z: 0 };

    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    #[inline]
    pub fn component(self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    #[inline]
    pub fn with_component(self, axis: Axis, v: i32) -> Self {
        match axis {
            Axis::X => Self { x: v, ..self },
            Axis::Y => Self { y: v, ..self },
            Axis::Z => Self { z: v, ..self },
        }
    }

    /// Squared straight-line distance, computed in i128 so any pair of i32
    /// triples is exact.
    #[inline]
    pub fn distance_sq(self, other: Offset3) -> i128 {
        let dx = i128::from(self.x) - i128::from(other.x);
        let dy = i128::from(self.y) - i128::from(other.y);
        let dz = i128::from(self.z) - i128::from(other.z);
        dx * dx + dy * dy + dz * dz
    }

    #[inline]
    pub fn distance(self, other: Offset3) -> f64 {
        (self.distance_sq(other) as f64).sqrt()
    }

    /// Largest per-axis distance; a cube of radius `r` holds exactly the
    /// offsets with `chebyshev(ZERO) <= r`.
    #[inline]
    pub fn chebyshev(self, other: Offset3) -> i64 {
        let dx = (i64::from(self.x) - i64::from(other.x)).abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).abs();
        dx.max(dy).max(dz)
    }

    /// Component-wise sum, `None` when any axis leaves the i32 range.
    #[inline]
    pub fn checked_add(self, rhs: Offset3) -> Option<Offset3> {
        Some(Offset3::new(
            self.x.checked_add(rhs.x)?,
            self.y.checked_add(rhs.y)?,
            self.z.checked_add(rhs.z)?,
        ))
    }

    #[inline]
    fn min_each(self, o: Offset3) -> Offset3 {
        Offset3::new(self.x.min(o.x), self.y.min(o.y), self.z.min(o.z))
    }

    #[inline]
    fn max_each(self, o: Offset3) -> Offset3 {
        Offset3::new(self.x.max(o.x), self.y.max(o.y), self.z.max(o.z))
    }
}

impl Add for Offset3 {
    type Output = Offset3;
    #[inline]
    fn add(self, rhs: Offset3) -> Offset3 {
        Offset3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Offset3 {
    #[inline]
    fn add_assign(&mut self, rhs: Offset3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Offset3 {
    type Output = Offset3;
    #[inline]
    fn sub(self, rhs: Offset3) -> Offset3 {
        Offset3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Offset3 {
    #[inline]
    fn sub_assign(&mut self, rhs: Offset3) {
        self.x -= rhs.x;
        self.y -= rhs.y;
        self.z -= rhs.z;
    }
}

impl Neg for Offset3 {
    type Output = Offset3;
    #[inline]
    fn neg(self) -> Offset3 {
        Offset3::new(-self.x, -self.y, -self.z)
    }
}

impl From<(i32, i32, i32)> for Offset3 {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<Offset3> for (i32, i32, i32) {
    fn from(value: Offset3) -> Self {
        (value.x, value.y, value.z)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Slices and layer-by-layer feedback run along this axis.
    pub const VERTICAL: Axis = Axis::Y;
}

/// Inclusive, component-wise bounding box over integer offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub struct Bounds3 {
    pub min: Offset3,
    pub max: Offset3,
}

impl Bounds3 {
    /// Degenerate box holding only the origin.
    pub const ZERO: Bounds3 = Bounds3 {
        min: Offset3::ZERO,
        max: Offset3::ZERO,
    };

    #[inline]
    pub const fn point(p: Offset3) -> Self {
        Self { min: p, max: p }
    }

    /// Cube spanning `[-radius, radius]` on every axis around `center`,
    /// clamped to the i32 range.
    #[inline]
    pub fn cube(center: Offset3, radius: i32) -> Self {
        let lo = |c: i32| c.saturating_sub(radius);
        let hi = |c: i32| c.saturating_add(radius);
        Self {
            min: Offset3::new(lo(center.x), lo(center.y), lo(center.z)),
            max: Offset3::new(hi(center.x), hi(center.y), hi(center.z)),
        }
    }

    /// Smallest box holding every point, `None` when the iterator is empty.
    pub fn from_points<I: IntoIterator<Item = Offset3>>(points: I) -> Option<Self> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let mut b = Bounds3::point(first);
        for p in it {
            b.include(p);
        }
        Some(b)
    }

    #[inline]
    pub fn include(&mut self, p: Offset3) {
        self.min = self.min.min_each(p);
        self.max = self.max.max_each(p);
    }

    #[inline]
    pub fn contains(&self, p: Offset3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Number of cells per axis (inclusive).
    #[inline]
    pub fn extent(&self) -> Offset3 {
        Offset3::new(
            self.max.x - self.min.x + 1,
            self.max.y - self.min.y + 1,
            self.max.z - self.min.z + 1,
        )
    }

    #[inline]
    pub fn levels(&self, axis: Axis) -> RangeInclusive<i32> {
        self.min.component(axis)..=self.max.component(axis)
    }

    #[inline]
    pub fn translated(&self, by: Offset3) -> Bounds3 {
        Bounds3 {
            min: self.min + by,
            max: self.max + by,
        }
    }
}

/// Quarter turns about the vertical axis, clockwise when viewed from above.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::None,
        Rotation::Cw90,
        Rotation::Cw180,
        Rotation::Cw270,
    ];

    #[inline]
    fn quarter_turns(self) -> u8 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 1,
            Rotation::Cw180 => 2,
            Rotation::Cw270 => 3,
        }
    }

    #[inline]
    fn from_quarter_turns(n: u8) -> Rotation {
        match n % 4 {
            0 => Rotation::None,
            1 => Rotation::Cw90,
            2 => Rotation::Cw180,
            _ => Rotation::Cw270,
        }
    }

    /// Rotation applying `self` then `next`.
    #[inline]
    pub fn compose(self, next: Rotation) -> Rotation {
        Rotation::from_quarter_turns(self.quarter_turns() + next.quarter_turns())
    }

    #[inline]
    pub fn inverse(self) -> Rotation {
        Rotation::from_quarter_turns(4 - self.quarter_turns())
    }

    /// Rotate an offset in the XZ plane, preserving Y.
    #[inline]
    pub fn apply(self, v: Offset3) -> Offset3 {
        match self {
            Rotation::None => v,
            Rotation::Cw90 => Offset3::new(-v.z, v.y, v.x),
            Rotation::Cw180 => Offset3::new(-v.x, v.y, -v.z),
            Rotation::Cw270 => Offset3::new(v.z, v.y, -v.x),
        }
    }
}
