//! Axis-aligned bounding boxes and the per-axis overlap test.

use std::fmt;

use glam::DVec3;

/// One of the three coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub fn component(self, v: DVec3) -> f64 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(name)
    }
}

/// Axis-aligned bounding box of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Bounds of `points`, or `None` for an empty set.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a DVec3>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        Some(Self { min, max })
    }

    /// Closed interval covered along `axis`.
    #[inline]
    pub fn interval(&self, axis: Axis) -> (f64, f64) {
        (axis.component(self.min), axis.component(self.max))
    }

    /// First axis along which the two boxes are disjoint.
    ///
    /// Touching intervals count as overlapping (`a_min <= b_max && a_max >= b_min`).
    pub fn first_disjoint_axis(&self, other: &Aabb) -> Option<Axis> {
        Axis::ALL.into_iter().find(|&axis| {
            let (a_min, a_max) = self.interval(axis);
            let (b_min, b_max) = other.interval(axis);
            !(a_min <= b_max && a_max >= b_min)
        })
    }

    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.first_disjoint_axis(other).is_none()
    }
}
