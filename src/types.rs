//! Common types and traits for 3D grid geometry.
//!
//! All placement happens on an integer grid: container extents, box extents and
//! box positions are whole grid units.

use std::ops::Add;

/// Extents of an axis-aligned box in grid units.
///
/// `width` runs along X, `height` along Y (the vertical axis used for
/// layering), `length` along Z.
///
/// # Examples
/// ```
/// use pack_live::types::Extents;
///
/// let dims = Extents::new(2, 3, 4);
/// assert_eq!(dims.orientations()[1], Extents::new(2, 4, 3));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Extents {
    pub width: i64,
    pub height: i64,
    pub length: i64,
}

impl Extents {
    #[inline]
    pub const fn new(width: i64, height: i64, length: i64) -> Self {
        Self {
            width,
            height,
            length,
        }
    }

    /// All six assignments of these extents to the three axes.
    ///
    /// The order is fixed and part of the placement contract: the first entry
    /// is the original orientation. Equal extents produce duplicate entries,
    /// which are kept.
    pub fn orientations(&self) -> [Extents; 6] {
        let Extents {
            width: w,
            height: h,
            length: l,
        } = *self;
        [
            Extents::new(w, h, l),
            Extents::new(w, l, h),
            Extents::new(h, w, l),
            Extents::new(h, l, w),
            Extents::new(l, w, h),
            Extents::new(l, h, w),
        ]
    }
}

/// Integer grid coordinate of a box's lower corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct GridPoint {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl GridPoint {
    #[inline]
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

}

impl Add<Extents> for GridPoint {
    type Output = GridPoint;

    #[inline]
    fn add(self, rhs: Extents) -> Self::Output {
        GridPoint::new(
            self.x.saturating_add(rhs.width),
            self.y.saturating_add(rhs.height),
            self.z.saturating_add(rhs.length),
        )
    }
}

/// Trait for objects with 3D extents.
pub trait Dimensional {
    /// Returns the extents of the object.
    fn extents(&self) -> Extents;
}

/// Trait for objects that may have been given a position on the grid.
pub trait Positioned {
    /// Returns the lower corner, or `None` while the object is unplaced.
    fn position(&self) -> Option<GridPoint>;
}

/// Axis-Aligned Bounding Box on the integer grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    /// Minimum corner (position)
    pub min: GridPoint,
    /// Maximum corner (position + extents)
    pub max: GridPoint,
}

impl BoundingBox {
    /// Creates a bounding box from position and extents.
    #[inline]
    pub fn from_position_and_extents(position: GridPoint, extents: Extents) -> Self {
        Self {
            min: position,
            max: position + extents,
        }
    }

    /// Bounding box of a positioned object, `None` if it has no position yet.
    pub fn of<T: Dimensional + Positioned>(object: &T) -> Option<Self> {
        object
            .position()
            .map(|pos| Self::from_position_and_extents(pos, object.extents()))
    }

    /// Checks if two bounding boxes share interior volume.
    ///
    /// Separating Axis Theorem for AABBs: the boxes are disjoint as soon as
    /// one axis separates them. Touching faces do not count as intersection.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        !(self.max.x <= other.min.x
            || self.min.x >= other.max.x
            || self.max.y <= other.min.y
            || self.min.y >= other.max.y
            || self.max.z <= other.min.z
            || self.min.z >= other.max.z)
    }

    /// Checks if this box lies inside `[0, bounds)` on every axis.
    #[inline]
    pub fn within(&self, bounds: Extents) -> bool {
        self.min.x >= 0
            && self.min.y >= 0
            && self.min.z >= 0
            && self.max.x <= bounds.width
            && self.max.y <= bounds.height
            && self.max.z <= bounds.length
    }
}
