use crate::IVec3;

/// Axis-aligned integer box with inclusive lower and upper corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    lower: IVec3,
    upper: IVec3,
}

impl Region {
    /// Builds a region from two corners in any order.
    #[inline]
    pub fn new(a: IVec3, b: IVec3) -> Self {
        Self {
            lower: a.min(b),
            upper: a.max(b),
        }
    }

    /// Cube of `size` voxels per side starting at `lower`.
    #[inline]
    pub fn from_origin_size(lower: IVec3, size: i32) -> Self {
        debug_assert!(size > 0);
        Self {
            lower,
            upper: lower + IVec3::splat(size - 1),
        }
    }

    #[inline]
    pub fn lower(&self) -> IVec3 {
        self.lower
    }

    #[inline]
    pub fn upper(&self) -> IVec3 {
        self.upper
    }

    /// Voxel count per axis (inclusive bounds, so never zero).
    #[inline]
    pub fn dimensions(&self) -> IVec3 {
        self.upper - self.lower + IVec3::ONE
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.dimensions().x
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.dimensions().y
    }

    #[inline]
    pub fn depth(&self) -> i32 {
        self.dimensions().z
    }

    pub fn voxel_count(&self) -> u64 {
        let d = self.dimensions();
        d.x as u64 * d.y as u64 * d.z as u64
    }

    /// Integer centre, rounded towards the lower corner.
    #[inline]
    pub fn centre(&self) -> IVec3 {
        IVec3::new(
            self.lower.x + (self.upper.x - self.lower.x) / 2,
            self.lower.y + (self.upper.y - self.lower.y) / 2,
            self.lower.z + (self.upper.z - self.lower.z) / 2,
        )
    }

    #[inline]
    pub fn contains_point(&self, p: IVec3) -> bool {
        p.x >= self.lower.x
            && p.y >= self.lower.y
            && p.z >= self.lower.z
            && p.x <= self.upper.x
            && p.y <= self.upper.y
            && p.z <= self.upper.z
    }

    #[inline]
    pub fn contains_region(&self, other: &Region) -> bool {
        self.contains_point(other.lower) && self.contains_point(other.upper)
    }

    #[inline]
    pub fn intersects(&self, other: &Region) -> bool {
        self.lower.x <= other.upper.x
            && self.upper.x >= other.lower.x
            && self.lower.y <= other.upper.y
            && self.upper.y >= other.lower.y
            && self.lower.z <= other.upper.z
            && self.upper.z >= other.lower.z
    }

    pub fn intersection(&self, other: &Region) -> Option<Region> {
        if !self.intersects(other) {
            return None;
        }
        Some(Region {
            lower: self.lower.max(other.lower),
            upper: self.upper.min(other.upper),
        })
    }

    /// Grows the region so it also covers `p`.
    #[inline]
    pub fn accumulate_point(&mut self, p: IVec3) {
        self.lower = self.lower.min(p);
        self.upper = self.upper.max(p);
    }

    /// Grows the region so it also covers `other`.
    #[inline]
    pub fn accumulate(&mut self, other: &Region) {
        self.lower = self.lower.min(other.lower);
        self.upper = self.upper.max(other.upper);
    }

    /// Returns a copy expanded by `amount` voxels on every side.
    #[inline]
    pub fn grown(&self, amount: i32) -> Region {
        Region::new(self.lower - IVec3::splat(amount), self.upper + IVec3::splat(amount))
    }

    /// Returns a copy shrunk by `amount` on every side, or `None` if that
    /// would invert an axis.
    pub fn shrunk(&self, amount: i32) -> Option<Region> {
        let lower = self.lower + IVec3::splat(amount);
        let upper = self.upper - IVec3::splat(amount);
        if lower.x > upper.x || lower.y > upper.y || lower.z > upper.z {
            return None;
        }
        Some(Region { lower, upper })
    }
}
