use strata_geom::{IVec3, Vec3};

use crate::raycast::raycast;
use crate::volume::PagedVolume;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaceNames {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl FaceNames {
    pub fn normal(self) -> IVec3 {
        match self {
            FaceNames::PositiveX => IVec3::new(1, 0, 0),
            FaceNames::NegativeX => IVec3::new(-1, 0, 0),
            FaceNames::PositiveY => IVec3::new(0, 1, 0),
            FaceNames::NegativeY => IVec3::new(0, -1, 0),
            FaceNames::PositiveZ => IVec3::new(0, 0, 1),
            FaceNames::NegativeZ => IVec3::new(0, 0, -1),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PickResult {
    pub did_hit: bool,
    pub hit_voxel: IVec3,
    /// Last empty cell the ray crossed before the hit.
    pub previous_voxel: Option<IVec3>,
    pub hit_face: Option<FaceNames>,
}

/// Face of `hit` facing `from`: first non-zero axis of `from - hit` in x, y,
/// z order.
fn face_towards(from: IVec3, hit: IVec3) -> Option<FaceNames> {
    let d = (from - hit).signum();
    match (d.x, d.y, d.z) {
        (1, _, _) => Some(FaceNames::PositiveX),
        (-1, _, _) => Some(FaceNames::NegativeX),
        (_, 1, _) => Some(FaceNames::PositiveY),
        (_, -1, _) => Some(FaceNames::NegativeY),
        (_, _, 1) => Some(FaceNames::PositiveZ),
        (_, _, -1) => Some(FaceNames::NegativeZ),
        _ => None,
    }
}

/// First non-air voxel along the ray.
pub fn pick_voxel(volume: &PagedVolume, origin: Vec3, dir_with_length: Vec3) -> PickResult {
    let mut previous = None;
    let mut hit = None;
    raycast(volume, origin, dir_with_length, |s| {
        if s.voxel.is_air() {
            previous = Some(s.position);
            true
        } else {
            hit = Some(s.position);
            false
        }
    });
    match hit {
        Some(h) => PickResult {
            did_hit: true,
            hit_voxel: h,
            previous_voxel: previous,
            hit_face: face_towards(origin.floor_to_ivec3(), h),
        },
        None => PickResult::default(),
    }
}
