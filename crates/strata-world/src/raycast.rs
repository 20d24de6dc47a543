use strata_chunk::{Voxel, VoxelType};
use strata_geom::{IVec3, Region, Vec3};

use crate::volume::PagedVolume;

/// Integer stand-in for "no floor" when callers flatten `Option<i32>`.
pub const NO_FLOOR_FOUND: i32 = i32::MIN;

/// Origins at or beyond this magnitude cannot be floored into an `i32` cell
/// and still leave room to step.
const MAX_ORIGIN: f32 = (1u32 << 30) as f32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaycastResult {
    /// Ran its full length or left the world bound for good.
    Completed,
    /// The callback asked to stop.
    Interrupted,
    /// Degenerate ray; nothing was visited.
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaySample {
    pub position: IVec3,
    pub voxel: Voxel,
}

struct AxisStep {
    step: i32,
    t_max: f32,
    t_delta: f32,
}

#[inline]
fn axis_step(origin: f32, dir: f32) -> AxisStep {
    if dir.abs() < 1e-8 {
        return AxisStep {
            step: 0,
            t_max: f32::INFINITY,
            t_delta: f32::INFINITY,
        };
    }
    let inv = 1.0 / dir.abs();
    let frac = origin - origin.floor();
    if dir > 0.0 {
        AxisStep {
            step: 1,
            t_max: (1.0 - frac) * inv,
            t_delta: inv,
        }
    } else {
        AxisStep {
            step: -1,
            t_max: frac * inv,
            t_delta: inv,
        }
    }
}

/// True while stepping in `step` direction could still bring `cell` inside
/// `bounds`.
fn can_reenter(bounds: &Region, cell: IVec3, step: IVec3) -> bool {
    let lo = bounds.lower();
    let hi = bounds.upper();
    let away = |c: i32, l: i32, h: i32, s: i32| (c < l && s <= 0) || (c > h && s >= 0);
    !(away(cell.x, lo.x, hi.x, step.x)
        || away(cell.y, lo.y, hi.y, step.y)
        || away(cell.z, lo.z, hi.z, step.z))
}

/// Walks the cells along `origin + dir_with_length`, handing each in-bound
/// cell to `callback`. The ray's length is the length of `dir_with_length`.
pub fn raycast<F>(
    volume: &PagedVolume,
    origin: Vec3,
    dir_with_length: Vec3,
    callback: F,
) -> RaycastResult
where
    F: FnMut(&RaySample) -> bool,
{
    let len = dir_with_length.length();
    if !len.is_finite() || len <= f32::EPSILON {
        return RaycastResult::Failed;
    }
    raycast_with_direction(volume, origin, dir_with_length / len, len, callback)
}

/// Amanatides-Woo traversal from the origin cell. `direction` is normalised
/// here, so any non-zero vector works.
pub fn raycast_with_direction<F>(
    volume: &PagedVolume,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    mut callback: F,
) -> RaycastResult
where
    F: FnMut(&RaySample) -> bool,
{
    if !origin.is_finite() || !direction.is_finite() || !max_distance.is_finite() {
        return RaycastResult::Failed;
    }
    if max_distance < 0.0
        || origin.x.abs() >= MAX_ORIGIN
        || origin.y.abs() >= MAX_ORIGIN
        || origin.z.abs() >= MAX_ORIGIN
    {
        return RaycastResult::Failed;
    }
    let dir_len = direction.length();
    if dir_len < 1e-6 {
        return RaycastResult::Failed;
    }
    let d = direction / dir_len;

    let mut ax = axis_step(origin.x, d.x);
    let mut ay = axis_step(origin.y, d.y);
    let mut az = axis_step(origin.z, d.z);
    let step = IVec3::new(ax.step, ay.step, az.step);
    let bounds = volume.bounds();

    let mut cell = origin.floor_to_ivec3();
    let mut t = 0.0f32;
    // A unit-length segment crosses at most three cell boundaries.
    let max_steps = (max_distance.ceil() as u64).saturating_mul(3).saturating_add(3);

    for _ in 0..=max_steps {
        if t > max_distance {
            break;
        }
        if bounds.contains_point(cell) {
            let sample = RaySample {
                position: cell,
                voxel: volume.voxel_at(cell),
            };
            if !callback(&sample) {
                return RaycastResult::Interrupted;
            }
        } else if !can_reenter(&bounds, cell, step) {
            break;
        }

        if ax.t_max < ay.t_max && ax.t_max < az.t_max {
            cell.x += ax.step;
            t = ax.t_max;
            ax.t_max += ax.t_delta;
        } else if ay.t_max < az.t_max {
            cell.y += ay.step;
            t = ay.t_max;
            ay.t_max += ay.t_delta;
        } else {
            cell.z += az.step;
            t = az.t_max;
            az.t_max += az.t_delta;
        }
    }
    RaycastResult::Completed
}

/// Casts straight down the column `(x, z)` from the top of the world and
/// returns the first y whose material satisfies `check`.
pub fn find_floor<F>(volume: &PagedVolume, x: i32, z: i32, check: F) -> Option<i32>
where
    F: Fn(VoxelType) -> bool,
{
    let bounds = volume.bounds();
    let top = bounds.upper().y;
    let origin = Vec3::new(x as f32 + 0.5, top as f32 + 0.5, z as f32 + 0.5);
    let distance = bounds.height() as f32;
    let mut found = None;
    raycast_with_direction(volume, origin, Vec3::DOWN, distance, |s| {
        if check(s.voxel.material()) {
            found = Some(s.position.y);
            return false;
        }
        true
    });
    found
}

/// Standing height at `position`: one above the first solid voxel at or
/// below it within `max_distance_y`.
pub fn find_walkable_floor(
    volume: &PagedVolume,
    position: Vec3,
    max_distance_y: f32,
) -> Option<i32> {
    let mut found = None;
    let result = raycast_with_direction(volume, position, Vec3::DOWN, max_distance_y, |s| {
        if s.voxel.is_solid() {
            found = Some(s.position.y + 1);
            return false;
        }
        true
    });
    if result == RaycastResult::Failed {
        return None;
    }
    found
}
