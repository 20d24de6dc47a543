use proptest::prelude::*;
use strata_geom::{IVec3, Region};

fn coord() -> impl Strategy<Value = i32> {
    -100_000i32..=100_000
}

fn arb_ivec3() -> impl Strategy<Value = IVec3> {
    (coord(), coord(), coord()).prop_map(|(x, y, z)| IVec3::new(x, y, z))
}

fn arb_region() -> impl Strategy<Value = Region> {
    (arb_ivec3(), arb_ivec3()).prop_map(|(a, b)| Region::new(a, b))
}

proptest! {
    // Corner order never matters and lower <= upper on every axis
    #[test]
    fn new_normalizes_corners(a in arb_ivec3(), b in arb_ivec3()) {
        let r1 = Region::new(a, b);
        let r2 = Region::new(b, a);
        prop_assert_eq!(r1, r2);
        let (lo, hi) = (r1.lower(), r1.upper());
        prop_assert!(lo.x <= hi.x && lo.y <= hi.y && lo.z <= hi.z);
    }

    #[test]
    fn corners_and_centre_are_contained(r in arb_region()) {
        prop_assert!(r.contains_point(r.lower()));
        prop_assert!(r.contains_point(r.upper()));
        prop_assert!(r.contains_point(r.centre()));
    }

    #[test]
    fn accumulate_covers_both(a in arb_region(), b in arb_region()) {
        let mut u = a;
        u.accumulate(&b);
        prop_assert!(u.contains_region(&a));
        prop_assert!(u.contains_region(&b));
    }

    #[test]
    fn accumulate_point_contains_point(r in arb_region(), p in arb_ivec3()) {
        let mut u = r;
        u.accumulate_point(p);
        prop_assert!(u.contains_point(p));
        prop_assert!(u.contains_region(&r));
    }

    #[test]
    fn intersection_is_inside_both(a in arb_region(), b in arb_region()) {
        match a.intersection(&b) {
            Some(i) => {
                prop_assert!(a.contains_region(&i));
                prop_assert!(b.contains_region(&i));
            }
            None => prop_assert!(!a.intersects(&b)),
        }
    }

    #[test]
    fn grown_then_shrunk_round_trips(r in arb_region(), m in 0i32..64) {
        prop_assert_eq!(r.grown(m).shrunk(m), Some(r));
    }
}

#[test]
fn dimensions_are_inclusive() {
    let r = Region::new(IVec3::new(0, 0, 0), IVec3::new(31, 0, 3));
    assert_eq!(r.dimensions(), IVec3::new(32, 1, 4));
    assert_eq!(r.voxel_count(), 32 * 4);
}

#[test]
fn from_origin_size_spans_size_voxels() {
    let r = Region::from_origin_size(IVec3::new(-64, 0, 64), 64);
    assert_eq!(r.lower(), IVec3::new(-64, 0, 64));
    assert_eq!(r.upper(), IVec3::new(-1, 63, 127));
    assert_eq!(r.width(), 64);
}

#[test]
fn shrinking_past_centre_is_none() {
    let r = Region::from_origin_size(IVec3::ZERO, 2);
    assert!(r.shrunk(1).is_none());
}
