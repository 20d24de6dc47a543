//! Paged voxel volume, pager collaborators, ray queries and path finding.
#![forbid(unsafe_code)]

pub mod cancel;
pub mod config;
pub mod generator;
pub mod pager;
pub mod path;
pub mod persist;
pub mod picking;
pub mod raycast;
pub mod volume;

pub use cancel::CancelToken;
pub use config::{ConfigError, WorldConfig, load_config_from_path};
pub use generator::{FlatGenerator, GenContext, Generator, NoiseTerrain};
pub use pager::{
    PageError, PageInContext, PageInOutcome, PageOutContext, PageOutcome, Pager, WorldPager,
};
pub use path::{MAX_PATH_NODES, find_path};
pub use persist::{FsPersister, MemPersister, Persister};
pub use picking::{FaceNames, PickResult, pick_voxel};
pub use raycast::{
    NO_FLOOR_FOUND, RaySample, RaycastResult, find_floor, find_walkable_floor, raycast,
    raycast_with_direction,
};
pub use volume::{PagedVolume, PinnedRegion, VolumeStats};
