use std::error::Error;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use serde::Serialize;
use strata_chunk::VoxelType;
use strata_geom::{IVec3, Vec3};
use strata_runtime::WorldMgr;
use strata_world::{WorldConfig, load_config_from_path};

/// Headless driver: extracts the tiles around a point and reports what came
/// back along with a few world queries.
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(about = "Pages a voxel world in and extracts surface meshes around a point")]
struct Args {
    /// World config TOML (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tile radius around the centre, per axis
    #[arg(short, long, default_value_t = 2)]
    radius: i32,

    /// World position to extract around, as x,y,z
    #[arg(long, value_parser = parse_ivec3, default_value = "0,0,0")]
    center: IVec3,

    /// Overrides the terrain seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Overrides the extraction worker count
    #[arg(short, long)]
    workers: Option<usize>,

    /// Keeps edits and generated chunks in memory only
    #[arg(long)]
    no_persist: bool,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,

    /// Give up on outstanding tiles after this many seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

fn parse_ivec3(s: &str) -> Result<IVec3, String> {
    let parts: Vec<_> = s.split(',').map(str::trim).collect();
    let [x, y, z] = parts.as_slice() else {
        return Err(format!("expected x,y,z, got {s:?}"));
    };
    let n = |v: &str| v.parse::<i32>().map_err(|e| format!("{v:?}: {e}"));
    Ok(IVec3::new(n(x)?, n(y)?, n(z)?))
}

#[derive(Serialize, Default)]
struct Report {
    tiles_scheduled: usize,
    tiles_received: usize,
    empty_tiles: usize,
    opaque_quads: usize,
    water_quads: usize,
    elapsed_ms: u64,
    volume: VolumeReport,
    queries: QueryReport,
}

#[derive(Serialize, Default)]
struct VolumeReport {
    resident: usize,
    capacity: usize,
    hits: u64,
    misses: u64,
    page_ins: u64,
    page_outs: u64,
    failed_page_ins: u64,
    failed_page_outs: u64,
}

#[derive(Serialize, Default)]
struct QueryReport {
    floor_at_center: Option<i32>,
    random_surface: (i32, i32, i32),
    pick_hit: Option<(i32, i32, i32)>,
    pick_face: Option<String>,
}

fn load_config(args: &Args) -> Result<WorldConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => load_config_from_path(path)?,
        None => WorldConfig::from_toml_str("")?,
    };
    if let Some(seed) = args.seed {
        config.terrain.seed = seed;
    }
    if let Some(workers) = args.workers {
        config.extraction.workers = workers;
    }
    if args.no_persist {
        config.persist.enabled = false;
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .parse_env("RUST_LOG")
        .init();

    let config = load_config(&args)?;
    let world = WorldMgr::new(config)?;
    let t0 = Instant::now();

    let mut report = Report::default();
    let step = world.mesh_size();
    let centre = world.mesh_pos(args.center);
    let r = args.radius.max(0);
    for dz in -r..=r {
        for dy in -r..=r {
            for dx in -r..=r {
                let tile = centre + IVec3::new(dx, dy, dz) * step;
                if world.schedule_mesh_extraction(tile) {
                    report.tiles_scheduled += 1;
                }
            }
        }
    }
    world.update_extraction_order(args.center);
    log::info!(
        target: "runtime",
        "scheduled {} tiles around {:?}",
        report.tiles_scheduled,
        centre
    );

    let deadline = t0 + Duration::from_secs(args.timeout_secs);
    while report.tiles_received < report.tiles_scheduled {
        match world.pop() {
            Some(meshes) => {
                report.tiles_received += 1;
                if meshes.is_empty() {
                    report.empty_tiles += 1;
                }
                report.opaque_quads += meshes.opaque.quad_count();
                report.water_quads += meshes.water.quad_count();
            }
            None if Instant::now() >= deadline => {
                log::warn!(
                    target: "runtime",
                    "gave up with {} of {} tiles outstanding",
                    report.tiles_scheduled - report.tiles_received,
                    report.tiles_scheduled
                );
                break;
            }
            None => std::thread::sleep(Duration::from_millis(2)),
        }
    }
    report.elapsed_ms = t0.elapsed().as_millis() as u64;

    let stats = world.volume_stats();
    report.volume = VolumeReport {
        resident: stats.resident,
        capacity: stats.capacity,
        hits: stats.hits,
        misses: stats.misses,
        page_ins: stats.page_ins,
        page_outs: stats.page_outs,
        failed_page_ins: stats.failed_page_ins,
        failed_page_outs: stats.failed_page_outs,
    };

    let floor = world.find_floor(args.center.x, args.center.z, |m| m != VoxelType::Air);
    report.queries.floor_at_center = floor;
    report.queries.random_surface = world.random_pos().into();
    if let Some(y) = floor {
        let above = IVec3::new(args.center.x, y + 8, args.center.z);
        let eye = Vec3::from(above) + Vec3::new(0.5, 0.5, 0.5);
        let pick = world.pick_voxel(eye, Vec3::new(0.0, -16.0, 0.0));
        if pick.did_hit {
            report.queries.pick_hit = Some(pick.hit_voxel.into());
            report.queries.pick_face = pick.hit_face.map(|f| format!("{f:?}"));
        }
    }

    world.shutdown();
    print!("{}", toml::to_string_pretty(&report)?);
    Ok(())
}
