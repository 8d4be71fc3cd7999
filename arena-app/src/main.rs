mod arena;
mod event_bus;
mod objects;
mod prefab;

use anyhow::Context;
use glam::Vec3;

use arena::{Arena, ArenaConfig, ShipInput};

const DT: f32 = 1.0 / 60.0;

struct Args {
    frames: u64,
    seed: u64,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut args = Args {
            frames: 3600,
            seed: 1,
        };
        let mut iter = std::env::args().skip(1);
        while let Some(flag) = iter.next() {
            let value = iter
                .next()
                .with_context(|| format!("missing value for {flag}"))?;
            match flag.as_str() {
                "--frames" => args.frames = value.parse().context("invalid --frames")?,
                "--seed" => args.seed = value.parse().context("invalid --seed")?,
                other => anyhow::bail!("unknown argument {other}"),
            }
        }
        Ok(args)
    }
}

/// Turn toward the nearest asteroid and shoot once lined up.
fn autopilot(arena: &Arena) -> ShipInput {
    let Some((position, facing)) = arena.ship_pose() else {
        return ShipInput::default();
    };
    let nearest = arena
        .asteroid_positions()
        .min_by(|a, b| a.distance_squared(position).total_cmp(&b.distance_squared(position)));
    let Some(target) = nearest else {
        return ShipInput::default();
    };

    let to_target = (target - position).normalize_or_zero();
    let side = facing.cross(to_target).dot(Vec3::Z);
    let aligned = facing.dot(to_target) > 0.95;
    ShipInput {
        turn: side.signum(),
        thrust: target.distance(position) > 25.0,
        fire: aligned,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse()?;

    let mut arena = Arena::new(ArenaConfig::default(), args.seed)?;
    log::info!("running {} frames with seed {}", args.frames, args.seed);

    for frame in 1..=args.frames {
        let input = autopilot(&arena);
        arena.update(DT, input);
        if frame % 600 == 0 {
            log::info!(
                "frame {frame}: {} asteroids, {} missiles, {:?}",
                arena.asteroid_count(),
                arena.missile_count(),
                arena.stats()
            );
        }
    }

    let stats = arena.stats();
    println!("frames:              {}", stats.frames);
    println!("waves reached:       {}", stats.wave);
    println!("collisions:          {}", stats.collisions);
    println!("missiles fired:      {}", stats.missiles_fired);
    println!("missile hits:        {}", stats.missile_hits);
    println!("asteroids destroyed: {}", stats.asteroids_destroyed);
    println!("ships lost:          {}", stats.ships_lost);
    println!("bodies in flight:    {}", arena.simulation().body_count());
    Ok(())
}
