//! tick-demo - drives a few scripted behaviours through a fixed-step loop
//!
//! Run with: RUST_LOG=tickflow=debug cargo run --bin tick-demo [config.json]
//!
//! A rabbit hops toward the player, a jester telegraphs and throws, and a
//! hit-stop freezes gameplay time for a moment. Time comes from a manual
//! clock stepped at 60 Hz, so every run prints the same thing.

use std::cell::RefCell;
use std::rc::Rc;
use tickflow::prelude::*;
use tickflow::SchedulerConfig;

const FIXED_STEP: f64 = 1.0 / 60.0;
const MAX_TICKS: u32 = 600;

#[derive(Debug, Default)]
struct World {
    rabbit_x: f64,
    player_x: f64,
    player_hp: i32,
    projectiles: u32,
}

fn rabbit(world: Rc<RefCell<World>>, time: TimeContext) -> Task {
    Task::from_future(move |co| async move {
        co.on_cancel(|| tracing::info!("rabbit despawned"));
        loop {
            let (rabbit_x, player_x) = {
                let world = world.borrow();
                (world.rabbit_x, world.player_x)
            };
            if (player_x - rabbit_x).abs() < 1.0 {
                world.borrow_mut().player_hp -= 1;
                tracing::info!(hp = world.borrow().player_hp, "rabbit bites");
            }
            world.borrow_mut().rabbit_x += (player_x - rabbit_x).signum() * 4.0;
            co.wait(wait_seconds(0.5, &time)).await;
        }
    })
}

fn jester(world: Rc<RefCell<World>>, time: TimeContext, spawner: Spawner) -> Task {
    Task::from_future(move |co| async move {
        for volley in 1..=3 {
            tracing::info!(volley, "jester telegraphs");
            co.wait(wait_seconds(0.75, &time)).await;

            world.borrow_mut().projectiles += 1;
            let hit_world = world.clone();
            spawner.spawn(Task::from_future(move |co| async move {
                // Projectile flight time, in ticks
                co.wait(wait_ticks(20)).await;
                hit_world.borrow_mut().player_hp -= 2;
                tracing::info!(hp = hit_world.borrow().player_hp, "projectile hits");
                Ok(())
            }));

            co.wait(wait_seconds(1.0, &time)).await;
        }
        tracing::info!("jester leaves");
        Ok(())
    })
}

fn hit_stop(time: TimeContext, scale: TimeScale) -> Task {
    Task::from_future(move |co| async move {
        co.wait(wait_seconds(2.0, &time)).await;
        tracing::info!("hit-stop");
        scale.set(0.0);
        co.wait(WaitSeconds::new(0.2, &time).ignore_time_scale().into_task()).await;
        scale.set(1.0);
        Ok(())
    })
}

fn load_config() -> Result<SchedulerConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            Ok(SchedulerConfig::from_json(&text)?)
        }
        None => Ok(SchedulerConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    let clock = ManualClock::new();
    let scale = TimeScale::new(config.time_scale);
    let time = TimeContext::new(clock.clone(), scale.clone());

    let world = Rc::new(RefCell::new(World {
        rabbit_x: 0.0,
        player_x: 20.0,
        player_hp: 10,
        projectiles: 0,
    }));

    let mut manager = TaskManager::with_config(&config);
    manager.add(rabbit(world.clone(), time.clone()));
    let spawner = manager.spawner();
    manager.add(jester(world.clone(), time.clone(), spawner));
    manager.add(hit_stop(time.clone(), scale.clone()));

    let mut tick = 0;
    while tick < MAX_TICKS && !manager.is_empty() {
        clock.advance(FIXED_STEP);
        if let Err(err) = manager.update() {
            tracing::error!(tick, error = %err, "script failed");
        }
        tick += 1;

        if world.borrow().player_hp <= 0 {
            tracing::info!(tick, "player down, closing every behaviour");
            manager.close_all();
        }
    }

    let world = world.borrow();
    tracing::info!(
        tick,
        rabbit_x = world.rabbit_x,
        player_hp = world.player_hp,
        projectiles = world.projectiles,
        "demo finished"
    );
    Ok(())
}
