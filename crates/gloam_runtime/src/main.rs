//! Gloam Runtime
//!
//! Headless binary: loads settings, builds the demo scene and advances the
//! simulation for a fixed number of ticks.
//!
//! Usage: `gloam [settings.json] [--ticks N]`

mod scene;

use anyhow::{Context, Result};
use clap::Parser;
use gloam_ai::{
    ActionRegistry, AiState, AiSystem, CheckerRegistry, CooldownSystem, Health, NavigationSystem,
    Position, ScriptBackend, Velocity,
};
use gloam_core::ecs::{Component, Entity, World};
use gloam_core::time::SimulationTime;
use gloam_script::ScriptDriver;
use gloam_services::Settings;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Damage dealt to the brute halfway through the run.
const MIDPOINT_DAMAGE: f32 = 60.0;

#[derive(Parser, Debug)]
#[command(name = "gloam")]
#[command(about = "Run the headless AI demo scene")]
struct Args {
    /// JSON settings file; defaults are used when omitted
    settings: Option<PathBuf>,

    /// Override `simulation.ticks`
    #[arg(long)]
    ticks: Option<u64>,

    /// Pace ticks against wall-clock time instead of running flat out
    #[arg(long)]
    realtime: bool,
}

impl Args {
    fn load_settings(&self) -> Result<Settings> {
        let mut settings = match &self.settings {
            Some(path) => Settings::load(path)
                .with_context(|| format!("loading settings from {}", path.display()))?,
            None => Settings::default(),
        };
        if let Some(ticks) = self.ticks {
            settings.simulation.ticks = ticks;
        }
        Ok(settings)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = args.load_settings()?;

    let filter = EnvFilter::try_new(&settings.logging.filter).unwrap_or_else(|_| EnvFilter::from_default_env());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Gloam v{}", gloam_core::VERSION);

    let mut sim = Simulation::new(&settings)?;
    let ticks = settings.simulation.ticks;
    tracing::info!(ticks, rate = sim.time.tick_rate_hz(), realtime = args.realtime, "simulation started");

    if args.realtime {
        let mut last = Instant::now();
        while sim.time.tick_count() < ticks {
            std::thread::sleep(sim.time.tick_duration());
            let now = Instant::now();
            let due = sim.time.accumulate(now - last);
            last = now;
            for _ in 0..due {
                if sim.time.tick_count() >= ticks {
                    break;
                }
                sim.step();
            }
        }
    } else {
        for _ in 0..ticks {
            sim.step();
        }
    }

    sim.report();
    Ok(())
}

/// Demo world plus the systems advancing it, in their fixed order.
struct Simulation {
    world: World,
    scene: scene::Scene,
    time: SimulationTime,
    cooldowns: CooldownSystem,
    navigation: NavigationSystem,
    ai: AiSystem,
    scripts: Option<ScriptDriver>,
    midpoint: u64,
    watched: Vec<(Entity, Option<String>)>,
}

impl Simulation {
    fn new(settings: &Settings) -> Result<Self> {
        let mut world = World::new();
        let scene = scene::build(&mut world, settings)?;

        let scripts = settings.scripting.enabled.then(|| {
            let mut driver = ScriptDriver::new(
                settings.scripting.root.clone(),
                ActionRegistry::with_builtins(),
                CheckerRegistry::with_builtins(),
            );
            driver.add_source(scene::SENTRY_PATH, scene::SENTRY_SCRIPT);
            tracing::info!(engine = driver.engine_name(), root = %driver.root().display(), "scripting enabled");
            driver
        });

        let watched = std::iter::once(scene.brute)
            .chain(scene.sentry)
            .map(|entity| (entity, None))
            .collect();

        Ok(Self {
            world,
            scene,
            time: SimulationTime::with_rate(settings.simulation.tick_rate_hz),
            cooldowns: CooldownSystem::new(),
            navigation: NavigationSystem::new(
                settings.navigation.bounds.to_aabb(),
                settings.navigation.cell_size,
            ),
            ai: AiSystem::new(),
            scripts,
            midpoint: settings.simulation.ticks / 2,
            watched,
        })
    }

    fn step(&mut self) {
        let dt = self.time.dt();

        if self.time.tick_count() == self.midpoint {
            if let Some(health) = self.world.get_mut(self.scene.brute, Health::kind()) {
                health.current -= MIDPOINT_DAMAGE;
                tracing::info!(hp = health.current, "brute wounded");
            }
        }

        self.cooldowns.update(&mut self.world, dt);
        self.navigation.update(&mut self.world, dt);
        self.ai.update(
            &mut self.world,
            dt,
            self.scripts.as_mut().map(|driver| driver as &mut dyn ScriptBackend),
        );
        integrate(&mut self.world, dt);
        self.time.advance_tick();

        for (entity, last) in &mut self.watched {
            let current = self.world.get(*entity, AiState::kind()).and_then(|s| s.current.clone());
            if current != *last {
                tracing::info!(
                    tick = self.time.tick_count(),
                    %entity,
                    from = last.as_deref().unwrap_or("-"),
                    to = current.as_deref().unwrap_or("-"),
                    "transition"
                );
                *last = current;
            }
        }
    }

    fn report(&self) {
        let player = self.world.get(self.scene.player, Position::kind()).map(|p| p.0);
        let brute = self.world.get(self.scene.brute, Position::kind()).map(|p| p.0);
        tracing::info!(
            ticks = self.time.tick_count(),
            simulated = ?self.time.total_time(),
            ai_ticks = self.ai.ticks(),
            ?player,
            ?brute,
            "simulation finished"
        );
    }
}

/// Move every entity by its velocity.
fn integrate(world: &mut World, dt: f32) {
    world.for_each2(Position::kind(), Velocity::kind(), |_, position, velocity| {
        position.0 += velocity.0 * dt;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_flag_overrides_settings() {
        let args = Args::try_parse_from(["gloam", "--ticks", "12"]).unwrap();
        assert!(args.settings.is_none());
        assert_eq!(args.load_settings().unwrap().simulation.ticks, 12);
        assert!(!args.realtime);
    }

    #[test]
    fn steps_advance_time_and_track_states() {
        let mut settings = Settings::default();
        settings.scripting.enabled = false;
        settings.simulation.ticks = 4;
        let mut sim = Simulation::new(&settings).unwrap();
        for _ in 0..4 {
            sim.step();
        }
        assert_eq!(sim.time.tick_count(), 4);
        assert_eq!(sim.ai.ticks(), 4);
        assert_eq!(sim.watched.len(), 1);
        assert!(sim.watched[0].1.is_some());
    }

    #[test]
    fn missing_settings_file_is_reported() {
        let args = Args::try_parse_from(["gloam", "no/such/settings.json"]).unwrap();
        let err = args.load_settings().unwrap_err();
        assert!(format!("{err:#}").contains("no/such/settings.json"));
    }
}
