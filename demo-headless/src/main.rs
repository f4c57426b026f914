use clap::Parser;
use habitat_atmos_core::{
    DoorEndpoint, GasSpecies, GridQuality, Habitat, HabitatSimulation, Point2, RefitMode,
    Room, RoomKind, SensorModel, Shape, SimulationClock, SimulationConfig,
};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Habitat atmosphere demo with configurable parameters
#[derive(Parser, Debug)]
#[command(name = "habitat-demo")]
#[command(about = "Mars habitat gas balance and GP reconstruction demo", long_about = None)]
struct Args {
    /// Simulated duration in hours
    #[arg(long, default_value_t = 24.0)]
    hours: f64,

    /// Simulated hours per real second
    #[arg(short, long, default_value_t = 2.5)]
    time_scale: f64,

    /// Real frame length in milliseconds (frames run back to back)
    #[arg(long, default_value_t = 100)]
    frame_ms: u64,

    /// Sensor-noise seed (random when omitted)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Refit the estimators every N ticks
    #[arg(short, long, default_value_t = 5)]
    refit_every: u64,

    /// Run refits on the background pool
    #[arg(short, long)]
    background: bool,

    /// Report interval in hours
    #[arg(long, default_value_t = 4.0)]
    report_every: f64,

    /// Grid quality (coarse, medium, fine)
    #[arg(short, long, default_value = "medium")]
    quality: String,

    /// Puncture the greenhouse at this hour (0 = never)
    #[arg(long, default_value_t = 12.0)]
    breach_at: f64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    println!("=== Mars Habitat Atmosphere Demo ===\n");

    let quality = match args.quality.to_lowercase().as_str() {
        "coarse" => GridQuality::Coarse,
        "fine" => GridQuality::Fine,
        "medium" => GridQuality::Medium,
        other => {
            warn!("Unknown quality '{}', using medium", other);
            GridQuality::Medium
        }
    };
    let mut clock = SimulationClock::new(args.time_scale);
    let frame = Duration::from_millis(args.frame_ms.max(1));

    let mut config = SimulationConfig {
        random_seed: args.seed,
        ..SimulationConfig::default()
    };
    config.estimator.set_refit_every(args.refit_every);
    if args.background {
        config.estimator.refit_mode = RefitMode::Background;
    }

    let mut sim = HabitatSimulation::with_habitat(config, build_outpost());
    sim.fit_grid_to_habitat(quality, 2.0);
    let grid = *sim.ground_truth_field(GasSpecies::O2).grid();
    println!(
        "Outpost: {} rooms, {} doors, {} sensors on a {}x{} grid\n",
        sim.habitat().rooms().len(),
        sim.habitat().doors().len(),
        sim.habitat().sensors().len(),
        grid.nx(),
        grid.ny()
    );

    let greenhouse = sim
        .habitat()
        .rooms()
        .iter()
        .find(|r| r.kind == RoomKind::Greenhouse)
        .map(Room::id);

    let mut next_report = 0.0;
    let mut breached = false;
    while sim.elapsed_hours() < args.hours {
        if !breached && args.breach_at > 0.0 && sim.elapsed_hours() >= args.breach_at {
            if let Some(id) = greenhouse {
                match sim.habitat_mut().set_breach_level(id, 0.3) {
                    Ok(()) => info!("Hull breach in the greenhouse at {:.1} h", sim.elapsed_hours()),
                    Err(e) => warn!("Could not breach greenhouse: {}", e),
                }
            }
            breached = true;
        }

        let dt = clock.advance(frame);
        if dt <= 0.0 {
            warn!("Clock produced no time at scale {}, stopping", clock.time_scale());
            break;
        }
        sim.tick(dt);

        if sim.elapsed_hours() >= next_report {
            sim.flush();
            report(&sim);
            next_report += args.report_every.max(dt);
        }
    }

    sim.flush();
    println!("=== Simulation Complete ===");
    report(&sim);
}

/// Quarters, lab and greenhouse on a corridor, with an airlock to the surface
fn build_outpost() -> Habitat {
    let mut h = Habitat::new();
    let rooms = [
        ("Corridor", RoomKind::Corridor, Shape::rect(0.0, 8.0, 30.0, 4.0)),
        ("Quarters", RoomKind::LivingQuarters, Shape::rect(0.0, 0.0, 10.0, 8.0)),
        ("Lab", RoomKind::Laboratory, Shape::rect(10.0, 0.0, 10.0, 8.0)),
        ("Greenhouse", RoomKind::Greenhouse, Shape::circle(25.0, 4.0, 4.0)),
        ("Command", RoomKind::CommandCenter, Shape::rect(0.0, 12.0, 12.0, 8.0)),
        ("Airlock", RoomKind::Airlock, Shape::rect(30.0, 8.0, 4.0, 4.0)),
    ];

    let mut ids = Vec::new();
    for (name, kind, shape) in rooms {
        match h.add_room(name, kind, shape) {
            Ok(id) => ids.push(id),
            Err(e) => warn!("Skipping room {}: {}", name, e),
        }
    }
    let [corridor, quarters, lab, greenhouse, command, airlock] = ids[..] else {
        return h;
    };

    for (room, open) in [
        (quarters, true),
        (lab, true),
        (greenhouse, false),
        (command, true),
        (airlock, false),
    ] {
        if let Err(e) = h.add_door(corridor, DoorEndpoint::Room(room), open) {
            warn!("Skipping door: {}", e);
        }
    }
    if let Err(e) = h.add_door(airlock, DoorEndpoint::Ambient, false) {
        warn!("Skipping airlock hatch: {}", e);
    }

    for (room, crew) in [(quarters, 3), (lab, 2), (command, 1)] {
        let _ = h.set_population(room, crew);
    }

    for p in [
        (5.0, 4.0),
        (15.0, 4.0),
        (25.0, 4.0),
        (6.0, 16.0),
        (8.0, 10.0),
        (22.0, 10.0),
        (32.0, 10.0),
    ] {
        h.add_sensor(Point2::new(p.0, p.1), SensorModel::default());
    }
    h
}

fn report(sim: &HabitatSimulation) {
    println!(
        "t = {:6.2} h (tick {})",
        sim.elapsed_hours(),
        sim.tick_count()
    );
    println!("  Room         |   O₂ %  |  CO₂ ppm | fused O₂ | Productivity");
    println!("  -------------|---------|----------|----------|-------------");
    for room in sim.habitat().rooms() {
        let fused = sim
            .fused_room_reading(room.id(), GasSpecies::O2)
            .map_or_else(|| "     -".to_string(), |f| format!("{:6.2}", f.value));
        let productivity = sim
            .room_health(room.id())
            .map_or(100.0, |h| h.productivity);
        println!(
            "  {:<12} | {:7.2} | {:8.0} | {:>8} | {:11.0}",
            room.name,
            room.o2_level(),
            room.co2_level(),
            fused,
            productivity
        );
    }

    for gas in GasSpecies::ALL {
        let (lo, hi) = sim.display_range(gas);
        let error = sim
            .reconstructed_field(gas)
            .max_abs_diff(sim.ground_truth_field(gas))
            .unwrap_or(f64::NAN);
        println!(
            "  {} estimator: {} | range {:.2}..{:.2} {} | max error {:.3}",
            gas,
            sim.status(gas),
            lo,
            hi,
            gas.unit(),
            error
        );
    }

    let health = sim.average_health();
    println!(
        "  Crew: headache {:.0}, dizziness {:.0}, productivity {:.0}, morale {:.0}\n",
        health.headache, health.dizziness, health.productivity, health.morale
    );
}
