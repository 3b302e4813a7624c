//! Vigil scenario runner
//!
//! Runs one patrol scenario and prints a summary.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_sim::{
    FailureSpec, MapSource, PartitionStrategy, PolicyKind, ScenarioConfig, SimError, Simulation, TakeoverKind,
};
use vigil_topology::Tick;

#[derive(Parser)]
#[command(name = "vigil-sim")]
#[command(about = "Run a multi-agent patrol scenario with meetings and partition takeover")]
struct Cli {
    /// Scenario JSON file; replaces VIGIL_* environment settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of agents
    #[arg(short, long)]
    agents: Option<usize>,

    /// Partitioning: spectral_bisection, spectral_kmeans, single_cycle
    #[arg(long)]
    partition: Option<PartitionStrategy>,

    /// Takeover: random, load_balanced
    #[arg(long)]
    takeover: Option<TakeoverKind>,

    /// Patrol policy: cycle, idleness, random
    #[arg(long)]
    policy: Option<PolicyKind>,

    /// Override the global meeting interval (ticks)
    #[arg(long)]
    meeting_interval: Option<Tick>,

    /// Start meetings early once every participant has arrived
    #[arg(long)]
    meet_early: bool,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Ticks to simulate
    #[arg(long)]
    max_ticks: Option<Tick>,

    /// Distance units per tick
    #[arg(long)]
    speed: Option<u64>,

    /// Broadcast range in distance units
    #[arg(long)]
    comm_range: Option<f64>,

    /// Probability that an in-range message arrives
    #[arg(long)]
    delivery_probability: Option<f64>,

    /// Full replica re-broadcast period (0 disables)
    #[arg(long)]
    refresh_ticks: Option<Tick>,

    /// Grid map as COLSxROWS, e.g. 8x6
    #[arg(long, conflicts_with = "map")]
    grid: Option<String>,

    /// Grid spacing in distance units
    #[arg(long, default_value = "10")]
    spacing: i64,

    /// JSON map file
    #[arg(long)]
    map: Option<PathBuf>,

    /// Remove an agent at a tick, as AGENT@TICK (repeatable)
    #[arg(long = "fail")]
    failures: Vec<FailureSpec>,

    /// Write track events as JSON to this file
    #[arg(long)]
    events: Option<PathBuf>,

    /// Print the final snapshot as JSON
    #[arg(long)]
    snapshot: bool,
}

fn parse_grid(raw: &str, spacing: i64) -> Result<MapSource, SimError> {
    let invalid = || SimError::InvalidConfig(format!("grid '{raw}' is not COLSxROWS"));
    let (cols, rows) = raw.split_once(['x', 'X']).ok_or_else(invalid)?;
    Ok(MapSource::Grid {
        cols: cols.trim().parse().map_err(|_| invalid())?,
        rows: rows.trim().parse().map_err(|_| invalid())?,
        spacing,
    })
}

impl Cli {
    fn scenario(self) -> Result<(ScenarioConfig, Option<PathBuf>, bool), SimError> {
        let mut config = match &self.config {
            Some(path) => ScenarioConfig::from_file(path)?,
            None => ScenarioConfig::from_env()?,
        };

        if let Some(agents) = self.agents {
            config = config.with_agent_count(agents);
        }
        if let Some(partition) = self.partition {
            config = config.with_partition_strategy(partition);
        }
        if let Some(takeover) = self.takeover {
            config = config.with_takeover_strategy(takeover);
        }
        if let Some(policy) = self.policy {
            config = config.with_patrol_policy(policy);
        }
        if self.meeting_interval.is_some() {
            config = config.with_meeting_interval(self.meeting_interval);
        }
        if self.meet_early {
            config = config.with_meet_early(true);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(max_ticks) = self.max_ticks {
            config = config.with_max_ticks(max_ticks);
        }
        if let Some(speed) = self.speed {
            config = config.with_speed(speed);
        }
        if self.comm_range.is_some() {
            config = config.with_comm_range(self.comm_range);
        }
        if let Some(p) = self.delivery_probability {
            config = config.with_delivery_probability(p);
        }
        if let Some(ticks) = self.refresh_ticks {
            config = config.with_refresh_ticks(ticks);
        }
        if let Some(grid) = &self.grid {
            config = config.with_map(parse_grid(grid, self.spacing)?);
        }
        if let Some(map) = self.map {
            config = config.with_map(MapSource::File(map));
        }
        for failure in self.failures {
            config = config.with_failure(failure.agent, failure.tick);
        }

        config.validate()?;
        Ok((config, self.events, self.snapshot))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=info,vigil_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (config, events_path, print_snapshot) = Cli::parse().scenario()?;

    println!("Vigil patrol scenario");
    println!("=====================");
    println!("  Agents:     {}", config.agent_count);
    println!("  Partition:  {:?}", config.partition_strategy);
    println!("  Takeover:   {:?}", config.takeover_strategy);
    println!("  Policy:     {:?}", config.patrol_policy);
    println!("  Ticks:      {}", config.max_ticks);
    println!();

    let mut sim = Simulation::new(config)?;
    println!(
        "Planned {} meetings, interval {} ticks, {} colors",
        sim.plan().meetings.len(),
        sim.plan().global_interval,
        sim.plan().color_count
    );

    let report = sim.run();

    println!();
    println!("Run complete:");
    println!("  Ticks:          {}", report.ticks);
    println!("  Visits:         {}", report.visits);
    println!("  Unvisited:      {}", report.unvisited);
    println!("  Meetings held:  {}", report.meetings_held);
    println!("  Overruns:       {}", report.overruns);
    println!("  Missing:        {}", report.missing_reports);
    println!("  Takeovers:      {}", report.takeovers);
    println!("  Converged:      {}", report.converged);
    println!("  Messages:       {} sent, {} delivered", report.messages_sent, report.messages_delivered);
    for (partition, owner) in &report.owners {
        println!("  {partition} -> {owner}");
    }

    if print_snapshot {
        println!("{}", serde_json::to_string_pretty(&sim.snapshot())?);
    }

    if let Some(path) = events_path {
        std::fs::write(&path, serde_json::to_string_pretty(sim.events())?)?;
        println!("Wrote {} events to {}", sim.events().len(), path.display());
    }

    Ok(())
}
