//! Scenario configuration.
//!
//! Values come from, in increasing precedence: [`ScenarioConfig::default`],
//! `VIGIL_*` environment variables ([`ScenarioConfig::from_env`]), a JSON
//! file ([`ScenarioConfig::from_file`]) and finally command-line flags
//! applied through the `with_*` builders.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vigil_partition::{Partitioner, SingleCycle, SpectralBisection, SpectralKMeans};
use vigil_protocols::{LoadBalancedTakeover, RandomTakeover, TakeoverStrategy};
use vigil_topology::{AgentId, MapSpec, Tick, WaypointGraph};

use crate::error::{Result, SimError};

/// How waypoints are split among agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    #[default]
    SpectralBisection,
    SpectralKMeans,
    SingleCycle,
}

impl PartitionStrategy {
    /// Instantiate the partitioner. `seed` feeds k-means initialization.
    pub fn build(self, seed: u64) -> Box<dyn Partitioner> {
        match self {
            Self::SpectralBisection => Box::new(SpectralBisection::new()),
            Self::SpectralKMeans => Box::new(SpectralKMeans::new(seed)),
            Self::SingleCycle => Box::new(SingleCycle::new()),
        }
    }
}

impl FromStr for PartitionStrategy {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "spectral_bisection" | "spectral" | "bisection" => Ok(Self::SpectralBisection),
            "spectral_kmeans" | "kmeans" => Ok(Self::SpectralKMeans),
            "single_cycle" | "cycle" => Ok(Self::SingleCycle),
            other => Err(SimError::InvalidConfig(format!("unknown partition strategy '{other}'"))),
        }
    }
}

/// Who absorbs missing agents' partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeoverKind {
    Random,
    #[default]
    LoadBalanced,
}

impl TakeoverKind {
    /// Instantiate the strategy for one agent.
    pub fn build(self, seed: u64, agent: AgentId) -> Box<dyn TakeoverStrategy + Send> {
        match self {
            Self::Random => Box::new(RandomTakeover::new(agent_seed(seed, agent))),
            Self::LoadBalanced => Box::new(LoadBalancedTakeover),
        }
    }
}

impl FromStr for TakeoverKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "random" => Ok(Self::Random),
            "load_balanced" | "balanced" => Ok(Self::LoadBalanced),
            other => Err(SimError::InvalidConfig(format!("unknown takeover strategy '{other}'"))),
        }
    }
}

/// How an agent picks its next vertex within its partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Cycle,
    Idleness,
    Random,
}

impl FromStr for PolicyKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cycle" | "christofides" => Ok(Self::Cycle),
            "idleness" | "greedy" => Ok(Self::Idleness),
            "random" => Ok(Self::Random),
            other => Err(SimError::InvalidConfig(format!("unknown patrol policy '{other}'"))),
        }
    }
}

/// Where the waypoint graph comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapSource {
    Grid { cols: u32, rows: u32, spacing: i64 },
    File(PathBuf),
}

impl Default for MapSource {
    fn default() -> Self {
        Self::Grid {
            cols: 6,
            rows: 6,
            spacing: 10,
        }
    }
}

impl MapSource {
    /// Build the graph.
    pub fn load(&self) -> Result<WaypointGraph> {
        match self {
            Self::Grid { cols, rows, spacing } => Ok(WaypointGraph::grid(*cols, *rows, *spacing)?),
            Self::File(path) => {
                let text = std::fs::read_to_string(path)?;
                Ok(WaypointGraph::from_map(&MapSpec::from_json(&text)?)?)
            }
        }
    }
}

/// An agent removed from the run at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSpec {
    pub agent: AgentId,
    pub tick: Tick,
}

impl FromStr for FailureSpec {
    type Err = SimError;

    /// Parse `AGENT@TICK`, e.g. `2@150`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SimError::InvalidConfig(format!("failure '{s}' is not AGENT@TICK"));
        let (agent, tick) = s.split_once('@').ok_or_else(invalid)?;
        Ok(Self {
            agent: AgentId(agent.trim().parse().map_err(|_| invalid())?),
            tick: tick.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// Everything needed to run one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub agent_count: usize,
    pub partition_strategy: PartitionStrategy,
    pub takeover_strategy: TakeoverKind,
    pub patrol_policy: PolicyKind,
    /// Replace the computed global meeting interval
    pub meeting_interval_override: Option<Tick>,
    pub meet_early: bool,
    pub seed: u64,
    pub max_ticks: Tick,
    /// Distance units covered per tick
    pub speed: u64,
    /// Broadcast range in distance units, unlimited if `None`
    pub comm_range: Option<f64>,
    /// Chance that an in-range message arrives
    pub delivery_probability: f64,
    /// Full replica re-broadcast period, zero to disable
    pub stigmergy_refresh_ticks: Tick,
    pub failures: Vec<FailureSpec>,
    pub map: MapSource,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            agent_count: 3,
            partition_strategy: PartitionStrategy::default(),
            takeover_strategy: TakeoverKind::default(),
            patrol_policy: PolicyKind::default(),
            meeting_interval_override: None,
            meet_early: false,
            seed: 42,
            max_ticks: 500,
            speed: 10,
            comm_range: None,
            delivery_probability: 1.0,
            stigmergy_refresh_ticks: 50,
            failures: Vec::new(),
            map: MapSource::default(),
        }
    }
}

fn env_parse<T: FromStr>(name: &str, target: &mut T) -> Result<()> {
    if let Ok(raw) = std::env::var(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| SimError::InvalidConfig(format!("{name}={raw} could not be parsed")))?;
    }
    Ok(())
}

impl ScenarioConfig {
    /// Defaults overridden by `VIGIL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        env_parse("VIGIL_AGENTS", &mut config.agent_count)?;
        env_parse("VIGIL_PARTITION", &mut config.partition_strategy)?;
        env_parse("VIGIL_TAKEOVER", &mut config.takeover_strategy)?;
        env_parse("VIGIL_POLICY", &mut config.patrol_policy)?;
        env_parse("VIGIL_MEET_EARLY", &mut config.meet_early)?;
        env_parse("VIGIL_SEED", &mut config.seed)?;
        env_parse("VIGIL_MAX_TICKS", &mut config.max_ticks)?;
        env_parse("VIGIL_SPEED", &mut config.speed)?;
        env_parse("VIGIL_DELIVERY_PROBABILITY", &mut config.delivery_probability)?;
        env_parse("VIGIL_REFRESH_TICKS", &mut config.stigmergy_refresh_ticks)?;

        if std::env::var("VIGIL_MEETING_INTERVAL").is_ok() {
            let mut interval: Tick = 0;
            env_parse("VIGIL_MEETING_INTERVAL", &mut interval)?;
            config.meeting_interval_override = Some(interval);
        }
        if std::env::var("VIGIL_COMM_RANGE").is_ok() {
            let mut range = 0.0;
            env_parse("VIGIL_COMM_RANGE", &mut range)?;
            config.comm_range = Some(range);
        }
        if let Ok(path) = std::env::var("VIGIL_MAP") {
            config.map = MapSource::File(PathBuf::from(path));
        }
        if let Ok(raw) = std::env::var("VIGIL_FAILURES") {
            config.failures = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(FailureSpec::from_str)
                .collect::<Result<_>>()?;
        }
        Ok(config)
    }

    /// Load from a JSON file. Fields missing from the file keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Reject values no scenario can run with.
    pub fn validate(&self) -> Result<()> {
        if self.agent_count == 0 {
            return Err(SimError::InvalidConfig("agent_count must be at least 1".into()));
        }
        if self.speed == 0 {
            return Err(SimError::InvalidConfig("speed must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.delivery_probability) {
            return Err(SimError::InvalidConfig(format!(
                "delivery_probability {} is outside [0, 1]",
                self.delivery_probability
            )));
        }
        if let Some(range) = self.comm_range {
            if !range.is_finite() || range < 0.0 {
                return Err(SimError::InvalidConfig(format!("comm_range {range} must be finite and non-negative")));
            }
        }
        if self.meeting_interval_override == Some(0) {
            return Err(SimError::InvalidConfig("meeting interval override must be positive".into()));
        }
        if let Some(f) = self.failures.iter().find(|f| f.agent.0 as usize >= self.agent_count) {
            return Err(SimError::InvalidConfig(format!("failure names unknown agent {}", f.agent)));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_agent_count(mut self, agent_count: usize) -> Self {
        self.agent_count = agent_count;
        self
    }

    #[must_use]
    pub fn with_partition_strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.partition_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_takeover_strategy(mut self, strategy: TakeoverKind) -> Self {
        self.takeover_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_patrol_policy(mut self, policy: PolicyKind) -> Self {
        self.patrol_policy = policy;
        self
    }

    #[must_use]
    pub fn with_meeting_interval(mut self, interval: Option<Tick>) -> Self {
        self.meeting_interval_override = interval;
        self
    }

    #[must_use]
    pub fn with_meet_early(mut self, meet_early: bool) -> Self {
        self.meet_early = meet_early;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: Tick) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: u64) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub fn with_comm_range(mut self, range: Option<f64>) -> Self {
        self.comm_range = range;
        self
    }

    #[must_use]
    pub fn with_delivery_probability(mut self, probability: f64) -> Self {
        self.delivery_probability = probability;
        self
    }

    #[must_use]
    pub fn with_refresh_ticks(mut self, ticks: Tick) -> Self {
        self.stigmergy_refresh_ticks = ticks;
        self
    }

    /// Remove `agent` from the run at `tick`.
    #[must_use]
    pub fn with_failure(mut self, agent: AgentId, tick: Tick) -> Self {
        self.failures.push(FailureSpec { agent, tick });
        self
    }

    #[must_use]
    pub fn with_map(mut self, map: MapSource) -> Self {
        self.map = map;
        self
    }
}

/// Per-agent seed derived from the scenario seed.
pub(crate) fn agent_seed(seed: u64, agent: AgentId) -> u64 {
    seed ^ u64::from(agent.0 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ScenarioConfig::default().validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_values() {
        assert!(ScenarioConfig::default().with_agent_count(0).validate().is_err());
        assert!(ScenarioConfig::default().with_speed(0).validate().is_err());
        assert!(ScenarioConfig::default().with_delivery_probability(1.5).validate().is_err());
        assert!(ScenarioConfig::default().with_comm_range(Some(-1.0)).validate().is_err());
        assert!(ScenarioConfig::default().with_failure(AgentId(9), 10).validate().is_err());
        assert!(ScenarioConfig::default().with_meeting_interval(Some(0)).validate().is_err());
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!("kmeans".parse::<PartitionStrategy>().unwrap(), PartitionStrategy::SpectralKMeans);
        assert_eq!("single-cycle".parse::<PartitionStrategy>().unwrap(), PartitionStrategy::SingleCycle);
        assert_eq!("load-balanced".parse::<TakeoverKind>().unwrap(), TakeoverKind::LoadBalanced);
        assert_eq!("idleness".parse::<PolicyKind>().unwrap(), PolicyKind::Idleness);
        assert!("nope".parse::<TakeoverKind>().is_err());
    }

    #[test]
    fn failure_spec_parses() {
        let f: FailureSpec = "2@150".parse().unwrap();
        assert_eq!(f, FailureSpec {
            agent: AgentId(2),
            tick: 150,
        });
        assert!("2".parse::<FailureSpec>().is_err());
        assert!("x@1".parse::<FailureSpec>().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ScenarioConfig =
            serde_json::from_str(r#"{"agent_count": 5, "map": {"grid": {"cols": 4, "rows": 3, "spacing": 5}}}"#).unwrap();
        assert_eq!(config.agent_count, 5);
        assert_eq!(config.seed, 42);
        assert_eq!(config.map, MapSource::Grid {
            cols: 4,
            rows: 3,
            spacing: 5,
        });
    }

    #[test]
    fn agent_seeds_differ() {
        assert_ne!(agent_seed(1, AgentId(0)), agent_seed(1, AgentId(1)));
    }
}
