//! Vigil Sim - Patrol Engine and Scenario Runner
//!
//! Drives a fleet of patrol agents over a waypoint graph in discrete ticks:
//!
//! 1. Configured failures remove agents.
//! 2. Packets broadcast on the previous tick reach agents in range.
//! 3. Every active agent advances along its current edge, records arrivals,
//!    lets its coordinator pick between the patrol policy's target and a
//!    meeting, and broadcasts what the coordinator produced.
//!
//! Agents share nothing but the [`BroadcastChannel`]. Everything observable
//! is recorded as [`TrackEvent`]s, which coordination never reads.
//!
//! # Example
//!
//! ```rust,no_run
//! use vigil_sim::{ScenarioConfig, Simulation, TakeoverKind};
//! use vigil_topology::AgentId;
//!
//! let config = ScenarioConfig::default()
//!     .with_agent_count(3)
//!     .with_takeover_strategy(TakeoverKind::LoadBalanced)
//!     .with_failure(AgentId(2), 100);
//!
//! let mut sim = Simulation::new(config)?;
//! let report = sim.run();
//! println!("takeovers: {}", report.takeovers);
//! # Ok::<(), vigil_sim::SimError>(())
//! ```

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod policy;
pub mod simulation;

pub use channel::{BroadcastChannel, Location, Lossless, RangeLimited, TransmissionModel};
pub use config::{FailureSpec, MapSource, PartitionStrategy, PolicyKind, ScenarioConfig, TakeoverKind};
pub use engine::{EngineStep, Leg, PatrolEngine};
pub use error::{Result, SimError};
pub use events::TrackEvent;
pub use policy::{CyclePolicy, IdlenessPolicy, PatrolPolicy, PolicyContext, RandomPolicy};
pub use simulation::{AgentSnapshot, Simulation, SimulationReport, SimulationSnapshot, VisitSubscriber};
