//! Whole-fleet runs through the simulator.

use std::collections::BTreeSet;

use vigil_sim::{MapSource, PolicyKind, ScenarioConfig, Simulation, TakeoverKind, TrackEvent};
use vigil_topology::{AgentId, PartitionId, VertexId};

fn fleet() -> ScenarioConfig {
    ScenarioConfig::default()
        .with_agent_count(3)
        .with_takeover_strategy(TakeoverKind::LoadBalanced)
        .with_map(MapSource::Grid {
            cols: 4,
            rows: 4,
            spacing: 10,
        })
}

fn run_for(sim: &mut Simulation, ticks: u64) {
    let until = sim.now() + ticks;
    while sim.now() < until {
        sim.step();
    }
}

#[test]
fn failed_agent_partition_is_taken_over_and_patrolled() {
    let mut sim = Simulation::new(fleet().with_failure(AgentId(2), 0)).unwrap();
    let interval = sim.plan().global_interval;
    let period = interval * sim.plan().color_count.max(1) as u64;
    let orphan: BTreeSet<VertexId> = sim.plan().partitions.get(PartitionId(2)).unwrap().vertices.clone();
    assert!(sim
        .plan()
        .meetings
        .iter()
        .any(|m| m.participants.contains(&AgentId(2))));

    run_for(&mut sim, interval + 3 * period);

    let takeover_tick = sim
        .events()
        .iter()
        .find_map(|e| match e {
            TrackEvent::PartitionTakeover {
                partition: PartitionId(2),
                from: AgentId(2),
                tick,
                ..
            } => Some(*tick),
            _ => None,
        })
        .expect("someone absorbs the failed agent's partition");

    assert!(sim
        .events()
        .iter()
        .any(|e| matches!(e, TrackEvent::AgentMissing { missing: AgentId(2), .. })));
    assert!(!sim.events().iter().any(|e| matches!(
        e,
        TrackEvent::VertexVisited { agent: AgentId(2), .. }
    )));

    // Ownership settles everywhere once the claim has propagated
    let converged = (0..period).any(|_| {
        sim.step();
        sim.report().converged
    });
    assert!(converged);
    for engine in sim.engines().iter().filter(|e| sim.is_active(e.agent())) {
        let coordinator = engine.coordinator();
        let owner = coordinator.ledger().owner_of(coordinator.replica(), PartitionId(2));
        assert!(matches!(owner, Some(a) if a != AgentId(2)));
    }

    run_for(&mut sim, 2 * period);
    let revisited: BTreeSet<VertexId> = sim
        .events()
        .iter()
        .filter_map(|e| match e {
            TrackEvent::VertexVisited { vertex, tick, .. } if *tick > takeover_tick => Some(*vertex),
            _ => None,
        })
        .collect();
    assert!(orphan.is_subset(&revisited));
}

/// Run `agents` on a 6x6 grid with `failed` down from the start and return
/// every absence report and takeover that names a live agent.
fn live_agents_blamed(agents: usize, failed: &[u32]) -> Vec<TrackEvent> {
    let mut config = ScenarioConfig::default()
        .with_agent_count(agents)
        .with_takeover_strategy(TakeoverKind::LoadBalanced)
        .with_map(MapSource::Grid {
            cols: 6,
            rows: 6,
            spacing: 10,
        });
    for &agent in failed {
        config = config.with_failure(AgentId(agent), 0);
    }
    let mut sim = Simulation::new(config).unwrap();
    let interval = sim.plan().global_interval;
    let period = interval * sim.plan().color_count.max(1) as u64;
    run_for(&mut sim, interval + 10 * period);

    let failed: BTreeSet<AgentId> = failed.iter().copied().map(AgentId).collect();
    assert!(sim.events().iter().any(|e| matches!(e, TrackEvent::PartitionTakeover { .. })));
    sim.events()
        .iter()
        .filter(|e| match e {
            TrackEvent::AgentMissing { missing, .. } => !failed.contains(missing),
            TrackEvent::PartitionTakeover { from, .. } => !failed.contains(from),
            _ => false,
        })
        .cloned()
        .collect()
}

#[test]
fn absorber_with_clashing_meetings_is_never_reported_missing() {
    assert_eq!(live_agents_blamed(6, &[2]), Vec::new());
}

#[test]
fn five_agent_fleets_only_blame_the_failed() {
    assert_eq!(live_agents_blamed(5, &[2]), Vec::new());
    assert_eq!(live_agents_blamed(5, &[4]), Vec::new());
}

#[test]
fn early_meetings_hold_without_false_absences() {
    let mut sim = Simulation::new(fleet().with_meet_early(true).with_max_ticks(400)).unwrap();
    let report = sim.run();

    assert!(report.meetings_held > 0);
    assert_eq!(report.missing_reports, 0);
    assert_eq!(report.takeovers, 0);
    assert!(report.converged);
    assert_eq!(report.unvisited, 0);
}

#[test]
fn lossy_short_range_radio_still_patrols() {
    let config = fleet()
        .with_patrol_policy(PolicyKind::Idleness)
        .with_comm_range(Some(15.0))
        .with_delivery_probability(0.5)
        .with_max_ticks(300);
    let mut sim = Simulation::new(config).unwrap();
    let report = sim.run();

    assert!(report.visits > 0);
    assert!(report.messages_sent > 0);
    assert!(report.messages_delivered <= report.messages_sent * 2);
    assert_eq!(report.owners.len(), sim.plan().partitions.len());
}

#[test]
fn events_serialize_with_type_tags() {
    let mut sim = Simulation::new(fleet().with_max_ticks(200)).unwrap();
    sim.run();

    let json = serde_json::to_value(sim.events()).unwrap();
    let types: BTreeSet<String> = json
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["type"].as_str().map(str::to_owned))
        .collect();
    assert!(types.contains("VertexVisited"));
    assert!(types.contains("MeetingHeld"));

    // Ticks never go backwards in the log
    assert!(sim.events().windows(2).all(|w| w[0].tick() <= w[1].tick()));
}
