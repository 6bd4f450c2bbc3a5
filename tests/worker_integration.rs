//! The tick loop and the decision worker running side by side

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use civitas::core::config::{SimulationConfig, WorkerConfig};
use civitas::core::error::{Result, SimError};
use civitas::llm::{DecisionRequest, DecisionWorker, ReasoningBackend, ScriptedBackend};
use civitas::simulation::{demo_town, Provenance, SharedSimulation, Simulation};

struct Unreachable;

impl ReasoningBackend for Unreachable {
    async fn complete(&self, _request: &DecisionRequest) -> Result<String> {
        Err(SimError::Backend("connection refused".into()))
    }
}

/// Restless townsfolk spike almost every tick
fn restless_town(agents: usize) -> Simulation {
    let mut config = SimulationConfig::default();
    config.neuron.baseline_urgency = 500.0;
    demo_town(config, 21, agents)
}

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        batch_size: 4,
        idle_sleep_ms: 2,
    }
}

/// Run the loop for `ticks`, then let the worker catch up
fn drive(shared: &SharedSimulation, ticks: usize, agents: usize) -> bool {
    for _ in 0..ticks {
        let queued = {
            let mut sim = Simulation::lock(shared);
            sim.step(1.0);
            sim.queue().len()
        };
        assert!(queued <= agents, "queue holds {queued} entries for {agents} agents");
        thread::sleep(Duration::from_millis(2));
    }

    for _ in 0..500 {
        {
            let sim = Simulation::lock(shared);
            if sim.queue().is_empty() && sim.agents.iter().all(|a| !a.waiting_for_backend) {
                return true;
            }
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn provenance_count(shared: &SharedSimulation, provenance: Provenance) -> usize {
    Simulation::lock(shared)
        .agents
        .iter()
        .flat_map(|a| a.decision_log.iter())
        .filter(|r| r.decision.provenance == provenance)
        .count()
}

#[test]
fn test_scripted_backend_decisions_reach_agents() {
    let agents = 8;
    let sim = restless_town(agents);
    let queue = sim.queue();
    let shared = sim.into_shared();
    let worker = DecisionWorker::spawn(
        Arc::clone(&shared),
        queue,
        ScriptedBackend::new(Duration::from_millis(3)),
        worker_config(),
    )
    .unwrap();

    let settled = drive(&shared, 60, agents);
    worker.shutdown().unwrap();

    assert!(settled, "agents left waiting for the backend");
    assert!(provenance_count(&shared, Provenance::Backend) > 0);
    assert_eq!(provenance_count(&shared, Provenance::Fallback), 0);
    assert_eq!(Simulation::lock(&shared).tick(), 60);
}

#[test]
fn test_unreachable_backend_falls_back() {
    let agents = 6;
    let sim = restless_town(agents);
    let queue = sim.queue();
    let shared = sim.into_shared();
    let worker = DecisionWorker::spawn(
        Arc::clone(&shared),
        queue,
        Unreachable,
        worker_config(),
    )
    .unwrap();

    let settled = drive(&shared, 40, agents);
    worker.shutdown().unwrap();

    assert!(settled, "agents left waiting after backend failures");
    assert!(provenance_count(&shared, Provenance::Fallback) > 0);
    assert_eq!(provenance_count(&shared, Provenance::Backend), 0);
}

#[test]
fn test_worker_stops_on_shutdown() {
    let sim = restless_town(2);
    let queue = sim.queue();
    let shared = sim.into_shared();
    let worker = DecisionWorker::spawn(
        Arc::clone(&shared),
        Arc::clone(&queue),
        ScriptedBackend::new(Duration::ZERO),
        worker_config(),
    )
    .unwrap();
    assert!(worker.is_running());
    worker.shutdown().unwrap();

    Simulation::lock(&shared).step(1.0);
    thread::sleep(Duration::from_millis(20));
    assert!(!queue.is_empty());
}
