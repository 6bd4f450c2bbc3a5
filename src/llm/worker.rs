//! Background decision worker
//!
//! Agents whose autopilot defers are queued here. The worker owns its own
//! thread with a single-threaded tokio runtime, drains the queue in batches
//! and fans every batch out to the backend concurrently. Results are applied
//! in completion order under the simulation lock, so a finished decision can
//! never race a tick that is mid-mutation.

use crate::core::config::WorkerConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::AgentId;
use crate::entity::agent::Agent;
use crate::llm::{parse_decision, DecisionRequest, ReasoningBackend};
use crate::simulation::decision::{Decision, Provenance};
use crate::simulation::engine::{Simulation, SharedSimulation};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Agents waiting for a backend decision, oldest first
#[derive(Debug, Default)]
pub struct DecisionQueue {
    pending: Mutex<VecDeque<AgentId>>,
}

impl DecisionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `agent` unless it is already waiting or dead. Returns whether
    /// an entry was added.
    pub fn enqueue(&self, agent: &mut Agent) -> bool {
        if agent.waiting_for_backend || !agent.alive {
            return false;
        }
        agent.waiting_for_backend = true;
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(agent.id);
        tracing::debug!(agent = %agent.name, "queued for backend");
        true
    }

    /// Take up to `max` agents off the front
    pub fn drain(&self, max: usize) -> Vec<AgentId> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let n = max.min(pending.len());
        pending.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }
}

/// What happened to one drained batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Requests sent to the backend
    pub requested: usize,
    /// Decisions executed for living agents
    pub applied: usize,
    /// Decisions substituted after a backend or parse failure
    pub fallbacks: usize,
}

pub struct DecisionWorker {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DecisionWorker {
    /// Start the worker thread
    pub fn spawn<B: ReasoningBackend>(
        sim: SharedSimulation,
        queue: Arc<DecisionQueue>,
        backend: B,
        config: WorkerConfig,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SimError::Worker(format!("failed to build worker runtime: {e}")))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("decision-worker".into())
            .spawn(move || {
                runtime.block_on(run(sim, queue, backend, config, stop));
            })
            .map_err(|e| SimError::Worker(format!("failed to spawn decision worker: {e}")))?;

        tracing::info!("decision worker started");
        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop after the batch in flight and wait for the thread
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Release);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SimError::Worker("decision worker panicked".into())),
            None => Ok(()),
        }
    }
}

impl Drop for DecisionWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "decision worker did not stop cleanly");
        }
    }
}

async fn run<B: ReasoningBackend>(
    sim: SharedSimulation,
    queue: Arc<DecisionQueue>,
    backend: B,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
) {
    let idle = Duration::from_millis(config.idle_sleep_ms.max(1));
    let batch_size = config.batch_size.max(1);

    while !shutdown.load(Ordering::Acquire) {
        let batch = queue.drain(batch_size);
        if batch.is_empty() {
            tokio::time::sleep(idle).await;
            continue;
        }
        match AssertUnwindSafe(process_batch(&sim, &backend, &batch))
            .catch_unwind()
            .await
        {
            Ok(report) => tracing::debug!(
                requested = report.requested,
                applied = report.applied,
                fallbacks = report.fallbacks,
                backlog = queue.len(),
                "batch complete"
            ),
            Err(_) => {
                tracing::error!(agents = batch.len(), "batch aborted, releasing its agents");
                // Agents re-queued since the drain keep their flag
                let mut guard = Simulation::lock(&sim);
                for &id in batch.iter().filter(|id| !queue.contains(**id)) {
                    guard.release(id);
                }
            }
        }
    }

    tracing::info!(abandoned = queue.len(), "decision worker stopped");
}

/// One round trip for `batch`: snapshot under the lock, call the backend for
/// every agent at once, then apply each answer as it arrives
pub async fn process_batch<B: ReasoningBackend>(
    sim: &SharedSimulation,
    backend: &B,
    batch: &[AgentId],
) -> BatchReport {
    let requests: Vec<DecisionRequest> = {
        let mut guard = Simulation::lock(sim);
        batch
            .iter()
            .filter_map(|&id| {
                let request = guard.decision_request(id);
                if request.is_none() {
                    guard.release(id);
                }
                request
            })
            .collect()
    };

    let mut report = BatchReport {
        requested: requests.len(),
        ..BatchReport::default()
    };

    let mut in_flight: FuturesUnordered<_> = requests
        .into_iter()
        .map(|request| async move {
            let response = AssertUnwindSafe(backend.complete(&request))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(SimError::Backend("backend call panicked".into())));
            (request, response)
        })
        .collect();

    while let Some((request, response)) = in_flight.next().await {
        let decision = resolve(&request, response);
        if decision.provenance == Provenance::Fallback {
            report.fallbacks += 1;
        }
        let mut guard = Simulation::lock(sim);
        match guard.apply_backend_decision(request.agent, &decision) {
            Ok(Some(_)) => report.applied += 1,
            Ok(None) => {}
            Err(e) => tracing::debug!(agent = %request.agent_name, error = %e, "decision dropped"),
        }
    }

    report
}

/// Parse a backend answer, substituting the request's heuristic on failure
fn resolve(request: &DecisionRequest, response: Result<String>) -> Decision {
    match response {
        Ok(text) => parse_decision(&text).unwrap_or_else(|| {
            tracing::warn!(
                agent = %request.agent_name,
                response = %text.chars().take(120).collect::<String>(),
                "unparseable backend response, using fallback"
            );
            fallback(request)
        }),
        Err(e) => {
            tracing::warn!(agent = %request.agent_name, error = %e, "backend call failed, using fallback");
            fallback(request)
        }
    }
}

fn fallback(request: &DecisionRequest) -> Decision {
    request
        .heuristic
        .clone()
        .with_provenance(Provenance::Fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimulationConfig;
    use crate::core::types::GridPos;
    use crate::entity::role::Role;
    use crate::llm::ScriptedBackend;
    use crate::world::{Terrain, TileMap, World};

    struct Failing;

    impl ReasoningBackend for Failing {
        async fn complete(&self, _request: &DecisionRequest) -> Result<String> {
            Err(SimError::Backend("connection refused".into()))
        }
    }

    struct Rambling;

    impl ReasoningBackend for Rambling {
        async fn complete(&self, _request: &DecisionRequest) -> Result<String> {
            Ok("Let me think about what a merchant would do here...".into())
        }
    }

    struct Resting;

    /// Blows up for one agent, answers the rest
    struct Fragile;

    impl ReasoningBackend for Fragile {
        async fn complete(&self, request: &DecisionRequest) -> Result<String> {
            if request.agent_name == "Marcus" {
                panic!("backend bug");
            }
            Ok(r#"{"thought": "Rest.", "action": "REST"}"#.into())
        }
    }

    impl ReasoningBackend for Resting {
        async fn complete(&self, _request: &DecisionRequest) -> Result<String> {
            Ok("<think>tired</think>\n```json\n{\"thought\": \"Rest.\", \"action\": \"REST\",}\n```".into())
        }
    }

    fn shared() -> (SharedSimulation, AgentId, AgentId) {
        let config = SimulationConfig::default();
        let world = World::new(TileMap::new(12, 12, Terrain::Plaza));
        let mut sim = Simulation::new(config, world, 1);
        let marcus = sim.spawn_agent("Marcus", Role::Merchant, GridPos::new(3, 3));
        let livia = sim.spawn_agent("Livia", Role::Priest, GridPos::new(8, 8));
        (sim.into_shared(), marcus, livia)
    }

    fn enqueue(sim: &SharedSimulation, id: AgentId) -> bool {
        let mut guard = Simulation::lock(sim);
        let idx = guard.index_of(id).unwrap();
        guard.enqueue(idx)
    }

    #[test]
    fn test_enqueue_is_deduplicated() {
        let (sim, marcus, _) = shared();
        assert!(enqueue(&sim, marcus));
        assert!(!enqueue(&sim, marcus));
        let queue = Simulation::lock(&sim).queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain(10), vec![marcus]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_respects_batch_size() {
        let (sim, marcus, livia) = shared();
        enqueue(&sim, marcus);
        enqueue(&sim, livia);
        let queue = Simulation::lock(&sim).queue();
        assert_eq!(queue.drain(1), vec![marcus]);
        assert_eq!(queue.drain(1), vec![livia]);
    }

    #[tokio::test]
    async fn test_backend_decision_is_applied() {
        let (sim, marcus, _) = shared();
        enqueue(&sim, marcus);
        let report = process_batch(&sim, &Resting, &[marcus]).await;
        assert_eq!(report.applied, 1);
        assert_eq!(report.fallbacks, 0);

        let guard = Simulation::lock(&sim);
        let agent = guard.agent(marcus).unwrap();
        assert!(!agent.waiting_for_backend);
        let last = agent.decision_log.back().unwrap();
        assert_eq!(last.decision.provenance, Provenance::Backend);
        assert_eq!(last.decision.thought, "Rest.");
    }

    #[tokio::test]
    async fn test_failures_fall_back() {
        for backend_fails in [true, false] {
            let (sim, marcus, _) = shared();
            enqueue(&sim, marcus);
            let report = if backend_fails {
                process_batch(&sim, &Failing, &[marcus]).await
            } else {
                process_batch(&sim, &Rambling, &[marcus]).await
            };
            assert_eq!(report.fallbacks, 1);
            assert_eq!(report.applied, 1);

            let guard = Simulation::lock(&sim);
            let agent = guard.agent(marcus).unwrap();
            assert!(!agent.waiting_for_backend);
            assert_eq!(
                agent.decision_log.back().unwrap().decision.provenance,
                Provenance::Fallback
            );
        }
    }

    #[tokio::test]
    async fn test_dead_agent_is_released_without_decision() {
        let (sim, marcus, _) = shared();
        enqueue(&sim, marcus);
        {
            let mut guard = Simulation::lock(&sim);
            let idx = guard.index_of(marcus).unwrap();
            guard.agents[idx].take_damage(1000.0, 0);
        }
        let report = process_batch(&sim, &Resting, &[marcus]).await;
        assert_eq!(report, BatchReport::default());

        let guard = Simulation::lock(&sim);
        let agent = guard.agent(marcus).unwrap();
        assert!(!agent.waiting_for_backend);
        assert!(agent.decision_log.is_empty());
    }

    #[tokio::test]
    async fn test_batch_fans_out() {
        let (sim, marcus, livia) = shared();
        enqueue(&sim, marcus);
        enqueue(&sim, livia);
        let backend = ScriptedBackend::new(Duration::from_millis(20));
        let report = process_batch(&sim, &backend, &[marcus, livia]).await;
        assert_eq!(report.requested, 2);
        assert_eq!(report.applied, 2);

        let guard = Simulation::lock(&sim);
        assert!(guard.agents.iter().all(|a| !a.waiting_for_backend));
    }

    #[test]
    fn test_worker_thread_drains_queue() {
        let (sim, marcus, _) = shared();
        let queue = Simulation::lock(&sim).queue();
        let config = WorkerConfig {
            batch_size: 4,
            idle_sleep_ms: 5,
        };
        let worker = DecisionWorker::spawn(
            Arc::clone(&sim),
            Arc::clone(&queue),
            ScriptedBackend::new(Duration::ZERO),
            config,
        )
        .unwrap();
        assert!(worker.is_running());

        enqueue(&sim, marcus);
        let mut done = false;
        for _ in 0..400 {
            if !Simulation::lock(&sim).agent(marcus).unwrap().waiting_for_backend {
                done = true;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        worker.shutdown().unwrap();

        assert!(done);
        assert!(queue.is_empty());
        assert!(!Simulation::lock(&sim)
            .agent(marcus)
            .unwrap()
            .decision_log
            .is_empty());
    }

    #[tokio::test]
    async fn test_panicking_call_falls_back_for_that_agent_only() {
        let (sim, marcus, livia) = shared();
        enqueue(&sim, marcus);
        enqueue(&sim, livia);
        let report = process_batch(&sim, &Fragile, &[marcus, livia]).await;
        assert_eq!(report.applied, 2);
        assert_eq!(report.fallbacks, 1);

        let guard = Simulation::lock(&sim);
        assert!(guard.agents.iter().all(|a| !a.waiting_for_backend));
        let provenance = |id| guard.agent(id).unwrap().decision_log.back().unwrap().decision.provenance;
        assert_eq!(provenance(marcus), Provenance::Fallback);
        assert_eq!(provenance(livia), Provenance::Backend);
    }

    #[test]
    fn test_worker_survives_panicking_backend() {
        let (sim, marcus, livia) = shared();
        let queue = Simulation::lock(&sim).queue();
        let config = WorkerConfig {
            batch_size: 4,
            idle_sleep_ms: 5,
        };
        let worker =
            DecisionWorker::spawn(Arc::clone(&sim), Arc::clone(&queue), Fragile, config).unwrap();

        let settled = |sim: &SharedSimulation| {
            Simulation::lock(sim).agents.iter().all(|a| !a.waiting_for_backend)
        };
        for round in 0..3 {
            enqueue(&sim, marcus);
            enqueue(&sim, livia);
            let mut done = false;
            for _ in 0..400 {
                if settled(&sim) {
                    done = true;
                    break;
                }
                thread::sleep(Duration::from_millis(5));
            }
            assert!(done, "agents still waiting after round {round}");
            assert!(worker.is_running());
        }
        worker.shutdown().unwrap();
        assert!(queue.is_empty());
    }
}
