//! In-process stand-in for the reasoning backend
//!
//! The heuristic covers what the autopilot leaves open: walking to a
//! remembered place for a moderate need, striking up a conversation and
//! wandering. It also serves as the fallback decision whenever a real backend
//! fails.

use crate::core::config::{ActionConfig, BackendConfig};
use crate::core::error::Result;
use crate::core::types::Direction;
use crate::entity::agent::Agent;
use crate::entity::drives::DriveKind;
use crate::llm::{DecisionRequest, ReasoningBackend};
use crate::simulation::decision::{ActionKind, Decision};
use crate::world::World;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

const MODERATE_NEED: f32 = 50.0;
const FRIEND_FAMILIARITY: f32 = 10.0;

pub struct ScriptedBackend {
    latency: Duration,
}

impl ScriptedBackend {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(Duration::from_millis(config.scripted_latency_ms))
    }
}

impl ReasoningBackend for ScriptedBackend {
    async fn complete(&self, request: &DecisionRequest) -> Result<String> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(serde_json::to_string(&request.heuristic)?)
    }
}

/// A sensible decision for `agents[idx]` without any reasoning backend
pub fn heuristic_decision<R: Rng>(
    agents: &[Agent],
    idx: usize,
    world: &World,
    config: &ActionConfig,
    rng: &mut R,
) -> Decision {
    let Some(agent) = agents.get(idx) else {
        return Decision::idle("...");
    };

    if let Some(speech) = &agent.pending_speech {
        let speaker_near = agents.iter().any(|a| {
            a.id == speech.speaker && a.alive && a.position.distance(&agent.position) <= config.talk_radius
        });
        if speaker_near {
            return Decision::new(
                ActionKind::Talk,
                format!("{} spoke to me. I should answer.", speech.speaker_name),
            )
            .with_target(speech.speaker_name.clone())
            .with_speech(format!("Salve, {}. I hear you.", speech.speaker_name));
        }
    }

    let drives = &agent.drives;
    let seek = |need: DriveKind, thought: &dyn Fn(&str) -> String| {
        agent
            .memory
            .location_for_need(need, agent.position)
            .map(|(name, _)| Decision::new(ActionKind::Goto, thought(&name)).with_target(name))
    };

    if drives.thirst > MODERATE_NEED {
        if let Some(d) = seek(DriveKind::Thirst, &|name| {
            format!("I'm thirsty. I should head to {name}.")
        }) {
            return d;
        }
    }
    if drives.hunger > MODERATE_NEED {
        if let Some(d) = seek(DriveKind::Hunger, &|name| {
            format!("I need food. Maybe I can find some at {name}.")
        }) {
            return d;
        }
    }

    if drives.social > MODERATE_NEED {
        let nearby: Vec<&Agent> = agents
            .iter()
            .enumerate()
            .filter(|(i, a)| *i != idx && a.alive)
            .filter(|(_, a)| a.position.distance(&agent.position) < config.nearby_radius)
            .map(|(_, a)| a)
            .collect();
        if let Some(target) = nearby.choose(rng) {
            let known = agent
                .memory
                .relationship(target.id)
                .map(|r| r.familiarity > FRIEND_FAMILIARITY)
                .unwrap_or(false);
            let (thought, greetings) = if known {
                (
                    format!("Good to see {} again.", target.name),
                    [
                        format!("Salve, {}! How have you been?", target.name),
                        format!("{}! What news from the town?", target.name),
                    ],
                )
            } else {
                (
                    format!("I should introduce myself to {}.", target.name),
                    [
                        format!("Salve, friend. I am {}, a {}.", agent.name, agent.role),
                        format!("Ave! I don't believe we've met. I'm {}.", agent.name),
                    ],
                )
            };
            let speech = greetings.choose(rng).cloned().unwrap_or_default();
            return Decision::new(ActionKind::Talk, thought)
                .with_target(target.name.clone())
                .with_speech(speech);
        }
    }

    if drives.comfort > MODERATE_NEED {
        if let Some(d) = seek(DriveKind::Comfort, &|name| {
            format!("I need some peace. {name} might help.")
        }) {
            return d;
        }
    }

    let open: Vec<Direction> = Direction::ALL
        .into_iter()
        .filter(|d| world.is_walkable(agent.position.step(*d)))
        .collect();
    let direction = open
        .choose(rng)
        .copied()
        .or_else(|| Direction::ALL.choose(rng).copied())
        .unwrap_or(Direction::North);
    let thoughts = [
        "Let me see what lies in this direction.".to_string(),
        "I should explore the area.".to_string(),
        format!("As a {}, I should be about my duties.", agent.role),
        "Perhaps I'll find something interesting nearby.".to_string(),
    ];
    let thought = thoughts.choose(rng).cloned().unwrap_or_default();
    Decision::moving(direction, thought)
}
