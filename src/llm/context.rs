//! Gather an agent's situation for backend prompts
//!
//! A context is a plain snapshot taken under the simulation lock. Building the
//! prompt text from it happens outside the lock.

use crate::core::config::ActionConfig;
use crate::core::types::{GridPos, Tick};
use crate::entity::agent::Agent;
use crate::world::World;

const RECENT_MEMORIES: usize = 8;
const IMPORTANT_MEMORIES: usize = 5;
const KNOWN_LOCATIONS: usize = 12;
const DECISION_HISTORY: usize = 5;

/// Another agent as seen by the prompted agent
pub struct NearbyPerson {
    pub name: String,
    pub role: String,
    pub distance: f32,
    /// healthy, wounded, busy, ...
    pub status: String,
}

/// A structure as seen by the prompted agent
pub struct NearbyStructure {
    pub name: String,
    pub distance: f32,
    pub notes: Vec<String>,
}

pub struct AgentContext {
    pub name: String,
    pub role: String,
    pub position: GridPos,
    pub tick: Tick,
    pub is_night: bool,
    pub health: f32,
    pub max_health: f32,
    pub drives: String,
    pub conditions: Vec<String>,
    pub inventory: Vec<String>,
    pub ground_items: Vec<String>,
    pub people: Vec<NearbyPerson>,
    pub structures: Vec<NearbyStructure>,
    pub recent_memories: String,
    pub important_memories: String,
    pub relationships: String,
    pub known_locations: String,
    pub preferences: String,
    pub recent_actions: Vec<String>,
    /// Speaker and message, if someone just addressed this agent
    pub incoming_speech: Option<(String, String)>,
}

impl AgentContext {
    /// Snapshot `agents[idx]` and its surroundings
    pub fn capture(
        agents: &[Agent],
        idx: usize,
        world: &World,
        tick: Tick,
        config: &ActionConfig,
    ) -> Option<Self> {
        let agent = agents.get(idx)?;

        let mut people: Vec<NearbyPerson> = agents
            .iter()
            .enumerate()
            .filter(|(i, other)| *i != idx && other.alive)
            .map(|(_, other)| (other, other.position.distance(&agent.position)))
            .filter(|(_, d)| *d <= config.inspect_agent_radius)
            .map(|(other, distance)| NearbyPerson {
                name: other.name.clone(),
                role: other.role.to_string(),
                distance,
                status: person_status(other),
            })
            .collect();
        people.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let structures = world
            .objects
            .get_in_radius(agent.position, config.inspect_object_radius)
            .into_iter()
            .map(|obj| {
                let caps = &obj.capabilities;
                let mut notes = Vec::new();
                if caps.is_burning() {
                    notes.push("ON FIRE".to_string());
                }
                if let Some(usable) = caps.interactable() {
                    notes.push(format!("used for {}", usable.kind.label()));
                }
                if let Some(station) = caps.station() {
                    notes.push(format!("{} station", station.station));
                }
                NearbyStructure {
                    name: obj.name.clone(),
                    distance: obj.position.distance(&agent.position),
                    notes,
                }
            })
            .collect();

        let ground_items = world
            .map
            .tile(agent.position)
            .map(|tile| tile.ground_items.iter().map(|i| i.name.clone()).collect())
            .unwrap_or_default();

        let inventory = agent
            .inventory
            .iter()
            .map(|item| {
                if item.is_spoiled() {
                    format!("{} (spoiled)", item.name)
                } else {
                    item.name.clone()
                }
            })
            .collect();

        let recent_actions = agent
            .decision_log
            .iter()
            .rev()
            .take(DECISION_HISTORY)
            .map(|record| {
                let d = &record.decision;
                match &d.target {
                    Some(target) => format!("[Tick {}] {} {}", record.tick, d.action, target),
                    None => format!("[Tick {}] {}", record.tick, d.action),
                }
            })
            .collect();

        Some(Self {
            name: agent.name.clone(),
            role: agent.role.to_string(),
            position: agent.position,
            tick,
            is_night: world.is_night,
            health: agent.health,
            max_health: agent.max_health,
            drives: agent.drives.describe(),
            conditions: agent.status.iter().map(|s| s.kind.name().to_string()).collect(),
            inventory,
            ground_items,
            people,
            structures,
            recent_memories: agent.memory.recent_summary(RECENT_MEMORIES),
            important_memories: agent.memory.important_summary(IMPORTANT_MEMORIES),
            relationships: agent.memory.relationship_summary(),
            known_locations: agent.memory.locations_summary(KNOWN_LOCATIONS),
            preferences: agent.memory.preferences_summary(),
            recent_actions,
            incoming_speech: agent
                .pending_speech
                .as_ref()
                .map(|p| (p.speaker_name.clone(), p.message.clone())),
        })
    }

    /// Full prompt text: identity, body, surroundings, mind, then the action menu
    pub fn prompt(&self) -> String {
        let mut sections = Vec::new();

        sections.push(format!(
            "You are {}, a {} in the town. It is tick {} and it is {}.",
            self.name,
            self.role,
            self.tick,
            if self.is_night { "night" } else { "day" }
        ));

        let mut body = format!(
            "YOUR BODY:\nHealth: {:.0}/{:.0}{}\nDrives: {}",
            self.health,
            self.max_health,
            health_warning(self.health),
            self.drives
        );
        if !self.conditions.is_empty() {
            body.push_str(&format!("\nConditions: {}", self.conditions.join(", ")));
        }
        body.push_str(&format!("\nInventory: {}", list_or(&self.inventory, "nothing")));
        sections.push(body);

        let mut world = format!("WHERE YOU ARE: {}", self.position);
        if !self.ground_items.is_empty() {
            world.push_str(&format!("\nOn the ground: {}", self.ground_items.join(", ")));
        }
        world.push_str("\nPEOPLE NEARBY:");
        if self.people.is_empty() {
            world.push_str("\n- nobody");
        }
        for p in &self.people {
            world.push_str(&format!(
                "\n- {} ({}), {:.0} tiles away, {}",
                p.name, p.role, p.distance, p.status
            ));
        }
        world.push_str("\nSTRUCTURES NEARBY:");
        if self.structures.is_empty() {
            world.push_str("\n- none");
        }
        for s in &self.structures {
            if s.notes.is_empty() {
                world.push_str(&format!("\n- {}, {:.0} tiles away", s.name, s.distance));
            } else {
                world.push_str(&format!(
                    "\n- {}, {:.0} tiles away ({})",
                    s.name,
                    s.distance,
                    s.notes.join(", ")
                ));
            }
        }
        sections.push(world);

        sections.push(format!(
            "YOUR RECENT MEMORIES:\n{}\n\nIMPORTANT MEMORIES:\n{}\n\nRELATIONSHIPS:\n{}\n\nKNOWN LOCATIONS:\n{}\n\nPREFERENCES:\n{}",
            self.recent_memories,
            self.important_memories,
            self.relationships,
            self.known_locations,
            if self.preferences.is_empty() {
                "You have no strong preferences yet."
            } else {
                self.preferences.as_str()
            }
        ));

        if !self.recent_actions.is_empty() {
            sections.push(format!(
                "YOUR RECENT ACTIONS:\n{}",
                self.recent_actions.join("\n")
            ));
        }

        if let Some((speaker, message)) = &self.incoming_speech {
            sections.push(format!(
                "SOMEONE JUST SPOKE TO YOU:\n{speaker} said: \"{message}\"\nYou may answer with TALK, ignore them, or do anything else."
            ));
        }

        sections.push(ACTION_MENU.to_string());
        sections.join("\n\n")
    }
}

fn person_status(other: &Agent) -> String {
    let hurt = other.max_health > 0.0 && other.health / other.max_health < 0.5;
    match (hurt, other.hostile) {
        (true, true) => "wounded and hostile".to_string(),
        (true, false) => "wounded".to_string(),
        (false, true) => "hostile".to_string(),
        (false, false) => other.activity.label().to_lowercase(),
    }
}

fn health_warning(health: f32) -> &'static str {
    if health < 20.0 {
        " (CRITICAL, YOU ARE DYING)"
    } else if health < 50.0 {
        " (wounded)"
    } else {
        ""
    }
}

fn list_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

const ACTION_MENU: &str = r#"DECIDE YOUR NEXT ACTION.
Available actions:
- MOVE: one tile. Give `direction` (north, south, east, west, northeast, northwest, southeast, southwest).
- GOTO: walk to a place. `target` must be a name from KNOWN LOCATIONS.
- TALK: speak to someone nearby. `target` from PEOPLE NEARBY, plus `speech`.
- INTERACT: use a structure. `target` from STRUCTURES NEARBY.
- CONSUME: eat or drink an item. `target` from your inventory.
- PICK_UP / DROP: an item on the ground or in your inventory. `target` is the item.
- CRAFT: make an item from materials you carry. `target` is the item to make.
- TRADE: barter. `target` is the person, `offer` your item, `want` theirs.
- REST, SLEEP, WORK, IDLE: no target needed.
- INSPECT: look closely at a person or structure. `target` is its name.
- REFLECT: write a note to yourself. Put it in `note`.
- ATTACK: strike someone nearby. `target` is the person, optional `item` is a weapon you carry.

Respond with raw JSON only, using just the keys your action needs:
{"thought": "1-2 sentences", "action": "ACTION_NAME", "target": "...", "direction": "...", "speech": "...", "offer": "...", "want": "...", "note": "...", "item": "..."}"#;
