//! Agent memory: bounded short/long-term stores, relationships, places,
//! preferences and a small rumor buffer for gossip

use crate::core::config::MemoryConfig;
use crate::core::types::{AgentId, GridPos, Tick};
use crate::entity::drives::DriveKind;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Event,
    Conversation,
    Observation,
    Feeling,
    Discovery,
    Reflection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub text: String,
    pub tick: Tick,
    pub importance: f32,
    pub kind: MemoryKind,
    pub tags: Vec<String>,
    pub location: Option<GridPos>,
    pub related_agent: Option<AgentId>,
}

impl MemoryEntry {
    pub fn new(text: impl Into<String>, tick: Tick, importance: f32) -> Self {
        Self {
            text: text.into(),
            tick,
            importance,
            kind: MemoryKind::Event,
            tags: Vec::new(),
            location: None,
            related_agent: None,
        }
    }

    pub fn kind(mut self, kind: MemoryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn at(mut self, pos: GridPos) -> Self {
        self.location = Some(pos);
        self
    }

    pub fn about(mut self, agent: AgentId) -> Self {
        self.related_agent = Some(agent);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// How this agent feels about another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    /// -100 (enemy) to 100 (trusted ally)
    pub trust: f32,
    /// 0 (stranger) to 100
    pub familiarity: f32,
    pub interactions: u32,
    pub last_tick: Tick,
    pub last_said_to_me: Option<String>,
    pub last_i_said: Option<String>,
}

impl Relationship {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            trust: 0.0,
            familiarity: 0.0,
            interactions: 0,
            last_tick: 0,
            last_said_to_me: None,
            last_i_said: None,
        }
    }

    pub fn sentiment(&self) -> &'static str {
        match self.trust {
            t if t > 50.0 => "trusted ally",
            t if t > 20.0 => "friendly",
            t if t < -50.0 => "hostile",
            t if t < -20.0 => "distrusted",
            _ => "neutral",
        }
    }
}

/// Something worth passing on in conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rumor {
    pub text: String,
    pub importance: f32,
    /// How many tellings this rumor has been through already
    pub hops: u8,
    /// Retelling limit of the event it arrived in. `None` for first-hand news.
    #[serde(default)]
    pub max_hops: Option<u8>,
    pub tick: Tick,
}

const FAMILIARITY_PER_MEETING: f32 = 5.0;
const MAX_PREFERENCE_STEP: f32 = 1.0;

/// Keywords of places that serve each need. Order breaks distance ties.
fn need_keywords(need: DriveKind) -> &'static [&'static str] {
    match need {
        DriveKind::Thirst => &["fountain", "well", "bath", "taverna", "tavern"],
        DriveKind::Hunger => &["market", "bakery", "taverna", "tavern", "granary"],
        DriveKind::Energy => &["home", "insula", "inn", "taverna"],
        DriveKind::Social => &["forum", "plaza", "taverna", "bath"],
        DriveKind::Comfort => &["bath", "temple", "garden"],
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    short_term: VecDeque<MemoryEntry>,
    long_term: Vec<MemoryEntry>,
    relationships: AHashMap<AgentId, Relationship>,
    known_locations: BTreeMap<String, GridPos>,
    preferences: AHashMap<String, f32>,
    rumors: VecDeque<Rumor>,
    config: MemoryConfig,
}

impl Memory {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            short_term: VecDeque::with_capacity(config.short_term_cap + 1),
            long_term: Vec::new(),
            relationships: AHashMap::new(),
            known_locations: BTreeMap::new(),
            preferences: AHashMap::new(),
            rumors: VecDeque::new(),
            config,
        }
    }

    /// Record a memory. Overflow evicts the least important entry, keeping
    /// chronological order. Important memories are copied to long-term
    /// storage, and important observations become rumors.
    pub fn add(&mut self, entry: MemoryEntry) {
        if entry.importance >= self.config.promote_importance {
            self.promote(entry.clone());
        }
        if entry.importance >= self.config.rumor_importance
            && matches!(entry.kind, MemoryKind::Event | MemoryKind::Observation)
            && !entry.has_tag("rumor")
        {
            self.push_rumor(Rumor {
                text: entry.text.clone(),
                importance: entry.importance,
                hops: 0,
                max_hops: None,
                tick: entry.tick,
            });
        }

        self.short_term.push_back(entry);
        if self.short_term.len() > self.config.short_term_cap {
            let least = self
                .short_term
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.importance.total_cmp(&b.1.importance))
                .map(|(i, _)| i);
            if let Some(idx) = least {
                self.short_term.remove(idx);
            }
        }
    }

    /// Shorthand for a plain event memory
    pub fn note(&mut self, text: impl Into<String>, tick: Tick, importance: f32) {
        self.add(MemoryEntry::new(text, tick, importance));
    }

    fn promote(&mut self, entry: MemoryEntry) {
        self.long_term.push(entry);
        if self.long_term.len() > self.config.long_term_cap {
            let least = self
                .long_term
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.importance.total_cmp(&b.1.importance))
                .map(|(i, _)| i);
            if let Some(idx) = least {
                self.long_term.remove(idx);
            }
        }
    }

    fn push_rumor(&mut self, rumor: Rumor) {
        if self.rumors.iter().any(|r| r.text == rumor.text) {
            return;
        }
        self.rumors.push_back(rumor);
        while self.rumors.len() > self.config.rumor_cap {
            self.rumors.pop_front();
        }
    }

    /// Store something heard from another agent so it can be passed on
    pub fn hear_rumor(
        &mut self,
        text: impl Into<String>,
        importance: f32,
        hops: u8,
        max_hops: Option<u8>,
        tick: Tick,
    ) {
        self.push_rumor(Rumor {
            text: text.into(),
            importance,
            hops,
            max_hops,
            tick,
        });
    }

    /// Freshest rumor worth telling
    pub fn rumor_for_conversation(&self) -> Option<&Rumor> {
        self.rumors.back()
    }

    pub fn short_term(&self) -> impl DoubleEndedIterator<Item = &MemoryEntry> {
        self.short_term.iter()
    }

    pub fn long_term(&self) -> &[MemoryEntry] {
        &self.long_term
    }

    pub fn latest(&self) -> Option<&MemoryEntry> {
        self.short_term.back()
    }

    // === RELATIONSHIPS ===

    pub fn update_relationship(
        &mut self,
        other: AgentId,
        name: &str,
        trust_delta: f32,
        tick: Tick,
    ) -> &mut Relationship {
        let rel = self
            .relationships
            .entry(other)
            .or_insert_with(|| Relationship::new(name));
        rel.trust = (rel.trust + trust_delta).clamp(-100.0, 100.0);
        rel.familiarity = (rel.familiarity + FAMILIARITY_PER_MEETING).min(100.0);
        rel.interactions += 1;
        rel.last_tick = tick;
        rel
    }

    pub fn relationship(&self, other: AgentId) -> Option<&Relationship> {
        self.relationships.get(&other)
    }

    pub fn relationships(&self) -> impl Iterator<Item = (&AgentId, &Relationship)> {
        self.relationships.iter()
    }

    // === PLACES ===

    pub fn learn_location(&mut self, name: impl Into<String>, pos: GridPos) {
        self.known_locations.insert(name.into(), pos);
    }

    pub fn known_locations(&self) -> &BTreeMap<String, GridPos> {
        &self.known_locations
    }

    /// Nearest known place that serves `need`
    pub fn location_for_need(&self, need: DriveKind, from: GridPos) -> Option<(String, GridPos)> {
        let keywords = need_keywords(need);
        self.known_locations
            .iter()
            .filter_map(|(name, pos)| {
                let lower = name.to_lowercase();
                let rank = keywords.iter().position(|k| lower.contains(k))?;
                Some((from.distance(pos), rank, name, pos))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, _, name, pos)| (name.clone(), *pos))
    }

    // === PREFERENCES ===

    /// Bad experiences count in full, good ones at a third
    pub fn update_preference(&mut self, subject: &str, delta: f32) {
        let step = if delta < 0.0 { delta } else { delta / 3.0 };
        let step = step.clamp(-MAX_PREFERENCE_STEP, MAX_PREFERENCE_STEP);
        let entry = self.preferences.entry(subject.to_lowercase()).or_insert(0.0);
        *entry = (*entry + step).clamp(-1.0, 1.0);
    }

    pub fn preference(&self, subject: &str) -> f32 {
        self.preferences
            .get(&subject.to_lowercase())
            .copied()
            .unwrap_or(0.0)
    }

    // === PROMPT TEXT ===

    /// Most recent distinct memories, newest first, repeats collapsed
    pub fn recent_summary(&self, n: usize) -> String {
        if self.short_term.is_empty() {
            return "Nothing notable has happened recently.".to_string();
        }
        let mut seen: Vec<(&str, Tick, usize)> = Vec::new();
        for m in self.short_term.iter().rev() {
            match seen.iter_mut().find(|(text, _, _)| *text == m.text) {
                Some(entry) => entry.2 += 1,
                None => seen.push((m.text.as_str(), m.tick, 1)),
            }
        }
        seen.iter()
            .take(n)
            .map(|(text, tick, count)| {
                if *count > 1 {
                    format!("- [Tick {tick}] {text} (x{count})")
                } else {
                    format!("- [Tick {tick}] {text}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn important_summary(&self, n: usize) -> String {
        if self.long_term.is_empty() {
            return "No significant memories yet.".to_string();
        }
        let mut top: Vec<&MemoryEntry> = self.long_term.iter().collect();
        top.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        top.iter()
            .take(n)
            .map(|m| format!("- {}", m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn relationship_summary(&self) -> String {
        if self.relationships.is_empty() {
            return "You don't know anyone well yet.".to_string();
        }
        let mut rels: Vec<&Relationship> = self.relationships.values().collect();
        rels.sort_by(|a, b| b.familiarity.total_cmp(&a.familiarity));
        rels.iter()
            .map(|r| {
                let heard = match &r.last_said_to_me {
                    Some(said) => format!(" - last said: \"{said}\""),
                    None => String::new(),
                };
                format!(
                    "- {}: {} (met {} times){}",
                    r.name,
                    r.sentiment(),
                    r.interactions,
                    heard
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn locations_summary(&self, limit: usize) -> String {
        if self.known_locations.is_empty() {
            return "You haven't discovered any notable locations yet.".to_string();
        }
        self.known_locations
            .iter()
            .take(limit)
            .map(|(name, pos)| format!("- {name} is at {pos}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn preferences_summary(&self) -> String {
        let mut likes: Vec<&str> = Vec::new();
        let mut dislikes: Vec<&str> = Vec::new();
        for (item, score) in &self.preferences {
            if *score > 0.3 {
                likes.push(item);
            } else if *score < -0.3 {
                dislikes.push(item);
            }
        }
        likes.sort_unstable();
        dislikes.sort_unstable();

        let mut parts = Vec::new();
        if !likes.is_empty() {
            parts.push(format!("You like: {}", likes.join(", ")));
        }
        if !dislikes.is_empty() {
            parts.push(format!("You dislike: {}", dislikes.join(", ")));
        }
        parts.join("\n")
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}
