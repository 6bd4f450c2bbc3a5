//! Timed status effects on an agent

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Burned,
    SmokeInhalation,
    FoodPoisoning,
    WellFed,
    Refreshed,
    Rested,
}

impl StatusKind {
    pub fn is_danger(&self) -> bool {
        matches!(self, StatusKind::Burned | StatusKind::SmokeInhalation)
    }

    /// Urgency added to the gate input while active
    pub fn urgency(&self) -> f32 {
        match self {
            StatusKind::Burned => 25.0,
            StatusKind::SmokeInhalation => 15.0,
            StatusKind::FoodPoisoning => 8.0,
            StatusKind::WellFed | StatusKind::Refreshed | StatusKind::Rested => 0.0,
        }
    }

    /// Health lost per tick while active
    pub fn damage_per_tick(&self) -> f32 {
        match self {
            StatusKind::Burned => 1.0,
            StatusKind::SmokeInhalation => 0.5,
            StatusKind::FoodPoisoning => 0.2,
            _ => 0.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StatusKind::Burned => "burned",
            StatusKind::SmokeInhalation => "choking on smoke",
            StatusKind::FoodPoisoning => "sick from bad food",
            StatusKind::WellFed => "well fed",
            StatusKind::Refreshed => "refreshed",
            StatusKind::Rested => "rested",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub kind: StatusKind,
    pub remaining: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusEffects {
    active: Vec<StatusEffect>,
}

impl StatusEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an effect. Re-applying extends to the longer duration.
    pub fn apply(&mut self, kind: StatusKind, duration: u32) {
        match self.active.iter_mut().find(|e| e.kind == kind) {
            Some(effect) => effect.remaining = effect.remaining.max(duration),
            None => self.active.push(StatusEffect {
                kind,
                remaining: duration,
            }),
        }
    }

    pub fn has(&self, kind: StatusKind) -> bool {
        self.active.iter().any(|e| e.kind == kind)
    }

    pub fn has_danger(&self) -> bool {
        self.active.iter().any(|e| e.kind.is_danger())
    }

    pub fn clear(&mut self, kind: StatusKind) {
        self.active.retain(|e| e.kind != kind);
    }

    /// Count down all effects, returning health damage taken this tick
    pub fn tick(&mut self) -> f32 {
        let damage = self.active.iter().map(|e| e.kind.damage_per_tick()).sum();
        for effect in &mut self.active {
            effect.remaining = effect.remaining.saturating_sub(1);
        }
        self.active.retain(|e| e.remaining > 0);
        damage
    }

    pub fn total_urgency(&self) -> f32 {
        self.active.iter().map(|e| e.kind.urgency()).sum()
    }

    /// Multiplier on hunger growth
    pub fn hunger_multiplier(&self) -> f32 {
        let mut m = 1.0;
        if self.has(StatusKind::WellFed) {
            m *= 0.5;
        }
        if self.has(StatusKind::FoodPoisoning) {
            m *= 1.5;
        }
        m
    }

    pub fn thirst_multiplier(&self) -> f32 {
        if self.has(StatusKind::Refreshed) {
            0.5
        } else {
            1.0
        }
    }

    pub fn energy_multiplier(&self) -> f32 {
        if self.has(StatusKind::Rested) {
            0.5
        } else {
            1.0
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusEffect> {
        self.active.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
