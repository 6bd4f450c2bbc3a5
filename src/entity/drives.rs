//! Biological and social drives that feed the urgency gate

use crate::core::config::DriveWeights;
use serde::{Deserialize, Serialize};

pub const DRIVE_MAX: f32 = 100.0;

/// Drive levels. 0.0 = fully satisfied, 100.0 = desperate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drives {
    pub hunger: f32,
    pub thirst: f32,
    /// Fatigue: 0.0 = fully rested
    pub energy: f32,
    /// Loneliness
    pub social: f32,
    pub comfort: f32,
}

impl Default for Drives {
    fn default() -> Self {
        Self {
            hunger: 20.0,
            thirst: 20.0,
            energy: 10.0,
            social: 30.0,
            comfort: 10.0,
        }
    }
}

/// Per-drive growth multipliers for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthRates {
    pub hunger: f32,
    pub thirst: f32,
    pub energy: f32,
    pub social: f32,
    pub comfort: f32,
}

impl Drives {
    pub fn get(&self, drive: DriveKind) -> f32 {
        match drive {
            DriveKind::Hunger => self.hunger,
            DriveKind::Thirst => self.thirst,
            DriveKind::Energy => self.energy,
            DriveKind::Social => self.social,
            DriveKind::Comfort => self.comfort,
        }
    }

    fn slot(&mut self, drive: DriveKind) -> &mut f32 {
        match drive {
            DriveKind::Hunger => &mut self.hunger,
            DriveKind::Thirst => &mut self.thirst,
            DriveKind::Energy => &mut self.energy,
            DriveKind::Social => &mut self.social,
            DriveKind::Comfort => &mut self.comfort,
        }
    }

    pub fn set(&mut self, drive: DriveKind, value: f32) {
        *self.slot(drive) = value.clamp(0.0, DRIVE_MAX);
    }

    /// Relieve a drive, never below zero
    pub fn satisfy(&mut self, drive: DriveKind, amount: f32) {
        let slot = self.slot(drive);
        *slot = (*slot - amount).clamp(0.0, DRIVE_MAX);
    }

    /// Worsen a drive, never above the maximum
    pub fn strain(&mut self, drive: DriveKind, amount: f32) {
        let slot = self.slot(drive);
        *slot = (*slot + amount).clamp(0.0, DRIVE_MAX);
    }

    /// Grow every drive over `dt` with the given per-drive rates
    pub fn grow(&mut self, dt: f32, rates: GrowthRates) {
        self.strain(DriveKind::Hunger, rates.hunger * dt);
        self.strain(DriveKind::Thirst, rates.thirst * dt);
        self.strain(DriveKind::Energy, rates.energy * dt);
        self.strain(DriveKind::Social, rates.social * dt);
        self.strain(DriveKind::Comfort, rates.comfort * dt);
    }

    /// Get most pressing drive
    pub fn most_pressing(&self) -> (DriveKind, f32) {
        DriveKind::ALL
            .into_iter()
            .map(|d| (d, self.get(d)))
            .fold((DriveKind::Hunger, f32::MIN), |best, next| {
                if next.1 > best.1 {
                    next
                } else {
                    best
                }
            })
    }

    /// Super-linear pressure: each drive contributes `(0.5 r + r^2) * weight`
    /// where `r` is the drive normalised to 0..1
    pub fn pressure(&self, weights: &DriveWeights) -> f32 {
        let term = |value: f32, weight: f32| {
            let ratio = (value / DRIVE_MAX).clamp(0.0, 1.0);
            (ratio * 0.5 + ratio * ratio) * weight
        };
        term(self.hunger, weights.hunger)
            + term(self.thirst, weights.thirst)
            + term(self.energy, weights.energy)
            + term(self.social, weights.social)
            + term(self.comfort, weights.comfort)
    }

    /// Words for a prompt
    pub fn describe(&self) -> String {
        DriveKind::ALL
            .iter()
            .map(|d| format!("{}: {}", d.name(), level_word(self.get(*d))))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn level_word(value: f32) -> &'static str {
    match value {
        v if v >= 85.0 => "desperate",
        v if v >= 70.0 => "severe",
        v if v >= 50.0 => "noticeable",
        v if v >= 25.0 => "mild",
        _ => "fine",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveKind {
    Hunger,
    Thirst,
    Energy,
    Social,
    Comfort,
}

impl DriveKind {
    pub const ALL: [DriveKind; 5] = [
        DriveKind::Hunger,
        DriveKind::Thirst,
        DriveKind::Energy,
        DriveKind::Social,
        DriveKind::Comfort,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DriveKind::Hunger => "hunger",
            DriveKind::Thirst => "thirst",
            DriveKind::Energy => "fatigue",
            DriveKind::Social => "loneliness",
            DriveKind::Comfort => "discomfort",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates(v: f32) -> GrowthRates {
        GrowthRates {
            hunger: v,
            thirst: v,
            energy: v,
            social: v,
            comfort: v,
        }
    }

    #[test]
    fn test_growth_is_clamped() {
        let mut drives = Drives::default();
        drives.grow(10_000.0, rates(1.0));
        for d in DriveKind::ALL {
            assert_eq!(drives.get(d), DRIVE_MAX);
        }
    }

    #[test]
    fn test_satisfy_floors_at_zero() {
        let mut drives = Drives::default();
        drives.satisfy(DriveKind::Thirst, 500.0);
        assert_eq!(drives.thirst, 0.0);
    }

    #[test]
    fn test_most_pressing() {
        let drives = Drives {
            hunger: 10.0,
            thirst: 80.0,
            energy: 40.0,
            social: 5.0,
            comfort: 0.0,
        };
        assert_eq!(drives.most_pressing(), (DriveKind::Thirst, 80.0));
    }

    #[test]
    fn test_pressure_is_superlinear() {
        let weights = DriveWeights::default();
        let mut low = Drives {
            hunger: 0.0,
            thirst: 0.0,
            energy: 0.0,
            social: 0.0,
            comfort: 0.0,
        };
        assert_eq!(low.pressure(&weights), 0.0);

        low.hunger = 40.0;
        let at_forty = low.pressure(&weights);
        low.hunger = 80.0;
        let at_eighty = low.pressure(&weights);
        assert!(at_eighty > 2.0 * at_forty);
    }
}
