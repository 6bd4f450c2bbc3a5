//! Decision pipeline: autopilot, events, execution and the tick loop

pub mod autopilot;
pub mod decision;
pub mod engine;
pub mod events;
pub mod executor;
pub mod scenario;
pub mod tick;

pub use autopilot::{Autopilot, AutopilotContext, AutopilotSnapshot, AutopilotState};
pub use decision::{ActionKind, Decision, Provenance};
pub use engine::{SharedSimulation, Simulation};
pub use events::{Event, EventBus, EventKind};
pub use executor::{ActionExecutor, ActionOutcome};
pub use scenario::demo_town;
pub use tick::TickSummary;
