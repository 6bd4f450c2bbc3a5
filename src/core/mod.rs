pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::SimulationConfig;
pub use error::{Result, SimError};
pub use types::{AgentId, Direction, GridPos, Tick};
