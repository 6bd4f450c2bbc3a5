use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Agent not found: {0:?}")]
    AgentNotFound(crate::core::types::AgentId),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Event listener failed: {0}")]
    Listener(String),

    #[error("Decision worker error: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
