//! Faults that can surface from the control path.
//!
//! Telemetry faults have no variant here: they are counted by the controller
//! and never returned to the host.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    /// Invalid gains, topology, rated force, or an identifier that does not
    /// resolve against the mechanical model. Raised before any step runs.
    #[error("Configuration fault: {0}")]
    Configuration(String),

    /// `step` was called before a successful `init`
    #[error("Controller must be initialized before stepping")]
    NotInitialized,

    /// The mechanical model returned malformed or unavailable state mid-step
    #[error("State query `{query}` failed: {msg}")]
    StateQuery { query: &'static str, msg: String },

    /// Writing a control value to the actuation interface failed
    #[error("Failed to write control for actuator `{actuator}`: {msg}")]
    Actuation { actuator: String, msg: String },

    #[error("Config file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config (de)serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ControlError {
    /// Whether this fault indicates bad setup rather than bad runtime state
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::NotInitialized | Self::Io(_) | Self::Json(_)
        )
    }

    pub(crate) fn state_query(query: &'static str, msg: impl Into<String>) -> Self {
        Self::StateQuery {
            query,
            msg: msg.into(),
        }
    }
}
