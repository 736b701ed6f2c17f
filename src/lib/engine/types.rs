use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use bollard::Docker;

/// Capability-limited handle on the container engine. Cheap to acquire,
/// acquired fresh per operation rather than pooled.
#[derive(Debug, Clone)]
pub struct EngineClient {
    pub client: Docker,
}

/// Everything the engine needs to create one service container.
#[derive(Debug, Clone, Default)]
pub struct CreateSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    pub ports: BTreeMap<String, u16>,
    pub binds: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub cap_add: Vec<String>,
    pub sysctls: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The control socket is unreachable. Checked once per client
    /// acquisition and never assumed from a prior call.
    Unavailable,
    /// The engine is reachable but rejected a specific call.
    OperationFailed(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Unavailable => {
                write!(f, "container engine is unavailable")
            }
            EngineError::OperationFailed(msg) => {
                write!(f, "engine operation failed: {}", msg)
            }
        }
    }
}

impl Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;
