use metro_core::{AgentId, Cancelled, Cell, CoreError, ResourceId};
use metro_gate::GateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine configuration error: {0}")]
    Config(String),

    #[error("{what} length {got} does not match train count {expected}")]
    AgentCountMismatch {
        expected: usize,
        got:      usize,
        what:     &'static str,
    },

    #[error("no trains to run")]
    NoAgents,

    #[error("trains need at least one wagon")]
    ZeroWagons,

    #[error("unknown train {0}")]
    UnknownAgent(AgentId),

    #[error("{agent}'s route crosses {cell}, which is not track")]
    Impassable { agent: AgentId, cell: Cell },

    #[error("{agent}'s route ends at {cell}, which is not a station entrance")]
    NotAnEntrance { agent: AgentId, cell: Cell },

    #[error("{first} and {second} both start at {cell}")]
    DuplicateStart {
        cell:   Cell,
        first:  AgentId,
        second: AgentId,
    },

    #[error("{first} and {second} both start with a wagon on {cell}")]
    OverlappingStart {
        cell:   Cell,
        first:  AgentId,
        second: AgentId,
    },

    #[error("{first} and {second} both start inside {resource}")]
    ContestedStart {
        resource: ResourceId,
        first:    AgentId,
        second:   AgentId,
    },

    #[error("failed to spawn train thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("grid error: {0}")]
    Core(#[from] CoreError),

    #[error("gate error: {0}")]
    Gate(#[from] GateError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

pub type EngineResult<T> = Result<T, EngineError>;
