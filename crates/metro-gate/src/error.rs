use metro_core::{AgentId, Cancelled, Cell};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("{0} is not a station entrance")]
    UnknownEntrance(Cell),

    #[error("entrance {cell} claimed by both {first} and {second}")]
    DuplicateOccupant {
        cell:   Cell,
        first:  AgentId,
        second: AgentId,
    },

    #[error("{0} asked for a course but is not in the admission queue")]
    NotQueued(AgentId),

    #[error("{0} ended a course it never began")]
    NotInCourse(AgentId),

    #[error("{0} has retired")]
    Retired(AgentId),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

pub type GateResult<T> = Result<T, GateError>;
