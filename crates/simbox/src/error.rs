//! SimBox error types.

use glam::DVec3;
use meso_messages::{MessageError, ValidationError};
use meso_space::{GeometryError, SpaceError};
use meso_types::{BeadId, Direction, GridError, Pid, PolymerId, AXES};
use thiserror::Error;

/// Errors while configuring, assembling or loading a SimBox.
///
/// All of them are fatal for the run.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Process grid error: {0}")]
    Grid(#[from] GridError),

    #[error("Space geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Domain extent must be positive and finite on every axis, got {0}")]
    BadDomain(DVec3),

    #[error("Handshake rejected by root: {0} reported an inconsistent grid")]
    HandshakeRejected(Pid),

    #[error("Malformed handshake verdict {0:?}")]
    MalformedVerdict(Vec<u64>),

    #[error("No neighbour in message direction {0}")]
    MissingNeighbour(Direction),

    #[error("Neighbours have not been discovered")]
    NotDiscovered,

    #[error("SimBox is not assembled")]
    NotAssembled,

    #[error("Assembly already failed on this SimBox")]
    AssemblyFailed,

    #[error("Interaction cutoff {cutoff} exceeds the narrowest cell width {width}")]
    CutoffExceedsCell { cutoff: f64, width: f64 },

    #[error("Initial state rejected at {id}: {reason}")]
    InvalidInitialState { id: BeadId, reason: &'static str },

    #[error("Initial state polymer {polymer} names unknown member {bead}")]
    UnknownPolymerMember { polymer: PolymerId, bead: BeadId },

    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    #[error("Space error: {0}")]
    Space(#[from] SpaceError),
}

impl From<ValidationError> for SetupError {
    fn from(e: ValidationError) -> Self {
        SetupError::Message(e.into())
    }
}

/// Violations of the exchange protocols. Fatal for the step.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{id} from {from} arrived at {position}, outside the Space")]
    ArrivalOutOfRange { id: BeadId, from: Pid, position: DVec3 },

    #[error("{id} from {from} is already owned here")]
    DuplicateOwnership { id: BeadId, from: Pid },

    #[error("Force reply from {from} names {id}, which is not held here")]
    UnknownForceTarget { id: BeadId, from: Pid },

    #[error("{id} moved more than one cell width along {} in one step, reaching {position}", AXES[*axis])]
    Escaped { id: BeadId, axis: usize, position: DVec3 },

    #[error("{id} left the Space from an internal region, reaching {position}")]
    UnexpectedDeparture { id: BeadId, position: DVec3 },

    #[error("Region error: {0}")]
    Region(#[from] SpaceError),
}

/// Failure of one step, tagged with the step number.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("step {step}: {source}")]
    Message {
        step: u64,
        #[source]
        source: MessageError,
    },

    #[error("step {step}: {source}")]
    Protocol {
        step: u64,
        #[source]
        source: ProtocolError,
    },

    #[error("step {step}: {source}")]
    Setup {
        step: u64,
        #[source]
        source: SetupError,
    },
}

impl StepError {
    /// Step the failure happened in.
    pub fn step(&self) -> u64 {
        match self {
            StepError::Message { step, .. }
            | StepError::Protocol { step, .. }
            | StepError::Setup { step, .. } => *step,
        }
    }

    /// Short class name for logs.
    pub fn class(&self) -> &'static str {
        match self {
            StepError::Message {
                source: MessageError::Validation(_),
                ..
            } => "validation",
            StepError::Message {
                source: MessageError::Transport(_),
                ..
            } => "transport",
            StepError::Message { .. } => "message",
            StepError::Protocol { .. } => "protocol",
            StepError::Setup { .. } => "setup",
        }
    }
}

/// Step-internal error before the step number is attached.
#[derive(Debug)]
pub(crate) enum Failure {
    Setup(SetupError),
    Message(MessageError),
    Protocol(ProtocolError),
}

impl Failure {
    pub(crate) fn at(self, step: u64) -> StepError {
        match self {
            Failure::Setup(source) => StepError::Setup { step, source },
            Failure::Message(source) => StepError::Message { step, source },
            Failure::Protocol(source) => StepError::Protocol { step, source },
        }
    }
}

impl From<SetupError> for Failure {
    fn from(e: SetupError) -> Self {
        Failure::Setup(e)
    }
}

impl From<MessageError> for Failure {
    fn from(e: MessageError) -> Self {
        Failure::Message(e)
    }
}

impl From<ValidationError> for Failure {
    fn from(e: ValidationError) -> Self {
        Failure::Message(e.into())
    }
}

impl From<ProtocolError> for Failure {
    fn from(e: ProtocolError) -> Self {
        Failure::Protocol(e)
    }
}

impl From<SpaceError> for Failure {
    fn from(e: SpaceError) -> Self {
        Failure::Protocol(e.into())
    }
}
