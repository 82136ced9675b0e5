use crate::{CodecError, MessageKind, ValidationError};
use meso_transport::TransportError;
use meso_types::Tag;
use thiserror::Error;

/// Errors from sending or receiving a message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MessageError {
    #[error("{kind} message on {tag} was not validated before sending")]
    NotValidated { kind: MessageKind, tag: Tag },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("unknown message id {0:?}")]
    UnknownMessageId(String),

    #[error("token completed as the wrong kind of operation")]
    CompletionMismatch,
}
