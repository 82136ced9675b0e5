//! Boundary-exchange messages.
//!
//! A [`Message`] is a reusable instance holding one typed payload, a [`Tag`]
//! and an owner rank. Every step the payload is cleared and refilled, then
//! validated, then sent. Receives decode into the payload and run the same
//! validation again.
//!
//! - [`payload`]: the closed set of payload kinds
//! - [`tags`]: the symmetric per-direction tag scheme
//! - [`codec`]: the frame header and LZ4 framing
//! - [`MessageRegistry`]: construct messages by string id with configured
//!   capacities
//!
//! [`Tag`]: meso_types::Tag

pub mod codec;
mod capacity;
mod error;
mod message;
pub mod payload;
mod registry;
pub mod tags;
mod validation;

pub use capacity::{Capacities, MessageCapacity};
pub use codec::{CodecError, FrameHeader, FRAME_HEADER_LEN};
pub use error::MessageError;
pub use message::{Message, ReceiveToken, SendToken};
pub use payload::{
    CoordinateBundle, ForceBundle, MessageKind, Payload, RelocationBundle, ScalarAggregate,
};
pub use registry::{AnyMessage, MessageRegistry};
pub use tags::Channel;
pub use validation::{ValidationContext, ValidationError};
