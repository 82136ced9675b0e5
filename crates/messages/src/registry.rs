//! Construct messages by string id.
//!
//! One registry is built per process at start-up and passed by reference to
//! whatever needs to create message instances. It holds the configured
//! capacities and any aliases registered on top of the canonical ids.

use crate::{
    Capacities, CoordinateBundle, ForceBundle, Message, MessageError, MessageKind,
    RelocationBundle, ScalarAggregate,
};
use meso_types::{Pid, Tag};
use std::collections::HashMap;

/// A message of any kind.
#[derive(Debug, Clone)]
pub enum AnyMessage {
    Coordinates(Message<CoordinateBundle>),
    Forces(Message<ForceBundle>),
    Relocation(Message<RelocationBundle>),
    Scalar(Message<ScalarAggregate>),
}

impl AnyMessage {
    /// Kind of the wrapped message.
    pub fn kind(&self) -> MessageKind {
        match self {
            AnyMessage::Coordinates(_) => MessageKind::Coordinates,
            AnyMessage::Forces(_) => MessageKind::Forces,
            AnyMessage::Relocation(_) => MessageKind::Relocation,
            AnyMessage::Scalar(_) => MessageKind::Scalar,
        }
    }

    /// Tag of the wrapped message.
    pub fn tag(&self) -> Tag {
        match self {
            AnyMessage::Coordinates(m) => m.tag(),
            AnyMessage::Forces(m) => m.tag(),
            AnyMessage::Relocation(m) => m.tag(),
            AnyMessage::Scalar(m) => m.tag(),
        }
    }

    /// Unwrap a scalar message.
    pub fn into_scalar(self) -> Option<Message<ScalarAggregate>> {
        match self {
            AnyMessage::Scalar(m) => Some(m),
            _ => None,
        }
    }
}

/// Factory for message instances.
#[derive(Debug, Clone)]
pub struct MessageRegistry {
    owner: Pid,
    capacities: Capacities,
    ids: HashMap<String, MessageKind>,
}

impl MessageRegistry {
    /// Create a registry for messages owned by `owner`.
    pub fn new(owner: Pid, capacities: Capacities) -> Self {
        let ids = MessageKind::ALL
            .into_iter()
            .map(|kind| (kind.name().to_string(), kind))
            .collect();
        Self {
            owner,
            capacities,
            ids,
        }
    }

    /// Register an additional id for `kind`. Returns the kind it replaced.
    pub fn register_alias(&mut self, id: impl Into<String>, kind: MessageKind) -> Option<MessageKind> {
        self.ids.insert(id.into(), kind)
    }

    /// Kind registered under `id`.
    pub fn kind_of(&self, id: &str) -> Option<MessageKind> {
        self.ids.get(id).copied()
    }

    /// Configured capacities.
    pub fn capacities(&self) -> &Capacities {
        &self.capacities
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ids.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Create a message by string id.
    pub fn create(&self, id: &str, tag: Tag) -> Result<AnyMessage, MessageError> {
        let kind = self
            .kind_of(id)
            .ok_or_else(|| MessageError::UnknownMessageId(id.to_string()))?;
        Ok(match kind {
            MessageKind::Coordinates => AnyMessage::Coordinates(self.coordinates(tag)),
            MessageKind::Forces => AnyMessage::Forces(self.forces(tag)),
            MessageKind::Relocation => AnyMessage::Relocation(self.relocation(tag)),
            MessageKind::Scalar => AnyMessage::Scalar(self.scalar(tag)),
        })
    }

    /// Coordinates message.
    pub fn coordinates(&self, tag: Tag) -> Message<CoordinateBundle> {
        Message::new(tag, self.owner, self.capacities.coordinates)
    }

    /// Forces message.
    pub fn forces(&self, tag: Tag) -> Message<ForceBundle> {
        Message::new(tag, self.owner, self.capacities.forces)
    }

    /// Relocation message.
    pub fn relocation(&self, tag: Tag) -> Message<RelocationBundle> {
        Message::new(tag, self.owner, self.capacities.relocation)
    }

    /// Scalar message.
    pub fn scalar(&self, tag: Tag) -> Message<ScalarAggregate> {
        Message::new(tag, self.owner, self.capacities.scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Channel, MessageCapacity};
    use meso_types::Direction;

    #[test]
    fn test_create_by_canonical_id() {
        let registry = MessageRegistry::new(Pid(2), Capacities::default());
        let tag = Channel::GhostForces.tag(Direction::new(1, 0, 0).unwrap());
        let message = registry.create("forces", tag).unwrap();
        assert_eq!(message.kind(), MessageKind::Forces);
        assert_eq!(message.tag(), tag);
    }

    #[test]
    fn test_alias_and_unknown_id() {
        let mut registry = MessageRegistry::new(Pid(0), Capacities::default());
        assert_eq!(registry.register_alias("totals", MessageKind::Scalar), None);
        let message = registry.create("totals", Tag(191)).unwrap();
        assert!(message.into_scalar().is_some());
        assert!(matches!(
            registry.create("bilayer", Tag(0)),
            Err(MessageError::UnknownMessageId(_))
        ));
        assert_eq!(
            registry.ids(),
            vec!["coordinates", "forces", "relocation", "scalar", "totals"]
        );
    }

    #[test]
    fn test_configured_capacity_applied() {
        let caps = Capacities::default().with(MessageKind::Relocation, MessageCapacity::new(1, 512));
        let registry = MessageRegistry::new(Pid(0), caps);
        assert_eq!(registry.relocation(Tag(96)).capacity().max_elements, 1);
        assert_eq!(registry.relocation(Tag(96)).owner(), Pid(0));
    }
}
