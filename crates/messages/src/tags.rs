//! Tag scheme.
//!
//! A tag is `channel * 32 + slot`. Directional channels use the direction's
//! dense index (`0..26`) as the slot; control channels use slot 31. Both the
//! sender toward direction `D` and the receiver expecting traffic labelled `D`
//! compute the same tag, and no two (channel, direction) pairs share one.

use meso_types::{Direction, Tag, DIRECTION_COUNT};
use std::fmt;

const SLOTS_PER_CHANNEL: u32 = 32;
const CONTROL_SLOT: u32 = 31;

/// Message channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Read-only ghost copies for force computation.
    GhostCoordinates,
    /// Forces computed on ghosts, returned to their owners.
    GhostForces,
    /// Beads changing owner.
    Relocation,
    /// Neighbour-discovery handshake and verdict.
    Handshake,
    /// Global bead totals.
    Totals,
}

impl Channel {
    /// Every channel, in numeric order.
    pub const ALL: [Channel; 5] = [
        Channel::GhostCoordinates,
        Channel::GhostForces,
        Channel::Relocation,
        Channel::Handshake,
        Channel::Totals,
    ];

    fn number(self) -> u32 {
        match self {
            Channel::GhostCoordinates => 1,
            Channel::GhostForces => 2,
            Channel::Relocation => 3,
            Channel::Handshake => 4,
            Channel::Totals => 5,
        }
    }

    /// Whether the channel carries one stream per direction.
    pub fn is_directional(self) -> bool {
        matches!(
            self,
            Channel::GhostCoordinates | Channel::GhostForces | Channel::Relocation
        )
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Channel::GhostCoordinates => "ghost-coordinates",
            Channel::GhostForces => "ghost-forces",
            Channel::Relocation => "relocation",
            Channel::Handshake => "handshake",
            Channel::Totals => "totals",
        }
    }

    /// Tag of this channel's stream labelled `direction`.
    pub fn tag(self, direction: Direction) -> Tag {
        Tag(self.number() * SLOTS_PER_CHANNEL + direction.index() as u32)
    }

    /// Tag of this channel's single control stream.
    pub fn control_tag(self) -> Tag {
        Tag(self.number() * SLOTS_PER_CHANNEL + CONTROL_SLOT)
    }

    /// Decode a tag into its channel and, for directional slots, direction.
    pub fn classify(tag: Tag) -> Option<(Channel, Option<Direction>)> {
        let number = tag.0 / SLOTS_PER_CHANNEL;
        let slot = tag.0 % SLOTS_PER_CHANNEL;
        let channel = Channel::ALL.into_iter().find(|c| c.number() == number)?;
        if slot == CONTROL_SLOT {
            return Some((channel, None));
        }
        if !channel.is_directional() || slot as usize >= DIRECTION_COUNT {
            return None;
        }
        Direction::from_index(slot as usize).map(|d| (channel, Some(d)))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
