use super::{MessageKind, Payload};
use crate::codec::{ensure, get_dvec3, get_len, put_dvec3};
use crate::{CodecError, ValidationContext, ValidationError};
use bytes::{Buf, BufMut, BytesMut};
use meso_types::{Bead, BeadId, BeadKind, Bond, Polymer, PolymerId};
use std::collections::HashSet;

const BEAD_LEN: usize = 8 + 4 + 4 * 24 + 1 + 8;
const POLYMER_HEAD_LEN: usize = 8 + 4;
const BOND_LEN: usize = 8 + 8 + 8 + 8;

/// Beads handed to a new owner, positions already in the receiver's frame.
///
/// Each polymer touched by a departing bead travels as one full record so the
/// receiver can decide whether the polymer is now complete locally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelocationBundle {
    pub beads: Vec<Bead>,
    pub polymers: Vec<Polymer>,
}

impl RelocationBundle {
    /// Append a bead.
    pub fn push_bead(&mut self, bead: Bead) {
        self.beads.push(bead);
    }

    /// Append a polymer record unless one with the same id is present.
    pub fn push_polymer(&mut self, polymer: &Polymer) {
        if !self.polymers.iter().any(|p| p.id == polymer.id) {
            self.polymers.push(polymer.clone());
        }
    }

    /// Whether the bundle already carries `polymer`.
    pub fn has_polymer(&self, polymer: PolymerId) -> bool {
        self.polymers.iter().any(|p| p.id == polymer)
    }
}

impl Payload for RelocationBundle {
    const KIND: MessageKind = MessageKind::Relocation;

    fn len(&self) -> usize {
        self.beads.len()
    }

    fn clear(&mut self) {
        self.beads.clear();
        self.polymers.clear();
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.beads.len() * BEAD_LEN);
        for bead in &self.beads {
            buf.put_u64_le(bead.id.0);
            buf.put_u32_le(bead.kind.0);
            put_dvec3(buf, bead.position);
            put_dvec3(buf, bead.unwrapped);
            put_dvec3(buf, bead.velocity);
            put_dvec3(buf, bead.force);
            match bead.polymer {
                Some(polymer) => {
                    buf.put_u8(1);
                    buf.put_u64_le(polymer.0);
                }
                None => {
                    buf.put_u8(0);
                    buf.put_u64_le(0);
                }
            }
        }

        buf.put_u32_le(self.polymers.len() as u32);
        for polymer in &self.polymers {
            buf.put_u64_le(polymer.id.0);
            buf.put_u32_le(polymer.kind);
            buf.put_u32_le(polymer.members.len() as u32);
            for member in &polymer.members {
                buf.put_u64_le(member.0);
            }
            buf.put_u32_le(polymer.bonds.len() as u32);
            for bond in &polymer.bonds {
                buf.put_u64_le(bond.head.0);
                buf.put_u64_le(bond.tail.0);
                buf.put_f64_le(bond.spring);
                buf.put_f64_le(bond.rest_length);
            }
        }
    }

    fn decode(count: usize, buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, count.saturating_mul(BEAD_LEN), "beads")?;
        let mut beads = Vec::with_capacity(count);
        for _ in 0..count {
            let id = BeadId(buf.get_u64_le());
            let kind = BeadKind(buf.get_u32_le());
            let position = get_dvec3(buf);
            let unwrapped = get_dvec3(buf);
            let velocity = get_dvec3(buf);
            let force = get_dvec3(buf);
            let has_polymer = buf.get_u8() != 0;
            let polymer_id = PolymerId(buf.get_u64_le());
            beads.push(Bead {
                id,
                kind,
                position,
                unwrapped,
                velocity,
                force,
                polymer: has_polymer.then_some(polymer_id),
            });
        }

        let polymer_count = get_len(buf, "polymer count")?;
        let mut polymers = Vec::new();
        for _ in 0..polymer_count {
            ensure(buf, POLYMER_HEAD_LEN, "polymer")?;
            let id = PolymerId(buf.get_u64_le());
            let kind = buf.get_u32_le();

            let member_count = get_len(buf, "member count")?;
            ensure(buf, member_count.saturating_mul(8), "members")?;
            let members = (0..member_count).map(|_| BeadId(buf.get_u64_le())).collect();

            let bond_count = get_len(buf, "bond count")?;
            ensure(buf, bond_count.saturating_mul(BOND_LEN), "bonds")?;
            let bonds = (0..bond_count)
                .map(|_| {
                    let head = BeadId(buf.get_u64_le());
                    let tail = BeadId(buf.get_u64_le());
                    let spring = buf.get_f64_le();
                    let rest_length = buf.get_f64_le();
                    Bond::new(head, tail, spring, rest_length)
                })
                .collect();

            polymers.push(Polymer {
                id,
                kind,
                members,
                bonds,
            });
        }

        Ok(Self { beads, polymers })
    }

    fn validate(&self, ctx: &ValidationContext) -> Result<(), ValidationError> {
        let carried: HashSet<PolymerId> = self.polymers.iter().map(|p| p.id).collect();
        for (index, bead) in self.beads.iter().enumerate() {
            if !bead.id.is_valid() {
                return Err(ValidationError::InvalidId {
                    kind: Self::KIND,
                    index,
                });
            }
            ctx.check_position(Self::KIND, "positions", index, bead.position)?;
            ctx.check_finite(Self::KIND, "unwrapped", index, bead.unwrapped)?;
            ctx.check_finite(Self::KIND, "velocities", index, bead.velocity)?;
            ctx.check_finite(Self::KIND, "forces", index, bead.force)?;
            if let Some(polymer) = bead.polymer {
                if !carried.contains(&polymer) {
                    return Err(ValidationError::MissingPolymer {
                        bead: bead.id,
                        polymer,
                    });
                }
            }
        }
        for (index, polymer) in self.polymers.iter().enumerate() {
            if polymer.members.iter().any(|m| !m.is_valid()) {
                return Err(ValidationError::InvalidId {
                    kind: Self::KIND,
                    index,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use meso_types::Pid;

    fn chain_bundle() -> RelocationBundle {
        let polymer = Polymer::chain(PolymerId(3), 1, vec![BeadId(10), BeadId(11)], 50.0, 0.5);
        let mut bundle = RelocationBundle::default();
        bundle.push_bead(
            Bead::new(BeadId(10), BeadKind(1), DVec3::new(0.1, 2.0, 3.0))
                .with_velocity(DVec3::X)
                .with_polymer(PolymerId(3)),
        );
        bundle.push_bead(Bead::new(BeadId(12), BeadKind(0), DVec3::splat(1.0)));
        bundle.push_polymer(&polymer);
        bundle.push_polymer(&polymer);
        bundle
    }

    #[test]
    fn test_decode_restores_beads_and_polymers() {
        let bundle = chain_bundle();
        assert_eq!(bundle.polymers.len(), 1);

        let mut buf = BytesMut::new();
        bundle.encode(&mut buf);
        let mut slice: &[u8] = &buf;
        let decoded = RelocationBundle::decode(bundle.len(), &mut slice).unwrap();
        assert!(slice.is_empty());
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn test_truncated_polymer_section() {
        let bundle = chain_bundle();
        let mut buf = BytesMut::new();
        bundle.encode(&mut buf);
        let cut = &buf[..buf.len() - 4];
        let mut slice: &[u8] = cut;
        assert!(matches!(
            RelocationBundle::decode(bundle.len(), &mut slice),
            Err(CodecError::Truncated { field: "bonds", .. })
        ));
    }

    #[test]
    fn test_member_without_record_fails_validation() {
        let mut bundle = chain_bundle();
        bundle.polymers.clear();
        let ctx = ValidationContext::new(Pid(1), 2);
        assert_eq!(
            bundle.validate(&ctx),
            Err(ValidationError::MissingPolymer {
                bead: BeadId(10),
                polymer: PolymerId(3)
            })
        );
    }
}
