use super::{check_parallel, MessageKind, Payload};
use crate::codec::{ensure, get_dvec3, put_dvec3};
use crate::{CodecError, ValidationContext, ValidationError};
use bytes::{Buf, BufMut, BytesMut};
use glam::DVec3;
use meso_types::{BeadId, BeadKind};

const ELEMENT_LEN: usize = 8 + 4 + 24 + 24;

/// Ghost copies of boundary beads, in the sender's local frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateBundle {
    pub ids: Vec<BeadId>,
    pub kinds: Vec<BeadKind>,
    pub positions: Vec<DVec3>,
    pub velocities: Vec<DVec3>,
}

impl CoordinateBundle {
    /// Append one bead.
    pub fn push(&mut self, id: BeadId, kind: BeadKind, position: DVec3, velocity: DVec3) {
        self.ids.push(id);
        self.kinds.push(kind);
        self.positions.push(position);
        self.velocities.push(velocity);
    }

    /// Iterate over `(id, kind, position, velocity)`.
    pub fn iter(&self) -> impl Iterator<Item = (BeadId, BeadKind, DVec3, DVec3)> + '_ {
        self.ids
            .iter()
            .zip(&self.kinds)
            .zip(&self.positions)
            .zip(&self.velocities)
            .map(|(((id, kind), pos), vel)| (*id, *kind, *pos, *vel))
    }
}

impl Payload for CoordinateBundle {
    const KIND: MessageKind = MessageKind::Coordinates;

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn clear(&mut self) {
        self.ids.clear();
        self.kinds.clear();
        self.positions.clear();
        self.velocities.clear();
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.len() * ELEMENT_LEN);
        for (id, kind, position, velocity) in self.iter() {
            buf.put_u64_le(id.0);
            buf.put_u32_le(kind.0);
            put_dvec3(buf, position);
            put_dvec3(buf, velocity);
        }
    }

    fn decode(count: usize, buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, count.saturating_mul(ELEMENT_LEN), "coordinates")?;
        let mut bundle = Self {
            ids: Vec::with_capacity(count),
            kinds: Vec::with_capacity(count),
            positions: Vec::with_capacity(count),
            velocities: Vec::with_capacity(count),
        };
        for _ in 0..count {
            let id = BeadId(buf.get_u64_le());
            let kind = BeadKind(buf.get_u32_le());
            let position = get_dvec3(buf);
            let velocity = get_dvec3(buf);
            bundle.push(id, kind, position, velocity);
        }
        Ok(bundle)
    }

    fn validate(&self, ctx: &ValidationContext) -> Result<(), ValidationError> {
        let n = self.ids.len();
        check_parallel(Self::KIND, "kinds", n, self.kinds.len())?;
        check_parallel(Self::KIND, "positions", n, self.positions.len())?;
        check_parallel(Self::KIND, "velocities", n, self.velocities.len())?;
        for (index, (id, _, position, velocity)) in self.iter().enumerate() {
            if !id.is_valid() {
                return Err(ValidationError::InvalidId {
                    kind: Self::KIND,
                    index,
                });
            }
            ctx.check_position(Self::KIND, "positions", index, position)?;
            ctx.check_finite(Self::KIND, "velocities", index, velocity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meso_types::Pid;

    #[test]
    fn test_decode_restores_fields() {
        let mut bundle = CoordinateBundle::default();
        bundle.push(BeadId(4), BeadKind(1), DVec3::new(0.5, 1.5, 2.5), DVec3::X);
        bundle.push(BeadId(9), BeadKind(2), DVec3::splat(9.0), DVec3::NEG_Z);

        let mut buf = BytesMut::new();
        bundle.encode(&mut buf);
        assert_eq!(buf.len(), 2 * ELEMENT_LEN);

        let mut slice: &[u8] = &buf;
        let decoded = CoordinateBundle::decode(2, &mut slice).unwrap();
        assert_eq!(decoded, bundle);
        assert!(slice.is_empty());
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let mut slice: &[u8] = &[0; ELEMENT_LEN];
        assert!(matches!(
            CoordinateBundle::decode(2, &mut slice),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_validate_catches_ragged_arrays() {
        let mut bundle = CoordinateBundle::default();
        bundle.push(BeadId(1), BeadKind(0), DVec3::ONE, DVec3::ZERO);
        bundle.velocities.pop();
        let ctx = ValidationContext::new(Pid(0), 2);
        assert!(matches!(
            bundle.validate(&ctx),
            Err(ValidationError::LengthMismatch { field: "velocities", .. })
        ));
    }

    #[test]
    fn test_validate_catches_invalid_id_and_frame() {
        let ctx = ValidationContext::new(Pid(0), 2).with_extent(DVec3::splat(5.0));
        let mut bundle = CoordinateBundle::default();
        bundle.push(BeadId::INVALID, BeadKind(0), DVec3::ONE, DVec3::ZERO);
        assert!(matches!(
            bundle.validate(&ctx),
            Err(ValidationError::InvalidId { index: 0, .. })
        ));

        bundle.clear();
        bundle.push(BeadId(2), BeadKind(0), DVec3::new(1.0, 1.0, 5.0), DVec3::ZERO);
        assert!(matches!(
            bundle.validate(&ctx),
            Err(ValidationError::OutOfFrame { axis: 2, .. })
        ));
    }
}
