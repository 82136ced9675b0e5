use super::{check_parallel, MessageKind, Payload};
use crate::codec::{ensure, get_dvec3, put_dvec3};
use crate::{CodecError, ValidationContext, ValidationError};
use bytes::{Buf, BufMut, BytesMut};
use glam::DVec3;
use meso_types::BeadId;

const ELEMENT_LEN: usize = 8 + 24;

/// Force contributions on remote beads, keyed by id.
///
/// The receiver accumulates each entry into the bead with that id; order is
/// not meaningful.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForceBundle {
    pub ids: Vec<BeadId>,
    pub forces: Vec<DVec3>,
}

impl ForceBundle {
    /// Append one contribution.
    pub fn push(&mut self, id: BeadId, force: DVec3) {
        self.ids.push(id);
        self.forces.push(force);
    }

    /// Iterate over `(id, force)`.
    pub fn iter(&self) -> impl Iterator<Item = (BeadId, DVec3)> + '_ {
        self.ids.iter().copied().zip(self.forces.iter().copied())
    }
}

impl Payload for ForceBundle {
    const KIND: MessageKind = MessageKind::Forces;

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn clear(&mut self) {
        self.ids.clear();
        self.forces.clear();
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.len() * ELEMENT_LEN);
        for (id, force) in self.iter() {
            buf.put_u64_le(id.0);
            put_dvec3(buf, force);
        }
    }

    fn decode(count: usize, buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, count.saturating_mul(ELEMENT_LEN), "forces")?;
        let mut bundle = Self {
            ids: Vec::with_capacity(count),
            forces: Vec::with_capacity(count),
        };
        for _ in 0..count {
            let id = BeadId(buf.get_u64_le());
            bundle.push(id, get_dvec3(buf));
        }
        Ok(bundle)
    }

    fn validate(&self, ctx: &ValidationContext) -> Result<(), ValidationError> {
        check_parallel(Self::KIND, "forces", self.ids.len(), self.forces.len())?;
        for (index, (id, force)) in self.iter().enumerate() {
            if !id.is_valid() {
                return Err(ValidationError::InvalidId {
                    kind: Self::KIND,
                    index,
                });
            }
            ctx.check_finite(Self::KIND, "forces", index, force)?;
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
        let mut bundle = ForceBundle::default();
        bundle.push(BeadId(1), DVec3::new(-1.0, 0.25, 3.0));
        let mut buf = BytesMut::new();
        bundle.encode(&mut buf);
        let mut slice: &[u8] = &buf;
        assert_eq!(ForceBundle::decode(1, &mut slice).unwrap(), bundle);
    }

    #[test]
    fn test_validate_rejects_nan_force() {
        let mut bundle = ForceBundle::default();
        bundle.push(BeadId(1), DVec3::new(f64::NAN, 0.0, 0.0));
        let ctx = ValidationContext::new(Pid(0), 2);
        assert!(matches!(
            bundle.validate(&ctx),
            Err(ValidationError::NonFinite { field: "forces", .. })
        ));
    }
}
