use super::{MessageKind, Payload};
use crate::codec::{ensure, get_len};
use crate::{CodecError, ValidationContext, ValidationError};
use bytes::{Buf, BufMut, BytesMut};

/// Small vectors of integers and floats for coordination traffic.
///
/// The element count is `counts.len() + values.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarAggregate {
    pub counts: Vec<u64>,
    pub values: Vec<f64>,
}

impl ScalarAggregate {
    /// Aggregate holding only integer counts.
    pub fn from_counts(counts: Vec<u64>) -> Self {
        Self {
            counts,
            values: Vec::new(),
        }
    }
}

impl Payload for ScalarAggregate {
    const KIND: MessageKind = MessageKind::Scalar;

    fn len(&self) -> usize {
        self.counts.len() + self.values.len()
    }

    fn clear(&mut self) {
        self.counts.clear();
        self.values.clear();
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.counts.len() as u32);
        for count in &self.counts {
            buf.put_u64_le(*count);
        }
        for value in &self.values {
            buf.put_f64_le(*value);
        }
    }

    fn decode(count: usize, buf: &mut &[u8]) -> Result<Self, CodecError> {
        let count_len = get_len(buf, "count length")?;
        if count_len > count {
            return Err(CodecError::TooManyElements {
                count: count_len,
                max: count,
            });
        }
        ensure(buf, count.saturating_mul(8), "scalars")?;
        let counts = (0..count_len).map(|_| buf.get_u64_le()).collect();
        let values = (count_len..count).map(|_| buf.get_f64_le()).collect();
        Ok(Self { counts, values })
    }

    fn validate(&self, _ctx: &ValidationContext) -> Result<(), ValidationError> {
        match self.values.iter().position(|v| !v.is_finite()) {
            Some(index) => Err(ValidationError::NonFinite {
                kind: Self::KIND,
                field: "values",
                index,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_values_split_back() {
        let aggregate = ScalarAggregate {
            counts: vec![1, 2, 3],
            values: vec![0.5],
        };
        let mut buf = BytesMut::new();
        aggregate.encode(&mut buf);
        let mut slice: &[u8] = &buf;
        assert_eq!(ScalarAggregate::decode(4, &mut slice).unwrap(), aggregate);
    }

    #[test]
    fn test_count_length_beyond_header_rejected() {
        let aggregate = ScalarAggregate::from_counts(vec![1, 2, 3]);
        let mut buf = BytesMut::new();
        aggregate.encode(&mut buf);
        let mut slice: &[u8] = &buf;
        assert!(matches!(
            ScalarAggregate::decode(2, &mut slice),
            Err(CodecError::TooManyElements { count: 3, max: 2 })
        ));
    }
}
