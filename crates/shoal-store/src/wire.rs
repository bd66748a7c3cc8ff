use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{StoreError, StoreResult};
use crate::message::StoreMessage;

/// Default ceiling on a single encoded message.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Frame header: 4-byte big-endian length plus 1-byte type tag.
const HEADER_LEN: usize = 5;

/// Codec for store messages: `[4 bytes len][1 byte tag][bincode payload]`.
///
/// The length covers the tag and the payload.
#[derive(Clone, Copy, Debug)]
pub struct WireCodec {
    max_message_size: usize,
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

impl WireCodec {
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    /// Encode a message with framing.
    pub fn encode(&self, msg: &StoreMessage) -> StoreResult<Bytes> {
        let payload = bincode::serialize(msg).map_err(|e| StoreError::Wire(e.to_string()))?;
        if payload.len() > self.max_message_size {
            return Err(StoreError::MessageTooLarge {
                size: payload.len(),
                max: self.max_message_size,
            });
        }
        let len = u32::try_from(payload.len() + 1).map_err(|_| StoreError::MessageTooLarge {
            size: payload.len(),
            max: self.max_message_size,
        })?;
        let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
        buf.put_u32(len);
        buf.put_u8(msg.type_tag());
        buf.put_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode one framed message. Returns the message and bytes consumed.
    pub fn decode(&self, data: &[u8]) -> StoreResult<(StoreMessage, usize)> {
        if data.len() < HEADER_LEN {
            return Err(StoreError::Framing("too short".into()));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&data[..4]);
        let len = u32::from_be_bytes(len_bytes) as usize;
        if len < 1 {
            return Err(StoreError::Framing("zero-length frame".into()));
        }
        if len - 1 > self.max_message_size {
            return Err(StoreError::MessageTooLarge {
                size: len - 1,
                max: self.max_message_size,
            });
        }
        let total = 4 + len;
        if data.len() < total {
            return Err(StoreError::Framing(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let tag = data[4];
        let msg: StoreMessage = bincode::deserialize(&data[HEADER_LEN..total])
            .map_err(|e| StoreError::Wire(e.to_string()))?;
        if msg.type_tag() != tag {
            return Err(StoreError::Framing(format!(
                "tag {tag} does not match {} payload",
                msg.type_name()
            )));
        }
        Ok((msg, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::*;
    use shoal_types::ObjectId;

    fn commit_request() -> StoreMessage {
        let descriptor = ObjectId::generate();
        StoreMessage::CommitRequest(TxPayload {
            tx: ObjectId::generate(),
            base_versions: vec![(ObjectId::root(), 0)],
            shapes: vec![ShapeAnnouncement {
                descriptor,
                signature: "o#name#".into(),
            }],
            writes: vec![EncodedObject {
                id: ObjectId::root(),
                descriptor,
                version: 0,
                values: vec!["'foo'".into()],
            }],
        })
    }

    #[test]
    fn commit_request_roundtrip() {
        let codec = WireCodec::default();
        let msg = commit_request();
        let encoded = codec.encode(&msg).unwrap();
        let (decoded, consumed) = codec.decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn header_layout() {
        let codec = WireCodec::default();
        let encoded = codec.encode(&StoreMessage::SyncRequest).unwrap();
        let len = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]) as usize;
        assert_eq!(len + 4, encoded.len());
        assert_eq!(encoded[4], 1);
    }

    #[test]
    fn decode_consumes_one_frame() {
        let codec = WireCodec::default();
        let mut stream = codec.encode(&StoreMessage::SyncRequest).unwrap().to_vec();
        let first = stream.len();
        stream.extend_from_slice(&codec.encode(&commit_request()).unwrap());
        let (msg, consumed) = codec.decode(&stream).unwrap();
        assert_eq!(msg, StoreMessage::SyncRequest);
        assert_eq!(consumed, first);
    }

    #[test]
    fn decode_truncated() {
        let codec = WireCodec::default();
        let err = codec.decode(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, StoreError::Framing(_)));

        let encoded = codec.encode(&commit_request()).unwrap();
        let err = codec.decode(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(err, StoreError::Framing(_)));
    }

    #[test]
    fn decode_zero_length() {
        let err = WireCodec::default().decode(&[0u8, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, StoreError::Framing(_)));
    }

    #[test]
    fn decode_rejects_tag_mismatch() {
        let codec = WireCodec::default();
        let mut encoded = codec.encode(&StoreMessage::SyncRequest).unwrap().to_vec();
        encoded[4] = 4;
        let err = codec.decode(&encoded).unwrap_err();
        assert!(matches!(err, StoreError::Framing(_)));
    }

    #[test]
    fn oversized_message_rejected() {
        let codec = WireCodec::new(8);
        let err = codec.encode(&commit_request()).unwrap_err();
        assert!(matches!(err, StoreError::MessageTooLarge { max: 8, .. }));
    }
}
