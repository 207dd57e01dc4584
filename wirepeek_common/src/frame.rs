//! WebSocket frame codec

use crate::constants::BINARY_FRAME_PLACEHOLDER;
use bytes::Bytes;

/// Payload shapes a relay may hand over for one frame
#[derive(Debug, Clone)]
pub enum FramePayload {
    Text(String),
    Binary(Bytes),
    /// Fragmented message, one buffer per continuation frame
    Fragments(Vec<Bytes>),
}

impl FramePayload {
    /// Length of the payload as received (UTF-8 bytes for text)
    pub fn byte_len(&self) -> usize {
        match self {
            FramePayload::Text(text) => text.len(),
            FramePayload::Binary(data) => data.len(),
            FramePayload::Fragments(parts) => parts.iter().map(Bytes::len).sum(),
        }
    }
}

/// Decode a frame for display; binary frames are never interpreted
pub fn decode_frame(payload: &FramePayload, is_binary: bool) -> String {
    if is_binary {
        return BINARY_FRAME_PLACEHOLDER.to_string();
    }

    match payload {
        FramePayload::Text(text) => text.clone(),
        FramePayload::Binary(data) => String::from_utf8_lossy(data).into_owned(),
        FramePayload::Fragments(parts) => {
            let joined: Vec<u8> = parts.iter().flat_map(|part| part.iter().copied()).collect();
            String::from_utf8_lossy(&joined).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_frame_placeholder() {
        let payload = FramePayload::Binary(Bytes::from(vec![7u8; 42]));
        assert_eq!(decode_frame(&payload, true), "◆◇[BINARY_DATA]◇◆");
        assert_eq!(payload.byte_len(), 42);
    }

    #[test]
    fn test_binary_flag_wins_over_text_payload() {
        let payload = FramePayload::Text("looks like text".to_string());
        assert_eq!(decode_frame(&payload, true), BINARY_FRAME_PLACEHOLDER);
        assert_eq!(payload.byte_len(), 15);
    }

    #[test]
    fn test_text_shapes() {
        assert_eq!(decode_frame(&FramePayload::Text("héllo".into()), false), "héllo");
        assert_eq!(FramePayload::Text("héllo".into()).byte_len(), 6);

        let bytes = FramePayload::Binary(Bytes::from_static(b"{\"op\":1}"));
        assert_eq!(decode_frame(&bytes, false), "{\"op\":1}");

        let fragments = FramePayload::Fragments(vec![
            Bytes::from_static(b"hel"),
            Bytes::from_static(b"lo"),
        ]);
        assert_eq!(decode_frame(&fragments, false), "hello");
        assert_eq!(fragments.byte_len(), 5);
    }
}
