//! zstd + base64 codec for compressed message bodies.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chatsync_core::conversation::Decompressor;
use chatsync_core::error::{ChatError, Result};

const COMPRESSION_LEVEL: i32 = 3;

/// Stores bodies as base64-encoded zstd frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdBase64Codec;

impl ZstdBase64Codec {
    pub fn new() -> Self {
        Self
    }

    /// Compresses `text` into the stored representation.
    pub fn compress(&self, text: &str) -> Result<String> {
        let compressed = zstd::encode_all(text.as_bytes(), COMPRESSION_LEVEL)
            .map_err(|e| ChatError::internal(format!("zstd compression failed: {e}")))?;
        Ok(BASE64_STANDARD.encode(compressed))
    }
}

impl Decompressor for ZstdBase64Codec {
    fn decompress(&self, compressed: &str) -> Result<String> {
        let bytes = BASE64_STANDARD
            .decode(compressed.trim())
            .map_err(|e| ChatError::MalformedData(format!("invalid base64: {e}")))?;
        let plain = zstd::decode_all(&bytes[..])
            .map_err(|e| ChatError::MalformedData(format!("invalid zstd frame: {e}")))?;
        String::from_utf8(plain)
            .map_err(|e| ChatError::MalformedData(format!("decompressed text is not UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_core::conversation::MessageNormalizer;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_normalizer_decompresses_stored_body() {
        let codec = ZstdBase64Codec::new();
        let stored = codec.compress("a long answer about ownership").unwrap();
        let normalizer = MessageNormalizer::with_decompressor(Arc::new(codec));

        let messages =
            normalizer.normalize(&[json!({"id": "m", "text": stored, "compressed": true})]);

        assert_eq!(messages[0].text, "a long answer about ownership");
        assert_eq!(messages[0].original_compressed_text.as_deref(), Some(stored.as_str()));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = ZstdBase64Codec::new().decompress("not base64 at all!").unwrap_err();
        assert!(matches!(err, ChatError::MalformedData(_)));

        let not_zstd = BASE64_STANDARD.encode(b"plain bytes");
        assert!(ZstdBase64Codec::new().decompress(&not_zstd).is_err());
    }
}
