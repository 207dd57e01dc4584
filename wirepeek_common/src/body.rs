//! Body codec: turns a captured HTTP body into display text
//!
//! Decoding never fails outward. Bodies that cannot be shown as text degrade
//! to a placeholder that still tells the viewer how many bytes were seen.

use crate::headers::HeaderBag;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use std::io::Read;
use thiserror::Error;

/// Content types whose bodies are decoded as text
const TEXT_CONTENT_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/javascript",
    "application/x-javascript",
    "application/x-www-form-urlencoded",
];

/// Read buffer size for the brotli decoder
const BROTLI_BUFFER_SIZE: usize = 4096;

/// Decoding errors, recovered into placeholders before leaving this module
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to decompress {encoding} body: {source}")]
    Decompress {
        encoding: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// A captured body as handed over by the forwarder
#[derive(Debug, Clone, Copy)]
pub enum CapturedBody<'a> {
    /// Already textual (kept verbatim)
    Text(&'a str),
    /// Raw bytes as they crossed the wire
    Bytes(&'a [u8]),
}

/// Placeholder for bodies classified as binary
pub fn binary_placeholder(len: usize) -> String {
    format!("◆◇[BINARY_DATA:{}bytes]◇◆", len)
}

/// Placeholder for bodies whose decompression failed
pub fn decompress_failed_placeholder(len: usize) -> String {
    format!("[压缩数据解压失败] ({} bytes)", len)
}

/// Placeholder for JSON-typed bodies that do not parse
pub fn invalid_json_placeholder(len: usize) -> String {
    format!("[invalid JSON] ({} bytes)", len)
}

/// Decode a body for display using its Content-Type and Content-Encoding
pub fn decode_body(body: Option<CapturedBody<'_>>, headers: &HeaderBag) -> Option<String> {
    let bytes = match body? {
        CapturedBody::Text(text) if text.is_empty() => return None,
        CapturedBody::Text(text) => return Some(text.to_string()),
        CapturedBody::Bytes(bytes) if bytes.is_empty() => return None,
        CapturedBody::Bytes(bytes) => bytes,
    };

    let content_type = headers
        .get_str("content-type")
        .unwrap_or_default()
        .to_ascii_lowercase();

    // Opaque payloads are never decompressed
    if !is_text_content_type(&content_type) {
        return Some(binary_placeholder(bytes.len()));
    }

    let encoding = headers.get_str("content-encoding").unwrap_or_default();
    let Ok(decoded) = decompress(bytes, &encoding) else {
        return Some(decompress_failed_placeholder(bytes.len()));
    };

    let text = String::from_utf8_lossy(&decoded).into_owned();

    if content_type.contains("application/json")
        && serde_json::from_str::<serde::de::IgnoredAny>(&text).is_err()
    {
        return Some(invalid_json_placeholder(decoded.len()));
    }

    Some(text)
}

/// Check whether a lowercased Content-Type is decoded as text
pub fn is_text_content_type(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || TEXT_CONTENT_TYPES
            .iter()
            .any(|candidate| content_type.contains(candidate))
}

/// Undo a Content-Encoding header value (codings are applied in listed order)
pub fn decompress(input: &[u8], content_encoding: &str) -> Result<Vec<u8>, CodecError> {
    let mut data = input.to_vec();
    for coding in content_encoding.rsplit(',') {
        data = match coding.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => gzip_decompress(&data)?,
            "deflate" => deflate_decompress(&data)?,
            "br" => brotli_decompress(&data)?,
            _ => data,
        };
    }
    Ok(data)
}

pub fn gzip_decompress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = GzDecoder::new(input);
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|source| CodecError::Decompress {
            encoding: "gzip",
            source,
        })?;
    Ok(output)
}

/// HTTP deflate is zlib-wrapped, but some servers send raw deflate streams
pub fn deflate_decompress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::new();
    if ZlibDecoder::new(input).read_to_end(&mut output).is_ok() {
        return Ok(output);
    }

    output.clear();
    DeflateDecoder::new(input)
        .read_to_end(&mut output)
        .map_err(|source| CodecError::Decompress {
            encoding: "deflate",
            source,
        })?;
    Ok(output)
}

pub fn brotli_decompress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = brotli::Decompressor::new(input, BROTLI_BUFFER_SIZE);
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|source| CodecError::Decompress {
            encoding: "br",
            source,
        })?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    fn headers(pairs: &[(&str, &str)]) -> HeaderBag {
        HeaderBag::from_pairs(pairs.iter().copied())
    }

    fn gzip(input: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(input).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_absent_and_empty_bodies() {
        let h = headers(&[("content-type", "application/json")]);
        assert_eq!(decode_body(None, &h), None);
        assert_eq!(decode_body(Some(CapturedBody::Bytes(b"")), &h), None);
        assert_eq!(decode_body(Some(CapturedBody::Text("")), &h), None);
    }

    #[test]
    fn test_text_body_is_verbatim() {
        let h = headers(&[("content-type", "image/png")]);
        assert_eq!(
            decode_body(Some(CapturedBody::Text("already text")), &h).as_deref(),
            Some("already text")
        );
    }

    #[test]
    fn test_json_is_not_reformatted() {
        let h = headers(&[("content-type", "application/json")]);
        assert_eq!(
            decode_body(Some(CapturedBody::Bytes(b"{\"a\":1}")), &h).as_deref(),
            Some("{\"a\":1}")
        );
    }

    #[test]
    fn test_binary_type_skips_decompression() {
        // Corrupt gzip would fail if decompression were attempted
        let h = headers(&[("Content-Type", "image/png"), ("Content-Encoding", "gzip")]);
        let body = [0x1f, 0x8b, 0xde, 0xad, 0xbe, 0xef];
        assert_eq!(
            decode_body(Some(CapturedBody::Bytes(&body)), &h).as_deref(),
            Some("◆◇[BINARY_DATA:6bytes]◇◆")
        );
    }

    #[test]
    fn test_missing_content_type_is_binary() {
        let h = HeaderBag::new();
        assert_eq!(
            decode_body(Some(CapturedBody::Bytes(b"abc")), &h).as_deref(),
            Some("◆◇[BINARY_DATA:3bytes]◇◆")
        );
    }

    #[test]
    fn test_gzip_json_body() {
        let h = headers(&[
            ("content-type", "application/json; charset=utf-8"),
            ("content-encoding", "gzip"),
        ]);
        let body = gzip(br#"{"user":"alice"}"#);
        assert_eq!(
            decode_body(Some(CapturedBody::Bytes(&body)), &h).as_deref(),
            Some(r#"{"user":"alice"}"#)
        );
    }

    #[test]
    fn test_deflate_accepts_zlib_and_raw() {
        let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
        zlib.write_all(b"hello zlib").unwrap();
        assert_eq!(deflate_decompress(&zlib.finish().unwrap()).unwrap(), b"hello zlib");

        let mut raw = flate2::write::DeflateEncoder::new(Vec::new(), Compression::default());
        raw.write_all(b"hello raw").unwrap();
        assert_eq!(deflate_decompress(&raw.finish().unwrap()).unwrap(), b"hello raw");
    }

    #[test]
    fn test_brotli_body() {
        let mut compressed = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(b"<p>brotli</p>").unwrap();
        }
        let h = headers(&[("content-type", "text/html"), ("content-encoding", "br")]);
        assert_eq!(
            decode_body(Some(CapturedBody::Bytes(&compressed)), &h).as_deref(),
            Some("<p>brotli</p>")
        );
    }

    #[test]
    fn test_corrupt_compression_placeholder() {
        let h = headers(&[("content-type", "text/plain"), ("content-encoding", "gzip")]);
        let body = b"definitely not gzip";
        assert_eq!(
            decode_body(Some(CapturedBody::Bytes(body)), &h).as_deref(),
            Some("[压缩数据解压失败] (19 bytes)")
        );
    }

    #[test]
    fn test_invalid_json_placeholder() {
        let h = headers(&[("content-type", "application/json")]);
        assert_eq!(
            decode_body(Some(CapturedBody::Bytes(b"{oops")), &h).as_deref(),
            Some("[invalid JSON] (5 bytes)")
        );
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let h = headers(&[("content-type", "text/plain")]);
        let decoded = decode_body(Some(CapturedBody::Bytes(&[b'o', b'k', 0xff])), &h).unwrap();
        assert_eq!(decoded, "ok\u{fffd}");
    }

    #[test]
    fn test_text_content_types() {
        assert!(is_text_content_type("text/html; charset=utf-8"));
        assert!(is_text_content_type("application/x-www-form-urlencoded"));
        assert!(is_text_content_type("application/xml"));
        assert!(!is_text_content_type("application/octet-stream"));
        assert!(!is_text_content_type(""));
    }
}
