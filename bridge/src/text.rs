//! UTF-8 text codec used at the guest/host boundary.
//!
//! Only UTF-8 crosses the boundary. `TextDecoder` accepts the UTF-8 label
//! family and rejects everything else at construction time. Streaming
//! decode and `encode_into` are not supported and fail fast.

use crate::error::{BridgeError, BridgeResult};

/// Labels accepted by [`TextDecoder::new`], after trimming and lowercasing.
pub const UTF8_LABELS: &[&str] = &[
    "utf-8",
    "utf8",
    "unicode-1-1-utf-8",
    "unicode11utf8",
    "unicode20utf8",
    "x-unicode20utf8",
];

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Options fixed at decoder construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Fail on malformed input instead of substituting U+FFFD.
    pub fatal: bool,
    /// Keep a leading byte order mark in the output.
    pub ignore_bom: bool,
}

/// Per-call decode options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Incremental decode. Always rejected.
    pub stream: bool,
}

/// UTF-8 only decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextDecoder {
    options: DecoderOptions,
}

impl TextDecoder {
    /// Build a decoder for `label`.
    ///
    /// Returns `UnsupportedEncoding` for any label outside [`UTF8_LABELS`].
    pub fn new(label: &str, options: DecoderOptions) -> BridgeResult<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        if !UTF8_LABELS.contains(&normalized.as_str()) {
            return Err(BridgeError::UnsupportedEncoding {
                label: label.to_string(),
            });
        }
        Ok(Self { options })
    }

    /// A decoder that fails on malformed input.
    pub fn fatal() -> Self {
        Self {
            options: DecoderOptions {
                fatal: true,
                ..DecoderOptions::default()
            },
        }
    }

    /// A replacement-mode decoder that leaves a leading BOM in place.
    pub fn keeping_bom() -> Self {
        Self {
            options: DecoderOptions {
                ignore_bom: true,
                ..DecoderOptions::default()
            },
        }
    }

    /// Always `"utf-8"`, whatever alias the decoder was built with.
    pub fn encoding(&self) -> &'static str {
        "utf-8"
    }

    pub fn is_fatal(&self) -> bool {
        self.options.fatal
    }

    pub fn ignore_bom(&self) -> bool {
        self.options.ignore_bom
    }

    /// Decode `input` to a string. `None` decodes to the empty string.
    pub fn decode(&self, input: Option<&[u8]>, options: DecodeOptions) -> BridgeResult<String> {
        if options.stream {
            return Err(BridgeError::UnsupportedOperation("streaming decode"));
        }
        let Some(mut bytes) = input else {
            return Ok(String::new());
        };
        if !self.options.ignore_bom {
            bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
        }
        if self.options.fatal {
            std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| BridgeError::MalformedInput {
                    valid_up_to: e.valid_up_to(),
                })
        } else {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }

    /// Decode a complete buffer with default per-call options.
    pub fn decode_bytes(&self, input: &[u8]) -> BridgeResult<String> {
        self.decode(Some(input), DecodeOptions::default())
    }
}

/// UTF-8 encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextEncoder;

impl TextEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encoding(&self) -> &'static str {
        "utf-8"
    }

    pub fn encode(&self, input: &str) -> Vec<u8> {
        input.as_bytes().to_vec()
    }

    /// Not supported; always fails.
    pub fn encode_into(&self, _source: &str, _destination: &mut [u8]) -> BridgeResult<usize> {
        Err(BridgeError::UnsupportedOperation("encode_into"))
    }
}

/// Strict UTF-8 validation of raw bytes.
pub fn validate_utf8(bytes: &[u8]) -> BridgeResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| BridgeError::MalformedInput {
        valid_up_to: e.valid_up_to(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_utf8_aliases() {
        for label in UTF8_LABELS {
            let decoder = TextDecoder::new(label, DecoderOptions::default()).unwrap();
            assert_eq!(decoder.encoding(), "utf-8");
        }
        assert!(TextDecoder::new("  UTF-8 ", DecoderOptions::default()).is_ok());
        assert!(TextDecoder::new("Unicode20UTF8", DecoderOptions::default()).is_ok());
    }

    #[test]
    fn test_rejects_other_labels() {
        for label in ["utf-16", "latin1", "ascii", ""] {
            match TextDecoder::new(label, DecoderOptions::default()) {
                Err(BridgeError::UnsupportedEncoding { label: l }) => assert_eq!(l, label),
                other => panic!("expected UnsupportedEncoding for {label:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_decode_none_is_empty() {
        let decoder = TextDecoder::default();
        assert_eq!(decoder.decode(None, DecodeOptions::default()).unwrap(), "");
    }

    #[test]
    fn test_streaming_rejected() {
        let decoder = TextDecoder::default();
        let err = decoder
            .decode(Some(b"abc"), DecodeOptions { stream: true })
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_replacement_mode() {
        let decoder = TextDecoder::default();
        let out = decoder.decode_bytes(&[b'a', 0xff, b'b']).unwrap();
        assert_eq!(out, "a\u{FFFD}b");
    }

    #[test]
    fn test_fatal_mode() {
        let decoder = TextDecoder::fatal();
        assert!(decoder.is_fatal());
        match decoder.decode_bytes(&[b'a', b'b', 0xc3]) {
            Err(BridgeError::MalformedInput { valid_up_to }) => assert_eq!(valid_up_to, 2),
            other => panic!("expected MalformedInput, got {other:?}"),
        }
        assert_eq!(decoder.decode_bytes("héllo".as_bytes()).unwrap(), "héllo");
    }

    #[test]
    fn test_bom_handling() {
        let input = [0xEF, 0xBB, 0xBF, b'h', b'i'];
        let stripped = TextDecoder::default().decode_bytes(&input).unwrap();
        assert_eq!(stripped, "hi");

        let keep = TextDecoder::new(
            "utf-8",
            DecoderOptions {
                ignore_bom: true,
                ..DecoderOptions::default()
            },
        )
        .unwrap();
        assert_eq!(keep.decode_bytes(&input).unwrap(), "\u{FEFF}hi");
    }

    #[test]
    fn test_encoder() {
        let encoder = TextEncoder::new();
        assert_eq!(encoder.encoding(), "utf-8");
        assert_eq!(encoder.encode("ü"), vec![0xC3, 0xBC]);
        assert_eq!(encoder.encode(""), Vec::<u8>::new());
        let mut buf = [0u8; 4];
        assert!(matches!(
            encoder.encode_into("x", &mut buf),
            Err(BridgeError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_validate_utf8() {
        assert_eq!(validate_utf8(b"ok").unwrap(), "ok");
        assert!(matches!(
            validate_utf8(&[0x80]),
            Err(BridgeError::MalformedInput { valid_up_to: 0 })
        ));
    }
}
