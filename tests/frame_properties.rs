//! Property-based tests for report framing and file chunking.

use hidconsole::{chunk_bytes, decode, parse_hex, FrameCodec, FramingError, DEFAULT_REPORT_SIZE};
use proptest::collection::vec;
use proptest::prelude::*;

/// A report size together with a payload that fits in it
fn sized_payload() -> impl Strategy<Value = (usize, Vec<u8>)> {
    (1usize..=64).prop_flat_map(|size| (Just(size), vec(any::<u8>(), 0..=size)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Decoding a payload and encoding it back yields the payload, zero padded.
    #[test]
    fn prop_decode_then_encode_restores_payload(payload in vec(any::<u8>(), 0..=DEFAULT_REPORT_SIZE)) {
        let codec = FrameCodec::default();
        let report = codec.encode(&decode(&payload)).expect("payload fits");
        let bytes = report.as_bytes();
        prop_assert_eq!(&bytes[..payload.len()], payload.as_slice());
        prop_assert!(bytes[payload.len()..].iter().all(|&b| b == 0));
        prop_assert_eq!(decode(&bytes[..payload.len()]), decode(&payload));
    }

    /// Every framed report is exactly the configured size.
    #[test]
    fn prop_framed_length_is_report_size((size, payload) in sized_payload()) {
        let codec = FrameCodec::new(size).expect("non-zero size");
        let report = codec.frame(&payload).expect("payload fits");
        prop_assert_eq!(report.len(), size);
    }

    /// Payloads longer than the report are rejected.
    #[test]
    fn prop_oversize_payload_is_rejected(size in 1usize..=32, extra in 1usize..=16) {
        let codec = FrameCodec::new(size).expect("non-zero size");
        let payload = vec![0xA5; size + extra];
        prop_assert_eq!(
            codec.frame(&payload),
            Err(FramingError::Oversize { len: size + extra, max: size })
        );
    }

    /// An odd number of hex digits never parses.
    #[test]
    fn prop_odd_digit_count_is_invalid_hex(text in "([0-9a-fA-F]{2}){0,20}[0-9a-fA-F]") {
        let err = parse_hex(&text).expect_err("odd length must fail");
        prop_assert!(err.is_invalid_hex());
        prop_assert_eq!(err, FramingError::OddLength(text.len()));
    }

    /// Any non-hex character makes the whole input invalid.
    #[test]
    fn prop_non_hex_character_is_invalid_hex(
        prefix in "([0-9A-F]{2}){0,8}",
        bad in "[g-zG-Z!#%.,:_-]",
        suffix in "[0-9A-F ]{0,8}",
    ) {
        let text = format!("{prefix}{bad}{suffix}");
        let err = parse_hex(&text).expect_err("non-hex input must fail");
        prop_assert!(err.is_invalid_hex());
        let expected = FramingError::InvalidDigit {
            ch: bad.chars().next().expect("one character"),
            pos: prefix.len(),
        };
        prop_assert_eq!(err, expected);
    }

    /// Chunking yields ceil(n / c) reports of c bytes, zero padded at the end.
    #[test]
    fn prop_chunk_count_and_padding(bytes in vec(any::<u8>(), 0..300), chunk in 1usize..=40) {
        let chunks = chunk_bytes(&bytes, chunk).expect("non-zero chunk size");
        prop_assert_eq!(chunks.len(), bytes.len().div_ceil(chunk));
        prop_assert!(chunks.iter().all(|c| c.len() == chunk));

        let flat: Vec<u8> = chunks.iter().flat_map(|c| c.as_bytes().to_vec()).collect();
        prop_assert_eq!(&flat[..bytes.len()], bytes.as_slice());
        prop_assert!(flat[bytes.len()..].iter().all(|&b| b == 0));
    }
}
