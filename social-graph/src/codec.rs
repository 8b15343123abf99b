//! Value codec for sensitive numeric fields.
//!
//! `ValueCodec` is the capability interface a real encryption scheme plugs
//! into. `MarkerCodec` is the placeholder: it wraps the decimal text of the
//! value in base64 behind a `FHE-` marker. It holds no secret material, so
//! encoding runs entirely on the client.
//!
//! Decoding is only ever invoked by the reveal gate after a successful
//! signature; the codec itself does not enforce that.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Marker prefix identifying tokens produced by [`MarkerCodec`].
pub const CODEC_MARKER: &str = "FHE-";

/// Error types for codec operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Neither the marked payload nor the raw token is a number
    #[error("Not a number: {0}")]
    NotANumber(String),
}

/// Encode/decode pair standing in for an encryption primitive.
pub trait ValueCodec: Send + Sync {
    /// Codec identifier.
    fn name(&self) -> &str;

    /// Produce an opaque token for `value`.
    fn encode(&self, value: f64) -> String;

    /// Recover the value from a token.
    fn decode(&self, token: &str) -> Result<f64, CodecError>;
}

/// Self-describing placeholder codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerCodec;

impl MarkerCodec {
    /// Create the codec.
    pub fn new() -> Self {
        Self
    }

    /// Whether a token carries the codec marker.
    pub fn is_marked(token: &str) -> bool {
        token.starts_with(CODEC_MARKER)
    }
}

impl ValueCodec for MarkerCodec {
    fn name(&self) -> &str {
        "marker-base64"
    }

    fn encode(&self, value: f64) -> String {
        // f64 Display is the shortest round-tripping decimal text.
        format!("{}{}", CODEC_MARKER, BASE64.encode(value.to_string()))
    }

    fn decode(&self, token: &str) -> Result<f64, CodecError> {
        let not_a_number = || CodecError::NotANumber(token.to_string());
        match token.strip_prefix(CODEC_MARKER) {
            Some(payload) => {
                let bytes = BASE64.decode(payload.trim()).map_err(|_| not_a_number())?;
                let text = String::from_utf8(bytes).map_err(|_| not_a_number())?;
                parse_numeric_prefix(&text).ok_or_else(not_a_number)
            }
            // Unmarked tokens fall back to a plain numeric parse
            None => parse_numeric_prefix(token).ok_or_else(not_a_number),
        }
    }
}

/// Parse the longest decimal number at the start of `text`.
///
/// Leading whitespace is skipped and anything after the number is ignored,
/// so `"42abc"` is 42. The grammar is an optional sign, digits, an optional
/// fraction, and an exponent that only counts when digits follow it. Words
/// such as `NaN` or `inf` are not numbers, and a value that overflows to
/// infinity is `None`.
pub fn parse_numeric_prefix(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits_from = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first().copied(), Some(b'+' | b'-')) {
        end = 1;
    }

    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if bytes.get(end).copied() == Some(b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - (end + 1);
        end = frac_end;
    }

    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end).copied(), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp).copied(), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    text[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_score_range() {
        let codec = MarkerCodec::new();
        for v in 0..=100 {
            let token = codec.encode(v as f64);
            assert!(MarkerCodec::is_marked(&token));
            assert_eq!(codec.decode(&token).unwrap(), v as f64);
        }
    }

    #[test]
    fn test_encoding_matches_wire_format() {
        let codec = MarkerCodec::new();
        assert_eq!(codec.encode(75.0), "FHE-NzU=");
        assert_eq!(codec.encode(0.0), "FHE-MA==");
        assert_eq!(codec.encode(12.5), "FHE-MTIuNQ==");
    }

    #[test]
    fn test_fractional_values() {
        let codec = MarkerCodec::new();
        for v in [0.1, 33.333, 99.99, -4.25] {
            assert_eq!(codec.decode(&codec.encode(v)).unwrap(), v);
        }
    }

    #[test]
    fn test_unmarked_fallback() {
        let codec = MarkerCodec::new();
        assert_eq!(codec.decode("42").unwrap(), 42.0);
        assert_eq!(codec.decode(" 7.5 ").unwrap(), 7.5);
    }

    #[test]
    fn test_trailing_text_after_number() {
        let codec = MarkerCodec::new();
        assert_eq!(codec.decode("42abc").unwrap(), 42.0);
        assert_eq!(codec.decode("-3.5e2x").unwrap(), -350.0);
        assert_eq!(codec.decode("7e").unwrap(), 7.0);
        assert_eq!(codec.decode(".5").unwrap(), 0.5);
    }

    #[test]
    fn test_non_finite_words_are_rejected() {
        let codec = MarkerCodec::new();
        for token in ["NaN", "nan", "inf", "-inf", "infinity", "1e999"] {
            assert!(
                matches!(codec.decode(token), Err(CodecError::NotANumber(_))),
                "{token} should not decode"
            );
        }
        // Marked payloads spelling NaN and inf
        assert!(codec.decode("FHE-TmFO").is_err());
        assert!(codec.decode("FHE-aW5m").is_err());
    }

    #[test]
    fn test_numeric_prefix_grammar() {
        assert_eq!(parse_numeric_prefix("  12.5kg"), Some(12.5));
        assert_eq!(parse_numeric_prefix("+8"), Some(8.0));
        assert_eq!(parse_numeric_prefix("1e3"), Some(1000.0));
        assert_eq!(parse_numeric_prefix("-"), None);
        assert_eq!(parse_numeric_prefix("."), None);
        assert_eq!(parse_numeric_prefix("e5"), None);
        assert_eq!(parse_numeric_prefix(""), None);

        let long = format!("{}7", "0".repeat(100_000));
        assert_eq!(parse_numeric_prefix(&long), Some(7.0));
    }

    #[test]
    fn test_garbage_is_not_a_number() {
        let codec = MarkerCodec::new();
        assert!(matches!(
            codec.decode("hello"),
            Err(CodecError::NotANumber(_))
        ));
        assert!(codec.decode("FHE-!!!").is_err());
        // Valid base64 of non-numeric text
        assert!(codec.decode("FHE-aGVsbG8=").is_err());
    }
}
