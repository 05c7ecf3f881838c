//! # Configuration envelopes for crossing a process boundary.
//!
//! A configuration value travels to a child process as a single command-line
//! token of the form:
//!
//! ```text
//! <origin-tag>:<hex blob>
//!   │            └─ lowercase hex of the JSON encoding of the value
//!   └─ schema tag of the value (e.g. "manager.v1"), or empty
//! ```
//!
//! ## Schema registry
//! Only types implementing [`Envelope`] can be transported. The set of such
//! types is fixed at compile time, so a child never resolves anything by name:
//! it asks for a concrete type and the tag is checked against that type's
//! [`Envelope::TAG`].
//!
//! ## Rules
//! - An **empty** tag is the anonymous case: it is accepted for any schema and
//!   remapped onto the expected tag.
//! - A tag that is empty or contains `:` is emitted as the empty tag.
//! - A **non-empty** tag must equal the expected tag, else `TagMismatch`.
//! - Values that are not plain data fail to encode (`EnvelopeError::Encode`).
//!
//! ## Example
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use poolvisor::envelope::{self, Envelope};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Greeting { text: String }
//!
//! impl Envelope for Greeting {
//!     const TAG: &'static str = "greeting.v1";
//! }
//!
//! let token = envelope::encode(&Greeting { text: "hi".into() }).unwrap();
//! assert!(token.starts_with("greeting.v1:"));
//! let back: Greeting = envelope::decode(&token).unwrap();
//! assert_eq!(back.text, "hi");
//! ```

use serde::{Serialize, de::DeserializeOwned};

use crate::error::EnvelopeError;

/// Separator between origin tag and blob.
pub const SEPARATOR: char = ':';

/// A plain-data schema that can be carried in an envelope token.
pub trait Envelope: Serialize + DeserializeOwned {
    /// Schema tag recorded in the token, versioned (`name.vN`).
    const TAG: &'static str;
}

/// Encodes `value` as `"<origin-tag>:<hex blob>"`.
pub fn encode<T: Envelope>(value: &T) -> Result<String, EnvelopeError> {
    let payload = serde_json::to_vec(value).map_err(EnvelopeError::Encode)?;
    let tag = origin_tag(T::TAG);

    let mut token = String::with_capacity(tag.len() + 1 + payload.len() * 2);
    token.push_str(tag);
    token.push(SEPARATOR);
    token.push_str(&faster_hex::hex_string(&payload));
    Ok(token)
}

/// Decodes a token produced by [`encode`] back into `T`.
pub fn decode<T: Envelope>(token: &str) -> Result<T, EnvelopeError> {
    let (tag, blob) = split(token)?;
    if !tag.is_empty() && tag != T::TAG {
        return Err(EnvelopeError::TagMismatch {
            expected: T::TAG,
            found: tag.to_owned(),
        });
    }

    let payload = decode_hex(blob)?;
    serde_json::from_slice(&payload).map_err(EnvelopeError::Payload)
}

fn decode_hex(blob: &str) -> Result<Vec<u8>, EnvelopeError> {
    let mut out = vec![0u8; blob.len() / 2];
    faster_hex::hex_decode(blob.as_bytes(), &mut out).map_err(EnvelopeError::InvalidHex)?;
    Ok(out)
}

/// Returns the origin tag recorded in `token` (empty for anonymous tokens).
pub fn peek_tag(token: &str) -> Result<&str, EnvelopeError> {
    split(token).map(|(tag, _)| tag)
}

fn split(token: &str) -> Result<(&str, &str), EnvelopeError> {
    token
        .split_once(SEPARATOR)
        .ok_or(EnvelopeError::MissingSeparator)
}

fn origin_tag(tag: &'static str) -> &'static str {
    if tag.contains(SEPARATOR) { "" } else { tag }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Sample {
        name: String,
        count: Option<u32>,
        extra: BTreeMap<String, serde_json::Value>,
    }

    impl Envelope for Sample {
        const TAG: &'static str = "sample.v1";
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Other {
        name: String,
    }

    impl Envelope for Other {
        const TAG: &'static str = "other.v1";
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Colon {
        x: u8,
    }

    impl Envelope for Colon {
        const TAG: &'static str = "bad:tag";
    }

    #[derive(Serialize, Deserialize, Debug)]
    struct Keyed {
        map: std::collections::HashMap<(u8, u8), u8>,
    }

    impl Envelope for Keyed {
        const TAG: &'static str = "keyed.v1";
    }

    fn sample() -> Sample {
        let mut extra = BTreeMap::new();
        extra.insert("graceful_timeout".to_string(), serde_json::json!(5));
        extra.insert("label".to_string(), serde_json::json!("a:b"));
        Sample {
            name: "pool".into(),
            count: Some(4),
            extra,
        }
    }

    #[test]
    fn round_trip_plain_record() {
        let token = encode(&sample()).unwrap();
        assert_eq!(peek_tag(&token).unwrap(), "sample.v1");
        let back: Sample = decode(&token).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn anonymous_tag_is_remapped_onto_expected_schema() {
        let token = encode(&sample()).unwrap();
        let (_, blob) = token.split_once(':').unwrap();
        let anonymous = format!(":{blob}");

        let back: Sample = decode(&anonymous).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn tag_with_separator_is_emitted_empty() {
        let token = encode(&Colon { x: 9 }).unwrap();
        assert!(token.starts_with(':'));
        let back: Colon = decode(&token).unwrap();
        assert_eq!(back, Colon { x: 9 });
    }

    #[test]
    fn foreign_tag_is_rejected() {
        let token = encode(&Other { name: "x".into() }).unwrap();
        match decode::<Sample>(&token) {
            Err(EnvelopeError::TagMismatch { expected, found }) => {
                assert_eq!(expected, "sample.v1");
                assert_eq!(found, "other.v1");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_separator_is_a_decode_error() {
        let err = decode::<Sample>("deadbeef").unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingSeparator));
        assert!(err.is_decode());
    }

    #[test]
    fn invalid_hex_is_a_decode_error() {
        let err = decode::<Sample>("sample.v1:7b0g").unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidHex(_)));
        assert_eq!(err.as_label(), "envelope_invalid_hex");

        let odd = decode::<Sample>("sample.v1:7b0").unwrap_err();
        assert!(matches!(odd, EnvelopeError::InvalidHex(_)));
    }

    #[test]
    fn blob_is_lowercase_hex_and_decodes_either_case() {
        let token = encode(&sample()).unwrap();
        let (tag, blob) = token.split_once(':').unwrap();
        assert!(blob.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));

        let upper = format!("{tag}:{}", blob.to_ascii_uppercase());
        let back: Sample = decode(&upper).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        // "[1]" is valid JSON but not a Sample.
        let err = decode::<Sample>("sample.v1:5b315d").unwrap_err();
        assert!(matches!(err, EnvelopeError::Payload(_)));
    }

    #[test]
    fn non_plain_value_fails_loudly() {
        let mut map = std::collections::HashMap::new();
        map.insert((1, 2), 3);
        let err = encode(&Keyed { map }).unwrap_err();
        assert!(matches!(err, EnvelopeError::Encode(_)));
        assert!(!err.is_decode());
    }
}
