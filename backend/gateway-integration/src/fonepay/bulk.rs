//! Bulk vote payload carried through the gateway's R1 auxiliary field.
//!
//! The payload has been through three wire shapes over the product's life.
//! Decoding tries them newest-first and never fails: malformed input decodes
//! to an empty list, which callers treat as "fall back to the payment's
//! primary contestant". Pure functions, no I/O.

use domain_types::contestant::VoteCredit;
use serde::{Deserialize, Serialize};

use super::types::R1_MAX_LEN;

#[derive(Debug, thiserror::Error)]
pub enum BulkCodecError {
    #[error("Bulk payload serialization failed")]
    SerializationFailed,
}

/// Canonical shape: `{"i":[{"id":..,"v":..}],"c":<count>,"t":<total votes>}`.
/// Short keys keep the encoding small for the bounded transport field.
#[derive(Debug, Serialize, Deserialize)]
struct CanonicalPayload {
    i: Vec<CanonicalItem>,
    #[serde(default)]
    c: usize,
    #[serde(default)]
    t: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct CanonicalItem {
    id: String,
    v: u32,
}

/// Legacy shape: `{"items":[...]}` with either item key style.
#[derive(Debug, Deserialize)]
struct LegacyWrapper {
    items: Vec<LegacyItem>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyItem {
    Verbose {
        #[serde(rename = "contestant_Id")]
        contestant_id: String,
        vote: u32,
    },
    Short {
        id: String,
        v: u32,
    },
}

impl From<LegacyItem> for VoteCredit {
    fn from(item: LegacyItem) -> Self {
        match item {
            LegacyItem::Verbose {
                contestant_id,
                vote,
            } => Self::new(contestant_id, vote),
            LegacyItem::Short { id, v } => Self::new(id, v),
        }
    }
}

/// Encode the canonical shape.
pub fn encode(items: &[VoteCredit]) -> Result<String, BulkCodecError> {
    let payload = CanonicalPayload {
        i: items
            .iter()
            .map(|item| CanonicalItem {
                id: item.contestant_id.clone(),
                v: item.votes,
            })
            .collect(),
        c: items.len(),
        t: items.iter().map(|item| item.votes).sum(),
    };
    serde_json::to_string(&payload).map_err(|_| BulkCodecError::SerializationFailed)
}

/// Whether an encoded payload fits the gateway's historical R1 cap. The cap
/// is unverified on the gateway side; callers log when it is exceeded.
pub fn fits_transport(encoded: &str) -> bool {
    encoded.len() <= R1_MAX_LEN
}

/// Decode any of the historical shapes, newest first. Total: unknown or
/// malformed input yields an empty list.
pub fn decode(raw: &str) -> Vec<VoteCredit> {
    if let Ok(canonical) = serde_json::from_str::<CanonicalPayload>(raw) {
        return canonical
            .i
            .into_iter()
            .map(|item| VoteCredit::new(item.id, item.v))
            .collect();
    }
    if let Ok(legacy) = serde_json::from_str::<LegacyWrapper>(raw) {
        return legacy.items.into_iter().map(VoteCredit::from).collect();
    }
    if let Ok(oldest) = serde_json::from_str::<Vec<LegacyItem>>(raw) {
        return oldest.into_iter().map(VoteCredit::from).collect();
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn items(n: u32) -> Vec<VoteCredit> {
        (1..=n)
            .map(|i| VoteCredit::new(format!("C{i}"), i))
            .collect()
    }

    #[test]
    fn round_trip_one_item() {
        let original = items(1);
        assert_eq!(decode(&encode(&original).unwrap()), original);
    }

    #[test]
    fn round_trip_two_items() {
        let original = items(2);
        assert_eq!(decode(&encode(&original).unwrap()), original);
    }

    #[test]
    fn round_trip_twenty_items() {
        let original = items(20);
        assert_eq!(decode(&encode(&original).unwrap()), original);
    }

    #[test]
    fn transport_cap_flags_multi_item_payloads() {
        assert!(fits_transport(&encode(&items(1)).unwrap()));
        assert!(!fits_transport(&encode(&items(20)).unwrap()));
    }

    #[test]
    fn canonical_shape_decodes() {
        let decoded = decode(r#"{"i":[{"id":"C1","v":2},{"id":"C2","v":3}],"c":2,"t":5}"#);
        assert_eq!(
            decoded,
            vec![VoteCredit::new("C1", 2), VoteCredit::new("C2", 3)]
        );
    }

    #[test]
    fn legacy_shapes_normalize_to_the_same_list() {
        let expected = vec![VoteCredit::new("C1", 2), VoteCredit::new("C2", 3)];
        let legacy_verbose =
            r#"{"items":[{"contestant_Id":"C1","vote":2},{"contestant_Id":"C2","vote":3}]}"#;
        let legacy_short = r#"{"items":[{"id":"C1","v":2},{"id":"C2","v":3}]}"#;
        let bare_array = r#"[{"contestant_Id":"C1","vote":2},{"contestant_Id":"C2","vote":3}]"#;
        assert_eq!(decode(legacy_verbose), expected);
        assert_eq!(decode(legacy_short), expected);
        assert_eq!(decode(bare_array), expected);
    }

    #[test]
    fn malformed_input_decodes_to_empty() {
        assert!(decode("").is_empty());
        assert!(decode("N/A").is_empty());
        assert!(decode(r#"{"i":"oops"}"#).is_empty());
        assert!(decode("[1,2,3]").is_empty());
    }
}
