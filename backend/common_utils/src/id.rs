//! Identifier generation.

use crate::consts::{ALPHABETS, ID_LENGTH};

/// Generate a NanoID-backed identifier with the given prefix, e.g. `pay_h2k...`.
pub fn generate_id_with_prefix(prefix: &str) -> String {
    format!("{prefix}_{}", nanoid::nanoid!(ID_LENGTH, &ALPHABETS))
}

/// Generate a payment reference number from the current wall clock, e.g.
/// `prn_1754500000000`. Callers that need uniqueness under concurrent
/// creation supply their own reference instead.
pub fn generate_time_reference(prefix: &str) -> String {
    let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("{prefix}_{millis}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_id_has_expected_shape() {
        let id = generate_id_with_prefix("pay");
        assert!(id.starts_with("pay_"));
        assert_eq!(id.len(), "pay_".len() + ID_LENGTH);
    }

    #[test]
    fn time_reference_is_prefixed() {
        assert!(generate_time_reference("prn").starts_with("prn_"));
    }
}
