//! The gateway's DV (data verification) digest.
//!
//! DV = HMAC-SHA512 over the ordered field values joined with a comma,
//! keyed with the shared merchant secret. Values are signed RAW — never
//! URL-encoded — and the field orders are protocol constants, not computed.

use common_utils::crypto::{HmacSha512, SignMessage, VerifySignature};
use error_stack::ResultExt;

pub const FIELD_DELIMITER: &str = ",";

#[derive(Debug, thiserror::Error)]
pub enum DvError {
    #[error("Field value contains the join delimiter")]
    DelimiterInField,
    #[error("Digest computation failed")]
    DigestFailed,
}

/// Result of checking an inbound digest.
///
/// `Skipped` means a field required for verification was absent. The
/// gateway omits fields on certain failure paths, so this is "cannot verify
/// yet", not tamper evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestOutcome {
    Valid,
    Mismatch,
    Skipped,
}

/// Compute the outbound DV over the ordered raw values, rendered upper-hex.
///
/// Outbound values are under our control, so a value containing the join
/// delimiter is rejected outright rather than risking two different field
/// lists concatenating to the same message.
pub fn sign(secret: &str, ordered_values: &[&str]) -> error_stack::Result<String, DvError> {
    if ordered_values.iter().any(|v| v.contains(FIELD_DELIMITER)) {
        return Err(DvError::DelimiterInField.into());
    }
    let message = ordered_values.join(FIELD_DELIMITER);
    let digest = HmacSha512
        .sign_message(secret.as_bytes(), message.as_bytes())
        .change_context(DvError::DigestFailed)?;
    Ok(hex::encode_upper(digest))
}

/// Check an inbound DV against the ordered response values.
///
/// The hex comparison is case-insensitive (the digest is decoded to bytes
/// before the constant-time HMAC verification); a malformed or wrong-length
/// digest is a `Mismatch`, never a panic or an error.
pub fn verify(
    secret: &str,
    ordered_values: &[Option<&str>],
    provided_hex: Option<&str>,
) -> error_stack::Result<DigestOutcome, DvError> {
    let Some(provided) = provided_hex else {
        return Ok(DigestOutcome::Skipped);
    };
    let mut values = Vec::with_capacity(ordered_values.len());
    for value in ordered_values {
        match value {
            Some(value) => values.push(*value),
            None => return Ok(DigestOutcome::Skipped),
        }
    }
    let signature = match hex::decode(provided) {
        Ok(signature) => signature,
        Err(_) => return Ok(DigestOutcome::Mismatch),
    };
    let message = values.join(FIELD_DELIMITER);
    let valid = HmacSha512
        .verify_signature(secret.as_bytes(), &signature, message.as_bytes())
        .change_context(DvError::DigestFailed)?;
    Ok(if valid {
        DigestOutcome::Valid
    } else {
        DigestOutcome::Mismatch
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const SECRET: &str = "fonepay-shared-secret";

    #[test]
    fn sign_is_deterministic_and_upper_hex() {
        let first = sign(SECRET, &["PID", "P", "prn_1", "5.00"]).unwrap();
        let second = sign(SECRET, &["PID", "P", "prn_1", "5.00"]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, first.to_uppercase());
        assert_eq!(first.len(), 128);
    }

    #[test]
    fn changing_one_field_changes_digest() {
        let first = sign(SECRET, &["PID", "P", "prn_1", "5.00"]).unwrap();
        let second = sign(SECRET, &["PID", "P", "prn_1", "5.01"]).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn delimiter_injection_is_rejected() {
        // "1" + "00" must not be able to collide with "1,00" + "".
        assert!(sign(SECRET, &["1,00", ""]).is_err());
        let honest = sign(SECRET, &["1", "00"]).unwrap();
        assert_eq!(honest.len(), 128);
    }

    #[test]
    fn verify_accepts_lowercase_hex() {
        let digest = sign(SECRET, &["prn_1", "PID", "true"]).unwrap();
        let outcome = verify(
            SECRET,
            &[Some("prn_1"), Some("PID"), Some("true")],
            Some(&digest.to_lowercase()),
        )
        .unwrap();
        assert_eq!(outcome, DigestOutcome::Valid);
    }

    #[test]
    fn missing_field_soft_skips() {
        let digest = sign(SECRET, &["prn_1", "PID", "true"]).unwrap();
        let outcome = verify(SECRET, &[Some("prn_1"), None, Some("true")], Some(&digest)).unwrap();
        assert_eq!(outcome, DigestOutcome::Skipped);
    }

    #[test]
    fn missing_digest_soft_skips() {
        let outcome = verify(SECRET, &[Some("prn_1")], None).unwrap();
        assert_eq!(outcome, DigestOutcome::Skipped);
    }

    #[test]
    fn tampered_value_mismatches() {
        let digest = sign(SECRET, &["prn_1", "PID", "true"]).unwrap();
        let outcome = verify(
            SECRET,
            &[Some("prn_1"), Some("PID"), Some("false")],
            Some(&digest),
        )
        .unwrap();
        assert_eq!(outcome, DigestOutcome::Mismatch);
    }

    #[test]
    fn malformed_hex_mismatches_without_error() {
        let outcome = verify(SECRET, &[Some("prn_1")], Some("not-hex")).unwrap();
        assert_eq!(outcome, DigestOutcome::Mismatch);
    }
}
