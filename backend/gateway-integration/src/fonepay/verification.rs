//! Server-to-server transaction confirmation against the merchant API.
//!
//! This builds the signed request half and interprets the response half;
//! the HTTP call itself is executed by the external-services layer.
//!
//! The request signature scheme differs from the redirect DV: the message
//! is always comma-joined and includes the API credentials, the HTTP
//! method, content type, resource path, and the JSON body. Same keyed-hash
//! primitive underneath.

use base64::Engine;
use common_utils::{
    crypto::{HmacSha512, SignMessage},
    request::{Method, Request, RequestContent},
};
use domain_types::errors::ApiClientError;
use error_stack::ResultExt;
use rust_decimal::Decimal;
use serde::Serialize;

pub const VERIFICATION_RESOURCE_PATH: &str = "/api/merchant/merchantDetailsWithTxnVerification";
pub const VERIFICATION_CONTENT_TYPE: &str = "application/json";
/// Name of the custom keyed-hash header.
pub const AUTH_DIGEST_HEADER: &str = "auth";

const BASE64_ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Merchant-API credentials, absent entirely when S2S is not configured.
#[derive(Clone, serde::Deserialize)]
pub struct MerchantApiParams {
    pub base_url: String,
    pub api_user: String,
    pub api_password: String,
}

impl std::fmt::Debug for MerchantApiParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MerchantApiParams")
            .field("base_url", &self.base_url)
            .field("api_user", &self.api_user)
            .field("api_password", &"***")
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerificationRequestBody<'a> {
    prn: &'a str,
    merchant_code: &'a str,
    amount: String,
}

/// Build the signed verification POST: HTTP Basic auth plus the custom
/// digest header over `apiUser,apiPass,method,contentType,path,body`.
pub fn build_verification_request(
    params: &MerchantApiParams,
    reference_id: &str,
    merchant_id: &str,
    amount: Decimal,
) -> error_stack::Result<Request, ApiClientError> {
    let body = VerificationRequestBody {
        prn: reference_id,
        merchant_code: merchant_id,
        amount: format!("{amount:.2}"),
    };
    let body_value =
        serde_json::to_value(&body).change_context(ApiClientError::BodySerializationFailed)?;
    // Sign the exact bytes the client will put on the wire.
    let body_string = serde_json::to_string(&body_value)
        .change_context(ApiClientError::BodySerializationFailed)?;

    let message = [
        params.api_user.as_str(),
        params.api_password.as_str(),
        "POST",
        VERIFICATION_CONTENT_TYPE,
        VERIFICATION_RESOURCE_PATH,
        body_string.as_str(),
    ]
    .join(",");
    let digest = HmacSha512
        .sign_message(params.api_password.as_bytes(), message.as_bytes())
        .change_context(ApiClientError::BodySerializationFailed)?;

    let basic = BASE64_ENGINE.encode(format!("{}:{}", params.api_user, params.api_password));
    let url = format!(
        "{}{VERIFICATION_RESOURCE_PATH}",
        params.base_url.trim_end_matches('/')
    );

    Ok(Request::new(Method::Post, url)
        .add_header("Authorization", format!("Basic {basic}"))
        .add_header(AUTH_DIGEST_HEADER, hex::encode(digest))
        .add_header("Content-Type", VERIFICATION_CONTENT_TYPE)
        .set_body(RequestContent::Json(body_value)))
}

/// Transaction status as reported by the merchant API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum GatewayTxnStatus {
    Success,
    Failed,
    /// Anything the API reports that is neither settled nor failed.
    Other,
}

/// Interpreted merchant-API response plus the raw payload kept for audit.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub status: GatewayTxnStatus,
    pub remote_amount: Option<Decimal>,
    pub raw: serde_json::Value,
}

/// Interpret the merchant-API response body. Total: an unparseable body is
/// an `Other` status with the raw text preserved, never an error.
pub fn parse_verification_response(body: &[u8]) -> VerificationReport {
    let raw: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => {
            return VerificationReport {
                status: GatewayTxnStatus::Other,
                remote_amount: None,
                raw: serde_json::Value::String(String::from_utf8_lossy(body).into_owned()),
            }
        }
    };

    let status = match raw.get("paymentStatus").and_then(|v| v.as_str()) {
        Some(status) if status.eq_ignore_ascii_case("success") => GatewayTxnStatus::Success,
        Some(status)
            if status.eq_ignore_ascii_case("failed") || status.eq_ignore_ascii_case("failure") =>
        {
            GatewayTxnStatus::Failed
        }
        _ => GatewayTxnStatus::Other,
    };

    let remote_amount = raw
        .get("txnAmount")
        .or_else(|| raw.get("amount"))
        .and_then(|value| match value {
            serde_json::Value::String(s) => s.trim().parse().ok(),
            serde_json::Value::Number(n) => n.to_string().parse().ok(),
            _ => None,
        });

    VerificationReport {
        status,
        remote_amount,
        raw,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::str::FromStr;

    use super::*;

    fn params() -> MerchantApiParams {
        MerchantApiParams {
            base_url: "https://merchant-api.example.com".to_string(),
            api_user: "apiuser".to_string(),
            api_password: "apipass".to_string(),
        }
    }

    #[test]
    fn request_carries_basic_auth_and_digest() {
        let request = build_verification_request(
            &params(),
            "prn_1",
            "MER123",
            Decimal::from_str("5").unwrap(),
        )
        .unwrap();
        assert_eq!(request.method, Method::Post);
        assert!(request.url.ends_with(VERIFICATION_RESOURCE_PATH));
        let headers: std::collections::HashMap<_, _> = request
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert!(headers["Authorization"].starts_with("Basic "));
        assert_eq!(headers[AUTH_DIGEST_HEADER].len(), 128);
    }

    #[test]
    fn digest_is_deterministic_and_amount_sensitive() {
        let one = build_verification_request(
            &params(),
            "prn_1",
            "MER123",
            Decimal::from_str("5").unwrap(),
        )
        .unwrap();
        let two = build_verification_request(
            &params(),
            "prn_1",
            "MER123",
            Decimal::from_str("5").unwrap(),
        )
        .unwrap();
        let three = build_verification_request(
            &params(),
            "prn_1",
            "MER123",
            Decimal::from_str("6").unwrap(),
        )
        .unwrap();
        let digest = |r: &Request| {
            r.headers
                .iter()
                .find(|(k, _)| k == AUTH_DIGEST_HEADER)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(digest(&one), digest(&two));
        assert_ne!(digest(&one), digest(&three));
    }

    #[test]
    fn response_status_mapping() {
        let success = parse_verification_response(br#"{"paymentStatus":"success"}"#);
        assert_eq!(success.status, GatewayTxnStatus::Success);

        let failed = parse_verification_response(br#"{"paymentStatus":"FAILED"}"#);
        assert_eq!(failed.status, GatewayTxnStatus::Failed);

        let other = parse_verification_response(br#"{"paymentStatus":"pending"}"#);
        assert_eq!(other.status, GatewayTxnStatus::Other);
    }

    #[test]
    fn remote_amount_parses_string_or_number() {
        let from_string =
            parse_verification_response(br#"{"paymentStatus":"success","txnAmount":"5.00"}"#);
        assert_eq!(
            from_string.remote_amount,
            Some(Decimal::from_str("5.00").unwrap())
        );

        let from_number =
            parse_verification_response(br#"{"paymentStatus":"success","amount":5.0}"#);
        assert_eq!(
            from_number.remote_amount,
            Some(Decimal::from_str("5.0").unwrap())
        );
    }

    #[test]
    fn garbage_body_is_other_not_error() {
        let report = parse_verification_response(b"<html>Bad Gateway</html>");
        assert_eq!(report.status, GatewayTxnStatus::Other);
        assert!(report.raw.is_string());
    }
}
