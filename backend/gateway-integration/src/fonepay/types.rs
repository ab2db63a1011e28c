//! Outbound and inbound parameter sets for the gateway redirect round-trip.

use rust_decimal::Decimal;
use serde::Deserialize;
use time::{macros::format_description, Date};

use super::dv::{self, DigestOutcome, DvError};

/// Fixed field order signed into the outbound DV. Protocol constant.
pub const REQUEST_SIGNED_FIELD_ORDER: [&str; 9] =
    ["PID", "MD", "PRN", "AMT", "CRN", "DT", "R1", "R2", "RU"];

/// Fixed field order signed into the return callback's DV. Protocol constant.
pub const RESPONSE_SIGNED_FIELD_ORDER: [&str; 9] =
    ["PRN", "PID", "PS", "RC", "UID", "BC", "INI", "P_AMT", "R_AMT"];

/// MD token for a payment request.
pub const MODE_PAYMENT: &str = "P";
/// RI travels unsigned; the gateway echoes it back untouched.
pub const DEFAULT_REQUEST_INDICATOR: &str = "N";
/// Placeholder the gateway requires for absent auxiliary fields.
pub const AUX_PLACEHOLDER: &str = "N/A";
/// Transport caps on the auxiliary fields. Treated as hard constraints.
pub const R1_MAX_LEN: usize = 50;
pub const R2_MAX_LEN: usize = 160;

/// Response code the gateway sends alongside a successful PS flag.
pub const RESPONSE_CODE_SUCCESSFUL: &str = "successful";

/// Inputs for one outbound redirect, before signing.
#[derive(Debug, Clone)]
pub struct RedirectRequest {
    pub merchant_id: String,
    pub reference_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub return_url: String,
    pub auxiliary1: Option<String>,
    pub auxiliary2: Option<String>,
    pub date: Date,
}

/// The fully signed outbound parameter set, ready for URL assembly.
#[derive(Debug, Clone)]
pub struct RedirectRequestParams {
    pub return_url: String,
    pub merchant_id: String,
    pub reference_id: String,
    pub amount: String,
    pub currency: String,
    pub date_token: String,
    pub request_indicator: String,
    pub auxiliary1: String,
    pub auxiliary2: String,
    pub mode: String,
    pub digest: String,
}

impl RedirectRequest {
    /// Sign the request over the fixed outbound field order. The signature
    /// is computed over raw values; URL encoding happens only at assembly.
    pub fn into_signed_params(
        self,
        secret: &str,
    ) -> error_stack::Result<RedirectRequestParams, DvError> {
        let amount = format!("{:.2}", self.amount);
        let date_token = format_date_token(self.date);
        let auxiliary1 = self
            .auxiliary1
            .unwrap_or_else(|| AUX_PLACEHOLDER.to_string());
        let auxiliary2 = self
            .auxiliary2
            .unwrap_or_else(|| AUX_PLACEHOLDER.to_string());

        // PID, MD, PRN, AMT, CRN, DT, R1, R2, RU
        let digest = dv::sign(
            secret,
            &[
                &self.merchant_id,
                MODE_PAYMENT,
                &self.reference_id,
                &amount,
                &self.currency,
                &date_token,
                &auxiliary1,
                &auxiliary2,
                &self.return_url,
            ],
        )?;

        Ok(RedirectRequestParams {
            return_url: self.return_url,
            merchant_id: self.merchant_id,
            reference_id: self.reference_id,
            amount,
            currency: self.currency,
            date_token,
            request_indicator: DEFAULT_REQUEST_INDICATOR.to_string(),
            auxiliary1,
            auxiliary2,
            mode: MODE_PAYMENT.to_string(),
            digest,
        })
    }
}

impl RedirectRequestParams {
    /// Assemble the browser redirect URL. Query encoding is applied here
    /// and only here.
    pub fn redirect_url(&self, gateway_base_url: &str) -> Result<String, url::ParseError> {
        let mut url = url::Url::parse(gateway_base_url)?;
        url.query_pairs_mut()
            .append_pair("RU", &self.return_url)
            .append_pair("PID", &self.merchant_id)
            .append_pair("PRN", &self.reference_id)
            .append_pair("AMT", &self.amount)
            .append_pair("CRN", &self.currency)
            .append_pair("DT", &self.date_token)
            .append_pair("RI", &self.request_indicator)
            .append_pair("R1", &self.auxiliary1)
            .append_pair("R2", &self.auxiliary2)
            .append_pair("MD", &self.mode)
            .append_pair("DV", &self.digest);
        Ok(url.into())
    }
}

/// DT token: `MM/DD/YYYY`.
pub fn format_date_token(date: Date) -> String {
    let format = format_description!("[month]/[day]/[year]");
    date.format(&format)
        .unwrap_or_else(|_| String::from("01/01/1970"))
}

/// The gateway's return callback parameters, by query or form body.
/// Every field is optional; the gateway omits fields on failure paths.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnCallbackParams {
    #[serde(rename = "PRN")]
    pub prn: Option<String>,
    #[serde(rename = "PID")]
    pub pid: Option<String>,
    #[serde(rename = "PS")]
    pub payment_status: Option<String>,
    #[serde(rename = "RC")]
    pub response_code: Option<String>,
    #[serde(rename = "UID")]
    pub trace_id: Option<String>,
    #[serde(rename = "BC")]
    pub bank_code: Option<String>,
    #[serde(rename = "INI")]
    pub initiator_code: Option<String>,
    #[serde(rename = "P_AMT")]
    pub paid_amount: Option<String>,
    #[serde(rename = "R_AMT")]
    pub refund_amount: Option<String>,
    #[serde(rename = "DV")]
    pub digest: Option<String>,
}

impl ReturnCallbackParams {
    /// Both the boolean success flag and the response code must agree.
    pub fn indicates_success(&self) -> bool {
        let flag_ok = self
            .payment_status
            .as_deref()
            .is_some_and(|ps| ps.eq_ignore_ascii_case("true"));
        let code_ok = self
            .response_code
            .as_deref()
            .is_some_and(|rc| rc.eq_ignore_ascii_case(RESPONSE_CODE_SUCCESSFUL));
        flag_ok && code_ok
    }

    pub fn paid_amount_decimal(&self) -> Option<Decimal> {
        self.paid_amount
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
    }

    /// Values in the fixed inbound signed order; `None` for omitted fields.
    pub fn signed_values(&self) -> [Option<&str>; 9] {
        [
            self.prn.as_deref(),
            self.pid.as_deref(),
            self.payment_status.as_deref(),
            self.response_code.as_deref(),
            self.trace_id.as_deref(),
            self.bank_code.as_deref(),
            self.initiator_code.as_deref(),
            self.paid_amount.as_deref(),
            self.refund_amount.as_deref(),
        ]
    }

    pub fn verify_digest(&self, secret: &str) -> error_stack::Result<DigestOutcome, DvError> {
        dv::verify(secret, &self.signed_values(), self.digest.as_deref())
    }
}
