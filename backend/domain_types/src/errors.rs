//! Error taxonomy for the settlement core.

use strum::Display;

/// Stable error codes carried on the callback's redirect query string.
/// Renaming these breaks the frontend status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CallbackErrorCode {
    MissingFields,
    UnknownPrn,
    PidMismatch,
    PaymentFailed,
    DvMismatch,
    AmountMismatch,
    AmountManipulation,
    Internal,
}

/// Failures raised while processing a payment session.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Invalid input: {0}")]
    ValidationError(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Response signature verification failed")]
    SignatureMismatch,
    #[error("Response fields required for verification are missing")]
    SignatureUnavailable,
    #[error("Paid amount disagrees with the session amount beyond tolerance")]
    AmountMismatch,
    #[error("Gateway verification endpoint unreachable")]
    GatewayUnreachable,
    #[error("Payment was already credited")]
    ReplayDetected,
    #[error("Bulk credit transaction failed: {0}")]
    TransactionFailure(String),
}

/// Failures raised by the payment/contestant stores.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Duplicate reference id")]
    DuplicateReference,
    #[error("Record not found")]
    NotFound,
    #[error("Conditional update matched no record")]
    ConditionNotMet,
    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Failures raised by the outbound HTTP client.
#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum ApiClientError {
    #[error("Header map construction failed")]
    HeaderMapConstructionFailed,
    #[error("Client construction failed")]
    ClientConstructionFailed,
    #[error("Request body serialization failed")]
    BodySerializationFailed,
    #[error("URL encoding of request payload failed")]
    UrlEncodingFailed,
    #[error("Failed to send request to gateway {0}")]
    RequestNotSent(String),
    #[error("Failed to decode response")]
    ResponseDecodingFailed,
    #[error("Server responded with Request Timeout")]
    RequestTimeoutReceived,
    #[error("Server responded with unexpected response")]
    UnexpectedServerResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_codes_are_snake_case() {
        assert_eq!(CallbackErrorCode::UnknownPrn.to_string(), "unknown_prn");
        assert_eq!(
            CallbackErrorCode::AmountManipulation.to_string(),
            "amount_manipulation"
        );
    }
}
