//! Error types shared across the utility modules.

/// Result alias carrying an `error_stack` report.
pub type CustomResult<T, E> = error_stack::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Failed to sign message")]
    MessageSigningFailed,
    #[error("Failed to verify signature")]
    SignatureVerificationFailed,
    #[error("Failed to decode provided signature")]
    SignatureDecodingFailed,
}
