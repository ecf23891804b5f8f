// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::chain::PublicKeyError;
use crate::error::ApiError;

/// Signed-envelope verification error.
#[derive(Debug)]
pub enum AuthError {
    /// The body is not a signed envelope or `data.auth` is missing fields
    InvalidAuthBody,
    /// The envelope payload does not match the expected request shape
    InvalidPayload(String),
    /// The auth block names an unsupported public key type
    UnknownKeyType(String),
    /// The public key hex does not parse to a valid key
    InvalidPublicKey(String),
    /// The signer address could not be rendered for the given prefix
    InvalidBech32Prefix(String),
    /// The signature does not verify against the embedded key
    Unauthorized,
}

impl AuthError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidAuthBody
            | AuthError::InvalidPayload(_)
            | AuthError::UnknownKeyType(_)
            | AuthError::InvalidPublicKey(_)
            | AuthError::InvalidBech32Prefix(_) => StatusCode::BAD_REQUEST,
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidAuthBody => write!(f, "Invalid auth body."),
            AuthError::InvalidPayload(msg) => write!(f, "Invalid request body: {msg}"),
            AuthError::UnknownKeyType(t) => write!(f, "Unknown public key type: {t}"),
            AuthError::InvalidPublicKey(msg) => write!(f, "Invalid public key: {msg}"),
            AuthError::InvalidBech32Prefix(msg) => write!(f, "Invalid bech32 prefix: {msg}"),
            AuthError::Unauthorized => write!(f, "Unauthorized. Invalid signature."),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<PublicKeyError> for AuthError {
    fn from(err: PublicKeyError) -> Self {
        match err {
            PublicKeyError::UnknownType(t) => AuthError::UnknownKeyType(t),
            PublicKeyError::InvalidHex(msg) | PublicKeyError::InvalidKey(msg) => {
                AuthError::InvalidPublicKey(msg)
            }
            PublicKeyError::InvalidPrefix(msg) => AuthError::InvalidBech32Prefix(msg),
            PublicKeyError::InvalidSignature(_) | PublicKeyError::VerificationFailed => {
                AuthError::Unauthorized
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::new(err.status_code(), err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn structural_errors_are_400_and_signature_is_401() {
        assert_eq!(
            AuthError::InvalidAuthBody.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::UnknownKeyType("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unauthorized_renders_error_json() {
        let response = AuthError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error"], "Unauthorized. Invalid signature.");
    }

    #[test]
    fn public_key_errors_map_to_auth_errors() {
        let err: AuthError = PublicKeyError::VerificationFailed.into();
        assert!(matches!(err, AuthError::Unauthorized));

        let err: AuthError = PublicKeyError::UnknownType("t".into()).into();
        assert!(matches!(err, AuthError::UnknownKeyType(_)));
    }
}
