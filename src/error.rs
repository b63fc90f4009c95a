// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failure taxonomy of the notification pipeline.
///
/// Only `KeyUnavailable` outlives a single notification; every other variant
/// is local to the envelope or summary it was raised for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("key material unavailable: {0}")]
    KeyUnavailable(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error(
        "certificate mismatch: notification was encrypted for {expected}, local certificate is {actual}"
    )]
    CertificateMismatch { expected: String, actual: String },

    #[error("decrypted payload could not be reconstructed")]
    PayloadUnparseable,

    #[error("enrichment failed: {0}")]
    EnrichmentFailed(String),

    #[error("issue filing failed: {0}")]
    IssueFilingFailed(String),
}

impl PipelineError {
    /// Stable identifier used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::KeyUnavailable(_) => "key_unavailable",
            PipelineError::DecryptionFailed(_) => "decryption_failed",
            PipelineError::CertificateMismatch { .. } => "certificate_mismatch",
            PipelineError::PayloadUnparseable => "payload_unparseable",
            PipelineError::EnrichmentFailed(_) => "enrichment_failed",
            PipelineError::IssueFilingFailed(_) => "issue_filing_failed",
        }
    }

    /// `CertificateMismatch` is a diagnostic refinement of a decryption failure.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::DecryptionFailed(_) | PipelineError::CertificateMismatch { .. }
        )
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let upstream = ApiError::bad_gateway("upstream");
        assert_eq!(upstream.status, StatusCode::BAD_GATEWAY);

        let off = ApiError::unavailable("off");
        assert_eq!(off.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[test]
    fn certificate_mismatch_counts_as_decryption_failure() {
        let mismatch = PipelineError::CertificateMismatch {
            expected: "AA".into(),
            actual: "BB".into(),
        };
        assert!(mismatch.is_decryption_failure());
        assert_eq!(mismatch.kind(), "certificate_mismatch");
        assert!(!PipelineError::PayloadUnparseable.is_decryption_failure());
        assert!(!PipelineError::KeyUnavailable("x".into()).is_decryption_failure());
    }
}
