use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures a request can end with. Every variant is answered with a 500;
/// the variant decides what gets logged and how the detail reads.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A header the template logic depends on is not part of the generated schema.
    #[error("schema integrity error: header `{0}` is not part of the template schema")]
    SchemaIntegrity(String),

    /// Database, template storage or the template contents could not be used.
    #[error("dependency unavailable: {0:#}")]
    DependencyUnavailable(anyhow::Error),

    #[error("internal server error: {0:#}")]
    Unexpected(anyhow::Error),
}

impl ExportError {
    pub fn dependency(err: impl Into<anyhow::Error>) -> Self {
        Self::DependencyUnavailable(err.into())
    }

    pub fn unexpected(err: impl Into<anyhow::Error>) -> Self {
        Self::Unexpected(err.into())
    }
}

impl IntoResponse for ExportError {
    fn into_response(self) -> Response {
        match &self {
            Self::SchemaIntegrity(header) => {
                tracing::error!(%header, "template schema is missing a required header")
            }
            Self::DependencyUnavailable(err) => {
                tracing::error!(error = %format!("{err:#}"), "dependency unavailable")
            }
            Self::Unexpected(err) => {
                tracing::error!(error = %format!("{err:#}"), "unexpected server error")
            }
        }

        let body = Json(json!({ "detail": self.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn every_variant_is_a_500() {
        let errors = [
            ExportError::SchemaIntegrity("unitRate".into()),
            ExportError::dependency(anyhow!("connection refused")),
            ExportError::unexpected(anyhow!("boom")),
        ];
        for err in errors {
            assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn detail_carries_the_context_chain() {
        let err = ExportError::dependency(anyhow!("connection refused").context("connect postgres"));
        assert_eq!(
            err.to_string(),
            "dependency unavailable: connect postgres: connection refused"
        );
    }
}
