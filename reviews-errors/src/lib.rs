use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum AppError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to extract reviews: {0}")]
    ExtractionFailed(String),

    #[error("Sentiment classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "ssr")]
mod ssr_impl {
    use super::AppError;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::Json;

    #[derive(serde::Serialize)]
    struct ErrorResponse {
        message: String,
    }

    impl AppError {
        pub fn status_code(&self) -> StatusCode {
            match self {
                AppError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                AppError::ExtractionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AppError::ClassifierUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let status = self.status_code();
            let message = match &self {
                AppError::InvalidUrl(msg) => msg.clone(),
                AppError::ExtractionFailed(_) | AppError::ClassifierUnavailable(_) => {
                    self.to_string()
                }
                AppError::Timeout => "Timeout".to_string(),
                AppError::Internal(msg) => msg.clone(),
            };
            (status, Json(ErrorResponse { message })).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_tagged_variant() {
        let json = serde_json::to_string(&AppError::InvalidUrl("empty".to_string())).unwrap();
        assert_eq!(json, r#"{"InvalidUrl":"empty"}"#);
    }

    #[cfg(feature = "ssr")]
    #[test]
    fn maps_variants_to_status_codes() {
        use axum::http::StatusCode;

        assert_eq!(
            AppError::InvalidUrl(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::ExtractionFailed(String::new()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            AppError::Internal(String::new()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
