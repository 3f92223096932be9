use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::auth::dto::MessageResponse;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid request body")]
    InvalidBody,

    #[error("user with email {0} already exists")]
    DuplicateEmail(String),

    #[error("user not found")]
    AccountNotFound,

    #[error("incorrect password")]
    InvalidPassword,

    #[error("invalid authentication token")]
    TokenNotValid,

    #[error("could not find cookie 'Authentication'")]
    MissingCookie,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidBody
            | AppError::DuplicateEmail(_)
            | AppError::TokenNotValid
            | AppError::MissingCookie => StatusCode::BAD_REQUEST,
            AppError::AccountNotFound => StatusCode::NOT_FOUND,
            // A wrong password is an expected outcome, not a failed request.
            AppError::InvalidPassword => StatusCode::OK,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(MessageResponse { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_message(err: AppError) -> (StatusCode, String) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, value["message"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, msg) =
            body_message(AppError::Internal(anyhow::anyhow!("connection refused"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(msg, "internal server error");
    }

    #[tokio::test]
    async fn invalid_password_is_not_an_error_status() {
        let (status, msg) = body_message(AppError::InvalidPassword).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(msg, "incorrect password");
    }

    #[tokio::test]
    async fn domain_conditions_map_to_client_errors() {
        let (status, msg) = body_message(AppError::DuplicateEmail("a@b.co".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "user with email a@b.co already exists");

        let (status, _) = body_message(AppError::TokenNotValid).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = body_message(AppError::AccountNotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
