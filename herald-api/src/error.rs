//! API error types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use herald_dispatch::DispatchError;
use serde::Serialize;
use thiserror::Error;

/// Errors that stop the API server itself
#[derive(Debug, Error)]
pub enum ApiError {
    /// Failed to bind to the specified address
    #[error("Failed to bind API server to {address}: {source}")]
    BindError {
        address: String,
        source: std::io::Error,
    },

    /// The server encountered a runtime error
    #[error("API server error: {0}")]
    ServerError(String),
}

/// JSON body sent with every error response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_emails: Option<Vec<String>>,
}

/// Why a single request failed
#[derive(Debug)]
pub enum RequestError {
    /// The request was malformed
    BadRequest(String),

    /// The campaign does not exist, or the id could not be parsed
    NotFound,

    /// Submitting the campaign failed
    Submit(DispatchError),

    /// Looking up or updating a campaign failed
    Lookup(DispatchError),
}

impl RequestError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Submit(error) | Self::Lookup(error) if error.is_client_error() => {
                StatusCode::BAD_REQUEST
            }
            Self::Lookup(error) if error.is_not_found() => StatusCode::NOT_FOUND,
            Self::Submit(_) | Self::Lookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, invalid_emails) = match self {
            Self::BadRequest(reason) => (reason.clone(), None),
            Self::NotFound => ("Campaign not found".to_string(), None),
            Self::Submit(error) | Self::Lookup(error) if error.is_client_error() => (
                error.to_string(),
                error.invalid_emails().map(<[String]>::to_vec),
            ),
            Self::Lookup(error) if error.is_not_found() => ("Campaign not found".to_string(), None),
            // Internal detail stays in the logs
            Self::Submit(_) => ("Failed to start campaign".to_string(), None),
            Self::Lookup(_) => ("Internal server error".to_string(), None),
        };

        ErrorBody {
            error,
            invalid_emails,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            if let Self::Submit(error) | Self::Lookup(error) = &self {
                tracing::error!(%error, "Request failed");
            }
        }

        (status, Json(self.body())).into_response()
    }
}
