// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Custom application errors with conversions from common Rust and 3rd-party errors.

use actix::MailboxError;
use actix::dev::SendError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use awc::error::{ConnectError, PayloadError, SendRequestError};
use derive_more::Display;
use log::error;

use crate::server::web_model::ApiResponse;

/// Runtime error of an entity operation or an API request.
#[derive(Debug, Display, PartialEq)]
pub enum ServiceError {
    #[display("Internal server error: {_0}")]
    InternalServerError(String),

    #[display("Internal serialization error: {_0}")]
    SerializationError(String),

    #[display("BadRequest: {_0}")]
    BadRequest(String),

    #[display("Not found: {_0}")]
    NotFound(String),

    #[display("Unauthorized: {_0}")]
    Unauthorized(String),

    #[display("The device is not connected")]
    NotConnected,

    #[display("Service unavailable: {_0}")]
    ServiceUnavailable(String),
}

impl From<std::io::Error> for ServiceError {
    fn from(e: std::io::Error) -> Self {
        ServiceError::InternalServerError(format!("{e:?}"))
    }
}

impl From<MailboxError> for ServiceError {
    fn from(e: MailboxError) -> Self {
        ServiceError::InternalServerError(format!("Internal message error: {e:?}"))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        error!("{e:?}");
        ServiceError::SerializationError(e.to_string())
    }
}

impl From<strum::ParseError> for ServiceError {
    fn from(e: strum::ParseError) -> Self {
        ServiceError::SerializationError(e.to_string())
    }
}

impl<T> From<SendError<T>> for ServiceError {
    fn from(e: SendError<T>) -> Self {
        ServiceError::InternalServerError(format!("Error sending internal message: {e:?}"))
    }
}

impl From<VendorError> for ServiceError {
    fn from(e: VendorError) -> Self {
        match e {
            VendorError::Timeout | VendorError::Request(_) => {
                ServiceError::ServiceUnavailable(e.to_string())
            }
            VendorError::NotFound(id) => ServiceError::NotFound(id),
            e => ServiceError::InternalServerError(e.to_string()),
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::NotConnected | ServiceError::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServiceError::InternalServerError(_) | ServiceError::SerializationError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = match self {
            ServiceError::BadRequest(_) => "BAD_REQUEST",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::NotConnected => "NOT_CONNECTED",
            ServiceError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ServiceError::InternalServerError(_) | ServiceError::SerializationError(_) => {
                "INTERNAL_ERROR"
            }
        };
        let message = self.to_string();
        HttpResponse::build(self.status_code()).json(ApiResponse::new(code, &message))
    }
}

/// Error returned by a vendor API client.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum VendorError {
    /// Credentials were rejected by the vendor.
    #[display("Authentication failed: {_0}")]
    Auth(String),

    /// The vendor API could not be reached in time.
    #[display("Request timed out")]
    Timeout,

    #[display("HTTP status {_0}")]
    Http(u16),

    #[display("Invalid response payload: {_0}")]
    Payload(String),

    #[display("Request error: {_0}")]
    Request(String),

    #[display("Unknown device: {_0}")]
    NotFound(String),
}

impl std::error::Error for VendorError {}

impl From<SendRequestError> for VendorError {
    fn from(e: SendRequestError) -> Self {
        match e {
            SendRequestError::Timeout | SendRequestError::Connect(ConnectError::Timeout) => {
                VendorError::Timeout
            }
            e => VendorError::Request(e.to_string()),
        }
    }
}

impl From<PayloadError> for VendorError {
    fn from(e: PayloadError) -> Self {
        VendorError::Payload(e.to_string())
    }
}

impl From<serde_json::Error> for VendorError {
    fn from(e: serde_json::Error) -> Self {
        VendorError::Payload(e.to_string())
    }
}

/// Integration entry setup failure.
///
/// Only [`SetupError::NotReady`] is retried by the controller, all other errors leave the entry
/// in the setup error state until it is reconfigured.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum SetupError {
    #[display("Authentication failed: {_0}")]
    AuthFailed(String),

    /// Temporary connectivity issue, setup should be retried later.
    #[display("Not ready: {_0}")]
    NotReady(String),

    #[display("No devices found: {_0}")]
    NoDevices(String),

    #[display("Setup failed: {_0}")]
    Failed(String),
}

impl std::error::Error for SetupError {}

impl SetupError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SetupError::NotReady(_))
    }
}

impl From<VendorError> for SetupError {
    fn from(e: VendorError) -> Self {
        match e {
            VendorError::Auth(msg) => SetupError::AuthFailed(msg),
            VendorError::Timeout => SetupError::NotReady(e.to_string()),
            e => SetupError::Failed(e.to_string()),
        }
    }
}
