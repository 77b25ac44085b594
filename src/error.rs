use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::fmt;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum DigsError {
    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("You must be logged in as a landlord.")]
    NotLoggedIn,

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{step}: {message}")]
    WriteFailed { step: WriteStep, message: String },

    #[error("Upstream error with status {status}: {message}")]
    Upstream { status: StatusCode, message: String },

    #[error("Invalid `{table}` row: {source}")]
    InvalidRow {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid login credentials.")]
    InvalidCredentials,

    #[error("Multipart error: {message}")]
    Multipart { status: StatusCode, message: String },

    #[error("Not found")]
    NotFound,

    #[error("Session check unavailable: {0}")]
    GuardUnavailable(String),
}

impl From<figment::Error> for DigsError {
    fn from(e: figment::Error) -> Self {
        DigsError::Config(Box::new(e))
    }
}

impl From<axum::extract::multipart::MultipartError> for DigsError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        DigsError::Multipart {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl DigsError {
    /// Tag a backend failure with the listing step that produced it.
    pub fn during(self, step: WriteStep) -> Self {
        let message = match self {
            DigsError::Upstream { message, .. } => message,
            DigsError::WriteFailed { message, .. } => message,
            other => other.to_string(),
        };
        DigsError::WriteFailed { step, message }
    }

    /// Auth endpoints answer 4xx for bad credentials or dead tokens.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, DigsError::Upstream { status, .. } if status.is_client_error())
    }
}

/// Local validation failures, surfaced to the user verbatim.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum ValidationError {
    #[error("Title is required.")]
    MissingTitle,

    #[error("Price must be a positive number.")]
    InvalidPrice,

    #[error("Location must be a valid latitude and longitude.")]
    InvalidLocation,

    #[error("Unknown amenity: {0}")]
    InvalidAmenity(String),

    #[error("Unknown property type: {0}")]
    InvalidPropertyType(String),

    #[error("Please upload at least one image.")]
    NoImages,

    #[error("Only image files are allowed ({name}).")]
    NotAnImage { name: String },

    #[error("Image size must be less than {limit_mib}MB ({name}).")]
    ImageTooLarge { name: String, limit_mib: u64 },

    #[error("Price filter must be a number: {0}")]
    InvalidPriceFilter(String),
}

/// Remote write steps of the listing workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    Property,
    Amenities,
    ImageUpload,
    ImageMetadata,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WriteStep::Property => "Error adding property",
            WriteStep::Amenities => "Error adding amenities",
            WriteStep::ImageUpload => "Error uploading image",
            WriteStep::ImageMetadata => "Error saving image metadata",
        };
        f.write_str(label)
    }
}

impl IntoResponse for DigsError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match &self {
            DigsError::NotLoggedIn => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            DigsError::Validation(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_FAILED",
                e.to_string(),
            ),
            DigsError::WriteFailed { .. } => {
                (StatusCode::BAD_GATEWAY, "WRITE_FAILED", self.to_string())
            }
            DigsError::NotFound => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Resource not found.".to_string(),
            ),
            DigsError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", self.to_string())
            }
            DigsError::Multipart { status, message } => {
                let code = if *status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PAYLOAD_TOO_LARGE"
                } else {
                    "BAD_REQUEST"
                };
                (*status, code, message.clone())
            }
            DigsError::GuardUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SESSION_UNAVAILABLE",
                "Unable to verify your session right now.".to_string(),
            ),
            DigsError::InvalidRow { .. } => (
                StatusCode::BAD_GATEWAY,
                "INVALID_ROW",
                "Backend returned an unexpected record.".to_string(),
            ),
            DigsError::Upstream { status, .. } => {
                let (code, msg) = match *status {
                    StatusCode::UNAUTHORIZED => ("UNAUTHORIZED", "Upstream authentication failed."),
                    StatusCode::FORBIDDEN => ("FORBIDDEN", "Upstream permission denied."),
                    StatusCode::NOT_FOUND => ("NOT_FOUND", "Upstream resource not found."),
                    _ => ("UPSTREAM_ERROR", "An upstream error occurred."),
                };
                (StatusCode::BAD_GATEWAY, code, msg.to_string())
            }
            DigsError::Reqwest(_) | DigsError::Json(_) => (
                StatusCode::BAD_GATEWAY,
                "BAD_GATEWAY",
                "Upstream service is unavailable.".to_string(),
            ),
            DigsError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred.".to_string(),
            ),
        };
        let body = ApiErrorBody {
            code: code.to_string(),
            message,
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
