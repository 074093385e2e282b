use axum::{http::StatusCode, Json};
use serde::Serialize;
use thiserror::Error;

use crate::pathsafe::PathError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("origin denied")]
    OriginDenied,
    #[error("request too large")]
    RequestTooLarge,
    #[error("rate limited")]
    RateLimited,
    #[error("not found")]
    NotFound,
    #[error("path escapes permitted roots: {0}")]
    PathEscape(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("directory not accessible: {0}")]
    DirectoryAccess(String),
    #[error("operation {0} not supported by the active engine")]
    EngineUnavailable(String),
    #[error("engine failed: {0}")]
    EngineFailed(String),
    #[error("engine timeout")]
    EngineTimeout,
    #[error("no QR codes found in the image")]
    NoQrFound,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "Unauthorized",
            AppError::OriginDenied => "OriginDenied",
            AppError::RequestTooLarge => "RequestTooLarge",
            AppError::RateLimited => "RateLimited",
            AppError::NotFound => "NotFound",
            AppError::PathEscape(_) => "PathEscape",
            AppError::InvalidRequest(_) => "InvalidRequest",
            AppError::DirectoryAccess(_) => "DirectoryAccess",
            AppError::EngineUnavailable(_) => "EngineUnavailable",
            AppError::EngineFailed(_) => "EngineFailed",
            AppError::EngineTimeout => "EngineTimeout",
            AppError::NoQrFound => "NoQrFound",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::OriginDenied | AppError::PathEscape(_) => StatusCode::FORBIDDEN,
            AppError::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound | AppError::NoQrFound => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_)
            | AppError::EngineUnavailable(_)
            | AppError::EngineFailed(_) => StatusCode::BAD_REQUEST,
            AppError::EngineTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::DirectoryAccess(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// One user-presentable line per error kind. The structured code stays
    /// authoritative; this is the text a chat host can relay verbatim.
    pub fn user_hint(&self) -> &'static str {
        match self {
            AppError::PathEscape(_) => "Use a path inside your workspace directory.",
            AppError::DirectoryAccess(_) => {
                "The output directory could not be created or written. Check its permissions."
            }
            AppError::EngineUnavailable(_) => {
                "This operation needs Python with the QR packages installed: \
                 pip install qrcode[pil] pillow pyzbar opencv-python numpy"
            }
            AppError::NoQrFound => {
                "No QR codes were found. Make sure the image contains a readable QR code."
            }
            AppError::EngineTimeout => "The QR engine took too long. Try a smaller input.",
            AppError::EngineFailed(_) | AppError::InvalidRequest(_) => {
                "Check your input and try again."
            }
            _ => "The QR tool could not complete the request.",
        }
    }
}

impl From<PathError> for AppError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::Escape { request, .. } => AppError::PathEscape(request),
            PathError::InvalidRequest { request, reason } => {
                AppError::InvalidRequest(format!("{reason}: {request}"))
            }
            PathError::DirectoryAccess { path, source } => {
                AppError::DirectoryAccess(format!("{}: {source}", path.display()))
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub hint: &'static str,
}

pub fn into_response(err: AppError) -> (StatusCode, Json<ErrorBody>) {
    let body = ErrorBody {
        code: err.code(),
        message: err.to_string(),
        hint: err.user_hint(),
    };
    (err.status(), Json(body))
}
