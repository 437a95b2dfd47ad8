use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use tracing::error;

use crate::model::regularization::RegularizationStatus;
use crate::store::StoreError;
use crate::utils::envelope::ApiEnvelope;

/// Coarse error classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    Unauthorized,
    InvalidState,
    Validation,
    NonWorkDay,
    Internal,
}

#[derive(Debug, Display, PartialEq)]
pub enum AttendanceError {
    #[display(fmt = "Authentication required")]
    Unauthenticated,
    #[display(fmt = "{} not found", _0)]
    NotFound(String),
    #[display(fmt = "{}", _0)]
    Unauthorized(String),
    #[display(fmt = "Cannot act on an employee of another organization")]
    CrossOrgAccess,
    #[display(fmt = "Already clocked in today")]
    AlreadyClockedIn,
    #[display(fmt = "Already clocked out today")]
    AlreadyClockedOut,
    #[display(fmt = "No active check-in found for today")]
    NotClockedIn,
    #[display(fmt = "Already on break")]
    AlreadyOnBreak,
    #[display(fmt = "Not on break")]
    NotOnBreak,
    #[display(fmt = "A regularization request is already pending for this attendance")]
    AlreadyPending,
    #[display(fmt = "This attendance has already been regularized")]
    AlreadyApproved,
    #[display(fmt = "Regularization is not pending (current status: {})", _0)]
    NotPending(RegularizationStatus),
    #[display(fmt = "{}", _0)]
    Validation(String),
    #[display(fmt = "Today is not a working day")]
    NonWorkDay,
    /// Detail is logged where the error is created, never sent to the client.
    #[display(fmt = "Internal server error")]
    Internal,
}

impl AttendanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AttendanceError::Unauthenticated => ErrorKind::Unauthenticated,
            AttendanceError::NotFound(_) => ErrorKind::NotFound,
            AttendanceError::Unauthorized(_) | AttendanceError::CrossOrgAccess => {
                ErrorKind::Unauthorized
            }
            AttendanceError::AlreadyClockedIn
            | AttendanceError::AlreadyClockedOut
            | AttendanceError::NotClockedIn
            | AttendanceError::AlreadyOnBreak
            | AttendanceError::NotOnBreak
            | AttendanceError::AlreadyPending
            | AttendanceError::AlreadyApproved
            | AttendanceError::NotPending(_) => ErrorKind::InvalidState,
            AttendanceError::Validation(_) => ErrorKind::Validation,
            AttendanceError::NonWorkDay => ErrorKind::NonWorkDay,
            AttendanceError::Internal => ErrorKind::Internal,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AttendanceError::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AttendanceError::Unauthorized(message.into())
    }
}

impl From<StoreError> for AttendanceError {
    fn from(e: StoreError) -> Self {
        error!(error = %e, "Attendance store failure");
        AttendanceError::Internal
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::InvalidState => StatusCode::CONFLICT,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NonWorkDay => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiEnvelope::<()>::failure(self.to_string()))
    }
}
