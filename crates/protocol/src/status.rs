//! Application status decoding.

use serde::{Deserialize, Serialize};

use crate::messages::ApiResponse;

/// `apiCode` of a processed request.
pub const API_CODE_SUCCESS: i64 = 600;

/// `apiCode` of a unit the service already holds.
pub const API_CODE_DUPLICATE: i64 = 660;

/// `apiCode` of a rejected access token.
pub const API_CODE_BAD_LOGIN: i64 = 401;

/// Outcome class of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Success,
    Duplicate,
    BadLogin,
    /// Body could not be parsed or carried no status.
    StatusIncorrect,
    /// Any other application code; treated as a generic failure.
    Other(i64),
}

impl StatusCode {
    pub fn from_api_code(code: i64) -> Self {
        match code {
            API_CODE_SUCCESS => StatusCode::Success,
            API_CODE_DUPLICATE => StatusCode::Duplicate,
            API_CODE_BAD_LOGIN => StatusCode::BadLogin,
            other => StatusCode::Other(other),
        }
    }
}

/// Classifies a raw response body.
///
/// Never fails: a missing, empty or unreadable body is
/// [`StatusCode::StatusIncorrect`].
pub fn interpret(body: &str) -> StatusCode {
    ApiResponse::parse(body)
        .map(|resp| resp.status_code())
        .unwrap_or(StatusCode::StatusIncorrect)
}
