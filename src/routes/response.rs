// Response envelope shared by every /api route: {status, message?, data?}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::MonitorError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            status: true,
            message: None,
            data: Some(data),
        })
    }
}

impl ApiResponse<()> {
    pub fn message(status: bool, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status,
            message: Some(message.into()),
            data: None,
        })
    }
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let code = match &self {
            MonitorError::Validation(_) => StatusCode::BAD_REQUEST,
            MonitorError::InterfaceNotFound(_) | MonitorError::PeerNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            MonitorError::Busy => StatusCode::CONFLICT,
        };
        (code, ApiResponse::message(false, self.to_string())).into_response()
    }
}
