use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;

/// Outcome tag carried by every response the service emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StdStatus {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "bad request")]
    BadRequest,
    #[serde(rename = "unauthorized")]
    Unauthorized,
    #[serde(rename = "permission denied")]
    PermissionDenied,
    #[serde(rename = "not found")]
    NotFound,
    #[serde(rename = "internal error")]
    InternalError,
}

impl From<&AppError> for StdStatus {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::BadRequest(_) => StdStatus::BadRequest,
            AppError::Unauthorized => StdStatus::Unauthorized,
            AppError::Forbidden => StdStatus::PermissionDenied,
            AppError::NotFound => StdStatus::NotFound,
            _ => StdStatus::InternalError,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StdResponse {
    pub status: StdStatus,
    pub message: String,
    pub data: Value,
}

impl StdResponse {
    pub fn success(data: Value) -> Self {
        StdResponse {
            status: StdStatus::Success,
            message: "success".to_string(),
            data,
        }
    }

    pub fn failure(err: &AppError) -> Self {
        StdResponse {
            status: StdStatus::from(err),
            message: public_message(err),
            data: Value::Null,
        }
    }
}

/// Message safe to put on the wire. Validation errors carry their own text,
/// everything else collapses to a canonical phrase so internals never leak.
pub fn public_message(err: &AppError) -> String {
    match err {
        AppError::BadRequest(msg) => msg.clone(),
        AppError::Conflict(msg) => msg.clone(),
        AppError::Unauthorized => "unauthorized".to_string(),
        AppError::Forbidden => "permission denied".to_string(),
        AppError::NotFound => "not found".to_string(),
        _ => "internal error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let resp = StdResponse::success(serde_json::json!({"id": 1}));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], "success");
        assert_eq!(json["data"]["id"], 1);
    }

    #[test]
    fn test_failure_statuses() {
        let cases = [
            (AppError::BadRequest("empty content".into()), "bad request"),
            (AppError::Unauthorized, "unauthorized"),
            (AppError::Forbidden, "permission denied"),
            (AppError::NotFound, "not found"),
            (AppError::Internal("boom".into()), "internal error"),
        ];
        for (err, expected) in cases {
            let json = serde_json::to_value(StdResponse::failure(&err)).unwrap();
            assert_eq!(json["status"], expected);
            assert!(json["data"].is_null());
        }
    }

    #[test]
    fn test_internal_details_not_leaked() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        let resp = StdResponse::failure(&err);
        assert_eq!(resp.message, "internal error");

        let err = AppError::Internal("pool exhausted at 10.0.0.3".into());
        let resp = StdResponse::failure(&err);
        assert_eq!(resp.message, "internal error");
    }

    #[test]
    fn test_bad_request_message_passthrough() {
        let err = AppError::BadRequest("content cannot be empty".into());
        let resp = StdResponse::failure(&err);
        assert_eq!(resp.message, "content cannot be empty");
    }
}
