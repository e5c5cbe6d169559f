//! JSON response envelope
//!
//! Every endpoint answers with the same envelope: `{success, data, meta}` on
//! success and `{success, error, meta}` on failure. `meta` always carries an
//! RFC 3339 timestamp and, on list endpoints, pagination fields.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

/// Response metadata. Pagination fields are flattened next to the timestamp
/// when present.
#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub timestamp: String,
    #[serde(flatten)]
    pub pagination: Option<Pagination>,
}

impl Meta {
    fn now() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            pagination: None,
        }
    }
}

/// Pagination block for list endpoints
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl Pagination {
    /// Build a pagination block, deriving the page count from the total
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        Self {
            total,
            page,
            per_page,
            total_pages: total.div_ceil(per_page),
        }
    }
}

/// Error payload inside the envelope
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The response envelope itself. Success responses always carry a `data`
/// key, even when the payload is null; error responses carry `error` instead.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub meta: Meta,
}

/// Field-level validation failures, keyed by input field name.
///
/// A field maps to either a single message or a list of messages (password
/// strength reports every violated rule).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    fields: serde_json::Map<String, Value>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a one-field failure
    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record a single message for a field
    pub fn add(&mut self, field: &str, message: &str) {
        self.fields
            .insert(field.to_string(), Value::String(message.to_string()));
    }

    /// Record a list of messages for a field
    pub fn add_list(&mut self, field: &str, messages: Vec<String>) {
        self.fields.insert(
            field.to_string(),
            Value::Array(messages.into_iter().map(Value::String).collect()),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// 200 success with a JSON payload
pub fn success(data: impl Serialize) -> Response {
    success_with_status(StatusCode::OK, data)
}

/// 201 success for newly created resources
pub fn created(data: impl Serialize) -> Response {
    success_with_status(StatusCode::CREATED, data)
}

/// Success with an explicit status code
pub fn success_with_status(status: StatusCode, data: impl Serialize) -> Response {
    let envelope = ApiResponse {
        success: true,
        data: Some(serde_json::to_value(data).unwrap_or(Value::Null)),
        error: None,
        meta: Meta::now(),
    };

    (status, Json(envelope)).into_response()
}

/// 200 success for list endpoints, with pagination in `meta`
pub fn success_paginated(data: impl Serialize, pagination: Pagination) -> Response {
    let mut meta = Meta::now();
    meta.pagination = Some(pagination);

    let envelope = ApiResponse {
        success: true,
        data: Some(serde_json::to_value(data).unwrap_or(Value::Null)),
        error: None,
        meta,
    };

    (StatusCode::OK, Json(envelope)).into_response()
}

/// Error response with a machine-readable code
pub fn error(status: StatusCode, code: &str, message: &str) -> Response {
    error_with_details(status, code, message, None)
}

/// Error response carrying structured details
pub fn error_with_details(
    status: StatusCode,
    code: &str,
    message: &str,
    details: Option<Value>,
) -> Response {
    let envelope = ApiResponse {
        success: false,
        data: None,
        error: Some(ErrorBody {
            code: code.to_string(),
            message: message.to_string(),
            details,
        }),
        meta: Meta::now(),
    };

    (status, Json(envelope)).into_response()
}

/// 422 with field-level validation details
pub fn validation_error(errors: ValidationErrors) -> Response {
    error_with_details(
        StatusCode::UNPROCESSABLE_ENTITY,
        "VALIDATION_ERROR",
        "Validation failed",
        Some(errors.into_value()),
    )
}

/// 404 with an optional custom message
pub fn not_found(message: &str) -> Response {
    error(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

/// 401 with an optional custom message
pub fn unauthorized(message: &str) -> Response {
    error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
}

/// 403 with an optional custom message
pub fn forbidden(message: &str) -> Response {
    error(StatusCode::FORBIDDEN, "FORBIDDEN", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ========================================================================
    // Success Envelope Tests
    // ========================================================================

    #[tokio::test]
    async fn test_success_envelope() {
        let response = success(json!({"message": "hello"}));
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["message"], json!("hello"));
        assert!(body["meta"]["timestamp"].is_string());
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_success_with_null_data_keeps_key() {
        let response = success(Value::Null);
        let body = body_json(response).await;

        assert!(body.as_object().unwrap().contains_key("data"));
        assert_eq!(body["data"], Value::Null);
    }

    #[tokio::test]
    async fn test_created_status() {
        let response = created(json!({"id": 1}));
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_success_paginated_meta() {
        let response = success_paginated(json!([1, 2, 3]), Pagination::new(41, 2, 20));
        let body = body_json(response).await;

        assert_eq!(body["meta"]["total"], json!(41));
        assert_eq!(body["meta"]["page"], json!(2));
        assert_eq!(body["meta"]["per_page"], json!(20));
        assert_eq!(body["meta"]["total_pages"], json!(3));
        assert!(body["meta"]["timestamp"].is_string());
    }

    // ========================================================================
    // Error Envelope Tests
    // ========================================================================

    #[tokio::test]
    async fn test_error_envelope() {
        let response = error(StatusCode::CONFLICT, "EMAIL_EXISTS", "Email already registered");
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = body_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"]["code"], json!("EMAIL_EXISTS"));
        assert_eq!(body["error"]["message"], json!("Email already registered"));
        assert!(body.get("data").is_none());
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn test_validation_error_envelope() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "Email is required");
        errors.add_list(
            "password",
            vec!["Password must be at least 8 characters long".to_string()],
        );

        let response = validation_error(errors);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));
        assert_eq!(body["error"]["message"], json!("Validation failed"));
        assert_eq!(body["error"]["details"]["email"], json!("Email is required"));
        assert_eq!(
            body["error"]["details"]["password"],
            json!(["Password must be at least 8 characters long"])
        );
    }

    #[tokio::test]
    async fn test_status_helpers() {
        assert_eq!(
            not_found("Route not found").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            unauthorized("Authentication required").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            forbidden("Access forbidden").status(),
            StatusCode::FORBIDDEN
        );
    }

    // ========================================================================
    // ValidationErrors Tests
    // ========================================================================

    #[test]
    fn test_validation_errors_empty() {
        let errors = ValidationErrors::new();
        assert!(errors.is_empty());

        let errors = ValidationErrors::single("email", "Email is required");
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_validation_errors_into_value() {
        let mut errors = ValidationErrors::new();
        errors.add("current_password", "Current password is required");
        errors.add("new_password", "New password is required");

        let value = errors.into_value();
        assert_eq!(
            value["current_password"],
            json!("Current password is required")
        );
        assert_eq!(value["new_password"], json!("New password is required"));
    }

    // ========================================================================
    // Pagination Tests
    // ========================================================================

    #[test]
    fn test_pagination_total_pages() {
        assert_eq!(Pagination::new(0, 1, 20).total_pages, 0);
        assert_eq!(Pagination::new(20, 1, 20).total_pages, 1);
        assert_eq!(Pagination::new(21, 1, 20).total_pages, 2);
        assert_eq!(Pagination::new(41, 3, 20).total_pages, 3);
    }
}
