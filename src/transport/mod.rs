//! JSON-over-HTTP transport layer.
//!
//! The canonical operation is `POST /identify`. The transport validates
//! and coerces the request body (numeric phone numbers become strings),
//! delegates to the resolver, and renders the consolidated view in the
//! published wire format. Validation failures map to 400 with the
//! client-facing message; everything else maps to an opaque 500.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::{IdentityError, ValidationError};
use crate::request::IdentifyRequest;
use crate::resolver::IdentityResolver;
use crate::view::ConsolidatedView;

/// Shared application state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    resolver: Arc<IdentityResolver>,
}

impl AppState {
    /// Creates the state wrapping a resolver.
    #[must_use]
    pub fn new(resolver: Arc<IdentityResolver>) -> Self {
        Self { resolver }
    }
}

/// Builds the service router: `POST /identify` and `GET /health`, with
/// request tracing and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/identify", post(identify))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ContactBody {
    // The misspelling is part of the published wire contract; clients
    // match on this exact key.
    #[serde(rename = "primaryContatctId")]
    primary_contact_id: i64,
    emails: Vec<String>,
    #[serde(rename = "phoneNumbers")]
    phone_numbers: Vec<String>,
    #[serde(rename = "secondaryContactIds")]
    secondary_contact_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct IdentifyResponse {
    contact: ContactBody,
}

impl From<ConsolidatedView> for IdentifyResponse {
    fn from(view: ConsolidatedView) -> Self {
        Self {
            contact: ContactBody {
                primary_contact_id: view.primary_id.as_i64(),
                emails: view.emails,
                phone_numbers: view.phone_numbers,
                secondary_contact_ids: view
                    .secondary_ids
                    .iter()
                    .map(|id| id.as_i64())
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

/// Transport-level error wrapper mapping domain errors to HTTP statuses.
pub struct ApiError(IdentityError);

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(IdentityError::Validation(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            IdentityError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            other => {
                tracing::error!(error = %other, "identify request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Validates and coerces the raw JSON body into an [`IdentifyRequest`].
fn parse_identify_body(body: &Value) -> Result<IdentifyRequest, ValidationError> {
    let Some(object) = body.as_object() else {
        return Err(ValidationError::BodyNotAnObject);
    };

    let email = match object.get("email") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(ValidationError::EmailNotAString),
    };

    let phone_number = match object.get("phoneNumber") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        // Numeric phones are accepted and rendered in decimal form.
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => return Err(ValidationError::PhoneNotAStringOrNumber),
    };

    if let Some(email) = email.as_deref() {
        if !email.is_empty() && !email.contains('@') {
            return Err(ValidationError::InvalidEmailFormat);
        }
    }

    let request = IdentifyRequest::new(email, phone_number);
    request.validate()?;
    Ok(request)
}

async fn identify(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<IdentifyResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("identify", %request_id);
    let _guard = span.enter();

    let request = parse_identify_body(&body)?;
    let view = state.resolver.identify(&request)?;
    Ok(Json(IdentifyResponse::from(view)))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_accepts_string_fields() {
        let request =
            parse_identify_body(&json!({"email": "a@x.com", "phoneNumber": "111"})).unwrap();
        assert_eq!(request.email(), Some("a@x.com"));
        assert_eq!(request.phone(), Some("111"));
    }

    #[test]
    fn test_parse_coerces_numeric_phone() {
        let request = parse_identify_body(&json!({"phoneNumber": 123456})).unwrap();
        assert_eq!(request.phone(), Some("123456"));
    }

    #[test]
    fn test_parse_rejects_non_string_email() {
        let err = parse_identify_body(&json!({"email": 42})).unwrap_err();
        assert_eq!(err, ValidationError::EmailNotAString);
    }

    #[test]
    fn test_parse_rejects_bad_phone_type() {
        let err = parse_identify_body(&json!({"phoneNumber": ["111"]})).unwrap_err();
        assert_eq!(err, ValidationError::PhoneNotAStringOrNumber);
    }

    #[test]
    fn test_parse_rejects_email_without_at() {
        let err = parse_identify_body(&json!({"email": "not-an-email"})).unwrap_err();
        assert_eq!(err, ValidationError::InvalidEmailFormat);
    }

    #[test]
    fn test_parse_rejects_empty_body() {
        let err = parse_identify_body(&json!({})).unwrap_err();
        assert_eq!(err, ValidationError::MissingContactField);

        let err = parse_identify_body(&json!("just a string")).unwrap_err();
        assert_eq!(err, ValidationError::BodyNotAnObject);
    }

    #[test]
    fn test_response_wire_shape() {
        use crate::contact::ContactId;

        let view = ConsolidatedView {
            primary_id: ContactId::from_i64(1),
            emails: vec!["a@x.com".to_string()],
            phone_numbers: vec!["111".to_string()],
            secondary_ids: vec![ContactId::from_i64(2), ContactId::from_i64(3)],
        };
        let body = serde_json::to_value(IdentifyResponse::from(view)).unwrap();
        assert_eq!(body["contact"]["primaryContatctId"], 1);
        assert_eq!(body["contact"]["emails"][0], "a@x.com");
        assert_eq!(body["contact"]["phoneNumbers"][0], "111");
        assert_eq!(body["contact"]["secondaryContactIds"], json!([2, 3]));
    }
}
