//! Ingress handler that persists a to-do item and echoes it back.
//!
//! The handler performs two independent steps with one value: write the item
//! to the durable sink, then return the same item as the response body. A
//! response of 200 therefore always means the write succeeded.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use todofeed_core::{models::NewToDoItem, TodoError};
use tracing::{debug, error, info, instrument, warn};

use crate::AppState;

/// Route served by [`create_todo`].
pub const ROUTE: &str = "/api/httptrigger-sql-output";

/// Error response with code and message.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error code from the taxonomy (E1001 or E2001)
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// Writes the posted to-do item to the sink and returns it unchanged.
///
/// An absent `id` is replaced with a freshly generated one before the write,
/// so the stored row and the response always agree.
///
/// # Errors
///
/// Returns appropriate HTTP status codes:
/// - 400: Body is not a to-do item (`E1001`)
/// - 500: The sink failed to persist the item (`E2001`)
#[instrument(name = "create_todo", skip(state, payload))]
pub async fn create_todo(
    State(state): State<AppState>,
    payload: Result<Json<NewToDoItem>, JsonRejection>,
) -> Response {
    let Json(new_item) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(status = %rejection.status(), "Rejected to-do payload");
            return create_error_response(StatusCode::BAD_REQUEST, &TodoError::InvalidPayload {
                reason: rejection.body_text(),
            });
        },
    };

    let item = new_item.into_item();
    debug!(item_id = %item.id, "Writing to-do item");

    if let Err(source) = state.sink.write(&item).await {
        let err = TodoError::SinkWriteFailed { id: item.id, source };
        error!(item_id = %item.id, error = %err, "Failed to persist to-do item");
        return create_error_response(StatusCode::INTERNAL_SERVER_ERROR, &err);
    }

    info!(item_id = %item.id, "processed a to-do request");
    (StatusCode::OK, Json(item)).into_response()
}

fn create_error_response(status: StatusCode, error: &TodoError) -> Response {
    let error_response = ErrorResponse {
        error: ErrorDetail { code: error.code().to_string(), message: error.to_string() },
    };

    (status, Json(error_response)).into_response()
}

#[cfg(test)]
mod tests {
    use todofeed_core::{error::CoreError, models::ToDoId};

    use super::*;

    #[test]
    fn error_response_includes_code() {
        let error = TodoError::InvalidPayload { reason: "missing field `url`".to_string() };
        let response = create_error_response(StatusCode::BAD_REQUEST, &error);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn error_body_has_code_and_message() {
        let error = TodoError::SinkWriteFailed {
            id: ToDoId::new(),
            source: CoreError::Database("pool closed".to_string()),
        };
        let response = create_error_response(StatusCode::INTERNAL_SERVER_ERROR, &error);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(parsed.error.code, "E2001");
        assert!(parsed.error.message.contains("pool closed"));
    }
}
