//! Axum endpoint for payment notifications

use crate::notification::{
    handle_notification, parse_notification_body, NotificationHandler, NotificationVerifier,
};
use crate::PayssionError;
use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Shared state behind the notification route
#[derive(Clone)]
pub struct NotificationState {
    verifier: NotificationVerifier,
    handler: Arc<dyn NotificationHandler>,
}

impl NotificationState {
    pub fn new<H>(verifier: NotificationVerifier, handler: H) -> Self
    where
        H: NotificationHandler + 'static,
    {
        Self {
            verifier,
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for NotificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationState")
            .field("verifier", &self.verifier)
            .field("handler", &"<handler>")
            .finish()
    }
}

/// Router accepting notifications with `POST path`.
///
/// Responds 200 once the handler succeeds, 400 for an unparseable or
/// incomplete body, 401 on a signature mismatch and 500 when the handler
/// fails. The handler runs on tokio's blocking pool, so it may do
/// synchronous I/O.
pub fn notification_router<H>(path: &str, verifier: NotificationVerifier, handler: H) -> Router
where
    H: NotificationHandler + 'static,
{
    Router::new()
        .route(path, post(receive_notification))
        .with_state(NotificationState::new(verifier, handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Axum handler behind [`notification_router`]
pub async fn receive_notification(
    State(state): State<NotificationState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let record = match parse_notification_body(content_type, &body) {
        Ok(record) => record,
        Err(e) => return error_response(&e),
    };

    // handlers are synchronous and may block on I/O
    let outcome = tokio::task::spawn_blocking(move || {
        handle_notification(&state.verifier, record, state.handler.as_ref())
    })
    .await
    .unwrap_or_else(|e| Err(PayssionError::handler(e)));

    match outcome {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(error: &PayssionError) -> Response {
    let message = match error {
        PayssionError::Unauthorized => "signature mismatch".to_string(),
        PayssionError::Handler(_) => "notification handler failed".to_string(),
        other => other.to_string(),
    };
    (error.status_code(), Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::notification::InboundNotification;
    use axum::{body::Body, http::Request};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt; // for oneshot

    const FORM_BODY: &str = "pm_id=alipay_cn&amount=1&currency=CNY&order_id=test001&state=completed&notify_sig=42d1b8b2a95fd1210d07a9a85cc0c664";

    fn app(calls: Arc<AtomicUsize>, fail: bool) -> Router {
        let handler = move |_: &InboundNotification| -> std::result::Result<(), BoxError> {
            calls.fetch_add(1, Ordering::SeqCst);
            if fail {
                Err("order store unavailable".into())
            } else {
                Ok(())
            }
        };
        notification_router("/notify", NotificationVerifier::new("ak1", "sk1"), handler)
    }

    fn post(content_type: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/notify")
            .header(CONTENT_TYPE, content_type)
            .body(body.into())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_valid_form_notification_returns_200() {
        let calls = Arc::new(AtomicUsize::new(0));
        let response = app(calls.clone(), false)
            .oneshot(post("application/x-www-form-urlencoded", FORM_BODY))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_valid_json_notification_returns_200() {
        let calls = Arc::new(AtomicUsize::new(0));
        let body = json!({
            "pm_id": "alipay_cn",
            "amount": "1",
            "currency": "CNY",
            "order_id": "test001",
            "state": "completed",
            "notify_sig": "42d1b8b2a95fd1210d07a9a85cc0c664",
        })
        .to_string();

        let response = app(calls.clone(), false)
            .oneshot(post("application/json", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_signature_mismatch_returns_401() {
        let calls = Arc::new(AtomicUsize::new(0));
        let body = FORM_BODY.replace("completed", "failed");

        let response = app(calls.clone(), false)
            .oneshot(post("application/x-www-form-urlencoded", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(body_json(response).await["error"], "signature mismatch");
    }

    #[tokio::test]
    async fn test_missing_fields_return_400() {
        let calls = Arc::new(AtomicUsize::new(0));
        let response = app(calls.clone(), false)
            .oneshot(post("application/x-www-form-urlencoded", "pm_id=alipay_cn"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bad_json_returns_400() {
        let calls = Arc::new(AtomicUsize::new(0));
        let response = app(calls.clone(), false)
            .oneshot(post("application/json", "{\"amount\": 1}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_failure_returns_500() {
        let calls = Arc::new(AtomicUsize::new(0));
        let response = app(calls.clone(), true)
            .oneshot(post("application/x-www-form-urlencoded", FORM_BODY))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(body_json(response).await["error"], "notification handler failed");
    }

    #[tokio::test]
    async fn test_handler_runs_off_the_runtime_thread() {
        let runtime_thread = std::thread::current().id();
        let handler_thread = Arc::new(std::sync::Mutex::new(None));

        let seen = handler_thread.clone();
        let handler = move |_: &InboundNotification| -> std::result::Result<(), BoxError> {
            *seen.lock().unwrap() = Some(std::thread::current().id());
            Ok(())
        };
        let app = notification_router("/notify", NotificationVerifier::new("ak1", "sk1"), handler);

        let response = app
            .oneshot(post("application/x-www-form-urlencoded", FORM_BODY))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let ran_on = handler_thread.lock().unwrap().expect("handler should have run");
        assert_ne!(ran_on, runtime_thread);
    }

    #[tokio::test]
    async fn test_get_is_not_routed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let response = app(calls, false)
            .oneshot(Request::builder().uri("/notify").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
