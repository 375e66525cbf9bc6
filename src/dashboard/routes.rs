//! JSON endpoints for the dashboard.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info};

use super::{Dashboard, DashboardError};
use crate::config::DEFAULT_FETCH_LIMIT;

/// Every request locks the dashboard for its whole duration.
pub type SharedDashboard = Arc<Mutex<Dashboard>>;

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            DashboardError::Auth(e) if e.is_configuration() => StatusCode::INTERNAL_SERVER_ERROR,
            DashboardError::Auth(_) => StatusCode::UNAUTHORIZED,
            DashboardError::UnknownMessage(_) => StatusCode::NOT_FOUND,
            DashboardError::Classifier(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::Mailbox(_) => StatusCode::BAD_GATEWAY,
            DashboardError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Dashboard request failed");
        }
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

#[derive(Deserialize)]
struct FetchParams {
    limit: Option<u32>,
}

#[derive(Deserialize)]
struct ReplyBody {
    body: String,
}

async fn health(State(dashboard): State<SharedDashboard>) -> impl IntoResponse {
    Json(dashboard.lock().await.status())
}

async fn authenticate(State(dashboard): State<SharedDashboard>) -> Result<impl IntoResponse, DashboardError> {
    dashboard.lock().await.authenticate().await?;
    Ok(Json(json!({"authenticated": true})))
}

async fn list_messages(
    State(dashboard): State<SharedDashboard>,
    Query(params): Query<FetchParams>,
) -> Result<impl IntoResponse, DashboardError> {
    let limit = params.limit.unwrap_or(DEFAULT_FETCH_LIMIT);
    let items = dashboard.lock().await.fetch_and_classify(limit).await?;
    Ok(Json(items))
}

async fn send_reply(
    State(dashboard): State<SharedDashboard>,
    Path(id): Path<String>,
    Json(reply): Json<ReplyBody>,
) -> Result<Response, DashboardError> {
    let sent = dashboard.lock().await.send_reply(&id, &reply.body).await?;
    let status = if sent { StatusCode::OK } else { StatusCode::BAD_GATEWAY };
    Ok((status, Json(json!({"sent": sent}))).into_response())
}

async fn upload_training_data(
    State(dashboard): State<SharedDashboard>,
    body: Bytes,
) -> Result<impl IntoResponse, DashboardError> {
    let path = dashboard.lock().await.upload_training_data(&body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"path": path.display().to_string(), "bytes": body.len()})),
    ))
}

async fn retrain(State(dashboard): State<SharedDashboard>) -> Result<impl IntoResponse, DashboardError> {
    let summary = dashboard.lock().await.retrain().await?;
    info!(samples = summary.samples, source = ?summary.source, "Classifier retrained from dashboard");
    Ok(Json(summary))
}

pub fn router(dashboard: SharedDashboard) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth", post(authenticate))
        .route("/messages", get(list_messages))
        .route("/messages/{id}/reply", post(send_reply))
        .route("/training-data", put(upload_training_data))
        .route("/retrain", post(retrain))
        .with_state(dashboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::tests::{dashboard, inbox_message};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn empty(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    fn reply_request(id: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/messages/{id}/reply"))
            .header("content-type", "application/json")
            .body(Body::from(json!({"body": body}).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn messages_before_auth_is_unauthorized() {
        let dir = tempfile::tempdir().unwrap();
        let (d, _) = dashboard(&dir, vec![inbox_message("m1", "hi friend")]).await;
        let app = router(Arc::new(Mutex::new(d)));

        let (status, body) = call(&app, empty("GET", "/messages")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("Not authenticated"));
    }

    #[tokio::test]
    async fn review_and_reply_flow() {
        let dir = tempfile::tempdir().unwrap();
        let (d, recorded) = dashboard(&dir, vec![inbox_message("m1", "hi friend"), inbox_message("m2", "project status update")]).await;
        let app = router(Arc::new(Mutex::new(d)));

        let (status, body) = call(&app, empty("POST", "/retrain")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "seed");

        let (status, _) = call(&app, empty("POST", "/auth")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, empty("GET", "/messages?limit=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["label"], "personal");
        assert_eq!(body[0]["message"]["id"], "m1");

        let (status, body) = call(&app, reply_request("m1", "See you soon")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sent"], true);
        assert_eq!(recorded.lock().unwrap().sent[0].body, "See you soon");

        // m2 was never listed, so there is nothing to reply to.
        let (status, body) = call(&app, reply_request("m2", "Thanks")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("m2"));
        assert_eq!(recorded.lock().unwrap().sent.len(), 1);
    }

    #[tokio::test]
    async fn upload_then_health_reports_new_labels() {
        let dir = tempfile::tempdir().unwrap();
        let (d, _) = dashboard(&dir, vec![]).await;
        let app = router(Arc::new(Mutex::new(d)));

        let request = Request::builder()
            .method("PUT")
            .uri("/training-data")
            .body(Body::from("text,label\ninvoice due,billing\nparty tonight,personal\n"))
            .unwrap();
        let (status, _) = call(&app, request).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = call(&app, empty("POST", "/retrain")).await;
        assert_eq!(body["source"], "uploaded");

        let (status, body) = call(&app, empty("GET", "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trained"], true);
        assert_eq!(body["labels"], json!(["billing", "personal"]));
    }
}
