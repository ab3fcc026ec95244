//! Web form and progress streaming over server-sent events
//!
//! - `GET /` the research form
//! - `GET /run?query=..&email=..` one pipeline run as an SSE stream
//! - `GET /health` liveness
//! - `GET /metrics` metrics snapshot

use crate::mail::is_plausible_address;
use crate::observability::metrics;
use crate::progress::{ProgressEvent, ProgressPayload};
use crate::research::ResearchManager;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

const INDEX_HTML: &str = include_str!("index.html");

/// Query string of `/run`; missing fields are treated as empty
#[derive(Debug, Default, Deserialize)]
pub struct RunParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub email: String,
}

impl RunParams {
    /// Caller-side validation the pipeline itself does not repeat
    pub fn validate(&self) -> Result<(), String> {
        if self.query.trim().is_empty() {
            return Err("query must not be empty".to_string());
        }
        if self.email.trim().is_empty() {
            return Err("email must not be empty".to_string());
        }
        if !is_plausible_address(&self.email) {
            return Err(format!("'{}' is not an email address", self.email.trim()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
}

fn sse_event_name(event: &ProgressEvent) -> &'static str {
    match event.payload {
        ProgressPayload::Status(_) => "status",
        ProgressPayload::Report(_) => "report",
        ProgressPayload::Failure { .. } => "failure",
    }
}

fn to_sse_event(event: &ProgressEvent) -> warp::sse::Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    warp::sse::Event::default()
        .id(event.sequence.to_string())
        .event(sse_event_name(event))
        .data(data)
}

async fn handle_run(params: RunParams, manager: ResearchManager) -> Result<Response, Infallible> {
    if let Err(error) = params.validate() {
        warn!(error = %error, "Rejected research request");
        return Ok(warp::reply::with_status(
            warp::reply::json(&ErrorResponse { error }),
            StatusCode::BAD_REQUEST,
        )
        .into_response());
    }

    info!(query = %params.query.trim(), "Research requested over HTTP");
    let stream = manager
        .run(params.query.trim(), params.email.trim())
        .map(|event| Ok::<_, Infallible>(to_sse_event(&event)));

    Ok(warp::sse::reply(
        warp::sse::keep_alive()
            .interval(Duration::from_secs(15))
            .text("keepalive")
            .stream(stream),
    )
    .into_response())
}

fn with_manager(
    manager: ResearchManager,
) -> impl Filter<Extract = (ResearchManager,), Error = Infallible> + Clone {
    warp::any().map(move || manager.clone())
}

/// All routes, ready to serve or to test with `warp::test`
pub fn routes(
    manager: ResearchManager,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(INDEX_HTML));

    let run = warp::path("run")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<RunParams>())
        .and(with_manager(manager))
        .and_then(handle_run);

    let health = warp::path("health").and(warp::get()).map(|| {
        warp::reply::json(&HealthResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            timestamp: chrono::Utc::now(),
        })
    });

    let metrics_route = warp::path("metrics")
        .and(warp::get())
        .map(|| warp::reply::json(&metrics().get_metrics()));

    index.or(run).or(health).or(metrics_route)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    manager: ResearchManager,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), warp::Error> {
    let (bound, server) =
        warp::serve(routes(manager)).try_bind_with_graceful_shutdown(addr, shutdown)?;
    info!(addr = %bound, "Banking Bytes form listening on http://{bound}");
    server.await;
    info!("Web server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_params_validation() {
        let ok = RunParams {
            query: "Deposit trends".to_string(),
            email: "reader@example.com".to_string(),
        };
        assert!(ok.validate().is_ok());

        let empty_query = RunParams {
            query: "  ".to_string(),
            ..ok_params()
        };
        assert!(empty_query.validate().unwrap_err().contains("query"));

        let bad_email = RunParams {
            email: "reader".to_string(),
            ..ok_params()
        };
        assert!(bad_email.validate().is_err());
    }

    fn ok_params() -> RunParams {
        RunParams {
            query: "q".to_string(),
            email: "reader@example.com".to_string(),
        }
    }

    #[test]
    fn test_sse_event_names() {
        let event = ProgressEvent {
            sequence: 3,
            timestamp: chrono::Utc::now(),
            stage: crate::research::PipelineState::Failed,
            payload: ProgressPayload::Failure {
                kind: "send_error".to_string(),
                description: "rejected".to_string(),
            },
        };
        assert_eq!(sse_event_name(&event), "failure");
    }
}
