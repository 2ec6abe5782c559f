//! Fake monitoring agent served over loopback for end-to-end tests.
#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub enum Reply {
    Json(Value),
    Raw(StatusCode, &'static str),
    Slow(Duration, Value),
}

#[derive(Clone, Default)]
pub struct FakeAgent {
    charts: HashMap<String, Reply>,
}

impl FakeAgent {
    /// Agent answering all four charts with one full row each
    pub fn healthy() -> Self {
        FakeAgent::default()
            .reply("system.cpu", Reply::Json(rows(&[10.0, 70.0, 15.0, 5.0])))
            .reply("system.ram", Reply::Json(rows(&[8192.0, 1024.0, 6144.0, 1024.0])))
            .reply("disk_space._", Reply::Json(rows(&[500.0, 300.0, 200.0])))
            .reply("system.net", Reply::Json(rows(&[1200.5, -800.25])))
    }

    pub fn reply(mut self, chart: &str, reply: Reply) -> Self {
        self.charts.insert(chart.to_string(), reply);
        self
    }

    /// Serve on an ephemeral loopback port; returns `127.0.0.1:<port>`
    pub async fn spawn(self) -> String {
        let app = Router::new()
            .route("/api/v1/data", get(data))
            .with_state(Arc::new(self));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr.to_string()
    }
}

/// Agent-style body holding one row: timestamp followed by `dims`
pub fn rows(dims: &[f64]) -> Value {
    let mut row = vec![json!(1_700_000_000)];
    row.extend(dims.iter().map(|d| json!(d)));
    json!({ "labels": ["time"], "data": [row] })
}

pub fn no_rows() -> Value {
    json!({ "labels": ["time"], "data": [] })
}

async fn data(
    State(agent): State<Arc<FakeAgent>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.get("points").map(String::as_str) != Some("1") {
        return (StatusCode::BAD_REQUEST, "points=1 expected").into_response();
    }
    let chart = params.get("chart").cloned().unwrap_or_default();
    match agent.charts.get(&chart).cloned() {
        Some(Reply::Json(body)) => Json(body).into_response(),
        Some(Reply::Raw(status, body)) => (status, body).into_response(),
        Some(Reply::Slow(delay, body)) => {
            tokio::time::sleep(delay).await;
            Json(body).into_response()
        }
        None => (StatusCode::NOT_FOUND, "chart not found").into_response(),
    }
}

/// An address nothing is listening on
pub fn closed_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}
