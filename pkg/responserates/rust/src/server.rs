// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use log::{error, info};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};

use crate::columns::Granularity;
use crate::errors::Rejection;
use crate::geography::StoreGeography;
use crate::params::RequestParams;
use crate::query::build_query;
use crate::render::{ChartRenderer, render};
use crate::store::QueryExecutor;
use crate::validate::validate_request;

pub type ResponseBody = BoxBody<Bytes, std::io::Error>;

const API_PREFIX: &str = "/api/response_rates/";
const HOME_PAGE: &str = include_str!("static/home.html");

/// Shared by every connection. The executor owns the connection pool.
#[derive(Clone)]
pub struct AppState {
    executor: Arc<dyn QueryExecutor>,
    charts: Arc<dyn ChartRenderer>,
}

impl AppState {
    pub fn new(executor: Arc<dyn QueryExecutor>, charts: Arc<dyn ChartRenderer>) -> Self {
        Self { executor, charts }
    }
}

fn full(body: impl Into<Bytes>) -> ResponseBody {
    Full::new(body.into()).map_err(|e| match e {}).boxed()
}

fn json_error(status: StatusCode, reason: &str) -> Result<Response<ResponseBody>> {
    let body = serde_json::to_vec(&json!({ "error": reason })).unwrap_or_else(|e| {
        error!("Failed to serialize error response: {e}");
        b"{}".to_vec()
    });
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full(body))
        .map_err(|e| anyhow!("Failed to build {status} response: {e}"))
}

fn bad_request(reason: &str) -> Result<Response<ResponseBody>> {
    json_error(StatusCode::BAD_REQUEST, reason)
}

fn not_found() -> Result<Response<ResponseBody>> {
    json_error(StatusCode::NOT_FOUND, "Not found")
}

fn landing_page() -> Result<Response<ResponseBody>> {
    Response::builder()
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .body(full(HOME_PAGE))
        .map_err(|e| anyhow!("Failed to build landing page response: {e}"))
}

/// Validate, query, render. Any failure yields a 400 and no partial data.
async fn handle_response_rates(
    state: &AppState,
    granularity: Granularity,
    query: Option<&str>,
) -> Result<Response<ResponseBody>> {
    let params = RequestParams::from_query(query);
    let geography = StoreGeography::new(state.executor.as_ref());

    let request = match validate_request(granularity, &params, &geography).await {
        Ok(request) => request,
        Err(rejection) => {
            info!("Rejected {granularity} request: {rejection}");
            return bad_request(&rejection.to_string());
        }
    };

    let sql = build_query(granularity, &request).to_sql();
    let rows = match state.executor.execute(&sql).await {
        Ok(rows) => rows,
        Err(e) => {
            error!("{granularity} query failed: {e}");
            return bad_request(&Rejection::Unavailable.to_string());
        }
    };
    info!("{granularity} query returned {} rows", rows.len());

    // Charts are CPU bound; keep them off the connection tasks.
    let format = request.format;
    let charts = state.charts.clone();
    let rendered = match tokio::task::spawn_blocking(move || {
        render(granularity, &request, &rows, charts.as_ref())
    })
    .await
    {
        Ok(Ok(rendered)) => rendered,
        Ok(Err(e)) => {
            error!("Failed to render {granularity} {format} response: {e}");
            return bad_request(&Rejection::Unavailable.to_string());
        }
        Err(e) => {
            error!("Render task for {granularity} {format} response failed: {e}");
            return bad_request(&Rejection::Unavailable.to_string());
        }
    };

    let mut builder = Response::builder().header(CONTENT_TYPE, rendered.content_type);
    if let Some(filename) = &rendered.filename {
        builder = builder.header(
            CONTENT_DISPOSITION,
            format!("attachment; filename={filename}"),
        );
    }
    builder
        .body(full(rendered.body))
        .map_err(|e| anyhow!("Failed to build response: {e}"))
}

/// Routes one request. The body is never read, so any body type is accepted.
pub async fn handle_request<B>(state: &AppState, req: Request<B>) -> Result<Response<ResponseBody>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/") => landing_page(),
        (&Method::GET, route) => match route
            .strip_prefix(API_PREFIX)
            .and_then(|name| name.parse::<Granularity>().ok())
        {
            Some(granularity) => {
                handle_response_rates(state, granularity, req.uri().query()).await
            }
            None => not_found(),
        },
        _ => not_found(),
    }?;

    info!("{method} {path} {}", response.status().as_u16());
    Ok(response)
}

async fn respond<B>(state: &AppState, req: Request<B>) -> Response<ResponseBody> {
    handle_request(state, req).await.unwrap_or_else(|e| {
        error!("Request handling failed: {e}");
        let mut response = Response::new(full(&b"Internal Server Error"[..]));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

/// Accepts connections until SIGTERM or SIGINT.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                let (stream, peer) = match accept_result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept connection: {e}");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let state = state.clone();

                tokio::task::spawn(async move {
                    let service = service_fn(move |req| {
                        let state = state.clone();
                        async move { Ok::<_, Infallible>(respond(&state, req).await) }
                    });
                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {peer}: {err}");
                    }
                });
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                return Ok(());
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::errors::{RenderError, StoreError};
    use crate::render::LineChart;
    use crate::store::{ResultSet, SqlQuery, Value};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers every query with the same rows and records the SQL it saw.
    struct CannedExecutor {
        rows: Option<ResultSet>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryExecutor for CannedExecutor {
        async fn execute(&self, query: &SqlQuery) -> Result<ResultSet, StoreError> {
            self.seen.lock().unwrap().push(query.sql.clone());
            self.rows
                .clone()
                .ok_or_else(|| StoreError::Worker("offline".to_string()))
        }
    }

    struct NoCharts;

    impl ChartRenderer for NoCharts {
        fn render(&self, _chart: &LineChart) -> Result<Vec<u8>, RenderError> {
            Err(RenderError::Chart("disabled".to_string()))
        }
    }

    struct CrashingCharts;

    impl ChartRenderer for CrashingCharts {
        fn render(&self, _chart: &LineChart) -> Result<Vec<u8>, RenderError> {
            panic!("renderer crashed");
        }
    }

    fn state_with(rows: Option<ResultSet>) -> (AppState, Arc<CannedExecutor>) {
        let executor = Arc::new(CannedExecutor {
            rows,
            seen: Mutex::new(vec![]),
        });
        (AppState::new(executor.clone(), Arc::new(NoCharts)), executor)
    }

    fn get(uri: &str) -> Request<()> {
        Request::get(uri).body(()).unwrap()
    }

    async fn body_string(response: Response<ResponseBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_landing_page() {
        let (state, executor) = state_with(None);
        let response = handle_request(&state, get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert!(body_string(response).await.contains("/api/response_rates/state"));
        assert!(executor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_routes_are_not_found() {
        let (state, _) = state_with(None);
        for uri in [
            "/api/response_rates/nation?FORMAT=JSON",
            "/api/response_rates/",
            "/api/response_rates/state/extra",
            "/favicon.ico",
        ] {
            let response = handle_request(&state, get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body_string(response).await, r#"{"error":"Not found"}"#);
        }
    }

    #[tokio::test]
    async fn test_non_get_is_not_found() {
        let (state, _) = state_with(None);
        let req = Request::post("/api/response_rates/state?FORMAT=JSON")
            .body(())
            .unwrap();
        let response = handle_request(&state, req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rejection_is_bad_request() {
        let (state, executor) = state_with(None);
        let response = handle_request(&state, get("/api/response_rates/state"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(
            body_string(response).await,
            r#"{"error":"Invalid FORMAT value"}"#
        );
        assert!(executor.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_generic_bad_request() {
        let (state, executor) = state_with(None);
        let response = handle_request(&state, get("/api/response_rates/state?FORMAT=CSV"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, r#"{"error":"Bad request"}"#);
        assert_eq!(executor.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_csv_is_an_attachment() {
        let rows = ResultSet {
            columns: vec!["RESP_DATE".into()],
            rows: vec![],
        };
        let (state, _) = state_with(Some(rows));
        let response = handle_request(&state, get("/api/response_rates/county?FORMAT=CSV"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=county_response_rates.csv"
        );
        assert_eq!(body_string(response).await, "RESP_DATE\n");
    }

    #[tokio::test]
    async fn test_crashed_render_is_generic_bad_request() {
        let rows = ResultSet {
            columns: vec!["state_short".into(), "RESP_DATE".into(), "CRRALL".into()],
            rows: vec![vec![
                Value::Text("CA".into()),
                Value::Date(time::macros::date!(2020 - 04 - 01)),
                Value::Real(40.0),
            ]],
        };
        let executor = Arc::new(CannedExecutor {
            rows: Some(rows),
            seen: Mutex::new(vec![]),
        });
        let state = AppState::new(executor, Arc::new(CrashingCharts));
        let response = handle_request(
            &state,
            get("/api/response_rates/state?FORMAT=PNG&DATA=CRRALL&STATE=CA"),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, r#"{"error":"Bad request"}"#);
    }

    #[tokio::test]
    async fn test_render_error_is_generic_bad_request() {
        let rows = ResultSet {
            columns: vec!["state_short".into(), "RESP_DATE".into(), "CRRALL".into()],
            rows: vec![vec![
                Value::Text("CA".into()),
                Value::Date(time::macros::date!(2020 - 04 - 01)),
                Value::Real(40.0),
            ]],
        };
        let (state, _) = state_with(Some(rows));
        let response = handle_request(
            &state,
            get("/api/response_rates/state?FORMAT=PNG&DATA=CRRALL&STATE=CA"),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, r#"{"error":"Bad request"}"#);
    }
}
