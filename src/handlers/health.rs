//! Liveness check.

use axum::{response::IntoResponse, response::Response, Json};
use serde::Serialize;

use crate::error::AppResult;
use crate::pipeline::RequestContext;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

pub async fn health(_ctx: RequestContext) -> AppResult<Response> {
    Ok(Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
    .into_response())
}
