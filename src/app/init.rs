/*
 * This file is part of the Obvia ERP.
 *
 * Copyright (C) 2025 Kovács Dávid <kapcsolat@kovacsdavid.dev>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */
use crate::app::AppState;
use crate::app::config::AppConfig;
use crate::app::database::PersistenceGateway;
use crate::common::envelope::respond_error;
use crate::common::error::AppError;
use anyhow::Result;
use axum::Json;
use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::get;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::BoxError;
use tower::ServiceBuilder;
use tower::timeout::error::Elapsed;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub fn init_subscriber() {
    tracing_subscriber::fmt::init();
}

/// `GET /healthz`: the one route exempt from both authentication and the
/// envelope (§6.1) — a load balancer's liveness probe should not have to
/// parse `{data, errors, meta}` to tell the process is up.
async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Converts a `TimeoutLayer` elapsed error into the usual envelope rather
/// than tower's bare `BoxError` response — the per-request deadline (§5)
/// surfaces the same way every other rejection does.
async fn handle_timeout_error(err: BoxError) -> axum::response::Response {
    if err.is::<Elapsed>() {
        respond_error(AppError::ResourceExhausted.trace(), "unknown")
    } else {
        respond_error(AppError::Internal(err.to_string()).trace(), "unknown")
    }
}

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let allow_origin = if allowed_origins.trim() == "*" {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-tenant-id"),
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-csrf-token"),
        ])
}

/// `CorsLayer` answers a preflight itself with `200`; §6.1 specifies `204`
/// for `OPTIONS`. Rewrites the status after the fact rather than hand-rolling
/// preflight handling — everything else about `CorsLayer`'s preflight
/// response (the `Access-Control-*` headers) is correct as-is.
async fn rewrite_preflight_status(req: axum::extract::Request, next: axum::middleware::Next) -> axum::response::Response {
    let is_preflight = req.method() == Method::OPTIONS;
    let mut response = next.run(req).await;
    if is_preflight && response.status() == axum::http::StatusCode::OK {
        *response.status_mut() = axum::http::StatusCode::NO_CONTENT;
    }
    response
}

/// Assembles the full HTTP application: connects the pool, runs migrations,
/// builds the router, and layers on the ambient stack (request id, tracing,
/// CORS) — mirrored on `manager/app/init.rs`'s `init_default_app`, generalized
/// from its per-module `.merge(...routes(module.clone()))` fan-out down to
/// this core's single `appointments` surface plus `/healthz`.
pub async fn init_default_app() -> Result<(Arc<AppConfig>, Router)> {
    let config = Arc::new(AppConfig::from_env()?);
    let persistence = PersistenceGateway::connect(config.persistence()).await?;
    persistence.migrate().await?;

    let state = Arc::new(AppState::new((*config).clone(), persistence));

    let eviction_limiter = state.move_rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            eviction_limiter.evict_idle(Duration::from_secs(300)).await;
        }
    });

    let request_id_header = HeaderName::from_static("x-request-id");
    let request_deadline = Duration::from_millis(config.request_deadline_ms());

    let router = Router::new()
        .nest("/api", crate::appointments::routes::routes(state.clone()))
        .route("/healthz", get(healthz))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    request_id_header.clone(),
                    MakeRequestUuid,
                ))
                .layer(PropagateRequestIdLayer::new(request_id_header))
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(rewrite_preflight_status))
                .layer(cors_layer(config.cors().allowed_origins()))
                .layer(axum::error_handling::HandleErrorLayer::new(handle_timeout_error))
                .timeout(request_deadline),
        );

    Ok((config, router))
}
