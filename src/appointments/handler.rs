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
use crate::appointments::dto::{BoardQuery, ListParams, ListQuery, MoveRequest, StatsQuery};
use crate::appointments::service::BoardService;
use crate::auth::middleware::AuthenticatedPrincipal;
use crate::common::envelope::{Envelope, Meta, respond_error};
use crate::common::error::AppError;
use crate::common::extractors::ValidJson;
use crate::common::extractors::tenant_context::TenantContext;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn today() -> chrono::NaiveDate {
    Utc::now().date_naive()
}

pub async fn get_board(
    State(state): State<Arc<AppState>>,
    TenantContext(tenant): TenantContext,
    AuthenticatedPrincipal(_claims): AuthenticatedPrincipal,
    headers: HeaderMap,
    Query(query): Query<BoardQuery>,
) -> Response {
    let rid = request_id(&headers);
    let date = query.date.unwrap_or_else(today);

    let result = match BoardService::get_board(
        &state.persistence,
        tenant,
        date,
        state.config.day_boundary_tz(),
        query.include_canceled,
    )
    .await
    {
        Ok(r) => r,
        Err(err) => return respond_error(err, rid),
    };

    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && if_none_match.to_str().ok() == Some(result.etag.as_str())
    {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        if let Ok(value) = header::HeaderValue::from_str(&result.etag) {
            response.headers_mut().insert(header::ETAG, value);
        }
        return response;
    }

    let generated_at = result.view.generated_at;
    let meta = Meta::new(rid)
        .with_generated_at(generated_at)
        .with_etag(result.etag.clone());
    let mut response = Envelope::ok(result.view, meta).into_response(StatusCode::OK);
    if let Ok(value) = header::HeaderValue::from_str(&result.etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    TenantContext(tenant): TenantContext,
    AuthenticatedPrincipal(_claims): AuthenticatedPrincipal,
    headers: HeaderMap,
    Query(query): Query<StatsQuery>,
) -> Response {
    let rid = request_id(&headers);
    let date = query.date.unwrap_or_else(today);

    match BoardService::get_stats(&state.persistence, tenant, date, state.config.day_boundary_tz())
        .await
    {
        Ok(stats) => Envelope::ok(stats, Meta::new(rid)).into_response(StatusCode::OK),
        Err(err) => respond_error(err, rid),
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    TenantContext(tenant): TenantContext,
    AuthenticatedPrincipal(_claims): AuthenticatedPrincipal,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let rid = request_id(&headers);
    let params = match ListParams::try_from(query) {
        Ok(p) => p,
        Err(err) => return respond_error(err, rid),
    };
    let page_size = params.page_size;

    match BoardService::list(&state.persistence, tenant, &params).await {
        Ok((appointments, next_cursor)) => {
            let meta = Meta::new(rid).with_pagination(1, page_size, next_cursor.map(|c| c.to_string()));
            Envelope::ok(appointments, meta).into_response(StatusCode::OK)
        }
        Err(err) => respond_error(err, rid),
    }
}

pub async fn get_by_id(
    State(state): State<Arc<AppState>>,
    TenantContext(tenant): TenantContext,
    AuthenticatedPrincipal(_claims): AuthenticatedPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let rid = request_id(&headers);
    match BoardService::get_by_id(&state.persistence, tenant, id).await {
        Ok(appointment) => Envelope::ok(appointment, Meta::new(rid)).into_response(StatusCode::OK),
        Err(err) => respond_error(err, rid),
    }
}

pub async fn move_appointment(
    State(state): State<Arc<AppState>>,
    TenantContext(tenant): TenantContext,
    AuthenticatedPrincipal(claims): AuthenticatedPrincipal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    ValidJson(body): ValidJson<MoveRequest>,
) -> Response {
    let rid = request_id(&headers);

    if !state.move_rate_limiter.check(tenant, claims.principal_id()).await {
        return respond_error(
            AppError::RateLimited {
                retry_after_secs: state.move_rate_limiter.retry_after_secs(),
            }
            .trace(),
            rid,
        );
    }

    match BoardService::move_appointment(&state.persistence, tenant, id, &body).await {
        Ok(card) => Envelope::ok(card, Meta::new(rid)).into_response(StatusCode::OK),
        Err(err) => respond_error(err, rid),
    }
}
