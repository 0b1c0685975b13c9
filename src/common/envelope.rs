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
use crate::common::error::AppError;
use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// `meta` as carried on every non-healthz response.
#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "pageSize")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "nextCursor")]
    pub next_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl Meta {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            page: None,
            page_size: None,
            next_cursor: None,
            etag: None,
            generated_at: None,
        }
    }

    pub fn with_pagination(mut self, page: u32, page_size: u32, next_cursor: Option<String>) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self.next_cursor = next_cursor;
        self
    }

    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = Some(generated_at);
        self
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorObject {
    pub status: u16,
    pub code: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<Value>,
}

impl From<&AppError> for ErrorObject {
    fn from(err: &AppError) -> Self {
        Self {
            status: err.status().as_u16(),
            code: err.code().to_string(),
            detail: err.detail(),
            current: err.current(),
        }
    }
}

/// Success envelope: `data` is always present, `errors` is always null.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub data: T,
    pub errors: Option<()>,
    pub meta: Meta,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T, meta: Meta) -> Self {
        Self {
            data,
            errors: None,
            meta,
        }
    }

    pub fn into_response(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Error envelope: `data` is always null, `errors` always carries exactly one entry.
/// Kept as a distinct type (rather than `Envelope<()>`) the way the source keeps
/// separate success/error response structs instead of one loosely-typed dict.
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    data: Option<()>,
    errors: Vec<ErrorObject>,
    meta: Meta,
}

pub fn respond_error(err: AppError, request_id: impl Into<String>) -> Response {
    let status = err.status();
    let retry_after = err.retry_after_secs();
    let body = ErrorEnvelope {
        data: None,
        errors: vec![ErrorObject::from(&err)],
        meta: Meta::new(request_id),
    };
    let mut response = (status, Json(body)).into_response();
    if let Some(secs) = retry_after
        && let Ok(value) = HeaderValue::from_str(&secs.to_string())
    {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}
