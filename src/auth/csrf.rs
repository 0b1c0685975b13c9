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

use crate::common::envelope::respond_error;
use crate::common::error::AppError;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;

const CSRF_COOKIE: &str = "csrf_token";
const CSRF_HEADER: &str = "x-csrf-token";

/// Only credentials carried on a cookie are CSRF-exposed — a browser attaches
/// a cookie automatically on cross-site requests, it never attaches an
/// `Authorization` header on its own. A bearer-header credential is therefore
/// exempt (§4.2).
fn is_cookie_borne(req: &Request) -> bool {
    req.headers().get(axum::http::header::AUTHORIZATION).is_none()
        && CookieJar::from_headers(req.headers())
            .get(CSRF_COOKIE)
            .is_some()
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Double-submit check: the value set by the server in the `csrf_token`
/// cookie must be echoed verbatim in the `X-CSRF-Token` header. State-
/// changing requests authenticated via cookie without a matching header are
/// rejected; requests authenticated via bearer header skip this entirely.
pub async fn require_csrf(req: Request, next: Next) -> Response {
    let rid = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    if !is_cookie_borne(&req) {
        return next.run(req).await;
    }

    let cookie_value = CookieJar::from_headers(req.headers())
        .get(CSRF_COOKIE)
        .map(|c| c.value().to_string());
    let header_value = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match (cookie_value, header_value) {
        (Some(cookie), Some(header)) if constant_time_eq(&cookie, &header) => next.run(req).await,
        _ => respond_error(AppError::Forbidden("csrf_token_mismatch".to_string()).trace(), rid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_tokens_match() {
        assert!(constant_time_eq("abc123", "abc123"));
    }

    #[test]
    fn differing_length_rejected() {
        assert!(!constant_time_eq("abc", "abcd"));
    }

    #[test]
    fn differing_content_rejected() {
        assert!(!constant_time_eq("abc123", "abc124"));
    }
}
