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
use crate::auth::claims::Claims;
use crate::auth::role::Role;
use crate::common::envelope::respond_error;
use crate::common::error::AppError;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use std::sync::Arc;

fn request_id(req: &Request) -> String {
    req.headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Grounded on `manager/auth/dto/claims.rs`'s `Claims` validation shape
/// (HS256, required spec claims, `iss`/`aud` checks) and the legacy
/// `auth/middleware.rs`'s `require_auth` (decode from `TypedHeader<
/// Authorization<Bearer>>`, stash into `req.extensions_mut()`), but routed
/// through `respond_error` instead of a bare `StatusCode` rejection, since
/// no handler downstream is allowed to pick its own HTTP status.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Response {
    let rid = request_id(&req);
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return respond_error(AppError::AuthRequired.trace(), rid);
    };

    let mut validator = Validation::new(Algorithm::HS256);
    validator.set_issuer(&[state.config.auth().jwt_issuer()]);
    validator.set_audience(&[state.config.auth().jwt_audience()]);
    validator.set_required_spec_claims(&["sub", "exp", "iat", "nbf", "iss", "aud", "jti"]);

    let token_data = match decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.config.auth().jwt_secret().as_bytes()),
        &validator,
    ) {
        Ok(data) => data,
        Err(_) => return respond_error(AppError::AuthRequired.trace(), rid),
    };

    req.extensions_mut().insert(token_data.claims);
    next.run(req).await
}

/// Reads the `Claims` stashed by `require_auth`. Any route using this must
/// be layered behind `require_auth` or the extraction fails closed.
pub struct AuthenticatedPrincipal(pub Claims);

impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let rid = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthenticatedPrincipal)
            .ok_or_else(|| respond_error(AppError::AuthRequired.trace(), rid))
    }
}

fn gate(claims: Option<&Claims>, roles: &[Role], rid: String) -> Result<(), Response> {
    match claims {
        Some(c) if c.role().allows(roles) => Ok(()),
        Some(_) => Err(respond_error(
            AppError::Forbidden("role not permitted for this route".to_string()).trace(),
            rid,
        )),
        None => Err(respond_error(AppError::AuthRequired.trace(), rid)),
    }
}

/// Board/stats routes: everyone but customers (§3, §6.1).
pub async fn require_board_role(req: Request, next: Next) -> Response {
    let rid = request_id(&req);
    match gate(req.extensions().get::<Claims>(), Role::BOARD_ROLES, rid) {
        Ok(()) => next.run(req).await,
        Err(resp) => resp,
    }
}

/// Move routes: owner/advisor/technician only, never accountant or customer.
pub async fn require_move_role(req: Request, next: Next) -> Response {
    let rid = request_id(&req);
    match gate(req.extensions().get::<Claims>(), Role::MOVE_ROLES, rid) {
        Ok(()) => next.run(req).await,
        Err(resp) => resp,
    }
}
