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
use crate::common::envelope::respond_error;
use crate::common::error::AppError;
use crate::common::types::TenantSlug;
use crate::common::types::value_object::{ValueObject, ValueObjectable};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Response;
use std::sync::Arc;
use uuid::Uuid;

fn request_id(parts: &Parts) -> String {
    parts
        .headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// The request-scoped tenant identity, resolved from `X-Tenant-Id` and (when
/// present) reconciled against the authenticated principal's tenant affinity.
///
/// Grounded on the teacher's header-reading extractors: same "read header,
/// never panic" shape, but fallible — tenant resolution can reject the
/// request, so `Rejection` is `AppError` rather than `Infallible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext(pub Uuid);

impl TenantContext {
    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl FromRequestParts<Arc<AppState>> for TenantContext {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let rid = request_id(parts);
        let raw = parts
            .headers
            .get("x-tenant-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                respond_error(AppError::Forbidden("missing_tenant".to_string()).trace(), rid.clone())
            })?;

        let resolved = resolve_tenant_id(state, raw)
            .await
            .map_err(|err| respond_error(err.trace(), rid.clone()))?;

        // If the request also carries a bearer credential, its tenant affinity
        // must agree with the header. `Claims` is only present once the auth
        // middleware has run and inserted it into the request extensions.
        if let Some(claims) = parts.extensions.get::<Claims>()
            && claims.tenant_id() != resolved
        {
            return Err(respond_error(
                AppError::Forbidden("tenant_mismatch".to_string()).trace(),
                rid,
            ));
        }

        Ok(TenantContext(resolved))
    }
}

/// Recognized tenant identifier forms are a UUID or a short slug. A slug is
/// looked up against the `tenants` table through the gateway's unscoped
/// tenant-resolution handle — the one codepath allowed to query `tenants`
/// before a tenant GUC exists, since it is what discovers the tenant.
async fn resolve_tenant_id(state: &Arc<AppState>, raw: &str) -> Result<Uuid, AppError> {
    if let Ok(id) = Uuid::parse_str(raw) {
        return Ok(id);
    }

    let slug = ValueObject::new(TenantSlug(raw.to_string()))
        .map_err(|_| AppError::BadRequest("invalid_tenant".to_string()))?;

    state
        .persistence
        .resolve_tenant_slug(slug.extract().get_value())
        .await
        .map_err(|_| AppError::BadRequest("invalid_tenant".to_string()))?
        .ok_or_else(|| AppError::BadRequest("invalid_tenant".to_string()))
}
