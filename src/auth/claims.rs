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
use crate::auth::role::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Grounded on `manager/auth/dto/claims.rs`'s `Claims`, generalized with
/// `tenant_id`/`role` — neither of which the teacher's single-tenant-per-
/// request model needed. The Principal (§3) is not a stored entity: it is
/// reconstructed from these claims on every request, never looked up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
    pub nbf: usize,
    pub iss: String,
    pub aud: String,
    pub jti: String,
}

impl Claims {
    pub fn principal_id(&self) -> Uuid {
        self.sub
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn role(&self) -> Role {
        self.role
    }
}
