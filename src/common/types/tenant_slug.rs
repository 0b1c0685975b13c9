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
use crate::common::types::value_object::ValueObjectable;
use regex::Regex;
use std::fmt::Display;
use std::sync::OnceLock;

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").unwrap())
}

/// A tenant identifier supplied via `X-Tenant-Id` that is not a UUID.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantSlug(pub String);

impl ValueObjectable for TenantSlug {
    type DataType = String;

    fn validate(&self) -> Result<(), String> {
        if slug_pattern().is_match(&self.0) {
            Ok(())
        } else {
            Err(String::from("invalid_tenant"))
        }
    }

    fn get_value(&self) -> &Self::DataType {
        &self.0
    }
}

impl Display for TenantSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::value_object::ValueObject;

    #[test]
    fn accepts_lowercase_hyphenated_slug() {
        assert!(ValueObject::new(TenantSlug("acme-auto".into())).is_ok());
    }

    #[test]
    fn rejects_uppercase() {
        assert!(ValueObject::new(TenantSlug("Acme".into())).is_err());
    }

    #[test]
    fn rejects_leading_hyphen() {
        assert!(ValueObject::new(TenantSlug("-acme".into())).is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(ValueObject::new(TenantSlug("".into())).is_err());
    }
}
