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
use crate::appointments::types::AppointmentStatus;
use crate::common::error::AppError;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

const MIN_PAGE_SIZE: u32 = 1;
const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_PAGE_SIZE: u32 = 25;

#[derive(Debug, Deserialize)]
pub struct BoardQuery {
    pub date: Option<NaiveDate>,
    #[serde(rename = "includeCanceled", default)]
    pub include_canceled: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub cursor: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(rename = "customerId")]
    pub customer_id: Option<Uuid>,
}

/// Validated/clamped form of `ListQuery`. `pageSize = 0` is rejected
/// outright; anything above 100 clamps silently (§8 boundary behaviors).
pub struct ListParams {
    pub cursor: Option<Uuid>,
    pub page_size: u32,
    pub status: Option<AppointmentStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub customer_id: Option<Uuid>,
}

impl TryFrom<ListQuery> for ListParams {
    type Error = AppError;

    fn try_from(q: ListQuery) -> Result<Self, Self::Error> {
        let page_size = match q.page_size {
            None => DEFAULT_PAGE_SIZE,
            Some(0) => {
                return Err(AppError::BadRequest("pageSize must be at least 1".to_string()));
            }
            Some(n) if n < MIN_PAGE_SIZE => MIN_PAGE_SIZE,
            Some(n) => n.min(MAX_PAGE_SIZE),
        };
        let cursor = q
            .cursor
            .map(|c| Uuid::parse_str(&c))
            .transpose()
            .map_err(|_| AppError::BadRequest("cursor is not a valid opaque identifier".to_string()))?;
        Ok(ListParams {
            cursor,
            page_size,
            status: q.status,
            from: q.from,
            to: q.to,
            customer_id: q.customer_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub new_status: AppointmentStatus,
    pub position: i32,
    pub expected_version: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_page_size_is_rejected() {
        let q = ListQuery {
            cursor: None,
            page_size: Some(0),
            status: None,
            from: None,
            to: None,
            customer_id: None,
        };
        assert!(ListParams::try_from(q).is_err());
    }

    #[test]
    fn oversized_page_size_clamps_to_100() {
        let q = ListQuery {
            cursor: None,
            page_size: Some(101),
            status: None,
            from: None,
            to: None,
            customer_id: None,
        };
        let params = ListParams::try_from(q).unwrap();
        assert_eq!(params.page_size, 100);
    }

    #[test]
    fn missing_page_size_defaults() {
        let q = ListQuery {
            cursor: None,
            page_size: None,
            status: None,
            from: None,
            to: None,
            customer_id: None,
        };
        let params = ListParams::try_from(q).unwrap();
        assert_eq!(params.page_size, DEFAULT_PAGE_SIZE);
    }
}
