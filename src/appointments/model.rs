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
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Row shape as it comes back from Postgres: `status` is `text`, decoded
/// into `AppointmentStatus` by `Appointment::try_from` rather than a derived
/// `sqlx::Type`, keeping the transition table the single source of truth.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub status: String,
    /// The board lane's day (§3 invariant iii is scoped per (tenant, status,
    /// day)), not itself part of the `Appointment` response shape — it's
    /// bookkeeping the repository needs to scope position queries, not a
    /// client-facing field.
    pub day: NaiveDate,
    pub position: i32,
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<DateTime<Utc>>,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub total_amount_cents: Option<i64>,
    pub paid_amount_cents: i64,
    pub title: String,
    pub notes: Option<String>,
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: Uuid,
    #[serde(rename = "tenantId")]
    pub tenant_id: Uuid,
    #[serde(rename = "customerId")]
    pub customer_id: Uuid,
    #[serde(rename = "vehicleId")]
    pub vehicle_id: Uuid,
    pub status: AppointmentStatus,
    pub position: i32,
    #[serde(rename = "startTs")]
    pub start_ts: Option<DateTime<Utc>>,
    #[serde(rename = "endTs")]
    pub end_ts: Option<DateTime<Utc>>,
    #[serde(rename = "checkInAt")]
    pub check_in_at: Option<DateTime<Utc>>,
    #[serde(rename = "checkOutAt")]
    pub check_out_at: Option<DateTime<Utc>>,
    #[serde(rename = "totalAmountCents")]
    pub total_amount_cents: Option<i64>,
    #[serde(rename = "paidAmountCents")]
    pub paid_amount_cents: i64,
    pub title: String,
    pub notes: Option<String>,
    pub version: i32,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = String;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: row.id,
            tenant_id: row.tenant_id,
            customer_id: row.customer_id,
            vehicle_id: row.vehicle_id,
            status: AppointmentStatus::from_str(&row.status)?,
            position: row.position,
            start_ts: row.start_ts,
            end_ts: row.end_ts,
            check_in_at: row.check_in_at,
            check_out_at: row.check_out_at,
            total_amount_cents: row.total_amount_cents,
            paid_amount_cents: row.paid_amount_cents,
            title: row.title,
            notes: row.notes,
            version: row.version,
            updated_at: row.updated_at,
        })
    }
}

/// A line item on an appointment (§3 `AppointmentService`): one row as stored,
/// with `estimated_hours` kept as `BigDecimal` rather than `f64` so an
/// estimate like `1.25` round-trips through Postgres `NUMERIC` exactly.
/// Child of `Appointment`; read only by the board card summary (the
/// aggregate query's `string_agg`) and by the single-appointment detail
/// fetch below — never listed or moved independently.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct AppointmentService {
    pub id: Uuid,
    #[serde(rename = "appointmentId")]
    pub appointment_id: Uuid,
    pub name: String,
    #[serde(rename = "estimatedHours")]
    pub estimated_hours: Option<BigDecimal>,
    #[serde(rename = "estimatedPriceCents")]
    pub estimated_price_cents: Option<i64>,
    pub category: String,
}

/// Appointment plus its full service line items, returned by the detail
/// fetch (`GET /api/admin/appointments/{id}`, §6.1) — the board list/card
/// paths only ever need the lateral-aggregated summary, never this.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub services: Vec<AppointmentService>,
}

/// Raw row for the board aggregate query: appointment fields plus the
/// joined customer/vehicle display data and the lateral-aggregated service
/// summary, all in one round trip (§4.4.1 forbids per-card queries).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BoardRow {
    pub id: Uuid,
    pub status: String,
    pub position: i32,
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<DateTime<Utc>>,
    pub total_amount_cents: Option<i64>,
    pub paid_amount_cents: i64,
    pub version: i32,
    pub title: String,
    pub customer_display_name: String,
    pub vehicle_label: String,
    pub services_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardCard {
    pub id: Uuid,
    pub status: String,
    pub position: i32,
    #[serde(rename = "customerDisplay")]
    pub customer_display: String,
    #[serde(rename = "vehicleLabel")]
    pub vehicle_label: String,
    pub headline: String,
    #[serde(rename = "servicesSummary")]
    pub services_summary: String,
    #[serde(rename = "startTs")]
    pub start_ts: Option<DateTime<Utc>>,
    #[serde(rename = "endTs")]
    pub end_ts: Option<DateTime<Utc>>,
    #[serde(rename = "totalAmountCents")]
    pub total_amount_cents: Option<i64>,
    #[serde(rename = "paidAmountCents")]
    pub paid_amount_cents: i64,
    pub version: i32,
}

impl From<BoardRow> for BoardCard {
    fn from(row: BoardRow) -> Self {
        BoardCard {
            id: row.id,
            status: row.status,
            position: row.position,
            customer_display: row.customer_display_name,
            vehicle_label: row.vehicle_label,
            headline: row.title,
            services_summary: row.services_summary.unwrap_or_default(),
            start_ts: row.start_ts,
            end_ts: row.end_ts,
            total_amount_cents: row.total_amount_cents,
            paid_amount_cents: row.paid_amount_cents,
            version: row.version,
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ColumnSummary {
    pub count: u32,
    #[serde(rename = "totalAmountCents")]
    pub total_amount_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub columns: BTreeMap<String, Vec<BoardCard>>,
    pub summaries: BTreeMap<String, ColumnSummary>,
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    #[serde(rename = "jobsToday")]
    pub jobs_today: i64,
    #[serde(rename = "onPrem")]
    pub on_prem: i64,
    #[serde(rename = "statusCounts")]
    pub status_counts: BTreeMap<String, i64>,
    #[serde(rename = "unpaidTotalCents")]
    pub unpaid_total_cents: i64,
    #[serde(rename = "avgCycleMinutes")]
    pub avg_cycle_minutes: Option<f64>,
}
