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
use crate::app::database::{Isolation, PersistenceGateway};
use crate::appointments::dto::{ListParams, MoveRequest};
use crate::appointments::model::{
    Appointment, AppointmentDetail, AppointmentRow, AppointmentService, BoardCard, BoardRow, Stats,
};
use crate::appointments::types::AppointmentStatus;
use crate::common::error::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("appointment not found")]
    NotFound,
    #[error("version conflict")]
    Conflict(Box<Appointment>),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("{0}")]
    InvalidState(String),
}

pub type MoveResult<T> = Result<T, MoveError>;

/// A half-open `[start, end)` UTC instant window, the day window described
/// throughout §4.4 — computed once in the service layer from the requested
/// date and the configured day-boundary timezone, then handed down here so
/// the repository never has to know about timezones.
#[derive(Debug, Clone, Copy)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AppointmentsRepository: Send + Sync {
    async fn get_board_rows(
        &self,
        tenant: Uuid,
        window: DayWindow,
        include_canceled: bool,
    ) -> Result<Vec<BoardRow>, RepositoryError>;

    async fn get_stats(&self, tenant: Uuid, window: DayWindow) -> Result<Stats, RepositoryError>;

    async fn list(
        &self,
        tenant: Uuid,
        params: &ListParams,
    ) -> Result<(Vec<Appointment>, Option<Uuid>), RepositoryError>;

    async fn get_by_id(&self, tenant: Uuid, id: Uuid) -> Result<AppointmentDetail, RepositoryError>;

    async fn move_appointment(
        &self,
        tenant: Uuid,
        id: Uuid,
        request: &MoveRequest,
    ) -> MoveResult<BoardCard>;
}

#[async_trait]
impl AppointmentsRepository for PersistenceGateway {
    async fn get_board_rows(
        &self,
        tenant: Uuid,
        window: DayWindow,
        include_canceled: bool,
    ) -> Result<Vec<BoardRow>, RepositoryError> {
        self.with_tenant_conn(tenant, async |tx| {
            Ok(sqlx::query_as::<_, BoardRow>(
                r#"
                SELECT
                    a.id as id,
                    a.status as status,
                    a.position as position,
                    a.start_ts as start_ts,
                    a.end_ts as end_ts,
                    a.total_amount_cents as total_amount_cents,
                    a.paid_amount_cents as paid_amount_cents,
                    a.version as version,
                    a.title as title,
                    c.display_name as customer_display_name,
                    (v.year::text || ' ' || v.make || ' ' || v.model || ' (' || v.plate || ')') as vehicle_label,
                    svc.services_summary as services_summary
                FROM appointments a
                JOIN customers c ON c.id = a.customer_id
                JOIN vehicles v ON v.id = a.vehicle_id
                LEFT JOIN LATERAL (
                    SELECT string_agg(names.name, ', ') AS services_summary
                    FROM (
                        SELECT name FROM appointment_services
                        WHERE appointment_id = a.id
                        ORDER BY name
                        LIMIT 5
                    ) names
                ) svc ON true
                WHERE (
                    (a.start_ts >= $1 AND a.start_ts < $2)
                    OR (
                        a.status IN ('in_progress', 'ready')
                        AND a.check_in_at >= $1 AND a.check_in_at < $2
                        AND NOT (a.start_ts >= $1 AND a.start_ts < $2)
                    )
                )
                AND (a.status <> 'canceled' OR $3)
                ORDER BY a.status, a.position ASC, a.start_ts ASC NULLS LAST, a.id ASC
                "#,
            )
            .bind(window.start)
            .bind(window.end)
            .bind(include_canceled)
            .fetch_all(&mut **tx)
            .await?)
        })
        .await
    }

    async fn get_stats(&self, tenant: Uuid, window: DayWindow) -> Result<Stats, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct StatsRow {
            jobs_today: i64,
            on_prem: i64,
            scheduled_count: i64,
            in_progress_count: i64,
            ready_count: i64,
            completed_count: i64,
            no_show_count: i64,
            canceled_count: i64,
            unpaid_total_cents: Option<i64>,
            avg_cycle_minutes: Option<f64>,
        }

        let row: StatsRow = self
            .with_tenant_conn(tenant, async |tx| {
                Ok(sqlx::query_as::<_, StatsRow>(
                    r#"
                    SELECT
                        COUNT(*) FILTER (
                            WHERE status = 'completed' AND check_out_at >= $1 AND check_out_at < $2
                        ) AS jobs_today,
                        COUNT(*) FILTER (
                            WHERE check_in_at IS NOT NULL AND check_in_at <= now() AND check_out_at IS NULL
                        ) AS on_prem,
                        COUNT(*) FILTER (WHERE status = 'scheduled' AND start_ts >= $1 AND start_ts < $2) AS scheduled_count,
                        COUNT(*) FILTER (
                            WHERE status = 'in_progress'
                            AND ((start_ts >= $1 AND start_ts < $2) OR (check_in_at >= $1 AND check_in_at < $2))
                        ) AS in_progress_count,
                        COUNT(*) FILTER (
                            WHERE status = 'ready'
                            AND ((start_ts >= $1 AND start_ts < $2) OR (check_in_at >= $1 AND check_in_at < $2))
                        ) AS ready_count,
                        COUNT(*) FILTER (WHERE status = 'completed' AND start_ts >= $1 AND start_ts < $2) AS completed_count,
                        COUNT(*) FILTER (WHERE status = 'no_show' AND start_ts >= $1 AND start_ts < $2) AS no_show_count,
                        COUNT(*) FILTER (WHERE status = 'canceled' AND start_ts >= $1 AND start_ts < $2) AS canceled_count,
                        COALESCE(SUM(GREATEST(COALESCE(total_amount_cents, 0) - paid_amount_cents, 0)) FILTER (
                            WHERE status <> 'canceled'
                            AND ((start_ts >= $1 AND start_ts < $2) OR (check_in_at >= $1 AND check_in_at < $2))
                        ), 0) AS unpaid_total_cents,
                        AVG(EXTRACT(EPOCH FROM (check_out_at - check_in_at)) / 60.0) FILTER (
                            WHERE status = 'completed' AND check_out_at >= $1 AND check_out_at < $2
                        ) AS avg_cycle_minutes
                    FROM appointments
                    "#,
                )
                .bind(window.start)
                .bind(window.end)
                .fetch_one(&mut **tx)
                .await?)
            })
            .await?;

        let mut status_counts = std::collections::BTreeMap::new();
        status_counts.insert("scheduled".to_string(), row.scheduled_count);
        status_counts.insert("in_progress".to_string(), row.in_progress_count);
        status_counts.insert("ready".to_string(), row.ready_count);
        status_counts.insert("completed".to_string(), row.completed_count);
        status_counts.insert("no_show".to_string(), row.no_show_count);
        status_counts.insert("canceled".to_string(), row.canceled_count);

        Ok(Stats {
            jobs_today: row.jobs_today,
            on_prem: row.on_prem,
            status_counts,
            unpaid_total_cents: row.unpaid_total_cents.unwrap_or(0),
            avg_cycle_minutes: row.avg_cycle_minutes,
        })
    }

    async fn list(
        &self,
        tenant: Uuid,
        params: &ListParams,
    ) -> Result<(Vec<Appointment>, Option<Uuid>), RepositoryError> {
        let limit = params.page_size as i64 + 1;
        let rows: Vec<AppointmentRow> = self
            .with_tenant_conn(tenant, async |tx| {
                Ok(sqlx::query_as::<_, AppointmentRow>(
                    r#"
                    SELECT * FROM appointments
                    WHERE ($1::uuid IS NULL OR id > $1)
                        AND ($2::text IS NULL OR status = $2)
                        AND ($3::date IS NULL OR start_ts >= $3::date)
                        AND ($4::date IS NULL OR start_ts < ($4::date + interval '1 day'))
                        AND ($5::uuid IS NULL OR customer_id = $5)
                    ORDER BY id ASC
                    LIMIT $6
                    "#,
                )
                .bind(params.cursor)
                .bind(params.status.map(|s| s.to_string()))
                .bind(params.from)
                .bind(params.to)
                .bind(params.customer_id)
                .bind(limit)
                .fetch_all(&mut **tx)
                .await?)
            })
            .await?;

        let mut appointments: Vec<Appointment> = rows
            .into_iter()
            .map(Appointment::try_from)
            .collect::<Result<_, _>>()
            .map_err(RepositoryError::InvalidInput)?;

        let next_cursor = if appointments.len() as u32 > params.page_size {
            appointments.pop().map(|a| a.id);
            appointments.last().map(|a| a.id)
        } else {
            None
        };

        Ok((appointments, next_cursor))
    }

    async fn get_by_id(&self, tenant: Uuid, id: Uuid) -> Result<AppointmentDetail, RepositoryError> {
        self.with_tenant_conn(tenant, async |tx| {
            let row: Option<AppointmentRow> =
                sqlx::query_as::<_, AppointmentRow>("SELECT * FROM appointments WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await?;
            let appointment = match row {
                Some(row) => Appointment::try_from(row).map_err(RepositoryError::InvalidInput)?,
                None => return Err(RepositoryError::NotFound),
            };

            let services: Vec<AppointmentService> = sqlx::query_as::<_, AppointmentService>(
                "SELECT id, appointment_id, name, estimated_hours, estimated_price_cents, category
                 FROM appointment_services WHERE appointment_id = $1 ORDER BY name",
            )
            .bind(id)
            .fetch_all(&mut **tx)
            .await?;

            Ok(AppointmentDetail {
                appointment,
                services,
            })
        })
        .await
    }

    async fn move_appointment(
        &self,
        tenant: Uuid,
        id: Uuid,
        request: &MoveRequest,
    ) -> MoveResult<BoardCard> {
        let outcome = self
            .with_tenant_tx(tenant, Isolation::Serializable, async |tx| {
            let row: Option<AppointmentRow> =
                sqlx::query_as::<_, AppointmentRow>("SELECT * FROM appointments WHERE id = $1 FOR UPDATE")
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await?;
            let row = match row {
                Some(row) => row,
                None => return Err(RepositoryError::NotFound),
            };
            let day = row.day;
            let current = Appointment::try_from(row).map_err(RepositoryError::InvalidInput)?;

            if current.version != request.expected_version {
                return Ok(MoveOutcome::Conflict(current));
            }
            if current.status != request.new_status
                && !current.status.can_transition_to(request.new_status)
            {
                return Ok(MoveOutcome::InvalidTransition(format!(
                    "cannot transition from {} to {}",
                    current.status, request.new_status
                )));
            }
            if let Some(total) = current.total_amount_cents
                && current.paid_amount_cents > total
            {
                return Ok(MoveOutcome::InvalidState(
                    "paid_amount_cents exceeds total_amount_cents".to_string(),
                ));
            }

            let now = Utc::now();
            let check_in_at = match request.new_status {
                AppointmentStatus::InProgress if current.check_in_at.is_none() => Some(now),
                _ => current.check_in_at,
            };
            let check_out_at = match request.new_status {
                AppointmentStatus::Completed if current.check_out_at.is_none() => Some(now),
                _ => current.check_out_at,
            };
            let (check_in_at, check_out_at) = match request.new_status {
                AppointmentStatus::Canceled | AppointmentStatus::NoShow => (
                    if current.check_in_at.is_none() { None } else { check_in_at },
                    if current.check_out_at.is_none() { None } else { check_out_at },
                ),
                _ => (check_in_at, check_out_at),
            };

            // Remove the card from its source lane first (same lane as the
            // destination on a same-status reorder) so the destination-len
            // count and the reinsert shift below see a lane with the gap
            // already closed, whether or not the status changed. A lane is
            // (status, day) — §3 invariant (iii) scopes position uniqueness
            // per day, not per status alone, and a move never changes a
            // card's day, only its status/position.
            sqlx::query(
                "UPDATE appointments SET position = position - 1 WHERE status = $1 AND day = $2 AND position > $3",
            )
            .bind(current.status.to_string())
            .bind(day)
            .bind(current.position)
            .execute(&mut **tx)
            .await?;

            let destination_len: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM appointments WHERE status = $1 AND day = $2 AND id <> $3",
            )
            .bind(request.new_status.to_string())
            .bind(day)
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
            let clamped_position = request.position.clamp(0, destination_len as i32);

            sqlx::query(
                "UPDATE appointments SET position = position + 1 WHERE status = $1 AND day = $2 AND position >= $3",
            )
            .bind(request.new_status.to_string())
            .bind(day)
            .bind(clamped_position)
            .execute(&mut **tx)
            .await?;

            let updated: AppointmentRow = sqlx::query_as::<_, AppointmentRow>(
                r#"
                UPDATE appointments SET
                    status = $1,
                    position = $2,
                    check_in_at = $3,
                    check_out_at = $4,
                    version = version + 1,
                    updated_at = now()
                WHERE id = $5
                RETURNING *
                "#,
            )
            .bind(request.new_status.to_string())
            .bind(clamped_position)
            .bind(check_in_at)
            .bind(check_out_at)
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;

            let card_row: BoardRow = sqlx::query_as::<_, BoardRow>(
                r#"
                SELECT
                    a.id as id, a.status as status, a.position as position,
                    a.start_ts as start_ts, a.end_ts as end_ts,
                    a.total_amount_cents as total_amount_cents, a.paid_amount_cents as paid_amount_cents,
                    a.version as version, a.title as title,
                    c.display_name as customer_display_name,
                    (v.year::text || ' ' || v.make || ' ' || v.model || ' (' || v.plate || ')') as vehicle_label,
                    svc.services_summary as services_summary
                FROM appointments a
                JOIN customers c ON c.id = a.customer_id
                JOIN vehicles v ON v.id = a.vehicle_id
                LEFT JOIN LATERAL (
                    SELECT string_agg(names.name, ', ') AS services_summary
                    FROM (
                        SELECT name FROM appointment_services WHERE appointment_id = a.id ORDER BY name LIMIT 5
                    ) names
                ) svc ON true
                WHERE a.id = $1
                "#,
            )
            .bind(updated.id)
            .fetch_one(&mut **tx)
            .await?;

            Ok(MoveOutcome::Applied(BoardCard::from(card_row)))
        })
            .await;

        match outcome {
            Ok(MoveOutcome::Applied(card)) => Ok(card),
            Ok(MoveOutcome::Conflict(current)) => Err(MoveError::Conflict(Box::new(current))),
            Ok(MoveOutcome::InvalidTransition(msg)) => Err(MoveError::InvalidTransition(msg)),
            Ok(MoveOutcome::InvalidState(msg)) => Err(MoveError::InvalidState(msg)),
            Err(RepositoryError::NotFound) => Err(MoveError::NotFound),
            Err(other) => Err(MoveError::Repository(other)),
        }
    }
}

/// The move transaction's closure returns one of these instead of bailing
/// out with a bare `RepositoryError`: business-rule rejections (conflict,
/// invalid transition, invalid state) still need the in-flight row data
/// (the current card for a conflict payload) to reach the caller, and that
/// data lives only inside the transaction closure.
enum MoveOutcome {
    Applied(BoardCard),
    Conflict(Appointment),
    InvalidTransition(String),
    InvalidState(String),
}
