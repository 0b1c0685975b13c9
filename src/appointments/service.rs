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
use crate::appointments::dto::{ListParams, MoveRequest};
use crate::appointments::model::{
    Appointment, AppointmentDetail, BoardCard, BoardView, ColumnSummary, Stats,
};
use crate::appointments::repository::{AppointmentsRepository, DayWindow, MoveError};
use crate::appointments::types::AppointmentStatus;
use crate::common::error::AppError;
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use rand::Rng;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tokio::time::{Duration, sleep};
use uuid::Uuid;

/// Bounded retries on database-level serialization failure (§4.5.2). Beyond
/// this the move surfaces as an ordinary `conflict`, same as a version
/// mismatch — the client's remedy is identical either way: refetch.
const MAX_SERIALIZATION_RETRIES: u32 = 2;
const RETRY_JITTER_MS: std::ops::Range<u64> = 10..40;

/// Resolves a calendar date into the half-open UTC instant window that the
/// rest of the board path operates on. Local midnight can be ambiguous or
/// nonexistent across a DST transition; `.earliest()` picks the
/// lexicographically-first valid instant rather than failing the request
/// over a shop's clock-change quirks.
pub fn day_window(date: NaiveDate, tz: Tz) -> Result<DayWindow, AppError> {
    let local_midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::BadRequest("invalid date".to_string()))?;
    let start = tz
        .from_local_datetime(&local_midnight)
        .earliest()
        .ok_or_else(|| AppError::BadRequest("invalid date".to_string()))?
        .with_timezone(&Utc);
    Ok(DayWindow {
        start,
        end: start + ChronoDuration::days(1),
    })
}

/// Hashes every card's status/id/version triple. Deliberately excludes
/// `generated_at` (or any other per-request timestamp) — that would change
/// on every call regardless of whether the underlying board state did,
/// making `If-None-Match` never match. Any move that touches the window
/// bumps at least one version, which changes the digest; identical board
/// state across two requests hashes identically.
fn board_etag(columns: &BTreeMap<String, Vec<BoardCard>>) -> String {
    let mut hasher = Sha256::new();
    for (status, cards) in columns {
        hasher.update(status.as_bytes());
        for card in cards {
            hasher.update(card.id.as_bytes());
            hasher.update(card.version.to_le_bytes());
        }
    }
    format!("\"{:x}\"", hasher.finalize())
}

pub struct BoardResult {
    pub view: BoardView,
    pub etag: String,
}

pub struct BoardService;

impl BoardService {
    pub async fn get_board(
        repo: &dyn AppointmentsRepository,
        tenant: Uuid,
        date: NaiveDate,
        tz: Tz,
        include_canceled: bool,
    ) -> Result<BoardResult, AppError> {
        let window = day_window(date, tz)?;
        let rows = repo.get_board_rows(tenant, window, include_canceled).await?;

        let mut columns: BTreeMap<String, Vec<BoardCard>> = AppointmentStatus::ALL
            .iter()
            .map(|s| (s.to_string(), Vec::new()))
            .collect();
        let mut summaries: BTreeMap<String, ColumnSummary> = AppointmentStatus::ALL
            .iter()
            .map(|s| (s.to_string(), ColumnSummary::default()))
            .collect();

        for row in rows {
            let card = BoardCard::from(row);
            let summary = summaries.entry(card.status.clone()).or_default();
            summary.count += 1;
            summary.total_amount_cents += card.total_amount_cents.unwrap_or(0);
            columns.entry(card.status.clone()).or_default().push(card);
        }

        let generated_at = Utc::now();
        let etag = board_etag(&columns);
        Ok(BoardResult {
            view: BoardView {
                columns,
                summaries,
                generated_at,
            },
            etag,
        })
    }

    pub async fn get_stats(
        repo: &dyn AppointmentsRepository,
        tenant: Uuid,
        date: NaiveDate,
        tz: Tz,
    ) -> Result<Stats, AppError> {
        let window = day_window(date, tz)?;
        Ok(repo.get_stats(tenant, window).await?)
    }

    pub async fn list(
        repo: &dyn AppointmentsRepository,
        tenant: Uuid,
        params: &ListParams,
    ) -> Result<(Vec<Appointment>, Option<Uuid>), AppError> {
        Ok(repo.list(tenant, params).await?)
    }

    pub async fn get_by_id(
        repo: &dyn AppointmentsRepository,
        tenant: Uuid,
        id: Uuid,
    ) -> Result<AppointmentDetail, AppError> {
        Ok(repo.get_by_id(tenant, id).await?)
    }

    /// Runs the move, retrying a bounded number of times on a database-level
    /// serialization failure (Postgres SQLSTATE `40001`) with a short random
    /// backoff before surfacing it as an ordinary conflict (§4.5.2, §7).
    pub async fn move_appointment(
        repo: &dyn AppointmentsRepository,
        tenant: Uuid,
        id: Uuid,
        request: &MoveRequest,
    ) -> Result<BoardCard, AppError> {
        let mut attempt = 0;
        loop {
            match repo.move_appointment(tenant, id, request).await {
                Ok(card) => return Ok(card),
                Err(MoveError::Repository(err)) if err.is_serialization_failure() => {
                    if attempt >= MAX_SERIALIZATION_RETRIES {
                        return Err(AppError::Conflict(json!({
                            "reason": "serialization_failure_retries_exhausted"
                        }))
                        .trace());
                    }
                    attempt += 1;
                    let jitter_ms = rand::rng().random_range(RETRY_JITTER_MS);
                    sleep(Duration::from_millis(jitter_ms)).await;
                    continue;
                }
                Err(err) => return Err(move_error_to_app_error(err)),
            }
        }
    }
}

fn move_error_to_app_error(err: MoveError) -> AppError {
    match err {
        MoveError::NotFound => AppError::NotFound,
        MoveError::Conflict(current) => AppError::Conflict(json!({
            "id": current.id,
            "status": current.status.to_string(),
            "position": current.position,
            "version": current.version,
        }))
        .trace(),
        MoveError::InvalidTransition(msg) => AppError::InvalidTransition(msg).trace(),
        MoveError::InvalidState(msg) => AppError::InvalidState(msg).trace(),
        MoveError::Repository(repo_err) => AppError::from(repo_err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointments::model::BoardRow;
    use crate::appointments::repository::MockAppointmentsRepository;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn sample_row(status: &str, position: i32, version: i32) -> BoardRow {
        BoardRow {
            id: Uuid::new_v4(),
            status: status.to_string(),
            position,
            start_ts: Some(Utc::now()),
            end_ts: None,
            total_amount_cents: Some(10_000),
            paid_amount_cents: 4_000,
            version,
            title: "Oil change".to_string(),
            customer_display_name: "Jane Doe".to_string(),
            vehicle_label: "2019 Honda Civic (ABC-123)".to_string(),
            services_summary: Some("Oil change, Tire rotation".to_string()),
        }
    }

    fn sample_appointment(status: AppointmentStatus, version: i32) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            status,
            position: 0,
            start_ts: Some(Utc::now()),
            end_ts: None,
            check_in_at: None,
            check_out_at: None,
            total_amount_cents: Some(10_000),
            paid_amount_cents: 4_000,
            title: "Brake check".to_string(),
            notes: None,
            version,
            updated_at: Utc::now(),
        }
    }

    /// Scenario 2 of §8: five appointments across five distinct statuses,
    /// every status column present (including the two that got no rows).
    #[tokio::test]
    async fn board_shape_includes_every_status_with_empty_columns() {
        let mut mock = MockAppointmentsRepository::new();
        mock.expect_get_board_rows().returning(|_, _, _| {
            Ok(vec![
                sample_row("scheduled", 0, 1),
                sample_row("in_progress", 0, 3),
                sample_row("ready", 0, 2),
                sample_row("completed", 0, 5),
                sample_row("no_show", 0, 1),
            ])
        });

        let result = BoardService::get_board(
            &mock,
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            chrono_tz::UTC,
            false,
        )
        .await
        .unwrap();

        assert_eq!(result.view.columns.len(), 6);
        assert_eq!(result.view.columns["scheduled"].len(), 1);
        assert_eq!(result.view.columns["canceled"].len(), 0);
        assert!(result.view.columns.values().flatten().all(|c| c.version >= 1));
        assert!(!result.etag.is_empty());
    }

    #[tokio::test]
    async fn empty_day_window_yields_empty_columns_and_nonzero_etag() {
        let mut mock = MockAppointmentsRepository::new();
        mock.expect_get_board_rows().returning(|_, _, _| Ok(vec![]));

        let result = BoardService::get_board(
            &mock,
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            chrono_tz::UTC,
            false,
        )
        .await
        .unwrap();

        assert!(result.view.columns.values().all(Vec::is_empty));
        assert!(result.view.summaries.values().all(|s| s.count == 0));
    }

    /// The ETag must depend only on the board's card contents, not on the
    /// moment the request happened — two fetches of identical, unmoved board
    /// state must hash identically so `If-None-Match` can ever 304.
    #[tokio::test]
    async fn etag_is_stable_across_requests_for_unchanged_board_state() {
        let mut mock = MockAppointmentsRepository::new();
        mock.expect_get_board_rows()
            .times(2)
            .returning(|_, _, _| Ok(vec![sample_row("scheduled", 0, 1)]));

        let tenant = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let first = BoardService::get_board(&mock, tenant, date, chrono_tz::UTC, false)
            .await
            .unwrap();
        let second = BoardService::get_board(&mock, tenant, date, chrono_tz::UTC, false)
            .await
            .unwrap();

        assert_eq!(first.etag, second.etag);
    }

    /// Scenario 3: a clean OCC move is a pass-through to the repository.
    #[tokio::test]
    async fn successful_move_returns_the_refreshed_card() {
        let mut mock = MockAppointmentsRepository::new();
        mock.expect_move_appointment().returning(|_, _, _| {
            Ok(BoardCard::from(sample_row("in_progress", 0, 4)))
        });

        let request = MoveRequest {
            new_status: AppointmentStatus::InProgress,
            position: 0,
            expected_version: 3,
        };
        let card = BoardService::move_appointment(&mock, Uuid::new_v4(), Uuid::new_v4(), &request)
            .await
            .unwrap();
        assert_eq!(card.version, 4);
        assert_eq!(card.status, "in_progress");
    }

    /// Scenario 4: a version mismatch surfaces as `conflict` with the
    /// current card embedded, never retried.
    #[tokio::test]
    async fn version_conflict_embeds_the_current_card() {
        let mut mock = MockAppointmentsRepository::new();
        mock.expect_move_appointment().returning(|_, _, _| {
            Err(MoveError::Conflict(Box::new(sample_appointment(
                AppointmentStatus::Scheduled,
                5,
            ))))
        });

        let request = MoveRequest {
            new_status: AppointmentStatus::InProgress,
            position: 0,
            expected_version: 4,
        };
        let err = BoardService::move_appointment(&mock, Uuid::new_v4(), Uuid::new_v4(), &request)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "conflict");
        assert!(err.current().is_some());
    }

    /// Scenario 5: moving out of a terminal state is `invalid_transition`,
    /// never mutated.
    #[tokio::test]
    async fn invalid_transition_from_terminal_state_is_rejected() {
        let mut mock = MockAppointmentsRepository::new();
        mock.expect_move_appointment().returning(|_, _, _| {
            Err(MoveError::InvalidTransition(
                "cannot transition from completed to scheduled".to_string(),
            ))
        });

        let request = MoveRequest {
            new_status: AppointmentStatus::Scheduled,
            position: 0,
            expected_version: 9,
        };
        let err = BoardService::move_appointment(&mock, Uuid::new_v4(), Uuid::new_v4(), &request)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_transition");
    }

    /// A repository error that is not a serialization failure (plain invalid
    /// input) passes straight through as `bad_request` without any retry —
    /// the retry path in §4.5.2 is reserved for SQLSTATE `40001` specifically,
    /// checked via `RepositoryError::is_serialization_failure` (exercised
    /// directly in `common/error.rs`'s own tests against a live SQLSTATE).
    #[tokio::test]
    async fn non_serialization_repository_errors_are_not_retried() {
        let mut mock = MockAppointmentsRepository::new();
        mock.expect_move_appointment().times(1).returning(|_, _, _| {
            Err(MoveError::Repository(
                crate::common::error::RepositoryError::InvalidInput("bad row".to_string()),
            ))
        });

        let request = MoveRequest {
            new_status: AppointmentStatus::InProgress,
            position: 0,
            expected_version: 1,
        };
        let err = BoardService::move_appointment(&mock, Uuid::new_v4(), Uuid::new_v4(), &request)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "bad_request");
    }
}
