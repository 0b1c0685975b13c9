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
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Stored as `text` in Postgres, not a native enum type — encoded/decoded by
/// hand via `Display`/`FromStr` in the repository layer (`model.rs`) rather
/// than a derived `sqlx::Type`, so the transition table in this file stays
/// the single source of truth for valid values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    InProgress,
    Ready,
    Completed,
    NoShow,
    Canceled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::InProgress,
        AppointmentStatus::Ready,
        AppointmentStatus::Completed,
        AppointmentStatus::NoShow,
        AppointmentStatus::Canceled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::NoShow | AppointmentStatus::Canceled
        )
    }

    pub fn allowed_transitions(&self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Scheduled => &[
                AppointmentStatus::InProgress,
                AppointmentStatus::NoShow,
                AppointmentStatus::Canceled,
            ],
            AppointmentStatus::InProgress => &[
                AppointmentStatus::Ready,
                AppointmentStatus::Completed,
                AppointmentStatus::Canceled,
            ],
            AppointmentStatus::Ready => {
                &[AppointmentStatus::Completed, AppointmentStatus::InProgress]
            }
            AppointmentStatus::Completed
            | AppointmentStatus::NoShow
            | AppointmentStatus::Canceled => &[],
        }
    }

    pub fn can_transition_to(&self, target: AppointmentStatus) -> bool {
        *self == target || self.allowed_transitions().contains(&target)
    }
}

impl Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Ready => "ready",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::NoShow => "no_show",
            AppointmentStatus::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "in_progress" => Ok(AppointmentStatus::InProgress),
            "ready" => Ok(AppointmentStatus::Ready),
            "completed" => Ok(AppointmentStatus::Completed),
            "no_show" => Ok(AppointmentStatus::NoShow),
            "canceled" => Ok(AppointmentStatus::Canceled),
            other => Err(format!("unknown appointment status {other:?}")),
        }
    }
}

/// Wire representation follows the `ValueObjectable` validate-on-construct
/// idiom the teacher uses for its status types
/// (`tenant/worksheets/types/worksheet/status.rs`): reject unknown strings
/// at deserialization rather than deep inside the service.
impl<'de> Deserialize<'de> for AppointmentStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        AppointmentStatus::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduled_allows_in_progress_no_show_canceled() {
        let allowed = AppointmentStatus::Scheduled.allowed_transitions();
        assert!(allowed.contains(&AppointmentStatus::InProgress));
        assert!(allowed.contains(&AppointmentStatus::NoShow));
        assert!(allowed.contains(&AppointmentStatus::Canceled));
        assert_eq!(allowed.len(), 3);
    }

    #[test]
    fn ready_allows_rework_back_to_in_progress() {
        assert!(AppointmentStatus::Ready.can_transition_to(AppointmentStatus::InProgress));
    }

    #[test]
    fn terminal_states_allow_nothing() {
        assert!(AppointmentStatus::Completed.allowed_transitions().is_empty());
        assert!(AppointmentStatus::NoShow.allowed_transitions().is_empty());
        assert!(AppointmentStatus::Canceled.allowed_transitions().is_empty());
    }

    #[test]
    fn same_status_is_always_a_permitted_no_op_move() {
        assert!(AppointmentStatus::Completed.can_transition_to(AppointmentStatus::Completed));
    }

    #[test]
    fn parses_canonical_lowercase_names() {
        assert_eq!(
            AppointmentStatus::from_str("in_progress").unwrap(),
            AppointmentStatus::InProgress
        );
        assert!(AppointmentStatus::from_str("bogus").is_err());
    }

    #[test]
    fn deserializes_from_json_string_and_rejects_unknown() {
        let ok: AppointmentStatus = serde_json::from_str(r#""ready""#).unwrap();
        assert_eq!(ok, AppointmentStatus::Ready);
        let err: Result<AppointmentStatus, _> = serde_json::from_str(r#""bogus""#);
        assert!(err.is_err());
    }
}
