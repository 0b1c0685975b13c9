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
use axum::http::StatusCode;
use serde_json::Value;
use sqlx::migrate::MigrateError;
use thiserror::Error;
use tracing::{Level, event};

/// Errors raised by the persistence gateway and tenant/appointment repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migrate error: {0}")]
    Migrate(#[from] MigrateError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("record not found")]
    NotFound,

    #[error("pool acquisition timed out")]
    PoolTimedOut,

    #[error("tenant pool lock error: {0}")]
    RwLockError(String),
}

impl RepositoryError {
    pub fn is_unique_violation(&self) -> bool {
        if let RepositoryError::Database(sqlx::Error::Database(database_error)) = self
            && database_error.is_unique_violation()
        {
            return true;
        }
        false
    }

    /// Postgres SQLSTATE `40001` — a SERIALIZABLE transaction lost the race.
    /// The move executor retries a bounded number of times on this before
    /// surfacing a conflict (§4.5.2).
    pub fn is_serialization_failure(&self) -> bool {
        if let RepositoryError::Database(sqlx::Error::Database(database_error)) = self
            && database_error.code().as_deref() == Some("40001")
        {
            return true;
        }
        false
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("{0} is required")]
    MissingRequired(&'static str),
    #[error("{0}")]
    Invalid(String),
}

pub type BuilderResult<T> = Result<T, BuilderError>;

/// The single error-kind enum used by every handler. One central `IntoResponse`
/// equivalent (`AppError::respond`) is the only place allowed to pick an HTTP
/// status or a stable `code` string; nothing downstream of a handler decides
/// status codes for itself.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("authentication required")]
    AuthRequired,
    #[error("{0}")]
    Forbidden(String),
    #[error("not found")]
    NotFound,
    #[error("version conflict")]
    Conflict(Value),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("rate limited")]
    RateLimited { retry_after_secs: u64 },
    #[error("resource exhausted")]
    ResourceExhausted,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::AuthRequired => "auth_required",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::InvalidState(_) => "invalid_state",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::ResourceExhausted => "resource_exhausted",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthRequired => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidTransition(_) | AppError::InvalidState(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ResourceExhausted => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Safe, non-leaky prose for the client. Internal causes are logged, never echoed.
    pub fn detail(&self) -> String {
        match self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::AuthRequired => "a valid bearer credential is required".to_string(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::NotFound => "the requested resource was not found".to_string(),
            AppError::Conflict(_) => {
                "the resource was modified by someone else; refresh and retry".to_string()
            }
            AppError::InvalidTransition(msg) | AppError::InvalidState(msg) => msg.clone(),
            AppError::RateLimited { .. } => "too many requests, slow down".to_string(),
            AppError::ResourceExhausted => "the service is temporarily overloaded".to_string(),
            AppError::Internal(_) => "an unexpected error occurred".to_string(),
        }
    }

    pub fn current(&self) -> Option<Value> {
        match self {
            AppError::Conflict(current) => Some(current.clone()),
            _ => None,
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AppError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Logs once at the boundary, mirroring the source's single trace-on-construction
    /// convention rather than logging at every call site that propagates the error.
    pub fn trace(self) -> Self {
        match self.status().as_u16() {
            500..=599 => event!(Level::ERROR, code = self.code(), "{}", self),
            400..=499 => event!(Level::WARN, code = self.code(), "{}", self),
            _ => event!(Level::DEBUG, code = self.code(), "{}", self),
        }
        self
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => AppError::NotFound,
            RepositoryError::Database(sqlx::Error::PoolTimedOut) => AppError::ResourceExhausted,
            RepositoryError::PoolTimedOut => AppError::ResourceExhausted,
            RepositoryError::InvalidInput(msg) => AppError::BadRequest(msg),
            other => AppError::Internal(other.to_string()),
        }
        .trace()
    }
}

impl From<BuilderError> for AppError {
    fn from(err: BuilderError) -> Self {
        AppError::Internal(err.to_string()).trace()
    }
}
