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

pub(crate) mod config;
pub(crate) mod database;
pub(crate) mod init;

use crate::app::config::AppConfig;
use crate::app::database::PersistenceGateway;
use crate::common::rate_limit::{RateLimitConfig, RateLimiter};

/// Shared process state handed to every handler via axum's `State` extractor.
/// Holds no per-request data — tenant and principal are request-scoped values
/// threaded through extractors, never stashed here (§9: "replace [globals]
/// with an explicit request context... never a process-wide variable").
pub struct AppState {
    pub config: AppConfig,
    pub persistence: PersistenceGateway,
    pub move_rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: AppConfig, persistence: PersistenceGateway) -> Self {
        let move_rate_limiter = RateLimiter::new(RateLimitConfig {
            burst: config.rate_limit().move_burst(),
            sustained_per_sec: config.rate_limit().move_sustained(),
        });
        Self {
            config,
            persistence,
            move_rate_limiter,
        }
    }
}
