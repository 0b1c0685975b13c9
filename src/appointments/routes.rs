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
use crate::appointments::handler::{get_board, get_by_id, get_stats, list, move_appointment};
use crate::auth::csrf::require_csrf;
use crate::auth::middleware::{require_auth, require_board_role, require_move_role};
use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, patch};
use std::sync::Arc;

/// Grounded on `manager/tenants/routes.rs`'s `.layer(from_fn_with_state(...,
/// require_auth)).with_state(...)` shape, generalized with the board/move
/// role gates and, on the move route only, the CSRF double-submit check
/// (§4.2: state-changing routes need it, reads don't).
pub fn routes(state: Arc<AppState>) -> Router {
    let read_routes = Router::new()
        .route("/appointments/board", get(get_board))
        .route("/dashboard/stats", get(get_stats))
        .route("/appointments", get(list))
        .route("/appointments/{id}", get(get_by_id))
        .layer(from_fn(require_board_role));

    let move_routes = Router::new()
        .route("/appointments/{id}/move", patch(move_appointment))
        .layer(from_fn(require_move_role))
        .layer(from_fn(require_csrf));

    Router::new()
        .nest(
            "/admin",
            read_routes
                .merge(move_routes)
                .layer(from_fn_with_state(state.clone(), require_auth)),
        )
        .with_state(state)
}
