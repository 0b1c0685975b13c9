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
use crate::app::config::PersistenceConfig;
use crate::common::error::RepositoryError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

pub type Tx<'a> = Transaction<'a, Postgres>;

/// Isolation level requested for a tenant-bound transaction. The move executor
/// asks for `Serializable` (in addition to `SELECT ... FOR UPDATE`) to
/// serialize concurrent moves on the same appointment; every other caller
/// defaults to `ReadCommitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    ReadCommitted,
    Serializable,
}

impl Isolation {
    fn as_sql(self) -> &'static str {
        match self {
            Isolation::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
            Isolation::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        }
    }
}

/// The one gateway to the database. The teacher's `manager/app/database.rs`
/// (`PgPoolManager`) provisions one physical database per tenant
/// (`tenant_pools: Arc<RwLock<HashMap<String, PgPool>>>`); that model is
/// incompatible with this spec's single-database RLS/GUC design and is
/// replaced outright (see DESIGN.md) by a single `PgPool` behind the two
/// primitives the spec names: `with_tenant_conn` / `with_tenant_tx`. Both set
/// `app.tenant_id` as the first statement of a transaction via `set_config(...,
/// true)` (the `true` third argument makes it session-*local*, i.e. it cannot
/// outlive the transaction even if the connection returns to the pool
/// uncleanly) and let the transaction boundary clear it implicitly on
/// commit/rollback — the "acquire → set GUC → run → clear GUC → release"
/// idiom from the design notes, with release guaranteed by `Drop` on the
/// transaction handle if the closure panics or returns early.
pub struct PersistenceGateway {
    pool: PgPool,
    statement_timeout_ms: u64,
}

impl PersistenceGateway {
    pub async fn connect(config: &PersistenceConfig) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max())
            .acquire_timeout(Duration::from_millis(config.pool_acquire_timeout_ms()))
            .connect(config.database_url())
            .await?;
        Ok(Self {
            pool,
            statement_timeout_ms: config.statement_timeout_ms(),
        })
    }

    #[cfg(test)]
    pub fn from_pool(pool: PgPool, statement_timeout_ms: u64) -> Self {
        Self {
            pool,
            statement_timeout_ms,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Read-only tenant-bound scope: begins a transaction, sets the GUC,
    /// runs `f`, and commits. Used by the board aggregator and any other
    /// read path that does not need to hand the transaction back to the
    /// caller.
    pub async fn with_tenant_conn<F, T>(&self, tenant: Uuid, f: F) -> Result<T, RepositoryError>
    where
        F: AsyncFnOnce(&mut Tx<'_>) -> Result<T, RepositoryError>,
    {
        self.with_tenant_tx(tenant, Isolation::ReadCommitted, f).await
    }

    /// Mutating tenant-bound scope: same GUC binding, but the isolation level
    /// is caller-chosen (the move executor uses `Serializable` plus row-level
    /// locking to serialize concurrent moves on the same appointment).
    pub async fn with_tenant_tx<F, T>(
        &self,
        tenant: Uuid,
        isolation: Isolation,
        f: F,
    ) -> Result<T, RepositoryError>
    where
        F: AsyncFnOnce(&mut Tx<'_>) -> Result<T, RepositoryError>,
    {
        let mut tx = self.begin_bound(tenant, isolation).await?;
        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                let _ = tx.rollback().await;
                Err(err)
            }
        }
    }

    async fn begin_bound(&self, tenant: Uuid, isolation: Isolation) -> Result<Tx<'_>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(isolation.as_sql()).execute(&mut *tx).await?;
        sqlx::query(&format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout_ms
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query("SELECT set_config('app.tenant_id', $1, true)")
            .bind(tenant.to_string())
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// The one codepath permitted to query `tenants` without a tenant GUC
    /// already bound, since resolving a slug into a tenant id is what
    /// establishes the tenant context in the first place (§4.1).
    pub async fn resolve_tenant_slug(&self, slug: &str) -> Result<Option<Uuid>, RepositoryError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM tenants WHERE slug = $1 AND deleted_at IS NULL")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| id))
    }
}
