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
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A token bucket keyed by `(tenant, principal)`. In-process only, per §5 of the
/// design: a single-process deployment is assumed, and horizontal scaling must
/// externalize the limiter rather than rely on this one.
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(burst: f64) -> Self {
        Self {
            tokens: burst,
            last_refill: Instant::now(),
        }
    }

    fn try_take(&mut self, burst: f64, sustained_per_sec: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * sustained_per_sec).min(burst);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub burst: f64,
    pub sustained_per_sec: f64,
}

#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<RwLock<HashMap<(Uuid, Uuid), Bucket>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns `true` when the request may proceed, `false` when the bucket for
    /// this `(tenant, principal)` pair is exhausted.
    pub async fn check(&self, tenant_id: Uuid, principal_id: Uuid) -> bool {
        let mut buckets = self.buckets.write().await;
        let bucket = buckets
            .entry((tenant_id, principal_id))
            .or_insert_with(|| Bucket::new(self.config.burst));
        bucket.try_take(self.config.burst, self.config.sustained_per_sec)
    }

    pub fn retry_after_secs(&self) -> u64 {
        (1.0 / self.config.sustained_per_sec.max(0.01)).ceil() as u64
    }

    /// Drops buckets untouched for longer than `idle_after`, run periodically
    /// from a background task spawned at startup.
    pub async fn evict_idle(&self, idle_after: Duration) {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) < idle_after);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_burst_then_throttles() {
        let limiter = RateLimiter::new(RateLimitConfig {
            burst: 2.0,
            sustained_per_sec: 1.0,
        });
        let tenant = Uuid::new_v4();
        let principal = Uuid::new_v4();
        assert!(limiter.check(tenant, principal).await);
        assert!(limiter.check(tenant, principal).await);
        assert!(!limiter.check(tenant, principal).await);
    }

    #[tokio::test]
    async fn separate_keys_have_separate_buckets() {
        let limiter = RateLimiter::new(RateLimitConfig {
            burst: 1.0,
            sustained_per_sec: 1.0,
        });
        let tenant = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(limiter.check(tenant, a).await);
        assert!(limiter.check(tenant, b).await);
    }
}
