//! Per-day request counters kept in Redis.
//!
//! Windows are fixed UTC days: the first request of a client in a day creates
//! the counter, which expires when the day ends.

use chrono::Utc;
use redis::{aio::ConnectionManager, Client};
use tracing::info;

use crate::config::ThrottleConfig;

const DAY_SECS: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleKey {
    Anon(String),
    User(i64),
}

impl ThrottleKey {
    fn redis_key(&self, day: i64) -> String {
        match self {
            ThrottleKey::Anon(ip) => format!("throttle:anon:{ip}:{day}"),
            ThrottleKey::User(id) => format!("throttle:user:{id}:{day}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed { remaining: u64 },
    Limited { retry_after: u64 },
}

#[derive(Clone)]
pub struct ThrottleService {
    // Reconnects on its own after Redis restarts
    conn: ConnectionManager,
    anon_per_day: u64,
    user_per_day: u64,
}

impl ThrottleService {
    pub async fn connect(redis_url: &str, limits: &ThrottleConfig) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        info!(
            anon_per_day = limits.anon_per_day,
            user_per_day = limits.user_per_day,
            "Throttle connected to Redis"
        );
        Ok(Self {
            conn,
            anon_per_day: limits.anon_per_day,
            user_per_day: limits.user_per_day,
        })
    }

    fn limit_for(&self, key: &ThrottleKey) -> u64 {
        match key {
            ThrottleKey::Anon(_) => self.anon_per_day,
            ThrottleKey::User(_) => self.user_per_day,
        }
    }

    /// Counts this request and decides whether it may proceed.
    pub async fn hit(&self, key: &ThrottleKey) -> redis::RedisResult<ThrottleDecision> {
        let now = Utc::now().timestamp();
        let redis_key = key.redis_key(now.div_euclid(DAY_SECS));
        let mut conn = self.conn.clone();

        // INCR + EXPIRE in one round trip, atomically
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(&redis_key, 1u64)
            .expire(&redis_key, DAY_SECS)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(decide(count, self.limit_for(key), seconds_until_day_end(now)))
    }
}

pub fn decide(count: u64, limit: u64, retry_after: u64) -> ThrottleDecision {
    if count > limit {
        ThrottleDecision::Limited { retry_after }
    } else {
        ThrottleDecision::Allowed {
            remaining: limit - count,
        }
    }
}

fn seconds_until_day_end(now: i64) -> u64 {
    let elapsed = now.rem_euclid(DAY_SECS);
    u64::try_from(DAY_SECS - elapsed).unwrap_or(1)
}
