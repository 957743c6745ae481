//! Per-client token bucket.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Buckets kept before full ones, then the least recently seen, are dropped.
const MAX_TRACKED_CLIENTS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Allows `per_minute` requests per client, refilled continuously.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    per_minute: u32,
    max_clients: usize,
}

impl RateLimiter {
    pub(crate) fn new(per_minute: u32) -> Self {
        Self::with_capacity(per_minute, MAX_TRACKED_CLIENTS)
    }

    fn with_capacity(per_minute: u32, max_clients: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            per_minute,
            max_clients: max_clients.max(1),
        }
    }

    pub(crate) fn per_minute(&self) -> u32 {
        self.per_minute
    }

    /// Takes a token for `client`, returning false when none is left.
    pub(crate) async fn try_acquire(&self, client: &str) -> bool {
        self.try_acquire_at(client, Instant::now()).await
    }

    async fn try_acquire_at(&self, client: &str, now: Instant) -> bool {
        let capacity = f64::from(self.per_minute);
        let refill_per_sec = capacity / 60.0;
        let mut buckets = self.buckets.lock().await;

        if buckets.len() >= self.max_clients && !buckets.contains_key(client) {
            buckets.retain(|_, bucket| {
                let elapsed = now.saturating_duration_since(bucket.last_refill);
                bucket.tokens + elapsed.as_secs_f64() * refill_per_sec < capacity
            });
            evict_oldest(&mut buckets, self.max_clients);
        }

        let bucket = buckets.entry(client.to_string()).or_insert(Bucket {
            tokens: capacity,
            last_refill: now,
        });
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * refill_per_sec).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Drops the least recently seen buckets until there is room for one more.
fn evict_oldest(buckets: &mut HashMap<String, Bucket>, max_clients: usize) {
    if buckets.len() < max_clients {
        return;
    }
    let mut by_age: Vec<(Instant, String)> = buckets
        .iter()
        .map(|(client, bucket)| (bucket.last_refill, client.clone()))
        .collect();
    by_age.sort_unstable();
    let excess = buckets.len() + 1 - max_clients;
    for (_, client) in by_age.into_iter().take(excess) {
        buckets.remove(&client);
    }
}

/// Time until one token comes back at `per_minute`.
pub(crate) fn retry_after(per_minute: u32) -> Duration {
    Duration::from_secs(60 / u64::from(per_minute.max(1))).max(Duration::from_secs(1))
}
