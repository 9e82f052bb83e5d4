use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::config::TrackingConfig;

struct LimiterState {
    entries: HashMap<(String, String), Instant>,
    last_sweep: Instant,
}

/// Guards the manual "check now" path: one acquisition per (user, variant)
/// pair per interval. Scheduled sweeps never go through here.
pub struct CheckNowLimiter {
    state: Mutex<LimiterState>,
    min_interval: Duration,
    entry_ttl: Duration,
}

impl CheckNowLimiter {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            min_interval: Duration::from_secs(config.check_now_min_interval),
            entry_ttl: Duration::from_secs(config.check_now_entry_ttl),
        }
    }

    pub async fn try_acquire(&self, user_id: &str, variant_id: &str) -> bool {
        self.try_acquire_at(user_id, variant_id, Instant::now()).await
    }

    async fn try_acquire_at(&self, user_id: &str, variant_id: &str, now: Instant) -> bool {
        let mut state = self.state.lock().await;

        // Sweep expired pairs at most once per TTL so the map does not grow
        // with every user who ever clicked the button
        if now.saturating_duration_since(state.last_sweep) >= self.entry_ttl {
            let ttl = self.entry_ttl;
            state
                .entries
                .retain(|_, last| now.saturating_duration_since(*last) < ttl);
            state.last_sweep = now;
        }

        let key = (user_id.to_string(), variant_id.to_string());
        if let Some(last) = state.entries.get(&key) {
            if now.saturating_duration_since(*last) < self.min_interval {
                return false;
            }
        }
        state.entries.insert(key, now);
        true
    }
}
