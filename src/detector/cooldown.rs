//! Per-(market, pattern) signal rate limiting

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::domain::PatternType;

/// A currently-suppressed (market, pattern) pair
#[derive(Debug, Clone, Serialize)]
pub struct ActiveCooldown {
    pub market: String,
    pub pattern: PatternType,
    pub since: DateTime<Utc>,
    pub remaining_secs: i64,
}

/// Concurrent map of last-emission times, keyed by (market, pattern)
///
/// The cheap `is_eligible` pre-check lets callers skip detection work
/// entirely; `try_record` is the authoritative check-and-set that decides
/// who actually gets to emit when detections race.
#[derive(Debug, Default)]
pub struct CooldownTable {
    last_emitted: DashMap<(String, PatternType), DateTime<Utc>>,
}

impl CooldownTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advisory check; a positive answer can be stale by the time the
    /// caller acts on it
    pub fn is_eligible(
        &self,
        market: &str,
        pattern: PatternType,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        match self
            .last_emitted
            .get(&(market.to_string(), pattern))
        {
            Some(entry) => now - *entry.value() >= cooldown,
            None => true,
        }
    }

    /// Atomically re-check eligibility and, if still eligible, record the
    /// emission. Returns whether the caller won the slot. Concurrent
    /// callers for the same key serialize on the entry lock, so exactly
    /// one of them wins per cooldown period.
    pub fn try_record(
        &self,
        market: &str,
        pattern: PatternType,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let mut entry = self
            .last_emitted
            .entry((market.to_string(), pattern))
            .or_insert(DateTime::<Utc>::MIN_UTC);
        if now - *entry.value() >= cooldown {
            *entry.value_mut() = now;
            true
        } else {
            false
        }
    }

    /// Snapshot of every pair still inside its cooldown window
    pub fn active(
        &self,
        cooldown_for: impl Fn(PatternType) -> Duration,
        now: DateTime<Utc>,
    ) -> Vec<ActiveCooldown> {
        self.last_emitted
            .iter()
            .filter_map(|entry| {
                let (market, pattern) = entry.key().clone();
                let since = *entry.value();
                let cooldown = cooldown_for(pattern);
                let elapsed = now - since;
                if elapsed < cooldown {
                    Some(ActiveCooldown {
                        market,
                        pattern,
                        since,
                        remaining_secs: (cooldown - elapsed).num_seconds(),
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Drop entries whose cooldown expired long ago
    pub fn prune(&self, retention: Duration, now: DateTime<Utc>) -> usize {
        let before = self.last_emitted.len();
        self.last_emitted
            .retain(|_, since| now - *since < retention);
        before - self.last_emitted.len()
    }

    pub fn len(&self) -> usize {
        self.last_emitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_emitted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_first_record_always_wins() {
        let table = CooldownTable::new();
        assert!(table.is_eligible("m1", PatternType::Surge, Duration::seconds(300), ts(0)));
        assert!(table.try_record("m1", PatternType::Surge, Duration::seconds(300), ts(0)));
    }

    #[test]
    fn test_second_record_inside_cooldown_loses() {
        let table = CooldownTable::new();
        assert!(table.try_record("m1", PatternType::Surge, Duration::seconds(300), ts(0)));
        assert!(!table.try_record("m1", PatternType::Surge, Duration::seconds(300), ts(10)));
        assert!(!table.is_eligible("m1", PatternType::Surge, Duration::seconds(300), ts(299)));
        assert!(table.try_record("m1", PatternType::Surge, Duration::seconds(300), ts(300)));
    }

    #[test]
    fn test_cooldowns_are_per_market_and_pattern() {
        let table = CooldownTable::new();
        let cd = Duration::seconds(300);
        assert!(table.try_record("m1", PatternType::Surge, cd, ts(0)));
        // Different pattern, same market
        assert!(table.try_record("m1", PatternType::FlashFire, cd, ts(1)));
        // Same pattern, different market
        assert!(table.try_record("m2", PatternType::Surge, cd, ts(1)));
    }

    #[test]
    fn test_active_reports_remaining_time() {
        let table = CooldownTable::new();
        table.try_record("m1", PatternType::Surge, Duration::seconds(300), ts(0));
        table.try_record("m2", PatternType::BlackHole, Duration::seconds(600), ts(0));

        let active = table.active(
            |p| match p {
                PatternType::Surge => Duration::seconds(300),
                _ => Duration::seconds(600),
            },
            ts(400),
        );
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].market, "m2");
        assert_eq!(active[0].remaining_secs, 200);
    }

    #[test]
    fn test_prune_drops_stale_entries() {
        let table = CooldownTable::new();
        table.try_record("m1", PatternType::Surge, Duration::seconds(300), ts(0));
        table.try_record("m2", PatternType::Surge, Duration::seconds(300), ts(3000));
        assert_eq!(table.prune(Duration::seconds(1800), ts(3600)), 1);
        assert_eq!(table.len(), 1);
    }
}
