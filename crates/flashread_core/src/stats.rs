//! crates/flashread_core/src/stats.rs
//!
//! Session measurement and aggregate derivation. The engine is the single
//! holder of the in-flight session; only its aggregate effect is ever
//! persisted.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::domain::{DailyStats, DisplayStats, RemoteSession, StreakRecord};
use crate::ports::{Clock, LocalStore, RemoteStore};

/// Sessions shorter than this are accidental taps and are discarded.
pub const MIN_SESSION_MS: u64 = 2_000;
/// Minimum session length for a day to qualify toward the streak.
pub const STREAK_SESSION_MS: u64 = 60_000;
/// Width of the trailing average-WPM window, in calendar days.
const WPM_WINDOW_DAYS: i64 = 7;

/// Applies the consecutive-day streak rules for a session counted on
/// `today`. Shared by every `LocalStore` implementation.
pub fn advance_streak(current: Option<StreakRecord>, today: NaiveDate) -> StreakRecord {
    let Some(mut streak) = current else {
        return StreakRecord {
            current_streak: 1,
            last_read_date: Some(today),
            streak_freeze_active: false,
            streak_freeze_used_at: None,
        };
    };

    // Already counted today.
    if streak.last_read_date == Some(today) {
        return streak;
    }

    let elapsed_days = streak
        .last_read_date
        .map(|last| (today - last).num_days())
        .unwrap_or(i64::MAX);

    if elapsed_days == 1 {
        streak.current_streak += 1;
    } else if elapsed_days == 2 && streak.streak_freeze_active {
        // Missed one day but the freeze was armed: keep the streak and
        // consume the one-time grace.
        streak.current_streak += 1;
        streak.streak_freeze_active = false;
    } else {
        streak.current_streak = 1;
    }

    streak.last_read_date = Some(today);
    streak
}

/// Folds one finished session into a day's record, recomputing the running
/// average WPM. Shared by every `LocalStore` implementation.
pub fn accumulate_session(
    day: &mut DailyStats,
    words_read: u32,
    duration_ms: u64,
    avg_wpm: u32,
    completed: bool,
) {
    day.words_read += u64::from(words_read);
    day.reading_time_ms += duration_ms;
    day.sessions_count += 1;
    day.avg_wpm = (((f64::from(day.avg_wpm) * f64::from(day.sessions_count - 1))
        + f64::from(avg_wpm))
        / f64::from(day.sessions_count))
    .round() as u32;
    if completed {
        day.documents_completed += 1;
    }
}

struct ActiveSession {
    start_index: usize,
    started_at: DateTime<Utc>,
}

/// Measures reading sessions and assembles dashboard aggregates.
pub struct StatsEngine {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    active: Option<ActiveSession>,
}

impl StatsEngine {
    pub fn new(local: Arc<dyn LocalStore>, remote: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            local,
            remote,
            clock,
            active: None,
        }
    }

    /// Begins measuring a session. Any unterminated prior session is
    /// overwritten; sessions do not nest.
    pub fn start_session(&mut self, start_index: usize) {
        self.active = Some(ActiveSession {
            start_index,
            started_at: self.clock.now(),
        });
    }

    /// Ends the active session and persists its aggregate effect. A no-op
    /// without an active session. Trivial sessions (under two seconds or
    /// zero words) are discarded. Storage and remote failures are logged,
    /// never propagated.
    pub async fn end_session(&mut self, end_index: usize, wpm: u16, completed: bool) {
        let Some(session) = self.active.take() else {
            return;
        };

        let now = self.clock.now();
        let duration_ms = (now - session.started_at).num_milliseconds().max(0) as u64;
        let words_read = end_index.saturating_sub(session.start_index) as u32;
        let duration_seconds = (duration_ms as f64 / 1000.0).round() as u32;
        let avg_wpm = if duration_seconds > 0 {
            (f64::from(words_read) / f64::from(duration_seconds) * 60.0).round() as u32
        } else {
            u32::from(wpm)
        };

        if duration_ms < MIN_SESSION_MS || words_read == 0 {
            debug!(duration_ms, words_read, "discarding trivial reading session");
            return;
        }

        let date = now.date_naive();
        if let Err(e) = self
            .local
            .record_reading_session(date, words_read, duration_ms, avg_wpm, completed)
            .await
        {
            warn!("Failed to record reading session: {e}");
        }

        if duration_ms >= STREAK_SESSION_MS {
            if let Err(e) = self.local.update_streak(date).await {
                warn!("Failed to update streak: {e}");
            }
        }

        if self.remote.is_available() {
            let record = RemoteSession {
                words_read,
                duration_seconds,
                avg_wpm,
                session_date: date,
            };
            if let Err(e) = self.remote.push_session(&record).await {
                warn!("Failed to push reading session to remote: {e}");
            }
        }
    }

    /// Assembles the dashboard aggregate: streak state, lifetime totals,
    /// today's words, and the trailing 7-day mean of non-zero daily average
    /// WPM values.
    pub async fn display_stats(&self) -> DisplayStats {
        let today = self.clock.now().date_naive();
        let lifetime = self.local.lifetime_stats().await.ok().flatten().unwrap_or_default();
        let streak = self.local.streak().await.ok().flatten().unwrap_or_default();
        let today_stats = self.local.daily_stats(today).await.ok().flatten();

        let window_start = today - Duration::days(WPM_WINDOW_DAYS - 1);
        let wpm_values: Vec<u32> = self
            .local
            .stats_range(window_start, today)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|day| day.avg_wpm > 0)
            .map(|day| day.avg_wpm)
            .collect();
        let average_wpm = if wpm_values.is_empty() {
            0
        } else {
            (wpm_values.iter().map(|v| f64::from(*v)).sum::<f64>() / wpm_values.len() as f64)
                .round() as u32
        };

        DisplayStats {
            current_streak: streak.current_streak,
            streak_freeze_active: streak.streak_freeze_active,
            total_words_read: lifetime.total_words_read,
            words_read_today: today_stats.map(|s| s.words_read).unwrap_or(0),
            documents_completed: lifetime.total_documents_completed,
            average_wpm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, MemoryLocalStore, MemoryRemoteStore};
    use chrono::TimeZone;

    fn engine() -> (StatsEngine, Arc<MemoryLocalStore>, Arc<MemoryRemoteStore>, Arc<ManualClock>) {
        let local = Arc::new(MemoryLocalStore::default());
        let remote = Arc::new(MemoryRemoteStore::default());
        let clock = Arc::new(ManualClock::at(
            Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
        ));
        let engine = StatsEngine::new(local.clone(), remote.clone(), clock.clone());
        (engine, local, remote, clock)
    }

    #[tokio::test]
    async fn short_sessions_are_discarded() {
        let (mut engine, local, remote, clock) = engine();
        engine.start_session(0);
        clock.advance(Duration::milliseconds(1_500));
        engine.end_session(5, 300, false).await;

        assert!(local.stats.lock().unwrap().is_empty());
        assert!(local.lifetime.lock().unwrap().is_none());
        assert!(remote.sessions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_word_sessions_are_discarded() {
        let (mut engine, local, _, clock) = engine();
        engine.start_session(40);
        clock.advance(Duration::seconds(30));
        engine.end_session(40, 300, false).await;
        assert!(local.stats.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn qualifying_session_updates_day_lifetime_streak_and_remote() {
        let (mut engine, local, remote, clock) = engine();
        engine.start_session(0);
        clock.advance(Duration::seconds(120));
        engine.end_session(400, 300, true).await;

        let today = clock.now().date_naive();
        let stats = local.stats.lock().unwrap();
        let day = stats.get(&today).expect("day record");
        assert_eq!(day.words_read, 400);
        assert_eq!(day.sessions_count, 1);
        assert_eq!(day.avg_wpm, 200); // 400 words in 120 s
        assert_eq!(day.documents_completed, 1);
        drop(stats);

        let lifetime = local.lifetime.lock().unwrap().clone().unwrap();
        assert_eq!(lifetime.total_words_read, 400);
        assert_eq!(lifetime.total_documents_completed, 1);

        let streak = local.streak.lock().unwrap().clone().unwrap();
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.last_read_date, Some(today));

        let sessions = remote.sessions.lock().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration_seconds, 120);
    }

    #[tokio::test]
    async fn sessions_under_a_minute_do_not_touch_the_streak() {
        let (mut engine, local, _, clock) = engine();
        engine.start_session(0);
        clock.advance(Duration::seconds(30));
        engine.end_session(100, 300, false).await;

        assert!(!local.stats.lock().unwrap().is_empty());
        assert!(local.streak.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn running_average_recomputes_per_session() {
        let (mut engine, local, _, clock) = engine();
        engine.start_session(0);
        clock.advance(Duration::seconds(60));
        engine.end_session(200, 300, false).await; // 200 wpm

        engine.start_session(0);
        clock.advance(Duration::seconds(60));
        engine.end_session(300, 300, false).await; // 300 wpm

        let today = clock.now().date_naive();
        let stats = local.stats.lock().unwrap();
        assert_eq!(stats.get(&today).unwrap().avg_wpm, 250);
    }

    #[tokio::test]
    async fn starting_a_session_overwrites_an_unterminated_one() {
        let (mut engine, local, _, clock) = engine();
        engine.start_session(0);
        clock.advance(Duration::seconds(10));
        engine.start_session(50);
        clock.advance(Duration::seconds(60));
        engine.end_session(60, 300, false).await;

        let today = clock.now().date_naive();
        let stats = local.stats.lock().unwrap();
        assert_eq!(stats.get(&today).unwrap().words_read, 10);
    }

    #[tokio::test]
    async fn display_stats_averages_the_last_seven_days_of_nonzero_wpm() {
        let (engine, local, _, clock) = engine();
        let today = clock.now().date_naive();
        {
            let mut stats = local.stats.lock().unwrap();
            for (days_ago, wpm) in [(0i64, 300u32), (2, 200), (6, 400)] {
                let date = today - Duration::days(days_ago);
                let mut day = DailyStats::empty(date);
                day.avg_wpm = wpm;
                day.words_read = 100;
                stats.insert(date, day);
            }
            // Outside the window; must be ignored.
            let old = today - Duration::days(9);
            let mut day = DailyStats::empty(old);
            day.avg_wpm = 1000;
            stats.insert(old, day);
        }

        let display = engine.display_stats().await;
        assert_eq!(display.average_wpm, 300); // mean of 300, 200, 400
        assert_eq!(display.words_read_today, 100);
    }

    #[test]
    fn streak_rules_follow_the_calendar() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        let today = day(2024, 3, 10);

        // First-ever qualifying day.
        let first = advance_streak(None, today);
        assert_eq!(first.current_streak, 1);
        assert_eq!(first.last_read_date, Some(today));

        // Already counted today: no-op.
        let same = advance_streak(Some(first.clone()), today);
        assert_eq!(same.current_streak, 1);

        // Read yesterday: increments.
        let streak = StreakRecord {
            current_streak: 4,
            last_read_date: Some(day(2024, 3, 9)),
            ..StreakRecord::default()
        };
        assert_eq!(advance_streak(Some(streak), today).current_streak, 5);

        // Two days ago with the freeze armed: increments and consumes it.
        let frozen = StreakRecord {
            current_streak: 4,
            last_read_date: Some(day(2024, 3, 8)),
            streak_freeze_active: true,
            ..StreakRecord::default()
        };
        let thawed = advance_streak(Some(frozen), today);
        assert_eq!(thawed.current_streak, 5);
        assert!(!thawed.streak_freeze_active);

        // Two days ago without the freeze: broken.
        let unfrozen = StreakRecord {
            current_streak: 4,
            last_read_date: Some(day(2024, 3, 8)),
            ..StreakRecord::default()
        };
        assert_eq!(advance_streak(Some(unfrozen), today).current_streak, 1);

        // Three days ago, even with the freeze: broken.
        let stale = StreakRecord {
            current_streak: 9,
            last_read_date: Some(day(2024, 3, 7)),
            streak_freeze_active: true,
            ..StreakRecord::default()
        };
        assert_eq!(advance_streak(Some(stale), today).current_streak, 1);
    }
}
