//! Market-local trading session clock.
//!
//! All time-of-day gates in the engine are evaluated in the configured
//! market timezone; callers pass UTC instants in and get gate decisions out.
//! Weekends are closed; exchange holidays are not modeled here.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use std::time::Duration;

/// Session timing configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// IANA market timezone.
    pub timezone: Tz,
    /// Regular session open (market-local).
    pub market_open: NaiveTime,
    /// Regular session close (market-local).
    pub market_close: NaiveTime,
    /// Delay after the open before entries are considered.
    pub post_open_delay: Duration,
    /// Local time after which no new entries are admitted.
    pub trading_cutoff: NaiveTime,
    /// Local time at which all managed positions are force-closed.
    pub position_close: NaiveTime,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            market_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            market_close: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            post_open_delay: Duration::from_secs(1800),
            trading_cutoff: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            position_close: NaiveTime::from_hms_opt(13, 50, 0).unwrap(),
        }
    }
}

/// Time-gate evaluator for one market.
#[derive(Debug, Clone)]
pub struct TradingSession {
    config: SessionConfig,
}

impl TradingSession {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Local wall-clock time for a UTC instant.
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveTime {
        now.with_timezone(&self.config.timezone).time()
    }

    /// Trading date (market-local calendar date) for a UTC instant.
    pub fn trading_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.config.timezone).date_naive()
    }

    fn is_weekday(&self, now: DateTime<Utc>) -> bool {
        !matches!(
            self.trading_date(now).weekday(),
            Weekday::Sat | Weekday::Sun
        )
    }

    /// First local time at which entries are considered.
    pub fn entry_open(&self) -> NaiveTime {
        self.config.market_open + chrono::Duration::from_std(self.config.post_open_delay).unwrap_or_default()
    }

    /// Whether the regular session is open at `now`.
    pub fn is_market_open(&self, now: DateTime<Utc>) -> bool {
        if !self.is_weekday(now) {
            return false;
        }
        let t = self.local_time(now);
        t >= self.config.market_open && t < self.config.market_close
    }

    /// Whether new entries may be admitted at `now`
    /// (post-open delay elapsed, before the entry cutoff).
    pub fn in_entry_window(&self, now: DateTime<Utc>) -> bool {
        if !self.is_weekday(now) {
            return false;
        }
        let t = self.local_time(now);
        t >= self.entry_open() && t < self.config.trading_cutoff
    }

    /// Whether the force-close time has been reached at `now`.
    pub fn past_position_close(&self, now: DateTime<Utc>) -> bool {
        self.is_weekday(now) && self.local_time(now) >= self.config.position_close
    }

    /// UTC instant of today's session open (market-local date of `now`).
    pub fn session_open_instant(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_date = self.trading_date(now);
        local_date
            .and_time(self.config.market_open)
            .and_local_timezone(self.config.timezone)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now)
    }

    /// Fraction of the regular session elapsed at `now`, in [0, 1].
    pub fn session_fraction_elapsed(&self, now: DateTime<Utc>) -> f64 {
        let t = self.local_time(now);
        let open = self.config.market_open;
        let close = self.config.market_close;
        if t <= open {
            return 0.0;
        }
        let total = (close - open).num_seconds() as f64;
        if total <= 0.0 {
            return 1.0;
        }
        let elapsed = (t - open).num_seconds() as f64;
        (elapsed / total).clamp(0.0, 1.0)
    }
}
