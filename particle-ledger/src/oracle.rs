//! Exchange rate oracle
//!
//! The oracle exposes the current conversion rate between the Asset unit
//! and the Interest-bearing unit. The rate is monotonically non-decreasing;
//! reads may finalize a pending external accrual ("drip") before returning.

use crate::config::AccrualConfig;
use crate::error::{Error, Result};
use crate::math::Rate;
use parking_lot::Mutex;
use std::sync::Arc;

/// Source of the Asset ↔ Interest-bearing exchange rate
///
/// `current_rate` is read-and-possibly-mutate: implementations refresh
/// lazily on each call. A failing rate source maps to
/// [`Error::OracleUnavailable`].
pub trait ExchangeRateOracle: Send + Sync {
    /// Current exchange rate, after finalizing any pending accrual
    fn current_rate(&self) -> Result<Rate>;
}

/// Seconds source, injectable for deterministic tests
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| {
        let now = chrono::Utc::now().timestamp();
        u64::try_from(now).unwrap_or(0)
    })
}

struct AccrualState {
    rate: Rate,
    last_drip: u64,
}

/// Linear per-second accruing oracle
///
/// `rate(t) = base + per_second * (t - t0)`, finalized lazily on each read.
pub struct AccrualOracle {
    state: Mutex<AccrualState>,
    per_second: u128,
    clock: Clock,
}

impl AccrualOracle {
    /// Create from accrual configuration, starting the clock now
    pub fn new(config: &AccrualConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    /// Create with an injected clock
    pub fn with_clock(config: &AccrualConfig, clock: Clock) -> Self {
        let now = clock();
        Self {
            state: Mutex::new(AccrualState {
                rate: Rate::from_scaled(u128::from(config.base_rate)),
                last_drip: now,
            }),
            per_second: u128::from(config.rate_per_second),
            clock,
        }
    }
}

impl ExchangeRateOracle for AccrualOracle {
    fn current_rate(&self) -> Result<Rate> {
        let mut state = self.state.lock();
        let now = (self.clock)();

        // Clock regressions are ignored; the rate never decreases.
        if now > state.last_drip {
            let elapsed = u128::from(now - state.last_drip);
            let pending = elapsed
                .checked_mul(self.per_second)
                .and_then(|p| state.rate.as_scaled().checked_add(p))
                .ok_or_else(|| {
                    Error::OracleUnavailable("rate accumulator overflow".to_string())
                })?;
            state.rate = Rate::from_scaled(pending);
            state.last_drip = now;
        }

        Ok(state.rate)
    }
}

/// Manually driven oracle for tests and external rate feeds
///
/// Monotonicity is enforced: setting a lower rate is rejected. The
/// availability toggle simulates a paused or insolvent rate source.
pub struct ManualOracle {
    rate: Mutex<Rate>,
    available: Mutex<bool>,
}

impl ManualOracle {
    /// Create at the given starting rate
    pub fn new(rate: Rate) -> Self {
        Self {
            rate: Mutex::new(rate),
            available: Mutex::new(true),
        }
    }

    /// Advance the rate; decreases are rejected
    pub fn set_rate(&self, rate: Rate) -> Result<()> {
        let mut current = self.rate.lock();
        if rate < *current {
            return Err(Error::OracleUnavailable(format!(
                "rate regression: {rate} < {current}",
                current = *current
            )));
        }
        *current = rate;
        Ok(())
    }

    /// Toggle availability
    pub fn set_available(&self, available: bool) {
        *self.available.lock() = available;
    }
}

impl ExchangeRateOracle for ManualOracle {
    fn current_rate(&self) -> Result<Rate> {
        if !*self.available.lock() {
            return Err(Error::OracleUnavailable(
                "rate source is paused".to_string(),
            ));
        }
        Ok(*self.rate.lock())
    }
}
