//! Alert-suppression state machine.
//!
//! Pure decision logic: every operation takes a reading and/or the current
//! `AlertState` and returns the next state. Nothing here performs I/O, so
//! callers are responsible for loading, persisting and notifying.
//!
//! Ping-once view of `has_pending_alert`:
//!
//! ```text
//!   ARMED --[price < threshold, no contract]--> TRIPPED   (alert)
//!   TRIPPED --[price >= threshold]-----------> ARMED     (silent)
//! ```
//!
//! A contract never changes the state, it only blocks ARMED -> TRIPPED.

use tracing::debug;

use crate::error::EngineError;
use crate::types::{
    AlertPayload, AlertPolicy, AlertState, CycleUpdate, Decision, Evaluation, Reading, StatusView,
};

/// Intervals above this are accepted but the caller should warn.
pub const LONG_INTERVAL_WARN_MINUTES: u32 = 60;

#[derive(Debug, Clone, Copy)]
pub struct AlertEngine {
    policy: AlertPolicy,
}

impl AlertEngine {
    pub fn new(policy: AlertPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    pub fn evaluate(&self, reading: &Reading, state: &AlertState) -> Evaluation {
        let threshold = state.threshold;
        let is_new_cycle = state.last_observed_cycle != Some(reading.cycle);

        // Last-observed fields follow every reading, including skipped ones.
        let mut next = state.clone();
        next.observe(reading);

        if self.policy == AlertPolicy::PingOnce && !is_new_cycle {
            debug!(cycle = reading.cycle, "Still on cycle {}, skipping evaluation", reading.cycle);
            return Evaluation {
                decision: Decision::None,
                state: next,
                is_new_cycle,
            };
        }

        let contract_end = state.active_contract_end(reading.cycle);
        let is_contract_active = contract_end.is_some();
        let is_above_threshold = reading.price >= threshold;

        let fire = match self.policy {
            AlertPolicy::PingOnce => {
                ping_once(&mut next, is_above_threshold, is_contract_active)
            }
            AlertPolicy::FurtherDecline => {
                further_decline(&mut next, reading.price, is_above_threshold, is_contract_active)
            }
        };

        let decision = if fire {
            Decision::Alert(AlertPayload {
                price: reading.price,
                cycle: reading.cycle,
                threshold,
                contract_remaining: contract_end.map(|end| end - reading.cycle),
            })
        } else {
            Decision::None
        };

        debug!(
            cycle = reading.cycle,
            price = reading.price,
            threshold,
            contract_active = is_contract_active,
            alert = fire,
            "Evaluated cycle {} at ${:.2}",
            reading.cycle,
            reading.price,
        );

        Evaluation {
            decision,
            state: next,
            is_new_cycle,
        }
    }

    /// Suppress alerts for the next `cycles` cycles, counted from `reading.cycle`.
    pub fn register_contract(
        &self,
        cycles: i64,
        reading: &Reading,
        state: &AlertState,
    ) -> Result<AlertState, EngineError> {
        Self::validate_contract_cycles(cycles)?;
        let end = reading.cycle.checked_add(cycles).ok_or_else(|| {
            EngineError::InvalidArgument("number of cycles is too large".to_string())
        })?;

        let mut next = state.clone();
        next.contract_end_cycle = Some(end);
        // A reading older than the last evaluated cycle must not rewind it.
        if !matches!(state.last_observed_cycle, Some(last) if reading.cycle < last) {
            next.observe(reading);
        }
        Ok(next)
    }

    pub fn validate_contract_cycles(cycles: i64) -> Result<(), EngineError> {
        if cycles <= 0 {
            return Err(EngineError::InvalidArgument(
                "number of cycles must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Drop any contract. Returns whether one was recorded (expired or not).
    pub fn clear_contract(&self, state: &AlertState) -> (bool, AlertState) {
        let had_contract = state.contract_end_cycle.is_some();
        let mut next = state.clone();
        next.contract_end_cycle = None;
        (had_contract, next)
    }

    pub fn set_threshold(&self, value: f64, state: &AlertState) -> Result<AlertState, EngineError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(EngineError::InvalidArgument(
                "threshold price must be positive".to_string(),
            ));
        }
        let mut next = state.clone();
        next.threshold = value;
        Ok(next)
    }

    pub fn set_interval(&self, minutes: i64, state: &AlertState) -> Result<AlertState, EngineError> {
        if minutes < 1 {
            return Err(EngineError::InvalidArgument(
                "interval must be at least 1 minute".to_string(),
            ));
        }
        let minutes = u32::try_from(minutes).map_err(|_| {
            EngineError::InvalidArgument("interval is too large".to_string())
        })?;
        let mut next = state.clone();
        next.interval_minutes = minutes;
        Ok(next)
    }

    pub fn status(&self, reading: &Reading, state: &AlertState) -> StatusView {
        let contract_end = state.active_contract_end(reading.cycle);
        StatusView {
            price: reading.price,
            cycle: reading.cycle,
            threshold: state.threshold,
            interval_minutes: state.interval_minutes,
            contract_active: contract_end.is_some(),
            contract_end_cycle: contract_end,
            cycles_remaining: contract_end.map(|end| end - reading.cycle),
        }
    }

    /// Status line for a freshly evaluated reading, or None if the cycle was
    /// already seen.
    pub fn cycle_update(&self, reading: &Reading, eval: &Evaluation) -> Option<CycleUpdate> {
        if !eval.is_new_cycle {
            return None;
        }
        let contract_end = eval.state.active_contract_end(reading.cycle);
        Some(CycleUpdate {
            price: reading.price,
            cycle: reading.cycle,
            threshold: eval.state.threshold,
            contract_end_cycle: contract_end,
            cycles_remaining: contract_end.map(|end| end - reading.cycle),
            alert: eval.decision.is_alert(),
        })
    }
}

pub fn is_long_interval(minutes: u32) -> bool {
    minutes > LONG_INTERVAL_WARN_MINUTES
}

fn ping_once(next: &mut AlertState, is_above_threshold: bool, is_contract_active: bool) -> bool {
    if !is_above_threshold && !is_contract_active && !next.has_pending_alert {
        next.has_pending_alert = true;
        return true;
    }
    if is_above_threshold && next.has_pending_alert {
        debug!("Price back above threshold, re-arming");
        next.has_pending_alert = false;
    }
    false
}

fn further_decline(
    next: &mut AlertState,
    price: f64,
    is_above_threshold: bool,
    is_contract_active: bool,
) -> bool {
    if is_contract_active {
        return false;
    }
    if is_above_threshold {
        if next.last_alerted_price.take().is_some() {
            debug!("Price back above threshold, clearing last alerted price");
        }
        return false;
    }
    match next.last_alerted_price {
        Some(last) if price >= last => false,
        _ => {
            next.last_alerted_price = Some(price);
            true
        }
    }
}
