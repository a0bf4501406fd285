//! Fetch, evaluate, persist, notify.
//!
//! `AlertService` is the single owner of the state record for its subject.
//! The monitor tick and every state-changing command run their
//! load-mutate-save under one async mutex, so a `$contract` issued while a
//! tick is in flight can never be lost.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::engine::{is_long_interval, AlertEngine};
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::notify::Notifier;
use crate::store::StateStore;
use crate::types::{AlertState, CycleUpdate, Decision, Evaluation, Reading, StatusView};

/// What one monitor tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub reading: Reading,
    pub decision: Decision,
    pub cycle_update: Option<CycleUpdate>,
    /// A message was handed to the notifier and accepted.
    pub delivered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractReceipt {
    pub current_cycle: i64,
    pub end_cycle: i64,
    pub cycles: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalChange {
    pub minutes: u32,
    /// Accepted, but long enough that price changes may be missed.
    pub long_interval: bool,
}

pub struct AlertService<F, S, N> {
    engine: AlertEngine,
    fetcher: F,
    store: S,
    notifier: N,
    subject: String,
    cycle_updates: bool,
    /// Single-writer guard around load-mutate-save of the state record.
    state_lock: Mutex<()>,
    interval_tx: watch::Sender<u32>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl<F, S, N> AlertService<F, S, N>
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    pub fn new(
        engine: AlertEngine,
        fetcher: F,
        store: S,
        notifier: N,
        subject: String,
        cycle_updates: bool,
        initial_interval_minutes: u32,
    ) -> Self {
        let (interval_tx, _) = watch::channel(initial_interval_minutes);
        Self {
            engine,
            fetcher,
            store,
            notifier,
            subject,
            cycle_updates,
            state_lock: Mutex::new(()),
            interval_tx,
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()),
        }
    }

    pub fn engine(&self) -> &AlertEngine {
        &self.engine
    }

    pub fn health(&self) -> &Arc<HealthState> {
        &self.health
    }

    pub fn latency(&self) -> &Arc<LatencyStats> {
        &self.latency
    }

    /// Receiver for the check interval in minutes. Changes whenever
    /// `set_interval` succeeds.
    pub fn interval_watch(&self) -> watch::Receiver<u32> {
        self.interval_tx.subscribe()
    }

    /// Publish the persisted interval so the scheduler starts on it.
    pub async fn sync_interval(&self) -> Result<u32> {
        let state = self.store.load(&self.subject).await?;
        self.interval_tx.send_replace(state.interval_minutes);
        Ok(state.interval_minutes)
    }

    pub async fn current_state(&self) -> Result<AlertState> {
        Ok(self.store.load(&self.subject).await?)
    }

    async fn fetch(&self) -> Result<Reading> {
        let started = Instant::now();
        match self.fetcher.fetch().await {
            Ok(reading) => {
                self.latency.record(started.elapsed());
                self.health.record_fetch_ok();
                Ok(reading)
            }
            Err(e) => {
                let failures = self.health.record_fetch_failure();
                warn!(consecutive_failures = failures, "Failed to fetch price data: {e}");
                Err(e.into())
            }
        }
    }

    /// One monitor cycle. A failed fetch leaves the stored state untouched;
    /// a failed save suppresses notification.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let reading = self.fetch().await?;

        let eval: Evaluation = {
            let _guard = self.state_lock.lock().await;
            let state = self.store.load(&self.subject).await?;
            let eval = self.engine.evaluate(&reading, &state);
            self.store.save(&self.subject, &eval.state).await?;
            eval
        };

        self.health.record_tick(reading.cycle, eval.decision.is_alert());
        if eval.decision.is_alert() {
            info!(
                cycle = reading.cycle,
                price = reading.price,
                threshold = eval.state.threshold,
                policy = %self.engine.policy(),
                "Price ${:.2} below threshold ${:.2}, raising alert",
                reading.price,
                eval.state.threshold,
            );
        }

        let cycle_update = if self.cycle_updates {
            self.engine.cycle_update(&reading, &eval)
        } else {
            None
        };
        let delivered = self.deliver(cycle_update.as_ref(), &eval.decision).await;

        Ok(TickOutcome {
            reading,
            decision: eval.decision,
            cycle_update,
            delivered,
        })
    }

    /// A cycle update carries the alert mention itself; otherwise alerts go
    /// out on their own.
    async fn deliver(&self, update: Option<&CycleUpdate>, decision: &Decision) -> bool {
        let result = match (update, decision) {
            (Some(update), _) => self.notifier.send_cycle_update(update).await,
            (None, Decision::Alert(alert)) => self.notifier.send_alert(alert).await,
            (None, Decision::None) => return false,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Notification failed, state already persisted: {e}");
                false
            }
        }
    }

    pub async fn status(&self) -> Result<StatusView> {
        let reading = self.fetch().await?;
        let state = self.store.load(&self.subject).await?;
        Ok(self.engine.status(&reading, &state))
    }

    pub async fn register_contract(&self, cycles: i64) -> Result<ContractReceipt> {
        AlertEngine::validate_contract_cycles(cycles)?;

        // Held across the fetch so a tick cannot record a later cycle in between.
        let _guard = self.state_lock.lock().await;
        let reading = self.fetch().await?;
        let state = self.store.load(&self.subject).await?;
        let next = self.engine.register_contract(cycles, &reading, &state)?;
        self.store.save(&self.subject, &next).await?;

        let end_cycle = reading.cycle + cycles;
        info!(
            cycle = reading.cycle,
            end_cycle,
            "Contract registered: {cycles} cycles until cycle {end_cycle}"
        );
        Ok(ContractReceipt {
            current_cycle: reading.cycle,
            end_cycle,
            cycles,
        })
    }

    /// Returns whether a contract had been recorded.
    pub async fn clear_contract(&self) -> Result<bool> {
        let _guard = self.state_lock.lock().await;
        let state = self.store.load(&self.subject).await?;
        let (had_contract, next) = self.engine.clear_contract(&state);
        self.store.save(&self.subject, &next).await?;
        info!(had_contract, "Contract cleared");
        Ok(had_contract)
    }

    pub async fn set_threshold(&self, value: f64) -> Result<f64> {
        let _guard = self.state_lock.lock().await;
        let state = self.store.load(&self.subject).await?;
        let next = self.engine.set_threshold(value, &state)?;
        self.store.save(&self.subject, &next).await?;
        info!("Threshold set to ${:.2}", next.threshold);
        Ok(next.threshold)
    }

    /// Persist the interval, then hand it to the scheduler to reschedule.
    /// Both happen under the state lock so the scheduler always ends up on
    /// the stored interval.
    pub async fn set_interval(&self, minutes: i64) -> Result<IntervalChange> {
        let minutes = {
            let _guard = self.state_lock.lock().await;
            let state = self.store.load(&self.subject).await?;
            let next = self.engine.set_interval(minutes, &state)?;
            self.store.save(&self.subject, &next).await?;
            self.interval_tx.send_replace(next.interval_minutes);
            next.interval_minutes
        };

        let long_interval = is_long_interval(minutes);
        if long_interval {
            warn!("Check interval set to {minutes} minutes; price changes may be missed");
        } else {
            info!("Check interval set to {minutes} minutes");
        }

        Ok(IntervalChange {
            minutes,
            long_interval,
        })
    }
}

pub type SharedService<F, S, N> = Arc<AlertService<F, S, N>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, EngineError, FetchError, StoreError};
    use crate::store::MemoryStore;
    use crate::testutil::{FlakyStore, RecordingNotifier, ScriptedFetcher, Sent};
    use crate::types::AlertPolicy;

    type TestService = AlertService<ScriptedFetcher, MemoryStore, RecordingNotifier>;

    fn service(policy: AlertPolicy, cycle_updates: bool, readings: Vec<Option<Reading>>) -> TestService {
        AlertService::new(
            AlertEngine::new(policy),
            ScriptedFetcher::new(readings),
            MemoryStore::new(AlertState::with_defaults(55.0, 10)),
            RecordingNotifier::default(),
            "default".to_string(),
            cycle_updates,
            10,
        )
    }

    #[tokio::test]
    async fn below_threshold_tick_persists_then_alerts() {
        let svc = service(AlertPolicy::PingOnce, false, vec![Some(Reading::new(50.0, 10))]);

        let outcome = svc.tick().await.unwrap();
        assert!(outcome.decision.is_alert());
        assert!(outcome.delivered);

        let state = svc.current_state().await.unwrap();
        assert!(state.has_pending_alert);
        assert_eq!(state.last_observed_cycle, Some(10));
        assert_eq!(svc.notifier.sent(), vec![Sent::Alert(10)]);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_state_untouched() {
        let svc = service(AlertPolicy::PingOnce, true, vec![None]);
        let before = svc.current_state().await.unwrap();

        let err = svc.tick().await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(FetchError::Malformed(_))));
        assert_eq!(svc.current_state().await.unwrap(), before);
        assert!(svc.notifier.sent().is_empty());
        assert_eq!(svc.health().snapshot().consecutive_fetch_failures, 1);
    }

    #[tokio::test]
    async fn episode_sends_one_alert_and_cycle_updates() {
        let readings = [(50.0, 10), (48.0, 11), (48.0, 11), (56.0, 12)]
            .into_iter()
            .map(|(p, c)| Some(Reading::new(p, c)))
            .collect();
        let svc = service(AlertPolicy::PingOnce, true, readings);

        for _ in 0..4 {
            svc.tick().await.unwrap();
        }

        assert_eq!(
            svc.notifier.sent(),
            vec![
                Sent::Update { cycle: 10, alert: true },
                Sent::Update { cycle: 11, alert: false },
                Sent::Update { cycle: 12, alert: false },
            ]
        );
        assert!(!svc.current_state().await.unwrap().has_pending_alert);
    }

    #[tokio::test]
    async fn notify_failure_keeps_persisted_transition() {
        let svc = service(AlertPolicy::PingOnce, false, vec![Some(Reading::new(50.0, 10))]);
        svc.notifier.fail_next();

        let outcome = svc.tick().await.unwrap();
        assert!(outcome.decision.is_alert());
        assert!(!outcome.delivered);
        assert!(svc.current_state().await.unwrap().has_pending_alert);
    }

    #[tokio::test]
    async fn contract_blocks_alerts_until_expiry() {
        let readings = vec![
            Some(Reading::new(50.0, 100)),
            Some(Reading::new(40.0, 120)),
            Some(Reading::new(40.0, 160)),
        ];
        let svc = service(AlertPolicy::PingOnce, false, readings);

        let receipt = svc.register_contract(52).await.unwrap();
        assert_eq!(
            receipt,
            ContractReceipt { current_cycle: 100, end_cycle: 152, cycles: 52 }
        );

        assert_eq!(svc.tick().await.unwrap().decision, Decision::None);
        assert!(svc.tick().await.unwrap().decision.is_alert());
    }

    #[tokio::test]
    async fn invalid_contract_is_rejected_before_fetching() {
        let svc = service(AlertPolicy::PingOnce, false, vec![]);
        for cycles in [0, -5] {
            let err = svc.register_contract(cycles).await.unwrap_err();
            assert!(matches!(err, AppError::Engine(EngineError::InvalidArgument(_))));
        }
        assert_eq!(svc.fetcher.calls(), 0);
        assert_eq!(
            svc.current_state().await.unwrap(),
            AlertState::with_defaults(55.0, 10)
        );
    }

    #[tokio::test]
    async fn clear_contract_reports_and_persists() {
        let svc = service(AlertPolicy::PingOnce, false, vec![Some(Reading::new(50.0, 1))]);
        assert!(!svc.clear_contract().await.unwrap());
        svc.register_contract(3).await.unwrap();
        assert!(svc.clear_contract().await.unwrap());
        assert_eq!(svc.current_state().await.unwrap().contract_end_cycle, None);
    }

    #[tokio::test]
    async fn set_interval_publishes_to_scheduler() {
        let svc = service(AlertPolicy::PingOnce, false, vec![]);
        let mut rx = svc.interval_watch();
        assert_eq!(*rx.borrow_and_update(), 10);

        let change = svc.set_interval(90).await.unwrap();
        assert!(change.long_interval);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 90);
        assert_eq!(svc.current_state().await.unwrap().interval_minutes, 90);

        assert!(svc.set_interval(0).await.is_err());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn set_threshold_changes_future_decisions() {
        let svc = service(AlertPolicy::PingOnce, false, vec![Some(Reading::new(58.0, 1))]);
        assert_eq!(svc.set_threshold(60.0).await.unwrap(), 60.0);
        assert!(svc.set_threshold(-1.0).await.is_err());
        assert!(svc.tick().await.unwrap().decision.is_alert());
    }

    #[tokio::test]
    async fn status_does_not_persist_reading() {
        let svc = service(AlertPolicy::PingOnce, false, vec![Some(Reading::new(50.0, 7))]);
        let view = svc.status().await.unwrap();
        assert_eq!(view.cycle, 7);
        assert_eq!(view.threshold, 55.0);
        assert_eq!(svc.current_state().await.unwrap().last_observed_cycle, None);
    }

    fn flaky_service(readings: Vec<Option<Reading>>) -> AlertService<ScriptedFetcher, FlakyStore, RecordingNotifier> {
        AlertService::new(
            AlertEngine::new(AlertPolicy::PingOnce),
            ScriptedFetcher::new(readings),
            FlakyStore::new(AlertState::with_defaults(55.0, 10)),
            RecordingNotifier::default(),
            "default".to_string(),
            true,
            10,
        )
    }

    #[tokio::test]
    async fn failed_save_suppresses_notification() {
        let svc = flaky_service(vec![Some(Reading::new(50.0, 10)), Some(Reading::new(50.0, 11))]);
        svc.store.fail_saves(true);

        let err = svc.tick().await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Io(_))));
        assert!(svc.notifier.sent().is_empty());
        assert_eq!(
            svc.current_state().await.unwrap(),
            AlertState::with_defaults(55.0, 10)
        );

        // Once saves work again the alert goes out on the next cycle.
        svc.store.fail_saves(false);
        assert!(svc.tick().await.unwrap().decision.is_alert());
        assert_eq!(svc.notifier.sent(), vec![Sent::Update { cycle: 11, alert: true }]);
    }

    #[tokio::test]
    async fn failed_save_leaves_commands_unapplied() {
        let svc = flaky_service(vec![Some(Reading::new(50.0, 100))]);
        svc.store.fail_saves(true);

        assert!(matches!(svc.register_contract(52).await, Err(AppError::Store(_))));
        assert!(matches!(svc.set_threshold(60.0).await, Err(AppError::Store(_))));

        let mut rx = svc.interval_watch();
        let _ = rx.borrow_and_update();
        assert!(matches!(svc.set_interval(5).await, Err(AppError::Store(_))));
        assert!(!rx.has_changed().unwrap());

        assert_eq!(
            svc.current_state().await.unwrap(),
            AlertState::with_defaults(55.0, 10)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_interval_changes_end_on_stored_value() {
        let svc = Arc::new(service(AlertPolicy::PingOnce, false, vec![]));
        let rx = svc.interval_watch();

        let handles: Vec<_> = (0..200)
            .map(|i| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move { svc.set_interval(if i % 2 == 0 { 5 } else { 90 }).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = svc.current_state().await.unwrap().interval_minutes;
        assert_eq!(*rx.borrow(), stored);
    }

    #[tokio::test]
    async fn concurrent_contract_and_ticks_do_not_lose_updates() {
        let readings = (1..=20).map(|c| Some(Reading::new(60.0, c))).collect();
        let svc = Arc::new(service(AlertPolicy::PingOnce, false, readings));

        let ticker = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move {
                for _ in 0..10 {
                    let _ = svc.tick().await;
                    tokio::task::yield_now().await;
                }
            })
        };
        let contract = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.register_contract(1_000).await })
        };

        ticker.await.unwrap();
        contract.await.unwrap().unwrap();
        assert!(svc.current_state().await.unwrap().contract_end_cycle.is_some());
    }
}
