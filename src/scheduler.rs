use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::fetcher::Fetcher;
use crate::notify::Notifier;
use crate::service::SharedService;
use crate::store::StateStore;
use crate::types::Decision;

/// Drives `AlertService::tick` on a timer. Exactly one ticker exists at any
/// time: an interval change drops the old one and starts a fresh one.
pub struct Scheduler<F, S, N> {
    service: SharedService<F, S, N>,
    /// Length of one interval unit (a minute outside tests).
    unit: Duration,
}

impl<F, S, N> Scheduler<F, S, N>
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    pub fn new(service: SharedService<F, S, N>) -> Self {
        Self::with_unit(service, Duration::from_secs(60))
    }

    pub fn with_unit(service: SharedService<F, S, N>, unit: Duration) -> Self {
        Self { service, unit }
    }

    fn ticker(&self, minutes: u32) -> Interval {
        let mut ticker = interval(self.unit * minutes.max(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    pub async fn run(self) {
        let mut interval_rx = self.service.interval_watch();
        let mut minutes = *interval_rx.borrow_and_update();
        let mut ticker = self.ticker(minutes);
        info!("Started monitoring loop with {minutes} minute interval");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.service.tick().await {
                        Ok(outcome) => debug!(
                            cycle = outcome.reading.cycle,
                            alert = matches!(outcome.decision, Decision::Alert(_)),
                            delivered = outcome.delivered,
                            "Monitor tick complete",
                        ),
                        Err(e) => error!("Monitor tick failed: {e}"),
                    }
                }
                changed = interval_rx.changed() => {
                    if changed.is_err() {
                        warn!("Interval channel closed, stopping monitor");
                        break;
                    }
                    let next = *interval_rx.borrow_and_update();
                    if next != minutes {
                        minutes = next;
                        ticker = self.ticker(minutes);
                        info!("Rescheduled monitoring loop to {minutes} minute interval");
                    }
                }
            }
        }
    }
}
