use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One observation from the price feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub price: f64,
    pub cycle: i64,
}

impl Reading {
    pub fn new(price: f64, cycle: i64) -> Self {
        Self { price, cycle }
    }
}

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// The persisted record for one monitored subject. Always saved whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    /// Alerts fire when price is strictly below this value.
    pub threshold: f64,
    pub interval_minutes: u32,
    /// Alerts are suppressed while `cycle < contract_end_cycle`.
    #[serde(default)]
    pub contract_end_cycle: Option<i64>,
    /// Ping-once policy: set once the current below-threshold episode has alerted.
    #[serde(default)]
    pub has_pending_alert: bool,
    #[serde(default)]
    pub last_observed_cycle: Option<i64>,
    #[serde(default)]
    pub last_observed_price: Option<f64>,
    /// Further-decline policy: price of the most recent alert in this episode.
    #[serde(default)]
    pub last_alerted_price: Option<f64>,
}

impl AlertState {
    pub fn with_defaults(threshold: f64, interval_minutes: u32) -> Self {
        Self {
            threshold,
            interval_minutes,
            contract_end_cycle: None,
            has_pending_alert: false,
            last_observed_cycle: None,
            last_observed_price: None,
            last_alerted_price: None,
        }
    }

    /// The contract end cycle, if it is still in force at `cycle`.
    pub fn active_contract_end(&self, cycle: i64) -> Option<i64> {
        self.contract_end_cycle.filter(|&end| cycle < end)
    }

    pub fn observe(&mut self, reading: &Reading) {
        self.last_observed_cycle = Some(reading.cycle);
        self.last_observed_price = Some(reading.price);
    }
}

// ---------------------------------------------------------------------------
// Alert policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertPolicy {
    /// Alert once per below-threshold episode, re-arm when price recovers.
    /// Evaluations within an already-seen cycle are skipped.
    PingOnce,
    /// Alert on first drop below threshold and again whenever price falls
    /// below the last alerted price.
    FurtherDecline,
}

impl std::str::FromStr for AlertPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ping-once" | "a" => Ok(AlertPolicy::PingOnce),
            "further-decline" | "b" => Ok(AlertPolicy::FurtherDecline),
            other => Err(format!("unknown alert policy '{other}'")),
        }
    }
}

impl std::fmt::Display for AlertPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertPolicy::PingOnce => "ping-once",
            AlertPolicy::FurtherDecline => "further-decline",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Engine outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPayload {
    pub price: f64,
    pub cycle: i64,
    pub threshold: f64,
    /// Cycles left on a contract that is still in force, if any.
    pub contract_remaining: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    None,
    Alert(AlertPayload),
}

impl Decision {
    pub fn is_alert(&self) -> bool {
        matches!(self, Decision::Alert(_))
    }
}

/// Result of one `AlertEngine::evaluate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub decision: Decision,
    pub state: AlertState,
    pub is_new_cycle: bool,
}

/// Read-only snapshot served to `$status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub price: f64,
    pub cycle: i64,
    pub threshold: f64,
    pub interval_minutes: u32,
    pub contract_active: bool,
    pub contract_end_cycle: Option<i64>,
    pub cycles_remaining: Option<i64>,
}

impl StatusView {
    pub fn is_above_threshold(&self) -> bool {
        self.price >= self.threshold
    }
}

/// Compact per-cycle status line posted by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleUpdate {
    pub price: f64,
    pub cycle: i64,
    pub threshold: f64,
    pub contract_end_cycle: Option<i64>,
    pub cycles_remaining: Option<i64>,
    /// True when this update carries an alert (the user is mentioned).
    pub alert: bool,
}

impl CycleUpdate {
    pub fn is_above_threshold(&self) -> bool {
        self.price >= self.threshold
    }
}
