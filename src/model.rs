use crate::api::endpoint::SourceKey;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Kw = f64;
pub type KWh = f64;
pub type Percent = f64;

/// Session identifier handed out by the gateway's `check_jwt` exchange.
///
/// Never expires by time; it is dropped only when a data endpoint fails.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionCredential(String);

impl SessionCredential {
    pub fn new(session_id: impl Into<String>) -> Self {
        SessionCredential(session_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/* Keep session ids out of logs */
impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCredential(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryCharge {
    /// 1-based position in the gateway's inventory.
    pub index: usize,
    pub percent_full: Percent,
}

/// Merged view over all endpoints of one cycle. A field is `None` when its source endpoint
/// failed or did not report it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMetrics {
    pub current_production: Option<Kw>,
    pub current_usage: Option<Kw>,
    /// Positive when importing from the grid, negative when exporting.
    pub grid_usage: Option<Kw>,
    pub todays_production: Option<KWh>,
    pub todays_usage: Option<KWh>,
    pub battery_status: Option<Vec<BatteryCharge>>,
    /// Positive when discharging, negative when charging.
    pub battery_usage: Option<Kw>,
    /// Unix timestamp (seconds) of the production meter reading.
    pub last_updated: Option<i64>,
}

impl NormalizedMetrics {
    pub fn is_empty(&self) -> bool {
        *self == NormalizedMetrics::default()
    }
}

/// Display -> gateway helper message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub gateway_host: String,
    pub api_token: String,
    pub debug: bool,
    pub session: Option<SessionCredential>,
}

/// Gateway helper -> display message. `session == None` means the next cycle must
/// authenticate again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub metrics: NormalizedMetrics,
    pub session: Option<SessionCredential>,
    #[serde(default)]
    pub failed: Vec<SourceKey>,
}

/// Round to the two decimals shown on the display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
