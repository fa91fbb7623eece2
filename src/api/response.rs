use super::endpoint::SourceKey;
use serde::Deserialize;

pub const EIM: &str = "eim";
pub const TOTAL_CONSUMPTION: &str = "total-consumption";
pub const NET_CONSUMPTION: &str = "net-consumption";
pub const ENCHARGE: &str = "ENCHARGE";

mod production {
    use serde::Deserialize;

    /* One entry of `production[]` or `consumption[]` */
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Meter {
        #[serde(rename = "type")]
        pub kind: String,
        pub measurement_type: Option<String>,
        pub reading_time: Option<i64>,
        pub w_now: Option<f64>,
        pub wh_today: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Production {
        pub production: Vec<Meter>,
        #[serde(default)]
        pub consumption: Vec<Meter>,
    }
}

mod inventory {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Device {
        pub serial_num: Option<String>,
        pub percent_full: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct InventoryGroup {
        #[serde(rename = "type")]
        pub kind: String,
        #[serde(default)]
        pub devices: Vec<Device>,
    }
}

mod live_data {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct Channel {
        /* milliwatts */
        pub agg_p_mw: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct Meters {
        pub pv: Channel,
        pub storage: Channel,
        pub grid: Channel,
        pub load: Channel,
    }

    #[derive(Debug, Deserialize)]
    pub struct LiveDataStatus {
        pub meters: Meters,
    }
}

pub use inventory::{Device, InventoryGroup};
pub use live_data::{Channel, LiveDataStatus, Meters};
pub use production::{Meter, Production};

/// Parsed body of a successful endpoint request.
#[derive(Debug)]
pub enum Payload {
    Production(Production),
    Inventory(Vec<InventoryGroup>),
    Live(LiveDataStatus),
}

impl Payload {
    /// Parse `body` into the shape expected from the endpoint identified by `key`.
    pub fn parse(key: SourceKey, body: &str) -> Result<Payload, serde_json::Error> {
        match key {
            SourceKey::Production => serde_json::from_str(body).map(Payload::Production),
            SourceKey::Inventory => serde_json::from_str(body).map(Payload::Inventory),
            SourceKey::Live => serde_json::from_str(body).map(Payload::Live),
        }
    }

    pub fn key(&self) -> SourceKey {
        match self {
            Payload::Production(_) => SourceKey::Production,
            Payload::Inventory(_) => SourceKey::Inventory,
            Payload::Live(_) => SourceKey::Live,
        }
    }
}

/// Outcome of one endpoint request, tagged with its source.
#[derive(Debug)]
pub enum RawEndpointResult {
    Success(Payload),
    Error(SourceKey),
}

impl RawEndpointResult {
    pub fn key(&self) -> SourceKey {
        match self {
            RawEndpointResult::Success(payload) => payload.key(),
            RawEndpointResult::Error(key) => *key,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RawEndpointResult::Error(_))
    }
}
