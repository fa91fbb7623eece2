use serde::{Deserialize, Serialize};
use std::fmt;

pub type Endpoint = str;

pub const CHECK_JWT: &Endpoint = "/auth/check_jwt";
pub const PRODUCTION: &Endpoint = "/production.json";
pub const PRODUCTION_DETAILS: &Endpoint = "/production.json?details=1";
pub const INVENTORY: &Endpoint = "/ivp/ensemble/inventory";
pub const LIVE_DATA: &Endpoint = "/ivp/livedata/status";

/// Key under which an endpoint's result is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKey {
    Production,
    Inventory,
    Live,
}

impl SourceKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKey::Production => "production",
            SourceKey::Inventory => "inventory",
            SourceKey::Live => "live",
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub path: &'static Endpoint,
    pub key: SourceKey,
}

/// Endpoints polled every cycle. The live endpoint only exists on newer gateway firmware.
pub fn descriptors(live_data: bool, production_details: bool) -> Vec<EndpointDescriptor> {
    let production = if production_details {
        PRODUCTION_DETAILS
    } else {
        PRODUCTION
    };

    let mut endpoints = vec![
        EndpointDescriptor {
            path: production,
            key: SourceKey::Production,
        },
        EndpointDescriptor {
            path: INVENTORY,
            key: SourceKey::Inventory,
        },
    ];

    if live_data {
        endpoints.push(EndpointDescriptor {
            path: LIVE_DATA,
            key: SourceKey::Live,
        });
    }

    endpoints
}
