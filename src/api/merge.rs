use super::endpoint::SourceKey;
use super::response::{
    InventoryGroup, LiveDataStatus, Payload, Production, RawEndpointResult, EIM, ENCHARGE,
    NET_CONSUMPTION, TOTAL_CONSUMPTION,
};
use crate::model::{round2, BatteryCharge, Kw, NormalizedMetrics};

const W_PER_KW: f64 = 1000.0;
const MW_PER_KW: f64 = 1_000_000.0;

#[derive(Debug, Default, PartialEq)]
pub struct Merged {
    pub metrics: NormalizedMetrics,
    /// Sources that ended in an error marker, in result order.
    pub failed: Vec<SourceKey>,
}

/// Production meters read slightly negative at night.
fn non_negative(value: f64) -> f64 {
    if value <= 0.0 {
        0.0
    } else {
        value
    }
}

fn w_to_kw(watts: f64) -> Kw {
    round2(watts / W_PER_KW)
}

fn mw_to_kw(milliwatts: f64) -> Kw {
    round2(milliwatts / MW_PER_KW)
}

fn merge_production(metrics: &mut NormalizedMetrics, production: &Production) {
    if let Some(eim) = production.production.iter().find(|m| m.kind == EIM) {
        metrics.current_production = eim.w_now.map(|w| w_to_kw(non_negative(w)));
        metrics.todays_production = eim.wh_today.map(w_to_kw);
        metrics.last_updated = eim.reading_time;
    }

    for meter in &production.consumption {
        match meter.measurement_type.as_deref() {
            Some(TOTAL_CONSUMPTION) => {
                metrics.current_usage = meter.w_now.map(w_to_kw);
                metrics.todays_usage = meter.wh_today.map(w_to_kw);
            }
            Some(NET_CONSUMPTION) => {
                metrics.grid_usage = meter.w_now.map(w_to_kw);
            }
            _ => {}
        }
    }
}

fn merge_inventory(metrics: &mut NormalizedMetrics, groups: &[InventoryGroup]) {
    let batteries = groups
        .iter()
        .filter(|group| group.kind == ENCHARGE)
        .flat_map(|group| group.devices.iter())
        .enumerate()
        .filter_map(|(i, device)| {
            device.percent_full.map(|percent_full| BatteryCharge {
                index: i + 1,
                percent_full,
            })
        })
        .collect();

    metrics.battery_status = Some(batteries);
}

fn merge_live(metrics: &mut NormalizedMetrics, live: &LiveDataStatus) {
    let meters = &live.meters;

    metrics.battery_usage = Some(mw_to_kw(meters.storage.agg_p_mw));
    metrics.current_production = Some(mw_to_kw(non_negative(meters.pv.agg_p_mw)));
    metrics.current_usage = Some(mw_to_kw(meters.load.agg_p_mw));
    metrics.grid_usage = Some(mw_to_kw(meters.grid.agg_p_mw));
}

/// Merge the settled results of one cycle.
///
/// Failed sources contribute nothing. Live meter figures are applied last and take
/// precedence over the `wNow` readings of the production endpoint, regardless of the order
/// results arrive in.
pub fn merge(results: &[RawEndpointResult]) -> Merged {
    let mut merged = Merged::default();
    let mut live = None;

    for result in results {
        match result {
            RawEndpointResult::Error(key) => merged.failed.push(*key),
            RawEndpointResult::Success(Payload::Production(production)) => {
                merge_production(&mut merged.metrics, production)
            }
            RawEndpointResult::Success(Payload::Inventory(groups)) => {
                merge_inventory(&mut merged.metrics, groups)
            }
            RawEndpointResult::Success(Payload::Live(status)) => live = Some(status),
        }
    }

    if let Some(status) = live {
        merge_live(&mut merged.metrics, status);
    }

    merged
}
