use enphase_solar_rs::model::{FetchRequest, FetchResult, NormalizedMetrics};
use enphase_solar_rs::Error;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, TextEncoder};

lazy_static! {
    static ref CURRENT_PRODUCTION_GAUGE: Gauge = register_gauge!(opts!(
        "current_production",
        "current solar production (in kW)",
    ))
    .unwrap();
    static ref CURRENT_USAGE_GAUGE: Gauge = register_gauge!(opts!(
        "current_usage",
        "current household consumption (in kW)",
    ))
    .unwrap();
    static ref GRID_USAGE_GAUGE: Gauge = register_gauge!(opts!(
        "grid_usage",
        "net grid flow, positive when importing (in kW)",
    ))
    .unwrap();
    static ref TODAYS_PRODUCTION_GAUGE: Gauge = register_gauge!(opts!(
        "todays_production",
        "total amount of energy produced in current day (in kWh)",
    ))
    .unwrap();
    static ref TODAYS_USAGE_GAUGE: Gauge = register_gauge!(opts!(
        "todays_usage",
        "total amount of energy consumed in current day (in kWh)",
    ))
    .unwrap();
    static ref BATTERY_USAGE_GAUGE: Gauge = register_gauge!(opts!(
        "battery_usage",
        "battery power, positive when discharging (in kW)",
    ))
    .unwrap();
    static ref BATTERY_CHARGE_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("battery_charge", "battery state of charge (in percent)"),
        &["battery"],
    )
    .unwrap();
    static ref ENDPOINT_ERRORS_COUNTER: IntCounterVec = register_int_counter_vec!(
        opts!("endpoint_errors", "failed gateway endpoint requests"),
        &["endpoint"],
    )
    .unwrap();
    static ref AUTHENTICATIONS_COUNTER: IntCounter = register_int_counter!(opts!(
        "authentications",
        "session token exchanges attempted with the gateway",
    ))
    .unwrap();
}

fn set(gauge: &Gauge, value: Option<f64>) {
    if let Some(value) = value {
        gauge.set(value);
    }
}

/// Count authentication attempts and endpoint failures of one cycle.
pub fn record(request: &FetchRequest, result: &FetchResult) {
    if request.session.is_none() {
        AUTHENTICATIONS_COUNTER.inc();
    }

    for key in &result.failed {
        ENDPOINT_ERRORS_COUNTER
            .with_label_values(&[key.as_str()])
            .inc();
    }
}

/// Feed the display's last known metrics to the gauges.
pub fn publish(metrics: &NormalizedMetrics) {
    set(&CURRENT_PRODUCTION_GAUGE, metrics.current_production);
    set(&CURRENT_USAGE_GAUGE, metrics.current_usage);
    set(&GRID_USAGE_GAUGE, metrics.grid_usage);
    set(&TODAYS_PRODUCTION_GAUGE, metrics.todays_production);
    set(&TODAYS_USAGE_GAUGE, metrics.todays_usage);
    set(&BATTERY_USAGE_GAUGE, metrics.battery_usage);

    for battery in metrics.battery_status.iter().flatten() {
        BATTERY_CHARGE_GAUGE
            .with_label_values(&[&battery.index.to_string()])
            .set(battery.percent_full);
    }
}

/// Read metrics from Prometheus exporter registry.
pub fn read() -> Result<String, Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .or(Err(Error::FormatError))?;
    String::from_utf8(buffer).or(Err(Error::FormatError))
}
