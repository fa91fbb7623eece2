//! Display side of the widget.
//!
//! Caches the last known metrics and the session credential between polling cycles and maps
//! them to table rows. Rendering is a pure function of the cached state.

use crate::api::Error;
use crate::model::{FetchRequest, FetchResult, Kw, NormalizedMetrics, SessionCredential};
use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub gateway_host: String,
    pub token: String,
    pub debug: bool,
    pub display_current_production: bool,
    pub display_current_usage: bool,
    pub display_net_output: bool,
    pub display_todays_production: bool,
    pub display_todays_usage: bool,
    pub display_batteries: bool,
    pub display_last_update: bool,
    /// strftime-style format of the "last updated" footer.
    pub display_last_update_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            gateway_host: String::new(),
            token: String::new(),
            debug: false,
            display_current_production: true,
            display_current_usage: true,
            display_net_output: true,
            display_todays_production: true,
            display_todays_usage: true,
            display_batteries: true,
            display_last_update: true,
            display_last_update_format: String::from("%a %H:%M:%S"),
        }
    }
}

/// Text shown on the widget.
#[derive(Debug, Clone, PartialEq)]
pub struct Labels {
    pub current_production: String,
    pub current_usage: String,
    pub importing: String,
    pub exporting: String,
    pub produced_today: String,
    pub used_today: String,
    pub battery_charge: String,
    pub battery_idle: String,
    pub battery_charging: String,
    pub battery_discharging: String,
    pub suffix_kilowatt: String,
    pub suffix_kilowatthour: String,
    pub suffix_percent: String,
    pub loading: String,
    pub last_updated: String,
    pub missing_config: String,
}

impl Default for Labels {
    fn default() -> Self {
        Labels {
            current_production: "Current Production".into(),
            current_usage: "Current Usage".into(),
            importing: "Importing".into(),
            exporting: "Exporting".into(),
            produced_today: "Produced Today".into(),
            used_today: "Used Today".into(),
            battery_charge: "Battery Charge".into(),
            battery_idle: "Battery Idle".into(),
            battery_charging: "Battery Charging".into(),
            battery_discharging: "Battery Discharging".into(),
            suffix_kilowatt: "kW".into(),
            suffix_kilowatthour: "kWh".into(),
            suffix_percent: "%".into(),
            loading: "Loading...".into(),
            last_updated: "Last Updated".into(),
            missing_config: "Please set gateway host and token in the configuration".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    Loading,
    /// Reached on the first usable payload and never left again.
    Loaded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayState {
    pub load_state: LoadState,
    pub metrics: NormalizedMetrics,
    pub session: Option<SessionCredential>,
}

impl Default for DisplayState {
    fn default() -> Self {
        DisplayState {
            load_state: LoadState::Loading,
            metrics: NormalizedMetrics::default(),
            session: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub title: String,
    pub value: String,
    pub suffix: String,
    pub class: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Widget {
    ConfigError(String),
    Loading(String),
    Table {
        rows: Vec<Row>,
        last_updated: Option<String>,
    },
}

/// Fields present in `fresh` replace the cached ones; absent fields keep their last value.
fn keep_last_known(cached: &mut NormalizedMetrics, fresh: NormalizedMetrics) {
    fn take<T>(cached: &mut Option<T>, fresh: Option<T>) {
        if fresh.is_some() {
            *cached = fresh;
        }
    }

    take(&mut cached.current_production, fresh.current_production);
    take(&mut cached.current_usage, fresh.current_usage);
    take(&mut cached.grid_usage, fresh.grid_usage);
    take(&mut cached.todays_production, fresh.todays_production);
    take(&mut cached.todays_usage, fresh.todays_usage);
    take(&mut cached.battery_status, fresh.battery_status);
    take(&mut cached.battery_usage, fresh.battery_usage);
    take(&mut cached.last_updated, fresh.last_updated);
}

fn format_timestamp(timestamp: i64, format: &str) -> Option<String> {
    let time = Local.timestamp_opt(timestamp, 0).single()?;
    let mut formatted = String::new();
    /* an invalid format string surfaces as fmt::Error rather than a panic */
    write!(formatted, "{}", time.format(format)).ok()?;
    Some(formatted)
}

pub struct Display {
    config: DisplayConfig,
    labels: Labels,
    state: DisplayState,
}

impl Display {
    pub fn new(config: DisplayConfig, labels: Labels) -> Self {
        Display {
            config,
            labels,
            state: DisplayState::default(),
        }
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    fn check_config(&self) -> Result<(), Error> {
        if self.config.gateway_host.trim().is_empty() || self.config.token.trim().is_empty() {
            Err(Error::ConfigError(self.labels.missing_config.clone()))
        } else {
            Ok(())
        }
    }

    /// Build the request for this tick, carrying the cached session.
    pub fn on_tick(&self) -> Result<FetchRequest, Error> {
        self.check_config()?;

        Ok(FetchRequest {
            gateway_host: self.config.gateway_host.clone(),
            api_token: self.config.token.clone(),
            debug: self.config.debug,
            session: self.state.session.clone(),
        })
    }

    pub fn on_result(&mut self, result: FetchResult) {
        self.state.session = result.session;

        if result.metrics.is_empty() {
            log::warn!("no usable metrics received, keeping last known values");
            return;
        }

        keep_last_known(&mut self.state.metrics, result.metrics);
        self.state.load_state = LoadState::Loaded;
    }

    fn value(&self, value: Option<f64>) -> String {
        match value {
            Some(v) => format!("{:.2}", v),
            None => self.labels.loading.clone(),
        }
    }

    fn row(&self, title: &str, value: String, suffix: &str, class: &'static str) -> Row {
        Row {
            title: format!("{}:", title),
            value,
            suffix: suffix.to_string(),
            class,
        }
    }

    fn grid_row(&self, grid_usage: Option<Kw>) -> Row {
        let (title, class) = match grid_usage {
            Some(v) if v > 0.0 => (&self.labels.importing, "net-output-importing"),
            _ => (&self.labels.exporting, "net-output-exporting"),
        };
        let value = self.value(grid_usage.map(f64::abs));
        self.row(title, value, &self.labels.suffix_kilowatt, class)
    }

    fn battery_usage_row(&self, battery_usage: Option<Kw>) -> Row {
        let (title, class) = match battery_usage {
            Some(v) if v > 0.0 => (&self.labels.battery_discharging, "battery-state-discharging"),
            Some(v) if v < 0.0 => (&self.labels.battery_charging, "battery-state-charging"),
            _ => (&self.labels.battery_idle, "battery-state-idle"),
        };
        let value = self.value(battery_usage.map(f64::abs));
        self.row(title, value, &self.labels.suffix_kilowatt, class)
    }

    pub fn render(&self) -> Widget {
        if let Err(Error::ConfigError(message)) = self.check_config() {
            return Widget::ConfigError(message);
        }

        if self.state.load_state == LoadState::Loading {
            return Widget::Loading(self.labels.loading.clone());
        }

        let config = &self.config;
        let labels = &self.labels;
        let metrics = &self.state.metrics;
        let mut rows = Vec::new();

        if config.display_current_production {
            rows.push(self.row(
                &labels.current_production,
                self.value(metrics.current_production),
                &labels.suffix_kilowatt,
                "current-production",
            ));
        }

        if config.display_current_usage {
            rows.push(self.row(
                &labels.current_usage,
                self.value(metrics.current_usage),
                &labels.suffix_kilowatt,
                "current-usage",
            ));
        }

        if config.display_net_output {
            rows.push(self.grid_row(metrics.grid_usage));
        }

        if config.display_todays_production {
            rows.push(self.row(
                &labels.produced_today,
                self.value(metrics.todays_production),
                &labels.suffix_kilowatthour,
                "todays-production",
            ));
        }

        if config.display_todays_usage {
            rows.push(self.row(
                &labels.used_today,
                self.value(metrics.todays_usage),
                &labels.suffix_kilowatthour,
                "todays-usage",
            ));
        }

        if config.display_batteries {
            for battery in metrics.battery_status.iter().flatten() {
                rows.push(self.row(
                    &format!("{} {}", labels.battery_charge, battery.index),
                    battery.percent_full.to_string(),
                    &labels.suffix_percent,
                    "battery-charge",
                ));
            }
            rows.push(self.battery_usage_row(metrics.battery_usage));
        }

        let last_updated = if config.display_last_update {
            metrics
                .last_updated
                .and_then(|ts| format_timestamp(ts, &config.display_last_update_format))
                .map(|time| format!("{}: {}", labels.last_updated, time))
        } else {
            None
        };

        Widget::Table { rows, last_updated }
    }
}

impl Widget {
    pub fn to_html(&self) -> String {
        match self {
            Widget::ConfigError(message) | Widget::Loading(message) => {
                format!("<div class=\"enphase-solar\">{}</div>", message)
            }
            Widget::Table { rows, last_updated } => {
                let mut html = String::from("<div class=\"enphase-solar\"><table>");
                for row in rows {
                    html.push_str(&format!(
                        "<tr><td class=\"title-{class} medium regular bright\">{}</td>\
                         <td class=\"data-{class} medium light normal\">{} {}</td></tr>",
                        row.title,
                        row.value,
                        row.suffix,
                        class = row.class
                    ));
                }
                html.push_str("</table>");
                if let Some(last_updated) = last_updated {
                    html.push_str(&format!(
                        "<div class=\"xsmall light\">{}</div>",
                        last_updated
                    ));
                }
                html.push_str("</div>");
                html
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::endpoint::SourceKey;
    use crate::model::BatteryCharge;

    fn configured() -> DisplayConfig {
        DisplayConfig {
            gateway_host: "envoy.local".into(),
            token: "api-token".into(),
            display_last_update: false,
            ..DisplayConfig::default()
        }
    }

    fn full_metrics() -> NormalizedMetrics {
        NormalizedMetrics {
            current_production: Some(3.21),
            current_usage: Some(1.55),
            grid_usage: Some(-1.5),
            todays_production: Some(5.43),
            todays_usage: Some(10.25),
            battery_status: Some(vec![
                BatteryCharge {
                    index: 1,
                    percent_full: 95.0,
                },
                BatteryCharge {
                    index: 2,
                    percent_full: 87.0,
                },
            ]),
            battery_usage: Some(-1.25),
            last_updated: Some(1672574917),
        }
    }

    fn result(metrics: NormalizedMetrics, session: Option<&str>) -> FetchResult {
        FetchResult {
            metrics,
            session: session.map(SessionCredential::new),
            failed: vec![],
        }
    }

    fn rows(display: &Display) -> Vec<Row> {
        match display.render() {
            Widget::Table { rows, .. } => rows,
            other => panic!("expected table, got {:?}", other),
        }
    }

    fn row<'a>(rows: &'a [Row], class: &str) -> &'a Row {
        rows.iter().find(|r| r.class == class).unwrap()
    }

    #[test]
    fn missing_config_short_circuits() {
        let display = Display::new(
            DisplayConfig {
                token: "api-token".into(),
                ..DisplayConfig::default()
            },
            Labels::default(),
        );

        assert!(matches!(display.on_tick(), Err(Error::ConfigError(_))));
        assert_eq!(
            Widget::ConfigError(Labels::default().missing_config),
            display.render()
        );
    }

    #[test]
    fn starts_loading() {
        let display = Display::new(configured(), Labels::default());
        assert_eq!(Widget::Loading("Loading...".into()), display.render());

        let request = display.on_tick().unwrap();
        assert_eq!("envoy.local", request.gateway_host);
        assert_eq!("api-token", request.api_token);
        assert_eq!(None, request.session);
    }

    #[test]
    fn session_is_carried_to_next_tick() {
        let mut display = Display::new(configured(), Labels::default());
        display.on_result(result(full_metrics(), Some("abc123")));
        assert_eq!(
            Some(SessionCredential::new("abc123")),
            display.on_tick().unwrap().session
        );

        display.on_result(result(NormalizedMetrics::default(), None));
        assert_eq!(None, display.on_tick().unwrap().session);
    }

    #[test]
    fn degraded_payload_keeps_last_known_values() {
        let mut display = Display::new(configured(), Labels::default());
        display.on_result(result(full_metrics(), Some("abc123")));

        let degraded = NormalizedMetrics {
            current_production: Some(2.0),
            ..NormalizedMetrics::default()
        };
        display.on_result(FetchResult {
            metrics: degraded,
            session: None,
            failed: vec![SourceKey::Inventory, SourceKey::Live],
        });

        let state = display.state();
        assert_eq!(LoadState::Loaded, state.load_state);
        assert_eq!(Some(2.0), state.metrics.current_production);
        assert_eq!(full_metrics().battery_status, state.metrics.battery_status);
        assert_eq!(Some(-1.25), state.metrics.battery_usage);
        assert_eq!(None, state.session);
    }

    #[test]
    fn never_reverts_to_loading() {
        let mut display = Display::new(configured(), Labels::default());
        display.on_result(result(full_metrics(), Some("abc123")));
        display.on_result(result(NormalizedMetrics::default(), None));

        assert_eq!(LoadState::Loaded, display.state().load_state);
        assert_eq!(full_metrics(), display.state().metrics);
        assert!(matches!(display.render(), Widget::Table { .. }));
    }

    #[test]
    fn empty_first_payload_stays_loading() {
        let mut display = Display::new(configured(), Labels::default());
        display.on_result(result(NormalizedMetrics::default(), None));
        assert_eq!(LoadState::Loading, display.state().load_state);
    }

    #[test]
    fn net_output_sign_selects_label() {
        let mut display = Display::new(configured(), Labels::default());
        display.on_result(result(full_metrics(), Some("abc123")));

        let exporting = rows(&display);
        let grid = row(&exporting, "net-output-exporting");
        assert_eq!("Exporting:", grid.title);
        assert_eq!("1.50", grid.value);
        assert_eq!("kW", grid.suffix);

        display.on_result(result(
            NormalizedMetrics {
                grid_usage: Some(0.75),
                ..NormalizedMetrics::default()
            },
            Some("abc123"),
        ));
        let importing = rows(&display);
        let grid = row(&importing, "net-output-importing");
        assert_eq!("Importing:", grid.title);
        assert_eq!("0.75", grid.value);
    }

    #[test]
    fn battery_rows() {
        let mut display = Display::new(configured(), Labels::default());
        display.on_result(result(full_metrics(), Some("abc123")));

        let rendered = rows(&display);
        let charges: Vec<&Row> = rendered
            .iter()
            .filter(|r| r.class == "battery-charge")
            .collect();
        assert_eq!(2, charges.len());
        assert_eq!("Battery Charge 1:", charges[0].title);
        assert_eq!("95", charges[0].value);
        assert_eq!("Battery Charge 2:", charges[1].title);
        assert_eq!("%", charges[1].suffix);

        let usage = row(&rendered, "battery-state-charging");
        assert_eq!("Battery Charging:", usage.title);
        assert_eq!("1.25", usage.value);

        for (rate, class) in &[
            (0.0, "battery-state-idle"),
            (0.4, "battery-state-discharging"),
        ] {
            display.on_result(result(
                NormalizedMetrics {
                    battery_usage: Some(*rate),
                    ..NormalizedMetrics::default()
                },
                Some("abc123"),
            ));
            assert!(rows(&display).iter().any(|r| r.class == *class));
        }
    }

    #[test]
    fn toggles_hide_rows() {
        let mut display = Display::new(
            DisplayConfig {
                display_current_usage: false,
                display_batteries: false,
                display_todays_usage: false,
                ..configured()
            },
            Labels::default(),
        );
        display.on_result(result(full_metrics(), Some("abc123")));

        let classes: Vec<&str> = rows(&display).iter().map(|r| r.class).collect();
        assert_eq!(
            vec![
                "current-production",
                "net-output-exporting",
                "todays-production"
            ],
            classes
        );
    }

    #[test]
    fn fields_never_received_show_loading() {
        let mut display = Display::new(configured(), Labels::default());
        display.on_result(result(
            NormalizedMetrics {
                todays_production: Some(1.0),
                ..NormalizedMetrics::default()
            },
            None,
        ));

        let rendered = rows(&display);
        assert_eq!("Loading...", row(&rendered, "current-usage").value);
        assert_eq!("1.00", row(&rendered, "todays-production").value);
        assert!(rendered.iter().all(|r| r.class != "battery-charge"));
    }

    #[test]
    fn render_is_idempotent() {
        let mut display = Display::new(
            DisplayConfig {
                display_last_update: true,
                ..configured()
            },
            Labels::default(),
        );
        display.on_result(result(full_metrics(), Some("abc123")));

        let first = display.render();
        let second = display.render();
        assert_eq!(first, second);
        assert_eq!(first.to_html(), second.to_html());
    }

    #[test]
    fn last_updated_footer() {
        let mut display = Display::new(
            DisplayConfig {
                display_last_update: true,
                display_last_update_format: "%Y".into(),
                ..configured()
            },
            Labels::default(),
        );
        display.on_result(result(full_metrics(), Some("abc123")));

        match display.render() {
            Widget::Table { last_updated, .. } => {
                let footer = last_updated.unwrap();
                assert!(footer.starts_with("Last Updated: 202"));
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn invalid_time_format_drops_footer() {
        assert_eq!(None, format_timestamp(1672574917, "%Q"));
    }

    #[test]
    fn html_rows_carry_classes() {
        let mut display = Display::new(configured(), Labels::default());
        display.on_result(result(full_metrics(), Some("abc123")));

        let html = display.render().to_html();
        assert!(html.contains(
            "<td class=\"title-current-production medium regular bright\">Current Production:</td>"
        ));
        assert!(html.contains("<td class=\"data-current-production medium light normal\">3.21 kW</td>"));
        assert!(html.contains("title-net-output-exporting"));
    }

    #[test]
    fn state_is_serializable() {
        let mut display = Display::new(configured(), Labels::default());
        display.on_result(result(full_metrics(), Some("abc123")));

        let value = serde_json::to_value(display.state()).unwrap();
        assert_eq!("Loaded", value["loadState"]);
        assert_eq!("abc123", value["session"]);
        let restored: DisplayState = serde_json::from_value(value).unwrap();
        assert_eq!(display.state(), &restored);
    }
}
