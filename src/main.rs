#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use enphase_solar_rs::display::{Display, Labels, Widget};
use enphase_solar_rs::settings::{self, Settings};
use enphase_solar_rs::transport::{self, HelperHandle};
use enphase_solar_rs::{Error, GatewayClient};
use rocket::fairing::AdHoc;
use rocket::response::content::RawHtml;
use rocket::{Build, Rocket, State};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

mod metrics;

/// Structure containing state for API handlers and the poll loop.
pub struct StateData {
    display: Mutex<Display>,
}

impl StateData {
    fn render(&self) -> Result<Widget, Error> {
        self.display
            .lock()
            .map(|display| display.render())
            .or(Err(Error::InternalError))
    }
}

/// One tick: build a request from the display, hand it to the helper, feed the reply back.
async fn poll_once(state: &StateData, helper: &HelperHandle) -> Result<(), Error> {
    let request = state
        .display
        .lock()
        .or(Err(Error::InternalError))?
        .on_tick()?;

    log::info!("getting data");
    let result = helper.request(request.clone()).await?;
    metrics::record(&request, &result);

    let mut display = state.display.lock().or(Err(Error::InternalError))?;
    display.on_result(result);
    metrics::publish(&display.state().metrics);

    Ok(())
}

/// Poll on a fixed interval. Each fetch is awaited before the next tick and missed ticks are
/// skipped, so cycles never overlap.
async fn poll(state: Arc<StateData>, helper: HelperHandle, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match poll_once(&state, &helper).await {
            Ok(()) => {}
            Err(Error::ConfigError(e)) => log::error!("not fetching: {}", e),
            Err(e) => log::error!("{}", e),
        }
    }
}

#[get("/")]
fn widget_route(state: &State<Arc<StateData>>) -> Result<RawHtml<String>, Error> {
    match state.render()? {
        Widget::ConfigError(message) => Err(Error::ConfigError(message)),
        widget => Ok(RawHtml(widget.to_html())),
    }
}

#[get("/metrics")]
fn metrics_route() -> Result<String, Error> {
    metrics::read()
}

#[launch]
fn rocket() -> Rocket<Build> {
    env_logger::init();

    let settings: Settings = settings::read_settings().expect("Configuration error");
    let client = GatewayClient::new(&settings.client_options()).expect("Unable to build HTTP client");
    let interval = settings.refresh_interval();

    let state = Arc::new(StateData {
        display: Mutex::new(Display::new(settings.display_config(), Labels::default())),
    });
    let poller_state = state.clone();

    rocket::build()
        .manage(state)
        .mount("/", routes![widget_route, metrics_route])
        .attach(AdHoc::on_liftoff("Gateway poller", move |_| {
            Box::pin(async move {
                let helper = transport::spawn_helper(client);
                tokio::spawn(poll(poller_state, helper, interval));
            })
        }))
}
