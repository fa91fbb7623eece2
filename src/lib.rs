pub mod api;
pub mod display;
pub mod model;
pub mod settings;
pub mod transport;

pub use api::{ClientOptions, Error, GatewayClient};
