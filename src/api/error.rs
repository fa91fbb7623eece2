use super::endpoint::SourceKey;
use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::fmt;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Gateway host or API token missing; nothing is fetched.
    ConfigError(String),
    /// Authentication exchange failed or returned no session.
    AuthError(String),
    /// One data endpoint failed on transport, status or body.
    EndpointError(SourceKey, String),
    /// Inferred from any `EndpointError`; the session must be dropped.
    SessionExpired,
    /// The notification channel between display and gateway helper is gone.
    TransportError(String),
    FormatError,
    InternalError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigError(s) => write!(f, "configuration error: {}", s),
            Error::AuthError(s) => write!(f, "failed to authorize with local gateway: {}", s),
            Error::EndpointError(key, s) => write!(f, "{} request failed: {}", key, s),
            Error::SessionExpired => f.write_str("session expired"),
            Error::TransportError(s) => write!(f, "notification channel error: {}", s),
            Error::FormatError => f.write_str("unable to format output"),
            Error::InternalError => f.write_str("internal error"),
        }
    }
}

impl std::error::Error for Error {}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        match self {
            Error::ConfigError(s) => {
                let error = format!("<div class=\"enphase-solar\">{}</div>", s);
                Response::build()
                    .status(Status::ServiceUnavailable)
                    .sized_body(error.len(), Cursor::new(error))
                    .header(ContentType::new("text", "html"))
                    .ok()
            }
            _ => {
                let error = format!(
                    "<html><body><h3>Unknown exception</h3><code>{}</code></body></html>",
                    self
                );
                Response::build()
                    .status(Status::InternalServerError)
                    .sized_body(error.len(), Cursor::new(error))
                    .header(ContentType::new("text", "html"))
                    .ok()
            }
        }
    }
}
