pub mod endpoint;
pub mod error;
pub mod merge;
pub mod response;

use crate::model::{FetchRequest, FetchResult, SessionCredential};
use endpoint::{EndpointDescriptor, SourceKey};
pub use error::Error;
use futures::future::join_all;
use reqwest::header::{ACCEPT, COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder, Response};
use response::{Payload, RawEndpointResult};

use std::future::Future;
use std::time::Duration;

const SESSION_COOKIE: &str = "sessionId";

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Upper bound for every single request; an expired request counts as failed.
    pub timeout: Duration,
    pub live_data: bool,
    pub production_details: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            timeout: Duration::from_secs(10),
            live_data: true,
            production_details: false,
        }
    }
}

enum Auth<'a> {
    Bearer(&'a str),
    Session(Option<&'a SessionCredential>),
}

/// Description of a single gateway request, built fresh for every call.
struct RequestSpec<'a> {
    url: String,
    auth: Auth<'a>,
}

impl<'a> RequestSpec<'a> {
    fn new(gateway_host: &str, path: &endpoint::Endpoint, auth: Auth<'a>) -> Self {
        RequestSpec {
            url: format!("{}{}", base_url(gateway_host), path),
            auth,
        }
    }

    fn build(&self, client: &Client) -> RequestBuilder {
        let request = client.get(&self.url).header(ACCEPT, "application/json");

        match self.auth {
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Session(Some(session)) => request.header(
                COOKIE,
                format!("{}={}", SESSION_COOKIE, session.as_str()),
            ),
            Auth::Session(None) => request,
        }
    }
}

/// Gateways are addressed by bare host name over https; an explicit scheme is kept as is.
pub fn base_url(gateway_host: &str) -> String {
    let host = gateway_host.trim().trim_end_matches('/');

    if host.starts_with("https://") || host.starts_with("http://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn extract_session_id(response: &Response) -> Result<SessionCredential, Error> {
    response
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE && !cookie.value().is_empty())
        .map(|cookie| SessionCredential::new(cookie.value()))
        .ok_or_else(|| {
            let set_cookie: Vec<&str> = response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            Error::AuthError(format!(
                "failed to get session id, Set-Cookie was: {:?}",
                set_cookie
            ))
        })
}

/// Map transport-level failure of an endpoint request to Error
fn map_transport_err(key: SourceKey, error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::EndpointError(key, format!("request timed out: {}", error))
    } else {
        Error::EndpointError(key, error.to_string())
    }
}

/// Await every request of a fan-out. Results keep the order of `requests` and are only
/// returned once the last one has settled.
pub async fn settle_all<I>(requests: I) -> Vec<<I::Item as Future>::Output>
where
    I: IntoIterator,
    I::Item: Future,
{
    join_all(requests).await
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    endpoints: Vec<EndpointDescriptor>,
}

impl GatewayClient {
    pub fn new(options: &ClientOptions) -> Result<GatewayClient, Error> {
        /* gateways serve a self-signed certificate */
        let client = reqwest::ClientBuilder::new()
            .danger_accept_invalid_certs(true)
            .timeout(options.timeout)
            .build()
            .or(Err(Error::InternalError))?;

        Ok(GatewayClient {
            client,
            endpoints: endpoint::descriptors(options.live_data, options.production_details),
        })
    }

    pub fn endpoints(&self) -> &[EndpointDescriptor] {
        &self.endpoints
    }

    /// Exchange the long-lived API token for a session id.
    pub async fn authenticate(
        &self,
        gateway_host: &str,
        api_token: &str,
    ) -> Result<SessionCredential, Error> {
        let spec = RequestSpec::new(gateway_host, endpoint::CHECK_JWT, Auth::Bearer(api_token));

        let response = spec
            .build(&self.client)
            .send()
            .await
            .map_err(|e| Error::AuthError(e.to_string()))?;

        if response.status() != http::StatusCode::OK {
            return Err(Error::AuthError(format!(
                "response code: {}",
                response.status()
            )));
        }

        extract_session_id(&response)
    }

    async fn fetch_body(
        &self,
        gateway_host: &str,
        descriptor: &EndpointDescriptor,
        session: Option<&SessionCredential>,
    ) -> Result<Payload, Error> {
        let key = descriptor.key;
        let spec = RequestSpec::new(gateway_host, descriptor.path, Auth::Session(session));

        let response = spec
            .build(&self.client)
            .send()
            .await
            .map_err(|e| map_transport_err(key, e))?;

        if response.status() != http::StatusCode::OK {
            return Err(Error::EndpointError(
                key,
                format!("data request error: {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_transport_err(key, e))?;

        Payload::parse(key, &body).map_err(|e| {
            Error::EndpointError(
                key,
                format!("unable to parse JSON ({}), data in response was: {}", e, body),
            )
        })
    }

    /// Fetch one endpoint. Never fails: any problem turns into an error marker for `key`.
    pub async fn fetch_endpoint(
        &self,
        gateway_host: &str,
        descriptor: &EndpointDescriptor,
        session: Option<&SessionCredential>,
    ) -> RawEndpointResult {
        match self.fetch_body(gateway_host, descriptor, session).await {
            Ok(payload) => RawEndpointResult::Success(payload),
            Err(e) => {
                log::error!("{}", e);
                RawEndpointResult::Error(descriptor.key)
            }
        }
    }

    /// Run one polling cycle: reuse or acquire a session, fan out to all endpoints, merge.
    ///
    /// A failure on any endpoint clears the session in the result, so the caller
    /// authenticates again on its next cycle.
    pub async fn fetch_metrics(&self, request: &FetchRequest) -> FetchResult {
        let level = if request.debug {
            log::Level::Info
        } else {
            log::Level::Debug
        };

        let session = match &request.session {
            Some(session) => {
                log::log!(level, "already have a session token");
                Some(session.clone())
            }
            None => {
                log::info!("getting a session token from {}", request.gateway_host);
                match self
                    .authenticate(&request.gateway_host, &request.api_token)
                    .await
                {
                    Ok(session) => Some(session),
                    Err(e) => {
                        log::error!("{}", e);
                        None
                    }
                }
            }
        };

        let requests: Vec<_> = self
            .endpoints
            .iter()
            .map(|descriptor| {
                self.fetch_endpoint(&request.gateway_host, descriptor, session.as_ref())
            })
            .collect();
        let results = settle_all(requests).await;

        let merged = merge::merge(&results);
        log::log!(level, "merged metrics: {:?}", merged.metrics);

        let session = if merged.failed.is_empty() {
            session
        } else {
            log::warn!(
                "{} after failed request(s) to {:?}, re-authenticating next cycle",
                Error::SessionExpired,
                merged.failed
            );
            None
        };

        FetchResult {
            metrics: merged.metrics,
            session,
            failed: merged.failed,
        }
    }
}
