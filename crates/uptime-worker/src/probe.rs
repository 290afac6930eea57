use std::time::Duration;

use reqwest::{Client, ClientBuilder, Method};
use tracing::debug;

use uptime_types::{Check, HttpMethod, ProbeError, ProbeOutcome};

use crate::error::WorkerError;

/// Issues the single HTTP request a check makes per sweep.
#[derive(Clone)]
pub struct Prober {
    client: Client,
}

impl Prober {
    pub fn new() -> Result<Self, WorkerError> {
        let client = ClientBuilder::new()
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("uptime/", env!("CARGO_PKG_VERSION")))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| WorkerError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Request the check's target once, racing the response against its
    /// deadline. The losing request future is dropped with the connection.
    pub async fn probe(&self, check: &Check) -> ProbeOutcome {
        let target = match check.target() {
            Ok(url) => url,
            Err(e) => return ProbeOutcome::failed(ProbeError::transport(e.to_string())),
        };
        let deadline = Duration::from_secs(check.timeout_seconds);
        let request = self.client.request(method(check.method), target).send();

        match tokio::time::timeout(deadline, request).await {
            Ok(Ok(response)) => ProbeOutcome::responded(response.status().as_u16()),
            Ok(Err(e)) if e.is_timeout() => ProbeOutcome::failed(ProbeError::timeout()),
            Ok(Err(e)) => {
                debug!(check_id = %check.id, error = %e, "Probe request failed");
                ProbeOutcome::failed(ProbeError::transport(describe(&e)))
            }
            Err(_) => ProbeOutcome::failed(ProbeError::timeout()),
        }
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Short, stable description of a transport failure for the check log.
fn describe(error: &reqwest::Error) -> String {
    if error.is_connect() {
        "connection refused or unreachable".to_string()
    } else if error.is_request() {
        "request failed".to_string()
    } else if error.is_body() {
        "response body error".to_string()
    } else if error.is_redirect() {
        "redirect error".to_string()
    } else {
        "network error".to_string()
    }
}
