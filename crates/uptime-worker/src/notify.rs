use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use tracing::{info, warn};

use uptime_types::validate;

use crate::error::{TransportError, WorkerError};

/// Longest message body the SMS provider accepts.
pub const MAX_MESSAGE_CHARS: usize = 1600;

/// Delivers alert text to a user's phone.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), TransportError>;
}

/// Credentials and endpoint of the SMS provider.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub from: String,
    pub account_sid: String,
    pub auth_token: String,
    pub base_url: String,
}

/// Sends alerts as SMS through a Twilio-compatible REST endpoint.
pub struct SmsNotifier {
    client: Client,
    config: SmsConfig,
}

impl SmsNotifier {
    pub fn new(config: SmsConfig) -> Result<Self, WorkerError> {
        let client = ClientBuilder::new()
            .use_rustls_tls()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WorkerError::Client(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.base_url.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send(&self, phone: &str, message: &str) -> Result<(), TransportError> {
        let phone = validate::phone(phone).map_err(|e| TransportError::InvalidRecipient(e.0))?;
        let body = message.trim();
        let chars = body.chars().count();
        if chars == 0 || chars > MAX_MESSAGE_CHARS {
            return Err(TransportError::InvalidMessage(format!(
                "message must be 1 to {MAX_MESSAGE_CHARS} characters, got {chars}"
            )));
        }

        let to = format!("+1{phone}");
        let form = [
            ("From", self.config.from.as_str()),
            ("To", to.as_str()),
            ("Body", body),
        ];
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            status => {
                warn!(status = status.as_u16(), "SMS provider rejected message");
                Err(TransportError::Status {
                    status: status.as_u16(),
                })
            }
        }
    }
}

/// Writes alerts to the log instead of sending them. Used when no SMS
/// credentials are configured.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, phone: &str, message: &str) -> Result<(), TransportError> {
        info!(phone, message, "Alert (SMS delivery not configured)");
        Ok(())
    }
}
