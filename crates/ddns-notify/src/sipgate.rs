//! sipgate.io SMS notifier
//!
//! ```http
//! POST https://api.sipgate.com/v2/sessions/sms
//! Authorization: Basic base64(tokenId:token)
//!
//! { "smsId": "s0", "recipient": "+4915799912345", "message": "..." }
//! ```
//!
//! Docs: https://api.sipgate.com/v2/doc#/sessions/sendWebSms

use async_trait::async_trait;
use ddns_core::config::{NotificationConfig, SipgateSmsConfig};
use ddns_core::traits::{ChangeNotice, Notifier, NotifierFactory};
use ddns_core::{Error, Result};
use serde::Serialize;
use std::time::Duration;

const SIPGATE_API_BASE: &str = "https://api.sipgate.com";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SmsRequest<'a> {
    sms_id: &'a str,
    recipient: &'a str,
    message: String,
}

pub struct SipgateSmsNotifier {
    token_id: String,
    token: String,
    sms_id: String,
    recipient: String,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for SipgateSmsNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SipgateSmsNotifier")
            .field("token_id", &self.token_id)
            .field("token", &"<REDACTED>")
            .field("sms_id", &self.sms_id)
            .field("recipient", &self.recipient)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl SipgateSmsNotifier {
    /// Create a notifier from an enabled `sipgateSMS` block
    pub fn from_config(config: &SipgateSmsConfig) -> Result<Self> {
        for (field, value) in [
            ("tokenId", &config.token_id),
            ("token", &config.token),
            ("smsId", &config.sms_id),
            ("recipient", &config.recipient),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config(format!("sipgateSMS requires '{}'", field)));
            }
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            token_id: config.token_id.clone(),
            token: config.token.clone(),
            sms_id: config.sms_id.clone(),
            recipient: config.recipient.clone(),
            api_base: SIPGATE_API_BASE.to_string(),
            client,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Notifier for SipgateSmsNotifier {
    async fn send(&self, notice: &ChangeNotice) -> Result<()> {
        let body = SmsRequest {
            sms_id: &self.sms_id,
            recipient: &self.recipient,
            message: notice.render(),
        };

        let response = self
            .client
            .post(format!("{}/v2/sessions/sms", self.api_base))
            .basic_auth(&self.token_id, Some(&self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::notify(format!("sipgate SMS request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::notify(format!(
                "sipgate SMS rejected: {} {}",
                status,
                text.trim()
            )));
        }

        tracing::info!(recipient = %self.recipient, "sipgate SMS notification sent");
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "sipgate SMS"
    }
}

#[derive(Debug, Clone, Default)]
pub struct SipgateSmsFactory {
    api_base: Option<String>,
}

impl SipgateSmsFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: Some(api_base.into()),
        }
    }
}

impl NotifierFactory for SipgateSmsFactory {
    fn create(&self, config: &NotificationConfig) -> Result<Option<Box<dyn Notifier>>> {
        if !config.sipgate_sms.enabled {
            return Ok(None);
        }
        let notifier = SipgateSmsNotifier::from_config(&config.sipgate_sms)?;
        Ok(Some(Box::new(match &self.api_base {
            Some(base) => notifier.with_api_base(base.clone()),
            None => notifier,
        })))
    }
}
