//! Brevo transactional email API.
//!
//! The HTTP client is created the first time it is needed, from whatever API
//! key is present at that moment. Without a key every send fails fast with
//! "Brevo not configured" and no request is made.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use herald_common::outgoing;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    EmailMessage, SendOutcome, Transport, TransportError,
    credentials::{
        BREVO_API_KEY, BREVO_LOGIN, BREVO_SENDER_EMAIL, BREVO_SENDER_NAME, BREVO_TEST_RECIPIENT,
        CredentialSource,
    },
};

const PROVIDER: &str = "Brevo";
const NOT_CONFIGURED: &str = "Brevo not configured";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrevoSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sender name used when `BREVO_SENDER_NAME` is not set
    #[serde(default = "default_sender_name")]
    pub default_sender_name: String,
}

fn default_base_url() -> String {
    "https://api.brevo.com".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_sender_name() -> String {
    "Herald".to_string()
}

impl Default for BrevoSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            default_sender_name: default_sender_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub email: Option<String>,
    pub name: String,
}

/// Point-in-time view of the adapter's configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrevoStatus {
    pub is_initialized: bool,
    pub has_api_key: bool,
    pub has_alternate_credentials: bool,
    pub sender_identity: SenderIdentity,
}

#[derive(Serialize)]
struct Contact<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    sender: Contact<'a>,
    to: [Contact<'a>; 1],
    subject: &'a str,
    html_content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<Contact<'a>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    message_id: Option<String>,
}

#[derive(Debug)]
struct BrevoClient {
    http: reqwest::Client,
    api_key: String,
}

pub struct BrevoTransport {
    settings: BrevoSettings,
    credentials: Arc<dyn CredentialSource>,
    client: RwLock<Option<Arc<BrevoClient>>>,
}

impl fmt::Debug for BrevoTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrevoTransport")
            .field("settings", &self.settings)
            .field("initialized", &self.client.read().is_some())
            .finish_non_exhaustive()
    }
}

impl BrevoTransport {
    pub fn new(settings: BrevoSettings, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            settings,
            credentials,
            client: RwLock::new(None),
        }
    }

    fn sender_identity(&self) -> SenderIdentity {
        SenderIdentity {
            email: self
                .credentials
                .get(BREVO_SENDER_EMAIL)
                .or_else(|| self.credentials.get(BREVO_LOGIN)),
            name: self
                .credentials
                .get(BREVO_SENDER_NAME)
                .unwrap_or_else(|| self.settings.default_sender_name.clone()),
        }
    }

    /// Create the client if an API key is available. Calling this again once
    /// initialised is a no-op; a missing key is never remembered.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn initialize(&self) -> Result<bool, TransportError> {
        Ok(self.client()?.is_some())
    }

    fn client(&self) -> Result<Option<Arc<BrevoClient>>, TransportError> {
        if let Some(client) = self.client.read().as_ref() {
            return Ok(Some(Arc::clone(client)));
        }

        let Some(api_key) = self.credentials.get(BREVO_API_KEY) else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .build()?;

        let mut slot = self.client.write();
        let client = slot.get_or_insert_with(|| {
            tracing::info!(base_url = %self.settings.base_url, "Brevo client initialised");
            Arc::new(BrevoClient { http, api_key })
        });

        Ok(Some(Arc::clone(client)))
    }

    pub fn status(&self) -> BrevoStatus {
        BrevoStatus {
            is_initialized: self.client.read().is_some(),
            has_api_key: self.credentials.contains(BREVO_API_KEY),
            has_alternate_credentials: self.credentials.contains(BREVO_LOGIN),
            sender_identity: self.sender_identity(),
        }
    }

    /// Send a single diagnostic email to `recipient`, falling back to
    /// `BREVO_TEST_RECIPIENT`.
    ///
    /// # Errors
    ///
    /// Propagates network failures from the send.
    pub async fn test_connection(
        &self,
        recipient: Option<&str>,
    ) -> Result<SendOutcome, TransportError> {
        let Some(recipient) = recipient
            .map(ToString::to_string)
            .or_else(|| self.credentials.get(BREVO_TEST_RECIPIENT))
        else {
            return Ok(SendOutcome::failure(format!(
                "No test recipient given and {BREVO_TEST_RECIPIENT} is not set"
            )));
        };

        let message = EmailMessage::new(
            recipient,
            "Herald connection test",
            "<p>This is a test email sent to verify the Brevo integration.</p>",
        )
        .with_text("This is a test email sent to verify the Brevo integration.");

        self.send(&message).await
    }
}

#[async_trait]
impl Transport for BrevoTransport {
    fn name(&self) -> &'static str {
        "brevo"
    }

    async fn send(&self, message: &EmailMessage) -> Result<SendOutcome, TransportError> {
        let Some(client) = self.client()? else {
            return Ok(SendOutcome::failure(NOT_CONFIGURED));
        };

        // Read on every send so a sender exported after the key is honoured
        let sender = self.sender_identity();
        let Some(sender_email) = sender.email.as_deref() else {
            return Ok(SendOutcome::failure(format!(
                "{PROVIDER} not configured: neither {BREVO_SENDER_EMAIL} nor {BREVO_LOGIN} is set"
            )));
        };

        let request = SendRequest {
            sender: Contact {
                email: sender_email,
                name: Some(message.from_name.as_deref().unwrap_or(&sender.name)),
            },
            to: [Contact {
                email: &message.to,
                name: None,
            }],
            subject: &message.subject,
            html_content: &message.html,
            text_content: message.text.as_deref(),
            reply_to: message.reply_to.as_deref().map(|email| Contact { email, name: None }),
        };

        let url = format!("{}/v3/smtp/email", self.settings.base_url.trim_end_matches('/'));
        outgoing!(level = DEBUG, "POST {url} to={}", message.to);

        let response = client
            .http
            .post(&url)
            .header("api-key", &client.api_key)
            .header("accept", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, to = %message.to, "Brevo rejected message");
            return Ok(SendOutcome::failure(format!("Brevo API error {status}: {body}")));
        }

        let message_id = match response.json::<SendResponse>().await {
            Ok(body) => body.message_id,
            Err(err) => {
                tracing::debug!(error = %err, "Brevo response did not carry a message id");
                None
            }
        };

        Ok(SendOutcome::delivered(message_id))
    }
}
