use serde::{Deserialize, Serialize};

/// The content of one outbound email.
///
/// Nothing here is validated up front; the transport that eventually sends the
/// message is the one that rejects a malformed address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Display name to use instead of the provider's configured sender name
    #[serde(default)]
    pub from_name: Option<String>,
}

impl EmailMessage {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            text: None,
            reply_to: None,
            from_name: None,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    #[must_use]
    pub fn with_from_name(mut self, from_name: impl Into<String>) -> Self {
        self.from_name = Some(from_name.into());
        self
    }
}

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn delivered(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn builder_sets_optional_fields() {
        let message = EmailMessage::new("buyer@example.com", "Viewing booked", "<p>Hi</p>")
            .with_text("Hi")
            .with_reply_to("agent@example.com")
            .with_from_name("Listings");

        assert_eq!(message.text.as_deref(), Some("Hi"));
        assert_eq!(message.reply_to.as_deref(), Some("agent@example.com"));
        assert_eq!(message.from_name.as_deref(), Some("Listings"));
    }

    #[test]
    fn outcome_constructors() {
        let ok = SendOutcome::delivered(Some("<abc@herald>".to_string()));
        assert!(ok.success);
        assert_eq!(ok.error, None);

        let failed = SendOutcome::failure("Brevo not configured");
        assert!(!failed.success);
        assert_eq!(failed.message_id, None);
        assert_eq!(failed.error.as_deref(), Some("Brevo not configured"));
    }
}
