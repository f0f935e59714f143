//! Notification transports for rendered cost messages

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::types::{CostReportError, Message, Result};

/// Trait for delivering one rendered message
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Reporter name (e.g., "slack")
    fn name(&self) -> &'static str;

    /// Deliver a message
    async fn report(&self, message: &Message) -> Result<()>;
}

/// Slack incoming-webhook reporter
pub struct SlackReporter {
    webhook_url: String,
    channel: Option<String>,
    client: reqwest::Client,
}

impl SlackReporter {
    /// Post to `webhook_url`, overriding the webhook's default channel when
    /// `channel` is set.
    pub fn new(webhook_url: impl Into<String>, channel: Option<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            channel,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Reporter for SlackReporter {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn report(&self, message: &Message) -> Result<()> {
        let payload = SlackPayload::from_message(message, self.channel.clone());

        debug!(channel = ?self.channel, title = %message.title, "Sending Slack message");

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            debug!("Slack message sent");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            warn!(status = %status, body = %body, "Slack webhook request failed");

            Err(CostReportError::Notify(format!(
                "Slack returned {}: {}",
                status, body
            )))
        }
    }
}

/// Prints the Slack payload to stdout instead of sending it
pub struct StdoutReporter {
    channel: Option<String>,
}

impl StdoutReporter {
    pub fn new(channel: Option<String>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Reporter for StdoutReporter {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn report(&self, message: &Message) -> Result<()> {
        let payload = SlackPayload::from_message(message, self.channel.clone());
        let json = serde_json::to_string_pretty(&payload)
            .map_err(|e| CostReportError::Parse(e.to_string()))?;
        println!("{}", json);
        Ok(())
    }
}

// =============================================================================
// Slack webhook payload
// =============================================================================

#[derive(Debug, Serialize, PartialEq)]
pub struct SlackPayload {
    attachments: Vec<SlackAttachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
}

impl SlackPayload {
    /// One attachment per message: section title as author, summary as
    /// pretext, one short field per line.
    pub fn from_message(message: &Message, channel: Option<String>) -> Self {
        let attachment = SlackAttachment {
            fallback: "attachment".to_string(),
            color: "default".to_string(),
            author_name: message.title.clone(),
            text: " ".to_string(),
            fields: message
                .lines
                .iter()
                .map(|line| SlackField {
                    title: line.label.clone(),
                    value: line.value.clone(),
                    short: true,
                })
                .collect(),
            pretext: message.summary.clone(),
        };

        Self {
            attachments: vec![attachment],
            channel,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct SlackAttachment {
    fallback: String,
    color: String,
    author_name: String,
    text: String,
    fields: Vec<SlackField>,
    pretext: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}
