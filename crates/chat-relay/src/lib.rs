//! Conversational AI relay client.
//!
//! The relay is a simple GET API: `?message=…` plus an optional `?chatid=…`
//! carrying the continuation token from the previous turn. Responses are
//! JSON with loosely named fields, so decoding is tolerant.

use core::time::Duration;

use anyhow::{Context as _, Result, bail};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use router_core::{Conversation, ConversationReply};

const RELAY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct ChatRelay {
    http: reqwest::Client,
    base_url: String,
}

impl ChatRelay {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("building relay http client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Conversation for ChatRelay {
    async fn reply(&self, text: &str, continuation: Option<&str>) -> Result<ConversationReply> {
        debug!(continuation = ?continuation, "Relay: sending message");

        let mut request = self
            .http
            .get(&self.base_url)
            .timeout(RELAY_TIMEOUT)
            .query(&[("message", text)]);
        if let Some(token) = continuation {
            request = request.query(&[("chatid", token)]);
        }

        let response = request.send().await.context("relay request")?;
        let status = response.status();
        if !status.is_success() {
            bail!("relay returned HTTP {status}");
        }
        let data: Value = response.json().await.context("decoding relay response")?;

        let reply = data
            .get("reply")
            .or_else(|| data.get("response"))
            .or_else(|| data.get("message"))
            .and_then(Value::as_str);
        let Some(reply) = reply else {
            bail!("relay response carried no reply text");
        };

        let token = data
            .get("chatid")
            .or_else(|| data.get("chat_id"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(ToOwned::to_owned);

        debug!(len = reply.len(), new_token = token.is_some(), "Relay: reply received");
        Ok(ConversationReply {
            text: format_for_whatsapp(reply),
            continuation: token,
        })
    }
}

/// Converts relay markdown into WhatsApp-friendly text: heading hashes are
/// dropped and `**bold**` becomes `*bold*`.
#[must_use]
pub fn format_for_whatsapp(text: &str) -> String {
    let mut lines = Vec::new();
    for line in text.lines() {
        let stripped = line.trim_start();
        let line = if stripped.starts_with('#') {
            stripped.trim_start_matches('#').trim_start()
        } else {
            line
        };
        lines.push(line.replace("**", "*"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_lose_their_hashes() {
        assert_eq!(format_for_whatsapp("### Title\nbody"), "Title\nbody");
        assert_eq!(format_for_whatsapp("  ## Indented"), "Indented");
    }

    #[test]
    fn double_stars_become_single() {
        assert_eq!(format_for_whatsapp("this is **bold** text"), "this is *bold* text");
    }

    #[test]
    fn plain_text_passes_through() {
        let text = "nothing special\njust lines";
        assert_eq!(format_for_whatsapp(text), text);
    }
}
