//! Messaging-gateway client (Green-API-style REST).
//!
//! Endpoints follow the `https://{sub}.api.green-api.com/waInstance{id}/
//! {method}/{token}` scheme, where `{sub}` is the first four characters of
//! the instance id. All calls return JSON; non-200 responses are errors.

use core::time::Duration;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use router_core::{ChatGateway, ContactCard};

const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const FILE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub instance_id: String,
    pub token: String,
}

/// Instance settings as returned by `getSettings`.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceSettings {
    /// Own WhatsApp id, e.g. `923453870090@c.us`.
    #[serde(default)]
    pub wid: String,
}

#[derive(Debug)]
pub struct GreenApi {
    http: reqwest::Client,
    config: GatewayConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendFileByUrlBody<'a> {
    chat_id: &'a str,
    url_file: &'a str,
    file_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatIdBody<'a> {
    chat_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckWhatsappBody {
    phone_number: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    #[serde(default)]
    id_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExistsResponse {
    #[serde(default)]
    exists_whatsapp: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvatarResponse {
    #[serde(default)]
    url_avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContactResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

impl GreenApi {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("building gateway http client")?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, method: &str) -> String {
        let id = &self.config.instance_id;
        let sub: String = id.chars().take(4).collect();
        format!(
            "https://{sub}.api.green-api.com/waInstance{id}/{method}/{token}",
            token = self.config.token
        )
    }

    async fn post<B: Serialize + Sync, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<R> {
        let response = self
            .http
            .post(self.endpoint(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .with_context(|| format!("gateway {method} request"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("gateway {method} returned HTTP {status}");
        }
        response
            .json()
            .await
            .with_context(|| format!("decoding gateway {method} response"))
    }

    /// Fetches instance settings; used at startup to learn our own number.
    pub async fn settings(&self) -> Result<InstanceSettings> {
        let response = self
            .http
            .get(self.endpoint("getSettings"))
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .context("gateway getSettings request")?;
        let status = response.status();
        if !status.is_success() {
            bail!("gateway getSettings returned HTTP {status}");
        }
        response
            .json()
            .await
            .context("decoding gateway settings")
    }
}

#[async_trait]
impl ChatGateway for GreenApi {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        debug!(chat = %chat_id, "Gateway: sending message");
        let sent: SendResponse = self
            .post(
                "sendMessage",
                &SendMessageBody {
                    chat_id,
                    message: text,
                },
                SEND_TIMEOUT,
            )
            .await?;
        debug!(chat = %chat_id, id = ?sent.id_message, "Gateway: message accepted");
        Ok(())
    }

    async fn send_file_by_url(
        &self,
        chat_id: &str,
        file_url: &str,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<()> {
        debug!(chat = %chat_id, file = %filename, "Gateway: sending file by URL");
        let _: SendResponse = self
            .post(
                "sendFileByUrl",
                &SendFileByUrlBody {
                    chat_id,
                    url_file: file_url,
                    file_name: filename,
                    caption,
                },
                FILE_TIMEOUT,
            )
            .await?;
        Ok(())
    }

    async fn send_file_by_upload(&self, chat_id: &str, path: &Path, filename: &str) -> Result<()> {
        debug!(chat = %chat_id, file = %filename, "Gateway: uploading file");
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading upload file at {}", path.display()))?;
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_owned());
        let form = reqwest::multipart::Form::new()
            .text("chatId", chat_id.to_owned())
            .part("file", part);

        let response = self
            .http
            .post(self.endpoint("sendFileByUpload"))
            .timeout(FILE_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .context("gateway sendFileByUpload request")?;
        let status = response.status();
        if !status.is_success() {
            bail!("gateway sendFileByUpload returned HTTP {status}");
        }

        // The temp file exists only for this upload.
        if let Err(error) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %error, "Failed to remove uploaded temp file");
        }
        Ok(())
    }

    async fn check_whatsapp(&self, phone: &str) -> Result<bool> {
        let phone_number: u64 = phone
            .parse()
            .map_err(|_| anyhow!("phone number {phone:?} is not numeric"))?;
        let exists: ExistsResponse = self
            .post(
                "checkWhatsapp",
                &CheckWhatsappBody { phone_number },
                SEND_TIMEOUT,
            )
            .await?;
        Ok(exists.exists_whatsapp)
    }

    async fn avatar_url(&self, chat_id: &str) -> Result<Option<String>> {
        let avatar: AvatarResponse = self
            .post("getAvatar", &ChatIdBody { chat_id }, SEND_TIMEOUT)
            .await?;
        Ok(avatar.url_avatar.filter(|url| !url.is_empty()))
    }

    async fn fetch_avatar_file(&self, avatar_url: &str, chat_id: &str) -> Result<PathBuf> {
        let response = self
            .http
            .get(avatar_url)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .context("downloading avatar")?;
        let status = response.status();
        if !status.is_success() {
            bail!("avatar download returned HTTP {status}");
        }
        let bytes = response.bytes().await.context("reading avatar body")?;

        let clean: String = chat_id
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        let path = std::env::temp_dir().join(format!("avatar_{clean}.jpg"));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("writing avatar to {}", path.display()))?;
        Ok(path)
    }

    async fn contact_info(&self, chat_id: &str) -> Result<ContactCard> {
        let contact: ContactResponse = self
            .post("getContactInfo", &ChatIdBody { chat_id }, SEND_TIMEOUT)
            .await?;
        let has_avatar = contact
            .avatar
            .as_deref()
            .is_some_and(|a| !a.is_empty() && a != "No avatar");
        Ok(ContactCard {
            name: contact.name.filter(|n| !n.is_empty()),
            has_avatar,
        })
    }
}
