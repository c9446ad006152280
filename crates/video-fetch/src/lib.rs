//! Video resolver client: turns a social-media URL into a direct media URL.

use core::time::Duration;

use anyhow::{Context as _, Result, bail};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use router_core::{VideoFetcher, VideoMedia};

/// Resolvers can be slow; give them a minute.
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_TITLE: &str = "Downloaded Video";

#[derive(Debug)]
pub struct VideoResolver {
    http: reqwest::Client,
    base_url: String,
}

impl VideoResolver {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("building video resolver http client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl VideoFetcher for VideoResolver {
    async fn fetch(&self, url: &str) -> Result<VideoMedia> {
        debug!(url = %url, "Resolver: fetching video");

        let response = self
            .http
            .get(&self.base_url)
            .timeout(RESOLVE_TIMEOUT)
            .query(&[("url", url)])
            .send()
            .await
            .context("video resolver request")?;
        let status = response.status();
        if !status.is_success() {
            bail!("video resolver returned HTTP {status}");
        }
        let data: Value = response
            .json()
            .await
            .context("decoding video resolver response")?;

        // An explicit `success: false` is a hard failure; absence means ok.
        if data.get("success").and_then(Value::as_bool) == Some(false) {
            bail!("video resolver reported failure");
        }

        let media_info = data.get("mediaInfo").cloned().unwrap_or(Value::Null);
        let media_url = media_info
            .get("videoUrl")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty());
        let Some(media_url) = media_url else {
            bail!("video resolver response carried no media URL");
        };
        let title = media_info
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE);

        debug!(title = %title, "Resolver: media resolved");
        Ok(VideoMedia {
            media_url: media_url.to_owned(),
            title: title.to_owned(),
        })
    }
}
