//! Link-shortener client (Bearer-token REST).
//!
//! The upstream API signals errors in-band: every JSON body carries an
//! `error` field that is `0` (number or string, depending on the endpoint)
//! on success, with `msg` holding the human-readable cause otherwise.

use core::time::Duration;

use anyhow::{Context as _, Result, bail};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use router_core::{LinkEntry, LinkShortener, LinkStatistics, ShortenedLink};

const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for the listing endpoint; plenty for a chat bot's links.
const LIST_LIMIT: u32 = 1000;

#[derive(Debug)]
pub struct ShortenerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct AddLinkBody<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

/// `error` is `0`/`"0"` on success depending on the endpoint.
fn is_ok(data: &Value) -> bool {
    match data.get("error") {
        Some(Value::Number(n)) => n.as_i64() == Some(0),
        Some(Value::String(s)) => s == "0",
        Some(_) | None => false,
    }
}

fn api_message(data: &Value) -> String {
    data.get("msg")
        .and_then(Value::as_str)
        .unwrap_or("unknown shortener error")
        .to_owned()
}

/// Ids and counters arrive as numbers or strings interchangeably.
fn as_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) | None => None,
    }
}

fn as_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(_) | None => 0,
    }
}

/// Top-N maps (`{"PK": 10, "US": 3}`) flattened to pairs, busiest first.
fn counter_pairs(value: Option<&Value>) -> Vec<(String, u64)> {
    let Some(Value::Object(map)) = value else {
        return Vec::new();
    };
    let mut pairs: Vec<(String, u64)> = map
        .iter()
        .map(|(key, count)| (key.clone(), as_u64(Some(count))))
        .filter(|(_, count)| *count > 0)
        .collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1));
    pairs
}

impl ShortenerClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("building shortener http client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn entry_from(value: &Value) -> LinkEntry {
        LinkEntry {
            id: as_string(value.get("id")).unwrap_or_default(),
            short_url: as_string(value.get("shorturl")).unwrap_or_default(),
            long_url: as_string(value.get("longurl")).unwrap_or_default(),
            alias: as_string(value.get("alias")),
            clicks: as_u64(value.get("clicks")),
            date: as_string(value.get("date")),
        }
    }
}

#[async_trait]
impl LinkShortener for ShortenerClient {
    async fn shorten(
        &self,
        url: &str,
        alias: Option<&str>,
        password: Option<&str>,
    ) -> Result<ShortenedLink> {
        debug!(url = %url, custom = ?alias, "Shortener: creating link");

        let response = self
            .http
            .post(format!("{}/api/url/add", self.base_url))
            .timeout(API_TIMEOUT)
            .header("Authorization", self.bearer())
            .json(&AddLinkBody {
                url,
                custom: alias,
                password,
            })
            .send()
            .await
            .context("shortener add request")?;
        let status = response.status();
        if !status.is_success() {
            bail!("shortener returned HTTP {status}");
        }
        let data: Value = response.json().await.context("decoding shortener response")?;
        if !is_ok(&data) {
            bail!("shortener error: {}", api_message(&data));
        }

        let link_id = as_string(data.get("id"));
        let short_url = as_string(data.get("shorturl"));
        let (Some(link_id), Some(short_url)) = (link_id, short_url) else {
            bail!("shortener response missing id or short URL");
        };

        debug!(link_id = %link_id, "Shortener: link created");
        Ok(ShortenedLink { link_id, short_url })
    }

    async fn list_links(&self) -> Result<Vec<LinkEntry>> {
        let response = self
            .http
            .get(format!("{}/api/urls", self.base_url))
            .timeout(API_TIMEOUT)
            .header("Authorization", self.bearer())
            .query(&[
                ("limit", LIST_LIMIT.to_string()),
                ("page", "1".to_owned()),
                ("order", "date".to_owned()),
            ])
            .send()
            .await
            .context("shortener list request")?;
        let status = response.status();
        if !status.is_success() {
            bail!("shortener list returned HTTP {status}");
        }
        let data: Value = response.json().await.context("decoding link listing")?;
        if !is_ok(&data) {
            bail!("shortener error: {}", api_message(&data));
        }

        let urls = data
            .get("data")
            .and_then(|d| d.get("urls"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        debug!(count = urls.len(), "Shortener: listing fetched");
        Ok(urls.iter().map(Self::entry_from).collect())
    }

    async fn stats(&self, link_id: &str) -> Result<LinkStatistics> {
        let response = self
            .http
            .get(format!("{}/api/url/{link_id}", self.base_url))
            .timeout(API_TIMEOUT)
            .header("Authorization", self.bearer())
            .send()
            .await
            .context("shortener stats request")?;
        let status = response.status();
        if !status.is_success() {
            bail!("shortener stats returned HTTP {status}");
        }
        let data: Value = response.json().await.context("decoding link stats")?;
        if !is_ok(&data) {
            bail!("shortener error: {}", api_message(&data));
        }

        let details = data.get("details").cloned().unwrap_or(Value::Null);
        let stats = data.get("data").cloned().unwrap_or(Value::Null);
        if details.is_null() || stats.is_null() {
            bail!("shortener stats response incomplete");
        }

        Ok(LinkStatistics {
            id: as_string(details.get("id")).unwrap_or_else(|| link_id.to_owned()),
            short_url: as_string(details.get("shorturl")).unwrap_or_default(),
            clicks: as_u64(stats.get("clicks")),
            unique_clicks: as_u64(stats.get("uniqueClicks")),
            top_countries: counter_pairs(stats.get("topCountries")),
            top_browsers: counter_pairs(stats.get("topBrowsers")),
            top_os: counter_pairs(stats.get("topOs")),
        })
    }
}
