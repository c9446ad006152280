//! JSON-file persistence: tracked chats, saved links, video-only groups.
//!
//! State lives in a single JSON document rewritten on every mutation (write
//! to a sibling temp file, then rename). Chat bots mutate this a few times a
//! minute at most; the simplicity beats a database here, and the router only
//! ever sees the `ChatStore` trait anyway.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use router_core::{ChatStore, GroupInfo, SavedLink};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ChatRecord {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    message_count: u64,
    #[serde(default)]
    last_seen: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinkRecord {
    owner_chat_id: String,
    link_id: String,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    chats: HashMap<String, ChatRecord>,
    #[serde(default)]
    links: Vec<LinkRecord>,
    /// group id -> admin chat id that enabled it
    #[serde(default)]
    video_only: HashMap<String, String>,
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    admin_number: String,
    data: RwLock<StoreData>,
}

/// Chat ids compare by their digits: `923…@c.us`, `+923…`, and `923…` are
/// the same principal.
fn digits(id: &str) -> String {
    id.chars().filter(char::is_ascii_digit).collect()
}

impl FileStore {
    /// Opens (or initializes) the store. A corrupt file degrades to an empty
    /// store with a warning instead of refusing to start.
    pub async fn open(path: impl Into<PathBuf>, admin_number: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(data) => data,
                Err(error) => {
                    warn!(path = %path.display(), %error, "State file corrupt; starting empty");
                    StoreData::default()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No state file yet; starting empty");
                StoreData::default()
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("reading state file at {}", path.display()));
            }
        };
        Ok(Self {
            path,
            admin_number: digits(&admin_number.into()),
            data: RwLock::new(data),
        })
    }

    /// Persists a snapshot. Failures are logged, never propagated: losing a
    /// counter update must not take the router down.
    async fn persist(&self, data: &StoreData) {
        let serialized = match serde_json::to_string_pretty(data) {
            Ok(serialized) => serialized,
            Err(error) => {
                warn!(%error, "Failed to serialize state");
                return;
            }
        };
        let tmp = self.path.with_extension("json.tmp");
        if let Err(error) = tokio::fs::write(&tmp, &serialized).await {
            warn!(path = %tmp.display(), %error, "Failed to write state file");
            return;
        }
        if let Err(error) = tokio::fs::rename(&tmp, &self.path).await {
            warn!(path = %self.path.display(), %error, "Failed to move state file into place");
        }
    }
}

#[async_trait]
impl ChatStore for FileStore {
    async fn track_chat(&self, chat_id: &str, display_name: &str) {
        let mut data = self.data.write().await;
        let record = data.chats.entry(chat_id.to_owned()).or_default();
        record.message_count += 1;
        record.last_seen = Some(OffsetDateTime::now_utc().unix_timestamp());
        // Group chats keep the first non-empty name we see; direct chats
        // track the sender's current name.
        let name = display_name.trim();
        if !name.is_empty() && (record.display_name.is_empty() || !chat_id.ends_with("@g.us")) {
            record.display_name = name.to_owned();
        }
        let snapshot = data.clone();
        drop(data);
        self.persist(&snapshot).await;
    }

    async fn is_admin(&self, sender_id: &str) -> bool {
        !self.admin_number.is_empty() && digits(sender_id) == self.admin_number
    }

    async fn is_video_only(&self, chat_id: &str) -> bool {
        self.data.read().await.video_only.contains_key(chat_id)
    }

    async fn set_video_only(&self, group_id: &str, enabled: bool, admin_id: &str) -> Result<()> {
        let mut data = self.data.write().await;
        if enabled {
            data.video_only
                .insert(group_id.to_owned(), admin_id.to_owned());
        } else {
            data.video_only.remove(group_id);
        }
        debug!(group = %group_id, enabled, "Video-only set updated");
        let snapshot = data.clone();
        drop(data);
        self.persist(&snapshot).await;
        Ok(())
    }

    async fn known_groups(&self) -> Vec<GroupInfo> {
        let data = self.data.read().await;
        let mut groups: Vec<GroupInfo> = data
            .chats
            .iter()
            .filter(|(chat_id, _)| chat_id.ends_with("@g.us"))
            .map(|(chat_id, record)| GroupInfo {
                chat_id: chat_id.clone(),
                display_name: if record.display_name.is_empty() {
                    chat_id.clone()
                } else {
                    record.display_name.clone()
                },
            })
            .collect();
        groups.sort_by(|a, b| a.chat_id.cmp(&b.chat_id));
        groups
    }

    async fn video_only_groups(&self) -> Vec<GroupInfo> {
        let data = self.data.read().await;
        let mut groups: Vec<GroupInfo> = data
            .video_only
            .keys()
            .map(|group_id| GroupInfo {
                chat_id: group_id.clone(),
                display_name: data
                    .chats
                    .get(group_id)
                    .filter(|r| !r.display_name.is_empty())
                    .map_or_else(|| group_id.clone(), |r| r.display_name.clone()),
            })
            .collect();
        groups.sort_by(|a, b| a.chat_id.cmp(&b.chat_id));
        groups
    }

    async fn save_link(
        &self,
        owner_chat_id: &str,
        link_id: &str,
        password: Option<&str>,
    ) -> Result<()> {
        let mut data = self.data.write().await;
        if let Some(existing) = data
            .links
            .iter_mut()
            .find(|l| l.owner_chat_id == owner_chat_id && l.link_id == link_id)
        {
            existing.password = password.map(ToOwned::to_owned);
        } else {
            data.links.push(LinkRecord {
                owner_chat_id: owner_chat_id.to_owned(),
                link_id: link_id.to_owned(),
                password: password.map(ToOwned::to_owned),
            });
        }
        debug!(owner = %owner_chat_id, link = %link_id, "Link saved");
        let snapshot = data.clone();
        drop(data);
        self.persist(&snapshot).await;
        Ok(())
    }

    async fn links_for(&self, owner_chat_id: &str) -> Vec<SavedLink> {
        self.data
            .read()
            .await
            .links
            .iter()
            .filter(|l| l.owner_chat_id == owner_chat_id)
            .map(|l| SavedLink {
                link_id: l.link_id.clone(),
                owner_chat_id: l.owner_chat_id.clone(),
                password: l.password.clone(),
            })
            .collect()
    }

    async fn all_links(&self) -> Vec<SavedLink> {
        self.data
            .read()
            .await
            .links
            .iter()
            .map(|l| SavedLink {
                link_id: l.link_id.clone(),
                owner_chat_id: l.owner_chat_id.clone(),
                password: l.password.clone(),
            })
            .collect()
    }
}
