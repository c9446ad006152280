//! Collaborator seams: everything slow or external sits behind these traits.
//!
//! The router treats each call as fire-and-forget — a failure is logged and
//! turned into a user-visible notice, never propagated upward.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// Outcome of one conversational exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationReply {
    pub text: String,
    /// Continuity value to hand back on the next turn; `None` means the
    /// collaborator did not issue a new one.
    pub continuation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMedia {
    pub media_url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenedLink {
    pub link_id: String,
    pub short_url: String,
}

/// One entry from the shortener's own listing.
#[derive(Debug, Clone, Default)]
pub struct LinkEntry {
    pub id: String,
    pub short_url: String,
    pub long_url: String,
    pub alias: Option<String>,
    pub clicks: u64,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LinkStatistics {
    pub id: String,
    pub short_url: String,
    pub clicks: u64,
    pub unique_clicks: u64,
    pub top_countries: Vec<(String, u64)>,
    pub top_browsers: Vec<(String, u64)>,
    pub top_os: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Default)]
pub struct ContactCard {
    pub name: Option<String>,
    pub has_avatar: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub chat_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedLink {
    pub link_id: String,
    pub owner_chat_id: String,
    pub password: Option<String>,
}

/// The messaging gateway: replies, media sends, and contact lookups.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()>;

    async fn send_file_by_url(
        &self,
        chat_id: &str,
        file_url: &str,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<()>;

    async fn send_file_by_upload(&self, chat_id: &str, path: &Path, filename: &str) -> Result<()>;

    async fn check_whatsapp(&self, phone: &str) -> Result<bool>;

    /// Avatar URL for a chat, `None` when the account has no avatar set.
    async fn avatar_url(&self, chat_id: &str) -> Result<Option<String>>;

    /// Downloads an avatar to a local temp file for re-upload.
    async fn fetch_avatar_file(&self, avatar_url: &str, chat_id: &str) -> Result<PathBuf>;

    async fn contact_info(&self, chat_id: &str) -> Result<ContactCard>;
}

/// The conversational AI collaborator.
#[async_trait]
pub trait Conversation: Send + Sync {
    async fn reply(&self, text: &str, continuation: Option<&str>) -> Result<ConversationReply>;
}

/// The video resolver collaborator.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<VideoMedia>;
}

/// The link-shortening collaborator.
#[async_trait]
pub trait LinkShortener: Send + Sync {
    async fn shorten(
        &self,
        url: &str,
        alias: Option<&str>,
        password: Option<&str>,
    ) -> Result<ShortenedLink>;

    async fn list_links(&self) -> Result<Vec<LinkEntry>>;

    async fn stats(&self, link_id: &str) -> Result<LinkStatistics>;
}

/// Persistence and policy lookups. Queried fresh per message; the router
/// never caches answers across messages.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn track_chat(&self, chat_id: &str, display_name: &str);

    async fn is_admin(&self, sender_id: &str) -> bool;

    async fn is_video_only(&self, chat_id: &str) -> bool;

    async fn set_video_only(&self, group_id: &str, enabled: bool, admin_id: &str) -> Result<()>;

    /// Group chats this bot has seen, for admin candidate lists.
    async fn known_groups(&self) -> Vec<GroupInfo>;

    async fn video_only_groups(&self) -> Vec<GroupInfo>;

    async fn save_link(&self, owner_chat_id: &str, link_id: &str, password: Option<&str>)
    -> Result<()>;

    async fn links_for(&self, owner_chat_id: &str) -> Vec<SavedLink>;

    async fn all_links(&self) -> Vec<SavedLink>;
}

/// Bundle of all collaborator handles the router dispatches into.
#[derive(Clone)]
pub struct Collaborators {
    pub gateway: Arc<dyn ChatGateway>,
    pub conversation: Arc<dyn Conversation>,
    pub video: Arc<dyn VideoFetcher>,
    pub shortener: Arc<dyn LinkShortener>,
    pub store: Arc<dyn ChatStore>,
}

impl core::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
