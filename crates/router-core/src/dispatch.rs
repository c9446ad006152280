//! The precedence engine: one action per incoming message.
//!
//! Order per message: video-only filter, lazy timeout monitor, AI-chat
//! branch, pending selection, intent classification. The entry point never
//! returns an error — every failure ends in a user-visible reply or a silent
//! drop.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::collab::Collaborators;
use crate::intent::{self, Intent};
use crate::messages::{ReplyCatalog, render};
use crate::registry::{CommandRegistry, CommandSpec};
use crate::session::SessionStore;

/// Inline phrases that force AI-chat deactivation regardless of syntax.
const AI_OFF_PHRASES: &[&str] = &["gpt off", "chatgpt off", "gptoff", "chatgptoff", "ai off"];

/// Reloadable routing parameters.
#[derive(Debug, Clone, Default)]
pub struct RouterConfig {
    pub prefix: Option<char>,
    pub ai_timeout_minutes: Option<i64>,
    pub commands: Vec<CommandSpec>,
}

pub(crate) const DEFAULT_PREFIX: char = '.';
pub(crate) const DEFAULT_TIMEOUT_MINUTES: i64 = 5;

#[derive(Debug)]
pub(crate) struct Routing {
    pub(crate) registry: CommandRegistry,
    pub(crate) prefix: char,
    pub(crate) ai_timeout_minutes: i64,
}

impl Routing {
    /// A malformed command table degrades to an empty registry instead of
    /// refusing to start.
    fn from_config(config: RouterConfig) -> Self {
        let registry = match CommandRegistry::from_specs(&config.commands) {
            Ok(registry) => registry,
            Err(error) => {
                warn!(%error, "Invalid command table; continuing with an empty registry");
                CommandRegistry::default()
            }
        };
        if registry.is_empty() {
            warn!("Command registry is empty; only greetings and URLs will be recognized");
        }
        Self {
            registry,
            prefix: config.prefix.unwrap_or(DEFAULT_PREFIX),
            ai_timeout_minutes: config
                .ai_timeout_minutes
                .filter(|m| *m > 0)
                .unwrap_or(DEFAULT_TIMEOUT_MINUTES),
        }
    }

    pub(crate) fn ai_timeout(&self) -> Duration {
        Duration::minutes(self.ai_timeout_minutes)
    }
}

/// The router core: resolves each webhook delivery to exactly one action.
#[derive(Debug)]
pub struct Router {
    routing: RwLock<Arc<Routing>>,
    sessions: SessionStore,
    pub(crate) collab: Collaborators,
    pub(crate) replies: ReplyCatalog,
}

impl Router {
    #[must_use]
    pub fn new(config: RouterConfig, collab: Collaborators, replies: ReplyCatalog) -> Self {
        Self {
            routing: RwLock::new(Arc::new(Routing::from_config(config))),
            sessions: SessionStore::new(),
            collab,
            replies,
        }
    }

    /// Swaps in a fresh configuration; in-flight messages keep the snapshot
    /// they started with.
    pub async fn reload(&self, config: RouterConfig) {
        let routing = Arc::new(Routing::from_config(config));
        info!(prefix = %routing.prefix, "Routing configuration reloaded");
        *self.routing.write().await = routing;
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Entry point for the webhook layer. Infallible by design: internal
    /// failures become replies or silent drops.
    pub async fn handle_incoming_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        text: &str,
        sender_name: &str,
    ) {
        let preview: String = text.chars().take(120).collect();
        info!(chat = %chat_id, sender = %sender_name, body = %preview, "Incoming message");

        self.collab.store.track_chat(chat_id, sender_name).await;

        let routing = Arc::clone(&*self.routing.read().await);
        let now = OffsetDateTime::now_utc();

        // Video-only chats: URLs are downloaded with zero confirmations,
        // everything else is dropped without reply. Admins are exempt.
        // Queried fresh so toggles from other chats apply immediately.
        if self.collab.store.is_video_only(chat_id).await
            && !self.collab.store.is_admin(sender_id).await
        {
            if intent::has_url(text) {
                self.handle_download(chat_id, text, DownloadMode::Silent)
                    .await;
            } else {
                debug!(chat = %chat_id, "Ignoring non-URL message in video-only chat");
            }
            return;
        }

        if self
            .sessions
            .expire_idle_ai(chat_id, routing.ai_timeout(), now)
            .await
        {
            info!(chat = %chat_id, "AI chat auto-deactivated after inactivity");
            let notice = render(
                &self.replies.ai_auto_timeout,
                &[("minutes", &routing.ai_timeout_minutes.to_string())],
            );
            self.send(chat_id, &notice).await;
            // The triggering message still gets normal processing below.
        }

        if self.sessions.is_ai_active(chat_id).await {
            if is_ai_off_phrase(text) {
                self.sessions.deactivate_ai(chat_id).await;
                info!(chat = %chat_id, "AI chat deactivated by off-phrase");
                self.send(chat_id, &self.replies.ai_deactivated).await;
                return;
            }
            let explicit = text.trim_start().starts_with(routing.prefix);
            let classified = intent::classify(text, &routing.registry, routing.prefix);
            if let (true, Some(command @ Intent::Command { .. })) = (explicit, classified) {
                // An explicit command ends the conversation silently and
                // then runs as usual.
                self.sessions.deactivate_ai(chat_id).await;
                info!(chat = %chat_id, "AI chat deactivated by explicit command");
                self.dispatch_intent(chat_id, sender_id, sender_name, text, command)
                    .await;
            } else {
                self.forward_to_conversation(chat_id, text, now).await;
            }
            return;
        }

        if let Some(selection) = self.sessions.selection(chat_id).await {
            self.consume_selection(chat_id, sender_id, text, &selection)
                .await;
            return;
        }

        match intent::classify(text, &routing.registry, routing.prefix) {
            Some(resolved) => {
                self.dispatch_intent(chat_id, sender_id, sender_name, text, resolved)
                    .await;
            }
            None => debug!(chat = %chat_id, "No structured intent; ignoring"),
        }
    }

    async fn forward_to_conversation(&self, chat_id: &str, text: &str, now: OffsetDateTime) {
        let Some(token) = self.sessions.touch_ai(chat_id, now).await else {
            return;
        };
        match self.collab.conversation.reply(text, token.as_deref()).await {
            Ok(reply) => {
                self.sessions
                    .update_ai_token(chat_id, reply.continuation)
                    .await;
                self.send(chat_id, &reply.text).await;
            }
            Err(error) => {
                warn!(chat = %chat_id, error = %error, "Conversational collaborator failed");
                self.send(chat_id, &self.replies.ai_failure).await;
            }
        }
    }

    /// Sends a reply, logging (and otherwise ignoring) gateway failures.
    pub(crate) async fn send(&self, chat_id: &str, text: &str) {
        if let Err(error) = self.collab.gateway.send_text(chat_id, text).await {
            warn!(chat = %chat_id, error = %error, "Failed to send reply");
        }
    }
}

/// Download verbosity: video-only chats get no confirmations at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DownloadMode {
    Loud,
    Silent,
}

fn is_ai_off_phrase(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    let squeezed: String = lowered.split_whitespace().collect();
    AI_OFF_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase) || squeezed.contains(&phrase.replace(' ', "")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{
        ChatGateway, ChatStore, ContactCard, Conversation, ConversationReply, GroupInfo,
        LinkEntry, LinkShortener, LinkStatistics, SavedLink, ShortenedLink, VideoFetcher,
        VideoMedia,
    };
    use crate::registry::HandlerId;
    use crate::session::PolicyAction;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockGateway {
        texts: Mutex<Vec<(String, String)>>,
        files: Mutex<Vec<(String, String, Option<String>)>>,
    }

    impl MockGateway {
        fn sent_texts(&self) -> Vec<(String, String)> {
            self.texts.lock().unwrap().clone()
        }
        fn sent_files(&self) -> Vec<(String, String, Option<String>)> {
            self.files.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatGateway for MockGateway {
        async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
            self.texts
                .lock()
                .unwrap()
                .push((chat_id.to_owned(), text.to_owned()));
            Ok(())
        }
        async fn send_file_by_url(
            &self,
            chat_id: &str,
            file_url: &str,
            _filename: &str,
            caption: Option<&str>,
        ) -> Result<()> {
            self.files.lock().unwrap().push((
                chat_id.to_owned(),
                file_url.to_owned(),
                caption.map(ToOwned::to_owned),
            ));
            Ok(())
        }
        async fn send_file_by_upload(
            &self,
            _chat_id: &str,
            _path: &Path,
            _filename: &str,
        ) -> Result<()> {
            Ok(())
        }
        async fn check_whatsapp(&self, _phone: &str) -> Result<bool> {
            Ok(true)
        }
        async fn avatar_url(&self, _chat_id: &str) -> Result<Option<String>> {
            Ok(None)
        }
        async fn fetch_avatar_file(&self, _avatar_url: &str, _chat_id: &str) -> Result<PathBuf> {
            bail!("no avatar in tests")
        }
        async fn contact_info(&self, _chat_id: &str) -> Result<ContactCard> {
            Ok(ContactCard::default())
        }
    }

    #[derive(Default)]
    struct MockConversation {
        calls: Mutex<Vec<(String, Option<String>)>>,
        issue_token: Option<String>,
    }

    #[async_trait]
    impl Conversation for MockConversation {
        async fn reply(&self, text: &str, continuation: Option<&str>) -> Result<ConversationReply> {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_owned(), continuation.map(ToOwned::to_owned)));
            Ok(ConversationReply {
                text: format!("echo: {text}"),
                continuation: self.issue_token.clone(),
            })
        }
    }

    #[derive(Default)]
    struct MockVideo {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VideoFetcher for MockVideo {
        async fn fetch(&self, url: &str) -> Result<VideoMedia> {
            self.calls.lock().unwrap().push(url.to_owned());
            Ok(VideoMedia {
                media_url: "https://cdn.example/video.mp4".to_owned(),
                title: "Clip".to_owned(),
            })
        }
    }

    #[derive(Default)]
    struct MockShortener {
        calls: Mutex<Vec<(String, Option<String>, Option<String>)>>,
    }

    #[async_trait]
    impl LinkShortener for MockShortener {
        async fn shorten(
            &self,
            url: &str,
            alias: Option<&str>,
            password: Option<&str>,
        ) -> Result<ShortenedLink> {
            self.calls.lock().unwrap().push((
                url.to_owned(),
                alias.map(ToOwned::to_owned),
                password.map(ToOwned::to_owned),
            ));
            Ok(ShortenedLink {
                link_id: "42".to_owned(),
                short_url: "https://sho.rt/x".to_owned(),
            })
        }
        async fn list_links(&self) -> Result<Vec<LinkEntry>> {
            Ok(vec![])
        }
        async fn stats(&self, _link_id: &str) -> Result<LinkStatistics> {
            Ok(LinkStatistics::default())
        }
    }

    #[derive(Default)]
    struct MockStore {
        admin_id: Option<String>,
        groups: Vec<GroupInfo>,
        video_only: Mutex<HashSet<String>>,
        saved: Mutex<Vec<SavedLink>>,
        policy_calls: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl ChatStore for MockStore {
        async fn track_chat(&self, _chat_id: &str, _display_name: &str) {}
        async fn is_admin(&self, sender_id: &str) -> bool {
            self.admin_id.as_deref() == Some(sender_id)
        }
        async fn is_video_only(&self, chat_id: &str) -> bool {
            self.video_only.lock().unwrap().contains(chat_id)
        }
        async fn set_video_only(
            &self,
            group_id: &str,
            enabled: bool,
            _admin_id: &str,
        ) -> Result<()> {
            self.policy_calls
                .lock()
                .unwrap()
                .push((group_id.to_owned(), enabled));
            let mut set = self.video_only.lock().unwrap();
            if enabled {
                set.insert(group_id.to_owned());
            } else {
                set.remove(group_id);
            }
            Ok(())
        }
        async fn known_groups(&self) -> Vec<GroupInfo> {
            self.groups.clone()
        }
        async fn video_only_groups(&self) -> Vec<GroupInfo> {
            self.video_only
                .lock()
                .unwrap()
                .iter()
                .map(|id| GroupInfo {
                    chat_id: id.clone(),
                    display_name: id.clone(),
                })
                .collect()
        }
        async fn save_link(
            &self,
            owner_chat_id: &str,
            link_id: &str,
            password: Option<&str>,
        ) -> Result<()> {
            self.saved.lock().unwrap().push(SavedLink {
                link_id: link_id.to_owned(),
                owner_chat_id: owner_chat_id.to_owned(),
                password: password.map(ToOwned::to_owned),
            });
            Ok(())
        }
        async fn links_for(&self, owner_chat_id: &str) -> Vec<SavedLink> {
            self.saved
                .lock()
                .unwrap()
                .iter()
                .filter(|l| l.owner_chat_id == owner_chat_id)
                .cloned()
                .collect()
        }
        async fn all_links(&self) -> Vec<SavedLink> {
            self.saved.lock().unwrap().clone()
        }
    }

    struct Harness {
        router: Router,
        gateway: Arc<MockGateway>,
        conversation: Arc<MockConversation>,
        video: Arc<MockVideo>,
        shortener: Arc<MockShortener>,
        store: Arc<MockStore>,
    }

    fn commands() -> Vec<CommandSpec> {
        let spec = |handler, aliases: &[&str], admin_only| CommandSpec {
            handler,
            aliases: aliases.iter().map(|a| (*a).to_owned()).collect(),
            admin_only,
        };
        vec![
            spec(HandlerId::Menu, &["menu", "help"], false),
            spec(HandlerId::Chatbot, &["gpt", "chatgpt"], false),
            spec(HandlerId::Download, &["download", "dl"], false),
            spec(HandlerId::ShortenLink, &["short", "shorten"], false),
            spec(HandlerId::AllLinks, &["alllinks"], true),
            spec(HandlerId::VideoOnly, &["videoonly"], true),
        ]
    }

    fn harness(store: MockStore, conversation: MockConversation) -> Harness {
        let gateway = Arc::new(MockGateway::default());
        let conversation = Arc::new(conversation);
        let video = Arc::new(MockVideo::default());
        let shortener = Arc::new(MockShortener::default());
        let store = Arc::new(store);
        let collab = Collaborators {
            gateway: Arc::clone(&gateway) as Arc<dyn ChatGateway>,
            conversation: Arc::clone(&conversation) as Arc<dyn Conversation>,
            video: Arc::clone(&video) as Arc<dyn VideoFetcher>,
            shortener: Arc::clone(&shortener) as Arc<dyn LinkShortener>,
            store: Arc::clone(&store) as Arc<dyn ChatStore>,
        };
        let config = RouterConfig {
            prefix: Some('.'),
            ai_timeout_minutes: Some(5),
            commands: commands(),
        };
        Harness {
            router: Router::new(config, collab, ReplyCatalog::default()),
            gateway,
            conversation,
            video,
            shortener,
            store,
        }
    }

    fn default_harness() -> Harness {
        harness(MockStore::default(), MockConversation::default())
    }

    const CHAT: &str = "111222333@g.us";
    const SENDER: &str = "923001112233@c.us";
    const ADMIN: &str = "923453870090@c.us";

    async fn incoming(h: &Harness, text: &str) {
        h.router
            .handle_incoming_message(CHAT, SENDER, text, "Tester")
            .await;
    }

    #[tokio::test]
    async fn video_only_drops_non_url_without_reply() {
        let store = MockStore::default();
        store.video_only.lock().unwrap().insert(CHAT.to_owned());
        let h = harness(store, MockConversation::default());

        incoming(&h, "hello everyone").await;

        assert!(h.gateway.sent_texts().is_empty());
        assert!(h.video.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn video_only_forwards_url_silently() {
        let store = MockStore::default();
        store.video_only.lock().unwrap().insert(CHAT.to_owned());
        let h = harness(store, MockConversation::default());

        incoming(&h, "https://youtu.be/abc").await;

        assert_eq!(
            *h.video.calls.lock().unwrap(),
            vec!["https://youtu.be/abc".to_owned()]
        );
        // One file send, no caption, zero text replies.
        assert!(h.gateway.sent_texts().is_empty());
        let files = h.gateway.sent_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].2, None);
    }

    #[tokio::test]
    async fn video_only_exempts_the_admin() {
        let store = MockStore {
            admin_id: Some(ADMIN.to_owned()),
            ..MockStore::default()
        };
        store.video_only.lock().unwrap().insert(CHAT.to_owned());
        let h = harness(store, MockConversation::default());

        h.router
            .handle_incoming_message(CHAT, ADMIN, ".menu", "Admin")
            .await;

        let texts = h.gateway.sent_texts();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].1, h.router.replies.menu);
    }

    #[tokio::test]
    async fn greeting_gets_exactly_one_personalized_reply() {
        let h = default_harness();
        incoming(&h, "hi there").await;

        let texts = h.gateway.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].1.contains("Tester"));
    }

    #[tokio::test]
    async fn unresolved_text_is_silently_ignored() {
        let h = default_harness();
        incoming(&h, "just chatting about the weather for a while").await;
        assert!(h.gateway.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn prefixed_shorten_resolves_with_args() {
        let h = default_harness();
        incoming(&h, ".short http://x.com myalias").await;

        assert_eq!(
            *h.shortener.calls.lock().unwrap(),
            vec![(
                "http://x.com".to_owned(),
                Some("myalias".to_owned()),
                None
            )]
        );
        // Link id persisted for this chat.
        assert_eq!(h.store.saved.lock().unwrap().len(), 1);
        let texts = h.gateway.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].1.contains("https://sho.rt/x"));
    }

    #[tokio::test]
    async fn admin_only_command_denied_for_regular_sender() {
        let store = MockStore {
            admin_id: Some(ADMIN.to_owned()),
            ..MockStore::default()
        };
        let h = harness(store, MockConversation::default());

        incoming(&h, ".alllinks").await;

        let texts = h.gateway.sent_texts();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].1, h.router.replies.admin_only);
    }

    #[tokio::test]
    async fn bare_url_downloads_loudly() {
        let h = default_harness();
        incoming(&h, "https://youtu.be/abc").await;

        let texts = h.gateway.sent_texts();
        assert_eq!(texts.len(), 1, "one 'downloading' confirmation");
        let files = h.gateway.sent_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].2.as_deref(), Some("✅ Clip"));
    }

    #[tokio::test]
    async fn ai_mode_forwards_everything_and_threads_the_token() {
        let conversation = MockConversation {
            issue_token: Some("tok-9".to_owned()),
            ..MockConversation::default()
        };
        let h = harness(MockStore::default(), conversation);

        incoming(&h, ".gpt on").await;
        assert!(h.router.sessions().is_ai_active(CHAT).await);

        incoming(&h, "how are you?").await;
        incoming(&h, "hello").await; // greetings also go to the AI

        let calls = h.conversation.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ("how are you?".to_owned(), None));
        assert_eq!(calls[1], ("hello".to_owned(), Some("tok-9".to_owned())));

        let texts = h.gateway.sent_texts();
        // Activation confirmation plus two echoed replies.
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[1].1, "echo: how are you?");
    }

    #[tokio::test]
    async fn inline_off_phrase_deactivates_with_one_confirmation() {
        let h = default_harness();
        h.router
            .sessions()
            .activate_ai(CHAT, OffsetDateTime::now_utc() - Duration::seconds(1))
            .await;

        incoming(&h, "gptoff").await;

        assert!(!h.router.sessions().is_ai_active(CHAT).await);
        assert!(h.conversation.calls.lock().unwrap().is_empty());
        let texts = h.gateway.sent_texts();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].1, h.router.replies.ai_deactivated);
    }

    #[tokio::test]
    async fn explicit_command_deactivates_ai_silently_and_runs() {
        let h = default_harness();
        h.router
            .sessions()
            .activate_ai(CHAT, OffsetDateTime::now_utc())
            .await;

        incoming(&h, ".menu").await;

        assert!(!h.router.sessions().is_ai_active(CHAT).await);
        assert!(h.conversation.calls.lock().unwrap().is_empty());
        let texts = h.gateway.sent_texts();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].1, h.router.replies.menu);
    }

    #[tokio::test]
    async fn idle_session_expires_before_the_message_is_processed() {
        let h = default_harness();
        let stale = OffsetDateTime::now_utc() - Duration::minutes(5) - Duration::seconds(1);
        h.router.sessions().activate_ai(CHAT, stale).await;

        incoming(&h, ".menu").await;

        assert!(!h.router.sessions().is_ai_active(CHAT).await);
        let texts = h.gateway.sent_texts();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].1.contains('5'), "timeout notice names the minutes");
        assert_eq!(texts[1].1, h.router.replies.menu);
    }

    #[tokio::test]
    async fn fresh_session_survives_the_timeout_check() {
        let h = default_harness();
        let recent = OffsetDateTime::now_utc() - Duration::minutes(5) + Duration::seconds(1);
        h.router.sessions().activate_ai(CHAT, recent).await;

        incoming(&h, "still here?").await;

        assert!(h.router.sessions().is_ai_active(CHAT).await);
        assert_eq!(h.conversation.calls.lock().unwrap().len(), 1);
        let texts = h.gateway.sent_texts();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].1, "echo: still here?");
    }

    #[tokio::test]
    async fn selection_flow_enable_disambiguates_groups() {
        let store = MockStore {
            admin_id: Some(ADMIN.to_owned()),
            groups: vec![
                GroupInfo {
                    chat_id: "g1@g.us".to_owned(),
                    display_name: "Family".to_owned(),
                },
                GroupInfo {
                    chat_id: "g2@g.us".to_owned(),
                    display_name: "Work".to_owned(),
                },
            ],
            ..MockStore::default()
        };
        let h = harness(store, MockConversation::default());
        let admin_chat = ADMIN;

        h.router
            .handle_incoming_message(admin_chat, ADMIN, ".videoonly enable", "Admin")
            .await;

        let pending = h.router.sessions().selection(admin_chat).await.unwrap();
        assert_eq!(pending.action, PolicyAction::Enable);
        assert_eq!(pending.candidates.len(), 2);

        // Non-numeric reply: corrective notice, session unchanged.
        h.router
            .handle_incoming_message(admin_chat, ADMIN, "first one", "Admin")
            .await;
        let still = h.router.sessions().selection(admin_chat).await.unwrap();
        assert_eq!(still.candidates, pending.candidates);
        assert_eq!(still.action, pending.action);

        // Out-of-range reply: corrective notice, session unchanged.
        h.router
            .handle_incoming_message(admin_chat, ADMIN, "5", "Admin")
            .await;
        assert!(h.router.sessions().selection(admin_chat).await.is_some());

        // Valid reply: policy applied, session consumed.
        h.router
            .handle_incoming_message(admin_chat, ADMIN, "2", "Admin")
            .await;
        assert!(h.router.sessions().selection(admin_chat).await.is_none());
        assert_eq!(
            *h.store.policy_calls.lock().unwrap(),
            vec![("g2@g.us".to_owned(), true)]
        );

        let texts = h.gateway.sent_texts();
        // Candidate list, invalid notice, out-of-range notice, confirmation.
        assert_eq!(texts.len(), 4);
        assert!(texts[0].1.contains("*1.*"));
        assert!(texts[3].1.contains("Work"));
    }

    #[tokio::test]
    async fn videoonly_disable_with_nothing_enabled_notices() {
        let store = MockStore {
            admin_id: Some(ADMIN.to_owned()),
            groups: vec![GroupInfo {
                chat_id: "g1@g.us".to_owned(),
                display_name: "Family".to_owned(),
            }],
            ..MockStore::default()
        };
        let h = harness(store, MockConversation::default());

        h.router
            .handle_incoming_message(ADMIN, ADMIN, ".videoonly disable", "Admin")
            .await;

        assert!(h.router.sessions().selection(ADMIN).await.is_none());
        let texts = h.gateway.sent_texts();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].1, h.router.replies.videoonly_none_enabled);
    }

    #[tokio::test]
    async fn chatbot_usage_reply_for_unknown_argument() {
        let h = default_harness();
        incoming(&h, ".gpt maybe").await;

        assert!(!h.router.sessions().is_ai_active(CHAT).await);
        let texts = h.gateway.sent_texts();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].1, h.router.replies.ai_usage);
    }
}
