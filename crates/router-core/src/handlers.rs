//! Per-command orchestration: argument parsing, collaborator calls, replies.
//!
//! Every collaborator failure is caught here, logged, and turned into a
//! generic failure reply (or a silent drop in video-only mode). Nothing in
//! this module returns an error to the dispatcher.

use core::fmt::Write as _;
use std::collections::{HashMap, HashSet};

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::collab::SavedLink;
use crate::dispatch::{DownloadMode, Router};
use crate::intent::{self, Intent};
use crate::messages::render;
use crate::registry::HandlerId;
use crate::session::{Candidate, PolicyAction, SelectionSession};

/// Digits of a free-form phone input.
fn digits_only(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// 11-digit numbers starting with 0 are treated as local Pakistani numbers
/// and rewritten with the 92 country code.
fn normalize_phone(digits: &str) -> String {
    if digits.len() == 11 && digits.starts_with('0') {
        format!("92{}", &digits[1..])
    } else {
        digits.to_owned()
    }
}

/// Full chat-id form for a phone number or partial id.
fn qualify_chat_id(input: &str) -> String {
    if input.contains('@') {
        input.to_owned()
    } else {
        format!("{}@c.us", normalize_phone(&digits_only(input)))
    }
}

fn truncate_url(url: &str, max: usize) -> String {
    if url.chars().count() <= max {
        url.to_owned()
    } else {
        let head: String = url.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

impl Router {
    pub(crate) async fn dispatch_intent(
        &self,
        chat_id: &str,
        sender_id: &str,
        sender_name: &str,
        raw_text: &str,
        intent: Intent,
    ) {
        match intent {
            Intent::Greeting => self.handle_greeting(chat_id, sender_name).await,
            Intent::AutoDownload { text } => {
                self.handle_download(chat_id, &text, DownloadMode::Loud)
                    .await;
            }
            Intent::Command {
                handler,
                admin_only,
                args,
            } => {
                info!(chat = %chat_id, ?handler, args = %args, admin_only, "Command resolved");
                if admin_only && !self.collab.store.is_admin(sender_id).await {
                    info!(chat = %chat_id, ?handler, "Admin-only command blocked");
                    self.send(chat_id, &self.replies.admin_only).await;
                    return;
                }
                match handler {
                    HandlerId::Greeting => self.handle_greeting(chat_id, sender_name).await,
                    HandlerId::Menu => self.send(chat_id, &self.replies.menu).await,
                    HandlerId::DevMenu => self.send(chat_id, &self.replies.dev_menu).await,
                    HandlerId::Chatbot => self.handle_chatbot_toggle(chat_id, &args).await,
                    HandlerId::Download | HandlerId::AutoDownload => {
                        let source = if args.is_empty() { raw_text } else { args.as_str() };
                        self.handle_download(chat_id, source, DownloadMode::Loud)
                            .await;
                    }
                    HandlerId::CheckWhatsapp => self.handle_check_whatsapp(chat_id, &args).await,
                    HandlerId::GetAvatar => self.handle_get_avatar(chat_id, &args).await,
                    HandlerId::GetContactInfo => self.handle_contact_info(chat_id, &args).await,
                    HandlerId::ShortenLink => self.handle_shorten(chat_id, &args).await,
                    HandlerId::MyLinks => self.handle_my_links(chat_id, &args).await,
                    HandlerId::LinkStats => self.handle_link_stats(chat_id, &args).await,
                    HandlerId::AllLinks => self.handle_all_links(chat_id).await,
                    HandlerId::VideoOnly => {
                        self.handle_video_only(chat_id, sender_id, &args).await;
                    }
                }
            }
        }
    }

    async fn handle_greeting(&self, chat_id: &str, sender_name: &str) {
        let name = sender_name.trim();
        let name = if name.is_empty() {
            String::new()
        } else {
            format!(" {name}")
        };
        info!(chat = %chat_id, "Greeting");
        self.send(chat_id, &render(&self.replies.greeting, &[("name", &name)]))
            .await;
    }

    async fn handle_chatbot_toggle(&self, chat_id: &str, args: &str) {
        match args.trim().to_lowercase().as_str() {
            "on" | "activate" | "enable" | "start" | "yes" => {
                self.sessions()
                    .activate_ai(chat_id, OffsetDateTime::now_utc())
                    .await;
                info!(chat = %chat_id, "AI chat activated");
                self.send(chat_id, &self.replies.ai_activated).await;
            }
            "off" | "deactivate" | "disable" | "stop" | "no" => {
                self.sessions().deactivate_ai(chat_id).await;
                info!(chat = %chat_id, "AI chat deactivated");
                self.send(chat_id, &self.replies.ai_deactivated).await;
            }
            _ => self.send(chat_id, &self.replies.ai_usage).await,
        }
    }

    pub(crate) async fn handle_download(&self, chat_id: &str, text: &str, mode: DownloadMode) {
        let loud = mode == DownloadMode::Loud;
        let Some(url) = intent::extract_url(text) else {
            if loud {
                self.send(chat_id, &self.replies.download_usage).await;
            }
            return;
        };

        if loud {
            self.send(chat_id, &self.replies.downloading).await;
        }

        match self.collab.video.fetch(url).await {
            Ok(media) => {
                info!(chat = %chat_id, title = %media.title, "Sending downloaded video");
                let caption = loud.then(|| format!("✅ {}", media.title));
                if let Err(error) = self
                    .collab
                    .gateway
                    .send_file_by_url(chat_id, &media.media_url, "video.mp4", caption.as_deref())
                    .await
                {
                    warn!(chat = %chat_id, error = %error, "Failed to send video; falling back to link");
                    if loud {
                        let fallback = render(
                            &self.replies.download_link_fallback,
                            &[("url", &media.media_url)],
                        );
                        self.send(chat_id, &fallback).await;
                    }
                }
            }
            Err(error) => {
                warn!(chat = %chat_id, url = %url, error = %error, "Video download failed");
                if loud {
                    self.send(chat_id, &self.replies.download_failed).await;
                }
            }
        }
    }

    async fn handle_check_whatsapp(&self, chat_id: &str, args: &str) {
        let input = args.trim();
        if input.is_empty() {
            self.send(chat_id, &self.replies.checkwa_usage).await;
            return;
        }
        let digits = digits_only(input);
        if digits.is_empty() {
            self.send(chat_id, &self.replies.checkwa_invalid_number)
                .await;
            return;
        }
        let phone = normalize_phone(&digits);
        if phone.len() < 10 {
            self.send(chat_id, &self.replies.checkwa_too_short).await;
            return;
        }
        if digits.starts_with('0') && digits.len() != 11 {
            let notice = render(
                &self.replies.checkwa_needs_country_code,
                &[("number", &digits)],
            );
            self.send(chat_id, &notice).await;
            return;
        }

        match self.collab.gateway.check_whatsapp(&phone).await {
            Ok(exists) => {
                // Locally written numbers echo back as typed; international
                // ones get a + prefix.
                let display = if digits.starts_with('0') {
                    digits
                } else {
                    format!("+{phone}")
                };
                let template = if exists {
                    &self.replies.checkwa_found
                } else {
                    &self.replies.checkwa_not_found
                };
                self.send(chat_id, &render(template, &[("number", &display)]))
                    .await;
            }
            Err(error) => {
                warn!(chat = %chat_id, error = %error, "WhatsApp check failed");
                self.send(chat_id, &self.replies.checkwa_failed).await;
            }
        }
    }

    async fn handle_get_avatar(&self, chat_id: &str, args: &str) {
        let input = args.trim();
        if input.is_empty() {
            self.send(chat_id, &self.replies.avatar_usage).await;
            return;
        }
        let target = qualify_chat_id(input);

        match self.collab.gateway.avatar_url(&target).await {
            Ok(Some(url)) => match self.collab.gateway.fetch_avatar_file(&url, &target).await {
                Ok(path) => {
                    self.send(chat_id, &self.replies.avatar_found).await;
                    if let Err(error) = self
                        .collab
                        .gateway
                        .send_file_by_upload(chat_id, &path, "avatar.jpg")
                        .await
                    {
                        warn!(chat = %chat_id, error = %error, "Failed to upload avatar file");
                    }
                }
                Err(error) => {
                    // Could not mirror the file locally; the URL still works.
                    warn!(chat = %chat_id, error = %error, "Avatar download failed; sending URL");
                    self.send(
                        chat_id,
                        &render(&self.replies.avatar_url_fallback, &[("url", &url)]),
                    )
                    .await;
                }
            },
            Ok(None) => self.send(chat_id, &self.replies.avatar_missing).await,
            Err(error) => {
                warn!(chat = %chat_id, error = %error, "Avatar lookup failed");
                self.send(chat_id, &self.replies.avatar_failed).await;
            }
        }
    }

    async fn handle_contact_info(&self, chat_id: &str, args: &str) {
        let input = args.trim();
        if input.is_empty() {
            self.send(chat_id, &self.replies.contact_usage).await;
            return;
        }
        let target = qualify_chat_id(input);

        match self.collab.gateway.contact_info(&target).await {
            Ok(card) => {
                let phone = target.split('@').next().unwrap_or(target.as_str());
                let wa_link = format!("wa.me/{phone}");
                let name = card.name.unwrap_or_else(|| "N/A".to_owned());
                let avatar_note = if card.has_avatar {
                    &self.replies.contact_has_avatar
                } else {
                    &self.replies.contact_no_avatar
                };
                let reply = render(
                    &self.replies.contact_card,
                    &[
                        ("wa_link", wa_link.as_str()),
                        ("name", name.as_str()),
                        ("avatar_note", avatar_note.as_str()),
                    ],
                );
                self.send(chat_id, &reply).await;
            }
            Err(error) => {
                warn!(chat = %chat_id, error = %error, "Contact lookup failed");
                self.send(chat_id, &self.replies.contact_failed).await;
            }
        }
    }

    async fn handle_shorten(&self, chat_id: &str, args: &str) {
        let mut parts = args.split_whitespace();
        let Some(url) = parts.next() else {
            self.send(chat_id, &self.replies.shorten_usage).await;
            return;
        };
        let alias = parts.next();
        let password = parts.next();

        if !url.starts_with("http://") && !url.starts_with("https://") {
            self.send(chat_id, &self.replies.shorten_invalid_url).await;
            return;
        }

        match self.collab.shortener.shorten(url, alias, password).await {
            Ok(link) => {
                if let Err(error) = self
                    .collab
                    .store
                    .save_link(chat_id, &link.link_id, password)
                    .await
                {
                    warn!(chat = %chat_id, error = %error, "Failed to persist shortened link");
                }
                info!(chat = %chat_id, link_id = %link.link_id, "Link shortened");
                let alias_line = alias.map_or_else(String::new, |a| format!("🏷 *Alias:* {a}\n"));
                let password_line =
                    password.map_or_else(String::new, |p| format!("🔒 *Password:* {p}\n"));
                let reply = render(
                    &self.replies.shorten_success,
                    &[
                        ("short_url", link.short_url.as_str()),
                        ("alias_line", alias_line.as_str()),
                        ("password_line", password_line.as_str()),
                        ("link_id", link.link_id.as_str()),
                    ],
                );
                self.send(chat_id, &reply).await;
            }
            Err(error) => {
                warn!(chat = %chat_id, error = %error, "Link shortening failed");
                self.send(chat_id, &self.replies.shorten_failed).await;
            }
        }
    }

    async fn handle_my_links(&self, chat_id: &str, args: &str) {
        const PER_PAGE: usize = 10;

        let page: usize = args
            .split_whitespace()
            .next()
            .and_then(|t| t.parse().ok())
            .unwrap_or(1)
            .max(1);

        let saved = self.collab.store.links_for(chat_id).await;
        if saved.is_empty() {
            self.send(chat_id, &self.replies.mylinks_empty).await;
            return;
        }
        let by_id: HashMap<&str, &SavedLink> =
            saved.iter().map(|l| (l.link_id.as_str(), l)).collect();

        let listing = match self.collab.shortener.list_links().await {
            Ok(listing) => listing,
            Err(error) => {
                warn!(chat = %chat_id, error = %error, "Link listing failed");
                self.send(chat_id, &self.replies.mylinks_failed).await;
                return;
            }
        };
        let mine: Vec<_> = listing
            .iter()
            .filter(|entry| by_id.contains_key(entry.id.as_str()))
            .collect();
        if mine.is_empty() {
            self.send(chat_id, &self.replies.mylinks_empty).await;
            return;
        }

        let total = mine.len();
        let pages = total.div_ceil(PER_PAGE);
        let page = page.min(pages);
        let start = (page - 1) * PER_PAGE;

        let mut message = render(&self.replies.mylinks_header, &[("count", &total.to_string())]);
        for (offset, entry) in mine[start..(start + PER_PAGE).min(total)].iter().enumerate() {
            let number = start + offset + 1;
            let date = entry
                .date
                .as_deref()
                .map_or("N/A", |d| d.split(' ').next().unwrap_or(d));
            let _ = writeln!(message, "*{number}.* {}", entry.short_url);
            if let Some(alias) = entry.alias.as_deref().filter(|a| !a.is_empty()) {
                let _ = writeln!(message, "- 🏷 *Alias:* {alias}");
            }
            if let Some(password) = by_id
                .get(entry.id.as_str())
                .and_then(|l| l.password.as_deref())
            {
                let _ = writeln!(message, "- 🔒 *Password:* {password}");
            }
            let _ = writeln!(
                message,
                "- 🆔 {} | 📅 {date} | 👆 {} clicks\n",
                entry.id, entry.clicks
            );
        }
        if pages > 1 {
            let next = if page < pages { page + 1 } else { 1 };
            let _ = write!(
                message,
                "_Page {page}/{pages} — send *.mylinks {next}* for more_"
            );
        }
        self.send(chat_id, &message).await;
    }

    async fn handle_link_stats(&self, chat_id: &str, args: &str) {
        let Some(link_id) = args.split_whitespace().next() else {
            self.send(chat_id, &self.replies.stats_usage).await;
            return;
        };
        if !link_id.chars().all(|c| c.is_ascii_digit()) {
            self.send(chat_id, &self.replies.stats_invalid_id).await;
            return;
        }

        let stats = match self.collab.shortener.stats(link_id).await {
            Ok(stats) => stats,
            Err(error) => {
                warn!(chat = %chat_id, link_id = %link_id, error = %error, "Stats lookup failed");
                self.send(chat_id, &self.replies.stats_failed).await;
                return;
            }
        };

        let mut message = format!(
            "📊 *Link Statistics*\n\n🆔 *ID:* {}\n🔗 {}\n\n📈 *Clicks*\n- Total: {}\n- Unique: {}\n",
            stats.id, stats.short_url, stats.clicks, stats.unique_clicks
        );
        let sections: [(&str, &[(String, u64)]); 3] = [
            ("🌍 *Top Countries*", &stats.top_countries),
            ("🌐 *Top Browsers*", &stats.top_browsers),
            ("💻 *Top Operating Systems*", &stats.top_os),
        ];
        for (title, entries) in sections {
            if entries.is_empty() {
                continue;
            }
            let _ = write!(message, "\n{title}\n");
            for (label, count) in entries.iter().take(5) {
                let _ = writeln!(message, "- {label}: {count}");
            }
        }
        self.send(chat_id, &message).await;
    }

    async fn handle_all_links(&self, chat_id: &str) {
        let saved = self.collab.store.all_links().await;
        if saved.is_empty() {
            self.send(chat_id, &self.replies.alllinks_empty).await;
            return;
        }
        let owner_by_id: HashMap<&str, &str> = saved
            .iter()
            .map(|l| (l.link_id.as_str(), l.owner_chat_id.as_str()))
            .collect();

        let listing = match self.collab.shortener.list_links().await {
            Ok(listing) => listing,
            Err(error) => {
                warn!(chat = %chat_id, error = %error, "Link listing failed");
                self.send(chat_id, &self.replies.alllinks_failed).await;
                return;
            }
        };
        let known: Vec<_> = listing
            .iter()
            .filter(|entry| owner_by_id.contains_key(entry.id.as_str()))
            .collect();
        if known.is_empty() {
            self.send(chat_id, &self.replies.alllinks_empty).await;
            return;
        }

        let mut message = render(
            &self.replies.alllinks_header,
            &[("count", &known.len().to_string())],
        );
        for (index, entry) in known.iter().enumerate() {
            let owner = owner_by_id.get(entry.id.as_str()).copied().unwrap_or("");
            let owner_digits = digits_only(owner);
            let owner_tail = if owner_digits.len() >= 4 {
                &owner_digits[owner_digits.len() - 4..]
            } else {
                "????"
            };
            let _ = writeln!(message, "*{}.* {}", index + 1, entry.short_url);
            let _ = writeln!(message, "- → {}", truncate_url(&entry.long_url, 40));
            let _ = writeln!(
                message,
                "- 👤 …{owner_tail} | 👆 {} clicks\n",
                entry.clicks
            );
        }
        self.send(chat_id, &message).await;
    }

    async fn handle_video_only(&self, chat_id: &str, sender_id: &str, args: &str) {
        let action = match args
            .split_whitespace()
            .next()
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("enable" | "on") => PolicyAction::Enable,
            Some("disable" | "off") => PolicyAction::Disable,
            Some(_) | None => {
                self.send(chat_id, &self.replies.videoonly_usage).await;
                return;
            }
        };

        let candidates = match action {
            PolicyAction::Enable => {
                let groups = self.collab.store.known_groups().await;
                if groups.is_empty() {
                    self.send(chat_id, &self.replies.videoonly_none_available)
                        .await;
                    return;
                }
                let active: HashSet<String> = self
                    .collab
                    .store
                    .video_only_groups()
                    .await
                    .into_iter()
                    .map(|g| g.chat_id)
                    .collect();
                let free: Vec<Candidate> = groups
                    .into_iter()
                    .filter(|g| !active.contains(&g.chat_id))
                    .map(|g| Candidate {
                        id: g.chat_id,
                        display_name: g.display_name,
                    })
                    .collect();
                if free.is_empty() {
                    self.send(chat_id, &self.replies.videoonly_all_enabled)
                        .await;
                    return;
                }
                free
            }
            PolicyAction::Disable => {
                let active = self.collab.store.video_only_groups().await;
                if active.is_empty() {
                    self.send(chat_id, &self.replies.videoonly_none_enabled)
                        .await;
                    return;
                }
                active
                    .into_iter()
                    .map(|g| Candidate {
                        id: g.chat_id,
                        display_name: g.display_name,
                    })
                    .collect()
            }
        };

        let header = match action {
            PolicyAction::Enable => &self.replies.videoonly_select_enable,
            PolicyAction::Disable => &self.replies.videoonly_select_disable,
        };
        let mut message = render(header, &[("count", &candidates.len().to_string())]);
        for (index, candidate) in candidates.iter().enumerate() {
            let _ = writeln!(message, "*{}.* 📱 {}", index + 1, candidate.display_name);
        }
        message.push_str(&self.replies.videoonly_select_footer);

        info!(chat = %chat_id, sender = %sender_id, ?action, count = candidates.len(), "Awaiting group selection");
        self.sessions()
            .begin_selection(
                chat_id,
                SelectionSession {
                    action,
                    candidates,
                    created_at: OffsetDateTime::now_utc(),
                },
            )
            .await;
        self.send(chat_id, &message).await;
    }

    /// Consumes (or preserves) a pending selection with the admin's reply.
    pub(crate) async fn consume_selection(
        &self,
        chat_id: &str,
        sender_id: &str,
        text: &str,
        selection: &SelectionSession,
    ) {
        let choice: i64 = match text.trim().parse() {
            Ok(choice) => choice,
            Err(_) => {
                // Not a number: correct and keep the session for a retry.
                self.send(chat_id, &self.replies.videoonly_invalid_selection)
                    .await;
                return;
            }
        };
        let count = selection.candidates.len();
        if choice < 1 || choice as usize > count {
            let notice = render(
                &self.replies.videoonly_out_of_range,
                &[("max", &count.to_string())],
            );
            self.send(chat_id, &notice).await;
            return;
        }

        // A valid reply always consumes the session, even if applying the
        // policy then fails.
        #[allow(clippy::cast_sign_loss)]
        let candidate = &selection.candidates[choice as usize - 1];
        self.sessions().end_selection(chat_id).await;

        let enable = selection.action == PolicyAction::Enable;
        match self
            .collab
            .store
            .set_video_only(&candidate.id, enable, sender_id)
            .await
        {
            Ok(()) => {
                info!(group = %candidate.id, enable, "Video-only policy updated");
                let template = if enable {
                    &self.replies.videoonly_enabled
                } else {
                    &self.replies.videoonly_disabled
                };
                self.send(
                    chat_id,
                    &render(template, &[("group_name", &candidate.display_name)]),
                )
                .await;
            }
            Err(error) => {
                warn!(group = %candidate.id, error = %error, "Video-only policy update failed");
                self.send(chat_id, &self.replies.videoonly_failed).await;
            }
        }
    }
}
