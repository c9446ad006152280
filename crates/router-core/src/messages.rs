//! Reply catalog: every user-facing text the router can send.
//!
//! The texts are plain templates with `{placeholder}` slots; deployments
//! override any of them from the YAML config. The router only ever goes
//! through this catalog, so wording lives in one place.

use serde::Deserialize;

/// Substitutes `{key}` slots in a template.
#[must_use]
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_owned();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

macro_rules! reply_catalog {
    ($($field:ident => $default:expr),+ $(,)?) => {
        #[derive(Debug, Clone, Deserialize)]
        #[serde(default)]
        pub struct ReplyCatalog {
            $(pub $field: String,)+
        }

        impl Default for ReplyCatalog {
            fn default() -> Self {
                Self {
                    $($field: ($default).to_owned(),)+
                }
            }
        }
    };
}

reply_catalog! {
    greeting => "*Welcome{name}!* 👋\n\nI can download videos, chat with AI, shorten links and look up WhatsApp numbers.\n\n_Type *.menu* to see everything I can do._",
    menu => "*Bot Commands* ⚡\n\n*Video*\n_Send any video URL and I download it automatically._\n\n*AI Assistant*\n*.gpt on* / *.gpt off*\n\n*Links*\n*.short <url> [alias] [password]*\n*.mylinks [page]*\n*.stats <link_id>*\n\n*WhatsApp Tools*\n*.checkwa <number>*\n*.avatar <number>*\n*.userinfo <number>*",
    dev_menu => "*Admin Commands* 🛠\n\n*.alllinks* — every shortened link with its owner\n*.videoonly enable|disable* — silent video-only mode for a group",
    admin_only => "🚫 *Admin only*\n\n_This command is restricted to the bot administrator._",

    ai_activated => "🤖 *AI chat enabled*\n\n_Every message here now goes to the assistant. Send *gpt off* to stop._",
    ai_deactivated => "✅ *AI chat disabled*\n\n_Back to normal commands._",
    ai_usage => "🤖 *AI chat*\n\n*.gpt on* — start a conversation\n*.gpt off* — end it",
    ai_auto_timeout => "⌛ *AI chat turned off after {minutes} minutes of inactivity.*",
    ai_failure => "❌ *The assistant is unreachable right now. Please try again.*",

    downloading => "📥 _Downloading your video…_",
    download_usage => "🎬 *Video downloader*\n\n_Send a video URL, or use *.download <url>*._",
    download_failed => "❌ *Could not download that video.*\n\n_Check the link and try again._",
    download_link_fallback => "🎬 *Here is your video:*\n{url}",

    shorten_usage => "🔗 *Link shortener*\n\n*.short <url> [alias] [password]*",
    shorten_invalid_url => "❌ *That does not look like a URL.*\n\n_Links must start with http:// or https://_",
    shorten_success => "✅ *Link shortened!*\n\n🔗 {short_url}\n{alias_line}{password_line}🆔 *ID:* {link_id}\n\n_Use *.stats {link_id}* for analytics._",
    shorten_failed => "❌ *The link shortener failed. Please try again.*",

    mylinks_empty => "🔗 *You have no shortened links yet.*\n\n_Create one with *.short <url>*._",
    mylinks_header => "🔗 *Your links* ({count}):\n\n",
    mylinks_failed => "❌ *Could not fetch your links right now.*",

    stats_usage => "📊 *Link statistics*\n\n*.stats <link_id>*",
    stats_invalid_id => "❌ *Link IDs are numeric.*\n\n_Find yours with *.mylinks*._",
    stats_failed => "❌ *Could not fetch statistics for that link.*",

    alllinks_empty => "🔗 *No links have been shortened yet.*",
    alllinks_header => "🔗 *All links* ({count}):\n\n",
    alllinks_failed => "❌ *Could not fetch the link list right now.*",

    videoonly_usage => "📹 *Video-only mode*\n\n*.videoonly enable*\n*.videoonly disable*\n\n_In video-only mode the bot silently downloads videos in a group and ignores everything else._",
    videoonly_none_available => "📹 *No groups available*\n\n_I have not seen any group chats yet._",
    videoonly_all_enabled => "📹 *All groups are already in video-only mode.*",
    videoonly_none_enabled => "📹 *No groups are in video-only mode.*",
    videoonly_select_enable => "📹 *Enable video-only mode*\n\nSelect a group ({count}):\n\n",
    videoonly_select_disable => "📹 *Disable video-only mode*\n\nSelect a group ({count}):\n\n",
    videoonly_select_footer => "\n💬 *Reply with the group number* (e.g. 1)",
    videoonly_invalid_selection => "❌ *Invalid selection*\n\n_Please reply with a number, e.g. 1._",
    videoonly_out_of_range => "❌ *Out of range*\n\n_Pick a number between 1 and {max}._",
    videoonly_enabled => "✅ *Video-only mode enabled for* {group_name}.",
    videoonly_disabled => "✅ *Video-only mode disabled for* {group_name}.",
    videoonly_failed => "❌ *Could not update video-only mode. Please try again.*",

    checkwa_usage => "📱 *WhatsApp check*\n\n*.checkwa <number>*",
    checkwa_invalid_number => "❌ *That does not look like a phone number.*",
    checkwa_too_short => "❌ *Number too short.*\n\n_Include the country code, e.g. 923001234567._",
    checkwa_needs_country_code => "❌ *{number} needs a country code.*\n\n_Numbers starting with 0 must be 11 digits or carry a country code._",
    checkwa_found => "✅ *{number} is on WhatsApp.*",
    checkwa_not_found => "❌ *{number} is not on WhatsApp.*",
    checkwa_failed => "❌ *Could not check that number right now.*",

    avatar_usage => "🖼 *Profile picture*\n\n*.avatar <number>*",
    avatar_found => "🖼 *Here is the profile picture:*",
    avatar_url_fallback => "🖼 *Profile picture:*\n{url}",
    avatar_missing => "🖼 *That account has no profile picture.*",
    avatar_failed => "❌ *Could not fetch that profile picture.*",

    contact_usage => "👤 *Contact info*\n\n*.userinfo <number>*",
    contact_card => "👤 *Contact*\n\n📱 {wa_link}\n*Name:* {name}\n{avatar_note}",
    contact_has_avatar => "🖼 Has a profile picture",
    contact_no_avatar => "🚫 No profile picture",
    contact_failed => "❌ *Could not fetch that contact right now.*",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_all_slots() {
        let out = render("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and y and x");
    }

    #[test]
    fn render_leaves_unknown_slots_alone() {
        assert_eq!(render("{who}?", &[]), "{who}?");
    }

    #[test]
    fn defaults_are_nonempty() {
        let catalog = ReplyCatalog::default();
        assert!(!catalog.greeting.is_empty());
        assert!(catalog.ai_auto_timeout.contains("{minutes}"));
        assert!(catalog.videoonly_out_of_range.contains("{max}"));
    }
}
