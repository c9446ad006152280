//! Intent classification: free-form text in, structured intent out.
//!
//! There is no rigid command syntax. A message may be a greeting, a bare URL,
//! a prefixed or bare-word command (with typo tolerance), or nothing the
//! router has an opinion about.

use crate::fuzzy::{levenshtein, subsequence_ratio};
use crate::registry::{CommandDefinition, CommandRegistry, HandlerId, normalize_alias};

/// Salutations recognized as a greeting when the message is short.
const GREETING_WORDS: &[&str] = &["hi", "hello", "hey", "greetings", "hola", "salaam", "salam"];

/// Messages with more tokens than this are prose, never a command.
const MAX_COMMAND_TOKENS: usize = 15;

/// Longest alias window tried by the growing-prefix matcher.
const MAX_ALIAS_WINDOW: usize = 5;

/// Bare-URL messages with more tokens than this stay conversational.
const MAX_URL_TOKENS: usize = 5;

/// Minimum candidate length before fuzzy stages apply, so a stray ".a"
/// cannot edit-distance its way into a two-letter alias.
const MIN_FUZZY_LEN: usize = 2;

const RATIO_CUTOFF: f64 = 0.7;

/// Aliases whose length differs from the candidate by more than this are
/// never fuzzy-matched.
const MAX_LENGTH_DIFF: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    Command {
        handler: HandlerId,
        admin_only: bool,
        args: String,
    },
    /// A short message whose primary content is a URL.
    AutoDownload { text: String },
}

/// True when the (short) message opens with a greeting word.
#[must_use]
pub fn is_greeting(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    GREETING_WORDS
        .iter()
        .any(|g| lowered == *g || lowered.starts_with(g))
}

/// True when any whitespace token carries an `http(s)://` URL.
#[must_use]
pub fn has_url(text: &str) -> bool {
    text.split_whitespace()
        .any(|t| t.contains("http://") || t.contains("https://"))
}

/// First URL embedded in the text, stripped of any leading junk the chat
/// client glued onto the token.
#[must_use]
pub fn extract_url(text: &str) -> Option<&str> {
    for token in text.split_whitespace() {
        if let Some(pos) = token.find("https://").or_else(|| token.find("http://")) {
            return Some(&token[pos..]);
        }
    }
    None
}

/// Classifies a message against the registry. `None` means the router has
/// nothing structured to say about it.
#[must_use]
pub fn classify(text: &str, registry: &CommandRegistry, prefix: char) -> Option<Intent> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();

    if tokens.len() <= 3 && is_greeting(trimmed) {
        return Some(Intent::Greeting);
    }

    let is_prefixed = trimmed.starts_with(prefix);
    let starts_with_alias = registry.is_exact_alias(tokens[0]);

    // A URL is only an auto-download intent when it is the primary content:
    // few surrounding tokens, and no command syntax competing for the text.
    if has_url(trimmed) && !is_prefixed && !starts_with_alias {
        let url_tokens = tokens.iter().filter(|t| t.contains("http")).count();
        if url_tokens >= 1 && tokens.len() <= MAX_URL_TOKENS {
            return Some(Intent::AutoDownload {
                text: trimmed.to_owned(),
            });
        }
    }

    let command_part = if is_prefixed {
        trimmed[prefix.len_utf8()..].trim()
    } else {
        trimmed
    };
    if command_part.is_empty() {
        return None;
    }

    let ctokens: Vec<&str> = command_part.split_whitespace().collect();
    if ctokens.len() > MAX_COMMAND_TOKENS {
        return None;
    }

    // Growing-prefix windows, shortest first: a short specific alias must not
    // absorb argument tokens that merely resemble another alias.
    let limit = MAX_ALIAS_WINDOW.min(ctokens.len());
    for i in 1..=limit {
        let candidate = ctokens[..i].join(" ");
        if let Some(def) = fuzzy_match_alias(&candidate, registry) {
            return Some(Intent::Command {
                handler: def.handler,
                admin_only: def.admin_only,
                args: ctokens[i..].join(" "),
            });
        }
    }

    None
}

/// Maximum tolerated edit distance for an alias of the given length.
const fn edit_threshold(alias_len: usize) -> usize {
    match alias_len {
        0..=4 => 1,
        5..=8 => 2,
        _ => 3,
    }
}

fn length_diff(a: usize, b: usize) -> usize {
    a.abs_diff(b)
}

/// Alias matching with typo and spacing tolerance.
///
/// Stages, first hit wins: exact (spaces preserved), exact with spaces
/// removed on either side, bounded Levenshtein, subsequence-ratio fallback.
pub(crate) fn fuzzy_match_alias<'r>(
    candidate: &str,
    registry: &'r CommandRegistry,
) -> Option<&'r CommandDefinition> {
    let clean = normalize_alias(candidate);
    if clean.is_empty() {
        return None;
    }

    if let Some(def) = registry.resolve_alias(&clean) {
        return Some(def);
    }

    let no_spaces: String = clean.split_whitespace().collect();
    if let Some(def) = registry.resolve_alias(&no_spaces) {
        return Some(def);
    }
    for (alias, def) in registry.iter_aliases() {
        let alias_no_space: String = alias.split_whitespace().collect();
        if alias_no_space == no_spaces {
            return Some(def);
        }
    }

    let candidate_len = no_spaces.chars().count();
    if candidate_len < MIN_FUZZY_LEN {
        return None;
    }

    // Bounded edit distance, smallest distance wins; ties keep the earliest
    // registered alias.
    let mut best: Option<(usize, &CommandDefinition)> = None;
    for (alias, def) in registry.iter_aliases() {
        let alias_clean: String = alias.split_whitespace().collect();
        let alias_len = alias_clean.chars().count();
        if length_diff(candidate_len, alias_len) > MAX_LENGTH_DIFF {
            continue;
        }
        let distance = levenshtein(&no_spaces, &alias_clean);
        if distance <= edit_threshold(alias_len) && best.is_none_or(|(d, _)| distance < d) {
            best = Some((distance, def));
        }
    }
    if let Some((_, def)) = best {
        return Some(def);
    }

    // Ratio fallback for inputs the edit bound rejected, still gated on a
    // small length difference.
    let mut best_ratio: Option<(f64, &CommandDefinition)> = None;
    for (alias, def) in registry.iter_aliases() {
        let alias_clean: String = alias.split_whitespace().collect();
        if length_diff(candidate_len, alias_clean.chars().count()) > MAX_LENGTH_DIFF {
            continue;
        }
        let ratio = subsequence_ratio(&no_spaces, &alias_clean);
        if ratio >= RATIO_CUTOFF && best_ratio.is_none_or(|(r, _)| ratio > r) {
            best_ratio = Some((ratio, def));
        }
    }
    best_ratio.map(|(_, def)| def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CommandSpec;

    fn test_registry() -> CommandRegistry {
        let specs = [
            CommandSpec {
                handler: HandlerId::Menu,
                aliases: vec!["menu".into(), "help".into()],
                admin_only: false,
            },
            CommandSpec {
                handler: HandlerId::Chatbot,
                aliases: vec!["gpt".into(), "chatgpt".into()],
                admin_only: false,
            },
            CommandSpec {
                handler: HandlerId::ShortenLink,
                aliases: vec!["short".into(), "shorten".into()],
                admin_only: false,
            },
            CommandSpec {
                handler: HandlerId::CheckWhatsapp,
                aliases: vec!["checkwa".into(), "checkwhatsapp".into()],
                admin_only: false,
            },
            CommandSpec {
                handler: HandlerId::AllLinks,
                aliases: vec!["alllinks".into()],
                admin_only: true,
            },
            CommandSpec {
                handler: HandlerId::VideoOnly,
                aliases: vec!["videoonly".into()],
                admin_only: true,
            },
        ];
        CommandRegistry::from_specs(&specs).unwrap()
    }

    fn classify_test(text: &str) -> Option<Intent> {
        classify(text, &test_registry(), '.')
    }

    #[test]
    fn every_alias_resolves_with_prefix_any_case() {
        for (alias, def) in test_registry().iter_aliases() {
            let upper = format!(".{}", alias.to_uppercase());
            match classify_test(&upper) {
                Some(Intent::Command { handler, args, .. }) => {
                    assert_eq!(handler, def.handler, "alias {alias}");
                    assert!(args.is_empty(), "alias {alias}");
                }
                other => panic!("alias {alias} classified as {other:?}"),
            }
        }
    }

    #[test]
    fn prefixed_alias_with_args_keeps_rest_verbatim() {
        match classify_test(".short http://x.com myalias") {
            Some(Intent::Command { handler, args, .. }) => {
                assert_eq!(handler, HandlerId::ShortenLink);
                assert_eq!(args, "http://x.com myalias");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn greeting_detection_depends_on_length() {
        assert_eq!(classify_test("hello"), Some(Intent::Greeting));
        assert_eq!(classify_test("hi there"), Some(Intent::Greeting));
        assert_eq!(classify_test("HEY everyone here"), Some(Intent::Greeting));
        assert_ne!(
            classify_test("hi there how are you today friend"),
            Some(Intent::Greeting)
        );
    }

    #[test]
    fn bare_url_is_auto_download() {
        match classify_test("https://youtu.be/abc123") {
            Some(Intent::AutoDownload { text }) => assert_eq!(text, "https://youtu.be/abc123"),
            other => panic!("unexpected {other:?}"),
        }
        // Minimal surrounding text is fine.
        assert!(matches!(
            classify_test("check this https://youtu.be/abc123 out"),
            Some(Intent::AutoDownload { .. })
        ));
    }

    #[test]
    fn long_message_with_url_is_not_auto_download() {
        let text = "so yesterday I found this https://youtu.be/abc video and it was honestly great";
        assert_eq!(classify_test(text), None);
    }

    #[test]
    fn prefix_suppresses_url_intent() {
        // Starts with the prefix but matches nothing: stays unresolved
        // instead of falling back to a download.
        assert_eq!(classify_test(".zzzzzz http://x.com"), None);
    }

    #[test]
    fn exact_first_alias_token_suppresses_url_intent() {
        match classify_test("short http://x.com") {
            Some(Intent::Command { handler, args, .. }) => {
                assert_eq!(handler, HandlerId::ShortenLink);
                assert_eq!(args, "http://x.com");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn edit_distance_respects_length_scaled_threshold() {
        // len <= 4: one edit allowed, two rejected.
        assert!(matches!(
            classify_test(".gptt"),
            Some(Intent::Command { handler: HandlerId::Chatbot, .. })
        ));
        assert_eq!(classify_test(".gxx"), None);

        // len <= 8: two edits allowed, three rejected (and the ratio
        // fallback stays below its cutoff for this input).
        assert!(matches!(
            classify_test(".chekwa"),
            Some(Intent::Command { handler: HandlerId::CheckWhatsapp, .. })
        ));
        assert_eq!(classify_test(".chxxwa"), None);

        // len > 8: three edits allowed.
        assert!(matches!(
            classify_test(".chekwhatapp"),
            Some(Intent::Command { handler: HandlerId::CheckWhatsapp, .. })
        ));
    }

    #[test]
    fn length_difference_gate_blocks_suffixed_junk() {
        assert_eq!(classify_test(".checkwhatsapp123456"), None);
    }

    #[test]
    fn spaced_alias_matches_via_wider_window() {
        // "videoonly" typed with a stray space: window 1 ("video") matches
        // nothing, window 2 matches the alias with spaces removed.
        match classify_test(".video only enable") {
            Some(Intent::Command { handler, args, .. }) => {
                assert_eq!(handler, HandlerId::VideoOnly);
                assert_eq!(args, "enable");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn shortest_window_wins_even_when_fuzzy() {
        // "check" sits within edit distance 2 of "checkwa", so window 1
        // already resolves and the remaining tokens become arguments.
        match classify_test(".check whatsapp 03001234567") {
            Some(Intent::Command { handler, args, .. }) => {
                assert_eq!(handler, HandlerId::CheckWhatsapp);
                assert_eq!(args, "whatsapp 03001234567");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn window_grows_shortest_first() {
        // "short" must win at window 1 and leave the rest as args, rather
        // than a longer window absorbing the URL.
        match classify_test(".short https://x.com alias pw") {
            Some(Intent::Command { args, .. }) => assert_eq!(args, "https://x.com alias pw"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn prose_over_fifteen_tokens_is_never_a_command() {
        let text = ".gpt one two three four five six seven eight nine ten eleven twelve thirteen fourteen fifteen";
        assert_eq!(classify_test(text), None);
    }

    #[test]
    fn single_char_input_never_fuzzy_matches() {
        assert_eq!(classify_test(".a"), None);
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let registry = CommandRegistry::default();
        assert_eq!(classify(".menu", &registry, '.'), None);
        assert!(matches!(
            classify("https://x.com/v", &registry, '.'),
            Some(Intent::AutoDownload { .. })
        ));
    }

    #[test]
    fn extract_url_strips_leading_junk() {
        assert_eq!(
            extract_url("look (https://a.example/v)123"),
            Some("https://a.example/v)123")
        );
        assert_eq!(extract_url("no links here"), None);
    }
}
