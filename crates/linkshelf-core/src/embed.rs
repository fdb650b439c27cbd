//! Iframe embeddability heuristic
//!
//! Some sites refuse to be framed no matter what headers the proxy strips.
//! The client asks before opening a bookmark inline.

use url::Url;

/// Hosts known to block framing
pub const FRAME_BLOCKING_HOSTS: &[&str] = &[
    "chat.openai.com",
    "linkedin.com",
    "facebook.com",
    "twitter.com",
];

/// Whether `url` is expected to render inside an iframe.
///
/// Matches the host and its subdomains. Input that does not parse as a URL
/// falls back to a substring match.
pub fn can_embed(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => !FRAME_BLOCKING_HOSTS
                .iter()
                .any(|blocked| host_matches(host, blocked)),
            None => true,
        },
        Err(_) => !FRAME_BLOCKING_HOSTS
            .iter()
            .any(|blocked| url.contains(blocked)),
    }
}

/// `host` equals `domain` or is one of its subdomains
pub fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();
    host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_hosts_and_subdomains() {
        assert!(!can_embed("https://chat.openai.com/c/123"));
        assert!(!can_embed("https://www.linkedin.com/feed"));
        assert!(!can_embed("https://m.facebook.com"));
        assert!(!can_embed("https://TWITTER.com/home"));
    }

    #[test]
    fn test_lookalike_hosts_are_embeddable() {
        assert!(can_embed("https://notlinkedin.com"));
        assert!(can_embed("https://example.com/?ref=facebook.com"));
        assert!(can_embed("https://notion.so"));
    }

    #[test]
    fn test_unparsable_input_falls_back_to_substring() {
        assert!(!can_embed("linkedin.com/in/someone"));
        assert!(can_embed("example.com"));
    }

    #[test]
    fn test_host_matches() {
        assert!(host_matches("api.example.com", "example.com"));
        assert!(host_matches("example.com.", "example.com"));
        assert!(!host_matches("badexample.com", "example.com"));
    }
}
