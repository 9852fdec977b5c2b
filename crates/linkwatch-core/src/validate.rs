use regex::Regex;
use std::sync::LazyLock;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://(?:(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}\.?|localhost|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::\d{1,5})?(?:/?|[/?#]\S+)$",
    )
    .expect("static URL pattern compiles")
});

/// Accepts absolute `http`/`https` URLs whose host is a domain name,
/// `localhost` or a dotted IPv4 address. Port and path are optional.
pub fn validate_url(url: &str) -> bool {
    URL_RE.is_match(url)
}
