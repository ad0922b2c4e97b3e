pub mod date_handling;
pub mod http;
pub mod logging;
pub mod path_processing;

pub use http::{HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestClient};
pub use logging::init_tracing;
pub use path_processing::{expand_tilde, sanitize_file_name};

use once_cell::sync::Lazy;
use regex::Regex;

static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization: )([\w\-\.=:/+]+)",
        r"(?i)([?&](?:api_?key|apikey|token|access_token|password|secret)=)([^&\s]+)",
        r"(?i)([A-Z0-9_]*?(?:KEY|TOKEN|SECRET|PASSWORD)=)([^\s&]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid redaction pattern"))
    .collect()
});

/// Redacts values that look like secrets in a string.
///
/// Used before logging request URLs, which may carry provider API keys as
/// query parameters.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in SENSITIVE_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |caps: &regex::Captures| {
                let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                format!("{}<redacted>", prefix)
            })
            .to_string();
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_query_string_api_keys() {
        let url = "https://catalog.example.com/search?productType=S2&apikey=abc123&page=2";
        let redacted = redact_sensitive(url);
        assert!(!redacted.contains("abc123"), "secret leaked: {redacted}");
        assert!(redacted.contains("page=2"));
        assert!(redacted.contains("apikey=<redacted>"));
    }

    #[test]
    fn redacts_authorization_headers() {
        let redacted = redact_sensitive("Authorization: Bearer.token");
        assert_eq!(redacted, "Authorization: <redacted>");
    }
}
